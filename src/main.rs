use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use echogate::audio::vad::{Clock, MockClock};
use echogate::audio::wav::WavClip;
use echogate::cli::{Cli, Commands, ConfigAction, OutputFormat, SessionArgs};
use echogate::config::Config;
use echogate::console::Console;
use echogate::streaming::{ContinuousSession, HoldSession, Mode, Session};
use echogate::stt::{Decoder, WhisperConfig, WhisperDecoder};
use owo_colors::OwoColorize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    tracing::debug!(version = %echogate::version_string(), "starting");

    match cli.command {
        None => {
            let config = load_config(cli.config.as_deref(), &SessionArgs::default())?;
            listen(config, OutputFormat::Text, cli.quiet, cli.verbose)?;
        }
        Some(Commands::Listen {
            device,
            session,
            format,
        }) => {
            let mut config = load_config(cli.config.as_deref(), &session)?;
            if device.is_some() {
                config.audio.device = device;
            }
            listen(config, format, cli.quiet, cli.verbose)?;
        }
        Some(Commands::Replay {
            wav,
            session,
            block_ms,
            format,
        }) => {
            let config = load_config(cli.config.as_deref(), &session)?;
            replay(config, &wav, block_ms, format, cli.quiet)?;
        }
        Some(Commands::Devices) => {
            list_audio_devices()?;
        }
        Some(Commands::Config { action }) => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(shell, &mut Cli::command(), "echogate", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Logs go to stderr. `ECHOGATE_LOG` takes precedence over `-v`.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "echogate=debug,info",
        _ => "echogate=trace,debug",
    };
    let filter = EnvFilter::try_from_env("ECHOGATE_LOG").unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Priority order (highest first):
/// 1. Command-line flags
/// 2. `ECHOGATE_*` environment variables
/// 3. Config file (--config, or ~/.config/echogate/config.toml)
/// 4. Built-in defaults
fn load_config(custom_path: Option<&Path>, overrides: &SessionArgs) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Config::default_path())?,
    };
    let mut config = config.with_env_overrides();

    if let Some(model) = &overrides.model {
        config.decoder.model = model.clone();
    }
    if let Some(language) = &overrides.language {
        config.decoder.language = language.clone();
    }
    if let Some(task) = overrides.task {
        config.decoder.task = task;
    }
    if let Some(mode) = overrides.mode {
        config.streaming.mode = mode;
    }
    if let Some(threshold) = overrides.gate_threshold {
        config.audio.gate_threshold = threshold;
    }

    config.validate()?;
    Ok(config)
}

fn load_decoder(config: &Config) -> Result<Arc<dyn Decoder>> {
    let whisper = WhisperConfig {
        model_path: config.decoder.model_path(),
        threads: config.decoder.threads,
    };
    let decoder = WhisperDecoder::new(whisper).with_context(|| {
        format!(
            "cannot load decoder model '{}' (build with --features whisper and place the ggml file in {})",
            config.decoder.model,
            Config::model_dir().display()
        )
    })?;

    tracing::info!(
        model = decoder.model_name(),
        multilingual = decoder.is_multilingual(),
        backend = echogate::defaults::gpu_backend(),
        "decoder loaded"
    );
    Ok(Arc::new(decoder))
}

/// Runs a WAV file through a session on a simulated clock.
///
/// The clock advances by each block's duration before the block is ingested,
/// so timing behaves as if the file were captured live with instant decodes.
fn replay(
    config: Config,
    wav: &Path,
    block_ms: u32,
    format: OutputFormat,
    quiet: bool,
) -> Result<()> {
    let clip = WavClip::open(wav).with_context(|| format!("cannot read {}", wav.display()))?;
    let controller_config = config.controller_config()?;
    let decoder = load_decoder(&config)?;

    tracing::info!(
        path = %wav.display(),
        secs = clip.duration_secs(),
        rate = clip.sample_rate(),
        mode = %controller_config.mode,
        "replaying"
    );

    let clock = MockClock::new();
    let mut console = Console::stdio(Arc::new(clock.clone()), format, quiet);
    let mut session: Box<dyn Session> = match controller_config.mode {
        Mode::Continuous => Box::new(ContinuousSession::new(
            &controller_config,
            decoder,
            clock.now(),
        )),
        Mode::HoldToTalk => Box::new(HoldSession::new(&controller_config, decoder)),
    };

    let rate = clip.sample_rate();
    for block in clip.blocks(block_ms) {
        clock.advance(Duration::from_secs_f64(block.len() as f64 / rate as f64));
        session.ingest(block, rate, clock.now(), &mut console);
    }
    session.finish(clock.now(), &mut console);

    Ok(())
}

#[cfg(feature = "cpal-audio")]
fn listen(config: Config, format: OutputFormat, quiet: bool, verbose: u8) -> Result<()> {
    use crossbeam_channel::{select, unbounded};
    use echogate::audio::capture::MicrophoneCapture;
    use echogate::audio::vad::SystemClock;
    use echogate::console::LevelMonitor;
    use echogate::streaming::{ChannelSink, ControllerHandle, RecordingFlag, StreamingController};

    let controller_config = config.controller_config()?;
    let threshold = controller_config.gate.threshold;
    let mode = controller_config.mode;
    let decoder = load_decoder(&config)?;
    let controller = StreamingController::new(controller_config, decoder, RecordingFlag::new());
    let mut capture = MicrophoneCapture::new(config.audio.device.as_deref())?;
    let levels = LevelMonitor::new();
    let (event_tx, event_rx) = unbounded();
    let keys = spawn_key_reader();
    let mut console = Console::stdio(Arc::new(SystemClock), format, quiet);

    let begin = |capture: &mut MicrophoneCapture| -> Result<ControllerHandle> {
        let handle = controller.start(Box::new(ChannelSink::new(event_tx.clone())))?;
        let meter = levels.clone();
        capture.start(handle.input(), Some(Box::new(move |rms| meter.record(rms))))?;
        Ok(handle)
    };
    let end = |capture: &mut MicrophoneCapture, handle: ControllerHandle| -> Result<()> {
        capture.stop()?;
        handle.stop()?;
        Ok(())
    };

    let mut active = match mode {
        Mode::Continuous => {
            eprintln!("{}", "Listening. Press Enter to stop.".green());
            Some(begin(&mut capture)?)
        }
        Mode::HoldToTalk => {
            eprintln!(
                "{}",
                "Hold-to-talk. Press Enter to start, Enter again to transcribe, q to quit.".green()
            );
            None
        }
    };

    loop {
        select! {
            recv(event_rx) -> event => {
                if let Ok(event) = event {
                    console.handle(event);
                }
            }
            recv(keys) -> key => {
                let quit = match key {
                    Ok(line) => mode == Mode::Continuous || line.trim().eq_ignore_ascii_case("q"),
                    Err(_) => true,
                };
                if let Some(handle) = active.take() {
                    end(&mut capture, handle)?;
                } else if !quit {
                    active = Some(begin(&mut capture)?);
                }
                if quit {
                    break;
                }
            }
            default(Duration::from_millis(100)) => {
                if verbose > 0 && active.is_some() {
                    console.show_level(levels.level(), threshold);
                }
            }
        }
    }

    // The controller thread has finished; flush whatever it sent last.
    while let Ok(event) = event_rx.try_recv() {
        console.handle(event);
    }
    if capture.dropped_blocks() > 0 {
        tracing::warn!(blocks = capture.dropped_blocks(), "capture blocks dropped");
    }
    Ok(())
}

#[cfg(not(feature = "cpal-audio"))]
fn listen(_config: Config, _format: OutputFormat, _quiet: bool, _verbose: u8) -> Result<()> {
    anyhow::bail!(
        "microphone capture is not compiled in; rebuild with --features cpal-audio, or use `echogate replay <file.wav>`"
    )
}

/// Forwards each line typed on stdin. The channel closes on EOF.
#[cfg(feature = "cpal-audio")]
fn spawn_key_reader() -> crossbeam_channel::Receiver<String> {
    let (tx, rx) = crossbeam_channel::unbounded();
    let spawned = std::thread::Builder::new()
        .name("echogate-keys".to_string())
        .spawn(move || {
            for line in std::io::stdin().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        tracing::error!("failed to spawn key reader: {}", e);
    }
    rx
}

/// List available audio input devices.
#[cfg(feature = "cpal-audio")]
fn list_audio_devices() -> Result<()> {
    let devices = echogate::audio::capture::list_devices()?;

    if devices.is_empty() {
        eprintln!("No audio input devices found");
        std::process::exit(1);
    }

    println!("Available audio input devices:");
    for (idx, device) in devices.iter().enumerate() {
        println!("  [{}] {}", idx, device);
    }

    Ok(())
}

#[cfg(not(feature = "cpal-audio"))]
fn list_audio_devices() -> Result<()> {
    anyhow::bail!("audio device support is not compiled in; rebuild with --features cpal-audio")
}

/// Handle configuration commands.
fn handle_config_command(action: ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    let config_path = custom_path
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::default_path);

    match action {
        ConfigAction::Show => {
            let config = load_config(Some(&config_path), &SessionArgs::default())
                .or_else(|e| {
                    if config_path.exists() {
                        Err(e)
                    } else {
                        Ok(Config::default().with_env_overrides())
                    }
                })?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Path => {
            println!("{}", config_path.display());
            if !config_path.exists() {
                eprintln!("{}", "(file does not exist, built-in defaults apply)".dimmed());
            }
        }
    }
    Ok(())
}
