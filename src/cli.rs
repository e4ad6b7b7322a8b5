//! Command-line interface for echogate
//!
//! Provides argument parsing using clap derive macros.

use crate::stt::decoder::DecodeTask;
use crate::streaming::controller::Mode;
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// Streaming speech transcription with live partials
#[derive(Parser, Debug)]
#[command(
    name = "echogate",
    version,
    about = "Streaming speech transcription with live partials"
)]
pub struct Cli {
    /// Subcommand to execute (default: listen)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress live partials and progress, print finalized text only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: debug logs + level meter, -vv: trace logs)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Decoder and controller overrides shared by `listen` and `replay`.
#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct SessionArgs {
    /// Whisper model name or path to a ggml file (default: base)
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Language code for multilingual models (default: auto). Examples: auto, en, ar
    #[arg(long, value_name = "LANG")]
    pub language: Option<String>,

    /// Decoder task for multilingual models
    #[arg(long, value_enum)]
    pub task: Option<DecodeTask>,

    /// Operating mode
    #[arg(long, value_enum)]
    pub mode: Option<Mode>,

    /// Voice gate RMS threshold (raw, not normalized)
    #[arg(long, value_name = "RMS")]
    pub gate_threshold: Option<f32>,
}

/// How transcripts are printed.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Live line for partials, `[start - end] text` per segment
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Transcribe the microphone (Enter toggles hold-to-talk or stops)
    Listen {
        /// Audio input device (see `echogate devices`)
        #[arg(long, value_name = "DEVICE")]
        device: Option<String>,

        #[command(flatten)]
        session: SessionArgs,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Feed a WAV file through the controller on a simulated clock
    Replay {
        /// WAV file to replay
        wav: PathBuf,

        #[command(flatten)]
        session: SessionArgs,

        /// Block size delivered to the controller, in milliseconds
        #[arg(long, value_name = "MS", default_value_t = 100, value_parser = clap::value_parser!(u32).range(1..=10_000))]
        block_ms: u32,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// List available audio input devices
    Devices,

    /// View configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print the effective configuration (file + environment) as TOML
    Show,
    /// Print the configuration file path
    Path,
}
