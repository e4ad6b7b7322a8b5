//! Build script: embeds the git hash for `version_string()` and makes sure
//! the GPU toolkit behind the `cuda` or `vulkan` feature is installed
//! before whisper.cpp starts compiling.

use std::process::Command;

/// A system toolkit that a GPU feature compiles against.
struct Toolkit {
    name: &'static str,
    feature: &'static str,
    command: &'static str,
    args: &'static [&'static str],
    install_url: &'static str,
}

const CUDA: Toolkit = Toolkit {
    name: "CUDA",
    feature: "cuda",
    command: "nvcc",
    args: &["--version"],
    install_url: "https://developer.nvidia.com/cuda-downloads",
};

const VULKAN: Toolkit = Toolkit {
    name: "Vulkan SDK",
    feature: "vulkan",
    command: "vulkaninfo",
    args: &["--summary"],
    install_url: "https://vulkan.lunarg.com/",
};

fn main() {
    embed_git_hash();

    if cfg!(feature = "cuda") {
        require(&CUDA);
    }
    if cfg!(feature = "vulkan") {
        require(&VULKAN);
    }
}

fn embed_git_hash() {
    if let Ok(output) = Command::new("git")
        .args(["rev-parse", "--short=7", "HEAD"])
        .output()
        && output.status.success()
    {
        let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
        println!("cargo:rustc-env=GIT_HASH={}", hash);
    }
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");
}

/// Runs the toolkit's probe command, or stops the build with an install hint.
fn require(toolkit: &Toolkit) {
    let output = Command::new(toolkit.command).args(toolkit.args).output();
    match output {
        Ok(out) if out.status.success() => {
            let text = String::from_utf8_lossy(&out.stdout);
            let version = release_version(&text).unwrap_or("unknown version");
            // Shown ahead of whisper-rs-sys output if the GPU build fails later
            println!(
                "cargo::warning=echogate: building for {} ({}); see {} if the build fails",
                toolkit.name, version, toolkit.install_url
            );
        }
        _ => panic!(
            "\n\n`{}` not found: the {} is required by the `{}` feature.\n\
             Install it from {}\n\
             or build without GPU support: cargo build --release\n",
            toolkit.command,
            toolkit.name,
            toolkit.feature,
            toolkit.install_url,
        ),
    }
}

/// Extracts "X.Y" from a "release X.Y, ..." line such as nvcc prints.
fn release_version(text: &str) -> Option<&str> {
    let (_, rest) = text.split_once("release ")?;
    let version = rest.split([',', '\n']).next()?.trim();
    let numeric = !version.is_empty()
        && version.split('.').all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()));
    numeric.then_some(version)
}
