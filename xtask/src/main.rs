use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::Command;

const EBPF_PACKAGE: &str = "offcpu-ebpf";
const EBPF_BIN: &str = "offcpu";

#[derive(Parser)]
struct Args {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Parser)]
enum Cmd {
    /// Build the kernel-side probe object
    BuildEbpf {
        #[arg(long, default_value = "bpfel-unknown-none")]
        target: String,
        /// Accepted for compatibility; the probe is always built in release
        #[arg(long)]
        release: bool,
    },
    /// Build everything, then run offcpu under sudo
    Run {
        #[arg(long, default_value = "bpfel-unknown-none")]
        target: String,
        /// Arguments passed through to offcpu
        #[arg(last = true)]
        run_args: Vec<String>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Cmd::BuildEbpf { target, release: _ } => {
            build_ebpf(&target)?;
        }
        Cmd::Run { target, run_args } => {
            let object = build_ebpf(&target)?;
            run(&object, &run_args)?;
        }
    }

    Ok(())
}

/// Build the probe and return the path of the object file
fn build_ebpf(target: &str) -> Result<PathBuf> {
    // Debug builds pull in formatting code the BPF linker rejects
    let status = Command::new("cargo")
        .arg("+nightly")
        .arg("build")
        .arg("--package")
        .arg(EBPF_PACKAGE)
        .arg("--target")
        .arg(target)
        .arg("-Z")
        .arg("build-std=core")
        .arg("--release")
        .status()
        .context("Failed to build eBPF program")?;

    if !status.success() {
        bail!("Failed to build eBPF program");
    }

    let object = PathBuf::from("target").join(target).join("release").join(EBPF_BIN);
    println!("✓ eBPF program built successfully");
    println!("  Object: {}", object.display());

    Ok(object)
}

fn run(object: &std::path::Path, run_args: &[String]) -> Result<()> {
    let status = Command::new("cargo")
        .args(["build", "--release", "--package", "offcpu"])
        .status()
        .context("Failed to build offcpu")?;
    if !status.success() {
        bail!("Failed to build offcpu");
    }

    let object = object
        .canonicalize()
        .with_context(|| format!("eBPF object missing at {}", object.display()))?;

    // sudo drops most of the environment, so the object path goes on the command line
    let status = Command::new("sudo")
        .arg("target/release/offcpu")
        .arg("--ebpf-object")
        .arg(&object)
        .args(run_args)
        .status()
        .context("Failed to run offcpu")?;

    if !status.success() {
        bail!("offcpu exited with {status}");
    }
    Ok(())
}
