//! Pre-flight checks for offcpu
//!
//! Validates system requirements before attempting to load eBPF programs.
//! Provides clear, actionable error messages when requirements aren't met.

#![allow(unsafe_code)] // geteuid() requires unsafe

use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::domain::ProfilerError;

/// Minimum kernel version required for BPF ring buffers
const MIN_KERNEL_VERSION: (u32, u32) = (5, 8);

/// Run all pre-flight checks before eBPF loading
///
/// # Errors
/// Returns an error describing the first unmet requirement
pub fn run_preflight_checks(ebpf_object: &Path) -> Result<()> {
    check_privileges()?;
    check_kernel_version()?;
    check_object_exists(ebpf_object)?;
    Ok(())
}

/// Check if running with sufficient privileges for eBPF
fn check_privileges() -> Result<()> {
    if unsafe { libc::geteuid() } == 0 {
        return Ok(());
    }

    Err(ProfilerError::PermissionDenied(
        "offcpu requires root privileges to attach scheduler tracepoints.\n\n\
         Run with: sudo offcpu ..."
            .to_string(),
    )
    .into())
}

/// Check if the kernel version is sufficient for eBPF features
fn check_kernel_version() -> Result<()> {
    let version_str = std::fs::read_to_string("/proc/version")
        .context("Failed to read kernel version from /proc/version")?;

    // "Linux version 6.1.0-arch1-1 ..."
    let release = version_str.split_whitespace().nth(2).unwrap_or("unknown");

    let Some((major, minor)) = parse_kernel_release(release) else {
        // Can't parse, assume it's fine
        return Ok(());
    };

    if (major, minor) < MIN_KERNEL_VERSION {
        bail!(
            "Kernel version {major}.{minor} is too old.\n\n\
             offcpu requires Linux {}.{} or newer for eBPF ring buffer support.\n\
             Current kernel: {release}",
            MIN_KERNEL_VERSION.0,
            MIN_KERNEL_VERSION.1,
        );
    }

    Ok(())
}

/// Parse "5.15.0-generic" into `(5, 15)`
fn parse_kernel_release(release: &str) -> Option<(u32, u32)> {
    let mut parts = release.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts
        .next()?
        .chars()
        .take_while(char::is_ascii_digit)
        .collect::<String>()
        .parse()
        .ok()?;
    Some((major, minor))
}

/// Check if the compiled eBPF object exists
fn check_object_exists(path: &Path) -> Result<()> {
    if !path.is_file() {
        bail!(
            "eBPF object not found: {}\n\n\
             Build it with: cargo xtask build-ebpf --release\n\
             or point --ebpf-object / OFFCPU_EBPF_OBJECT at it.",
            path.display()
        );
    }
    Ok(())
}
