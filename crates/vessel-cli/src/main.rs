//! # vsl
//!
//! Single-shot launcher CLI: runs one command inside a fresh PID and
//! mount namespace (and a user namespace when a uid remap is requested),
//! bounded by a memory cgroup and optionally confined by a seccomp
//! filter, then exits with the command's own status.
//!
//! Setup failures on the supervisor side exit with status 1 and a
//! diagnostic naming the failed step. Child-side setup failures surface
//! through the reserved exit codes of the isolated process.

use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use vessel_common::constants::{BIN_NAME, describe_child_failure};
use vessel_common::types::LaunchConfig;
use vessel_runtime::supervisor;

#[derive(Parser, Debug)]
#[command(name = "vsl", version, about = "Run one command in an isolated, resource-bounded context")]
struct Cli {
    /// Memory limit for the launch, in bytes or with a size suffix
    /// (e.g. 512KB, 128MiB, 1GB).
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    memory: Option<u64>,

    /// Remap the child to this user id inside a new user namespace.
    #[arg(long, value_name = "UID")]
    uid: Option<u32>,

    /// Install the default syscall filter before the command runs.
    #[arg(long)]
    seccomp: bool,

    /// Kill the command if it runs longer than this many seconds.
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Command and arguments to execute inside the isolated context.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
    command: Vec<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{BIN_NAME}: {e:#}");
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let mut config = LaunchConfig::new(cli.command)?;
    if let Some(bytes) = cli.memory {
        config = config.with_memory_limit(bytes);
    }
    if let Some(uid) = cli.uid {
        config = config.with_uid(uid);
    }
    if let Some(secs) = cli.timeout {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    config = config.with_seccomp(cli.seccomp);
    tracing::debug!(
        memory = ?config.memory_limit,
        uid = ?config.uid,
        seccomp = config.seccomp,
        timeout = ?config.timeout,
        "launch configuration assembled"
    );

    let outcome = supervisor::run(&config)?;
    tracing::info!(exit_code = outcome.exit_code, "launch finished");
    if let Some(signal) = outcome.signal {
        eprintln!("{BIN_NAME}: command terminated by signal {signal}");
    } else if let Some(reason) = describe_child_failure(outcome.exit_code) {
        eprintln!("{BIN_NAME}: {reason}");
    }
    Ok(outcome.exit_code)
}

/// Parses a size value with an optional binary or decimal suffix.
fn parse_size(value: &str) -> Result<u64, String> {
    let value = value.trim();
    let suffixes: &[(&str, u64)] = &[
        ("GiB", 1024 * 1024 * 1024),
        ("GB", 1_000_000_000),
        ("G", 1024 * 1024 * 1024),
        ("MiB", 1024 * 1024),
        ("MB", 1_000_000),
        ("M", 1024 * 1024),
        ("KiB", 1024),
        ("KB", 1000),
        ("K", 1024),
    ];

    let (number, multiplier) = suffixes
        .iter()
        .find_map(|(suffix, multiplier)| {
            value
                .strip_suffix(suffix)
                .map(|number| (number.trim(), *multiplier))
        })
        .unwrap_or((value, 1));

    let parsed: u64 = number
        .parse()
        .map_err(|_| format!("invalid size value: {value}"))?;
    parsed
        .checked_mul(multiplier)
        .ok_or_else(|| format!("size value too large: {value}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_bytes() {
        assert_eq!(parse_size("1048576").unwrap(), 1024 * 1024);
    }

    #[test]
    fn parses_binary_suffixes() {
        assert_eq!(parse_size("128MiB").unwrap(), 128 * 1024 * 1024);
        assert_eq!(parse_size("1GiB").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(parse_size("512KiB").unwrap(), 512 * 1024);
    }

    #[test]
    fn parses_decimal_suffixes() {
        assert_eq!(parse_size("500MB").unwrap(), 500_000_000);
        assert_eq!(parse_size("2GB").unwrap(), 2_000_000_000);
    }

    #[test]
    fn short_suffixes_are_binary() {
        assert_eq!(parse_size("64M").unwrap(), 64 * 1024 * 1024);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_size("lots").is_err());
        assert!(parse_size("12XB").is_err());
        assert!(parse_size("").is_err());
    }

    #[test]
    fn rejects_overflow() {
        assert!(parse_size("999999999999GiB").is_err());
    }

    #[test]
    fn cli_collects_trailing_command() {
        let cli = Cli::parse_from(["vsl", "--memory", "1MiB", "--", "ls", "-la"]);
        assert_eq!(cli.memory, Some(1024 * 1024));
        assert_eq!(cli.command, vec!["ls", "-la"]);
    }

    #[test]
    fn flags_default_off() {
        let cli = Cli::parse_from(["vsl", "true"]);
        assert!(!cli.seccomp);
        assert_eq!(cli.uid, None);
        assert_eq!(cli.timeout, None);
    }
}
