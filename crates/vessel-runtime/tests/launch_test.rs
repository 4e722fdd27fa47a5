//! End-to-end launch tests.
//!
//! These drive real namespaces, cgroups, and seccomp, so they need root
//! on a Linux host with the cgroup v2 hierarchy mounted. Each test
//! self-skips when that environment is missing.

use std::time::Duration;

use vessel_common::constants::{EXIT_EXEC_NOT_FOUND, EXIT_IDENTITY, OVERFLOW_ID};
use vessel_common::types::LaunchConfig;
use vessel_runtime::supervisor;

const SIGKILL: i32 = 9;
const SIGSYS: i32 = 31;

fn can_isolate() -> bool {
    if !nix::unistd::Uid::effective().is_root() {
        eprintln!("skipping: requires root");
        return false;
    }
    if !std::path::Path::new("/sys/fs/cgroup/cgroup.controllers").exists() {
        eprintln!("skipping: requires the cgroup v2 hierarchy");
        return false;
    }
    true
}

fn config(args: &[&str]) -> LaunchConfig {
    LaunchConfig::new(args.iter().map(ToString::to_string).collect()).unwrap()
}

#[test]
fn trivial_command_exits_zero() {
    if !can_isolate() {
        return;
    }
    let outcome = supervisor::run(&config(&["true"])).unwrap();
    assert!(outcome.success());
    assert_eq!(outcome.signal, None);
}

#[test]
fn child_exit_code_is_propagated() {
    if !can_isolate() {
        return;
    }
    let outcome = supervisor::run(&config(&["sh", "-c", "exit 42"])).unwrap();
    assert_eq!(outcome.exit_code, 42);
}

#[test]
fn missing_command_reports_not_found() {
    if !can_isolate() {
        return;
    }
    // Setup succeeded and the failure happened at exec, so run() returns
    // an outcome rather than an error.
    let outcome = supervisor::run(&config(&["/no/such/binary"])).unwrap();
    assert_eq!(outcome.exit_code, EXIT_EXEC_NOT_FOUND);
    assert_eq!(outcome.signal, None);
}

#[test]
fn memory_limit_kills_runaway_allocation() {
    if !can_isolate() {
        return;
    }
    // Shell string doubling allocates well past 1 MiB within a second.
    let config = config(&["sh", "-c", "s=x; while :; do s=\"$s$s\"; done"])
        .with_memory_limit(1024 * 1024)
        .with_timeout(Duration::from_secs(20));
    let outcome = supervisor::run(&config).unwrap();
    assert_eq!(outcome.signal, Some(SIGKILL));
    assert_eq!(outcome.exit_code, 128 + SIGKILL);
}

#[test]
fn memory_limit_leaves_small_workloads_alone() {
    if !can_isolate() {
        return;
    }
    let config = config(&["true"]).with_memory_limit(32 * 1024 * 1024);
    let outcome = supervisor::run(&config).unwrap();
    assert!(outcome.success());
}

#[test]
fn sequential_limited_launches_do_not_collide() {
    if !can_isolate() {
        return;
    }
    // Each launch gets a uniquely named cgroup, so back-to-back
    // invocations must not trip over each other's host-global state.
    for _ in 0..2 {
        let config = config(&["true"]).with_memory_limit(32 * 1024 * 1024);
        assert!(supervisor::run(&config).unwrap().success());
    }
}

#[test]
fn syscall_filter_does_not_break_plain_commands() {
    if !can_isolate() {
        return;
    }
    let config = config(&["true"]).with_seccomp(true);
    let outcome = supervisor::run(&config).unwrap();
    assert!(outcome.success());
}

#[test]
fn syscall_filter_kills_socket_creation() {
    if !can_isolate() {
        return;
    }
    if !std::path::Path::new("/usr/bin/python3").exists() {
        eprintln!("skipping: requires python3");
        return;
    }
    let config = config(&["python3", "-c", "import socket; socket.socket()"]).with_seccomp(true);
    let outcome = supervisor::run(&config).unwrap();
    assert_eq!(outcome.signal, Some(SIGSYS));
}

#[test]
fn uid_remap_changes_child_identity() {
    if !can_isolate() {
        return;
    }
    let config = config(&["sh", "-c", "test \"$(id -u)\" = 1234 && test \"$(id -g)\" = 1234"])
        .with_uid(1234);
    let outcome = supervisor::run(&config).unwrap();
    assert!(outcome.success());
}

#[test]
fn unmapped_identities_resolve_to_overflow_id() {
    if !can_isolate() {
        return;
    }
    // Only uid 1234 is mapped, so root-owned files appear as the kernel
    // overflow id inside the namespace.
    let probe = format!("test \"$(stat -c %u /)\" = {OVERFLOW_ID}");
    let config = config(&["sh", "-c", &probe]).with_uid(1234);
    let outcome = supervisor::run(&config).unwrap();
    assert!(outcome.success());
}

#[test]
fn child_setup_failure_surfaces_reserved_code() {
    if !can_isolate() {
        return;
    }
    // The all-ones id can never be written into uid_map, so identity
    // setup fails in the child before it reaches the rendezvous and the
    // child exits while the supervisor may still be mid-release. The
    // supervisor must report the reserved code either way, never a
    // broken-pipe setup error.
    let config = config(&["true"]).with_uid(u32::MAX);
    let outcome = supervisor::run(&config).unwrap();
    assert_eq!(outcome.exit_code, EXIT_IDENTITY);
    assert_eq!(outcome.signal, None);
}

#[test]
fn deadline_kills_overrunning_child() {
    if !can_isolate() {
        return;
    }
    let config = config(&["sleep", "30"]).with_timeout(Duration::from_secs(1));
    let outcome = supervisor::run(&config).unwrap();
    assert_eq!(outcome.signal, Some(SIGKILL));
}

#[test]
fn deadline_is_disarmed_by_completion() {
    if !can_isolate() {
        return;
    }
    let config = config(&["true"]).with_timeout(Duration::from_secs(30));
    let outcome = supervisor::run(&config).unwrap();
    assert!(outcome.success());
    assert_eq!(outcome.signal, None);
}

#[test]
fn private_mount_view_hides_host_tmp() {
    if !can_isolate() {
        return;
    }
    let marker = "/tmp/vessel-mount-probe";
    std::fs::write(marker, b"host").unwrap();
    let probe = format!("test ! -e {marker}");
    let outcome = supervisor::run(&config(&["sh", "-c", &probe])).unwrap();
    std::fs::remove_file(marker).unwrap();
    assert!(outcome.success());
}
