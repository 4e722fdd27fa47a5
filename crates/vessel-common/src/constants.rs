//! System-wide constants and default paths.

/// Cgroups v2 unified hierarchy mount point.
pub const CGROUP_V2_PATH: &str = "/sys/fs/cgroup";

/// Subtree under the unified hierarchy that holds per-launch cgroups.
pub const CGROUP_SUBTREE: &str = "vessel";

/// Fixed mount point for the child's private in-memory filesystem.
pub const PRIVATE_MOUNT_POINT: &str = "/tmp";

/// Mount options for the private tmpfs view.
pub const PRIVATE_MOUNT_OPTIONS: &str = "size=64M,mode=1777";

/// Stack size for the cloned child, in bytes.
pub const CHILD_STACK_SIZE: usize = 1024 * 1024;

/// Kernel overflow id that unmapped identities resolve to inside a
/// user namespace.
pub const OVERFLOW_ID: u32 = 65534;

/// Base added to the signal number when the child is signal-killed.
pub const SIGNAL_EXIT_BASE: i32 = 128;

/// Child exit code: user identity remapping failed.
pub const EXIT_IDENTITY: i32 = 121;
/// Child exit code: private mount view could not be established.
pub const EXIT_FILESYSTEM: i32 = 122;
/// Child exit code: syscall filter could not be built or installed.
pub const EXIT_POLICY: i32 = 123;
/// Child exit code: the rendezvous pipe closed before release.
pub const EXIT_RENDEZVOUS: i32 = 124;
/// Child exit code: the target command exists but could not be executed.
pub const EXIT_EXEC_FAILED: i32 = 126;
/// Child exit code: the target command was not found.
pub const EXIT_EXEC_NOT_FOUND: i32 = 127;

/// Application name used in cgroup naming and diagnostics.
pub const APP_NAME: &str = "vessel";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "vsl";

/// Describes a reserved child-side exit code, if `code` is one.
///
/// The child reports its own setup failures only through its exit
/// status; this mapping lets the supervisor name the failing step
/// instead of presenting a bare number.
#[must_use]
pub fn describe_child_failure(code: i32) -> Option<&'static str> {
    match code {
        EXIT_IDENTITY => Some("user identity remapping failed in the isolated process"),
        EXIT_FILESYSTEM => Some("private mount view could not be established"),
        EXIT_POLICY => Some("syscall filter could not be installed"),
        EXIT_RENDEZVOUS => Some("rendezvous with the supervisor was interrupted"),
        EXIT_EXEC_FAILED => Some("command found but could not be executed"),
        EXIT_EXEC_NOT_FOUND => Some("command not found"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_codes_are_described() {
        for code in [
            EXIT_IDENTITY,
            EXIT_FILESYSTEM,
            EXIT_POLICY,
            EXIT_RENDEZVOUS,
            EXIT_EXEC_FAILED,
            EXIT_EXEC_NOT_FOUND,
        ] {
            assert!(describe_child_failure(code).is_some());
        }
    }

    #[test]
    fn ordinary_codes_are_not_described() {
        assert_eq!(describe_child_failure(0), None);
        assert_eq!(describe_child_failure(1), None);
        assert_eq!(describe_child_failure(137), None);
    }
}
