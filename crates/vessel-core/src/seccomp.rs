//! Seccomp-BPF syscall policies.
//!
//! A policy is an ordered set of (syscall, action) rules over a default
//! action, compiled to a BPF program with `seccompiler` and installed for
//! the calling process. Installation is monotonic: once loaded, neither
//! the process nor any of its descendants can remove or relax the filter.
//!
//! The policy is installed on the isolated side of the process boundary,
//! as the last step before the target command replaces the program image.
//! The default rule set must not block any syscall the launcher itself
//! needs to exec the target, or the filter would defeat the launch; the
//! shipped default therefore kills on socket creation rather than on exec.

use std::collections::BTreeMap;

use seccompiler::{BpfProgram, SeccompAction, SeccompFilter, SeccompRule, TargetArch};

use vessel_common::error::{Result, VesselError};

#[cfg(target_arch = "x86_64")]
const TARGET_ARCH: TargetArch = TargetArch::x86_64;
#[cfg(target_arch = "aarch64")]
const TARGET_ARCH: TargetArch = TargetArch::aarch64;

/// A syscall filter to be installed in the child before exec.
#[derive(Debug)]
pub struct SyscallPolicy {
    denied: Vec<i64>,
}

impl SyscallPolicy {
    /// Creates an empty allow-by-default policy.
    #[must_use]
    pub fn allow_by_default() -> Self {
        Self { denied: Vec::new() }
    }

    /// Adds a kill-process rule for the given syscall number.
    #[must_use]
    pub fn deny(mut self, syscall: i64) -> Self {
        self.denied.push(syscall);
        self
    }

    /// The default demonstration policy: allow everything except socket
    /// creation, which kills the process on invocation.
    #[must_use]
    pub fn default_deny() -> Self {
        Self::allow_by_default()
            .deny(libc::SYS_socket as i64)
            .deny(libc::SYS_socketpair as i64)
    }

    /// Returns the denied syscall numbers.
    #[must_use]
    pub fn denied(&self) -> &[i64] {
        &self.denied
    }

    /// Compiles the policy into a loadable BPF program.
    ///
    /// # Errors
    ///
    /// Returns a `Policy` error if the filter cannot be built for the
    /// target architecture.
    pub fn compile(&self) -> Result<BpfProgram> {
        let mut rules: BTreeMap<i64, Vec<SeccompRule>> = BTreeMap::new();
        for &syscall in &self.denied {
            // An empty rule list matches the syscall unconditionally.
            let _ = rules.entry(syscall).or_default();
        }

        let filter = SeccompFilter::new(
            rules,
            SeccompAction::Allow,
            SeccompAction::KillProcess,
            TARGET_ARCH,
        )
        .map_err(|e| VesselError::Policy {
            message: format!("failed to build filter: {e}"),
        })?;

        filter.try_into().map_err(|e| VesselError::Policy {
            message: format!("failed to compile filter: {e}"),
        })
    }

    /// Installs the policy for the calling process.
    ///
    /// Sets `no_new_privs` first so the filter may be loaded without
    /// privilege and can never be escaped through setuid execution.
    ///
    /// # Errors
    ///
    /// Returns a `Policy` error if compilation or the load syscall fails.
    pub fn install(&self) -> Result<()> {
        let program = self.compile()?;

        // SAFETY: prctl with PR_SET_NO_NEW_PRIVS takes no pointers and
        // only restricts the calling process.
        let ret = unsafe { libc::prctl(libc::PR_SET_NO_NEW_PRIVS, 1, 0, 0, 0) };
        if ret != 0 {
            return Err(VesselError::Policy {
                message: format!(
                    "failed to set no_new_privs: {}",
                    std::io::Error::last_os_error()
                ),
            });
        }

        seccompiler::apply_filter(&program).map_err(|e| VesselError::Policy {
            message: format!("failed to install filter: {e}"),
        })?;

        tracing::debug!(denied = self.denied.len(), "syscall policy installed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_denies_socket_creation() {
        let policy = SyscallPolicy::default_deny();
        assert!(policy.denied().contains(&(libc::SYS_socket as i64)));
    }

    #[test]
    fn default_policy_does_not_deny_exec() {
        // A policy that blocked execve would prevent the launcher from
        // ever starting the target command.
        let policy = SyscallPolicy::default_deny();
        assert!(!policy.denied().contains(&(libc::SYS_execve as i64)));
    }

    #[test]
    fn policy_compiles_to_nonempty_program() {
        let program = SyscallPolicy::default_deny().compile().unwrap();
        assert!(!program.is_empty());
    }
}
