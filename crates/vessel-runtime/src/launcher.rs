//! Creation of the isolated child context.
//!
//! The child is created with `clone(2)` so all requested namespace
//! boundaries exist from its first instruction; nothing ever runs in the
//! child outside isolation. The supervisor owns the returned handle and
//! must reap it exactly once, through [`IsolatedProcess::wait`] or
//! [`IsolatedProcess::kill_and_reap`].

use nix::errno::Errno;
use nix::sched::{CloneFlags, clone};
use nix::sys::signal::{Signal, kill};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::Pid;

use vessel_common::constants::CHILD_STACK_SIZE;
use vessel_common::error::{Result, VesselError};
use vessel_common::types::{IsolationSet, LaunchConfig, LaunchOutcome};
use vessel_core::identity::HostIdentity;

use crate::child;
use crate::rendezvous::ChildGate;

/// Handle to a running isolated process.
#[derive(Debug)]
pub struct IsolatedProcess {
    pid: Pid,
    _stack: Box<[u8]>,
}

impl IsolatedProcess {
    /// Process id of the child as seen from the host.
    #[must_use]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Waits for the child to terminate and translates its status.
    ///
    /// Consumes the handle; the child is reaped when this returns.
    ///
    /// # Errors
    ///
    /// Returns a `Launch` error if the wait syscall itself fails.
    pub fn wait(self) -> Result<LaunchOutcome> {
        loop {
            match waitpid(self.pid, None) {
                Ok(WaitStatus::Exited(_, code)) => return Ok(LaunchOutcome::exited(code)),
                Ok(WaitStatus::Signaled(_, signal, _)) => {
                    return Ok(LaunchOutcome::signaled(signal as i32));
                }
                Ok(_) => {}
                Err(Errno::EINTR) => {}
                Err(source) => return Err(VesselError::Launch { source }),
            }
        }
    }

    /// Kills the child and reaps it, for supervisor-side setup failures.
    ///
    /// The outcome is discarded; the caller is already on an error path
    /// and only needs the child gone before cleanup.
    pub fn kill_and_reap(self) {
        let _ = kill(self.pid, Signal::SIGKILL);
        loop {
            match waitpid(self.pid, None) {
                Ok(WaitStatus::Exited(..) | WaitStatus::Signaled(..)) => return,
                Ok(_) => {}
                Err(Errno::EINTR) => {}
                Err(_) => return,
            }
        }
    }
}

/// Translates the requested namespace set into clone flags.
#[must_use]
pub fn clone_flags(isolation: IsolationSet) -> CloneFlags {
    let mut flags = CloneFlags::empty();
    if isolation.pid {
        flags |= CloneFlags::CLONE_NEWPID;
    }
    if isolation.mount {
        flags |= CloneFlags::CLONE_NEWNS;
    }
    if isolation.user {
        flags |= CloneFlags::CLONE_NEWUSER;
    }
    flags
}

/// Creates the isolated child context and starts its setup sequence.
///
/// The child runs [`child::entry`] on its own stack; its setup failures
/// surface as reserved exit codes through [`IsolatedProcess::wait`], not
/// as errors here.
///
/// # Errors
///
/// Returns a `Launch` error if the clone syscall fails, e.g. when the
/// caller lacks the privilege to create the requested namespaces.
pub fn create_isolated_process(
    config: &LaunchConfig,
    host: &HostIdentity,
    gate: &ChildGate,
) -> Result<IsolatedProcess> {
    let mut stack = vec![0u8; CHILD_STACK_SIZE].into_boxed_slice();
    let flags = clone_flags(config.isolation());
    tracing::debug!(?flags, "creating isolated process");

    // SAFETY: the callback only uses data borrowed from this call frame,
    // and clone without CLONE_VM gives the child a copy-on-write image of
    // it, so the borrows stay valid for the child regardless of what the
    // supervisor does afterwards. The stack is freshly allocated and
    // exclusively owned by the returned handle.
    let pid = unsafe {
        clone(
            Box::new(|| child::entry(config, host, gate)),
            &mut stack,
            flags,
            Some(libc::SIGCHLD),
        )
    }
    .map_err(|source| VesselError::Launch { source })?;

    tracing::info!(pid = pid.as_raw(), "isolated process created");
    Ok(IsolatedProcess { pid, _stack: stack })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_always_include_pid_and_mount() {
        let flags = clone_flags(IsolationSet {
            pid: true,
            mount: true,
            user: false,
        });
        assert!(flags.contains(CloneFlags::CLONE_NEWPID));
        assert!(flags.contains(CloneFlags::CLONE_NEWNS));
        assert!(!flags.contains(CloneFlags::CLONE_NEWUSER));
    }

    #[test]
    fn uid_remap_requests_a_user_namespace() {
        let config = LaunchConfig::new(vec!["true".into()])
            .unwrap()
            .with_uid(1000);
        let flags = clone_flags(config.isolation());
        assert!(flags.contains(CloneFlags::CLONE_NEWUSER));
    }
}
