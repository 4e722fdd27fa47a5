//! Parent/child rendezvous over a pipe.
//!
//! The child must not start memory-significant work before the supervisor
//! has attached it to its cgroup, so it parks on the read end of a pipe
//! right after its filesystem setup. The supervisor writes a single
//! release byte once resource setup is complete. If the supervisor dies
//! first, the pipe's write ends close and the blocked read returns zero,
//! which the child treats as an abort rather than running unconfined.

use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::unistd::{pipe2, read, write};

use vessel_common::error::{Result, VesselError};

/// A one-shot synchronization pipe, created in the supervisor before the
/// child context exists so both sides inherit their ends.
#[derive(Debug)]
pub struct Rendezvous {
    read: OwnedFd,
    write: OwnedFd,
}

impl Rendezvous {
    /// Creates the pipe.
    ///
    /// Both ends carry `O_CLOEXEC`: the descriptors must not leak into
    /// the target command's image after exec.
    ///
    /// # Errors
    ///
    /// Returns a `Setup` error if the pipe cannot be created.
    pub fn new() -> Result<Self> {
        let (read, write) = pipe2(OFlag::O_CLOEXEC).map_err(|e| VesselError::Setup {
            message: format!("failed to create rendezvous pipe: {e}"),
        })?;
        Ok(Self { read, write })
    }

    /// Splits the pipe into the supervisor-held release end and the
    /// child-held wait end.
    #[must_use]
    pub fn split(self) -> (ReleaseGate, ChildGate) {
        let peer = self.write.as_raw_fd();
        (
            ReleaseGate { fd: self.write },
            ChildGate {
                fd: self.read,
                peer,
            },
        )
    }
}

/// Supervisor side: releases the parked child exactly once.
#[derive(Debug)]
pub struct ReleaseGate {
    fd: OwnedFd,
}

impl ReleaseGate {
    /// Writes the release byte, unblocking the child's wait.
    ///
    /// # Errors
    ///
    /// Returns a `Setup` error if the write fails, which means the child
    /// is gone and its read end is closed.
    pub fn release(self) -> Result<()> {
        loop {
            match write(&self.fd, &[1u8]) {
                Ok(_) => return Ok(()),
                Err(Errno::EINTR) => {}
                Err(e) => {
                    return Err(VesselError::Setup {
                        message: format!("failed to release isolated process: {e}"),
                    });
                }
            }
        }
    }
}

/// Child side: parks until the supervisor's release byte arrives.
#[derive(Debug)]
pub struct ChildGate {
    fd: OwnedFd,
    peer: RawFd,
}

impl ChildGate {
    /// Closes the child's inherited copy of the release end.
    ///
    /// Called once, in the child context only. Without this the child
    /// holds a write end itself and a supervisor crash would leave the
    /// wait blocked forever instead of returning end-of-file.
    pub fn seal(&self) {
        // SAFETY: `peer` is the write end inherited across clone. The
        // supervisor's `OwnedFd` for it lives in a different process, so
        // closing the raw descriptor here cannot double-close anywhere.
        unsafe {
            let _ = libc::close(self.peer);
        }
    }

    /// Blocks until the release byte arrives.
    ///
    /// # Errors
    ///
    /// Returns a `Setup` error if the pipe reaches end-of-file before a
    /// byte arrives, i.e. the supervisor died during resource setup, or
    /// if the read fails outright.
    pub fn wait(&self) -> Result<()> {
        let mut buf = [0u8; 1];
        loop {
            match read(&self.fd, &mut buf) {
                Ok(0) => {
                    return Err(VesselError::Setup {
                        message: "rendezvous pipe closed before release".into(),
                    });
                }
                Ok(_) => return Ok(()),
                Err(Errno::EINTR) => {}
                Err(e) => {
                    return Err(VesselError::Setup {
                        message: format!("rendezvous wait failed: {e}"),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_unblocks_wait() {
        let (release, gate) = Rendezvous::new().unwrap().split();
        release.release().unwrap();
        gate.wait().unwrap();
    }

    #[test]
    fn dropped_release_end_is_an_abort() {
        let (release, gate) = Rendezvous::new().unwrap().split();
        drop(release);
        // Within one process the gate still holds no other write end, so
        // the read sees end-of-file immediately.
        let err = gate.wait().unwrap_err();
        assert!(matches!(err, VesselError::Setup { .. }));
    }
}
