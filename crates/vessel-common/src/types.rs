//! Domain primitive types used across the vessel workspace.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::SIGNAL_EXIT_BASE;
use crate::error::{Result, VesselError};

/// Unique identifier for a single launch invocation.
///
/// Per-invocation resources that live in host-global namespaces (the
/// control-group directory in particular) are named after this id so
/// concurrent invocations never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LaunchId(String);

impl LaunchId {
    /// Creates a launch ID from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random launch ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LaunchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable configuration for one launch, built once from the CLI input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchConfig {
    /// Memory limit in bytes applied through the control group.
    pub memory_limit: Option<u64>,
    /// Target user id the child remaps itself to inside a new user namespace.
    pub uid: Option<u32>,
    /// Install the syscall filter in the child before exec.
    pub seccomp: bool,
    /// Deadline after which the supervisor kills the child.
    pub timeout: Option<Duration>,
    /// Command and arguments to execute; never empty.
    command: Vec<String>,
}

impl LaunchConfig {
    /// Creates a configuration for the given command.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if the command sequence is empty.
    pub fn new(command: Vec<String>) -> Result<Self> {
        if command.is_empty() {
            return Err(VesselError::Config {
                message: "no command supplied".into(),
            });
        }
        Ok(Self {
            memory_limit: None,
            uid: None,
            seccomp: false,
            timeout: None,
            command,
        })
    }

    /// Sets the memory limit in bytes.
    #[must_use]
    pub fn with_memory_limit(mut self, bytes: u64) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    /// Sets the target user id for identity remapping.
    #[must_use]
    pub fn with_uid(mut self, uid: u32) -> Self {
        self.uid = Some(uid);
        self
    }

    /// Enables syscall filter installation.
    #[must_use]
    pub fn with_seccomp(mut self, enabled: bool) -> Self {
        self.seccomp = enabled;
        self
    }

    /// Sets the launch deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the command and its arguments.
    #[must_use]
    pub fn command(&self) -> &[String] {
        &self.command
    }

    /// Derives the namespace set the child context is created with.
    #[must_use]
    pub fn isolation(&self) -> IsolationSet {
        IsolationSet {
            pid: true,
            mount: true,
            user: self.uid.is_some(),
        }
    }
}

/// The combination of namespace kinds requested for the child context.
///
/// Process-id and mount isolation are always present; user-identity
/// isolation only when a target uid was supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsolationSet {
    /// Isolate the PID namespace.
    pub pid: bool,
    /// Isolate the mount namespace.
    pub mount: bool,
    /// Isolate the user namespace.
    pub user: bool,
}

/// Terminal status of the isolated process, translated from the wait
/// outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchOutcome {
    /// Exit code to report: the child's own code, or `128 + signal`
    /// when the child was terminated by a signal.
    pub exit_code: i32,
    /// Signal that terminated the child, if any.
    pub signal: Option<i32>,
}

impl LaunchOutcome {
    /// Outcome for a child that exited on its own.
    #[must_use]
    pub fn exited(code: i32) -> Self {
        Self {
            exit_code: code,
            signal: None,
        }
    }

    /// Outcome for a child terminated by a signal (resource limit,
    /// policy violation, or deadline).
    #[must_use]
    pub fn signaled(signal: i32) -> Self {
        Self {
            exit_code: SIGNAL_EXIT_BASE + signal,
            signal: Some(signal),
        }
    }

    /// Whether the child exited normally with status 0.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}
