//! Unified error types for the vessel workspace.
//!
//! Every setup-phase failure is fatal and unretried: kernel-level resource
//! setup is not treated as transient within a single invocation. Failures
//! inside the isolated child never surface as these variants in the
//! supervisor; they cross the process boundary only as reserved exit codes
//! (see [`crate::constants`]).

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum VesselError {
    /// The launch configuration is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// Identity establishment or supervisor-side setup failed.
    #[error("setup failed: {message}")]
    Setup {
        /// Description of the failed setup operation.
        message: String,
    },

    /// Creation of the isolated child process failed.
    #[error("failed to create isolated process: {source}")]
    Launch {
        /// Underlying OS failure code.
        #[source]
        source: nix::Error,
    },

    /// Building or installing the syscall filter failed.
    #[error("syscall policy error: {message}")]
    Policy {
        /// Description of the failed filter operation.
        message: String,
    },

    /// A control-group create, configure, or attach operation failed.
    #[error("cgroup error at {path}: {message}")]
    Resource {
        /// Cgroup path where the operation failed.
        path: PathBuf,
        /// Description of the failed operation.
        message: String,
    },

    /// Establishing the private mount view failed.
    #[error("mount isolation failed: {message}")]
    Filesystem {
        /// Description of the failed mount operation.
        message: String,
    },

    /// The target command could not replace the child's program image.
    #[error("cannot execute command: {source}")]
    Exec {
        /// Underlying OS failure code.
        #[source]
        source: nix::Error,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, VesselError>;
