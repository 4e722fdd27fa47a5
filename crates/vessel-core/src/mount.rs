//! Private mount view for the isolated child.
//!
//! Runs once, first, inside the new mount namespace: stops mount
//! propagation back to the host, then mounts a disposable tmpfs at the
//! fixed mount point so the child gets its own view of that path.

use nix::mount::{MsFlags, mount};

use vessel_common::constants::{PRIVATE_MOUNT_OPTIONS, PRIVATE_MOUNT_POINT};
use vessel_common::error::{Result, VesselError};

/// Establishes the child's private filesystem view.
///
/// # Errors
///
/// Returns a `Filesystem` error if either mount syscall fails. In the
/// child this is fatal to the child only; the supervisor observes it
/// through the wait outcome.
pub fn isolate_mount_view() -> Result<()> {
    // Without this, the tmpfs below would propagate to the host mount
    // table on shared-subtree systems.
    mount(
        None::<&str>,
        "/",
        None::<&str>,
        MsFlags::MS_PRIVATE | MsFlags::MS_REC,
        None::<&str>,
    )
    .map_err(|e| VesselError::Filesystem {
        message: format!("failed to make mount table private: {e}"),
    })?;

    mount(
        Some("tmpfs"),
        PRIVATE_MOUNT_POINT,
        Some("tmpfs"),
        MsFlags::MS_NOSUID | MsFlags::MS_NODEV,
        Some(PRIVATE_MOUNT_OPTIONS),
    )
    .map_err(|e| VesselError::Filesystem {
        message: format!("failed to mount tmpfs at {PRIVATE_MOUNT_POINT}: {e}"),
    })?;

    tracing::debug!(mount_point = PRIVATE_MOUNT_POINT, "private mount view established");
    Ok(())
}
