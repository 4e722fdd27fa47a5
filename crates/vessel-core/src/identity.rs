//! User-namespace identity remapping.
//!
//! Runs inside the child execution context, after the namespace boundary
//! has been crossed: only the child's view of identities changes, never
//! the supervisor's. The user namespace itself is requested through the
//! clone flags; this module writes the single-entry UID/GID maps and then
//! assumes the target identity. Identities left unmapped resolve to the
//! kernel overflow id inside the namespace.

use std::fs;
use std::path::Path;

use nix::unistd::{Gid, Uid, setgid, setuid};

use vessel_common::error::{Result, VesselError};

/// Host credentials captured in the supervisor before the child is
/// created; the child needs them to write its own id maps.
#[derive(Debug, Clone, Copy)]
pub struct HostIdentity {
    /// Effective uid of the supervisor on the host.
    pub uid: u32,
    /// Effective gid of the supervisor on the host.
    pub gid: u32,
}

impl HostIdentity {
    /// Captures the calling process's effective credentials.
    #[must_use]
    pub fn capture() -> Self {
        Self {
            uid: Uid::effective().as_raw(),
            gid: Gid::effective().as_raw(),
        }
    }
}

/// Establishes the child's remapped identity inside its new user namespace.
///
/// Denies `setgroups` (dropping the ability to regain supplementary
/// groups, and a precondition for writing the GID map without privilege),
/// maps exactly `target` onto the host credentials, then sets the group
/// and user identity to `target`.
///
/// # Errors
///
/// Returns a `Setup` error if any map write or identity change fails,
/// e.g. when the kernel denies the namespace operation.
pub fn establish_user_isolation(target: u32, host: &HostIdentity) -> Result<()> {
    deny_setgroups()?;
    write_id_map("uid_map", target, host.uid)?;
    write_id_map("gid_map", target, host.gid)?;

    setgid(Gid::from_raw(target)).map_err(|e| VesselError::Setup {
        message: format!("setgid({target}) failed: {e}"),
    })?;
    setuid(Uid::from_raw(target)).map_err(|e| VesselError::Setup {
        message: format!("setuid({target}) failed: {e}"),
    })?;

    tracing::debug!(target, "user identity remapped");
    Ok(())
}

fn deny_setgroups() -> Result<()> {
    let path = Path::new("/proc/self/setgroups");
    if path.exists() {
        fs::write(path, "deny").map_err(|e| VesselError::Setup {
            message: format!("failed to deny setgroups: {e}"),
        })?;
    }
    Ok(())
}

/// Writes a single-entry map: `target` inside the namespace maps to
/// `host_id` outside it.
fn write_id_map(map: &str, target: u32, host_id: u32) -> Result<()> {
    let path = format!("/proc/self/{map}");
    let entry = format!("{target} {host_id} 1");
    fs::write(&path, &entry).map_err(|e| VesselError::Setup {
        message: format!("failed to write {map} ({entry}): {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_identity_matches_process_credentials() {
        let host = HostIdentity::capture();
        assert_eq!(host.uid, Uid::effective().as_raw());
        assert_eq!(host.gid, Gid::effective().as_raw());
    }
}
