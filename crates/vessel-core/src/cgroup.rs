//! Cgroups v2 memory resource control.
//!
//! Creates per-launch cgroups under the unified hierarchy at
//! `/sys/fs/cgroup/vessel/<launch-id>`, writes `memory.max`, and attaches
//! the isolated process by pid. Each invocation owns a uniquely named
//! directory, so concurrent invocations operate on disjoint host-global
//! state and need no locking.

use std::path::{Path, PathBuf};

use vessel_common::constants::{CGROUP_SUBTREE, CGROUP_V2_PATH};
use vessel_common::error::{Result, VesselError};

/// Handle to one launch's memory cgroup.
///
/// Owns the obligation to configure the limit, attach the child, and
/// remove the directory once the launch is over. The supervisor removes
/// it on both success and failure paths.
#[derive(Debug)]
pub struct MemoryCgroup {
    path: PathBuf,
}

impl MemoryCgroup {
    /// Creates a uniquely named cgroup for the given launch id.
    ///
    /// The host must have the unified hierarchy mounted with the memory
    /// controller available; its absence is a fatal setup error, not a
    /// retryable condition.
    ///
    /// # Errors
    ///
    /// Returns a `Resource` error if the hierarchy or the memory
    /// controller is missing, or if the directory cannot be created.
    pub fn create(launch_id: &str) -> Result<Self> {
        ensure_memory_controller()?;

        let subtree = Path::new(CGROUP_V2_PATH).join(CGROUP_SUBTREE);
        std::fs::create_dir_all(&subtree).map_err(|e| VesselError::Resource {
            path: subtree.clone(),
            message: format!("failed to create cgroup subtree: {e}"),
        })?;
        // Delegate the memory controller to the per-launch children. The
        // write fails with EBUSY while a previous launch is still attached
        // directly to the subtree, which never happens: processes are only
        // ever attached to leaf cgroups.
        let control = subtree.join("cgroup.subtree_control");
        if let Err(e) = std::fs::write(&control, "+memory") {
            tracing::debug!(path = %control.display(), error = %e, "subtree delegation write failed");
        }

        let path = subtree.join(launch_id);
        std::fs::create_dir_all(&path).map_err(|e| VesselError::Resource {
            path: path.clone(),
            message: format!("failed to create cgroup: {e}"),
        })?;
        tracing::info!(path = %path.display(), "cgroup created");
        Ok(Self { path })
    }

    /// Sets the hard memory limit for this cgroup.
    ///
    /// Also pins `memory.swap.max` to zero where swap accounting exists,
    /// so the workload cannot escape the bound by swapping.
    ///
    /// # Errors
    ///
    /// Returns a `Resource` error if writing to `memory.max` fails.
    pub fn set_memory_limit(&self, bytes: u64) -> Result<()> {
        self.write_control("memory.max", &bytes.to_string())?;
        if self.path.join("memory.swap.max").exists() {
            self.write_control("memory.swap.max", "0")?;
        }
        tracing::debug!(bytes, "memory limit set");
        Ok(())
    }

    /// Adds a process to this cgroup by writing its pid.
    ///
    /// For the limit to bound the process for its entire lifetime,
    /// attachment must complete before the process starts memory-
    /// significant work; the supervisor guarantees this by holding the
    /// child at the rendezvous until attachment is confirmed.
    ///
    /// # Errors
    ///
    /// Returns a `Resource` error if writing to `cgroup.procs` fails,
    /// e.g. because the process no longer exists.
    pub fn attach(&self, pid: u32) -> Result<()> {
        self.write_control("cgroup.procs", &pid.to_string())?;
        tracing::debug!(pid, path = %self.path.display(), "process attached to cgroup");
        Ok(())
    }

    /// Removes the cgroup directory.
    ///
    /// Valid only once the attached process has been reaped; a cgroup
    /// with members cannot be removed.
    ///
    /// # Errors
    ///
    /// Returns a `Resource` error if the directory cannot be removed.
    pub fn remove(self) -> Result<()> {
        std::fs::remove_dir(&self.path).map_err(|e| VesselError::Resource {
            path: self.path.clone(),
            message: format!("failed to remove cgroup: {e}"),
        })?;
        tracing::info!(path = %self.path.display(), "cgroup removed");
        Ok(())
    }

    /// Returns the cgroup directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_control(&self, file: &str, value: &str) -> Result<()> {
        let path = self.path.join(file);
        std::fs::write(&path, value).map_err(|e| VesselError::Resource {
            path,
            message: format!("failed to write {value}: {e}"),
        })
    }
}

/// Verifies that the unified hierarchy is mounted and advertises the
/// memory controller.
fn ensure_memory_controller() -> Result<()> {
    let controllers = Path::new(CGROUP_V2_PATH).join("cgroup.controllers");
    let available = std::fs::read_to_string(&controllers).map_err(|e| VesselError::Resource {
        path: controllers.clone(),
        message: format!("cgroup v2 hierarchy not mounted: {e}"),
    })?;
    if !available.split_whitespace().any(|c| c == "memory") {
        return Err(VesselError::Resource {
            path: controllers,
            message: "memory controller not available".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cgroup_path_is_per_launch() {
        let a = Path::new(CGROUP_V2_PATH).join(CGROUP_SUBTREE).join("id-a");
        let b = Path::new(CGROUP_V2_PATH).join(CGROUP_SUBTREE).join("id-b");
        assert_ne!(a, b);
        assert!(a.starts_with("/sys/fs/cgroup/vessel"));
    }

    #[test]
    fn missing_hierarchy_is_a_resource_error() {
        // Only meaningful on hosts without cgroup v2; on a normal Linux
        // host the check passes instead.
        match ensure_memory_controller() {
            Ok(()) => {}
            Err(VesselError::Resource { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
}
