//! Launch supervision from the parent side.
//!
//! One call to [`run`] performs one complete launch: create the
//! rendezvous, clone the isolated child, attach it to a freshly created
//! memory cgroup while it is parked, release it, wait for it to
//! terminate, and clean up. The child is never left running unconfined:
//! any supervisor-side setup failure after the clone kills and reaps it
//! before the error is returned.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

use vessel_common::error::Result;
use vessel_common::types::{LaunchConfig, LaunchId, LaunchOutcome};
use vessel_core::cgroup::MemoryCgroup;
use vessel_core::identity::HostIdentity;

use crate::launcher;
use crate::rendezvous::Rendezvous;

/// Runs one launch to completion.
///
/// Returns the child's terminal status. Reserved exit codes in the
/// outcome indicate child-side setup failures; see
/// [`vessel_common::constants::describe_child_failure`].
///
/// # Errors
///
/// Returns an error if any supervisor-side step fails: pipe or clone
/// creation, cgroup setup, or the final wait. On every such path the
/// child has already been killed and reaped.
pub fn run(config: &LaunchConfig) -> Result<LaunchOutcome> {
    tracing::info!(command = ?config.command(), "starting launch");

    let host = HostIdentity::capture();
    let (release, gate) = Rendezvous::new()?.split();
    let child = launcher::create_isolated_process(config, &host, &gate)?;
    // The child sealed its copy of the release end; this drops the
    // supervisor's copy of the wait end.
    drop(gate);

    let cgroup = match configure_resources(config, child.pid()) {
        Ok(cgroup) => cgroup,
        Err(e) => {
            child.kill_and_reap();
            return Err(e);
        }
    };

    if let Err(e) = release.release() {
        // The write only fails once every read end is closed, which
        // means the child already died during its own setup. Fall
        // through to the wait: the exit status carries the reserved
        // code for the step that failed.
        tracing::debug!(error = %e, "isolated process exited before release");
    }

    let deadline = config.timeout.map(|t| arm_deadline(child.pid(), t));

    let outcome = child.wait();
    if let Some(deadline) = &deadline {
        deadline.disarm();
    }
    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            remove_cgroup(cgroup);
            return Err(e);
        }
    };

    remove_cgroup(cgroup);
    tracing::info!(
        exit_code = outcome.exit_code,
        signal = ?outcome.signal,
        "launch complete"
    );
    Ok(outcome)
}

/// Creates, configures, and attaches the child to its memory cgroup, or
/// does nothing when no limit was requested.
///
/// A partially configured cgroup is removed before the error propagates.
fn configure_resources(config: &LaunchConfig, pid: Pid) -> Result<Option<MemoryCgroup>> {
    let Some(bytes) = config.memory_limit else {
        return Ok(None);
    };

    let launch_id = LaunchId::generate();
    let cgroup = MemoryCgroup::create(launch_id.as_str())?;
    let configured = cgroup
        .set_memory_limit(bytes)
        .and_then(|()| cgroup.attach(pid.as_raw().unsigned_abs()));
    if let Err(e) = configured {
        remove_cgroup(Some(cgroup));
        return Err(e);
    }
    Ok(Some(cgroup))
}

/// Removes the cgroup if one exists. Removal failure after the launch is
/// over does not change the outcome; it is logged and swallowed.
fn remove_cgroup(cgroup: Option<MemoryCgroup>) {
    if let Some(cgroup) = cgroup {
        let path = cgroup.path().to_path_buf();
        if let Err(e) = cgroup.remove() {
            tracing::warn!(path = %path.display(), error = %e, "cgroup removal failed");
        }
    }
}

/// A deadline armed on the running child.
///
/// The timer thread holds the lock while it decides to kill, and
/// [`Deadline::disarm`] marks the child reaped under the same lock, so
/// no kill can be issued once `disarm` has returned. Disarming also
/// wakes the timer immediately instead of letting it sleep out the
/// remainder of the timeout.
#[derive(Debug)]
struct Deadline {
    state: Arc<(Mutex<bool>, Condvar)>,
}

impl Deadline {
    fn disarm(&self) {
        let (reaped, timer) = &*self.state;
        match reaped.lock() {
            Ok(mut reaped) => *reaped = true,
            Err(poisoned) => *poisoned.into_inner() = true,
        }
        timer.notify_all();
    }
}

fn arm_deadline(pid: Pid, timeout: Duration) -> Deadline {
    let state = Arc::new((Mutex::new(false), Condvar::new()));
    let observed = Arc::clone(&state);
    let raw = pid.as_raw();
    let builder = std::thread::Builder::new().name("vessel-deadline".into());
    let spawned = builder.spawn(move || {
        let (reaped, timer) = &*observed;
        let Ok(guard) = reaped.lock() else { return };
        let Ok((reaped, wait)) = timer.wait_timeout_while(guard, timeout, |reaped| !*reaped)
        else {
            return;
        };
        if wait.timed_out() && !*reaped {
            tracing::warn!(
                pid = raw,
                timeout_secs = timeout.as_secs(),
                "deadline expired, killing isolated process"
            );
            let _ = kill(Pid::from_raw(raw), Signal::SIGKILL);
        }
    });
    if let Err(e) = spawned {
        tracing::warn!(error = %e, "failed to arm deadline thread");
    }
    Deadline { state }
}
