//! Child-side setup sequence, from first instruction to exec.
//!
//! Everything here runs inside the new namespaces, in the copied image of
//! the supervisor. Failures cannot cross the process boundary as error
//! values; each step maps to a reserved exit code and prints one line to
//! the inherited stderr. Ordering is load-bearing: identity first (it
//! needs the pre-clone host credentials), filesystem second, then the
//! rendezvous park, and the syscall filter last so filter rules cannot
//! break the setup steps themselves, only the target command.

use std::ffi::CString;

use nix::errno::Errno;
use nix::unistd::execvp;

use vessel_common::constants::{
    BIN_NAME, EXIT_EXEC_FAILED, EXIT_EXEC_NOT_FOUND, EXIT_FILESYSTEM, EXIT_IDENTITY, EXIT_POLICY,
    EXIT_RENDEZVOUS,
};
use vessel_common::error::VesselError;
use vessel_common::types::LaunchConfig;
use vessel_core::identity::{self, HostIdentity};
use vessel_core::mount;
use vessel_core::seccomp::SyscallPolicy;

use crate::rendezvous::ChildGate;

/// Entry point for the cloned child. Never returns on success.
pub(crate) fn entry(config: &LaunchConfig, host: &HostIdentity, gate: &ChildGate) -> isize {
    gate.seal();

    if let Some(uid) = config.uid {
        if let Err(e) = identity::establish_user_isolation(uid, host) {
            eprintln!("{BIN_NAME}: {e}");
            return EXIT_IDENTITY as isize;
        }
    }

    if let Err(e) = mount::isolate_mount_view() {
        eprintln!("{BIN_NAME}: {e}");
        return EXIT_FILESYSTEM as isize;
    }

    if let Err(e) = gate.wait() {
        eprintln!("{BIN_NAME}: {e}");
        return EXIT_RENDEZVOUS as isize;
    }

    if config.seccomp {
        if let Err(e) = SyscallPolicy::default_deny().install() {
            eprintln!("{BIN_NAME}: {e}");
            return EXIT_POLICY as isize;
        }
    }

    let err = exec(config.command());
    eprintln!("{BIN_NAME}: {err}");
    match err {
        VesselError::Exec {
            source: Errno::ENOENT,
        } => EXIT_EXEC_NOT_FOUND as isize,
        _ => EXIT_EXEC_FAILED as isize,
    }
}

/// Replaces the child's image with the target command. Only returns on
/// failure, with the reason.
fn exec(command: &[String]) -> VesselError {
    let argv: Vec<CString> = match command
        .iter()
        .map(|arg| CString::new(arg.as_str()))
        .collect::<std::result::Result<_, _>>()
    {
        Ok(argv) => argv,
        // Interior NUL in an argument; the kernel could never receive it.
        Err(_) => {
            return VesselError::Exec {
                source: Errno::EINVAL,
            };
        }
    };
    let Some(program) = argv.first() else {
        return VesselError::Exec {
            source: Errno::EINVAL,
        };
    };

    match execvp(program, &argv) {
        Ok(never) => match never {},
        Err(source) => VesselError::Exec { source },
    }
}
