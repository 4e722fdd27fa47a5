//! # vessel-core
//!
//! Low-level Linux isolation primitives for the vessel launcher.
//!
//! This crate provides safe abstractions over:
//! - **Identity**: UID/GID remapping inside a new user namespace.
//! - **Cgroups v2**: memory limiting through the unified hierarchy.
//! - **Mounts**: a private, disposable tmpfs view for the child.
//! - **Seccomp**: syscall filter construction and installation.
//!
//! All unsafe system calls are encapsulated in safe wrappers with
//! `// SAFETY:` documentation. Everything here requires a Linux kernel;
//! the identity, mount, and seccomp modules additionally run only
//! inside the child execution context, never in the supervisor.

pub mod cgroup;
pub mod identity;
pub mod mount;
pub mod seccomp;
