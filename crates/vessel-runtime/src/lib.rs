//! # vessel-runtime
//!
//! Lifecycle management for one isolated launch: creating the child
//! execution context with `clone(2)`, sequencing the child-side setup
//! (identity, mounts, rendezvous, syscall policy, exec), supervising the
//! launch from the parent side, and translating the wait outcome into an
//! exit status.

mod child;
pub mod launcher;
pub mod rendezvous;
pub mod supervisor;
