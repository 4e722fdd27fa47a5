//! # vessel-common
//!
//! Shared error types, domain types, and constants for the vessel
//! workspace: the launch configuration, the isolation set derived from
//! it, per-invocation identifiers, and the outcome reported after the
//! isolated process terminates.

pub mod constants;
pub mod error;
pub mod types;
