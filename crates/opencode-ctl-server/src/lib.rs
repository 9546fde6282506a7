//! # opencode-ctl-server
//!
//! Supervision of a local opencode server process.
//!
//! This crate provides:
//! - A side-effect free health probe
//! - Launching the server through the platform command interpreter
//! - Waiting for a launched server to become healthy
//! - Stopping only the servers it launched
//!
//! ## Architecture
//!
//! This is Layer 1 in the architecture - it depends on opencode-ctl-core
//! and is driven by the session crate when a server is unreachable.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod launcher;
pub mod probe;
pub mod supervisor;

// Re-export commonly used types
pub use launcher::{ChildProcess, LaunchSpec, ServerLauncher, ServerProcess, ShellLauncher};
pub use probe::HealthProbe;
pub use supervisor::ServerSupervisor;
