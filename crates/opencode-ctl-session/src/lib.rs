//! # opencode-ctl-session
//!
//! Session operations against a supervised opencode server.
//!
//! This crate provides:
//! - The HTTP API client with restart-and-retry-once semantics
//! - The `Controller`, exposing one call per session endpoint
//! - Completion waiting with an explicit deadline and cancellation
//!
//! ## Architecture
//!
//! This is Layer 2 in the architecture - it depends on opencode-ctl-core
//! and opencode-ctl-server, and is what callers (the CLI, scripts) use.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod controller;
pub mod wait;

// Re-export commonly used types
pub use client::{ApiClient, ApiRequest};
pub use controller::{Controller, TaskOutcome, DEFAULT_MESSAGE_LIMIT};
pub use wait::{
    wait_for_completion, CancellationToken, CompletionWait, Deadline, SessionApi,
};
