//! # opencode-ctl-core
//!
//! Core types for driving an opencode server.
//!
//! This crate has **no internal dependencies** on other opencode-ctl crates.
//! It provides:
//!
//! - Configuration (`ControllerConfig` and its sections)
//! - Error types
//! - Wire types for sessions, messages and statuses
//! - Request bodies for the session endpoints
//! - Command interpreter selection for launching the server
//!
//! ## Architecture
//!
//! This is Layer 0 - the server supervisor and session crates depend on it,
//! but it depends on neither.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod message;
pub mod platform;
pub mod request;
pub mod session;

// Re-export commonly used types
pub use config::{
    ClientSettings, CompletionSettings, ControllerConfig, LoggingSettings, ServerSettings,
};
pub use error::{ApiFailure, Error, Result};
pub use message::{last_assistant_text, Message, MessageInfo, Part};
pub use platform::Platform;
pub use request::{CreateSessionRequest, Method, ModelRef, PartInput, PromptRequest, SendOptions};
pub use session::{Session, SessionId, SessionStatus, SessionTime};
