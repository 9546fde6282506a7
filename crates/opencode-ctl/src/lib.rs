//! opencode-ctl command line library
//!
//! Argument parsing and command handlers. The binary is in main.rs.

pub mod cli;
pub mod commands;
pub mod interrupt;

// Re-export commonly used types
pub use cli::{Cli, Command};
pub use commands::{execute, run, Report};
pub use interrupt::{supervise, Supervised, INTERRUPTED_EXIT_CODE};
