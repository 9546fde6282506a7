//! Error types for opencode-ctl.

use thiserror::Error;

use crate::request::Method;

/// Main error type for opencode-ctl operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Server executable is not on the command search path
    #[error("Executable not found: {0}")]
    ExecutableNotFound(String),

    /// Server never answered the health probe within the startup window
    #[error("Server at {url} not healthy after {timeout_secs}s")]
    StartupTimeout {
        /// Base URL that was probed
        url: String,
        /// Startup window in seconds
        timeout_secs: u64,
    },

    /// Launched server process exited before becoming healthy
    #[error("Server process exited during startup: {0}")]
    ServerExited(String),

    /// HTTP call failed after the automatic retry
    #[error("API error: {method} {path}: {failure}")]
    Api {
        /// HTTP method of the failed call
        method: Method,
        /// Request path relative to the base URL
        path: String,
        /// What went wrong
        failure: ApiFailure,
    },

    /// Session never reported idle before the deadline
    #[error("Session {session_id} did not complete within {timeout_ms}ms")]
    CompletionTimeout {
        /// Session being waited on
        session_id: String,
        /// Deadline in milliseconds
        timeout_ms: u64,
    },

    /// Wait was cancelled by the caller
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid input or parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with custom message
    #[error("{0}")]
    Other(String),
}

/// Failure detail carried by [`Error::Api`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiFailure {
    /// Connection refused, timed out or otherwise never got a response
    #[error("transport failure: {0}")]
    Transport(String),

    /// Server answered with a non-success status
    #[error("HTTP {code}: {body}")]
    Status {
        /// HTTP status code
        code: u16,
        /// Response body, possibly empty
        body: String,
    },

    /// Response body was not valid JSON or had an unexpected shape
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl Error {
    /// Build an [`Error::Api`].
    pub fn api(method: Method, path: impl Into<String>, failure: ApiFailure) -> Self {
        Error::Api {
            method,
            path: path.into(),
            failure,
        }
    }

    /// HTTP status code of an API error, if the server answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Api {
                failure: ApiFailure::Status { code, .. },
                ..
            } => Some(*code),
            _ => None,
        }
    }

    /// Whether this is an API error for a resource the server does not know.
    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }

    /// Whether this is an API error where no response was received.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Api {
                failure: ApiFailure::Transport(_),
                ..
            }
        )
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
