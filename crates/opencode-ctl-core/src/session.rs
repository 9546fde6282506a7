//! Session and status types as reported by the opencode server.
//!
//! Sessions are owned by the server; these types only carry what it sends
//! back. Fields the client does not interpret are kept in `extra` so a
//! session can be printed or forwarded unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque server-assigned session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap a server-assigned identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is empty or whitespace.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Session timestamps in epoch milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTime {
    /// Creation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    /// Last update time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<i64>,
}

/// A session as returned by `/session` endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Session identifier
    pub id: SessionId,
    /// Optional title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Parent session for forked sessions
    #[serde(
        rename = "parentID",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_id: Option<SessionId>,
    /// Timestamps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<SessionTime>,
    /// Fields not interpreted by the client
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Session {
    /// Creation time, if the server reported one.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.time
            .and_then(|t| t.created)
            .and_then(DateTime::from_timestamp_millis)
    }

    /// Last update time, if the server reported one.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.time
            .and_then(|t| t.updated)
            .and_then(DateTime::from_timestamp_millis)
    }
}

/// Per-session processing status from `/session/status`.
///
/// The server is the only authority for this value and has been seen to
/// return empty or stale maps, so callers waiting on it should have an
/// out-of-band way to verify the work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    /// Status name, e.g. `idle`, `busy`, `error`
    #[serde(alias = "type")]
    pub status: String,
}

impl SessionStatus {
    /// Status of an idle session.
    pub const IDLE: &'static str = "idle";
    /// Reported for sessions absent from the status map.
    pub const UNKNOWN: &'static str = "unknown";

    /// Create a status with the given name.
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
        }
    }

    /// Status for a session the server did not report.
    pub fn unknown() -> Self {
        Self::new(Self::UNKNOWN)
    }

    /// Whether the session has finished processing.
    pub fn is_idle(&self) -> bool {
        self.status == Self::IDLE
    }

    /// Whether the server did not report this session.
    pub fn is_unknown(&self) -> bool {
        self.status == Self::UNKNOWN
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.status)
    }
}
