//! Request bodies for the session endpoints.
//!
//! Each endpoint gets an explicit struct whose optional fields are skipped
//! when unset, so bodies are built the same way everywhere.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::{Error, Result, SessionId};

/// HTTP method used by the API client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// DELETE
    Delete,
}

impl Method {
    /// Method name as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `POST /session`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    /// Session title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Parent session for forked sessions
    #[serde(rename = "parentID", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<SessionId>,
}

/// Input part of a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartInput {
    /// Part type
    #[serde(rename = "type")]
    pub kind: String,
    /// Text payload
    pub text: String,
}

impl PartInput {
    /// Build a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            text: text.into(),
        }
    }
}

/// Model selection, written `provider/model` on the command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRef {
    /// Provider identifier
    #[serde(rename = "providerID")]
    pub provider_id: String,
    /// Model identifier within the provider
    #[serde(rename = "modelID")]
    pub model_id: String,
}

impl FromStr for ModelRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((provider, model)) if !provider.is_empty() && !model.is_empty() => Ok(Self {
                provider_id: provider.to_string(),
                model_id: model.to_string(),
            }),
            _ => Err(Error::InvalidInput(format!(
                "model must be written provider/model, got '{s}'"
            ))),
        }
    }
}

/// Caller options for sending a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Agent that should handle the message. The server silently ignores
    /// messages without one.
    pub agent: Option<String>,
    /// Model as `provider/model`
    pub model: Option<String>,
    /// Record the message without asking for a reply
    pub no_reply: bool,
}

impl SendOptions {
    /// Options with no agent, model or flags.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the agent.
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    /// Set the model (`provider/model`).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the no-reply flag.
    pub fn with_no_reply(mut self, no_reply: bool) -> Self {
        self.no_reply = no_reply;
        self
    }
}

/// Body of `POST /session/{id}/message` and `POST /session/{id}/prompt_async`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptRequest {
    /// Message parts
    pub parts: Vec<PartInput>,
    /// Handling agent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    /// Model override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelRef>,
    /// Only record the message
    #[serde(rename = "noReply", skip_serializing_if = "Option::is_none")]
    pub no_reply: Option<bool>,
}

impl PromptRequest {
    /// Build a single-text-part prompt from caller options.
    ///
    /// Fails on empty text or a malformed model reference.
    pub fn new(text: &str, options: &SendOptions) -> Result<Self> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput(
                "message text cannot be empty".to_string(),
            ));
        }
        let model = options.model.as_deref().map(ModelRef::from_str).transpose()?;

        Ok(Self {
            parts: vec![PartInput::text(text)],
            agent: options.agent.clone(),
            model,
            no_reply: options.no_reply.then_some(true),
        })
    }
}
