//! Controller: one call per session endpoint.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use opencode_ctl_core::{
    ApiFailure, ControllerConfig, CreateSessionRequest, Error, Message, PromptRequest, Result,
    SendOptions, Session, SessionId, SessionStatus,
};
use opencode_ctl_server::{ServerLauncher, ServerSupervisor};

use crate::client::{ApiClient, ApiRequest};
use crate::wait::{self, CompletionWait, SessionApi};

/// Messages returned by [`Controller::messages`] when the caller has no preference.
pub const DEFAULT_MESSAGE_LIMIT: usize = 50;

/// Characters of the prompt used as the title of a task session.
const TASK_TITLE_CHARS: usize = 50;

/// Result of [`Controller::run_task`].
#[derive(Debug, Clone, PartialEq)]
pub struct TaskOutcome {
    /// Session the task ran in
    pub session: Session,
    /// Text of the final assistant reply, empty if there was none
    pub output: String,
}

/// Controls an opencode server and the sessions on it.
///
/// Construction validates the configuration, creates the working directory
/// and, with `server.auto_start`, starts the server if it is not already
/// healthy. Dropping the controller stops a server it started unless
/// `server.keep_alive` is set or the server was detached.
#[derive(Debug)]
pub struct Controller {
    config: ControllerConfig,
    supervisor: Arc<ServerSupervisor>,
    client: ApiClient,
}

impl Controller {
    /// Create a controller that launches the server through the platform shell.
    pub fn new(config: ControllerConfig) -> Result<Self> {
        config.validate()?;
        let supervisor = ServerSupervisor::new(config.server.clone());
        Self::build(config, supervisor)
    }

    /// Create a controller with a custom server launcher.
    pub fn with_launcher(
        config: ControllerConfig,
        launcher: Box<dyn ServerLauncher>,
    ) -> Result<Self> {
        config.validate()?;
        let supervisor = ServerSupervisor::with_launcher(config.server.clone(), launcher);
        Self::build(config, supervisor)
    }

    fn build(config: ControllerConfig, supervisor: ServerSupervisor) -> Result<Self> {
        std::fs::create_dir_all(&config.server.working_dir)?;

        let supervisor = Arc::new(supervisor);
        let client = ApiClient::new(Arc::clone(&supervisor), &config.client);

        if config.server.auto_start {
            supervisor.ensure_running()?;
        }

        debug!("Controller ready at {}", supervisor.base_url());
        Ok(Self {
            config,
            supervisor,
            client,
        })
    }

    /// Configuration in use.
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Base URL of the server.
    pub fn base_url(&self) -> String {
        self.supervisor.base_url()
    }

    /// Underlying API client.
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Whether the server answers its health endpoint.
    pub fn is_server_running(&self) -> bool {
        self.supervisor.probe()
    }

    /// Start the server unless it is already healthy.
    pub fn start_server(&self) -> Result<()> {
        self.supervisor.start()
    }

    /// Stop the server if this controller started it.
    pub fn stop_server(&self) -> bool {
        self.supervisor.stop()
    }

    /// Leave a server this controller started running after it is dropped.
    pub fn detach_server(&self) -> Option<u32> {
        self.supervisor.detach()
    }

    /// PID of the server process this controller started, if any.
    pub fn server_pid(&self) -> Option<u32> {
        self.supervisor.pid()
    }

    /// Completion wait parameters from the configuration.
    pub fn completion_wait(&self) -> CompletionWait {
        CompletionWait::from_settings(&self.config.completion)
    }

    /// Create a session.
    pub fn create_session(
        &self,
        title: Option<&str>,
        parent_id: Option<&SessionId>,
    ) -> Result<Session> {
        if let Some(parent) = parent_id {
            check_id(parent)?;
        }
        let body = CreateSessionRequest {
            title: title.map(str::to_string),
            parent_id: parent_id.cloned(),
        };
        let session: Session = self
            .client
            .send_as(&ApiRequest::post("/session").json(&body)?)?;
        info!("Created session {}", session.id);
        Ok(session)
    }

    /// Fetch one session.
    pub fn get_session(&self, session_id: &SessionId) -> Result<Session> {
        self.client
            .send_as(&ApiRequest::get(session_path(session_id, "")?))
    }

    /// List all sessions.
    pub fn list_sessions(&self) -> Result<Vec<Session>> {
        let sessions: Option<Vec<Session>> = self.client.send_as(&ApiRequest::get("/session"))?;
        Ok(sessions.unwrap_or_default())
    }

    /// Delete a session.
    ///
    /// Returns the server's acknowledgement; any non-boolean reply counts as
    /// deleted.
    pub fn delete_session(&self, session_id: &SessionId) -> Result<bool> {
        let value = self
            .client
            .send(&ApiRequest::delete(session_path(session_id, "")?))?;
        info!("Deleted session {}", session_id);
        Ok(acknowledged(&value))
    }

    /// Status of every session the server knows about.
    pub fn status_map(&self) -> Result<BTreeMap<SessionId, SessionStatus>> {
        let map: Option<BTreeMap<SessionId, SessionStatus>> = self
            .client
            .send_as(&ApiRequest::get("/session/status"))?;
        Ok(map.unwrap_or_default())
    }

    /// Status of one session; `unknown` when the server does not report it.
    pub fn session_status(&self, session_id: &SessionId) -> Result<SessionStatus> {
        check_id(session_id)?;
        Ok(self
            .status_map()?
            .remove(session_id)
            .unwrap_or_else(SessionStatus::unknown))
    }

    /// Whether the session is idle.
    pub fn is_session_idle(&self, session_id: &SessionId) -> Result<bool> {
        Ok(self.session_status(session_id)?.is_idle())
    }

    /// Send a message and wait for the assistant's response.
    pub fn send_message(
        &self,
        session_id: &SessionId,
        text: &str,
        options: &SendOptions,
    ) -> Result<Message> {
        let request = self
            .prompt(session_id, "message", text, options)?
            .timeout(Duration::from_secs(self.config.client.message_timeout_secs));
        self.client.send_as(&request)
    }

    /// Queue a message without waiting for it to be processed.
    ///
    /// Best effort: transport and server failures, timeouts included, are
    /// logged and dropped. Only invalid input is reported.
    pub fn send_message_async(
        &self,
        session_id: &SessionId,
        text: &str,
        options: &SendOptions,
    ) -> Result<()> {
        let request = self
            .prompt(session_id, "prompt_async", text, options)?
            .timeout(Duration::from_secs(self.config.client.async_timeout_secs));

        match self.client.send(&request) {
            Ok(_) => debug!("Queued message for session {}", session_id),
            Err(e) => warn!("Async send to session {} failed: {}", session_id, e),
        }
        Ok(())
    }

    /// Most recent messages of a session, in server order.
    pub fn messages(&self, session_id: &SessionId, limit: usize) -> Result<Vec<Message>> {
        let request = ApiRequest::get(session_path(session_id, "message")?).query("limit", limit);
        let value = self.client.send(&request)?;
        if !value.is_array() {
            debug!("Message listing for {} was not a list", session_id);
            return Ok(Vec::new());
        }
        serde_json::from_value(value).map_err(|e| {
            Error::api(
                request.method,
                request.path.clone(),
                ApiFailure::Decode(e.to_string()),
            )
        })
    }

    /// File changes made in a session, optionally for one message.
    pub fn diff(&self, session_id: &SessionId, message_id: Option<&str>) -> Result<Value> {
        let mut request = ApiRequest::get(session_path(session_id, "diff")?);
        if let Some(message_id) = message_id {
            request = request.query("messageID", message_id);
        }
        let value = self.client.send(&request)?;
        Ok(if value.is_null() {
            Value::Array(Vec::new())
        } else {
            value
        })
    }

    /// Abort whatever the session is doing.
    pub fn abort_session(&self, session_id: &SessionId) -> Result<bool> {
        let value = self
            .client
            .send(&ApiRequest::post(session_path(session_id, "abort")?))?;
        info!("Aborted session {}", session_id);
        Ok(acknowledged(&value))
    }

    /// Share a session, returning it with its share information.
    pub fn share_session(&self, session_id: &SessionId) -> Result<Session> {
        self.client
            .send_as(&ApiRequest::post(session_path(session_id, "share")?))
    }

    /// Poll until the session is idle and return the last assistant text.
    pub fn wait_for_completion(
        &self,
        session_id: &SessionId,
        wait: &CompletionWait,
    ) -> Result<String> {
        check_id(session_id)?;
        wait::wait_for_completion(self, session_id, wait)
    }

    /// Run a prompt in a fresh session and wait for the result.
    ///
    /// The session is titled with the start of the prompt and kept on the
    /// server afterwards.
    pub fn run_task(
        &self,
        text: &str,
        options: &SendOptions,
        wait: &CompletionWait,
    ) -> Result<TaskOutcome> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("task text cannot be empty".to_string()));
        }

        let title: String = text.chars().take(TASK_TITLE_CHARS).collect();
        let session = self.create_session(Some(&title), None)?;
        self.send_message_async(&session.id, text, options)?;
        let output = self.wait_for_completion(&session.id, wait)?;

        Ok(TaskOutcome { session, output })
    }

    fn prompt(
        &self,
        session_id: &SessionId,
        endpoint: &str,
        text: &str,
        options: &SendOptions,
    ) -> Result<ApiRequest> {
        let path = session_path(session_id, endpoint)?;

        let mut options = options.clone();
        if options.agent.is_none() {
            options.agent = self.config.client.default_agent.clone();
        }
        if options.agent.is_none() {
            warn!(
                "Sending to session {} without an agent; the server may ignore the message",
                session_id
            );
        }

        let body = PromptRequest::new(text, &options)?;
        ApiRequest::post(path).json(&body)
    }
}

impl SessionApi for Controller {
    fn session_status(&self, session_id: &SessionId) -> Result<SessionStatus> {
        Controller::session_status(self, session_id)
    }

    fn messages(&self, session_id: &SessionId, limit: usize) -> Result<Vec<Message>> {
        Controller::messages(self, session_id, limit)
    }
}

/// Reject ids that are empty or would change the request path.
fn check_id(session_id: &SessionId) -> Result<()> {
    let id = session_id.as_str();
    if session_id.is_blank() {
        return Err(Error::InvalidInput("session id cannot be empty".to_string()));
    }
    if id.chars().any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#')) {
        return Err(Error::InvalidInput(format!("invalid session id '{id}'")));
    }
    Ok(())
}

fn session_path(session_id: &SessionId, endpoint: &str) -> Result<String> {
    check_id(session_id)?;
    Ok(if endpoint.is_empty() {
        format!("/session/{session_id}")
    } else {
        format!("/session/{session_id}/{endpoint}")
    })
}

fn acknowledged(value: &Value) -> bool {
    value.as_bool().unwrap_or(true)
}
