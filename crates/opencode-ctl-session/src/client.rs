//! HTTP client for the opencode REST API.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use opencode_ctl_core::{ApiFailure, ClientSettings, Error, Method, Result};
use opencode_ctl_server::ServerSupervisor;

/// One API call: method, path, query and optional JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method
    pub method: Method,
    /// Path relative to the base URL, starting with `/`
    pub path: String,
    /// Query parameters, sent verbatim and in order
    pub query: Vec<(String, String)>,
    /// JSON body
    pub body: Option<Value>,
    /// Per-call timeout; the client default applies when unset
    pub timeout: Option<Duration>,
}

impl ApiRequest {
    /// Create a request with no query, body or timeout override.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    /// GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// POST request.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    /// DELETE request.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Append a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Attach a JSON body.
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Override the timeout for this call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Blocking client for the server's REST surface.
///
/// With auto-start enabled, **any** call may launch a server process: the
/// client makes sure the server is healthy before each call, and when a call
/// fails at the transport level while the server is down it starts the
/// server and retries that call exactly once.
pub struct ApiClient {
    base_url: String,
    agent: ureq::Agent,
    supervisor: Arc<ServerSupervisor>,
    auto_start: bool,
    default_timeout: Duration,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("auto_start", &self.auto_start)
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client for the server the supervisor manages.
    pub fn new(supervisor: Arc<ServerSupervisor>, settings: &ClientSettings) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .proxy(None)
            .build()
            .into();

        Self {
            base_url: supervisor.base_url(),
            auto_start: supervisor.settings().auto_start,
            default_timeout: Duration::from_secs(settings.request_timeout_secs),
            agent,
            supervisor,
        }
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a request and return the parsed JSON body.
    ///
    /// `204 No Content` and empty bodies yield `Value::Null`.
    pub fn send(&self, request: &ApiRequest) -> Result<Value> {
        if self.auto_start {
            self.supervisor.ensure_running()?;
        }

        match self.execute(request) {
            Err(e) if e.is_transport() && self.auto_start && !self.supervisor.probe() => {
                warn!(
                    "{} {} failed ({}), restarting server and retrying once",
                    request.method, request.path, e
                );
                self.supervisor.start()?;
                self.execute(request)
            }
            result => result,
        }
    }

    /// Send a request and deserialize the response body.
    pub fn send_as<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T> {
        let value = self.send(request)?;
        serde_json::from_value(value).map_err(|e| {
            Error::api(
                request.method,
                request.path.clone(),
                ApiFailure::Decode(e.to_string()),
            )
        })
    }

    fn execute(&self, request: &ApiRequest) -> Result<Value> {
        let url = format!("{}{}", self.base_url, request.path);
        let fail = |failure: ApiFailure| Error::api(request.method, request.path.clone(), failure);
        debug!("{} {} query={:?}", request.method, request.path, request.query);

        let response = match request.method {
            Method::Get => self.prepare(self.agent.get(&url), request).call(),
            Method::Delete => self.prepare(self.agent.delete(&url), request).call(),
            Method::Post => {
                let builder = self.prepare(self.agent.post(&url), request);
                match &request.body {
                    Some(body) => {
                        let payload = serde_json::to_string(body)?;
                        builder
                            .header("Content-Type", "application/json")
                            .send(&payload)
                    }
                    None => builder.send_empty(),
                }
            }
        };

        let mut response = response.map_err(|e| fail(ApiFailure::Transport(e.to_string())))?;
        let code = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| fail(ApiFailure::Transport(e.to_string())))?;

        if !(200..300).contains(&code) {
            debug!("{} {} returned {}", request.method, request.path, code);
            return Err(fail(ApiFailure::Status { code, body }));
        }
        if code == 204 || body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| fail(ApiFailure::Decode(e.to_string())))
    }

    fn prepare<B>(
        &self,
        builder: ureq::RequestBuilder<B>,
        request: &ApiRequest,
    ) -> ureq::RequestBuilder<B> {
        let timeout = request.timeout.unwrap_or(self.default_timeout);
        let mut builder = builder.header("Accept", "application/json");
        for (key, value) in &request.query {
            builder = builder.query(key, value);
        }
        builder.config().timeout_global(Some(timeout)).build()
    }
}
