//! Health probe against `/global/health`.

use std::time::Duration;

use tracing::trace;

/// Path of the server's liveness endpoint.
pub const HEALTH_PATH: &str = "/global/health";

/// Liveness check for an opencode server.
///
/// Probing never mutates supervisor state and never starts anything; any
/// transport failure is reported as "not healthy".
#[derive(Clone)]
pub struct HealthProbe {
    url: String,
    agent: ureq::Agent,
}

impl std::fmt::Debug for HealthProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthProbe")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl HealthProbe {
    /// Create a probe for the server at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .proxy(None)
            .build()
            .into();

        Self {
            url: format!("{}{}", base_url.trim_end_matches('/'), HEALTH_PATH),
            agent,
        }
    }

    /// Full URL being probed.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns true only if the server answered with a success status.
    pub fn check(&self) -> bool {
        match self.agent.get(&self.url).call() {
            Ok(response) => {
                let healthy = response.status().is_success();
                trace!("Health probe {}: status {}", self.url, response.status());
                healthy
            }
            Err(e) => {
                trace!("Health probe {} failed: {}", self.url, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn test_probe_url() {
        let probe = HealthProbe::new("http://127.0.0.1:4096/", Duration::from_secs(2));
        assert_eq!(probe.url(), "http://127.0.0.1:4096/global/health");
    }

    #[test]
    fn test_probe_healthy() {
        let server = MockServer::start();
        let health = server.mock(|when, then| {
            when.method(GET).path("/global/health");
            then.status(200)
                .json_body(json!({"healthy": true, "version": "0.0.0-test"}));
        });

        let probe = HealthProbe::new(&server.base_url(), Duration::from_secs(2));
        assert!(probe.check());
        health.assert_calls(1);
    }

    #[test]
    fn test_probe_error_status_is_unhealthy() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/global/health");
            then.status(503);
        });

        let probe = HealthProbe::new(&server.base_url(), Duration::from_secs(2));
        assert!(!probe.check());
    }

    #[test]
    fn test_probe_connection_refused_is_unhealthy() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let probe = HealthProbe::new(
            &format!("http://127.0.0.1:{port}"),
            Duration::from_millis(500),
        );
        assert!(!probe.check());
    }
}
