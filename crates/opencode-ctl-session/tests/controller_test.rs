//! Integration tests for the controller against HTTP servers.

mod common;

use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;

use common::{Behavior, CannedLauncher, CannedServer, LaunchMode};
use opencode_ctl_core::{ApiFailure, ControllerConfig, Error, Method, SendOptions, SessionId};
use opencode_ctl_session::{Controller, DEFAULT_MESSAGE_LIMIT};

fn mock_config(server: &MockServer, dir: &tempfile::TempDir) -> ControllerConfig {
    let mut config = ControllerConfig::default();
    config.server.host = server.host();
    config.server.port = server.port();
    config.server.working_dir = dir.path().to_path_buf();
    config
}

#[test]
fn test_transport_failure_restarts_server_and_retries_once() {
    let dir = tempfile::tempdir().unwrap();
    let port = common::free_port();
    let dying = CannedServer::start(port, Behavior::DieOnFirstRequest, "[]");

    let launcher = CannedLauncher::new(r#"[{"id":"ses_1","title":"after restart"}]"#);
    let config = common::config_for_port(port, dir.path().join("work"));
    let controller = Controller::with_launcher(config, Box::new(launcher.clone())).unwrap();
    assert_eq!(launcher.launches(), 0);

    let sessions = controller.list_sessions().unwrap();

    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].title.as_deref(), Some("after restart"));
    assert_eq!(launcher.launches(), 1);
    assert_eq!(dying.api_requests(), vec!["GET /session HTTP/1.1".to_string()]);
    assert_eq!(
        launcher.api_requests(0),
        vec!["GET /session HTTP/1.1".to_string()]
    );
}

#[test]
fn test_second_transport_failure_after_restart_propagates() {
    let dir = tempfile::tempdir().unwrap();
    let port = common::free_port();
    let dying = CannedServer::start(port, Behavior::DieOnFirstRequest, "[]");

    let launcher =
        CannedLauncher::with_mode("[]", LaunchMode::Serve(Behavior::DieOnFirstRequest));
    let config = common::config_for_port(port, dir.path().join("work"));
    let controller = Controller::with_launcher(config, Box::new(launcher.clone())).unwrap();

    let err = controller.list_sessions().unwrap_err();

    match err {
        Error::Api {
            method,
            ref path,
            failure: ApiFailure::Transport(_),
        } => {
            assert_eq!(method, Method::Get);
            assert_eq!(path, "/session");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(launcher.launches(), 1);
    assert_eq!(dying.api_requests().len(), 1);
    assert_eq!(launcher.api_requests(0).len(), 1);
}

#[test]
fn test_failed_restart_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let port = common::free_port();
    let dying = CannedServer::start(port, Behavior::DieOnFirstRequest, "[]");

    let launcher = CannedLauncher::with_mode("[]", LaunchMode::MissingExecutable);
    let config = common::config_for_port(port, dir.path().join("work"));
    let controller = Controller::with_launcher(config, Box::new(launcher.clone())).unwrap();

    let err = controller.list_sessions().unwrap_err();

    assert!(matches!(err, Error::ExecutableNotFound(ref name) if name == "opencode"));
    assert_eq!(launcher.launches(), 0);
    assert_eq!(dying.api_requests().len(), 1);
}

#[test]
fn test_restart_timeout_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let port = common::free_port();
    let dying = CannedServer::start(port, Behavior::DieOnFirstRequest, "[]");

    let launcher = CannedLauncher::with_mode("[]", LaunchMode::NoServer);
    let mut config = common::config_for_port(port, dir.path().join("work"));
    config.server.startup_timeout_secs = 1;
    let controller = Controller::with_launcher(config, Box::new(launcher.clone())).unwrap();

    let err = controller.list_sessions().unwrap_err();

    assert!(matches!(err, Error::StartupTimeout { timeout_secs: 1, .. }));
    assert_eq!(launcher.launches(), 1);
    assert_eq!(dying.api_requests().len(), 1);
}

#[test]
fn test_constructor_starts_server_when_down() {
    let dir = tempfile::tempdir().unwrap();
    let port = common::free_port();
    let launcher = CannedLauncher::new("[]");
    let config = common::config_for_port(port, dir.path().join("work"));

    let controller = Controller::with_launcher(config, Box::new(launcher.clone())).unwrap();
    assert_eq!(launcher.launches(), 1);
    assert!(controller.is_server_running());
    assert_eq!(controller.server_pid(), Some(31337));
    assert!(dir.path().join("work").is_dir());

    assert!(controller.stop_server());
    assert!(!controller.stop_server());
}

#[test]
fn test_missing_executable_fails_without_further_probes() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start();
    let health = server.mock(|when, then| {
        when.method(GET).path("/global/health");
        then.status(503);
    });

    let mut config = mock_config(&server, &dir);
    config.server.executable = "opencode-ctl-test-missing-executable".to_string();

    let err = Controller::new(config).unwrap_err();
    assert!(
        matches!(err, Error::ExecutableNotFound(ref name) if name == "opencode-ctl-test-missing-executable")
    );
    health.assert_calls(1);
}

#[test]
fn test_create_send_delete_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start();
    let health = server.mock(|when, then| {
        when.method(GET).path("/global/health");
        then.status(200).json_body(json!({"healthy": true}));
    });
    server.mock(|when, then| {
        when.method(POST).path("/session").json_body(json!({"title": "T"}));
        then.status(200)
            .json_body(json!({"id": "ses_1", "title": "T", "time": {"created": 1700000000000i64}}));
    });
    let send = server.mock(|when, then| {
        when.method(POST)
            .path("/session/ses_1/message")
            .json_body(json!({
                "parts": [{"type": "text", "text": "hello"}],
                "agent": "general"
            }));
        then.status(200).json_body(json!({
            "info": {"id": "msg_2", "role": "assistant", "sessionID": "ses_1"},
            "parts": [
                {"type": "step-start"},
                {"type": "text", "text": "Hello! How can I help?"}
            ]
        }));
    });
    let delete = server.mock(|when, then| {
        when.method(DELETE).path("/session/ses_1");
        then.status(200).json_body(json!(true));
    });

    let controller = Controller::new(mock_config(&server, &dir)).unwrap();

    let session = controller.create_session(Some("T"), None).unwrap();
    assert_eq!(session.id, SessionId::new("ses_1"));
    assert!(session.created_at().is_some());

    let reply = controller
        .send_message(&session.id, "hello", &SendOptions::new().with_agent("general"))
        .unwrap();
    assert!(reply.parts.iter().any(|part| part.is_text()));
    send.assert();

    assert!(controller.delete_session(&session.id).unwrap());
    delete.assert();

    server.mock(|when, then| {
        when.method(GET).path("/session/ses_1");
        then.status(404).json_body(json!({"name": "NotFoundError"}));
    });
    let err = controller.get_session(&session.id).unwrap_err();
    assert!(err.is_not_found());

    // One probe at construction and one before each of the four requests.
    health.assert_calls(5);
    assert_eq!(controller.server_pid(), None);
}

#[test]
fn test_messages_limit_is_verbatim_and_order_preserved() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start();
    let listing = server.mock(|when, then| {
        when.method(GET)
            .path("/session/ses_1/message")
            .query_param("limit", "7");
        then.status(200).json_body(json!([
            {"info": {"id": "msg_3", "role": "user"}, "parts": []},
            {"info": {"id": "msg_1", "role": "assistant"}, "parts": []},
            {"info": {"id": "msg_2", "role": "user"}, "parts": []}
        ]));
    });

    let mut config = mock_config(&server, &dir);
    config.server.auto_start = false;
    let controller = Controller::new(config).unwrap();

    let messages = controller.messages(&SessionId::new("ses_1"), 7).unwrap();
    let ids: Vec<_> = messages.iter().filter_map(|m| m.id()).collect();
    assert_eq!(ids, vec!["msg_3", "msg_1", "msg_2"]);
    listing.assert();
}

#[test]
fn test_default_message_limit() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start();
    let listing = server.mock(|when, then| {
        when.method(GET)
            .path("/session/ses_1/message")
            .query_param("limit", "50");
        then.status(200).json_body(json!([]));
    });

    let mut config = mock_config(&server, &dir);
    config.server.auto_start = false;
    let controller = Controller::new(config).unwrap();

    controller
        .messages(&SessionId::new("ses_1"), DEFAULT_MESSAGE_LIMIT)
        .unwrap();
    listing.assert();
}

#[test]
fn test_user_message_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST)
            .path("/session/ses_1/message")
            .json_body(json!({
                "parts": [{"type": "text", "text": "remember 42"}],
                "agent": "general",
                "noReply": true
            }));
        then.status(200).json_body(json!({
            "info": {"id": "msg_1", "role": "user"},
            "parts": [{"type": "text", "text": "remember 42"}]
        }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/session/ses_1/message");
        then.status(200).json_body(json!([
            {
                "info": {"id": "msg_1", "role": "user"},
                "parts": [{"type": "text", "text": "remember 42"}]
            }
        ]));
    });

    let mut config = mock_config(&server, &dir);
    config.server.auto_start = false;
    config.client.default_agent = Some("general".to_string());
    let controller = Controller::new(config).unwrap();
    let id = SessionId::new("ses_1");

    controller
        .send_message(&id, "remember 42", &SendOptions::new().with_no_reply(true))
        .unwrap();

    let messages = controller.messages(&id, DEFAULT_MESSAGE_LIMIT).unwrap();
    let user = messages
        .iter()
        .find(|m| m.role() == Some("user"))
        .unwrap();
    assert_eq!(user.text(), "remember 42");
}

#[test]
fn test_wait_for_completion_over_http() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/session/status");
        then.status(200).json_body(json!({"ses_1": {"type": "idle"}}));
    });
    let recent = server.mock(|when, then| {
        when.method(GET)
            .path("/session/ses_1/message")
            .query_param("limit", "4");
        then.status(200).json_body(json!([
            {"info": {"role": "assistant"}, "parts": [{"type": "text", "text": "old"}]},
            {"info": {"role": "user"}, "parts": [{"type": "text", "text": "again"}]},
            {"info": {"role": "assistant"}, "parts": [{"type": "text", "text": "new"}]}
        ]));
    });

    let mut config = mock_config(&server, &dir);
    config.server.auto_start = false;
    let controller = Controller::new(config).unwrap();

    let wait = controller
        .completion_wait()
        .with_message_window(4)
        .with_timeout(Duration::from_secs(5));
    let text = controller
        .wait_for_completion(&SessionId::new("ses_1"), &wait)
        .unwrap();
    assert_eq!(text, "new");
    recent.assert();
}

#[test]
fn test_unreachable_server_without_auto_start_is_api_error() {
    let dir = tempfile::tempdir().unwrap();
    let port = common::free_port();
    let mut config = common::config_for_port(port, dir.path().to_path_buf());
    config.server.auto_start = false;
    let launcher = CannedLauncher::new("[]");

    let controller = Controller::with_launcher(config, Box::new(launcher.clone())).unwrap();
    let err = controller.list_sessions().unwrap_err();

    assert!(err.is_transport());
    assert_eq!(launcher.launches(), 0);
}
