//! Command handlers.
//!
//! Every handler returns a [`Report`] carrying both a JSON value and a
//! human-readable rendering; `main` picks one based on `--json`.

use std::time::Duration;

use chrono::Local;
use serde_json::{json, Value};
use tracing::info;

use opencode_ctl_core::{ControllerConfig, Message, SendOptions, Session, SessionId};
use opencode_ctl_server::HealthProbe;
use opencode_ctl_session::{CancellationToken, Controller};

use crate::cli::Command;

/// Output of one command.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// Machine-readable result
    pub value: Value,
    /// Human-readable result
    pub text: String,
}

impl Report {
    fn new(value: Value, text: impl Into<String>) -> Self {
        Self {
            value,
            text: text.into(),
        }
    }

    /// Render for printing.
    pub fn render(&self, json: bool) -> String {
        if json {
            serde_json::to_string_pretty(&self.value).unwrap_or_else(|_| self.value.to_string())
        } else {
            self.text.clone()
        }
    }
}

/// Run a command with its own controller.
///
/// `health` only probes and `serve` detaches the server it starts; every
/// other command goes through a [`Controller`], which stops a server it
/// started once the command finishes unless `server.keep_alive` is set.
pub fn run(
    command: &Command,
    mut config: ControllerConfig,
    cancel: &CancellationToken,
) -> anyhow::Result<Report> {
    match command {
        Command::Health => {
            let url = config.server.base_url();
            let healthy = HealthProbe::new(&url, config.server.probe_timeout()).check();
            let text = if healthy {
                format!("Server at {url} is healthy")
            } else {
                format!("Server at {url} is not responding")
            };
            Ok(Report::new(json!({"url": url, "healthy": healthy}), text))
        }
        Command::Serve => {
            config.server.auto_start = false;
            let controller = Controller::new(config)?;
            controller.start_server()?;
            let url = controller.base_url();
            let pid = controller.detach_server();
            let text = match pid {
                Some(pid) => format!("Server started at {url} (pid {pid})"),
                None => format!("Server already running at {url}"),
            };
            Ok(Report::new(json!({"url": url, "pid": pid}), text))
        }
        other => {
            let controller = Controller::new(config)?;
            execute(&controller, other, cancel)
        }
    }
}

// =============================================================================
// Session commands
// =============================================================================

/// Run a session command against an existing controller.
pub fn execute(
    controller: &Controller,
    command: &Command,
    cancel: &CancellationToken,
) -> anyhow::Result<Report> {
    let report = match command {
        Command::Health | Command::Serve => {
            anyhow::bail!("{command:?} is not a session command")
        }
        Command::Sessions => {
            let sessions = controller.list_sessions()?;
            let text = if sessions.is_empty() {
                "No sessions".to_string()
            } else {
                sessions
                    .iter()
                    .map(session_line)
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            Report::new(serde_json::to_value(&sessions)?, text)
        }
        Command::Session { id } => {
            let session = controller.get_session(&SessionId::new(id.as_str()))?;
            Report::new(serde_json::to_value(&session)?, session_line(&session))
        }
        Command::Create { title, parent } => {
            let parent = parent.as_deref().map(SessionId::from);
            let session = controller.create_session(title.as_deref(), parent.as_ref())?;
            let text = format!("Created session {}", session.id);
            Report::new(serde_json::to_value(&session)?, text)
        }
        Command::Delete { id } => {
            let deleted = controller.delete_session(&SessionId::new(id.as_str()))?;
            let text = if deleted {
                format!("Deleted session {id}")
            } else {
                format!("Server did not confirm deletion of {id}")
            };
            Report::new(json!({"id": id, "deleted": deleted}), text)
        }
        Command::Status { id: Some(id) } => {
            let status = controller.session_status(&SessionId::new(id.as_str()))?;
            Report::new(
                json!({"id": id, "status": status.status}),
                format!("{id}: {status}"),
            )
        }
        Command::Status { id: None } => {
            let statuses = controller.status_map()?;
            let text = if statuses.is_empty() {
                "No active sessions".to_string()
            } else {
                statuses
                    .iter()
                    .map(|(id, status)| format!("{id}: {status}"))
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            Report::new(serde_json::to_value(&statuses)?, text)
        }
        Command::Send {
            id,
            text,
            agent,
            model,
            no_reply,
            async_send,
        } => {
            let session_id = SessionId::new(id.as_str());
            let options = send_options(agent, model, *no_reply);
            if *async_send {
                controller.send_message_async(&session_id, text, &options)?;
                Report::new(
                    json!({"id": id, "queued": true}),
                    format!("Queued message for {id}"),
                )
            } else {
                let reply = controller.send_message(&session_id, text, &options)?;
                Report::new(serde_json::to_value(&reply)?, reply.text())
            }
        }
        Command::Messages { id, limit } => {
            let messages = controller.messages(&SessionId::new(id.as_str()), *limit)?;
            let text = messages
                .iter()
                .map(message_line)
                .collect::<Vec<_>>()
                .join("\n");
            Report::new(serde_json::to_value(&messages)?, text)
        }
        Command::Diff { id, message } => {
            let diff = controller.diff(&SessionId::new(id.as_str()), message.as_deref())?;
            let text = serde_json::to_string_pretty(&diff)?;
            Report::new(diff, text)
        }
        Command::Wait {
            id,
            timeout,
            interval,
        } => {
            let mut wait = controller.completion_wait().with_cancel(cancel.clone());
            if let Some(secs) = timeout {
                wait = wait.with_timeout(Duration::from_secs(*secs));
            }
            if let Some(ms) = interval {
                wait = wait.with_poll_interval(Duration::from_millis(*ms));
            }
            let output = controller.wait_for_completion(&SessionId::new(id.as_str()), &wait)?;
            Report::new(json!({"id": id, "output": output}), output)
        }
        Command::Abort { id } => {
            let aborted = controller.abort_session(&SessionId::new(id.as_str()))?;
            Report::new(
                json!({"id": id, "aborted": aborted}),
                format!("Aborted session {id}"),
            )
        }
        Command::Share { id } => {
            let session = controller.share_session(&SessionId::new(id.as_str()))?;
            let text = match session.extra.get("share").and_then(|s| s.get("url")) {
                Some(Value::String(url)) => url.clone(),
                _ => format!("Shared session {id}"),
            };
            Report::new(serde_json::to_value(&session)?, text)
        }
        Command::Run {
            text,
            agent,
            model,
            timeout,
            ..
        } => {
            let options = send_options(agent, model, false);
            let mut wait = controller.completion_wait().with_cancel(cancel.clone());
            if let Some(secs) = timeout {
                wait = wait.with_timeout(Duration::from_secs(*secs));
            }
            let outcome = controller.run_task(text, &options, &wait)?;
            info!("Task finished in session {}", outcome.session.id);
            Report::new(
                json!({"session": outcome.session.id, "output": outcome.output}),
                outcome.output,
            )
        }
    };
    Ok(report)
}

fn send_options(agent: &Option<String>, model: &Option<String>, no_reply: bool) -> SendOptions {
    SendOptions {
        agent: agent.clone(),
        model: model.clone(),
        no_reply,
    }
}

fn session_line(session: &Session) -> String {
    let created = session
        .created_at()
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{}\t{}\t{}",
        session.id,
        created,
        session.title.as_deref().unwrap_or("")
    )
}

fn message_line(message: &Message) -> String {
    format!(
        "[{}] {}",
        message.role().unwrap_or("?"),
        message.text()
    )
}
