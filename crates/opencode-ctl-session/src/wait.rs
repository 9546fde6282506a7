//! Waiting for a session to finish processing.
//!
//! The loop polls the session status until it reports idle, then pulls the
//! most recent messages and returns the text of the newest assistant reply.
//! It runs against the [`SessionApi`] trait so it can be driven without a
//! server.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use opencode_ctl_core::{
    last_assistant_text, CompletionSettings, Error, Message, Result, SessionId, SessionStatus,
};

/// The two session queries the completion loop needs.
pub trait SessionApi {
    /// Current status of one session.
    fn session_status(&self, session_id: &SessionId) -> Result<SessionStatus>;

    /// Most recent messages of a session in server order, at most `limit`.
    fn messages(&self, session_id: &SessionId, limit: usize) -> Result<Vec<Message>>;
}

/// Shared flag that interrupts a wait.
///
/// Clones share state; cancelling any clone wakes every sleeper.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancellationToken {
    /// Create an uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel and wake all waiters.
    pub fn cancel(&self) {
        let (flag, condvar) = &*self.inner;
        *flag.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = true;
        condvar.notify_all();
    }

    /// Whether the token has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self
            .inner
            .0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Sleep for up to `timeout`, returning early on cancellation.
    ///
    /// Returns true if the token was cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (flag, condvar) = &*self.inner;
        let guard = flag.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let (guard, _) = condvar
            .wait_timeout_while(guard, timeout, |cancelled| !*cancelled)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard
    }
}

/// A fixed point in time after which waiting stops.
///
/// A timeout too large to represent as an instant never expires.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    at: Option<Instant>,
}

impl Deadline {
    /// Deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        let start = Instant::now();
        Self {
            start,
            at: start.checked_add(timeout),
        }
    }

    /// Time since the deadline was set.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Time left, zero once expired.
    pub fn remaining(&self) -> Duration {
        match self.at {
            Some(at) => at.saturating_duration_since(Instant::now()),
            None => Duration::MAX,
        }
    }

    /// Whether the deadline has passed.
    pub fn is_expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }
}

/// Parameters of one completion wait.
#[derive(Debug, Clone)]
pub struct CompletionWait {
    /// Overall timeout
    pub timeout: Duration,
    /// Delay between status polls
    pub poll_interval: Duration,
    /// Number of recent messages inspected once idle
    pub message_window: usize,
    /// Treat an unknown status as idle
    pub missing_status_is_idle: bool,
    /// Token that aborts the wait
    pub cancel: CancellationToken,
}

impl Default for CompletionWait {
    fn default() -> Self {
        Self::from_settings(&CompletionSettings::default())
    }
}

impl CompletionWait {
    /// Wait parameters from configuration.
    pub fn from_settings(settings: &CompletionSettings) -> Self {
        Self {
            timeout: Duration::from_secs(settings.timeout_secs),
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            message_window: settings.message_window,
            missing_status_is_idle: settings.missing_status_is_idle,
            cancel: CancellationToken::new(),
        }
    }

    /// Set the overall timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set how many recent messages are inspected.
    pub fn with_message_window(mut self, window: usize) -> Self {
        self.message_window = window;
        self
    }

    /// Treat sessions missing from the status map as idle.
    pub fn with_missing_status_is_idle(mut self, idle: bool) -> Self {
        self.missing_status_is_idle = idle;
        self
    }

    /// Use a cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Poll until the session is idle and return the last assistant text.
///
/// Returns `""` when the session went idle without an assistant message in
/// the inspected window. Fails with [`Error::CompletionTimeout`] once the
/// timeout passes, without polling again, and with [`Error::Cancelled`] when
/// the token is cancelled.
pub fn wait_for_completion<A: SessionApi + ?Sized>(
    api: &A,
    session_id: &SessionId,
    wait: &CompletionWait,
) -> Result<String> {
    let deadline = Deadline::after(wait.timeout);
    let mut polls = 0u32;

    loop {
        if wait.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if deadline.is_expired() {
            info!("Session {} not idle after {} polls", session_id, polls);
            return Err(Error::CompletionTimeout {
                session_id: session_id.to_string(),
                timeout_ms: wait.timeout.as_millis() as u64,
            });
        }

        let status = api.session_status(session_id)?;
        polls += 1;
        debug!("Session {} status: {} (poll {})", session_id, status, polls);

        if status.is_idle() || (wait.missing_status_is_idle && status.is_unknown()) {
            let messages = api.messages(session_id, wait.message_window)?;
            info!(
                "Session {} idle after {}ms",
                session_id,
                deadline.elapsed().as_millis()
            );
            return Ok(last_assistant_text(&messages).unwrap_or_default());
        }

        let pause = wait.poll_interval.min(deadline.remaining());
        if wait.cancel.wait_timeout(pause) {
            return Err(Error::Cancelled);
        }
    }
}
