//! Ctrl-C handling for a blocking command worker.
//!
//! The first interrupt cancels the worker's token and waits for it to wind
//! down; a second interrupt abandons it.

use std::future::Future;

use tokio::task::{JoinError, JoinHandle};
use tracing::warn;

use opencode_ctl_session::CancellationToken;

/// Exit status after an abandoned command (128 + SIGINT).
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// How a supervised worker ended.
#[derive(Debug)]
pub enum Supervised<T> {
    /// The worker returned, possibly after being cancelled
    Finished(Result<T, JoinError>),
    /// A second interrupt arrived before the worker returned
    Abandoned,
}

/// Wait for `worker`, cancelling on the first interrupt and giving up on the second.
///
/// `interrupt` is called once per interrupt to wait for; each returned
/// future resolves when the signal arrives.
pub async fn supervise<T, F, Fut>(
    mut worker: JoinHandle<T>,
    cancel: &CancellationToken,
    mut interrupt: F,
) -> Supervised<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    tokio::select! {
        result = &mut worker => return Supervised::Finished(result),
        _ = interrupt() => {}
    }

    warn!("Interrupted, cancelling; press Ctrl-C again to exit immediately");
    cancel.cancel();

    tokio::select! {
        result = &mut worker => Supervised::Finished(result),
        _ = interrupt() => {
            warn!("Interrupted again, exiting");
            Supervised::Abandoned
        }
    }
}

/// Resolve on the next Ctrl-C; never resolves if the handler cannot be installed.
pub async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
