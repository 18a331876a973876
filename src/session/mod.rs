//! Protocol layer: the per-cycle session state machine and the poller
//! that repeats it.

use tracing::{error, info};

use crate::AppError;

pub use client::{SessionClient, SessionState};
pub use poller::Poller;

mod client;
mod poller;

/// Host-application side of the core: receives decoded task payloads and
/// cycle failures.
pub trait TaskHandler: Send + Sync + 'static {
    /// Called with the payload of every RESPONSE_TASKS frame. What the
    /// task list encoding means is the host's concern.
    fn on_tasks(&self, payload: String);

    /// Called on `ConnectError`, `LoginFailed` and `TasksTimeout`. The
    /// poller retries on its next tick regardless.
    fn on_error(&self, error: &AppError) {
        error!("cycle error reported: {}", error);
    }
}

/// Handler for headless use: logs the received task list and nothing
/// else.
pub struct LoggingTaskHandler;

impl TaskHandler for LoggingTaskHandler {
    fn on_tasks(&self, payload: String) {
        info!("received task list: {}", payload);
    }
}
