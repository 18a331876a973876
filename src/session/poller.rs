use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info};

use crate::session::{SessionClient, TaskHandler};
use crate::{AppResult, ClientConfig, Shutdown};

/// Repeats session cycles on a fixed interval and gives the host
/// application start/stop control.
///
/// `start` spawns one driver task: run a full cycle, sleep the poll
/// interval, repeat. `stop` broadcasts shutdown, which interrupts an
/// in-progress sleep immediately and an in-progress cycle at its next
/// await point, then waits until the driver and its reader loop have
/// released the connection.
pub struct Poller {
    driver: Option<Driver>,
}

struct Driver {
    notify_shutdown: broadcast::Sender<()>,
    shutdown_complete_rx: mpsc::Receiver<()>,
    handle: JoinHandle<()>,
}

impl Poller {
    pub fn new() -> Poller {
        Poller { driver: None }
    }

    pub fn is_running(&self) -> bool {
        self.driver.is_some()
    }

    /// Starts the periodic cycle driver.
    ///
    /// The configuration is validated first; an invalid one is refused
    /// with `InvalidConfig` before any socket is opened. Starting an
    /// already-running poller is a no-op, there is never more than one
    /// concurrent cycle driver.
    pub fn start(&mut self, config: ClientConfig, handler: Arc<dyn TaskHandler>) -> AppResult<()> {
        if self.driver.is_some() {
            info!("poller already running, start ignored");
            return Ok(());
        }
        config.validate()?;

        let (notify_shutdown, _) = broadcast::channel(1);
        let (shutdown_complete_tx, shutdown_complete_rx) = mpsc::channel(1);
        let mut shutdown = Shutdown::new(notify_shutdown.subscribe());

        let handle = tokio::spawn(async move {
            info!(
                "poller started against {} (interval={}s)",
                config.server_addr(),
                config.poll_interval_secs
            );
            while !shutdown.is_shutdown() {
                let mut session = SessionClient::new(
                    config.clone(),
                    handler.clone(),
                    shutdown_complete_tx.clone(),
                );
                tokio::select! {
                    _ = shutdown.recv() => break,
                    result = session.run_cycle() => {
                        if let Err(e) = result {
                            error!("session cycle failed: {}", e);
                            handler.on_error(&e);
                        }
                    }
                }
                tokio::select! {
                    _ = shutdown.recv() => break,
                    _ = time::sleep(config.poll_interval()) => {}
                }
            }
            info!("poller stopped");
        });

        self.driver = Some(Driver {
            notify_shutdown,
            shutdown_complete_rx,
            handle,
        });
        Ok(())
    }

    /// Stops the driver and waits for every resource of the current cycle
    /// to be released. Idempotent.
    pub async fn stop(&mut self) {
        let Some(mut driver) = self.driver.take() else {
            debug!("poller not running, stop ignored");
            return;
        };
        let _ = driver.notify_shutdown.send(());
        if let Err(e) = driver.handle.await {
            debug!("poller driver join failed: {}", e);
        }
        // returns None once the driver's and every reader's sender is gone
        driver.shutdown_complete_rx.recv().await;
        info!("poller shutdown complete");
    }
}

impl Default for Poller {
    fn default() -> Self {
        Poller::new()
    }
}
