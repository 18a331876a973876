use std::sync::Arc;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::time;
use tracing::{debug, info, warn};

use crate::network::{spawn_reader, Connection, Frame, FrameType};
use crate::session::TaskHandler;
use crate::{AppError, AppResult, ClientConfig, Shutdown};

/// Protocol state of one session cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing has happened yet
    ///
    /// transition: cycle starts => Connecting
    Idle,

    /// Opening the TCP connection
    ///
    /// transition: connected => Connected
    ///             refused/unreachable/timeout => Closed (cycle abandoned)
    Connecting,

    /// Connection open, nothing sent yet
    ///
    /// transition: always => LoggingIn
    Connected,

    /// LOGIN sent, polling for the response with a bounded attempt budget
    ///
    /// transition: OK frame within budget => LoggedIn
    ///             any other type, lost connection or exhausted budget => LoggingOut
    LoggingIn,

    /// Server accepted the token
    ///
    /// transition: always => RequestingTasks
    LoggedIn,

    /// REQUEST_TASKS sent
    ///
    /// transition: sent => AwaitingTasks
    ///             send failure => LoggingOut
    RequestingTasks,

    /// Waiting for RESPONSE_TASKS with a bounded timeout; other frame
    /// types arriving here are discarded
    ///
    /// transition: response or timeout => LoggingOut
    AwaitingTasks,

    /// LOGOUT sent unconditionally, response ignored
    ///
    /// transition: connection closed => Closed
    LoggingOut,

    /// Terminal for this cycle, all resources released
    Closed,
}

impl SessionState {
    /// Legal transitions of the cycle. Login always precedes the task
    /// request; logout always precedes the close, on every path.
    pub const fn can_transition_to(current: SessionState, target: SessionState) -> bool {
        matches!(
            (current, target),
            (SessionState::Idle, SessionState::Connecting)
                | (SessionState::Connecting, SessionState::Connected)
                | (SessionState::Connecting, SessionState::Closed)
                | (SessionState::Connected, SessionState::LoggingIn)
                | (SessionState::LoggingIn, SessionState::LoggedIn)
                | (SessionState::LoggingIn, SessionState::LoggingOut)
                | (SessionState::LoggedIn, SessionState::RequestingTasks)
                | (SessionState::RequestingTasks, SessionState::AwaitingTasks)
                | (SessionState::RequestingTasks, SessionState::LoggingOut)
                | (SessionState::AwaitingTasks, SessionState::LoggingOut)
                | (SessionState::LoggingOut, SessionState::Closed)
        )
    }
}

/// Drives one full protocol cycle against the notification server.
///
/// A session is ephemeral: the poller builds a fresh one per tick, runs
/// `run_cycle`, and drops it. The cycle owns its connection exclusively
/// and hands the read half to exactly one reader loop.
pub struct SessionClient {
    config: ClientConfig,
    handler: Arc<dyn TaskHandler>,
    shutdown_complete_tx: mpsc::Sender<()>,
    state: SessionState,
}

impl SessionClient {
    pub fn new(
        config: ClientConfig,
        handler: Arc<dyn TaskHandler>,
        shutdown_complete_tx: mpsc::Sender<()>,
    ) -> SessionClient {
        SessionClient {
            config,
            handler,
            shutdown_complete_tx,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, target: SessionState) {
        debug_assert!(
            SessionState::can_transition_to(self.state, target),
            "illegal session transition {:?} -> {:?}",
            self.state,
            target
        );
        debug!("session {:?} -> {:?}", self.state, target);
        self.state = target;
    }

    /// Runs connect, login, task request and teardown once.
    ///
    /// Whatever happens after the connect succeeds, a LOGOUT frame is
    /// sent exactly once and the connection is closed before this
    /// returns. Errors are returned to the poller, which reports them and
    /// retries on its next tick; none of them are fatal.
    pub async fn run_cycle(&mut self) -> AppResult<()> {
        self.transition(SessionState::Connecting);
        let addr = self.config.server_addr();
        let (mut connection, read_half) =
            match Connection::connect(&addr, self.config.connect_timeout()).await {
                Ok(pair) => pair,
                Err(e) => {
                    self.transition(SessionState::Closed);
                    return Err(e);
                }
            };
        self.transition(SessionState::Connected);

        let (frame_tx, mut frame_rx) = mpsc::channel(16);
        let (notify_reader_stop, _) = broadcast::channel(1);
        let reader = spawn_reader(
            read_half,
            frame_tx,
            Shutdown::new(notify_reader_stop.subscribe()),
            self.shutdown_complete_tx.clone(),
        );

        let result = self.converse(&mut connection, &mut frame_rx).await;

        self.transition(SessionState::LoggingOut);
        if let Err(e) = connection.send(&Frame::logout()).await {
            debug!("logout send failed: {}", e);
        }
        connection.close().await;
        let _ = notify_reader_stop.send(());
        if let Err(e) = reader.await {
            debug!("reader task join failed: {}", e);
        }
        self.transition(SessionState::Closed);
        result
    }

    /// Login and task request; teardown stays with `run_cycle` so every
    /// early return here still logs out.
    async fn converse(
        &mut self,
        connection: &mut Connection,
        frame_rx: &mut mpsc::Receiver<Frame>,
    ) -> AppResult<()> {
        self.transition(SessionState::LoggingIn);
        connection.send(&Frame::login(&self.config.token)).await?;
        self.await_login_ok(frame_rx).await?;
        self.transition(SessionState::LoggedIn);

        self.transition(SessionState::RequestingTasks);
        connection.send(&Frame::request_tasks()).await?;
        self.transition(SessionState::AwaitingTasks);

        let payload = self.await_tasks(frame_rx).await?;
        self.handler.on_tasks(payload);
        Ok(())
    }

    /// Polls the inbound channel for the login response, up to the
    /// configured attempt budget with a short delay between attempts.
    /// Only an OK frame counts as success; an ERROR (or any other) frame
    /// fails the login outright.
    async fn await_login_ok(&mut self, frame_rx: &mut mpsc::Receiver<Frame>) -> AppResult<()> {
        let max_attempts = self.config.login_max_attempts;
        for attempt in 1..=max_attempts {
            match frame_rx.try_recv() {
                Ok(frame) => {
                    return match frame.frame_type {
                        FrameType::Ok => {
                            info!("login successful (attempts={})", attempt);
                            Ok(())
                        }
                        other => {
                            warn!("login rejected with {:?} frame", other);
                            Err(AppError::LoginFailed(attempt))
                        }
                    };
                }
                Err(TryRecvError::Empty) => {
                    // no point sleeping once the budget is spent
                    if attempt < max_attempts {
                        time::sleep(self.config.login_retry_delay()).await;
                    }
                }
                Err(TryRecvError::Disconnected) => {
                    debug!("connection lost while logging in");
                    return Err(AppError::LoginFailed(attempt));
                }
            }
        }
        Err(AppError::LoginFailed(max_attempts))
    }

    /// Waits for RESPONSE_TASKS with a bounded timeout. The protocol has
    /// no request ids; correlation is by state, so any other frame type
    /// arriving here is discarded and waiting continues.
    async fn await_tasks(&mut self, frame_rx: &mut mpsc::Receiver<Frame>) -> AppResult<String> {
        let wait_for_response = async {
            loop {
                match frame_rx.recv().await {
                    Some(frame) => match frame.frame_type {
                        FrameType::ResponseTasks => {
                            return Ok(frame.payload.unwrap_or_default());
                        }
                        other => {
                            warn!("discarding unexpected {:?} frame while awaiting tasks", other);
                        }
                    },
                    None => {
                        debug!("connection lost while awaiting tasks");
                        return Err(AppError::TasksTimeout);
                    }
                }
            }
        };
        match time::timeout(self.config.tasks_timeout(), wait_for_response).await {
            Ok(result) => result,
            Err(_) => Err(AppError::TasksTimeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use rstest::rstest;
    use tokio::sync::mpsc;
    use tokio::time;

    use super::{SessionClient, SessionState};
    use crate::session::TaskHandler;
    use crate::{AppError, ClientConfig};

    struct DiscardHandler;

    impl TaskHandler for DiscardHandler {
        fn on_tasks(&self, _payload: String) {}
    }

    #[tokio::test(start_paused = true)]
    async fn login_failure_does_not_sleep_after_the_last_attempt() {
        let config = ClientConfig::new("127.0.0.1", 2236, "tok");
        let (shutdown_complete_tx, _) = mpsc::channel(1);
        let mut session =
            SessionClient::new(config, Arc::new(DiscardHandler), shutdown_complete_tx);

        // sender stays alive so every attempt polls an empty channel
        let (frame_tx, mut frame_rx) = mpsc::channel(1);
        let started = time::Instant::now();
        let result = session.await_login_ok(&mut frame_rx).await;
        drop(frame_tx);

        assert!(matches!(result, Err(AppError::LoginFailed(10))));
        // 10 attempts separated by 9 delays of 100 ms, nothing after
        assert_eq!(started.elapsed(), Duration::from_millis(900));
    }

    #[rstest]
    #[case(SessionState::Idle, SessionState::Connecting, true)]
    #[case(SessionState::Connecting, SessionState::Closed, true)]
    #[case(SessionState::LoggingIn, SessionState::LoggingOut, true)]
    #[case(SessionState::AwaitingTasks, SessionState::LoggingOut, true)]
    // login must always precede the task request
    #[case(SessionState::Connected, SessionState::RequestingTasks, false)]
    // logout must always precede the close
    #[case(SessionState::AwaitingTasks, SessionState::Closed, false)]
    #[case(SessionState::LoggingIn, SessionState::Closed, false)]
    #[case(SessionState::Closed, SessionState::Connecting, false)]
    fn transition_legality(
        #[case] from: SessionState,
        #[case] to: SessionState,
        #[case] legal: bool,
    ) {
        assert_eq!(SessionState::can_transition_to(from, to), legal);
    }
}
