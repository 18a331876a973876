mod network;
mod service;
mod session;

pub use network::{Connection, Frame, FrameType, HEADER_SIZE};
pub use service::{setup_tracing, AppError, AppResult, ClientConfig, Shutdown};
pub use session::{LoggingTaskHandler, Poller, SessionClient, SessionState, TaskHandler};
