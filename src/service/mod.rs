pub use app_error::{AppError, AppResult};
pub use config::ClientConfig;
pub use shutdown::Shutdown;
pub use tracing_config::setup_tracing;

mod app_error;
mod config;
mod shutdown;
mod tracing_config;
