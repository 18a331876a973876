// Copyright 2025 jlantxa
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// rejected before any I/O takes place
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("connect to {addr} failed: {reason}")]
    ConnectError { addr: String, reason: String },

    /// decode errors: a single bad frame, the read loop continues
    #[error("truncated frame")]
    Truncated,

    #[error("checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// caller error on encode, payload must fit in a u16 size field
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    #[error("login failed after {0} attempts")]
    LoginFailed(u32),

    /// soft failure, logout still proceeds
    #[error("timed out waiting for task response")]
    TasksTimeout,

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("config file error: {0}")]
    ConfigFileError(#[from] config::ConfigError),

    #[error("illegal state: {0}")]
    IllegalStateError(String),
}
