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

extern crate config as _;

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{AppError, AppResult};

fn default_poll_interval_secs() -> u64 {
    600
}
fn default_tasks_timeout_ms() -> u64 {
    5_000
}
fn default_connect_timeout_ms() -> u64 {
    10_000
}
fn default_login_max_attempts() -> u32 {
    10
}
fn default_login_retry_delay_ms() -> u64 {
    100
}

/// Client configuration supplied by the host application.
///
/// `host`, `port` and `token` have no defaults; the tunables below mirror
/// the product values and rarely need changing.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub token: String,

    /// Sleep between two session cycles.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Upper bound on waiting for a task response within one cycle.
    #[serde(default = "default_tasks_timeout_ms")]
    pub tasks_timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Reads attempted for the login response before giving up.
    #[serde(default = "default_login_max_attempts")]
    pub login_max_attempts: u32,
    #[serde(default = "default_login_retry_delay_ms")]
    pub login_retry_delay_ms: u64,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16, token: impl Into<String>) -> Self {
        ClientConfig {
            host: host.into(),
            port,
            token: token.into(),
            poll_interval_secs: default_poll_interval_secs(),
            tasks_timeout_ms: default_tasks_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            login_max_attempts: default_login_max_attempts(),
            login_retry_delay_ms: default_login_retry_delay_ms(),
        }
    }

    pub fn set_up_config<P: AsRef<Path>>(path: P) -> AppResult<ClientConfig> {
        let path_str = path
            .as_ref()
            .to_str()
            .ok_or(AppError::InvalidConfig(format!(
                "config file path: {}",
                path.as_ref().to_string_lossy()
            )))?;
        let config = config::Config::builder()
            .add_source(config::File::with_name(path_str))
            .build()?;

        let client_config: ClientConfig = config.try_deserialize()?;
        client_config.validate()?;
        Ok(client_config)
    }

    /// Must pass before any network activity; the poller refuses to start
    /// on an invalid configuration.
    pub fn validate(&self) -> AppResult<()> {
        if self.host.is_empty() {
            return Err(AppError::InvalidConfig("host must not be empty".into()));
        }
        if self.port < 1024 {
            return Err(AppError::InvalidConfig(format!(
                "port {} is below 1024",
                self.port
            )));
        }
        if self.token.is_empty() {
            return Err(AppError::InvalidConfig("token must not be empty".into()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn tasks_timeout(&self) -> Duration {
        Duration::from_millis(self.tasks_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn login_retry_delay(&self) -> Duration {
        Duration::from_millis(self.login_retry_delay_ms)
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::ClientConfig;
    use crate::AppError;

    #[test]
    fn valid_config_passes() {
        let config = ClientConfig::new("notify.example.org", 2236, "tok");
        assert!(config.validate().is_ok());
    }

    #[rstest]
    #[case("", 9999, "tok")]
    #[case("host", 80, "tok")]
    #[case("host", 9999, "")]
    fn invalid_config_is_rejected(#[case] host: &str, #[case] port: u16, #[case] token: &str) {
        let config = ClientConfig::new(host, port, token);
        assert!(matches!(
            config.validate(),
            Err(AppError::InvalidConfig(_))
        ));
    }

    #[test]
    fn defaults_match_product_values() {
        let config = ClientConfig::new("host", 2236, "tok");
        assert_eq!(config.poll_interval_secs, 600);
        assert_eq!(config.login_max_attempts, 10);
        assert_eq!(config.login_retry_delay_ms, 100);
    }
}
