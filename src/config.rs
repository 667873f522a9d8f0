// Copyright (c) 2025 Deephaven Client Contributors
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

//! Client configuration.
//!
//! Connection parameters are plain key-value options set before login:
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `deephaven.auth_refresh_secs` | 300 | Auth-token refresh interval |
//! | `deephaven.heartbeat_secs` | 10 | Worker keepalive ping interval |
//! | `deephaven.timeout_ms` | 60000 | Default wait budget for blocking calls |
//! | `deephaven.log_level` | unset | See [`crate::logging`] |
//! | `deephaven.log_file` | unset | See [`crate::logging`] |

use crate::error::{DeephavenErrorHelper, Result};
use crate::logging::LogConfig;
use std::time::Duration;

/// Configuration for a [`crate::Client`] and its session contexts.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Interval between background auth-token renewals.
    pub auth_refresh_interval: Duration,
    /// Interval between worker keepalive pings. The watchdog treats a
    /// connection with no server ping for three intervals as dead.
    pub heartbeat_interval: Duration,
    /// Default budget applied when a blocking wait is given no explicit
    /// timeout.
    pub default_timeout: Duration,
    /// Logging configuration.
    pub log: LogConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            auth_refresh_interval: Duration::from_secs(300),
            heartbeat_interval: Duration::from_secs(10),
            default_timeout: Duration::from_secs(60),
            log: LogConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a configuration option by key.
    ///
    /// Unknown keys and unparseable values are invalid-argument errors.
    pub fn set_option(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "deephaven.auth_refresh_secs" => {
                self.auth_refresh_interval = Duration::from_secs(Self::parse_u64(key, value)?);
                Ok(())
            }
            "deephaven.heartbeat_secs" => {
                self.heartbeat_interval = Duration::from_secs(Self::parse_u64(key, value)?);
                Ok(())
            }
            "deephaven.timeout_ms" => {
                self.default_timeout = Duration::from_millis(Self::parse_u64(key, value)?);
                Ok(())
            }
            "deephaven.log_level" => {
                self.log.level = Some(value.to_string());
                Ok(())
            }
            "deephaven.log_file" => {
                self.log.file = Some(value.to_string());
                Ok(())
            }
            _ => Err(DeephavenErrorHelper::invalid_argument()
                .message(format!("unknown option '{}'", key))),
        }
    }

    fn parse_u64(key: &str, value: &str) -> Result<u64> {
        value.parse().map_err(|_| {
            DeephavenErrorHelper::invalid_argument()
                .message(format!("option '{}' expects an integer, got '{}'", key, value))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.auth_refresh_interval, Duration::from_secs(300));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(10));
        assert_eq!(config.default_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_set_options() {
        let mut config = ClientConfig::new();
        config.set_option("deephaven.auth_refresh_secs", "60").unwrap();
        config.set_option("deephaven.heartbeat_secs", "2").unwrap();
        config.set_option("deephaven.timeout_ms", "1500").unwrap();
        config.set_option("deephaven.log_level", "debug").unwrap();

        assert_eq!(config.auth_refresh_interval, Duration::from_secs(60));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(2));
        assert_eq!(config.default_timeout, Duration::from_millis(1500));
        assert_eq!(config.log.level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_unknown_option_rejected() {
        let mut config = ClientConfig::new();
        let err = config.set_option("deephaven.bogus", "1").unwrap_err();
        assert_eq!(err.status(), crate::error::Status::InvalidArgument);
    }

    #[test]
    fn test_bad_integer_rejected() {
        let mut config = ClientConfig::new();
        assert!(config.set_option("deephaven.timeout_ms", "soon").is_err());
    }
}
