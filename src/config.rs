//! Link configuration.
//!
//! Where the client connects and how the transport behaves when the link
//! drops. Loaded from a JSON file, then overridden from the environment.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable that overrides [`LinkConfig::url`].
pub const URL_ENV: &str = "TRIBECA_URL";

/// Configuration for a client link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// WebSocket endpoint of the engine.
    /// Default: ws://localhost:3000
    pub url: String,

    /// Delay before the transport dials again after losing the link.
    /// Default: 5000 ms
    pub reconnect_delay_ms: u64,

    /// Upper bound on a single connect attempt.
    /// Default: 10000 ms
    pub connect_timeout_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:3000".to_string(),
            reconnect_delay_ms: 5_000,
            connect_timeout_ms: 10_000,
        }
    }
}

impl LinkConfig {
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Reads a JSON file. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// - `Error::Io`: file unreadable
    /// - `Error::Json`: malformed JSON
    /// - `Error::Config`: see [`LinkConfig::validate`]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        let config: LinkConfig = serde_json::from_slice(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `TRIBECA_URL` if set and non-empty.
    pub fn with_env_overrides(self) -> Self {
        match std::env::var(URL_ENV) {
            Ok(url) if !url.trim().is_empty() => self.with_url(url.trim()),
            _ => self,
        }
    }

    /// # Errors
    ///
    /// `Error::Config` if the URL is not `ws://` or `wss://`, or the
    /// connect timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(Error::Config(format!(
                "url must use ws:// or wss://, got {:?}",
                self.url
            )));
        }
        if self.connect_timeout_ms == 0 {
            return Err(Error::Config("connect_timeout_ms must be > 0".into()));
        }
        Ok(())
    }
}
