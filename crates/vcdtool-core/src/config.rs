//! Connection and polling configuration.
//!
//! Configuration is usually loaded from a TOML file:
//!
//! ```toml
//! [connection]
//! api_url = "https://vcd.example.com/api"
//! username = "administrator@System"
//! password = "secret"
//!
//! [polling.descriptor]
//! interval_ms = 1000
//! max_attempts = 0   # wait indefinitely
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::poll::PollPolicy;

/// Default API version sent in the `Accept` header.
pub const DEFAULT_API_VERSION: &str = "5.5";

/// Full client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VcdConfig {
    /// Server and credential settings.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Poll intervals and attempt budgets.
    #[serde(default)]
    pub polling: PollingConfig,
}

/// Server and credential settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Root of the REST API, e.g. `https://vcd.example.com/api`.
    #[serde(default)]
    pub api_url: String,

    /// Login name, usually `user@org`.
    #[serde(default)]
    pub username: String,

    /// Login password.
    #[serde(default)]
    pub password: String,

    /// API version requested through the `Accept` header.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Verify the server's TLS certificate.
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,

    /// Per-request timeout in seconds. Unset means no timeout, which large
    /// disk uploads need.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_verify_tls() -> bool {
    true
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            username: String::new(),
            password: String::new(),
            api_version: default_api_version(),
            verify_tls: default_verify_tls(),
            request_timeout_secs: None,
        }
    }
}

impl ConnectionConfig {
    /// Check that the settings needed to log in are present.
    pub fn validate(&self) -> Result<()> {
        if self.api_url.trim().is_empty() {
            return Err(Error::config("api_url is not set"));
        }
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            return Err(Error::config(format!(
                "api_url must start with http:// or https://, got '{}'",
                self.api_url
            )));
        }
        if self.username.is_empty() {
            return Err(Error::config("username is not set"));
        }
        if self.password.is_empty() {
            return Err(Error::config("password is not set"));
        }
        Ok(())
    }

    /// The per-request timeout, if one is configured.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Interval and attempt budget for one polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSettings {
    /// Delay between probes in milliseconds.
    pub interval_ms: u64,
    /// Maximum number of probes; 0 waits indefinitely.
    pub max_attempts: u32,
}

impl PollSettings {
    /// Build the runtime policy for these settings.
    pub fn policy(&self) -> PollPolicy {
        let max_attempts = if self.max_attempts == 0 {
            None
        } else {
            Some(self.max_attempts)
        };
        PollPolicy::new(Duration::from_millis(self.interval_ms), max_attempts)
    }
}

/// Polling settings for each waiting step of the upload flows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Waiting for the server to process an uploaded OVF descriptor.
    #[serde(default = "default_descriptor_poll")]
    pub descriptor: PollSettings,

    /// Waiting for template disk transfers to reach 100%.
    #[serde(default = "default_template_progress_poll")]
    pub template_progress: PollSettings,

    /// Waiting for an ISO media transfer to reach 100%.
    #[serde(default = "default_media_progress_poll")]
    pub media_progress: PollSettings,
}

fn default_descriptor_poll() -> PollSettings {
    PollSettings {
        interval_ms: 1_000,
        max_attempts: 600,
    }
}

fn default_template_progress_poll() -> PollSettings {
    PollSettings {
        interval_ms: 2_000,
        max_attempts: 1_800,
    }
}

fn default_media_progress_poll() -> PollSettings {
    PollSettings {
        interval_ms: 500,
        max_attempts: 7_200,
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            descriptor: default_descriptor_poll(),
            template_progress: default_template_progress_poll(),
            media_progress: default_media_progress_poll(),
        }
    }
}

impl VcdConfig {
    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(e, path))?;
        Self::from_toml(&content)
    }
}
