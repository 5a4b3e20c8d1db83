//! Configuration of a mock and the server hosting it.
//!
//! Everything has a default, so an empty TOML file (or none at all) gives a
//! mock rooted at `/v1` on an ephemeral localhost port:
//!
//! ```toml
//! base_path = "/v1"
//! bind_addr = "127.0.0.1:0"
//! latency_ms = 0
//! seed_models = true
//! http_tracing = true
//! ```

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MockError, Result};

/// Environment variable naming a config file to load.
pub const CONFIG_ENV: &str = "OPENAI_RESPONSES_CONFIG";
/// Environment variable overriding `latency_ms`.
pub const LATENCY_ENV: &str = "OPENAI_RESPONSES_LATENCY_MS";

/// Upper bound on injected latency.
const MAX_LATENCY_MS: u64 = 60_000;

/// Mock configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct MockConfig {
    /// Path prefix stripped before route matching.
    pub base_path: String,
    /// Address the server binds to.
    pub bind_addr: SocketAddr,
    /// Delay before every response, in milliseconds.
    pub latency_ms: u64,
    /// Seed the model store with the built-in model table.
    pub seed_models: bool,
    /// Wrap the server's router in an HTTP trace layer.
    pub http_tracing: bool,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            base_path: "/v1".to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            latency_ms: 0,
            seed_models: true,
            http_tracing: true,
        }
    }
}

impl MockConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MockError::Config(format!(
                "failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| {
            MockError::Config(format!(
                "failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load the file named by `OPENAI_RESPONSES_CONFIG` if set, then apply
    /// `OPENAI_RESPONSES_LATENCY_MS`.
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_ENV) {
            Ok(path) => {
                let config = Self::from_file(Path::new(&path))?;
                tracing::info!("Loaded mock config from {}", path);
                config
            }
            Err(_) => Self::default(),
        };

        if let Ok(raw) = std::env::var(LATENCY_ENV) {
            config.latency_ms = raw.trim().parse().map_err(|_| {
                MockError::Config(format!("{} must be an integer, got '{}'", LATENCY_ENV, raw))
            })?;
        }
        Ok(config)
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_seed_models(mut self, seed: bool) -> Self {
        self.seed_models = seed;
        self
    }

    pub fn with_http_tracing(mut self, enabled: bool) -> Self {
        self.http_tracing = enabled;
        self
    }

    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}

/// Configuration validation error.
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigValidationError {}

impl MockConfig {
    /// Validate the configuration.
    ///
    /// Returns a list of validation errors if any are found.
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if !self.base_path.is_empty() && !self.base_path.starts_with('/') {
            errors.push(ConfigValidationError {
                field: "base_path".to_string(),
                message: format!("Base path '{}' must start with '/'.", self.base_path),
            });
        }

        if self.base_path.len() > 1 && self.base_path.ends_with('/') {
            errors.push(ConfigValidationError {
                field: "base_path".to_string(),
                message: format!("Base path '{}' must not end with '/'.", self.base_path),
            });
        }

        if self.latency_ms >= MAX_LATENCY_MS {
            errors.push(ConfigValidationError {
                field: "latency_ms".to_string(),
                message: format!(
                    "Latency of {} ms is too long. Expected less than {} ms.",
                    self.latency_ms, MAX_LATENCY_MS
                ),
            });
        }

        errors
    }

    /// Fail with every validation error joined into one message.
    pub fn ensure_valid(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            return Ok(());
        }
        let joined = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Err(MockError::Config(joined))
    }
}
