//! Command-line client configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vizlink_core::{
    DEFAULT_EXPECTED_VERSION, DEFAULT_MAX_REQUEST_BYTES, Endpoint, RetryPolicy, SessionOptions,
};

/// Top-level configuration for the client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Where the application's API server listens.
    pub network: NetworkConfig,
    /// Credentials. Empty values fall back to the environment.
    pub auth: AuthConfig,
    /// Transient failure handling.
    pub retry: RetryConfig,
    /// Protocol tuning.
    pub protocol: ProtocolConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Host including the scheme, e.g. `ws://localhost`.
    pub host: String,
    pub port: u16,
    pub path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub token: String,
    /// Enables frame encryption when non-empty.
    pub encryption_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Oldest application version this client accepts.
    pub expected_version: String,
    /// Frame budget; larger payloads are split into pages.
    pub max_request_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `RUST_LOG` takes precedence when set.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        let endpoint = Endpoint::default();
        Self {
            host: endpoint.host().into(),
            port: endpoint.port(),
            path: "/api".into(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            backoff_ms: policy.backoff.as_millis() as u64,
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            expected_version: DEFAULT_EXPECTED_VERSION.into(),
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl CliConfig {
    /// Load from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write default config to a file.
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        std::fs::write(path, Self::default_toml()?)
    }

    pub fn default_toml() -> std::io::Result<String> {
        toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.network.host.clone(), self.network.port).with_path(&self.network.path)
    }

    /// Session options; empty credentials are left for the environment.
    pub fn session_options(&self) -> SessionOptions {
        let mut options = SessionOptions::new()
            .retry(
                self.retry.max_attempts,
                Duration::from_millis(self.retry.backoff_ms),
            )
            .expected_version(&self.protocol.expected_version)
            .max_request_bytes(self.protocol.max_request_bytes);
        if !self.auth.token.is_empty() {
            options = options.auth_token(&self.auth.token);
        }
        if !self.auth.encryption_key.is_empty() {
            options = options.encryption_key(&self.auth.encryption_key);
        }
        options
    }
}

// ── Tests ────────────────────────────────────────────────────────
