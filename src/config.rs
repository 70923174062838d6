//! Configuration management for Gasket
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;
use uuid::Uuid;

use crate::error::{GasketError, Result};

/// Main configuration structure for Gasket
///
/// This structure holds all configuration needed for the orchestrator:
/// the chat backend, the assistant endpoint, the guest cache, and chat
/// behavior.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Chat backend configuration (REST, SQLite)
    #[serde(default)]
    pub backend: BackendConfig,

    /// Assistant function-endpoint configuration
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Guest session cache configuration
    #[serde(default)]
    pub guest: GuestCacheConfig,

    /// Chat behavior configuration
    #[serde(default)]
    pub chat: ChatConfig,
}

/// Chat backend configuration
///
/// Specifies which backend to use and its settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Type of backend to use ("rest" or "sqlite")
    #[serde(rename = "type", default = "default_backend_type")]
    pub backend_type: String,

    /// REST backend configuration
    #[serde(default)]
    pub rest: RestBackendConfig,

    /// SQLite backend configuration
    #[serde(default)]
    pub sqlite: SqliteBackendConfig,
}

fn default_backend_type() -> String {
    "rest".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            backend_type: default_backend_type(),
            rest: RestBackendConfig::default(),
            sqlite: SqliteBackendConfig::default(),
        }
    }
}

/// REST backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestBackendConfig {
    /// Base URL of the hosted store
    #[serde(default = "default_rest_base_url")]
    pub base_url: String,

    /// API key sent as `apikey` and bearer token; normally provided via
    /// the `GASKET_API_KEY` environment variable at deploy time
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request timeout (seconds)
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_rest_base_url() -> String {
    "http://localhost:54321".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

impl Default for RestBackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_rest_base_url(),
            api_key: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// SQLite backend configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SqliteBackendConfig {
    /// Database file path; defaults to the user data directory
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Assistant function-endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Endpoint URL of the hosted completion function
    #[serde(default = "default_assistant_endpoint")]
    pub endpoint: String,

    /// Bearer token for the endpoint; normally provided via the
    /// `GASKET_ASSISTANT_KEY` environment variable at deploy time
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request timeout (seconds); the pipeline also races its own
    /// 30-second budget
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_assistant_endpoint() -> String {
    "http://localhost:54321/functions/v1/assistant".to_string()
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            endpoint: default_assistant_endpoint(),
            api_key: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// Guest session cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestCacheConfig {
    /// Cache file path; defaults to the user data directory
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Byte budget for the cache record before fallback eviction
    #[serde(default = "default_guest_quota_bytes")]
    pub quota_bytes: usize,
}

fn default_guest_quota_bytes() -> usize {
    256 * 1024
}

impl Default for GuestCacheConfig {
    fn default() -> Self {
        Self {
            path: None,
            quota_bytes: default_guest_quota_bytes(),
        }
    }
}

/// Chat behavior configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Authenticated user id; absent means guest mode
    #[serde(default)]
    pub user_id: Option<Uuid>,

    /// Preselected vehicle, e.g. "2015 Toyota Camry"
    #[serde(default)]
    pub vehicle: Option<String>,
}

impl Config {
    /// Load configuration from a file, environment, and CLI overrides
    ///
    /// A missing file yields the defaults so the CLI works out of the box.
    /// Environment overrides: `GASKET_API_KEY` (store) and
    /// `GASKET_ASSISTANT_KEY` (assistant endpoint). CLI overrides win over
    /// both file and environment.
    ///
    /// # Errors
    ///
    /// Returns error when the file exists but cannot be read or parsed, or
    /// when a CLI override is malformed.
    pub fn load(path: impl AsRef<Path>, cli: &crate::cli::Cli) -> Result<Self> {
        let path = path.as_ref();

        let mut config: Config = if path.exists() {
            let contents = std::fs::read_to_string(path).map_err(|e| {
                GasketError::Config(format!("Failed to read {}: {}", path.display(), e))
            })?;
            serde_yaml::from_str(&contents)
                .map_err(|e| GasketError::Config(format!("Failed to parse config: {}", e)))?
        } else {
            tracing::debug!("no config file at {}, using defaults", path.display());
            Config::default()
        };

        if let Ok(key) = std::env::var("GASKET_API_KEY") {
            config.backend.rest.api_key = Some(key);
        }
        if let Ok(key) = std::env::var("GASKET_ASSISTANT_KEY") {
            config.assistant.api_key = Some(key);
        }

        if let Some(backend_type) = &cli.backend {
            config.backend.backend_type = backend_type.clone();
        }
        if let Some(user) = &cli.user {
            let user_id = Uuid::parse_str(user)
                .map_err(|e| GasketError::Config(format!("Invalid user id {:?}: {}", user, e)))?;
            config.chat.user_id = Some(user_id);
        }

        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`GasketError::Config`] for an unknown backend type, an
    /// unparseable URL, or a zero timeout/quota.
    pub fn validate(&self) -> Result<()> {
        match self.backend.backend_type.as_str() {
            "rest" | "sqlite" => {}
            other => {
                return Err(
                    GasketError::Config(format!("Unknown backend type: {}", other)).into(),
                )
            }
        }

        Url::parse(&self.backend.rest.base_url)
            .map_err(|e| GasketError::Config(format!("Invalid backend base_url: {}", e)))?;
        Url::parse(&self.assistant.endpoint)
            .map_err(|e| GasketError::Config(format!("Invalid assistant endpoint: {}", e)))?;

        if self.backend.rest.timeout_seconds == 0 || self.assistant.timeout_seconds == 0 {
            return Err(GasketError::Config("Timeouts must be non-zero".to_string()).into());
        }
        if self.guest.quota_bytes == 0 {
            return Err(
                GasketError::Config("Guest cache quota must be non-zero".to_string()).into(),
            );
        }

        Ok(())
    }
}
