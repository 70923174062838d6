//! Error types for Gasket
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Gasket operations
///
/// This enum encompasses all possible errors that can occur during
/// configuration loading, chat backend calls, guest-cache persistence,
/// sync migration, and assistant requests.
#[derive(Error, Debug)]
pub enum GasketError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Chat backend errors (session/message persistence calls)
    #[error("Backend error: {0}")]
    Backend(String),

    /// Realtime subscription errors (SSE channel setup or teardown)
    #[error("Realtime error: {0}")]
    Realtime(String),

    /// Assistant endpoint errors (completion calls, malformed replies)
    #[error("Assistant error: {0}")]
    Assistant(String),

    /// A session identifier failed UUIDv4 validation
    ///
    /// Adapters never substitute their own identifier for a malformed one;
    /// the caller owns session identity and mints ids through
    /// [`crate::session::ensure_chat_id`].
    #[error("Invalid session id: {0}")]
    InvalidSessionId(String),

    /// Vehicle-listing validation errors (malformed URL, unsupported domain)
    #[error("Listing error: {0}")]
    Listing(String),

    /// Part-photo validation errors (non-image data, oversized file)
    #[error("Part photo error: {0}")]
    PartPhoto(String),

    /// Guest-cache quota exceeded even after fallback eviction
    #[error("Guest cache quota exceeded: limit={limit} bytes, {message}")]
    GuestQuotaExceeded {
        /// The configured byte budget that was exceeded
        limit: usize,
        /// Additional message explaining the failure
        message: String,
    },

    /// Guest-to-account sync migration errors
    #[error("Sync error: {0}")]
    Sync(String),

    /// Local storage errors (guest cache file, SQLite backend)
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for Gasket operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
