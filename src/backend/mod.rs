//! Chat backend module for Gasket
//!
//! This module contains the persistence abstraction and its
//! implementations: a PostgREST-style REST adapter for the hosted store, a
//! local SQLite backend, and an in-memory fake for tests. The backend is
//! always injected as a trait object; nothing in the crate reaches for a
//! process-wide client singleton.

pub mod fake;
pub mod realtime;
pub mod rest;
pub mod sqlite;
pub mod types;

pub use fake::FakeBackend;
pub use realtime::{MessageEvent, MessageEvents};
pub use rest::RestBackend;
pub use sqlite::SqliteBackend;
pub use types::{session_title, ChatSession, TITLE_MAX_CHARS};

use async_trait::async_trait;
use uuid::Uuid;

use crate::assistant::message::ChatMessage;
use crate::config::BackendConfig;
use crate::error::Result;

/// Persistence abstraction for chat sessions and messages
///
/// All operations are network (or local-storage) round-trips; callers in
/// the chat flow degrade gracefully on error per the orchestrator's error
/// policy, but the adapter itself always fails loudly. In particular, a
/// message can only be stored under a session id the caller validated;
/// adapters never substitute their own identifier.
///
/// # Examples
///
/// ```
/// use gasket::backend::{ChatBackend, FakeBackend};
///
/// # async fn example() -> gasket::error::Result<()> {
/// let backend = FakeBackend::new();
/// let session_id = backend.create_session("Brake noise", None).await?;
/// let messages = backend.fetch_messages(session_id).await?;
/// assert!(messages.is_empty());
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Insert a new session row and return its id
    async fn create_session(&self, title: &str, user_id: Option<Uuid>) -> Result<Uuid>;

    /// Insert a user message row under an existing session
    ///
    /// Also bumps the session's `updated_at` so session ordering follows
    /// message activity.
    async fn store_user_message(&self, message: &ChatMessage, session_id: Uuid) -> Result<()>;

    /// Insert an assistant message row under an existing session
    async fn store_ai_message(&self, message: &ChatMessage, session_id: Uuid) -> Result<()>;

    /// Fetch a session's messages ordered by creation time ascending
    async fn fetch_messages(&self, session_id: Uuid) -> Result<Vec<ChatMessage>>;

    /// Fetch the most recently updated session for a user
    async fn fetch_last_session(&self, user_id: Uuid) -> Result<Option<ChatSession>>;

    /// List sessions ordered by `updated_at` descending
    ///
    /// With a `user_id`, only that user's sessions are returned.
    async fn list_sessions(&self, user_id: Option<Uuid>) -> Result<Vec<ChatSession>>;

    /// Rename a session without touching `updated_at`
    ///
    /// Rename is metadata-only: the session list orders by `updated_at`,
    /// and a rename must not resurface a dormant conversation.
    async fn rename_session(&self, session_id: Uuid, title: &str) -> Result<()>;

    /// Delete a session and its messages
    async fn delete_session(&self, session_id: Uuid) -> Result<()>;

    /// Subscribe to insert events for a session
    ///
    /// # Default Implementation
    ///
    /// The default implementation returns an error indicating that realtime
    /// subscriptions are not supported by this backend.
    async fn subscribe(&self, _session_id: Uuid) -> Result<MessageEvents> {
        Err(crate::error::GasketError::Realtime(
            "Realtime subscriptions are not supported by this backend".to_string(),
        )
        .into())
    }
}

/// Create a backend instance based on configuration
///
/// # Arguments
///
/// * `backend_type` - Type of backend ("rest" or "sqlite")
/// * `config` - Backend configuration
///
/// # Errors
///
/// Returns error if the backend type is invalid or initialization fails
pub fn create_backend(backend_type: &str, config: &BackendConfig) -> Result<Box<dyn ChatBackend>> {
    match backend_type {
        "rest" => Ok(Box::new(RestBackend::new(config.rest.clone())?)),
        "sqlite" => Ok(Box::new(SqliteBackend::new(config.sqlite.clone())?)),
        _ => Err(crate::error::GasketError::Backend(format!(
            "Unknown backend type: {}",
            backend_type
        ))
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;

    #[test]
    fn test_create_backend_invalid_type() {
        let config = BackendConfig::default();
        let result = create_backend("invalid", &config);
        assert!(result.is_err());
    }

    #[test]
    fn test_create_backend_rest() {
        let config = BackendConfig::default();
        let result = create_backend("rest", &config);
        assert!(result.is_ok());
    }

    #[test]
    fn test_create_backend_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = BackendConfig::default();
        config.sqlite.path = Some(dir.path().join("chat.db"));

        let result = create_backend("sqlite", &config);
        assert!(result.is_ok());
    }
}
