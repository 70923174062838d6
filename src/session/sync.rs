//! Guest-to-account sync coordinator
//!
//! When a user signs in with a guest conversation still on disk, the
//! coordinator creates one authenticated session from it, replays every
//! cached message in original order preserving sender role, and clears the
//! cache. A failure anywhere during replay leaves the cache intact so the
//! next sign-in detection (or an explicit sync command) can retry; nothing
//! retries automatically, matching the no-retry error policy.

use uuid::Uuid;

use crate::assistant::message::Sender;
use crate::backend::{session_title, ChatBackend};
use crate::error::{GasketError, Result};
use crate::session::guest::GuestCache;

/// Outcome of a completed migration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// The newly created authenticated session
    pub session_id: Uuid,
    /// Number of guest messages replayed into it
    pub migrated: usize,
}

/// Migrate a pending guest session into a new authenticated session
///
/// Returns `Ok(None)` when no guest cache exists. On success the cache is
/// cleared and the caller should switch its active session to
/// `report.session_id`. On failure the cache is left untouched.
///
/// # Errors
///
/// Propagates backend errors from session creation or message replay, and
/// cache errors from the final clear.
///
/// # Examples
///
/// ```
/// use gasket::backend::FakeBackend;
/// use gasket::config::GuestCacheConfig;
/// use gasket::session::{migrate_guest_session, GuestCache};
/// use uuid::Uuid;
///
/// # async fn example() -> gasket::error::Result<()> {
/// let cache = GuestCache::new(&GuestCacheConfig::default())?;
/// let backend = FakeBackend::new();
/// if let Some(report) = migrate_guest_session(&cache, &backend, Uuid::new_v4()).await? {
///     println!("migrated {} messages", report.migrated);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn migrate_guest_session(
    cache: &GuestCache,
    backend: &dyn ChatBackend,
    user_id: Uuid,
) -> Result<Option<SyncReport>> {
    let Some(record) = cache.load()? else {
        return Ok(None);
    };

    if record.messages.is_empty() {
        tracing::debug!("guest cache is empty, clearing without migration");
        cache.clear()?;
        return Ok(None);
    }

    let title = record
        .messages
        .iter()
        .find(|m| m.sender == Sender::User)
        .map(|m| session_title(&m.text))
        .unwrap_or_else(|| "Guest conversation".to_string());

    let session_id = backend
        .create_session(&title, Some(user_id))
        .await
        .map_err(|e| GasketError::Sync(format!("could not create session: {}", e)))?;

    for (index, message) in record.messages.iter().enumerate() {
        let stored = match message.sender {
            Sender::User => backend.store_user_message(message, session_id).await,
            Sender::Ai => backend.store_ai_message(message, session_id).await,
        };
        if let Err(e) = stored {
            // Cache stays intact; the next sign-in retries from scratch.
            return Err(GasketError::Sync(format!(
                "replay failed at message {} of {}: {}",
                index + 1,
                record.messages.len(),
                e
            ))
            .into());
        }
    }

    cache.clear()?;
    tracing::info!(
        "migrated {} guest messages into session {}",
        record.messages.len(),
        session_id
    );

    Ok(Some(SyncReport {
        session_id,
        migrated: record.messages.len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::message::ChatMessage;
    use crate::backend::FakeBackend;
    use crate::session::guest::GuestCache;
    use crate::session::identity::new_session_id;
    use tempfile::tempdir;

    fn seeded_cache(dir: &tempfile::TempDir, messages: &[ChatMessage]) -> GuestCache {
        let cache = GuestCache::with_path(dir.path().join("guest_session.json"), 256 * 1024);
        let history: Vec<String> = messages.iter().map(|m| m.text.clone()).collect();
        cache
            .save(new_session_id(), messages, &history)
            .expect("seed save failed");
        cache
    }

    #[tokio::test]
    async fn test_migration_creates_one_session_with_all_messages_in_order() {
        let dir = tempdir().unwrap();
        let messages = vec![
            ChatMessage::user("my 2014 Honda Civic stalls"),
            ChatMessage::ai("Let's narrow that down."),
            ChatMessage::user("only when cold"),
        ];
        let cache = seeded_cache(&dir, &messages);
        let backend = FakeBackend::new();

        let report = migrate_guest_session(&cache, &backend, Uuid::new_v4())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(report.migrated, 3);
        assert_eq!(backend.session_count(), 1);

        let replayed = backend.fetch_messages(report.session_id).await.unwrap();
        assert_eq!(replayed, messages);
    }

    #[tokio::test]
    async fn test_migration_preserves_sender_roles() {
        let dir = tempdir().unwrap();
        let messages = vec![ChatMessage::user("q"), ChatMessage::ai("a")];
        let cache = seeded_cache(&dir, &messages);
        let backend = FakeBackend::new();

        let report = migrate_guest_session(&cache, &backend, Uuid::new_v4())
            .await
            .unwrap()
            .unwrap();

        let replayed = backend.fetch_messages(report.session_id).await.unwrap();
        assert_eq!(replayed[0].sender, Sender::User);
        assert_eq!(replayed[1].sender, Sender::Ai);
    }

    #[tokio::test]
    async fn test_migration_titles_session_from_first_user_message() {
        let dir = tempdir().unwrap();
        let messages = vec![
            ChatMessage::ai("Welcome! How can I help?"),
            ChatMessage::user("Why does my transmission slip when it rains heavily?"),
        ];
        let cache = seeded_cache(&dir, &messages);
        let backend = FakeBackend::new();
        let user_id = Uuid::new_v4();

        migrate_guest_session(&cache, &backend, user_id)
            .await
            .unwrap()
            .unwrap();

        let session = backend.fetch_last_session(user_id).await.unwrap().unwrap();
        assert_eq!(session.title.chars().count(), 30);
        assert!(session.title.starts_with("Why does my transmission"));
    }

    #[tokio::test]
    async fn test_migration_clears_cache_on_success() {
        let dir = tempdir().unwrap();
        let cache = seeded_cache(&dir, &[ChatMessage::user("hello")]);
        let backend = FakeBackend::new();

        migrate_guest_session(&cache, &backend, Uuid::new_v4())
            .await
            .unwrap();
        assert!(!cache.has_guest_session());
    }

    #[tokio::test]
    async fn test_failed_replay_leaves_cache_intact() {
        let dir = tempdir().unwrap();
        let messages = vec![
            ChatMessage::user("one"),
            ChatMessage::ai("two"),
            ChatMessage::user("three"),
        ];
        let cache = seeded_cache(&dir, &messages);
        let backend = FakeBackend::failing_after(1);

        let err = migrate_guest_session(&cache, &backend, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("replay failed"));
        assert!(cache.has_guest_session());

        // A later retry against a healthy backend succeeds.
        let healthy = FakeBackend::new();
        let report = migrate_guest_session(&cache, &healthy, Uuid::new_v4())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.migrated, 3);
        assert!(!cache.has_guest_session());
    }

    #[tokio::test]
    async fn test_no_cache_is_a_noop() {
        let dir = tempdir().unwrap();
        let cache = GuestCache::with_path(dir.path().join("guest_session.json"), 1024);
        let backend = FakeBackend::new();

        let report = migrate_guest_session(&cache, &backend, Uuid::new_v4())
            .await
            .unwrap();
        assert!(report.is_none());
        assert_eq!(backend.session_count(), 0);
    }
}
