//! Guest session cache
//!
//! Unauthenticated conversations live only in a single on-device JSON file
//! under the user data directory, capped at the most recent
//! [`MAX_GUEST_MESSAGES`] messages. Writes are budgeted: when a record
//! exceeds the configured byte quota the cache is cleared and the write is
//! retried with only the last [`QUOTA_FALLBACK_MESSAGES`] messages, and the
//! caller is told so it can surface a truncation warning. The cache is
//! cleared for good once the Sync Coordinator migrates it to an account.

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::assistant::message::ChatMessage;
use crate::config::GuestCacheConfig;
use crate::error::{GasketError, Result};

/// Maximum messages retained in the guest cache.
pub const MAX_GUEST_MESSAGES: usize = 10;

/// Messages retained after a quota failure.
pub const QUOTA_FALLBACK_MESSAGES: usize = 3;

/// Cache file name under the data directory.
const CACHE_FILE: &str = "guest_session.json";

/// Persisted guest conversation record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuestSessionRecord {
    /// Session id the guest conversation runs under
    pub chat_id: Uuid,
    /// Most recent messages, capped at [`MAX_GUEST_MESSAGES`]
    pub messages: Vec<ChatMessage>,
    /// Plain-text history mirror, capped alongside `messages`
    pub message_history: Vec<String>,
    /// Time of the last save
    pub timestamp: DateTime<Utc>,
}

/// Outcome of a guest-cache save
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Record written within budget
    Saved,
    /// Quota forced eviction down to the fallback tail
    Truncated,
}

/// File-backed cache for an unauthenticated user's conversation
///
/// # Examples
///
/// ```no_run
/// use gasket::config::GuestCacheConfig;
/// use gasket::session::GuestCache;
///
/// # fn example() -> gasket::error::Result<()> {
/// let cache = GuestCache::new(&GuestCacheConfig::default())?;
/// if cache.has_guest_session() {
///     let record = cache.load()?;
/// }
/// # Ok(())
/// # }
/// ```
pub struct GuestCache {
    path: PathBuf,
    quota_bytes: usize,
}

impl GuestCache {
    /// Create a cache at the configured or default location
    ///
    /// The path resolves, in order: the `GASKET_GUEST_CACHE` environment
    /// variable, the configured path, the user data directory.
    pub fn new(config: &GuestCacheConfig) -> Result<Self> {
        let path = if let Ok(override_path) = std::env::var("GASKET_GUEST_CACHE") {
            PathBuf::from(override_path)
        } else if let Some(configured) = &config.path {
            configured.clone()
        } else {
            let proj_dirs = ProjectDirs::from("com", "gasket-dev", "gasket").ok_or_else(|| {
                GasketError::Storage("Could not determine data directory".into())
            })?;
            proj_dirs.data_dir().join(CACHE_FILE)
        };

        Ok(Self::with_path(path, config.quota_bytes))
    }

    /// Create a cache at an explicit path with an explicit quota
    ///
    /// Primarily useful for tests pointing at a temporary directory.
    pub fn with_path(path: impl Into<PathBuf>, quota_bytes: usize) -> Self {
        Self {
            path: path.into(),
            quota_bytes,
        }
    }

    /// Persist the guest conversation, enforcing the message cap and quota
    ///
    /// Messages and history are truncated to the most recent
    /// [`MAX_GUEST_MESSAGES`] entries before writing. A record over the byte
    /// quota triggers the fallback path: clear the cache, keep only the last
    /// [`QUOTA_FALLBACK_MESSAGES`] messages, and report
    /// [`SaveOutcome::Truncated`].
    ///
    /// # Errors
    ///
    /// Returns [`GasketError::GuestQuotaExceeded`] when even the fallback
    /// record does not fit the quota, or a storage error when the write
    /// fails.
    pub fn save(
        &self,
        chat_id: Uuid,
        messages: &[ChatMessage],
        history: &[String],
    ) -> Result<SaveOutcome> {
        let record = build_record(chat_id, messages, history, MAX_GUEST_MESSAGES);
        let serialized = serde_json::to_vec(&record)?;

        if serialized.len() <= self.quota_bytes {
            self.write(&serialized)?;
            return Ok(SaveOutcome::Saved);
        }

        tracing::warn!(
            "guest record is {} bytes, over the {} byte quota; evicting to the last {}",
            serialized.len(),
            self.quota_bytes,
            QUOTA_FALLBACK_MESSAGES
        );
        self.clear()?;

        let fallback = build_record(chat_id, messages, history, QUOTA_FALLBACK_MESSAGES);
        let serialized = serde_json::to_vec(&fallback)?;
        if serialized.len() > self.quota_bytes {
            return Err(GasketError::GuestQuotaExceeded {
                limit: self.quota_bytes,
                message: format!("fallback record is still {} bytes", serialized.len()),
            }
            .into());
        }

        self.write(&serialized)?;
        Ok(SaveOutcome::Truncated)
    }

    /// Load the cached record, if any
    ///
    /// A missing file is `None`. A corrupt file is logged and treated as
    /// absent rather than propagated; the next save overwrites it.
    pub fn load(&self) -> Result<Option<GuestSessionRecord>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(GasketError::Storage(e.to_string()).into()),
        };

        match serde_json::from_slice(&bytes) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::warn!("guest cache is corrupt, treating as absent: {}", e);
                Ok(None)
            }
        }
    }

    /// True when a cached guest session exists on disk
    pub fn has_guest_session(&self) -> bool {
        self.path.exists()
    }

    /// Remove the cache file; idempotent
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(GasketError::Storage(e.to_string()).into()),
        }
    }

    fn write(&self, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| GasketError::Storage(e.to_string()))?;
        }
        std::fs::write(&self.path, bytes).map_err(|e| GasketError::Storage(e.to_string()))?;
        Ok(())
    }
}

fn build_record(
    chat_id: Uuid,
    messages: &[ChatMessage],
    history: &[String],
    cap: usize,
) -> GuestSessionRecord {
    let tail = |len: usize| len.saturating_sub(cap);
    GuestSessionRecord {
        chat_id,
        messages: messages[tail(messages.len())..].to_vec(),
        message_history: history[tail(history.len())..].to_vec(),
        timestamp: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::identity::new_session_id;
    use tempfile::tempdir;

    fn cache_in(dir: &tempfile::TempDir, quota: usize) -> GuestCache {
        GuestCache::with_path(dir.path().join("guest_session.json"), quota)
    }

    fn sample_messages(count: usize) -> Vec<ChatMessage> {
        (0..count)
            .map(|i| ChatMessage::user(format!("message {}", i)))
            .collect()
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let cache = cache_in(&dir, 256 * 1024);
        let chat_id = new_session_id();
        let messages = sample_messages(2);
        let history = vec!["message 0".to_string(), "message 1".to_string()];

        let outcome = cache.save(chat_id, &messages, &history).unwrap();
        assert_eq!(outcome, SaveOutcome::Saved);

        let record = cache.load().unwrap().unwrap();
        assert_eq!(record.chat_id, chat_id);
        assert_eq!(record.messages, messages);
        assert_eq!(record.message_history, history);
    }

    #[test]
    fn test_save_caps_at_ten_messages() {
        let dir = tempdir().unwrap();
        let cache = cache_in(&dir, 256 * 1024);
        let messages = sample_messages(25);
        let history: Vec<String> = messages.iter().map(|m| m.text.clone()).collect();

        cache.save(new_session_id(), &messages, &history).unwrap();

        let record = cache.load().unwrap().unwrap();
        assert_eq!(record.messages.len(), MAX_GUEST_MESSAGES);
        // The most recent messages survive.
        assert_eq!(record.messages.last().unwrap().text, "message 24");
        assert_eq!(record.messages.first().unwrap().text, "message 15");
        assert_eq!(record.message_history.len(), MAX_GUEST_MESSAGES);
    }

    #[test]
    fn test_quota_failure_evicts_to_three() {
        let dir = tempdir().unwrap();
        // Budget sized so ten messages overflow but three fit.
        let cache = cache_in(&dir, 1400);
        let messages = sample_messages(10);
        let history: Vec<String> = messages.iter().map(|m| m.text.clone()).collect();

        let outcome = cache.save(new_session_id(), &messages, &history).unwrap();
        assert_eq!(outcome, SaveOutcome::Truncated);

        let record = cache.load().unwrap().unwrap();
        assert!(record.messages.len() <= QUOTA_FALLBACK_MESSAGES);
        assert_eq!(record.messages.last().unwrap().text, "message 9");
    }

    #[test]
    fn test_quota_failure_even_after_fallback_errors() {
        let dir = tempdir().unwrap();
        let cache = cache_in(&dir, 16);
        let messages = sample_messages(10);

        let err = cache.save(new_session_id(), &messages, &[]).unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
        // The oversized record was not left behind.
        assert!(!cache.has_guest_session());
    }

    #[test]
    fn test_load_missing_file_is_none() {
        let dir = tempdir().unwrap();
        let cache = cache_in(&dir, 1024);
        assert!(cache.load().unwrap().is_none());
        assert!(!cache.has_guest_session());
    }

    #[test]
    fn test_load_corrupt_file_is_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("guest_session.json");
        std::fs::write(&path, b"{not json").unwrap();

        let cache = GuestCache::with_path(path, 1024);
        assert!(cache.load().unwrap().is_none());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let dir = tempdir().unwrap();
        let cache = cache_in(&dir, 256 * 1024);
        cache
            .save(new_session_id(), &sample_messages(1), &[])
            .unwrap();

        cache.clear().unwrap();
        cache.clear().unwrap();
        assert!(!cache.has_guest_session());
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("nested").join("guest_session.json");
        let cache = GuestCache::with_path(nested, 256 * 1024);

        cache
            .save(new_session_id(), &sample_messages(1), &[])
            .unwrap();
        assert!(cache.has_guest_session());
    }
}
