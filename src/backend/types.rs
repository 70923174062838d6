//! Shared persistence types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted chat session
///
/// Created on the first message of a conversation. `updated_at` tracks the
/// latest message; rename is metadata-only and leaves it untouched so the
/// session list keeps ordering by actual conversation activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    /// Session identifier (client-minted UUIDv4)
    pub id: Uuid,
    /// Owning user, `None` for sessions created before sign-in
    pub user_id: Option<Uuid>,
    /// Display title, derived from the first user message
    pub title: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Time of the latest message
    pub updated_at: DateTime<Utc>,
}

/// Maximum characters kept when deriving a title from a message.
pub const TITLE_MAX_CHARS: usize = 30;

/// Derive a session title from the first user message
///
/// # Examples
///
/// ```
/// use gasket::backend::session_title;
///
/// assert_eq!(session_title("Short question"), "Short question");
/// assert_eq!(
///     session_title("This question is much longer than thirty characters"),
///     "This question is much longer t"
/// );
/// ```
pub fn session_title(first_message: &str) -> String {
    let trimmed = first_message.trim();
    if trimmed.is_empty() {
        return "New conversation".to_string();
    }
    trimmed.chars().take(TITLE_MAX_CHARS).collect()
}
