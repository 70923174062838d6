//! In-memory message store for the active session
//!
//! Pure state container: messages are appended in the order their initiating
//! events fired, and appends are idempotent by message id so optimistic
//! local inserts and realtime echoes of the same row collapse to one entry.

use std::collections::HashSet;

use uuid::Uuid;

use crate::assistant::message::{ChatMessage, Sender};

/// Ordered, deduplicated message sequence for one active session
///
/// The store owns its messages for the lifetime of the active session;
/// switching sessions replaces the contents wholesale.
///
/// # Examples
///
/// ```
/// use gasket::assistant::ChatMessage;
/// use gasket::session::MessageStore;
///
/// let mut store = MessageStore::new();
/// let msg = ChatMessage::user("hello");
/// assert!(store.append(msg.clone()));
/// assert!(!store.append(msg)); // same id: deduplicated
/// assert_eq!(store.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MessageStore {
    session_id: Option<Uuid>,
    messages: Vec<ChatMessage>,
    seen: HashSet<Uuid>,
}

impl MessageStore {
    /// Create an empty store with no active session
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store bound to a session id
    pub fn with_session(session_id: Uuid) -> Self {
        Self {
            session_id: Some(session_id),
            ..Self::default()
        }
    }

    /// The active session id, if one is bound
    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    /// Bind a new active session, clearing all held messages
    pub fn switch_session(&mut self, session_id: Uuid) {
        self.session_id = Some(session_id);
        self.messages.clear();
        self.seen.clear();
    }

    /// Append a message, deduplicating by id
    ///
    /// Returns `true` when the message was added, `false` when a message
    /// with the same id is already present.
    pub fn append(&mut self, message: ChatMessage) -> bool {
        if !self.seen.insert(message.id) {
            tracing::debug!("dropping duplicate message {}", message.id);
            return false;
        }
        self.messages.push(message);
        true
    }

    /// Replace the store contents with fetched history
    ///
    /// Used when resuming a persisted session; ids are re-registered so
    /// realtime echoes of old rows stay deduplicated.
    pub fn replace(&mut self, messages: Vec<ChatMessage>) {
        self.seen = messages.iter().map(|m| m.id).collect();
        self.messages = messages;
    }

    /// All messages in append order
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Message texts in append order (guest-cache history mirror)
    pub fn history(&self) -> Vec<String> {
        self.messages.iter().map(|m| m.text.clone()).collect()
    }

    /// Text of the first user message, used to derive session titles
    pub fn first_user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.sender == Sender::User)
            .map(|m| m.text.as_str())
    }

    /// Number of messages held
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True when no messages are held
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop all messages but keep the session binding
    pub fn clear(&mut self) {
        self.messages.clear();
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::identity::new_session_id;

    #[test]
    fn test_new_store_is_empty() {
        let store = MessageStore::new();
        assert!(store.is_empty());
        assert!(store.session_id().is_none());
    }

    #[test]
    fn test_append_preserves_order() {
        let mut store = MessageStore::new();
        store.append(ChatMessage::user("first"));
        store.append(ChatMessage::ai("second"));
        store.append(ChatMessage::user("third"));

        let texts: Vec<&str> = store.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_append_is_idempotent_by_id() {
        let mut store = MessageStore::new();
        let msg = ChatMessage::user("once");

        assert!(store.append(msg.clone()));
        assert!(!store.append(msg.clone()));
        assert!(!store.append(msg));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_realtime_echo_deduplicates() {
        // A realtime insert event carries the same client-generated id as
        // the optimistic append; only one entry survives.
        let mut store = MessageStore::with_session(new_session_id());
        let optimistic = ChatMessage::user("hello");
        let echo = optimistic.clone();

        store.append(optimistic);
        store.append(echo);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_switch_session_clears_messages() {
        let mut store = MessageStore::with_session(new_session_id());
        store.append(ChatMessage::user("old session"));

        let next = new_session_id();
        store.switch_session(next);
        assert!(store.is_empty());
        assert_eq!(store.session_id(), Some(next));
    }

    #[test]
    fn test_replace_registers_ids_for_dedup() {
        let mut store = MessageStore::new();
        let fetched = vec![ChatMessage::user("a"), ChatMessage::ai("b")];
        let echo = fetched[0].clone();

        store.replace(fetched);
        assert!(!store.append(echo));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_first_user_text_skips_ai_messages() {
        let mut store = MessageStore::new();
        store.append(ChatMessage::ai("welcome!"));
        store.append(ChatMessage::user("my brakes grind"));
        assert_eq!(store.first_user_text(), Some("my brakes grind"));
    }

    #[test]
    fn test_history_mirrors_texts() {
        let mut store = MessageStore::new();
        store.append(ChatMessage::user("q"));
        store.append(ChatMessage::ai("a"));
        assert_eq!(store.history(), vec!["q".to_string(), "a".to_string()]);
    }
}
