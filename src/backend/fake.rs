//! In-memory fake backend
//!
//! A complete [`ChatBackend`] over process memory, used by unit and
//! integration tests (and handy for downstream consumers that want to
//! exercise the orchestrator without any I/O). Supports failure injection
//! so callers can test the degraded paths: sync replay abort, create-session
//! fallback, fetch degradation.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::assistant::message::ChatMessage;
use crate::backend::realtime::{MessageEvent, MessageEvents};
use crate::backend::types::ChatSession;
use crate::backend::ChatBackend;
use crate::error::{GasketError, Result};
use crate::session::identity::new_session_id;

#[derive(Default)]
struct FakeState {
    sessions: HashMap<Uuid, ChatSession>,
    messages: HashMap<Uuid, Vec<ChatMessage>>,
}

/// In-memory chat backend for tests
///
/// # Examples
///
/// ```
/// use gasket::assistant::ChatMessage;
/// use gasket::backend::{ChatBackend, FakeBackend};
///
/// # async fn example() -> gasket::error::Result<()> {
/// let backend = FakeBackend::new();
/// let session_id = backend.create_session("Test", None).await?;
/// backend
///     .store_user_message(&ChatMessage::user("hi"), session_id)
///     .await?;
/// assert_eq!(backend.fetch_messages(session_id).await?.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct FakeBackend {
    state: Mutex<FakeState>,
    events: broadcast::Sender<(Uuid, ChatMessage)>,
    stores_before_failure: Option<usize>,
    store_count: AtomicUsize,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBackend {
    /// Create an empty fake backend
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            state: Mutex::new(FakeState::default()),
            events,
            stores_before_failure: None,
            store_count: AtomicUsize::new(0),
        }
    }

    /// Create a fake that fails every message store after `n` successes
    ///
    /// Used to exercise mid-replay sync failures.
    pub fn failing_after(n: usize) -> Self {
        Self {
            stores_before_failure: Some(n),
            ..Self::new()
        }
    }

    /// Total messages stored across all sessions
    pub fn stored_message_count(&self) -> usize {
        let state = self.state.lock().expect("fake state poisoned");
        state.messages.values().map(|m| m.len()).sum()
    }

    /// Number of sessions created
    pub fn session_count(&self) -> usize {
        let state = self.state.lock().expect("fake state poisoned");
        state.sessions.len()
    }

    fn store(&self, message: &ChatMessage, session_id: Uuid) -> Result<()> {
        if let Some(limit) = self.stores_before_failure {
            let n = self.store_count.fetch_add(1, Ordering::SeqCst);
            if n >= limit {
                return Err(GasketError::Backend("injected store failure".to_string()).into());
            }
        }

        let mut state = self.state.lock().expect("fake state poisoned");
        if !state.sessions.contains_key(&session_id) {
            return Err(
                GasketError::Backend(format!("No session with id {}", session_id)).into(),
            );
        }
        state
            .messages
            .entry(session_id)
            .or_default()
            .push(message.clone());
        if let Some(session) = state.sessions.get_mut(&session_id) {
            session.updated_at = Utc::now();
        }
        drop(state);

        let _ = self.events.send((session_id, message.clone()));
        Ok(())
    }
}

#[async_trait]
impl ChatBackend for FakeBackend {
    async fn create_session(&self, title: &str, user_id: Option<Uuid>) -> Result<Uuid> {
        let now = Utc::now();
        let session = ChatSession {
            id: new_session_id(),
            user_id,
            title: title.to_string(),
            created_at: now,
            updated_at: now,
        };
        let id = session.id;

        let mut state = self.state.lock().expect("fake state poisoned");
        state.sessions.insert(id, session);
        state.messages.insert(id, Vec::new());
        Ok(id)
    }

    async fn store_user_message(&self, message: &ChatMessage, session_id: Uuid) -> Result<()> {
        self.store(message, session_id)
    }

    async fn store_ai_message(&self, message: &ChatMessage, session_id: Uuid) -> Result<()> {
        self.store(message, session_id)
    }

    async fn fetch_messages(&self, session_id: Uuid) -> Result<Vec<ChatMessage>> {
        let state = self.state.lock().expect("fake state poisoned");
        Ok(state.messages.get(&session_id).cloned().unwrap_or_default())
    }

    async fn fetch_last_session(&self, user_id: Uuid) -> Result<Option<ChatSession>> {
        let state = self.state.lock().expect("fake state poisoned");
        Ok(state
            .sessions
            .values()
            .filter(|s| s.user_id == Some(user_id))
            .max_by_key(|s| s.updated_at)
            .cloned())
    }

    async fn list_sessions(&self, user_id: Option<Uuid>) -> Result<Vec<ChatSession>> {
        let state = self.state.lock().expect("fake state poisoned");
        let mut sessions: Vec<ChatSession> = state
            .sessions
            .values()
            .filter(|s| user_id.is_none() || s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    async fn rename_session(&self, session_id: Uuid, title: &str) -> Result<()> {
        let mut state = self.state.lock().expect("fake state poisoned");
        match state.sessions.get_mut(&session_id) {
            Some(session) => {
                // updated_at intentionally untouched.
                session.title = title.to_string();
                Ok(())
            }
            None => {
                Err(GasketError::Backend(format!("No session with id {}", session_id)).into())
            }
        }
    }

    async fn delete_session(&self, session_id: Uuid) -> Result<()> {
        let mut state = self.state.lock().expect("fake state poisoned");
        state.sessions.remove(&session_id);
        state.messages.remove(&session_id);
        Ok(())
    }

    async fn subscribe(&self, session_id: Uuid) -> Result<MessageEvents> {
        let mut events = self.events.subscribe();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((event_session, message)) = events.recv().await {
                if event_session != session_id {
                    continue;
                }
                if tx.send(MessageEvent::Inserted(message)).is_err() {
                    break;
                }
            }
        });

        Ok(rx)
    }
}
