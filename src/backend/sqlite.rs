//! Local SQLite chat backend
//!
//! Mirrors the hosted store's schema in a local database file for offline
//! use. Realtime subscriptions are served by echoing this process's own
//! inserts over a broadcast channel, which gives the chat flow the same
//! optimistic-append-then-echo shape it has against the hosted store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use tokio::sync::{broadcast, mpsc};
use url::Url;
use uuid::Uuid;

use crate::assistant::message::{ChatMessage, MessageBody, Sender};
use crate::backend::realtime::{MessageEvent, MessageEvents};
use crate::backend::types::ChatSession;
use crate::backend::ChatBackend;
use crate::config::SqliteBackendConfig;
use crate::error::{GasketError, Result};
use crate::session::identity::new_session_id;

/// Capacity of the local insert-echo channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// SQLite-backed chat store
///
/// # Examples
///
/// ```no_run
/// use gasket::backend::{ChatBackend, SqliteBackend};
///
/// # async fn example() -> gasket::error::Result<()> {
/// let backend = SqliteBackend::new_with_path("/tmp/gasket_chat.db")?;
/// let session_id = backend.create_session("Coolant leak", None).await?;
/// backend.fetch_messages(session_id).await?;
/// # Ok(())
/// # }
/// ```
pub struct SqliteBackend {
    db_path: PathBuf,
    events: broadcast::Sender<(Uuid, ChatMessage)>,
}

impl SqliteBackend {
    /// Create a backend at the configured or default database location
    ///
    /// The path resolves, in order: the `GASKET_CHAT_DB` environment
    /// variable, the configured path, the user data directory.
    pub fn new(config: SqliteBackendConfig) -> Result<Self> {
        if let Ok(override_path) = std::env::var("GASKET_CHAT_DB") {
            return Self::new_with_path(override_path);
        }

        if let Some(configured) = config.path {
            return Self::new_with_path(configured);
        }

        let proj_dirs = ProjectDirs::from("com", "gasket-dev", "gasket")
            .ok_or_else(|| GasketError::Storage("Could not determine data directory".into()))?;
        Self::new_with_path(proj_dirs.data_dir().join("chat.db"))
    }

    /// Create a backend that uses the specified database path
    ///
    /// This is primarily useful for tests where the default application
    /// data directory is not desirable.
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        // Ensure parent directory exists so opening the DB file succeeds.
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| GasketError::Storage(format!("Failed to create data dir: {}", e)))?;
        }

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let backend = Self { db_path, events };
        backend.init()?;
        Ok(backend)
    }

    /// Initialize the database schema
    fn init(&self) -> Result<()> {
        let conn = self.open()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS chat_sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT,
                title TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS chat_messages (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                image_url TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_chat_messages_session
                ON chat_messages(session_id, created_at);",
        )
        .map_err(|e| GasketError::Storage(format!("Failed to create tables: {}", e)))?;

        Ok(())
    }

    fn open(&self) -> Result<Connection> {
        Connection::open(&self.db_path)
            .map_err(|e| GasketError::Storage(format!("Failed to open database: {}", e)).into())
    }

    async fn insert_message(&self, message: &ChatMessage, session_id: Uuid) -> Result<()> {
        let mut conn = self.open()?;

        let tx = conn
            .transaction()
            .map_err(|e| GasketError::Storage(format!("Failed to start transaction: {}", e)))?;

        tx.execute(
            "INSERT INTO chat_messages (id, session_id, role, content, image_url, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                message.id.to_string(),
                session_id.to_string(),
                message.sender.as_role(),
                message.text,
                message.image.as_ref().map(|u| u.to_string()),
                message.timestamp.to_rfc3339(),
            ],
        )
        .map_err(|e| GasketError::Storage(format!("Failed to insert message: {}", e)))?;

        // Session ordering follows message activity.
        tx.execute(
            "UPDATE chat_sessions SET updated_at = ? WHERE id = ?",
            params![Utc::now().to_rfc3339(), session_id.to_string()],
        )
        .map_err(|e| GasketError::Storage(format!("Failed to touch session: {}", e)))?;

        tx.commit()
            .map_err(|e| GasketError::Storage(format!("Failed to commit: {}", e)))?;

        // Local insert echo for realtime subscribers; no receivers is fine.
        let _ = self.events.send((session_id, message.clone()));
        Ok(())
    }
}

fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| GasketError::Storage(format!("Bad id {}: {}", raw, e)).into())
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| GasketError::Storage(format!("Bad timestamp {}: {}", raw, e)).into())
}

fn parse_sender(raw: &str) -> Result<Sender> {
    match raw {
        "user" => Ok(Sender::User),
        "ai" => Ok(Sender::Ai),
        other => Err(GasketError::Storage(format!("Unknown role: {}", other)).into()),
    }
}

/// Raw session columns as read from SQLite.
type SessionColumns = (String, Option<String>, String, String, String);

fn map_session_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionColumns> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn session_from_columns(columns: SessionColumns) -> Result<ChatSession> {
    let (id, user_id, title, created_at, updated_at) = columns;
    Ok(ChatSession {
        id: parse_uuid(&id)?,
        user_id: user_id.as_deref().map(parse_uuid).transpose()?,
        title,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

#[async_trait]
impl ChatBackend for SqliteBackend {
    async fn create_session(&self, title: &str, user_id: Option<Uuid>) -> Result<Uuid> {
        let conn = self.open()?;
        let id = new_session_id();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO chat_sessions (id, user_id, title, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
            params![
                id.to_string(),
                user_id.map(|u| u.to_string()),
                title,
                now,
                now
            ],
        )
        .map_err(|e| GasketError::Storage(format!("Failed to insert session: {}", e)))?;

        Ok(id)
    }

    async fn store_user_message(&self, message: &ChatMessage, session_id: Uuid) -> Result<()> {
        self.insert_message(message, session_id).await
    }

    async fn store_ai_message(&self, message: &ChatMessage, session_id: Uuid) -> Result<()> {
        self.insert_message(message, session_id).await
    }

    async fn fetch_messages(&self, session_id: Uuid) -> Result<Vec<ChatMessage>> {
        let conn = self.open()?;

        let mut stmt = conn
            .prepare(
                "SELECT id, role, content, image_url, created_at
                 FROM chat_messages
                 WHERE session_id = ?
                 ORDER BY created_at ASC",
            )
            .map_err(|e| GasketError::Storage(format!("Failed to prepare statement: {}", e)))?;

        let rows = stmt
            .query_map(params![session_id.to_string()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(|e| GasketError::Storage(format!("Failed to query messages: {}", e)))?;

        let mut messages = Vec::new();
        for row in rows {
            let (id, role, content, image_url, created_at) =
                row.map_err(|e| GasketError::Storage(e.to_string()))?;
            let image = image_url
                .as_deref()
                .map(Url::parse)
                .transpose()
                .map_err(|e| GasketError::Storage(format!("Bad image URL: {}", e)))?;
            messages.push(ChatMessage {
                id: parse_uuid(&id)?,
                sender: parse_sender(&role)?,
                text: content,
                timestamp: parse_timestamp(&created_at)?,
                image,
                body: MessageBody::Plain,
            });
        }

        Ok(messages)
    }

    async fn fetch_last_session(&self, user_id: Uuid) -> Result<Option<ChatSession>> {
        let conn = self.open()?;

        let row = conn
            .query_row(
                "SELECT id, user_id, title, created_at, updated_at
                 FROM chat_sessions
                 WHERE user_id = ?
                 ORDER BY updated_at DESC
                 LIMIT 1",
                params![user_id.to_string()],
                map_session_row,
            )
            .optional()
            .map_err(|e| GasketError::Storage(format!("Failed to query session: {}", e)))?;

        row.map(session_from_columns).transpose()
    }

    async fn list_sessions(&self, user_id: Option<Uuid>) -> Result<Vec<ChatSession>> {
        let conn = self.open()?;

        let (query, filter) = match user_id {
            Some(user_id) => (
                "SELECT id, user_id, title, created_at, updated_at
                 FROM chat_sessions WHERE user_id = ? ORDER BY updated_at DESC",
                Some(user_id.to_string()),
            ),
            None => (
                "SELECT id, user_id, title, created_at, updated_at
                 FROM chat_sessions ORDER BY updated_at DESC",
                None,
            ),
        };

        let mut stmt = conn
            .prepare(query)
            .map_err(|e| GasketError::Storage(format!("Failed to prepare statement: {}", e)))?;

        let rows = match &filter {
            Some(user_id) => stmt.query_map(params![user_id], map_session_row),
            None => stmt.query_map([], map_session_row),
        }
        .map_err(|e| GasketError::Storage(format!("Failed to query sessions: {}", e)))?;

        let mut sessions = Vec::new();
        for row in rows {
            let columns = row.map_err(|e| GasketError::Storage(e.to_string()))?;
            sessions.push(session_from_columns(columns)?);
        }
        Ok(sessions)
    }

    async fn rename_session(&self, session_id: Uuid, title: &str) -> Result<()> {
        let conn = self.open()?;

        // Title only: rename must not bump updated_at and reshuffle the
        // session list.
        let changed = conn
            .execute(
                "UPDATE chat_sessions SET title = ? WHERE id = ?",
                params![title, session_id.to_string()],
            )
            .map_err(|e| GasketError::Storage(format!("Failed to rename session: {}", e)))?;

        if changed == 0 {
            return Err(
                GasketError::Backend(format!("No session with id {}", session_id)).into(),
            );
        }
        Ok(())
    }

    async fn delete_session(&self, session_id: Uuid) -> Result<()> {
        let mut conn = self.open()?;

        let tx = conn
            .transaction()
            .map_err(|e| GasketError::Storage(format!("Failed to start transaction: {}", e)))?;

        tx.execute(
            "DELETE FROM chat_messages WHERE session_id = ?",
            params![session_id.to_string()],
        )
        .map_err(|e| GasketError::Storage(format!("Failed to delete messages: {}", e)))?;

        tx.execute(
            "DELETE FROM chat_sessions WHERE id = ?",
            params![session_id.to_string()],
        )
        .map_err(|e| GasketError::Storage(format!("Failed to delete session: {}", e)))?;

        tx.commit()
            .map_err(|e| GasketError::Storage(format!("Failed to commit: {}", e)))?;
        Ok(())
    }

    async fn subscribe(&self, session_id: Uuid) -> Result<MessageEvents> {
        let mut events = self.events.subscribe();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok((event_session, message)) => {
                        if event_session != session_id {
                            continue;
                        }
                        if tx.send(MessageEvent::Inserted(message)).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("realtime echo lagged, skipped {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(rx)
    }
}
