//! REST persistence adapter
//!
//! Talks PostgREST-style endpoints on the hosted relational store:
//! `/rest/v1/chat_sessions` and `/rest/v1/chat_messages` for CRUD, and a
//! `/realtime/v1/stream` SSE channel for row-insert events. The apikey and
//! bearer token ride on every request. All ids are minted client-side, so
//! an insert's realtime echo carries the same message id the caller already
//! appended optimistically.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

use crate::assistant::message::{ChatMessage, MessageBody, Sender};
use crate::backend::realtime::{spawn_insert_listener, MessageEvents};
use crate::backend::types::ChatSession;
use crate::backend::ChatBackend;
use crate::error::{GasketError, Result};
use crate::session::identity::new_session_id;

/// Wire row for the `chat_messages` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct MessageRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: Sender,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<Url>,
    pub created_at: DateTime<Utc>,
}

impl MessageRow {
    pub(crate) fn from_message(message: &ChatMessage, session_id: Uuid) -> Self {
        Self {
            id: message.id,
            session_id,
            role: message.sender,
            content: message.text.clone(),
            image_url: message.image.clone(),
            created_at: message.timestamp,
        }
    }

    pub(crate) fn into_message(self) -> ChatMessage {
        ChatMessage {
            id: self.id,
            sender: self.role,
            text: self.content,
            timestamp: self.created_at,
            image: self.image_url,
            body: MessageBody::Plain,
        }
    }
}

/// PostgREST adapter for the hosted chat store
///
/// # Examples
///
/// ```no_run
/// use gasket::backend::{ChatBackend, RestBackend};
/// use gasket::config::RestBackendConfig;
///
/// # async fn example() -> gasket::error::Result<()> {
/// let backend = RestBackend::new(RestBackendConfig::default())?;
/// let session_id = backend.create_session("Brake noise", None).await?;
/// backend.fetch_messages(session_id).await?;
/// # Ok(())
/// # }
/// ```
pub struct RestBackend {
    client: Client,
    config: crate::config::RestBackendConfig,
}

impl RestBackend {
    /// Create a new REST backend instance
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(config: crate::config::RestBackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("gasket/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GasketError::Backend(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!("Initialized REST backend: base_url={}", config.base_url);

        Ok(Self { client, config })
    }

    /// The configured base URL
    pub fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// Attach the store's auth headers to a request.
    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut builder = builder;
        if let Some(key) = &self.config.api_key {
            builder = builder.header("apikey", key).bearer_auth(key);
        }
        builder
    }

    async fn check(&self, response: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let error_text = response.text().await.unwrap_or_default();
        tracing::warn!("{} failed with {}: {}", context, status, error_text);
        Err(GasketError::Backend(format!("{} returned {}: {}", context, status, error_text)).into())
    }

    async fn insert_message(&self, message: &ChatMessage, session_id: Uuid) -> Result<()> {
        let row = MessageRow::from_message(message, session_id);

        let response = self
            .authorize(self.client.post(self.endpoint("/rest/v1/chat_messages")))
            .header("Prefer", "return=minimal")
            .json(&row)
            .send()
            .await?;
        self.check(response, "message insert").await?;

        self.touch_session(session_id).await
    }

    /// Bump `updated_at` so session ordering follows message activity.
    async fn touch_session(&self, session_id: Uuid) -> Result<()> {
        let response = self
            .authorize(self.client.patch(self.endpoint("/rest/v1/chat_sessions")))
            .query(&[("id", format!("eq.{}", session_id))])
            .header("Prefer", "return=minimal")
            .json(&json!({ "updated_at": Utc::now() }))
            .send()
            .await?;
        self.check(response, "session touch").await?;
        Ok(())
    }
}

#[async_trait]
impl ChatBackend for RestBackend {
    async fn create_session(&self, title: &str, user_id: Option<Uuid>) -> Result<Uuid> {
        let now = Utc::now();
        let session = ChatSession {
            id: new_session_id(),
            user_id,
            title: title.to_string(),
            created_at: now,
            updated_at: now,
        };

        let response = self
            .authorize(self.client.post(self.endpoint("/rest/v1/chat_sessions")))
            .header("Prefer", "return=minimal")
            .json(&session)
            .send()
            .await?;
        self.check(response, "session insert").await?;

        tracing::debug!("created session {} ({:?})", session.id, title);
        Ok(session.id)
    }

    async fn store_user_message(&self, message: &ChatMessage, session_id: Uuid) -> Result<()> {
        self.insert_message(message, session_id).await
    }

    async fn store_ai_message(&self, message: &ChatMessage, session_id: Uuid) -> Result<()> {
        self.insert_message(message, session_id).await
    }

    async fn fetch_messages(&self, session_id: Uuid) -> Result<Vec<ChatMessage>> {
        let response = self
            .authorize(self.client.get(self.endpoint("/rest/v1/chat_messages")))
            .query(&[
                ("session_id", format!("eq.{}", session_id)),
                ("order", "created_at.asc".to_string()),
                ("select", "*".to_string()),
            ])
            .send()
            .await?;
        let response = self.check(response, "message fetch").await?;

        let rows: Vec<MessageRow> = response.json().await.map_err(|e| {
            GasketError::Backend(format!("Failed to parse message rows: {}", e))
        })?;

        Ok(rows.into_iter().map(MessageRow::into_message).collect())
    }

    async fn fetch_last_session(&self, user_id: Uuid) -> Result<Option<ChatSession>> {
        let response = self
            .authorize(self.client.get(self.endpoint("/rest/v1/chat_sessions")))
            .query(&[
                ("user_id", format!("eq.{}", user_id)),
                ("order", "updated_at.desc".to_string()),
                ("limit", "1".to_string()),
            ])
            .send()
            .await?;
        let response = self.check(response, "session fetch").await?;

        let mut rows: Vec<ChatSession> = response.json().await.map_err(|e| {
            GasketError::Backend(format!("Failed to parse session rows: {}", e))
        })?;

        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.remove(0))
        })
    }

    async fn list_sessions(&self, user_id: Option<Uuid>) -> Result<Vec<ChatSession>> {
        let mut query = vec![("order", "updated_at.desc".to_string())];
        if let Some(user_id) = user_id {
            query.push(("user_id", format!("eq.{}", user_id)));
        }

        let response = self
            .authorize(self.client.get(self.endpoint("/rest/v1/chat_sessions")))
            .query(&query)
            .send()
            .await?;
        let response = self.check(response, "session list").await?;

        let rows: Vec<ChatSession> = response.json().await.map_err(|e| {
            GasketError::Backend(format!("Failed to parse session rows: {}", e))
        })?;
        Ok(rows)
    }

    async fn rename_session(&self, session_id: Uuid, title: &str) -> Result<()> {
        // The body deliberately carries only the title: rename must not
        // bump updated_at and reshuffle the session list.
        let response = self
            .authorize(self.client.patch(self.endpoint("/rest/v1/chat_sessions")))
            .query(&[("id", format!("eq.{}", session_id))])
            .header("Prefer", "return=minimal")
            .json(&json!({ "title": title }))
            .send()
            .await?;
        self.check(response, "session rename").await?;
        Ok(())
    }

    async fn delete_session(&self, session_id: Uuid) -> Result<()> {
        let response = self
            .authorize(self.client.delete(self.endpoint("/rest/v1/chat_messages")))
            .query(&[("session_id", format!("eq.{}", session_id))])
            .send()
            .await?;
        self.check(response, "message delete").await?;

        let response = self
            .authorize(self.client.delete(self.endpoint("/rest/v1/chat_sessions")))
            .query(&[("id", format!("eq.{}", session_id))])
            .send()
            .await?;
        self.check(response, "session delete").await?;
        Ok(())
    }

    async fn subscribe(&self, session_id: Uuid) -> Result<MessageEvents> {
        let response = self
            .authorize(self.client.get(self.endpoint("/realtime/v1/stream")))
            .query(&[("table", "chat_messages"), ("event", "INSERT")])
            .header("Accept", "text/event-stream")
            .send()
            .await
            .map_err(|e| GasketError::Realtime(format!("Failed to open stream: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GasketError::Realtime(format!(
                "Realtime stream returned {}",
                status
            ))
            .into());
        }

        tracing::debug!("realtime subscription opened for session {}", session_id);
        Ok(spawn_insert_listener(response.bytes_stream(), session_id))
    }
}
