//! Hosted function-endpoint client
//!
//! The assistant backend exposes a single HTTP function accepting
//! `{service, action, data}` and returning `{message|analysis|parts|guidance}`
//! or `{error}`. This module wraps that contract behind the
//! [`CompletionClient`] trait so the response pipeline can be exercised
//! against fakes and mock servers.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::AssistantConfig;
use crate::error::{GasketError, Result};

/// Services exposed by the function endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    /// OBD-II trouble-code diagnosis and general chat
    Diagnostic,
    /// Photo analysis
    Image,
    /// Part identification
    Parts,
    /// Repair guidance
    Repair,
    /// Vehicle information
    Vehicle,
    /// Vehicle-listing analysis
    Listing,
}

/// Request payload for the function endpoint
#[derive(Debug, Clone, Serialize)]
pub struct FunctionRequest {
    /// Target service
    pub service: ServiceKind,
    /// Service-specific action verb (e.g. "chat", "analyze", "lookup")
    pub action: String,
    /// Service-specific payload
    pub data: serde_json::Value,
}

/// Response payload from the function endpoint
///
/// Exactly one of the content fields is normally populated; `error` wins
/// when present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FunctionResponse {
    /// Conversational reply text
    #[serde(default)]
    pub message: Option<String>,

    /// Structured analysis payload (listing service)
    #[serde(default)]
    pub analysis: Option<serde_json::Value>,

    /// Structured parts payload (image/parts services)
    #[serde(default)]
    pub parts: Option<serde_json::Value>,

    /// Step-by-step guidance text (repair service)
    #[serde(default)]
    pub guidance: Option<String>,

    /// Endpoint-reported error
    #[serde(default)]
    pub error: Option<String>,
}

impl FunctionResponse {
    /// Best-effort reply text: `message` first, then `guidance`
    pub fn reply_text(&self) -> Option<&str> {
        self.message.as_deref().or(self.guidance.as_deref())
    }
}

/// Client abstraction over the function endpoint
///
/// The pipeline and the listing/parts helpers depend on this trait rather
/// than a concrete HTTP client, so tests can substitute fakes.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Invoke the function endpoint with a request
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-success HTTP status, an
    /// unparseable body, or an endpoint-reported `{error}`.
    async fn invoke(&self, request: FunctionRequest) -> Result<FunctionResponse>;
}

/// HTTP client for the hosted function endpoint
///
/// # Examples
///
/// ```no_run
/// use gasket::assistant::{CompletionClient, FunctionEndpointClient, FunctionRequest, ServiceKind};
/// use gasket::config::AssistantConfig;
///
/// # async fn example() -> gasket::error::Result<()> {
/// let client = FunctionEndpointClient::new(AssistantConfig::default())?;
/// let response = client
///     .invoke(FunctionRequest {
///         service: ServiceKind::Diagnostic,
///         action: "chat".to_string(),
///         data: serde_json::json!({ "messages": [] }),
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct FunctionEndpointClient {
    client: Client,
    config: AssistantConfig,
}

impl FunctionEndpointClient {
    /// Create a new client from assistant configuration
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(config: AssistantConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("gasket/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GasketError::Assistant(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!("Initialized assistant client: endpoint={}", config.endpoint);

        Ok(Self { client, config })
    }

    /// The configured endpoint URL
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }
}

#[async_trait]
impl CompletionClient for FunctionEndpointClient {
    async fn invoke(&self, request: FunctionRequest) -> Result<FunctionResponse> {
        tracing::debug!(
            service = ?request.service,
            action = %request.action,
            "invoking assistant endpoint"
        );

        let mut builder = self.client.post(&self.config.endpoint).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::warn!("assistant endpoint unreachable: {}", e);
            GasketError::Assistant(format!("Failed to reach assistant endpoint: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::warn!("assistant endpoint returned {}: {}", status, error_text);
            return Err(GasketError::Assistant(format!(
                "Assistant endpoint returned {}: {}",
                status, error_text
            ))
            .into());
        }

        let parsed: FunctionResponse = response.json().await.map_err(|e| {
            GasketError::Assistant(format!("Failed to parse assistant response: {}", e))
        })?;

        if let Some(error) = parsed.error {
            return Err(GasketError::Assistant(error).into());
        }

        Ok(parsed)
    }
}
