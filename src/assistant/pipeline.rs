//! AI response pipeline
//!
//! Formats conversation history into a function-endpoint request, races a
//! client-side timeout, and appends the outcome as reply text. The pipeline
//! never surfaces an error to the conversation: timeouts and transport
//! failures produce a canned apologetic reply and the user resends manually.
//!
//! One business rule lives here: a message carrying a diagnostic trouble
//! code with no vehicle context available (selected or extractable from
//! history) is answered with a request for the vehicle instead of a call to
//! the endpoint.

use metrics::increment_counter;
use serde_json::json;
use std::time::Duration;

use crate::assistant::client::{CompletionClient, FunctionRequest, ServiceKind};
use crate::assistant::message::{extract_component_diagram, ChatMessage, MessageBody, Sender};
use crate::assistant::vehicle::{detect_dtc_codes, find_vehicle_in_history, VehicleContext};

/// Client-side budget for a single completion request.
pub const ASSISTANT_TIMEOUT_SECONDS: u64 = 30;

/// Canned reply used when the endpoint cannot be reached in time.
pub const FALLBACK_REPLY: &str = "I'm sorry, I'm having trouble reaching the assistant right \
     now. Please try sending your message again in a moment.";

/// Reply used when a trouble code arrives without any vehicle context.
pub const ASK_VEHICLE_REPLY: &str = "Happy to help with that code! First, what vehicle are you \
     working on? Please share the year, make, and model.";

/// Pipeline lifecycle states
///
/// `AwaitingResponse` covers the in-flight request; `Errored` is entered
/// while the fallback reply is being produced. Both always resolve back to
/// `Idle`: there is no retry state, the user resends manually.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// No request in flight
    Idle,
    /// A completion request is in flight
    AwaitingResponse,
    /// The last request failed and the fallback reply was produced
    Errored,
}

/// Outcome of a pipeline turn
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantReply {
    /// Display text (markers already stripped)
    pub text: String,
    /// Typed payload parsed from the reply
    pub body: MessageBody,
    /// True when this is the canned failure reply
    pub fallback: bool,
    /// True when the pipeline asked for the vehicle instead of completing
    pub asked_for_vehicle: bool,
}

impl AssistantReply {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            body: MessageBody::Plain,
            fallback: false,
            asked_for_vehicle: false,
        }
    }

    /// Convert this reply into an assistant [`ChatMessage`]
    pub fn into_message(self) -> ChatMessage {
        ChatMessage::ai(self.text.clone()).with_body(self.body)
    }
}

/// Formats history into completion requests and handles their outcome
///
/// # Examples
///
/// ```no_run
/// use gasket::assistant::{ChatMessage, FunctionEndpointClient, ResponsePipeline};
/// use gasket::config::AssistantConfig;
///
/// # async fn example() -> gasket::error::Result<()> {
/// let client = FunctionEndpointClient::new(AssistantConfig::default())?;
/// let mut pipeline = ResponsePipeline::new(Box::new(client));
///
/// let history = vec![ChatMessage::user("My 2015 Toyota Camry shows P0300")];
/// let reply = pipeline.generate_reply(&history, None).await;
/// println!("{}", reply.text);
/// # Ok(())
/// # }
/// ```
pub struct ResponsePipeline {
    client: Box<dyn CompletionClient>,
    timeout: Duration,
    state: PipelineState,
}

impl ResponsePipeline {
    /// Create a pipeline with the default 30-second timeout
    pub fn new(client: Box<dyn CompletionClient>) -> Self {
        Self::with_timeout(client, Duration::from_secs(ASSISTANT_TIMEOUT_SECONDS))
    }

    /// Create a pipeline with an explicit timeout
    pub fn with_timeout(client: Box<dyn CompletionClient>, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            state: PipelineState::Idle,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Produce the assistant reply for the current conversation
    ///
    /// `vehicle` is the explicitly selected vehicle, if any; otherwise the
    /// most recent vehicle mentioned in user history is used
    /// (last-write-wins). This method never returns an error: failures
    /// degrade to the canned fallback reply.
    pub async fn generate_reply(
        &mut self,
        history: &[ChatMessage],
        vehicle: Option<&VehicleContext>,
    ) -> AssistantReply {
        let prompt = history
            .iter()
            .rev()
            .find(|m| m.sender == Sender::User)
            .map(|m| m.text.as_str())
            .unwrap_or_default();

        let codes = detect_dtc_codes(prompt);
        let effective_vehicle = vehicle.cloned().or_else(|| {
            find_vehicle_in_history(
                history
                    .iter()
                    .filter(|m| m.sender == Sender::User)
                    .map(|m| m.text.as_str()),
            )
        });

        // Ask-for-vehicle-first rule: never diagnose a code blind.
        if !codes.is_empty() && effective_vehicle.is_none() {
            increment_counter!("gasket_vehicle_prompts_total");
            return AssistantReply {
                asked_for_vehicle: true,
                ..AssistantReply::plain(ASK_VEHICLE_REPLY)
            };
        }

        let request = build_request(history, effective_vehicle.as_ref(), &codes);

        self.state = PipelineState::AwaitingResponse;
        increment_counter!("gasket_assistant_requests_total");

        let outcome = tokio::time::timeout(self.timeout, self.client.invoke(request)).await;

        let reply = match outcome {
            Ok(Ok(response)) => match response.reply_text() {
                Some(text) => {
                    let (clean, diagram) = extract_component_diagram(text);
                    AssistantReply {
                        text: clean,
                        body: diagram
                            .map(MessageBody::ComponentDiagram)
                            .unwrap_or_default(),
                        fallback: false,
                        asked_for_vehicle: false,
                    }
                }
                None => {
                    tracing::warn!("assistant endpoint replied without any text");
                    self.fallback_reply()
                }
            },
            Ok(Err(e)) => {
                tracing::warn!("assistant request failed: {}", e);
                self.fallback_reply()
            }
            Err(_) => {
                tracing::warn!(
                    "assistant request timed out after {}s",
                    self.timeout.as_secs()
                );
                self.fallback_reply()
            }
        };

        // Success or fallback, the pipeline always returns to Idle; the user
        // retries by resending.
        self.state = PipelineState::Idle;
        reply
    }

    fn fallback_reply(&mut self) -> AssistantReply {
        self.state = PipelineState::Errored;
        increment_counter!("gasket_assistant_errors_total");
        AssistantReply {
            fallback: true,
            ..AssistantReply::plain(FALLBACK_REPLY)
        }
    }
}

/// Build the function-endpoint request for a conversation turn
///
/// History maps to ordered `{role, content}` entries; the vehicle context,
/// when present, is injected as a leading system entry; detected codes ride
/// alongside for the diagnostic service.
fn build_request(
    history: &[ChatMessage],
    vehicle: Option<&VehicleContext>,
    codes: &[String],
) -> FunctionRequest {
    let mut messages = Vec::with_capacity(history.len() + 1);

    if let Some(vehicle) = vehicle {
        messages.push(json!({
            "role": "system",
            "content": format!("The user's vehicle is a {}.", vehicle),
        }));
    }

    for message in history {
        let role = match message.sender {
            Sender::User => "user",
            Sender::Ai => "assistant",
        };
        messages.push(json!({ "role": role, "content": message.text }));
    }

    let mut data = json!({ "messages": messages });
    if !codes.is_empty() {
        data["codes"] = json!(codes);
    }

    FunctionRequest {
        service: ServiceKind::Diagnostic,
        action: "chat".to_string(),
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::client::FunctionResponse;
    use crate::error::Result;
    use async_trait::async_trait;
    use mockall::mock;
    use mockall::predicate::always;

    mock! {
        pub Client {}

        #[async_trait]
        impl CompletionClient for Client {
            async fn invoke(&self, request: FunctionRequest) -> Result<FunctionResponse>;
        }
    }

    fn message_response(text: &str) -> FunctionResponse {
        FunctionResponse {
            message: Some(text.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_dtc_without_vehicle_asks_for_vehicle_and_skips_endpoint() {
        let mut client = MockClient::new();
        client.expect_invoke().times(0);

        let mut pipeline = ResponsePipeline::new(Box::new(client));
        let history = vec![ChatMessage::user("What could cause a P0300 code?")];
        let reply = pipeline.generate_reply(&history, None).await;

        assert!(reply.asked_for_vehicle);
        assert!(!reply.fallback);
        assert_eq!(reply.text, ASK_VEHICLE_REPLY);
        assert_eq!(pipeline.state(), PipelineState::Idle);
    }

    #[tokio::test]
    async fn test_dtc_with_selected_vehicle_calls_endpoint() {
        let mut client = MockClient::new();
        client
            .expect_invoke()
            .withf(|request| {
                let messages = request.data["messages"].as_array().unwrap();
                let system = messages[0]["content"].as_str().unwrap();
                system.contains("2015 Toyota Camry")
                    && request.data["codes"][0].as_str() == Some("P0300")
            })
            .times(1)
            .returning(|_| Ok(message_response("Misfire on multiple cylinders.")));

        let vehicle = VehicleContext {
            year: "2015".to_string(),
            make: "Toyota".to_string(),
            model: "Camry".to_string(),
        };
        let mut pipeline = ResponsePipeline::new(Box::new(client));
        let history = vec![ChatMessage::user("What could cause a P0300 code?")];
        let reply = pipeline.generate_reply(&history, Some(&vehicle)).await;

        assert!(!reply.asked_for_vehicle);
        assert_eq!(reply.text, "Misfire on multiple cylinders.");
    }

    #[tokio::test]
    async fn test_dtc_with_vehicle_from_history_calls_endpoint() {
        let mut client = MockClient::new();
        client
            .expect_invoke()
            .with(always())
            .times(1)
            .returning(|_| Ok(message_response("Check the coils.")));

        let mut pipeline = ResponsePipeline::new(Box::new(client));
        let history = vec![
            ChatMessage::user("I have a 2015 Toyota Camry"),
            ChatMessage::ai("Nice car! How can I help?"),
            ChatMessage::user("What could cause a P0300 code?"),
        ];
        let reply = pipeline.generate_reply(&history, None).await;

        assert!(!reply.asked_for_vehicle);
        assert_eq!(reply.text, "Check the coils.");
    }

    #[tokio::test]
    async fn test_endpoint_error_degrades_to_fallback() {
        let mut client = MockClient::new();
        client
            .expect_invoke()
            .returning(|_| Err(crate::error::GasketError::Assistant("boom".to_string()).into()));

        let mut pipeline = ResponsePipeline::new(Box::new(client));
        let history = vec![ChatMessage::user("Why is my coolant disappearing?")];
        let reply = pipeline.generate_reply(&history, None).await;

        assert!(reply.fallback);
        assert_eq!(reply.text, FALLBACK_REPLY);
        assert_eq!(pipeline.state(), PipelineState::Idle);
    }

    #[tokio::test]
    async fn test_empty_response_degrades_to_fallback() {
        let mut client = MockClient::new();
        client
            .expect_invoke()
            .returning(|_| Ok(FunctionResponse::default()));

        let mut pipeline = ResponsePipeline::new(Box::new(client));
        let history = vec![ChatMessage::user("hello?")];
        let reply = pipeline.generate_reply(&history, None).await;

        assert!(reply.fallback);
    }

    #[tokio::test]
    async fn test_diagram_marker_extracted_from_reply() {
        let mut client = MockClient::new();
        client.expect_invoke().returning(|_| {
            Ok(message_response(
                r#"Here it is. {COMPONENT_DIAGRAM: {"component": "Thermostat"}}"#,
            ))
        });

        let mut pipeline = ResponsePipeline::new(Box::new(client));
        let history = vec![ChatMessage::user("Where is the thermostat?")];
        let reply = pipeline.generate_reply(&history, None).await;

        assert_eq!(reply.text, "Here it is.");
        match reply.body {
            MessageBody::ComponentDiagram(diagram) => {
                assert_eq!(diagram.component, "Thermostat");
            }
            other => panic!("expected a component diagram, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_degrades_to_fallback() {
        /// Client that never answers within the test timeout.
        struct SlowClient;

        #[async_trait]
        impl CompletionClient for SlowClient {
            async fn invoke(&self, _request: FunctionRequest) -> Result<FunctionResponse> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(FunctionResponse::default())
            }
        }

        let mut pipeline =
            ResponsePipeline::with_timeout(Box::new(SlowClient), Duration::from_millis(20));
        let history = vec![ChatMessage::user("hello")];
        let reply = pipeline.generate_reply(&history, None).await;

        assert!(reply.fallback);
        assert_eq!(reply.text, FALLBACK_REPLY);
        assert_eq!(pipeline.state(), PipelineState::Idle);
    }

    #[tokio::test]
    async fn test_reply_into_message_is_ai() {
        let reply = AssistantReply::plain("done");
        let message = reply.into_message();
        assert_eq!(message.sender, Sender::Ai);
        assert_eq!(message.text, "done");
    }
}
