use gasket::assistant::ChatMessage;
use gasket::backend::RestBackend;
use gasket::config::{AssistantConfig, RestBackendConfig};

#[allow(dead_code)]
pub fn rest_backend_for(server_uri: &str) -> RestBackend {
    RestBackend::new(RestBackendConfig {
        base_url: server_uri.to_string(),
        api_key: Some("test-key".to_string()),
        timeout_seconds: 5,
    })
    .expect("failed to create REST backend")
}

#[allow(dead_code)]
pub fn assistant_config_for(server_uri: &str) -> AssistantConfig {
    AssistantConfig {
        endpoint: format!("{}/functions/v1/assistant", server_uri),
        api_key: None,
        timeout_seconds: 5,
    }
}

#[allow(dead_code)]
pub fn conversation(texts: &[(&str, &str)]) -> Vec<ChatMessage> {
    texts
        .iter()
        .map(|(sender, text)| match *sender {
            "user" => ChatMessage::user(*text),
            _ => ChatMessage::ai(*text),
        })
        .collect()
}
