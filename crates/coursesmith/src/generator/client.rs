//! Completion-service capability used by every format generator.

use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::{ConfigError, CoursesmithError, GenerationError};
use crate::secrets::resolve_api_key;

/// One completion call: a system turn plus a user turn made of the
/// format-specific instructions and the (already sanitized) document text.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub instructions: String,
    pub document: String,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn user_message(&self) -> String {
        format!(
            "{}\n\nSOURCE DOCUMENT:\n{}",
            self.instructions, self.document
        )
    }
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError>;
}

/// Builds the client described by `llm`: the HTTP client when an API key
/// resolves, otherwise the offline client.
pub fn client_from_config(
    llm: &LlmConfig,
    timeout: std::time::Duration,
) -> Result<Arc<dyn CompletionClient>, CoursesmithError> {
    match resolve_api_key(llm)? {
        Some(api_key) => {
            info!("Using completion service {} ({})", llm.endpoint, llm.model);
            Ok(Arc::new(HttpCompletionClient::new(llm, api_key, timeout)?))
        }
        None => {
            warn!("No completion API key configured, generating offline drafts");
            Ok(Arc::new(OfflineCompletionClient::new()))
        }
    }
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct HttpCompletionClient {
    http: reqwest::Client,
    url: String,
    model: String,
    temperature: f32,
    api_key: SecretString,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl HttpCompletionClient {
    pub fn new(
        llm: &LlmConfig,
        api_key: SecretString,
        timeout: std::time::Duration,
    ) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ConfigError::HttpClient)?;

        Ok(Self {
            http,
            url: format!("{}/chat/completions", llm.endpoint.trim_end_matches('/')),
            model: llm.model.clone(),
            temperature: llm.temperature,
            api_key,
        })
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        let user = request.user_message();
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &user,
                },
            ],
            temperature: self.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Completion(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(200)
                .collect();
            return Err(GenerationError::Completion(format!(
                "HTTP {}: {}",
                status, detail
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

        parse_reply(parsed)
    }
}

fn parse_reply(response: ChatResponse) -> Result<String, GenerationError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| GenerationError::MalformedResponse("response has no choices".to_string()))
}

/// Deterministic client that drafts from the document itself.
///
/// Keeps whole lines of the source up to the token budget (about four
/// characters per token), so outline structure survives into the draft.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineCompletionClient;

impl OfflineCompletionClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CompletionClient for OfflineCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        Ok(extractive_draft(&request.document, request.max_tokens))
    }
}

fn extractive_draft(document: &str, max_tokens: u32) -> String {
    let budget = (max_tokens as usize).saturating_mul(4).max(1);
    let mut draft = String::new();
    for line in document.lines() {
        let needed = line.chars().count() + 1;
        if draft.chars().count() + needed > budget && !draft.is_empty() {
            break;
        }
        draft.push_str(line);
        draft.push('\n');
    }
    draft.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(document: &str, max_tokens: u32) -> CompletionRequest {
        CompletionRequest {
            system: "system".to_string(),
            instructions: "Outline this.".to_string(),
            document: document.to_string(),
            max_tokens,
        }
    }

    #[tokio::test]
    async fn test_offline_client_is_deterministic() {
        let client = OfflineCompletionClient::new();
        let req = request("Title\n\nSetup\n- Install the app", 100);
        let first = client.complete(&req).await.unwrap();
        let second = client.complete(&req).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first, "Title\n\nSetup\n- Install the app");
    }

    #[test]
    fn test_extractive_draft_respects_budget_on_line_boundaries() {
        let doc = "aaaa\nbbbb\ncccc\ndddd";
        // 3 tokens ~ 12 chars: two full lines fit, a third would not.
        assert_eq!(extractive_draft(doc, 3), "aaaa\nbbbb");
        assert_eq!(extractive_draft("", 100), "");
    }

    #[test]
    fn test_extractive_draft_keeps_oversized_first_line() {
        let doc = "a very long first line that exceeds the budget\nsecond";
        assert_eq!(
            extractive_draft(doc, 1),
            "a very long first line that exceeds the budget"
        );
    }

    #[test]
    fn test_user_message_layout() {
        let req = request("Body text", 10);
        assert_eq!(req.user_message(), "Outline this.\n\nSOURCE DOCUMENT:\nBody text");
    }

    #[test]
    fn test_parse_reply() {
        let ok: ChatResponse = serde_json::from_str(
            r##"{"choices":[{"message":{"role":"assistant","content":"# Title"}}]}"##,
        )
        .unwrap();
        assert_eq!(parse_reply(ok).unwrap(), "# Title");

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(
            parse_reply(empty),
            Err(GenerationError::MalformedResponse(_))
        ));

        let no_content: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(parse_reply(no_content).is_err());
    }

    async fn completion_server(response: wiremock::ResponseTemplate) -> wiremock::MockServer {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/v1/chat/completions"))
            .and(wiremock::matchers::header("authorization", "Bearer sk-test"))
            .respond_with(response)
            .mount(&server)
            .await;
        server
    }

    fn http_client(server: &wiremock::MockServer) -> HttpCompletionClient {
        let llm = LlmConfig {
            endpoint: format!("{}/v1/", server.uri()),
            model: "test-model".to_string(),
            ..LlmConfig::default()
        };
        HttpCompletionClient::new(
            &llm,
            SecretString::from("sk-test".to_string()),
            std::time::Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_http_client_sends_bearer_and_reads_reply() {
        let server = completion_server(wiremock::ResponseTemplate::new(200).set_body_json(
            serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": "# Setup\n- Install" } }]
            }),
        ))
        .await;

        let reply = http_client(&server)
            .complete(&request("Setup", 100))
            .await
            .unwrap();
        assert_eq!(reply, "# Setup\n- Install");

        let received = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["max_tokens"], 100);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(
            body["messages"][1]["content"],
            "Outline this.\n\nSOURCE DOCUMENT:\nSetup"
        );
    }

    #[tokio::test]
    async fn test_http_client_error_status_is_completion_error() {
        let server = completion_server(
            wiremock::ResponseTemplate::new(503).set_body_string("upstream overloaded"),
        )
        .await;

        match http_client(&server).complete(&request("Setup", 100)).await {
            Err(GenerationError::Completion(message)) => {
                assert!(message.contains("503"), "{}", message);
                assert!(message.contains("upstream overloaded"), "{}", message);
            }
            other => panic!("Expected Completion error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_http_client_rejected_key_is_completion_error() {
        // No mock matches a different key, so the server answers 404.
        let server = completion_server(wiremock::ResponseTemplate::new(200)).await;
        let llm = LlmConfig {
            endpoint: format!("{}/v1", server.uri()),
            ..LlmConfig::default()
        };
        let client = HttpCompletionClient::new(
            &llm,
            SecretString::from("sk-other".to_string()),
            std::time::Duration::from_secs(5),
        )
        .unwrap();

        assert!(matches!(
            client.complete(&request("Setup", 100)).await,
            Err(GenerationError::Completion(_))
        ));
    }

    #[tokio::test]
    async fn test_http_client_malformed_body() {
        let server = completion_server(
            wiremock::ResponseTemplate::new(200)
                .insert_header("content-type", "application/json")
                .set_body_string("{ not json"),
        )
        .await;
        assert!(matches!(
            http_client(&server).complete(&request("Setup", 100)).await,
            Err(GenerationError::MalformedResponse(_))
        ));

        let empty = completion_server(
            wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })),
        )
        .await;
        assert!(matches!(
            http_client(&empty).complete(&request("Setup", 100)).await,
            Err(GenerationError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_missing_key_falls_back_to_offline() {
        let llm = LlmConfig {
            api_key_env: Some("COURSESMITH_UNSET_CLIENT_KEY".to_string()),
            ..LlmConfig::default()
        };
        assert!(client_from_config(&llm, std::time::Duration::from_secs(5)).is_ok());
    }
}
