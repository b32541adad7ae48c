/// Anthropic Messages API client
///
/// Supports plain text conversations and a single-image prompt, which is all
/// the chat assistant and the food scanner need.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http::{build_client, ensure_success, ClientError};

const SERVICE: &str = "anthropic";

/// API version header value
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default API base URL
pub const DEFAULT_API_BASE: &str = "https://api.anthropic.com";

/// Default model
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";

/// Speaker of a chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One chat turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<RequestMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: ChatRole,
    content: Vec<ContentBlock<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentBlock<'a> {
    Text { text: &'a str },
    Image { source: ImageSource<'a> },
}

#[derive(Debug, Serialize)]
struct ImageSource<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    model: String,
    content: Vec<ResponseBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Model reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Concatenated text blocks
    pub text: String,
    pub model: String,
    pub stop_reason: Option<String>,
}

/// Messages API client
#[derive(Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    api_base: String,
}

impl std::fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl AnthropicClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            http: build_client()?,
            api_key: api_key.into(),
            model: model.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Continues a text conversation
    pub async fn complete(
        &self,
        system: Option<&str>,
        messages: &[ChatMessage],
        max_tokens: u32,
    ) -> Result<Completion, ClientError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens,
            system,
            messages: messages
                .iter()
                .map(|m| RequestMessage {
                    role: m.role,
                    content: vec![ContentBlock::Text { text: &m.content }],
                })
                .collect(),
        };

        self.send(&request).await
    }

    /// Asks about a single base64-encoded image
    pub async fn describe_image(
        &self,
        prompt: &str,
        media_type: &str,
        base64_data: &str,
        max_tokens: u32,
    ) -> Result<Completion, ClientError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens,
            system: None,
            messages: vec![RequestMessage {
                role: ChatRole::User,
                content: vec![
                    ContentBlock::Image {
                        source: ImageSource {
                            kind: "base64",
                            media_type,
                            data: base64_data,
                        },
                    },
                    ContentBlock::Text { text: prompt },
                ],
            }],
        };

        self.send(&request).await
    }

    async fn send(&self, request: &MessagesRequest<'_>) -> Result<Completion, ClientError> {
        debug!(model = %self.model, turns = request.messages.len(), "Calling Anthropic messages API");

        let response = self
            .http
            .post(format!("{}/v1/messages", self.api_base))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(request)
            .send()
            .await
            .map_err(|e| ClientError::network(SERVICE, e))?;

        let body: MessagesResponse = ensure_success(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::Parse {
                service: SERVICE,
                message: e.to_string(),
            })?;

        let text = body
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(ClientError::Parse {
                service: SERVICE,
                message: "response contained no text".to_string(),
            });
        }

        Ok(Completion {
            text,
            model: body.model,
            stop_reason: body.stop_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn reply(text: &str) -> serde_json::Value {
        json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "model": "claude-test",
            "content": [ { "type": "text", "text": text } ],
            "stop_reason": "end_turn"
        })
    }

    #[tokio::test]
    async fn test_complete_sends_system_and_turns() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "key"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .and(body_partial_json(json!({
                "model": "claude-test",
                "system": "Be brief",
                "messages": [ { "role": "user", "content": [ { "type": "text", "text": "Dinner idea?" } ] } ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("Sheet-pan chicken.")))
            .expect(1)
            .mount(&server)
            .await;

        let client = AnthropicClient::new("key", "claude-test", server.uri()).unwrap();
        let completion = client
            .complete(
                Some("Be brief"),
                &[ChatMessage {
                    role: ChatRole::User,
                    content: "Dinner idea?".to_string(),
                }],
                256,
            )
            .await
            .unwrap();

        assert_eq!(completion.text, "Sheet-pan chicken.");
        assert_eq!(completion.stop_reason.as_deref(), Some("end_turn"));
    }

    #[tokio::test]
    async fn test_describe_image_sends_base64_source() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(body_partial_json(json!({
                "messages": [ { "role": "user", "content": [
                    { "type": "image", "source": { "type": "base64", "media_type": "image/png", "data": "aGVsbG8=" } },
                    { "type": "text", "text": "What is this?" }
                ] } ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("[]")))
            .expect(1)
            .mount(&server)
            .await;

        let client = AnthropicClient::new("key", "claude-test", server.uri()).unwrap();
        let completion = client
            .describe_image("What is this?", "image/png", "aGVsbG8=", 512)
            .await
            .unwrap();

        assert_eq!(completion.text, "[]");
    }

    #[tokio::test]
    async fn test_upstream_error_status() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let client = AnthropicClient::new("key", "claude-test", server.uri()).unwrap();
        let err = client.complete(None, &[], 10).await.unwrap_err();

        assert_eq!(err.status(), Some(529));
        assert_eq!(err.service(), "anthropic");
    }
}
