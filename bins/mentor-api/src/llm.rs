//! Client for an OpenAI-compatible chat-completions API.
//!
//! Two calling modes, mirroring how the service uses the model:
//! - non-streaming with tools, for the forced-choice judgement calls
//!   (tool calls and streaming are mutually exclusive on the API)
//! - streaming without tools, for the tutor/hint token streams

use futures::stream::Stream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Cap for judgement responses; a forced tool call never needs more.
const TOOL_CALL_MAX_TOKENS: u32 = 150;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("no model credential configured")]
    MissingApiKey,
    #[error("model request failed: {0}")]
    RequestFailed(String),
    #[error("model API error ({code}): {message}")]
    ApiError { code: u16, message: String },
    #[error("failed to parse model response: {0}")]
    Parse(String),
}

/// A message in a model conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// A tool the model may (or must) invoke.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A tool invocation returned by the model; arguments are the raw JSON
/// text, validated by the caller at the judgement boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: String,
}

/// Sampling parameters for a streaming call.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamParams {
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

/// Events from a streaming completion.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenEvent {
    /// One content token (or token group) from the model.
    Content(String),
    /// The model signalled end of stream.
    Done,
}

pub type TokenStream = Pin<Box<dyn Stream<Item = Result<TokenEvent, LlmError>> + Send>>;

#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
}

impl LlmClient {
    pub fn new(api_base: impl Into<String>, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .expect("failed to build HTTP client"),
            api_base: api_base.into(),
            api_key,
            model: model.into(),
        }
    }

    /// Whether a model credential is configured. Judgement passes are
    /// skipped entirely when it is not.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn bearer(&self) -> Result<&str, LlmError> {
        self.api_key.as_deref().ok_or(LlmError::MissingApiKey)
    }

    /// One non-streaming completion constrained to the given tools.
    ///
    /// Returns the first tool call the model made, or `None` if it made
    /// none; deciding whether `None` is a protocol violation is up to the
    /// judgement layer.
    pub async fn complete_with_tools(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        forced_tool: Option<&str>,
    ) -> Result<Option<ToolInvocation>, LlmError> {
        let api_key = self.bearer()?;

        let tool_choice = forced_tool.map(|name| {
            serde_json::json!({ "type": "function", "function": { "name": name } })
        });

        let request = ApiRequest {
            model: self.model.clone(),
            messages,
            stream: false,
            max_tokens: Some(TOOL_CALL_MAX_TOKENS),
            temperature: None,
            tools: Some(tools.into_iter().map(ApiTool::from).collect()),
            tool_choice,
        };

        let url = format!("{}/chat/completions", self.api_base);
        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError {
                code: status.as_u16(),
                message,
            });
        }

        let body: ApiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let invocation = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.tool_calls)
            .and_then(|calls| calls.into_iter().next())
            .map(|call| ToolInvocation {
                name: call.function.name,
                arguments: call.function.arguments,
            });

        Ok(invocation)
    }

    /// One streaming completion; tokens are yielded as they arrive.
    pub async fn chat_stream(
        &self,
        messages: Vec<Message>,
        params: StreamParams,
    ) -> Result<TokenStream, LlmError> {
        let api_key = self.bearer()?;

        let request = ApiRequest {
            model: self.model.clone(),
            messages,
            stream: true,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            tools: None,
            tool_choice: None,
        };

        let url = format!("{}/chat/completions", self.api_base);
        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError {
                code: status.as_u16(),
                message,
            });
        }

        Ok(Box::pin(parse_sse_stream(response.bytes_stream())))
    }
}

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<Message>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ApiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct ApiTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: ApiFunction,
}

impl From<ToolDefinition> for ApiTool {
    fn from(tool: ToolDefinition) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: ApiFunction {
                name: tool.name,
                description: tool.description,
                parameters: tool.parameters,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ApiToolCall {
    function: ApiFunctionCall,
}

#[derive(Debug, Deserialize)]
struct ApiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Parse the provider's SSE byte stream into token events.
///
/// Events are buffered only up to line granularity; each parsed token is
/// yielded before the next network chunk is requested.
fn parse_sse_stream<S>(stream: S) -> impl Stream<Item = Result<TokenEvent, LlmError>>
where
    S: Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
{
    async_stream::try_stream! {
        let mut buffer = String::new();

        futures::pin_mut!(stream);

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| LlmError::RequestFailed(e.to_string()))?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(newline_pos) = buffer.find('\n') {
                let line = buffer[..newline_pos].trim().to_string();
                buffer.drain(..=newline_pos);

                if line.is_empty() {
                    continue;
                }

                if let Some(data) = line.strip_prefix("data: ") {
                    if data.trim() == "[DONE]" {
                        yield TokenEvent::Done;
                        continue;
                    }

                    match serde_json::from_str::<StreamChunk>(data) {
                        Ok(chunk) => {
                            for choice in chunk.choices {
                                if let Some(content) = choice.delta.content {
                                    if !content.is_empty() {
                                        yield TokenEvent::Content(content);
                                    }
                                }
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, data = %data, "Failed to parse stream chunk");
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn byte_stream(
        parts: Vec<&'static str>,
    ) -> impl Stream<Item = Result<bytes::Bytes, reqwest::Error>> {
        stream::iter(parts.into_iter().map(|p| Ok(bytes::Bytes::from(p))))
    }

    async fn collect(parts: Vec<&'static str>) -> Vec<TokenEvent> {
        parse_sse_stream(byte_stream(parts))
            .map(|r| r.unwrap())
            .collect()
            .await
    }

    #[test]
    fn message_constructors() {
        assert_eq!(Message::system("s").role, "system");
        assert_eq!(Message::user("u").role, "user");
        assert_eq!(Message::assistant("a").role, "assistant");
    }

    #[test]
    fn missing_key_is_reported() {
        let client = LlmClient::new("http://localhost:4000", None, "test-model");
        assert!(!client.has_api_key());
        assert!(matches!(client.bearer(), Err(LlmError::MissingApiKey)));
    }

    #[test]
    fn tool_request_serialization() {
        let request = ApiRequest {
            model: "m".to_string(),
            messages: vec![Message::user("hi")],
            stream: false,
            max_tokens: Some(150),
            temperature: None,
            tools: Some(vec![ApiTool::from(ToolDefinition {
                name: "code_correct".to_string(),
                description: "d".to_string(),
                parameters: serde_json::json!({"type": "object"}),
            })]),
            tool_choice: None,
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""type":"function""#));
        assert!(json.contains(r#""name":"code_correct""#));
        assert!(!json.contains("temperature"));
        assert!(!json.contains("tool_choice"));
    }

    #[tokio::test]
    async fn stream_parses_content_and_done() {
        let events = collect(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
            "data: [DONE]\n\n",
        ])
        .await;

        assert_eq!(
            events,
            vec![
                TokenEvent::Content("Hel".to_string()),
                TokenEvent::Content("lo".to_string()),
                TokenEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn stream_reassembles_split_chunks() {
        let events = collect(vec![
            "data: {\"choices\":[{\"delta\":{\"con",
            "tent\":\"x\"}}]}\n\ndata: [DONE]\n\n",
        ])
        .await;

        assert_eq!(
            events,
            vec![TokenEvent::Content("x".to_string()), TokenEvent::Done]
        );
    }

    #[tokio::test]
    async fn stream_skips_empty_deltas_and_bad_json() {
        let events = collect(vec![
            "data: {\"choices\":[{\"delta\":{}}]}\n\n",
            "data: not-json\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\n",
            "data: [DONE]\n\n",
        ])
        .await;

        assert_eq!(
            events,
            vec![TokenEvent::Content("ok".to_string()), TokenEvent::Done]
        );
    }
}
