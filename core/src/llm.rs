//! OpenAI-compatible chat-completion client (§4.E wire shape, §6).
//!
//! Builds the request body described in §6, dispatches through
//! [`crate::transport`], and classifies provider error strings through
//! [`crate::capability`] so the turn loop can react to tool/vision/stream
//! unsupported errors without re-implementing substring matching itself.

use crate::capability::{
    is_stream_unsupported_error, is_tool_unsupported_error, is_vision_unsupported_error,
};
use crate::error::AgentError;
use crate::transport::{fetch_with_retry, read_sse_stream, RetryConfig, StreamSink};
use crate::turn::{LlmUsage, Message, ToolCall};
use reqwest::Client;
use serde_json::{json, Value};

#[derive(Debug, Clone)]
pub struct ChatRequestOptions<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub tools: Option<&'a Value>,
    pub stream: bool,
}

pub struct ChatCompletionResult {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<LlmUsage>,
}

/// Distinguishes the capability-related outcomes the turn loop must react
/// to (§4.I step 3) from a generic propagated error.
pub enum ChatOutcome {
    Success(ChatCompletionResult),
    ToolUnsupported,
    VisionUnsupported,
    StreamUnsupported,
    Unrecognized(String),
}

pub struct ChatClient {
    pub http: Client,
    pub base_url: String,
    pub api_key: Option<String>,
    pub extra_headers: Vec<(String, String)>,
    pub retry: RetryConfig,
    pub timeout_ms: u64,
}

impl ChatClient {
    fn build_body(&self, opts: &ChatRequestOptions) -> Value {
        let messages: Vec<Value> = opts.messages.iter().map(|m| m.to_wire_json()).collect();
        let mut body = json!({
            "model": opts.model,
            "messages": messages,
            "temperature": 0,
        });
        if let Some(tools) = opts.tools {
            body["tools"] = tools.clone();
            body["tool_choice"] = json!("auto");
        }
        if opts.stream {
            body["stream"] = json!(true);
        }
        body
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response, AgentError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let api_key = self.api_key.clone();
        let headers = self.extra_headers.clone();
        let body = body.clone();

        fetch_with_retry(
            &self.http,
            move |client| {
                let mut req = client
                    .post(&url)
                    .header("Content-Type", "application/json")
                    .json(&body);
                if let Some(ref key) = api_key {
                    if !key.is_empty() {
                        req = req.header("Authorization", format!("Bearer {key}"));
                    }
                }
                for (k, v) in &headers {
                    req = req.header(k.as_str(), v.as_str());
                }
                req
            },
            self.timeout_ms,
            &self.retry,
            |_attempt, _reason| {},
        )
        .await
    }

    /// Sends a non-streaming chat-completion request and parses the result,
    /// or classifies the error body against the capability gates (§4.F).
    pub async fn complete(&self, opts: &ChatRequestOptions<'_>) -> Result<ChatOutcome, AgentError> {
        let body = self.build_body(opts);
        let response = self.post(&body).await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Ok(classify_error_body(&text));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| AgentError::RuntimeError(crate::error::redact(&e.to_string())))?;
        Ok(ChatOutcome::Success(parse_completion(&value)))
    }

    /// Sends a streaming chat-completion request, forwarding text deltas to
    /// `sink` and returning the synthesized final result so the turn loop
    /// is shape-identical to non-streaming (§4.E).
    pub async fn complete_streaming(
        &self,
        opts: &ChatRequestOptions<'_>,
        sink: StreamSink<'_>,
    ) -> Result<ChatOutcome, AgentError> {
        let body = self.build_body(opts);
        let response = self.post(&body).await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Ok(classify_error_body(&text));
        }

        let content = read_sse_stream(response, sink).await?;
        Ok(ChatOutcome::Success(ChatCompletionResult {
            content,
            tool_calls: Vec::new(),
            usage: None,
        }))
    }
}

fn classify_error_body(text: &str) -> ChatOutcome {
    let message = extract_error_message(text);
    if is_tool_unsupported_error(&message) {
        ChatOutcome::ToolUnsupported
    } else if is_vision_unsupported_error(&message) {
        ChatOutcome::VisionUnsupported
    } else if is_stream_unsupported_error(&message) {
        ChatOutcome::StreamUnsupported
    } else {
        // Unrecognized error bodies are unrecoverable (§4.I: "On
        // unrecoverable error: propagate") — the turn loop turns this into
        // a RuntimeError rather than retrying a capability fallback.
        ChatOutcome::Unrecognized(message)
    }
}

fn extract_error_message(text: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        if let Some(msg) = value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return msg.to_string();
        }
    }
    text.to_string()
}

fn parse_completion(value: &Value) -> ChatCompletionResult {
    let choice = value.get("choices").and_then(|c| c.as_array()).and_then(|a| a.first());
    let message = choice.and_then(|c| c.get("message"));

    let content = message
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or("")
        .to_string();

    let tool_calls = message
        .and_then(|m| m.get("tool_calls"))
        .and_then(|tc| tc.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|tc| {
                    let id = tc.get("id")?.as_str()?.to_string();
                    let function = tc.get("function")?;
                    let name = function.get("name")?.as_str()?.to_string();
                    let arguments = function
                        .get("arguments")
                        .and_then(|a| a.as_str())
                        .unwrap_or("{}")
                        .to_string();
                    Some(ToolCall { id, name, arguments })
                })
                .collect()
        })
        .unwrap_or_default();

    let usage = value.get("usage").map(|u| LlmUsage {
        prompt_tokens: u.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
        completion_tokens: u
            .get("completion_tokens")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32,
        total_tokens: u.get("total_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
    });

    ChatCompletionResult {
        content,
        tool_calls,
        usage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tool_calls_from_completion() {
        let value: Value = serde_json::from_str(
            r#"{"choices":[{"message":{"content":"","tool_calls":[{"id":"call_1","type":"function","function":{"name":"read_file","arguments":"{\"path\":\"a.txt\"}"}}]}}],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#,
        )
        .unwrap();
        let result = parse_completion(&value);
        assert_eq!(result.tool_calls.len(), 1);
        assert_eq!(result.tool_calls[0].name, "read_file");
        assert_eq!(result.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn extracts_nested_error_message() {
        let body = r#"{"error":{"message":"Tool calling is not supported","type":"invalid_request_error"}}"#;
        assert_eq!(extract_error_message(body), "Tool calling is not supported");
    }
}
