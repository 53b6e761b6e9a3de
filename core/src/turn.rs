//! Turn Loop (§4.I): the bounded ReAct-style conversation between the
//! model and the tool executors. Flattens what the ancestor state-graph
//! engine modeled as a think/act/observe node cycle into a single sequential
//! loop bounded by `maxToolTurns`, since that is all this agent's contract
//! requires.

use crate::capability::should_use_streaming;
use crate::error::AgentError;
use crate::llm::{ChatClient, ChatOutcome, ChatRequestOptions};
use crate::tools::{tool_schema_json, ToolRegistry};
use crate::transport::StreamSink;
use serde_json::{json, Value};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

#[derive(Debug, Clone)]
pub enum ContentPart {
    Text(String),
    ImageUrl(String),
}

#[derive(Debug, Clone)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<ContentPart>,
    pub tool_calls: Vec<ToolCall>,
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            parts: vec![ContentPart::Text(text.into())],
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![ContentPart::Text(text.into())],
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn user_with_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: Role::User,
            parts,
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant(text: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            parts: vec![ContentPart::Text(text.into())],
            tool_calls,
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            parts: vec![ContentPart::Text(text.into())],
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text(t) => Some(t.clone()),
                ContentPart::ImageUrl(_) => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Serializes to the OpenAI-compatible wire shape (§6).
    pub fn to_wire_json(&self) -> Value {
        let has_images = self
            .parts
            .iter()
            .any(|p| matches!(p, ContentPart::ImageUrl(_)));

        let content = if has_images {
            json!(self
                .parts
                .iter()
                .map(|p| match p {
                    ContentPart::Text(t) => json!({"type": "text", "text": t}),
                    ContentPart::ImageUrl(url) => {
                        json!({"type": "image_url", "image_url": {"url": url}})
                    }
                })
                .collect::<Vec<_>>())
        } else {
            json!(self.text())
        };

        let mut obj = serde_json::Map::new();
        obj.insert("role".to_string(), json!(self.role.as_str()));
        obj.insert("content".to_string(), content);
        if !self.tool_calls.is_empty() {
            obj.insert(
                "tool_calls".to_string(),
                json!(self
                    .tool_calls
                    .iter()
                    .map(|tc| json!({
                        "id": tc.id,
                        "type": "function",
                        "function": {"name": tc.name, "arguments": tc.arguments}
                    }))
                    .collect::<Vec<_>>()),
            );
        }
        if let Some(ref id) = self.tool_call_id {
            obj.insert("tool_call_id".to_string(), json!(id));
        }
        Value::Object(obj)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LlmUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// One row of the `toolCalls` array in the final result (§3, §4.J).
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    pub tool: String,
    pub input: Value,
    pub ok: bool,
    pub code: Option<&'static str>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

pub enum TurnOutcome {
    Completed {
        final_message: String,
    },
    MaxToolTurnsNoFinal,
}

pub struct TurnResult {
    pub outcome: TurnOutcome,
    pub messages: Vec<Message>,
    pub tool_calls: Vec<ToolCallRecord>,
    pub usage: LlmUsage,
    pub tools_fallback_used: bool,
}

/// Tools mode, as resolved by the Option Resolver (§4.A/§4.I step 3): `auto`
/// degrades to a tools-disabled retry on `ToolUnsupported`, `on` raises
/// `TOOLS_NOT_SUPPORTED` immediately since the user demanded tool calling,
/// `off` never advertises tools at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolsMode {
    Auto,
    On,
    Off,
}

impl std::str::FromStr for ToolsMode {
    type Err = AgentError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(ToolsMode::Auto),
            "on" => Ok(ToolsMode::On),
            "off" => Ok(ToolsMode::Off),
            other => Err(AgentError::InvalidOption(format!("invalid tools mode: {other}"))),
        }
    }
}

pub struct TurnLoopConfig {
    pub model: String,
    pub provider: String,
    pub max_tool_turns: u32,
    pub tools_mode: ToolsMode,
    pub stream_requested: bool,
    pub json_mode: bool,
}

/// Runs the bounded tool-calling conversation described in §4.I.
///
/// Step 3's capability fallbacks are handled here: a `ToolUnsupported`
/// response degrades to a single tools-disabled retry of the same request;
/// `VisionUnsupported` propagates as a hard error (images were explicit user
/// input, there is no reasonable degraded retry); `StreamUnsupported` drops
/// to a non-streaming retry of the same request.
pub async fn run_turn_loop(
    client: &ChatClient,
    registry: &ToolRegistry,
    cfg: &TurnLoopConfig,
    mut messages: Vec<Message>,
    mut stream_sink: Option<StreamSink<'_>>,
) -> Result<TurnResult, AgentError> {
    let mut usage = LlmUsage::default();
    let mut tool_calls_record = Vec::new();
    let mut tools_fallback_used = false;
    let mut tools_enabled = cfg.tools_mode != ToolsMode::Off;

    let specs = registry.specs();
    let tools_json = tool_schema_json(&specs);

    for _turn in 0..cfg.max_tool_turns {
        let tools_opt = if tools_enabled { Some(&tools_json) } else { None };
        let stream = should_use_streaming(
            cfg.stream_requested,
            cfg.json_mode,
            tools_enabled,
            &cfg.provider,
        );

        let opts = ChatRequestOptions {
            model: &cfg.model,
            messages: &messages,
            tools: tools_opt,
            stream,
        };

        let outcome = if stream {
            let forward: StreamSink = Box::new(|delta: &str| {
                if let Some(sink) = stream_sink.as_mut() {
                    sink(delta);
                }
            });
            client.complete_streaming(&opts, forward).await?
        } else {
            client.complete(&opts).await?
        };

        let result = match outcome {
            ChatOutcome::Success(result) => result,
            ChatOutcome::ToolUnsupported => {
                if !tools_enabled || cfg.tools_mode == ToolsMode::On {
                    return Err(AgentError::ToolsNotSupported);
                }
                tools_enabled = false;
                tools_fallback_used = true;
                continue;
            }
            ChatOutcome::VisionUnsupported => {
                return Err(AgentError::VisionNotSupported);
            }
            ChatOutcome::StreamUnsupported => {
                let opts = ChatRequestOptions {
                    model: &cfg.model,
                    messages: &messages,
                    tools: tools_opt,
                    stream: false,
                };
                match client.complete(&opts).await? {
                    ChatOutcome::Success(result) => result,
                    _ => {
                        return Err(AgentError::RuntimeError(
                            "provider rejected both streaming and non-streaming requests".into(),
                        ))
                    }
                }
            }
            ChatOutcome::Unrecognized(message) => {
                return Err(AgentError::RuntimeError(crate::error::redact(&message)));
            }
        };

        if let Some(u) = result.usage {
            usage.prompt_tokens += u.prompt_tokens;
            usage.completion_tokens += u.completion_tokens;
            usage.total_tokens += u.total_tokens;
        }

        if result.tool_calls.is_empty() {
            messages.push(Message::assistant(result.content.clone(), Vec::new()));
            return Ok(TurnResult {
                outcome: TurnOutcome::Completed {
                    final_message: result.content,
                },
                messages,
                tool_calls: tool_calls_record,
                usage,
                tools_fallback_used,
            });
        }

        messages.push(Message::assistant(
            result.content.clone(),
            result.tool_calls.clone(),
        ));

        for call in &result.tool_calls {
            let args: Value = serde_json::from_str(&call.arguments).unwrap_or(json!({}));
            let started = Instant::now();
            let tool_result = registry.call(&call.name, args.clone()).await;
            let duration_ms = started.elapsed().as_millis() as u64;

            tool_calls_record.push(ToolCallRecord {
                tool: call.name.clone(),
                input: args,
                ok: tool_result.ok,
                code: tool_result.code,
                error: tool_result.error.clone(),
                duration_ms,
            });

            messages.push(Message::tool_result(
                call.id.clone(),
                tool_result.to_json().to_string(),
            ));
        }
    }

    Ok(TurnResult {
        outcome: TurnOutcome::MaxToolTurnsNoFinal,
        messages,
        tool_calls: tool_calls_record,
        usage,
        tools_fallback_used,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_json_plain_text_message() {
        let msg = Message::user_text("hello");
        let value = msg.to_wire_json();
        assert_eq!(value["role"], json!("user"));
        assert_eq!(value["content"], json!("hello"));
    }

    #[test]
    fn wire_json_with_images_uses_parts_array() {
        let msg = Message::user_with_parts(vec![
            ContentPart::Text("describe this".to_string()),
            ContentPart::ImageUrl("data:image/png;base64,abc".to_string()),
        ]);
        let value = msg.to_wire_json();
        assert!(value["content"].is_array());
        assert_eq!(value["content"][0]["type"], json!("text"));
        assert_eq!(value["content"][1]["type"], json!("image_url"));
    }

    #[test]
    fn assistant_message_carries_tool_calls() {
        let msg = Message::assistant(
            "",
            vec![ToolCall {
                id: "call_1".to_string(),
                name: "read_file".to_string(),
                arguments: "{}".to_string(),
            }],
        );
        let value = msg.to_wire_json();
        assert_eq!(value["tool_calls"][0]["function"]["name"], json!("read_file"));
    }
}
