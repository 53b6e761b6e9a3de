//! Result Shaper (§4.J): builds the machine-readable JSON output object and
//! the non-JSON plain-text rendering, and carries the exit-code mapping.

use crate::attachments::ResolvedAttachments;
use crate::turn::{LlmUsage, ToolCallRecord, TurnOutcome, TurnResult};
use serde_json::{json, Value};

pub struct ResultContext<'a> {
    pub provider: &'a str,
    pub model: &'a str,
    pub profile: &'a str,
    pub approval_mode: &'a str,
    pub tools_mode: &'a str,
    pub retries_used: u32,
    pub timing_ms: u64,
}

/// Builds the full success-path JSON object (§4.J field list).
pub fn build_success_json(
    ctx: &ResultContext,
    turn: &TurnResult,
    attachments: &ResolvedAttachments,
) -> Value {
    let final_message = match &turn.outcome {
        TurnOutcome::Completed { final_message } => final_message.clone(),
        TurnOutcome::MaxToolTurnsNoFinal => String::new(),
    };
    let ok = matches!(turn.outcome, TurnOutcome::Completed { .. });

    let mut value = json!({
        "ok": ok,
        "provider": ctx.provider,
        "model": ctx.model,
        "profile": ctx.profile,
        "mode": ctx.tools_mode,
        "approvalMode": ctx.approval_mode,
        "toolsMode": ctx.tools_mode,
        "toolsEnabled": ctx.tools_mode != "off",
        "toolsFallbackUsed": turn.tools_fallback_used,
        "health": health_json(ctx.retries_used, &turn.tool_calls),
        "attachments": attachments_json(attachments),
        "usage": usage_json(&turn.usage),
        "message": final_message,
        "toolCalls": tool_calls_json(&turn.tool_calls),
        "timingMs": ctx.timing_ms,
    });

    if !ok {
        if let Value::Object(ref mut map) = value {
            map.insert(
                "error".to_string(),
                json!("max tool turns reached without a final answer"),
            );
            map.insert("code".to_string(), json!("MAX_TOOL_TURNS_NO_FINAL"));
        }
    }

    value
}

/// Builds the error-path JSON object: `ok:false` plus the guaranteed
/// `error`/`code` fields (§4.J).
pub fn build_error_json(ctx: &ResultContext, error_message: &str, code: &str, timing_ms: u64) -> Value {
    json!({
        "ok": false,
        "provider": ctx.provider,
        "model": ctx.model,
        "profile": ctx.profile,
        "approvalMode": ctx.approval_mode,
        "toolsMode": ctx.tools_mode,
        "error": crate::error::redact(error_message),
        "code": code,
        "timingMs": timing_ms,
    })
}

fn health_json(retries_used: u32, tool_calls: &[ToolCallRecord]) -> Value {
    let total = tool_calls.len() as u64;
    let failed = tool_calls.iter().filter(|t| !t.ok).count() as u64;
    let failure_rate = if total == 0 { 0.0 } else { failed as f64 / total as f64 };
    json!({
        "retriesUsed": retries_used,
        "toolCallsTotal": total,
        "toolCallsFailed": failed,
        "toolCallFailureRate": failure_rate,
    })
}

fn attachments_json(attachments: &ResolvedAttachments) -> Value {
    json!({
        "files": attachments.files.iter().map(|f| json!({
            "path": f.path.to_string_lossy(),
            "bytes": f.bytes,
        })).collect::<Vec<_>>(),
        "images": attachments.images.iter().map(|i| json!({
            "path": i.path.to_string_lossy(),
            "bytes": i.bytes,
            "mime": i.mime,
        })).collect::<Vec<_>>(),
    })
}

fn usage_json(usage: &LlmUsage) -> Value {
    json!({
        "promptTokens": usage.prompt_tokens,
        "completionTokens": usage.completion_tokens,
        "totalTokens": usage.total_tokens,
        "hasUsage": usage.total_tokens > 0 || usage.prompt_tokens > 0 || usage.completion_tokens > 0,
    })
}

fn tool_calls_json(tool_calls: &[ToolCallRecord]) -> Value {
    Value::Array(
        tool_calls
            .iter()
            .map(|tc| {
                json!({
                    "tool": tc.tool,
                    "input": tc.input,
                    "ok": tc.ok,
                    "result": if tc.ok { Some(json!({"code": tc.code})) } else { None },
                    "error": if tc.ok { None } else { Some(json!({"message": tc.error, "code": tc.code})) },
                    "meta": {"duration_ms": tc.duration_ms},
                })
            })
            .collect(),
    )
}

/// Non-JSON plain-text rendering: the final message alone, written to
/// stdout (skipped by callers when streaming already emitted it).
pub fn plain_text_output(turn: &TurnResult) -> Option<String> {
    match &turn.outcome {
        TurnOutcome::Completed { final_message } => Some(final_message.clone()),
        TurnOutcome::MaxToolTurnsNoFinal => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turn::TurnOutcome;

    fn ctx() -> ResultContext<'static> {
        ResultContext {
            provider: "openai",
            model: "gpt-4o",
            profile: "safe",
            approval_mode: "ask",
            tools_mode: "auto",
            retries_used: 0,
            timing_ms: 42,
        }
    }

    #[test]
    fn success_json_includes_required_fields() {
        let turn = TurnResult {
            outcome: TurnOutcome::Completed {
                final_message: "done".to_string(),
            },
            messages: vec![],
            tool_calls: vec![],
            usage: LlmUsage::default(),
            tools_fallback_used: false,
        };
        let value = build_success_json(&ctx(), &turn, &ResolvedAttachments::default());
        assert_eq!(value["ok"], json!(true));
        assert_eq!(value["message"], json!("done"));
        assert_eq!(value["health"]["toolCallsTotal"], json!(0));
    }

    #[test]
    fn max_turns_no_final_is_not_ok_with_code() {
        let turn = TurnResult {
            outcome: TurnOutcome::MaxToolTurnsNoFinal,
            messages: vec![],
            tool_calls: vec![],
            usage: LlmUsage::default(),
            tools_fallback_used: false,
        };
        let value = build_success_json(&ctx(), &turn, &ResolvedAttachments::default());
        assert_eq!(value["ok"], json!(false));
        assert_eq!(value["code"], json!("MAX_TOOL_TURNS_NO_FINAL"));
    }

    #[test]
    fn error_json_redacts_secrets() {
        let value = build_error_json(&ctx(), "Authorization: Bearer sk-abc rejected", "RUNTIME_ERROR", 10);
        assert!(!value["error"].as_str().unwrap().contains("sk-abc"));
    }
}
