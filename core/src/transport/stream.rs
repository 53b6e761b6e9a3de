//! SSE streaming reader (§4.E, §9 design note on streaming delta
//! concatenation). Consumes `response.bytes_stream()`, buffers to whole
//! lines, splits on blank-line-delimited events, strips the `data: `
//! prefix, and stops at the `[DONE]` sentinel — the manual-SSE idiom used
//! by OpenAI-compatible providers across the pack.

use crate::error::AgentError;
use futures_util::StreamExt;
use reqwest::Response;
use serde_json::Value;

/// Sink that receives each text delta as it arrives (written straight to
/// stdout by the CLI in non-JSON mode).
pub type StreamSink<'a> = Box<dyn FnMut(&str) + Send + 'a>;

/// Reads `response` as an SSE event stream, extracting assistant text
/// deltas (string `content`, or array parts with a `text` field) and
/// forwarding each to `sink` while accumulating the full text. Returns the
/// accumulated text once `[DONE]` is seen or the body ends.
pub async fn read_sse_stream(
    response: Response,
    mut sink: StreamSink<'_>,
) -> Result<String, AgentError> {
    let mut stream = response.bytes_stream();
    let mut buffer = String::new();
    let mut accumulated = String::new();

    while let Some(chunk) = stream.next().await {
        let bytes = chunk.map_err(|e| AgentError::RuntimeError(crate::error::redact(&e.to_string())))?;
        buffer.push_str(&String::from_utf8_lossy(&bytes));

        while let Some(pos) = buffer.find("\n\n") {
            let event = buffer[..pos].to_string();
            buffer.drain(..pos + 2);
            if let Some(done) = process_event(&event, &mut sink, &mut accumulated)? {
                if done {
                    return Ok(accumulated);
                }
            }
        }
    }

    Ok(accumulated)
}

/// Processes one `\n`-joined SSE event block. Returns `Ok(Some(true))` when
/// the `[DONE]` sentinel was seen.
fn process_event(
    event: &str,
    sink: &mut StreamSink<'_>,
    accumulated: &mut String,
) -> Result<Option<bool>, AgentError> {
    for line in event.lines() {
        let line = line.trim();
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        if data == "[DONE]" {
            return Ok(Some(true));
        }
        let parsed: Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(_) => continue,
        };
        if let Some(delta) = extract_delta_text(&parsed) {
            if !delta.is_empty() {
                sink(&delta);
                accumulated.push_str(&delta);
            }
        }
    }
    Ok(None)
}

fn extract_delta_text(event: &Value) -> Option<String> {
    let delta = event
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|arr| arr.first())
        .and_then(|choice| choice.get("delta"))?;

    if let Some(s) = delta.get("content").and_then(|c| c.as_str()) {
        return Some(s.to_string());
    }
    if let Some(parts) = delta.get("content").and_then(|c| c.as_array()) {
        let mut out = String::new();
        for part in parts {
            if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
                out.push_str(text);
            }
        }
        return Some(out);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_plain_string_delta() {
        let event: Value = serde_json::from_str(
            r#"{"choices":[{"delta":{"content":"hello"}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_delta_text(&event).as_deref(), Some("hello"));
    }

    #[test]
    fn extracts_array_part_delta() {
        let event: Value = serde_json::from_str(
            r#"{"choices":[{"delta":{"content":[{"type":"text","text":"hi"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_delta_text(&event).as_deref(), Some("hi"));
    }

    #[test]
    fn missing_delta_yields_none() {
        let event: Value = serde_json::from_str(r#"{"choices":[{}]}"#).unwrap();
        assert_eq!(extract_delta_text(&event), None);
    }
}
