//! Capability Gates (§4.F): streaming/vision/tool-calling viability and
//! substring-based error classifiers. Centralized here per §9's design note
//! so the patterns can evolve without touching the turn loop.

/// The fixed set of providers known to support SSE-style streaming.
const STREAMING_CAPABLE: &[&str] = &[
    "openai",
    "copilot",
    "openrouter",
    "groq",
    "mistral",
    "deepseek",
    "fireworks",
    "moonshot",
    "together",
    "xai",
    "perplexity",
];

pub fn provider_in_streaming_set(provider: &str) -> bool {
    STREAMING_CAPABLE.contains(&provider.to_lowercase().as_str())
}

/// §4.F: `shouldUseStreaming`.
pub fn should_use_streaming(
    stream_requested: bool,
    json_mode: bool,
    tools_enabled: bool,
    provider: &str,
) -> bool {
    stream_requested
        && !json_mode
        && !tools_enabled
        && provider_in_streaming_set(provider)
}

/// §4.F: `modelLikelySupportsVision`, a provider-specific heuristic.
pub fn model_likely_supports_vision(provider: &str, model: &str) -> bool {
    let provider = provider.to_lowercase();
    let model = model.to_lowercase();
    match provider.as_str() {
        "perplexity" | "groq" | "deepseek" => false,
        "openai" | "copilot" => {
            ["gpt-4o", "gpt-4.1", "gpt-5"].iter().any(|m| model.contains(m))
        }
        "openrouter" => ["gpt-4o", "gpt-4.1", "gpt-5", "vision", "gemini", "vl"]
            .iter()
            .any(|m| model.contains(m)),
        _ => false,
    }
}

/// Tool-unsupported error classifier (case-insensitive substring match).
pub fn is_tool_unsupported_error(message: &str) -> bool {
    let m = message.to_lowercase();
    [
        "tool calling is not supported",
        "tools are not supported",
        "tool_choice",
        "function calling is not supported",
    ]
    .iter()
    .any(|needle| m.contains(needle))
}

/// Vision-unsupported error classifier: requires BOTH a vision keyword and a
/// rejection keyword; a standalone "vision" word must not trigger alone.
pub fn is_vision_unsupported_error(message: &str) -> bool {
    let m = message.to_lowercase();
    let vision_keyword = m.contains("vision")
        || m.contains("image")
        || (m.contains("content type") && m.contains("image"));
    let rejection_keyword =
        m.contains("not supported") || m.contains("not support") || m.contains("not accepted");
    vision_keyword && rejection_keyword
}

/// Stream-unsupported error classifier.
pub fn is_stream_unsupported_error(message: &str) -> bool {
    let m = message.to_lowercase();
    if m.contains("unknown parameter: stream") {
        return true;
    }
    m.contains("stream")
        && (m.contains("not support") || m.contains("unsupported") || m.contains("invalid"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streaming_requires_all_conditions() {
        assert!(should_use_streaming(true, false, false, "openai"));
        assert!(!should_use_streaming(true, true, false, "openai"));
        assert!(!should_use_streaming(true, false, true, "openai"));
        assert!(!should_use_streaming(true, false, false, "unknown-provider"));
    }

    #[test]
    fn vision_heuristic_by_provider() {
        assert!(model_likely_supports_vision("openai", "gpt-4o-mini"));
        assert!(!model_likely_supports_vision("groq", "llama-vision"));
        assert!(model_likely_supports_vision("openrouter", "google/gemini-pro-vision"));
    }

    #[test]
    fn tool_unsupported_detects_known_phrases() {
        assert!(is_tool_unsupported_error("Tool calling is not supported"));
        assert!(is_tool_unsupported_error("Error: tool_choice invalid"));
        assert!(!is_tool_unsupported_error("internal server error"));
    }

    #[test]
    fn vision_unsupported_requires_both_keywords() {
        assert!(is_vision_unsupported_error(
            "model does not support image input"
        ));
        assert!(!is_vision_unsupported_error("vision is great"));
        assert!(!is_vision_unsupported_error("image uploaded successfully"));
    }

    #[test]
    fn stream_unsupported_detects_combinations() {
        assert!(is_stream_unsupported_error("unknown parameter: stream"));
        assert!(is_stream_unsupported_error("stream is not supported"));
        assert!(!is_stream_unsupported_error("mainstream adoption"));
    }
}
