//! Stable error taxonomy for the agent runtime.
//!
//! Every variant carries the `code` string used in JSON output and an exit
//! code for the CLI's process exit status. Tool-level failures do not use
//! this type: they are caught at the call site and folded into a
//! [`crate::tools::ToolResult`] instead (see §7 propagation rules).

use thiserror::Error;

/// Top-level error type for everything outside the tool-call boundary:
/// config, credentials, policy setup, transport, capability, approval and
/// option validation.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid runtime config: {0}")]
    AgentConfigInvalid(String),
    #[error("runtime config error: {0}")]
    AgentConfigError(String),
    #[error("invalid credentials file: {0}")]
    AuthConfigInvalid(String),
    #[error("credentials file error: {0}")]
    AuthConfigError(String),

    #[error("provider not configured: {0}")]
    ProviderNotConfigured(String),
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),
    #[error("insecure base url: {0}")]
    InsecureBaseUrl(String),

    #[error("invalid option: {0}")]
    InvalidOption(String),
    #[error("invalid attachment limit: {0}")]
    AttachmentLimitInvalid(String),

    #[error("attachment not found: {0}")]
    AttachmentNotFound(String),
    #[error("attachment unreadable: {0}")]
    AttachmentUnreadable(String),
    #[error("attachment too large: {0}")]
    AttachmentTooLarge(String),
    #[error("too many file attachments: {0}")]
    AttachmentTooManyFiles(String),
    #[error("too many image attachments: {0}")]
    AttachmentTooManyImages(String),
    #[error("unsupported attachment type: {0}")]
    AttachmentTypeUnsupported(String),

    #[error("interactive approval unavailable in --json mode")]
    InteractiveApprovalJson,
    #[error("interactive approval requires a TTY")]
    InteractiveApprovalTty,

    #[error("tool calling is not supported by this model/provider")]
    ToolsNotSupported,
    #[error("vision input is not supported by this model/provider")]
    VisionNotSupported,

    #[error("request timed out")]
    FetchTimeout,
    #[error("retries exhausted: {0}")]
    RetryExhausted(String),

    #[error("max tool turns reached without a final answer")]
    MaxToolTurnsNoFinal,

    #[error("runtime error: {0}")]
    RuntimeError(String),
}

impl AgentError {
    /// Stable machine-readable error code, as used in JSON output (§7).
    pub fn code(&self) -> &'static str {
        use AgentError::*;
        match self {
            AgentConfigInvalid(_) => "AGENT_CONFIG_INVALID",
            AgentConfigError(_) => "AGENT_CONFIG_ERROR",
            AuthConfigInvalid(_) => "AUTH_CONFIG_INVALID",
            AuthConfigError(_) => "AUTH_CONFIG_ERROR",
            ProviderNotConfigured(_) => "PROVIDER_NOT_CONFIGURED",
            InvalidBaseUrl(_) => "INVALID_BASE_URL",
            InsecureBaseUrl(_) => "INSECURE_BASE_URL",
            InvalidOption(_) => "INVALID_OPTION",
            AttachmentLimitInvalid(_) => "ATTACHMENT_LIMIT_INVALID",
            AttachmentNotFound(_) => "ATTACHMENT_NOT_FOUND",
            AttachmentUnreadable(_) => "ATTACHMENT_UNREADABLE",
            AttachmentTooLarge(_) => "ATTACHMENT_TOO_LARGE",
            AttachmentTooManyFiles(_) => "ATTACHMENT_TOO_MANY_FILES",
            AttachmentTooManyImages(_) => "ATTACHMENT_TOO_MANY_IMAGES",
            AttachmentTypeUnsupported(_) => "ATTACHMENT_TYPE_UNSUPPORTED",
            InteractiveApprovalJson => "INTERACTIVE_APPROVAL_JSON",
            InteractiveApprovalTty => "INTERACTIVE_APPROVAL_TTY",
            ToolsNotSupported => "TOOLS_NOT_SUPPORTED",
            VisionNotSupported => "VISION_NOT_SUPPORTED",
            FetchTimeout => "FETCH_TIMEOUT",
            RetryExhausted(_) => "RETRY_EXHAUSTED",
            MaxToolTurnsNoFinal => "MAX_TOOL_TURNS_NO_FINAL",
            RuntimeError(_) => "RUNTIME_ERROR",
        }
    }

    /// Exit code matrix from §4.J / §8.
    pub fn exit_code(&self) -> i32 {
        use AgentError::*;
        match self {
            AgentConfigInvalid(_) | AgentConfigError(_) => 2,
            AuthConfigInvalid(_) | AuthConfigError(_) => 3,
            ProviderNotConfigured(_) | InvalidBaseUrl(_) | InsecureBaseUrl(_) => 4,
            InteractiveApprovalJson | InteractiveApprovalTty => 5,
            ToolsNotSupported | VisionNotSupported => 6,
            FetchTimeout => 7,
            RetryExhausted(_) => 8,
            AttachmentLimitInvalid(_)
            | AttachmentNotFound(_)
            | AttachmentUnreadable(_)
            | AttachmentTooLarge(_)
            | AttachmentTooManyFiles(_)
            | AttachmentTooManyImages(_)
            | AttachmentTypeUnsupported(_) => 9,
            InvalidOption(_) | MaxToolTurnsNoFinal | RuntimeError(_) => 1,
        }
    }
}

/// Redacts credential-shaped substrings from a human-facing message before
/// it is logged or placed in JSON output (§7). Intentionally coarse: it is
/// meant to catch accidental leakage, not to be a full secret scanner.
pub fn redact(message: &str) -> String {
    let patterns = [
        "bearer ",
        "authorization:",
        "apikey",
        "api_key",
        "access_token",
        "refresh_token",
        "_token",
    ];
    let lower = message.to_lowercase();
    for pat in patterns {
        if lower.contains(pat) {
            if let Some(pos) = lower.find(pat) {
                let tail_start = pos + pat.len();
                let tail = &message[tail_start..];
                let end = tail
                    .find(|c: char| c.is_whitespace() || c == '"' || c == ',')
                    .unwrap_or(tail.len());
                let mut redacted = message[..tail_start].to_string();
                redacted.push_str("[REDACTED]");
                redacted.push_str(&tail[end..]);
                return redact(&redacted);
            }
        }
    }
    message.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_taxonomy() {
        assert_eq!(AgentError::FetchTimeout.code(), "FETCH_TIMEOUT");
        assert_eq!(AgentError::FetchTimeout.exit_code(), 7);
        assert_eq!(
            AgentError::MaxToolTurnsNoFinal.code(),
            "MAX_TOOL_TURNS_NO_FINAL"
        );
    }

    #[test]
    fn redacts_bearer_token() {
        let msg = "failed: Authorization: Bearer sk-abc123 rejected";
        let red = redact(msg);
        assert!(!red.contains("sk-abc123"));
        assert!(red.contains("[REDACTED]"));
    }
}
