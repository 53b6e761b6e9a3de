//! `RuntimeConfig` and its nested `Policy` (§3, §6).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single policy rule: wildcard, regex (`re:<pattern>`), or plain text
/// (exact-or-prefix match, never substring; §4.C).
pub type Rule = String;

/// Command-security policy, nested in [`RuntimeConfig`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Policy {
    #[serde(default)]
    pub deny_critical: Vec<Rule>,
    #[serde(default)]
    pub modes: HashMap<String, ProfileRules>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProfileRules {
    #[serde(default)]
    pub allow: Vec<Rule>,
    #[serde(default)]
    pub deny: Vec<Rule>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AttachmentLimits {
    pub max_files: Option<u64>,
    pub max_images: Option<u64>,
    pub max_file_bytes: Option<u64>,
    pub max_image_bytes: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageStatsConfig {
    pub enabled: bool,
    pub file: String,
    pub retention_days: u32,
    pub max_bytes: u64,
}

impl Default for UsageStatsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            file: "agent.usage.ndjson".to_string(),
            retention_days: 30,
            max_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Process-wide defaults & policy (§3). Loaded once, merged non-destructively
/// with hardcoded defaults, never written back by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub schema_version: u32,
    pub default_provider: Option<String>,
    pub default_model: Option<String>,
    pub profile: String,
    pub default_approval_mode: String,
    pub default_tools_mode: String,
    pub max_tool_turns: u32,
    pub command_timeout_ms: u64,
    pub allow_insecure_http: bool,
    pub system_prompt: Option<String>,
    pub attachments: AttachmentLimits,
    pub usage_stats: UsageStatsConfig,
    pub security: Policy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let mut modes = HashMap::new();
        modes.insert(
            "safe".to_string(),
            ProfileRules {
                allow: vec!["*".to_string()],
                deny: vec![
                    "rm".to_string(),
                    "sudo".to_string(),
                    "shutdown".to_string(),
                    "reboot".to_string(),
                ],
            },
        );
        modes.insert(
            "dev".to_string(),
            ProfileRules {
                allow: vec!["*".to_string()],
                deny: vec!["sudo".to_string(), "shutdown".to_string()],
            },
        );
        modes.insert(
            "framework".to_string(),
            ProfileRules {
                allow: vec!["*".to_string()],
                deny: vec![],
            },
        );
        Self {
            schema_version: 1,
            default_provider: None,
            default_model: None,
            profile: "safe".to_string(),
            default_approval_mode: "ask".to_string(),
            default_tools_mode: "auto".to_string(),
            max_tool_turns: 10,
            command_timeout_ms: 10_000,
            allow_insecure_http: false,
            system_prompt: None,
            attachments: AttachmentLimits::default(),
            usage_stats: UsageStatsConfig::default(),
            security: Policy {
                deny_critical: vec![
                    "re:rm\\s+-rf\\s+/".to_string(),
                    "re::\\(\\)\\s*\\{.*\\};\\s*:".to_string(),
                    "mkfs".to_string(),
                ],
                modes,
            },
        }
    }
}

/// Mirrors [`RuntimeConfig`] with every field optional, used to deserialize
/// a user-supplied partial document and merge it onto the defaults.
/// Deeper containers (rules, modes) replace wholesale rather than merging
/// field-by-field (§9 design note on configuration merging).
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialRuntimeConfig {
    pub schema_version: Option<u32>,
    pub default_provider: Option<String>,
    pub default_model: Option<String>,
    pub profile: Option<String>,
    pub default_approval_mode: Option<String>,
    pub default_tools_mode: Option<String>,
    pub max_tool_turns: Option<u32>,
    pub command_timeout_ms: Option<u64>,
    pub allow_insecure_http: Option<bool>,
    pub system_prompt: Option<String>,
    pub attachments: Option<AttachmentLimits>,
    pub usage_stats: Option<UsageStatsConfig>,
    pub security: Option<Policy>,
}

impl PartialRuntimeConfig {
    pub fn merge_onto(self, mut base: RuntimeConfig) -> RuntimeConfig {
        if let Some(v) = self.schema_version {
            base.schema_version = v;
        }
        if self.default_provider.is_some() {
            base.default_provider = self.default_provider;
        }
        if self.default_model.is_some() {
            base.default_model = self.default_model;
        }
        if let Some(v) = self.profile {
            base.profile = v;
        }
        if let Some(v) = self.default_approval_mode {
            base.default_approval_mode = v;
        }
        if let Some(v) = self.default_tools_mode {
            base.default_tools_mode = v;
        }
        if let Some(v) = self.max_tool_turns {
            base.max_tool_turns = v;
        }
        if let Some(v) = self.command_timeout_ms {
            base.command_timeout_ms = v;
        }
        if let Some(v) = self.allow_insecure_http {
            base.allow_insecure_http = v;
        }
        if self.system_prompt.is_some() {
            base.system_prompt = self.system_prompt;
        }
        if let Some(v) = self.attachments {
            base.attachments = v;
        }
        if let Some(v) = self.usage_stats {
            base.usage_stats = v;
        }
        if let Some(v) = self.security {
            base.security = v;
        }
        base
    }
}
