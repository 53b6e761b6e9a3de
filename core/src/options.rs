//! Option Resolver (§4.A): merges CLI flags, environment overrides and the
//! loaded runtime config into one resolved set, CLI → env → config-file →
//! defaults. `apply_env_overrides` is pure: same inputs, same output, no
//! mutation of its arguments (§8 invariant 8).

use crate::error::AgentError;

#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub message: Option<String>,
    pub model: Option<String>,
    pub config_path: Option<String>,
    pub auth_config_path: Option<String>,
    pub profile: Option<String>,
    pub approval: Option<String>,
    pub tools: Option<String>,
    pub yes: bool,
    pub unsafe_mode: bool,
    pub files: Vec<String>,
    pub images: Vec<String>,
    pub system_prompt: Option<String>,
    pub max_file_bytes: Option<u64>,
    pub max_image_bytes: Option<u64>,
    pub max_files: Option<u64>,
    pub max_images: Option<u64>,
    pub command_timeout_ms: Option<u64>,
    pub allow_insecure_http: bool,
    pub json: bool,
    pub json_schema: bool,
    pub stream: bool,
    pub verbose: bool,
    pub debug: bool,
    pub log: bool,
    pub log_file: Option<String>,
    pub stats: Option<Option<u32>>,
}

/// Read-only view of the environment variables in the overlay set (§4.A).
/// Isolated behind a trait so `resolve` can be tested without real env vars.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;
}

pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedOptions {
    pub message: Option<String>,
    pub model: Option<String>,
    pub profile: String,
    pub approval: String,
    pub tools: String,
    pub system_prompt: Option<String>,
    pub max_file_bytes: Option<u64>,
    pub max_image_bytes: Option<u64>,
    pub max_files: Option<u64>,
    pub max_images: Option<u64>,
    pub command_timeout_ms: u64,
    pub allow_insecure_http: bool,
}

fn truthy(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes")
}

fn parse_limit(raw: &str, field: &str) -> Result<u64, AgentError> {
    raw.parse::<u64>()
        .map_err(|_| AgentError::AttachmentLimitInvalid(format!("{field}: {raw}")))
}

/// Merges CLI options, the environment overlay, and the loaded runtime
/// config's defaults, in that precedence order. Does not mutate `cli`.
pub fn resolve(
    cli: &CliOptions,
    env: &dyn EnvSource,
    defaults: &crate::config::RuntimeConfig,
) -> Result<ResolvedOptions, AgentError> {
    let model = cli
        .model
        .clone()
        .or_else(|| env.get("AGENT_MODEL"))
        .or_else(|| defaults.default_model.clone());

    let profile = if cli.unsafe_mode {
        "framework".to_string()
    } else {
        cli.profile
            .clone()
            .or_else(|| env.get("AGENT_PROFILE"))
            .unwrap_or_else(|| defaults.profile.clone())
    };
    if !["safe", "dev", "framework"].contains(&profile.as_str()) {
        return Err(AgentError::InvalidOption(format!("invalid profile: {profile}")));
    }

    let approval = if cli.yes {
        "auto".to_string()
    } else {
        cli.approval
            .clone()
            .or_else(|| env.get("AGENT_APPROVAL"))
            .unwrap_or_else(|| defaults.default_approval_mode.clone())
    };
    if !["ask", "auto", "never"].contains(&approval.as_str()) {
        return Err(AgentError::InvalidOption(format!(
            "invalid approval mode: {approval}"
        )));
    }

    let tools = if cli.tools.as_deref() == Some("__no_tools__") {
        "off".to_string()
    } else {
        cli.tools
            .clone()
            .unwrap_or_else(|| defaults.default_tools_mode.clone())
    };
    if !["auto", "on", "off"].contains(&tools.as_str()) {
        return Err(AgentError::InvalidOption(format!("invalid tools mode: {tools}")));
    }

    // §4.A: explicit empty system-prompt wins; env is only consulted when
    // the CLI field is entirely unset.
    let system_prompt = match &cli.system_prompt {
        Some(s) => Some(s.clone()),
        None => match env.get("AGENT_SYSTEM_PROMPT") {
            Some(s) => Some(s),
            None => defaults.system_prompt.clone(),
        },
    };

    let max_file_bytes = resolve_limit_field(
        cli.max_file_bytes,
        env.get("AGENT_MAX_FILE_BYTES"),
        defaults.attachments.max_file_bytes,
        "max-file-bytes",
    )?;
    let max_image_bytes = resolve_limit_field(
        cli.max_image_bytes,
        env.get("AGENT_MAX_IMAGE_BYTES"),
        defaults.attachments.max_image_bytes,
        "max-image-bytes",
    )?;
    let max_files = resolve_limit_field(
        cli.max_files,
        env.get("AGENT_MAX_FILES"),
        defaults.attachments.max_files,
        "max-files",
    )?;
    let max_images = resolve_limit_field(
        cli.max_images,
        env.get("AGENT_MAX_IMAGES"),
        defaults.attachments.max_images,
        "max-images",
    )?;

    let command_timeout_ms = match cli.command_timeout_ms {
        Some(v) => v,
        None => match env.get("AGENT_COMMAND_TIMEOUT").and_then(|raw| raw.parse::<u64>().ok()) {
            Some(v) => v,
            None => defaults.command_timeout_ms,
        },
    }
    .clamp(100, 600_000);

    let allow_insecure_http = cli.allow_insecure_http
        || env
            .get("AGENT_ALLOW_INSECURE_HTTP")
            .map(|v| truthy(&v))
            .unwrap_or(defaults.allow_insecure_http);

    Ok(ResolvedOptions {
        message: cli.message.clone(),
        model,
        profile,
        approval,
        tools,
        system_prompt,
        max_file_bytes,
        max_image_bytes,
        max_files,
        max_images,
        command_timeout_ms,
        allow_insecure_http,
    })
}

fn resolve_limit_field(
    cli_value: Option<u64>,
    env_value: Option<String>,
    default_value: Option<u64>,
    field: &str,
) -> Result<Option<u64>, AgentError> {
    if let Some(v) = cli_value {
        return Ok(Some(v));
    }
    if let Some(raw) = env_value {
        return Ok(Some(parse_limit(&raw, field)?));
    }
    Ok(default_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeEnv(HashMap<&'static str, &'static str>);
    impl EnvSource for FakeEnv {
        fn get(&self, key: &str) -> Option<String> {
            self.0.get(key).map(|v| v.to_string())
        }
    }

    #[test]
    fn cli_takes_precedence_over_env_and_defaults() {
        let cli = CliOptions {
            profile: Some("dev".to_string()),
            ..Default::default()
        };
        let env = FakeEnv(HashMap::from([("AGENT_PROFILE", "framework")]));
        let defaults = crate::config::RuntimeConfig::default();
        let resolved = resolve(&cli, &env, &defaults).unwrap();
        assert_eq!(resolved.profile, "dev");
    }

    #[test]
    fn env_used_when_cli_unset() {
        let cli = CliOptions::default();
        let env = FakeEnv(HashMap::from([("AGENT_PROFILE", "framework")]));
        let defaults = crate::config::RuntimeConfig::default();
        let resolved = resolve(&cli, &env, &defaults).unwrap();
        assert_eq!(resolved.profile, "framework");
    }

    #[test]
    fn unsafe_flag_forces_framework_profile() {
        let cli = CliOptions {
            unsafe_mode: true,
            ..Default::default()
        };
        let env = FakeEnv(HashMap::new());
        let defaults = crate::config::RuntimeConfig::default();
        let resolved = resolve(&cli, &env, &defaults).unwrap();
        assert_eq!(resolved.profile, "framework");
    }

    #[test]
    fn yes_flag_forces_auto_approval() {
        let cli = CliOptions {
            yes: true,
            ..Default::default()
        };
        let env = FakeEnv(HashMap::new());
        let defaults = crate::config::RuntimeConfig::default();
        let resolved = resolve(&cli, &env, &defaults).unwrap();
        assert_eq!(resolved.approval, "auto");
    }

    #[test]
    fn invalid_profile_is_rejected() {
        let cli = CliOptions {
            profile: Some("bogus".to_string()),
            ..Default::default()
        };
        let env = FakeEnv(HashMap::new());
        let defaults = crate::config::RuntimeConfig::default();
        assert!(matches!(
            resolve(&cli, &env, &defaults),
            Err(AgentError::InvalidOption(_))
        ));
    }

    #[test]
    fn invalid_limit_env_value_fails() {
        let cli = CliOptions::default();
        let env = FakeEnv(HashMap::from([("AGENT_MAX_FILES", "not-a-number")]));
        let defaults = crate::config::RuntimeConfig::default();
        assert!(matches!(
            resolve(&cli, &env, &defaults),
            Err(AgentError::AttachmentLimitInvalid(_))
        ));
    }

    #[test]
    fn invalid_command_timeout_env_falls_back_to_default_without_error() {
        let cli = CliOptions::default();
        let env = FakeEnv(HashMap::from([("AGENT_COMMAND_TIMEOUT", "not-a-number")]));
        let defaults = crate::config::RuntimeConfig::default();
        let resolved = resolve(&cli, &env, &defaults).unwrap();
        assert_eq!(resolved.command_timeout_ms, defaults.command_timeout_ms.clamp(100, 600_000));
    }

    #[test]
    fn resolve_does_not_mutate_cli_input() {
        let cli = CliOptions {
            profile: Some("dev".to_string()),
            ..Default::default()
        };
        let before = cli.profile.clone();
        let env = FakeEnv(HashMap::new());
        let defaults = crate::config::RuntimeConfig::default();
        let _ = resolve(&cli, &env, &defaults).unwrap();
        assert_eq!(cli.profile, before);
    }
}
