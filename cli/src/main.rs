//! Command-line front end for the agent runtime: wires the Option Resolver,
//! Config Store, Credential Manager, Turn Loop and Result Shaper into a
//! single invocation (§4.A-J).

mod log_format;
mod logging;

use agent_core::approval::TtyPrompter;
use agent_core::attachments::{build_user_message_parts, resolve_attachments};
use agent_core::config::{load_credentials, load_runtime_config, AttachmentLimits, ProviderEntry, RuntimeConfig};
use agent_core::credentials::{
    ensure_runtime_token, resolve_openai_compatible, validate_base_url, HttpCopilotEndpoints,
};
use agent_core::error::AgentError;
use agent_core::llm::ChatClient;
use agent_core::options::{self, CliOptions, ProcessEnv, ResolvedOptions};
use agent_core::result::{build_error_json, build_success_json, plain_text_output, ResultContext};
use agent_core::tools::shell::ShellRunner;
use agent_core::tools::ToolRegistry;
use agent_core::transport::RetryConfig;
use agent_core::turn::{run_turn_loop, Message, ToolsMode, TurnLoopConfig};
use agent_core::usage::{append_entry, read_entries, UsageStatsEntry};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

const APP_NAME: &str = "agent";
const HTTP_TIMEOUT_MS: u64 = 60_000;

#[derive(Parser, Debug)]
#[command(name = "agent", version, about = "Terminal-based, multi-provider AI agent runtime")]
struct Args {
    #[arg(short = 'm', long)]
    message: Option<String>,

    #[arg(long)]
    model: Option<String>,

    #[arg(long, value_name = "PATH")]
    config: Option<String>,

    #[arg(long = "auth-config", value_name = "PATH")]
    auth_config: Option<String>,

    #[arg(long)]
    profile: Option<String>,

    #[arg(long)]
    approval: Option<String>,

    #[arg(long)]
    tools: Option<String>,

    #[arg(long = "no-tools")]
    no_tools: bool,

    #[arg(long)]
    yes: bool,

    #[arg(long = "unsafe")]
    unsafe_mode: bool,

    #[arg(long = "file", value_name = "PATH")]
    files: Vec<String>,

    #[arg(long = "image", value_name = "PATH")]
    images: Vec<String>,

    #[arg(long = "system-prompt")]
    system_prompt: Option<String>,

    #[arg(long = "max-file-bytes")]
    max_file_bytes: Option<u64>,

    #[arg(long = "max-image-bytes")]
    max_image_bytes: Option<u64>,

    #[arg(long = "max-files")]
    max_files: Option<u64>,

    #[arg(long = "max-images")]
    max_images: Option<u64>,

    #[arg(long = "command-timeout")]
    command_timeout_ms: Option<u64>,

    #[arg(long = "allow-insecure-http")]
    allow_insecure_http: bool,

    #[arg(long)]
    json: bool,

    #[arg(long = "json-schema")]
    json_schema: bool,

    #[arg(long)]
    stream: bool,

    #[arg(short, long)]
    verbose: bool,

    #[arg(long)]
    debug: bool,

    #[arg(long)]
    log: bool,

    #[arg(long = "log-file", value_name = "PATH")]
    log_file: Option<String>,

    /// Usage report; optional top-N argument.
    #[arg(long, value_name = "N", num_args = 0..=1, default_missing_value = "0")]
    stats: Option<u32>,
}

impl Args {
    fn to_cli_options(&self) -> CliOptions {
        CliOptions {
            message: self.message.clone(),
            model: self.model.clone(),
            config_path: self.config.clone(),
            auth_config_path: self.auth_config.clone(),
            profile: self.profile.clone(),
            approval: self.approval.clone(),
            tools: if self.no_tools {
                Some("__no_tools__".to_string())
            } else {
                self.tools.clone()
            },
            yes: self.yes,
            unsafe_mode: self.unsafe_mode,
            files: self.files.clone(),
            images: self.images.clone(),
            system_prompt: self.system_prompt.clone(),
            max_file_bytes: self.max_file_bytes,
            max_image_bytes: self.max_image_bytes,
            max_files: self.max_files,
            max_images: self.max_images,
            command_timeout_ms: self.command_timeout_ms,
            allow_insecure_http: self.allow_insecure_http,
            json: self.json,
            json_schema: self.json_schema,
            stream: self.stream,
            verbose: self.verbose,
            debug: self.debug,
            log: self.log,
            log_file: self.log_file.clone(),
            stats: if self.stats.is_some() { Some(self.stats) } else { None },
        }
    }
}

fn json_schema_document() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "ok": {"type": "boolean"},
            "provider": {"type": "string"},
            "model": {"type": "string"},
            "profile": {"type": "string", "enum": ["safe", "dev", "framework"]},
            "mode": {"type": "string"},
            "approvalMode": {"type": "string", "enum": ["ask", "auto", "never"]},
            "toolsMode": {"type": "string", "enum": ["auto", "on", "off"]},
            "toolsEnabled": {"type": "boolean"},
            "toolsFallbackUsed": {"type": "boolean"},
            "health": {
                "type": "object",
                "properties": {
                    "retriesUsed": {"type": "integer"},
                    "toolCallsTotal": {"type": "integer"},
                    "toolCallsFailed": {"type": "integer"},
                    "toolCallFailureRate": {"type": "number"}
                }
            },
            "attachments": {"type": "object"},
            "usage": {"type": "object"},
            "message": {"type": "string"},
            "toolCalls": {"type": "array"},
            "timingMs": {"type": "integer"},
            "error": {"type": "string"},
            "code": {"type": "string"}
        },
        "required": ["ok", "provider", "model", "profile", "toolCalls", "timingMs"]
    })
}

fn default_path(base: &cross_xdg::BaseDirs, file: &str) -> PathBuf {
    base.config_home().join(APP_NAME).join(file)
}

fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Splits `--model provider/model` into its parts; a bare model name falls
/// back to the configured default provider.
fn split_selection(
    model_spec: &str,
    default_provider: Option<&str>,
) -> Result<(String, String), AgentError> {
    if let Some((provider, model)) = model_spec.split_once('/') {
        if !provider.is_empty() && !model.is_empty() {
            return Ok((provider.to_string(), model.to_string()));
        }
    }
    let provider = default_provider.ok_or_else(|| {
        AgentError::ProviderNotConfigured(
            "no provider configured; pass --model provider/model or set a default".to_string(),
        )
    })?;
    Ok((provider.to_string(), model_spec.to_string()))
}

fn print_stats(runtime_config: &RuntimeConfig, top_n: u32) -> i32 {
    let entries = match read_entries(std::path::Path::new(&runtime_config.usage_stats.file)) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("failed to read usage stats: {e}");
            return 1;
        }
    };
    let mut sorted = entries;
    sorted.sort_by(|a, b| b.total_tokens.cmp(&a.total_tokens));
    let limit = if top_n == 0 { sorted.len() } else { top_n as usize };
    for entry in sorted.into_iter().take(limit) {
        println!(
            "{}  {}/{}  requests={} tokens={}",
            entry.ts, entry.provider, entry.model, entry.request_count, entry.total_tokens
        );
    }
    0
}

#[tokio::main]
async fn main() {
    let exit_code = run().await;
    std::process::exit(exit_code);
}

async fn run() -> i32 {
    let args = Args::parse();

    let _ = config::load_and_apply(APP_NAME, None);

    let _logging_guard = logging::init(args.verbose, args.debug, args.log_file.as_deref());

    if args.json_schema {
        println!("{}", serde_json::to_string_pretty(&json_schema_document()).unwrap());
        return 0;
    }

    let base_dirs = match cross_xdg::BaseDirs::new() {
        Ok(b) => b,
        Err(e) => {
            eprintln!("failed to resolve config directory: {e}");
            return 2;
        }
    };

    let config_path = args
        .config
        .clone()
        .map(PathBuf::from)
        .unwrap_or_else(|| default_path(&base_dirs, "agent.json"));
    let auth_config_path = args
        .auth_config
        .clone()
        .map(PathBuf::from)
        .unwrap_or_else(|| default_path(&base_dirs, "agent.auth.json"));

    let runtime_config = match load_runtime_config(&config_path) {
        Ok(c) => c,
        Err(e) => return fail_early(&e, args.json),
    };

    if let Some(top_n) = args.stats {
        return print_stats(&runtime_config, top_n);
    }

    let cli_options = args.to_cli_options();
    let env = ProcessEnv;
    let resolved = match options::resolve(&cli_options, &env, &runtime_config) {
        Ok(r) => r,
        Err(e) => return fail_early(&e, args.json),
    };

    if resolved.message.is_none() {
        return fail_early(
            &AgentError::InvalidOption("--message/-m is required".to_string()),
            args.json,
        );
    }
    let message = resolved.message.clone().unwrap();

    let started = Instant::now();
    let outcome = run_invocation(&args, &resolved, &runtime_config, &auth_config_path, &message).await;

    match outcome {
        Ok(exit_code) => exit_code,
        Err(e) => {
            let ctx = ResultContext {
                provider: "",
                model: resolved.model.as_deref().unwrap_or(""),
                profile: &resolved.profile,
                approval_mode: &resolved.approval,
                tools_mode: &resolved.tools,
                retries_used: 0,
                timing_ms: started.elapsed().as_millis() as u64,
            };
            emit_error(&ctx, &e, args.json);
            e.exit_code()
        }
    }
}

fn fail_early(err: &AgentError, json_mode: bool) -> i32 {
    if json_mode {
        let ctx = ResultContext {
            provider: "",
            model: "",
            profile: "",
            approval_mode: "",
            tools_mode: "",
            retries_used: 0,
            timing_ms: 0,
        };
        println!("{}", build_error_json(&ctx, &err.to_string(), err.code(), 0));
    } else {
        eprintln!("error: {err}");
    }
    err.exit_code()
}

fn emit_error(ctx: &ResultContext, err: &AgentError, json_mode: bool) {
    if json_mode {
        println!(
            "{}",
            build_error_json(ctx, &err.to_string(), err.code(), ctx.timing_ms)
        );
    } else {
        eprintln!("error: {err}");
    }
}

/// Resolves credentials, runs the turn loop, and prints the result.
/// Returns the process exit code on success, or the error to report.
async fn run_invocation(
    args: &Args,
    resolved: &ResolvedOptions,
    runtime_config: &RuntimeConfig,
    auth_config_path: &PathBuf,
    message: &str,
) -> Result<i32, AgentError> {
    let limits = AttachmentLimits {
        max_files: resolved.max_files,
        max_images: resolved.max_images,
        max_file_bytes: resolved.max_file_bytes,
        max_image_bytes: resolved.max_image_bytes,
    };
    let attachments = resolve_attachments(&args.files, &args.images, &limits)?;

    let model_spec = resolved
        .model
        .clone()
        .ok_or_else(|| AgentError::InvalidOption("--model is required".to_string()))?;

    let mut store = load_credentials(auth_config_path)?.unwrap_or_default();
    let default_provider = store
        .default_provider
        .clone()
        .or_else(|| runtime_config.default_provider.clone());
    let (provider, model) = split_selection(&model_spec, default_provider.as_deref())?;

    let entry = store
        .providers
        .get(&provider)
        .cloned()
        .ok_or_else(|| AgentError::ProviderNotConfigured(provider.clone()))?;

    let (base_url, api_key, extra_headers) = match entry {
        ProviderEntry::OpenAiCompatible { base_url, api_key } => {
            let env_key = std::env::var("AGENT_API_KEY").ok();
            let (url, key) = resolve_openai_compatible(
                &base_url,
                &api_key,
                env_key.as_deref(),
                resolved.allow_insecure_http,
            )?;
            (url.to_string(), key, Vec::new())
        }
        ProviderEntry::GithubCopilot {
            api_base_url,
            extra_headers,
            ..
        } => {
            let endpoints = HttpCopilotEndpoints {
                http: reqwest::Client::new(),
            };
            let outcome =
                ensure_runtime_token(&endpoints, auth_config_path, &mut store, &provider).await?;
            let base_url = api_base_url.ok_or_else(|| {
                AgentError::ProviderNotConfigured("missing apiBaseUrl".to_string())
            })?;
            validate_base_url(&base_url, resolved.allow_insecure_http)?;
            let headers: Vec<(String, String)> = extra_headers.into_iter().collect();
            (base_url, Some(outcome.token), headers)
        }
    };

    let http = reqwest::Client::builder()
        .build()
        .map_err(|e| AgentError::RuntimeError(agent_core::error::redact(&e.to_string())))?;
    let client = ChatClient {
        http,
        base_url,
        api_key,
        extra_headers,
        retry: RetryConfig::default(),
        timeout_ms: HTTP_TIMEOUT_MS,
    };

    let working_folder = Arc::new(
        std::env::current_dir()
            .map_err(|e| AgentError::RuntimeError(agent_core::error::redact(&e.to_string())))?,
    );
    let approval_mode = resolved.approval.parse()?;
    let shell = ShellRunner {
        policy: Arc::new(runtime_config.security.clone()),
        profile: resolved.profile.clone(),
        approval_mode,
        command_timeout_ms: resolved.command_timeout_ms,
        prompter: Arc::new(TtyPrompter {
            json_mode: args.json,
            timeout_ms: None,
        }),
    };
    let registry = ToolRegistry::new(working_folder, shell);

    let mut messages = Vec::new();
    if let Some(ref prompt) = resolved.system_prompt {
        if !prompt.is_empty() {
            messages.push(Message::system(prompt.clone()));
        }
    }
    messages.push(Message::user_with_parts(build_user_message_parts(
        message,
        &attachments,
    )));

    let tools_mode: ToolsMode = resolved.tools.parse()?;
    let loop_cfg = TurnLoopConfig {
        model: model.clone(),
        provider: provider.clone(),
        max_tool_turns: runtime_config.max_tool_turns.clamp(1, 200),
        tools_mode,
        stream_requested: args.stream,
        json_mode: args.json,
    };

    let json_mode = args.json;
    let sink: Option<agent_core::transport::StreamSink> = if json_mode {
        None
    } else {
        Some(Box::new(|delta: &str| {
            print!("{delta}");
            let _ = std::io::stdout().flush();
        }))
    };

    let started = Instant::now();
    let turn_result =
        run_with_signal_handling(run_turn_loop(&client, &registry, &loop_cfg, messages, sink))
            .await?;
    let timing_ms = started.elapsed().as_millis() as u64;

    if runtime_config.usage_stats.enabled {
        let entry = UsageStatsEntry::from_usage(&provider, &model, &turn_result.usage, &now_iso());
        let _ = append_entry(&runtime_config.usage_stats, &entry);
    }

    let ctx = ResultContext {
        provider: &provider,
        model: &model,
        profile: &resolved.profile,
        approval_mode: &resolved.approval,
        tools_mode: &resolved.tools,
        retries_used: 0,
        timing_ms,
    };

    let value = build_success_json(&ctx, &turn_result, &attachments);
    let ok = value["ok"].as_bool().unwrap_or(false);

    if json_mode {
        println!("{value}");
    } else if let Some(text) = plain_text_output(&turn_result) {
        if !args.stream {
            println!("{text}");
        } else {
            println!();
        }
    } else if let Some(err) = value.get("error").and_then(|e| e.as_str()) {
        eprintln!("error: {err}");
    }

    if ok {
        Ok(0)
    } else {
        Ok(AgentError::MaxToolTurnsNoFinal.exit_code())
    }
}

/// Races `future` against SIGINT/SIGTERM, translating either into the
/// exit-code matrix's 130/143 (§4.J, §8).
async fn run_with_signal_handling<T>(
    future: impl std::future::Future<Output = Result<T, AgentError>>,
) -> Result<T, AgentError> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).map_err(|e| AgentError::RuntimeError(e.to_string()))?;
        tokio::select! {
            result = future => result,
            _ = tokio::signal::ctrl_c() => {
                std::process::exit(130);
            }
            _ = sigterm.recv() => {
                std::process::exit(143);
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::select! {
            result = future => result,
            _ = tokio::signal::ctrl_c() => {
                std::process::exit(130);
            }
        }
    }
}
