//! `run_command` tool and its shell runner (§4.G.1). The actual process
//! spawning is grounded on the teacher's `graphweave` `BashTool`
//! (`tokio::process::Command` + platform-gated shell selection +
//! `tokio::time::timeout`); this module additionally threads in the policy
//! engine and approval prompter per §4.G.1 steps 1-2, which the teacher's
//! bash tool does not have.

use super::{invalid_args, Tool, ToolResult, ToolSpec};
use crate::approval::{ApprovalMode, ApprovalPrompter};
use crate::config::Policy;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncReadExt;

/// 1 MiB captured-output cap per stream (§4.G.1 step 4).
const MAX_CAPTURED_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
pub struct ShellRunner {
    pub policy: Arc<Policy>,
    pub profile: String,
    pub approval_mode: ApprovalMode,
    pub command_timeout_ms: u64,
    pub prompter: Arc<dyn ApprovalPrompter>,
}

pub struct RunCommandTool {
    runner: ShellRunner,
}

impl RunCommandTool {
    pub fn new(runner: ShellRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &'static str {
        "run_command"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "run_command".to_string(),
            description: "Execute a shell command on the local machine under the active security policy.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "cmd": {"type": "string"}
                },
                "required": ["cmd"]
            }),
        }
    }

    async fn call(&self, args: Value) -> ToolResult {
        let Some(cmd) = args.get("cmd").and_then(|v| v.as_str()) else {
            return invalid_args("cmd is required");
        };
        run_command(&self.runner, cmd).await
    }
}

/// Runs the pipeline described in §4.G.1.
pub async fn run_command(runner: &ShellRunner, cmd: &str) -> ToolResult {
    let decision = crate::policy::evaluate(cmd, &runner.profile, &runner.policy);
    if !decision.allowed {
        let mut payload = serde_json::Map::new();
        payload.insert("blocked".to_string(), json!(true));
        payload.insert(
            "policy".to_string(),
            json!({"source": decision.source.as_str(), "rule": decision.rule}),
        );
        payload.insert("cmd".to_string(), json!(cmd));
        return ToolResult {
            ok: false,
            code: Some("TOOL_EXECUTION_ERROR"),
            error: Some(format!("command blocked by policy: {}", decision.rule)),
            payload,
        };
    }

    match runner.approval_mode {
        ApprovalMode::Never => {
            return blocked_result(cmd, "approval mode is never");
        }
        ApprovalMode::Ask => match runner.prompter.prompt(cmd, &runner.profile).await {
            Ok(true) => {}
            Ok(false) => return blocked_result(cmd, "user_denied"),
            Err(e) => {
                let mut payload = serde_json::Map::new();
                payload.insert("blocked".to_string(), json!(true));
                payload.insert("cmd".to_string(), json!(cmd));
                return ToolResult {
                    ok: false,
                    code: Some(e.code()),
                    error: Some(e.to_string()),
                    payload,
                };
            }
        },
        ApprovalMode::Auto => {}
    }

    execute_shell(cmd, runner.command_timeout_ms, runner.approval_mode).await
}

fn blocked_result(cmd: &str, reason: &str) -> ToolResult {
    let mut payload = serde_json::Map::new();
    payload.insert("blocked".to_string(), json!(true));
    payload.insert("reason".to_string(), json!(reason));
    payload.insert("cmd".to_string(), json!(cmd));
    ToolResult {
        ok: false,
        code: Some("TOOL_EXECUTION_ERROR"),
        error: Some(format!("command not executed: {reason}")),
        payload,
    }
}

#[cfg(unix)]
fn build_shell_command(cmd: &str) -> tokio::process::Command {
    let shell = if std::path::Path::new("/bin/sh").exists() {
        "/bin/sh"
    } else {
        "sh"
    };
    let mut c = tokio::process::Command::new(shell);
    c.arg("-lc").arg(cmd);
    c
}

#[cfg(windows)]
fn build_shell_command_powershell(cmd: &str) -> tokio::process::Command {
    let mut c = tokio::process::Command::new("powershell");
    c.args(["-NoProfile", "-NonInteractive", "-Command", cmd]);
    c
}

#[cfg(windows)]
fn build_shell_command_cmd(cmd: &str) -> tokio::process::Command {
    let mut c = tokio::process::Command::new("cmd.exe");
    c.args(["/d", "/s", "/c", cmd]);
    c
}

/// Executes `cmd` via the platform shell, enforcing `timeout_ms` and the
/// 1 MiB per-stream capture cap (§4.G.1 steps 3-5).
async fn execute_shell(cmd: &str, timeout_ms: u64, approval_mode: ApprovalMode) -> ToolResult {
    #[cfg(unix)]
    let (mut command, backend) = (build_shell_command(cmd), "sh");

    #[cfg(windows)]
    let (mut command, backend) = {
        let ps = build_shell_command_powershell(cmd);
        if which::which("powershell").is_ok() {
            (ps, "powershell")
        } else {
            (build_shell_command_cmd(cmd), "cmd")
        }
    };

    command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(Stdio::null());

    let mut child = match command.spawn() {
        Ok(c) => c,
        Err(e) => {
            let mut payload = serde_json::Map::new();
            payload.insert("cmd".to_string(), json!(cmd));
            return ToolResult {
                ok: false,
                code: Some("TOOL_EXECUTION_ERROR"),
                error: Some(e.to_string()),
                payload,
            };
        }
    };

    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();

    let run = async {
        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();
        if let Some(mut out) = stdout_pipe.take() {
            let _ = read_capped(&mut out, &mut stdout_buf).await;
        }
        if let Some(mut err) = stderr_pipe.take() {
            let _ = read_capped(&mut err, &mut stderr_buf).await;
        }
        let status = child.wait().await;
        (status, stdout_buf, stderr_buf)
    };

    let (status, stdout_buf, stderr_buf, timed_out) =
        match tokio::time::timeout(std::time::Duration::from_millis(timeout_ms), run).await {
            Ok((status, out, err)) => (status, out, err, false),
            Err(_) => {
                let _ = child.start_kill();
                (Err(std::io::Error::other("timed out")), Vec::new(), Vec::new(), true)
            }
        };

    let code = status.as_ref().ok().and_then(|s| s.code());
    let ok = !timed_out && status.as_ref().map(|s| s.success()).unwrap_or(false);

    let mut payload = serde_json::Map::new();
    payload.insert("executionMode".to_string(), json!("shell"));
    payload.insert("backend".to_string(), json!(backend));
    payload.insert(
        "stdout".to_string(),
        json!(String::from_utf8_lossy(&stdout_buf)),
    );
    payload.insert(
        "stderr".to_string(),
        json!(String::from_utf8_lossy(&stderr_buf)),
    );
    payload.insert("code".to_string(), json!(code));
    payload.insert("timedOut".to_string(), json!(timed_out));
    payload.insert("cmd".to_string(), json!(cmd));
    payload.insert("approvalMode".to_string(), json!(approval_mode.as_str()));

    if ok {
        ToolResult {
            ok: true,
            code: None,
            error: None,
            payload,
        }
    } else {
        ToolResult {
            ok: false,
            code: Some("TOOL_EXECUTION_ERROR"),
            error: Some(if timed_out {
                "command timed out".to_string()
            } else {
                format!("command exited with code {:?}", code)
            }),
            payload,
        }
    }
}

async fn read_capped<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> std::io::Result<()> {
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        if buf.len() < MAX_CAPTURED_BYTES {
            let remaining = MAX_CAPTURED_BYTES - buf.len();
            buf.extend_from_slice(&chunk[..n.min(remaining)]);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn executes_simple_command() {
        #[cfg(unix)]
        {
            let result = execute_shell("echo hello", 5000, ApprovalMode::Auto).await;
            assert!(result.ok);
            assert!(result.payload["stdout"].as_str().unwrap().contains("hello"));
        }
    }

    #[tokio::test]
    async fn reports_nonzero_exit_code() {
        #[cfg(unix)]
        {
            let result = execute_shell("exit 3", 5000, ApprovalMode::Auto).await;
            assert!(!result.ok);
            assert_eq!(result.payload["code"], json!(3));
        }
    }
}
