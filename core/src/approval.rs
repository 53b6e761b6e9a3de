//! Approval Prompter (§4.H): interactive y/N confirmation for `run_command`,
//! gated on TTY availability and incompatible with `--json`.

use crate::error::AgentError;
use async_trait::async_trait;
use std::io::{IsTerminal, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalMode {
    Ask,
    Auto,
    Never,
}

impl ApprovalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalMode::Ask => "ask",
            ApprovalMode::Auto => "auto",
            ApprovalMode::Never => "never",
        }
    }
}

impl std::str::FromStr for ApprovalMode {
    type Err = AgentError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ask" => Ok(ApprovalMode::Ask),
            "auto" => Ok(ApprovalMode::Auto),
            "never" => Ok(ApprovalMode::Never),
            other => Err(AgentError::InvalidOption(format!(
                "invalid approval mode: {other}"
            ))),
        }
    }
}

/// Abstracts the interactive prompt so the turn loop and shell runner are
/// testable without a real terminal.
#[async_trait]
pub trait ApprovalPrompter: Send + Sync {
    /// Returns `Ok(true)` if the user approved, `Ok(false)` if denied
    /// (including on timeout), or `Err` for preconditions that make the
    /// prompt itself impossible (§7: `INTERACTIVE_APPROVAL_TTY`,
    /// `INTERACTIVE_APPROVAL_JSON`).
    async fn prompt(&self, command: &str, profile: &str) -> Result<bool, AgentError>;
}

/// Real TTY-gated prompter. Prints a three-line banner to stderr, then
/// reads a line from stdin with an optional timeout.
pub struct TtyPrompter {
    pub json_mode: bool,
    pub timeout_ms: Option<u64>,
}

#[async_trait]
impl ApprovalPrompter for TtyPrompter {
    async fn prompt(&self, command: &str, profile: &str) -> Result<bool, AgentError> {
        if self.json_mode {
            return Err(AgentError::InteractiveApprovalJson);
        }
        let stdin_is_tty = std::io::stdin().is_terminal();
        let stderr_is_tty = std::io::stderr().is_terminal();
        if !stdin_is_tty || !stderr_is_tty {
            return Err(AgentError::InteractiveApprovalTty);
        }

        eprintln!("Tool: run_command");
        eprintln!("Profile: {profile}");
        eprintln!("Command: {command}");
        eprint!("Approve? [y/N]: ");
        let _ = std::io::stderr().flush();

        let (tx, rx) = tokio::sync::oneshot::channel();
        std::thread::spawn(move || {
            let mut line = String::new();
            let _ = std::io::stdin().read_line(&mut line);
            let _ = tx.send(line);
        });

        let line = match self.timeout_ms {
            Some(ms) => {
                match tokio::time::timeout(std::time::Duration::from_millis(ms), rx).await {
                    Ok(Ok(line)) => line,
                    _ => return Ok(false),
                }
            }
            None => rx.await.unwrap_or_default(),
        };

        let answer = line.trim().to_lowercase();
        Ok(answer == "y" || answer == "yes")
    }
}

/// Non-interactive prompter used when approval mode is `auto`/`never` and
/// for tests; always denies (callers should never invoke it in `ask` mode).
pub struct AlwaysDenyPrompter;

#[async_trait]
impl ApprovalPrompter for AlwaysDenyPrompter {
    async fn prompt(&self, _command: &str, _profile: &str) -> Result<bool, AgentError> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_modes() {
        assert_eq!("ask".parse::<ApprovalMode>().unwrap(), ApprovalMode::Ask);
        assert_eq!("auto".parse::<ApprovalMode>().unwrap(), ApprovalMode::Auto);
        assert_eq!("never".parse::<ApprovalMode>().unwrap(), ApprovalMode::Never);
        assert!("bogus".parse::<ApprovalMode>().is_err());
    }
}
