//! # agent-core
//!
//! The orchestration engine behind a terminal-based, multi-provider AI
//! agent runtime: it turns a user prompt into a bounded, policy-governed
//! conversation with an OpenAI-compatible LLM endpoint, executing
//! file-system and shell tools under a security policy engine with
//! human-in-the-loop approval, and shapes the outcome into a stable,
//! machine-readable result.
//!
//! ## Main modules
//!
//! - [`options`]: CLI/env/config-file precedence resolution.
//! - [`config`]: runtime config + credential store loading, atomic saving.
//! - [`policy`]: the `denyCritical → deny → allow` command-security engine.
//! - [`credentials`]: base-URL/API-key resolution and the hosted-editor
//!   runtime-token refresh state machine.
//! - [`net`]: local/private host classification for `http://` base URLs.
//! - [`transport`]: timeout + retry/backoff HTTP plumbing and SSE streaming.
//! - [`llm`]: the OpenAI-compatible chat-completion client built on
//!   [`transport`].
//! - [`capability`]: streaming/vision/tool-calling viability heuristics and
//!   provider error classifiers.
//! - [`tools`]: the nine file/shell tool executors and their dispatch table.
//! - [`approval`]: the interactive y/N approval prompter.
//! - [`attachments`]: `--file`/`--image` resolution and validation.
//! - [`turn`]: the bounded tool-calling conversation loop.
//! - [`usage`]: append-only NDJSON usage-stats writer and compaction.
//! - [`result`]: JSON/plain-text output shaping.
//! - [`error`]: the stable error taxonomy and redaction helper.

pub mod approval;
pub mod attachments;
pub mod capability;
pub mod config;
pub mod credentials;
pub mod error;
pub mod llm;
pub mod net;
pub mod options;
pub mod policy;
pub mod result;
pub mod tools;
pub mod transport;
pub mod turn;
pub mod usage;

pub use error::AgentError;
