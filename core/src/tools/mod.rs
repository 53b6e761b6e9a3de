//! Tool Executors (§4.G): the nine tools advertised to the model, plus the
//! name→executor dispatch table (§9 design note: "implement with a closed
//! tagged variant over tool name; the dispatcher is a static map").

mod apply_patch;
mod delete_file;
mod list_files;
mod mkdir;
mod move_file;
mod path;
mod read_file;
mod search_content;
pub mod shell;
mod write_file;

pub use apply_patch::ApplyPatchTool;
pub use delete_file::DeleteFileTool;
pub use list_files::ListFilesTool;
pub use mkdir::MkdirTool;
pub use move_file::MoveFileTool;
pub use read_file::ReadFileTool;
pub use search_content::SearchContentTool;
pub use shell::RunCommandTool;
pub use write_file::WriteFileTool;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Binary-like file extensions (§9 Open Question (a), resolved by adopting
/// the list given inline in the spec verbatim).
pub const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "webp", "gif", "bmp", "ico", "pdf", "zip", "gz", "tar", "7z", "mp3",
    "wav", "mp4", "mov", "avi", "woff", "woff2", "ttf", "otf", "exe", "dll", "so", "class", "jar",
    "bin",
];

pub fn is_binary_like_extension(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| BINARY_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// The JSON-schema specification for a tool, advertised to the model.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Uniform result envelope emitted by every executor (§3 `ToolResult`):
/// `{ok, code?, error?, ...payload}`. Success omits `code`/`error`.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub ok: bool,
    pub code: Option<&'static str>,
    pub error: Option<String>,
    pub payload: Map<String, Value>,
}

impl ToolResult {
    pub fn ok(payload: Map<String, Value>) -> Self {
        Self {
            ok: true,
            code: None,
            error: None,
            payload,
        }
    }

    pub fn err(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            code: Some(code),
            error: Some(message.into()),
            payload: Map::new(),
        }
    }

    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("ok".to_string(), Value::Bool(self.ok));
        if let Some(code) = self.code {
            out.insert("code".to_string(), Value::String(code.to_string()));
        }
        if let Some(ref err) = self.error {
            out.insert("error".to_string(), Value::String(err.clone()));
        }
        for (k, v) in &self.payload {
            out.insert(k.clone(), v.clone());
        }
        Value::Object(out)
    }
}

pub fn invalid_args(message: impl Into<String>) -> ToolResult {
    ToolResult::err("TOOL_INVALID_ARGS", message)
}

pub fn not_found(message: impl Into<String>) -> ToolResult {
    ToolResult::err("TOOL_NOT_FOUND", message)
}

/// A tool is `(name, argsObject) -> ToolResult` (§4.G); errors never
/// propagate as `Result` past this boundary — every executor catches its
/// own failures and encodes them in the envelope.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn spec(&self) -> ToolSpec;
    async fn call(&self, args: Value) -> ToolResult;
}

/// Static name→executor dispatch map (§9 design note), built once per
/// invocation from the resolved working folder and command-execution
/// dependencies.
pub struct ToolRegistry {
    tools: HashMap<&'static str, Arc<dyn Tool>>,
    order: Vec<&'static str>,
}

impl ToolRegistry {
    pub fn new(working_folder: Arc<std::path::PathBuf>, shell: shell::ShellRunner) -> Self {
        let list: Vec<Arc<dyn Tool>> = vec![
            Arc::new(ReadFileTool::new(working_folder.clone())),
            Arc::new(ListFilesTool::new(working_folder.clone())),
            Arc::new(SearchContentTool::new(working_folder.clone())),
            Arc::new(WriteFileTool::new(working_folder.clone())),
            Arc::new(DeleteFileTool::new(working_folder.clone())),
            Arc::new(MoveFileTool::new(working_folder.clone())),
            Arc::new(MkdirTool::new(working_folder.clone())),
            Arc::new(ApplyPatchTool::new(working_folder.clone())),
            Arc::new(RunCommandTool::new(shell)),
        ];
        let mut tools = HashMap::new();
        let mut order = Vec::new();
        for tool in list {
            let name = tool.name();
            order.push(name);
            tools.insert(name, tool);
        }
        Self { tools, order }
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.order
            .iter()
            .map(|name| self.tools[name].spec())
            .collect()
    }

    /// Dispatches by name; unknown names yield `TOOL_UNKNOWN` (§4.I step 6).
    pub async fn call(&self, name: &str, args: Value) -> ToolResult {
        match self.tools.get(name) {
            Some(tool) => tool.call(args).await,
            None => ToolResult::err("TOOL_UNKNOWN", format!("unknown tool: {name}")),
        }
    }
}

/// Builds the OpenAI-compatible `tools` array for a chat-completion request
/// from the specs in the registry (§6).
pub fn tool_schema_json(specs: &[ToolSpec]) -> Value {
    Value::Array(
        specs
            .iter()
            .map(|spec| {
                json!({
                    "type": "function",
                    "function": {
                        "name": spec.name,
                        "description": spec.description,
                        "parameters": spec.input_schema,
                    }
                })
            })
            .collect(),
    )
}
