//! `mkdir` tool (§4.G): `{path, recursive?=true}`.

use super::path::resolve_path_under;
use super::{invalid_args, Tool, ToolResult, ToolSpec};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct MkdirTool {
    working_folder: Arc<std::path::PathBuf>,
}

impl MkdirTool {
    pub fn new(working_folder: Arc<std::path::PathBuf>) -> Self {
        Self { working_folder }
    }
}

#[async_trait]
impl Tool for MkdirTool {
    fn name(&self) -> &'static str {
        "mkdir"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "mkdir".to_string(),
            description: "Create a directory, including parents by default.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string"},
                    "recursive": {"type": "boolean", "default": true}
                },
                "required": ["path"]
            }),
        }
    }

    async fn call(&self, args: Value) -> ToolResult {
        let Some(path_param) = args.get("path").and_then(|v| v.as_str()) else {
            return invalid_args("path is required");
        };
        let recursive = args
            .get("recursive")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);

        let resolved = match resolve_path_under(&self.working_folder, path_param) {
            Ok(p) => p,
            Err(e) => return e,
        };

        let result = if recursive {
            std::fs::create_dir_all(&resolved)
        } else {
            std::fs::create_dir(&resolved)
        };
        if let Err(e) = result {
            if e.kind() != std::io::ErrorKind::AlreadyExists {
                return ToolResult::err("TOOL_EXECUTION_ERROR", e.to_string());
            }
        }

        let mut payload = serde_json::Map::new();
        payload.insert("path".to_string(), json!(resolved.display().to_string()));
        ToolResult::ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_nested_directory() {
        let dir = tempfile::tempdir().unwrap();
        let tool = MkdirTool::new(Arc::new(dir.path().to_path_buf()));
        let result = tool.call(json!({"path": "a/b/c"})).await;
        assert!(result.ok);
        assert!(dir.path().join("a/b/c").is_dir());
    }
}
