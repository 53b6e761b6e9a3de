//! `delete_file` tool (§4.G): `{path, recursive?=false}`.

use super::path::resolve_path_under;
use super::{invalid_args, not_found, Tool, ToolResult, ToolSpec};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct DeleteFileTool {
    working_folder: Arc<std::path::PathBuf>,
}

impl DeleteFileTool {
    pub fn new(working_folder: Arc<std::path::PathBuf>) -> Self {
        Self { working_folder }
    }
}

#[async_trait]
impl Tool for DeleteFileTool {
    fn name(&self) -> &'static str {
        "delete_file"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "delete_file".to_string(),
            description: "Delete a file, or a directory when recursive is true.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string"},
                    "recursive": {"type": "boolean", "default": false}
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
            .unwrap_or(false);

        let resolved = match resolve_path_under(&self.working_folder, path_param) {
            Ok(p) => p,
            Err(e) => return e,
        };
        if !resolved.exists() {
            return not_found(format!("path not found: {}", resolved.display()));
        }
        if resolved.is_dir() {
            if !recursive {
                return invalid_args(
                    "path is a directory; pass recursive:true to delete directories",
                );
            }
            if let Err(e) = std::fs::remove_dir_all(&resolved) {
                return ToolResult::err("TOOL_EXECUTION_ERROR", e.to_string());
            }
        } else if let Err(e) = std::fs::remove_file(&resolved) {
            return ToolResult::err("TOOL_EXECUTION_ERROR", e.to_string());
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
    async fn deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "x").unwrap();
        let tool = DeleteFileTool::new(Arc::new(dir.path().to_path_buf()));
        let result = tool.call(json!({"path": "a.txt"})).await;
        assert!(result.ok);
        assert!(!dir.path().join("a.txt").exists());
    }

    #[tokio::test]
    async fn directory_without_recursive_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let tool = DeleteFileTool::new(Arc::new(dir.path().to_path_buf()));
        let result = tool.call(json!({"path": "sub"})).await;
        assert_eq!(result.code, Some("TOOL_INVALID_ARGS"));
    }
}
