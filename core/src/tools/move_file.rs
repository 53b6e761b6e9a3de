//! `move_file` tool (§4.G): `{path, to, overwrite?=false}`.

use super::path::resolve_path_under;
use super::{invalid_args, Tool, ToolResult, ToolSpec};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct MoveFileTool {
    working_folder: Arc<std::path::PathBuf>,
}

impl MoveFileTool {
    pub fn new(working_folder: Arc<std::path::PathBuf>) -> Self {
        Self { working_folder }
    }
}

#[async_trait]
impl Tool for MoveFileTool {
    fn name(&self) -> &'static str {
        "move_file"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "move_file".to_string(),
            description: "Move or rename a file or directory.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string"},
                    "to": {"type": "string"},
                    "overwrite": {"type": "boolean", "default": false}
                },
                "required": ["path", "to"]
            }),
        }
    }

    async fn call(&self, args: Value) -> ToolResult {
        let Some(path_param) = args.get("path").and_then(|v| v.as_str()) else {
            return invalid_args("path is required");
        };
        let Some(to_param) = args.get("to").and_then(|v| v.as_str()) else {
            return invalid_args("to is required");
        };
        let overwrite = args
            .get("overwrite")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let source = match resolve_path_under(&self.working_folder, path_param) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let dest = match resolve_path_under(&self.working_folder, to_param) {
            Ok(p) => p,
            Err(e) => return e,
        };

        if !source.exists() {
            return super::not_found(format!("source not found: {}", source.display()));
        }
        if dest.exists() && !overwrite {
            return ToolResult::err(
                "TOOL_CONFLICT",
                format!("destination already exists: {}", dest.display()),
            );
        }
        if let Some(parent) = dest.parent() {
            if !parent.exists() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    return ToolResult::err("TOOL_EXECUTION_ERROR", e.to_string());
                }
            }
        }
        if let Err(e) = std::fs::rename(&source, &dest) {
            return ToolResult::err("TOOL_EXECUTION_ERROR", e.to_string());
        }

        let mut payload = serde_json::Map::new();
        payload.insert("from".to_string(), json!(source.display().to_string()));
        payload.insert("to".to_string(), json!(dest.display().to_string()));
        ToolResult::ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn moves_file_creating_dest_parent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "x").unwrap();
        let tool = MoveFileTool::new(Arc::new(dir.path().to_path_buf()));
        let result = tool
            .call(json!({"path": "a.txt", "to": "nested/b.txt"}))
            .await;
        assert!(result.ok);
        assert!(dir.path().join("nested/b.txt").exists());
    }

    #[tokio::test]
    async fn existing_destination_without_overwrite_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "x").unwrap();
        std::fs::write(dir.path().join("b.txt"), "y").unwrap();
        let tool = MoveFileTool::new(Arc::new(dir.path().to_path_buf()));
        let result = tool.call(json!({"path": "a.txt", "to": "b.txt"})).await;
        assert_eq!(result.code, Some("TOOL_CONFLICT"));
    }
}
