//! `write_file` tool (§4.G): `{path, content, createDirs?=true}`, atomic
//! write via temp file + rename, adapted from the teacher's `WriteFileTool`.

use super::path::resolve_path_under;
use super::{invalid_args, not_found, Tool, ToolResult, ToolSpec};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct WriteFileTool {
    working_folder: Arc<std::path::PathBuf>,
}

impl WriteFileTool {
    pub fn new(working_folder: Arc<std::path::PathBuf>) -> Self {
        Self { working_folder }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &'static str {
        "write_file"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "write_file".to_string(),
            description: "Write content to a file, creating parent directories by default."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string"},
                    "content": {"type": "string"},
                    "createDirs": {"type": "boolean", "default": true}
                },
                "required": ["path", "content"]
            }),
        }
    }

    async fn call(&self, args: Value) -> ToolResult {
        let Some(path_param) = args.get("path").and_then(|v| v.as_str()) else {
            return invalid_args("path is required");
        };
        let Some(content) = args.get("content").and_then(|v| v.as_str()) else {
            return invalid_args("content is required");
        };
        let create_dirs = args
            .get("createDirs")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);

        let resolved = match resolve_path_under(&self.working_folder, path_param) {
            Ok(p) => p,
            Err(e) => return e,
        };

        if let Some(parent) = resolved.parent() {
            if !parent.exists() {
                if !create_dirs {
                    return not_found(format!(
                        "parent directory does not exist: {}",
                        parent.display()
                    ));
                }
                if let Err(e) = std::fs::create_dir_all(parent) {
                    return ToolResult::err("TOOL_EXECUTION_ERROR", e.to_string());
                }
            }
        }

        let tmp_path = resolved.with_extension(format!(
            "{}.tmp{}",
            resolved
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("out"),
            std::process::id()
        ));
        if let Err(e) = std::fs::write(&tmp_path, content) {
            return ToolResult::err("TOOL_EXECUTION_ERROR", e.to_string());
        }
        if let Err(e) = std::fs::rename(&tmp_path, &resolved) {
            let _ = std::fs::remove_file(&tmp_path);
            return ToolResult::err("TOOL_EXECUTION_ERROR", e.to_string());
        }

        let mut payload = serde_json::Map::new();
        payload.insert("path".to_string(), json!(resolved.display().to_string()));
        payload.insert("bytesWritten".to_string(), json!(content.len()));
        ToolResult::ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_file_and_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let tool = WriteFileTool::new(Arc::new(dir.path().to_path_buf()));
        let result = tool
            .call(json!({"path": "nested/out.txt", "content": "hello"}))
            .await;
        assert!(result.ok);
        let written = std::fs::read_to_string(dir.path().join("nested/out.txt")).unwrap();
        assert_eq!(written, "hello");
    }

    #[tokio::test]
    async fn missing_parent_without_create_dirs_fails() {
        let dir = tempfile::tempdir().unwrap();
        let tool = WriteFileTool::new(Arc::new(dir.path().to_path_buf()));
        let result = tool
            .call(json!({"path": "nested/out.txt", "content": "x", "createDirs": false}))
            .await;
        assert_eq!(result.code, Some("TOOL_NOT_FOUND"));
    }
}
