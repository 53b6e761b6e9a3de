//! `read_file` tool (§4.G): `{path, offset?=1, limit?=2000}`.
//!
//! Adapted from the teacher's `ReadFileTool`: 1-based numbered-line window
//! reading, reshaped onto the spec's `ToolResult` envelope and binary-type
//! rejection.

use super::path::resolve_path_under;
use super::{invalid_args, is_binary_like_extension, not_found, Tool, ToolResult, ToolSpec};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

const DEFAULT_LIMIT: usize = 2000;

pub struct ReadFileTool {
    working_folder: Arc<std::path::PathBuf>,
}

impl ReadFileTool {
    pub fn new(working_folder: Arc<std::path::PathBuf>) -> Self {
        Self { working_folder }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "read_file".to_string(),
            description: "Read a UTF-8 text file, returning 1-based numbered lines.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string"},
                    "offset": {"type": "integer", "minimum": 1, "default": 1},
                    "limit": {"type": "integer", "minimum": 1, "default": DEFAULT_LIMIT}
                },
                "required": ["path"]
            }),
        }
    }

    async fn call(&self, args: Value) -> ToolResult {
        let Some(path_param) = args.get("path").and_then(|v| v.as_str()) else {
            return invalid_args("path is required");
        };
        let offset = args
            .get("offset")
            .and_then(|v| v.as_u64())
            .unwrap_or(1)
            .max(1) as usize;
        let limit = args
            .get("limit")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_LIMIT as u64)
            .max(1) as usize;

        let resolved = match resolve_path_under(&self.working_folder, path_param) {
            Ok(p) => p,
            Err(e) => return e,
        };

        if !resolved.exists() {
            return not_found(format!("file not found: {}", resolved.display()));
        }
        if resolved.is_dir() {
            return invalid_args(format!("path is a directory: {}", resolved.display()));
        }
        if is_binary_like_extension(&resolved) {
            return ToolResult::err(
                "TOOL_UNSUPPORTED_FILE_TYPE",
                format!("binary-like file type: {}", resolved.display()),
            );
        }

        let content = match std::fs::read_to_string(&resolved) {
            Ok(c) => c,
            Err(e) => return ToolResult::err("TOOL_EXECUTION_ERROR", e.to_string()),
        };

        let lines: Vec<&str> = content.lines().collect();
        let total_lines = lines.len();
        let start = (offset - 1).min(total_lines);
        let end = (start + limit).min(total_lines);

        let mut text = String::new();
        for (i, line) in lines[start..end].iter().enumerate() {
            text.push_str(&format!("{:>6}\t{}\n", start + i + 1, line));
        }

        let mut payload = serde_json::Map::new();
        payload.insert("content".to_string(), Value::String(text));
        payload.insert("totalLines".to_string(), json!(total_lines));
        ToolResult::ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_window_with_line_numbers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "one\ntwo\nthree\n").unwrap();
        let tool = ReadFileTool::new(Arc::new(dir.path().to_path_buf()));
        let result = tool.call(json!({"path": "a.txt"})).await;
        assert!(result.ok);
        let content = result.payload["content"].as_str().unwrap();
        assert!(content.contains("1\tone"));
        assert_eq!(result.payload["totalLines"], json!(3));
    }

    #[tokio::test]
    async fn missing_file_yields_tool_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ReadFileTool::new(Arc::new(dir.path().to_path_buf()));
        let result = tool.call(json!({"path": "missing.txt"})).await;
        assert!(!result.ok);
        assert_eq!(result.code, Some("TOOL_NOT_FOUND"));
    }

    #[tokio::test]
    async fn binary_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), [0u8, 1, 2]).unwrap();
        let tool = ReadFileTool::new(Arc::new(dir.path().to_path_buf()));
        let result = tool.call(json!({"path": "a.png"})).await;
        assert_eq!(result.code, Some("TOOL_UNSUPPORTED_FILE_TYPE"));
    }
}
