//! `apply_patch` tool (§4.G): `{operations: [{op, path, to?, content?,
//! recursive?, overwrite?}, ...]}`. Two-phase: precheck every op, then
//! execute in order; first failure stops execution (§9 Open Question (b),
//! resolved by leaving earlier effects in place, matching the spec's stated
//! default behavior).

use super::path::resolve_path_under;
use super::{invalid_args, Tool, ToolResult, ToolSpec};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;

pub struct ApplyPatchTool {
    working_folder: Arc<std::path::PathBuf>,
}

impl ApplyPatchTool {
    pub fn new(working_folder: Arc<std::path::PathBuf>) -> Self {
        Self { working_folder }
    }
}

struct Op {
    kind: String,
    path: PathBuf,
    to: Option<PathBuf>,
    content: Option<String>,
    recursive: bool,
    overwrite: bool,
    raw_path: String,
}

impl ApplyPatchTool {
    fn parse_ops(&self, raw_ops: &[Value]) -> Result<Vec<Op>, ToolResult> {
        let mut ops = Vec::new();
        for raw in raw_ops {
            let kind = raw
                .get("op")
                .and_then(|v| v.as_str())
                .ok_or_else(|| invalid_args("operation missing 'op'"))?
                .to_string();
            let raw_path = raw
                .get("path")
                .and_then(|v| v.as_str())
                .ok_or_else(|| invalid_args("operation missing 'path'"))?
                .to_string();
            let path = resolve_path_under(&self.working_folder, &raw_path)?;
            let to = match raw.get("to").and_then(|v| v.as_str()) {
                Some(s) => Some(resolve_path_under(&self.working_folder, s)?),
                None => None,
            };
            let content = raw.get("content").and_then(|v| v.as_str()).map(String::from);
            let recursive = raw.get("recursive").and_then(|v| v.as_bool()).unwrap_or(false);
            let overwrite = raw.get("overwrite").and_then(|v| v.as_bool()).unwrap_or(false);

            match kind.as_str() {
                "add" | "write" if content.is_none() => {
                    return Err(invalid_args(format!("op '{kind}' requires content")));
                }
                "move" | "rename" if to.is_none() => {
                    return Err(invalid_args(format!("op '{kind}' requires 'to'")));
                }
                "add" | "update" | "write" | "delete" | "move" | "rename" | "mkdir" => {}
                other => return Err(invalid_args(format!("unknown op: {other}"))),
            }

            ops.push(Op {
                kind,
                path,
                to,
                content,
                recursive,
                overwrite,
                raw_path,
            });
        }
        Ok(ops)
    }

    /// Precheck phase: `add` must not exist, `update` must exist.
    fn precheck(&self, ops: &[Op]) -> Result<(), ToolResult> {
        for op in ops {
            match op.kind.as_str() {
                "add" if op.path.exists() => {
                    return Err(ToolResult::err(
                        "TOOL_CONFLICT",
                        format!("add target already exists: {}", op.raw_path),
                    ));
                }
                "update" if !op.path.exists() => {
                    return Err(super::not_found(format!(
                        "update target does not exist: {}",
                        op.raw_path
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn execute_one(&self, op: &Op) -> Result<Value, ToolResult> {
        match op.kind.as_str() {
            "add" | "write" => {
                if let Some(parent) = op.path.parent() {
                    if !parent.exists() {
                        std::fs::create_dir_all(parent)
                            .map_err(|e| ToolResult::err("TOOL_EXECUTION_ERROR", e.to_string()))?;
                    }
                }
                std::fs::write(&op.path, op.content.as_deref().unwrap_or(""))
                    .map_err(|e| ToolResult::err("TOOL_EXECUTION_ERROR", e.to_string()))?;
            }
            "update" => {
                std::fs::write(&op.path, op.content.as_deref().unwrap_or(""))
                    .map_err(|e| ToolResult::err("TOOL_EXECUTION_ERROR", e.to_string()))?;
            }
            "delete" => {
                if op.path.is_dir() {
                    if !op.recursive {
                        return Err(invalid_args(format!(
                            "delete of directory {} requires recursive:true",
                            op.raw_path
                        )));
                    }
                    std::fs::remove_dir_all(&op.path)
                        .map_err(|e| ToolResult::err("TOOL_EXECUTION_ERROR", e.to_string()))?;
                } else {
                    std::fs::remove_file(&op.path)
                        .map_err(|e| ToolResult::err("TOOL_EXECUTION_ERROR", e.to_string()))?;
                }
            }
            "move" | "rename" => {
                let to = op.to.as_ref().unwrap();
                if to.exists() && !op.overwrite {
                    return Err(ToolResult::err(
                        "TOOL_CONFLICT",
                        "move destination already exists".to_string(),
                    ));
                }
                if let Some(parent) = to.parent() {
                    if !parent.exists() {
                        std::fs::create_dir_all(parent)
                            .map_err(|e| ToolResult::err("TOOL_EXECUTION_ERROR", e.to_string()))?;
                    }
                }
                std::fs::rename(&op.path, to)
                    .map_err(|e| ToolResult::err("TOOL_EXECUTION_ERROR", e.to_string()))?;
            }
            "mkdir" => {
                std::fs::create_dir_all(&op.path)
                    .map_err(|e| ToolResult::err("TOOL_EXECUTION_ERROR", e.to_string()))?;
            }
            _ => unreachable!("validated in parse_ops"),
        }
        Ok(json!({"op": op.kind, "path": op.raw_path, "ok": true}))
    }
}

#[async_trait]
impl Tool for ApplyPatchTool {
    fn name(&self) -> &'static str {
        "apply_patch"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "apply_patch".to_string(),
            description:
                "Apply a batch of file operations (add/update/write/delete/move/rename/mkdir)."
                    .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "operations": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "op": {"type": "string", "enum": ["add", "update", "write", "delete", "move", "rename", "mkdir"]},
                                "path": {"type": "string"},
                                "to": {"type": "string"},
                                "content": {"type": "string"},
                                "recursive": {"type": "boolean"},
                                "overwrite": {"type": "boolean"}
                            },
                            "required": ["op", "path"]
                        }
                    }
                },
                "required": ["operations"]
            }),
        }
    }

    async fn call(&self, args: Value) -> ToolResult {
        let Some(raw_ops) = args.get("operations").and_then(|v| v.as_array()) else {
            return invalid_args("operations is required");
        };

        let ops = match self.parse_ops(raw_ops) {
            Ok(ops) => ops,
            Err(e) => return e,
        };
        if let Err(e) = self.precheck(&ops) {
            return e;
        }

        let mut results = Vec::new();
        for op in &ops {
            match self.execute_one(op) {
                Ok(record) => results.push(record),
                Err(failure) => {
                    results.push(json!({
                        "op": op.kind,
                        "path": op.raw_path,
                        "ok": false,
                        "error": failure.error,
                        "code": failure.code,
                    }));
                    let mut payload = serde_json::Map::new();
                    payload.insert("results".to_string(), Value::Array(results));
                    return ToolResult {
                        ok: false,
                        code: failure.code,
                        error: failure.error,
                        payload,
                    };
                }
            }
        }

        let mut payload = serde_json::Map::new();
        payload.insert("results".to_string(), Value::Array(results));
        ToolResult::ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn applies_add_and_update_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ApplyPatchTool::new(Arc::new(dir.path().to_path_buf()));
        let result = tool
            .call(json!({"operations": [
                {"op": "add", "path": "a.txt", "content": "one"},
                {"op": "update", "path": "a.txt", "content": "two"}
            ]}))
            .await;
        assert!(result.ok);
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "two");
    }

    #[tokio::test]
    async fn add_on_existing_file_fails_precheck() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "x").unwrap();
        let tool = ApplyPatchTool::new(Arc::new(dir.path().to_path_buf()));
        let result = tool
            .call(json!({"operations": [{"op": "add", "path": "a.txt", "content": "y"}]}))
            .await;
        assert_eq!(result.code, Some("TOOL_CONFLICT"));
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "x");
    }

    #[tokio::test]
    async fn stops_on_first_failure_leaving_earlier_effects() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ApplyPatchTool::new(Arc::new(dir.path().to_path_buf()));
        let result = tool
            .call(json!({"operations": [
                {"op": "add", "path": "a.txt", "content": "one"},
                {"op": "delete", "path": "missing-dir", "recursive": false}
            ]}))
            .await;
        assert!(!result.ok);
        assert!(dir.path().join("a.txt").exists());
    }
}
