//! `list_files` tool (§4.G): `{path?='.', include?='*', includeHidden?=false,
//! maxResults?=2000}`. Recursive traversal grounded on the teacher's
//! `GlobTool` (`WalkDir` over the working folder), generalized to a
//! wildcard-to-regex `include` filter instead of a `glob::Pattern`.

use super::path::resolve_path_under;
use super::{invalid_args, Tool, ToolResult, ToolSpec};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::Arc;
use walkdir::WalkDir;

const DEFAULT_MAX_RESULTS: usize = 2000;

pub struct ListFilesTool {
    working_folder: Arc<std::path::PathBuf>,
}

impl ListFilesTool {
    pub fn new(working_folder: Arc<std::path::PathBuf>) -> Self {
        Self { working_folder }
    }
}

/// Translates a `*`/`?` wildcard into an anchored, case-sensitive regex.
pub fn wildcard_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut out = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            c if "\\.+^$()[]{}|".contains(c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push('$');
    Regex::new(&out)
}

fn is_hidden(rel: &std::path::Path) -> bool {
    rel.components().any(|c| {
        c.as_os_str()
            .to_str()
            .map(|s| s.starts_with('.') && s != "." && s != "..")
            .unwrap_or(false)
    })
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &'static str {
        "list_files"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "list_files".to_string(),
            description: "Recursively list files under a directory, optionally filtered by a wildcard.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "default": "."},
                    "include": {"type": "string", "default": "*"},
                    "includeHidden": {"type": "boolean", "default": false},
                    "maxResults": {"type": "integer", "minimum": 1, "default": DEFAULT_MAX_RESULTS}
                }
            }),
        }
    }

    async fn call(&self, args: Value) -> ToolResult {
        let path_param = args.get("path").and_then(|v| v.as_str()).unwrap_or(".");
        let include = args.get("include").and_then(|v| v.as_str()).unwrap_or("*");
        let include_hidden = args
            .get("includeHidden")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let max_results = args
            .get("maxResults")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_MAX_RESULTS as u64) as usize;

        let root = match resolve_path_under(&self.working_folder, path_param) {
            Ok(p) => p,
            Err(e) => return e,
        };
        if !root.is_dir() {
            return super::not_found(format!("not a directory: {}", root.display()));
        }

        let re = match wildcard_to_regex(include) {
            Ok(re) => re,
            Err(e) => return invalid_args(format!("invalid include pattern: {e}")),
        };

        let mut results = Vec::new();
        for entry in WalkDir::new(&root).follow_links(false).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = match entry.path().strip_prefix(self.working_folder.as_path()) {
                Ok(r) => r,
                Err(_) => continue,
            };
            if !include_hidden && is_hidden(rel) {
                continue;
            }
            let rel_str = rel.to_string_lossy().replace('\\', "/");
            let name = entry.file_name().to_string_lossy();
            if !re.is_match(&name) && !re.is_match(&rel_str) {
                continue;
            }
            results.push(rel_str);
            if results.len() >= max_results {
                break;
            }
        }
        results.sort();

        let mut payload = serde_json::Map::new();
        payload.insert("files".to_string(), json!(results));
        ToolResult::ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_files_recursively() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("a.rs"), "").unwrap();
        std::fs::write(dir.path().join("sub/b.rs"), "").unwrap();
        std::fs::write(dir.path().join("c.txt"), "").unwrap();
        let tool = ListFilesTool::new(Arc::new(dir.path().to_path_buf()));
        let result = tool.call(json!({"include": "*.rs"})).await;
        let files: Vec<String> = result.payload["files"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect();
        assert_eq!(files, vec!["a.rs", "sub/b.rs"]);
    }

    #[tokio::test]
    async fn hidden_entries_skipped_by_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git/HEAD"), "").unwrap();
        std::fs::write(dir.path().join("a.txt"), "").unwrap();
        let tool = ListFilesTool::new(Arc::new(dir.path().to_path_buf()));
        let result = tool.call(json!({})).await;
        let files = result.payload["files"].as_array().unwrap();
        assert_eq!(files.len(), 1);
    }
}
