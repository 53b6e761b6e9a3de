//! `search_content` tool (§4.G): `{pattern, path?='.', include?='*',
//! caseSensitive?=false, includeHidden?=false, maxResults?=2000}`.
//! Grounded on the teacher's ripgrep-library stack (`grep-regex` +
//! `grep-searcher`), already part of the carried-over dependency set.

use super::list_files::wildcard_to_regex;
use super::path::resolve_path_under;
use super::{invalid_args, is_binary_like_extension, Tool, ToolResult, ToolSpec};
use async_trait::async_trait;
use grep_regex::RegexMatcher;
use grep_searcher::sinks::UTF8;
use grep_searcher::Searcher;
use serde_json::{json, Value};
use std::sync::Arc;
use walkdir::WalkDir;

const DEFAULT_MAX_RESULTS: usize = 2000;
const MAX_PREVIEW_LEN: usize = 400;

pub struct SearchContentTool {
    working_folder: Arc<std::path::PathBuf>,
}

impl SearchContentTool {
    pub fn new(working_folder: Arc<std::path::PathBuf>) -> Self {
        Self { working_folder }
    }
}

#[async_trait]
impl Tool for SearchContentTool {
    fn name(&self) -> &'static str {
        "search_content"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "search_content".to_string(),
            description: "Search file contents under a directory for a regex pattern.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "pattern": {"type": "string"},
                    "path": {"type": "string", "default": "."},
                    "include": {"type": "string", "default": "*"},
                    "caseSensitive": {"type": "boolean", "default": false},
                    "includeHidden": {"type": "boolean", "default": false},
                    "maxResults": {"type": "integer", "minimum": 1, "default": DEFAULT_MAX_RESULTS}
                },
                "required": ["pattern"]
            }),
        }
    }

    async fn call(&self, args: Value) -> ToolResult {
        let Some(pattern) = args.get("pattern").and_then(|v| v.as_str()) else {
            return invalid_args("pattern is required");
        };
        let path_param = args.get("path").and_then(|v| v.as_str()).unwrap_or(".");
        let include = args.get("include").and_then(|v| v.as_str()).unwrap_or("*");
        let case_sensitive = args
            .get("caseSensitive")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
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

        let include_re = match wildcard_to_regex(include) {
            Ok(re) => re,
            Err(e) => return invalid_args(format!("invalid include pattern: {e}")),
        };

        let matcher = match RegexMatcher::new_line_matcher(&if case_sensitive {
            pattern.to_string()
        } else {
            format!("(?i){pattern}")
        }) {
            Ok(m) => m,
            Err(e) => {
                return ToolResult::err("TOOL_INVALID_PATTERN", format!("invalid pattern: {e}"))
            }
        };

        let mut matches = Vec::new();
        'files: for entry in WalkDir::new(&root).follow_links(false).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = match entry.path().strip_prefix(self.working_folder.as_path()) {
                Ok(r) => r,
                Err(_) => continue,
            };
            if !include_hidden
                && rel.components().any(|c| {
                    c.as_os_str()
                        .to_str()
                        .map(|s| s.starts_with('.') && s != "." && s != "..")
                        .unwrap_or(false)
                })
            {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if !include_re.is_match(&name) {
                continue;
            }
            if is_binary_like_extension(entry.path()) {
                continue;
            }

            let rel_str = rel.to_string_lossy().replace('\\', "/");
            let mut searcher = Searcher::new();
            let result = searcher.search_path(
                &matcher,
                entry.path(),
                UTF8(|line_number, line| {
                    let mut preview = line.trim_end().to_string();
                    if preview.len() > MAX_PREVIEW_LEN {
                        preview.truncate(MAX_PREVIEW_LEN);
                    }
                    matches.push(json!({
                        "path": rel_str,
                        "line": line_number,
                        "preview": preview,
                    }));
                    Ok(matches.len() < max_results)
                }),
            );
            if result.is_err() {
                continue;
            }
            if matches.len() >= max_results {
                break 'files;
            }
        }

        let mut payload = serde_json::Map::new();
        payload.insert("matches".to_string(), Value::Array(matches));
        ToolResult::ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn finds_matching_lines() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello\nworld\nHELLO again\n").unwrap();
        let tool = SearchContentTool::new(Arc::new(dir.path().to_path_buf()));
        let result = tool.call(json!({"pattern": "hello"})).await;
        assert!(result.ok);
        let matches = result.payload["matches"].as_array().unwrap();
        assert_eq!(matches.len(), 2);
    }

    #[tokio::test]
    async fn invalid_pattern_yields_tool_invalid_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let tool = SearchContentTool::new(Arc::new(dir.path().to_path_buf()));
        let result = tool.call(json!({"pattern": "("})).await;
        assert_eq!(result.code, Some("TOOL_INVALID_PATTERN"));
    }
}
