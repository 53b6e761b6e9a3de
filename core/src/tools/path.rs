//! Path resolution helper shared by all file tools.
//!
//! All file paths are resolved to absolute form against cwd (§4.G); this
//! helper additionally pins resolution under a working folder the way the
//! teacher's file tools do (`resolve_path_under`), returning `TOOL_NOT_FOUND`
//! when no readable target can be determined.

use super::ToolResult;
use std::path::{Path, PathBuf};

/// Resolves `raw` (a path param from tool arguments) against `working_folder`.
/// Rejects absolute paths and `..` components that would escape the working
/// folder; does not require the target to exist (callers that need
/// existence check it themselves and return the appropriate code).
pub fn resolve_path_under(
    working_folder: &Path,
    raw: &str,
) -> Result<PathBuf, ToolResult> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(super::invalid_args("path must not be empty"));
    }
    let candidate = Path::new(raw);
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        working_folder.join(candidate)
    };

    let normalized = normalize(&joined);
    let base_normalized = normalize(working_folder);
    if !normalized.starts_with(&base_normalized) {
        return Err(super::invalid_args(format!(
            "path escapes working folder: {raw}"
        )));
    }
    Ok(normalized)
}

/// Lexically normalizes `.`/`..` components without touching the
/// filesystem (so it also works for paths that do not exist yet, e.g. a
/// `write_file` target).
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        use std::path::Component::*;
        match component {
            CurDir => {}
            ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_relative_path_under_working_folder() {
        let base = PathBuf::from("/work");
        let resolved = resolve_path_under(&base, "src/main.rs").unwrap();
        assert_eq!(resolved, PathBuf::from("/work/src/main.rs"));
    }

    #[test]
    fn rejects_escape_via_dotdot() {
        let base = PathBuf::from("/work");
        let err = resolve_path_under(&base, "../etc/passwd").unwrap_err();
        assert!(!err.ok);
    }

    #[test]
    fn rejects_empty_path() {
        let base = PathBuf::from("/work");
        let err = resolve_path_under(&base, "   ").unwrap_err();
        assert_eq!(err.code, Some("TOOL_INVALID_ARGS"));
    }
}
