//! Runtime configuration and credential store (§3, §4.B, §6).
//!
//! Two JSON documents own all persisted state: `RuntimeConfig` (defaults +
//! security policy, never written back by the core) and `CredentialStore`
//! (provider credentials, mutated in place by the Credential Manager and
//! always persisted through [`save_credentials`]).

mod credentials_store;
mod runtime;

pub use credentials_store::{CredentialStore, ProviderEntry};
pub use runtime::{AttachmentLimits, Policy, ProfileRules, Rule, RuntimeConfig, UsageStatsConfig};

use crate::error::AgentError;
use std::path::Path;

/// Loads the runtime/policy document. A missing file yields built-in
/// defaults; invalid JSON or an unreadable-but-present path fails with the
/// codes from §4.B.
pub fn load_runtime_config(path: &Path) -> Result<RuntimeConfig, AgentError> {
    match std::fs::read_to_string(path) {
        Ok(text) => serde_json::from_str::<runtime::PartialRuntimeConfig>(&text)
            .map(|partial| partial.merge_onto(RuntimeConfig::default()))
            .map_err(|e| AgentError::AgentConfigInvalid(e.to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if parent_is_missing(path) {
                return Err(AgentError::AgentConfigError(format!(
                    "parent directory does not exist: {}",
                    path.display()
                )));
            }
            Ok(RuntimeConfig::default())
        }
        Err(e) => Err(AgentError::AgentConfigError(e.to_string())),
    }
}

/// Loads the credentials document. A missing file yields `None` (no store
/// configured yet); invalid JSON or an unreadable path fails with
/// `AUTH_CONFIG_*` codes.
pub fn load_credentials(path: &Path) -> Result<Option<CredentialStore>, AgentError> {
    match std::fs::read_to_string(path) {
        Ok(text) => serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| AgentError::AuthConfigInvalid(e.to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if parent_is_missing(path) {
                return Err(AgentError::AuthConfigError(format!(
                    "parent directory does not exist: {}",
                    path.display()
                )));
            }
            Ok(None)
        }
        Err(e) => Err(AgentError::AuthConfigError(e.to_string())),
    }
}

/// True when `path` names a parent directory that doesn't exist, as opposed
/// to a missing leaf file in an existing directory — both surface as the
/// same `ENOENT` from `read_to_string` and must be told apart explicitly.
fn parent_is_missing(path: &Path) -> bool {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| !p.exists())
        .unwrap_or(false)
}

/// Atomically persists the credential store: sibling temp file with a
/// pid+time+random suffix, pretty JSON with a trailing newline, fsync where
/// supported, rename over the target, then chmod 0600 (§4.B, invariant 6).
pub fn save_credentials(path: &Path, store: &CredentialStore) -> Result<(), AgentError> {
    let json = serde_json::to_string_pretty(store)
        .map_err(|e| AgentError::AuthConfigError(e.to_string()))?;
    let mut contents = json;
    contents.push('\n');

    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(dir) = dir {
        if !dir.exists() {
            return Err(AgentError::AuthConfigError(format!(
                "parent directory does not exist: {}",
                dir.display()
            )));
        }
    }

    let suffix = format!(
        "{}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0),
        suffix_rand(),
    );
    let tmp_path = path.with_extension(format!("tmp.{suffix}"));

    let write_result = (|| -> std::io::Result<()> {
        let mut file = std::fs::File::create(&tmp_path)?;
        std::io::Write::write_all(&mut file, contents.as_bytes())?;
        file.sync_all()?;
        Ok(())
    })();

    if let Err(e) = write_result {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(AgentError::AuthConfigError(e.to_string()));
    }

    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(AgentError::AuthConfigError(e.to_string()));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
            return Err(AgentError::AuthConfigError(e.to_string()));
        }
    }

    Ok(())
}

/// Non-cryptographic suffix entropy for the temp-file name; collisions are
/// harmless (rename just fails and the caller's next attempt reuses a new
/// suffix), so a simple address-based value is sufficient.
fn suffix_rand() -> u32 {
    let local = 0u8;
    (&local as *const u8 as usize as u32).wrapping_mul(2654435761)
}

#[cfg(test)]
mod tests {
    use super::*;
    use credentials_store::ProviderEntry;

    #[test]
    fn missing_runtime_config_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.json");
        let cfg = load_runtime_config(&path).unwrap();
        assert_eq!(cfg.profile, "safe");
    }

    #[test]
    fn invalid_json_runtime_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = load_runtime_config(&path).unwrap_err();
        assert_eq!(err.code(), "AGENT_CONFIG_INVALID");
    }

    #[test]
    fn runtime_config_at_directory_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_runtime_config(dir.path()).unwrap_err();
        assert_eq!(err.code(), "AGENT_CONFIG_ERROR");
    }

    #[test]
    fn runtime_config_with_missing_parent_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nonexistent-subdir").join("agent.json");
        let err = load_runtime_config(&path).unwrap_err();
        assert_eq!(err.code(), "AGENT_CONFIG_ERROR");
    }

    #[test]
    fn credentials_with_missing_parent_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nonexistent-subdir").join("agent.auth.json");
        let err = load_credentials(&path).unwrap_err();
        assert_eq!(err.code(), "AUTH_CONFIG_ERROR");
    }

    #[test]
    fn save_then_load_credentials_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.auth.json");
        let mut store = CredentialStore::default();
        store.providers.insert(
            "openai".to_string(),
            ProviderEntry::OpenAiCompatible {
                base_url: "https://api.openai.com/v1".to_string(),
                api_key: "sk-test".to_string(),
            },
        );
        save_credentials(&path, &store).unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o600);
        }

        let loaded = load_credentials(&path).unwrap().unwrap();
        assert_eq!(loaded.providers.len(), store.providers.len());
    }
}
