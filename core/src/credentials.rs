//! Credential Manager (§4.D): API-key resolution for OpenAI-compatible
//! providers, and the OAuth/runtime-token state machine for the hosted
//! editor (GitHub Copilot style) provider.

use crate::config::{CredentialStore, ProviderEntry};
use crate::error::AgentError;
use crate::net::is_local_or_private_host;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A resolved, ready-to-use HTTP context for one invocation (§3 `Runtime`).
#[derive(Debug, Clone)]
pub struct Runtime {
    pub provider: String,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub extra_headers: Vec<(String, String)>,
}

/// Validates a base URL per §4.D / §6: must parse, scheme in {https, http};
/// `http` permitted only for local/private hosts or when
/// `allow_insecure_http` is set.
pub fn validate_base_url(raw: &str, allow_insecure_http: bool) -> Result<url::Url, AgentError> {
    let parsed = url::Url::parse(raw).map_err(|e| AgentError::InvalidBaseUrl(e.to_string()))?;
    match parsed.scheme() {
        "https" => Ok(parsed),
        "http" => {
            let host = parsed.host_str().unwrap_or("");
            if allow_insecure_http || is_local_or_private_host(host) {
                Ok(parsed)
            } else {
                Err(AgentError::InsecureBaseUrl(format!(
                    "http base url not permitted for non-local host: {host}"
                )))
            }
        }
        other => Err(AgentError::InvalidBaseUrl(format!(
            "unsupported scheme: {other}"
        ))),
    }
}

/// Resolves credentials for the `openai_compatible` provider kind.
pub fn resolve_openai_compatible(
    base_url: &str,
    stored_api_key: &str,
    env_api_key: Option<&str>,
    allow_insecure_http: bool,
) -> Result<(url::Url, Option<String>), AgentError> {
    let parsed = validate_base_url(base_url, allow_insecure_http)?;
    let key = env_api_key
        .filter(|k| !k.is_empty())
        .map(|k| k.to_string())
        .or_else(|| Some(stored_api_key.to_string()))
        .filter(|k| !k.is_empty());

    let is_local_http = parsed.scheme() == "http" && is_local_or_private_host(parsed.host_str().unwrap_or(""));
    if key.is_none() && !is_local_http {
        return Err(AgentError::ProviderNotConfigured(
            "no API key configured for a non-local provider".to_string(),
        ));
    }
    Ok((parsed, key))
}

const DEFAULT_RUNTIME_TOKEN_TTL_SECS: u64 = 25 * 60;
const RUNTIME_TOKEN_REFRESH_SKEW_SECS: u64 = 60;

fn now_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

fn parse_iso_to_epoch(s: &str) -> Option<u64> {
    chrono::DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.timestamp().max(0) as u64)
}

fn epoch_to_iso(epoch: u64) -> String {
    chrono::DateTime::<chrono::Utc>::from(UNIX_EPOCH + Duration::from_secs(epoch)).to_rfc3339()
}

/// Outcome of `ensure_runtime_token`: the token to use as `Authorization:
/// Bearer <token>` plus whether the store was mutated and needs persisting.
pub struct RuntimeTokenOutcome {
    pub token: String,
    pub store_dirty: bool,
}

/// Callbacks injected by the transport layer so this module stays
/// HTTP-client-agnostic; `agent-core::transport` supplies the real
/// implementations in production.
#[async_trait::async_trait]
pub trait CopilotEndpoints: Send + Sync {
    async fn fetch_runtime_token(
        &self,
        runtime_token_url: &str,
        access_token: &str,
    ) -> Result<(String, u64, bool), AgentError>;
    async fn refresh_access_token(
        &self,
        oauth_token_url: &str,
        client_id: &str,
        refresh_token: &str,
    ) -> Result<(String, Option<String>, u64), AgentError>;
}

/// Implements the four-step state machine of §4.D for the hosted-editor
/// provider, persisting any mutation atomically via [`crate::config::save_credentials`].
pub async fn ensure_runtime_token(
    endpoints: &dyn CopilotEndpoints,
    credentials_path: &Path,
    store: &mut CredentialStore,
    provider_name: &str,
) -> Result<RuntimeTokenOutcome, AgentError> {
    let entry = store
        .providers
        .get(provider_name)
        .ok_or_else(|| AgentError::ProviderNotConfigured(provider_name.to_string()))?
        .clone();

    let ProviderEntry::GithubCopilot {
        access_token,
        refresh_token,
        runtime_token,
        runtime_token_expires_at,
        oauth_token_url,
        runtime_token_url,
        client_id,
        ..
    } = entry
    else {
        return Err(AgentError::ProviderNotConfigured(format!(
            "{provider_name} is not a github_copilot entry"
        )));
    };

    let now = now_epoch();

    // Step 1: reuse if the stored runtime token is fresh enough.
    if let (Some(token), Some(expiry_iso)) = (&runtime_token, &runtime_token_expires_at) {
        if let Some(expiry) = parse_iso_to_epoch(expiry_iso) {
            if expiry > now + RUNTIME_TOKEN_REFRESH_SKEW_SECS {
                return Ok(RuntimeTokenOutcome {
                    token: token.clone(),
                    store_dirty: false,
                });
            }
        }
    }

    let runtime_token_url = runtime_token_url.ok_or_else(|| {
        AgentError::ProviderNotConfigured("missing runtimeTokenUrl".to_string())
    })?;

    // Step 2: trade the access token for a runtime token.
    let first_attempt = endpoints
        .fetch_runtime_token(&runtime_token_url, &access_token)
        .await;

    let (new_token, expires_at, unauthorized) = match first_attempt {
        Ok((token, expiry, unauthorized)) => (token, expiry, unauthorized),
        Err(_) => (String::new(), 0, true),
    };

    if !unauthorized {
        persist_runtime_token(
            credentials_path,
            store,
            provider_name,
            &new_token,
            expires_at,
        )?;
        return Ok(RuntimeTokenOutcome {
            token: new_token,
            store_dirty: true,
        });
    }

    // Step 3: 401 — attempt a refresh, then retry step 2 once.
    let refresh_token = refresh_token.ok_or_else(|| {
        AgentError::RuntimeError(
            "runtime token request unauthorized and no refresh token is available; re-auth required"
                .to_string(),
        )
    })?;
    let oauth_token_url = oauth_token_url
        .ok_or_else(|| AgentError::ProviderNotConfigured("missing oauthTokenUrl".to_string()))?;
    let client_id = client_id
        .ok_or_else(|| AgentError::ProviderNotConfigured("missing clientId".to_string()))?;

    let (new_access, new_refresh, expires_in) = endpoints
        .refresh_access_token(&oauth_token_url, &client_id, &refresh_token)
        .await?;

    {
        let entry = store.providers.get_mut(provider_name).unwrap();
        if let ProviderEntry::GithubCopilot {
            access_token,
            refresh_token,
            access_token_expires_at,
            ..
        } = entry
        {
            *access_token = new_access.clone();
            if let Some(r) = new_refresh {
                *refresh_token = Some(r);
            }
            *access_token_expires_at = Some(epoch_to_iso(now + expires_in));
        }
    }
    crate::config::save_credentials(credentials_path, store)?;

    let (token, expiry, unauthorized_retry) = endpoints
        .fetch_runtime_token(&runtime_token_url, &new_access)
        .await
        .map(|(t, e, u)| (t, e, u))
        .map_err(|_| {
            AgentError::RuntimeError(
                "runtime token request failed again after refresh; re-auth required".to_string(),
            )
        })?;

    if unauthorized_retry {
        return Err(AgentError::RuntimeError(
            "runtime token still unauthorized after refresh; re-auth required".to_string(),
        ));
    }

    persist_runtime_token(credentials_path, store, provider_name, &token, expiry)?;
    Ok(RuntimeTokenOutcome {
        token,
        store_dirty: true,
    })
}

fn persist_runtime_token(
    credentials_path: &Path,
    store: &mut CredentialStore,
    provider_name: &str,
    token: &str,
    expires_at_epoch: u64,
) -> Result<(), AgentError> {
    let expires_at_epoch = if expires_at_epoch == 0 {
        now_epoch() + DEFAULT_RUNTIME_TOKEN_TTL_SECS
    } else {
        expires_at_epoch
    };
    if let Some(ProviderEntry::GithubCopilot {
        runtime_token,
        runtime_token_expires_at,
        ..
    }) = store.providers.get_mut(provider_name)
    {
        *runtime_token = Some(token.to_string());
        *runtime_token_expires_at = Some(epoch_to_iso(expires_at_epoch));
    }
    crate::config::save_credentials(credentials_path, store)
}

/// Production [`CopilotEndpoints`] backed by `reqwest`, following the same
/// error-redaction discipline as [`crate::transport`].
pub struct HttpCopilotEndpoints {
    pub http: reqwest::Client,
}

#[async_trait::async_trait]
impl CopilotEndpoints for HttpCopilotEndpoints {
    async fn fetch_runtime_token(
        &self,
        runtime_token_url: &str,
        access_token: &str,
    ) -> Result<(String, u64, bool), AgentError> {
        let response = self
            .http
            .get(runtime_token_url)
            .header("Authorization", format!("Bearer {access_token}"))
            .send()
            .await
            .map_err(|e| AgentError::RuntimeError(crate::error::redact(&e.to_string())))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Ok((String::new(), 0, true));
        }
        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AgentError::RuntimeError(crate::error::redact(&text)));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AgentError::RuntimeError(crate::error::redact(&e.to_string())))?;
        let token = value
            .get("token")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let expires_in = value
            .get("expires_in")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_RUNTIME_TOKEN_TTL_SECS);
        Ok((token, now_epoch() + expires_in, false))
    }

    async fn refresh_access_token(
        &self,
        oauth_token_url: &str,
        client_id: &str,
        refresh_token: &str,
    ) -> Result<(String, Option<String>, u64), AgentError> {
        let response = self
            .http
            .post(oauth_token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", client_id),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| AgentError::RuntimeError(crate::error::redact(&e.to_string())))?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AgentError::RuntimeError(crate::error::redact(&text)));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AgentError::RuntimeError(crate::error::redact(&e.to_string())))?;
        let access_token = value
            .get("access_token")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let new_refresh = value
            .get("refresh_token")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        let expires_in = value
            .get("expires_in")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_RUNTIME_TOKEN_TTL_SECS);
        Ok((access_token, new_refresh, expires_in))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_compatible_requires_key_for_remote_host() {
        let err = resolve_openai_compatible("https://api.openai.com/v1", "", None, false)
            .unwrap_err();
        assert_eq!(err.code(), "PROVIDER_NOT_CONFIGURED");
    }

    #[test]
    fn openai_compatible_allows_empty_key_for_local_http() {
        let (_, key) =
            resolve_openai_compatible("http://localhost:11434/v1", "", None, false).unwrap();
        assert_eq!(key, None);
    }

    #[test]
    fn openai_compatible_still_requires_key_for_public_http_with_insecure_flag() {
        // --allow-insecure-http only relaxes the scheme check; it must not
        // also waive the API-key requirement for a non-local host.
        let err = resolve_openai_compatible("http://example.com/v1", "", None, true).unwrap_err();
        assert_eq!(err.code(), "PROVIDER_NOT_CONFIGURED");
    }

    #[test]
    fn env_key_overrides_stored_key() {
        let (_, key) = resolve_openai_compatible(
            "https://api.openai.com/v1",
            "stored-key",
            Some("env-key"),
            false,
        )
        .unwrap();
        assert_eq!(key.as_deref(), Some("env-key"));
    }

    #[test]
    fn insecure_http_rejected_without_flag() {
        let err = validate_base_url("http://example.com/v1", false).unwrap_err();
        assert_eq!(err.code(), "INSECURE_BASE_URL");
    }

    #[test]
    fn insecure_http_allowed_with_flag() {
        assert!(validate_base_url("http://example.com/v1", true).is_ok());
    }
}
