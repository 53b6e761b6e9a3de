//! `CredentialStore` — provider credentials (§3, §6).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Extra headers sent with every request to a provider, e.g. the hosted
/// editor's `editor-version` / `plugin-version` / `user-agent` headers.
pub type ExtraHeaders = HashMap<String, String>;

/// A provider credential entry. Tagged by `kind` in the wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderEntry {
    OpenAiCompatible {
        #[serde(rename = "baseUrl")]
        base_url: String,
        /// May be empty for local endpoints (§4.D).
        #[serde(rename = "apiKey", default)]
        api_key: String,
    },
    GithubCopilot {
        #[serde(rename = "accessToken")]
        access_token: String,
        #[serde(rename = "refreshToken", default)]
        refresh_token: Option<String>,
        /// ISO-8601 expiry of the long-lived access token.
        #[serde(rename = "accessTokenExpiresAt", default)]
        access_token_expires_at: Option<String>,
        #[serde(rename = "runtimeToken", default)]
        runtime_token: Option<String>,
        /// ISO-8601 expiry of the short-lived runtime token.
        #[serde(rename = "runtimeTokenExpiresAt", default)]
        runtime_token_expires_at: Option<String>,
        #[serde(rename = "oauthTokenUrl", default)]
        oauth_token_url: Option<String>,
        #[serde(rename = "runtimeTokenUrl", default)]
        runtime_token_url: Option<String>,
        #[serde(rename = "apiBaseUrl", default)]
        api_base_url: Option<String>,
        #[serde(rename = "clientId", default)]
        client_id: Option<String>,
        #[serde(default)]
        extra_headers: ExtraHeaders,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CredentialStore {
    #[serde(default = "default_schema_version")]
    pub version: u32,
    #[serde(default, rename = "defaultProvider")]
    pub default_provider: Option<String>,
    #[serde(default, rename = "defaultModel")]
    pub default_model: Option<String>,
    #[serde(default)]
    pub providers: HashMap<String, ProviderEntry>,
}

fn default_schema_version() -> u32 {
    1
}
