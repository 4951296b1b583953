//! Content API secret issuer.
//!
//! Stores preview secrets as documents through the content API's mutation
//! endpoint and reads the share-access singleton through its query endpoint.
//! Configuration is loaded from environment variables with defaults suitable
//! for local development.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};

use preview_rbac::resources::{SHARE_ACCESS_DOCUMENT_TYPE, SHARE_ACCESS_SINGLETON_ID};

use crate::error::{AuthError, AuthResult};
use crate::secret::{PreviewUrlSecret, SecretRecord, SecretSettings};
use crate::store::{SecretIssuer, SecretSource};

/// Query that selects the shared secret from the share-access singleton.
const SHARED_SECRET_QUERY: &str = "*[_id == $id && _type == $type][0].secret";

/// Content API connection settings.
#[derive(Clone)]
pub struct ContentApiConfig {
    /// Base URL of the API (e.g., "https://abc123.api.sanity.io").
    pub base_url: String,

    /// Dataset holding the secret documents.
    pub dataset: String,

    /// API version date, without the leading `v`.
    pub api_version: String,

    /// Bearer token.
    pub token: Option<String>,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ContentApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3030".to_string(),
            dataset: "production".to_string(),
            api_version: "2023-11-09".to_string(),
            token: None,
            timeout_secs: 30,
        }
    }
}

impl std::fmt::Debug for ContentApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentApiConfig")
            .field("base_url", &self.base_url)
            .field("dataset", &self.dataset)
            .field("api_version", &self.api_version)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ContentApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PREVIEW_CONTENT_API_URL`: API base URL (default: http://localhost:3030)
    /// - `PREVIEW_CONTENT_DATASET`: Dataset (default: production)
    /// - `PREVIEW_CONTENT_API_VERSION`: API version date (default: 2023-11-09)
    /// - `PREVIEW_CONTENT_API_TOKEN`: Bearer token
    /// - `PREVIEW_CONTENT_TIMEOUT_SECS`: Request timeout (default: 30)
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            base_url: std::env::var("PREVIEW_CONTENT_API_URL").unwrap_or(default.base_url),
            dataset: std::env::var("PREVIEW_CONTENT_DATASET").unwrap_or(default.dataset),
            api_version: std::env::var("PREVIEW_CONTENT_API_VERSION")
                .map(|v| v.trim_start_matches('v').to_string())
                .unwrap_or(default.api_version),
            token: std::env::var("PREVIEW_CONTENT_API_TOKEN").ok(),
            timeout_secs: std::env::var("PREVIEW_CONTENT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.timeout_secs),
        }
    }

    /// Create a config pointing at `base_url` with default settings otherwise.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Build a versioned API URL for `path`.
    pub fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/v{}/{}", base, self.api_version, path)
    }

    /// Get the request timeout as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct MutationResponse {
    #[serde(rename = "transactionId")]
    transaction_id: String,
}

/// Secret issuer backed by the content API.
#[derive(Clone)]
pub struct ContentApiSecretIssuer {
    client: Client,
    config: ContentApiConfig,
    settings: SecretSettings,
    source: SecretSource,
}

impl ContentApiSecretIssuer {
    /// Create a new issuer.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::ConfigError` if the HTTP client cannot be built.
    pub fn new(config: ContentApiConfig, settings: SecretSettings) -> AuthResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AuthError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            settings,
            source: SecretSource::default(),
        })
    }

    /// Set the source stamped on issued secrets.
    pub fn with_source(mut self, source: SecretSource) -> Self {
        self.source = source;
        self
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn handle_response<T>(&self, response: reqwest::Response) -> AuthResult<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            error!("Content API authentication failed");
            return Err(AuthError::AuthenticationFailed);
        }

        if status == reqwest::StatusCode::FORBIDDEN {
            let message = response.text().await.unwrap_or_else(|_| "Forbidden".to_string());
            warn!("Content API denied request: {}", message);
            return Err(AuthError::PermissionDenied(message));
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            warn!("Content API error ({}): {}", status.as_u16(), message);
            return Err(AuthError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl SecretIssuer for ContentApiSecretIssuer {
    #[instrument(skip(self), fields(dataset = %self.config.dataset))]
    async fn create_preview_secret(&self) -> AuthResult<PreviewUrlSecret> {
        let issued = self.settings.issue();
        let record = self.source.apply(SecretRecord::short_lived(&issued));
        debug!(id = %record.id, "Creating preview secret document");

        let url = self
            .config
            .url(&format!("data/mutate/{}", self.config.dataset));
        let body = json!({ "mutations": [{ "create": record }] });
        let request = self.authorize(self.client.post(&url).json(&body));

        let response = request.send().await?;
        let mutation: MutationResponse = self.handle_response(response).await?;

        info!(
            transaction_id = %mutation.transaction_id,
            fingerprint = %issued.fingerprint(),
            "Issued preview secret"
        );
        Ok(issued)
    }

    #[instrument(skip(self), fields(dataset = %self.config.dataset))]
    async fn read_shared_secret(&self) -> AuthResult<Option<String>> {
        let url = self
            .config
            .url(&format!("data/query/{}", self.config.dataset));
        // Query parameters are JSON encoded
        let id = json!(SHARE_ACCESS_SINGLETON_ID).to_string();
        let doc_type = json!(SHARE_ACCESS_DOCUMENT_TYPE).to_string();
        let request = self.authorize(self.client.get(&url).query(&[
            ("query", SHARED_SECRET_QUERY),
            ("$id", id.as_str()),
            ("$type", doc_type.as_str()),
        ]));

        let response = request.send().await?;
        let query: QueryResponse<Option<String>> = self.handle_response(response).await?;

        debug!(shared = query.result.is_some(), "Read shared preview secret");
        Ok(query.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ContentApiConfig::default();
        assert_eq!(config.dataset, "production");
        assert_eq!(config.timeout_secs, 30);
        assert!(config.token.is_none());
    }

    #[test]
    fn test_versioned_url() {
        let config = ContentApiConfig::new("https://abc123.api.sanity.io/");
        assert_eq!(
            config.url("/data/query/production"),
            "https://abc123.api.sanity.io/v2023-11-09/data/query/production"
        );
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = ContentApiConfig::default().with_token("sk-very-secret");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("sk-very-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
