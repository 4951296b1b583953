//! # Preview URL Secrets
//!
//! Generation and bookkeeping for the secrets that authenticate a preview
//! page against the studio.

use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use preview_rbac::resources::{
    PREVIEW_URL_SECRET_DOCUMENT_TYPE, SHARE_ACCESS_DOCUMENT_TYPE, SHARE_ACCESS_SINGLETON_ID,
};

/// Default lifetime of a short-lived preview secret (1 hour).
pub const DEFAULT_SECRET_TTL_SECS: i64 = 60 * 60;

/// Default number of random bytes in a generated secret.
pub const DEFAULT_SECRET_BYTES: usize = 16;

/// A secret together with the instant it stops being accepted.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewUrlSecret {
    /// The secret value sent to the preview page.
    pub secret: String,

    /// When the secret expires.
    pub expires_at: DateTime<Utc>,
}

impl PreviewUrlSecret {
    /// Create a secret record.
    pub fn new(secret: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            secret: secret.into(),
            expires_at,
        }
    }

    /// Check if the secret has expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Time left before expiry, zero once expired.
    pub fn expires_in(&self) -> std::time::Duration {
        (self.expires_at - Utc::now())
            .to_std()
            .unwrap_or(std::time::Duration::ZERO)
    }

    /// Log-safe identifier of the secret.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.secret)
    }
}

impl std::fmt::Debug for PreviewUrlSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewUrlSecret")
            .field("secret", &format_args!("[REDACTED {}]", self.fingerprint()))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Generate a random URL-safe secret.
///
/// # Arguments
///
/// * `bytes` - Number of random bytes before encoding
///
/// # Returns
///
/// Unpadded URL-safe base64 of `bytes` random bytes.
pub fn generate_url_secret(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)
}

/// Truncated SHA-256 of a secret, safe to write to logs.
pub fn fingerprint(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize()[..6]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Issuance settings for preview secrets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretSettings {
    /// Lifetime of a short-lived secret.
    pub ttl: Duration,

    /// Random bytes per secret.
    pub secret_bytes: usize,
}

impl Default for SecretSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::seconds(DEFAULT_SECRET_TTL_SECS),
            secret_bytes: DEFAULT_SECRET_BYTES,
        }
    }
}

impl SecretSettings {
    /// Load settings from environment variables.
    ///
    /// Reads `PREVIEW_SECRET_TTL_SECS` and `PREVIEW_SECRET_BYTES`, falling back
    /// to defaults when unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ttl: std::env::var("PREVIEW_SECRET_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs: &i64| *secs > 0)
                .map(Duration::seconds)
                .unwrap_or(defaults.ttl),
            secret_bytes: std::env::var("PREVIEW_SECRET_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n >= 8)
                .unwrap_or(defaults.secret_bytes),
        }
    }

    /// Set the secret lifetime.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Generate a fresh secret under these settings.
    pub fn issue(&self) -> PreviewUrlSecret {
        PreviewUrlSecret::new(
            generate_url_secret(self.secret_bytes),
            Utc::now() + self.ttl,
        )
    }
}

/// Stored form of a secret document.
#[derive(Clone, Serialize, Deserialize)]
pub struct SecretRecord {
    /// Document id.
    #[serde(rename = "_id")]
    pub id: String,

    /// Document type.
    #[serde(rename = "_type")]
    pub doc_type: String,

    /// Secret value.
    pub secret: String,

    /// Tool that issued the secret.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Studio URL the secret was issued from.
    #[serde(rename = "studioUrl", skip_serializing_if = "Option::is_none")]
    pub studio_url: Option<String>,

    /// Issuing user.
    #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Expiry, absent for the shared secret.
    #[serde(rename = "expiresAt", skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl SecretRecord {
    /// Record for a short-lived secret, stored as a draft document.
    pub fn short_lived(secret: &PreviewUrlSecret) -> Self {
        Self {
            id: format!("drafts.{}", Uuid::new_v4()),
            doc_type: PREVIEW_URL_SECRET_DOCUMENT_TYPE.to_string(),
            secret: secret.secret.clone(),
            source: None,
            studio_url: None,
            user_id: None,
            expires_at: Some(secret.expires_at),
        }
    }

    /// Record for the share-access singleton.
    pub fn shared(secret: impl Into<String>) -> Self {
        Self {
            id: SHARE_ACCESS_SINGLETON_ID.to_string(),
            doc_type: SHARE_ACCESS_DOCUMENT_TYPE.to_string(),
            secret: secret.into(),
            source: None,
            studio_url: None,
            user_id: None,
            expires_at: None,
        }
    }

    /// Check whether the record still authorizes previews.
    pub fn is_live(&self) -> bool {
        self.expires_at.map_or(true, |at| Utc::now() < at)
    }
}

impl std::fmt::Debug for SecretRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretRecord")
            .field("id", &self.id)
            .field("doc_type", &self.doc_type)
            .field("secret", &format_args!("[REDACTED {}]", fingerprint(&self.secret)))
            .field("source", &self.source)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
