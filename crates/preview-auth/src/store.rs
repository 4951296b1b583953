//! # Secret Issuers
//!
//! The [`SecretIssuer`] trait is the seam preview URL resolution uses to
//! obtain secrets. [`InMemorySecretStore`] is a process-local implementation
//! that also validates secrets and manages share access.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::AuthResult;
use crate::secret::{fingerprint, PreviewUrlSecret, SecretRecord, SecretSettings};

/// Issues preview secrets and reads the shared secret.
#[async_trait]
pub trait SecretIssuer: Send + Sync {
    /// Create a new short-lived secret.
    async fn create_preview_secret(&self) -> AuthResult<PreviewUrlSecret>;

    /// Read the shared secret, `None` when sharing is disabled.
    async fn read_shared_secret(&self) -> AuthResult<Option<String>>;
}

/// Who is issuing secrets, recorded on every secret document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretSource {
    /// Tool name, for example `presentation`.
    pub source: Option<String>,

    /// Studio URL the secret is issued from.
    pub studio_url: Option<String>,

    /// Issuing user id.
    pub user_id: Option<String>,
}

impl SecretSource {
    /// Create a source tagged with a tool name.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            ..Default::default()
        }
    }

    /// Set the studio URL.
    pub fn with_studio_url(mut self, url: impl Into<String>) -> Self {
        self.studio_url = Some(url.into());
        self
    }

    /// Set the issuing user.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Stamp a record with this source.
    pub fn apply(&self, mut record: SecretRecord) -> SecretRecord {
        record.source = self.source.clone();
        record.studio_url = self.studio_url.clone();
        record.user_id = self.user_id.clone();
        record
    }
}

/// Process-local secret store.
pub struct InMemorySecretStore {
    settings: SecretSettings,
    source: SecretSource,
    secrets: RwLock<HashMap<String, SecretRecord>>,
    shared: RwLock<Option<SecretRecord>>,
}

impl InMemorySecretStore {
    /// Create an empty store with sharing disabled.
    pub fn new(settings: SecretSettings) -> Self {
        Self {
            settings,
            source: SecretSource::default(),
            secrets: RwLock::new(HashMap::new()),
            shared: RwLock::new(None),
        }
    }

    /// Set the source stamped on issued secrets.
    pub fn with_source(mut self, source: SecretSource) -> Self {
        self.source = source;
        self
    }

    /// Enable share access, replacing any previous shared secret.
    ///
    /// The returned secret has the store's TTL as a nominal expiry; the
    /// shared record itself does not expire until sharing is disabled.
    pub async fn enable_share_access(&self) -> PreviewUrlSecret {
        let issued = self.settings.issue();
        let record = self.source.apply(SecretRecord::shared(issued.secret.clone()));
        *self.shared.write().await = Some(record);
        info!(fingerprint = %issued.fingerprint(), "Preview share access enabled");
        issued
    }

    /// Disable share access. Returns whether sharing was enabled.
    pub async fn disable_share_access(&self) -> bool {
        let was_enabled = self.shared.write().await.take().is_some();
        if was_enabled {
            info!("Preview share access disabled");
        }
        was_enabled
    }

    /// Check whether a secret currently authorizes previews.
    pub async fn validate(&self, secret: &str) -> bool {
        if let Some(shared) = self.shared.read().await.as_ref() {
            if shared.secret == secret {
                return true;
            }
        }

        let valid = self
            .secrets
            .read()
            .await
            .values()
            .any(|record| record.secret == secret && record.is_live());
        debug!(fingerprint = %fingerprint(secret), valid, "Validated preview secret");
        valid
    }

    /// Remove expired secrets. Returns the number removed.
    pub async fn prune_expired(&self) -> usize {
        let mut secrets = self.secrets.write().await;
        let before = secrets.len();
        secrets.retain(|_, record| record.is_live());
        let removed = before - secrets.len();
        if removed > 0 {
            debug!(removed, "Pruned expired preview secrets");
        }
        removed
    }

    /// Number of stored short-lived secrets, expired ones included.
    pub async fn secret_count(&self) -> usize {
        self.secrets.read().await.len()
    }
}

impl Default for InMemorySecretStore {
    fn default() -> Self {
        Self::new(SecretSettings::default())
    }
}

#[async_trait]
impl SecretIssuer for InMemorySecretStore {
    async fn create_preview_secret(&self) -> AuthResult<PreviewUrlSecret> {
        let issued = self.settings.issue();
        let record = self.source.apply(SecretRecord::short_lived(&issued));
        {
            let mut secrets = self.secrets.write().await;
            secrets.retain(|_, record| record.is_live());
            secrets.insert(record.id.clone(), record);
        }
        info!(
            fingerprint = %issued.fingerprint(),
            expires_at = %issued.expires_at,
            "Issued preview secret"
        );
        Ok(issued)
    }

    async fn read_shared_secret(&self) -> AuthResult<Option<String>> {
        Ok(self
            .shared
            .read()
            .await
            .as_ref()
            .map(|record| record.secret.clone()))
    }
}
