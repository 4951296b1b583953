//! # Preview Authentication
//!
//! This crate issues and reads the secrets that authenticate a live preview
//! session against the page being previewed.
//!
//! ## Overview
//!
//! The preview-auth crate handles:
//! - **Secrets**: Generation, expiry bookkeeping and log-safe fingerprints
//! - **Issuers**: The [`SecretIssuer`] contract used by preview URL resolution
//! - **Share Access**: A long-lived shared secret for users who cannot create secrets
//! - **Content API**: An HTTP issuer that stores secrets as content documents
//!
//! ## Usage
//!
//! ```rust,no_run
//! use preview_auth::{InMemorySecretStore, SecretIssuer, SecretSettings};
//!
//! async fn example() {
//!     let store = InMemorySecretStore::new(SecretSettings::default());
//!
//!     // Short-lived secret, expires after the configured TTL
//!     let secret = store.create_preview_secret().await.unwrap();
//!     assert!(!secret.is_expired());
//!     assert!(store.validate(&secret.secret).await);
//!
//!     // Nothing is shared until sharing is enabled
//!     assert_eq!(store.read_shared_secret().await.unwrap(), None);
//!     let shared = store.enable_share_access().await;
//!     assert_eq!(store.read_shared_secret().await.unwrap(), Some(shared.secret));
//! }
//! ```
//!
//! ## Security
//!
//! - Secrets are 128 bits of randomness, URL-safe base64 encoded
//! - `Debug` output of secret-bearing types never contains the secret
//! - Logs identify secrets by a truncated SHA-256 fingerprint

pub mod error;
pub mod http;
pub mod secret;
pub mod store;

// Re-export main types
pub use error::{AuthError, AuthResult};
pub use http::{ContentApiConfig, ContentApiSecretIssuer};
pub use secret::{fingerprint, generate_url_secret, PreviewUrlSecret, SecretRecord, SecretSettings};
pub use store::{InMemorySecretStore, SecretIssuer, SecretSource};
