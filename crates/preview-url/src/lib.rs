//! # Preview URL
//!
//! This crate computes the authorized URL of an embedded live preview and
//! keeps it consistent while the previewed page navigates.
//!
//! ## Overview
//!
//! The preview-url crate handles:
//! - **Origin Patterns**: Allow-list patterns with wildcard matching and insecure pattern rejection
//! - **Resolver Options**: The operator-facing shapes of the initial URL, allow list and preview mode
//! - **Resolvers**: One unit of work per resolution step, behind the [`Resolvers`] trait
//! - **Resolution Machine**: [`PreviewUrlMachine`], a permission-aware state machine with
//!   navigation re-entry and expiry-driven secret renewal
//! - **Settings**: Studio origin, base path and perspective loaded from the environment
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use preview_auth::{InMemorySecretStore, SecretSettings};
//! use preview_rbac::StaticPermissionChecker;
//! use preview_url::{ConfiguredResolvers, PreviewSettings, PreviewUrlMachine};
//!
//! async fn example() {
//!     let settings = PreviewSettings::from_env();
//!     let store = Arc::new(InMemorySecretStore::new(SecretSettings::default()));
//!     let resolvers = ConfiguredResolvers::new(settings, store)
//!         .with_preview_url("/preview")
//!         .with_allow(vec!["http://localhost:*"]);
//!
//!     let machine = PreviewUrlMachine::start(
//!         Arc::new(resolvers),
//!         Arc::new(StaticPermissionChecker::allow_all()),
//!         None,
//!     );
//!
//!     let snapshot = machine.settled().await.unwrap();
//!     assert_eq!(
//!         snapshot.preview_url.map(|url| url.to_string()),
//!         Some("http://localhost:3333/preview".to_string())
//!     );
//! }
//! ```
//!
//! ## Security
//!
//! - A pattern whose hostname is only `*` is rejected as insecure
//! - Navigation targets outside the allow list fall back to the last trusted URL
//! - Secrets are attached only when the user may create or read them

pub mod actors;
pub mod config;
pub mod error;
pub mod machine;
pub mod options;
pub mod pattern;
pub mod perspective;

// Re-export main types
pub use actors::{
    build_preview_mode_url, without_secret_search_params, ConfiguredResolvers, InitialUrlInput,
    PreviewModeUrlInput, Resolvers, SearchParamInput, SecretAccess, SEARCH_PARAM_PATHNAME,
    SEARCH_PARAM_PERSPECTIVE, SEARCH_PARAM_SECRET,
};
pub use config::PreviewSettings;
pub use error::{PreviewUrlError, PreviewUrlResult, Stage};
pub use machine::{
    MachineState, PermissionResults, PreviewModeState, PreviewUrlEvent, PreviewUrlMachine,
    PreviewUrlMachineBuilder, PreviewUrlSnapshot, Tag,
};
pub use options::{
    AllowOption, AllowOptionContext, InitialUrlContext, InitialUrlOption, LegacyResolverContext,
    PreviewMode, PreviewModeContext, PreviewModeOption, PreviewModeSettings, PreviewUrlOption,
    PreviewUrlOptions, Resolver,
};
pub use pattern::OriginPattern;
pub use perspective::Perspective;
