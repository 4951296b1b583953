//! # Resolver Actors
//!
//! The units of work the resolution machine invokes, one per busy state.
//!
//! [`Resolvers`] is the seam between the machine and the host: tests and
//! hosts with unusual needs implement it directly, everyone else uses
//! [`ConfiguredResolvers`], which derives every step from operator options
//! and a [`SecretIssuer`].

mod allow_patterns;
mod initial_url;
mod preview_mode;
mod preview_mode_url;
mod search_param;

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use preview_auth::{PreviewUrlSecret, SecretIssuer};

use crate::config::PreviewSettings;
use crate::error::{PreviewUrlError, PreviewUrlResult};
use crate::options::{AllowOption, PreviewMode, PreviewUrlOption};
use crate::pattern::OriginPattern;

pub use allow_patterns::resolve_allow_patterns;
pub use initial_url::resolve_initial_url;
pub use preview_mode::resolve_preview_mode;
pub use preview_mode_url::{
    build_preview_mode_url, without_secret_search_params, SEARCH_PARAM_PATHNAME,
    SEARCH_PARAM_PERSPECTIVE, SEARCH_PARAM_SECRET,
};
pub use search_param::resolve_url_from_search_param;

/// Which secret the current user may attach to a preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecretAccess {
    /// May create short-lived secrets
    Create,
    /// May only read the shared secret
    ReadShared,
    /// May do neither
    Denied,
}

impl SecretAccess {
    /// Derive access from the create-secret and read-shared grants.
    ///
    /// Creating wins over reading, as in preview mode resolution.
    pub fn from_grants(can_create: bool, can_read_shared: bool) -> Self {
        match (can_create, can_read_shared) {
            (true, _) => SecretAccess::Create,
            (false, true) => SecretAccess::ReadShared,
            (false, false) => SecretAccess::Denied,
        }
    }
}

/// Input of the initial URL resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialUrlInput {
    /// Caller-requested target, unvalidated.
    pub preview_search_param: Option<String>,
    /// Secret the legacy resolver may receive.
    pub secret_access: SecretAccess,
}

/// Input of the navigation target resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParamInput {
    /// Last trusted base URL.
    pub initial_url: Url,
    /// Caller-requested target, unvalidated.
    pub preview_search_param: Option<String>,
    /// Trusted origins.
    pub allow_origins: Vec<OriginPattern>,
}

/// Input of the preview mode URL resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewModeUrlInput {
    /// Base URL the enable endpoint is resolved against.
    pub initial_url: Url,
    /// Resolved preview mode.
    pub preview_mode: Option<PreviewMode>,
    /// Secret to attach, absent when no shared secret is published.
    pub secret: Option<String>,
}

/// The resolution steps the machine sequences.
///
/// Every method is one invocation; errors are fatal to the machine.
#[async_trait]
pub trait Resolvers: Send + Sync + 'static {
    /// Default destination of the preview.
    async fn resolve_initial_url(&self, input: InitialUrlInput) -> PreviewUrlResult<Url>;

    /// Origins the preview may navigate to.
    async fn resolve_allow_patterns(&self, initial_url: Url) -> PreviewUrlResult<Vec<OriginPattern>>;

    /// Validate a navigation target against the allow list.
    async fn resolve_url_from_search_param(&self, input: SearchParamInput) -> PreviewUrlResult<Url> {
        Ok(resolve_url_from_search_param(
            &input.initial_url,
            input.preview_search_param.as_deref(),
            &input.allow_origins,
        ))
    }

    /// Preview mode for the target origin, `None` when disabled.
    async fn resolve_preview_mode(&self, target_origin: String) -> PreviewUrlResult<Option<PreviewMode>>;

    /// Create a short-lived secret.
    async fn create_preview_secret(&self) -> PreviewUrlResult<PreviewUrlSecret>;

    /// Read the shared secret.
    async fn read_shared_secret(&self) -> PreviewUrlResult<Option<String>>;

    /// Compose the final preview URL.
    async fn resolve_preview_mode_url(&self, input: PreviewModeUrlInput) -> PreviewUrlResult<Url>;

    /// Studio settings the machine takes its defaults from, if any.
    fn preview_settings(&self) -> Option<&PreviewSettings> {
        None
    }
}

/// Resolvers derived from operator options.
#[derive(Clone)]
pub struct ConfiguredResolvers {
    settings: PreviewSettings,
    preview_url: Option<PreviewUrlOption>,
    allow: Option<AllowOption>,
    issuer: Arc<dyn SecretIssuer>,
}

impl std::fmt::Debug for ConfiguredResolvers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfiguredResolvers")
            .field("settings", &self.settings)
            .field("preview_url", &self.preview_url)
            .field("allow", &self.allow)
            .finish()
    }
}

impl ConfiguredResolvers {
    /// Create resolvers for a studio with no preview URL or allow options.
    pub fn new(settings: PreviewSettings, issuer: Arc<dyn SecretIssuer>) -> Self {
        Self {
            settings,
            preview_url: None,
            allow: None,
            issuer,
        }
    }

    /// Set the preview URL option.
    pub fn with_preview_url(mut self, option: impl Into<PreviewUrlOption>) -> Self {
        self.preview_url = Some(option.into());
        self
    }

    /// Set the allow option.
    pub fn with_allow(mut self, option: impl Into<AllowOption>) -> Self {
        self.allow = Some(option.into());
        self
    }

    /// Studio settings.
    pub fn settings(&self) -> &PreviewSettings {
        &self.settings
    }
}

#[async_trait]
impl Resolvers for ConfiguredResolvers {
    async fn resolve_initial_url(&self, input: InitialUrlInput) -> PreviewUrlResult<Url> {
        resolve_initial_url(
            &self.settings,
            self.preview_url.as_ref(),
            input,
            self.issuer.as_ref(),
        )
        .await
    }

    async fn resolve_allow_patterns(&self, initial_url: Url) -> PreviewUrlResult<Vec<OriginPattern>> {
        resolve_allow_patterns(&self.settings, self.allow.as_ref(), initial_url).await
    }

    async fn resolve_preview_mode(&self, target_origin: String) -> PreviewUrlResult<Option<PreviewMode>> {
        resolve_preview_mode(&self.settings, self.preview_url.as_ref(), target_origin).await
    }

    async fn create_preview_secret(&self) -> PreviewUrlResult<PreviewUrlSecret> {
        Ok(self.issuer.create_preview_secret().await?)
    }

    async fn read_shared_secret(&self) -> PreviewUrlResult<Option<String>> {
        Ok(self.issuer.read_shared_secret().await?)
    }

    async fn resolve_preview_mode_url(&self, input: PreviewModeUrlInput) -> PreviewUrlResult<Url> {
        let preview_mode = input.preview_mode.ok_or(PreviewUrlError::MissingPreviewMode)?;
        build_preview_mode_url(
            &input.initial_url,
            &preview_mode,
            input.secret.as_deref(),
            &self.settings.perspective,
        )
    }

    fn preview_settings(&self) -> Option<&PreviewSettings> {
        Some(&self.settings)
    }
}
