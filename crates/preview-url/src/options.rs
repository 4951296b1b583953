//! # Resolver Options
//!
//! Operator configuration for preview URL resolution. Each option is a small
//! closed set of shapes: literal values, or callbacks that compute the value
//! from a context. Callbacks may be synchronous ([`Resolver::from_fn`]) or
//! asynchronous ([`Resolver::from_async_fn`]); clients and other services a
//! callback needs are captured by the closure.
//!
//! ## Usage
//!
//! ```rust
//! use preview_url::{AllowOption, PreviewModeSettings, PreviewUrlOptions, Resolver};
//!
//! let options = PreviewUrlOptions::new()
//!     .initial("http://localhost:3000")
//!     .preview_mode(PreviewModeSettings::new("/api/draft-mode/enable"));
//!
//! let allow = AllowOption::from(vec!["http://localhost:*", "https://*.example.com"]);
//!
//! // Computed from the resolution context
//! let dynamic = AllowOption::Resolver(Resolver::from_fn(|ctx: preview_url::AllowOptionContext| {
//!     Ok(vec![ctx.origin, ctx.initial_url.origin().ascii_serialization()])
//! }));
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use url::Url;

use preview_rbac::BoxError;

type ResolverFn<C, T> = dyn Fn(C) -> BoxFuture<'static, Result<T, BoxError>> + Send + Sync;

/// An operator-supplied callback computing `T` from context `C`.
pub struct Resolver<C, T>(Arc<ResolverFn<C, T>>);

impl<C, T> Resolver<C, T>
where
    C: Send + 'static,
    T: Send + 'static,
{
    /// Wrap a synchronous callback.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(C) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        Self(Arc::new(move |ctx| {
            let result = f(ctx);
            async move { result }.boxed()
        }))
    }

    /// Wrap an asynchronous callback.
    pub fn from_async_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(C) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
    {
        Self(Arc::new(move |ctx| f(ctx).boxed()))
    }

    /// Invoke the callback.
    pub async fn call(&self, ctx: C) -> Result<T, BoxError> {
        (self.0)(ctx).await
    }
}

impl<C, T> Clone for Resolver<C, T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<C, T> fmt::Debug for Resolver<C, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Resolver(..)")
    }
}

/// Context passed to an initial URL callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialUrlContext {
    /// Origin of the studio hosting the preview.
    pub origin: String,
}

/// Context passed to a legacy single-function preview URL resolver.
#[derive(Clone, PartialEq, Eq)]
pub struct LegacyResolverContext {
    /// A freshly created preview secret.
    pub preview_url_secret: String,
    /// The caller-requested navigation target.
    pub preview_search_param: Option<String>,
    /// Encoded perspective of the studio.
    pub studio_preview_perspective: String,
    /// Base path the studio is mounted at.
    pub studio_base_path: String,
}

impl fmt::Debug for LegacyResolverContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LegacyResolverContext")
            .field("preview_url_secret", &"[REDACTED]")
            .field("preview_search_param", &self.preview_search_param)
            .field("studio_preview_perspective", &self.studio_preview_perspective)
            .field("studio_base_path", &self.studio_base_path)
            .finish()
    }
}

/// Context passed to an allow option callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowOptionContext {
    /// Origin of the studio hosting the preview.
    pub origin: String,
    /// The resolved initial URL.
    pub initial_url: Url,
}

/// Context passed to a preview mode callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewModeContext {
    /// Origin of the studio hosting the preview.
    pub origin: String,
    /// Origin of the page being previewed.
    pub target_origin: String,
}

/// Where the preview starts.
#[derive(Debug, Clone)]
pub enum InitialUrlOption {
    /// Absolute URL, or a path relative to the studio origin
    Url(String),
    /// Computed from the studio origin
    Resolver(Resolver<InitialUrlContext, String>),
}

impl From<&str> for InitialUrlOption {
    fn from(value: &str) -> Self {
        InitialUrlOption::Url(value.to_string())
    }
}

impl From<String> for InitialUrlOption {
    fn from(value: String) -> Self {
        InitialUrlOption::Url(value)
    }
}

/// Which origins the preview may navigate to.
#[derive(Debug, Clone)]
pub enum AllowOption {
    /// A single pattern
    Pattern(String),
    /// A list of patterns
    Patterns(Vec<String>),
    /// Computed from the studio origin and the initial URL
    Resolver(Resolver<AllowOptionContext, Vec<String>>),
}

impl From<&str> for AllowOption {
    fn from(value: &str) -> Self {
        AllowOption::Pattern(value.to_string())
    }
}

impl From<Vec<&str>> for AllowOption {
    fn from(value: Vec<&str>) -> Self {
        AllowOption::Patterns(value.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for AllowOption {
    fn from(value: Vec<String>) -> Self {
        AllowOption::Patterns(value)
    }
}

/// Declared preview mode settings.
///
/// `check` and `disable` are accepted for compatibility and never called.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewModeSettings {
    /// Endpoint that enables preview mode on the target.
    pub enable: String,
    /// Whether shared access may be used, defaults to `true`.
    #[serde(default)]
    pub share_access: Option<bool>,
    /// Endpoint reporting whether preview mode is on.
    #[serde(default)]
    pub check: Option<String>,
    /// Endpoint that disables preview mode.
    #[serde(default)]
    pub disable: Option<String>,
}

impl PreviewModeSettings {
    /// Settings with an enable endpoint and default sharing.
    pub fn new(enable: impl Into<String>) -> Self {
        Self {
            enable: enable.into(),
            ..Default::default()
        }
    }

    /// Set the sharing policy.
    pub fn share_access(mut self, share_access: bool) -> Self {
        self.share_access = Some(share_access);
        self
    }

    /// Normalize into the resolved form.
    pub fn normalize(&self) -> PreviewMode {
        PreviewMode {
            enable: self.enable.clone(),
            share_access: self.share_access.unwrap_or(true),
        }
    }
}

/// Resolved preview mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewMode {
    /// Endpoint that enables preview mode on the target.
    pub enable: String,
    /// Whether shared access may be used.
    pub share_access: bool,
}

/// How preview mode is configured.
#[derive(Debug, Clone)]
pub enum PreviewModeOption {
    /// Literal settings
    Settings(PreviewModeSettings),
    /// Computed from the studio and target origins; `None` disables preview mode
    Resolver(Resolver<PreviewModeContext, Option<PreviewModeSettings>>),
}

impl From<PreviewModeSettings> for PreviewModeOption {
    fn from(value: PreviewModeSettings) -> Self {
        PreviewModeOption::Settings(value)
    }
}

/// Structured preview URL configuration.
#[derive(Debug, Clone, Default)]
pub struct PreviewUrlOptions {
    /// Where the preview starts.
    pub initial: Option<InitialUrlOption>,
    /// Preview mode configuration.
    pub preview_mode: Option<PreviewModeOption>,
    /// Legacy origin, `"same-origin"` for the studio origin.
    pub origin: Option<String>,
    /// Legacy start path.
    pub preview: Option<String>,
    /// Legacy preview mode settings, take precedence over `preview_mode`.
    pub draft_mode: Option<PreviewModeSettings>,
}

impl PreviewUrlOptions {
    /// Empty options: start at the studio root with preview mode disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial URL.
    pub fn initial(mut self, initial: impl Into<InitialUrlOption>) -> Self {
        self.initial = Some(initial.into());
        self
    }

    /// Set the preview mode configuration.
    pub fn preview_mode(mut self, preview_mode: impl Into<PreviewModeOption>) -> Self {
        self.preview_mode = Some(preview_mode.into());
        self
    }

    /// Set the legacy origin.
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Set the legacy start path.
    pub fn preview(mut self, preview: impl Into<String>) -> Self {
        self.preview = Some(preview.into());
        self
    }

    /// Set legacy preview mode settings.
    pub fn draft_mode(mut self, draft_mode: PreviewModeSettings) -> Self {
        self.draft_mode = Some(draft_mode);
        self
    }
}

/// Top-level preview URL configuration.
#[derive(Debug, Clone)]
pub enum PreviewUrlOption {
    /// Absolute URL, or a path relative to the studio origin
    Url(String),
    /// Legacy resolver computing the full URL; disables preview mode
    Legacy(Resolver<LegacyResolverContext, String>),
    /// Structured options
    Options(PreviewUrlOptions),
}

impl From<&str> for PreviewUrlOption {
    fn from(value: &str) -> Self {
        PreviewUrlOption::Url(value.to_string())
    }
}

impl From<String> for PreviewUrlOption {
    fn from(value: String) -> Self {
        PreviewUrlOption::Url(value)
    }
}

impl From<PreviewUrlOptions> for PreviewUrlOption {
    fn from(value: PreviewUrlOptions) -> Self {
        PreviewUrlOption::Options(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sync_and_async_resolvers() {
        let sync = Resolver::from_fn(|ctx: InitialUrlContext| Ok(format!("{}/preview", ctx.origin)));
        let async_ = Resolver::from_async_fn(|ctx: InitialUrlContext| async move {
            Ok(format!("{}/async", ctx.origin))
        });
        let ctx = InitialUrlContext {
            origin: "http://localhost:3000".to_string(),
        };

        assert_eq!(sync.call(ctx.clone()).await.unwrap(), "http://localhost:3000/preview");
        assert_eq!(async_.clone().call(ctx).await.unwrap(), "http://localhost:3000/async");
    }

    #[tokio::test]
    async fn test_resolver_errors_propagate() {
        let failing: Resolver<InitialUrlContext, String> =
            Resolver::from_fn(|_| Err("no initial url".into()));
        let err = failing
            .call(InitialUrlContext {
                origin: String::new(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "no initial url");
    }

    #[test]
    fn test_preview_mode_normalization() {
        let settings = PreviewModeSettings {
            enable: "/api/draft-mode/enable".to_string(),
            share_access: None,
            check: Some("/api/draft-mode/check".to_string()),
            disable: Some("/api/draft-mode/disable".to_string()),
        };
        assert_eq!(
            settings.normalize(),
            PreviewMode {
                enable: "/api/draft-mode/enable".to_string(),
                share_access: true,
            }
        );
        assert!(!settings.share_access(false).normalize().share_access);
    }

    #[test]
    fn test_settings_deserialize_camel_case() {
        let settings: PreviewModeSettings = serde_json::from_value(serde_json::json!({
            "enable": "/api/draft-mode/enable",
            "shareAccess": null,
        }))
        .unwrap();
        assert!(settings.normalize().share_access);
    }

    #[test]
    fn test_legacy_context_debug_redacts_secret() {
        let ctx = LegacyResolverContext {
            preview_url_secret: "abc123".to_string(),
            preview_search_param: None,
            studio_preview_perspective: "drafts".to_string(),
            studio_base_path: "/".to_string(),
        };
        assert!(!format!("{:?}", ctx).contains("abc123"));
    }
}
