//! Studio-side preview configuration.
//!
//! Configuration is loaded from environment variables with defaults suitable
//! for local development.

use chrono::Duration;
use url::Url;

use crate::error::{PreviewUrlError, PreviewUrlResult};
use crate::perspective::Perspective;

/// Default studio origin for local development.
pub const DEFAULT_STUDIO_ORIGIN: &str = "http://localhost:3333";

/// Bookkeeping lifetime given to shared secrets, which carry no expiry of
/// their own (60 days).
pub const DEFAULT_SHARED_SECRET_TTL_SECS: i64 = 60 * 60 * 24 * 60;

/// Settings of the studio hosting the preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewSettings {
    /// Origin used to resolve relative URLs and passed to callbacks.
    pub studio_origin: String,

    /// Base path the studio is mounted at.
    pub studio_base_path: String,

    /// Perspective requested from the previewed page.
    pub perspective: Perspective,

    /// Expiry assigned to shared secrets.
    pub shared_secret_ttl_secs: i64,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            studio_origin: DEFAULT_STUDIO_ORIGIN.to_string(),
            studio_base_path: "/".to_string(),
            perspective: Perspective::Drafts,
            shared_secret_ttl_secs: DEFAULT_SHARED_SECRET_TTL_SECS,
        }
    }
}

impl PreviewSettings {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PREVIEW_STUDIO_ORIGIN`: Studio origin (default: http://localhost:3333)
    /// - `PREVIEW_STUDIO_BASE_PATH`: Studio base path (default: /)
    /// - `PREVIEW_PERSPECTIVE`: Perspective, comma-separated for a release stack (default: drafts)
    /// - `PREVIEW_SHARED_SECRET_TTL_SECS`: Shared secret bookkeeping TTL (default: 60 days)
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            studio_origin: std::env::var("PREVIEW_STUDIO_ORIGIN").unwrap_or(default.studio_origin),
            studio_base_path: std::env::var("PREVIEW_STUDIO_BASE_PATH")
                .unwrap_or(default.studio_base_path),
            perspective: std::env::var("PREVIEW_PERSPECTIVE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.perspective),
            shared_secret_ttl_secs: std::env::var("PREVIEW_SHARED_SECRET_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.shared_secret_ttl_secs),
        }
    }

    /// Settings for a studio at `origin`.
    pub fn new(studio_origin: impl Into<String>) -> Self {
        Self {
            studio_origin: studio_origin.into(),
            ..Default::default()
        }
    }

    /// Set the shared secret bookkeeping TTL.
    pub fn with_shared_secret_ttl(mut self, ttl: Duration) -> Self {
        self.shared_secret_ttl_secs = ttl.num_seconds();
        self
    }

    /// Set the perspective.
    pub fn with_perspective(mut self, perspective: Perspective) -> Self {
        self.perspective = perspective;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> PreviewUrlResult<()> {
        let origin = self.studio_origin_url()?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(PreviewUrlError::Config(format!(
                "studio origin must be http or https, got {}",
                origin.scheme()
            )));
        }
        if !self.studio_base_path.starts_with('/') {
            return Err(PreviewUrlError::Config(
                "studio base path must start with /".to_string(),
            ));
        }
        if self.shared_secret_ttl_secs <= 0 {
            return Err(PreviewUrlError::Config(
                "shared secret TTL must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// The studio origin as a URL.
    pub fn studio_origin_url(&self) -> PreviewUrlResult<Url> {
        Url::parse(&self.studio_origin)
            .map_err(|e| PreviewUrlError::invalid_url(self.studio_origin.clone(), e))
    }

    /// The studio origin, serialized without a trailing slash.
    pub fn origin(&self) -> PreviewUrlResult<String> {
        Ok(self.studio_origin_url()?.origin().ascii_serialization())
    }

    /// Resolve `input` against the studio origin.
    pub fn resolve(&self, input: &str) -> PreviewUrlResult<Url> {
        self.studio_origin_url()?
            .join(input)
            .map_err(|e| PreviewUrlError::invalid_url(input, e))
    }

    /// Shared secret bookkeeping TTL.
    pub fn shared_secret_ttl(&self) -> Duration {
        Duration::seconds(self.shared_secret_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = PreviewSettings::default();
        assert_eq!(settings.studio_origin, "http://localhost:3333");
        assert_eq!(settings.perspective, Perspective::Drafts);
        assert_eq!(settings.shared_secret_ttl(), Duration::days(60));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let settings = PreviewSettings::new("http://localhost:3000");
        assert_eq!(
            settings.resolve("/preview").unwrap().as_str(),
            "http://localhost:3000/preview"
        );
        assert_eq!(
            settings.resolve("https://example.com").unwrap().as_str(),
            "https://example.com/"
        );
        assert_eq!(settings.origin().unwrap(), "http://localhost:3000");
    }

    #[test]
    fn test_shared_secret_ttl_override() {
        let settings = PreviewSettings::default().with_shared_secret_ttl(Duration::hours(2));
        assert_eq!(settings.shared_secret_ttl_secs, 7200);
        assert_eq!(settings.shared_secret_ttl(), Duration::hours(2));
    }

    #[test]
    fn test_validate_rejects_bad_origins() {
        assert!(PreviewSettings::new("ftp://localhost").validate().is_err());
        assert!(PreviewSettings::new("not a url").validate().is_err());

        let mut settings = PreviewSettings::default();
        settings.studio_base_path = "studio".to_string();
        assert!(settings.validate().is_err());
    }
}
