//! Error types for preview URL resolution
//!
//! Every failure that reaches the resolution machine is terminal. The machine
//! wraps the cause in [`PreviewUrlError::Stage`] so hosts can tell which step
//! failed while the original error stays reachable through
//! [`std::error::Error::source`].

use preview_auth::AuthError;
use preview_rbac::BoxError;
use thiserror::Error;

/// Resolution step a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// One of the permission streams errored
    CheckPermission,
    /// Initial URL resolution
    InitialUrl,
    /// Allow pattern resolution
    AllowPatterns,
    /// Navigation target validation
    SearchParam,
    /// Preview mode resolution
    PreviewMode,
    /// Short-lived secret creation
    CreateSecret,
    /// Shared secret read
    ReadSharedSecret,
    /// Final preview URL composition
    PreviewModeUrl,
}

impl Stage {
    /// Message describing a failure in this stage.
    pub fn message(&self) -> &'static str {
        match self {
            Stage::CheckPermission => "Failed to check permission",
            Stage::InitialUrl => "Failed to resolve initial url",
            Stage::AllowPatterns => "Failed to resolve preview url allow patterns",
            Stage::SearchParam => "Failed to resolve preview url from search param",
            Stage::PreviewMode => "Failed to resolve preview mode",
            Stage::CreateSecret => "Failed to create preview secret",
            Stage::ReadSharedSecret => "Failed to read shared preview secret",
            Stage::PreviewModeUrl => "Failed to resolve preview url",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Preview URL resolution error types.
#[derive(Debug, Error)]
pub enum PreviewUrlError {
    /// An allow pattern accepts any hostname
    #[error("It's insecure to allow any hostname, it could disclose data to a malicious site: {pattern}")]
    InsecurePattern {
        /// The offending pattern.
        pattern: String,
    },

    /// An allow pattern could not be compiled
    #[error("Invalid allow pattern {pattern:?}: {reason}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A configured or resolved URL could not be parsed
    #[error("Invalid URL {input:?}: {source}")]
    InvalidUrl {
        /// The input that failed to parse.
        input: String,
        /// Parser error.
        #[source]
        source: url::ParseError,
    },

    /// A composed preview URL points outside the trusted origins
    #[error("Preview url origin is not allowed: {origin}")]
    UntrustedOrigin {
        /// Offending origin.
        origin: String,
    },

    /// The preview URL was requested without a resolved preview mode
    #[error("Resolved preview mode is missing")]
    MissingPreviewMode,

    /// A context field a stage depends on was never resolved
    #[error("Missing {0} in resolution context")]
    MissingContext(&'static str),

    /// An operator-supplied resolver failed
    #[error("Resolver failed: {0}")]
    Callback(#[source] BoxError),

    /// A permission stream errored
    #[error("Permission check failed: {0}")]
    Permission(#[source] BoxError),

    /// Secret issuance failed
    #[error("Secret issuance failed: {0}")]
    Secret(#[from] AuthError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The machine task is no longer running
    #[error("Preview URL machine has stopped")]
    Stopped,

    /// A failure tagged with the step it happened in
    #[error("{stage}: {source}")]
    Stage {
        /// Failed step.
        stage: Stage,
        /// Underlying failure.
        #[source]
        source: Box<PreviewUrlError>,
    },
}

/// Result type for preview URL resolution.
pub type PreviewUrlResult<T> = Result<T, PreviewUrlError>;

impl PreviewUrlError {
    /// Tag an error with the step it happened in.
    pub fn in_stage(self, stage: Stage) -> Self {
        PreviewUrlError::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// Build an [`PreviewUrlError::InvalidUrl`].
    pub fn invalid_url(input: impl Into<String>, source: url::ParseError) -> Self {
        PreviewUrlError::InvalidUrl {
            input: input.into(),
            source,
        }
    }

    /// The step the error was tagged with, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PreviewUrlError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The error with any stage tags removed.
    pub fn root(&self) -> &PreviewUrlError {
        match self {
            PreviewUrlError::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// Check if this error comes from operator configuration rather than an
    /// upstream service.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self.root(),
            PreviewUrlError::InsecurePattern { .. }
                | PreviewUrlError::InvalidPattern { .. }
                | PreviewUrlError::InvalidUrl { .. }
                | PreviewUrlError::UntrustedOrigin { .. }
                | PreviewUrlError::Config(_)
        )
    }

    /// Get error code for host notifications.
    pub fn error_code(&self) -> &'static str {
        match self.root() {
            PreviewUrlError::InsecurePattern { .. } => "INSECURE_PATTERN",
            PreviewUrlError::InvalidPattern { .. } => "INVALID_PATTERN",
            PreviewUrlError::InvalidUrl { .. } => "INVALID_URL",
            PreviewUrlError::UntrustedOrigin { .. } => "UNTRUSTED_ORIGIN",
            PreviewUrlError::MissingPreviewMode => "MISSING_PREVIEW_MODE",
            PreviewUrlError::MissingContext(_) => "MISSING_CONTEXT",
            PreviewUrlError::Callback(_) => "RESOLVER_FAILED",
            PreviewUrlError::Permission(_) => "PERMISSION_CHECK_FAILED",
            PreviewUrlError::Secret(e) => e.error_code(),
            PreviewUrlError::Config(_) => "CONFIG_ERROR",
            PreviewUrlError::Stopped => "STOPPED",
            PreviewUrlError::Stage { .. } => "INTERNAL_ERROR",
        }
    }
}
