//! Machine states, tags and the snapshot hosts bind to.

use std::sync::Arc;

use url::Url;

use preview_auth::PreviewUrlSecret;
use preview_rbac::{GrantKind, PermissionCheckResult};

use crate::actors::SecretAccess;
use crate::error::PreviewUrlError;
use crate::options::PreviewMode;
use crate::pattern::OriginPattern;

/// Top-level machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MachineState {
    /// Waiting for all four permission results
    CheckingPermissions,
    /// Resolving the default destination
    ResolvingInitialUrl,
    /// Resolving the allow list
    ResolvingAllowPatterns,
    /// Validating the navigation target, the re-entry point on origin change
    ResolvingUrlFromPreviewSearchParam,
    /// Resolving preview mode for the target origin
    ResolvingPreviewMode,
    /// Preview mode session
    PreviewMode(PreviewModeState),
    /// Resolved without preview mode, or degraded
    Success,
    /// Terminal failure
    Error,
}

/// Substates of [`MachineState::PreviewMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreviewModeState {
    /// Creating a short-lived secret
    CreatePreviewSecret,
    /// Reading the shared secret
    ReadShareAccess,
    /// Composing the preview URL
    ResolvePreviewUrl,
    /// Resolved, waiting for secret expiry
    Success,
    /// Terminal failure
    Error,
}

/// Tags hosts render indicators from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// A unit of work is in flight
    Busy,
    /// The machine failed
    Error,
}

impl MachineState {
    /// Tag of this state, if any.
    pub fn tag(&self) -> Option<Tag> {
        match self {
            MachineState::CheckingPermissions
            | MachineState::ResolvingInitialUrl
            | MachineState::ResolvingAllowPatterns
            | MachineState::ResolvingUrlFromPreviewSearchParam
            | MachineState::ResolvingPreviewMode
            | MachineState::PreviewMode(PreviewModeState::CreatePreviewSecret)
            | MachineState::PreviewMode(PreviewModeState::ReadShareAccess)
            | MachineState::PreviewMode(PreviewModeState::ResolvePreviewUrl) => Some(Tag::Busy),
            MachineState::Error | MachineState::PreviewMode(PreviewModeState::Error) => {
                Some(Tag::Error)
            }
            MachineState::Success | MachineState::PreviewMode(PreviewModeState::Success) => None,
        }
    }

    /// Check if a navigation target on a new origin re-runs resolution here.
    pub fn accepts_target_change(&self) -> bool {
        matches!(
            self,
            MachineState::ResolvingPreviewMode
                | MachineState::Success
                | MachineState::PreviewMode(
                    PreviewModeState::CreatePreviewSecret
                        | PreviewModeState::ReadShareAccess
                        | PreviewModeState::ResolvePreviewUrl
                        | PreviewModeState::Success
                )
        )
    }

    /// Check if the state is terminal.
    pub fn is_final(&self) -> bool {
        self.tag() == Some(Tag::Error)
    }
}

impl std::fmt::Display for MachineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MachineState::CheckingPermissions => f.write_str("checkingPermissions"),
            MachineState::ResolvingInitialUrl => f.write_str("resolvingInitialUrl"),
            MachineState::ResolvingAllowPatterns => f.write_str("resolvingAllowPatterns"),
            MachineState::ResolvingUrlFromPreviewSearchParam => {
                f.write_str("resolvingUrlFromPreviewSearchParam")
            }
            MachineState::ResolvingPreviewMode => f.write_str("resolvingPreviewMode"),
            MachineState::PreviewMode(sub) => {
                let sub = match sub {
                    PreviewModeState::CreatePreviewSecret => "createPreviewSecret",
                    PreviewModeState::ReadShareAccess => "readShareAccess",
                    PreviewModeState::ResolvePreviewUrl => "resolvePreviewUrl",
                    PreviewModeState::Success => "success",
                    PreviewModeState::Error => "error",
                };
                write!(f, "previewMode.{}", sub)
            }
            MachineState::Success => f.write_str("success"),
            MachineState::Error => f.write_str("error"),
        }
    }
}

/// Latest result of each permission stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionResults {
    /// Read on the share-access singleton.
    pub read_share_access: Option<PermissionCheckResult>,
    /// Create on the share-access singleton.
    pub create_share_access: Option<PermissionCheckResult>,
    /// Update on the share-access singleton.
    pub update_share_access: Option<PermissionCheckResult>,
    /// Create on a preview secret document.
    pub create_preview_secret: Option<PermissionCheckResult>,
}

impl PermissionResults {
    /// Result for a grant kind.
    pub fn get(&self, kind: GrantKind) -> Option<&PermissionCheckResult> {
        match kind {
            GrantKind::ReadShareAccess => self.read_share_access.as_ref(),
            GrantKind::CreateShareAccess => self.create_share_access.as_ref(),
            GrantKind::UpdateShareAccess => self.update_share_access.as_ref(),
            GrantKind::CreatePreviewSecret => self.create_preview_secret.as_ref(),
        }
    }

    /// Record a result for a grant kind.
    pub fn set(&mut self, kind: GrantKind, result: PermissionCheckResult) {
        let slot = match kind {
            GrantKind::ReadShareAccess => &mut self.read_share_access,
            GrantKind::CreateShareAccess => &mut self.create_share_access,
            GrantKind::UpdateShareAccess => &mut self.update_share_access,
            GrantKind::CreatePreviewSecret => &mut self.create_preview_secret,
        };
        *slot = Some(result);
    }

    /// Check if every stream has reported.
    pub fn all_known(&self) -> bool {
        GrantKind::ALL.iter().all(|kind| self.get(*kind).is_some())
    }

    /// `Some(true)`/`Some(false)` once known, `None` before.
    pub fn granted(&self, kind: GrantKind) -> Option<bool> {
        self.get(kind).map(|result| result.granted)
    }

    /// Which secret may be attached, unknown grants counting as denied.
    pub fn secret_access(&self) -> SecretAccess {
        SecretAccess::from_grants(
            self.granted(GrantKind::CreatePreviewSecret) == Some(true),
            self.granted(GrantKind::ReadShareAccess) == Some(true),
        )
    }
}

/// Snapshot of the resolution context.
#[derive(Debug, Clone)]
pub struct PreviewUrlSnapshot {
    /// Current state.
    pub state: MachineState,
    /// Resolved base destination, without preview mode.
    pub initial_url: Option<Url>,
    /// The authorized URL to load.
    pub preview_url: Option<Url>,
    /// Trusted origins, `None` before the first resolution.
    pub allow_origins: Option<Vec<OriginPattern>>,
    /// Last caller-requested navigation target.
    pub preview_search_param: Option<String>,
    /// Secret attached to the preview URL.
    pub preview_url_secret: Option<PreviewUrlSecret>,
    /// Permission stream results.
    pub permissions: PermissionResults,
    /// Resolved preview mode, `None` when disabled or unusable.
    pub preview_mode: Option<PreviewMode>,
    /// First fatal failure.
    pub error: Option<Arc<PreviewUrlError>>,
}

impl PreviewUrlSnapshot {
    pub(crate) fn new(preview_search_param: Option<String>) -> Self {
        Self {
            state: MachineState::CheckingPermissions,
            initial_url: None,
            preview_url: None,
            allow_origins: None,
            preview_search_param,
            preview_url_secret: None,
            permissions: PermissionResults::default(),
            preview_mode: None,
            error: None,
        }
    }

    /// Check if the current state carries `tag`.
    pub fn has_tag(&self, tag: Tag) -> bool {
        self.state.tag() == Some(tag)
    }

    /// Check if a unit of work is in flight.
    pub fn is_busy(&self) -> bool {
        self.has_tag(Tag::Busy)
    }

    /// Check if the machine failed.
    pub fn is_error(&self) -> bool {
        self.has_tag(Tag::Error)
    }

    /// Check if the machine is in `state`.
    pub fn matches(&self, state: MachineState) -> bool {
        self.state == state
    }

    /// Check if the machine is anywhere inside the preview mode session.
    pub fn in_preview_mode(&self) -> bool {
        matches!(self.state, MachineState::PreviewMode(_))
    }

    /// Check if the user may turn shared access on and off.
    pub fn can_toggle_share_access(&self) -> bool {
        self.permissions.granted(GrantKind::CreateShareAccess) == Some(true)
            && self.permissions.granted(GrantKind::UpdateShareAccess) == Some(true)
    }

    /// Check if the preview can be shared through the shared secret.
    pub fn can_use_shared_access(&self) -> bool {
        self.permissions.granted(GrantKind::ReadShareAccess) == Some(true)
            && self.preview_mode.as_ref().is_some_and(|mode| mode.share_access)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags() {
        assert_eq!(MachineState::CheckingPermissions.tag(), Some(Tag::Busy));
        assert_eq!(
            MachineState::PreviewMode(PreviewModeState::ResolvePreviewUrl).tag(),
            Some(Tag::Busy)
        );
        assert_eq!(MachineState::Success.tag(), None);
        assert_eq!(
            MachineState::PreviewMode(PreviewModeState::Error).tag(),
            Some(Tag::Error)
        );
        assert!(MachineState::Error.is_final());
    }

    #[test]
    fn test_target_change_acceptance() {
        assert!(!MachineState::CheckingPermissions.accepts_target_change());
        assert!(!MachineState::ResolvingUrlFromPreviewSearchParam.accepts_target_change());
        assert!(MachineState::ResolvingPreviewMode.accepts_target_change());
        assert!(MachineState::Success.accepts_target_change());
        assert!(MachineState::PreviewMode(PreviewModeState::Success).accepts_target_change());
        assert!(!MachineState::PreviewMode(PreviewModeState::Error).accepts_target_change());
    }

    #[test]
    fn test_permission_results() {
        let mut results = PermissionResults::default();
        assert!(!results.all_known());

        for kind in GrantKind::ALL {
            results.set(kind, PermissionCheckResult::granted("Matching grant"));
        }
        results.set(
            GrantKind::CreatePreviewSecret,
            PermissionCheckResult::denied("No matching grants found"),
        );

        assert!(results.all_known());
        assert_eq!(results.granted(GrantKind::ReadShareAccess), Some(true));
        assert_eq!(results.granted(GrantKind::CreatePreviewSecret), Some(false));
        assert_eq!(results.secret_access(), SecretAccess::ReadShared);
    }

    #[test]
    fn test_share_capabilities() {
        let mut snapshot = PreviewUrlSnapshot::new(None);
        assert!(!snapshot.can_toggle_share_access());
        assert!(!snapshot.can_use_shared_access());

        for kind in GrantKind::ALL {
            snapshot
                .permissions
                .set(kind, PermissionCheckResult::granted("Matching grant"));
        }
        assert!(snapshot.can_toggle_share_access());
        assert!(!snapshot.can_use_shared_access());

        snapshot.preview_mode = Some(PreviewMode {
            enable: "/api/enable".to_string(),
            share_access: true,
        });
        assert!(snapshot.can_use_shared_access());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            MachineState::PreviewMode(PreviewModeState::CreatePreviewSecret).to_string(),
            "previewMode.createPreviewSecret"
        );
        assert_eq!(MachineState::Success.to_string(), "success");
    }
}
