//! # Permission Checkers
//!
//! A permission check is not a one-shot answer: grants can change while a
//! preview session is open, so a checker returns a stream that emits a new
//! [`PermissionCheckResult`] whenever the outcome changes.

use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use tokio::sync::watch;

use crate::actions::Action;
use crate::permissions::{Permission, PermissionCheckResult, PermissionSet};
use crate::resources::ResourceDescriptor;

/// Boxed error type used by stream-based collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Stream of permission results for one check.
///
/// Emits zero or more results and may end with an error.
pub type PermissionStream = BoxStream<'static, Result<PermissionCheckResult, BoxError>>;

/// Source of live permission results.
///
/// Closures with the matching signature implement this trait, which makes
/// it easy to substitute a checker in tests.
pub trait PermissionChecker: Send + Sync {
    /// Check whether the current user may perform `action` on `resource`.
    fn check_permission(&self, action: Action, resource: &ResourceDescriptor) -> PermissionStream;
}

impl<F> PermissionChecker for F
where
    F: Fn(Action, &ResourceDescriptor) -> PermissionStream + Send + Sync,
{
    fn check_permission(&self, action: Action, resource: &ResourceDescriptor) -> PermissionStream {
        self(action, resource)
    }
}

/// In-memory checker backed by a mutable [`PermissionSet`].
///
/// Every stream returned by [`check_permission`](PermissionChecker::check_permission)
/// emits the current outcome immediately and then again each time a grant
/// change flips it. Streams end when the last clone of the checker is dropped.
///
/// # Example
///
/// ```rust,no_run
/// use preview_rbac::{Action, Permission, ResourceType, StaticPermissionChecker};
///
/// let checker = StaticPermissionChecker::new();
/// checker.grant(Permission::new(ResourceType::PreviewAccessSharing, Action::Read));
/// checker.revoke(&Permission::new(ResourceType::PreviewAccessSharing, Action::Read));
/// ```
#[derive(Debug, Clone)]
pub struct StaticPermissionChecker {
    grants: Arc<watch::Sender<PermissionSet>>,
}

impl StaticPermissionChecker {
    /// Create a checker that grants nothing.
    pub fn new() -> Self {
        Self::with_permissions(PermissionSet::new())
    }

    /// Create a checker holding the given permissions.
    pub fn with_permissions(permissions: PermissionSet) -> Self {
        let (grants, _) = watch::channel(permissions);
        Self {
            grants: Arc::new(grants),
        }
    }

    /// Create a checker that grants every preview grant.
    pub fn allow_all() -> Self {
        Self::with_permissions(PermissionSet::all_preview_grants())
    }

    /// Add a permission. Open streams observe the change.
    pub fn grant(&self, permission: Permission) {
        self.grants.send_modify(|set| set.add(permission));
    }

    /// Remove a permission. Open streams observe the change.
    pub fn revoke(&self, permission: &Permission) {
        self.grants.send_modify(|set| {
            set.remove(permission);
        });
    }

    /// Replace all permissions at once.
    pub fn set_permissions(&self, permissions: PermissionSet) {
        self.grants.send_replace(permissions);
    }

    /// Snapshot of the current permissions.
    pub fn permissions(&self) -> PermissionSet {
        self.grants.borrow().clone()
    }

    fn evaluate(
        permissions: &PermissionSet,
        action: Action,
        resource: &ResourceDescriptor,
    ) -> PermissionCheckResult {
        match resource.resource_type() {
            Some(resource_type) if permissions.has(&Permission::new(resource_type, action)) => {
                PermissionCheckResult::granted("Matching grant")
            }
            Some(_) => PermissionCheckResult::denied("No matching grants found"),
            None => PermissionCheckResult::denied(format!(
                "Unknown document type: {}",
                resource.doc_type
            )),
        }
    }
}

impl Default for StaticPermissionChecker {
    fn default() -> Self {
        Self::new()
    }
}

struct CheckState {
    receiver: watch::Receiver<PermissionSet>,
    last: Option<PermissionCheckResult>,
}

impl PermissionChecker for StaticPermissionChecker {
    fn check_permission(&self, action: Action, resource: &ResourceDescriptor) -> PermissionStream {
        let resource = resource.clone();
        let state = CheckState {
            receiver: self.grants.subscribe(),
            last: None,
        };

        stream::unfold(state, move |mut state| {
            let resource = resource.clone();
            async move {
                loop {
                    if state.last.is_some() && state.receiver.changed().await.is_err() {
                        return None;
                    }
                    let result = {
                        let permissions = state.receiver.borrow_and_update();
                        Self::evaluate(&permissions, action, &resource)
                    };
                    if state.last.as_ref() != Some(&result) {
                        state.last = Some(result.clone());
                        return Some((Ok(result), state));
                    }
                }
            }
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::GrantKind;
    use crate::resources::ResourceType;

    #[tokio::test]
    async fn test_emits_current_outcome_first() {
        let checker = StaticPermissionChecker::allow_all();
        let grant = GrantKind::CreatePreviewSecret;
        let mut stream = checker.check_permission(grant.action(), &grant.resource_descriptor());

        let result = stream.next().await.unwrap().unwrap();
        assert!(result.granted);
        assert_eq!(result.reason, "Matching grant");
    }

    #[tokio::test]
    async fn test_emits_on_revocation() {
        let checker = StaticPermissionChecker::allow_all();
        let grant = GrantKind::ReadShareAccess;
        let mut stream = checker.check_permission(grant.action(), &grant.resource_descriptor());
        assert!(stream.next().await.unwrap().unwrap().granted);

        // Create/Update still imply Read, so revoke everything on the resource
        checker.set_permissions(PermissionSet::from_iter([Permission::new(
            ResourceType::PreviewUrlSecret,
            Action::Create,
        )]));

        let result = stream.next().await.unwrap().unwrap();
        assert!(!result.granted);
        assert_eq!(result.reason, "No matching grants found");
    }

    #[tokio::test]
    async fn test_unchanged_outcome_is_not_repeated() {
        let checker = StaticPermissionChecker::new();
        let grant = GrantKind::CreatePreviewSecret;
        let mut stream = checker.check_permission(grant.action(), &grant.resource_descriptor());
        assert!(!stream.next().await.unwrap().unwrap().granted);

        // Unrelated grant, then the relevant one
        checker.grant(Permission::new(ResourceType::PreviewAccessSharing, Action::Read));
        checker.grant(grant.permission());

        let result = stream.next().await.unwrap().unwrap();
        assert!(result.granted);
    }

    #[tokio::test]
    async fn test_stream_ends_when_checker_dropped() {
        let checker = StaticPermissionChecker::new();
        let grant = GrantKind::UpdateShareAccess;
        let mut stream = checker.check_permission(grant.action(), &grant.resource_descriptor());
        assert!(stream.next().await.is_some());

        drop(checker);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_document_type_is_denied() {
        let checker = StaticPermissionChecker::allow_all();
        let mut stream =
            checker.check_permission(Action::Read, &ResourceDescriptor::new("doc", "article"));
        let result = stream.next().await.unwrap().unwrap();
        assert!(!result.granted);
        assert!(result.reason.contains("article"));
    }

    #[tokio::test]
    async fn test_closure_checker() {
        let checker = |_: Action, _: &ResourceDescriptor| -> PermissionStream {
            stream::iter([Ok(PermissionCheckResult::denied("nope"))]).boxed()
        };
        let mut stream = checker.check_permission(Action::Read, &ResourceDescriptor::share_access_singleton());
        assert!(!stream.next().await.unwrap().unwrap().granted);
        assert!(stream.next().await.is_none());
    }
}
