//! # Preview RBAC
//!
//! Grant model for live preview sessions.
//!
//! ## Overview
//!
//! The preview-rbac crate handles:
//! - **Actions**: Operations a user may perform on preview resources
//! - **Resources**: The share-access singleton and preview URL secret documents
//! - **Permissions**: Resource + Action combinations, and permission sets
//! - **Grant Kinds**: The four grants a preview session depends on
//! - **Checkers**: Streams of permission results that can change over time
//!
//! ## Architecture
//!
//! ```text
//! Permission = Resource + Action
//!
//! Grants checked by a preview session:
//!   "preview_access_sharing:read"    - use a shared preview secret
//!   "preview_access_sharing:create"  - enable sharing
//!   "preview_access_sharing:update"  - toggle sharing
//!   "preview_url_secret:create"      - issue short-lived secrets
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use preview_rbac::{Action, GrantKind, Permission, PermissionChecker, ResourceType, StaticPermissionChecker};
//!
//! async fn example() {
//!     let checker = StaticPermissionChecker::new();
//!     checker.grant(Permission::new(ResourceType::PreviewUrlSecret, Action::Create));
//!
//!     let grant = GrantKind::CreatePreviewSecret;
//!     let mut results = checker.check_permission(grant.action(), &grant.resource_descriptor());
//!     let first = results.next().await.unwrap().unwrap();
//!     assert!(first.granted);
//! }
//! ```
//!
//! ## Action Implications
//!
//! - `Manage` implies all actions
//! - `Create` and `Update` imply `Read`

pub mod actions;
pub mod checker;
pub mod permissions;
pub mod resources;

// Re-export main types for convenience
pub use actions::Action;
pub use checker::{BoxError, PermissionChecker, PermissionStream, StaticPermissionChecker};
pub use permissions::{GrantKind, Permission, PermissionCheckResult, PermissionSet};
pub use resources::{ResourceDescriptor, ResourceType};
