//! # Resource Types
//!
//! The documents a preview session checks grants against.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Document id of the share-access singleton.
pub const SHARE_ACCESS_SINGLETON_ID: &str = "sanity-preview-url-secret.share-access";

/// Document type of the share-access singleton.
pub const SHARE_ACCESS_DOCUMENT_TYPE: &str = "sanity.previewUrlShareAccess";

/// Document type of a preview URL secret.
pub const PREVIEW_URL_SECRET_DOCUMENT_TYPE: &str = "sanity.previewUrlSecret";

/// Resource types that can have permissions assigned.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// The singleton that publishes a long-lived shared preview secret.
    PreviewAccessSharing,
    /// Short-lived preview URL secret documents.
    PreviewUrlSecret,
}

impl ResourceType {
    /// Get the string representation of the resource type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::PreviewAccessSharing => "preview_access_sharing",
            ResourceType::PreviewUrlSecret => "preview_url_secret",
        }
    }

    /// Parse resource type from string representation.
    ///
    /// Accepts both the snake_case name and the document type.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "preview_access_sharing" | SHARE_ACCESS_DOCUMENT_TYPE => {
                Some(ResourceType::PreviewAccessSharing)
            }
            "preview_url_secret" | PREVIEW_URL_SECRET_DOCUMENT_TYPE => {
                Some(ResourceType::PreviewUrlSecret)
            }
            _ => None,
        }
    }

    /// The document type backing this resource.
    pub fn document_type(&self) -> &'static str {
        match self {
            ResourceType::PreviewAccessSharing => SHARE_ACCESS_DOCUMENT_TYPE,
            ResourceType::PreviewUrlSecret => PREVIEW_URL_SECRET_DOCUMENT_TYPE,
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the document a permission is checked against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ResourceDescriptor {
    /// Document id.
    #[serde(rename = "_id")]
    pub id: String,

    /// Document type.
    #[serde(rename = "_type")]
    pub doc_type: String,
}

impl ResourceDescriptor {
    /// Create a descriptor.
    pub fn new(id: impl Into<String>, doc_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            doc_type: doc_type.into(),
        }
    }

    /// The share-access singleton document.
    pub fn share_access_singleton() -> Self {
        Self::new(SHARE_ACCESS_SINGLETON_ID, SHARE_ACCESS_DOCUMENT_TYPE)
    }

    /// A not-yet-created preview URL secret draft.
    ///
    /// Each call yields a fresh id, so the check reflects the right to
    /// create *new* secret documents rather than access to an existing one.
    pub fn new_preview_secret() -> Self {
        Self::new(
            format!("drafts.{}", Uuid::new_v4()),
            PREVIEW_URL_SECRET_DOCUMENT_TYPE,
        )
    }

    /// Resolve the resource type from the document type.
    pub fn resource_type(&self) -> Option<ResourceType> {
        ResourceType::parse(&self.doc_type)
    }
}
