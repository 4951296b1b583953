//! # Actions
//!
//! Operations that can be performed on preview resources.

use serde::{Deserialize, Serialize};

/// Actions that can be performed on preview resources.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Read/view a resource.
    ///
    /// On the share-access singleton this allows using a shared secret.
    Read,

    /// Create a new resource.
    ///
    /// On preview URL secrets this allows issuing short-lived secrets.
    Create,

    /// Update an existing resource.
    Update,

    /// Full administrative access. Implies every other action.
    Manage,
}

impl Action {
    /// Get the string representation of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Manage => "manage",
        }
    }

    /// Parse action from string representation.
    ///
    /// # Arguments
    ///
    /// * `s` - String to parse (case-insensitive, supports aliases)
    ///
    /// # Example
    ///
    /// ```
    /// use preview_rbac::actions::Action;
    ///
    /// assert_eq!(Action::parse("read"), Some(Action::Read));
    /// assert_eq!(Action::parse("view"), Some(Action::Read));
    /// assert_eq!(Action::parse("write"), Some(Action::Update));
    /// assert_eq!(Action::parse("invalid"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "read" | "view" | "get" => Some(Action::Read),
            "create" | "add" | "new" => Some(Action::Create),
            "update" | "edit" | "write" => Some(Action::Update),
            "manage" | "admin" => Some(Action::Manage),
            _ => None,
        }
    }

    /// Check whether holding this action also grants `other`.
    ///
    /// # Example
    ///
    /// ```
    /// use preview_rbac::actions::Action;
    ///
    /// assert!(Action::Manage.implies(Action::Create));
    /// assert!(Action::Update.implies(Action::Read));
    /// assert!(!Action::Read.implies(Action::Create));
    /// ```
    pub fn implies(&self, other: Action) -> bool {
        match self {
            Action::Manage => other != Action::Manage,
            Action::Create | Action::Update => other == Action::Read,
            Action::Read => false,
        }
    }

    /// All actions, in declaration order.
    pub fn all() -> &'static [Action] {
        &[Action::Read, Action::Create, Action::Update, Action::Manage]
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
