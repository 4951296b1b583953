//! Event types for preview notifications
//!
//! This module defines the envelope every notification travels in and the
//! typed events a preview session publishes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Source segment of every preview topic.
pub const PREVIEW_SOURCE: &str = "preview";

/// Notification envelope.
///
/// All events are wrapped in this envelope which provides metadata
/// for routing and correlation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event ID
    pub id: Uuid,

    /// Event type (e.g., "url.resolved", "mode.degraded")
    pub event_type: String,

    /// Emitting component
    pub source: String,

    /// Timestamp when event was created
    pub timestamp: DateTime<Utc>,

    /// How prominently a host should surface the event
    pub severity: Severity,

    /// Preview session that emitted the event
    pub session_id: Option<Uuid>,

    /// Event payload
    pub payload: serde_json::Value,

    /// Additional metadata
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Event {
    /// Create a new event.
    ///
    /// # Arguments
    ///
    /// * `event_type` - The event type string
    /// * `source` - The emitting component
    /// * `payload` - The event payload
    pub fn new(
        event_type: impl Into<String>,
        source: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            event_type: event_type.into(),
            source: source.into(),
            timestamp: Utc::now(),
            severity: Severity::Info,
            session_id: None,
            payload,
            metadata: HashMap::new(),
        }
    }

    /// Set severity.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Set session context.
    pub fn with_session(mut self, session_id: Uuid) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Add metadata.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Get the topic for this event.
    ///
    /// Topics are structured as: `{source}.{event_type}`
    pub fn topic(&self) -> String {
        format!("{}.{}", self.source, self.event_type)
    }

    /// Parse the payload into a specific type.
    pub fn parse_payload<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Notification severity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Progress information
    Info,
    /// Something will probably not work as expected
    Warning,
    /// The session cannot continue
    Error,
}

/// How a preview secret was obtained.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SecretStrategy {
    /// A short-lived secret was created for this session
    Create,
    /// The long-lived shared secret was read
    Shared,
}

impl SecretStrategy {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretStrategy::Create => "create",
            SecretStrategy::Shared => "shared",
        }
    }
}

/// Notifications published by a preview session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PreviewEvent {
    /// A preview URL was resolved
    UrlResolved {
        preview_url: String,
        initial_url: String,
        preview_mode: bool,
    },
    /// A preview secret was obtained
    SecretIssued {
        strategy: SecretStrategy,
        fingerprint: Option<String>,
        expires_at: DateTime<Utc>,
    },
    /// Preview mode is configured but no secret can be obtained
    ModeDegraded {
        initial_url: String,
        message: String,
    },
    /// A navigation target outside the allow list was ignored
    NavigationRejected { origin: String },
    /// Resolution failed
    MachineFailed { stage: String, message: String },
}

impl PreviewEvent {
    /// Message attached to [`PreviewEvent::ModeDegraded`].
    pub const DEGRADED_MESSAGE: &'static str = "Missing permissions to create preview secret, or read shared preview secret. Preview will likely fail loading.";

    /// Event type, without the source segment.
    pub fn event_type(&self) -> &'static str {
        match self {
            PreviewEvent::UrlResolved { .. } => "url.resolved",
            PreviewEvent::SecretIssued { .. } => "secret.issued",
            PreviewEvent::ModeDegraded { .. } => "mode.degraded",
            PreviewEvent::NavigationRejected { .. } => "navigation.rejected",
            PreviewEvent::MachineFailed { .. } => "machine.failed",
        }
    }

    /// Severity hosts should surface the event with.
    pub fn severity(&self) -> Severity {
        match self {
            PreviewEvent::UrlResolved { .. } | PreviewEvent::SecretIssued { .. } => Severity::Info,
            PreviewEvent::ModeDegraded { .. } | PreviewEvent::NavigationRejected { .. } => {
                Severity::Warning
            }
            PreviewEvent::MachineFailed { .. } => Severity::Error,
        }
    }

    /// Convert to generic event.
    pub fn to_event(&self) -> Event {
        let payload = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        Event::new(self.event_type(), PREVIEW_SOURCE, payload).with_severity(self.severity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let event = Event::new("url.resolved", PREVIEW_SOURCE, serde_json::json!({}));
        assert_eq!(event.severity, Severity::Info);
        assert!(event.session_id.is_none());
    }

    #[test]
    fn test_event_topic() {
        let event = PreviewEvent::NavigationRejected {
            origin: "https://example.com".to_string(),
        }
        .to_event();
        assert_eq!(event.topic(), "preview.navigation.rejected");
        assert_eq!(event.severity, Severity::Warning);
    }

    #[test]
    fn test_payload_round_trip() {
        let typed = PreviewEvent::ModeDegraded {
            initial_url: "http://localhost:3000/".to_string(),
            message: PreviewEvent::DEGRADED_MESSAGE.to_string(),
        };
        let event = typed.to_event();

        assert_eq!(event.payload["type"], "mode_degraded");
        assert!(event.payload["message"]
            .as_str()
            .unwrap()
            .contains("will likely fail"));
        assert_eq!(event.parse_payload::<PreviewEvent>().unwrap(), typed);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Error > Severity::Warning);
        assert_eq!(
            PreviewEvent::MachineFailed {
                stage: "Failed to resolve initial url".to_string(),
                message: "boom".to_string(),
            }
            .severity(),
            Severity::Error
        );
    }

    #[test]
    fn test_session_metadata() {
        let session = Uuid::now_v7();
        let event = Event::new("url.resolved", PREVIEW_SOURCE, serde_json::Value::Null)
            .with_session(session)
            .with_metadata("attempt", serde_json::json!(2));
        assert_eq!(event.session_id, Some(session));
        assert_eq!(event.metadata["attempt"], 2);
    }
}
