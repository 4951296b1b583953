//! # Preview Events
//!
//! This crate carries host-visible notifications out of a live preview
//! session: resolved URLs, issued secrets, degraded permissions and failures.
//!
//! ## Overview
//!
//! The preview-events crate handles:
//! - **Event Envelope**: [`Event`] with id, topic, timestamp and JSON payload
//! - **Preview Events**: The typed [`PreviewEvent`] notifications
//! - **Event Bus**: In-process publish/subscribe with topic patterns
//! - **Event Handlers**: Async callbacks for hosts that prefer push delivery
//!
//! ## Usage
//!
//! ```rust,no_run
//! use preview_events::{EventBus, MemoryEventBus, PreviewEvent};
//!
//! async fn example() {
//!     let bus = MemoryEventBus::new();
//!
//!     // Watch for every preview warning and failure
//!     let mut sub = bus.subscribe("preview.mode.*").await.unwrap();
//!
//!     let event = PreviewEvent::ModeDegraded {
//!         initial_url: "http://localhost:3000/".to_string(),
//!         message: PreviewEvent::DEGRADED_MESSAGE.to_string(),
//!     };
//!     bus.publish(event.to_event()).await.unwrap();
//!
//!     let received = sub.recv().await.unwrap();
//!     assert_eq!(received.topic(), "preview.mode.degraded");
//! }
//! ```
//!
//! ## Topic Patterns
//!
//! Topics are structured as `{source}.{event_type}`:
//! - `preview.url.resolved` - Specific event
//! - `preview.mode.*` - All preview mode events
//! - `#` - All events
//!
//! Wildcards:
//! - `*` matches exactly one segment
//! - `#` matches zero or more segments

pub mod bus;
pub mod types;

// Re-export main types
pub use bus::{
    topic_matches, EventBus, EventBusError, EventBusResult, EventBusStats, EventHandler,
    MemoryEventBus, Subscription,
};
pub use types::{Event, PreviewEvent, Severity, SecretStrategy};
