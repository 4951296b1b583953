//! # Resolution State Machine
//!
//! [`PreviewUrlMachine`] sequences the resolvers into the authorized preview
//! URL and keeps it current while the embedded page navigates.
//!
//! ## Lifecycle
//!
//! 1. The machine subscribes to the four permission streams and waits until
//!    every one has reported.
//! 2. It resolves the initial URL, the allow list and the navigation target.
//! 3. It resolves preview mode for the target origin and, when permitted,
//!    obtains a secret and composes the preview mode URL.
//! 4. In the resolved states it accepts [`PreviewUrlEvent::TargetChanged`];
//!    a target on a new origin re-runs steps 2-3 from the navigation target.
//!
//! Created secrets are renewed when they expire, provided the create grant
//! still holds. Any resolver failure is terminal.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use preview_auth::{InMemorySecretStore, SecretSettings};
//! use preview_rbac::StaticPermissionChecker;
//! use preview_url::{
//!     ConfiguredResolvers, PreviewModeSettings, PreviewSettings, PreviewUrlEvent,
//!     PreviewUrlMachine, PreviewUrlOptions,
//! };
//!
//! async fn example() -> preview_url::PreviewUrlResult<()> {
//!     let store = Arc::new(InMemorySecretStore::new(SecretSettings::default()));
//!     let resolvers = ConfiguredResolvers::new(PreviewSettings::default(), store).with_preview_url(
//!         PreviewUrlOptions::new()
//!             .initial("http://localhost:3000")
//!             .preview_mode(PreviewModeSettings::new("/api/draft-mode/enable")),
//!     );
//!
//!     let machine = PreviewUrlMachine::builder(
//!         Arc::new(resolvers),
//!         Arc::new(StaticPermissionChecker::allow_all()),
//!     )
//!     .start(None);
//!
//!     let snapshot = machine.wait_for(|s| s.preview_url.is_some() && !s.is_busy()).await?;
//!     println!("Preview at {:?}", snapshot.preview_url);
//!
//!     machine.send(PreviewUrlEvent::target_changed("/blog")).await?;
//!     Ok(())
//! }
//! ```

mod runtime;
mod state;

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use preview_events::EventBus;
use preview_rbac::PermissionChecker;

use crate::actors::Resolvers;
use crate::config::{PreviewSettings, DEFAULT_SHARED_SECRET_TTL_SECS};
use crate::error::{PreviewUrlError, PreviewUrlResult};

use runtime::{Command, Runtime};

pub use state::{MachineState, PermissionResults, PreviewModeState, PreviewUrlSnapshot, Tag};

const COMMAND_BUFFER: usize = 32;

/// Events the host sends to the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewUrlEvent {
    /// The embedded page asked to show another location.
    TargetChanged {
        /// Requested target, relative or absolute. `None` clears it.
        preview_search_param: Option<String>,
    },
}

impl PreviewUrlEvent {
    /// Navigation to `target`.
    pub fn target_changed(target: impl Into<String>) -> Self {
        PreviewUrlEvent::TargetChanged {
            preview_search_param: Some(target.into()),
        }
    }

    /// Clear the navigation target.
    pub fn target_cleared() -> Self {
        PreviewUrlEvent::TargetChanged {
            preview_search_param: None,
        }
    }
}

/// Builder for [`PreviewUrlMachine`].
pub struct PreviewUrlMachineBuilder {
    resolvers: Arc<dyn Resolvers>,
    checker: Arc<dyn PermissionChecker>,
    bus: Option<Arc<dyn EventBus>>,
    shared_secret_ttl: chrono::Duration,
    session_id: Option<Uuid>,
}

impl PreviewUrlMachineBuilder {
    /// Publish notifications on `bus`.
    pub fn event_bus(mut self, bus: Arc<dyn EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Bookkeeping expiry assigned to shared secrets.
    ///
    /// Defaults to the resolvers' [`PreviewSettings::shared_secret_ttl`].
    pub fn shared_secret_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.shared_secret_ttl = ttl;
        self
    }

    /// Use a host-chosen session id instead of a generated one.
    pub fn session_id(mut self, session_id: Uuid) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Spawn the machine on the current tokio runtime.
    ///
    /// # Arguments
    ///
    /// * `preview_search_param` - Initial navigation target, if any
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn start(self, preview_search_param: Option<String>) -> PreviewUrlMachine {
        let session_id = self.session_id.unwrap_or_else(Uuid::now_v7);
        let snapshot = PreviewUrlSnapshot::new(preview_search_param);
        let (publisher, snapshots) = watch::channel(snapshot.clone());
        let (commands, inbox) = mpsc::channel(COMMAND_BUFFER);

        let runtime = Runtime::new(
            session_id,
            snapshot,
            self.resolvers,
            self.bus,
            self.shared_secret_ttl,
            publisher,
        );
        let task = tokio::spawn(runtime.run(self.checker, inbox));

        PreviewUrlMachine {
            session_id,
            commands,
            snapshots,
            task,
        }
    }
}

/// Handle to a running resolution machine.
///
/// Dropping the handle stops the machine and every task it spawned.
pub struct PreviewUrlMachine {
    session_id: Uuid,
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<PreviewUrlSnapshot>,
    task: JoinHandle<()>,
}

impl PreviewUrlMachine {
    /// Create a builder.
    pub fn builder(
        resolvers: Arc<dyn Resolvers>,
        checker: Arc<dyn PermissionChecker>,
    ) -> PreviewUrlMachineBuilder {
        let shared_secret_ttl = resolvers
            .preview_settings()
            .map(PreviewSettings::shared_secret_ttl)
            .unwrap_or_else(|| chrono::Duration::seconds(DEFAULT_SHARED_SECRET_TTL_SECS));
        PreviewUrlMachineBuilder {
            resolvers,
            checker,
            bus: None,
            shared_secret_ttl,
            session_id: None,
        }
    }

    /// Start a machine with default options.
    pub fn start(
        resolvers: Arc<dyn Resolvers>,
        checker: Arc<dyn PermissionChecker>,
        preview_search_param: Option<String>,
    ) -> Self {
        Self::builder(resolvers, checker).start(preview_search_param)
    }

    /// Session id attached to published events.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Send an event. Resolves once the machine has applied it.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewUrlError::Stopped`] if the machine task has exited.
    pub async fn send(&self, event: PreviewUrlEvent) -> PreviewUrlResult<()> {
        let (applied, done) = oneshot::channel();
        self.commands
            .send(Command { event, applied })
            .await
            .map_err(|_| PreviewUrlError::Stopped)?;
        done.await.map_err(|_| PreviewUrlError::Stopped)
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> PreviewUrlSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<PreviewUrlSnapshot> {
        self.snapshots.clone()
    }

    /// Wait until a snapshot satisfies `predicate` and return it.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewUrlError::Stopped`] if the machine exits first.
    pub async fn wait_for<F>(&self, mut predicate: F) -> PreviewUrlResult<PreviewUrlSnapshot>
    where
        F: FnMut(&PreviewUrlSnapshot) -> bool,
    {
        let mut snapshots = self.snapshots.clone();
        let snapshot = snapshots
            .wait_for(|snapshot| predicate(snapshot))
            .await
            .map_err(|_| PreviewUrlError::Stopped)?;
        Ok(snapshot.clone())
    }

    /// Wait until the machine reaches `state`.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewUrlError::Stopped`] if the machine exits first.
    pub async fn wait_for_state(&self, state: MachineState) -> PreviewUrlResult<PreviewUrlSnapshot> {
        self.wait_for(|snapshot| snapshot.state == state).await
    }

    /// Wait until nothing is in flight, or the machine failed.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewUrlError::Stopped`] if the machine exits first.
    pub async fn settled(&self) -> PreviewUrlResult<PreviewUrlSnapshot> {
        self.wait_for(|snapshot| !snapshot.is_busy()).await
    }
}

impl std::fmt::Debug for PreviewUrlMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewUrlMachine")
            .field("session_id", &self.session_id)
            .field("state", &self.snapshots.borrow().state)
            .finish()
    }
}

impl Drop for PreviewUrlMachine {
    fn drop(&mut self) {
        self.task.abort();
    }
}
