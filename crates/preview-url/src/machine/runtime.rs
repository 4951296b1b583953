//! The task that owns the resolution context.
//!
//! Everything that can change the context arrives as a message on one of
//! two queues: host commands and internal completions (permission updates,
//! actor results, renewal timers). Messages are applied one at a time, so
//! the context never sees concurrent writers.

use std::future::Future;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use preview_auth::PreviewUrlSecret;
use preview_events::{EventBus, PreviewEvent, SecretStrategy};
use preview_rbac::{BoxError, GrantKind, PermissionCheckResult, PermissionChecker};

use crate::actors::{InitialUrlInput, PreviewModeUrlInput, Resolvers, SearchParamInput};
use crate::error::{PreviewUrlError, PreviewUrlResult, Stage};
use crate::options::PreviewMode;
use crate::pattern::OriginPattern;

use super::state::{MachineState, PreviewModeState, PreviewUrlSnapshot};
use super::PreviewUrlEvent;

/// Host command with its completion signal.
pub(crate) struct Command {
    pub(crate) event: PreviewUrlEvent,
    pub(crate) applied: oneshot::Sender<()>,
}

enum Internal {
    Permission {
        kind: GrantKind,
        result: Result<PermissionCheckResult, BoxError>,
    },
    Done {
        invocation: u64,
        stage: Stage,
        output: PreviewUrlResult<ActorOutput>,
    },
    SecretExpired {
        timer: u64,
    },
}

enum ActorOutput {
    InitialUrl(Url),
    AllowPatterns(Vec<OriginPattern>),
    SearchParam(Url),
    PreviewMode(Option<PreviewMode>),
    CreatedSecret(PreviewUrlSecret),
    SharedSecret(Option<String>),
    PreviewModeUrl(Url),
}

/// Aborts the wrapped task when dropped.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

pub(crate) struct Runtime {
    session_id: Uuid,
    snapshot: PreviewUrlSnapshot,
    resolvers: Arc<dyn Resolvers>,
    bus: Option<Arc<dyn EventBus>>,
    shared_secret_ttl: chrono::Duration,
    publisher: watch::Sender<PreviewUrlSnapshot>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    internal_rx: mpsc::UnboundedReceiver<Internal>,
    invocation: u64,
    actor: Option<AbortOnDrop>,
    timer_id: u64,
    timer: Option<AbortOnDrop>,
    secret_strategy: Option<SecretStrategy>,
    permission_tasks: Vec<AbortOnDrop>,
    outbox: Vec<PreviewEvent>,
}

impl Runtime {
    pub(crate) fn new(
        session_id: Uuid,
        snapshot: PreviewUrlSnapshot,
        resolvers: Arc<dyn Resolvers>,
        bus: Option<Arc<dyn EventBus>>,
        shared_secret_ttl: chrono::Duration,
        publisher: watch::Sender<PreviewUrlSnapshot>,
    ) -> Self {
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        Self {
            session_id,
            snapshot,
            resolvers,
            bus,
            shared_secret_ttl,
            publisher,
            internal_tx,
            internal_rx,
            invocation: 0,
            actor: None,
            timer_id: 0,
            timer: None,
            secret_strategy: None,
            permission_tasks: Vec::new(),
            outbox: Vec::new(),
        }
    }

    /// Run until every handle is dropped.
    pub(crate) async fn run(
        mut self,
        checker: Arc<dyn PermissionChecker>,
        mut commands: mpsc::Receiver<Command>,
    ) {
        debug!(session_id = %self.session_id, "Preview URL machine started");
        self.subscribe_permissions(checker.as_ref());

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command { event, applied }) => {
                        self.handle_event(event);
                        self.flush().await;
                        let _ = applied.send(());
                    }
                    None => break,
                },
                Some(message) = self.internal_rx.recv() => {
                    self.handle_internal(message);
                    self.flush().await;
                }
            }
        }

        debug!(session_id = %self.session_id, "Preview URL machine stopped");
    }

    fn subscribe_permissions(&mut self, checker: &dyn PermissionChecker) {
        for kind in GrantKind::ALL {
            let mut stream = checker.check_permission(kind.action(), &kind.resource_descriptor());
            let tx = self.internal_tx.clone();
            let handle = tokio::spawn(async move {
                while let Some(result) = stream.next().await {
                    let failed = result.is_err();
                    if tx.send(Internal::Permission { kind, result }).is_err() || failed {
                        break;
                    }
                }
            });
            self.permission_tasks.push(AbortOnDrop(handle));
        }
    }

    fn handle_event(&mut self, event: PreviewUrlEvent) {
        match event {
            PreviewUrlEvent::TargetChanged {
                preview_search_param,
            } => self.target_changed(preview_search_param),
        }
    }

    fn target_changed(&mut self, preview_search_param: Option<String>) {
        let state = self.snapshot.state;
        if state.is_final() {
            debug!(%state, "Ignoring target change in terminal state");
            return;
        }

        let new_origin = match (&self.snapshot.preview_url, &preview_search_param) {
            (Some(current), Some(param)) if state.accepts_target_change() => current
                .join(param)
                .ok()
                .map(|target| target.origin())
                .filter(|origin| *origin != current.origin()),
            _ => None,
        };

        self.snapshot.preview_search_param = preview_search_param;

        if let Some(origin) = new_origin {
            debug!(
                origin = %origin.ascii_serialization(),
                "Navigation target changed origin, re-resolving"
            );
            self.enter(MachineState::ResolvingUrlFromPreviewSearchParam);
        }
    }

    fn handle_internal(&mut self, message: Internal) {
        match message {
            Internal::Permission { kind, result } => self.permission_updated(kind, result),
            Internal::Done {
                invocation,
                stage,
                output,
            } => {
                if invocation != self.invocation || self.snapshot.state.is_final() {
                    debug!(%stage, "Discarding stale resolver result");
                    return;
                }
                match output {
                    Ok(output) => self.resolved(output),
                    Err(err) => self.fail(err.in_stage(stage)),
                }
            }
            Internal::SecretExpired { timer } => {
                if timer == self.timer_id
                    && self.snapshot.state == MachineState::PreviewMode(PreviewModeState::Success)
                {
                    self.secret_expired();
                }
            }
        }
    }

    fn permission_updated(&mut self, kind: GrantKind, result: Result<PermissionCheckResult, BoxError>) {
        if self.snapshot.state.is_final() {
            return;
        }

        match result {
            Ok(result) => {
                debug!(grant = %kind, granted = result.granted, reason = %result.reason, "Permission updated");
                self.snapshot.permissions.set(kind, result);
                if self.snapshot.state == MachineState::CheckingPermissions
                    && self.snapshot.permissions.all_known()
                {
                    self.enter(MachineState::ResolvingInitialUrl);
                }
            }
            Err(err) => self.fail(PreviewUrlError::Permission(err).in_stage(Stage::CheckPermission)),
        }
    }

    fn resolved(&mut self, output: ActorOutput) {
        let state = self.snapshot.state;
        match (state, output) {
            (MachineState::ResolvingInitialUrl, ActorOutput::InitialUrl(url)) => {
                self.snapshot.initial_url = Some(url);
                self.enter(MachineState::ResolvingAllowPatterns);
            }
            (MachineState::ResolvingAllowPatterns, ActorOutput::AllowPatterns(patterns)) => {
                self.snapshot.allow_origins = Some(patterns);
                self.enter(MachineState::ResolvingUrlFromPreviewSearchParam);
            }
            (MachineState::ResolvingUrlFromPreviewSearchParam, ActorOutput::SearchParam(url)) => {
                self.reject_untrusted_target(&url);
                self.snapshot.initial_url = Some(url);
                self.enter(MachineState::ResolvingPreviewMode);
            }
            (MachineState::ResolvingPreviewMode, ActorOutput::PreviewMode(mode)) => {
                self.preview_mode_resolved(mode);
            }
            (
                MachineState::PreviewMode(PreviewModeState::CreatePreviewSecret),
                ActorOutput::CreatedSecret(secret),
            ) => {
                info!(
                    fingerprint = %secret.fingerprint(),
                    expires_at = %secret.expires_at,
                    "Created preview secret"
                );
                self.outbox.push(PreviewEvent::SecretIssued {
                    strategy: SecretStrategy::Create,
                    fingerprint: Some(secret.fingerprint()),
                    expires_at: secret.expires_at,
                });
                self.snapshot.preview_url_secret = Some(secret);
                self.secret_strategy = Some(SecretStrategy::Create);
                self.enter(MachineState::PreviewMode(PreviewModeState::ResolvePreviewUrl));
            }
            (
                MachineState::PreviewMode(PreviewModeState::ReadShareAccess),
                ActorOutput::SharedSecret(secret),
            ) => {
                let expires_at = chrono::Utc::now() + self.shared_secret_ttl;
                let secret = secret.map(|secret| PreviewUrlSecret::new(secret, expires_at));
                match &secret {
                    Some(secret) => {
                        info!(fingerprint = %secret.fingerprint(), "Using shared preview secret");
                        self.outbox.push(PreviewEvent::SecretIssued {
                            strategy: SecretStrategy::Shared,
                            fingerprint: Some(secret.fingerprint()),
                            expires_at,
                        });
                    }
                    None => debug!("No shared preview secret published"),
                }
                self.snapshot.preview_url_secret = secret;
                self.secret_strategy = Some(SecretStrategy::Shared);
                self.enter(MachineState::PreviewMode(PreviewModeState::ResolvePreviewUrl));
            }
            (
                MachineState::PreviewMode(PreviewModeState::ResolvePreviewUrl),
                ActorOutput::PreviewModeUrl(url),
            ) => {
                if !self.is_trusted(&url) {
                    let origin = url.origin().ascii_serialization();
                    return self.fail(
                        PreviewUrlError::UntrustedOrigin { origin }.in_stage(Stage::PreviewModeUrl),
                    );
                }
                self.snapshot.preview_url = Some(url);
                self.enter(MachineState::PreviewMode(PreviewModeState::Success));
            }
            (state, _) => debug!(%state, "Ignoring resolver result for another state"),
        }
    }

    /// Check `url` is on the initial origin or an allowed one.
    fn is_trusted(&self, url: &Url) -> bool {
        let same_origin = self
            .snapshot
            .initial_url
            .as_ref()
            .is_some_and(|initial| initial.origin() == url.origin());
        same_origin
            || self
                .snapshot
                .allow_origins
                .iter()
                .flatten()
                .any(|pattern| pattern.test_url(url))
    }

    fn reject_untrusted_target(&mut self, resolved: &Url) {
        let Some(param) = self.snapshot.preview_search_param.as_deref() else {
            return;
        };
        let Some(base) = self.snapshot.initial_url.as_ref() else {
            return;
        };
        if let Ok(requested) = base.join(param) {
            if requested.origin() != resolved.origin() {
                self.outbox.push(PreviewEvent::NavigationRejected {
                    origin: requested.origin().ascii_serialization(),
                });
            }
        }
    }

    fn preview_mode_resolved(&mut self, mode: Option<PreviewMode>) {
        let can_create = self.snapshot.permissions.granted(GrantKind::CreatePreviewSecret) == Some(true);
        let can_read = self.snapshot.permissions.granted(GrantKind::ReadShareAccess) == Some(true);

        match mode {
            Some(mode) if can_create => {
                self.snapshot.preview_mode = Some(mode);
                self.enter(MachineState::PreviewMode(PreviewModeState::CreatePreviewSecret));
            }
            Some(mode) if can_read => {
                self.snapshot.preview_mode = Some(mode);
                self.enter(MachineState::PreviewMode(PreviewModeState::ReadShareAccess));
            }
            Some(_) => {
                let initial_url = self
                    .snapshot
                    .initial_url
                    .as_ref()
                    .map(Url::to_string)
                    .unwrap_or_default();
                warn!(%initial_url, "{}", PreviewEvent::DEGRADED_MESSAGE);
                self.outbox.push(PreviewEvent::ModeDegraded {
                    initial_url,
                    message: PreviewEvent::DEGRADED_MESSAGE.to_string(),
                });
                self.without_preview_mode();
            }
            None => self.without_preview_mode(),
        }
    }

    fn without_preview_mode(&mut self) {
        self.snapshot.preview_mode = None;
        self.snapshot.preview_url = self.snapshot.initial_url.clone();
        self.enter(MachineState::Success);
    }

    fn secret_expired(&mut self) {
        if self.snapshot.permissions.granted(GrantKind::CreatePreviewSecret) != Some(true) {
            info!("Preview secret expired, renewal no longer permitted");
            return;
        }
        info!("Preview secret expired, renewing");
        self.snapshot.preview_url_secret = None;
        self.enter(MachineState::PreviewMode(PreviewModeState::CreatePreviewSecret));
    }

    fn fail(&mut self, err: PreviewUrlError) {
        let terminal = match self.snapshot.state {
            MachineState::PreviewMode(_) => MachineState::PreviewMode(PreviewModeState::Error),
            _ => MachineState::Error,
        };
        error!(error = %err, code = err.error_code(), "Preview URL resolution failed");
        self.outbox.push(PreviewEvent::MachineFailed {
            stage: err
                .stage()
                .map(|stage| stage.message().to_string())
                .unwrap_or_default(),
            message: err.to_string(),
        });
        self.snapshot.error = Some(Arc::new(err));
        self.enter(terminal);
    }

    /// Enter `state`, abandoning whatever the previous state had in flight.
    fn enter(&mut self, state: MachineState) {
        debug!(from = %self.snapshot.state, to = %state, "Entering state");
        self.snapshot.state = state;
        self.invocation += 1;
        self.actor = None;
        self.timer = None;

        match state {
            MachineState::CheckingPermissions => {}
            MachineState::ResolvingInitialUrl => {
                let input = InitialUrlInput {
                    preview_search_param: self.snapshot.preview_search_param.clone(),
                    secret_access: self.snapshot.permissions.secret_access(),
                };
                self.invoke(Stage::InitialUrl, move |resolvers| async move {
                    resolvers
                        .resolve_initial_url(input)
                        .await
                        .map(ActorOutput::InitialUrl)
                });
            }
            MachineState::ResolvingAllowPatterns => {
                let Some(initial_url) = self.snapshot.initial_url.clone() else {
                    return self.missing(Stage::AllowPatterns, "initial url");
                };
                self.invoke(Stage::AllowPatterns, move |resolvers| async move {
                    resolvers
                        .resolve_allow_patterns(initial_url)
                        .await
                        .map(ActorOutput::AllowPatterns)
                });
            }
            MachineState::ResolvingUrlFromPreviewSearchParam => {
                let Some(initial_url) = self.snapshot.initial_url.clone() else {
                    return self.missing(Stage::SearchParam, "initial url");
                };
                let input = SearchParamInput {
                    initial_url,
                    preview_search_param: self.snapshot.preview_search_param.clone(),
                    allow_origins: self.snapshot.allow_origins.clone().unwrap_or_default(),
                };
                self.invoke(Stage::SearchParam, move |resolvers| async move {
                    resolvers
                        .resolve_url_from_search_param(input)
                        .await
                        .map(ActorOutput::SearchParam)
                });
            }
            MachineState::ResolvingPreviewMode => {
                let Some(initial_url) = self.snapshot.initial_url.as_ref() else {
                    return self.missing(Stage::PreviewMode, "initial url");
                };
                let target_origin = initial_url.origin().ascii_serialization();
                self.invoke(Stage::PreviewMode, move |resolvers| async move {
                    resolvers
                        .resolve_preview_mode(target_origin)
                        .await
                        .map(ActorOutput::PreviewMode)
                });
            }
            MachineState::PreviewMode(PreviewModeState::CreatePreviewSecret) => {
                self.invoke(Stage::CreateSecret, |resolvers| async move {
                    resolvers
                        .create_preview_secret()
                        .await
                        .map(ActorOutput::CreatedSecret)
                });
            }
            MachineState::PreviewMode(PreviewModeState::ReadShareAccess) => {
                self.invoke(Stage::ReadSharedSecret, |resolvers| async move {
                    resolvers
                        .read_shared_secret()
                        .await
                        .map(ActorOutput::SharedSecret)
                });
            }
            MachineState::PreviewMode(PreviewModeState::ResolvePreviewUrl) => {
                let Some(initial_url) = self.snapshot.initial_url.clone() else {
                    return self.missing(Stage::PreviewModeUrl, "initial url");
                };
                let input = PreviewModeUrlInput {
                    initial_url,
                    preview_mode: self.snapshot.preview_mode.clone(),
                    secret: self
                        .snapshot
                        .preview_url_secret
                        .as_ref()
                        .map(|secret| secret.secret.clone()),
                };
                self.invoke(Stage::PreviewModeUrl, move |resolvers| async move {
                    resolvers
                        .resolve_preview_mode_url(input)
                        .await
                        .map(ActorOutput::PreviewModeUrl)
                });
            }
            MachineState::PreviewMode(PreviewModeState::Success) => {
                self.url_resolved(true);
                if self.secret_strategy == Some(SecretStrategy::Create) {
                    self.schedule_renewal();
                }
            }
            MachineState::Success => self.url_resolved(false),
            MachineState::Error | MachineState::PreviewMode(PreviewModeState::Error) => {}
        }
    }

    fn invoke<F, Fut>(&mut self, stage: Stage, actor: F)
    where
        F: FnOnce(Arc<dyn Resolvers>) -> Fut,
        Fut: Future<Output = PreviewUrlResult<ActorOutput>> + Send + 'static,
    {
        let invocation = self.invocation;
        let tx = self.internal_tx.clone();
        let work = actor(Arc::clone(&self.resolvers));
        let handle = tokio::spawn(async move {
            let output = work.await;
            let _ = tx.send(Internal::Done {
                invocation,
                stage,
                output,
            });
        });
        self.actor = Some(AbortOnDrop(handle));
    }

    fn missing(&mut self, stage: Stage, field: &'static str) {
        self.fail(PreviewUrlError::MissingContext(field).in_stage(stage));
    }

    fn url_resolved(&mut self, preview_mode: bool) {
        let Some(preview_url) = self.snapshot.preview_url.as_ref() else {
            return;
        };
        let initial_url = self
            .snapshot
            .initial_url
            .as_ref()
            .map(Url::to_string)
            .unwrap_or_default();
        info!(
            origin = %preview_url.origin().ascii_serialization(),
            preview_mode,
            "Resolved preview URL"
        );
        self.outbox.push(PreviewEvent::UrlResolved {
            preview_url: preview_url.to_string(),
            initial_url,
            preview_mode,
        });
    }

    fn schedule_renewal(&mut self) {
        let delay = self
            .snapshot
            .preview_url_secret
            .as_ref()
            .map(PreviewUrlSecret::expires_in)
            .unwrap_or_default();
        self.timer_id += 1;
        let timer = self.timer_id;
        let tx = self.internal_tx.clone();
        debug!(delay_secs = delay.as_secs(), "Scheduled preview secret renewal");
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Internal::SecretExpired { timer });
        });
        self.timer = Some(AbortOnDrop(handle));
    }

    /// Deliver queued notifications, then publish the snapshot.
    async fn flush(&mut self) {
        let events = std::mem::take(&mut self.outbox);
        if let Some(bus) = &self.bus {
            for event in events {
                let event = event.to_event().with_session(self.session_id);
                if let Err(err) = bus.publish(event).await {
                    warn!(error = %err, "Failed to publish preview event");
                }
            }
        }
        self.publisher.send_replace(self.snapshot.clone());
    }
}
