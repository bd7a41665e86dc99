//! Acquisition session controller.
//!
//! The controller owns the session configuration and the observable
//! [`SessionState`]. [`SessionController::start`] validates the configuration,
//! resets the state, and spawns a driver task that issues the backend request
//! and folds its events into the state until the request resolves, rejects, or
//! is cancelled.
//!
//! ```text
//! Idle ──start──▶ Collecting ──Finished event / Ok──▶ Finished
//!                     │  ├──────request rejected────▶ Failed
//!                     │  └──────cancel()────────────▶ Cancelled
//!                     └── Sample / Error / Unknown: fold, stay Collecting
//! ```
//!
//! A cancelled session stays `Collecting` until its backend has returned, so
//! `Cancelled` means the device is released and a new session may open it.
//!
//! Display projections observe the state through [`SessionController::subscribe`].

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::backend::{AcquisitionBackend, AcquisitionRequest};
use crate::config::SessionConfig;
use crate::error::{TransportError, ValidationError};
use crate::event::{self, EventSink, EventStream};
use crate::session::{MAX_VISIBLE_LINES, Phase, SessionState};
use crate::settings::SettingsWriter;

struct ActiveSession {
    id: Uuid,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns one configuration and runs at most one session at a time.
pub struct SessionController {
    backend: Arc<dyn AcquisitionBackend>,
    config: SessionConfig,
    settings: Option<SettingsWriter>,
    state: Arc<watch::Sender<SessionState>>,
    capacity: usize,
    active: Option<ActiveSession>,
}

impl SessionController {
    pub fn new(backend: Arc<dyn AcquisitionBackend>, config: SessionConfig) -> Self {
        let (state, _) = watch::channel(SessionState::idle(MAX_VISIBLE_LINES));
        Self {
            backend,
            config,
            settings: None,
            state: Arc::new(state),
            capacity: MAX_VISIBLE_LINES,
            active: None,
        }
    }

    /// Persist configuration changes through `writer`.
    pub fn with_settings(mut self, writer: SettingsWriter) -> Self {
        self.settings = Some(writer);
        self
    }

    /// Retain at most `capacity` output lines per session.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self.state.send_replace(SessionState::idle(self.capacity));
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn settings(&self) -> Option<&SettingsWriter> {
        self.settings.as_ref()
    }

    /// Edit the owned configuration. When the record changed, the settings
    /// writer is notified. Returns whether anything changed.
    pub fn update_config(&mut self, edit: impl FnOnce(&mut SessionConfig)) -> bool {
        let mut updated = self.config.clone();
        edit(&mut updated);
        if updated == self.config {
            return false;
        }
        self.config = updated;
        if let Some(writer) = &self.settings {
            writer.save(self.config.clone());
        }
        true
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn phase(&self) -> Phase {
        self.state.borrow().phase
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Start a session from the owned configuration.
    pub fn start(&mut self) -> Result<Uuid, ValidationError> {
        let config = self.config.clone();
        self.start_with(&config)
    }

    /// Start a session from an explicit configuration. Must be called within a
    /// tokio runtime.
    ///
    /// On a validation failure nothing changes: the phase and the previous
    /// session's output stay as they were.
    pub fn start_with(&mut self, config: &SessionConfig) -> Result<Uuid, ValidationError> {
        if !self.phase().can_start() {
            return Err(ValidationError::AlreadyCollecting);
        }
        config.validate()?;

        // A previous backend may still be winding down after its terminal
        // event; it must not keep producing, and the new driver waits for it.
        let previous = self.active.take().map(|previous| {
            previous.cancel.cancel();
            previous.task
        });

        let id = Uuid::new_v4();
        let request = AcquisitionRequest::from_config(config);
        let (sink, events) = event::channel();
        let cancel = CancellationToken::new();

        self.state
            .send_replace(SessionState::collecting(id, self.capacity));
        log::info!(
            "session {id} started: source={} destination={} samples={:?}",
            request.source,
            request.output_destination,
            request.sample_count
        );

        let task = tokio::spawn(drive(
            previous,
            Arc::clone(&self.backend),
            request,
            sink,
            events,
            cancel.clone(),
            Arc::clone(&self.state),
            id,
        ));
        self.active = Some(ActiveSession { id, cancel, task });
        Ok(id)
    }

    /// Cancel the running session. Returns `false` when nothing is collecting.
    ///
    /// The phase becomes `Cancelled` once the backend has returned;
    /// [`wait`](Self::wait) for it.
    pub fn cancel(&self) -> bool {
        match &self.active {
            Some(active) if self.phase() == Phase::Collecting => {
                log::info!("cancelling session {}", active.id);
                active.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Token that cancels the running session, for signal handlers.
    pub fn cancel_token(&self) -> Option<CancellationToken> {
        self.active.as_ref().map(|a| a.cancel.clone())
    }

    /// Wait for the driver task of the current session and return the final
    /// state.
    pub async fn wait(&mut self) -> SessionState {
        if let Some(active) = self.active.take() {
            if let Err(e) = active.task.await {
                log::warn!("session {} driver task failed: {e}", active.id);
            }
        }
        self.state()
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(active) = &self.active {
            active.cancel.cancel();
        }
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

enum Outcome {
    Resolved(Result<(), TransportError>),
    Cancelled,
}

/// Apply `change` to the state only while it still belongs to session `id`.
fn update(
    state: &watch::Sender<SessionState>,
    id: Uuid,
    change: impl FnOnce(&mut SessionState) -> bool,
) -> bool {
    state.send_if_modified(|s| s.session_id == Some(id) && change(s))
}

async fn drive(
    previous: Option<JoinHandle<()>>,
    backend: Arc<dyn AcquisitionBackend>,
    request: AcquisitionRequest,
    sink: EventSink,
    mut events: EventStream,
    cancel: CancellationToken,
    state: Arc<watch::Sender<SessionState>>,
    id: Uuid,
) {
    if let Some(previous) = previous
        && let Err(e) = previous.await
    {
        log::warn!("session {id}: previous driver task failed: {e}");
    }

    let collect = backend.collect(request, sink, cancel.clone());
    tokio::pin!(collect);

    let outcome = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break Outcome::Cancelled,
            Some(event) = events.next() => {
                log::trace!("session {id}: {event:?}");
                update(&state, id, |s| s.apply(event));
            }
            result = &mut collect => break Outcome::Resolved(result),
        }
    };

    events.close();
    match outcome {
        Outcome::Cancelled => {
            // The backend holds its device until collect returns.
            if let Err(e) = collect.await {
                log::debug!("session {id}: backend stopped after cancel: {e}");
            }
            update(&state, id, SessionState::cancel);
            log::info!("session {id} cancelled");
        }
        Outcome::Resolved(result) => {
            // Events emitted just before the request resolved.
            while let Some(event) = events.next().await {
                update(&state, id, |s| s.apply(event));
            }
            match result {
                Ok(()) => {
                    if update(&state, id, SessionState::complete) {
                        log::warn!("session {id}: backend resolved without a Finished event");
                    }
                    log::info!("session {id} finished");
                }
                Err(e) => {
                    if !update(&state, id, |s| s.fail(&e)) {
                        log::warn!("session {id}: backend rejected after finishing: {e}");
                    } else {
                        log::info!("session {id} failed: {e}");
                    }
                }
            }
        }
    }
}
