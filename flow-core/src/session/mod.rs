//! Document sessions.
//!
//! One session per open document. The session is a single tokio task that
//! owns the document's context, its process manager and its run-all queue;
//! everything else talks to it through a [`SessionHandle`].
//!
//! Lifecycle: `Initializing → Ready → Disposed`. Once disposed, messages
//! sent through any handle are dropped.

mod actor;
pub mod cd;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use crate::config::FlowConfig;
use crate::host::{Collaborators, TextStore};
use crate::protocol::{SessionMessage, UiMessage};

use actor::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Initializing,
    Ready,
    Disposed,
}

/// Inputs to the session task besides UI intents.
#[derive(Debug)]
pub(crate) enum SessionInput {
    Ui(UiMessage),
    TextChanged,
    RunAll,
    StopAll,
    ClearOutput,
    Dispose,
}

/// State read outside the session task.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    /// Set while the session applies its own edit, so the host's resulting
    /// change notification is not taken for an external edit.
    pub(crate) self_write: AtomicBool,
    pub(crate) disposed: AtomicBool,
}

#[derive(Debug, Clone)]
pub struct SessionHandle {
    uri: String,
    inputs: mpsc::UnboundedSender<SessionInput>,
    shared: Arc<Shared>,
    phase: watch::Receiver<SessionPhase>,
}

impl SessionHandle {
    /// Start a session for `uri`. It initializes in the background and
    /// pushes `init` to `ui` once ready.
    pub fn spawn(
        uri: impl Into<String>,
        store: Arc<dyn TextStore>,
        ui: mpsc::UnboundedSender<SessionMessage>,
        collaborators: Collaborators,
        config: &FlowConfig,
    ) -> Self {
        let uri = uri.into();
        let (inputs_tx, inputs_rx) = mpsc::unbounded_channel();
        let (phase_tx, phase_rx) = watch::channel(SessionPhase::Initializing);
        let shared = Arc::new(Shared::default());

        let session = Session::new(
            uri.clone(),
            store,
            ui,
            collaborators,
            config,
            shared.clone(),
            phase_tx,
        );
        tokio::spawn(session.run(inputs_rx));

        Self {
            uri,
            inputs: inputs_tx,
            shared,
            phase: phase_rx,
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase.borrow()
    }

    /// Resolves once the session reached `phase` (or ended).
    pub async fn wait_for(&self, phase: SessionPhase) {
        let mut rx = self.phase.clone();
        let _ = rx.wait_for(|p| *p == phase).await;
    }

    /// Deliver a UI intent.
    pub fn send(&self, message: UiMessage) {
        self.enqueue(SessionInput::Ui(message));
    }

    /// Host notification that the document text changed. Dropped while the
    /// session is applying its own edit.
    pub fn notify_text_changed(&self) {
        if self.shared.self_write.load(Ordering::SeqCst) {
            tracing::debug!("Ignoring change notification for {} caused by own edit", self.uri);
            return;
        }
        self.enqueue(SessionInput::TextChanged);
    }

    /// Execute every shell block in order, each after the previous one ended.
    pub fn run_all(&self) {
        self.enqueue(SessionInput::RunAll);
    }

    pub fn stop_all(&self) {
        self.enqueue(SessionInput::StopAll);
    }

    pub fn clear_output(&self) {
        self.enqueue(SessionInput::ClearOutput);
    }

    /// Kill all processes and stop the session. Safe to call repeatedly.
    pub fn dispose(&self) {
        if self.shared.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("Disposing session for {}", self.uri);
        let _ = self.inputs.send(SessionInput::Dispose);
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::SeqCst)
    }

    fn enqueue(&self, input: SessionInput) {
        if self.is_disposed() {
            tracing::debug!("Session {} is disposed; dropping {:?}", self.uri, input);
            return;
        }
        if self.inputs.send(input).is_err() {
            tracing::debug!("Session {} has stopped", self.uri);
        }
    }
}
