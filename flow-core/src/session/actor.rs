use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use super::cd::{cd_target, is_cd_command, resolve_cd_target};
use super::{SessionInput, SessionPhase, Shared};
use crate::config::FlowConfig;
use crate::context::ContextService;
use crate::document::{parse_document, Document, ParseIssue};
use crate::host::{expand_tilde, Collaborators, ShellDiscovery, TextStore};
use crate::process::{ExecutionEvent, ProcessManager};
use crate::protocol::{SessionMessage, UiMessage};
use crate::BlockId;

/// Bookkeeping for an execution whose end we still have to react to.
#[derive(Debug)]
struct PendingRun {
    generation: u64,
    command: String,
    /// Context cwd at the moment the command was issued.
    cwd: String,
    is_shell: bool,
}

pub(super) struct Session {
    uri: String,
    store: Arc<dyn TextStore>,
    ui: mpsc::UnboundedSender<SessionMessage>,
    shells: Arc<dyn ShellDiscovery>,
    home: Option<PathBuf>,
    context: ContextService,
    processes: ProcessManager,
    events: mpsc::UnboundedReceiver<ExecutionEvent>,
    pending: HashMap<BlockId, PendingRun>,
    run_queue: VecDeque<(BlockId, String)>,
    run_all_waiting: Option<BlockId>,
    shared: Arc<Shared>,
    phase: watch::Sender<SessionPhase>,
    disposed: bool,
}

impl Session {
    pub(super) fn new(
        uri: String,
        store: Arc<dyn TextStore>,
        ui: mpsc::UnboundedSender<SessionMessage>,
        collaborators: Collaborators,
        config: &FlowConfig,
        shared: Arc<Shared>,
        phase: watch::Sender<SessionPhase>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let home = collaborators.host.home_dir();
        let context = ContextService::new(
            collaborators.host.clone(),
            collaborators.branches.clone(),
            config.shell.clone(),
        );

        Self {
            uri,
            store,
            ui,
            shells: collaborators.shells,
            home,
            context,
            processes: ProcessManager::new(events_tx, config),
            events: events_rx,
            pending: HashMap::new(),
            run_queue: VecDeque::new(),
            run_all_waiting: None,
            shared,
            phase,
            disposed: false,
        }
    }

    pub(super) async fn run(mut self, mut inputs: mpsc::UnboundedReceiver<SessionInput>) {
        self.initialize().await;

        loop {
            tokio::select! {
                input = inputs.recv() => match input {
                    Some(SessionInput::Dispose) | None => break,
                    Some(input) => self.handle_input(input).await,
                },
                Some(event) = self.events.recv() => self.handle_event(event).await,
            }
        }

        self.dispose();
    }

    async fn initialize(&mut self) {
        tracing::info!("Opening session for {}", self.uri);
        self.context.refresh().await;

        // A corrupt buffer opens as the default document but is not
        // overwritten until the user edits.
        let (mut doc, writable) = match parse_document(&self.store.text().await) {
            Ok(doc) => (doc, true),
            Err(ParseIssue::Empty) => (Document::default(), true),
            Err(issue) => {
                tracing::warn!("{}; opening {} as an empty document", issue, self.uri);
                (Document::default(), false)
            }
        };

        match doc.context.clone() {
            None => {
                doc.context = Some(self.context.get_context());
                if writable {
                    self.persist(&doc).await;
                }
            }
            Some(mut ctx) => {
                let expanded = expand_tilde(&ctx.cwd, self.home.as_deref());
                if expanded != ctx.cwd {
                    ctx.cwd = expanded;
                    doc.context = Some(ctx.clone());
                    self.persist(&doc).await;
                }
                self.context.adopt(ctx);
            }
        }

        if self.shared.disposed.load(Ordering::SeqCst) {
            return;
        }
        self.phase.send_replace(SessionPhase::Ready);
        self.post(SessionMessage::Init { document: doc });
    }

    async fn handle_input(&mut self, input: SessionInput) {
        match input {
            SessionInput::Ui(message) => self.handle_ui(message).await,
            SessionInput::TextChanged => {
                tracing::debug!("External change to {}", self.uri);
                let doc = self.load_document().await;
                self.adopt_document_context(&doc);
                self.post(SessionMessage::Update { document: doc });
            }
            SessionInput::RunAll => self.run_all().await,
            SessionInput::StopAll => {
                self.cancel_run_all();
                self.processes.stop_all();
            }
            SessionInput::ClearOutput => {
                let mut doc = self.load_document().await;
                doc.clear_outputs();
                self.persist(&doc).await;
                self.post(SessionMessage::Update { document: doc });
            }
            // Handled by the run loop.
            SessionInput::Dispose => {}
        }
    }

    async fn handle_ui(&mut self, message: UiMessage) {
        match message {
            UiMessage::Ready => {
                tracing::info!("UI ready for {}", self.uri);
                let doc = self.load_document().await;
                self.adopt_document_context(&doc);
                self.post(SessionMessage::Init { document: doc });
            }
            UiMessage::Update { document } => {
                let success = self.persist(&document).await;
                self.adopt_document_context(&document);
                self.post(SessionMessage::Ack { success });
            }
            UiMessage::Log { message } => {
                tracing::info!(target: "flow::webview", "{}", message);
            }
            UiMessage::Execute { block_id, cmd } => {
                self.start_execution(block_id, cmd).await;
            }
            UiMessage::Stop { block_id } => {
                if self.run_all_waiting.as_deref() == Some(block_id.as_str()) {
                    self.cancel_run_all();
                }
                self.processes.stop(&block_id);
            }
            UiMessage::TerminalInput { block_id, data } => {
                self.processes.send_input(&block_id, &data);
            }
            UiMessage::RequestShellConfig => {
                let shells = self.shells.available_shells();
                tracing::info!("Sending shell config with {} shells", shells.len());
                self.post(SessionMessage::ShellConfig { shells });
            }
        }
    }

    /// Start `cmd` for `block_id` in the live context. Returns whether a
    /// process was actually launched (empty commands are skipped).
    async fn start_execution(&mut self, block_id: BlockId, cmd: String) -> bool {
        let doc = self.load_document().await;
        let context = self.context.get_context();

        let execution = self
            .processes
            .execute(&block_id, &cmd, &context, &doc.variables);

        let Some(generation) = execution.generation() else {
            return false;
        };
        let is_shell = doc.is_shell_block(&block_id);
        self.pending.insert(
            block_id,
            PendingRun {
                generation,
                command: cmd,
                cwd: context.cwd,
                is_shell,
            },
        );
        true
    }

    async fn handle_event(&mut self, event: ExecutionEvent) {
        if !self.processes.accept(&event) {
            return;
        }

        let ended = match &event {
            ExecutionEvent::Ended {
                block_id,
                generation,
                exit_code,
            } => Some((block_id.clone(), *generation, *exit_code)),
            _ => None,
        };

        self.post(event.into());

        if let Some((block_id, generation, exit_code)) = ended {
            self.finish_execution(block_id, generation, exit_code).await;
        }
    }

    async fn finish_execution(&mut self, block_id: BlockId, generation: u64, exit_code: i32) {
        if let Some(run) = self.pending.remove(&block_id) {
            if run.generation == generation
                && exit_code == 0
                && run.is_shell
                && is_cd_command(&run.command)
            {
                self.intercept_cd(&run.command, &run.cwd).await;
            }
        }

        if self.run_all_waiting.as_deref() == Some(block_id.as_str()) {
            self.run_all_waiting = None;
            self.start_next_queued().await;
        }
    }

    /// Move the session cwd after a successful `cd`. Failures only log.
    async fn intercept_cd(&mut self, command: &str, cwd: &str) {
        let Some(target) = cd_target(command) else {
            return;
        };
        let resolved = resolve_cd_target(&target, cwd, self.home.as_deref());

        match tokio::fs::metadata(&resolved).await {
            Ok(meta) if meta.is_dir() => {
                let new_cwd = resolved.to_string_lossy().to_string();
                self.context.set_cwd(new_cwd.clone()).await;

                let mut doc = self.load_document().await;
                doc.context = Some(self.context.get_context());
                self.persist(&doc).await;
                self.post(SessionMessage::Update { document: doc });
                tracing::info!("Updated CWD to {}", new_cwd);
            }
            Ok(_) => tracing::warn!("cd target {} is not a directory", resolved.display()),
            Err(e) => tracing::warn!("Failed to access directory {}: {}", resolved.display(), e),
        }
    }

    async fn run_all(&mut self) {
        if self.run_all_waiting.is_some() {
            tracing::warn!("Run all already in progress for {}", self.uri);
            return;
        }
        let doc = self.load_document().await;
        self.run_queue = doc.shell_commands().into();
        tracing::info!("Running {} block(s) in {}", self.run_queue.len(), self.uri);
        self.start_next_queued().await;
    }

    async fn start_next_queued(&mut self) {
        while let Some((block_id, cmd)) = self.run_queue.pop_front() {
            if self.start_execution(block_id.clone(), cmd).await {
                self.run_all_waiting = Some(block_id);
                return;
            }
        }
    }

    fn cancel_run_all(&mut self) {
        if self.run_all_waiting.take().is_some() || !self.run_queue.is_empty() {
            tracing::info!("Cancelling run all for {}", self.uri);
        }
        self.run_queue.clear();
    }

    fn adopt_document_context(&mut self, doc: &Document) {
        if let Some(ctx) = &doc.context {
            let mut ctx = ctx.clone();
            ctx.cwd = expand_tilde(&ctx.cwd, self.home.as_deref());
            self.context.adopt(ctx);
        }
    }

    async fn load_document(&self) -> Document {
        Document::from_text_or_default(&self.store.text().await)
    }

    /// Full-range replace with the self-write flag raised for its duration.
    async fn persist(&self, doc: &Document) -> bool {
        self.shared.self_write.store(true, Ordering::SeqCst);
        let success = self.store.apply_full_replace(doc.to_text()).await;
        self.shared.self_write.store(false, Ordering::SeqCst);

        if success {
            tracing::debug!("Document {} updated", self.uri);
        } else {
            tracing::error!("Host rejected edit to {}", self.uri);
        }
        success
    }

    fn post(&self, message: SessionMessage) {
        if self.disposed || self.shared.disposed.load(Ordering::SeqCst) {
            return;
        }
        if self.ui.send(message).is_err() {
            tracing::debug!("UI for {} is gone", self.uri);
        }
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.shared.disposed.store(true, Ordering::SeqCst);

        self.cancel_run_all();
        self.pending.clear();
        self.processes.kill_all();
        self.events.close();

        self.phase.send_replace(SessionPhase::Disposed);
        tracing::info!("Session for {} disposed", self.uri);
    }
}
