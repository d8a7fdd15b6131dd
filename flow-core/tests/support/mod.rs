//! In-memory collaborators shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use flow_core::host::{BranchQuery, Collaborators, HostEnvironment, ShellDiscovery, TextStore};
use flow_core::{FlowConfig, SessionMessage, ShellConfig};

pub const TIMEOUT: Duration = Duration::from_secs(10);

type WriteHook = Box<dyn Fn() + Send + Sync>;

/// Text buffer that lives in memory. `on_write` runs inside
/// `apply_full_replace`, the way an editor fires its change event while the
/// edit is being applied.
#[derive(Default)]
pub struct MemoryTextStore {
    text: Mutex<String>,
    reject: AtomicBool,
    writes: AtomicUsize,
    on_write: Mutex<Option<WriteHook>>,
}

impl MemoryTextStore {
    pub fn new(text: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            text: Mutex::new(text.into()),
            ..Default::default()
        })
    }

    pub fn current(&self) -> String {
        self.text.lock().unwrap().clone()
    }

    /// Simulate an edit made outside the session.
    pub fn set_external(&self, text: impl Into<String>) {
        *self.text.lock().unwrap() = text.into();
    }

    pub fn reject_edits(&self) {
        self.reject.store(true, Ordering::SeqCst);
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn on_write(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.on_write.lock().unwrap() = Some(Box::new(hook));
    }
}

#[async_trait]
impl TextStore for MemoryTextStore {
    async fn text(&self) -> String {
        self.current()
    }

    async fn apply_full_replace(&self, text: String) -> bool {
        if self.reject.load(Ordering::SeqCst) {
            return false;
        }
        *self.text.lock().unwrap() = text;
        self.writes.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = self.on_write.lock().unwrap().as_ref() {
            hook();
        }
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeHost {
    pub root: Option<PathBuf>,
    pub home: Option<PathBuf>,
    pub shell: Option<String>,
}

impl HostEnvironment for FakeHost {
    fn workspace_root(&self) -> Option<PathBuf> {
        self.root.clone()
    }

    fn shell(&self) -> Option<String> {
        self.shell.clone()
    }

    fn home_dir(&self) -> Option<PathBuf> {
        self.home.clone()
    }
}

/// Answers every lookup with a fixed branch and remembers where it was asked.
#[derive(Debug, Default)]
pub struct FakeBranches {
    pub branch: String,
    pub asked: Mutex<Vec<PathBuf>>,
}

impl FakeBranches {
    pub fn new(branch: &str) -> Arc<Self> {
        Arc::new(Self {
            branch: branch.to_string(),
            asked: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl BranchQuery for FakeBranches {
    async fn current_branch(&self, cwd: &Path) -> String {
        self.asked.lock().unwrap().push(cwd.to_path_buf());
        self.branch.clone()
    }
}

#[derive(Debug, Default)]
pub struct StaticShells(pub Vec<ShellConfig>);

impl ShellDiscovery for StaticShells {
    fn available_shells(&self) -> Vec<ShellConfig> {
        self.0.clone()
    }
}

pub fn collaborators(host: FakeHost, branch: &str) -> Collaborators {
    Collaborators {
        host: Arc::new(host),
        branches: FakeBranches::new(branch),
        shells: Arc::new(StaticShells(vec![ShellConfig {
            label: "sh".to_string(),
            path: "/bin/sh".to_string(),
            icon: "terminal-bash".to_string(),
        }])),
    }
}

/// Config that runs blocks through `sh` with no extra environment.
pub fn sh_config() -> FlowConfig {
    FlowConfig {
        shell: Some("sh".to_string()),
        force_color: false,
        ..FlowConfig::default()
    }
}

pub async fn next_message(rx: &mut mpsc::UnboundedReceiver<SessionMessage>) -> SessionMessage {
    tokio::time::timeout(TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for a session message")
        .expect("session message channel closed")
}

/// Receive until `done` matches, returning everything seen (including the
/// matching message).
pub async fn collect_until(
    rx: &mut mpsc::UnboundedReceiver<SessionMessage>,
    done: impl Fn(&SessionMessage) -> bool,
) -> Vec<SessionMessage> {
    let mut seen = Vec::new();
    loop {
        let message = next_message(rx).await;
        let stop = done(&message);
        seen.push(message);
        if stop {
            return seen;
        }
    }
}

/// Assert that nothing arrives for a short while.
pub async fn assert_quiet(rx: &mut mpsc::UnboundedReceiver<SessionMessage>) {
    let got = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
    if let Ok(Some(message)) = got {
        panic!("unexpected session message: {:?}", message);
    }
}

pub fn is_end_of(block_id: &str) -> impl Fn(&SessionMessage) -> bool + '_ {
    move |m| matches!(m, SessionMessage::ExecutionEnd { block_id: id, .. } if id == block_id)
}

/// Concatenated `executionOutput` data for `block_id`.
pub fn output_of(messages: &[SessionMessage], block_id: &str) -> String {
    messages
        .iter()
        .filter_map(|m| match m {
            SessionMessage::ExecutionOutput { block_id: id, data } if id == block_id => {
                Some(data.as_str())
            }
            _ => None,
        })
        .collect()
}
