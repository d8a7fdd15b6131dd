//! File-backed text store and the watcher that turns external edits into
//! session change notifications.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use flow_core::host::TextStore;
use flow_core::SessionHandle;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// The document buffer is the file itself.
#[derive(Debug)]
pub struct FileTextStore {
    path: PathBuf,
    last_written: Mutex<Option<String>>,
}

impl FileTextStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_written: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `text` is exactly what this store last wrote.
    pub async fn is_own_write(&self, text: &str) -> bool {
        self.last_written.lock().await.as_deref() == Some(text)
    }
}

#[async_trait]
impl TextStore for FileTextStore {
    async fn text(&self) -> String {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", self.path.display(), e);
                String::new()
            }
        }
    }

    async fn apply_full_replace(&self, text: String) -> bool {
        // Recorded before the write so the watcher never sees the new
        // contents without knowing they are ours.
        let mut last = self.last_written.lock().await;
        let previous = last.replace(text.clone());

        match write_atomic(&self.path, &text).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to write {}: {:#}", self.path.display(), e);
                *last = previous;
                false
            }
        }
    }
}

/// Write through a sibling temp file and rename, so a watcher never reads a
/// half-written document.
async fn write_atomic(path: &Path, text: &str) -> Result<()> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid document path {}", path.display()))?;
    let tmp_path = path.with_file_name(format!(".{}.flow-tmp", name));

    tokio::fs::write(&tmp_path, text)
        .await
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e).with_context(|| format!("Failed to replace {}", path.display()));
    }
    Ok(())
}

/// Watches the document's directory and notifies the session when the file
/// changes to something other than the store's own last write.
pub struct DocumentWatcher {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl DocumentWatcher {
    pub fn spawn(store: Arc<FileTextStore>, session: SessionHandle) -> Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel();

        // Bridge the notify callback thread into tokio.
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let _ = tx.send(res);
            },
            Config::default(),
        )
        .context("Failed to create file watcher")?;

        // Editors often save by rename, so watch the directory, not the file.
        let dir = store
            .path()
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", dir.display()))?;

        let task = tokio::spawn(async move {
            let mut last_seen: Option<String> = None;
            while let Some(res) = rx.recv().await {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::error!("Watch error: {:?}", e);
                        continue;
                    }
                };
                if !is_content_change(&event) || !touches(&event, store.path()) {
                    continue;
                }

                let text = store.text().await;
                if store.is_own_write(&text).await {
                    tracing::debug!("Ignoring own write to {}", store.path().display());
                    // The file moved on; a later revert to the previous
                    // external text is a fresh change.
                    last_seen = None;
                    continue;
                }
                if last_seen.as_deref() == Some(text.as_str()) {
                    continue;
                }
                last_seen = Some(text);

                tracing::info!("{} changed on disk", store.path().display());
                session.notify_text_changed();
            }
        });

        Ok(Self {
            _watcher: watcher,
            task,
        })
    }
}

impl Drop for DocumentWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn is_content_change(event: &Event) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
}

fn touches(event: &Event, file: &Path) -> bool {
    let Some(name) = file.file_name() else {
        return false;
    };
    event.paths.iter().any(|p| p.file_name() == Some(name))
}
