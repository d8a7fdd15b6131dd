use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use flow_bridge::shells::WhichShellDiscovery;
use flow_bridge::store::{DocumentWatcher, FileTextStore};
use flow_core::host::{Collaborators, GitBranchQuery, SystemEnvironment, TextStore};
use flow_core::{Block, Document, FlowConfig, SessionHandle, SessionMessage};
use tokio::sync::mpsc;

const TIMEOUT: Duration = Duration::from_secs(10);
const SETTLE: Duration = Duration::from_millis(500);

fn doc_running(cmd: &str) -> String {
    Document {
        blocks: vec![Block::new_shell(cmd)],
        ..Document::default()
    }
    .to_text()
}

/// Replace `path` the way an editor saving by rename would.
fn replace_externally(path: &Path, text: &str) {
    let tmp = path.with_file_name("editor-save.tmp");
    std::fs::write(&tmp, text).unwrap();
    std::fs::rename(&tmp, path).unwrap();
}

async fn next_update(rx: &mut mpsc::UnboundedReceiver<SessionMessage>) -> Document {
    loop {
        let message = tokio::time::timeout(TIMEOUT, rx.recv())
            .await
            .expect("timed out waiting for update")
            .expect("session closed");
        if let SessionMessage::Update { document } = message {
            return document;
        }
    }
}

async fn drain_updates(rx: &mut mpsc::UnboundedReceiver<SessionMessage>) -> usize {
    tokio::time::sleep(SETTLE).await;
    let mut updates = 0;
    while let Ok(message) = rx.try_recv() {
        if matches!(message, SessionMessage::Update { .. }) {
            updates += 1;
        }
    }
    updates
}

fn commands(doc: &Document) -> Vec<String> {
    doc.shell_commands().into_iter().map(|(_, cmd)| cmd).collect()
}

// ============================================================================
// FileTextStore
// ============================================================================

#[tokio::test]
async fn test_missing_file_reads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileTextStore::new(dir.path().join("none.flow"));
    assert_eq!(store.text().await, "");
}

#[tokio::test]
async fn test_replace_writes_and_remembers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.flow");
    let store = FileTextStore::new(&path);

    assert!(store.apply_full_replace("{\"blocks\": []}".to_string()).await);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"blocks\": []}");
    assert_eq!(store.text().await, "{\"blocks\": []}");
    assert!(store.is_own_write("{\"blocks\": []}").await);

    std::fs::write(&path, "edited elsewhere").unwrap();
    assert!(!store.is_own_write(&store.text().await).await);
}

#[tokio::test]
async fn test_failed_write_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileTextStore::new(dir.path().join("missing-dir").join("doc.flow"));

    assert!(!store.apply_full_replace("x".to_string()).await);
    assert!(!store.is_own_write("x").await);
}

#[tokio::test]
async fn test_failed_write_leaves_no_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.flow");
    std::fs::create_dir(&path).unwrap();
    let store = FileTextStore::new(&path);

    assert!(!store.apply_full_replace("x".to_string()).await);
    let names: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(names, vec![std::ffi::OsString::from("doc.flow")]);
}

// ============================================================================
// DocumentWatcher
// ============================================================================

#[tokio::test]
async fn test_external_revert_after_own_write_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    let path = root.join("notes.flow");

    let store = Arc::new(FileTextStore::new(&path));
    let collaborators = Collaborators {
        host: Arc::new(SystemEnvironment::new(Some(root.clone()))),
        branches: Arc::new(GitBranchQuery::default()),
        shells: Arc::new(WhichShellDiscovery::new(vec![])),
    };
    let config = FlowConfig {
        shell: Some("sh".to_string()),
        ..FlowConfig::default()
    };
    let (tx, mut rx) = mpsc::unbounded_channel();
    let session = SessionHandle::spawn(
        "file:///notes.flow",
        store.clone(),
        tx,
        collaborators,
        &config,
    );
    let init = tokio::time::timeout(TIMEOUT, rx.recv()).await.unwrap().unwrap();
    assert!(matches!(init, SessionMessage::Init { .. }));

    let _watcher = DocumentWatcher::spawn(store.clone(), session.clone()).unwrap();

    replace_externally(&path, &doc_running("echo X"));
    assert_eq!(commands(&next_update(&mut rx).await), vec!["echo X"]);
    drain_updates(&mut rx).await;

    assert!(store.apply_full_replace(doc_running("echo Y")).await);
    assert_eq!(drain_updates(&mut rx).await, 0);

    replace_externally(&path, &doc_running("echo X"));
    assert_eq!(commands(&next_update(&mut rx).await), vec!["echo X"]);

    session.dispose();
}
