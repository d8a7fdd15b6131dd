mod support;

use std::path::PathBuf;
use tokio::sync::mpsc;

use flow_core::session::SessionPhase;
use flow_core::{Document, SessionMessage, SessionRegistry};
use support::{collaborators, next_message, sh_config, FakeHost, MemoryTextStore};

fn registry() -> SessionRegistry {
    let host = FakeHost {
        root: Some(std::env::temp_dir()),
        home: Some(PathBuf::from("/home/ada")),
        shell: None,
    };
    SessionRegistry::new(collaborators(host, "main"), sh_config())
}

// ============================================================================
// Open / close
// ============================================================================

#[tokio::test]
async fn test_open_registers_and_initializes() {
    let mut reg = registry();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = reg.open("file:///a.flow", MemoryTextStore::new(""), tx);
    assert_eq!(reg.len(), 1);
    assert_eq!(reg.get("file:///a.flow").map(|h| h.uri()), Some("file:///a.flow"));
    assert!(matches!(next_message(&mut rx).await, SessionMessage::Init { .. }));
    assert_eq!(handle.phase(), SessionPhase::Ready);
}

#[tokio::test]
async fn test_reopen_replaces_existing_session() {
    let mut reg = registry();
    let (tx1, _rx1) = mpsc::unbounded_channel();
    let (tx2, mut rx2) = mpsc::unbounded_channel();

    let first = reg.open("file:///a.flow", MemoryTextStore::new(""), tx1);
    let second = reg.open("file:///a.flow", MemoryTextStore::new(""), tx2);

    assert_eq!(reg.len(), 1);
    assert!(first.is_disposed());
    assert!(!second.is_disposed());
    assert!(matches!(next_message(&mut rx2).await, SessionMessage::Init { .. }));
}

#[tokio::test]
async fn test_close_disposes_and_forgets() {
    let mut reg = registry();
    let (tx, _rx) = mpsc::unbounded_channel();
    let handle = reg.open("file:///a.flow", MemoryTextStore::new(""), tx);

    assert!(reg.close("file:///a.flow"));
    assert!(!reg.close("file:///a.flow"));
    assert!(reg.is_empty());
    handle.wait_for(SessionPhase::Disposed).await;
}

// ============================================================================
// Routing
// ============================================================================

#[tokio::test]
async fn test_text_changed_routes_to_owner() {
    let mut reg = registry();
    let (tx_a, mut rx_a) = mpsc::unbounded_channel();
    let (tx_b, mut rx_b) = mpsc::unbounded_channel();
    let store_a = MemoryTextStore::new("");
    reg.open("file:///a.flow", store_a.clone(), tx_a);
    reg.open("file:///b.flow", MemoryTextStore::new(""), tx_b);
    next_message(&mut rx_a).await;
    next_message(&mut rx_b).await;

    store_a.set_external(Document::default().to_text());
    reg.text_changed("file:///a.flow");
    reg.text_changed("file:///unknown.flow");

    assert!(matches!(
        next_message(&mut rx_a).await,
        SessionMessage::Update { .. }
    ));
    assert!(rx_b.try_recv().is_err());
}

#[tokio::test]
async fn test_dispose_all() {
    let mut reg = registry();
    let (tx, _rx) = mpsc::unbounded_channel();
    let a = reg.open("file:///a.flow", MemoryTextStore::new(""), tx.clone());
    let b = reg.open("file:///b.flow", MemoryTextStore::new(""), tx);

    let mut uris: Vec<&str> = reg.uris().collect();
    uris.sort();
    assert_eq!(uris, vec!["file:///a.flow", "file:///b.flow"]);

    reg.dispose_all();
    assert!(reg.is_empty());
    assert!(a.is_disposed() && b.is_disposed());
}
