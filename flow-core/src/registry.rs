//! Uri → session map owned by the host.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::FlowConfig;
use crate::host::{Collaborators, TextStore};
use crate::protocol::SessionMessage;
use crate::session::SessionHandle;

#[derive(Debug)]
pub struct SessionRegistry {
    sessions: HashMap<String, SessionHandle>,
    collaborators: Collaborators,
    config: FlowConfig,
}

impl SessionRegistry {
    pub fn new(collaborators: Collaborators, config: FlowConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            collaborators,
            config,
        }
    }

    /// Start a session for `uri`. A session already open for the same uri
    /// is disposed and replaced.
    pub fn open(
        &mut self,
        uri: impl Into<String>,
        store: Arc<dyn TextStore>,
        ui: mpsc::UnboundedSender<SessionMessage>,
    ) -> SessionHandle {
        let uri = uri.into();
        let handle = SessionHandle::spawn(
            uri.clone(),
            store,
            ui,
            self.collaborators.clone(),
            &self.config,
        );

        if let Some(previous) = self.sessions.insert(uri.clone(), handle.clone()) {
            tracing::info!("Replacing existing session for {}", uri);
            previous.dispose();
        }
        handle
    }

    /// Dispose and forget the session for `uri`. Returns whether one existed.
    pub fn close(&mut self, uri: &str) -> bool {
        match self.sessions.remove(uri) {
            Some(handle) => {
                handle.dispose();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, uri: &str) -> Option<&SessionHandle> {
        self.sessions.get(uri)
    }

    /// Route a host change notification to the owning session.
    pub fn text_changed(&self, uri: &str) {
        match self.sessions.get(uri) {
            Some(handle) => handle.notify_text_changed(),
            None => tracing::debug!("Change notification for unknown document {}", uri),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn uris(&self) -> impl Iterator<Item = &str> {
        self.sessions.keys().map(String::as_str)
    }

    pub fn dispose_all(&mut self) {
        if !self.sessions.is_empty() {
            tracing::info!("Disposing {} sessions", self.sessions.len());
        }
        for (_, handle) in self.sessions.drain() {
            handle.dispose();
        }
    }
}

impl Drop for SessionRegistry {
    fn drop(&mut self) {
        self.dispose_all();
    }
}
