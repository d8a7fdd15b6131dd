//! Contracts for the host-side collaborators the session core consumes.
//!
//! The core never touches the editor's buffers, the shell-profile settings
//! or the version-control system directly; it goes through these traits.
//! `SystemEnvironment` and `GitBranchQuery` are the stock implementations.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::protocol::ShellConfig;

/// The host's text buffer for one document.
#[async_trait]
pub trait TextStore: Send + Sync {
    /// Current full text of the buffer.
    async fn text(&self) -> String;

    /// Replace the whole buffer. Returns whether the host accepted the edit.
    async fn apply_full_replace(&self, text: String) -> bool;
}

/// Resolves the shells the user can pick from.
pub trait ShellDiscovery: Send + Sync {
    fn available_shells(&self) -> Vec<ShellConfig>;
}

/// Version-control branch lookup. Returns an empty string on any failure.
#[async_trait]
pub trait BranchQuery: Send + Sync {
    async fn current_branch(&self, cwd: &Path) -> String;
}

/// Ambient facts about the host process.
pub trait HostEnvironment: Send + Sync {
    /// Root folder of the open workspace, if there is one.
    fn workspace_root(&self) -> Option<PathBuf>;
    /// Shell the host itself reports, if any.
    fn shell(&self) -> Option<String>;
    fn home_dir(&self) -> Option<PathBuf>;
}

/// Everything a session needs besides its own text store.
#[derive(Clone)]
pub struct Collaborators {
    pub host: Arc<dyn HostEnvironment>,
    pub branches: Arc<dyn BranchQuery>,
    pub shells: Arc<dyn ShellDiscovery>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("host", &"Arc<dyn HostEnvironment>")
            .field("branches", &"Arc<dyn BranchQuery>")
            .field("shells", &"Arc<dyn ShellDiscovery>")
            .finish()
    }
}

/// Host environment backed by the process environment.
#[derive(Debug, Clone, Default)]
pub struct SystemEnvironment {
    workspace_root: Option<PathBuf>,
}

impl SystemEnvironment {
    pub fn new(workspace_root: Option<PathBuf>) -> Self {
        Self { workspace_root }
    }
}

impl HostEnvironment for SystemEnvironment {
    fn workspace_root(&self) -> Option<PathBuf> {
        self.workspace_root.clone()
    }

    fn shell(&self) -> Option<String> {
        std::env::var("SHELL").ok().filter(|s| !s.trim().is_empty())
    }

    fn home_dir(&self) -> Option<PathBuf> {
        std::env::var("USERPROFILE")
            .or_else(|_| std::env::var("HOME"))
            .ok()
            .map(PathBuf::from)
    }
}

/// Branch lookup through `git rev-parse --abbrev-ref HEAD`.
#[derive(Debug, Clone)]
pub struct GitBranchQuery {
    program: String,
}

impl GitBranchQuery {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn query(&self, cwd: &Path) -> Result<String> {
        let output = tokio::process::Command::new(&self.program)
            .args(["rev-parse", "--abbrev-ref", "HEAD"])
            .current_dir(cwd)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.program))?;

        if !output.status.success() {
            anyhow::bail!("{} exited with {}", self.program, output.status);
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl Default for GitBranchQuery {
    fn default() -> Self {
        Self::new("git")
    }
}

#[async_trait]
impl BranchQuery for GitBranchQuery {
    async fn current_branch(&self, cwd: &Path) -> String {
        match self.query(cwd).await {
            Ok(branch) => branch,
            Err(e) => {
                tracing::debug!("Branch lookup in {} failed: {:#}", cwd.display(), e);
                String::new()
            }
        }
    }
}

/// Replace a leading `~` with the home directory. `~user` forms are left alone.
pub fn expand_tilde(path: &str, home: Option<&Path>) -> String {
    let Some(home) = home else {
        return path.to_string();
    };
    if path == "~" {
        return home.to_string_lossy().to_string();
    }
    match path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        Some(rest) => home.join(rest).to_string_lossy().to_string(),
        None => path.to_string(),
    }
}
