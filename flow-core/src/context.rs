//! The live execution context of a session: where, on which branch and in
//! which shell the next command would run.
//!
//! Owned by the session task; callers only ever get snapshots.

use std::path::Path;
use std::sync::Arc;

use crate::document::ExecutionContext;
use crate::host::{BranchQuery, HostEnvironment};
use crate::shell::platform_default_shell;

const DEFAULT_BRANCH: &str = "main";

pub struct ContextService {
    context: ExecutionContext,
    host: Arc<dyn HostEnvironment>,
    branches: Arc<dyn BranchQuery>,
    shell_override: Option<String>,
}

impl std::fmt::Debug for ContextService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextService")
            .field("context", &self.context)
            .field("shell_override", &self.shell_override)
            .finish()
    }
}

impl ContextService {
    /// Seeds cwd from the home directory; call [`refresh`](Self::refresh)
    /// to pick up the workspace.
    pub fn new(
        host: Arc<dyn HostEnvironment>,
        branches: Arc<dyn BranchQuery>,
        shell_override: Option<String>,
    ) -> Self {
        let cwd = host
            .home_dir()
            .or_else(|| std::env::current_dir().ok())
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());

        let mut service = Self {
            context: ExecutionContext {
                cwd,
                branch: DEFAULT_BRANCH.to_string(),
                shell: String::new(),
            },
            host,
            branches,
            shell_override,
        };
        service.context.shell = service.detect_shell();
        service
    }

    /// Owned snapshot; later mutation is never visible through it.
    pub fn get_context(&self) -> ExecutionContext {
        self.context.clone()
    }

    pub async fn set_cwd(&mut self, cwd: impl Into<String>) {
        self.context.cwd = cwd.into();
        self.refresh_branch().await;
    }

    pub fn set_shell(&mut self, shell: impl Into<String>) {
        self.context.shell = shell.into();
    }

    /// Replace the live context with one persisted in the document.
    pub fn adopt(&mut self, context: ExecutionContext) {
        if context != self.context {
            tracing::debug!("Adopting document context: {:?}", context);
            self.context = context;
        }
    }

    /// Re-derive cwd from the workspace root and the shell from the host.
    /// Never fails; anything that cannot be determined keeps its old value.
    pub async fn refresh(&mut self) {
        if let Some(root) = self.host.workspace_root() {
            self.context.cwd = root.to_string_lossy().to_string();
            self.refresh_branch().await;
        }

        let shell = self.detect_shell();
        if !shell.is_empty() {
            self.context.shell = shell;
        }
    }

    async fn refresh_branch(&mut self) {
        let branch = self
            .branches
            .current_branch(Path::new(&self.context.cwd))
            .await;
        if branch.is_empty() {
            tracing::debug!("No branch for {}; keeping {}", self.context.cwd, self.context.branch);
        } else {
            self.context.branch = branch;
        }
    }

    /// Configured override > host signal > platform default.
    fn detect_shell(&self) -> String {
        self.shell_override
            .clone()
            .or_else(|| self.host.shell())
            .unwrap_or_else(|| platform_default_shell().to_string())
    }
}
