//! The bridge's CLI commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use flow_core::document::parse_document;
use flow_core::export::{new_document_text, to_markdown, to_shell_script};
use flow_core::host::{Collaborators, GitBranchQuery, SystemEnvironment};
use flow_core::{Document, FlowConfig, SessionRegistry};
use tokio::sync::mpsc;

use crate::shells::WhichShellDiscovery;
use crate::stdio;
use crate::store::{DocumentWatcher, FileTextStore};

pub fn document_uri(path: &Path) -> String {
    format!("file://{}", path.display())
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("Invalid path {}", path.display()))
}

/// Serve one document over stdin/stdout until stdin closes.
pub async fn open(file: &Path, workspace: Option<PathBuf>, config: FlowConfig) -> Result<()> {
    let file = absolute(file)?;
    let workspace = workspace.or_else(|| file.parent().map(Path::to_path_buf));

    let collaborators = Collaborators {
        host: Arc::new(SystemEnvironment::new(workspace)),
        branches: Arc::new(GitBranchQuery::new(config.git_program.clone())),
        shells: Arc::new(WhichShellDiscovery::default()),
    };
    let mut registry = SessionRegistry::new(collaborators, config);

    let store = Arc::new(FileTextStore::new(&file));
    let (tx, rx) = mpsc::unbounded_channel();
    let uri = document_uri(&file);
    let session = registry.open(uri.clone(), store.clone(), tx);

    let _watcher = match DocumentWatcher::spawn(store, session.clone()) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            tracing::warn!("External edits to {} will not be seen: {:#}", file.display(), e);
            None
        }
    };

    let served = stdio::serve(tokio::io::stdin(), tokio::io::stdout(), session, rx).await;
    registry.close(&uri);
    served
}

/// Write the default document to `file`.
pub async fn new_file(file: &Path, force: bool) -> Result<()> {
    if !force && tokio::fs::try_exists(file).await.unwrap_or(false) {
        bail!("{} already exists (use --force to overwrite)", file.display());
    }
    tokio::fs::write(file, new_document_text())
        .await
        .with_context(|| format!("Failed to write {}", file.display()))?;
    tracing::info!("New Flow file created: {}", file.display());
    Ok(())
}

async fn read_document(file: &Path) -> Result<Document> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    parse_document(&text).with_context(|| format!("Failed to parse {}", file.display()))
}

/// Export as a bash script; returns the path written.
pub async fn export_script(file: &Path, output: Option<PathBuf>) -> Result<PathBuf> {
    let doc = read_document(file).await?;
    let script = to_shell_script(&doc, chrono::Utc::now())?;
    let output = output.unwrap_or_else(|| file.with_extension("sh"));

    tokio::fs::write(&output, script)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;
    tracing::info!("Exported as shell script: {}", output.display());
    Ok(output)
}

/// Export as Markdown; returns the path written.
pub async fn export_markdown(file: &Path, output: Option<PathBuf>) -> Result<PathBuf> {
    let doc = read_document(file).await?;
    let markdown = to_markdown(&doc, chrono::Utc::now());
    let output = output.unwrap_or_else(|| file.with_extension("md"));

    tokio::fs::write(&output, markdown)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;
    tracing::info!("Exported as Markdown: {}", output.display());
    Ok(output)
}
