//! Document exports: a runnable bash script and a Markdown write-up.
//!
//! Both are pure functions of the document and a timestamp; writing the
//! result somewhere is the host's business.

use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use crate::document::{BlockKind, Document};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExportError {
    #[error("document has no shell blocks to export")]
    NoShellBlocks,
}

/// Text of a freshly created `.flow` file.
pub fn new_document_text() -> String {
    Document::default().to_text()
}

/// Bash script running every shell block in order, stopping at the first
/// failure.
pub fn to_shell_script(doc: &Document, generated: DateTime<Utc>) -> Result<String, ExportError> {
    let commands = doc.shell_commands();
    if commands.is_empty() {
        return Err(ExportError::NoShellBlocks);
    }

    let mut lines = vec![
        "#!/bin/bash".to_string(),
        String::new(),
        "# Generated from Flow document".to_string(),
        format!(
            "# Date: {}",
            generated.to_rfc3339_opts(SecondsFormat::Millis, true)
        ),
        String::new(),
        "set -e  # Exit on error".to_string(),
        String::new(),
    ];

    if !doc.variables.is_empty() {
        lines.push("# Variables".to_string());
        for (key, value) in &doc.variables {
            if !is_shell_identifier(key) {
                tracing::warn!("Skipping variable {:?}: not a valid shell name", key);
                continue;
            }
            lines.push(format!("export {}=\"{}\"", key, escape_double_quoted(value)));
        }
        lines.push(String::new());
    }

    for (i, (id, cmd)) in commands.iter().enumerate() {
        lines.push(format!("# Block {}: {}", i + 1, id));
        lines.push(cmd.clone());
        lines.push(String::new());
    }

    Ok(lines.join("\n"))
}

fn is_shell_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

fn escape_double_quoted(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Markdown rendering: variables, context, then every block numbered by its
/// position in the document.
pub fn to_markdown(doc: &Document, generated: DateTime<Utc>) -> String {
    let mut lines = vec![
        "# Flow Document".to_string(),
        String::new(),
        format!("**Generated**: {}", generated.format("%Y-%m-%d %H:%M:%S UTC")),
        String::new(),
    ];

    if !doc.variables.is_empty() {
        lines.push("## Variables".to_string());
        lines.push(String::new());
        for (key, value) in &doc.variables {
            lines.push(format!("- `{}` = `{}`", key, value));
        }
        lines.push(String::new());
    }

    if let Some(ctx) = &doc.context {
        lines.push("## Context".to_string());
        lines.push(String::new());
        lines.push(format!("- **Working Directory**: `{}`", ctx.cwd));
        lines.push(format!("- **Git Branch**: `{}`", ctx.branch));
        lines.push(format!("- **Shell**: `{}`", ctx.shell));
        lines.push(String::new());
    }

    lines.push("## Commands".to_string());
    lines.push(String::new());

    for (i, block) in doc.blocks.iter().enumerate() {
        let n = i + 1;
        match &block.kind {
            BlockKind::Shell(shell) => {
                lines.push(format!("### {}. Shell Command", n));
                lines.push(String::new());
                lines.push("```bash".to_string());
                lines.push(shell.cmd.clone());
                lines.push("```".to_string());
                lines.push(String::new());

                if let Some(output) = shell.output.as_deref().filter(|o| !o.is_empty()) {
                    lines.push("**Output:**".to_string());
                    lines.push(String::new());
                    lines.push("```".to_string());
                    lines.push(output.trim().to_string());
                    lines.push("```".to_string());
                    lines.push(String::new());
                }

                if let Some(code) = shell.exit_code {
                    lines.push(format!("**Exit Code**: {}", code));
                    lines.push(String::new());
                }
            }
            BlockKind::Markdown(md) => {
                lines.push(format!("### {}. Documentation", n));
                lines.push(String::new());
                lines.push(md.content.clone());
                lines.push(String::new());
            }
        }
    }

    lines.join("\n")
}
