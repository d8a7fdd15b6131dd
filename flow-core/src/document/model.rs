//! Flow document model.
//!
//! Field names follow the on-disk JSON (camelCase); optional fields are
//! omitted when absent so a parse → serialize cycle keeps documents stable.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use uuid::Uuid;

use crate::BlockId;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    Masonry,
    #[default]
    Grid,
}

/// The "as-if-typed-at-a-prompt" state a command runs in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub cwd: String,
    pub branch: String,
    pub shell: String,
}

impl ExecutionContext {
    pub fn cwd_path(&self) -> &Path {
        Path::new(&self.cwd)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockStatus {
    Idle,
    Running,
    Success,
    Error,
}

impl BlockStatus {
    pub fn from_exit_code(code: i32) -> Self {
        if code == 0 {
            BlockStatus::Success
        } else {
            BlockStatus::Error
        }
    }
}

/// Layout rectangle of a block on the canvas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pos {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShellBlock {
    pub cmd: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Frozen snapshot of the context the command was issued in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ExecutionContext>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkdownBlock {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BlockKind {
    Shell(ShellBlock),
    Markdown(MarkdownBlock),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    #[serde(default)]
    pub pos: Pos,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<BlockStatus>,
    #[serde(flatten)]
    pub kind: BlockKind,
}

impl Block {
    pub fn new_shell(cmd: impl Into<String>) -> Self {
        Self {
            id: new_block_id(),
            pos: Pos::default(),
            status: Some(BlockStatus::Idle),
            kind: BlockKind::Shell(ShellBlock {
                cmd: cmd.into(),
                output: None,
                exit_code: None,
                context: None,
            }),
        }
    }

    pub fn new_markdown(content: impl Into<String>) -> Self {
        Self {
            id: new_block_id(),
            pos: Pos::default(),
            status: None,
            kind: BlockKind::Markdown(MarkdownBlock {
                content: content.into(),
            }),
        }
    }

    pub fn is_shell(&self) -> bool {
        matches!(self.kind, BlockKind::Shell(_))
    }

    pub fn as_shell(&self) -> Option<&ShellBlock> {
        match &self.kind {
            BlockKind::Shell(shell) => Some(shell),
            BlockKind::Markdown(_) => None,
        }
    }
}

fn new_block_id() -> BlockId {
    Uuid::new_v4().simple().to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub layout: Layout,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    pub blocks: Vec<Block>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ExecutionContext>,
}

impl Document {
    pub fn block(&self, id: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn is_shell_block(&self, id: &str) -> bool {
        self.block(id).is_some_and(Block::is_shell)
    }

    /// `(id, cmd)` of every shell block, in document order.
    pub fn shell_commands(&self) -> Vec<(BlockId, String)> {
        self.blocks
            .iter()
            .filter_map(|b| b.as_shell().map(|s| (b.id.clone(), s.cmd.clone())))
            .collect()
    }

    /// Reset every shell block to a never-run state.
    pub fn clear_outputs(&mut self) {
        for block in &mut self.blocks {
            if let BlockKind::Shell(shell) = &mut block.kind {
                shell.output = Some(String::new());
                shell.exit_code = None;
                block.status = Some(BlockStatus::Idle);
            }
        }
    }
}
