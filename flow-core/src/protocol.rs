//! Session ⇄ UI message protocol.
//!
//! Both directions are JSON objects discriminated by `type`, with camelCase
//! field names, e.g. `{"type":"execute","blockId":"a1","cmd":"ls"}`.

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::BlockId;

/// Intents sent by the rendering layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum UiMessage {
    Ready,
    Update { document: Document },
    Log { message: String },
    Execute { block_id: BlockId, cmd: String },
    Stop { block_id: BlockId },
    TerminalInput { block_id: BlockId, data: String },
    RequestShellConfig,
}

/// Messages pushed to the rendering layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SessionMessage {
    Init { document: Document },
    Update { document: Document },
    Ack { success: bool },
    ExecutionStart { block_id: BlockId },
    ExecutionOutput { block_id: BlockId, data: String },
    ExecutionEnd { block_id: BlockId, exit_code: i32 },
    ShellConfig { shells: Vec<ShellConfig> },
}

/// A shell the user can pick for the document context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellConfig {
    pub label: String,
    pub path: String,
    pub icon: String,
}
