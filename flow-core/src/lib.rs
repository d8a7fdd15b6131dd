pub mod config;
pub mod context;
pub mod document;
pub mod export;
pub mod host;
pub mod process;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod shell;

// Re-export the main types so hosts can just use `flow_core::SessionRegistry`
pub use config::FlowConfig;
pub use context::ContextService;
pub use document::{Block, BlockKind, BlockStatus, Document, ExecutionContext, Layout};
pub use process::{ExecutionEvent, ProcessManager};
pub use protocol::{SessionMessage, ShellConfig, UiMessage};
pub use registry::SessionRegistry;
pub use session::SessionHandle;

/// Identity of a block inside a document. Assigned at creation, never changes.
pub type BlockId = String;
