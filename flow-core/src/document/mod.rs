//! Document model + text codec.
//!
//! A Flow document is a JSON object holding the layout, user variables, an
//! ordered list of blocks and the persisted execution context. The serialized
//! text of the host buffer *is* the document; there is no other storage.
//!
//! Parsing never fails at the boundary: `Document::from_text_or_default`
//! substitutes the default document and logs the `ParseIssue`.

pub mod model;
pub mod parse;

pub use model::{
    Block, BlockKind, BlockStatus, Document, ExecutionContext, Layout, MarkdownBlock, Pos,
    ShellBlock,
};
pub use parse::{parse_document, serialize_document, ParseIssue};
