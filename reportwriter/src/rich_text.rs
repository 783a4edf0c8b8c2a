//! Rich-text document model
//!
//! Report fields are edited in a WYSIWYG editor and stored as a small HTML
//! dialect. This module parses that markup into blocks of styled runs that
//! every exporter renders into its own format.

// Submodules
mod blocks;
mod parser;
mod plain;
mod text_run;

// Re-export public types
pub use blocks::{ListItem, ListNumbering, RichTextNode};
pub use parser::{
    decode_entities, looks_like_markup, parse, ParseContext, RichTextParser, CAPTION_KEYWORD,
    CLIENT_KEYWORD,
};
pub use plain::{block_text, runs_text, strip_tags};
pub use text_run::{InlineRun, TextRun, TextStyle};
