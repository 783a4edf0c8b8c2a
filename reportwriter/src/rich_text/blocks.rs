//! Block-level rich-text elements
//!
//! The editor only produces four kinds of top-level blocks: paragraphs,
//! preformatted code, bulleted lists and numbered lists.

use super::text_run::InlineRun;

/// Block-level node of the rich-text document model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RichTextNode {
    /// A paragraph of inline runs
    Paragraph {
        /// Inline content in document order
        runs: Vec<InlineRun>,
    },

    /// An opaque block of preformatted text
    CodeBlock {
        /// Literal lines, without line terminators
        lines: Vec<String>,
    },

    /// An unordered list
    BulletList {
        /// Items in document order
        items: Vec<ListItem>,
    },

    /// An ordered list
    NumberList {
        /// Items in document order
        items: Vec<ListItem>,
        /// Where this list's numbering comes from
        numbering: ListNumbering,
    },
}

impl RichTextNode {
    /// Create a paragraph from runs
    pub fn paragraph(runs: Vec<InlineRun>) -> Self {
        RichTextNode::Paragraph { runs }
    }

    /// The placeholder this node stands for, if it is a keyword paragraph
    ///
    /// Keyword paragraphs always hold exactly one placeholder run.
    pub fn placeholder(&self) -> Option<&InlineRun> {
        match self {
            RichTextNode::Paragraph { runs } => match runs.as_slice() {
                [run @ InlineRun::CaptionPlaceholder { .. }]
                | [run @ InlineRun::EvidenceReference { .. }] => Some(run),
                _ => None,
            },
            _ => None,
        }
    }
}

/// One list entry with its inline content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    /// Nesting depth (0 = top-level item)
    pub level: usize,

    /// Inline content of the item
    pub runs: Vec<InlineRun>,
}

impl ListItem {
    /// Create a new list item
    pub fn new(level: usize, runs: Vec<InlineRun>) -> Self {
        Self { level, runs }
    }
}

/// Numbering bookkeeping for an ordered list
///
/// Two `<ol>` elements split by a paragraph form one logical list when the
/// second one continues the first; they then share a `list_id` and an
/// exporter renders them with the same numbering instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListNumbering {
    /// Logical list identifier, unique within one parsed field
    pub list_id: usize,

    /// Number of the first item
    pub start: u32,

    /// Whether this list continues the previous ordered list
    pub continues_previous: bool,
}
