//! Plain-text flattening of rich text
//!
//! Spreadsheet cells and speaker notes carry no inline formatting, so these
//! helpers reduce markup or parsed blocks to bare text.

use super::blocks::{ListItem, RichTextNode};
use super::parser::{decode_entities, CLIENT_KEYWORD};
use super::text_run::InlineRun;
use regex::Regex;
use std::sync::LazyLock;

static BREAK_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</(p|li|pre|div|h[1-6])\s*>").expect("break regex is valid")
});

static ANY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->|<[^>]*>").expect("tag regex is valid"));

/// Remove all tags from markup, keeping block boundaries as line breaks
///
/// Used when markup is too broken to parse structurally.
pub fn strip_tags(markup: &str) -> String {
    let with_breaks = BREAK_TAG.replace_all(markup, "\n");
    let stripped = ANY_TAG.replace_all(&with_breaks, "");
    decode_entities(&stripped)
}

/// Text of a run sequence, with unresolved client keywords kept literally
pub fn runs_text(runs: &[InlineRun]) -> String {
    runs.iter()
        .map(|run| match run {
            InlineRun::Text(text) => text.content.clone(),
            InlineRun::ClientPlaceholder => CLIENT_KEYWORD.to_string(),
            InlineRun::CaptionPlaceholder { text } => text.clone(),
            InlineRun::EvidenceReference { keyword } => format!("{{{{.{}}}}}", keyword),
        })
        .collect()
}

/// Plain-text rendering of one block
///
/// Bullet items get a `• ` marker and numbered items their number, indented
/// two spaces per nesting level.
pub fn block_text(node: &RichTextNode) -> String {
    match node {
        RichTextNode::Paragraph { runs } => runs_text(runs),
        RichTextNode::CodeBlock { lines } => lines.join("\n"),
        RichTextNode::BulletList { items } => list_text(items, |_| "•".to_string()),
        RichTextNode::NumberList { items, numbering } => {
            let mut number = numbering.start;
            list_text(items, |item| {
                if item.level == 0 {
                    let marker = format!("{}.", number);
                    number += 1;
                    marker
                } else {
                    "-".to_string()
                }
            })
        }
    }
}

fn list_text(items: &[ListItem], mut marker: impl FnMut(&ListItem) -> String) -> String {
    items
        .iter()
        .map(|item| {
            format!(
                "{}{} {}",
                "  ".repeat(item.level),
                marker(item),
                runs_text(&item.runs).trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
