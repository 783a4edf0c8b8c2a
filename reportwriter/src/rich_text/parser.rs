//! Lenient HTML parser for rich-text fields
//!
//! Converts the markup stored by the report editor into [`RichTextNode`]s.
//! quick-xml does the tokenising, configured to tolerate HTML: end tags are
//! not matched against start tags, unmatched closing tags are ignored and
//! void elements (`<br>`) need no closing tag. The element stack is kept
//! here, so unclosed and misnested tags still produce sensible output.

use super::blocks::{ListItem, ListNumbering, RichTextNode};
use super::plain::strip_tags;
use super::text_run::{InlineRun, TextRun, TextStyle};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use std::sync::LazyLock;

/// Keyword replaced by the client's display name
pub const CLIENT_KEYWORD: &str = "{{.client}}";

/// Keyword that turns a paragraph into a figure caption
pub const CAPTION_KEYWORD: &str = "{{.caption}}";

/// A paragraph consisting solely of `{{.name}}`
static KEYWORD_PARAGRAPH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\{\{\.([^{}\s]+)\}\}$").expect("keyword regex is valid"));

/// HTML elements that never have content
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Caller-supplied context for one field
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseContext<'a> {
    /// Replacement for `{{.client}}`; `None` keeps the keyword as a placeholder run
    pub client_name: Option<&'a str>,

    /// Field label used in diagnostics (e.g. "SQLi / description")
    pub field: &'a str,
}

impl<'a> ParseContext<'a> {
    /// Context for a named field with a known client name
    pub fn new(client_name: &'a str, field: &'a str) -> Self {
        Self {
            client_name: Some(client_name),
            field,
        }
    }
}

/// Top-level element classification
#[derive(Debug, Clone, PartialEq, Eq)]
enum BlockKind {
    Paragraph,
    Preformatted,
    UnorderedList,
    OrderedList,
    Unknown(String),
}

impl BlockKind {
    fn from_tag(name: &str) -> Self {
        match name {
            "p" => BlockKind::Paragraph,
            "pre" => BlockKind::Preformatted,
            "ul" => BlockKind::UnorderedList,
            "ol" => BlockKind::OrderedList,
            other => BlockKind::Unknown(other.to_string()),
        }
    }
}

/// Inline element classification
#[derive(Debug, Clone, PartialEq, Eq)]
enum InlineTag {
    Emphasis,
    Strong,
    Underline,
    Code,
    Span(TextStyle),
    /// Transparent wrappers (`<p>` inside `<li>`, `<a>`, `<sub>`, ...)
    Transparent,
    Unknown(String),
}

impl InlineTag {
    fn from_tag(name: &str, tag: &BytesStart<'_>) -> Self {
        match name {
            "em" | "i" => InlineTag::Emphasis,
            "strong" | "b" => InlineTag::Strong,
            "u" => InlineTag::Underline,
            "code" => InlineTag::Code,
            "span" => InlineTag::Span(
                attribute(tag, "class")
                    .map(|classes| TextStyle::from_classes(&classes))
                    .unwrap_or_default(),
            ),
            "p" | "a" | "sub" | "sup" | "font" => InlineTag::Transparent,
            other => InlineTag::Unknown(other.to_string()),
        }
    }

    /// Style this tag contributes on top of its parent's
    fn style(&self) -> TextStyle {
        match self {
            InlineTag::Emphasis => TextStyle {
                italic: true,
                ..TextStyle::default()
            },
            InlineTag::Strong => TextStyle {
                bold: true,
                ..TextStyle::default()
            },
            InlineTag::Underline => TextStyle {
                underline: true,
                ..TextStyle::default()
            },
            InlineTag::Code => TextStyle {
                inline_code: true,
                ..TextStyle::default()
            },
            InlineTag::Span(style) => *style,
            InlineTag::Transparent | InlineTag::Unknown(_) => TextStyle::default(),
        }
    }
}

/// What an open element means to the parser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    /// `<html>`, `<body>`
    Wrapper,
    /// Ignored subtree (unsupported block, `<head>`)
    Skipped,
    /// The `<p>` or `<pre>` that owns the current block
    Block,
    /// A list element; `nested` lists live inside an item of the outer list
    List { nested: bool },
    /// `<li>`
    Item,
    /// Styling or transparent inline element
    Inline,
}

/// An element on the open-element stack
#[derive(Debug)]
struct OpenElement {
    name: String,
    role: Role,
    /// Cumulative style of everything inside this element
    style: TextStyle,
}

/// Block under construction
#[derive(Debug)]
enum BlockBuilder {
    Paragraph(Vec<InlineRun>),
    Code(String),
    List(ListBuilder),
}

/// Context for building a list
#[derive(Debug)]
struct ListBuilder {
    ordered: bool,
    /// Value of the `start` attribute (1 when absent)
    start: u32,
    items: Vec<ListItem>,
    /// Item currently receiving content
    current_item: Option<ListItem>,
    /// Current nesting depth (0 = outermost list)
    depth: usize,
}

impl ListBuilder {
    fn new(ordered: bool, start: u32) -> Self {
        Self {
            ordered,
            start,
            items: Vec::new(),
            current_item: None,
            depth: 0,
        }
    }

    fn start_item(&mut self) {
        self.finish_item();
        self.current_item = Some(ListItem::new(self.depth, Vec::new()));
    }

    fn finish_item(&mut self) {
        if let Some(item) = self.current_item.take() {
            if !item.runs.is_empty() {
                self.items.push(item);
            }
        }
    }

    /// Item that should receive text, created on demand
    fn item_mut(&mut self) -> &mut ListItem {
        let depth = self.depth;
        self.current_item
            .get_or_insert_with(|| ListItem::new(depth, Vec::new()))
    }
}

/// Where the last ordered list left off
#[derive(Debug, Clone, Copy)]
struct OrderedCursor {
    list_id: usize,
    next_number: u32,
}

/// Parser state for converting editor markup into blocks
pub struct RichTextParser<'a> {
    context: ParseContext<'a>,

    /// Open elements, innermost last
    stack: Vec<OpenElement>,

    /// Block currently being built
    current_block: Option<BlockBuilder>,

    /// Completed blocks
    blocks: Vec<RichTextNode>,

    /// Previous ordered list, for numbering continuation
    last_ordered: Option<OrderedCursor>,

    /// Next logical list identifier
    next_list_id: usize,
}

impl<'a> RichTextParser<'a> {
    /// Create a new parser
    pub fn new(context: ParseContext<'a>) -> Self {
        Self {
            context,
            stack: Vec::new(),
            current_block: None,
            blocks: Vec::new(),
            last_ordered: None,
            next_list_id: 1,
        }
    }

    /// Parse a rich-text field into blocks
    ///
    /// Never fails: input without markup is read as plain text, and markup
    /// the tokenizer rejects degrades to its tag-stripped text with a
    /// warning naming the field.
    pub fn parse(markup: &str, context: ParseContext<'_>) -> Vec<RichTextNode> {
        if !looks_like_markup(markup) {
            return parse_plain_text(markup, &context);
        }

        let mut parser = RichTextParser::new(context);
        let mut reader = Reader::from_str(markup);
        let config = reader.config_mut();
        config.trim_text(false);
        config.check_end_names = false;
        config.allow_unmatched_ends = true;

        loop {
            match reader.read_event() {
                Ok(Event::Eof) => break,
                Ok(event) => parser.process_event(event),
                Err(e) => {
                    log::warn!(
                        "Malformed markup in field '{}' near byte {}: {}; using plain text",
                        context.field,
                        reader.buffer_position(),
                        e
                    );
                    return parse_plain_text(&strip_tags(markup), &context);
                }
            }
        }

        parser.finalize();
        parser.blocks
    }

    /// Process a single markup event
    fn process_event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.handle_start_tag(&tag),
            Event::Empty(tag) => self.handle_empty_tag(&tag),
            Event::End(tag) => self.handle_end_tag(&tag_name(tag.name().as_ref())),
            Event::Text(text) => {
                let raw = String::from_utf8_lossy(&text);
                self.handle_text(&decode_entities(&raw));
            }
            Event::CData(data) => self.handle_text(&String::from_utf8_lossy(&data)),
            _ => {}
        }
    }

    /// Style inherited by a new child of the innermost open element
    fn inherited_style(&self) -> TextStyle {
        self.stack.last().map(|e| e.style).unwrap_or_default()
    }

    fn in_skipped_subtree(&self) -> bool {
        self.stack.last().is_some_and(|e| e.role == Role::Skipped)
    }

    fn push_element(&mut self, name: String, role: Role, style: TextStyle) {
        self.stack.push(OpenElement { name, role, style });
    }

    /// Handle opening tags
    fn handle_start_tag(&mut self, tag: &BytesStart<'_>) {
        let name = tag_name(tag.name().as_ref());

        if VOID_ELEMENTS.contains(&name.as_str()) {
            self.handle_void_element(&name);
            return;
        }

        if self.in_skipped_subtree() {
            self.push_element(name, Role::Skipped, TextStyle::default());
            return;
        }

        // A block tag inside a paragraph implicitly closes the paragraph
        if matches!(self.current_block, Some(BlockBuilder::Paragraph(_)))
            && matches!(name.as_str(), "p" | "pre" | "ul" | "ol")
        {
            self.close_current_block_elements();
        }

        match self.current_block {
            None => self.start_top_level(name, tag),
            Some(BlockBuilder::Code(_)) => {
                let style = self.inherited_style();
                self.push_element(name, Role::Inline, style);
            }
            Some(BlockBuilder::Paragraph(_)) => self.start_inline(name, tag),
            Some(BlockBuilder::List(_)) => self.start_in_list(name, tag),
        }
    }

    /// Handle self-closing tags (`<br/>`, `<p/>`)
    fn handle_empty_tag(&mut self, tag: &BytesStart<'_>) {
        let name = tag_name(tag.name().as_ref());
        self.handle_void_element(&name);
    }

    fn handle_void_element(&mut self, name: &str) {
        if self.in_skipped_subtree() {
            return;
        }
        match name {
            "br" => self.handle_line_break(),
            other => log::debug!(
                "Ignoring empty <{}> in field '{}'",
                other,
                self.context.field
            ),
        }
    }

    /// Open a top-level element
    fn start_top_level(&mut self, name: String, tag: &BytesStart<'_>) {
        match name.as_str() {
            "html" | "body" => {
                self.push_element(name, Role::Wrapper, TextStyle::default());
                return;
            }
            "head" | "script" | "style" | "title" => {
                self.push_element(name, Role::Skipped, TextStyle::default());
                return;
            }
            _ => {}
        }

        match BlockKind::from_tag(&name) {
            BlockKind::Paragraph => {
                self.current_block = Some(BlockBuilder::Paragraph(Vec::new()));
                self.push_element(name, Role::Block, TextStyle::default());
            }
            BlockKind::Preformatted => {
                self.current_block = Some(BlockBuilder::Code(String::new()));
                self.push_element(name, Role::Block, TextStyle::default());
            }
            BlockKind::UnorderedList => {
                self.current_block = Some(BlockBuilder::List(ListBuilder::new(false, 1)));
                self.push_element(name, Role::List { nested: false }, TextStyle::default());
            }
            BlockKind::OrderedList => {
                let start = attribute(tag, "start")
                    .and_then(|value| value.trim().parse::<u32>().ok())
                    .filter(|start| *start > 0)
                    .unwrap_or(1);
                self.current_block = Some(BlockBuilder::List(ListBuilder::new(true, start)));
                self.push_element(name, Role::List { nested: false }, TextStyle::default());
            }
            BlockKind::Unknown(tag_name) => {
                log::warn!(
                    "Ignoring unsupported block element <{}> in field '{}'",
                    tag_name,
                    self.context.field
                );
                self.push_element(name, Role::Skipped, TextStyle::default());
            }
        }
    }

    /// Open an inline element inside a paragraph or list item
    fn start_inline(&mut self, name: String, tag: &BytesStart<'_>) {
        let inline = InlineTag::from_tag(&name, tag);
        if let InlineTag::Unknown(ref unknown) = inline {
            log::warn!(
                "Unrecognized inline element <{}> in field '{}'; rendering its text unstyled",
                unknown,
                self.context.field
            );
        }
        let style = self.inherited_style().union(inline.style());
        self.push_element(name, Role::Inline, style);
    }

    /// Open an element while a list is being built
    fn start_in_list(&mut self, name: String, tag: &BytesStart<'_>) {
        let Some(BlockBuilder::List(list)) = self.current_block.as_mut() else {
            return;
        };

        match name.as_str() {
            "ul" | "ol" => {
                list.finish_item();
                list.depth += 1;
                self.push_element(name, Role::List { nested: true }, TextStyle::default());
            }
            "li" => {
                list.start_item();
                self.push_element(name, Role::Item, TextStyle::default());
            }
            _ => self.start_inline(name, tag),
        }
    }

    /// Handle closing tags
    ///
    /// Closes every element opened after the matching start tag; a closing
    /// tag with no matching open element is ignored.
    fn handle_end_tag(&mut self, name: &str) {
        let Some(position) = self.stack.iter().rposition(|e| e.name == name) else {
            log::debug!(
                "Ignoring unmatched </{}> in field '{}'",
                name,
                self.context.field
            );
            return;
        };

        while self.stack.len() > position {
            if let Some(element) = self.stack.pop() {
                self.close_element(element);
            }
        }
    }

    /// Pop everything down to and including the element owning the current block
    fn close_current_block_elements(&mut self) {
        while let Some(element) = self.stack.pop() {
            let owns_block = matches!(element.role, Role::Block | Role::List { nested: false });
            self.close_element(element);
            if owns_block {
                return;
            }
        }
    }

    fn close_element(&mut self, element: OpenElement) {
        match element.role {
            Role::Block | Role::List { nested: false } => self.finish_block(),
            Role::List { nested: true } => {
                if let Some(BlockBuilder::List(list)) = self.current_block.as_mut() {
                    list.finish_item();
                    list.depth = list.depth.saturating_sub(1);
                }
            }
            Role::Item => {
                if let Some(BlockBuilder::List(list)) = self.current_block.as_mut() {
                    list.finish_item();
                }
            }
            Role::Wrapper | Role::Skipped | Role::Inline => {}
        }
    }

    /// Handle text content
    fn handle_text(&mut self, text: &str) {
        if text.is_empty() || self.in_skipped_subtree() {
            return;
        }

        let style = self.inherited_style();
        let context = self.context;

        match self.current_block.as_mut() {
            None => {
                if !text.trim().is_empty() {
                    log::warn!(
                        "Ignoring text outside of a block element in field '{}'",
                        context.field
                    );
                }
            }
            Some(BlockBuilder::Code(code)) => code.push_str(text),
            Some(BlockBuilder::Paragraph(runs)) => {
                let normalized = normalize_inline_whitespace(text);
                append_runs(runs, text_runs(&normalized, style, &context));
            }
            Some(BlockBuilder::List(list)) => {
                if list.current_item.is_none() && text.trim().is_empty() {
                    return;
                }
                let normalized = normalize_inline_whitespace(text);
                append_runs(
                    &mut list.item_mut().runs,
                    text_runs(&normalized, style, &context),
                );
            }
        }
    }

    /// Handle `<br>`
    fn handle_line_break(&mut self) {
        match self.current_block.as_mut() {
            Some(BlockBuilder::Code(code)) => code.push('\n'),
            Some(BlockBuilder::Paragraph(runs)) => {
                append_runs(runs, vec![InlineRun::Text(TextRun::new("\n"))])
            }
            Some(BlockBuilder::List(list)) => {
                if list.current_item.is_some() {
                    append_runs(
                        &mut list.item_mut().runs,
                        vec![InlineRun::Text(TextRun::new("\n"))],
                    );
                }
            }
            None => {}
        }
    }

    /// Move the current block into the completed list
    fn finish_block(&mut self) {
        let Some(builder) = self.current_block.take() else {
            return;
        };

        match builder {
            BlockBuilder::Paragraph(runs) => {
                if let Some(node) = classify_paragraph(runs) {
                    self.blocks.push(node);
                }
            }
            BlockBuilder::Code(code) => {
                let lines = code.lines().map(str::to_string).collect();
                self.blocks.push(RichTextNode::CodeBlock { lines });
            }
            BlockBuilder::List(mut list) => {
                list.finish_item();
                if list.items.is_empty() {
                    return;
                }
                if list.ordered {
                    let top_level = list.items.iter().filter(|i| i.level == 0).count();
                    let numbering = self.ordered_numbering(list.start, top_level);
                    self.blocks.push(RichTextNode::NumberList {
                        items: list.items,
                        numbering,
                    });
                } else {
                    self.blocks
                        .push(RichTextNode::BulletList { items: list.items });
                }
            }
        }
    }

    /// Decide whether an ordered list continues the previous one
    ///
    /// A list whose `start` picks up exactly where the previous ordered list
    /// stopped shares its identifier; anything else restarts numbering.
    fn ordered_numbering(&mut self, start: u32, top_level_items: usize) -> ListNumbering {
        let previous = self
            .last_ordered
            .filter(|prev| start > 1 && prev.next_number == start);

        let numbering = match previous {
            Some(prev) => ListNumbering {
                list_id: prev.list_id,
                start,
                continues_previous: true,
            },
            None => {
                let list_id = self.next_list_id;
                self.next_list_id += 1;
                ListNumbering {
                    list_id,
                    start,
                    continues_previous: false,
                }
            }
        };

        let count = u32::try_from(top_level_items).unwrap_or(u32::MAX);
        self.last_ordered = Some(OrderedCursor {
            list_id: numbering.list_id,
            next_number: start.saturating_add(count),
        });
        numbering
    }

    /// Finalize parsing, closing anything left open
    fn finalize(&mut self) {
        while let Some(element) = self.stack.pop() {
            self.close_element(element);
        }
        self.finish_block();
    }
}

/// Parse a rich-text field with a known client display name
pub fn parse(markup: &str, client_name: &str) -> Vec<RichTextNode> {
    RichTextParser::parse(markup, ParseContext::new(client_name, "field"))
}

/// Whether a field holds markup rather than plain text
pub fn looks_like_markup(text: &str) -> bool {
    text.contains('<') && text.contains('>')
}

/// Treat each non-empty line as a paragraph
fn parse_plain_text(text: &str, context: &ParseContext<'_>) -> Vec<RichTextNode> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| classify_paragraph(text_runs(line, TextStyle::default(), context)))
        .collect()
}

/// Turn text into runs, resolving `{{.client}}`
fn text_runs(text: &str, style: TextStyle, context: &ParseContext<'_>) -> Vec<InlineRun> {
    if let Some(client) = context.client_name {
        return vec![InlineRun::Text(TextRun::with_style(
            text.replace(CLIENT_KEYWORD, client),
            style,
        ))];
    }

    let mut runs = Vec::new();
    for (idx, piece) in text.split(CLIENT_KEYWORD).enumerate() {
        if idx > 0 {
            runs.push(InlineRun::ClientPlaceholder);
        }
        if !piece.is_empty() {
            runs.push(InlineRun::Text(TextRun::with_style(piece, style)));
        }
    }
    runs
}

/// Append runs, merging adjacent text with identical formatting
fn append_runs(target: &mut Vec<InlineRun>, runs: Vec<InlineRun>) {
    for run in runs {
        if let (Some(InlineRun::Text(last)), InlineRun::Text(next)) = (target.last_mut(), &run) {
            if last.style() == next.style() && !last.is_line_break() && !next.is_line_break() {
                last.content.push_str(&next.content);
                continue;
            }
        }
        target.push(run);
    }
}

/// Recognise keyword paragraphs
///
/// A paragraph starting with `{{.caption}}` becomes a caption placeholder
/// carrying the remaining text; a paragraph consisting of a single
/// `{{.name}}` becomes an evidence reference. Everything else is kept.
fn classify_paragraph(runs: Vec<InlineRun>) -> Option<RichTextNode> {
    if runs.is_empty() {
        return None;
    }

    let text: String = runs.iter().filter_map(InlineRun::text).collect();
    let trimmed = text.trim();

    if let Some(rest) = trimmed.strip_prefix(CAPTION_KEYWORD) {
        return Some(RichTextNode::paragraph(vec![InlineRun::CaptionPlaceholder {
            text: rest.trim().to_string(),
        }]));
    }

    if let Some(captures) = KEYWORD_PARAGRAPH.captures(trimmed) {
        let keyword = &captures[1];
        if keyword != "client" && keyword != "caption" {
            return Some(RichTextNode::paragraph(vec![InlineRun::EvidenceReference {
                keyword: keyword.to_string(),
            }]));
        }
    }

    Some(RichTextNode::paragraph(runs))
}

/// Lowercase tag name from raw bytes
fn tag_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_ascii_lowercase()
}

/// Look up an attribute value, accepting unquoted and valueless HTML attributes
fn attribute(tag: &BytesStart<'_>, key: &str) -> Option<String> {
    tag.html_attributes()
        .flatten()
        .find(|attr| attr.key.as_ref().eq_ignore_ascii_case(key.as_bytes()))
        .map(|attr| decode_entities(&String::from_utf8_lossy(&attr.value)))
}

/// Decode HTML5 named and numeric character references
///
/// Text with a dangling `&` is returned unchanged.
pub fn decode_entities(raw: &str) -> String {
    match quick_xml::escape::unescape_with(raw, quick_xml::escape::resolve_html5_entity) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw.to_string(),
    }
}

/// Source line breaks inside inline content are plain spaces in HTML
fn normalize_inline_whitespace(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_with_client(markup: &str) -> Vec<RichTextNode> {
        RichTextParser::parse(markup, ParseContext::new("ACME", "test"))
    }

    fn only_text_run(nodes: &[RichTextNode]) -> &TextRun {
        match nodes {
            [RichTextNode::Paragraph { runs }] => match runs.as_slice() {
                [InlineRun::Text(run)] => run,
                other => panic!("Expected a single text run, got {:?}", other),
            },
            other => panic!("Expected a single paragraph, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_simple_paragraph() {
        // Arrange
        let markup = "<html><body><p>Hello world</p></body></html>";

        // Act
        let nodes = parse_with_client(markup);

        // Assert
        let run = only_text_run(&nodes);
        assert_eq!(run.content, "Hello world");
        assert!(!run.has_formatting());
    }

    #[test]
    fn test_body_wrapper_is_optional() {
        let nodes = parse_with_client("<p>one</p><p>two</p>");
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn test_nested_span_and_em_combine_styles() {
        // Arrange: italic nested inside a bold span
        let markup = r#"<p><span class="bold"><em>x</em></span></p>"#;

        // Act
        let nodes = parse_with_client(markup);

        // Assert
        let run = only_text_run(&nodes);
        assert!(run.bold);
        assert!(run.italic);
        assert!(!run.underline);
        assert!(!run.inline_code);
    }

    #[test]
    fn test_every_style_combination_is_the_union_of_ancestors() {
        for mask in 0u8..16 {
            // Arrange: wrap the text in one tag per requested style
            let mut markup = String::from("x");
            if mask & 1 != 0 {
                markup = format!(r#"<span class="bold">{}</span>"#, markup);
            }
            if mask & 2 != 0 {
                markup = format!("<em>{}</em>", markup);
            }
            if mask & 4 != 0 {
                markup = format!(r#"<span class="underline">{}</span>"#, markup);
            }
            if mask & 8 != 0 {
                markup = format!("<code>{}</code>", markup);
            }
            let markup = format!("<p>{}</p>", markup);

            // Act
            let nodes = parse_with_client(&markup);

            // Assert
            let run = only_text_run(&nodes);
            assert_eq!(run.bold, mask & 1 != 0, "bold for mask {}", mask);
            assert_eq!(run.italic, mask & 2 != 0, "italic for mask {}", mask);
            assert_eq!(run.underline, mask & 4 != 0, "underline for mask {}", mask);
            assert_eq!(run.inline_code, mask & 8 != 0, "code for mask {}", mask);
        }
    }

    #[test]
    fn test_multi_class_span_contributes_all_styles() {
        let nodes = parse_with_client(r#"<p><span class="italic underline">x</span></p>"#);

        let run = only_text_run(&nodes);
        assert!(run.italic);
        assert!(run.underline);
        assert!(!run.bold);
    }

    #[test]
    fn test_style_does_not_leak_past_closing_tag() {
        // Arrange
        let markup = "<p><em>slanted</em> upright</p>";

        // Act
        let nodes = parse_with_client(markup);

        // Assert
        let RichTextNode::Paragraph { runs } = &nodes[0] else {
            panic!("Expected paragraph");
        };
        assert_eq!(runs.len(), 2);
        assert!(matches!(&runs[0], InlineRun::Text(r) if r.italic && r.content == "slanted"));
        assert!(matches!(&runs[1], InlineRun::Text(r) if !r.italic && r.content == " upright"));
    }

    #[test]
    fn test_unknown_inline_tag_keeps_text_with_inherited_style() {
        let nodes = parse_with_client("<p><em><blink>still here</blink></em></p>");

        let run = only_text_run(&nodes);
        assert_eq!(run.content, "still here");
        assert!(run.italic);
    }

    #[test]
    fn test_unknown_top_level_block_is_ignored() {
        // Arrange
        let markup = "<h1>Heading</h1><p>kept</p><table><tr><td>cell</td></tr></table>";

        // Act
        let nodes = parse_with_client(markup);

        // Assert
        assert_eq!(nodes.len(), 1);
        assert_eq!(only_text_run(&nodes).content, "kept");
    }

    #[test]
    fn test_client_keyword_uses_context_name() {
        let nodes = parse_with_client("<p>Report for {{.client}} Inc.</p>");
        assert_eq!(only_text_run(&nodes).content, "Report for ACME Inc.");
    }

    #[test]
    fn test_client_keyword_without_name_becomes_placeholder() {
        // Arrange
        let context = ParseContext {
            client_name: None,
            field: "test",
        };

        // Act
        let nodes = RichTextParser::parse("<p>Hi {{.client}}!</p>", context);

        // Assert
        let RichTextNode::Paragraph { runs } = &nodes[0] else {
            panic!("Expected paragraph");
        };
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[1], InlineRun::ClientPlaceholder);
    }

    #[test]
    fn test_pre_block_splits_lines() {
        let nodes = parse_with_client("<pre>GET / HTTP/1.1\r\nHost: example.com</pre>");

        assert_eq!(
            nodes,
            vec![RichTextNode::CodeBlock {
                lines: vec!["GET / HTTP/1.1".to_string(), "Host: example.com".to_string()]
            }]
        );
    }

    #[test]
    fn test_pre_block_keeps_markup_characters() {
        let nodes = parse_with_client("<pre>&lt;script&gt;alert(1)&lt;/script&gt;</pre>");

        assert_eq!(
            nodes,
            vec![RichTextNode::CodeBlock {
                lines: vec!["<script>alert(1)</script>".to_string()]
            }]
        );
    }

    #[test]
    fn test_parse_unordered_list() {
        // Arrange
        let markup = "<ul>\n<li>One</li>\n<li><strong>Two</strong></li>\n</ul>";

        // Act
        let nodes = parse_with_client(markup);

        // Assert
        let [RichTextNode::BulletList { items }] = nodes.as_slice() else {
            panic!("Expected one bullet list, got {:?}", nodes);
        };
        assert_eq!(items.len(), 2);
        assert!(matches!(&items[1].runs[0], InlineRun::Text(r) if r.bold));
    }

    #[test]
    fn test_nested_list_items_carry_level() {
        let markup = "<ul><li>Parent<ul><li>Child</li></ul></li><li>Sibling</li></ul>";

        let nodes = parse_with_client(markup);

        let [RichTextNode::BulletList { items }] = nodes.as_slice() else {
            panic!("Expected one bullet list, got {:?}", nodes);
        };
        let levels: Vec<usize> = items.iter().map(|i| i.level).collect();
        assert_eq!(levels, vec![0, 1, 0]);
    }

    #[test]
    fn test_ordered_list_without_start_restarts_numbering() {
        // Arrange: two lists split by a paragraph, second without a start
        let markup = "<ol><li>a</li><li>b</li></ol><p>note</p><ol><li>c</li></ol>";

        // Act
        let nodes = parse_with_client(markup);

        // Assert
        let RichTextNode::NumberList { numbering: first, .. } = &nodes[0] else {
            panic!("Expected numbered list");
        };
        let RichTextNode::NumberList { numbering: second, .. } = &nodes[2] else {
            panic!("Expected numbered list");
        };
        assert_eq!(second.start, 1);
        assert!(!second.continues_previous);
        assert_ne!(first.list_id, second.list_id);
    }

    #[test]
    fn test_ordered_list_with_matching_start_continues_previous() {
        // Arrange: the second list starts where the first stopped
        let markup = r#"<ol><li>a</li><li>b</li></ol><p>note</p><ol start="3"><li>c</li></ol>"#;

        // Act
        let nodes = parse_with_client(markup);

        // Assert
        let RichTextNode::NumberList { numbering: first, .. } = &nodes[0] else {
            panic!("Expected numbered list");
        };
        let RichTextNode::NumberList { numbering: second, .. } = &nodes[2] else {
            panic!("Expected numbered list");
        };
        assert_eq!(second.start, 3);
        assert!(second.continues_previous);
        assert_eq!(first.list_id, second.list_id);
    }

    #[test]
    fn test_caption_paragraph_becomes_placeholder() {
        let nodes = parse_with_client("<p>{{.caption}} Login page of {{.client}}</p>");

        assert_eq!(
            nodes,
            vec![RichTextNode::paragraph(vec![InlineRun::CaptionPlaceholder {
                text: "Login page of ACME".to_string()
            }])]
        );
    }

    #[test]
    fn test_keyword_paragraph_becomes_evidence_reference() {
        let nodes = parse_with_client("<p> {{.screenshot}} </p>");

        assert_eq!(
            nodes[0].placeholder(),
            Some(&InlineRun::EvidenceReference {
                keyword: "screenshot".to_string()
            })
        );
    }

    #[test]
    fn test_keyword_mixed_with_prose_stays_text() {
        let nodes = parse_with_client("<p>See {{.screenshot}} below</p>");

        assert!(nodes[0].placeholder().is_none());
        assert_eq!(only_text_run(&nodes).content, "See {{.screenshot}} below");
    }

    #[test]
    fn test_line_break_becomes_newline_run() {
        let nodes = parse_with_client("<p>first<br>second</p>");

        let RichTextNode::Paragraph { runs } = &nodes[0] else {
            panic!("Expected paragraph");
        };
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[1].text(), Some("\n"));
    }

    #[test]
    fn test_entities_are_decoded() {
        let nodes = parse_with_client("<p>AT&amp;T&nbsp;&#169;</p>");
        assert_eq!(only_text_run(&nodes).content, "AT&T\u{a0}\u{a9}");
    }

    #[test]
    fn test_unclosed_tags_are_tolerated() {
        // Arrange: missing </em> and </p>, stray </span>
        let markup = "<p><em>dangling</span> text";

        // Act
        let nodes = parse_with_client(markup);

        // Assert
        let RichTextNode::Paragraph { runs } = &nodes[0] else {
            panic!("Expected paragraph");
        };
        assert!(matches!(&runs[0], InlineRun::Text(r) if r.italic && r.content == "dangling text"));
    }

    #[test]
    fn test_new_paragraph_implicitly_closes_open_one() {
        let nodes = parse_with_client("<p>one<p>two");
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn test_plain_text_field_becomes_paragraphs() {
        let nodes = parse_with_client("first line\n\nsecond for {{.client}}");

        assert_eq!(nodes.len(), 2);
        assert_eq!(
            nodes[1],
            RichTextNode::paragraph(vec![InlineRun::Text(TextRun::new("second for ACME"))])
        );
    }

    #[test]
    fn test_parse_empty_content() {
        assert!(parse_with_client("").is_empty());
        assert!(parse_with_client("<p></p>").is_empty());
    }
}
