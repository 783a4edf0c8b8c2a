//! List numbering for Word documents
//!
//! Word lists reference a concrete numbering instance (`w:num`), which in
//! turn points at an abstract definition (`w:abstractNum`) holding the
//! per-level formats. Definitions already in the template are reused when
//! one fits; otherwise one multi-level definition per list kind is added.
//! Bullet lists share one instance. Every new ordered list gets its own
//! instance with a start override so its numbering restarts, while an
//! ordered list that continues the previous one reuses that instance.

use crate::error::ReportError;
use crate::ooxml::{insert_before_last, XML_DECLARATION};
use crate::rich_text::ListNumbering;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Levels in a generated definition
const GENERATED_LEVELS: usize = 9;

/// Indentation per list level, in twentieths of a point
const INDENT_PER_LEVEL: usize = 720;

static ABSTRACT_NUM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<w:abstractNum\b[^>]*?w:abstractNumId="(\d+)"[^>]*>(.*?)</w:abstractNum>"#)
        .expect("abstractNum regex is valid")
});

static NUM_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<w:num\b[^>]*?w:numId="(\d+)""#).expect("num regex is valid"));

static MULTI_LEVEL_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<w:multiLevelType w:val="(\w+)""#).expect("multiLevelType regex is valid")
});

static FIRST_LEVEL_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<w:lvl\b[^>]*?w:ilvl="0"[^>]*>.*?<w:numFmt w:val="(\w+)""#)
        .expect("numFmt regex is valid")
});

/// Ordered or unordered list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    Bullet,
    Ordered,
}

impl ListKind {
    /// `w:numFmt` of the first level
    fn first_level_format(self) -> &'static str {
        match self {
            ListKind::Bullet => "bullet",
            ListKind::Ordered => "decimal",
        }
    }
}

/// An abstract definition found in the template
#[derive(Debug, Clone)]
struct ExistingDefinition {
    id: u32,
    single_level: bool,
    levels: usize,
    first_format: String,
}

/// Numbering bookkeeping for one document render
#[derive(Debug)]
pub struct NumberingState {
    existing: Vec<ExistingDefinition>,
    next_abstract_id: u32,
    next_num_id: u32,
    /// Abstract definition chosen per kind and depth requirement
    abstracts: HashMap<(ListKind, bool), u32>,
    /// Shared bullet instance, keyed by whether it supports nesting
    bullet_nums: HashMap<bool, u32>,
    /// Concrete instance per (field, list) pair
    ordered_nums: HashMap<(usize, usize), u32>,
    new_abstracts: Vec<String>,
    new_nums: Vec<String>,
}

impl NumberingState {
    /// Scan the template's numbering part, if it has one
    pub fn new(existing_xml: Option<&str>) -> Self {
        let xml = existing_xml.unwrap_or_default();

        let existing: Vec<ExistingDefinition> = ABSTRACT_NUM
            .captures_iter(xml)
            .filter_map(|caps| {
                let id = caps[1].parse().ok()?;
                let body = &caps[2];
                Some(ExistingDefinition {
                    id,
                    single_level: MULTI_LEVEL_TYPE
                        .captures(body)
                        .is_some_and(|m| &m[1] == "singleLevel"),
                    levels: body.matches("<w:lvl ").count(),
                    first_format: FIRST_LEVEL_FORMAT
                        .captures(body)
                        .map(|m| m[1].to_string())
                        .unwrap_or_default(),
                })
            })
            .collect();

        let next_abstract_id = existing.iter().map(|d| d.id + 1).max().unwrap_or(0);
        let next_num_id = NUM_ID
            .captures_iter(xml)
            .filter_map(|caps| caps[1].parse::<u32>().ok())
            .max()
            .map_or(1, |max| max + 1);

        Self {
            existing,
            next_abstract_id,
            next_num_id,
            abstracts: HashMap::new(),
            bullet_nums: HashMap::new(),
            ordered_nums: HashMap::new(),
            new_abstracts: Vec::new(),
            new_nums: Vec::new(),
        }
    }

    /// Whether anything was added
    pub fn is_dirty(&self) -> bool {
        !self.new_abstracts.is_empty() || !self.new_nums.is_empty()
    }

    /// Instance for a bullet list
    ///
    /// Flat lists share any existing instance; nested lists need one whose
    /// definition has deeper levels.
    pub fn bullet_num(&mut self, max_level: usize) -> u32 {
        let nested = max_level > 0;
        let flat = if nested {
            None
        } else {
            self.bullet_nums.get(&false).copied()
        };
        if let Some(num) = self.bullet_nums.get(&true).copied().or(flat) {
            return num;
        }
        let abstract_id = self.abstract_for(ListKind::Bullet, max_level);
        let num = self.add_num(abstract_id, None);
        self.bullet_nums.insert(nested, num);
        num
    }

    /// Instance for an ordered list
    ///
    /// `field` distinguishes rich-text fields, whose list ids restart at 1.
    pub fn ordered_num(&mut self, field: usize, numbering: &ListNumbering, max_level: usize) -> u32 {
        let key = (field, numbering.list_id);
        if numbering.continues_previous {
            if let Some(num) = self.ordered_nums.get(&key) {
                return *num;
            }
        }
        let abstract_id = self.abstract_for(ListKind::Ordered, max_level);
        let num = self.add_num(abstract_id, Some(numbering.start));
        self.ordered_nums.insert(key, num);
        num
    }

    /// Find a reusable definition or create one
    ///
    /// Single-level definitions are tried first; they only fit lists
    /// without nesting.
    fn abstract_for(&mut self, kind: ListKind, max_level: usize) -> u32 {
        let nested = max_level > 0;
        if let Some(id) = self.abstracts.get(&(kind, nested)) {
            return *id;
        }

        let fits = |d: &&ExistingDefinition| {
            d.first_format == kind.first_level_format() && d.levels > max_level
        };
        let reused = self
            .existing
            .iter()
            .filter(fits)
            .find(|d| d.single_level)
            .or_else(|| self.existing.iter().find(|d| fits(d)))
            .map(|d| d.id);

        let id = match reused {
            Some(id) => {
                log::debug!("Reusing abstract numbering {} for {:?} lists", id, kind);
                id
            }
            None => {
                let id = self.next_abstract_id;
                self.next_abstract_id += 1;
                self.new_abstracts.push(abstract_definition_xml(id, kind));
                log::debug!("Created abstract numbering {} for {:?} lists", id, kind);
                id
            }
        };
        self.abstracts.insert((kind, nested), id);
        id
    }

    fn add_num(&mut self, abstract_id: u32, start: Option<u32>) -> u32 {
        let num = self.next_num_id;
        self.next_num_id += 1;

        let overrides = start
            .map(|start| {
                format!(
                    r#"<w:lvlOverride w:ilvl="0"><w:startOverride w:val="{}"/></w:lvlOverride>"#,
                    start
                )
            })
            .unwrap_or_default();
        self.new_nums.push(format!(
            r#"<w:num w:numId="{}"><w:abstractNumId w:val="{}"/>{}</w:num>"#,
            num, abstract_id, overrides
        ));
        num
    }

    /// Merge additions into the numbering part
    ///
    /// Abstract definitions must precede every `w:num`, so they go in front
    /// of the first existing instance.
    pub fn finish(self, existing_xml: Option<&str>) -> Result<String, ReportError> {
        let xml = existing_xml.map(str::to_string).unwrap_or_else(empty_numbering_xml);
        let abstracts = self.new_abstracts.concat();
        let nums = self.new_nums.concat();

        let with_abstracts = match xml.find("<w:num ").or_else(|| xml.find("<w:num>")) {
            Some(position) => {
                let mut merged = String::with_capacity(xml.len() + abstracts.len());
                merged.push_str(&xml[..position]);
                merged.push_str(&abstracts);
                merged.push_str(&xml[position..]);
                merged
            }
            None => insert_before_last(&xml, "</w:numbering>", &abstracts, "word/numbering.xml")?,
        };

        insert_before_last(&with_abstracts, "</w:numbering>", &nums, "word/numbering.xml")
    }
}

fn empty_numbering_xml() -> String {
    format!(
        r#"{}<w:numbering xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"></w:numbering>"#,
        XML_DECLARATION
    )
}

fn abstract_definition_xml(id: u32, kind: ListKind) -> String {
    let mut xml = format!(
        r#"<w:abstractNum w:abstractNumId="{}"><w:multiLevelType w:val="hybridMultilevel"/>"#,
        id
    );
    for level in 0..GENERATED_LEVELS {
        let (format, text) = match kind {
            ListKind::Bullet => ("bullet", ["•", "◦", "▪"][level % 3].to_string()),
            ListKind::Ordered => (
                ["decimal", "lowerLetter", "lowerRoman"][level % 3],
                format!("%{}.", level + 1),
            ),
        };
        xml.push_str(&format!(
            r#"<w:lvl w:ilvl="{level}"><w:start w:val="1"/><w:numFmt w:val="{format}"/><w:lvlText w:val="{text}"/><w:lvlJc w:val="left"/><w:pPr><w:ind w:left="{left}" w:hanging="360"/></w:pPr></w:lvl>"#,
            level = level,
            format = format,
            text = text,
            left = INDENT_PER_LEVEL * (level + 1),
        ));
    }
    xml.push_str("</w:abstractNum>");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE_NUMBERING: &str = r#"<?xml version="1.0"?><w:numbering xmlns:w="x"><w:abstractNum w:abstractNumId="3"><w:multiLevelType w:val="singleLevel"/><w:lvl w:ilvl="0"><w:start w:val="1"/><w:numFmt w:val="decimal"/></w:lvl></w:abstractNum><w:abstractNum w:abstractNumId="4"><w:multiLevelType w:val="hybridMultilevel"/><w:lvl w:ilvl="0"><w:numFmt w:val="bullet"/></w:lvl><w:lvl w:ilvl="1"><w:numFmt w:val="bullet"/></w:lvl></w:abstractNum><w:num w:numId="7"><w:abstractNumId w:val="3"/></w:num></w:numbering>"#;

    fn numbering(list_id: usize, start: u32, continues_previous: bool) -> ListNumbering {
        ListNumbering {
            list_id,
            start,
            continues_previous,
        }
    }

    #[test]
    fn test_reuses_single_level_definition() {
        // Arrange
        let mut state = NumberingState::new(Some(TEMPLATE_NUMBERING));

        // Act
        let num = state.ordered_num(0, &numbering(1, 1, false), 0);
        let xml = state.finish(Some(TEMPLATE_NUMBERING)).unwrap();

        // Assert: no new abstract definition, one new instance after the existing one
        assert_eq!(num, 8);
        assert_eq!(xml.matches("<w:abstractNum ").count(), 2);
        assert!(xml.contains(r#"<w:num w:numId="8"><w:abstractNumId w:val="3"/>"#));
    }

    #[test]
    fn test_nested_ordered_list_creates_multilevel_definition() {
        // Arrange
        let mut state = NumberingState::new(Some(TEMPLATE_NUMBERING));

        // Act
        state.ordered_num(0, &numbering(1, 1, false), 1);
        let xml = state.finish(Some(TEMPLATE_NUMBERING)).unwrap();

        // Assert: new definition id 5, placed before the first w:num
        let abstract_pos = xml.find(r#"w:abstractNumId="5""#).unwrap();
        let num_pos = xml.find("<w:num ").unwrap();
        assert!(abstract_pos < num_pos);
        assert_eq!(xml.matches(r#"<w:lvl w:ilvl="#).count(), 3 + GENERATED_LEVELS);
    }

    #[test]
    fn test_bullet_lists_share_one_instance() {
        let mut state = NumberingState::new(Some(TEMPLATE_NUMBERING));

        let first = state.bullet_num(1);
        let second = state.bullet_num(0);

        assert_eq!(first, second);
        let xml = state.finish(Some(TEMPLATE_NUMBERING)).unwrap();
        assert!(xml.contains(r#"<w:abstractNumId w:val="4"/>"#));
    }

    #[test]
    fn test_nested_bullets_after_flat_ones_get_multilevel_instance() {
        // Arrange: the template only has a single-level bullet definition
        let template = r#"<?xml version="1.0"?><w:numbering xmlns:w="x"><w:abstractNum w:abstractNumId="2"><w:multiLevelType w:val="singleLevel"/><w:lvl w:ilvl="0"><w:numFmt w:val="bullet"/></w:lvl></w:abstractNum><w:num w:numId="5"><w:abstractNumId w:val="2"/></w:num></w:numbering>"#;
        let mut state = NumberingState::new(Some(template));

        // Act
        let flat = state.bullet_num(0);
        let nested = state.bullet_num(2);
        let flat_again = state.bullet_num(0);

        // Assert
        assert_ne!(flat, nested);
        assert_eq!(flat_again, nested);
        let xml = state.finish(Some(template)).unwrap();
        assert!(xml.contains(&format!(r#"<w:num w:numId="{}"><w:abstractNumId w:val="2"/>"#, flat)));
        assert!(xml.contains(&format!(r#"<w:num w:numId="{}"><w:abstractNumId w:val="3"/>"#, nested)));
        assert_eq!(xml.matches("<w:abstractNum ").count(), 2);
    }

    #[test]
    fn test_continuing_list_reuses_instance_and_new_list_restarts() {
        // Arrange
        let mut state = NumberingState::new(None);

        // Act
        let first = state.ordered_num(0, &numbering(1, 1, false), 0);
        let continued = state.ordered_num(0, &numbering(1, 3, true), 0);
        let restarted = state.ordered_num(0, &numbering(2, 1, false), 0);
        let other_field = state.ordered_num(1, &numbering(1, 1, false), 0);

        // Assert
        assert_eq!(first, continued);
        assert_ne!(first, restarted);
        assert_ne!(first, other_field);
        let xml = state.finish(None).unwrap();
        assert_eq!(xml.matches("<w:startOverride").count(), 3);
        assert_eq!(xml.matches("<w:abstractNum ").count(), 1);
    }
}
