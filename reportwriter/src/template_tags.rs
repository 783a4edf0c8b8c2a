//! Template tags in Word documents
//!
//! Templates carry `{{ dotted.path }}` tags in their body text. Each tag is
//! looked up in a JSON context built from the snapshot and replaced by its
//! escaped value. A tag must sit inside a single text run; Word splits text
//! into runs whenever formatting or proofing state changes, so authors
//! retype a tag in one go when it does not resolve.
//!
//! Paragraphs consisting solely of a block marker such as `{{findings}}`
//! are replaced wholesale by generated content.

use crate::error::TemplateError;
use crate::ooxml::xml_text;
use crate::severity;
use crate::snapshot::ReportSnapshot;
use regex::{Captures, Regex};
use serde_json::{json, Value};
use std::sync::LazyLock;

static TEXT_NODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(<w:t(?:\s[^>]*)?>)([^<]*)(</w:t>)").expect("text node regex is valid")
});

/// A lookup tag (group 2) or a rich-text keyword such as `{{.client}}` (group 1)
static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\{\{\s*(?:(\.[^{}]*)|([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)\s*)\}\}",
    )
    .expect("tag regex is valid")
});

static PARAGRAPH_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<w:p[\s>]").expect("paragraph regex is valid"));

/// Build the lookup context for a snapshot
///
/// The snapshot's own structure is available as-is (`client.full_name`,
/// `project.start_date`, `company.email`). `totals` holds finding counts
/// per severity and `client.display_name` the name used for `{{.client}}`.
pub fn template_context(snapshot: &ReportSnapshot) -> Result<Value, serde_json::Error> {
    let mut context = serde_json::to_value(snapshot)?;

    let counts = severity::count_by_severity(snapshot.findings.iter().map(|f| f.severity.as_str()));
    let mut totals = serde_json::Map::new();
    totals.insert("findings".to_string(), json!(snapshot.findings.len()));
    totals.insert("observations".to_string(), json!(snapshot.observations.len()));
    for (name, count) in counts {
        totals.insert(name.to_ascii_lowercase(), json!(count));
    }

    if let Value::Object(root) = &mut context {
        root.insert("totals".to_string(), Value::Object(totals));
        if let Some(Value::Object(client)) = root.get_mut("client") {
            client.insert(
                "display_name".to_string(),
                json!(snapshot.client.display_name()),
            );
        }
    }

    Ok(context)
}

/// Look up a dotted path in the context
///
/// Numeric segments index into lists.
pub fn lookup<'a>(context: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(context, |value, segment| match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Printable text of a context value
fn printable(path: &str, value: &Value) -> Result<String, TemplateError> {
    match value {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s.clone()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Array(_) | Value::Object(_) => Err(TemplateError::NotPrintable(path.to_string())),
    }
}

/// Replace every tag in the document body
///
/// Values are scrubbed and XML-escaped. An undefined variable, a `{{`
/// left open within a text run or a `{% %}` control tag fails the whole
/// render. Rich-text keywords like `{{.client}}` are kept as typed.
pub fn render_tags(document_xml: &str, context: &Value) -> Result<String, TemplateError> {
    let mut failure: Option<TemplateError> = None;

    let rendered = TEXT_NODE.replace_all(document_xml, |node: &Captures<'_>| {
        if failure.is_some() {
            return node[0].to_string();
        }
        match render_text_node(&node[2], context) {
            Ok(text) => format!("{}{}{}", &node[1], text, &node[3]),
            Err(e) => {
                failure = Some(e);
                node[0].to_string()
            }
        }
    });

    match failure {
        Some(e) => Err(e),
        None => Ok(rendered.into_owned()),
    }
}

fn render_text_node(text: &str, context: &Value) -> Result<String, TemplateError> {
    if let Some(control) = text.find("{%") {
        return Err(TemplateError::UnsupportedTag(
            text[control..].chars().take(40).collect(),
        ));
    }
    if !text.contains("{{") {
        return Ok(text.to_string());
    }

    let mut result = String::with_capacity(text.len());
    let mut last = 0;
    for tag in TAG.captures_iter(text) {
        let Some(whole) = tag.get(0) else {
            continue;
        };
        let between = &text[last..whole.start()];
        check_terminated(between)?;
        result.push_str(between);
        last = whole.end();

        match tag.get(2) {
            Some(path) => {
                let value = lookup(context, path.as_str())
                    .ok_or_else(|| TemplateError::UndefinedVariable(path.as_str().to_string()))?;
                result.push_str(&xml_text(&printable(path.as_str(), value)?));
            }
            // Keywords belong to finding rich text; left as typed
            None => result.push_str(whole.as_str()),
        }
    }
    let rest = &text[last..];
    check_terminated(rest)?;
    result.push_str(rest);
    Ok(result)
}

fn check_terminated(text: &str) -> Result<(), TemplateError> {
    match text.find("{{") {
        Some(open) => Err(TemplateError::Unterminated(
            text[open..].chars().take(40).collect(),
        )),
        None => Ok(()),
    }
}

/// Visible text of a paragraph's XML
pub fn paragraph_text(paragraph_xml: &str) -> String {
    TEXT_NODE
        .captures_iter(paragraph_xml)
        .map(|caps| caps[2].to_string())
        .collect()
}

/// Byte ranges of top-level `<w:p>` elements
fn paragraph_spans(xml: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut search_from = 0;

    while let Some(start) = PARAGRAPH_START.find_at(xml, search_from) {
        let start = start.start();
        let Some(end_offset) = xml[start..].find("</w:p>") else {
            break;
        };
        let end = start + end_offset + "</w:p>".len();
        spans.push((start, end));
        search_from = end;
    }
    spans
}

/// Whether paragraph text is exactly the named block marker
fn is_marker(text: &str, name: &str) -> bool {
    text.trim()
        .strip_prefix("{{")
        .and_then(|t| t.strip_suffix("}}"))
        .is_some_and(|inner| inner.trim() == name)
}

/// Replace the paragraph holding a block marker with generated content
///
/// Returns `None` when the document has no such marker.
pub fn replace_marker_paragraph(xml: &str, name: &str, replacement: &str) -> Option<String> {
    let (start, end) = paragraph_spans(xml)
        .into_iter()
        .find(|(start, end)| is_marker(&paragraph_text(&xml[*start..*end]), name))?;

    let mut result = String::with_capacity(xml.len() + replacement.len());
    result.push_str(&xml[..start]);
    result.push_str(replacement);
    result.push_str(&xml[end..]);
    Some(result)
}

/// Whether the document contains a block marker paragraph
pub fn has_marker(xml: &str, name: &str) -> bool {
    paragraph_spans(xml)
        .into_iter()
        .any(|(start, end)| is_marker(&paragraph_text(&xml[start..end]), name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report_config::CompanyInfo;
    use crate::report_model::Report;
    use crate::snapshot;

    fn context() -> Value {
        let mut report = Report::default();
        report.client.name = "Acme <Corp>".to_string();
        report.title = "Q3".to_string();
        let company = CompanyInfo {
            name: "Example Security".to_string(),
            ..CompanyInfo::default()
        };
        template_context(&snapshot::build(&report, &company)).unwrap()
    }

    #[test]
    fn test_tags_are_replaced_and_escaped() {
        // Arrange
        let xml = r#"<w:p><w:r><w:t xml:space="preserve">Prepared for {{ client.full_name }} by {{company.name}}</w:t></w:r></w:p>"#;

        // Act
        let rendered = render_tags(xml, &context()).unwrap();

        // Assert
        assert!(rendered.contains("Prepared for Acme &lt;Corp&gt; by Example Security"));
    }

    #[test]
    fn test_undefined_variable_fails() {
        let xml = "<w:t>{{ client.nickname }}</w:t>";

        let err = render_tags(xml, &context()).unwrap_err();

        assert!(matches!(err, TemplateError::UndefinedVariable(ref p) if p == "client.nickname"));
    }

    #[test]
    fn test_object_is_not_printable() {
        let err = render_tags("<w:t>{{ client }}</w:t>", &context()).unwrap_err();
        assert!(matches!(err, TemplateError::NotPrintable(_)));
    }

    #[test]
    fn test_tag_split_across_runs_is_reported() {
        let xml = "<w:r><w:t>{{ client.</w:t></w:r><w:r><w:t>full_name }}</w:t></w:r>";

        let err = render_tags(xml, &context()).unwrap_err();

        assert!(matches!(err, TemplateError::Unterminated(_)));
    }

    #[test]
    fn test_control_tag_is_rejected() {
        // Arrange
        let xml = "<w:t>{% if totals.critical %}Critical issues{% endif %}</w:t>";

        // Act
        let err = render_tags(xml, &context()).unwrap_err();

        // Assert
        assert!(matches!(err, TemplateError::UnsupportedTag(ref t) if t.starts_with("{% if")));
        assert!(err.to_string().contains("Unsupported template control tag"));
    }

    #[test]
    fn test_keyword_in_template_is_left_literal() {
        // Arrange
        let xml = "<w:t>Scope of {{.client}} for {{ client.full_name }}</w:t>";

        // Act
        let rendered = render_tags(xml, &context()).unwrap();

        // Assert
        assert_eq!(rendered, "<w:t>Scope of {{.client}} for Acme &lt;Corp&gt;</w:t>");
    }

    #[test]
    fn test_malformed_tag_before_valid_one_is_reported() {
        let xml = "<w:t>{{ not a tag }} {{ client.full_name }}</w:t>";

        let err = render_tags(xml, &context()).unwrap_err();

        assert!(matches!(err, TemplateError::Unterminated(ref t) if t.starts_with("{{ not")));
    }

    #[test]
    fn test_null_renders_empty_and_totals_exist() {
        let xml = "<w:t>[{{project.start_date}}] {{ totals.findings }} {{ totals.critical }}</w:t>";

        let rendered = render_tags(xml, &context()).unwrap();

        assert_eq!(rendered, "<w:t>[] 0 0</w:t>");
    }

    #[test]
    fn test_lookup_indexes_lists() {
        let value = json!({"team": [{"name": "Ann"}]});
        assert_eq!(lookup(&value, "team.0.name"), Some(&json!("Ann")));
        assert_eq!(lookup(&value, "team.1.name"), None);
    }

    #[test]
    fn test_marker_paragraph_is_replaced() {
        // Arrange
        let xml = r#"<w:body><w:p><w:r><w:t>Intro</w:t></w:r></w:p><w:p w:rsidR="1"><w:pPr><w:pStyle w:val="Normal"/></w:pPr><w:r><w:t>{{ findings }}</w:t></w:r></w:p><w:sectPr/></w:body>"#;

        // Act
        let replaced = replace_marker_paragraph(xml, "findings", "<w:p>GENERATED</w:p>").unwrap();

        // Assert
        assert_eq!(
            replaced,
            "<w:body><w:p><w:r><w:t>Intro</w:t></w:r></w:p><w:p>GENERATED</w:p><w:sectPr/></w:body>"
        );
        assert!(has_marker(xml, "findings"));
        assert!(!has_marker(xml, "observations"));
    }
}
