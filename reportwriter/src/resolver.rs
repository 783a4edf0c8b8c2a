//! Keyword and placeholder resolution
//!
//! Parsed rich text still contains placeholders: evidence references and
//! figure captions. The resolver turns them into calls on a [`FormatSink`],
//! which each exporter implements for its own markup. Ordinary blocks pass
//! straight through to [`FormatSink::emit_block`].

use crate::error::ReportError;
use crate::evidence::{self, BorderStyle, EvidenceKind};
use crate::rich_text::{block_text, InlineRun, ParseContext, RichTextNode, RichTextParser};
use crate::snapshot::{EvidenceRef, FindingEntry, ReportSnapshot};
use std::path::Path;

/// Separator between the caption label and the caption text
pub const CAPTION_SEPARATOR: &str = "–";

/// How a sink wants evidence delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvidenceMode {
    /// Bordered images and file contents are handed to the sink
    Embed(BorderStyle),
    /// Evidence is referred to by name; no files are touched
    ByName,
}

/// Output format target for resolved rich text
pub trait FormatSink {
    /// Render an ordinary block
    fn emit_block(&mut self, node: &RichTextNode) -> Result<(), ReportError>;

    /// Embed an image file
    fn insert_image(&mut self, image: &Path, evidence: &EvidenceRef) -> Result<(), ReportError>;

    /// Embed the contents of a text capture
    fn insert_code_text(
        &mut self,
        contents: &str,
        evidence: &EvidenceRef,
    ) -> Result<(), ReportError>;

    /// Insert a figure caption
    fn insert_caption(&mut self, text: &str) -> Result<(), ReportError>;

    /// Insert literal text as its own paragraph
    fn insert_literal(&mut self, text: &str) -> Result<(), ReportError>;

    /// Record a condition the report author should know about
    fn warn(&mut self, message: String);

    fn evidence_mode(&self) -> EvidenceMode {
        EvidenceMode::Embed(BorderStyle::default())
    }
}

/// Resolve one parsed block into sink calls
///
/// Evidence is looked up in the finding first, then across the whole report
/// when no finding is given. Unknown keywords are emitted literally; missing
/// files are reported through [`FormatSink::warn`] and skipped.
pub fn resolve_and_emit<S: FormatSink + ?Sized>(
    node: &RichTextNode,
    finding: Option<&FindingEntry>,
    snapshot: &ReportSnapshot,
    sink: &mut S,
) -> Result<(), ReportError> {
    match node.placeholder() {
        Some(InlineRun::CaptionPlaceholder { text }) => sink.insert_caption(text),
        Some(InlineRun::EvidenceReference { keyword }) => {
            match lookup_evidence(keyword, finding, snapshot) {
                Some(evidence) => emit_evidence(evidence, sink),
                None => {
                    log::debug!("No evidence named '{}'; leaving keyword in place", keyword);
                    sink.insert_literal(&format!("{{{{.{}}}}}", keyword))
                }
            }
        }
        _ => sink.emit_block(node),
    }
}

/// Parse a rich-text field and resolve every block into the sink
pub fn render_field<S: FormatSink + ?Sized>(
    markup: &str,
    field: &str,
    finding: Option<&FindingEntry>,
    snapshot: &ReportSnapshot,
    sink: &mut S,
) -> Result<(), ReportError> {
    let client = snapshot.client.display_name();
    let context = ParseContext {
        client_name: (!client.is_empty()).then_some(client),
        field,
    };

    for node in RichTextParser::parse(markup, context) {
        resolve_and_emit(&node, finding, snapshot, sink)?;
    }
    Ok(())
}

fn lookup_evidence<'a>(
    keyword: &str,
    finding: Option<&'a FindingEntry>,
    snapshot: &'a ReportSnapshot,
) -> Option<&'a EvidenceRef> {
    match finding {
        Some(finding) => finding.evidence_named(keyword),
        None => snapshot
            .findings
            .iter()
            .find_map(|f| f.evidence_named(keyword)),
    }
}

fn emit_evidence<S: FormatSink + ?Sized>(
    evidence: &EvidenceRef,
    sink: &mut S,
) -> Result<(), ReportError> {
    let kind = EvidenceKind::classify(&evidence.path);
    if kind == EvidenceKind::Other {
        log::debug!(
            "Evidence '{}' ({}) is not renderable inline; skipping",
            evidence.friendly_name,
            evidence.path.display()
        );
        return Ok(());
    }

    let border = match sink.evidence_mode() {
        EvidenceMode::ByName => return sink.insert_literal(&evidence_marker(evidence)),
        EvidenceMode::Embed(border) => border,
    };

    if !evidence.path.is_file() {
        log::warn!(
            "Evidence file for '{}' is missing: {}",
            evidence.friendly_name,
            evidence.path.display()
        );
        sink.warn(format!(
            "Evidence file for '{}' was not found at {}",
            evidence.friendly_name,
            evidence.path.display()
        ));
        return Ok(());
    }

    match kind {
        EvidenceKind::Image => match evidence::bordered_copy(&evidence.path, &border) {
            Ok(bordered) => sink.insert_image(&bordered, evidence),
            Err(e) => {
                log::warn!("Could not prepare image '{}': {}", evidence.friendly_name, e);
                sink.warn(format!(
                    "Evidence image '{}' could not be read: {}",
                    evidence.friendly_name, e
                ));
                Ok(())
            }
        },
        EvidenceKind::Text => match evidence::read_text_evidence(&evidence.path) {
            Ok(contents) => sink.insert_code_text(&contents, evidence),
            Err(e) => {
                sink.warn(format!(
                    "Evidence file '{}' could not be read: {}",
                    evidence.friendly_name, e
                ));
                Ok(())
            }
        },
        EvidenceKind::Other => Ok(()),
    }
}

/// Literal caption text used by formats without a caption field
pub fn literal_caption(text: &str) -> String {
    format!("Caption {} {}", CAPTION_SEPARATOR, text)
}

/// Reference to evidence by name, for formats that cannot embed it
pub fn evidence_marker(evidence: &EvidenceRef) -> String {
    format!(
        "<See Report for Evidence File: {}>\n{}",
        evidence.friendly_name,
        literal_caption(&evidence.caption)
    )
}

/// Sink that flattens rich text to plain text
///
/// Used for spreadsheet cells and speaker notes.
#[derive(Debug, Default)]
pub struct PlainTextSink {
    blocks: Vec<String>,
    warnings: Vec<String>,
}

impl PlainTextSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text of all blocks, one per line, and any warnings raised
    pub fn finish(self) -> (String, Vec<String>) {
        (self.blocks.join("\n"), self.warnings)
    }
}

impl FormatSink for PlainTextSink {
    fn emit_block(&mut self, node: &RichTextNode) -> Result<(), ReportError> {
        self.blocks.push(block_text(node));
        Ok(())
    }

    fn insert_image(&mut self, _image: &Path, evidence: &EvidenceRef) -> Result<(), ReportError> {
        self.blocks.push(evidence_marker(evidence));
        Ok(())
    }

    fn insert_code_text(
        &mut self,
        _contents: &str,
        evidence: &EvidenceRef,
    ) -> Result<(), ReportError> {
        self.blocks.push(evidence_marker(evidence));
        Ok(())
    }

    fn insert_caption(&mut self, text: &str) -> Result<(), ReportError> {
        self.blocks.push(literal_caption(text));
        Ok(())
    }

    fn insert_literal(&mut self, text: &str) -> Result<(), ReportError> {
        self.blocks.push(text.to_string());
        Ok(())
    }

    fn warn(&mut self, message: String) {
        self.warnings.push(message);
    }

    fn evidence_mode(&self) -> EvidenceMode {
        EvidenceMode::ByName
    }
}

/// Flatten a rich-text field to plain text
pub fn flatten_field(
    markup: &str,
    field: &str,
    finding: Option<&FindingEntry>,
    snapshot: &ReportSnapshot,
) -> Result<(String, Vec<String>), ReportError> {
    let mut sink = PlainTextSink::new();
    render_field(markup, field, finding, snapshot, &mut sink)?;
    Ok(sink.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report_config::CompanyInfo;
    use crate::report_model::Report;
    use crate::snapshot;
    use image::{Rgba, RgbaImage};
    use std::path::PathBuf;

    /// Records every call made by the resolver
    #[derive(Default)]
    struct RecordingSink {
        calls: Vec<String>,
        images: Vec<Vec<u8>>,
        warnings: Vec<String>,
    }

    impl FormatSink for RecordingSink {
        fn emit_block(&mut self, node: &RichTextNode) -> Result<(), ReportError> {
            self.calls.push(format!("block:{}", block_text(node)));
            Ok(())
        }

        fn insert_image(&mut self, image: &Path, evidence: &EvidenceRef) -> Result<(), ReportError> {
            self.images.push(std::fs::read(image)?);
            self.calls.push(format!("image:{}", evidence.friendly_name));
            Ok(())
        }

        fn insert_code_text(
            &mut self,
            contents: &str,
            _evidence: &EvidenceRef,
        ) -> Result<(), ReportError> {
            self.calls.push(format!("code:{}", contents));
            Ok(())
        }

        fn insert_caption(&mut self, text: &str) -> Result<(), ReportError> {
            self.calls.push(format!("caption:{}", text));
            Ok(())
        }

        fn insert_literal(&mut self, text: &str) -> Result<(), ReportError> {
            self.calls.push(format!("literal:{}", text));
            Ok(())
        }

        fn warn(&mut self, message: String) {
            self.warnings.push(message);
        }
    }

    fn snapshot_with_evidence(files: &[(&str, PathBuf)]) -> ReportSnapshot {
        let mut snap = snapshot::build(&Report::default(), &CompanyInfo::default());
        snap.client.short_name = "ACME".to_string();
        snap.findings.push(FindingEntry {
            id: 1,
            title: "SQLi".to_string(),
            evidence: files
                .iter()
                .map(|(name, path)| EvidenceRef {
                    friendly_name: name.to_string(),
                    path: path.clone(),
                    caption: format!("{} caption", name),
                    ..EvidenceRef::default()
                })
                .collect(),
            ..FindingEntry::default()
        });
        snap
    }

    #[test]
    fn test_unknown_keyword_is_left_literal() {
        // Arrange
        let snap = snapshot_with_evidence(&[]);
        let mut sink = RecordingSink::default();

        // Act
        render_field(
            "<p>{{.nonexistent}}</p>",
            "description",
            snap.findings.first(),
            &snap,
            &mut sink,
        )
        .unwrap();

        // Assert
        assert_eq!(sink.calls, vec!["literal:{{.nonexistent}}"]);
    }

    #[test]
    fn test_image_evidence_is_bordered_and_idempotent() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("screenshot.png");
        RgbaImage::from_pixel(5, 5, Rgba([10, 200, 10, 255]))
            .save(&path)
            .unwrap();
        let snap = snapshot_with_evidence(&[("screenshot", path.clone())]);
        let mut sink = RecordingSink::default();

        // Act: resolve the same reference twice
        for _ in 0..2 {
            render_field("<p>{{.screenshot}}</p>", "d", snap.findings.first(), &snap, &mut sink)
                .unwrap();
        }

        // Assert
        assert_eq!(sink.images.len(), 2);
        assert_eq!(sink.images[0], sink.images[1]);
        let embedded = image::load_from_memory(&sink.images[0]).unwrap();
        assert_eq!(embedded.width(), 7);
        assert!(dir.path().join("border_screenshot.png").exists());
    }

    #[test]
    fn test_text_evidence_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nmap.log");
        std::fs::write(&path, "22/tcp open ssh").unwrap();
        let snap = snapshot_with_evidence(&[("scan", path)]);
        let mut sink = RecordingSink::default();

        render_field("<p>{{.scan}}</p>", "d", snap.findings.first(), &snap, &mut sink).unwrap();

        assert_eq!(sink.calls, vec!["code:22/tcp open ssh"]);
    }

    #[test]
    fn test_missing_file_warns_and_skips() {
        // Arrange
        let snap = snapshot_with_evidence(&[("gone", PathBuf::from("/nonexistent/gone.png"))]);
        let mut sink = RecordingSink::default();

        // Act
        render_field("<p>{{.gone}}</p>", "d", snap.findings.first(), &snap, &mut sink).unwrap();

        // Assert
        assert!(sink.calls.is_empty());
        assert_eq!(sink.warnings.len(), 1);
    }

    #[test]
    fn test_unrenderable_extension_is_skipped_silently() {
        let snap = snapshot_with_evidence(&[("payload", PathBuf::from("/tmp/payload.ps1"))]);
        let mut sink = RecordingSink::default();

        render_field("<p>{{.payload}}</p>", "d", snap.findings.first(), &snap, &mut sink)
            .unwrap();

        assert!(sink.calls.is_empty());
        assert!(sink.warnings.is_empty());
    }

    #[test]
    fn test_caption_and_client_resolution() {
        let snap = snapshot_with_evidence(&[]);
        let mut sink = RecordingSink::default();

        render_field(
            "<p>Report for {{.client}} Inc.</p><p>{{.caption}} Login page</p>",
            "d",
            None,
            &snap,
            &mut sink,
        )
        .unwrap();

        assert_eq!(
            sink.calls,
            vec!["block:Report for ACME Inc.", "caption:Login page"]
        );
    }

    #[test]
    fn test_client_falls_back_to_full_name() {
        let mut snap = snapshot_with_evidence(&[]);
        snap.client.short_name.clear();
        snap.client.full_name = "Acme Corporation".to_string();

        let (text, _) = flatten_field("<p>For {{.client}}</p>", "d", None, &snap).unwrap();

        assert_eq!(text, "For Acme Corporation");
    }

    #[test]
    fn test_flatten_references_evidence_by_name() {
        // Arrange: the file does not exist, but plain text never touches it
        let snap = snapshot_with_evidence(&[("screenshot", PathBuf::from("/nope/s.png"))]);

        // Act
        let (text, warnings) = flatten_field(
            "<p>Intro</p><p>{{.screenshot}}</p>",
            "description",
            snap.findings.first(),
            &snap,
        )
        .unwrap();

        // Assert
        assert_eq!(
            text,
            "Intro\n<See Report for Evidence File: screenshot>\nCaption – screenshot caption"
        );
        assert!(warnings.is_empty());
    }
}
