//! Word export that preserves template styles and layout
//!
//! The template `.docx` is opened as a package and edited in place, so its
//! title page, styles, headers, footers and theme survive untouched.
//!
//! # Approach
//! 1. Paragraphs holding a block marker (`{{findings}}`, `{{observations}}`,
//!    `{{infrastructure}}`) are swapped for internal sentinels
//! 2. `{{ dotted.path }}` tags in `word/document.xml` are rendered against
//!    the snapshot context
//! 3. Generated OOXML replaces each sentinel; findings without a marker go
//!    at the end of the body, ahead of the final section properties
//! 4. Media, relationships, numbering, styles, content types and document
//!    properties are registered

use crate::docx_numbering::NumberingState;
use crate::error::ReportError;
use crate::ooxml::{
    self, add_relationship, ensure_default_content_type, ensure_override_content_type,
    image_content_type, image_extent_emu, insert_before_last, max_relationship_id, xml_text,
    CoreProperties, Package, CONTENT_TYPES_PART, CT_NUMBERING, EMPTY_RELATIONSHIPS, REL_IMAGE,
    REL_NUMBERING,
};
use crate::pipeline::{RenderOptions, Rendered};
use crate::resolver::{self, FormatSink};
use crate::rich_text::{strip_tags, InlineRun, ListItem, RichTextNode, TextRun, CLIENT_KEYWORD};
use crate::severity;
use crate::snapshot::{EvidenceRef, FindingEntry, ReportSnapshot};
use crate::template_tags;
use crate::templates;
use std::path::Path;

const FORMAT: &str = "docx";

/// Placeholder text for empty required sections
const NOT_APPLICABLE: &str = "N/A";

const DOCUMENT_PART: &str = "word/document.xml";
const DOCUMENT_RELS_PART: &str = "word/_rels/document.xml.rels";
const STYLES_PART: &str = "word/styles.xml";
const NUMBERING_PART: &str = "word/numbering.xml";

/// Generated relationship and drawing ids start high to avoid template ids
const FIRST_GENERATED_ID: u32 = 1000;

/// Markers replaced by generated content
const BLOCK_MARKERS: [&str; 3] = ["findings", "observations", "infrastructure"];

const FINDING_HEADING_STYLE: &str = "Heading2";
const SECTION_HEADING_STYLE: &str = "Heading3";

const PAGE_BREAK: &str = r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#;

/// Styles added to the template when it lacks them
const REQUIRED_STYLES: &[(&str, &str)] = &[
    (
        "Caption",
        r#"<w:style w:type="paragraph" w:styleId="Caption"><w:name w:val="caption"/><w:qFormat/><w:pPr><w:spacing w:before="0" w:after="200"/><w:jc w:val="center"/></w:pPr><w:rPr><w:i/><w:iCs/><w:sz w:val="18"/><w:szCs w:val="18"/></w:rPr></w:style>"#,
    ),
    (
        "CodeBlock",
        r#"<w:style w:type="paragraph" w:customStyle="1" w:styleId="CodeBlock"><w:name w:val="Code Block"/><w:qFormat/><w:pPr><w:shd w:val="clear" w:color="auto" w:fill="F2F2F2"/><w:spacing w:before="0" w:after="0"/></w:pPr><w:rPr><w:rFonts w:ascii="Consolas" w:hAnsi="Consolas" w:cs="Consolas"/><w:sz w:val="18"/><w:szCs w:val="18"/></w:rPr></w:style>"#,
    ),
    (
        "ListParagraph",
        r#"<w:style w:type="paragraph" w:styleId="ListParagraph"><w:name w:val="List Paragraph"/><w:qFormat/><w:pPr><w:ind w:left="720"/><w:contextualSpacing/></w:pPr></w:style>"#,
    ),
];

/// Sections of a finding after its heading and severity, in render order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FindingSection {
    AffectedEntities,
    Description,
    Impact,
    Recommendation,
    Replication,
    HostDetection,
    NetworkDetection,
    References,
}

impl FindingSection {
    const ORDER: [FindingSection; 8] = [
        FindingSection::AffectedEntities,
        FindingSection::Description,
        FindingSection::Impact,
        FindingSection::Recommendation,
        FindingSection::Replication,
        FindingSection::HostDetection,
        FindingSection::NetworkDetection,
        FindingSection::References,
    ];

    fn heading(self) -> &'static str {
        match self {
            FindingSection::AffectedEntities => "Affected Entities",
            FindingSection::Description => "Description",
            FindingSection::Impact => "Impact",
            FindingSection::Recommendation => "Recommendation",
            FindingSection::Replication => "Replication Steps",
            FindingSection::HostDetection => "Host Detection",
            FindingSection::NetworkDetection => "Network Detection",
            FindingSection::References => "References",
        }
    }

    fn content(self, finding: &FindingEntry) -> &str {
        match self {
            FindingSection::AffectedEntities => &finding.affected_entities,
            FindingSection::Description => &finding.description,
            FindingSection::Impact => &finding.impact,
            FindingSection::Recommendation => &finding.recommendation,
            FindingSection::Replication => &finding.replication_steps,
            FindingSection::HostDetection => &finding.host_detection,
            FindingSection::NetworkDetection => &finding.network_detection,
            FindingSection::References => &finding.references,
        }
    }

    /// Optional sections are omitted when empty; required ones print N/A
    fn required(self) -> bool {
        !matches!(
            self,
            FindingSection::HostDetection
                | FindingSection::NetworkDetection
                | FindingSection::References
        )
    }
}

/// An image part to add under `word/media/`
#[derive(Debug)]
struct MediaPart {
    rel_id: String,
    file_name: String,
    extension: String,
    bytes: Vec<u8>,
}

/// Counters and pending parts for one render
#[derive(Debug)]
struct RenderState {
    figure: u32,
    next_drawing_id: u32,
    next_rel_id: u32,
    media: Vec<MediaPart>,
    numbering: NumberingState,
    /// Rich-text fields rendered so far; keys list numbering per field
    fields_rendered: usize,
    warnings: Vec<String>,
}

/// Writes body XML for generated content
struct DocxWriter<'a> {
    state: RenderState,
    body: String,
    options: &'a RenderOptions,
}

/// Render a snapshot into a Word document
pub fn render(snapshot: &ReportSnapshot, options: &RenderOptions) -> Result<Rendered, ReportError> {
    let mut package = match &options.docx_template {
        Some(path) => Package::read_template(path, "Word")?,
        None => Package::from_bytes(&templates::blank_docx()?, "Word")?,
    };

    let document_xml = package.require_str(DOCUMENT_PART, "Word")?;
    let rels_xml = package
        .part_str(DOCUMENT_RELS_PART)
        .unwrap_or_else(|| EMPTY_RELATIONSHIPS.to_string());
    let numbering_xml = package.part_str(NUMBERING_PART);

    // Stage 1: protect block markers from tag rendering
    let mut document_xml = document_xml;
    for name in BLOCK_MARKERS {
        if let Some(replaced) =
            template_tags::replace_marker_paragraph(&document_xml, name, &sentinel(name))
        {
            document_xml = replaced;
        }
    }

    // Stage 2: document-level template tags
    let context = template_tags::template_context(snapshot)?;
    let mut document_xml = template_tags::render_tags(&document_xml, &context)?;

    // Stage 3: generated content
    let mut writer = DocxWriter {
        state: RenderState {
            figure: 0,
            next_drawing_id: FIRST_GENERATED_ID,
            next_rel_id: FIRST_GENERATED_ID.max(max_relationship_id(&rels_xml) + 1),
            media: Vec::new(),
            numbering: NumberingState::new(numbering_xml.as_deref()),
            fields_rendered: 0,
            warnings: Vec::new(),
        },
        body: String::new(),
        options,
    };

    writer.write_findings(snapshot)?;
    let findings_xml = writer.take_body();
    document_xml = match splice_sentinel(&document_xml, "findings", &findings_xml) {
        Some(xml) => xml,
        None => append_to_body(&document_xml, &findings_xml)?,
    };

    if document_xml.contains(&sentinel("observations")) {
        writer.write_observations(snapshot)?;
        let xml = writer.take_body();
        document_xml = splice_sentinel(&document_xml, "observations", &xml).unwrap_or(document_xml);
    }

    if document_xml.contains(&sentinel("infrastructure")) {
        writer.write_infrastructure(snapshot);
        let xml = writer.take_body();
        document_xml =
            splice_sentinel(&document_xml, "infrastructure", &xml).unwrap_or(document_xml);
    }

    package.set_part(DOCUMENT_PART, document_xml);

    // Stage 4: supporting parts
    let state = writer.state;
    register_media(&mut package, &rels_xml, &state.media)?;
    if state.numbering.is_dirty() {
        let had_numbering = numbering_xml.is_some();
        let merged = state.numbering.finish(numbering_xml.as_deref())?;
        package.set_part(NUMBERING_PART, merged);
        if !had_numbering {
            register_numbering_part(&mut package)?;
        }
    }
    let styles = package.require_str(STYLES_PART, "Word")?;
    package.set_part(STYLES_PART, ensure_required_styles(&styles)?);

    core_properties(snapshot).apply(&mut package)?;

    log::info!(
        "Rendered DOCX with {} findings, {} figures and {} images",
        snapshot.findings.len(),
        state.figure,
        state.media.len()
    );

    Ok(Rendered {
        bytes: package.to_bytes()?,
        warnings: state.warnings,
    })
}

fn sentinel(name: &str) -> String {
    format!(r#"<reportwriter-block name="{}"/>"#, name)
}

fn splice_sentinel(xml: &str, name: &str, content: &str) -> Option<String> {
    let marker = sentinel(name);
    xml.contains(&marker).then(|| xml.replacen(&marker, content, 1))
}

/// Insert content at the end of the body, before the final section properties
fn append_to_body(xml: &str, content: &str) -> Result<String, ReportError> {
    let body_end = xml
        .rfind("</w:body>")
        .ok_or_else(|| ReportError::render(FORMAT, "Could not find </w:body> in document.xml"))?;

    let insert_at = match xml[..body_end].rfind("<w:sectPr") {
        Some(pos) if !xml[pos..body_end].contains("</w:p>") => pos,
        _ => body_end,
    };

    let mut result = String::with_capacity(xml.len() + content.len());
    result.push_str(&xml[..insert_at]);
    result.push_str(content);
    result.push_str(&xml[insert_at..]);
    Ok(result)
}

impl DocxWriter<'_> {
    fn take_body(&mut self) -> String {
        std::mem::take(&mut self.body)
    }

    fn push_paragraph(&mut self, style: Option<&str>, runs_xml: &str) {
        self.body.push_str(&paragraph_xml(style, runs_xml));
    }

    /// Render one rich-text field through the resolver
    fn write_field(
        &mut self,
        markup: &str,
        label: &str,
        finding: Option<&FindingEntry>,
        snapshot: &ReportSnapshot,
    ) -> Result<(), ReportError> {
        self.state.fields_rendered += 1;
        resolver::render_field(markup, label, finding, snapshot, self)
    }

    fn write_findings(&mut self, snapshot: &ReportSnapshot) -> Result<(), ReportError> {
        if snapshot.findings.is_empty() {
            self.push_paragraph(None, &plain_run_xml(NOT_APPLICABLE));
            return Ok(());
        }

        for (idx, finding) in snapshot.findings.iter().enumerate() {
            if idx > 0 {
                self.body.push_str(PAGE_BREAK);
            }
            self.write_finding(finding, snapshot)?;
        }
        Ok(())
    }

    /// Heading → Severity → sections
    fn write_finding(
        &mut self,
        finding: &FindingEntry,
        snapshot: &ReportSnapshot,
    ) -> Result<(), ReportError> {
        log::debug!("Rendering finding {} ({})", finding.id, finding.title);

        self.push_paragraph(Some(FINDING_HEADING_STYLE), &plain_run_xml(&finding.title));
        self.push_paragraph(None, &severity_runs_xml(finding));

        for section in FindingSection::ORDER {
            let content = section.content(finding);
            let empty = strip_tags(content).trim().is_empty();
            if empty && !section.required() {
                continue;
            }

            self.push_paragraph(Some(SECTION_HEADING_STYLE), &plain_run_xml(section.heading()));
            if empty {
                self.push_paragraph(None, &plain_run_xml(NOT_APPLICABLE));
            } else {
                let label = format!("{} / {}", finding.title, section.heading());
                self.write_field(content, &label, Some(finding), snapshot)?;
            }
        }
        Ok(())
    }

    fn write_observations(&mut self, snapshot: &ReportSnapshot) -> Result<(), ReportError> {
        if snapshot.observations.is_empty() {
            self.push_paragraph(None, &plain_run_xml(NOT_APPLICABLE));
            return Ok(());
        }

        for observation in &snapshot.observations {
            self.push_paragraph(Some(FINDING_HEADING_STYLE), &plain_run_xml(&observation.title));
            if strip_tags(&observation.description).trim().is_empty() {
                self.push_paragraph(None, &plain_run_xml(NOT_APPLICABLE));
            } else {
                let label = format!("{} / Description", observation.title);
                self.write_field(&observation.description, &label, None, snapshot)?;
            }
        }
        Ok(())
    }

    fn write_infrastructure(&mut self, snapshot: &ReportSnapshot) {
        let infra = &snapshot.infrastructure;
        let date = |d: Option<chrono::NaiveDate>| {
            d.map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| NOT_APPLICABLE.to_string())
        };

        self.push_paragraph(Some(SECTION_HEADING_STYLE), &plain_run_xml("Domains"));
        self.body.push_str(&table_xml(
            &["Domain", "Purpose", "Start Date", "End Date"],
            infra
                .domains
                .iter()
                .map(|d| vec![d.domain.clone(), d.activity.clone(), date(d.start_date), date(d.end_date)])
                .collect(),
        ));

        self.push_paragraph(Some(SECTION_HEADING_STYLE), &plain_run_xml("Servers"));
        let servers = infra
            .static_servers
            .iter()
            .map(|s| vec![s.ip_address.clone(), s.provider.clone(), s.role.clone(), s.activity.clone()])
            .chain(infra.cloud_servers.iter().map(|s| {
                vec![s.ip_address.clone(), s.provider.clone(), s.role.clone(), s.activity.clone()]
            }))
            .collect();
        self.body.push_str(&table_xml(
            &["IP Address", "Provider", "Role", "Purpose"],
            servers,
        ));

        self.push_paragraph(Some(SECTION_HEADING_STYLE), &plain_run_xml("Domains & Servers"));
        self.body.push_str(&table_xml(
            &["Domain", "Servers", "CDN Endpoints"],
            infra
                .domain_server_links
                .iter()
                .map(|link| {
                    vec![
                        link.domain.clone(),
                        link.servers.join(", "),
                        link.endpoints.join(", "),
                    ]
                })
                .collect(),
        ));
    }

    fn write_list(&mut self, items: &[ListItem], num_id: u32) {
        for item in items {
            let props = format!(
                r#"<w:pPr><w:pStyle w:val="ListParagraph"/><w:numPr><w:ilvl w:val="{}"/><w:numId w:val="{}"/></w:numPr></w:pPr>"#,
                item.level.min(8),
                num_id
            );
            self.body.push_str(&format!(
                "<w:p>{}{}</w:p>",
                props,
                inline_runs_xml(&item.runs)
            ));
        }
    }

    fn write_code_lines<'l>(&mut self, lines: impl Iterator<Item = &'l str>) {
        let runs = lines
            .enumerate()
            .map(|(idx, line)| {
                let br = if idx > 0 { "<w:br/>" } else { "" };
                format!(
                    r#"<w:r><w:rPr><w:rFonts w:ascii="Consolas" w:hAnsi="Consolas" w:cs="Consolas"/></w:rPr>{}<w:t xml:space="preserve">{}</w:t></w:r>"#,
                    br,
                    xml_text(line)
                )
            })
            .collect::<String>();
        if !runs.is_empty() {
            self.push_paragraph(Some("CodeBlock"), &runs);
        }
    }

    /// Caption paragraph with an auto-numbered `SEQ Figure` field
    fn write_caption(&mut self, text: &str) {
        self.state.figure += 1;
        let mut runs = format!(
            r#"<w:r><w:t xml:space="preserve">Figure </w:t></w:r><w:fldSimple w:instr=" SEQ Figure \* ARABIC "><w:r><w:rPr><w:noProof/></w:rPr><w:t>{}</w:t></w:r></w:fldSimple>"#,
            self.state.figure
        );
        if !text.trim().is_empty() {
            runs.push_str(&plain_run_xml(&format!(
                " {} {}",
                resolver::CAPTION_SEPARATOR,
                text.trim()
            )));
        }
        self.push_paragraph(Some("Caption"), &runs);
    }
}

impl FormatSink for DocxWriter<'_> {
    fn emit_block(&mut self, node: &RichTextNode) -> Result<(), ReportError> {
        match node {
            RichTextNode::Paragraph { runs } => {
                self.push_paragraph(None, &inline_runs_xml(runs));
            }
            RichTextNode::CodeBlock { lines } => {
                self.write_code_lines(lines.iter().map(String::as_str));
            }
            RichTextNode::BulletList { items } => {
                let num_id = self.state.numbering.bullet_num(max_level(items));
                self.write_list(items, num_id);
            }
            RichTextNode::NumberList { items, numbering } => {
                let num_id = self.state.numbering.ordered_num(
                    self.state.fields_rendered,
                    numbering,
                    max_level(items),
                );
                self.write_list(items, num_id);
            }
        }
        Ok(())
    }

    fn insert_image(&mut self, image: &Path, evidence: &EvidenceRef) -> Result<(), ReportError> {
        let bytes = std::fs::read(image)?;
        let extension = image
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("png")
            .to_ascii_lowercase();
        let (cx, cy) = image_extent_emu(&bytes, self.options.image_width_inches);

        let rel_id = format!("rId{}", self.state.next_rel_id);
        self.state.next_rel_id += 1;
        let drawing_id = self.state.next_drawing_id;
        self.state.next_drawing_id += 1;

        let file_name = format!("evidence{}.{}", drawing_id, extension);
        self.body
            .push_str(&drawing_xml(&rel_id, drawing_id, cx, cy, &evidence.friendly_name));
        self.state.media.push(MediaPart {
            rel_id,
            file_name,
            extension,
            bytes,
        });

        self.write_caption(&evidence.caption);
        Ok(())
    }

    fn insert_code_text(
        &mut self,
        contents: &str,
        evidence: &EvidenceRef,
    ) -> Result<(), ReportError> {
        self.write_code_lines(contents.lines());
        self.write_caption(&evidence.caption);
        Ok(())
    }

    fn insert_caption(&mut self, text: &str) -> Result<(), ReportError> {
        self.write_caption(text);
        Ok(())
    }

    fn insert_literal(&mut self, text: &str) -> Result<(), ReportError> {
        self.push_paragraph(None, &plain_run_xml(text));
        Ok(())
    }

    fn warn(&mut self, message: String) {
        self.state.warnings.push(message);
    }

    fn evidence_mode(&self) -> resolver::EvidenceMode {
        resolver::EvidenceMode::Embed(self.options.border)
    }
}

fn max_level(items: &[ListItem]) -> usize {
    items.iter().map(|i| i.level).max().unwrap_or(0)
}

fn paragraph_xml(style: Option<&str>, runs_xml: &str) -> String {
    match style {
        Some(style) => format!(
            r#"<w:p><w:pPr><w:pStyle w:val="{}"/></w:pPr>{}</w:p>"#,
            style, runs_xml
        ),
        None => format!("<w:p>{}</w:p>", runs_xml),
    }
}

/// Text elements for a string, turning newlines into `<w:br/>`
fn text_elements(text: &str) -> String {
    text.split('\n')
        .map(|line| format!(r#"<w:t xml:space="preserve">{}</w:t>"#, xml_text(line)))
        .collect::<Vec<_>>()
        .join("<w:br/>")
}

fn plain_run_xml(text: &str) -> String {
    format!("<w:r>{}</w:r>", text_elements(text))
}

/// OOXML for a formatted text run
///
/// Run properties follow schema order: fonts, bold, italic, underline.
fn text_run_xml(run: &TextRun) -> String {
    if run.is_line_break() {
        return "<w:r><w:br/></w:r>".to_string();
    }

    let mut props = String::new();
    if run.inline_code {
        props.push_str(r#"<w:rFonts w:ascii="Consolas" w:hAnsi="Consolas" w:cs="Consolas"/>"#);
    }
    if run.bold {
        props.push_str("<w:b/>");
    }
    if run.italic {
        props.push_str("<w:i/>");
    }
    if run.underline {
        props.push_str(r#"<w:u w:val="single"/>"#);
    }

    if props.is_empty() {
        format!("<w:r>{}</w:r>", text_elements(&run.content))
    } else {
        format!(
            "<w:r><w:rPr>{}</w:rPr>{}</w:r>",
            props,
            text_elements(&run.content)
        )
    }
}

fn inline_runs_xml(runs: &[InlineRun]) -> String {
    runs.iter()
        .map(|run| match run {
            InlineRun::Text(text) => text_run_xml(text),
            InlineRun::ClientPlaceholder => plain_run_xml(CLIENT_KEYWORD),
            InlineRun::CaptionPlaceholder { text } => plain_run_xml(text),
            InlineRun::EvidenceReference { keyword } => {
                plain_run_xml(&format!("{{{{.{}}}}}", keyword))
            }
        })
        .collect()
}

/// "Severity: " followed by the severity in its palette colour
fn severity_runs_xml(finding: &FindingEntry) -> String {
    let label = r#"<w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">Severity: </w:t></w:r>"#;
    if finding.severity.is_empty() {
        return format!("{}{}", label, plain_run_xml(NOT_APPLICABLE));
    }
    format!(
        r#"{}<w:r><w:rPr><w:b/><w:color w:val="{}"/></w:rPr><w:t xml:space="preserve">{}</w:t></w:r>"#,
        label,
        severity::text_hex(&finding.severity),
        xml_text(&finding.severity)
    )
}

/// Inline picture paragraph
fn drawing_xml(rel_id: &str, id: u32, cx: i64, cy: i64, description: &str) -> String {
    format!(
        r#"<w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:r><w:drawing><wp:inline distT="0" distB="0" distL="0" distR="0" xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing"><wp:extent cx="{cx}" cy="{cy}"/><wp:docPr id="{id}" name="Picture {id}" descr="{descr}"/><a:graphic xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture"><pic:pic xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture"><pic:nvPicPr><pic:cNvPr id="{id}" name="Picture {id}"/><pic:cNvPicPr/></pic:nvPicPr><pic:blipFill><a:blip r:embed="{rel_id}" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill><pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr></pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r></w:p>"#,
        cx = cx,
        cy = cy,
        id = id,
        descr = xml_text(description),
        rel_id = rel_id,
    )
}

/// Bordered table with a bold header row
fn table_xml(headers: &[&str], rows: Vec<Vec<String>>) -> String {
    if rows.is_empty() {
        return paragraph_xml(None, &plain_run_xml(NOT_APPLICABLE));
    }

    let mut xml = String::from(
        r#"<w:tbl><w:tblPr><w:tblW w:w="0" w:type="auto"/><w:tblBorders><w:top w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:left w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:bottom w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:right w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:insideH w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:insideV w:val="single" w:sz="4" w:space="0" w:color="auto"/></w:tblBorders></w:tblPr><w:tblGrid>"#,
    );
    for _ in headers {
        xml.push_str("<w:gridCol/>");
    }
    xml.push_str("</w:tblGrid><w:tr>");
    for header in headers {
        xml.push_str(&format!(
            r#"<w:tc><w:p><w:r><w:rPr><w:b/></w:rPr>{}</w:r></w:p></w:tc>"#,
            text_elements(header)
        ));
    }
    xml.push_str("</w:tr>");

    for row in rows {
        xml.push_str("<w:tr>");
        for cell in row {
            let cell = if cell.trim().is_empty() {
                NOT_APPLICABLE.to_string()
            } else {
                cell
            };
            xml.push_str(&format!("<w:tc><w:p>{}</w:p></w:tc>", plain_run_xml(&cell)));
        }
        xml.push_str("</w:tr>");
    }
    xml.push_str("</w:tbl>");
    xml
}

/// Add media parts, their relationships and content types
fn register_media(
    package: &mut Package,
    rels_xml: &str,
    media: &[MediaPart],
) -> Result<(), ReportError> {
    let mut rels = rels_xml.to_string();
    let mut content_types = package.require_str(CONTENT_TYPES_PART, "Word")?;

    for part in media {
        rels = add_relationship(
            &rels,
            &part.rel_id,
            REL_IMAGE,
            &format!("media/{}", part.file_name),
        )?;
        content_types = ensure_default_content_type(
            &content_types,
            &part.extension,
            image_content_type(&part.extension),
        )?;
        package.set_part(format!("word/media/{}", part.file_name), part.bytes.clone());
    }

    package.set_part(DOCUMENT_RELS_PART, rels);
    package.set_part(CONTENT_TYPES_PART, content_types);
    Ok(())
}

/// Wire a freshly created numbering part into the package
fn register_numbering_part(package: &mut Package) -> Result<(), ReportError> {
    let rels = package
        .part_str(DOCUMENT_RELS_PART)
        .unwrap_or_else(|| EMPTY_RELATIONSHIPS.to_string());
    if !ooxml::relationships(&rels)
        .iter()
        .any(|rel| rel.rel_type == REL_NUMBERING)
    {
        let id = format!("rId{}", max_relationship_id(&rels) + 1);
        let rels = add_relationship(&rels, &id, REL_NUMBERING, "numbering.xml")?;
        package.set_part(DOCUMENT_RELS_PART, rels);
    }

    let content_types = package.require_str(CONTENT_TYPES_PART, "Word")?;
    let content_types = ensure_override_content_type(&content_types, NUMBERING_PART, CT_NUMBERING)?;
    package.set_part(CONTENT_TYPES_PART, content_types);
    Ok(())
}

/// Ensure required styles are present in styles.xml
fn ensure_required_styles(styles_xml: &str) -> Result<String, ReportError> {
    let missing: String = REQUIRED_STYLES
        .iter()
        .filter(|(id, _)| !styles_xml.contains(&format!(r#"w:styleId="{}""#, id)))
        .map(|(_, xml)| *xml)
        .collect();

    if missing.is_empty() {
        return Ok(styles_xml.to_string());
    }
    insert_before_last(styles_xml, "</w:styles>", &missing, STYLES_PART)
}

fn core_properties(snapshot: &ReportSnapshot) -> CoreProperties {
    CoreProperties {
        title: snapshot.report.title.clone(),
        subject: format!(
            "{} {}",
            snapshot.client.full_name, snapshot.project.project_type
        )
        .trim()
        .to_string(),
        creator: snapshot.company.name.clone(),
        keywords: snapshot.project.project_type.clone(),
    }
}
