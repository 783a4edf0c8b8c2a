//! PowerPoint export built on a template deck
//!
//! The template supplies masters, layouts and theme. Any slides it carries
//! are dropped and a fixed sequence of slides is generated:
//!
//! Title → Agenda → Introduction → Methodology → Attack Path Overview →
//! Findings Overview → Findings table → one slide per finding →
//! Observations (when present) → Recommendations → Conclusion → closing slide

use crate::error::{ReportError, TemplateError};
use crate::ooxml::{
    add_relationship, ensure_default_content_type, ensure_override_content_type, image_content_type,
    inches, max_relationship_id, relationships, remove_override_content_type,
    remove_relationships_where, resolve_target, CoreProperties, Package, CONTENT_TYPES_PART,
    EMPTY_RELATIONSHIPS, EMUS_PER_INCH, REL_IMAGE, REL_NOTES_MASTER, REL_NOTES_SLIDE, REL_SLIDE,
    REL_SLIDE_LAYOUT, REL_THEME,
};
use crate::pipeline::{RenderOptions, Rendered};
use crate::pptx_shapes::{
    self, Bullet, Frame, Placeholder, TableCell, TextParagraph, TextSpan,
};
use crate::resolver::{self, EvidenceMode, FormatSink};
use crate::rich_text::{strip_tags, InlineRun, ListItem, RichTextNode, TextStyle, CLIENT_KEYWORD};
use crate::severity;
use crate::snapshot::{EvidenceRef, FindingEntry, ReportSnapshot};
use crate::templates;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

const KIND: &str = "PowerPoint";

/// Placeholder text for empty content
const NOT_APPLICABLE: &str = "N/A";

const PRESENTATION_PART: &str = "ppt/presentation.xml";
const PRESENTATION_RELS_PART: &str = "ppt/_rels/presentation.xml.rels";
const NOTES_MASTER_PART: &str = "ppt/notesMasters/notesMaster1.xml";

const CT_SLIDE: &str = "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";
const CT_NOTES_SLIDE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.notesSlide+xml";
const CT_NOTES_MASTER: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.notesMaster+xml";
const CT_THEME: &str = "application/vnd.openxmlformats-officedocument.theme+xml";

const TITLE_LAYOUT: &str = "Title Slide";
const CONTENT_LAYOUT: &str = "Title and Content";

/// Slide ids below 256 are reserved
const FIRST_SLIDE_ID: u32 = 256;

/// Default 16:9 slide width
const DEFAULT_SLIDE_WIDTH: i64 = 12_192_000;

const EVIDENCE_TOP_INCHES: f64 = 1.65;
const EVIDENCE_WIDTH_INCHES: f64 = 4.5;
const EVIDENCE_HEIGHT_INCHES: f64 = 3.0;
const CAPTION_HEIGHT_INCHES: f64 = 0.5;

static LAYOUT_PART: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ppt/slideLayouts/slideLayout(\d+)\.xml$").expect("layout part regex is valid")
});

static LAYOUT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<p:cSld\s+name="([^"]*)""#).expect("layout name regex is valid"));

static SLIDE_SIZE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<p:sldSz[^>]*\bcx="(\d+)""#).expect("slide size regex is valid"));

static SLIDE_ID_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<p:sldIdLst\s*/>|<p:sldIdLst>.*?</p:sldIdLst>")
        .expect("slide id list regex is valid")
});

static SECTION_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<p:ext [^>]*>\s*<p14:sectionLst.*?</p14:sectionLst>\s*</p:ext>")
        .expect("section list regex is valid")
});

/// Which layout a slide is built on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LayoutKind {
    Title,
    Content,
}

/// Layout part names chosen from the template
#[derive(Debug, Clone)]
struct Layouts {
    title: String,
    content: String,
}

impl Layouts {
    fn part(&self, kind: LayoutKind) -> &str {
        match kind {
            LayoutKind::Title => &self.title,
            LayoutKind::Content => &self.content,
        }
    }
}

/// Evidence placed in the fixed evidence frame of a slide
#[derive(Debug)]
enum SlideEvidence {
    Picture {
        bytes: Vec<u8>,
        extension: String,
        description: String,
        caption: String,
    },
    /// Text capture shown in its own monospace text box
    Text { lines: Vec<String>, caption: String },
}

impl SlideEvidence {
    fn caption(&self) -> &str {
        match self {
            SlideEvidence::Picture { caption, .. } | SlideEvidence::Text { caption, .. } => caption,
        }
    }
}

/// One slide waiting to be written
#[derive(Debug)]
struct SlideDraft {
    layout: LayoutKind,
    next_shape_id: u32,
    shapes: String,
    evidence: Vec<SlideEvidence>,
    notes: Option<String>,
}

impl SlideDraft {
    fn new(layout: LayoutKind) -> Self {
        Self {
            layout,
            next_shape_id: 2,
            shapes: String::new(),
            evidence: Vec::new(),
            notes: None,
        }
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_shape_id;
        self.next_shape_id += 1;
        id
    }

    fn title(mut self, text: &str) -> Self {
        let kind = match self.layout {
            LayoutKind::Title => Placeholder::CenteredTitle,
            LayoutKind::Content => Placeholder::Title,
        };
        let id = self.next_id();
        self.shapes
            .push_str(&pptx_shapes::placeholder_shape(id, kind, &[TextParagraph::plain(text)]));
        self
    }

    fn body(mut self, paragraphs: &[TextParagraph]) -> Self {
        let kind = match self.layout {
            LayoutKind::Title => Placeholder::Subtitle,
            LayoutKind::Content => Placeholder::Body,
        };
        let id = self.next_id();
        self.shapes
            .push_str(&pptx_shapes::placeholder_shape(id, kind, paragraphs));
        self
    }
}

/// Slides and counters for one render
#[derive(Debug, Default)]
struct RenderState {
    slides: Vec<SlideDraft>,
    next_media: u32,
    warnings: Vec<String>,
}

/// The presentation-level parts edited during a render
struct Deck {
    presentation: String,
    rels: String,
    content_types: String,
}

/// Render a snapshot into a PowerPoint deck
pub fn render(snapshot: &ReportSnapshot, options: &RenderOptions) -> Result<Rendered, ReportError> {
    let mut package = match &options.pptx_template {
        Some(path) => Package::read_template(path, KIND)?,
        None => Package::from_bytes(&templates::blank_pptx()?, KIND)?,
    };

    let layouts = find_layouts(&package)?;
    let mut deck = Deck {
        presentation: package.require_str(PRESENTATION_PART, KIND)?,
        rels: package
            .part_str(PRESENTATION_RELS_PART)
            .unwrap_or_else(|| EMPTY_RELATIONSHIPS.to_string()),
        content_types: package.require_str(CONTENT_TYPES_PART, KIND)?,
    };

    drop_template_slides(&mut package, &mut deck);
    let notes_master = ensure_notes_master(&mut package, &mut deck)?;

    let slide_width = slide_width_of(&deck.presentation);

    let mut state = RenderState::default();
    build_slides(snapshot, options, slide_width, &mut state)?;

    let slide_count = state.slides.len();
    write_slides(&mut package, &mut deck, &layouts, &notes_master, slide_width, &mut state)?;

    package.set_part(PRESENTATION_PART, deck.presentation);
    package.set_part(PRESENTATION_RELS_PART, deck.rels);
    package.set_part(CONTENT_TYPES_PART, deck.content_types);

    CoreProperties {
        title: snapshot.report.title.clone(),
        subject: snapshot.client.full_name.clone(),
        creator: snapshot.company.name.clone(),
        keywords: snapshot.project.project_type.clone(),
    }
    .apply(&mut package)?;

    log::info!(
        "Rendered PPTX with {} slides for {} findings",
        slide_count,
        snapshot.findings.len()
    );

    Ok(Rendered {
        bytes: package.to_bytes()?,
        warnings: state.warnings,
    })
}

/// Pick the title and content layouts by name, falling back to the first layout
fn find_layouts(package: &Package) -> Result<Layouts, ReportError> {
    let mut named: Vec<(u32, String, String)> = package
        .part_names()
        .filter_map(|name| {
            let number = LAYOUT_PART.captures(name)?[1].parse::<u32>().ok()?;
            let layout_name = package
                .part_str(name)
                .and_then(|xml| LAYOUT_NAME.captures(&xml).map(|caps| caps[1].to_string()))
                .unwrap_or_default();
            Some((number, name.to_string(), layout_name))
        })
        .collect();
    named.sort_by_key(|(number, _, _)| *number);

    let first = named
        .first()
        .map(|(_, part, _)| part.clone())
        .ok_or_else(|| TemplateError::InvalidContainer {
            kind: KIND,
            reason: "template has no slide layouts".to_string(),
        })?;

    let by_name = |wanted: &str| {
        named
            .iter()
            .find(|(_, _, name)| name.eq_ignore_ascii_case(wanted))
            .map(|(_, part, _)| part.clone())
            .unwrap_or_else(|| {
                log::warn!("Template has no '{}' layout; using {}", wanted, first);
                first.clone()
            })
    };

    Ok(Layouts {
        title: by_name(TITLE_LAYOUT),
        content: by_name(CONTENT_LAYOUT),
    })
}

/// Remove every slide and notes slide the template carries
fn drop_template_slides(package: &mut Package, deck: &mut Deck) {
    let (rels, removed) = remove_relationships_where(&deck.rels, |rel| rel.rel_type == REL_SLIDE);
    deck.rels = rels;

    let doomed = package.remove_parts_where(|name| {
        name.starts_with("ppt/slides/") || name.starts_with("ppt/notesSlides/")
    });
    for part in &doomed {
        deck.content_types = remove_override_content_type(&deck.content_types, part);
    }

    deck.presentation = SLIDE_ID_LIST.replace_all(&deck.presentation, "").into_owned();
    deck.presentation = SECTION_LIST.replace_all(&deck.presentation, "").into_owned();

    if !removed.is_empty() {
        log::info!("Dropped {} template slides", removed.len());
    }
}

/// Part name of the notes master, adding one when the template lacks it
fn ensure_notes_master(package: &mut Package, deck: &mut Deck) -> Result<String, ReportError> {
    if let Some(rel) = relationships(&deck.rels)
        .into_iter()
        .find(|rel| rel.rel_type == REL_NOTES_MASTER)
    {
        return Ok(resolve_target(PRESENTATION_PART, &rel.target));
    }

    let theme_source = relationships(&deck.rels)
        .into_iter()
        .find(|rel| rel.rel_type == REL_THEME)
        .map(|rel| resolve_target(PRESENTATION_PART, &rel.target))
        .and_then(|part| package.part(&part).map(<[u8]>::to_vec))
        .ok_or_else(|| TemplateError::InvalidContainer {
            kind: KIND,
            reason: "template has no theme".to_string(),
        })?;

    let theme_number = (1..)
        .find(|n| !package.has_part(&format!("ppt/theme/theme{}.xml", n)))
        .unwrap_or(1);
    let theme_part = format!("ppt/theme/theme{}.xml", theme_number);
    package.set_part(theme_part.clone(), theme_source);

    package.set_part(NOTES_MASTER_PART, pptx_shapes::notes_master_xml());
    package.set_part(
        "ppt/notesMasters/_rels/notesMaster1.xml.rels",
        add_relationship(
            EMPTY_RELATIONSHIPS,
            "rId1",
            REL_THEME,
            &format!("../theme/theme{}.xml", theme_number),
        )?,
    );

    let rel_id = format!("rId{}", max_relationship_id(&deck.rels) + 1);
    deck.rels = add_relationship(
        &deck.rels,
        &rel_id,
        REL_NOTES_MASTER,
        "notesMasters/notesMaster1.xml",
    )?;

    let id_list = format!(
        r#"<p:notesMasterIdLst><p:notesMasterId r:id="{}"/></p:notesMasterIdLst>"#,
        rel_id
    );
    deck.presentation = insert_after(&deck.presentation, "</p:sldMasterIdLst>", &id_list)?;

    deck.content_types =
        ensure_override_content_type(&deck.content_types, NOTES_MASTER_PART, CT_NOTES_MASTER)?;
    deck.content_types = ensure_override_content_type(&deck.content_types, &theme_part, CT_THEME)?;

    log::debug!("Added notes master with theme {}", theme_part);
    Ok(NOTES_MASTER_PART.to_string())
}

fn insert_after(xml: &str, anchor: &str, fragment: &str) -> Result<String, ReportError> {
    let position = xml
        .find(anchor)
        .map(|pos| pos + anchor.len())
        .ok_or_else(|| ReportError::render("pptx", format!("Could not find {} in presentation.xml", anchor)))?;
    let mut result = String::with_capacity(xml.len() + fragment.len());
    result.push_str(&xml[..position]);
    result.push_str(fragment);
    result.push_str(&xml[position..]);
    Ok(result)
}

/// Path of a `ppt/` part relative to a sibling folder
fn relative_to_ppt(part: &str) -> String {
    format!("../{}", part.strip_prefix("ppt/").unwrap_or(part))
}

/// Write slide parts, notes, media and the slide id list
fn write_slides(
    package: &mut Package,
    deck: &mut Deck,
    layouts: &Layouts,
    notes_master: &str,
    slide_width: i64,
    state: &mut RenderState,
) -> Result<(), ReportError> {
    let frame = evidence_frame(slide_width);
    let mut id_list = String::from("<p:sldIdLst>");
    let mut next_rel = max_relationship_id(&deck.rels) + 1;

    for (idx, slide) in state.slides.iter().enumerate() {
        let number = idx + 1;
        let slide_part = format!("ppt/slides/slide{}.xml", number);

        let mut shapes = slide.shapes.clone();
        let mut slide_rels = add_relationship(
            EMPTY_RELATIONSHIPS,
            "rId1",
            REL_SLIDE_LAYOUT,
            &relative_to_ppt(layouts.part(slide.layout)),
        )?;

        let mut shape_id = slide.next_shape_id;
        let mut next_slide_rel = 2;
        for item in &slide.evidence {
            match item {
                SlideEvidence::Picture {
                    bytes,
                    extension,
                    description,
                    ..
                } => {
                    state.next_media += 1;
                    let media_name = format!("evidence{}.{}", state.next_media, extension);
                    let rel_id = format!("rId{}", next_slide_rel);
                    next_slide_rel += 1;
                    slide_rels = add_relationship(
                        &slide_rels,
                        &rel_id,
                        REL_IMAGE,
                        &format!("../media/{}", media_name),
                    )?;
                    package.set_part(format!("ppt/media/{}", media_name), bytes.clone());
                    deck.content_types = ensure_default_content_type(
                        &deck.content_types,
                        extension,
                        image_content_type(extension),
                    )?;
                    shapes.push_str(&pptx_shapes::picture(shape_id, &rel_id, description, frame));
                }
                SlideEvidence::Text { lines, .. } => {
                    let paragraphs: Vec<TextParagraph> =
                        lines.iter().map(|line| code_paragraph(line)).collect();
                    shapes.push_str(&pptx_shapes::text_box(shape_id, frame, &paragraphs));
                }
            }
            shape_id += 1;

            let caption_frame = Frame {
                top: frame.top + frame.height,
                height: inches(CAPTION_HEIGHT_INCHES),
                ..frame
            };
            shapes.push_str(&pptx_shapes::text_box(
                shape_id,
                caption_frame,
                &[TextParagraph::plain(resolver::literal_caption(item.caption()))],
            ));
            shape_id += 1;
        }

        if let Some(notes) = &slide.notes {
            let notes_part = format!("ppt/notesSlides/notesSlide{}.xml", number);
            let rel_id = format!("rId{}", next_slide_rel);
            slide_rels = add_relationship(
                &slide_rels,
                &rel_id,
                REL_NOTES_SLIDE,
                &format!("../notesSlides/notesSlide{}.xml", number),
            )?;

            let notes_rels = add_relationship(
                EMPTY_RELATIONSHIPS,
                "rId1",
                REL_NOTES_MASTER,
                &relative_to_ppt(notes_master),
            )?;
            let notes_rels = add_relationship(
                &notes_rels,
                "rId2",
                REL_SLIDE,
                &format!("../slides/slide{}.xml", number),
            )?;

            package.set_part(notes_part.clone(), pptx_shapes::notes_slide_xml(notes));
            package.set_part(
                format!("ppt/notesSlides/_rels/notesSlide{}.xml.rels", number),
                notes_rels,
            );
            deck.content_types =
                ensure_override_content_type(&deck.content_types, &notes_part, CT_NOTES_SLIDE)?;
        }

        package.set_part(slide_part.clone(), pptx_shapes::slide_xml(&shapes));
        package.set_part(format!("ppt/slides/_rels/slide{}.xml.rels", number), slide_rels);
        deck.content_types = ensure_override_content_type(&deck.content_types, &slide_part, CT_SLIDE)?;

        let rel_id = format!("rId{}", next_rel);
        next_rel += 1;
        deck.rels = add_relationship(
            &deck.rels,
            &rel_id,
            REL_SLIDE,
            &format!("slides/slide{}.xml", number),
        )?;
        id_list.push_str(&format!(
            r#"<p:sldId id="{}" r:id="{}"/>"#,
            FIRST_SLIDE_ID + number as u32,
            rel_id
        ));
    }

    id_list.push_str("</p:sldIdLst>");
    deck.presentation = crate::ooxml::insert_before_last(
        &deck.presentation,
        "<p:sldSz",
        &id_list,
        PRESENTATION_PART,
    )?;
    Ok(())
}

fn slide_width_of(presentation: &str) -> i64 {
    SLIDE_SIZE
        .captures(presentation)
        .and_then(|caps| caps[1].parse::<i64>().ok())
        .unwrap_or(DEFAULT_SLIDE_WIDTH)
}

/// Fixed evidence position: 8in from the left on widescreen decks, else 6in
fn evidence_frame(slide_width: i64) -> Frame {
    let left_inches = if slide_width >= 12 * EMUS_PER_INCH {
        8.0
    } else {
        6.0
    };
    Frame {
        left: inches(left_inches),
        top: inches(EVIDENCE_TOP_INCHES),
        width: inches(EVIDENCE_WIDTH_INCHES),
        height: inches(EVIDENCE_HEIGHT_INCHES),
    }
}

/// Build every slide in deck order
fn build_slides(
    snapshot: &ReportSnapshot,
    options: &RenderOptions,
    slide_width: i64,
    state: &mut RenderState,
) -> Result<(), ReportError> {
    let has_observations = !snapshot.observations.is_empty();

    state.slides.push(title_slide(snapshot));
    state.slides.push(agenda_slide(has_observations));
    state.slides.push(introduction_slide(snapshot));
    state
        .slides
        .push(SlideDraft::new(LayoutKind::Content).title("Methodology").body(&[]));
    state
        .slides
        .push(SlideDraft::new(LayoutKind::Content).title("Attack Path Overview").body(&[]));
    state.slides.push(findings_overview_slide(snapshot));
    state.slides.push(findings_table_slide(snapshot, slide_width));

    for finding in &snapshot.findings {
        let slide = finding_slide(finding, snapshot, options, state)?;
        state.slides.push(slide);
    }

    if has_observations {
        let paragraphs: Vec<TextParagraph> = snapshot
            .observations
            .iter()
            .map(|o| TextParagraph::bulleted(o.title.clone(), 0))
            .collect();
        state
            .slides
            .push(SlideDraft::new(LayoutKind::Content).title("Observations").body(&paragraphs));
    }

    let recommendations = recommendations_slide(snapshot, state)?;
    state.slides.push(recommendations);
    state
        .slides
        .push(SlideDraft::new(LayoutKind::Content).title("Conclusion").body(&[]));
    state.slides.push(closing_slide(snapshot));
    Ok(())
}

fn title_slide(snapshot: &ReportSnapshot) -> SlideDraft {
    let mut subtitle = Vec::new();
    if !snapshot.client.display_name().is_empty() {
        subtitle.push(TextParagraph::plain(snapshot.client.display_name()));
    }
    subtitle.push(TextParagraph::plain(
        snapshot.report.generated_on.format("%B %-d, %Y").to_string(),
    ));
    SlideDraft::new(LayoutKind::Title)
        .title(&snapshot.report.title)
        .body(&subtitle)
}

fn agenda_slide(has_observations: bool) -> SlideDraft {
    let items = [
        Some("Introduction"),
        Some("Methodology"),
        Some("Attack Path Overview"),
        Some("Findings Overview"),
        has_observations.then_some("Observations"),
        Some("Recommendations"),
        Some("Conclusion"),
    ];
    let paragraphs: Vec<TextParagraph> = items
        .into_iter()
        .flatten()
        .map(|item| TextParagraph::bulleted(item, 0))
        .collect();
    SlideDraft::new(LayoutKind::Content).title("Agenda").body(&paragraphs)
}

fn introduction_slide(snapshot: &ReportSnapshot) -> SlideDraft {
    let mut paragraphs = vec![TextParagraph::bulleted(
        format!("Client: {}", snapshot.client.full_name),
        0,
    )];
    if !snapshot.project.project_type.is_empty() {
        paragraphs.push(TextParagraph::bulleted(
            format!("Assessment: {}", snapshot.project.project_type),
            0,
        ));
    }
    if let Some(start) = snapshot.project.start_date {
        let end = snapshot
            .project
            .end_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| NOT_APPLICABLE.to_string());
        paragraphs.push(TextParagraph::bulleted(
            format!("Dates: {} to {}", start.format("%Y-%m-%d"), end),
            0,
        ));
    }
    if !snapshot.team.is_empty() {
        let names = snapshot
            .team
            .iter()
            .map(|member| member.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        paragraphs.push(TextParagraph::bulleted(format!("Team: {}", names), 0));
    }
    SlideDraft::new(LayoutKind::Content)
        .title("Introduction")
        .body(&paragraphs)
}

fn findings_overview_slide(snapshot: &ReportSnapshot) -> SlideDraft {
    let mut paragraphs = vec![TextParagraph::plain(format!(
        "Total findings: {}",
        snapshot.findings.len()
    ))];
    let counts =
        severity::count_by_severity(snapshot.findings.iter().map(|f| f.severity.as_str()));
    paragraphs.extend(
        counts
            .into_iter()
            .map(|(name, count)| TextParagraph::bulleted(format!("{}: {}", name, count), 0)),
    );
    SlideDraft::new(LayoutKind::Content)
        .title("Findings Overview")
        .body(&paragraphs)
}

fn findings_table_slide(snapshot: &ReportSnapshot, slide_width: i64) -> SlideDraft {
    let mut slide = SlideDraft::new(LayoutKind::Content).title("Findings Overview");

    let mut rows = vec![vec![TableCell::header("Finding"), TableCell::header("Severity")]];
    rows.extend(snapshot.findings.iter().map(|finding| {
        let severity = if finding.severity.is_empty() {
            TableCell::text(NOT_APPLICABLE)
        } else {
            TableCell::filled(finding.severity.clone(), &finding.severity_color)
        };
        vec![TableCell::text(finding.title.clone()), severity]
    }));

    let margin = inches(0.5);
    let usable = (slide_width - 2 * margin).max(inches(4.0));
    let widths = [usable * 3 / 4, usable - usable * 3 / 4];
    let id = slide.next_id();
    slide
        .shapes
        .push_str(&pptx_shapes::table(id, margin, inches(1.5), &widths, &rows));
    slide
}

fn finding_slide(
    finding: &FindingEntry,
    snapshot: &ReportSnapshot,
    options: &RenderOptions,
    state: &mut RenderState,
) -> Result<SlideDraft, ReportError> {
    let severity = if finding.severity.is_empty() {
        NOT_APPLICABLE
    } else {
        finding.severity.as_str()
    };

    let mut sink = SlideSink {
        paragraphs: Vec::new(),
        evidence: Vec::new(),
        warnings: Vec::new(),
        mode: EvidenceMode::Embed(options.border),
    };
    if strip_tags(&finding.description).trim().is_empty() {
        sink.paragraphs.push(TextParagraph::plain(NOT_APPLICABLE));
    } else {
        let label = format!("{} / Description", finding.title);
        resolver::render_field(&finding.description, &label, Some(finding), snapshot, &mut sink)?;
    }

    let notes = finding_notes(finding, snapshot, state)?;
    state.warnings.append(&mut sink.warnings);

    let mut slide = SlideDraft::new(LayoutKind::Content)
        .title(&format!("{} [{}]", finding.title, severity))
        .body(&sink.paragraphs);
    slide.evidence = sink.evidence;
    slide.notes = Some(notes);
    Ok(slide)
}

/// Speaker notes with every detail field as plain text
fn finding_notes(
    finding: &FindingEntry,
    snapshot: &ReportSnapshot,
    state: &mut RenderState,
) -> Result<String, ReportError> {
    let fields = [
        ("Affected Entities", &finding.affected_entities),
        ("Description", &finding.description),
        ("Impact", &finding.impact),
        ("Recommendation", &finding.recommendation),
        ("Replication Steps", &finding.replication_steps),
        ("Host Detection", &finding.host_detection),
        ("Network Detection", &finding.network_detection),
        ("References", &finding.references),
    ];

    let mut sections = vec![format!(
        "Severity: {}",
        if finding.severity.is_empty() {
            NOT_APPLICABLE
        } else {
            &finding.severity
        }
    )];
    for (heading, markup) in fields {
        let (text, mut warnings) = resolver::flatten_field(markup, heading, Some(finding), snapshot)?;
        state.warnings.append(&mut warnings);
        if !text.trim().is_empty() {
            sections.push(format!("{}\n{}", heading, text.trim()));
        }
    }
    Ok(sections.join("\n\n"))
}

fn recommendations_slide(
    snapshot: &ReportSnapshot,
    state: &mut RenderState,
) -> Result<SlideDraft, ReportError> {
    let mut paragraphs = Vec::new();
    for finding in &snapshot.findings {
        paragraphs.push(TextParagraph::bulleted(finding.title.clone(), 0));
        let (text, mut warnings) =
            resolver::flatten_field(&finding.recommendation, "Recommendation", Some(finding), snapshot)?;
        state.warnings.append(&mut warnings);
        paragraphs.extend(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(|line| TextParagraph::bulleted(line, 1)),
        );
    }
    Ok(SlideDraft::new(LayoutKind::Content)
        .title("Recommendations")
        .body(&paragraphs))
}

fn closing_slide(snapshot: &ReportSnapshot) -> SlideDraft {
    let company = &snapshot.company;
    let paragraphs: Vec<TextParagraph> = [&company.name, &company.email, &company.twitter, &company.address]
        .into_iter()
        .filter(|value| !value.trim().is_empty())
        .flat_map(|value| value.lines().map(TextParagraph::plain).collect::<Vec<_>>())
        .collect();
    SlideDraft::new(LayoutKind::Title)
        .title("Questions?")
        .body(&paragraphs)
}

/// Collects a finding's description as slide paragraphs and evidence
struct SlideSink {
    paragraphs: Vec<TextParagraph>,
    evidence: Vec<SlideEvidence>,
    warnings: Vec<String>,
    mode: EvidenceMode,
}

fn spans(runs: &[InlineRun]) -> Vec<TextSpan> {
    runs.iter()
        .map(|run| match run {
            InlineRun::Text(text) => TextSpan {
                text: text.content.clone(),
                style: text.style(),
            },
            InlineRun::ClientPlaceholder => TextSpan::plain(CLIENT_KEYWORD),
            InlineRun::CaptionPlaceholder { text } => TextSpan::plain(text.clone()),
            InlineRun::EvidenceReference { keyword } => {
                TextSpan::plain(format!("{{{{.{}}}}}", keyword))
            }
        })
        .collect()
}

fn list_paragraphs(items: &[ListItem], first: Bullet) -> Vec<TextParagraph> {
    items
        .iter()
        .map(|item| TextParagraph {
            spans: spans(&item.runs),
            level: item.level,
            bullet: if item.level == 0 { first } else { Bullet::Inherited },
        })
        .collect()
}

impl FormatSink for SlideSink {
    fn emit_block(&mut self, node: &RichTextNode) -> Result<(), ReportError> {
        match node {
            RichTextNode::Paragraph { runs } => self.paragraphs.push(TextParagraph {
                spans: spans(runs),
                level: 0,
                bullet: Bullet::None,
            }),
            RichTextNode::CodeBlock { lines } => {
                self.paragraphs.extend(lines.iter().map(|line| code_paragraph(line)));
            }
            RichTextNode::BulletList { items } => {
                self.paragraphs.extend(list_paragraphs(items, Bullet::Inherited));
            }
            RichTextNode::NumberList { items, numbering } => {
                self.paragraphs
                    .extend(list_paragraphs(items, Bullet::Numbered(numbering.start)));
            }
        }
        Ok(())
    }

    fn insert_image(&mut self, image: &Path, evidence: &EvidenceRef) -> Result<(), ReportError> {
        let extension = image
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("png")
            .to_ascii_lowercase();
        self.evidence.push(SlideEvidence::Picture {
            bytes: std::fs::read(image)?,
            extension,
            description: evidence.friendly_name.clone(),
            caption: evidence.caption.clone(),
        });
        Ok(())
    }

    fn insert_code_text(
        &mut self,
        contents: &str,
        evidence: &EvidenceRef,
    ) -> Result<(), ReportError> {
        self.evidence.push(SlideEvidence::Text {
            lines: contents.lines().map(str::to_string).collect(),
            caption: evidence.caption.clone(),
        });
        Ok(())
    }

    fn insert_caption(&mut self, text: &str) -> Result<(), ReportError> {
        self.paragraphs
            .push(TextParagraph::plain(resolver::literal_caption(text)));
        Ok(())
    }

    fn insert_literal(&mut self, text: &str) -> Result<(), ReportError> {
        self.paragraphs.push(TextParagraph::plain(text));
        Ok(())
    }

    fn warn(&mut self, message: String) {
        self.warnings.push(message);
    }

    fn evidence_mode(&self) -> EvidenceMode {
        self.mode
    }
}

fn code_paragraph(line: &str) -> TextParagraph {
    TextParagraph {
        spans: vec![TextSpan {
            text: line.to_string(),
            style: TextStyle {
                inline_code: true,
                ..TextStyle::default()
            },
        }],
        level: 0,
        bullet: Bullet::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evidence_frame_depends_on_slide_width() {
        let wide = evidence_frame(12_192_000);
        let standard = evidence_frame(9_144_000);

        assert_eq!(wide.left, 8 * EMUS_PER_INCH);
        assert_eq!(standard.left, 6 * EMUS_PER_INCH);
        assert_eq!(wide.top, inches(1.65));
        assert_eq!(wide.width, inches(4.5));
        assert_eq!(wide.height, 3 * EMUS_PER_INCH);
    }

    fn empty_sink() -> SlideSink {
        SlideSink {
            paragraphs: Vec::new(),
            evidence: Vec::new(),
            warnings: Vec::new(),
            mode: EvidenceMode::Embed(crate::evidence::BorderStyle::default()),
        }
    }

    #[test]
    fn test_numbered_list_keeps_start_value() {
        // Arrange
        let mut sink = empty_sink();
        let nodes = crate::rich_text::parse(r#"<ol start="4"><li>four</li><li>five</li></ol>"#, "ACME");

        // Act
        for node in &nodes {
            sink.emit_block(node).unwrap();
        }

        // Assert
        assert_eq!(sink.paragraphs.len(), 2);
        assert_eq!(sink.paragraphs[0].bullet, Bullet::Numbered(4));
    }

    #[test]
    fn test_text_evidence_goes_to_evidence_frame() {
        // Arrange
        let mut sink = empty_sink();
        let evidence = EvidenceRef {
            friendly_name: "scan".to_string(),
            caption: "Port scan".to_string(),
            ..EvidenceRef::default()
        };

        // Act
        sink.insert_code_text("PORT STATE\n22/tcp open", &evidence).unwrap();

        // Assert
        assert!(sink.paragraphs.is_empty());
        match sink.evidence.as_slice() {
            [SlideEvidence::Text { lines, caption }] => {
                assert_eq!(lines, &["PORT STATE", "22/tcp open"]);
                assert_eq!(caption, "Port scan");
            }
            other => panic!("Expected one text evidence, got {:?}", other),
        }
    }

    #[test]
    fn test_agenda_lists_observations_only_when_present() {
        let with = agenda_slide(true);
        let without = agenda_slide(false);

        assert!(with.shapes.contains("Observations"));
        assert!(!without.shapes.contains("Observations"));
    }

    #[test]
    fn test_insert_after_anchor() {
        let xml = "<a></b><c/>";
        assert_eq!(insert_after(xml, "</b>", "<x/>").unwrap(), "<a></b><x/><c/>");
        assert!(insert_after(xml, "</z>", "<x/>").is_err());
    }

    #[test]
    fn test_relative_part_paths() {
        assert_eq!(
            relative_to_ppt("ppt/slideLayouts/slideLayout2.xml"),
            "../slideLayouts/slideLayout2.xml"
        );
    }
}
