//! Built-in blank templates
//!
//! Used when no template is configured. The Word template is synthesised
//! with docx-rs; the PowerPoint deck is assembled from parts compiled into
//! the binary.

use crate::error::ReportError;
use crate::ooxml::{Package, CONTENT_TYPES_PART, PACKAGE_RELS_PART};
use docx_rs::{Docx, Paragraph, Run, Style, StyleType};
use std::io::Cursor;

/// Parts of the blank deck: (part name, contents)
const PPTX_PARTS: &[(&str, &str)] = &[
    (CONTENT_TYPES_PART, include_str!("templates/pptx/content_types.xml")),
    (PACKAGE_RELS_PART, include_str!("templates/pptx/package.rels")),
    ("ppt/presentation.xml", include_str!("templates/pptx/presentation.xml")),
    (
        "ppt/_rels/presentation.xml.rels",
        include_str!("templates/pptx/presentation.xml.rels"),
    ),
    (
        "ppt/slideMasters/slideMaster1.xml",
        include_str!("templates/pptx/slideMaster1.xml"),
    ),
    (
        "ppt/slideMasters/_rels/slideMaster1.xml.rels",
        include_str!("templates/pptx/slideMaster1.xml.rels"),
    ),
    (
        "ppt/slideLayouts/slideLayout1.xml",
        include_str!("templates/pptx/slideLayout1.xml"),
    ),
    (
        "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
        include_str!("templates/pptx/slideLayout.xml.rels"),
    ),
    (
        "ppt/slideLayouts/slideLayout2.xml",
        include_str!("templates/pptx/slideLayout2.xml"),
    ),
    (
        "ppt/slideLayouts/_rels/slideLayout2.xml.rels",
        include_str!("templates/pptx/slideLayout.xml.rels"),
    ),
    ("ppt/theme/theme1.xml", include_str!("templates/pptx/theme1.xml")),
];

/// Blank 16:9 deck with "Title Slide" and "Title and Content" layouts
pub fn blank_pptx() -> Result<Vec<u8>, ReportError> {
    let mut package = Package::new();
    for (name, contents) in PPTX_PARTS {
        package.set_part(*name, contents.as_bytes());
    }
    package.to_bytes()
}

/// Blank Word document with heading styles and block markers
pub fn blank_docx() -> Result<Vec<u8>, ReportError> {
    let heading_sizes = [("Heading1", "Heading 1", 32), ("Heading2", "Heading 2", 28), ("Heading3", "Heading 3", 24)];

    let mut docx = Docx::new();
    for (style_id, name, size) in heading_sizes {
        docx = docx.add_style(
            Style::new(style_id, StyleType::Paragraph)
                .name(name)
                .bold()
                .size(size),
        );
    }

    let text = |content: &str| Paragraph::new().add_run(Run::new().add_text(content));
    let heading = |content: &str| text(content).style("Heading1");

    docx = docx
        .add_paragraph(heading("{{ report.title }}"))
        .add_paragraph(text("Prepared for {{ client.full_name }}"))
        .add_paragraph(text("{{ report.generated_on }}"))
        .add_paragraph(heading("Findings"))
        .add_paragraph(text("{{findings}}"))
        .add_paragraph(heading("Observations"))
        .add_paragraph(text("{{observations}}"))
        .add_paragraph(heading("Infrastructure"))
        .add_paragraph(text("{{infrastructure}}"));

    let mut buffer = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut buffer)
        .map_err(|e| ReportError::render("docx", format!("Failed to build blank template: {}", e)))?;
    Ok(buffer.into_inner())
}
