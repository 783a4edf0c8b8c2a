//! Office Open XML package plumbing
//!
//! Word, PowerPoint and Excel files are ZIP archives of XML parts tied
//! together by relationship parts and a `[Content_Types].xml` manifest.
//! Exporters load a template into a [`Package`], edit parts as strings and
//! write the archive back out. Parts are edited textually, inserting new
//! fragments before known closing tags, so anything in the template this
//! crate does not understand is preserved byte-for-byte.

use crate::error::{ReportError, TemplateError};
use regex::Regex;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use std::sync::LazyLock;
use zip::read::ZipArchive;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// English Metric Units per inch
pub const EMUS_PER_INCH: i64 = 914_400;

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub const PACKAGE_RELS_PART: &str = "_rels/.rels";
pub const CORE_PROPERTIES_PART: &str = "docProps/core.xml";

pub const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
pub const REL_CORE_PROPERTIES: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties";
pub const REL_IMAGE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
pub const REL_STYLES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
pub const REL_NUMBERING: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering";
pub const REL_THEME: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme";
pub const REL_SLIDE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
pub const REL_SLIDE_LAYOUT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout";
pub const REL_SLIDE_MASTER: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster";
pub const REL_NOTES_SLIDE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/notesSlide";
pub const REL_NOTES_MASTER: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/notesMaster";
pub const REL_WORKSHEET: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";

pub const CT_CORE_PROPERTIES: &str = "application/vnd.openxmlformats-package.core-properties+xml";
pub const CT_RELATIONSHIPS: &str = "application/vnd.openxmlformats-package.relationships+xml";
pub const CT_NUMBERING: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml";

/// An empty relationships part
pub const EMPTY_RELATIONSHIPS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"></Relationships>"#
);

pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

static RELATIONSHIP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<Relationship\s[^>]*?/?>").expect("relationship regex is valid"));

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z:]+)\s*=\s*"([^"]*)""#).expect("attribute regex is valid")
});

/// An Office document held in memory as named parts
#[derive(Debug, Clone, Default)]
pub struct Package {
    parts: BTreeMap<String, Vec<u8>>,
}

impl Package {
    /// Create an empty package
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a template file from disk
    ///
    /// `kind` names the container ("Word", "PowerPoint") for error messages.
    pub fn read_template(path: &Path, kind: &'static str) -> Result<Self, ReportError> {
        if !path.exists() {
            return Err(TemplateError::NotFound(path.to_path_buf()).into());
        }
        let bytes = std::fs::read(path).map_err(|source| TemplateError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Read {} template from {}", kind, path.display());
        Self::from_bytes(&bytes, kind)
    }

    /// Load a package from archive bytes
    pub fn from_bytes(bytes: &[u8], kind: &'static str) -> Result<Self, ReportError> {
        let invalid = |reason: String| TemplateError::InvalidContainer { kind, reason };

        let mut archive =
            ZipArchive::new(Cursor::new(bytes)).map_err(|e| invalid(e.to_string()))?;
        let mut parts = BTreeMap::new();

        for i in 0..archive.len() {
            let mut file = archive.by_index(i).map_err(|e| invalid(e.to_string()))?;
            let name = file.name().to_string();

            // Skip directories
            if name.ends_with('/') {
                continue;
            }

            let mut contents = Vec::new();
            file.read_to_end(&mut contents)
                .map_err(|e| invalid(format!("{}: {}", name, e)))?;
            parts.insert(name, contents);
        }

        if !parts.contains_key(CONTENT_TYPES_PART) {
            return Err(invalid(format!("missing {}", CONTENT_TYPES_PART)).into());
        }

        Ok(Self { parts })
    }

    pub fn has_part(&self, name: &str) -> bool {
        self.parts.contains_key(name)
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts.get(name).map(Vec::as_slice)
    }

    /// Part contents decoded as UTF-8
    pub fn part_str(&self, name: &str) -> Option<String> {
        self.part(name)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Part contents that the container must have
    pub fn require_str(&self, name: &str, kind: &'static str) -> Result<String, ReportError> {
        self.part_str(name).ok_or_else(|| {
            TemplateError::InvalidContainer {
                kind,
                reason: format!("missing part {}", name),
            }
            .into()
        })
    }

    pub fn set_part(&mut self, name: impl Into<String>, contents: impl Into<Vec<u8>>) {
        self.parts.insert(name.into(), contents.into());
    }

    pub fn remove_part(&mut self, name: &str) -> Option<Vec<u8>> {
        self.parts.remove(name)
    }

    /// Names of all parts, sorted
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    /// Remove every part whose name matches the predicate
    pub fn remove_parts_where(&mut self, mut predicate: impl FnMut(&str) -> bool) -> Vec<String> {
        let doomed: Vec<String> = self
            .parts
            .keys()
            .filter(|name| predicate(name))
            .cloned()
            .collect();
        for name in &doomed {
            self.parts.remove(name);
        }
        doomed
    }

    /// Serialize the package as a ZIP archive
    ///
    /// The content-types manifest is written first; media is stored
    /// uncompressed.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ReportError> {
        let mut output = ZipWriter::new(Cursor::new(Vec::new()));
        let deflated =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

        let ordered = self
            .parts
            .iter()
            .filter(|(name, _)| name.as_str() == CONTENT_TYPES_PART)
            .chain(
                self.parts
                    .iter()
                    .filter(|(name, _)| name.as_str() != CONTENT_TYPES_PART),
            );

        for (name, contents) in ordered {
            let options = if name.contains("/media/") {
                stored
            } else {
                deflated
            };
            output.start_file(name.as_str(), options)?;
            output.write_all(contents)?;
        }

        Ok(output.finish()?.into_inner())
    }
}

/// Escape special XML characters
pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Whether a character may appear in an XML 1.0 document
pub fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\u{9}' | '\u{A}' | '\u{D}' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}'
    )
}

/// Remove characters that are not legal in XML 1.0
pub fn scrub_xml(text: &str) -> Cow<'_, str> {
    if text.chars().all(is_xml_char) {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(text.chars().filter(|c| is_xml_char(*c)).collect())
    }
}

/// Scrub and escape text for an XML text node or attribute
pub fn xml_text(text: &str) -> String {
    escape_xml(&scrub_xml(text))
}

/// Insert a fragment before the last occurrence of `closing_tag`
pub fn insert_before_last(
    xml: &str,
    closing_tag: &str,
    fragment: &str,
    part_name: &str,
) -> Result<String, ReportError> {
    let position = xml.rfind(closing_tag).ok_or_else(|| {
        ReportError::render(
            "ooxml",
            format!("Could not find {} in {}", closing_tag, part_name),
        )
    })?;

    let mut result = String::with_capacity(xml.len() + fragment.len());
    result.push_str(&xml[..position]);
    result.push_str(fragment);
    result.push_str(&xml[position..]);
    Ok(result)
}

/// One `<Relationship>` entry of a relationships part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
}

/// Parse the entries of a relationships part
pub fn relationships(rels_xml: &str) -> Vec<Relationship> {
    RELATIONSHIP
        .find_iter(rels_xml)
        .map(|m| {
            let mut rel = Relationship {
                id: String::new(),
                rel_type: String::new(),
                target: String::new(),
            };
            for caps in ATTRIBUTE.captures_iter(m.as_str()) {
                let value = caps[2].to_string();
                match &caps[1] {
                    "Id" => rel.id = value,
                    "Type" => rel.rel_type = value,
                    "Target" => rel.target = value,
                    _ => {}
                }
            }
            rel
        })
        .collect()
}

/// Highest numeric `rIdN` in a relationships part
pub fn max_relationship_id(rels_xml: &str) -> u32 {
    relationships(rels_xml)
        .iter()
        .filter_map(|rel| rel.id.strip_prefix("rId")?.parse::<u32>().ok())
        .max()
        .unwrap_or(0)
}

/// Append a relationship entry
pub fn add_relationship(
    rels_xml: &str,
    id: &str,
    rel_type: &str,
    target: &str,
) -> Result<String, ReportError> {
    insert_before_last(
        rels_xml,
        "</Relationships>",
        &format!(
            r#"<Relationship Id="{}" Type="{}" Target="{}"/>"#,
            id,
            rel_type,
            escape_xml(target)
        ),
        "relationships part",
    )
}

/// Remove relationship entries matching a predicate, returning the removed entries
pub fn remove_relationships_where(
    rels_xml: &str,
    mut predicate: impl FnMut(&Relationship) -> bool,
) -> (String, Vec<Relationship>) {
    let mut removed = Vec::new();
    let kept = RELATIONSHIP.replace_all(rels_xml, |caps: &regex::Captures<'_>| {
        let entry = &caps[0];
        match relationships(entry).into_iter().next() {
            Some(rel) if predicate(&rel) => {
                removed.push(rel);
                String::new()
            }
            _ => entry.to_string(),
        }
    });
    (kept.into_owned(), removed)
}

/// Relationships part path for a part (`word/document.xml` → `word/_rels/document.xml.rels`)
pub fn rels_path_for(part_name: &str) -> String {
    match part_name.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part_name),
    }
}

/// Resolve a relationship target relative to the part that owns it
pub fn resolve_target(owner_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = owner_part.split('/').collect();
    segments.pop();
    for segment in target.split('/') {
        match segment {
            ".." => {
                segments.pop();
            }
            "." | "" => {}
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Ensure a `<Default Extension=...>` entry exists in the content-types manifest
pub fn ensure_default_content_type(
    content_types: &str,
    extension: &str,
    content_type: &str,
) -> Result<String, ReportError> {
    let needle = format!(r#"extension="{}""#, extension.to_ascii_lowercase());
    if content_types.to_ascii_lowercase().contains(&needle) {
        return Ok(content_types.to_string());
    }
    insert_before_last(
        content_types,
        "</Types>",
        &format!(
            r#"<Default Extension="{}" ContentType="{}"/>"#,
            extension, content_type
        ),
        CONTENT_TYPES_PART,
    )
}

/// Ensure an `<Override PartName=...>` entry exists in the content-types manifest
pub fn ensure_override_content_type(
    content_types: &str,
    part_name: &str,
    content_type: &str,
) -> Result<String, ReportError> {
    let needle = format!(r#"PartName="/{}""#, part_name);
    if content_types.contains(&needle) {
        return Ok(content_types.to_string());
    }
    insert_before_last(
        content_types,
        "</Types>",
        &format!(
            r#"<Override PartName="/{}" ContentType="{}"/>"#,
            part_name, content_type
        ),
        CONTENT_TYPES_PART,
    )
}

/// Remove the `<Override>` entry for a part, if any
pub fn remove_override_content_type(content_types: &str, part_name: &str) -> String {
    let pattern = format!(
        r#"<Override[^>]*PartName="/{}"[^>]*/>"#,
        regex::escape(part_name)
    );
    match Regex::new(&pattern) {
        Ok(re) => re.replace_all(content_types, "").into_owned(),
        Err(_) => content_types.to_string(),
    }
}

/// MIME type for an image extension
pub fn image_content_type(extension: &str) -> &'static str {
    match extension {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

/// Extent in EMUs of an image scaled to a fixed width, preserving aspect ratio
pub fn image_extent_emu(bytes: &[u8], width_inches: f64) -> (i64, i64) {
    let aspect_ratio = match imagesize::blob_size(bytes) {
        Ok(size) if size.width > 0 && size.height > 0 => size.height as f64 / size.width as f64,
        _ => {
            log::debug!("Could not read image size; assuming 4:3");
            0.75
        }
    };

    let width_emu = (width_inches * EMUS_PER_INCH as f64) as i64;
    let height_emu = (width_inches * aspect_ratio * EMUS_PER_INCH as f64) as i64;
    (width_emu, height_emu)
}

/// Convert inches to EMUs
pub fn inches(value: f64) -> i64 {
    (value * EMUS_PER_INCH as f64) as i64
}

/// Document properties written to `docProps/core.xml`
#[derive(Debug, Clone, Default)]
pub struct CoreProperties {
    pub title: String,
    pub subject: String,
    pub creator: String,
    pub keywords: String,
}

impl CoreProperties {
    fn to_xml(&self, revision: &str) -> String {
        let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");

        let mut xml = String::with_capacity(1024);
        xml.push_str(XML_DECLARATION);
        xml.push('\n');
        xml.push_str(r#"<cp:coreProperties "#);
        xml.push_str(
            r#"xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" "#,
        );
        xml.push_str(r#"xmlns:dc="http://purl.org/dc/elements/1.1/" "#);
        xml.push_str(r#"xmlns:dcterms="http://purl.org/dc/terms/" "#);
        xml.push_str(r#"xmlns:dcmitype="http://purl.org/dc/dcmitype/" "#);
        xml.push_str(r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#);
        xml.push_str(&format!("<dc:title>{}</dc:title>", xml_text(&self.title)));
        xml.push_str(&format!("<dc:subject>{}</dc:subject>", xml_text(&self.subject)));
        xml.push_str(&format!("<dc:creator>{}</dc:creator>", xml_text(&self.creator)));
        xml.push_str(&format!(
            "<cp:keywords>{}</cp:keywords>",
            xml_text(&self.keywords)
        ));
        xml.push_str(&format!(
            "<cp:lastModifiedBy>{}</cp:lastModifiedBy>",
            xml_text(&self.creator)
        ));
        xml.push_str(&format!("<cp:revision>{}</cp:revision>", xml_text(revision)));
        xml.push_str(&format!(
            r#"<dcterms:created xsi:type="dcterms:W3CDTF">{}</dcterms:created>"#,
            now
        ));
        xml.push_str(&format!(
            r#"<dcterms:modified xsi:type="dcterms:W3CDTF">{}</dcterms:modified>"#,
            now
        ));
        xml.push_str("</cp:coreProperties>");
        xml
    }

    /// Write `docProps/core.xml` and register it with the package
    ///
    /// The template's revision number is preserved when present.
    pub fn apply(&self, package: &mut Package) -> Result<(), ReportError> {
        let revision = package
            .part_str(CORE_PROPERTIES_PART)
            .and_then(|xml| extract_xml_tag_content(&xml, "cp:revision"))
            .unwrap_or_else(|| "1".to_string());
        package.set_part(CORE_PROPERTIES_PART, self.to_xml(&revision));

        let rels = package
            .part_str(PACKAGE_RELS_PART)
            .unwrap_or_else(|| EMPTY_RELATIONSHIPS.to_string());
        if !rels.contains(CORE_PROPERTIES_PART) {
            let id = format!("rId{}", max_relationship_id(&rels) + 1);
            let rels = add_relationship(&rels, &id, REL_CORE_PROPERTIES, CORE_PROPERTIES_PART)?;
            package.set_part(PACKAGE_RELS_PART, rels);
        }

        let content_types = package.require_str(CONTENT_TYPES_PART, "Office")?;
        let content_types =
            ensure_override_content_type(&content_types, CORE_PROPERTIES_PART, CT_CORE_PROPERTIES)?;
        package.set_part(CONTENT_TYPES_PART, content_types);
        Ok(())
    }
}

/// Extract text content between XML tags
pub fn extract_xml_tag_content(xml: &str, tag_name: &str) -> Option<String> {
    let open_tag = format!("<{}>", tag_name);
    let close_tag = format!("</{}>", tag_name);

    let start = xml.find(&open_tag)? + open_tag.len();
    let end = xml[start..].find(&close_tag)?;
    Some(xml[start..start + end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/></Types>"#;

    #[test]
    fn test_scrub_removes_control_characters() {
        // Arrange
        let dirty = "ok\u{0}\u{1}\ttab\u{b}\r\n\u{FFFE}end";

        // Act
        let clean = scrub_xml(dirty);

        // Assert
        assert_eq!(clean, "ok\ttab\r\nend");
    }

    #[test]
    fn test_scrub_borrows_clean_text() {
        assert!(matches!(scrub_xml("clean \u{1F600}"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_xml_text_escapes_after_scrubbing() {
        assert_eq!(xml_text("<a&b>\u{7}"), "&lt;a&amp;b&gt;");
    }

    #[test]
    fn test_relationship_ids() {
        // Arrange
        let rels = add_relationship(EMPTY_RELATIONSHIPS, "rId7", REL_IMAGE, "media/a.png").unwrap();
        let rels = add_relationship(&rels, "rId12", REL_STYLES, "styles.xml").unwrap();

        // Act
        let parsed = relationships(&rels);

        // Assert
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].target, "media/a.png");
        assert_eq!(max_relationship_id(&rels), 12);
    }

    #[test]
    fn test_remove_relationships_by_type() {
        // Arrange
        let rels = add_relationship(EMPTY_RELATIONSHIPS, "rId1", REL_SLIDE, "slides/slide1.xml").unwrap();
        let rels = add_relationship(&rels, "rId2", REL_THEME, "theme/theme1.xml").unwrap();

        // Act
        let (kept, removed) = remove_relationships_where(&rels, |rel| rel.rel_type == REL_SLIDE);

        // Assert
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].target, "slides/slide1.xml");
        assert_eq!(relationships(&kept).len(), 1);
        assert_eq!(max_relationship_id(&kept), 2);
    }

    #[test]
    fn test_rels_path_and_target_resolution() {
        assert_eq!(
            rels_path_for("ppt/slides/slide1.xml"),
            "ppt/slides/_rels/slide1.xml.rels"
        );
        assert_eq!(
            resolve_target("ppt/slides/slide1.xml", "../slideLayouts/slideLayout2.xml"),
            "ppt/slideLayouts/slideLayout2.xml"
        );
        assert_eq!(resolve_target("word/document.xml", "media/x.png"), "word/media/x.png");
    }

    #[test]
    fn test_content_type_entries_are_added_once() {
        // Arrange & Act
        let once = ensure_default_content_type(CONTENT_TYPES, "png", "image/png").unwrap();
        let twice = ensure_default_content_type(&once, "png", "image/png").unwrap();
        let with_override =
            ensure_override_content_type(&twice, "word/numbering.xml", CT_NUMBERING).unwrap();

        // Assert
        assert_eq!(once, twice);
        assert_eq!(with_override.matches("word/numbering.xml").count(), 1);
        let removed = remove_override_content_type(&with_override, "word/numbering.xml");
        assert!(!removed.contains("numbering"));
    }

    #[test]
    fn test_package_round_trip_keeps_parts() {
        // Arrange
        let mut package = Package::new();
        package.set_part(CONTENT_TYPES_PART, CONTENT_TYPES);
        package.set_part("word/document.xml", "<w:document/>");

        // Act
        let bytes = package.to_bytes().unwrap();
        let reopened = Package::from_bytes(&bytes, "Word").unwrap();

        // Assert
        assert_eq!(
            reopened.part_str("word/document.xml").as_deref(),
            Some("<w:document/>")
        );
    }

    #[test]
    fn test_invalid_container_is_a_template_problem() {
        let err = Package::from_bytes(b"not a zip", "Word").unwrap_err();
        assert!(err.is_template_problem());
    }

    #[test]
    fn test_missing_template_is_a_template_problem() {
        let err = Package::read_template(Path::new("/nonexistent/template.docx"), "Word")
            .unwrap_err();
        assert!(err.is_template_problem());
    }

    #[test]
    fn test_fixed_width_extent_preserves_aspect() {
        // Arrange: a 2x1 PNG header is enough for imagesize
        let png = [
            0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48,
            0x44, 0x52, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00,
            0x00,
        ];

        // Act
        let (cx, cy) = image_extent_emu(&png, 6.5);

        // Assert
        assert_eq!(cx, 5_943_600);
        assert_eq!(cy, 2_971_800);
    }
}
