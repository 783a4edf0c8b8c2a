//! PresentationML shape builders
//!
//! Slides are assembled from raw XML fragments: placeholders that inherit
//! position from their layout, absolutely positioned pictures and text
//! boxes, and tables.

use crate::ooxml::{xml_text, XML_DECLARATION};
use crate::rich_text::TextStyle;

const NAMESPACES: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;

/// Row height used for generated tables
const TABLE_ROW_HEIGHT: i64 = 370_840;

/// Bullet style of a text paragraph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bullet {
    None,
    /// Bullet character inherited from the master
    Inherited,
    /// Auto-numbered, starting at the given value
    Numbered(u32),
}

/// A run of text inside a DrawingML paragraph
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextSpan {
    pub text: String,
    pub style: TextStyle,
}

impl TextSpan {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: TextStyle::default(),
        }
    }
}

/// A DrawingML paragraph
#[derive(Debug, Clone, PartialEq)]
pub struct TextParagraph {
    pub spans: Vec<TextSpan>,
    pub level: usize,
    pub bullet: Bullet,
}

impl TextParagraph {
    /// Paragraph without a bullet
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            spans: vec![TextSpan::plain(text)],
            level: 0,
            bullet: Bullet::None,
        }
    }

    /// Bulleted paragraph at a list level
    pub fn bulleted(text: impl Into<String>, level: usize) -> Self {
        Self {
            spans: vec![TextSpan::plain(text)],
            level,
            bullet: Bullet::Inherited,
        }
    }

    fn to_xml(&self) -> String {
        let level = self.level.min(8);
        let props = match self.bullet {
            Bullet::None => format!(r#"<a:pPr marL="0" lvl="{}" indent="0"><a:buNone/></a:pPr>"#, level),
            Bullet::Inherited => format!(r#"<a:pPr lvl="{}"/>"#, level),
            Bullet::Numbered(start) => format!(
                r#"<a:pPr lvl="{}"><a:buFont typeface="+mj-lt"/><a:buAutoNum type="arabicPeriod" startAt="{}"/></a:pPr>"#,
                level,
                start.max(1)
            ),
        };

        let runs = self
            .spans
            .iter()
            .flat_map(span_xml)
            .collect::<String>();
        format!("<a:p>{}{}</a:p>", props, runs)
    }
}

/// Runs for a span; line breaks become `<a:br/>`
fn span_xml(span: &TextSpan) -> Vec<String> {
    let mut attributes = String::from(r#"lang="en-US""#);
    if span.style.bold {
        attributes.push_str(r#" b="1""#);
    }
    if span.style.italic {
        attributes.push_str(r#" i="1""#);
    }
    if span.style.underline {
        attributes.push_str(r#" u="sng""#);
    }
    attributes.push_str(r#" dirty="0""#);

    let props = if span.style.inline_code {
        format!(r#"<a:rPr {}><a:latin typeface="Consolas"/><a:cs typeface="Consolas"/></a:rPr>"#, attributes)
    } else {
        format!("<a:rPr {}/>", attributes)
    };

    span.text
        .split('\n')
        .enumerate()
        .map(|(idx, line)| {
            let br = if idx > 0 {
                format!("<a:br>{}</a:br>", props)
            } else {
                String::new()
            };
            format!("{}<a:r>{}<a:t>{}</a:t></a:r>", br, props, xml_text(line))
        })
        .collect()
}

fn text_body(paragraphs: &[TextParagraph]) -> String {
    let mut body = String::from("<p:txBody><a:bodyPr><a:normAutofit/></a:bodyPr><a:lstStyle/>");
    if paragraphs.is_empty() {
        body.push_str(r#"<a:p><a:endParaRPr lang="en-US" dirty="0"/></a:p>"#);
    }
    for paragraph in paragraphs {
        body.push_str(&paragraph.to_xml());
    }
    body.push_str("</p:txBody>");
    body
}

/// Placeholder kinds used on generated slides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Title,
    CenteredTitle,
    Subtitle,
    Body,
}

impl Placeholder {
    fn ph(self) -> &'static str {
        match self {
            Placeholder::Title => r#"<p:ph type="title"/>"#,
            Placeholder::CenteredTitle => r#"<p:ph type="ctrTitle"/>"#,
            Placeholder::Subtitle => r#"<p:ph type="subTitle" idx="1"/>"#,
            Placeholder::Body => r#"<p:ph idx="1"/>"#,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Placeholder::Title | Placeholder::CenteredTitle => "Title",
            Placeholder::Subtitle => "Subtitle",
            Placeholder::Body => "Content Placeholder",
        }
    }
}

/// Placeholder shape that takes its position from the layout
pub fn placeholder_shape(id: u32, kind: Placeholder, paragraphs: &[TextParagraph]) -> String {
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="{name} {id}"/><p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr><p:nvPr>{ph}</p:nvPr></p:nvSpPr><p:spPr/>{body}</p:sp>"#,
        id = id,
        name = kind.name(),
        ph = kind.ph(),
        body = text_body(paragraphs),
    )
}

/// Position and size of a shape in EMUs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
}

impl Frame {
    fn xfrm(&self, prefix: &str) -> String {
        format!(
            r#"<{p}:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></{p}:xfrm>"#,
            self.left,
            self.top,
            self.width,
            self.height,
            p = prefix
        )
    }
}

/// Free-standing text box
pub fn text_box(id: u32, frame: Frame, paragraphs: &[TextParagraph]) -> String {
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="TextBox {id}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr>{xfrm}<a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:noFill/></p:spPr><p:txBody><a:bodyPr wrap="square" rtlCol="0"><a:spAutoFit/></a:bodyPr><a:lstStyle/>{paragraphs}</p:txBody></p:sp>"#,
        id = id,
        xfrm = frame.xfrm("a"),
        paragraphs = paragraphs.iter().map(TextParagraph::to_xml).collect::<String>(),
    )
}

/// Picture stretched to fill a frame
pub fn picture(id: u32, rel_id: &str, description: &str, frame: Frame) -> String {
    format!(
        r#"<p:pic><p:nvPicPr><p:cNvPr id="{id}" name="Picture {id}" descr="{descr}"/><p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="{rel_id}"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr>{xfrm}<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#,
        id = id,
        descr = xml_text(description),
        rel_id = rel_id,
        xfrm = frame.xfrm("a"),
    )
}

/// One table cell with an optional fill colour
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCell {
    pub text: String,
    pub fill: Option<String>,
    pub bold: bool,
}

impl TableCell {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            fill: None,
            bold: false,
        }
    }

    pub fn header(text: impl Into<String>) -> Self {
        Self {
            bold: true,
            ..Self::text(text)
        }
    }

    pub fn filled(text: impl Into<String>, hex: &str) -> Self {
        Self {
            fill: Some(hex.to_ascii_uppercase()),
            ..Self::text(text)
        }
    }

    fn to_xml(&self) -> String {
        let bold = if self.bold { r#" b="1""# } else { "" };
        let fill = match &self.fill {
            Some(hex) => format!(r#"<a:tcPr><a:solidFill><a:srgbClr val="{}"/></a:solidFill></a:tcPr>"#, hex),
            None => "<a:tcPr/>".to_string(),
        };
        format!(
            r#"<a:tc><a:txBody><a:bodyPr/><a:lstStyle/><a:p><a:r><a:rPr lang="en-US" sz="1400"{}/><a:t>{}</a:t></a:r></a:p></a:txBody>{}</a:tc>"#,
            bold,
            xml_text(&self.text),
            fill
        )
    }
}

/// Table frame with columns of the given widths
pub fn table(id: u32, left: i64, top: i64, column_widths: &[i64], rows: &[Vec<TableCell>]) -> String {
    let width: i64 = column_widths.iter().sum();
    let height = TABLE_ROW_HEIGHT * rows.len() as i64;
    let frame = Frame {
        left,
        top,
        width,
        height,
    };

    let grid = column_widths
        .iter()
        .map(|w| format!(r#"<a:gridCol w="{}"/>"#, w))
        .collect::<String>();
    let body = rows
        .iter()
        .map(|row| {
            format!(
                r#"<a:tr h="{}">{}</a:tr>"#,
                TABLE_ROW_HEIGHT,
                row.iter().map(TableCell::to_xml).collect::<String>()
            )
        })
        .collect::<String>();

    format!(
        r#"<p:graphicFrame><p:nvGraphicFramePr><p:cNvPr id="{id}" name="Table {id}"/><p:cNvGraphicFramePr><a:graphicFrameLocks noGrp="1"/></p:cNvGraphicFramePr><p:nvPr/></p:nvGraphicFramePr>{xfrm}<a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/table"><a:tbl><a:tblPr firstRow="1" bandRow="1"/><a:tblGrid>{grid}</a:tblGrid>{body}</a:tbl></a:graphicData></a:graphic></p:graphicFrame>"#,
        id = id,
        xfrm = frame.xfrm("p"),
        grid = grid,
        body = body,
    )
}

/// Complete slide part wrapping the given shapes
pub fn slide_xml(shapes: &str) -> String {
    format!(
        r#"{}
<p:sld {}><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>{}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#,
        XML_DECLARATION, NAMESPACES, shapes
    )
}

/// Notes slide holding plain text in its body placeholder
pub fn notes_slide_xml(text: &str) -> String {
    let paragraphs: Vec<TextParagraph> = text.split('\n').map(TextParagraph::plain).collect();
    format!(
        r#"{}
<p:notes {}><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/><p:sp><p:nvSpPr><p:cNvPr id="2" name="Slide Image Placeholder 1"/><p:cNvSpPr><a:spLocks noGrp="1" noRot="1" noChangeAspect="1"/></p:cNvSpPr><p:nvPr><p:ph type="sldImg"/></p:nvPr></p:nvSpPr><p:spPr/></p:sp><p:sp><p:nvSpPr><p:cNvPr id="3" name="Notes Placeholder 2"/><p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr><p:nvPr><p:ph type="body" idx="1"/></p:nvPr></p:nvSpPr><p:spPr/>{}</p:sp></p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:notes>"#,
        XML_DECLARATION,
        NAMESPACES,
        text_body(&paragraphs)
    )
}

/// Minimal notes master bound to a theme
pub fn notes_master_xml() -> String {
    format!(
        r#"{}
<p:notesMaster {}><p:cSld><p:bg><p:bgRef idx="1001"><a:schemeClr val="bg1"/></p:bgRef></p:bg><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/><p:sp><p:nvSpPr><p:cNvPr id="2" name="Slide Image Placeholder 1"/><p:cNvSpPr><a:spLocks noGrp="1" noRot="1" noChangeAspect="1"/></p:cNvSpPr><p:nvPr><p:ph type="sldImg" idx="2"/></p:nvPr></p:nvSpPr><p:spPr><a:xfrm><a:off x="685800" y="1143000"/><a:ext cx="5486400" cy="3086100"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:sp><p:sp><p:nvSpPr><p:cNvPr id="3" name="Notes Placeholder 2"/><p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr><p:nvPr><p:ph type="body" sz="quarter" idx="3"/></p:nvPr></p:nvSpPr><p:spPr><a:xfrm><a:off x="685800" y="4400550"/><a:ext cx="5486400" cy="3600450"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr><p:txBody><a:bodyPr/><a:lstStyle/><a:p><a:endParaRPr lang="en-US"/></a:p></p:txBody></p:sp></p:spTree></p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/><p:notesStyle><a:lvl1pPr marL="0" algn="l" defTabSz="914400" rtl="0" eaLnBrk="1" latinLnBrk="0" hangingPunct="1"><a:defRPr sz="1200" kern="1200"><a:solidFill><a:schemeClr val="tx1"/></a:solidFill><a:latin typeface="+mn-lt"/><a:ea typeface="+mn-ea"/><a:cs typeface="+mn-cs"/></a:defRPr></a:lvl1pPr></p:notesStyle></p:notesMaster>"#,
        XML_DECLARATION, NAMESPACES
    )
}
