//! Excel export of the findings list
//!
//! A single `Findings` worksheet with a header row and one row per finding.
//! Rich text is flattened to plain text and evidence is referred to by name.
//! Cells use inline strings, so the workbook needs no shared-string table.

use crate::error::ReportError;
use crate::ooxml::{
    add_relationship, xml_text, CoreProperties, Package, CONTENT_TYPES_PART, EMPTY_RELATIONSHIPS,
    PACKAGE_RELS_PART, REL_OFFICE_DOCUMENT, REL_STYLES, REL_WORKSHEET, XML_DECLARATION,
};
use crate::pipeline::Rendered;
use crate::resolver;
use crate::snapshot::{FindingEntry, ReportSnapshot};

const SHEET_NAME: &str = "Findings";

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const SHEET_PART: &str = "xl/worksheets/sheet1.xml";
const STYLES_PART: &str = "xl/styles.xml";

/// Longest text Excel accepts in one cell
const MAX_CELL_CHARS: usize = 32_767;

const HEADERS: [&str; 11] = [
    "Finding",
    "Severity",
    "Affected Entities",
    "Description",
    "Impact",
    "Recommendation",
    "Replication",
    "Host Detection",
    "Network Detection",
    "References",
    "Evidence",
];

/// Column widths in characters, in header order
const COLUMN_WIDTHS: [u32; 11] = [40, 14, 30, 60, 50, 50, 50, 40, 40, 40, 30];

/// Cell formats, by index into `cellXfs`
const STYLE_HEADER: usize = 1;
const STYLE_WRAPPED: usize = 2;
/// First format carrying a severity fill
const FIRST_FILL_STYLE: usize = 3;
/// Fills 0 and 1 are reserved by Excel
const FIRST_CUSTOM_FILL: usize = 2;

/// Distinct severity colours, in order of first use
#[derive(Debug, Default)]
struct FillRegistry {
    colors: Vec<String>,
}

impl FillRegistry {
    /// Cell format index for a fill colour
    fn style_for(&mut self, hex: &str) -> usize {
        let hex = hex.to_ascii_uppercase();
        let index = match self.colors.iter().position(|c| *c == hex) {
            Some(index) => index,
            None => {
                self.colors.push(hex);
                self.colors.len() - 1
            }
        };
        FIRST_FILL_STYLE + index
    }

    fn styles_xml(&self) -> String {
        let mut fills = String::from(
            r#"<fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill>"#,
        );
        for color in &self.colors {
            fills.push_str(&format!(
                r#"<fill><patternFill patternType="solid"><fgColor rgb="FF{}"/><bgColor indexed="64"/></patternFill></fill>"#,
                color
            ));
        }

        let mut formats = String::from(concat!(
            r#"<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>"#,
            r#"<xf numFmtId="0" fontId="1" fillId="0" borderId="0" xfId="0" applyFont="1" applyAlignment="1"><alignment vertical="top" wrapText="1"/></xf>"#,
            r#"<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0" applyAlignment="1"><alignment vertical="top" wrapText="1"/></xf>"#,
        ));
        for index in 0..self.colors.len() {
            formats.push_str(&format!(
                r#"<xf numFmtId="0" fontId="0" fillId="{}" borderId="0" xfId="0" applyFill="1" applyAlignment="1"><alignment vertical="top" wrapText="1"/></xf>"#,
                FIRST_CUSTOM_FILL + index
            ));
        }

        format!(
            r#"{decl}
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="2"><font><sz val="11"/><name val="Calibri"/><family val="2"/></font><font><b/><sz val="11"/><name val="Calibri"/><family val="2"/></font></fonts><fills count="{fill_count}">{fills}</fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="{format_count}">{formats}</cellXfs><cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles></styleSheet>"#,
            decl = XML_DECLARATION,
            fill_count = FIRST_CUSTOM_FILL + self.colors.len(),
            fills = fills,
            format_count = FIRST_FILL_STYLE + self.colors.len(),
            formats = formats,
        )
    }
}

/// Rows and styles for one render
#[derive(Debug, Default)]
struct RenderState {
    rows: Vec<String>,
    fills: FillRegistry,
    warnings: Vec<String>,
}

/// Column letter for a zero-based column index
fn column_letter(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(char::from(b'A' + (index % 26) as u8));
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.iter().rev().collect()
}

fn cell_xml(reference: &str, text: &str, style: usize) -> String {
    format!(
        r#"<c r="{}" s="{}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
        reference,
        style,
        xml_text(text)
    )
}

impl RenderState {
    fn push_row(&mut self, cells: Vec<(String, usize)>) {
        let row_number = self.rows.len() + 1;
        let cells_xml = cells
            .into_iter()
            .enumerate()
            .map(|(col, (text, style))| {
                let reference = format!("{}{}", column_letter(col), row_number);
                cell_xml(&reference, &self.fit(text, &reference), style)
            })
            .collect::<String>();
        self.rows
            .push(format!(r#"<row r="{}">{}</row>"#, row_number, cells_xml));
    }

    /// Truncate text that exceeds the cell limit
    fn fit(&mut self, text: String, reference: &str) -> String {
        if text.chars().count() <= MAX_CELL_CHARS {
            return text;
        }
        log::warn!("Cell {} exceeds the Excel limit; truncating", reference);
        self.warnings.push(format!(
            "Cell {} was truncated to {} characters",
            reference, MAX_CELL_CHARS
        ));
        text.chars().take(MAX_CELL_CHARS).collect()
    }

    fn push_finding(
        &mut self,
        finding: &FindingEntry,
        snapshot: &ReportSnapshot,
    ) -> Result<(), ReportError> {
        let fields = [
            ("Affected Entities", &finding.affected_entities),
            ("Description", &finding.description),
            ("Impact", &finding.impact),
            ("Recommendation", &finding.recommendation),
            ("Replication", &finding.replication_steps),
            ("Host Detection", &finding.host_detection),
            ("Network Detection", &finding.network_detection),
            ("References", &finding.references),
        ];

        let severity_style = if finding.severity.is_empty() {
            STYLE_WRAPPED
        } else {
            self.fills.style_for(&finding.severity_color)
        };

        let mut cells = vec![
            (finding.title.clone(), STYLE_WRAPPED),
            (finding.severity.clone(), severity_style),
        ];
        for (label, markup) in fields {
            let field = format!("{} / {}", finding.title, label);
            let (text, mut warnings) =
                resolver::flatten_field(markup, &field, Some(finding), snapshot)?;
            self.warnings.append(&mut warnings);
            cells.push((text, STYLE_WRAPPED));
        }
        let evidence = finding
            .evidence
            .iter()
            .map(|e| e.file_name())
            .collect::<Vec<_>>()
            .join("\n");
        cells.push((evidence, STYLE_WRAPPED));

        self.push_row(cells);
        Ok(())
    }

    fn sheet_xml(&self) -> String {
        let cols = COLUMN_WIDTHS
            .iter()
            .enumerate()
            .map(|(idx, width)| {
                format!(
                    r#"<col min="{n}" max="{n}" width="{w}" customWidth="1"/>"#,
                    n = idx + 1,
                    w = width
                )
            })
            .collect::<String>();
        let last_cell = format!("{}{}", column_letter(HEADERS.len() - 1), self.rows.len().max(1));

        format!(
            r#"{}
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><dimension ref="A1:{}"/><sheetViews><sheetView workbookViewId="0"><pane ySplit="1" topLeftCell="A2" activePane="bottomLeft" state="frozen"/></sheetView></sheetViews><sheetFormatPr defaultRowHeight="15"/><cols>{}</cols><sheetData>{}</sheetData><pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/></worksheet>"#,
            XML_DECLARATION,
            last_cell,
            cols,
            self.rows.concat()
        )
    }
}

fn workbook_xml() -> String {
    format!(
        r#"{}
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><bookViews><workbookView/></bookViews><sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        XML_DECLARATION, SHEET_NAME
    )
}

fn content_types_xml() -> String {
    format!(
        r#"{}
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/{}" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/{}" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/{}" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/></Types>"#,
        XML_DECLARATION, WORKBOOK_PART, SHEET_PART, STYLES_PART
    )
}

/// Render a snapshot's findings into a workbook
pub fn render(snapshot: &ReportSnapshot) -> Result<Rendered, ReportError> {
    let mut state = RenderState::default();
    state.push_row(
        HEADERS
            .iter()
            .map(|header| (header.to_string(), STYLE_HEADER))
            .collect(),
    );
    for finding in &snapshot.findings {
        state.push_finding(finding, snapshot)?;
    }

    let mut package = Package::new();
    package.set_part(CONTENT_TYPES_PART, content_types_xml());
    package.set_part(
        PACKAGE_RELS_PART,
        add_relationship(EMPTY_RELATIONSHIPS, "rId1", REL_OFFICE_DOCUMENT, WORKBOOK_PART)?,
    );
    package.set_part(WORKBOOK_PART, workbook_xml());
    let workbook_rels = add_relationship(
        EMPTY_RELATIONSHIPS,
        "rId1",
        REL_WORKSHEET,
        "worksheets/sheet1.xml",
    )?;
    package.set_part(
        WORKBOOK_RELS_PART,
        add_relationship(&workbook_rels, "rId2", REL_STYLES, "styles.xml")?,
    );
    package.set_part(SHEET_PART, state.sheet_xml());
    package.set_part(STYLES_PART, state.fills.styles_xml());

    CoreProperties {
        title: snapshot.report.title.clone(),
        subject: format!("{} findings", snapshot.client.full_name).trim().to_string(),
        creator: snapshot.company.name.clone(),
        keywords: snapshot.project.project_type.clone(),
    }
    .apply(&mut package)?;

    log::info!("Rendered XLSX with {} finding rows", snapshot.findings.len());

    Ok(Rendered {
        bytes: package.to_bytes()?,
        warnings: state.warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report_config::CompanyInfo;
    use crate::report_model::Report;
    use crate::snapshot;

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(10), "K");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(27), "AB");
    }

    #[test]
    fn test_fill_registry_reuses_colours() {
        // Arrange
        let mut fills = FillRegistry::default();

        // Act
        let critical = fills.style_for("966FD6");
        let low = fills.style_for("a8d08d");
        let again = fills.style_for("966fd6");

        // Assert
        assert_eq!(critical, FIRST_FILL_STYLE);
        assert_eq!(low, FIRST_FILL_STYLE + 1);
        assert_eq!(again, critical);
        let xml = fills.styles_xml();
        assert!(xml.contains(r#"<fgColor rgb="FFA8D08D"/>"#));
        assert!(xml.contains(r#"<cellXfs count="5">"#));
    }

    #[test]
    fn test_rows_flatten_rich_text() {
        // Arrange
        let mut snap = snapshot::build(&Report::default(), &CompanyInfo::default());
        snap.findings.push(FindingEntry {
            title: "Weak TLS".to_string(),
            severity: "Low".to_string(),
            severity_color: "a8d08d".to_string(),
            description: "<p><strong>Old</strong> ciphers</p><ul><li>RC4</li></ul>".to_string(),
            ..FindingEntry::default()
        });
        let mut state = RenderState::default();

        // Act
        state.push_finding(&snap.findings[0], &snap).unwrap();

        // Assert
        let row = &state.rows[0];
        assert!(row.contains(r#"<c r="A1" s="2" t="inlineStr"><is><t xml:space="preserve">Weak TLS</t>"#));
        assert!(row.contains(r#"<c r="B1" s="3""#));
        assert!(row.contains("Old ciphers\n• RC4"));
    }

    #[test]
    fn test_long_cells_are_truncated_with_warning() {
        let mut state = RenderState::default();

        let text = state.fit("x".repeat(MAX_CELL_CHARS + 5), "D2");

        assert_eq!(text.len(), MAX_CELL_CHARS);
        assert_eq!(state.warnings.len(), 1);
    }
}
