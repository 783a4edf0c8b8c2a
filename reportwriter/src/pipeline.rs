//! Generation pipeline
//!
//! This module ties the stages of report generation together:
//! 1. **Snapshot**: Project a report into an immutable [`ReportSnapshot`]
//! 2. **Export**: Render the snapshot into one or more output formats
//! 3. **Packaging**: Bundle every format into a single Zip archive on request

use crate::docx_exporter;
use crate::error::ReportError;
use crate::evidence::BorderStyle;
use crate::json_exporter;
use crate::pptx_exporter;
use crate::report_config::ReportSettings;
use crate::snapshot::ReportSnapshot;
use crate::xlsx_exporter;
use std::fmt;
use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::str::FromStr;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Characters that cannot appear in file names on common filesystems
const ILLEGAL_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Output format of a single document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Docx,
    Pptx,
    Xlsx,
    Json,
}

impl OutputFormat {
    /// Every format produced by [`generate_all`], in archive order
    pub const ALL: [OutputFormat; 4] = [
        OutputFormat::Docx,
        OutputFormat::Pptx,
        OutputFormat::Xlsx,
        OutputFormat::Json,
    ];

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Docx => "docx",
            OutputFormat::Pptx => "pptx",
            OutputFormat::Xlsx => "xlsx",
            OutputFormat::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "docx" => Ok(OutputFormat::Docx),
            "pptx" => Ok(OutputFormat::Pptx),
            "xlsx" => Ok(OutputFormat::Xlsx),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format '{}'", other)),
        }
    }
}

/// Settings shared by every exporter for one generation request
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Word template; the built-in blank template when `None`
    pub docx_template: Option<PathBuf>,
    /// PowerPoint template; the built-in blank deck when `None`
    pub pptx_template: Option<PathBuf>,
    /// Border drawn around embedded images
    pub border: BorderStyle,
    /// Width of images embedded in Word documents
    pub image_width_inches: f64,
    /// Template for generated file names, without extension
    pub filename_template: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::from(&ReportSettings::default())
    }
}

impl From<&ReportSettings> for RenderOptions {
    fn from(settings: &ReportSettings) -> Self {
        Self {
            docx_template: settings.docx_template.clone(),
            pptx_template: settings.pptx_template.clone(),
            border: BorderStyle::from_settings(settings),
            image_width_inches: settings.image_width_inches,
            filename_template: settings.filename_template.clone(),
        }
    }
}

/// A rendered document and the recoverable problems met while rendering it
#[derive(Debug, Clone, Default)]
pub struct Rendered {
    pub bytes: Vec<u8>,
    pub warnings: Vec<String>,
}

/// Render a snapshot into one format
pub fn generate(
    snapshot: &ReportSnapshot,
    format: OutputFormat,
    options: &RenderOptions,
) -> Result<Rendered, ReportError> {
    log::info!("Generating {} for report {}", format, snapshot.report.id);
    match format {
        OutputFormat::Docx => docx_exporter::render(snapshot, options),
        OutputFormat::Pptx => pptx_exporter::render(snapshot, options),
        OutputFormat::Xlsx => xlsx_exporter::render(snapshot),
        OutputFormat::Json => json_exporter::render(snapshot),
    }
}

/// Render every format and bundle them into a Zip archive
///
/// Entries are named with the configured filename template. The first
/// exporter failure aborts the whole archive.
pub fn generate_all(
    snapshot: &ReportSnapshot,
    options: &RenderOptions,
) -> Result<Rendered, ReportError> {
    #[cfg(feature = "parallel")]
    let rendered: Result<Vec<_>, _> = OutputFormat::ALL
        .par_iter()
        .map(|format| generate(snapshot, *format, options).map(|r| (*format, r)))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let rendered: Result<Vec<_>, _> = OutputFormat::ALL
        .iter()
        .map(|format| generate(snapshot, *format, options).map(|r| (*format, r)))
        .collect();

    let stem = output_stem(&options.filename_template, snapshot);
    let mut archive = ZipWriter::new(Cursor::new(Vec::new()));
    let entry_options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    let mut warnings = Vec::new();

    for (format, document) in rendered? {
        let name = format!("{}.{}", stem, format.extension());
        archive.start_file(name.as_str(), entry_options)?;
        archive.write_all(&document.bytes)?;
        warnings.extend(
            document
                .warnings
                .into_iter()
                .map(|warning| format!("{}: {}", format, warning)),
        );
    }

    let bytes = archive.finish()?.into_inner();
    log::info!("Bundled {} documents ({} bytes)", OutputFormat::ALL.len(), bytes.len());
    Ok(Rendered { bytes, warnings })
}

/// File name for a generated document
pub fn output_filename(template: &str, snapshot: &ReportSnapshot, extension: &str) -> String {
    format!("{}.{}", output_stem(template, snapshot), extension)
}

/// Expand the filename template and strip characters illegal in file names
///
/// Placeholders: `{date}`, `{client}`, `{project}`, `{assessment_type}`, `{title}`.
fn output_stem(template: &str, snapshot: &ReportSnapshot) -> String {
    let expanded = template
        .replace("{date}", &snapshot.report.generated_on.format("%Y-%m-%d").to_string())
        .replace("{client}", snapshot.client.display_name())
        .replace("{project}", &snapshot.project.name)
        .replace("{assessment_type}", &snapshot.project.project_type)
        .replace("{title}", &snapshot.report.title);

    let sanitized: String = expanded
        .chars()
        .map(|c| {
            if ILLEGAL_FILENAME_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    let collapsed = sanitized.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_matches(|c: char| c == '.' || c == ' ');
    if trimmed.is_empty() {
        "report".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report_config::CompanyInfo;
    use crate::report_model::Report;
    use crate::snapshot;
    use chrono::NaiveDate;
    use std::io::Read;
    use zip::ZipArchive;

    fn sample_snapshot() -> ReportSnapshot {
        let mut report = Report {
            title: "Q3: External/Internal".to_string(),
            ..Report::default()
        };
        report.client.name = "Acme Corporation".to_string();
        report.client.short_name = "ACME".to_string();
        report.project.project_type = Some("Penetration Test".to_string());
        let mut snap = snapshot::build(&report, &CompanyInfo::default());
        snap.report.generated_on = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        snap
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("DOCX".parse::<OutputFormat>(), Ok(OutputFormat::Docx));
        assert_eq!("json".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert!("pdf".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Pptx.to_string(), "pptx");
    }

    #[test]
    fn test_filename_template_expansion() {
        // Arrange
        let snap = sample_snapshot();

        // Act
        let name = output_filename("{date} {client} {assessment_type} Report", &snap, "docx");

        // Assert
        assert_eq!(name, "2024-03-09 ACME Penetration Test Report.docx");
    }

    #[test]
    fn test_filename_strips_illegal_characters() {
        let snap = sample_snapshot();

        let name = output_filename("{title}", &snap, "xlsx");

        assert_eq!(name, "Q3_ External_Internal.xlsx");
    }

    #[test]
    fn test_empty_filename_falls_back() {
        let snap = snapshot::build(&Report::default(), &CompanyInfo::default());

        assert_eq!(output_filename("{client}", &snap, "json"), "report.json");
    }

    #[test]
    fn test_generate_all_bundles_every_format() {
        // Arrange
        let snap = sample_snapshot();
        let options = RenderOptions {
            filename_template: "{client} Report".to_string(),
            ..RenderOptions::default()
        };

        // Act
        let rendered = generate_all(&snap, &options).unwrap();

        // Assert
        let mut archive = ZipArchive::new(Cursor::new(rendered.bytes)).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "ACME Report.docx",
                "ACME Report.json",
                "ACME Report.pptx",
                "ACME Report.xlsx"
            ]
        );

        let mut json = String::new();
        archive
            .by_name("ACME Report.json")
            .unwrap()
            .read_to_string(&mut json)
            .unwrap();
        assert!(json.contains("\"short_name\": \"ACME\""));
    }
}
