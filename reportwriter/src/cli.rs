//! Command-line interface definitions for reportwriter

use clap::{Parser, Subcommand, ValueEnum};
use reportwriter::OutputFormat;
use std::path::PathBuf;

/// Output format for the build command
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    /// Microsoft Word report
    Docx,
    /// Microsoft PowerPoint debrief deck
    Pptx,
    /// Microsoft Excel findings sheet
    Xlsx,
    /// Raw JSON snapshot
    Json,
    /// Zip archive with every format
    All,
}

impl FormatArg {
    /// Detect the format from an output file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "docx" => Some(FormatArg::Docx),
            "pptx" => Some(FormatArg::Pptx),
            "xlsx" => Some(FormatArg::Xlsx),
            "json" => Some(FormatArg::Json),
            "zip" => Some(FormatArg::All),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self.single() {
            Some(format) => format.extension(),
            None => "zip",
        }
    }

    /// The single document format, or `None` for the archive
    pub fn single(self) -> Option<OutputFormat> {
        match self {
            FormatArg::Docx => Some(OutputFormat::Docx),
            FormatArg::Pptx => Some(OutputFormat::Pptx),
            FormatArg::Xlsx => Some(OutputFormat::Xlsx),
            FormatArg::Json => Some(OutputFormat::Json),
            FormatArg::All => None,
        }
    }
}

/// CLI structure for the reportwriter application
#[derive(Parser)]
#[command(name = "reportwriter")]
#[command(version)]
#[command(about = "Generate report deliverables from a report export", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands for reportwriter
#[derive(Subcommand)]
pub enum Commands {
    /// Render a report to one format, or every format as a Zip archive
    Build {
        /// Report export (JSON)
        #[arg(value_name = "REPORT")]
        report: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Output format (detected from the output extension when omitted)
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,

        /// Configuration file (defaults to ./reportwriter.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Word template, overriding the configuration
        #[arg(long)]
        docx_template: Option<PathBuf>,

        /// PowerPoint template, overriding the configuration
        #[arg(long)]
        pptx_template: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print the report snapshot as JSON
    Snapshot {
        /// Report export (JSON)
        #[arg(value_name = "REPORT")]
        report: PathBuf,

        /// Configuration file (defaults to ./reportwriter.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Write a configuration file with default settings
    InitConfig {
        /// Where to write it (defaults to ./reportwriter.toml)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_extension_detection() {
        assert_eq!(FormatArg::from_extension("DOCX"), Some(FormatArg::Docx));
        assert_eq!(FormatArg::from_extension("zip"), Some(FormatArg::All));
        assert_eq!(FormatArg::from_extension("pdf"), None);
        assert_eq!(FormatArg::All.extension(), "zip");
        assert_eq!(FormatArg::Xlsx.single(), Some(OutputFormat::Xlsx));
    }

    #[test]
    fn test_build_arguments_parse() {
        let cli = Cli::try_parse_from([
            "reportwriter",
            "build",
            "report.json",
            "-o",
            "out.zip",
            "--pptx-template",
            "deck.pptx",
        ])
        .unwrap();

        match cli.command {
            Commands::Build {
                report,
                format,
                pptx_template,
                ..
            } => {
                assert_eq!(report, PathBuf::from("report.json"));
                assert_eq!(format, None);
                assert_eq!(pptx_template, Some(PathBuf::from("deck.pptx")));
            }
            _ => panic!("expected build command"),
        }
    }
}
