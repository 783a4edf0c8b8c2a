//! reportwriter - report deliverable generator
//!
//! A CLI tool that renders a penetration-test report export into Word,
//! PowerPoint, Excel and JSON documents.

#![deny(unsafe_code)]
#![cfg_attr(all(not(debug_assertions), not(test)), deny(clippy::all))]
#![cfg_attr(all(not(debug_assertions), not(test)), deny(clippy::pedantic))]
#![cfg_attr(all(not(debug_assertions), not(test)), deny(missing_docs))]
// Allow some pedantic lints that are too strict for this project
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, FormatArg};
use reportwriter::report_config::{ReportConfig, CONFIG_FILE_NAME};
use reportwriter::{pipeline, snapshot, Report, ReportError, ReportSnapshot, RenderOptions};
use std::path::{Path, PathBuf};

/// Main entry point for the reportwriter CLI application
fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:?}", e);
        std::process::exit(1);
    }
}

/// Run the CLI application
fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            report,
            output,
            format,
            config,
            docx_template,
            pptx_template,
            verbose,
        } => {
            init_logging(verbose);
            handle_build_command(
                report,
                output,
                format,
                config,
                docx_template,
                pptx_template,
            )?;
        }

        Commands::Snapshot { report, config } => {
            init_logging(false);
            handle_snapshot_command(&report, config)?;
        }

        Commands::InitConfig { path, force } => {
            handle_init_config_command(path, force)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("warn"),
    );
    if verbose {
        builder.filter_level(log::LevelFilter::Info);
    }
    builder.init();
}

/// Configuration plus the directory its relative paths are anchored to
struct LoadedConfig {
    config: ReportConfig,
    base_dir: PathBuf,
}

/// Load the explicit config, else `./reportwriter.toml`, else defaults
///
/// Relative paths in a config file resolve against the file's directory.
/// Without a file they resolve against the report's directory.
fn load_config(explicit: Option<PathBuf>, report: &Path) -> Result<LoadedConfig> {
    let path = match explicit {
        Some(path) => Some(path),
        None => {
            let default_path = PathBuf::from(CONFIG_FILE_NAME);
            default_path.exists().then_some(default_path)
        }
    };

    match path {
        Some(path) => {
            let config = ReportConfig::load(&path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?;
            log::info!("Loaded configuration from {}", path.display());
            Ok(LoadedConfig {
                config,
                base_dir: parent_dir(&path),
            })
        }
        None => Ok(LoadedConfig {
            config: ReportConfig::default(),
            base_dir: parent_dir(report),
        }),
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn anchor(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Load the report and project it into a snapshot
fn load_snapshot(report_path: &Path, loaded: &LoadedConfig) -> Result<ReportSnapshot> {
    let report = Report::load(report_path)
        .with_context(|| format!("Failed to load report {}", report_path.display()))?;
    let evidence_root = anchor(&loaded.base_dir, &loaded.config.report.evidence_root);
    Ok(snapshot::build_with_evidence_root(
        &report,
        &loaded.config.company,
        &evidence_root,
    ))
}

/// Pick the format from the flag, else from the output extension
fn resolve_format(format_arg: Option<FormatArg>, output: &mut PathBuf) -> Result<FormatArg> {
    match format_arg {
        Some(format) => {
            if output.extension().is_none() {
                output.set_extension(format.extension());
            }
            Ok(format)
        }
        None => match output.extension().and_then(|s| s.to_str()) {
            Some(ext) => FormatArg::from_extension(ext).ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown output format for extension '.{}'. Supported: .docx, .pptx, .xlsx, .json, .zip\nUse --format to specify explicitly.",
                    ext
                )
            }),
            None => {
                output.set_extension("docx");
                Ok(FormatArg::Docx)
            }
        },
    }
}

/// Handle the build command
fn handle_build_command(
    report_path: PathBuf,
    mut output: PathBuf,
    format_arg: Option<FormatArg>,
    config_path: Option<PathBuf>,
    docx_template: Option<PathBuf>,
    pptx_template: Option<PathBuf>,
) -> Result<()> {
    let format = resolve_format(format_arg, &mut output)?;
    let loaded = load_config(config_path, &report_path)?;

    let mut options = RenderOptions::from(&loaded.config.report);
    let configured_docx = options
        .docx_template
        .take()
        .map(|p| anchor(&loaded.base_dir, &p));
    let configured_pptx = options
        .pptx_template
        .take()
        .map(|p| anchor(&loaded.base_dir, &p));
    options.docx_template = docx_template.or(configured_docx);
    options.pptx_template = pptx_template.or(configured_pptx);

    println!("Building report...");
    println!("Input: {}", report_path.display());
    println!("Output: {}", output.display());

    let snapshot = load_snapshot(&report_path, &loaded)?;
    println!(
        "✓ Loaded {} findings, {} observations",
        snapshot.findings.len(),
        snapshot.observations.len()
    );

    let rendered = match format.single() {
        Some(single) => pipeline::generate(&snapshot, single, &options),
        None => pipeline::generate_all(&snapshot, &options),
    }
    .map_err(explain_failure)?;

    for warning in &rendered.warnings {
        log::warn!("{}", warning);
    }

    std::fs::write(&output, &rendered.bytes)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("✓ Successfully wrote: {}", output.display());

    Ok(())
}

/// Separate template problems from engine failures in the message
fn explain_failure(error: ReportError) -> anyhow::Error {
    if error.is_template_problem() {
        anyhow::Error::new(error).context("The template must be fixed before generating")
    } else {
        anyhow::Error::new(error).context("Report generation failed")
    }
}

/// Handle the snapshot command
fn handle_snapshot_command(report_path: &Path, config_path: Option<PathBuf>) -> Result<()> {
    let loaded = load_config(config_path, report_path)?;
    let snapshot = load_snapshot(report_path, &loaded)?;
    let json = serde_json::to_string_pretty(&snapshot).context("Failed to serialize snapshot")?;
    println!("{}", json);
    Ok(())
}

/// Handle the init-config command
fn handle_init_config_command(path: Option<PathBuf>, force: bool) -> Result<()> {
    let target = path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
    let target = if target.is_dir() {
        target.join(CONFIG_FILE_NAME)
    } else {
        target
    };

    if target.exists() && !force {
        anyhow::bail!(
            "{} already exists. Use --force to overwrite",
            target.display()
        );
    }

    ReportConfig::default()
        .save(&target)
        .with_context(|| format!("Failed to write {}", target.display()))?;
    println!("✓ Wrote default configuration: {}", target.display());
    Ok(())
}
