//! reportwriter - report document generation engine
//!
//! Turns a penetration-test report (client, project, findings with rich-text
//! fields and evidence, infrastructure) into Word, PowerPoint, Excel and JSON
//! deliverables.
//!
//! The flow is:
//! 1. [`report_model::Report::load`] reads the report export
//! 2. [`snapshot::build`] projects it into an immutable [`snapshot::ReportSnapshot`]
//! 3. [`pipeline::generate`] or [`pipeline::generate_all`] renders documents

#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod docx_exporter;
pub mod docx_numbering;
pub mod error;
pub mod evidence;
pub mod json_exporter;
pub mod ooxml;
pub mod pipeline;
pub mod pptx_exporter;
pub mod pptx_shapes;
pub mod report_config;
pub mod report_model;
pub mod resolver;
pub mod rich_text;
pub mod severity;
pub mod snapshot;
pub mod template_tags;
pub mod templates;
pub mod xlsx_exporter;

pub use error::{ReportError, TemplateError};
pub use pipeline::{generate, generate_all, OutputFormat, RenderOptions, Rendered};
pub use report_config::{ReportConfig, ReportSettings};
pub use report_model::Report;
pub use snapshot::ReportSnapshot;
