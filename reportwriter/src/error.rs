//! Error types for report generation
//!
//! Errors fall into two classes that callers present differently: template
//! problems the report author can fix, and everything else.

use std::path::PathBuf;
use thiserror::Error;

/// Problems with a template file or its tags
#[derive(Error, Debug)]
pub enum TemplateError {
    /// Template file does not exist
    #[error("Template file not found: {0}")]
    NotFound(PathBuf),

    /// Template file exists but could not be read
    #[error("Could not read template {path}: {source}")]
    Unreadable {
        /// Path of the template
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Template is not a valid Office container
    #[error("Template is not a valid {kind} file: {reason}")]
    InvalidContainer {
        /// Expected container kind ("Word", "PowerPoint")
        kind: &'static str,
        /// What was wrong with it
        reason: String,
    },

    /// A `{{ tag }}` names a value the report does not provide
    #[error("Undefined template variable '{0}'")]
    UndefinedVariable(String),

    /// A `{{ tag }}` names an object or list instead of a printable value
    #[error("Template variable '{0}' is not a printable value")]
    NotPrintable(String),

    /// A `{{` with no closing `}}` in the same text run
    #[error("Unterminated template tag near '{0}'")]
    Unterminated(String),

    /// A `{% ... %}` control tag, which templates cannot use
    #[error("Unsupported template control tag '{0}'")]
    UnsupportedTag(String),
}

/// Errors that abort generation of a document
#[derive(Error, Debug)]
pub enum ReportError {
    /// The template must be fixed before a document can be produced
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Unexpected failure while rendering
    #[error("Failed to render {format}: {message}")]
    Render {
        /// Output format being rendered
        format: &'static str,
        /// Description of the failure
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Zip container error
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Image decoding or encoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl ReportError {
    /// Shorthand for a render failure
    pub fn render(format: &'static str, message: impl Into<String>) -> Self {
        ReportError::Render {
            format,
            message: message.into(),
        }
    }

    /// Whether the template, rather than the engine, is at fault
    pub fn is_template_problem(&self) -> bool {
        matches!(self, ReportError::Template(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_errors_are_classified() {
        let err = ReportError::from(TemplateError::UndefinedVariable("client.nope".into()));
        assert!(err.is_template_problem());
        assert_eq!(err.to_string(), "Undefined template variable 'client.nope'");
    }

    #[test]
    fn test_render_errors_are_not_template_problems() {
        let err = ReportError::render("docx", "numbering part is corrupt");
        assert!(!err.is_template_problem());
        assert!(err.to_string().contains("docx"));
    }
}
