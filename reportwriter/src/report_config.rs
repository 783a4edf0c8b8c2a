//! Report generation configuration from reportwriter.toml

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default file name of the configuration file
pub const CONFIG_FILE_NAME: &str = "reportwriter.toml";

/// Main configuration from reportwriter.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Company producing the reports
    pub company: CompanyInfo,

    /// Output and rendering settings
    pub report: ReportSettings,
}

/// Company contact details shown on closing slides and in template tags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyInfo {
    /// Full company name
    pub name: String,

    /// Abbreviated company name
    pub short_name: String,

    /// Contact email address
    pub email: String,

    /// Twitter handle
    pub twitter: String,

    /// Postal address
    pub address: String,
}

/// Output and rendering settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    /// Template for generated file names (without extension)
    ///
    /// Placeholders: `{date}`, `{client}`, `{project}`, `{assessment_type}`, `{title}`
    pub filename_template: String,

    /// Word template; the built-in blank template is used when unset
    pub docx_template: Option<PathBuf>,

    /// PowerPoint template; the built-in blank template is used when unset
    pub pptx_template: Option<PathBuf>,

    /// Directory that relative evidence paths are resolved against
    pub evidence_root: PathBuf,

    /// Border colour drawn around image evidence, as hex RGB
    pub border_color: String,

    /// Border width in pixels
    pub border_width: u32,

    /// Width of evidence images in Word documents
    pub image_width_inches: f64,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            filename_template: "{date} {client} {assessment_type} Report".to_string(),
            docx_template: None,
            pptx_template: None,
            evidence_root: PathBuf::from("."),
            border_color: "2d2b6b".to_string(),
            border_width: 1,
            image_width_inches: 6.5,
        }
    }
}

impl ReportConfig {
    /// Load configuration from a reportwriter.toml file
    ///
    /// # Parameters
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    /// * `Ok(ReportConfig)` - Successfully loaded configuration
    /// * `Err(ReportConfigError)` - Error reading or parsing the configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ReportConfigError> {
        let content = fs::read_to_string(&path).map_err(ReportConfigError::IoError)?;

        let config: ReportConfig =
            toml::from_str(&content).map_err(ReportConfigError::ParseError)?;

        if let Err(reason) = config.report.validate() {
            return Err(ReportConfigError::Invalid(reason));
        }

        Ok(config)
    }

    /// Save configuration to a reportwriter.toml file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ReportConfigError> {
        let content = toml::to_string_pretty(self).map_err(ReportConfigError::SerializeError)?;

        fs::write(&path, content).map_err(ReportConfigError::IoError)?;

        Ok(())
    }
}

impl ReportSettings {
    fn validate(&self) -> Result<(), String> {
        if parse_hex_color(&self.border_color).is_none() {
            return Err(format!(
                "border_color '{}' is not a 6-digit hex colour",
                self.border_color
            ));
        }
        if self.image_width_inches.is_nan() || self.image_width_inches <= 0.0 {
            return Err("image_width_inches must be positive".to_string());
        }
        Ok(())
    }
}

/// Parse `rrggbb` or `#rrggbb` into RGB components
pub fn parse_hex_color(hex: &str) -> Option<[u8; 3]> {
    let hex = hex.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
    Some([channel(0..2)?, channel(2..4)?, channel(4..6)?])
}

/// Errors that can occur when loading or saving configuration
#[derive(Debug)]
#[allow(clippy::enum_variant_names)]
pub enum ReportConfigError {
    /// IO error when reading or writing file
    IoError(std::io::Error),

    /// Error parsing TOML
    ParseError(toml::de::Error),

    /// Error serializing to TOML
    SerializeError(toml::ser::Error),

    /// A value is out of range
    Invalid(String),
}

impl std::fmt::Display for ReportConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ReportConfigError::ParseError(e) => write!(f, "TOML parse error: {}", e),
            ReportConfigError::SerializeError(e) => write!(f, "TOML serialize error: {}", e),
            ReportConfigError::Invalid(reason) => write!(f, "Invalid configuration: {}", reason),
        }
    }
}

impl std::error::Error for ReportConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_config_roundtrip() {
        let config = ReportConfig {
            company: CompanyInfo {
                name: "SpecterOps".to_string(),
                short_name: "SO".to_string(),
                email: "info@example.com".to_string(),
                twitter: "@example".to_string(),
                address: "1 Main St".to_string(),
            },
            report: ReportSettings {
                docx_template: Some(PathBuf::from("templates/report.docx")),
                ..ReportSettings::default()
            },
        };

        // Serialize to TOML
        let toml_str = toml::to_string_pretty(&config).unwrap();

        // Deserialize back
        let parsed: ReportConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.company, config.company);
        assert_eq!(
            parsed.report.docx_template,
            Some(PathBuf::from("templates/report.docx"))
        );
        assert_eq!(parsed.report.border_color, "2d2b6b");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_content = r#"
[company]
name = "Example Security"

[report]
filename_template = "{client} {title}"
"#;

        let config: ReportConfig = toml::from_str(toml_content).unwrap();

        assert_eq!(config.company.name, "Example Security");
        assert_eq!(config.report.filename_template, "{client} {title}");
        assert_eq!(config.report.border_width, 1);
        assert_eq!(config.report.image_width_inches, 6.5);
    }

    #[test]
    fn test_load_rejects_bad_border_color() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[report]\nborder_color = \"purple\"\n").unwrap();

        // Act
        let result = ReportConfig::load(&path);

        // Assert
        assert!(matches!(result, Err(ReportConfigError::Invalid(_))));
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#2d2b6b"), Some([0x2d, 0x2b, 0x6b]));
        assert_eq!(parse_hex_color("966FD6"), Some([0x96, 0x6f, 0xd6]));
        assert_eq!(parse_hex_color("zzzzzz"), None);
        assert_eq!(parse_hex_color("fff"), None);
    }
}
