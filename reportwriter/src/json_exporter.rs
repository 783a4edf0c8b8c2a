//! JSON export of the full snapshot
//!
//! Rich-text fields are emitted raw, as stored.

use crate::error::ReportError;
use crate::pipeline::Rendered;
use crate::snapshot::ReportSnapshot;

/// Serialize a snapshot as pretty-printed JSON
pub fn render(snapshot: &ReportSnapshot) -> Result<Rendered, ReportError> {
    let mut bytes = serde_json::to_vec_pretty(snapshot)?;
    bytes.push(b'\n');
    log::info!("Rendered JSON ({} bytes)", bytes.len());
    Ok(Rendered {
        bytes,
        warnings: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report_config::CompanyInfo;
    use crate::report_model::{Report, ReportFinding};
    use crate::snapshot;

    #[test]
    fn test_json_keeps_raw_markup() {
        // Arrange
        let report = Report {
            title: "Q3 Assessment".to_string(),
            findings: vec![ReportFinding {
                id: 7,
                title: "XSS".to_string(),
                description: "<p>Reflected <em>input</em></p>".to_string(),
                ..ReportFinding::default()
            }],
            ..Report::default()
        };
        let snap = snapshot::build(&report, &CompanyInfo::default());

        // Act
        let rendered = render(&snap).unwrap();

        // Assert
        let value: serde_json::Value = serde_json::from_slice(&rendered.bytes).unwrap();
        assert_eq!(value["report"]["title"], "Q3 Assessment");
        assert_eq!(value["findings"][0]["id"], 7);
        assert_eq!(
            value["findings"][0]["description"],
            "<p>Reflected <em>input</em></p>"
        );
    }

    #[test]
    fn test_json_round_trips_to_snapshot() {
        let snap = snapshot::build(&Report::default(), &CompanyInfo::default());

        let rendered = render(&snap).unwrap();
        let back: ReportSnapshot = serde_json::from_slice(&rendered.bytes).unwrap();

        assert_eq!(back.report.generated_on, snap.report.generated_on);
    }
}
