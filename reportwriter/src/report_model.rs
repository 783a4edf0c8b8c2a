//! Report object graph handed to the engine
//!
//! This is the fully resolved, already authorized report as exported by the
//! web application. Every field is optional on the wire; absent values
//! deserialize to empty strings, empty lists or `None`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A report and everything it references
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Report {
    pub id: u64,
    pub title: String,
    pub client: Client,
    pub project: Project,
    pub findings: Vec<ReportFinding>,
    pub observations: Vec<ReportObservation>,
    pub infrastructure: Infrastructure,
    pub team: Vec<TeamMember>,
}

impl Report {
    /// Load a report from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, crate::error::ReportError> {
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// The client the assessment was performed for
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Client {
    pub id: u64,
    /// Full legal name
    pub name: String,
    pub short_name: String,
    pub codename: String,
    pub note: String,
    pub contacts: Vec<Contact>,
}

/// A point of contact at the client
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Contact {
    pub name: String,
    pub job_title: String,
    pub email: String,
    pub phone: String,
    pub note: String,
}

/// The assessment project
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
    pub id: u64,
    pub codename: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Assessment type, e.g. "Red Team" or "Penetration Test"
    pub project_type: Option<String>,
    pub note: String,
}

/// Severity assigned to a finding
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Severity {
    pub name: String,
    /// Sort weight; lower is more severe. Zero means "derive from the name".
    pub weight: u32,
}

/// A finding attached to the report
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportFinding {
    pub id: u64,
    /// Position of the finding within its severity group
    pub position: u32,
    pub title: String,
    pub severity: Option<Severity>,
    pub finding_type: Option<String>,
    pub affected_entities: String,
    pub description: String,
    pub impact: String,
    pub mitigation: String,
    pub replication_steps: String,
    pub host_detection_techniques: String,
    pub network_detection_techniques: String,
    pub references: String,
    pub evidence: Vec<Evidence>,
}

/// An evidence file uploaded for a finding
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Evidence {
    pub id: u64,
    /// Keyword used in `{{.friendly_name}}` placeholders
    pub friendly_name: String,
    /// Stored file path, relative to the evidence root unless absolute
    pub document: String,
    pub caption: String,
    pub description: String,
}

/// A non-finding observation attached to the report
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportObservation {
    pub id: u64,
    pub position: u32,
    pub title: String,
    pub description: String,
}

/// Infrastructure used during the assessment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Infrastructure {
    pub domains: Vec<DomainCheckout>,
    pub static_servers: Vec<ServerCheckout>,
    pub cloud_servers: Vec<CloudServer>,
    pub domain_server_links: Vec<DomainServerLink>,
}

/// A domain checked out for the project
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainCheckout {
    pub id: u64,
    pub domain: String,
    pub activity: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub note: String,
}

/// A static server checked out for the project
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerCheckout {
    pub id: u64,
    pub ip_address: String,
    pub provider: String,
    pub activity: String,
    pub role: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub note: String,
}

/// A cloud server created for the project
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudServer {
    pub id: u64,
    pub name: String,
    pub ip_address: String,
    pub provider: String,
    pub activity: String,
    pub role: String,
    pub note: String,
}

/// A domain (or subdomain) pointed at a server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainServerLink {
    pub domain: String,
    /// Subdomain label; empty or `*` means the apex
    pub subdomain: String,
    /// CDN endpoint in front of the server, if any
    pub endpoint: String,
    pub server_ip: String,
}

impl DomainServerLink {
    /// Fully qualified domain name of the link
    pub fn fqdn(&self) -> String {
        let sub = self.subdomain.trim();
        let domain = self.domain.trim();
        if sub.is_empty() || sub == "*" || sub == "@" {
            domain.to_ascii_lowercase()
        } else {
            format!("{}.{}", sub, domain).to_ascii_lowercase()
        }
    }
}

/// An operator assigned to the project
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamMember {
    pub name: String,
    pub email: String,
    pub role: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub note: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_report_json_deserializes() {
        // Arrange: only a handful of fields present
        let json = r#"{
            "title": "Q3 Assessment",
            "client": { "name": "Acme Corporation" },
            "findings": [ { "id": 7, "title": "SQLi" } ]
        }"#;

        // Act
        let report: Report = serde_json::from_str(json).unwrap();

        // Assert
        assert_eq!(report.client.name, "Acme Corporation");
        assert_eq!(report.findings[0].id, 7);
        assert!(report.findings[0].severity.is_none());
        assert!(report.project.start_date.is_none());
    }

    #[test]
    fn test_fqdn_joins_subdomain() {
        let apex = DomainServerLink {
            domain: "Example.com".to_string(),
            subdomain: "*".to_string(),
            ..DomainServerLink::default()
        };
        let sub = DomainServerLink {
            domain: "example.com".to_string(),
            subdomain: "cdn".to_string(),
            ..DomainServerLink::default()
        };

        assert_eq!(apex.fqdn(), "example.com");
        assert_eq!(sub.fqdn(), "cdn.example.com");
    }
}
