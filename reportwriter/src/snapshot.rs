//! Immutable projection of a report consumed by every exporter
//!
//! The snapshot is built once per generation request. Rich-text fields are
//! carried raw; each exporter parses them at the fidelity it needs.

use crate::report_config::CompanyInfo;
use crate::report_model::{
    CloudServer, Contact, DomainCheckout, Evidence, Report, ReportFinding, ServerCheckout,
};
use crate::severity;
use chrono::NaiveDate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything an exporter needs to render one report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSnapshot {
    pub report: ReportInfo,
    pub client: ClientInfo,
    pub project: ProjectInfo,
    /// Sorted by severity weight, then position
    pub findings: Vec<FindingEntry>,
    /// Sorted by position
    pub observations: Vec<ObservationEntry>,
    pub infrastructure: InfrastructureInfo,
    pub team: Vec<Assignment>,
    pub company: CompanyInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportInfo {
    pub id: u64,
    pub title: String,
    pub generated_on: NaiveDate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientInfo {
    pub id: u64,
    pub full_name: String,
    pub short_name: String,
    pub codename: String,
    pub note: String,
    pub points_of_contact: Vec<Contact>,
}

impl ClientInfo {
    /// Name substituted for `{{.client}}`: the short name when set, else the full name
    pub fn display_name(&self) -> &str {
        if self.short_name.trim().is_empty() {
            &self.full_name
        } else {
            &self.short_name
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub id: u64,
    pub name: String,
    pub codename: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub project_type: String,
    pub note: String,
}

/// One finding, keyed by its stable id
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindingEntry {
    pub id: u64,
    pub position: u32,
    /// Display title; never used as a key
    pub title: String,
    pub severity: String,
    pub severity_weight: u32,
    /// Palette colour for the severity, without `#`
    pub severity_color: String,
    pub finding_type: String,
    pub affected_entities: String,
    pub description: String,
    pub impact: String,
    pub recommendation: String,
    pub replication_steps: String,
    pub host_detection: String,
    pub network_detection: String,
    pub references: String,
    pub evidence: Vec<EvidenceRef>,
}

impl FindingEntry {
    /// Evidence with the given friendly name
    pub fn evidence_named(&self, friendly_name: &str) -> Option<&EvidenceRef> {
        self.evidence
            .iter()
            .find(|e| e.friendly_name == friendly_name)
    }
}

/// Evidence file referenced by a finding
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvidenceRef {
    pub id: u64,
    pub friendly_name: String,
    /// Stored document path as uploaded
    pub document: String,
    /// Path on disk, resolved against the evidence root
    pub path: PathBuf,
    pub caption: String,
    pub description: String,
}

impl EvidenceRef {
    /// File name of the evidence document
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.document.clone())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservationEntry {
    pub id: u64,
    pub position: u32,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InfrastructureInfo {
    pub domains: Vec<DomainCheckout>,
    pub static_servers: Vec<ServerCheckout>,
    pub cloud_servers: Vec<CloudServer>,
    /// One entry per fully qualified domain name
    pub domain_server_links: Vec<DomainServerEntry>,
}

/// A domain and every server it points at
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainServerEntry {
    pub domain: String,
    /// Sorted, de-duplicated server addresses
    pub servers: Vec<String>,
    /// Sorted, de-duplicated CDN endpoints
    pub endpoints: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Assignment {
    pub name: String,
    pub email: String,
    pub role: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub note: String,
}

/// Build a snapshot with evidence paths taken as given
pub fn build(report: &Report, company: &CompanyInfo) -> ReportSnapshot {
    build_with_evidence_root(report, company, Path::new(""))
}

/// Build a snapshot, resolving relative evidence paths against `evidence_root`
pub fn build_with_evidence_root(
    report: &Report,
    company: &CompanyInfo,
    evidence_root: &Path,
) -> ReportSnapshot {
    let client = ClientInfo {
        id: report.client.id,
        full_name: report.client.name.clone(),
        short_name: report.client.short_name.clone(),
        codename: report.client.codename.clone(),
        note: report.client.note.clone(),
        points_of_contact: report.client.contacts.clone(),
    };

    let project_type = report.project.project_type.clone().unwrap_or_default();
    let project = ProjectInfo {
        id: report.project.id,
        name: project_name(&client, &project_type, report.project.start_date),
        codename: report.project.codename.clone(),
        start_date: report.project.start_date,
        end_date: report.project.end_date,
        project_type,
        note: report.project.note.clone(),
    };

    let findings = report
        .findings
        .iter()
        .map(|finding| finding_entry(finding, evidence_root))
        .sorted_by_key(|f| (f.severity_weight, f.position))
        .collect::<Vec<_>>();

    let observations = report
        .observations
        .iter()
        .map(|o| ObservationEntry {
            id: o.id,
            position: o.position,
            title: o.title.clone(),
            description: o.description.clone(),
        })
        .sorted_by_key(|o| o.position)
        .collect();

    let infrastructure = InfrastructureInfo {
        domains: report.infrastructure.domains.clone(),
        static_servers: report.infrastructure.static_servers.clone(),
        cloud_servers: report.infrastructure.cloud_servers.clone(),
        domain_server_links: merge_domain_links(report),
    };

    let team = report
        .team
        .iter()
        .map(|member| Assignment {
            name: member.name.clone(),
            email: member.email.clone(),
            role: member.role.clone(),
            start_date: member.start_date,
            end_date: member.end_date,
            note: member.note.clone(),
        })
        .collect();

    log::info!(
        "Built snapshot for report {} with {} findings and {} observations",
        report.id,
        findings.len(),
        report.observations.len()
    );

    ReportSnapshot {
        report: ReportInfo {
            id: report.id,
            title: report.title.clone(),
            generated_on: chrono::Local::now().date_naive(),
        },
        client,
        project,
        findings,
        observations,
        infrastructure,
        team,
        company: company.clone(),
    }
}

fn project_name(client: &ClientInfo, project_type: &str, start: Option<NaiveDate>) -> String {
    let mut parts = Vec::new();
    if let Some(date) = start {
        parts.push(date.format("%Y-%m-%d").to_string());
    }
    if !client.display_name().is_empty() {
        parts.push(client.display_name().to_string());
    }
    if !project_type.is_empty() {
        parts.push(project_type.to_string());
    }
    parts.join(" ")
}

fn finding_entry(finding: &ReportFinding, evidence_root: &Path) -> FindingEntry {
    let severity_name = finding
        .severity
        .as_ref()
        .map(|s| s.name.trim().to_string())
        .unwrap_or_default();
    let severity_weight = finding
        .severity
        .as_ref()
        .map(|s| s.weight)
        .filter(|weight| *weight > 0)
        .unwrap_or_else(|| default_weight(&severity_name));

    FindingEntry {
        id: finding.id,
        position: finding.position,
        title: finding.title.clone(),
        severity_color: severity::hex_or_default(&severity_name).to_string(),
        severity: severity_name,
        severity_weight,
        finding_type: finding.finding_type.clone().unwrap_or_default(),
        affected_entities: finding.affected_entities.clone(),
        description: finding.description.clone(),
        impact: finding.impact.clone(),
        recommendation: finding.mitigation.clone(),
        replication_steps: finding.replication_steps.clone(),
        host_detection: finding.host_detection_techniques.clone(),
        network_detection: finding.network_detection_techniques.clone(),
        references: finding.references.clone(),
        evidence: finding
            .evidence
            .iter()
            .map(|e| evidence_ref(e, evidence_root))
            .collect(),
    }
}

/// Weight implied by a severity name's place in the palette
fn default_weight(severity_name: &str) -> u32 {
    let position = severity::PALETTE
        .iter()
        .position(|(name, _)| name.eq_ignore_ascii_case(severity_name))
        .unwrap_or(severity::PALETTE.len());
    u32::try_from(position + 1).unwrap_or(u32::MAX)
}

fn evidence_ref(evidence: &Evidence, evidence_root: &Path) -> EvidenceRef {
    let document = Path::new(&evidence.document);
    let path = if document.is_absolute() {
        document.to_path_buf()
    } else {
        evidence_root.join(document)
    };

    EvidenceRef {
        id: evidence.id,
        friendly_name: evidence.friendly_name.clone(),
        document: evidence.document.clone(),
        path,
        caption: evidence.caption.clone(),
        description: evidence.description.clone(),
    }
}

/// Combine links that share a domain name into one entry
fn merge_domain_links(report: &Report) -> Vec<DomainServerEntry> {
    report
        .infrastructure
        .domain_server_links
        .iter()
        .filter(|link| !link.domain.trim().is_empty())
        .map(|link| (link.fqdn(), link))
        .sorted_by(|(a, _), (b, _)| a.cmp(b))
        .chunk_by(|(fqdn, _)| fqdn.clone())
        .into_iter()
        .map(|(domain, group)| {
            let links: Vec<_> = group.map(|(_, link)| link).collect();
            DomainServerEntry {
                domain,
                servers: distinct_non_empty(links.iter().map(|l| l.server_ip.as_str())),
                endpoints: distinct_non_empty(links.iter().map(|l| l.endpoint.as_str())),
            }
        })
        .collect()
}

fn distinct_non_empty<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .sorted()
        .dedup()
        .map(str::to_string)
        .collect()
}
