//! Severity colours shared by every exporter

/// Fill colour used when a severity name is not in the palette
pub const UNKNOWN_SEVERITY_HEX: &str = "FFFFFF";

/// Text colour used when a severity name is not in the palette
pub const UNKNOWN_SEVERITY_TEXT_HEX: &str = "404040";

/// Severity name and its colour, most severe first
pub const PALETTE: &[(&str, &str)] = &[
    ("Critical", "966FD6"),
    ("High", "ff7e79"),
    ("Medium", "f4b083"),
    ("Low", "a8d08d"),
    ("Informational", "8eaadb"),
];

/// Hex colour (without `#`) for a severity name, matched case-insensitively
pub fn palette(severity: &str) -> Option<&'static str> {
    let name = severity.trim();
    PALETTE
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(name))
        .map(|(_, hex)| *hex)
}

/// Hex colour for a severity, falling back to white
pub fn hex_or_default(severity: &str) -> &'static str {
    palette(severity).unwrap_or_else(|| {
        log::debug!("No palette colour for severity '{}'", severity);
        UNKNOWN_SEVERITY_HEX
    })
}

/// Hex colour for severity text, falling back to dark grey
pub fn text_hex(severity: &str) -> &'static str {
    palette(severity).unwrap_or(UNKNOWN_SEVERITY_TEXT_HEX)
}

/// Severity names in display order with the number of findings for each
///
/// Severities outside the palette are appended after the known ones.
pub fn count_by_severity<'a>(severities: impl IntoIterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = PALETTE
        .iter()
        .map(|(name, _)| (name.to_string(), 0))
        .collect();

    for severity in severities {
        match counts
            .iter_mut()
            .find(|(name, _)| name.eq_ignore_ascii_case(severity.trim()))
        {
            Some((_, count)) => *count += 1,
            None => counts.push((severity.trim().to_string(), 1)),
        }
    }
    counts
}
