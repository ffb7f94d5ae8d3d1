//! Header-token table classification.
//!
//! Table identity and position are not fixed across documents, so each
//! table's semantic role is recognized from its header tokens alone,
//! checked in a fixed priority order to break ties when a table could
//! match more than one signature.

use crate::table::RawTable;

/// Semantic role a table plays in a report document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableRole {
    CostSummary,
    Readiness,
    UpgradeSummary,
    ProjectAllocation,
    FacilityOverload,
    GeneratorContribution,
    Unknown,
}

/// Classify a table purely from its flattened headers.
///
/// Priority order matters: a table carrying both "Project" and "RTEP ID"
/// headers is an upgrade summary when "Title" and "Allocated Cost" are both
/// present, and a project allocation when "MW Impact" and
/// "Percent Allocation" are. Anything matching no signature is Unknown and
/// skipped by the assembler.
pub fn classify(table: &RawTable) -> TableRole {
    let line = table.header_line();
    let lower = line.to_ascii_lowercase();

    if line.contains("RTEP ID") && line.contains("Title") && line.contains("Allocated Cost") {
        return TableRole::UpgradeSummary;
    }
    if line.contains("Project") && line.contains("MW Impact") && line.contains("Percent Allocation")
    {
        return TableRole::ProjectAllocation;
    }
    if line.contains("Facility") && line.contains("Loading") && line.contains("Rating") {
        return TableRole::FacilityOverload;
    }
    if lower.contains("bus") && lower.contains("mw contribution") {
        return TableRole::GeneratorContribution;
    }
    if line.contains("Cost Allocated") {
        return TableRole::CostSummary;
    }
    if table
        .headers
        .iter()
        .any(|h| h.contains("RD1") || h.contains("RD2") || h.contains("Received") || h.to_ascii_lowercase().contains("due"))
    {
        return TableRole::Readiness;
    }
    TableRole::Unknown
}

/// Classify with the positional fallback of last resort: the first table in
/// a document is assumed to be the cost summary and the second the
/// readiness table, but only when that slot's table carries no headers at
/// all — financial summary tables sometimes lack descriptive headers. A
/// table whose headers are present but unrecognized stays Unknown even in
/// slot 0/1. Returns the role and whether the fallback engaged.
pub fn classify_with_position(index: usize, table: &RawTable) -> (TableRole, bool) {
    match classify(table) {
        TableRole::Unknown if table.headers.is_empty() && index == 0 => {
            (TableRole::CostSummary, true)
        }
        TableRole::Unknown if table.headers.is_empty() && index == 1 => {
            (TableRole::Readiness, true)
        }
        role => (role, false),
    }
}
