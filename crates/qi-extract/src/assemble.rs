//! Per-document orchestration: classify every table, dispatch to the
//! matching extractor, and accumulate records plus non-fatal errors into
//! one aggregate.

use chrono::{DateTime, Utc};
use qi_core::{ReportRef, ScrapedReport};
use tracing::{debug, warn};

use crate::classify::{classify_with_position, TableRole};
use crate::extractors;
use crate::table::parse_tables;

/// Extract everything a report document carries.
///
/// One malformed table appends one error string and never blocks the
/// remaining tables; Unknown tables (decorative, navigational) are skipped
/// silently.
pub fn assemble_report(
    html: &str,
    reference: &ReportRef,
    scraped_at: DateTime<Utc>,
) -> ScrapedReport {
    let mut report = ScrapedReport::empty(reference, scraped_at);
    let tables = parse_tables(html);
    debug!(
        project_id = %reference.project_id,
        tables = tables.len(),
        "parsed report tables"
    );

    let mut facility_seen = false;
    for (index, table) in tables.iter().enumerate() {
        let (role, positional) = classify_with_position(index, table);
        if positional {
            warn!(
                project_id = %reference.project_id,
                index,
                role = ?role,
                "table classified by position; headers were inconclusive"
            );
        }

        match role {
            TableRole::CostSummary => match extractors::extract_cost_summary(table) {
                Ok(summary) => report.cost_summary = summary,
                Err(e) => report
                    .errors
                    .push(format!("cost summary extraction error: {e}")),
            },
            TableRole::Readiness => {
                report.readiness = extractors::extract_readiness(table);
            }
            TableRole::UpgradeSummary => {
                report
                    .upgrades
                    .extend(extractors::extract_upgrade_summary(table));
            }
            TableRole::ProjectAllocation => {
                report
                    .allocations
                    .extend(extractors::extract_allocations(table));
            }
            TableRole::FacilityOverload => {
                // Subsequent facility tables are continuations or
                // duplicates of the first; only the first is processed.
                if !facility_seen {
                    report.facility_overloads = extractors::extract_facility_overloads(table);
                    facility_seen = true;
                }
            }
            TableRole::GeneratorContribution => {
                report
                    .mw_contributions
                    .extend(extractors::extract_contributions(table));
            }
            TableRole::Unknown => {}
        }
    }

    report
}
