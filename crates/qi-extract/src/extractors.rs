//! One extraction strategy per table role.
//!
//! Extractors map heterogeneous header text (synonyms, abbreviations) onto
//! the fixed target schema by substring match, in the same per-row
//! first-match order for every document.

use qi_core::{
    AllocationRecord, CostSummary, FacilityOverload, MwContribution, ReadinessDeposit,
    UpgradeRecord,
};

use crate::table::RawTable;
use crate::value::{
    parse_currency, parse_loading, parse_mw, parse_number, parse_percentage, split_rtep_composite,
};
use crate::ExtractError;

/// Scan the summary table's description cells against the category keyword
/// sets. Later rows matching a category overwrite earlier ones; summary
/// tables are expected to carry one row per category.
pub fn extract_cost_summary(table: &RawTable) -> Result<CostSummary, ExtractError> {
    let cost_col = match table
        .headers
        .iter()
        .position(|h| h.contains("Cost Allocated"))
    {
        Some(idx) => idx,
        // Headerless tables reach here via the positional fallback; the
        // cost figure sits in the trailing column.
        None if table.headers.is_empty() && !table.rows.is_empty() => table
            .rows
            .iter()
            .map(Vec::len)
            .max()
            .unwrap_or(0)
            .saturating_sub(1),
        None => return Err(ExtractError::MissingColumn("Cost Allocated")),
    };

    let mut out = CostSummary::default();
    for row in &table.rows {
        let desc = table.cell(row, 0);
        let cost = parse_currency(table.cell(row, cost_col));

        if desc.contains("Total") && !desc.contains("Grand") {
            out.total_cost = cost;
        } else if desc.contains("Transmission Owner Interconnection") || desc.contains("TOIF") {
            out.toif_cost = cost;
        } else if desc.contains("Stand Alone") {
            out.stand_alone_cost = cost;
        } else if desc.contains("Network Upgrade") && !desc.contains("System") {
            out.network_upgrade_cost = cost;
        } else if desc.contains("Steady State") || desc.contains("System Reliability") {
            out.system_reliability_cost = cost;
        }
    }
    Ok(out)
}

/// Deposits are single-valued per report: locate the columns by substring
/// and read the first data row only.
pub fn extract_readiness(table: &RawTable) -> ReadinessDeposit {
    let mut out = ReadinessDeposit::default();
    let Some(first) = table.rows.first() else {
        return out;
    };
    for (idx, header) in table.headers.iter().enumerate() {
        if header.contains("RD1") || header.contains("Received") {
            out.rd1_amount = parse_currency(table.cell(first, idx));
        } else if header.contains("RD2") || header.to_ascii_lowercase().contains("due") {
            out.rd2_amount = parse_currency(table.cell(first, idx));
        }
    }
    out
}

/// Upgrade summary rows; skips the "Grand Total" roll-up and rows carrying
/// neither an RTEP id nor a title.
pub fn extract_upgrade_summary(table: &RawTable) -> Vec<UpgradeRecord> {
    let mut out = Vec::new();
    for row in &table.rows {
        if table.cell(row, 0).contains("Grand Total") {
            continue;
        }

        let mut upgrade = UpgradeRecord::default();
        for (idx, header) in table.headers.iter().enumerate() {
            let val = table.cell(row, idx);
            let lower = header.to_ascii_lowercase();

            if lower.trim() == "to" {
                upgrade.utility = val.to_string();
            } else if lower.contains("rtep") {
                let (rtep_id, to_id) = split_rtep_composite(val);
                upgrade.rtep_id = rtep_id;
                upgrade.to_id = to_id;
            } else if lower.contains("title") || lower.contains("description") {
                upgrade.title = val.to_string();
            } else if lower.contains("allocated") && lower.contains("cost") {
                upgrade.allocated_cost = parse_currency(val);
            } else if lower.contains("total") && lower.contains("cost") {
                upgrade.total_cost = parse_currency(val);
            }
        }

        if !upgrade.rtep_id.is_empty() || !upgrade.title.is_empty() {
            out.push(upgrade);
        }
    }
    out
}

/// Per-upgrade project allocation rows. Zero-cost rows are dropped here;
/// those projects are still captured as tagged-no-cost links at load time
/// from the upgrade-summary side.
pub fn extract_allocations(table: &RawTable) -> Vec<AllocationRecord> {
    let mut out = Vec::new();
    for row in &table.rows {
        let mut link = AllocationRecord::default();
        for (idx, header) in table.headers.iter().enumerate() {
            let val = table.cell(row, idx);
            let lower = header.to_ascii_lowercase();

            if lower.contains("project") {
                link.project_id = val.to_string();
            } else if lower.contains("mw impact") {
                link.mw_impact = parse_mw(val);
            } else if lower.contains("percent") {
                link.percent_allocation = parse_percentage(val);
            } else if lower.contains("allocated") && lower.contains("cost") {
                link.allocated_cost = parse_currency(val);
            }
        }

        if !link.project_id.is_empty() && link.allocated_cost > 0.0 {
            out.push(link);
        }
    }
    out
}

/// Facility overload rows; a row without a facility name is noise.
pub fn extract_facility_overloads(table: &RawTable) -> Vec<FacilityOverload> {
    let mut out = Vec::new();
    for row in &table.rows {
        let mut overload = FacilityOverload::default();
        for (idx, header) in table.headers.iter().enumerate() {
            let val = table.cell(row, idx);
            let lower = header.to_ascii_lowercase();

            if lower.contains("facility") {
                overload.facility_name = val.to_string();
            } else if lower.contains("contingency") && lower.contains("name") {
                overload.contingency_name = val.to_string();
            } else if lower.contains("contingency") && lower.contains("type") {
                overload.contingency_type = val.to_string();
            } else if lower.contains("loading") {
                overload.loading_pct = parse_loading(val);
            } else if lower.contains("rating") {
                overload.rating_mva = parse_number(val);
            } else if lower.contains("mitigate") {
                overload.mva_to_mitigate = parse_number(val);
            }
        }

        if !overload.facility_name.is_empty() {
            out.push(overload);
        }
    }
    out
}

/// Generator bus names carry a `_GEN`/` GEN` suffix; stripping it yields
/// the project identifier.
fn project_id_from_bus(bus_name: &str) -> String {
    bus_name
        .replace("_GEN", "")
        .replace(" GEN", "")
        .trim()
        .to_string()
}

/// MW contribution rows. Kept only when the derived project id looks like
/// a project (contains the id separator) and the contribution is strictly
/// positive, which filters out pure transmission buses.
pub fn extract_contributions(table: &RawTable) -> Vec<MwContribution> {
    let mut out = Vec::new();
    for row in &table.rows {
        let mut contrib = MwContribution::default();
        for (idx, header) in table.headers.iter().enumerate() {
            let val = table.cell(row, idx);
            let lower = header.to_ascii_lowercase();

            if lower.contains("bus name") {
                contrib.project_id = project_id_from_bus(val);
            } else if lower.contains("mw contribution") {
                contrib.mw_contribution = parse_number(val);
            } else if lower.contains("type") {
                contrib.contribution_type = val.to_string();
            }
        }

        if contrib.project_id.contains('-') && contrib.mw_contribution > 0.0 {
            out.push(contrib);
        }
    }
    out
}
