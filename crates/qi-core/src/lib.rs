//! Core domain model for the interconnection study pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CRATE_NAME: &str = "qi-core";

/// Cost breakdown from a report's financial summary table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct CostSummary {
    pub total_cost: f64,
    pub toif_cost: f64,
    pub stand_alone_cost: f64,
    pub network_upgrade_cost: f64,
    pub system_reliability_cost: f64,
}

/// Readiness deposit amounts. Single-valued per report, not per-row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ReadinessDeposit {
    pub rd1_amount: f64,
    pub rd2_amount: f64,
}

/// One shared network upgrade as printed in an upgrade summary table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct UpgradeRecord {
    pub rtep_id: String,
    pub to_id: String,
    pub utility: String,
    pub title: String,
    pub total_cost: f64,
    pub allocated_cost: f64,
}

/// One project's share of an upgrade, from a per-upgrade allocation table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AllocationRecord {
    pub project_id: String,
    pub mw_impact: f64,
    pub percent_allocation: f64,
    pub allocated_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FacilityOverload {
    pub facility_name: String,
    pub contingency_name: String,
    pub contingency_type: String,
    pub loading_pct: f64,
    pub rating_mva: f64,
    pub mva_to_mitigate: f64,
}

/// A generator bus's MW contribution to a facility overload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MwContribution {
    pub project_id: String,
    pub contribution_type: String,
    pub mw_contribution: f64,
}

/// Operator-maintained metadata carried alongside each manifest row.
/// Merged onto the project record at load time, never extracted from the
/// report document itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProjectSidecar {
    pub developer: String,
    pub utility: String,
    pub state: String,
    pub county: String,
    pub fuel_type: String,
    pub capacity_mw: Option<f64>,
    pub energy_mw: Option<f64>,
    pub status: String,
}

/// Identity of one report document within a study cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRef {
    pub project_id: String,
    pub cluster: String,
    pub phase: String,
    pub report_url: String,
}

/// Everything extracted from one report document, plus the non-fatal
/// extraction errors collected along the way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedReport {
    pub project_id: String,
    pub cluster: String,
    pub phase: String,
    pub report_url: String,
    pub scraped_at: DateTime<Utc>,
    pub cost_summary: CostSummary,
    pub readiness: ReadinessDeposit,
    pub upgrades: Vec<UpgradeRecord>,
    pub allocations: Vec<AllocationRecord>,
    pub facility_overloads: Vec<FacilityOverload>,
    pub mw_contributions: Vec<MwContribution>,
    #[serde(default)]
    pub sidecar: Option<ProjectSidecar>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ScrapedReport {
    pub fn empty(reference: &ReportRef, scraped_at: DateTime<Utc>) -> Self {
        Self {
            project_id: reference.project_id.clone(),
            cluster: reference.cluster.clone(),
            phase: reference.phase.clone(),
            report_url: reference.report_url.clone(),
            scraped_at,
            cost_summary: CostSummary::default(),
            readiness: ReadinessDeposit::default(),
            upgrades: Vec::new(),
            allocations: Vec::new(),
            facility_overloads: Vec::new(),
            mw_contributions: Vec::new(),
            sidecar: None,
            errors: Vec::new(),
        }
    }
}

/// How a project relates to a shared upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkType {
    CostAllocated,
    TaggedNoCost,
}

impl LinkType {
    /// A link is cost-allocated only when the allocated cost is strictly
    /// positive. Zero or negative means the project is tagged without a
    /// charge.
    pub fn from_allocated_cost(allocated_cost: f64) -> Self {
        if allocated_cost > 0.0 {
            LinkType::CostAllocated
        } else {
            LinkType::TaggedNoCost
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LinkType::CostAllocated => "COST_ALLOCATED",
            LinkType::TaggedNoCost => "TAGGED_NO_COST",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "COST_ALLOCATED" => Some(LinkType::CostAllocated),
            "TAGGED_NO_COST" => Some(LinkType::TaggedNoCost),
            _ => None,
        }
    }
}

/// Total cost divided by capacity in kW, the cross-project comparability
/// metric. None when capacity is unknown or zero.
pub fn cost_per_kw(total_cost: f64, capacity_mw: Option<f64>) -> Option<f64> {
    match capacity_mw {
        Some(mw) if mw > 0.0 => Some(total_cost / (mw * 1000.0)),
        _ => None,
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("risk weights must each be within [0, 1], got {0:?}")]
    WeightRange(RiskWeights),
    #[error("risk weights must sum to 1.0, got {0}")]
    WeightSum(f64),
}

/// Weight vector combining the four component risk scores into the overall
/// score. External configuration input; must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskWeights {
    pub cost: f64,
    pub concentration: f64,
    pub dependency: f64,
    pub complexity: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            cost: 0.35,
            concentration: 0.25,
            dependency: 0.25,
            complexity: 0.15,
        }
    }
}

impl RiskWeights {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let components = [self.cost, self.concentration, self.dependency, self.complexity];
        if components.iter().any(|w| !(0.0..=1.0).contains(w)) {
            return Err(ConfigError::WeightRange(*self));
        }
        let sum: f64 = components.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(ConfigError::WeightSum(sum));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
            RiskLevel::Critical => "Critical",
        }
    }
}

/// Cut points between risk levels on the 0-100 overall scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            low: 25.0,
            medium: 50.0,
            high: 75.0,
        }
    }
}

impl RiskThresholds {
    pub fn classify(&self, overall: f64) -> RiskLevel {
        if overall < self.low {
            RiskLevel::Low
        } else if overall < self.medium {
            RiskLevel::Medium
        } else if overall < self.high {
            RiskLevel::High
        } else {
            RiskLevel::Critical
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_type_requires_strictly_positive_cost() {
        assert_eq!(LinkType::from_allocated_cost(0.0), LinkType::TaggedNoCost);
        assert_eq!(LinkType::from_allocated_cost(-5.0), LinkType::TaggedNoCost);
        assert_eq!(LinkType::from_allocated_cost(1.0), LinkType::CostAllocated);
        assert_eq!(
            LinkType::from_allocated_cost(5_000_000.0),
            LinkType::CostAllocated
        );
    }

    #[test]
    fn link_type_round_trips_through_db_strings() {
        for lt in [LinkType::CostAllocated, LinkType::TaggedNoCost] {
            assert_eq!(LinkType::parse(lt.as_str()), Some(lt));
        }
        assert_eq!(LinkType::parse("SOMETHING_ELSE"), None);
    }

    #[test]
    fn cost_per_kw_is_undefined_without_capacity() {
        assert_eq!(cost_per_kw(10_000_000.0, None), None);
        assert_eq!(cost_per_kw(10_000_000.0, Some(0.0)), None);
        assert_eq!(cost_per_kw(10_000_000.0, Some(50.0)), Some(200.0));
    }

    #[test]
    fn default_weights_validate() {
        RiskWeights::default().validate().expect("defaults valid");
    }

    #[test]
    fn unbalanced_weights_are_rejected() {
        let weights = RiskWeights {
            cost: 0.5,
            concentration: 0.5,
            dependency: 0.5,
            complexity: 0.5,
        };
        assert!(matches!(weights.validate(), Err(ConfigError::WeightSum(_))));

        let weights = RiskWeights {
            cost: 1.5,
            concentration: -0.5,
            dependency: 0.0,
            complexity: 0.0,
        };
        assert!(matches!(weights.validate(), Err(ConfigError::WeightRange(_))));
    }

    #[test]
    fn thresholds_partition_the_scale() {
        let t = RiskThresholds::default();
        assert_eq!(t.classify(0.0), RiskLevel::Low);
        assert_eq!(t.classify(24.9), RiskLevel::Low);
        assert_eq!(t.classify(25.0), RiskLevel::Medium);
        assert_eq!(t.classify(60.0), RiskLevel::High);
        assert_eq!(t.classify(75.0), RiskLevel::Critical);
        assert_eq!(t.classify(100.0), RiskLevel::Critical);
    }
}
