//! Risk derivation over an in-memory snapshot of one cluster's projects.
//!
//! Five passes, each recomputing its fields from scratch so the whole
//! computation is idempotent: cost percentile rank, concentration,
//! co-dependency, complexity, and the weighted overall score, followed by
//! the upgrade and cluster roll-ups. The engine is pure; the store applies
//! the returned computation in a single transaction.

use std::collections::{BTreeMap, HashMap, HashSet};

use qi_core::{ConfigError, LinkType, RiskWeights};
use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "qi-risk";

/// Natural key of an upgrade within its cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UpgradeKey {
    pub rtep_id: String,
    pub to_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkState {
    pub upgrade: UpgradeKey,
    pub link_type: LinkType,
    pub allocated_cost: Option<f64>,
}

/// One project's ranking-relevant state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectState {
    pub project_id: String,
    pub capacity_mw: Option<f64>,
    pub cost_per_kw: Option<f64>,
    pub links: Vec<LinkState>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub projects: Vec<ProjectState>,
}

/// Derived scores for one project. Rank and percentile stay None for
/// projects excluded from the ranking population; component scores default
/// to 0 and count as 0 in the weighted overall.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RiskScores {
    pub cost_rank: Option<i64>,
    pub cost_percentile: Option<f64>,
    pub score_cost: f64,
    pub score_concentration: f64,
    pub score_dependency: f64,
    pub score_complexity: f64,
    pub score_overall: f64,
}

/// Full recompute result for one cluster, applied as a unit.
///
/// Rank ordering: ascending cost-per-kW maps to ascending rank, so rank 1
/// is the cheapest ranked project and percentile 100 the most expensive.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RiskComputation {
    pub scores: BTreeMap<String, RiskScores>,
    pub shared_by_count: BTreeMap<UpgradeKey, i64>,
    pub total_projects: i64,
    pub total_mw: f64,
}

pub fn compute(
    snapshot: &ClusterSnapshot,
    weights: &RiskWeights,
) -> Result<RiskComputation, ConfigError> {
    weights.validate()?;

    let mut scores: BTreeMap<String, RiskScores> = snapshot
        .projects
        .iter()
        .map(|p| (p.project_id.clone(), RiskScores::default()))
        .collect();

    apply_cost_percentiles(snapshot, &mut scores);
    apply_concentration(snapshot, &mut scores);
    let allocated_members = cost_allocated_membership(snapshot);
    apply_dependency(snapshot, &allocated_members, &mut scores);
    apply_complexity(snapshot, &mut scores);

    for entry in scores.values_mut() {
        entry.score_overall = entry.score_cost * weights.cost
            + entry.score_concentration * weights.concentration
            + entry.score_dependency * weights.dependency
            + entry.score_complexity * weights.complexity;
    }

    let shared_by_count = allocated_members
        .iter()
        .map(|(key, members)| (key.clone(), members.len() as i64))
        .collect();

    Ok(RiskComputation {
        scores,
        shared_by_count,
        total_projects: snapshot.projects.len() as i64,
        total_mw: snapshot
            .projects
            .iter()
            .filter_map(|p| p.capacity_mw)
            .sum(),
    })
}

/// Percent-rank over the ascending cost-per-kW window. Only projects with
/// a defined, strictly positive cost-per-kW enter the population; the rest
/// keep None rather than a floor value. Ties share the minimum rank.
fn apply_cost_percentiles(snapshot: &ClusterSnapshot, scores: &mut BTreeMap<String, RiskScores>) {
    let mut ranked: Vec<(&str, f64)> = snapshot
        .projects
        .iter()
        .filter_map(|p| match p.cost_per_kw {
            Some(cpk) if cpk > 0.0 => Some((p.project_id.as_str(), cpk)),
            _ => None,
        })
        .collect();
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));

    let n = ranked.len();
    for (idx, (project_id, cpk)) in ranked.iter().enumerate() {
        // Ties share the rank of the first equal value.
        let rank = 1 + ranked[..idx].iter().filter(|(_, c)| c < cpk).count() as i64;
        let percentile = if n > 1 {
            (rank - 1) as f64 / (n - 1) as f64 * 100.0
        } else {
            0.0
        };
        if let Some(entry) = scores.get_mut(*project_id) {
            entry.cost_rank = Some(rank);
            entry.cost_percentile = Some(percentile);
            entry.score_cost = percentile;
        }
    }
}

/// Share of a project's allocated cost carried by its single largest
/// upgrade, as a percentage. Zero when the project has no cost-allocated
/// links or their sum is zero.
fn apply_concentration(snapshot: &ClusterSnapshot, scores: &mut BTreeMap<String, RiskScores>) {
    for project in &snapshot.projects {
        let costs: Vec<f64> = project
            .links
            .iter()
            .filter(|l| l.link_type == LinkType::CostAllocated)
            .map(|l| l.allocated_cost.unwrap_or(0.0))
            .collect();
        let sum: f64 = costs.iter().sum();
        if sum > 0.0 {
            let max = costs.iter().copied().fold(f64::MIN, f64::max);
            if let Some(entry) = scores.get_mut(&project.project_id) {
                entry.score_concentration = max / sum * 100.0;
            }
        }
    }
}

fn cost_allocated_membership(snapshot: &ClusterSnapshot) -> BTreeMap<UpgradeKey, HashSet<String>> {
    let mut members: BTreeMap<UpgradeKey, HashSet<String>> = BTreeMap::new();
    for project in &snapshot.projects {
        for link in &project.links {
            if link.link_type == LinkType::CostAllocated {
                members
                    .entry(link.upgrade.clone())
                    .or_default()
                    .insert(project.project_id.clone());
            }
        }
    }
    members
}

/// Distinct other projects sharing at least one cost-allocated upgrade,
/// normalized by the cluster-wide maximum to 0-100.
fn apply_dependency(
    snapshot: &ClusterSnapshot,
    members: &BTreeMap<UpgradeKey, HashSet<String>>,
    scores: &mut BTreeMap<String, RiskScores>,
) {
    let mut codependents: HashMap<&str, HashSet<&str>> = HashMap::new();
    for project in &snapshot.projects {
        let entry = codependents.entry(project.project_id.as_str()).or_default();
        for link in &project.links {
            if link.link_type != LinkType::CostAllocated {
                continue;
            }
            if let Some(sharing) = members.get(&link.upgrade) {
                for other in sharing {
                    if other != &project.project_id {
                        entry.insert(other.as_str());
                    }
                }
            }
        }
    }

    let max_count = codependents.values().map(HashSet::len).max().unwrap_or(0);
    if max_count == 0 {
        return;
    }
    for (project_id, others) in codependents {
        if let Some(entry) = scores.get_mut(project_id) {
            entry.score_dependency = others.len() as f64 / max_count as f64 * 100.0;
        }
    }
}

/// Total upgrade links of either type, normalized by the cluster-wide
/// maximum to 0-100.
fn apply_complexity(snapshot: &ClusterSnapshot, scores: &mut BTreeMap<String, RiskScores>) {
    let max_links = snapshot
        .projects
        .iter()
        .map(|p| p.links.len())
        .max()
        .unwrap_or(0);
    if max_links == 0 {
        return;
    }
    for project in &snapshot.projects {
        if let Some(entry) = scores.get_mut(&project.project_id) {
            entry.score_complexity = project.links.len() as f64 / max_links as f64 * 100.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(rtep: &str) -> UpgradeKey {
        UpgradeKey {
            rtep_id: rtep.to_string(),
            to_id: "UTIL-A".to_string(),
        }
    }

    fn link(rtep: &str, allocated: f64) -> LinkState {
        LinkState {
            upgrade: key(rtep),
            link_type: LinkType::from_allocated_cost(allocated),
            allocated_cost: Some(allocated),
        }
    }

    fn project(id: &str, cost_per_kw: Option<f64>, links: Vec<LinkState>) -> ProjectState {
        ProjectState {
            project_id: id.to_string(),
            capacity_mw: Some(50.0),
            cost_per_kw,
            links,
        }
    }

    fn compute_default(projects: Vec<ProjectState>) -> RiskComputation {
        compute(&ClusterSnapshot { projects }, &RiskWeights::default()).unwrap()
    }

    #[test]
    fn percentile_is_monotonic_in_cost() {
        let result = compute_default(vec![
            project("P-1", Some(100.0), vec![]),
            project("P-2", Some(200.0), vec![]),
            project("P-3", Some(300.0), vec![]),
            project("P-4", Some(400.0), vec![]),
        ]);
        let ranks: Vec<i64> = ["P-1", "P-2", "P-3", "P-4"]
            .iter()
            .map(|id| result.scores[*id].cost_rank.unwrap())
            .collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);

        let percentiles: Vec<f64> = ["P-1", "P-2", "P-3", "P-4"]
            .iter()
            .map(|id| result.scores[*id].cost_percentile.unwrap())
            .collect();
        assert!(percentiles.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(percentiles[0], 0.0);
        assert_eq!(percentiles[3], 100.0);
    }

    #[test]
    fn ties_share_the_minimum_rank() {
        let result = compute_default(vec![
            project("P-1", Some(100.0), vec![]),
            project("P-2", Some(100.0), vec![]),
            project("P-3", Some(300.0), vec![]),
        ]);
        assert_eq!(result.scores["P-1"].cost_rank, Some(1));
        assert_eq!(result.scores["P-2"].cost_rank, Some(1));
        assert_eq!(result.scores["P-3"].cost_rank, Some(3));
        assert_eq!(result.scores["P-3"].cost_percentile, Some(100.0));
    }

    #[test]
    fn undefined_cost_is_excluded_not_floored() {
        let result = compute_default(vec![
            project("P-1", Some(150.0), vec![]),
            project("P-2", None, vec![]),
            project("P-3", Some(0.0), vec![]),
        ]);
        assert_eq!(result.scores["P-2"].cost_rank, None);
        assert_eq!(result.scores["P-2"].cost_percentile, None);
        assert_eq!(result.scores["P-3"].cost_percentile, None);
        // Population of one: percentile 0, rank 1.
        assert_eq!(result.scores["P-1"].cost_rank, Some(1));
        assert_eq!(result.scores["P-1"].cost_percentile, Some(0.0));
    }

    #[test]
    fn concentration_is_100_for_a_single_link_and_bounded() {
        let result = compute_default(vec![
            project("P-1", None, vec![link("U-1", 5_000_000.0)]),
            project(
                "P-2",
                None,
                vec![link("U-1", 1_000_000.0), link("U-2", 3_000_000.0)],
            ),
            project("P-3", None, vec![link("U-3", 0.0)]),
        ]);
        assert_eq!(result.scores["P-1"].score_concentration, 100.0);
        assert_eq!(result.scores["P-2"].score_concentration, 75.0);
        // No cost-allocated links at all: stays at 0.
        assert_eq!(result.scores["P-3"].score_concentration, 0.0);
        for s in result.scores.values() {
            assert!((0.0..=100.0).contains(&s.score_concentration));
        }
    }

    #[test]
    fn dependency_scales_to_the_most_entangled_project() {
        // P-1 shares U-1 with P-2 and P-3; P-2 and P-3 each share only U-1.
        let result = compute_default(vec![
            project("P-1", None, vec![link("U-1", 1.0), link("U-2", 1.0)]),
            project("P-2", None, vec![link("U-1", 1.0)]),
            project("P-3", None, vec![link("U-1", 1.0)]),
            project("P-4", None, vec![link("U-9", 1.0)]),
        ]);
        assert_eq!(result.scores["P-1"].score_dependency, 100.0);
        assert_eq!(result.scores["P-2"].score_dependency, 100.0);
        assert_eq!(result.scores["P-3"].score_dependency, 100.0);
        assert_eq!(result.scores["P-4"].score_dependency, 0.0);
    }

    #[test]
    fn tagged_no_cost_links_count_for_complexity_but_not_dependency() {
        let result = compute_default(vec![
            project(
                "P-1",
                None,
                vec![link("U-1", 0.0), link("U-2", 0.0), link("U-3", 0.0), link("U-4", 0.0)],
            ),
            project("P-2", None, vec![link("U-1", 0.0)]),
        ]);
        assert_eq!(result.scores["P-1"].score_complexity, 100.0);
        assert_eq!(result.scores["P-2"].score_complexity, 25.0);
        assert_eq!(result.scores["P-1"].score_dependency, 0.0);
    }

    #[test]
    fn overall_stays_within_bounds_for_any_valid_weights() {
        let weights = RiskWeights {
            cost: 0.1,
            concentration: 0.4,
            dependency: 0.4,
            complexity: 0.1,
        };
        let snapshot = ClusterSnapshot {
            projects: vec![
                project("P-1", Some(900.0), vec![link("U-1", 2_000_000.0)]),
                project("P-2", Some(100.0), vec![link("U-1", 500_000.0), link("U-2", 500_000.0)]),
            ],
        };
        let result = compute(&snapshot, &weights).unwrap();
        for s in result.scores.values() {
            assert!((0.0..=100.0).contains(&s.score_overall));
        }
    }

    #[test]
    fn invalid_weights_fail_the_whole_computation() {
        let weights = RiskWeights {
            cost: 0.9,
            concentration: 0.9,
            dependency: 0.0,
            complexity: 0.0,
        };
        assert!(compute(&ClusterSnapshot::default(), &weights).is_err());
    }

    #[test]
    fn rollups_count_projects_mw_and_sharers() {
        let mut p1 = project("P-1", None, vec![link("U-1", 1.0)]);
        p1.capacity_mw = Some(120.0);
        let mut p2 = project("P-2", None, vec![link("U-1", 2.0), link("U-2", 0.0)]);
        p2.capacity_mw = None;

        let result = compute_default(vec![p1, p2]);
        assert_eq!(result.total_projects, 2);
        assert_eq!(result.total_mw, 120.0);
        assert_eq!(result.shared_by_count[&key("U-1")], 2);
        // Tagged-no-cost links do not count toward shared_by_count.
        assert!(!result.shared_by_count.contains_key(&key("U-2")));
    }

    #[test]
    fn recompute_is_idempotent() {
        let projects = vec![
            project("P-1", Some(250.0), vec![link("U-1", 3_000_000.0)]),
            project("P-2", Some(125.0), vec![link("U-1", 1_000_000.0), link("U-2", 0.0)]),
        ];
        let snapshot = ClusterSnapshot { projects };
        let first = compute(&snapshot, &RiskWeights::default()).unwrap();
        let second = compute(&snapshot, &RiskWeights::default()).unwrap();
        assert_eq!(first, second);
    }
}
