//! Cluster-level summary surfaced after a load: aggregate figures plus a
//! risk-level distribution over the configured thresholds.

use qi_core::{RiskLevel, RiskThresholds};
use sqlx::{PgPool, Row};

use crate::StoreError;

#[derive(Debug, Clone)]
pub struct ClusterStats {
    pub cluster_id: i64,
    pub total_projects: i64,
    pub total_mw: f64,
    pub total_cost: f64,
    pub avg_cost_per_kw: Option<f64>,
    pub avg_risk: Option<f64>,
    pub distribution: Vec<(RiskLevel, i64)>,
}

pub async fn cluster_stats(
    pool: &PgPool,
    cluster_id: i64,
    thresholds: &RiskThresholds,
) -> Result<ClusterStats, StoreError> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS total_projects,
               COALESCE(SUM(capacity_mw), 0) AS total_mw,
               COALESCE(SUM(total_cost), 0) AS total_cost,
               AVG(cost_per_kw) AS avg_cost_per_kw,
               AVG(risk_score_overall) AS avg_risk
          FROM projects
         WHERE cluster_id = $1
        "#,
    )
    .bind(cluster_id)
    .fetch_one(pool)
    .await?;

    let score_rows = sqlx::query(
        r#"
        SELECT risk_score_overall
          FROM projects
         WHERE cluster_id = $1
        "#,
    )
    .bind(cluster_id)
    .fetch_all(pool)
    .await?;
    let scores: Vec<Option<f64>> = score_rows
        .iter()
        .map(|r| r.try_get("risk_score_overall"))
        .collect::<Result<_, _>>()?;

    Ok(ClusterStats {
        cluster_id,
        total_projects: row.try_get("total_projects")?,
        total_mw: row.try_get("total_mw")?,
        total_cost: row.try_get("total_cost")?,
        avg_cost_per_kw: row.try_get("avg_cost_per_kw")?,
        avg_risk: row.try_get("avg_risk")?,
        distribution: risk_distribution(&scores, thresholds),
    })
}

/// Count projects per risk level, in Low..Critical order, zeros included.
/// Unscored projects are left out of the distribution entirely.
pub fn risk_distribution(
    scores: &[Option<f64>],
    thresholds: &RiskThresholds,
) -> Vec<(RiskLevel, i64)> {
    let mut counts = [0i64; 4];
    for score in scores.iter().flatten() {
        let idx = match thresholds.classify(*score) {
            RiskLevel::Low => 0,
            RiskLevel::Medium => 1,
            RiskLevel::High => 2,
            RiskLevel::Critical => 3,
        };
        counts[idx] += 1;
    }
    vec![
        (RiskLevel::Low, counts[0]),
        (RiskLevel::Medium, counts[1]),
        (RiskLevel::High, counts[2]),
        (RiskLevel::Critical, counts[3]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distribution_buckets_follow_thresholds() {
        let thresholds = RiskThresholds::default();
        let scores = vec![
            Some(10.0),
            Some(24.9),
            Some(25.0),
            Some(60.0),
            Some(75.0),
            Some(99.0),
            None,
        ];
        let distribution = risk_distribution(&scores, &thresholds);
        assert_eq!(
            distribution,
            vec![
                (RiskLevel::Low, 2),
                (RiskLevel::Medium, 1),
                (RiskLevel::High, 1),
                (RiskLevel::Critical, 2),
            ]
        );
    }
}
