//! Transactional risk recompute for one cluster.
//!
//! The snapshot read, the pure computation, and every write-back happen in
//! a single transaction: readers see either the fully-previous or the
//! fully-new score set, never a half-updated mix.

use std::collections::BTreeMap;

use qi_core::{LinkType, RiskWeights};
use qi_risk::{ClusterSnapshot, LinkState, ProjectState, RiskComputation, UpgradeKey};
use sqlx::{PgPool, Row};
use tracing::{info, warn};

use crate::StoreError;

pub async fn recompute_risk(
    pool: &PgPool,
    cluster_id: i64,
    weights: &RiskWeights,
) -> Result<RiskComputation, StoreError> {
    let mut tx = pool.begin().await?;

    let project_rows = sqlx::query(
        r#"
        SELECT project_id, capacity_mw, cost_per_kw
          FROM projects
         WHERE cluster_id = $1
        "#,
    )
    .bind(cluster_id)
    .fetch_all(&mut *tx)
    .await?;

    let mut projects: BTreeMap<String, ProjectState> = BTreeMap::new();
    for row in project_rows {
        let project_id: String = row.try_get("project_id")?;
        projects.insert(
            project_id.clone(),
            ProjectState {
                project_id,
                capacity_mw: row.try_get("capacity_mw")?,
                cost_per_kw: row.try_get("cost_per_kw")?,
                links: Vec::new(),
            },
        );
    }

    let link_rows = sqlx::query(
        r#"
        SELECT pu.project_id, u.rtep_id, u.to_id, pu.link_type, pu.allocated_cost
          FROM project_upgrades pu
          JOIN upgrades u ON u.id = pu.upgrade_id
         WHERE pu.cluster_id = $1
        "#,
    )
    .bind(cluster_id)
    .fetch_all(&mut *tx)
    .await?;

    for row in link_rows {
        let project_id: String = row.try_get("project_id")?;
        let raw_link_type: String = row.try_get("link_type")?;
        let Some(link_type) = LinkType::parse(&raw_link_type) else {
            warn!(cluster_id, %project_id, link_type = %raw_link_type, "skipping link with unknown type");
            continue;
        };
        if let Some(project) = projects.get_mut(&project_id) {
            project.links.push(LinkState {
                upgrade: UpgradeKey {
                    rtep_id: row.try_get("rtep_id")?,
                    to_id: row.try_get("to_id")?,
                },
                link_type,
                allocated_cost: row.try_get("allocated_cost")?,
            });
        }
    }

    let snapshot = ClusterSnapshot {
        projects: projects.into_values().collect(),
    };
    // Dropping the transaction on error rolls everything back.
    let computation = qi_risk::compute(&snapshot, weights)?;

    for (project_id, scores) in &computation.scores {
        sqlx::query(
            r#"
            UPDATE projects
               SET cost_rank = $1,
                   cost_percentile = $2,
                   risk_score_cost = $3,
                   risk_score_concentration = $4,
                   risk_score_dependency = $5,
                   risk_score_complexity = $6,
                   risk_score_overall = $7
             WHERE cluster_id = $8 AND project_id = $9
            "#,
        )
        .bind(scores.cost_rank)
        .bind(scores.cost_percentile)
        .bind(scores.score_cost)
        .bind(scores.score_concentration)
        .bind(scores.score_dependency)
        .bind(scores.score_complexity)
        .bind(scores.score_overall)
        .bind(cluster_id)
        .bind(project_id)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query("UPDATE upgrades SET shared_by_count = 0 WHERE cluster_id = $1")
        .bind(cluster_id)
        .execute(&mut *tx)
        .await?;
    for (key, count) in &computation.shared_by_count {
        sqlx::query(
            r#"
            UPDATE upgrades
               SET shared_by_count = $1
             WHERE cluster_id = $2 AND rtep_id = $3 AND to_id = $4
            "#,
        )
        .bind(count)
        .bind(cluster_id)
        .bind(&key.rtep_id)
        .bind(&key.to_id)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query(
        r#"
        UPDATE clusters
           SET total_projects = $1,
               total_mw = $2,
               updated_at = NOW()
         WHERE id = $3
        "#,
    )
    .bind(computation.total_projects)
    .bind(computation.total_mw)
    .bind(cluster_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    info!(
        cluster_id,
        projects = computation.total_projects,
        upgrades = computation.shared_by_count.len(),
        "risk recompute committed"
    );
    Ok(computation)
}
