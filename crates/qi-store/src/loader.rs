//! Upsert loading of scraped aggregates into the relational model.
//!
//! Re-runnable by construction: projects upsert on (project_id, cluster_id)
//! overwriting scalar fields, upgrades reconcile total_cost by taking the
//! larger figure, links upsert on (project_id, upgrade_id). Link type is
//! derived from allocated cost at load time, not at extraction time.

use qi_core::{cost_per_kw, LinkType, ProjectSidecar, ScrapedReport};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{error, info};

use crate::{ClusterLocks, StoreError};

#[derive(Debug, Clone)]
pub struct LoadedCluster {
    pub cluster_id: i64,
    pub cluster: String,
    pub phase: String,
}

/// Per-batch accounting surfaced to the operator: counts first, individual
/// error strings retained for diagnosis.
#[derive(Debug, Clone, Default)]
pub struct BatchLoadSummary {
    pub loaded: usize,
    pub failed: usize,
    pub errors: Vec<(String, String)>,
    pub clusters: Vec<LoadedCluster>,
}

pub async fn ensure_cluster(pool: &PgPool, cluster: &str, phase: &str) -> Result<i64, StoreError> {
    let row = sqlx::query(
        r#"
        INSERT INTO clusters (cluster_name, phase)
        VALUES ($1, $2)
        ON CONFLICT (cluster_name, phase) DO UPDATE
           SET cluster_name = EXCLUDED.cluster_name
        RETURNING id
        "#,
    )
    .bind(cluster)
    .bind(phase)
    .fetch_one(pool)
    .await?;
    Ok(row.try_get("id")?)
}

/// Look up an existing cluster without creating one; standalone risk
/// recomputes must not invent clusters.
pub async fn find_cluster(
    pool: &PgPool,
    cluster: &str,
    phase: &str,
) -> Result<Option<i64>, StoreError> {
    let row = sqlx::query("SELECT id FROM clusters WHERE cluster_name = $1 AND phase = $2")
        .bind(cluster)
        .bind(phase)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| r.try_get("id")).transpose()?)
}

/// Merge a batch of aggregates. Writers targeting the same cluster are
/// serialized through `locks`; a failure loading one project is recorded
/// against its id and the rest of the batch continues.
pub async fn load_batch(
    pool: &PgPool,
    locks: &ClusterLocks,
    reports: &[ScrapedReport],
) -> Result<BatchLoadSummary, StoreError> {
    let mut summary = BatchLoadSummary::default();

    for ((cluster, phase), members) in group_by_cluster(reports) {
        let _guard = locks.acquire(&cluster, &phase).await;
        let cluster_id = ensure_cluster(pool, &cluster, &phase).await?;

        for report in members {
            let mut tx = pool.begin().await?;
            match load_report(&mut tx, cluster_id, report).await {
                Ok(()) => match tx.commit().await {
                    Ok(()) => summary.loaded += 1,
                    Err(err) => record_failure(&mut summary, report, err),
                },
                Err(err) => {
                    let _ = tx.rollback().await;
                    record_failure(&mut summary, report, err);
                }
            }
        }

        summary.clusters.push(LoadedCluster {
            cluster_id,
            cluster,
            phase,
        });
    }

    info!(
        loaded = summary.loaded,
        failed = summary.failed,
        clusters = summary.clusters.len(),
        "load batch complete"
    );
    Ok(summary)
}

fn record_failure(summary: &mut BatchLoadSummary, report: &ScrapedReport, err: sqlx::Error) {
    error!(project_id = %report.project_id, error = %err, "project load failed");
    summary.failed += 1;
    summary.errors.push((report.project_id.clone(), err.to_string()));
}

/// Group reports by (cluster, phase), preserving first-seen order of both
/// groups and members.
fn group_by_cluster(reports: &[ScrapedReport]) -> Vec<((String, String), Vec<&ScrapedReport>)> {
    let mut groups: Vec<((String, String), Vec<&ScrapedReport>)> = Vec::new();
    for report in reports {
        let key = (report.cluster.clone(), report.phase.clone());
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(report),
            None => groups.push((key, vec![report])),
        }
    }
    groups
}

async fn load_report(
    tx: &mut Transaction<'_, Postgres>,
    cluster_id: i64,
    report: &ScrapedReport,
) -> Result<(), sqlx::Error> {
    let sidecar = report.sidecar.clone().unwrap_or_default();
    upsert_project(tx, cluster_id, report, &sidecar).await?;
    upsert_upgrades_and_links(tx, cluster_id, report).await?;
    Ok(())
}

async fn upsert_project(
    tx: &mut Transaction<'_, Postgres>,
    cluster_id: i64,
    report: &ScrapedReport,
    sidecar: &ProjectSidecar,
) -> Result<(), sqlx::Error> {
    let capacity_mw = sidecar.capacity_mw.filter(|mw| *mw > 0.0);
    let cost = &report.cost_summary;
    let total_cost = (cost.total_cost > 0.0).then_some(cost.total_cost);
    let per_kw = cost_per_kw(cost.total_cost, capacity_mw);

    sqlx::query(
        r#"
        INSERT INTO projects (
            project_id, cluster_id, utility, developer, state, county,
            fuel_type, capacity_mw, energy_mw, project_status,
            total_cost, cost_per_kw, toif_cost, stand_alone_cost,
            network_upgrade_cost, system_reliability_cost,
            rd1_amount, rd2_amount, report_url, scraped_at
        ) VALUES (
            $1, $2, $3, $4, $5, $6,
            $7, $8, $9, $10,
            $11, $12, $13, $14,
            $15, $16,
            $17, $18, $19, $20
        )
        ON CONFLICT (project_id, cluster_id) DO UPDATE SET
            utility = EXCLUDED.utility,
            developer = EXCLUDED.developer,
            state = EXCLUDED.state,
            county = EXCLUDED.county,
            fuel_type = EXCLUDED.fuel_type,
            capacity_mw = EXCLUDED.capacity_mw,
            energy_mw = EXCLUDED.energy_mw,
            project_status = EXCLUDED.project_status,
            total_cost = EXCLUDED.total_cost,
            cost_per_kw = EXCLUDED.cost_per_kw,
            toif_cost = EXCLUDED.toif_cost,
            stand_alone_cost = EXCLUDED.stand_alone_cost,
            network_upgrade_cost = EXCLUDED.network_upgrade_cost,
            system_reliability_cost = EXCLUDED.system_reliability_cost,
            rd1_amount = EXCLUDED.rd1_amount,
            rd2_amount = EXCLUDED.rd2_amount,
            report_url = EXCLUDED.report_url,
            scraped_at = EXCLUDED.scraped_at
        "#,
    )
    .bind(&report.project_id)
    .bind(cluster_id)
    .bind(&sidecar.utility)
    .bind(&sidecar.developer)
    .bind(&sidecar.state)
    .bind(&sidecar.county)
    .bind(&sidecar.fuel_type)
    .bind(capacity_mw)
    .bind(sidecar.energy_mw)
    .bind(&sidecar.status)
    .bind(total_cost)
    .bind(per_kw)
    .bind(cost.toif_cost)
    .bind(cost.stand_alone_cost)
    .bind(cost.network_upgrade_cost)
    .bind(cost.system_reliability_cost)
    .bind(report.readiness.rd1_amount)
    .bind(report.readiness.rd2_amount)
    .bind(&report.report_url)
    .bind(report.scraped_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn upsert_upgrades_and_links(
    tx: &mut Transaction<'_, Postgres>,
    cluster_id: i64,
    report: &ScrapedReport,
) -> Result<(), sqlx::Error> {
    for upgrade in &report.upgrades {
        // Later reports may carry the full cost figure where earlier ones
        // showed a partial one; the stored total never decreases.
        let row = sqlx::query(
            r#"
            INSERT INTO upgrades (cluster_id, rtep_id, to_id, utility, title, total_cost)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (cluster_id, rtep_id, to_id) DO UPDATE SET
                utility = COALESCE(EXCLUDED.utility, upgrades.utility),
                title = COALESCE(EXCLUDED.title, upgrades.title),
                total_cost = GREATEST(EXCLUDED.total_cost, upgrades.total_cost)
            RETURNING id
            "#,
        )
        .bind(cluster_id)
        .bind(&upgrade.rtep_id)
        .bind(&upgrade.to_id)
        .bind((!upgrade.utility.is_empty()).then_some(upgrade.utility.as_str()))
        .bind((!upgrade.title.is_empty()).then_some(upgrade.title.as_str()))
        .bind((upgrade.total_cost > 0.0).then_some(upgrade.total_cost))
        .fetch_one(&mut **tx)
        .await?;
        let upgrade_id: i64 = row.try_get("id")?;

        let link_type = LinkType::from_allocated_cost(upgrade.allocated_cost);
        sqlx::query(
            r#"
            INSERT INTO project_upgrades (
                project_id, upgrade_id, cluster_id, link_type, allocated_cost
            ) VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (project_id, upgrade_id) DO UPDATE SET
                link_type = EXCLUDED.link_type,
                allocated_cost = EXCLUDED.allocated_cost
            "#,
        )
        .bind(&report.project_id)
        .bind(upgrade_id)
        .bind(cluster_id)
        .bind(link_type.as_str())
        .bind((upgrade.allocated_cost > 0.0).then_some(upgrade.allocated_cost))
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}
