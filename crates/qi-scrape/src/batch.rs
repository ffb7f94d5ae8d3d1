//! Batch scraping: fan documents out across bounded concurrency, absorb
//! per-document failures, and return every aggregate in manifest order.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use qi_core::ScrapedReport;
use qi_extract::assemble_report;
use tokio::sync::Semaphore;
use tracing::{info, warn};
use uuid::Uuid;

use crate::archive::ArchiveStore;
use crate::fetch::ReportFetcher;
use crate::manifest::ScrapeTarget;

#[derive(Debug)]
pub struct BatchOutcome {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub reports: Vec<ScrapedReport>,
    pub fetched: usize,
    pub failed: usize,
}

/// Scrape every target. A document-level failure becomes one error on an
/// otherwise-empty aggregate for that document; the batch always runs to
/// completion. Extraction itself is pure and runs inside each task.
pub async fn scrape_batch(
    fetcher: Arc<ReportFetcher>,
    archive: Option<Arc<ArchiveStore>>,
    targets: Vec<ScrapeTarget>,
    concurrency: usize,
) -> BatchOutcome {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

    let mut handles = Vec::with_capacity(targets.len());
    for target in targets {
        let fetcher = Arc::clone(&fetcher);
        let archive = archive.clone();
        let semaphore = Arc::clone(&semaphore);
        handles.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("semaphore not closed");
            scrape_one(&fetcher, archive.as_deref(), run_id, target).await
        }));
    }

    let mut reports = Vec::with_capacity(handles.len());
    let mut failed = 0usize;
    for handle in handles {
        let (report, fetched_ok) = handle.await.expect("scrape task");
        if !fetched_ok {
            failed += 1;
        }
        reports.push(report);
    }

    let fetched = reports.len() - failed;
    info!(%run_id, fetched, failed, "scrape batch complete");

    BatchOutcome {
        run_id,
        started_at,
        finished_at: Utc::now(),
        reports,
        fetched,
        failed,
    }
}

async fn scrape_one(
    fetcher: &ReportFetcher,
    archive: Option<&ArchiveStore>,
    run_id: Uuid,
    target: ScrapeTarget,
) -> (ScrapedReport, bool) {
    let reference = &target.reference;
    let scraped_at = Utc::now();

    match fetcher
        .fetch_report(run_id, &reference.project_id, &reference.report_url)
        .await
    {
        Ok(body) => {
            if let Some(store) = archive {
                if let Err(err) = store
                    .store_html(
                        scraped_at,
                        &reference.cluster,
                        &reference.phase,
                        &reference.project_id,
                        &body,
                    )
                    .await
                {
                    warn!(project_id = %reference.project_id, error = %err, "report body not archived");
                }
            }

            let mut report = assemble_report(&body, reference, scraped_at);
            report.sidecar = Some(target.sidecar);
            info!(
                project_id = %reference.project_id,
                total_cost = report.cost_summary.total_cost,
                upgrades = report.upgrades.len(),
                errors = report.errors.len(),
                "scraped report"
            );
            (report, true)
        }
        Err(err) => {
            warn!(project_id = %reference.project_id, error = %err, "report fetch failed");
            let mut report = ScrapedReport::empty(reference, scraped_at);
            report.sidecar = Some(target.sidecar);
            report.errors.push(format!("document fetch failed: {err}"));
            (report, false)
        }
    }
}
