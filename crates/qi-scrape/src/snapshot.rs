//! JSON snapshots of a batch's aggregates, for inspection and for loading
//! into the store later without re-fetching source documents.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use qi_core::ScrapedReport;
use tokio::fs;

pub fn snapshot_file_name(cluster: &str, phase: &str, at: DateTime<Utc>) -> String {
    format!(
        "scraped_{}_{}_{}.json",
        cluster,
        phase,
        at.format("%Y%m%d_%H%M%S")
    )
}

pub async fn write_snapshot(path: impl AsRef<Path>, reports: &[ScrapedReport]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let bytes = serde_json::to_vec_pretty(reports).context("serializing snapshot")?;
    fs::write(path, bytes)
        .await
        .with_context(|| format!("writing {}", path.display()))
}

pub async fn read_snapshot(path: impl AsRef<Path>) -> Result<Vec<ScrapedReport>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}
