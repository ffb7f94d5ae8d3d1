//! Operator-maintained project manifest: which documents to scrape for a
//! cluster/phase, plus the sidecar metadata merged onto each project.

use std::path::Path;

use anyhow::{Context, Result};
use qi_core::{ProjectSidecar, ReportRef};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectManifest {
    pub cluster: String,
    pub phase: String,
    pub projects: Vec<ManifestRow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestRow {
    pub project_id: String,
    #[serde(default)]
    pub report_url: Option<String>,
    #[serde(default)]
    pub developer: String,
    #[serde(default)]
    pub utility: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub county: String,
    #[serde(default)]
    pub fuel_type: String,
    #[serde(default)]
    pub capacity_mw: Option<f64>,
    #[serde(default)]
    pub energy_mw: Option<f64>,
    #[serde(default)]
    pub status: String,
}

/// One document to scrape: its identity plus the sidecar metadata to carry
/// onto the aggregate.
#[derive(Debug, Clone)]
pub struct ScrapeTarget {
    pub reference: ReportRef,
    pub sidecar: ProjectSidecar,
}

impl ProjectManifest {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// Rows with a usable report URL, in manifest order, optionally capped.
    /// Rows without an `http` URL are skipped and counted.
    pub fn scrape_targets(&self, limit: Option<usize>) -> Vec<ScrapeTarget> {
        let mut skipped = 0usize;
        let mut targets: Vec<ScrapeTarget> = self
            .projects
            .iter()
            .filter_map(|row| match row.report_url.as_deref() {
                Some(url) if url.starts_with("http") => Some(ScrapeTarget {
                    reference: ReportRef {
                        project_id: row.project_id.clone(),
                        cluster: self.cluster.clone(),
                        phase: self.phase.clone(),
                        report_url: url.to_string(),
                    },
                    sidecar: ProjectSidecar {
                        developer: row.developer.clone(),
                        utility: row.utility.clone(),
                        state: row.state.clone(),
                        county: row.county.clone(),
                        fuel_type: row.fuel_type.clone(),
                        capacity_mw: row.capacity_mw,
                        energy_mw: row.energy_mw,
                        status: row.status.clone(),
                    },
                }),
                _ => {
                    skipped += 1;
                    None
                }
            })
            .collect();

        if let Some(limit) = limit {
            targets.truncate(limit);
        }
        info!(
            cluster = %self.cluster,
            phase = %self.phase,
            targets = targets.len(),
            skipped,
            "resolved manifest targets"
        );
        targets
    }
}
