//! Report fetching and batch scraping: rate-limited HTTP, raw-HTML
//! archive, manifest-driven targets, and JSON snapshots for replay.

use std::path::PathBuf;
use std::time::Duration;

pub mod archive;
pub mod batch;
pub mod fetch;
pub mod manifest;
pub mod snapshot;

pub use archive::{ArchiveStore, ArchivedReport};
pub use batch::{scrape_batch, BatchOutcome};
pub use fetch::{BackoffPolicy, FetchError, Pacer, ReportFetcher};
pub use manifest::{ManifestRow, ProjectManifest, ScrapeTarget};

pub const CRATE_NAME: &str = "qi-scrape";

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub user_agent: String,
    pub min_delay: Duration,
    pub http_timeout: Duration,
    pub archive_dir: PathBuf,
    pub concurrency: usize,
}

impl ScrapeConfig {
    pub fn from_env() -> Self {
        Self {
            user_agent: std::env::var("QI_USER_AGENT")
                .unwrap_or_else(|_| "queue-insights/0.1".to_string()),
            min_delay: Duration::from_millis(
                std::env::var("QI_FETCH_DELAY_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(500),
            ),
            http_timeout: Duration::from_secs(
                std::env::var("QI_HTTP_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
            ),
            archive_dir: std::env::var("QI_ARCHIVE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./archive")),
            concurrency: std::env::var("QI_FETCH_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4),
        }
    }
}
