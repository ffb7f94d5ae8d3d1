//! Immutable archive of fetched report HTML, hash-addressed so any batch
//! can be audited or replayed later without re-fetching the source.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ArchivedReport {
    pub content_hash: String,
    pub relative_path: PathBuf,
    pub absolute_path: PathBuf,
    pub byte_size: usize,
    pub deduplicated: bool,
}

#[derive(Debug, Clone)]
pub struct ArchiveStore {
    root: PathBuf,
}

impl ArchiveStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sha256_hex(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }

    fn relative_path(
        fetched_at: DateTime<Utc>,
        cluster: &str,
        phase: &str,
        project_id: &str,
        content_hash: &str,
    ) -> PathBuf {
        let stamp = fetched_at.format("%Y%m%d").to_string();
        PathBuf::from(cluster)
            .join(phase)
            .join(project_id)
            .join(format!("{stamp}_{content_hash}.html"))
    }

    /// Store one fetched report body. Re-storing identical content is a
    /// no-op flagged as deduplicated; the temp-file-then-rename dance keeps
    /// concurrent writers from observing partial files.
    pub async fn store_html(
        &self,
        fetched_at: DateTime<Utc>,
        cluster: &str,
        phase: &str,
        project_id: &str,
        body: &str,
    ) -> anyhow::Result<ArchivedReport> {
        let bytes = body.as_bytes();
        let content_hash = Self::sha256_hex(bytes);
        let relative_path =
            Self::relative_path(fetched_at, cluster, phase, project_id, &content_hash);
        let absolute_path = self.root.join(&relative_path);

        let parent = absolute_path
            .parent()
            .expect("archive path always has a parent");
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating archive directory {}", parent.display()))?;

        if fs::try_exists(&absolute_path)
            .await
            .with_context(|| format!("checking archive path {}", absolute_path.display()))?
        {
            return Ok(ArchivedReport {
                content_hash,
                relative_path,
                absolute_path,
                byte_size: bytes.len(),
                deduplicated: true,
            });
        }

        let temp_path = parent.join(format!(".{}.tmp", Uuid::new_v4()));
        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .with_context(|| format!("opening temp archive file {}", temp_path.display()))?;
        file.write_all(bytes)
            .await
            .with_context(|| format!("writing temp archive file {}", temp_path.display()))?;
        file.flush()
            .await
            .with_context(|| format!("flushing temp archive file {}", temp_path.display()))?;
        drop(file);

        match fs::rename(&temp_path, &absolute_path).await {
            Ok(()) => Ok(ArchivedReport {
                content_hash,
                relative_path,
                absolute_path,
                byte_size: bytes.len(),
                deduplicated: false,
            }),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                let _ = fs::remove_file(&temp_path).await;
                Ok(ArchivedReport {
                    content_hash,
                    relative_path,
                    absolute_path,
                    byte_size: bytes.len(),
                    deduplicated: true,
                })
            }
            Err(err) => {
                let _ = fs::remove_file(&temp_path).await;
                Err(err).with_context(|| {
                    format!(
                        "renaming temp archive file {} -> {}",
                        temp_path.display(),
                        absolute_path.display()
                    )
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[tokio::test]
    async fn identical_bodies_deduplicate_by_hash() {
        let dir = tempdir().expect("tempdir");
        let store = ArchiveStore::new(dir.path());
        let fetched_at = Utc.with_ymd_and_hms(2026, 3, 1, 6, 0, 0).single().unwrap();

        let first = store
            .store_html(fetched_at, "TC2", "PHASE_1", "AG2-548", "<html>same</html>")
            .await
            .expect("first store");
        let second = store
            .store_html(fetched_at, "TC2", "PHASE_1", "AG2-548", "<html>same</html>")
            .await
            .expect("second store");

        assert!(!first.deduplicated);
        assert!(second.deduplicated);
        assert_eq!(first.content_hash, second.content_hash);
        assert!(first.absolute_path.exists());
        assert!(first.relative_path.starts_with("TC2/PHASE_1/AG2-548"));
    }

    #[tokio::test]
    async fn different_bodies_land_in_distinct_files() {
        let dir = tempdir().expect("tempdir");
        let store = ArchiveStore::new(dir.path());
        let fetched_at = Utc.with_ymd_and_hms(2026, 3, 1, 6, 0, 0).single().unwrap();

        let a = store
            .store_html(fetched_at, "TC2", "PHASE_1", "AG2-548", "<html>a</html>")
            .await
            .expect("store a");
        let b = store
            .store_html(fetched_at, "TC2", "PHASE_1", "AG2-548", "<html>b</html>")
            .await
            .expect("store b");

        assert_ne!(a.content_hash, b.content_hash);
        assert_ne!(a.absolute_path, b.absolute_path);
    }
}
