//! Local file-based history backend.
//!
//! Each deployment is stored as `<dir>/<deployment-id>.json`. Writes go to a
//! temporary file first and are renamed into place.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::HistoryConfig;
use crate::error::{HistoryError, Result};

use super::lock::{holder_id, HistoryLock};
use super::store::HistoryStore;
use super::types::DeploymentRecord;

/// Lock file name.
const LOCK_FILE: &str = "history.lock";

/// Record file extension.
const RECORD_EXTENSION: &str = "json";

/// Local file-based history store.
#[derive(Debug)]
pub struct LocalHistoryStore {
    /// Directory holding record files.
    base_dir: PathBuf,
    /// Path to the lock file.
    lock_path: PathBuf,
}

impl LocalHistoryStore {
    /// Creates a store rooted at `base_dir`.
    #[must_use]
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let lock_path = base_dir.join(LOCK_FILE);
        Self { base_dir, lock_path }
    }

    /// Creates a store from configuration, relative to `project_root`.
    #[must_use]
    pub fn from_config(config: &HistoryConfig, project_root: &Path) -> Self {
        Self::with_base_dir(project_root.join(&config.dir))
    }

    /// Directory holding record files.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn record_path(&self, deployment_id: &str) -> PathBuf {
        self.base_dir
            .join(format!("{deployment_id}.{RECORD_EXTENSION}"))
    }

    /// Ensures the history directory exists.
    async fn ensure_dir(&self) -> Result<()> {
        if !self.base_dir.exists() {
            debug!("Creating history directory: {}", self.base_dir.display());
            fs::create_dir_all(&self.base_dir)
                .await
                .map_err(|e| HistoryError::write(format!("Failed to create history directory: {e}")))?;
        }
        Ok(())
    }

    /// Writes `content` to `path` through a temporary file.
    async fn write_atomic(&self, path: &Path, content: &str) -> Result<()> {
        self.ensure_dir().await?;
        let temp_path = path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| HistoryError::write(format!("Failed to create temp file: {e}")))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| HistoryError::write(format!("Failed to write history file: {e}")))?;
        file.sync_all()
            .await
            .map_err(|e| HistoryError::write(format!("Failed to sync history file: {e}")))?;

        fs::rename(&temp_path, path)
            .await
            .map_err(|e| HistoryError::write(format!("Failed to rename history file: {e}")))?;
        Ok(())
    }

    async fn read_record(path: &Path) -> Result<DeploymentRecord> {
        let content = fs::read_to_string(path).await.map_err(|e| HistoryError::Corrupted {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;

        let record = serde_json::from_str(&content).map_err(|e| HistoryError::Corrupted {
            message: format!("Failed to parse {}: {e}", path.display()),
        })?;
        Ok(record)
    }

    /// Reads the lock file if it exists.
    async fn read_lock_file(&self) -> Result<Option<HistoryLock>> {
        if !self.lock_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.lock_path).await.map_err(|e| HistoryError::Corrupted {
            message: format!("Failed to read lock file: {e}"),
        })?;
        let lock_info = serde_json::from_str(&content).map_err(|e| HistoryError::Corrupted {
            message: format!("Failed to parse lock file: {e}"),
        })?;

        Ok(Some(lock_info))
    }
}

/// Deployment ids are generated, never paths.
fn is_plain_id(deployment_id: &str) -> bool {
    !deployment_id.is_empty()
        && deployment_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !deployment_id.contains("..")
}

#[async_trait]
impl HistoryStore for LocalHistoryStore {
    async fn save(&self, record: &DeploymentRecord) -> Result<()> {
        let id = record.deployment_id.as_str();
        if !is_plain_id(id) {
            return Err(HistoryError::write(format!("Invalid deployment id '{id}'")).into());
        }

        let content = serde_json::to_string_pretty(record)
            .map_err(|e| HistoryError::serialization(format!("Failed to serialize record: {e}")))?;

        let path = self.record_path(id);
        info!("Saving deployment record to: {}", path.display());
        self.write_atomic(&path, &content).await?;

        debug!("Deployment record {id} saved");
        Ok(())
    }

    async fn load(&self, deployment_id: &str) -> Result<DeploymentRecord> {
        let path = self.record_path(deployment_id);
        if !is_plain_id(deployment_id) || !path.exists() {
            return Err(HistoryError::NotFound {
                deployment_id: deployment_id.to_string(),
            }
            .into());
        }

        Self::read_record(&path).await
    }

    async fn list(&self) -> Result<Vec<DeploymentRecord>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&self.base_dir)
            .await
            .map_err(|e| HistoryError::Corrupted {
                message: format!("Failed to read history directory: {e}"),
            })?;

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            match Self::read_record(&path).await {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping unreadable history file: {e}"),
            }
        }

        records.sort_by(|a, b| {
            b.recorded_at
                .cmp(&a.recorded_at)
                .then_with(|| b.deployment_id.cmp(&a.deployment_id))
        });
        Ok(records)
    }

    async fn acquire_lock(&self, holder: &str, steps: usize, step_timeout: Duration) -> Result<HistoryLock> {
        if let Some(existing) = self.read_lock_file().await? {
            if !existing.is_expired() {
                return Err(HistoryError::LockedByOther {
                    holder: existing.holder,
                    since: existing.acquired_at.to_rfc3339(),
                }
                .into());
            }
            warn!(
                "Taking over history lock of {}, whose {}-step run expired at {}",
                existing.holder, existing.steps, existing.expires_at
            );
        }

        let holder = if holder.is_empty() {
            holder_id()
        } else {
            holder.to_string()
        };

        let lock = HistoryLock::for_run(holder, steps, step_timeout);
        let content = serde_json::to_string_pretty(&lock)
            .map_err(|e| HistoryError::serialization(format!("Failed to serialize lock: {e}")))?;
        self.write_atomic(&self.lock_path, &content)
            .await
            .map_err(|e| HistoryError::LockFailed {
                message: e.to_string(),
            })?;

        info!(
            "Acquired history lock: {} (lease {}s)",
            lock.lock_id,
            lock.remaining_secs()
        );
        Ok(lock)
    }

    async fn release_lock(&self, lock_id: &str) -> Result<()> {
        if let Some(existing) = self.read_lock_file().await? {
            if existing.lock_id == lock_id {
                fs::remove_file(&self.lock_path)
                    .await
                    .map_err(|e| HistoryError::LockFailed {
                        message: format!("Failed to delete lock file: {e}"),
                    })?;
                info!("Released history lock: {lock_id}");
            } else {
                debug!("Lock ID mismatch: expected {lock_id}, found {}", existing.lock_id);
            }
        }
        Ok(())
    }
}
