//! History store trait definition.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

use super::lock::HistoryLock;
use super::types::DeploymentRecord;

/// Trait for deployment history backends.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Persists a record, replacing any record with the same id.
    async fn save(&self, record: &DeploymentRecord) -> Result<()>;

    /// Loads the record of one deployment.
    ///
    /// Returns [`crate::error::HistoryError::NotFound`] if it does not exist.
    async fn load(&self, deployment_id: &str) -> Result<DeploymentRecord>;

    /// Lists all records, newest first.
    async fn list(&self) -> Result<Vec<DeploymentRecord>>;

    /// Acquires the history lock for a run of `steps` steps, each bounded by
    /// `step_timeout`. An empty `holder` identifies the current process.
    async fn acquire_lock(&self, holder: &str, steps: usize, step_timeout: Duration) -> Result<HistoryLock>;

    /// Releases the history lock if `lock_id` still holds it.
    async fn release_lock(&self, lock_id: &str) -> Result<()>;
}
