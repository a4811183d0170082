use async_trait::async_trait;

use super::{ImportJob, ImportProgress, JobStatus, NewImportJob, ProcessOptions};
use crate::orchestrator::ImportPhase;
use crate::preview::ImportPreview;
use crate::types::{ImportId, Timestamp};

#[derive(Debug, thiserror::Error)]
pub enum JobStoreError {
    #[error("Job store error: {0}")]
    Backend(String),

    #[error("Corrupt import job {id}: {message}")]
    Corrupt { id: ImportId, message: String },
}

/// Persistence of import jobs.
///
/// Status changes are compare-and-set: `claim` only moves a `Queued` job,
/// `finish` only moves a `Processing` job and `requeue` only moves a
/// terminal job. A transition that does not apply returns `None` / `false`
/// instead of an error.
#[async_trait]
pub trait ImportJobStore: Send + Sync {
    async fn create(&self, input: NewImportJob) -> Result<ImportJob, JobStoreError>;

    async fn find_by_id(&self, id: ImportId) -> Result<Option<ImportJob>, JobStoreError>;

    /// `Queued → Processing`.
    async fn claim(&self, id: ImportId) -> Result<Option<ImportJob>, JobStoreError>;

    /// `Succeeded | Failed → Queued` with new options. Clears the previous
    /// progress and preview. A job whose commit succeeded is never requeued.
    async fn requeue(
        &self,
        id: ImportId,
        options: &ProcessOptions,
    ) -> Result<Option<ImportJob>, JobStoreError>;

    /// `Processing → Queued` for runs cut short by a restart. Returns the
    /// ids of every queued job, oldest first, so they can be run again.
    async fn requeue_interrupted(&self) -> Result<Vec<ImportId>, JobStoreError>;

    async fn update_phase(
        &self,
        id: ImportId,
        phase: ImportPhase,
        progress: &ImportProgress,
    ) -> Result<(), JobStoreError>;

    /// `Processing → Succeeded | Failed`.
    async fn finish(
        &self,
        id: ImportId,
        status: JobStatus,
        progress: &ImportProgress,
        preview: Option<&ImportPreview>,
    ) -> Result<bool, JobStoreError>;

    /// Delete terminal jobs last updated before `cutoff`. Returns the number
    /// of deleted jobs.
    async fn delete_older_than(&self, cutoff: Timestamp) -> Result<u64, JobStoreError>;
}
