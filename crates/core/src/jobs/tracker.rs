//! Job tracker: creates jobs on upload, runs each on its own tokio task and
//! answers polling requests.

use std::sync::Arc;

use async_trait::async_trait;

use super::store::ImportJobStore;
use super::{ImportJob, ImportProgress, JobStatus, NewImportJob, ProcessOptions};
use crate::error::{CoreError, ImportError};
use crate::orchestrator::{ImportOrchestrator, ImportPhase, PhaseSink};
use crate::types::{ImportId, ProgramId};

/// Records phase transitions on the job row.
struct JobPhaseSink {
    jobs: Arc<dyn ImportJobStore>,
    id: ImportId,
}

#[async_trait]
impl PhaseSink for JobPhaseSink {
    async fn enter(&self, phase: ImportPhase, finished: usize, total: usize) {
        let progress = ImportProgress::running(phase, finished, total);
        if let Err(e) = self.jobs.update_phase(self.id, phase, &progress).await {
            tracing::warn!(import_id = %self.id, phase = phase.as_str(), error = %e, "Failed to record import phase");
        }
    }
}

#[derive(Clone)]
pub struct ImportTracker {
    jobs: Arc<dyn ImportJobStore>,
    orchestrator: Arc<ImportOrchestrator>,
}

impl ImportTracker {
    pub fn new(jobs: Arc<dyn ImportJobStore>, orchestrator: Arc<ImportOrchestrator>) -> Self {
        Self { jobs, orchestrator }
    }

    pub fn orchestrator(&self) -> &ImportOrchestrator {
        &self.orchestrator
    }

    pub fn jobs(&self) -> &Arc<dyn ImportJobStore> {
        &self.jobs
    }

    /// Store an upload and queue its preview run.
    pub async fn submit(&self, input: NewImportJob) -> Result<ImportJob, CoreError> {
        let job = self.jobs.create(input).await?;
        tracing::info!(
            import_id = %job.id,
            workflow = job.workflow.as_str(),
            rows = job.total_rows(),
            "Import received"
        );
        self.spawn(job.id);
        Ok(job)
    }

    /// Store an upload that could not be read and fail it straight away, so
    /// the caller learns about it by polling like any other failure.
    pub async fn reject(
        &self,
        input: NewImportJob,
        error: &ImportError,
    ) -> Result<ImportJob, CoreError> {
        let job = self.jobs.create(input).await?;
        tracing::info!(import_id = %job.id, error = %error, "Import rejected on upload");
        self.jobs.claim(job.id).await?;
        let progress = ImportProgress::failed(error, 0);
        self.jobs
            .finish(job.id, JobStatus::Failed, &progress, None)
            .await?;
        self.find(job.program_id, job.id).await
    }

    /// Current state of a job of the given program.
    pub async fn find(&self, program_id: ProgramId, id: ImportId) -> Result<ImportJob, CoreError> {
        self.jobs
            .find_by_id(id)
            .await?
            .filter(|job| job.program_id == program_id)
            .ok_or_else(|| CoreError::NotFound {
                entity: "Import",
                id: id.to_string(),
            })
    }

    /// Re-run a finished job as a preview or a commit.
    pub async fn process(
        &self,
        program_id: ProgramId,
        id: ImportId,
        options: ProcessOptions,
    ) -> Result<ImportJob, CoreError> {
        options.validate()?;
        let job = self.find(program_id, id).await?;
        if !job.status.is_terminal() {
            return Err(CoreError::Conflict(format!(
                "Import {id} is still processing"
            )));
        }
        if job.is_committed() {
            return Err(CoreError::Conflict(format!("Import {id} already committed")));
        }

        let job = self
            .jobs
            .requeue(id, &options)
            .await?
            .ok_or_else(|| CoreError::Conflict(format!("Import {id} cannot be processed again")))?;
        tracing::info!(import_id = %id, mode = options.mode(), overwrite = options.overwrite, "Import queued");
        self.spawn(id);
        Ok(job)
    }

    /// Restart jobs left queued or half-run by a previous process. Returns
    /// how many were resumed.
    pub async fn resume_interrupted(&self) -> Result<usize, CoreError> {
        let ids = self.jobs.requeue_interrupted().await?;
        for id in &ids {
            tracing::info!(import_id = %id, "Resuming interrupted import");
            self.spawn(*id);
        }
        Ok(ids.len())
    }

    fn spawn(&self, id: ImportId) {
        let tracker = self.clone();
        tokio::spawn(async move { tracker.run(id).await });
    }

    /// Claim a queued job and run it to completion. A job that is not queued
    /// (already claimed by another run) is left alone.
    pub async fn run(&self, id: ImportId) {
        let job = match self.jobs.claim(id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                tracing::debug!(import_id = %id, "Import not queued, skipping run");
                return;
            }
            Err(e) => {
                tracing::error!(import_id = %id, error = %e, "Failed to claim import");
                return;
            }
        };

        let total = job.total_rows();
        let sink = JobPhaseSink {
            jobs: Arc::clone(&self.jobs),
            id,
        };
        let (status, progress, preview) = match self.orchestrator.run(&job, &sink).await {
            Ok(outcome) if outcome.row_errors.is_empty() => {
                let message = if outcome.committed {
                    "Import committed"
                } else {
                    "Preview ready"
                };
                (
                    JobStatus::Succeeded,
                    ImportProgress::succeeded(message, total),
                    Some(outcome.preview),
                )
            }
            Ok(outcome) => {
                tracing::info!(import_id = %id, invalid_rows = outcome.row_errors.len(), "Import has row errors");
                (
                    JobStatus::Failed,
                    ImportProgress::rejected_rows(outcome.row_errors, total),
                    Some(outcome.preview),
                )
            }
            Err(e) => {
                if e.status_code() >= 500 {
                    tracing::error!(import_id = %id, error = %e, "Import failed");
                } else {
                    tracing::info!(import_id = %id, error = %e, "Import rejected");
                }
                (JobStatus::Failed, ImportProgress::failed(&e, total), None)
            }
        };

        match self
            .jobs
            .finish(id, status, &progress, preview.as_ref())
            .await
        {
            Ok(true) => {}
            Ok(false) => tracing::warn!(import_id = %id, "Import was no longer processing when it finished"),
            Err(e) => tracing::error!(import_id = %id, error = %e, "Failed to store import result"),
        }
    }
}
