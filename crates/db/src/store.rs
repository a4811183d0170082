//! [`ImportJobStore`] backed by Postgres.

use async_trait::async_trait;
use uuid::Uuid;

use reconcile_core::jobs::{
    ImportJob, ImportJobStore, ImportProgress, JobStatus, JobStoreError, NewImportJob,
    ProcessOptions,
};
use reconcile_core::orchestrator::ImportPhase;
use reconcile_core::preview::ImportPreview;
use reconcile_core::types::{ImportId, Timestamp};

use crate::models::import_job::encode;
use crate::models::status::ImportJobStatus;
use crate::repositories::{CreateImportJob, ImportJobRepo};
use crate::DbPool;

fn backend(err: sqlx::Error) -> JobStoreError {
    JobStoreError::Backend(err.to_string())
}

#[derive(Clone)]
pub struct PgImportJobStore {
    pool: DbPool,
}

impl PgImportJobStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ImportJobStore for PgImportJobStore {
    async fn create(&self, input: NewImportJob) -> Result<ImportJob, JobStoreError> {
        let record = CreateImportJob {
            id: Uuid::now_v7(),
            program_id: input.program_id,
            mapping_id: &input.mapping_id,
            workflow: input.workflow.as_str(),
            file_name: input.file_name.as_deref(),
            user_fields: encode(&input.user_fields)?,
            created_by: input.created_by.as_deref(),
            table_data: encode(&input.table)?,
            options: encode(&ProcessOptions::preview())?,
        };
        let row = ImportJobRepo::create(&self.pool, &record)
            .await
            .map_err(backend)?;
        tracing::debug!(import_id = %row.id, workflow = %row.workflow, "Import job stored");
        row.into_job()
    }

    async fn find_by_id(&self, id: ImportId) -> Result<Option<ImportJob>, JobStoreError> {
        ImportJobRepo::find_by_id(&self.pool, id)
            .await
            .map_err(backend)?
            .map(|row| row.into_job())
            .transpose()
    }

    async fn claim(&self, id: ImportId) -> Result<Option<ImportJob>, JobStoreError> {
        ImportJobRepo::claim(&self.pool, id)
            .await
            .map_err(backend)?
            .map(|row| row.into_job())
            .transpose()
    }

    async fn requeue(
        &self,
        id: ImportId,
        options: &ProcessOptions,
    ) -> Result<Option<ImportJob>, JobStoreError> {
        ImportJobRepo::requeue(&self.pool, id, &encode(options)?)
            .await
            .map_err(backend)?
            .map(|row| row.into_job())
            .transpose()
    }

    async fn requeue_interrupted(&self) -> Result<Vec<ImportId>, JobStoreError> {
        ImportJobRepo::requeue_interrupted(&self.pool)
            .await
            .map_err(backend)
    }

    async fn update_phase(
        &self,
        id: ImportId,
        phase: ImportPhase,
        progress: &ImportProgress,
    ) -> Result<(), JobStoreError> {
        ImportJobRepo::update_phase(&self.pool, id, phase, &encode(progress)?)
            .await
            .map_err(backend)
    }

    async fn finish(
        &self,
        id: ImportId,
        status: JobStatus,
        progress: &ImportProgress,
        preview: Option<&ImportPreview>,
    ) -> Result<bool, JobStoreError> {
        let preview = preview.map(encode).transpose()?;
        ImportJobRepo::finish(
            &self.pool,
            id,
            ImportJobStatus::from(status).id(),
            progress.phase,
            &encode(progress)?,
            preview.as_ref(),
        )
        .await
        .map_err(backend)
    }

    async fn delete_older_than(&self, cutoff: Timestamp) -> Result<u64, JobStoreError> {
        ImportJobRepo::delete_older_than(&self.pool, cutoff)
            .await
            .map_err(backend)
    }
}
