//! Repository for the `import_jobs` table.
//!
//! Status transitions are compare-and-set on `status_id`, so two workers
//! racing on the same job cannot both claim or finish it.

use sqlx::PgPool;

use reconcile_core::orchestrator::ImportPhase;
use reconcile_core::types::{ImportId, Timestamp};

use crate::models::import_job::ImportJobRow;
use crate::models::status::{ImportJobStatus, StatusId, TERMINAL_STATUSES};

/// Column list for `import_jobs` queries.
const COLUMNS: &str = "\
    id, program_id, mapping_id, workflow, file_name, user_fields, created_by, \
    table_data, options, status_id, phase, progress, preview, \
    created_at, updated_at, finished_at";

/// Insert payload for a new job. JSONB columns are pre-encoded.
#[derive(Debug)]
pub struct CreateImportJob<'a> {
    pub id: ImportId,
    pub program_id: uuid::Uuid,
    pub mapping_id: &'a str,
    pub workflow: &'a str,
    pub file_name: Option<&'a str>,
    pub user_fields: serde_json::Value,
    pub created_by: Option<&'a str>,
    pub table_data: serde_json::Value,
    pub options: serde_json::Value,
}

/// Provides persistence operations for import jobs.
pub struct ImportJobRepo;

impl ImportJobRepo {
    /// Insert a queued job in the `received` phase.
    pub async fn create(
        pool: &PgPool,
        input: &CreateImportJob<'_>,
    ) -> Result<ImportJobRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO import_jobs \
                 (id, program_id, mapping_id, workflow, file_name, user_fields, created_by, \
                  table_data, options, status_id, phase) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ImportJobRow>(&query)
            .bind(input.id)
            .bind(input.program_id)
            .bind(input.mapping_id)
            .bind(input.workflow)
            .bind(input.file_name)
            .bind(&input.user_fields)
            .bind(input.created_by)
            .bind(&input.table_data)
            .bind(&input.options)
            .bind(ImportJobStatus::Queued.id())
            .bind(ImportPhase::Received.as_str())
            .fetch_one(pool)
            .await
    }

    /// Find a job by its ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: ImportId,
    ) -> Result<Option<ImportJobRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM import_jobs WHERE id = $1");
        sqlx::query_as::<_, ImportJobRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Move a queued job to processing. Returns `None` when the job is
    /// missing or not queued.
    pub async fn claim(pool: &PgPool, id: ImportId) -> Result<Option<ImportJobRow>, sqlx::Error> {
        let query = format!(
            "UPDATE import_jobs \
             SET status_id = $2, updated_at = NOW() \
             WHERE id = $1 AND status_id = $3 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ImportJobRow>(&query)
            .bind(id)
            .bind(ImportJobStatus::Processing.id())
            .bind(ImportJobStatus::Queued.id())
            .fetch_optional(pool)
            .await
    }

    /// Put a finished job back in the queue with new options, clearing the
    /// previous run's progress and preview. A succeeded commit stays final.
    pub async fn requeue(
        pool: &PgPool,
        id: ImportId,
        options: &serde_json::Value,
    ) -> Result<Option<ImportJobRow>, sqlx::Error> {
        let query = format!(
            "UPDATE import_jobs \
             SET status_id = $2, phase = $3, options = $4, \
                 progress = NULL, preview = NULL, finished_at = NULL, updated_at = NOW() \
             WHERE id = $1 AND status_id IN ($5, $6) \
               AND NOT (status_id = $7 AND (options->>'commit')::boolean IS TRUE) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ImportJobRow>(&query)
            .bind(id)
            .bind(ImportJobStatus::Queued.id())
            .bind(ImportPhase::Received.as_str())
            .bind(options)
            .bind(TERMINAL_STATUSES[0])
            .bind(TERMINAL_STATUSES[1])
            .bind(ImportJobStatus::Succeeded.id())
            .fetch_optional(pool)
            .await
    }

    /// Return jobs left processing by a stopped server to the queue, then
    /// list every queued job oldest first.
    pub async fn requeue_interrupted(pool: &PgPool) -> Result<Vec<ImportId>, sqlx::Error> {
        let reset = sqlx::query(
            "UPDATE import_jobs \
             SET status_id = $1, phase = $2, progress = NULL, updated_at = NOW() \
             WHERE status_id = $3",
        )
        .bind(ImportJobStatus::Queued.id())
        .bind(ImportPhase::Received.as_str())
        .bind(ImportJobStatus::Processing.id())
        .execute(pool)
        .await?;
        if reset.rows_affected() > 0 {
            tracing::info!(count = reset.rows_affected(), "Requeued interrupted import jobs");
        }

        sqlx::query_scalar::<_, ImportId>(
            "SELECT id FROM import_jobs WHERE status_id = $1 ORDER BY created_at",
        )
        .bind(ImportJobStatus::Queued.id())
        .fetch_all(pool)
        .await
    }

    /// Record the phase a running job has entered.
    pub async fn update_phase(
        pool: &PgPool,
        id: ImportId,
        phase: ImportPhase,
        progress: &serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE import_jobs SET phase = $2, progress = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(phase.as_str())
        .bind(progress)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Move a processing job to a terminal status.
    ///
    /// Returns `true` if the job was updated, `false` if it was not
    /// processing.
    pub async fn finish(
        pool: &PgPool,
        id: ImportId,
        status: StatusId,
        phase: ImportPhase,
        progress: &serde_json::Value,
        preview: Option<&serde_json::Value>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE import_jobs \
             SET status_id = $2, phase = $3, progress = $4, preview = $5, \
                 finished_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id = $6",
        )
        .bind(id)
        .bind(status)
        .bind(phase.as_str())
        .bind(progress)
        .bind(preview)
        .bind(ImportJobStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete terminal jobs last updated before `cutoff`.
    ///
    /// Returns the number of deleted rows.
    pub async fn delete_older_than(pool: &PgPool, cutoff: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM import_jobs WHERE status_id IN ($1, $2) AND updated_at < $3",
        )
        .bind(TERMINAL_STATUSES[0])
        .bind(TERMINAL_STATUSES[1])
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
