//! Import job rows and their conversion into [`ImportJob`].

use serde::de::DeserializeOwned;
use sqlx::FromRow;

use reconcile_core::jobs::{ImportJob, JobStoreError};
use reconcile_core::orchestrator::ImportPhase;
use reconcile_core::types::{ImportId, ProgramId, Timestamp};
use reconcile_core::workflow::WorkflowKind;

use super::status::{ImportJobStatus, StatusId};

/// A row from the `import_jobs` table.
#[derive(Debug, Clone, FromRow)]
pub struct ImportJobRow {
    pub id: ImportId,
    pub program_id: ProgramId,
    pub mapping_id: String,
    pub workflow: String,
    pub file_name: Option<String>,
    pub user_fields: serde_json::Value,
    pub created_by: Option<String>,
    pub table_data: serde_json::Value,
    pub options: serde_json::Value,
    pub status_id: StatusId,
    pub phase: String,
    pub progress: Option<serde_json::Value>,
    pub preview: Option<serde_json::Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub finished_at: Option<Timestamp>,
}

impl ImportJobRow {
    /// Decode the JSONB and lookup columns.
    pub fn into_job(self) -> Result<ImportJob, JobStoreError> {
        let id = self.id;
        let corrupt = |message: String| JobStoreError::Corrupt { id, message };

        let workflow = WorkflowKind::from_str(&self.workflow)
            .ok_or_else(|| corrupt(format!("unknown workflow '{}'", self.workflow)))?;
        let status = ImportJobStatus::from_id(self.status_id)
            .ok_or_else(|| corrupt(format!("unknown status_id {}", self.status_id)))?;
        let phase = ImportPhase::from_str(&self.phase)
            .ok_or_else(|| corrupt(format!("unknown phase '{}'", self.phase)))?;

        Ok(ImportJob {
            id,
            program_id: self.program_id,
            mapping_id: self.mapping_id,
            workflow,
            file_name: self.file_name,
            user_fields: decode(id, "user_fields", self.user_fields)?,
            created_by: self.created_by,
            table: decode(id, "table_data", self.table_data)?,
            options: decode(id, "options", self.options)?,
            status: status.into(),
            phase,
            progress: self
                .progress
                .map(|v| decode(id, "progress", v))
                .transpose()?,
            preview: self
                .preview
                .map(|v| decode(id, "preview", v))
                .transpose()?,
            created_at: self.created_at,
            updated_at: self.updated_at,
            finished_at: self.finished_at,
        })
    }
}

fn decode<T: DeserializeOwned>(
    id: ImportId,
    column: &str,
    value: serde_json::Value,
) -> Result<T, JobStoreError> {
    serde_json::from_value(value).map_err(|e| JobStoreError::Corrupt {
        id,
        message: format!("{column}: {e}"),
    })
}

/// Encode a value for a JSONB column.
pub fn encode<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, JobStoreError> {
    serde_json::to_value(value).map_err(|e| JobStoreError::Backend(e.to_string()))
}
