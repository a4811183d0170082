//! Import jobs: the persisted unit of work behind an upload, its progress
//! report, and the tracker that runs it in the background.

pub mod memory;
pub mod store;
pub mod tracker;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, ImportError};
use crate::orchestrator::ImportPhase;
use crate::parser::ParsedTable;
use crate::preview::ImportPreview;
use crate::types::{ImportId, ProgramId, Timestamp};
use crate::validation::rules::{RowErrors, STATUS_OK, STATUS_UNPROCESSABLE};
use crate::workflow::WorkflowKind;
use crate::writer::WriteSummary;

pub use memory::MemoryJobStore;
pub use store::{ImportJobStore, JobStoreError};
pub use tracker::ImportTracker;

/// Job lifecycle. Queued and Processing are pending; the rest are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Processing,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub const ALL: &'static [JobStatus] = &[
        JobStatus::Queued,
        JobStatus::Processing,
        JobStatus::Succeeded,
        JobStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|status| status.as_str() == s)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// How a queued run should treat the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOptions {
    #[serde(default)]
    pub commit: bool,
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default)]
    pub overwrite_reason: Option<String>,
}

impl ProcessOptions {
    pub fn preview() -> Self {
        Self::default()
    }

    /// Overwriting committed observations must say why.
    pub fn validate(&self) -> Result<(), CoreError> {
        let has_reason = self
            .overwrite_reason
            .as_deref()
            .is_some_and(|r| !r.trim().is_empty());
        if self.commit && self.overwrite && !has_reason {
            return Err(CoreError::Validation(
                "overwriteReason is required when committing with overwrite".to_string(),
            ));
        }
        Ok(())
    }

    pub fn mode(&self) -> &'static str {
        if self.commit {
            "commit"
        } else {
            "preview"
        }
    }
}

/// Progress block of the polling response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportProgress {
    pub statuscode: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub row_errors: Vec<RowErrors>,
    pub total: usize,
    pub finished: usize,
    pub phase: ImportPhase,
    /// What a failed commit left in the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub written: Option<WriteSummary>,
}

impl ImportProgress {
    /// Progress of a job that is still running.
    pub fn running(phase: ImportPhase, finished: usize, total: usize) -> Self {
        Self {
            statuscode: 202,
            message: None,
            row_errors: Vec::new(),
            total,
            finished,
            phase,
            written: None,
        }
    }

    pub fn succeeded(message: impl Into<String>, total: usize) -> Self {
        Self {
            statuscode: STATUS_OK,
            message: Some(message.into()),
            row_errors: Vec::new(),
            total,
            finished: total,
            phase: ImportPhase::Done,
            written: None,
        }
    }

    /// Failure caused by one or more row errors.
    pub fn rejected_rows(row_errors: Vec<RowErrors>, total: usize) -> Self {
        Self {
            statuscode: STATUS_UNPROCESSABLE,
            message: Some(format!("{} row(s) contain errors", row_errors.len())),
            row_errors,
            total,
            finished: total,
            phase: ImportPhase::Failed,
            written: None,
        }
    }

    /// Failure of the file as a whole.
    pub fn failed(error: &ImportError, total: usize) -> Self {
        Self {
            statuscode: error.status_code(),
            message: Some(error.to_string()),
            row_errors: error.row_errors().to_vec(),
            total,
            finished: 0,
            phase: ImportPhase::Failed,
            written: error.written().cloned(),
        }
    }
}

/// Fields supplied by the caller when a file is uploaded.
#[derive(Debug, Clone)]
pub struct NewImportJob {
    pub program_id: ProgramId,
    pub mapping_id: String,
    pub workflow: WorkflowKind,
    pub file_name: Option<String>,
    pub user_fields: BTreeMap<String, String>,
    pub created_by: Option<String>,
    pub table: ParsedTable,
}

/// A stored import job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportJob {
    pub id: ImportId,
    pub program_id: ProgramId,
    pub mapping_id: String,
    pub workflow: WorkflowKind,
    pub file_name: Option<String>,
    pub user_fields: BTreeMap<String, String>,
    pub created_by: Option<String>,
    #[serde(skip)]
    pub table: ParsedTable,
    pub options: ProcessOptions,
    pub status: JobStatus,
    pub phase: ImportPhase,
    pub progress: Option<ImportProgress>,
    pub preview: Option<ImportPreview>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub finished_at: Option<Timestamp>,
}

impl ImportJob {
    /// Build the initial record for an upload.
    pub fn new(id: ImportId, input: NewImportJob, now: Timestamp) -> Self {
        Self {
            id,
            program_id: input.program_id,
            mapping_id: input.mapping_id,
            workflow: input.workflow,
            file_name: input.file_name,
            user_fields: input.user_fields,
            created_by: input.created_by,
            table: input.table,
            options: ProcessOptions::preview(),
            status: JobStatus::Queued,
            phase: ImportPhase::Received,
            progress: None,
            preview: None,
            created_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    /// Number of data rows in the upload.
    pub fn total_rows(&self) -> usize {
        self.table.rows.len()
    }

    /// A successful commit is final: running it again would write every
    /// new entity a second time.
    pub fn is_committed(&self) -> bool {
        self.status == JobStatus::Succeeded && self.options.commit
    }
}
