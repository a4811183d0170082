use crate::brapi::StoreError;
use crate::jobs::JobStoreError;
use crate::validation::rules::{RowErrors, STATUS_NOT_FOUND, STATUS_UNPROCESSABLE};
use crate::writer::WriteSummary;

/// Request-level errors raised outside of a running import (unknown job,
/// bad mapping id, job busy, ...).
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<JobStoreError> for CoreError {
    fn from(err: JobStoreError) -> Self {
        CoreError::Internal(err.to_string())
    }
}

/// Failure of an import as a whole.
///
/// Structural variants abort before any row is processed; `Validation`,
/// `MissingReference` and `Conflict` are file-level reductions over the whole
/// row set and may carry the per-row breakdown that triggered them.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Missing required column: {column}")]
    MissingColumn { column: String },

    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("Error parsing file: {0}")]
    Parsing(String),

    #[error("Column \"{column}\" must contain {expected} values; found \"{value}\" at row {row}")]
    InvalidType {
        column: String,
        row: usize,
        value: String,
        expected: &'static str,
    },

    #[error("{message}")]
    Validation {
        message: String,
        row_errors: Vec<RowErrors>,
    },

    #[error("{message}")]
    MissingReference { message: String },

    #[error("{message}")]
    Conflict {
        message: String,
        row_errors: Vec<RowErrors>,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Store failure during a commit, after some batches were written.
    #[error("{source}; already written: {written}")]
    PartialWrite {
        source: StoreError,
        written: WriteSummary,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ImportError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            row_errors: Vec::new(),
        }
    }

    pub fn conflict(message: impl Into<String>, row_errors: Vec<RowErrors>) -> Self {
        Self::Conflict {
            message: message.into(),
            row_errors,
        }
    }

    /// Status code reported in the job progress for this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MissingColumn { .. }
            | Self::UnsupportedType(_)
            | Self::Parsing(_)
            | Self::InvalidType { .. }
            | Self::Validation { .. }
            | Self::Conflict { .. } => STATUS_UNPROCESSABLE,
            Self::MissingReference { .. } => STATUS_NOT_FOUND,
            Self::Store(_) | Self::PartialWrite { .. } | Self::Internal(_) => 500,
        }
    }

    /// Records a failed commit left in the store.
    pub fn written(&self) -> Option<&WriteSummary> {
        match self {
            Self::PartialWrite { written, .. } => Some(written),
            _ => None,
        }
    }

    /// Per-row breakdown attached to a file-level failure, if any.
    pub fn row_errors(&self) -> &[RowErrors] {
        match self {
            Self::Validation { row_errors, .. } | Self::Conflict { row_errors, .. } => row_errors,
            _ => &[],
        }
    }

    /// True for errors detected before any row is looked at.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::MissingColumn { .. } | Self::UnsupportedType(_) | Self::Parsing(_)
        )
    }

    /// Whether the failure is a conflict with existing or sibling data.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
