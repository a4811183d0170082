//! Field error and per-row error collection types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Job finished without errors.
pub const STATUS_OK: u16 = 200;

/// Validation failure (blank required field, enum mismatch, ...).
pub const STATUS_UNPROCESSABLE: u16 = 422;

/// Dangling reference to a record that does not exist.
pub const STATUS_NOT_FOUND: u16 = 404;

/// Clash with existing data or with another row of the same file.
pub const STATUS_CONFLICT: u16 = 409;

/// A single field-level error attached to one row.
///
/// `http_status_code` classifies the error for the caller; it is not the
/// transport status of any response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    pub field: String,
    pub message: String,
    pub http_status_code: u16,
}

impl FieldError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            http_status_code: STATUS_UNPROCESSABLE,
        }
    }

    pub fn not_found(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            http_status_code: STATUS_NOT_FOUND,
        }
    }

    pub fn conflict(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            http_status_code: STATUS_CONFLICT,
        }
    }

    /// Standard error for a blank required cell.
    pub fn missing_required(field: &str) -> Self {
        Self::validation(field, "Missing required data")
    }
}

/// All errors recorded against one spreadsheet row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowErrors {
    /// 1-based spreadsheet row; the header is row 1.
    pub row_number: usize,
    pub errors: Vec<FieldError>,
}

/// Accumulator for row errors discovered across validation, resolution and
/// merging. Rows are kept in spreadsheet order.
#[derive(Debug, Clone, Default)]
pub struct ValidationErrors {
    rows: BTreeMap<usize, Vec<FieldError>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, row_number: usize, error: FieldError) {
        let errors = self.rows.entry(row_number).or_default();
        if !errors.contains(&error) {
            errors.push(error);
        }
    }

    pub fn extend(&mut self, row_number: usize, errors: impl IntoIterator<Item = FieldError>) {
        for error in errors {
            self.add(row_number, error);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of rows carrying at least one error.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn has_errors(&self, row_number: usize) -> bool {
        self.rows.contains_key(&row_number)
    }

    pub fn for_row(&self, row_number: usize) -> &[FieldError] {
        self.rows
            .get(&row_number)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn into_rows(self) -> Vec<RowErrors> {
        self.rows
            .into_iter()
            .map(|(row_number, errors)| RowErrors { row_number, errors })
            .collect()
    }
}
