//! Merge rules for uploaded observation values against what the store
//! already holds for the same (observation unit, trait).

use serde::{Deserialize, Serialize};

use crate::validation::rules::FieldError;

/// What a commit will do with one uploaded observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MergeAction {
    Create,
    Overwrite,
    NoOp,
}

impl MergeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Overwrite => "OVERWRITE",
            Self::NoOp => "NO_OP",
        }
    }

    /// Whether a commit has to write anything.
    pub fn writes(&self) -> bool {
        !matches!(self, Self::NoOp)
    }
}

/// Outcome of merging one trait cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationChange {
    pub variable: String,
    pub action: MergeAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_value: Option<String>,
}

/// Merge an uploaded cell into the existing value.
///
/// * blank upload: no-op, whatever exists
/// * nothing stored: create
/// * same value: no-op
/// * stored record without a value: overwrite, this only fills it in
/// * different value: overwrite when `overwrite` is set, otherwise a 409
///   on the trait column
pub fn merge_observation(
    variable: &str,
    uploaded: Option<&str>,
    existing: Option<&str>,
    overwrite: bool,
) -> Result<ObservationChange, FieldError> {
    let uploaded = uploaded.map(str::trim).filter(|v| !v.is_empty());

    let change = |action, previous: Option<&str>| ObservationChange {
        variable: variable.to_string(),
        action,
        value: uploaded.map(str::to_string),
        previous_value: previous.map(str::to_string),
    };

    let Some(value) = uploaded else {
        return Ok(change(MergeAction::NoOp, None));
    };

    match existing.map(str::trim) {
        None => Ok(change(MergeAction::Create, None)),
        Some(current) if current == value => Ok(change(MergeAction::NoOp, None)),
        Some("") => Ok(change(MergeAction::Overwrite, None)),
        Some(current) if overwrite => Ok(change(MergeAction::Overwrite, Some(current))),
        Some(current) => Err(FieldError::conflict(
            variable,
            format!("Observation already exists with value \"{current}\""),
        )),
    }
}
