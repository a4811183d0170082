//! Preview payload: per-row entity tagging and per-entity statistics.
//!
//! The same structure is produced by preview and by commit runs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::brapi::ExternalReference;
use crate::merge::{MergeAction, ObservationChange};
use crate::validation::rules::{FieldError, ValidationErrors};
use crate::workflow::{EntityKind, WorkflowKind};

/// Whether an entity already exists in the store or will be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityState {
    New,
    Existing,
}

impl EntityState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Existing => "EXISTING",
        }
    }
}

/// An entity held by a plan, tagged with its state.
#[derive(Debug, Clone, PartialEq)]
pub struct Pending<T> {
    pub state: EntityState,
    pub object: T,
}

impl<T> Pending<T> {
    pub fn new(object: T) -> Self {
        Self {
            state: EntityState::New,
            object,
        }
    }

    pub fn existing(object: T) -> Self {
        Self {
            state: EntityState::Existing,
            object,
        }
    }

    pub fn is_new(&self) -> bool {
        self.state == EntityState::New
    }
}

/// One entity as shown on a preview row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowEntity {
    pub state: EntityState,
    pub brapi_object: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_reference: Option<ExternalReference>,
}

impl RowEntity {
    pub fn new<T: Serialize>(
        state: EntityState,
        object: &T,
        external_reference: Option<ExternalReference>,
    ) -> Self {
        Self {
            state,
            brapi_object: serde_json::to_value(object).unwrap_or(Value::Null),
            external_reference,
        }
    }
}

/// Result for one spreadsheet row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowResult {
    pub row_number: usize,
    pub entities: BTreeMap<EntityKind, RowEntity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub observations: Vec<ObservationChange>,
    #[serde(default)]
    pub field_errors: Vec<FieldError>,
}

impl RowResult {
    pub fn new(row_number: usize) -> Self {
        Self {
            row_number,
            ..Self::default()
        }
    }

    pub fn insert(&mut self, kind: EntityKind, entity: RowEntity) {
        self.entities.insert(kind, entity);
    }

    pub fn state(&self, kind: EntityKind) -> Option<EntityState> {
        self.entities.get(&kind).map(|e| e.state)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityStatistics {
    pub new_count: usize,
    pub existing_count: usize,
}

/// The sample submission created by a sample-submission import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleSubmission {
    pub submission_id: Uuid,
    pub name: String,
}

/// Full preview (or commit) response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPreview {
    pub workflow: WorkflowKind,
    pub rows: Vec<RowResult>,
    pub statistics: BTreeMap<EntityKind, EntityStatistics>,
    /// Trait columns of experiment uploads, in file order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dynamic_columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission: Option<SampleSubmission>,
}

impl ImportPreview {
    pub fn new(workflow: WorkflowKind) -> Self {
        Self {
            workflow,
            rows: Vec::new(),
            statistics: BTreeMap::new(),
            dynamic_columns: Vec::new(),
            submission: None,
        }
    }

    /// Count one distinct entity.
    pub fn count(&mut self, kind: EntityKind, state: EntityState) {
        let stats = self.statistics.entry(kind).or_default();
        match state {
            EntityState::New => stats.new_count += 1,
            EntityState::Existing => stats.existing_count += 1,
        }
    }

    /// Count every distinct entity of a plan map.
    pub fn count_all<'a, T: 'a>(
        &mut self,
        kind: EntityKind,
        entities: impl IntoIterator<Item = &'a Pending<T>>,
    ) {
        for entity in entities {
            self.count(kind, entity.state);
        }
    }

    /// Observations count as new when created and existing when overwritten.
    pub fn count_observations(&mut self) {
        let actions: Vec<MergeAction> = self
            .rows
            .iter()
            .flat_map(|r| r.observations.iter().map(|o| o.action))
            .collect();
        for action in actions {
            match action {
                MergeAction::Create => self.count(EntityKind::Observation, EntityState::New),
                MergeAction::Overwrite => self.count(EntityKind::Observation, EntityState::Existing),
                MergeAction::NoOp => {}
            }
        }
    }

    /// Copy collected row errors onto their rows.
    pub fn attach_errors(&mut self, errors: &ValidationErrors) {
        for row in &mut self.rows {
            row.field_errors = errors.for_row(row.row_number).to_vec();
        }
    }

    pub fn row(&self, row_number: usize) -> Option<&RowResult> {
        self.rows.iter().find(|r| r.row_number == row_number)
    }
}
