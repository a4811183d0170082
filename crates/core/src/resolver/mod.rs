//! Entity resolution: look up what each row refers to, tag every entity
//! New or Existing, and build the plan a commit would execute.
//!
//! Store lookups are batched per entity kind over the distinct keys of the
//! whole file. Cross-row invariants fail the file with one aggregated error;
//! everything row-local is collected into [`ValidationErrors`].

pub mod experiment;
pub mod germplasm;
pub mod sample;

use std::collections::BTreeMap;

use indexmap::{IndexMap, IndexSet};
use uuid::Uuid;

use crate::brapi::{
    BrapiStore, ExternalReference, Germplasm, GermplasmList, Location, Observation,
    ObservationUnit, Plate, Sample, Study, Trial,
};
use crate::error::ImportError;
use crate::mapping::{MappedRow, MappedTable, MappingDefinition};
use crate::merge::ObservationChange;
use crate::preview::{ImportPreview, Pending, SampleSubmission};
use crate::types::{ImportId, ProgramId};
use crate::validation::rules::ValidationErrors;
use crate::validation::uniqueness::format_id_list;
use crate::workflow::{EntityKind, WorkflowKind};

/// Everything a resolver needs besides the rows themselves.
pub struct ResolveContext<'a> {
    pub store: &'a dyn BrapiStore,
    pub program_id: ProgramId,
    pub import_id: ImportId,
    /// Base of every external reference source written by this system.
    pub reference_source: &'a str,
    pub overwrite: bool,
    pub overwrite_reason: Option<&'a str>,
    pub user_fields: &'a BTreeMap<String, String>,
    pub created_by: Option<&'a str>,
    pub file_name: Option<&'a str>,
}

impl ResolveContext<'_> {
    pub fn program_db_id(&self) -> String {
        self.program_id.to_string()
    }

    /// Reference tying an entity to this import.
    pub fn import_reference(&self, kind: EntityKind) -> ExternalReference {
        ExternalReference::for_entity(self.reference_source, kind, self.import_id.to_string())
    }

    pub fn reference(&self, kind: EntityKind, id: impl Into<String>) -> ExternalReference {
        ExternalReference::for_entity(self.reference_source, kind, id)
    }

    pub fn source(&self, kind: EntityKind) -> String {
        crate::brapi::source_for(self.reference_source, kind)
    }

    /// Non-blank user-supplied field.
    pub fn user_field(&self, name: &str) -> Option<&str> {
        self.user_fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

// ---- Plans ----

pub struct GermplasmEntry {
    pub row_number: usize,
    pub entry_number: i64,
    pub germplasm: Germplasm,
}

pub struct GermplasmPlan {
    pub list: Pending<GermplasmList>,
    /// Sorted by entry number.
    pub entries: Vec<GermplasmEntry>,
}

pub struct PlannedStudy {
    pub trial_key: String,
    pub location_key: Option<String>,
    pub study: Pending<Study>,
}

pub struct PlannedUnit {
    pub row_number: usize,
    /// `None` for units addressed directly by ObsUnitID.
    pub study_key: Option<(String, String)>,
    pub unit: Pending<ObservationUnit>,
}

pub struct PlannedObservation {
    /// Index into [`ExperimentPlan::units`].
    pub unit_index: usize,
    pub change: ObservationChange,
    /// The record to create, or the existing record with its new value.
    pub observation: Observation,
}

#[derive(Default)]
pub struct ExperimentPlan {
    /// Keyed by location name.
    pub locations: IndexMap<String, Pending<Location>>,
    /// Keyed by experiment title.
    pub trials: IndexMap<String, Pending<Trial>>,
    /// Keyed by (title, environment).
    pub studies: IndexMap<(String, String), PlannedStudy>,
    pub units: Vec<PlannedUnit>,
    pub observations: Vec<PlannedObservation>,
}

pub struct PlannedSample {
    pub row_number: usize,
    pub plate_key: String,
    pub sample: Sample,
}

pub struct SamplePlan {
    pub submission: SampleSubmission,
    /// Keyed by plate name.
    pub plates: IndexMap<String, Pending<Plate>>,
    pub samples: Vec<PlannedSample>,
}

/// What a commit would write, in the shape of the workflow.
pub enum ImportPlan {
    Germplasm(GermplasmPlan),
    Experiment(ExperimentPlan),
    Sample(SamplePlan),
}

/// Resolver output.
pub struct Resolution {
    pub plan: ImportPlan,
    pub preview: ImportPreview,
}

/// Resolve a mapped file for the definition's workflow.
pub async fn resolve(
    ctx: &ResolveContext<'_>,
    definition: &MappingDefinition,
    table: &MappedTable,
    errors: &mut ValidationErrors,
) -> Result<Resolution, ImportError> {
    match definition.workflow {
        WorkflowKind::Germplasm => germplasm::resolve(ctx, table, errors).await,
        WorkflowKind::NewExperiment | WorkflowKind::AppendOverwrite => {
            experiment::resolve(ctx, definition.workflow, table, errors).await
        }
        WorkflowKind::SampleSubmission => sample::resolve(ctx, table, errors).await,
    }
}

/// Collects unresolved identifiers by label and reduces them to one
/// [`ImportError::MissingReference`].
#[derive(Default)]
pub(crate) struct MissingReferences {
    missing: Vec<(&'static str, Vec<String>)>,
}

impl MissingReferences {
    pub fn add(&mut self, label: &'static str, ids: impl IntoIterator<Item = String>) {
        let ids: Vec<String> = ids.into_iter().collect();
        if ids.is_empty() {
            return;
        }
        match self.missing.iter_mut().find(|(l, _)| *l == label) {
            Some((_, existing)) => existing.extend(ids),
            None => self.missing.push((label, ids)),
        }
    }

    pub fn into_result(self) -> Result<(), ImportError> {
        if self.missing.is_empty() {
            return Ok(());
        }
        let message = self
            .missing
            .into_iter()
            .map(|(label, ids)| format!("{label} not found: {}", format_id_list(ids)))
            .collect::<Vec<_>>()
            .join("; ");
        Err(ImportError::MissingReference { message })
    }
}

/// Fresh identifier for records this import introduces (observation units,
/// sample submissions).
pub(crate) fn new_reference_id() -> String {
    Uuid::new_v4().to_string()
}

/// Distinct non-blank values of a column, in first-seen order.
pub(crate) fn distinct_values(rows: &[MappedRow], column: &str) -> Vec<String> {
    let mut seen: IndexSet<String> = IndexSet::new();
    for row in rows {
        if let Some(value) = row.get(column) {
            seen.insert(value.to_string());
        }
    }
    seen.into_iter().collect()
}

/// Split a `;` separated cell into trimmed non-blank parts.
pub(crate) fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
