//! Built-in mapping definitions, one per upload template.

use serde::Serialize;

use crate::error::CoreError;
use crate::mapping::{ColumnSpec, ColumnType, ExtraColumns, MappingDefinition, Requirement};
use crate::workflow::WorkflowKind;

// ---- Germplasm template ----

pub const GERM_NAME: &str = "Name";
pub const GERM_BREEDING_METHOD: &str = "Breeding Method";
pub const GERM_SOURCE: &str = "Source";
pub const GERM_EXTERNAL_UID: &str = "External UID";
pub const GERM_ENTRY_NO: &str = "Entry No";
pub const GERM_FEMALE_GID: &str = "Female Parent GID";
pub const GERM_MALE_GID: &str = "Male Parent GID";
pub const GERM_FEMALE_ENTRY_NO: &str = "Female Parent Entry No";
pub const GERM_MALE_ENTRY_NO: &str = "Male Parent Entry No";
pub const GERM_SYNONYMS: &str = "Synonyms";

// ---- Experiment template ----

pub const EXP_GID: &str = "Germplasm GID";
pub const EXP_TEST_CHECK: &str = "Test (T) or Check (C)";
pub const EXP_TITLE: &str = "Exp Title";
pub const EXP_DESCRIPTION: &str = "Exp Description";
pub const EXP_UNIT: &str = "Exp Unit";
pub const EXP_TYPE: &str = "Exp Type";
pub const EXP_ENV: &str = "Env";
pub const EXP_ENV_LOCATION: &str = "Env Location";
pub const EXP_ENV_YEAR: &str = "Env Year";
pub const EXP_UNIT_ID: &str = "Exp Unit ID";
pub const EXP_REPLICATE: &str = "Exp Replicate #";
pub const EXP_BLOCK: &str = "Exp Block #";
pub const EXP_ROW: &str = "Row";
pub const EXP_COLUMN: &str = "Column";
pub const EXP_TREATMENT: &str = "Treatment Factors";
pub const EXP_OBS_UNIT_ID: &str = "ObsUnitID";

// ---- Sample submission template ----

pub const SAMPLE_PLATE_ID: &str = "PlateID";
pub const SAMPLE_ROW: &str = "Row";
pub const SAMPLE_COLUMN: &str = "Column";
pub const SAMPLE_ORGANISM: &str = "Organism";
pub const SAMPLE_SPECIES: &str = "Species";
pub const SAMPLE_GERMPLASM_NAME: &str = "Germplasm Name";
pub const SAMPLE_GID: &str = "GID";
pub const SAMPLE_TISSUE: &str = "Tissue";
pub const SAMPLE_COMMENTS: &str = "Comments";

/// Field name used for well collisions, covering both plate coordinates.
pub const SAMPLE_WELL_FIELD: &str = "Row/Column";

pub const MAPPING_GERMPLASM: &str = "germplasm";
pub const MAPPING_EXPERIMENT: &str = "experiment";
pub const MAPPING_SAMPLE_SUBMISSION: &str = "sample-submission";

pub const PLATE_ROWS: [&str; 8] = ["A", "B", "C", "D", "E", "F", "G", "H"];
pub const PLATE_COLUMNS: i64 = 12;

/// Breeding-method codes accepted when `BREEDING_METHODS` is not configured.
pub const DEFAULT_BREEDING_METHODS: &[&str] = &[
    "AFP", "BPC", "BCR", "CCX", "CFG", "DBC", "DHL", "F1", "GMS", "MUT", "OPN", "SIB", "SLF",
    "SPC", "THC", "UNK",
];

/// Short listing entry for `GET /mappings`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingSummary {
    pub id: String,
    pub name: String,
    pub workflows: Vec<WorkflowKind>,
    pub default_workflow: WorkflowKind,
}

/// Source of mapping definitions.
pub trait MappingRegistry: Send + Sync {
    /// Mapping for an upload. `workflow` picks between workflows served by the
    /// same template; `None` selects the template's default.
    fn get_mapping(
        &self,
        mapping_id: &str,
        workflow: Option<WorkflowKind>,
    ) -> Result<MappingDefinition, CoreError>;

    fn list(&self) -> Vec<MappingSummary>;
}

/// The fixed set of templates shipped with the service.
#[derive(Debug, Clone)]
pub struct BuiltinMappings {
    breeding_methods: Vec<String>,
}

impl Default for BuiltinMappings {
    fn default() -> Self {
        Self::new(DEFAULT_BREEDING_METHODS.iter().map(|m| m.to_string()).collect())
    }
}

impl BuiltinMappings {
    pub fn new(breeding_methods: Vec<String>) -> Self {
        Self { breeding_methods }
    }

    fn workflows(mapping_id: &str) -> Option<&'static [WorkflowKind]> {
        match mapping_id {
            MAPPING_GERMPLASM => Some(&[WorkflowKind::Germplasm]),
            MAPPING_EXPERIMENT => Some(&[WorkflowKind::NewExperiment, WorkflowKind::AppendOverwrite]),
            MAPPING_SAMPLE_SUBMISSION => Some(&[WorkflowKind::SampleSubmission]),
            _ => None,
        }
    }

    fn germplasm(&self) -> MappingDefinition {
        MappingDefinition {
            id: MAPPING_GERMPLASM.to_string(),
            name: "Germplasm Import".to_string(),
            workflow: WorkflowKind::Germplasm,
            columns: vec![
                ColumnSpec::required(GERM_NAME, ColumnType::Text).with_aliases(&["Germplasm Name"]),
                ColumnSpec::required(
                    GERM_BREEDING_METHOD,
                    ColumnType::enumerated(self.breeding_methods.clone()),
                ),
                ColumnSpec::required(GERM_SOURCE, ColumnType::Text),
                ColumnSpec::optional(GERM_EXTERNAL_UID, ColumnType::Text),
                ColumnSpec::optional(
                    GERM_ENTRY_NO,
                    ColumnType::Integer {
                        min: Some(1),
                        max: None,
                    },
                )
                .with_aliases(&["Entry Number"]),
                ColumnSpec::optional(GERM_FEMALE_GID, ColumnType::Text),
                ColumnSpec::optional(GERM_MALE_GID, ColumnType::Text),
                ColumnSpec::optional(GERM_FEMALE_ENTRY_NO, ColumnType::integer()),
                ColumnSpec::optional(GERM_MALE_ENTRY_NO, ColumnType::integer()),
                ColumnSpec::optional(GERM_SYNONYMS, ColumnType::Text)
                    .with_description("Semicolon separated"),
            ],
            extra_columns: ExtraColumns::Ignore,
        }
    }

    fn experiment(&self, workflow: WorkflowKind) -> MappingDefinition {
        // Append rows may address an existing unit directly by ObsUnitID.
        let hierarchy = |name: &str, data_type: ColumnType| match workflow {
            WorkflowKind::AppendOverwrite => ColumnSpec::new(
                name,
                data_type,
                Requirement::RequiredUnless(EXP_OBS_UNIT_ID.to_string()),
            ),
            _ => ColumnSpec::required(name, data_type),
        };

        let name = match workflow {
            WorkflowKind::AppendOverwrite => "Experiment Append/Overwrite",
            _ => "New Experiment",
        };

        MappingDefinition {
            id: MAPPING_EXPERIMENT.to_string(),
            name: name.to_string(),
            workflow,
            columns: vec![
                hierarchy(EXP_GID, ColumnType::Text).with_aliases(&["GID"]),
                hierarchy(EXP_TEST_CHECK, ColumnType::enumerated(["T", "C"])),
                hierarchy(EXP_TITLE, ColumnType::Text),
                ColumnSpec::optional(EXP_DESCRIPTION, ColumnType::Text),
                hierarchy(EXP_UNIT, ColumnType::Text),
                hierarchy(EXP_TYPE, ColumnType::Text),
                hierarchy(EXP_ENV, ColumnType::Text).with_aliases(&["Environment"]),
                hierarchy(EXP_ENV_LOCATION, ColumnType::Text),
                hierarchy(
                    EXP_ENV_YEAR,
                    ColumnType::Integer {
                        min: Some(1000),
                        max: Some(9999),
                    },
                ),
                hierarchy(EXP_UNIT_ID, ColumnType::Text),
                hierarchy(EXP_REPLICATE, ColumnType::integer()),
                ColumnSpec::optional(EXP_BLOCK, ColumnType::integer()),
                ColumnSpec::optional(EXP_ROW, ColumnType::Text),
                ColumnSpec::optional(EXP_COLUMN, ColumnType::Text),
                ColumnSpec::optional(EXP_TREATMENT, ColumnType::Text)
                    .with_description("Semicolon separated"),
                ColumnSpec::optional(EXP_OBS_UNIT_ID, ColumnType::Text),
            ],
            extra_columns: ExtraColumns::Traits,
        }
    }

    fn sample_submission(&self) -> MappingDefinition {
        MappingDefinition {
            id: MAPPING_SAMPLE_SUBMISSION.to_string(),
            name: "Sample Submission".to_string(),
            workflow: WorkflowKind::SampleSubmission,
            columns: vec![
                ColumnSpec::required(SAMPLE_PLATE_ID, ColumnType::Text).with_aliases(&["Plate ID"]),
                ColumnSpec::required(SAMPLE_ROW, ColumnType::enumerated(PLATE_ROWS)),
                ColumnSpec::required(
                    SAMPLE_COLUMN,
                    ColumnType::Integer {
                        min: Some(1),
                        max: Some(PLATE_COLUMNS),
                    },
                ),
                ColumnSpec::required(SAMPLE_ORGANISM, ColumnType::Text),
                ColumnSpec::optional(SAMPLE_SPECIES, ColumnType::Text),
                ColumnSpec::optional(SAMPLE_GERMPLASM_NAME, ColumnType::Text),
                ColumnSpec::optional(SAMPLE_GID, ColumnType::Text),
                ColumnSpec::required(SAMPLE_TISSUE, ColumnType::Text),
                ColumnSpec::optional(SAMPLE_COMMENTS, ColumnType::Text),
            ],
            extra_columns: ExtraColumns::Ignore,
        }
    }
}

impl MappingRegistry for BuiltinMappings {
    fn get_mapping(
        &self,
        mapping_id: &str,
        workflow: Option<WorkflowKind>,
    ) -> Result<MappingDefinition, CoreError> {
        let supported = Self::workflows(mapping_id).ok_or_else(|| CoreError::NotFound {
            entity: "Mapping",
            id: mapping_id.to_string(),
        })?;

        let workflow = match workflow {
            Some(w) if supported.contains(&w) => w,
            Some(w) => {
                return Err(CoreError::Validation(format!(
                    "Mapping '{mapping_id}' does not support workflow '{w}'"
                )))
            }
            None => supported[0],
        };

        Ok(match workflow {
            WorkflowKind::Germplasm => self.germplasm(),
            WorkflowKind::NewExperiment | WorkflowKind::AppendOverwrite => {
                self.experiment(workflow)
            }
            WorkflowKind::SampleSubmission => self.sample_submission(),
        })
    }

    fn list(&self) -> Vec<MappingSummary> {
        [
            (MAPPING_GERMPLASM, "Germplasm Import"),
            (MAPPING_EXPERIMENT, "Experiments & Observations"),
            (MAPPING_SAMPLE_SUBMISSION, "Sample Submission"),
        ]
        .into_iter()
        .filter_map(|(id, name)| {
            let workflows = Self::workflows(id)?;
            Some(MappingSummary {
                id: id.to_string(),
                name: name.to_string(),
                workflows: workflows.to_vec(),
                default_workflow: workflows[0],
            })
        })
        .collect()
    }
}
