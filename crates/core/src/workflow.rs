//! Import workflows and the entity kinds they touch.

use serde::{Deserialize, Serialize};

/// The import use case selected for an upload.
///
/// Resolution and merge rules are chosen by matching on this tag; there is no
/// per-field configuration beyond column aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    /// Create a brand-new experiment with its environments and units.
    NewExperiment,
    /// Add observations (or new units) to an experiment that already exists.
    AppendOverwrite,
    /// Create germplasm records and a germplasm list.
    Germplasm,
    /// Register plates and samples for genotyping.
    SampleSubmission,
}

impl WorkflowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewExperiment => "new_experiment",
            Self::AppendOverwrite => "append_overwrite",
            Self::Germplasm => "germplasm",
            Self::SampleSubmission => "sample_submission",
        }
    }

    /// Parse a workflow id. Returns `None` for unknown values.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "new_experiment" => Some(Self::NewExperiment),
            "append_overwrite" => Some(Self::AppendOverwrite),
            "germplasm" => Some(Self::Germplasm),
            "sample_submission" => Some(Self::SampleSubmission),
            _ => None,
        }
    }

    pub const ALL: &'static [&'static str] = &[
        "new_experiment",
        "append_overwrite",
        "germplasm",
        "sample_submission",
    ];

    /// Entity kinds written on commit, in dependency order.
    pub fn write_order(&self) -> &'static [EntityKind] {
        match self {
            Self::NewExperiment | Self::AppendOverwrite => &[
                EntityKind::Location,
                EntityKind::Trial,
                EntityKind::Study,
                EntityKind::ObservationUnit,
                EntityKind::Observation,
            ],
            Self::Germplasm => &[EntityKind::Germplasm, EntityKind::GermplasmList],
            Self::SampleSubmission => &[EntityKind::Plate, EntityKind::Sample],
        }
    }

    pub fn is_experiment(&self) -> bool {
        matches!(self, Self::NewExperiment | Self::AppendOverwrite)
    }
}

impl std::fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain entity types tracked per row. Declaration order is dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Germplasm,
    GermplasmList,
    Location,
    Trial,
    Study,
    ObservationUnit,
    Observation,
    Plate,
    Sample,
}

impl EntityKind {
    /// Path segment used for external reference sources and REST endpoints.
    pub fn segment(&self) -> &'static str {
        match self {
            Self::Germplasm => "germplasm",
            Self::GermplasmList => "lists",
            Self::Location => "locations",
            Self::Trial => "trials",
            Self::Study => "studies",
            Self::ObservationUnit => "observationunits",
            Self::Observation => "observations",
            Self::Plate => "plates",
            Self::Sample => "samples",
        }
    }
}
