//! BrAPI v2 domain objects and the store abstraction the engine reads from
//! and writes to.
//!
//! Field names follow the BrAPI v2 JSON schema (camelCase). Only the fields
//! the import workflows read or write are modelled; anything else a server
//! returns is dropped on deserialization.

pub mod memory;
pub mod store;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::workflow::EntityKind;

pub use memory::MemoryStore;
pub use store::{BrapiStore, ObservationUnitQuery, StoreError};

/// Additional-info key carrying the overwrite reason on replaced observations.
pub const INFO_OVERWRITE_REASON: &str = "overwriteReason";
/// Additional-info key carrying the value an overwrite replaced.
pub const INFO_PREVIOUS_VALUE: &str = "previousValue";
/// Additional-info key naming the user that created a record through an import.
pub const INFO_CREATED_BY: &str = "createdBy";

/// Link between a BrAPI record and the system that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalReference {
    #[serde(rename = "referenceSource")]
    pub reference_source: String,
    #[serde(rename = "referenceID", alias = "referenceId")]
    pub reference_id: String,
}

impl ExternalReference {
    /// Reference owned by this system for an entity kind:
    /// `{base}/{segment}` + id.
    pub fn for_entity(base: &str, kind: EntityKind, reference_id: impl Into<String>) -> Self {
        Self {
            reference_source: source_for(base, kind),
            reference_id: reference_id.into(),
        }
    }
}

/// Reference source string for one entity kind.
pub fn source_for(base: &str, kind: EntityKind) -> String {
    format!("{}/{}", base.trim_end_matches('/'), kind.segment())
}

/// The reference id carried under `source`, if any.
pub fn reference_id<'a>(references: &'a [ExternalReference], source: &str) -> Option<&'a str> {
    references
        .iter()
        .find(|r| r.reference_source == source)
        .map(|r| r.reference_id.as_str())
}

/// Replace every reference under `source` with a single new one.
pub fn set_reference(references: &mut Vec<ExternalReference>, reference: ExternalReference) {
    references.retain(|r| r.reference_source != reference.reference_source);
    references.push(reference);
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Synonym {
    pub synonym: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub synonym_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Germplasm {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub germplasm_db_id: Option<String>,
    pub germplasm_name: String,
    /// The program-scoped GID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accession_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breeding_method_db_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pedigree: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<Synonym>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_db_id: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub additional_info: Map<String, Value>,
    #[serde(default)]
    pub external_references: Vec<ExternalReference>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GermplasmList {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_db_id: Option<String>,
    pub list_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_description: Option<String>,
    pub list_type: String,
    /// Germplasm db ids in entry order.
    #[serde(default)]
    pub data: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_owner_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_db_id: Option<String>,
    #[serde(default)]
    pub external_references: Vec<ExternalReference>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_db_id: Option<String>,
    pub location_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_db_id: Option<String>,
    #[serde(default)]
    pub external_references: Vec<ExternalReference>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trial {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trial_db_id: Option<String>,
    pub trial_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trial_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_db_id: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub additional_info: Map<String, Value>,
    #[serde(default)]
    pub external_references: Vec<ExternalReference>,
}

/// An environment of an experiment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Study {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub study_db_id: Option<String>,
    pub study_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trial_db_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_db_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
    /// The environment year is the first season.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub seasons: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub study_type: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub additional_info: Map<String, Value>,
    #[serde(default)]
    pub external_references: Vec<ExternalReference>,
}

impl Study {
    pub fn year(&self) -> Option<&str> {
        self.seasons.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationLevel {
    pub level_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level_code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationUnitPosition {
    /// `TEST` or `CHECK`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation_level: Option<ObservationLevel>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub observation_level_relationships: Vec<ObservationLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_coordinate_x: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_coordinate_y: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Treatment {
    pub factor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modality: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationUnit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation_unit_db_id: Option<String>,
    /// The `Exp Unit ID` of the upload.
    pub observation_unit_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub germplasm_db_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub germplasm_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub study_db_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub study_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trial_db_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trial_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_db_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_db_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation_unit_position: Option<ObservationUnitPosition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub treatments: Vec<Treatment>,
    #[serde(default)]
    pub external_references: Vec<ExternalReference>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation_db_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation_unit_db_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation_variable_db_id: Option<String>,
    pub observation_variable_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub germplasm_db_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub study_db_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation_time_stamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collector: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub additional_info: Map<String, Value>,
    #[serde(default)]
    pub external_references: Vec<ExternalReference>,
}

/// A trait (observation variable) defined for a program.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationVariable {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation_variable_db_id: Option<String>,
    pub observation_variable_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_db_id: Option<String>,
    #[serde(default)]
    pub external_references: Vec<ExternalReference>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plate_db_id: Option<String>,
    pub plate_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plate_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_db_id: Option<String>,
    #[serde(default)]
    pub external_references: Vec<ExternalReference>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_db_id: Option<String>,
    pub sample_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plate_db_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plate_name: Option<String>,
    /// Plate row letter, `A`-`H`.
    pub row: String,
    /// Plate column, 1-12.
    pub column: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub well: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub germplasm_db_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tissue_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_db_id: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub additional_info: Map<String, Value>,
    #[serde(default)]
    pub external_references: Vec<ExternalReference>,
}

/// Well label such as `B07`.
pub fn well_label(row: &str, column: i64) -> String {
    format!("{}{:02}", row.to_ascii_uppercase(), column)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_source_joins_base_and_segment() {
        let reference = ExternalReference::for_entity("breedinginsight.org/", EntityKind::Study, "x");
        assert_eq!(reference.reference_source, "breedinginsight.org/studies");
    }

    #[test]
    fn external_reference_uses_brapi_field_names() {
        let json = serde_json::to_value(ExternalReference::for_entity(
            "src",
            EntityKind::Trial,
            "abc",
        ))
        .unwrap();
        assert_eq!(json["referenceSource"], "src/trials");
        assert_eq!(json["referenceID"], "abc");

        let parsed: ExternalReference =
            serde_json::from_str(r#"{"referenceSource":"s","referenceId":"1"}"#).unwrap();
        assert_eq!(parsed.reference_id, "1");
    }

    #[test]
    fn set_reference_replaces_same_source() {
        let mut refs = vec![
            ExternalReference::for_entity("src", EntityKind::Observation, "old"),
            ExternalReference {
                reference_source: "other".to_string(),
                reference_id: "keep".to_string(),
            },
        ];
        set_reference(
            &mut refs,
            ExternalReference::for_entity("src", EntityKind::Observation, "new"),
        );
        assert_eq!(refs.len(), 2);
        assert_eq!(reference_id(&refs, "src/observations"), Some("new"));
    }

    #[test]
    fn well_label_pads_column() {
        assert_eq!(well_label("b", 7), "B07");
    }
}
