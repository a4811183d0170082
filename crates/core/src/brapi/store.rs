use async_trait::async_trait;

use super::{
    Germplasm, GermplasmList, Location, Observation, ObservationUnit, ObservationVariable, Plate,
    Sample, Study, Trial,
};
use crate::types::ProgramId;

/// Failure talking to the BrAPI store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store answered with a non-success status.
    #[error("BrAPI API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("BrAPI request failed: {0}")]
    Transport(String),

    #[error("Unexpected BrAPI response: {0}")]
    Decode(String),

    #[error("BrAPI store unavailable: {0}")]
    Unavailable(String),
}

/// Lookup criteria for observation units.
///
/// Units match when they belong to one of `study_db_ids` or carry one of
/// `reference_ids` under `reference_source`.
#[derive(Debug, Clone, Default)]
pub struct ObservationUnitQuery {
    pub study_db_ids: Vec<String>,
    pub reference_source: Option<String>,
    pub reference_ids: Vec<String>,
}

/// Read/write access to the breeding-data service.
///
/// Finders take batches of keys and return whatever matches; an empty key
/// list returns nothing without contacting the store. `create_*` returns the
/// records with their store-assigned db ids filled in, in input order.
#[async_trait]
pub trait BrapiStore: Send + Sync {
    async fn find_germplasm(
        &self,
        program_id: ProgramId,
        accession_numbers: &[String],
    ) -> Result<Vec<Germplasm>, StoreError>;

    /// All observation variables defined for the program.
    async fn find_variables(
        &self,
        program_id: ProgramId,
    ) -> Result<Vec<ObservationVariable>, StoreError>;

    async fn find_locations(
        &self,
        program_id: ProgramId,
        names: &[String],
    ) -> Result<Vec<Location>, StoreError>;

    async fn find_trials(
        &self,
        program_id: ProgramId,
        names: &[String],
    ) -> Result<Vec<Trial>, StoreError>;

    async fn find_studies(&self, trial_db_ids: &[String]) -> Result<Vec<Study>, StoreError>;

    async fn find_observation_units(
        &self,
        query: &ObservationUnitQuery,
    ) -> Result<Vec<ObservationUnit>, StoreError>;

    async fn find_observations(
        &self,
        unit_db_ids: &[String],
    ) -> Result<Vec<Observation>, StoreError>;

    async fn find_plates(
        &self,
        program_id: ProgramId,
        names: &[String],
    ) -> Result<Vec<Plate>, StoreError>;

    async fn find_samples(&self, plate_db_ids: &[String]) -> Result<Vec<Sample>, StoreError>;

    async fn create_germplasm(&self, items: Vec<Germplasm>) -> Result<Vec<Germplasm>, StoreError>;

    async fn create_list(&self, list: GermplasmList) -> Result<GermplasmList, StoreError>;

    async fn create_locations(&self, items: Vec<Location>) -> Result<Vec<Location>, StoreError>;

    async fn create_trials(&self, items: Vec<Trial>) -> Result<Vec<Trial>, StoreError>;

    async fn create_studies(&self, items: Vec<Study>) -> Result<Vec<Study>, StoreError>;

    async fn create_observation_units(
        &self,
        items: Vec<ObservationUnit>,
    ) -> Result<Vec<ObservationUnit>, StoreError>;

    async fn create_observations(
        &self,
        items: Vec<Observation>,
    ) -> Result<Vec<Observation>, StoreError>;

    /// Replace existing observations, matched by `observation_db_id`.
    async fn update_observations(
        &self,
        items: Vec<Observation>,
    ) -> Result<Vec<Observation>, StoreError>;

    async fn create_plates(&self, items: Vec<Plate>) -> Result<Vec<Plate>, StoreError>;

    async fn create_samples(&self, items: Vec<Sample>) -> Result<Vec<Sample>, StoreError>;
}
