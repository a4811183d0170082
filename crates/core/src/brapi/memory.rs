//! In-process BrAPI store used by tests and by local runs without a
//! `BRAPI_URL`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::store::{BrapiStore, ObservationUnitQuery, StoreError};
use super::{
    Germplasm, GermplasmList, Location, Observation, ObservationUnit, ObservationVariable, Plate,
    Sample, Study, Trial,
};
use crate::types::ProgramId;
use crate::workflow::EntityKind;

#[derive(Default)]
struct Records {
    germplasm: Vec<Germplasm>,
    lists: Vec<GermplasmList>,
    variables: Vec<ObservationVariable>,
    locations: Vec<Location>,
    trials: Vec<Trial>,
    studies: Vec<Study>,
    units: Vec<ObservationUnit>,
    observations: Vec<Observation>,
    plates: Vec<Plate>,
    samples: Vec<Sample>,
}

#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Records>,
    unavailable: AtomicBool,
    failing_kind: Mutex<Option<EntityKind>>,
}

fn new_db_id() -> String {
    Uuid::new_v4().to_string()
}

fn in_program(program_db_id: &Option<String>, program_id: ProgramId) -> bool {
    program_db_id.as_deref() == Some(program_id.to_string().as_str())
}

fn contains(keys: &[String], value: &str) -> bool {
    keys.iter().any(|k| k == value)
}

fn contains_opt(keys: &[String], value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| contains(keys, v))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make creates and updates of one entity kind fail while every other
    /// call succeeds. `None` clears it.
    pub fn fail_writes_of(&self, kind: Option<EntityKind>) {
        *self.failing_kind.lock().unwrap_or_else(|e| e.into_inner()) = kind;
    }

    /// Register an observation variable for a program.
    pub async fn add_variable(&self, program_id: ProgramId, name: &str) -> ObservationVariable {
        let variable = ObservationVariable {
            observation_variable_db_id: Some(new_db_id()),
            observation_variable_name: name.to_string(),
            program_db_id: Some(program_id.to_string()),
            external_references: Vec::new(),
        };
        self.records.write().await.variables.push(variable.clone());
        variable
    }

    /// Number of stored records of a kind.
    pub async fn count(&self, kind: EntityKind) -> usize {
        let records = self.records.read().await;
        match kind {
            EntityKind::Germplasm => records.germplasm.len(),
            EntityKind::GermplasmList => records.lists.len(),
            EntityKind::Location => records.locations.len(),
            EntityKind::Trial => records.trials.len(),
            EntityKind::Study => records.studies.len(),
            EntityKind::ObservationUnit => records.units.len(),
            EntityKind::Observation => records.observations.len(),
            EntityKind::Plate => records.plates.len(),
            EntityKind::Sample => records.samples.len(),
        }
    }

    pub async fn lists(&self) -> Vec<GermplasmList> {
        self.records.read().await.lists.clone()
    }

    pub async fn observations(&self) -> Vec<Observation> {
        self.records.read().await.observations.clone()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store disabled".to_string()));
        }
        Ok(())
    }

    fn check_writable(&self, kind: EntityKind) -> Result<(), StoreError> {
        self.check_available()?;
        let failing = *self.failing_kind.lock().unwrap_or_else(|e| e.into_inner());
        if failing == Some(kind) {
            return Err(StoreError::Unavailable(format!("{} writes disabled", kind.segment())));
        }
        Ok(())
    }
}

#[async_trait]
impl BrapiStore for MemoryStore {
    async fn find_germplasm(
        &self,
        program_id: ProgramId,
        accession_numbers: &[String],
    ) -> Result<Vec<Germplasm>, StoreError> {
        self.check_available()?;
        let records = self.records.read().await;
        Ok(records
            .germplasm
            .iter()
            .filter(|g| {
                in_program(&g.program_db_id, program_id)
                    && contains_opt(accession_numbers, &g.accession_number)
            })
            .cloned()
            .collect())
    }

    async fn find_variables(
        &self,
        program_id: ProgramId,
    ) -> Result<Vec<ObservationVariable>, StoreError> {
        self.check_available()?;
        let records = self.records.read().await;
        Ok(records
            .variables
            .iter()
            .filter(|v| in_program(&v.program_db_id, program_id))
            .cloned()
            .collect())
    }

    async fn find_locations(
        &self,
        program_id: ProgramId,
        names: &[String],
    ) -> Result<Vec<Location>, StoreError> {
        self.check_available()?;
        let records = self.records.read().await;
        Ok(records
            .locations
            .iter()
            .filter(|l| in_program(&l.program_db_id, program_id) && contains(names, &l.location_name))
            .cloned()
            .collect())
    }

    async fn find_trials(
        &self,
        program_id: ProgramId,
        names: &[String],
    ) -> Result<Vec<Trial>, StoreError> {
        self.check_available()?;
        let records = self.records.read().await;
        Ok(records
            .trials
            .iter()
            .filter(|t| in_program(&t.program_db_id, program_id) && contains(names, &t.trial_name))
            .cloned()
            .collect())
    }

    async fn find_studies(&self, trial_db_ids: &[String]) -> Result<Vec<Study>, StoreError> {
        self.check_available()?;
        let records = self.records.read().await;
        Ok(records
            .studies
            .iter()
            .filter(|s| contains_opt(trial_db_ids, &s.trial_db_id))
            .cloned()
            .collect())
    }

    async fn find_observation_units(
        &self,
        query: &ObservationUnitQuery,
    ) -> Result<Vec<ObservationUnit>, StoreError> {
        self.check_available()?;
        let records = self.records.read().await;
        Ok(records
            .units
            .iter()
            .filter(|u| {
                let by_study = contains_opt(&query.study_db_ids, &u.study_db_id);
                let by_reference = query.reference_source.as_deref().is_some_and(|source| {
                    u.external_references.iter().any(|r| {
                        r.reference_source == source && contains(&query.reference_ids, &r.reference_id)
                    })
                });
                by_study || by_reference
            })
            .cloned()
            .collect())
    }

    async fn find_observations(
        &self,
        unit_db_ids: &[String],
    ) -> Result<Vec<Observation>, StoreError> {
        self.check_available()?;
        let records = self.records.read().await;
        Ok(records
            .observations
            .iter()
            .filter(|o| contains_opt(unit_db_ids, &o.observation_unit_db_id))
            .cloned()
            .collect())
    }

    async fn find_plates(
        &self,
        program_id: ProgramId,
        names: &[String],
    ) -> Result<Vec<Plate>, StoreError> {
        self.check_available()?;
        let records = self.records.read().await;
        Ok(records
            .plates
            .iter()
            .filter(|p| in_program(&p.program_db_id, program_id) && contains(names, &p.plate_name))
            .cloned()
            .collect())
    }

    async fn find_samples(&self, plate_db_ids: &[String]) -> Result<Vec<Sample>, StoreError> {
        self.check_available()?;
        let records = self.records.read().await;
        Ok(records
            .samples
            .iter()
            .filter(|s| contains_opt(plate_db_ids, &s.plate_db_id))
            .cloned()
            .collect())
    }

    async fn create_germplasm(
        &self,
        mut items: Vec<Germplasm>,
    ) -> Result<Vec<Germplasm>, StoreError> {
        self.check_writable(EntityKind::Germplasm)?;
        let mut records = self.records.write().await;
        for item in &mut items {
            item.germplasm_db_id = Some(new_db_id());
            if item.accession_number.is_none() {
                // The service assigns GIDs sequentially per store.
                item.accession_number = Some((records.germplasm.len() + 1).to_string());
            }
            records.germplasm.push(item.clone());
        }
        Ok(items)
    }

    async fn create_list(&self, mut list: GermplasmList) -> Result<GermplasmList, StoreError> {
        self.check_writable(EntityKind::GermplasmList)?;
        list.list_db_id = Some(new_db_id());
        self.records.write().await.lists.push(list.clone());
        Ok(list)
    }

    async fn create_locations(&self, mut items: Vec<Location>) -> Result<Vec<Location>, StoreError> {
        self.check_writable(EntityKind::Location)?;
        let mut records = self.records.write().await;
        for item in &mut items {
            item.location_db_id = Some(new_db_id());
            records.locations.push(item.clone());
        }
        Ok(items)
    }

    async fn create_trials(&self, mut items: Vec<Trial>) -> Result<Vec<Trial>, StoreError> {
        self.check_writable(EntityKind::Trial)?;
        let mut records = self.records.write().await;
        for item in &mut items {
            item.trial_db_id = Some(new_db_id());
            records.trials.push(item.clone());
        }
        Ok(items)
    }

    async fn create_studies(&self, mut items: Vec<Study>) -> Result<Vec<Study>, StoreError> {
        self.check_writable(EntityKind::Study)?;
        let mut records = self.records.write().await;
        for item in &mut items {
            item.study_db_id = Some(new_db_id());
            records.studies.push(item.clone());
        }
        Ok(items)
    }

    async fn create_observation_units(
        &self,
        mut items: Vec<ObservationUnit>,
    ) -> Result<Vec<ObservationUnit>, StoreError> {
        self.check_writable(EntityKind::ObservationUnit)?;
        let mut records = self.records.write().await;
        for item in &mut items {
            item.observation_unit_db_id = Some(new_db_id());
            records.units.push(item.clone());
        }
        Ok(items)
    }

    async fn create_observations(
        &self,
        mut items: Vec<Observation>,
    ) -> Result<Vec<Observation>, StoreError> {
        self.check_writable(EntityKind::Observation)?;
        let mut records = self.records.write().await;
        for item in &mut items {
            item.observation_db_id = Some(new_db_id());
            records.observations.push(item.clone());
        }
        Ok(items)
    }

    async fn update_observations(
        &self,
        items: Vec<Observation>,
    ) -> Result<Vec<Observation>, StoreError> {
        self.check_writable(EntityKind::Observation)?;
        let mut records = self.records.write().await;
        for item in &items {
            let existing = records
                .observations
                .iter_mut()
                .find(|o| o.observation_db_id.is_some() && o.observation_db_id == item.observation_db_id)
                .ok_or_else(|| StoreError::Api {
                    status: 404,
                    body: format!(
                        "observation {} not found",
                        item.observation_db_id.as_deref().unwrap_or("<none>")
                    ),
                })?;
            *existing = item.clone();
        }
        Ok(items)
    }

    async fn create_plates(&self, mut items: Vec<Plate>) -> Result<Vec<Plate>, StoreError> {
        self.check_writable(EntityKind::Plate)?;
        let mut records = self.records.write().await;
        for item in &mut items {
            item.plate_db_id = Some(new_db_id());
            records.plates.push(item.clone());
        }
        Ok(items)
    }

    async fn create_samples(&self, mut items: Vec<Sample>) -> Result<Vec<Sample>, StoreError> {
        self.check_writable(EntityKind::Sample)?;
        let mut records = self.records.write().await;
        for item in &mut items {
            item.sample_db_id = Some(new_db_id());
            records.samples.push(item.clone());
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brapi::{ExternalReference, INFO_PREVIOUS_VALUE};
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn finders_are_scoped_to_program() {
        let store = MemoryStore::new();
        let program = Uuid::new_v4();
        store
            .create_trials(vec![Trial {
                trial_name: "Yield 2024".to_string(),
                program_db_id: Some(program.to_string()),
                ..Default::default()
            }])
            .await
            .unwrap();

        let names = vec!["Yield 2024".to_string()];
        assert_eq!(store.find_trials(program, &names).await.unwrap().len(), 1);
        assert!(store.find_trials(Uuid::new_v4(), &names).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn units_found_by_reference() {
        let store = MemoryStore::new();
        let unit_ref = ExternalReference::for_entity("src", EntityKind::ObservationUnit, "u-1");
        store
            .create_observation_units(vec![ObservationUnit {
                observation_unit_name: "1".to_string(),
                external_references: vec![unit_ref],
                ..Default::default()
            }])
            .await
            .unwrap();

        let query = ObservationUnitQuery {
            reference_source: Some("src/observationunits".to_string()),
            reference_ids: vec!["u-1".to_string()],
            ..Default::default()
        };
        assert_eq!(store.find_observation_units(&query).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_replaces_observation() {
        let store = MemoryStore::new();
        let created = store
            .create_observations(vec![Observation {
                observation_variable_name: "Height".to_string(),
                observation_unit_db_id: Some("u".to_string()),
                value: Some("1".to_string()),
                ..Default::default()
            }])
            .await
            .unwrap();

        let mut changed = created[0].clone();
        changed.value = Some("2".to_string());
        changed
            .additional_info
            .insert(INFO_PREVIOUS_VALUE.to_string(), "1".into());
        store.update_observations(vec![changed]).await.unwrap();

        let found = store.find_observations(&["u".to_string()]).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn unavailable_store_fails_calls() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert_matches!(
            store.find_variables(Uuid::new_v4()).await,
            Err(StoreError::Unavailable(_))
        );
    }
}
