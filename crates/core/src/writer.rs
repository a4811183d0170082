//! Commit a resolved plan to the BrAPI store.
//!
//! Entities are created kind by kind in dependency order. After each batch
//! the store-assigned db ids are copied back into the plan so children can
//! point at their parents. A store failure part way through leaves the
//! batches already written in place; the error carries what was written.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::brapi::{BrapiStore, StoreError};
use crate::error::ImportError;
use crate::merge::MergeAction;
use crate::resolver::{ExperimentPlan, GermplasmPlan, ImportPlan, SamplePlan};
use crate::workflow::EntityKind;

/// Records written by a commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteSummary {
    pub created: usize,
    pub updated: usize,
    /// Created plus updated, per entity kind.
    pub by_kind: BTreeMap<EntityKind, usize>,
}

impl WriteSummary {
    pub fn record(&mut self, kind: EntityKind, created: usize, updated: usize) {
        self.created += created;
        self.updated += updated;
        if created + updated > 0 {
            *self.by_kind.entry(kind).or_default() += created + updated;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.by_kind.is_empty()
    }
}

impl fmt::Display for WriteSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("nothing");
        }
        let parts: Vec<String> = self
            .by_kind
            .iter()
            .map(|(kind, count)| format!("{count} {}", kind.segment()))
            .collect();
        f.write_str(&parts.join(", "))
    }
}

pub async fn write_plan(
    store: &dyn BrapiStore,
    plan: &mut ImportPlan,
) -> Result<WriteSummary, ImportError> {
    let mut summary = WriteSummary::default();
    let result = match plan {
        ImportPlan::Germplasm(plan) => write_germplasm(store, plan, &mut summary).await,
        ImportPlan::Experiment(plan) => write_experiment(store, plan, &mut summary).await,
        ImportPlan::Sample(plan) => write_samples(store, plan, &mut summary).await,
    };
    match result {
        Ok(()) => Ok(summary),
        Err(source) if summary.is_empty() => Err(ImportError::Store(source)),
        Err(source) => {
            tracing::warn!(written = %summary, error = %source, "Commit stopped part way");
            Err(ImportError::PartialWrite {
                source,
                written: summary,
            })
        }
    }
}

async fn write_germplasm(
    store: &dyn BrapiStore,
    plan: &mut GermplasmPlan,
    summary: &mut WriteSummary,
) -> Result<(), StoreError> {
    let items = plan.entries.iter().map(|e| e.germplasm.clone()).collect();
    let created = store.create_germplasm(items).await?;
    summary.record(EntityKind::Germplasm, created.len(), 0);
    for (entry, germplasm) in plan.entries.iter_mut().zip(created) {
        entry.germplasm = germplasm;
    }

    if plan.list.is_new() {
        plan.list.object.data = plan
            .entries
            .iter()
            .filter_map(|e| e.germplasm.germplasm_db_id.clone())
            .collect();
        plan.list.object = store.create_list(plan.list.object.clone()).await?;
        summary.record(EntityKind::GermplasmList, 1, 0);
    }

    tracing::info!(
        germplasm = plan.entries.len(),
        list = %plan.list.object.list_name,
        "Germplasm written"
    );
    Ok(())
}

async fn write_experiment(
    store: &dyn BrapiStore,
    plan: &mut ExperimentPlan,
    summary: &mut WriteSummary,
) -> Result<(), StoreError> {
    // ---- Locations ----
    let new_locations: Vec<_> = plan.locations.values().filter(|l| l.is_new()).collect();
    if !new_locations.is_empty() {
        let items = new_locations.iter().map(|l| l.object.clone()).collect();
        let created = store.create_locations(items).await?;
        summary.record(EntityKind::Location, created.len(), 0);
        let slots = plan.locations.values_mut().filter(|l| l.is_new());
        for (slot, location) in slots.zip(created) {
            slot.object = location;
        }
    }

    // ---- Trials ----
    let items: Vec<_> = plan
        .trials
        .values()
        .filter(|t| t.is_new())
        .map(|t| t.object.clone())
        .collect();
    if !items.is_empty() {
        let created = store.create_trials(items).await?;
        summary.record(EntityKind::Trial, created.len(), 0);
        let slots = plan.trials.values_mut().filter(|t| t.is_new());
        for (slot, trial) in slots.zip(created) {
            slot.object = trial;
        }
    }

    // ---- Studies ----
    let mut items = Vec::new();
    for planned in plan.studies.values_mut().filter(|s| s.study.is_new()) {
        let study = &mut planned.study.object;
        if let Some(trial) = plan.trials.get(&planned.trial_key) {
            study.trial_db_id = trial.object.trial_db_id.clone();
        }
        if let Some(location) = planned
            .location_key
            .as_ref()
            .and_then(|key| plan.locations.get(key))
        {
            study.location_db_id = location.object.location_db_id.clone();
        }
        items.push(study.clone());
    }
    if !items.is_empty() {
        let created = store.create_studies(items).await?;
        summary.record(EntityKind::Study, created.len(), 0);
        let slots = plan.studies.values_mut().filter(|s| s.study.is_new());
        for (slot, study) in slots.zip(created) {
            slot.study.object = study;
        }
    }

    // ---- Observation units ----
    let mut items = Vec::new();
    for planned in plan.units.iter_mut().filter(|u| u.unit.is_new()) {
        let unit = &mut planned.unit.object;
        if let Some(study) = planned.study_key.as_ref().and_then(|k| plan.studies.get(k)) {
            let study = &study.study.object;
            unit.study_db_id = study.study_db_id.clone();
            unit.trial_db_id = study.trial_db_id.clone();
            unit.location_db_id = study.location_db_id.clone();
        }
        items.push(unit.clone());
    }
    if !items.is_empty() {
        let created = store.create_observation_units(items).await?;
        summary.record(EntityKind::ObservationUnit, created.len(), 0);
        let slots = plan.units.iter_mut().filter(|u| u.unit.is_new());
        for (slot, unit) in slots.zip(created) {
            slot.unit.object = unit;
        }
    }

    // ---- Observations ----
    let mut creates = Vec::new();
    let mut updates = Vec::new();
    for (index, planned) in plan.observations.iter_mut().enumerate() {
        match planned.change.action {
            MergeAction::Create => {
                if let Some(unit) = plan.units.get(planned.unit_index) {
                    let unit = &unit.unit.object;
                    let observation = &mut planned.observation;
                    observation.observation_unit_db_id = unit.observation_unit_db_id.clone();
                    observation.study_db_id = unit.study_db_id.clone();
                    observation.germplasm_db_id = unit.germplasm_db_id.clone();
                }
                creates.push((index, planned.observation.clone()));
            }
            MergeAction::Overwrite => updates.push((index, planned.observation.clone())),
            MergeAction::NoOp => {}
        }
    }

    if !creates.is_empty() {
        let (indexes, items): (Vec<usize>, Vec<_>) = creates.into_iter().unzip();
        let created = store.create_observations(items).await?;
        summary.record(EntityKind::Observation, created.len(), 0);
        for (index, observation) in indexes.into_iter().zip(created) {
            plan.observations[index].observation = observation;
        }
    }
    if !updates.is_empty() {
        let (indexes, items): (Vec<usize>, Vec<_>) = updates.into_iter().unzip();
        let updated = store.update_observations(items).await?;
        summary.record(EntityKind::Observation, 0, updated.len());
        for (index, observation) in indexes.into_iter().zip(updated) {
            plan.observations[index].observation = observation;
        }
    }

    tracing::info!(
        created = summary.created,
        updated = summary.updated,
        "Experiment written"
    );
    Ok(())
}

async fn write_samples(
    store: &dyn BrapiStore,
    plan: &mut SamplePlan,
    summary: &mut WriteSummary,
) -> Result<(), StoreError> {
    let items: Vec<_> = plan
        .plates
        .values()
        .filter(|p| p.is_new())
        .map(|p| p.object.clone())
        .collect();
    if !items.is_empty() {
        let created = store.create_plates(items).await?;
        summary.record(EntityKind::Plate, created.len(), 0);
        let slots = plan.plates.values_mut().filter(|p| p.is_new());
        for (slot, plate) in slots.zip(created) {
            slot.object = plate;
        }
    }

    let mut items = Vec::with_capacity(plan.samples.len());
    for planned in &mut plan.samples {
        if let Some(plate) = plan.plates.get(&planned.plate_key) {
            planned.sample.plate_db_id = plate.object.plate_db_id.clone();
        }
        items.push(planned.sample.clone());
    }
    if !items.is_empty() {
        let created = store.create_samples(items).await?;
        summary.record(EntityKind::Sample, created.len(), 0);
        for (planned, sample) in plan.samples.iter_mut().zip(created) {
            planned.sample = sample;
        }
    }

    tracing::info!(
        submission_id = %plan.submission.submission_id,
        plates = plan.plates.len(),
        samples = plan.samples.len(),
        "Sample submission written"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    use crate::brapi::{GermplasmList, Location, MemoryStore, Observation, ObservationUnit, Study, Trial};
    use crate::merge::ObservationChange;
    use crate::preview::{Pending, SampleSubmission};
    use crate::resolver::{GermplasmEntry, PlannedObservation, PlannedStudy, PlannedUnit};
    use crate::workflow::EntityKind;

    fn experiment_plan() -> ExperimentPlan {
        let mut plan = ExperimentPlan::default();
        plan.locations.insert(
            "North Farm".to_string(),
            Pending::new(Location {
                location_name: "North Farm".to_string(),
                ..Default::default()
            }),
        );
        plan.trials.insert(
            "Yield Trial".to_string(),
            Pending::new(Trial {
                trial_name: "Yield Trial".to_string(),
                ..Default::default()
            }),
        );
        let key = ("Yield Trial".to_string(), "E1".to_string());
        plan.studies.insert(
            key.clone(),
            PlannedStudy {
                trial_key: "Yield Trial".to_string(),
                location_key: Some("North Farm".to_string()),
                study: Pending::new(Study {
                    study_name: "E1".to_string(),
                    ..Default::default()
                }),
            },
        );
        plan.units.push(PlannedUnit {
            row_number: 2,
            study_key: Some(key),
            unit: Pending::new(ObservationUnit {
                observation_unit_name: "1".to_string(),
                germplasm_db_id: Some("g-1".to_string()),
                ..Default::default()
            }),
        });
        plan.observations.push(PlannedObservation {
            unit_index: 0,
            change: ObservationChange {
                variable: "Plant Height".to_string(),
                action: MergeAction::Create,
                value: Some("10".to_string()),
                previous_value: None,
            },
            observation: Observation {
                observation_variable_db_id: Some("v-1".to_string()),
                value: Some("10".to_string()),
                ..Default::default()
            },
        });
        plan
    }

    #[tokio::test]
    async fn experiment_children_receive_parent_ids() {
        let store = MemoryStore::new();
        let mut plan = ImportPlan::Experiment(experiment_plan());
        let summary = write_plan(&store, &mut plan).await.unwrap();
        assert_eq!(summary.created, 5);

        let ImportPlan::Experiment(plan) = plan else {
            unreachable!()
        };
        let study = &plan.studies[0].study.object;
        assert!(study.study_db_id.is_some());
        assert_eq!(study.trial_db_id, plan.trials[0].object.trial_db_id);
        assert_eq!(study.location_db_id, plan.locations[0].object.location_db_id);

        let unit = &plan.units[0].unit.object;
        assert_eq!(unit.study_db_id, study.study_db_id);
        assert_eq!(unit.trial_db_id, study.trial_db_id);

        let observation = &plan.observations[0].observation;
        assert!(observation.observation_db_id.is_some());
        assert_eq!(observation.observation_unit_db_id, unit.observation_unit_db_id);
        assert_eq!(observation.germplasm_db_id.as_deref(), Some("g-1"));
        assert_eq!(store.count(EntityKind::Observation).await, 1);
    }

    #[tokio::test]
    async fn existing_entities_are_not_recreated() {
        let store = MemoryStore::new();
        let mut experiment = experiment_plan();
        experiment.locations[0].state = crate::preview::EntityState::Existing;
        experiment.locations[0].object.location_db_id = Some("loc-1".to_string());
        let mut plan = ImportPlan::Experiment(experiment);
        write_plan(&store, &mut plan).await.unwrap();
        assert_eq!(store.count(EntityKind::Location).await, 0);

        let ImportPlan::Experiment(plan) = plan else {
            unreachable!()
        };
        assert_eq!(plan.studies[0].study.object.location_db_id.as_deref(), Some("loc-1"));
    }

    #[tokio::test]
    async fn germplasm_list_holds_created_ids() {
        let store = MemoryStore::new();
        let entries = ["A", "B"]
            .iter()
            .enumerate()
            .map(|(i, name)| GermplasmEntry {
                row_number: i + 2,
                entry_number: i as i64 + 1,
                germplasm: crate::brapi::Germplasm {
                    germplasm_name: name.to_string(),
                    ..Default::default()
                },
            })
            .collect();
        let mut plan = ImportPlan::Germplasm(GermplasmPlan {
            list: Pending::new(GermplasmList {
                list_name: "Spring".to_string(),
                ..Default::default()
            }),
            entries,
        });
        write_plan(&store, &mut plan).await.unwrap();

        let lists = store.lists().await;
        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0].data.len(), 2);
        let ImportPlan::Germplasm(plan) = plan else {
            unreachable!()
        };
        assert_eq!(
            lists[0].data[0],
            plan.entries[0].germplasm.germplasm_db_id.clone().unwrap()
        );
    }

    #[tokio::test]
    async fn samples_point_at_their_plate() {
        let store = MemoryStore::new();
        let mut plan = SamplePlan {
            submission: SampleSubmission {
                submission_id: Uuid::new_v4(),
                name: "batch".to_string(),
            },
            plates: Default::default(),
            samples: Vec::new(),
        };
        plan.plates.insert(
            "P1".to_string(),
            Pending::new(crate::brapi::Plate {
                plate_name: "P1".to_string(),
                ..Default::default()
            }),
        );
        plan.samples.push(crate::resolver::PlannedSample {
            row_number: 2,
            plate_key: "P1".to_string(),
            sample: crate::brapi::Sample {
                sample_name: "P1_A01".to_string(),
                row: "A".to_string(),
                column: 1,
                ..Default::default()
            },
        });
        let mut plan = ImportPlan::Sample(plan);
        write_plan(&store, &mut plan).await.unwrap();

        let ImportPlan::Sample(plan) = plan else {
            unreachable!()
        };
        assert!(plan.samples[0].sample.sample_db_id.is_some());
        assert_eq!(
            plan.samples[0].sample.plate_db_id,
            plan.plates["P1"].object.plate_db_id
        );
    }

    #[tokio::test]
    async fn store_failure_surfaces_as_import_error() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        let mut plan = ImportPlan::Experiment(experiment_plan());
        let err = write_plan(&store, &mut plan).await.unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert!(err.written().is_none());
    }

    #[tokio::test]
    async fn failure_after_some_batches_reports_what_was_written() {
        let store = MemoryStore::new();
        store.fail_writes_of(Some(EntityKind::ObservationUnit));
        let mut plan = ImportPlan::Experiment(experiment_plan());
        let err = write_plan(&store, &mut plan).await.unwrap_err();

        assert_eq!(err.status_code(), 500);
        let written = err.written().unwrap();
        assert_eq!(written.created, 3);
        assert_eq!(written.by_kind[&EntityKind::Location], 1);
        assert_eq!(written.by_kind[&EntityKind::Trial], 1);
        assert_eq!(written.by_kind[&EntityKind::Study], 1);
        assert!(!written.by_kind.contains_key(&EntityKind::ObservationUnit));
        assert_eq!(store.count(EntityKind::Study).await, 1);
        assert_eq!(store.count(EntityKind::Observation).await, 0);
        assert!(err.to_string().contains("1 locations, 1 trials, 1 studies"));
    }

    #[test]
    fn summary_counts_per_kind() {
        let mut summary = WriteSummary::default();
        assert_eq!(summary.to_string(), "nothing");
        summary.record(EntityKind::Observation, 2, 0);
        summary.record(EntityKind::Observation, 0, 1);
        summary.record(EntityKind::Study, 0, 0);
        assert_eq!(summary.created, 2);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.by_kind.len(), 1);
        assert_eq!(summary.to_string(), "3 observations");
    }
}
