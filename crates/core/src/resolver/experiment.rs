//! Experiment workflows: experiment (trial) → environment (study, with its
//! location) → observation unit → observations, one unit per row.
//!
//! New-experiment uploads must introduce a title that does not exist yet.
//! Append/overwrite uploads extend an existing experiment; rows carrying an
//! `ObsUnitID` address their unit directly and skip the hierarchy.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::Utc;
use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::{
    distinct_values, new_reference_id, split_list, ExperimentPlan, ImportPlan, MissingReferences,
    PlannedObservation, PlannedStudy, PlannedUnit, Resolution, ResolveContext,
};
use crate::brapi::{
    self, Germplasm, Location, Observation, ObservationLevel, ObservationUnit,
    ObservationUnitPosition, ObservationUnitQuery, ObservationVariable, Study, Treatment, Trial,
    INFO_CREATED_BY, INFO_OVERWRITE_REASON, INFO_PREVIOUS_VALUE,
};
use crate::error::ImportError;
use crate::mapping::{MappedRow, MappedTable};
use crate::merge::{merge_observation, MergeAction};
use crate::preview::{EntityState, ImportPreview, Pending, RowEntity, RowResult};
use crate::registry::{
    EXP_BLOCK, EXP_COLUMN, EXP_DESCRIPTION, EXP_ENV, EXP_ENV_LOCATION, EXP_ENV_YEAR, EXP_GID,
    EXP_OBS_UNIT_ID, EXP_REPLICATE, EXP_ROW, EXP_TEST_CHECK, EXP_TITLE, EXP_TREATMENT, EXP_TYPE,
    EXP_UNIT, EXP_UNIT_ID,
};
use crate::validation::rules::{FieldError, ValidationErrors};
use crate::validation::uniqueness::colliding_rows;
use crate::workflow::{EntityKind, WorkflowKind};

/// Lookups fetched from the store before rows are walked.
#[derive(Default)]
struct Existing {
    /// Keyed by lowercase variable name.
    variables: HashMap<String, ObservationVariable>,
    /// Keyed by GID.
    germplasm: HashMap<String, Germplasm>,
    /// Keyed by title.
    trials: HashMap<String, Trial>,
    /// Keyed by name.
    locations: HashMap<String, Location>,
    /// Keyed by ObsUnitID.
    referenced_units: HashMap<String, ObservationUnit>,
    /// Keyed by (trial db id, environment name).
    studies: HashMap<(String, String), Study>,
    studies_by_id: HashMap<String, Study>,
    /// Keyed by (study db id, unit name).
    units: HashMap<(String, String), ObservationUnit>,
    /// Keyed by (unit db id, variable db id).
    observations: HashMap<(String, String), Observation>,
}

pub async fn resolve(
    ctx: &ResolveContext<'_>,
    workflow: WorkflowKind,
    table: &MappedTable,
    errors: &mut ValidationErrors,
) -> Result<Resolution, ImportError> {
    let rows = &table.rows;
    let append = workflow == WorkflowKind::AppendOverwrite;

    check_environment_identity(rows)?;

    // Rows that already failed column validation are reported but not resolved.
    let blocked: HashSet<usize> = rows
        .iter()
        .map(|r| r.row_number)
        .filter(|n| errors.has_errors(*n))
        .collect();

    let existing = load_existing(ctx, table, append).await?;
    flag_duplicate_units(rows, errors);

    let mut plan = ExperimentPlan::default();
    let mut preview = ImportPreview::new(workflow);
    preview.dynamic_columns = table.extra_columns.clone();

    for row in rows {
        let mut result = RowResult::new(row.row_number);
        if !blocked.contains(&row.row_number) {
            match row.get(EXP_OBS_UNIT_ID) {
                Some(obs_unit_id) => resolve_referenced_row(
                    ctx,
                    &existing,
                    append,
                    row,
                    obs_unit_id,
                    &mut plan,
                    &mut result,
                    errors,
                ),
                None => resolve_hierarchy_row(
                    ctx,
                    &existing,
                    append,
                    row,
                    &mut plan,
                    &mut result,
                    errors,
                ),
            }
        }
        preview.rows.push(result);
    }

    preview.count_all(EntityKind::Location, plan.locations.values());
    preview.count_all(EntityKind::Trial, plan.trials.values());
    preview.count_all(EntityKind::Study, plan.studies.values().map(|s| &s.study));
    preview.count_all(EntityKind::ObservationUnit, plan.units.iter().map(|u| &u.unit));
    preview.count_observations();

    tracing::debug!(
        import_id = %ctx.import_id,
        trials = plan.trials.len(),
        studies = plan.studies.len(),
        units = plan.units.len(),
        observations = plan.observations.len(),
        "Resolved experiment upload"
    );

    Ok(Resolution {
        plan: ImportPlan::Experiment(plan),
        preview,
    })
}

/// Rows sharing (title, environment) must agree on year and location.
fn check_environment_identity(rows: &[MappedRow]) -> Result<(), ImportError> {
    let mut groups: IndexMap<(&str, &str), Vec<&MappedRow>> = IndexMap::new();
    for row in rows.iter().filter(|r| r.is_blank(EXP_OBS_UNIT_ID)) {
        if let (Some(title), Some(env)) = (row.get(EXP_TITLE), row.get(EXP_ENV)) {
            groups.entry((title, env)).or_default().push(row);
        }
    }

    let mut flagged = ValidationErrors::new();
    let mut environments: Vec<&str> = Vec::new();
    for (&(_, env), group) in &groups {
        let mut mismatch = false;
        for (column, label) in [(EXP_ENV_YEAR, "year"), (EXP_ENV_LOCATION, "location")] {
            let values: BTreeSet<&str> = group.iter().filter_map(|r| r.get(column)).collect();
            if values.len() > 1 {
                mismatch = true;
                for row in group {
                    flagged.add(
                        row.row_number,
                        FieldError::conflict(
                            column,
                            format!("All rows of environment \"{env}\" must have the same {label}"),
                        ),
                    );
                }
            }
        }
        if mismatch {
            environments.push(env);
        }
    }

    if environments.is_empty() {
        return Ok(());
    }
    Err(ImportError::conflict(
        format!(
            "Conflicting year or location for environment(s): {}",
            environments.join(", ")
        ),
        flagged.into_rows(),
    ))
}

/// A unit may appear on one row only: by (title, env, Exp Unit ID) or by
/// ObsUnitID.
fn flag_duplicate_units(rows: &[MappedRow], errors: &mut ValidationErrors) {
    let by_unit_id = colliding_rows(rows, |r| {
        if !r.is_blank(EXP_OBS_UNIT_ID) {
            return None;
        }
        Some((r.get_owned(EXP_TITLE)?, r.get_owned(EXP_ENV)?, r.get_owned(EXP_UNIT_ID)?))
    });
    for row_number in by_unit_id.into_iter().flatten() {
        errors.add(
            row_number,
            FieldError::conflict(EXP_UNIT_ID, "Exp Unit ID must be unique within an environment"),
        );
    }

    let by_obs_unit_id = colliding_rows(rows, |r| r.get_owned(EXP_OBS_UNIT_ID));
    for row_number in by_obs_unit_id.into_iter().flatten() {
        errors.add(
            row_number,
            FieldError::conflict(EXP_OBS_UNIT_ID, "ObsUnitID appears on more than one row"),
        );
    }
}

async fn load_existing(
    ctx: &ResolveContext<'_>,
    table: &MappedTable,
    append: bool,
) -> Result<Existing, ImportError> {
    let rows = &table.rows;
    let gids = distinct_values(rows, EXP_GID);
    let titles = distinct_values(rows, EXP_TITLE);
    let location_names = distinct_values(rows, EXP_ENV_LOCATION);
    let obs_unit_ids = distinct_values(rows, EXP_OBS_UNIT_ID);
    let unit_query = ObservationUnitQuery {
        reference_source: Some(ctx.source(EntityKind::ObservationUnit)),
        reference_ids: obs_unit_ids.clone(),
        ..Default::default()
    };

    let (variables, germplasm, trials, locations, referenced_units) = futures::try_join!(
        ctx.store.find_variables(ctx.program_id),
        ctx.store.find_germplasm(ctx.program_id, &gids),
        ctx.store.find_trials(ctx.program_id, &titles),
        ctx.store.find_locations(ctx.program_id, &location_names),
        ctx.store.find_observation_units(&unit_query),
    )?;

    let unit_source = ctx.source(EntityKind::ObservationUnit);
    let mut existing = Existing {
        variables: variables
            .into_iter()
            .map(|v| (v.observation_variable_name.to_lowercase(), v))
            .collect(),
        germplasm: germplasm
            .into_iter()
            .filter_map(|g| g.accession_number.clone().map(|gid| (gid, g)))
            .collect(),
        trials: trials
            .into_iter()
            .map(|t| (t.trial_name.clone(), t))
            .collect(),
        locations: locations
            .into_iter()
            .map(|l| (l.location_name.clone(), l))
            .collect(),
        referenced_units: referenced_units
            .into_iter()
            .filter_map(|u| {
                brapi::reference_id(&u.external_references, &unit_source)
                    .map(str::to_string)
                    .map(|id| (id, u))
            })
            .collect(),
        ..Default::default()
    };

    let mut missing = MissingReferences::default();
    missing.add(
        "Observation variable(s)",
        table
            .extra_columns
            .iter()
            .filter(|c| !existing.variables.contains_key(&c.to_lowercase()))
            .cloned(),
    );
    missing.add(
        "Germplasm GID(s)",
        gids.into_iter().filter(|g| !existing.germplasm.contains_key(g)),
    );
    missing.add(
        "ObsUnitID(s)",
        obs_unit_ids
            .into_iter()
            .filter(|id| !existing.referenced_units.contains_key(id)),
    );
    missing.into_result()?;

    if !append {
        reject_existing_titles(rows, &existing.trials)?;
        return Ok(existing);
    }

    // Children of existing experiments, plus the studies of directly
    // referenced units.
    let trial_ids: Vec<String> = existing
        .trials
        .values()
        .filter_map(|t| t.trial_db_id.clone())
        .chain(
            existing
                .referenced_units
                .values()
                .filter_map(|u| u.trial_db_id.clone()),
        )
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let studies = if trial_ids.is_empty() {
        Vec::new()
    } else {
        ctx.store.find_studies(&trial_ids).await?
    };

    let study_ids: Vec<String> = studies.iter().filter_map(|s| s.study_db_id.clone()).collect();
    let units = if study_ids.is_empty() {
        Vec::new()
    } else {
        ctx.store
            .find_observation_units(&ObservationUnitQuery {
                study_db_ids: study_ids,
                ..Default::default()
            })
            .await?
    };

    let unit_ids: Vec<String> = units
        .iter()
        .chain(existing.referenced_units.values())
        .filter_map(|u| u.observation_unit_db_id.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let observations = if unit_ids.is_empty() {
        Vec::new()
    } else {
        ctx.store.find_observations(&unit_ids).await?
    };

    for study in studies {
        if let (Some(trial_id), Some(study_id)) =
            (study.trial_db_id.clone(), study.study_db_id.clone())
        {
            existing
                .studies
                .insert((trial_id, study.study_name.clone()), study.clone());
            existing.studies_by_id.insert(study_id, study);
        }
    }
    for unit in units {
        if let Some(study_id) = unit.study_db_id.clone() {
            existing
                .units
                .insert((study_id, unit.observation_unit_name.clone()), unit);
        }
    }
    for observation in observations {
        if let (Some(unit_id), Some(variable_id)) = (
            observation.observation_unit_db_id.clone(),
            observation.observation_variable_db_id.clone(),
        ) {
            existing.observations.insert((unit_id, variable_id), observation);
        }
    }

    Ok(existing)
}

fn reject_existing_titles(
    rows: &[MappedRow],
    trials: &HashMap<String, Trial>,
) -> Result<(), ImportError> {
    if trials.is_empty() {
        return Ok(());
    }
    let mut flagged = ValidationErrors::new();
    for row in rows {
        if row.get(EXP_TITLE).is_some_and(|t| trials.contains_key(t)) {
            flagged.add(
                row.row_number,
                FieldError::conflict(EXP_TITLE, "Experiment Title already exists"),
            );
        }
    }
    let mut titles: Vec<&str> = trials.keys().map(String::as_str).collect();
    titles.sort_unstable();
    Err(ImportError::conflict(
        format!("Experiment Title already exists: {}", titles.join(", ")),
        flagged.into_rows(),
    ))
}

/// A row naming its unit by ObsUnitID.
#[allow(clippy::too_many_arguments)]
fn resolve_referenced_row(
    ctx: &ResolveContext<'_>,
    existing: &Existing,
    append: bool,
    row: &MappedRow,
    obs_unit_id: &str,
    plan: &mut ExperimentPlan,
    result: &mut RowResult,
    errors: &mut ValidationErrors,
) {
    let Some(unit) = existing.referenced_units.get(obs_unit_id) else {
        return;
    };
    let unit_reference = own_reference(ctx, EntityKind::ObservationUnit, &unit.external_references);

    if let Some(study) = unit
        .study_db_id
        .as_ref()
        .and_then(|id| existing.studies_by_id.get(id))
    {
        result.insert(EntityKind::Study, RowEntity::new(EntityState::Existing, study, None));
    }
    result.insert(
        EntityKind::ObservationUnit,
        RowEntity::new(EntityState::Existing, unit, unit_reference),
    );

    if !append {
        errors.add(
            row.row_number,
            FieldError::conflict(
                EXP_OBS_UNIT_ID,
                format!(
                    "Observation unit already exists in environment \"{}\"",
                    unit.study_name.as_deref().unwrap_or_default()
                ),
            ),
        );
        return;
    }

    let unit_index = plan.units.len();
    plan.units.push(PlannedUnit {
        row_number: row.row_number,
        study_key: None,
        unit: Pending::existing(unit.clone()),
    });
    plan_observations(ctx, existing, row, unit_index, Some(unit), plan, result, errors);
}

/// A row placing its unit through title → environment → unit id.
fn resolve_hierarchy_row(
    ctx: &ResolveContext<'_>,
    existing: &Existing,
    append: bool,
    row: &MappedRow,
    plan: &mut ExperimentPlan,
    result: &mut RowResult,
    errors: &mut ValidationErrors,
) {
    let (Some(title), Some(env), Some(location_name), Some(year), Some(unit_id)) = (
        row.get(EXP_TITLE),
        row.get(EXP_ENV),
        row.get(EXP_ENV_LOCATION),
        row.get(EXP_ENV_YEAR),
        row.get(EXP_UNIT_ID),
    ) else {
        return;
    };

    // ---- Experiment ----
    let trial = if append {
        match existing.trials.get(title) {
            Some(trial) => plan
                .trials
                .entry(title.to_string())
                .or_insert_with(|| Pending::existing(trial.clone())),
            None => {
                errors.add(
                    row.row_number,
                    FieldError::not_found(
                        EXP_TITLE,
                        format!("Referenced experiment not found: {title}"),
                    ),
                );
                return;
            }
        }
    } else {
        plan.trials.entry(title.to_string()).or_insert_with(|| {
            Pending::new(Trial {
                trial_name: title.to_string(),
                trial_description: row.get_owned(EXP_DESCRIPTION),
                program_db_id: Some(ctx.program_db_id()),
                additional_info: created_by_info(ctx),
                external_references: vec![ctx.import_reference(EntityKind::Trial)],
                ..Default::default()
            })
        })
    };
    let trial_state = trial.state;
    let trial_db_id = trial.object.trial_db_id.clone();
    result.insert(
        EntityKind::Trial,
        RowEntity::new(
            trial_state,
            &trial.object,
            own_reference(ctx, EntityKind::Trial, &trial.object.external_references),
        ),
    );

    // ---- Location ----
    let location = plan
        .locations
        .entry(location_name.to_string())
        .or_insert_with(|| match existing.locations.get(location_name) {
            Some(location) => Pending::existing(location.clone()),
            None => Pending::new(Location {
                location_name: location_name.to_string(),
                program_db_id: Some(ctx.program_db_id()),
                external_references: vec![ctx.import_reference(EntityKind::Location)],
                ..Default::default()
            }),
        });
    let location_db_id = location.object.location_db_id.clone();
    result.insert(
        EntityKind::Location,
        RowEntity::new(
            location.state,
            &location.object,
            own_reference(ctx, EntityKind::Location, &location.object.external_references),
        ),
    );

    // ---- Environment ----
    let study_key = (title.to_string(), env.to_string());
    let stored_study = trial_db_id
        .as_ref()
        .and_then(|id| existing.studies.get(&(id.clone(), env.to_string())));

    if let Some(study) = stored_study {
        let mut mismatch = false;
        if study.year().is_some_and(|y| y != year) {
            mismatch = true;
            errors.add(
                row.row_number,
                FieldError::conflict(
                    EXP_ENV_YEAR,
                    format!(
                        "Env Year does not match existing environment ({})",
                        study.year().unwrap_or_default()
                    ),
                ),
            );
        }
        if study.location_name.as_deref().is_some_and(|l| l != location_name) {
            mismatch = true;
            errors.add(
                row.row_number,
                FieldError::conflict(
                    EXP_ENV_LOCATION,
                    format!(
                        "Env Location does not match existing environment ({})",
                        study.location_name.as_deref().unwrap_or_default()
                    ),
                ),
            );
        }
        if mismatch {
            result.insert(EntityKind::Study, RowEntity::new(EntityState::Existing, study, None));
            return;
        }
    }

    let planned = plan.studies.entry(study_key.clone()).or_insert_with(|| PlannedStudy {
        trial_key: title.to_string(),
        location_key: Some(location_name.to_string()),
        study: match stored_study {
            Some(study) => Pending::existing(study.clone()),
            None => Pending::new(Study {
                study_name: env.to_string(),
                trial_db_id: trial_db_id.clone(),
                location_db_id: location_db_id.clone(),
                location_name: Some(location_name.to_string()),
                seasons: vec![year.to_string()],
                study_type: row.get_owned(EXP_TYPE),
                additional_info: created_by_info(ctx),
                external_references: vec![ctx.import_reference(EntityKind::Study)],
                ..Default::default()
            }),
        },
    });
    let study_state = planned.study.state;
    let study_db_id = planned.study.object.study_db_id.clone();
    result.insert(
        EntityKind::Study,
        RowEntity::new(
            study_state,
            &planned.study.object,
            own_reference(ctx, EntityKind::Study, &planned.study.object.external_references),
        ),
    );

    // ---- Observation unit ----
    let stored_unit = study_db_id
        .as_ref()
        .and_then(|id| existing.units.get(&(id.clone(), unit_id.to_string())));
    let unit = match stored_unit {
        Some(unit) => Pending::existing(unit.clone()),
        None => Pending::new(build_unit(ctx, existing, row, title, env, unit_id)),
    };
    result.insert(
        EntityKind::ObservationUnit,
        RowEntity::new(
            unit.state,
            &unit.object,
            own_reference(ctx, EntityKind::ObservationUnit, &unit.object.external_references),
        ),
    );

    let unit_index = plan.units.len();
    plan.units.push(PlannedUnit {
        row_number: row.row_number,
        study_key: Some(study_key),
        unit,
    });
    plan_observations(ctx, existing, row, unit_index, stored_unit, plan, result, errors);
}

/// Merge every trait cell of a row into the unit's observations.
#[allow(clippy::too_many_arguments)]
fn plan_observations(
    ctx: &ResolveContext<'_>,
    existing: &Existing,
    row: &MappedRow,
    unit_index: usize,
    stored_unit: Option<&ObservationUnit>,
    plan: &mut ExperimentPlan,
    result: &mut RowResult,
    errors: &mut ValidationErrors,
) {
    let timestamp = Utc::now().to_rfc3339();

    for (column, value) in &row.extra {
        let Some(variable) = existing.variables.get(&column.to_lowercase()) else {
            continue;
        };
        let variable_db_id = variable.observation_variable_db_id.clone().unwrap_or_default();

        let stored = stored_unit
            .and_then(|u| u.observation_unit_db_id.clone())
            .and_then(|unit_id| existing.observations.get(&(unit_id, variable_db_id.clone())));
        let stored_value = stored.map(|o| o.value.as_deref().unwrap_or_default());

        let change = match merge_observation(column, Some(value.as_str()), stored_value, ctx.overwrite) {
            Ok(change) => change,
            Err(error) => {
                errors.add(row.row_number, error);
                continue;
            }
        };

        let observation = match (change.action, stored) {
            (MergeAction::Overwrite, Some(stored)) => {
                let mut observation = stored.clone();
                observation.value = change.value.clone();
                observation.observation_time_stamp = Some(timestamp.clone());
                if let Some(reason) = ctx.overwrite_reason {
                    observation
                        .additional_info
                        .insert(INFO_OVERWRITE_REASON.to_string(), Value::from(reason));
                }
                if let Some(previous) = &change.previous_value {
                    observation
                        .additional_info
                        .insert(INFO_PREVIOUS_VALUE.to_string(), Value::from(previous.as_str()));
                }
                brapi::set_reference(
                    &mut observation.external_references,
                    ctx.import_reference(EntityKind::Observation),
                );
                Some(observation)
            }
            (MergeAction::Create, _) => Some(Observation {
                observation_unit_db_id: stored_unit.and_then(|u| u.observation_unit_db_id.clone()),
                observation_variable_db_id: Some(variable_db_id),
                observation_variable_name: variable.observation_variable_name.clone(),
                germplasm_db_id: stored_unit.and_then(|u| u.germplasm_db_id.clone()),
                study_db_id: stored_unit.and_then(|u| u.study_db_id.clone()),
                value: change.value.clone(),
                observation_time_stamp: Some(timestamp.clone()),
                collector: ctx.created_by.map(str::to_string),
                additional_info: created_by_info(ctx),
                external_references: vec![ctx.import_reference(EntityKind::Observation)],
                ..Default::default()
            }),
            _ => None,
        };

        if let Some(observation) = observation {
            plan.observations.push(PlannedObservation {
                unit_index,
                change: change.clone(),
                observation,
            });
        }
        result.observations.push(change);
    }
}

fn build_unit(
    ctx: &ResolveContext<'_>,
    existing: &Existing,
    row: &MappedRow,
    title: &str,
    env: &str,
    unit_id: &str,
) -> ObservationUnit {
    let germplasm = row.get(EXP_GID).and_then(|gid| existing.germplasm.get(gid));

    let entry_type = row.get(EXP_TEST_CHECK).map(|tc| {
        if tc.eq_ignore_ascii_case("C") {
            "CHECK".to_string()
        } else {
            "TEST".to_string()
        }
    });

    let mut relationships = Vec::new();
    if let Some(rep) = row.get(EXP_REPLICATE) {
        relationships.push(ObservationLevel {
            level_name: "rep".to_string(),
            level_code: Some(rep.to_string()),
        });
    }
    if let Some(block) = row.get(EXP_BLOCK) {
        relationships.push(ObservationLevel {
            level_name: "block".to_string(),
            level_code: Some(block.to_string()),
        });
    }

    ObservationUnit {
        observation_unit_name: unit_id.to_string(),
        germplasm_db_id: germplasm.and_then(|g| g.germplasm_db_id.clone()),
        germplasm_name: germplasm.map(|g| g.germplasm_name.clone()),
        study_name: Some(env.to_string()),
        trial_name: Some(title.to_string()),
        program_db_id: Some(ctx.program_db_id()),
        observation_unit_position: Some(ObservationUnitPosition {
            entry_type,
            observation_level: Some(ObservationLevel {
                level_name: row.get(EXP_UNIT).unwrap_or("plot").to_lowercase(),
                level_code: Some(unit_id.to_string()),
            }),
            observation_level_relationships: relationships,
            position_coordinate_x: row.get_owned(EXP_ROW),
            position_coordinate_y: row.get_owned(EXP_COLUMN),
        }),
        treatments: split_list(row.get(EXP_TREATMENT))
            .into_iter()
            .map(|factor| Treatment {
                factor,
                modality: None,
            })
            .collect(),
        // The reference id is the unit's ObsUnitID for later appends.
        external_references: vec![ctx.reference(EntityKind::ObservationUnit, new_reference_id())],
        ..Default::default()
    }
}

fn created_by_info(ctx: &ResolveContext<'_>) -> Map<String, Value> {
    let mut info = Map::new();
    if let Some(user) = ctx.created_by {
        info.insert(INFO_CREATED_BY.to_string(), Value::from(user));
    }
    info
}

/// This system's reference on an entity, if it carries one.
fn own_reference(
    ctx: &ResolveContext<'_>,
    kind: EntityKind,
    references: &[brapi::ExternalReference],
) -> Option<brapi::ExternalReference> {
    let source = ctx.source(kind);
    brapi::reference_id(references, &source).map(|id| ctx.reference(kind, id))
}
