//! Sample submission workflow: 96-well plates and the samples placed in
//! their wells. Every plate and sample written carries the submission id as
//! its external reference.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{distinct_values, ImportPlan, MissingReferences, PlannedSample, Resolution, ResolveContext, SamplePlan};
use crate::brapi::{well_label, Germplasm, Plate, Sample, INFO_CREATED_BY};
use crate::error::ImportError;
use crate::mapping::{MappedRow, MappedTable};
use crate::preview::{EntityState, ImportPreview, Pending, RowEntity, RowResult, SampleSubmission};
use crate::registry::{
    SAMPLE_COLUMN, SAMPLE_COMMENTS, SAMPLE_GERMPLASM_NAME, SAMPLE_GID, SAMPLE_ORGANISM,
    SAMPLE_PLATE_ID, SAMPLE_ROW, SAMPLE_SPECIES, SAMPLE_TISSUE, SAMPLE_WELL_FIELD,
};
use crate::validation::rules::{FieldError, ValidationErrors};
use crate::validation::uniqueness::colliding_rows;
use crate::workflow::{EntityKind, WorkflowKind};

/// User field naming the submission. Defaults to the uploaded file name.
pub const USER_FIELD_SUBMISSION_NAME: &str = "submissionName";

pub const PLATE_FORMAT: &str = "PLATE_96";

pub async fn resolve(
    ctx: &ResolveContext<'_>,
    table: &MappedTable,
    errors: &mut ValidationErrors,
) -> Result<Resolution, ImportError> {
    let rows = &table.rows;
    check_well_collisions(rows)?;

    let gids = distinct_values(rows, SAMPLE_GID);
    let plate_names = distinct_values(rows, SAMPLE_PLATE_ID);
    let (germplasm, plates) = futures::try_join!(
        ctx.store.find_germplasm(ctx.program_id, &gids),
        ctx.store.find_plates(ctx.program_id, &plate_names),
    )?;

    let germplasm: HashMap<String, Germplasm> = germplasm
        .into_iter()
        .filter_map(|g| g.accession_number.clone().map(|gid| (gid, g)))
        .collect();
    let mut missing = MissingReferences::default();
    missing.add(
        "Germplasm GID(s)",
        gids.into_iter().filter(|g| !germplasm.contains_key(g)),
    );
    missing.into_result()?;

    let plate_ids: Vec<String> = plates.iter().filter_map(|p| p.plate_db_id.clone()).collect();
    let stored_samples = if plate_ids.is_empty() {
        Vec::new()
    } else {
        ctx.store.find_samples(&plate_ids).await?
    };
    // (plate db id, well) of every occupied well
    let occupied: HashSet<(String, String)> = stored_samples
        .into_iter()
        .filter_map(|s| {
            let plate = s.plate_db_id?;
            Some((plate, well_label(&s.row, s.column)))
        })
        .collect();
    let stored_plates: HashMap<String, Plate> =
        plates.into_iter().map(|p| (p.plate_name.clone(), p)).collect();

    let submission_id = Uuid::new_v4();
    let submission = SampleSubmission {
        submission_id,
        name: ctx
            .user_field(USER_FIELD_SUBMISSION_NAME)
            .or(ctx.file_name)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Submission {}", Utc::now().format("%Y-%m-%d"))),
    };

    let mut plan = SamplePlan {
        submission: submission.clone(),
        plates: Default::default(),
        samples: Vec::new(),
    };
    let mut preview = ImportPreview::new(WorkflowKind::SampleSubmission);

    for row in rows {
        let mut result = RowResult::new(row.row_number);
        let blocked = errors.has_errors(row.row_number);
        let (Some(plate_name), Some(plate_row), Some(plate_column)) = (
            row.get(SAMPLE_PLATE_ID),
            row.get(SAMPLE_ROW),
            row.get_int(SAMPLE_COLUMN),
        ) else {
            preview.rows.push(result);
            continue;
        };
        if blocked {
            preview.rows.push(result);
            continue;
        }

        let plate = plan
            .plates
            .entry(plate_name.to_string())
            .or_insert_with(|| match stored_plates.get(plate_name) {
                Some(plate) => Pending::existing(plate.clone()),
                None => Pending::new(Plate {
                    plate_name: plate_name.to_string(),
                    plate_format: Some(PLATE_FORMAT.to_string()),
                    program_db_id: Some(ctx.program_db_id()),
                    external_references: vec![
                        ctx.reference(EntityKind::Plate, submission_id.to_string())
                    ],
                    ..Default::default()
                }),
            });

        let well = well_label(plate_row, plate_column);
        if let Some(plate_id) = &plate.object.plate_db_id {
            if occupied.contains(&(plate_id.clone(), well.clone())) {
                errors.add(
                    row.row_number,
                    FieldError::conflict(
                        SAMPLE_WELL_FIELD,
                        format!("Well {well} of plate {plate_name} already holds a sample"),
                    ),
                );
            }
        }

        let plate_reference = plate.object.external_references.first().cloned();
        result.insert(
            EntityKind::Plate,
            RowEntity::new(plate.state, &plate.object, plate_reference),
        );

        let gid_match = row.get(SAMPLE_GID).and_then(|gid| germplasm.get(gid));
        let sample = build_sample(ctx, row, submission_id, plate, &well, gid_match);
        result.insert(
            EntityKind::Sample,
            RowEntity::new(
                EntityState::New,
                &sample,
                sample.external_references.first().cloned(),
            ),
        );
        preview.rows.push(result);

        plan.samples.push(PlannedSample {
            row_number: row.row_number,
            plate_key: plate_name.to_string(),
            sample,
        });
    }

    preview.count_all(EntityKind::Plate, plan.plates.values());
    for _ in &plan.samples {
        preview.count(EntityKind::Sample, EntityState::New);
    }
    preview.submission = Some(submission);

    Ok(Resolution {
        plan: ImportPlan::Sample(plan),
        preview,
    })
}

/// No two rows may target the same well of the same plate.
fn check_well_collisions(rows: &[MappedRow]) -> Result<(), ImportError> {
    let collisions = colliding_rows(rows, |r| {
        let plate = r.get(SAMPLE_PLATE_ID)?.to_string();
        let well = well_label(r.get(SAMPLE_ROW)?, r.get_int(SAMPLE_COLUMN)?);
        Some((plate, well))
    });
    if collisions.is_empty() {
        return Ok(());
    }

    let by_number: HashMap<usize, &MappedRow> = rows.iter().map(|r| (r.row_number, r)).collect();
    let mut flagged = ValidationErrors::new();
    let mut wells = Vec::new();
    for group in &collisions {
        let row_list = group
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        for n in group {
            flagged.add(
                *n,
                FieldError::conflict(
                    SAMPLE_WELL_FIELD,
                    format!("Rows {row_list} are assigned to the same well"),
                ),
            );
        }
        if let Some(first) = by_number.get(&group[0]) {
            wells.push(format!(
                "{} {}",
                first.get(SAMPLE_PLATE_ID).unwrap_or_default(),
                well_label(
                    first.get(SAMPLE_ROW).unwrap_or_default(),
                    first.get_int(SAMPLE_COLUMN).unwrap_or_default()
                )
            ));
        }
    }

    Err(ImportError::conflict(
        format!("Multiple samples assigned to the same well: {}", wells.join(", ")),
        flagged.into_rows(),
    ))
}

fn build_sample(
    ctx: &ResolveContext<'_>,
    row: &MappedRow,
    submission_id: Uuid,
    plate: &Pending<Plate>,
    well: &str,
    germplasm: Option<&Germplasm>,
) -> Sample {
    let mut info = Map::new();
    let optional = [
        ("organism", row.get(SAMPLE_ORGANISM)),
        ("species", row.get(SAMPLE_SPECIES)),
        ("germplasmName", row.get(SAMPLE_GERMPLASM_NAME)),
        ("gid", row.get(SAMPLE_GID)),
        (INFO_CREATED_BY, ctx.created_by),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            info.insert(key.to_string(), Value::from(value));
        }
    }

    let plate_name = &plate.object.plate_name;
    Sample {
        sample_name: format!("{plate_name}_{well}"),
        plate_db_id: plate.object.plate_db_id.clone(),
        plate_name: Some(plate_name.clone()),
        row: row.get(SAMPLE_ROW).unwrap_or_default().to_ascii_uppercase(),
        column: row.get_int(SAMPLE_COLUMN).unwrap_or_default(),
        well: Some(well.to_string()),
        germplasm_db_id: germplasm.and_then(|g| g.germplasm_db_id.clone()),
        tissue_type: row.get_owned(SAMPLE_TISSUE),
        sample_description: row.get_owned(SAMPLE_COMMENTS),
        program_db_id: Some(ctx.program_db_id()),
        additional_info: info,
        external_references: vec![ctx.reference(EntityKind::Sample, submission_id.to_string())],
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::brapi::{BrapiStore, MemoryStore};
    use crate::types::ProgramId;

    fn row(n: usize, plate: &str, r: &str, c: &str) -> MappedRow {
        MappedRow::new(n)
            .with(SAMPLE_PLATE_ID, plate)
            .with(SAMPLE_ROW, r)
            .with(SAMPLE_COLUMN, c)
            .with(SAMPLE_ORGANISM, "Plant")
            .with(SAMPLE_TISSUE, "Leaf")
    }

    async fn run(
        store: &MemoryStore,
        program_id: ProgramId,
        rows: Vec<MappedRow>,
    ) -> (Result<Resolution, ImportError>, ValidationErrors) {
        let fields = BTreeMap::new();
        let ctx = ResolveContext {
            store,
            program_id,
            import_id: Uuid::new_v4(),
            reference_source: "test.local",
            overwrite: false,
            overwrite_reason: None,
            user_fields: &fields,
            created_by: None,
            file_name: Some("plates.csv"),
        };
        let mut errors = ValidationErrors::new();
        let table = MappedTable {
            rows,
            ..Default::default()
        };
        let result = resolve(&ctx, &table, &mut errors).await;
        (result, errors)
    }

    #[tokio::test]
    async fn same_well_flags_both_rows() {
        let store = MemoryStore::new();
        let rows = vec![
            row(2, "P1", "A", "1"),
            row(3, "P1", "B", "1"),
            row(4, "P1", "a", "1"),
        ];
        let (result, _) = run(&store, Uuid::new_v4(), rows).await;
        let err = result.err().unwrap();
        let flagged: Vec<usize> = err.row_errors().iter().map(|r| r.row_number).collect();
        assert_eq!(flagged, vec![2, 4]);
        assert!(err
            .row_errors()
            .iter()
            .all(|r| r.errors[0].field == "Row/Column"));
    }

    #[tokio::test]
    async fn new_plates_and_samples_share_submission_reference() {
        let store = MemoryStore::new();
        let rows = vec![row(2, "P1", "A", "1"), row(3, "P1", "A", "2")];
        let (result, errors) = run(&store, Uuid::new_v4(), rows).await;
        assert!(errors.is_empty());
        let resolution = result.unwrap();
        let submission = resolution.preview.submission.clone().unwrap();
        assert_eq!(submission.name, "plates.csv");

        let ImportPlan::Sample(plan) = resolution.plan else {
            panic!("expected sample plan");
        };
        assert_eq!(plan.plates.len(), 1);
        let id = submission.submission_id.to_string();
        assert_eq!(plan.samples[0].sample.external_references[0].reference_id, id);
        assert_eq!(
            plan.samples[0].sample.external_references[0].reference_source,
            "test.local/samples"
        );
        assert_eq!(plan.plates["P1"].object.external_references[0].reference_id, id);
    }

    #[tokio::test]
    async fn occupied_well_on_existing_plate_is_row_conflict() {
        let store = MemoryStore::new();
        let program = Uuid::new_v4();
        let plates = store
            .create_plates(vec![Plate {
                plate_name: "P1".to_string(),
                program_db_id: Some(program.to_string()),
                ..Default::default()
            }])
            .await
            .unwrap();
        store
            .create_samples(vec![Sample {
                sample_name: "P1_A01".to_string(),
                plate_db_id: plates[0].plate_db_id.clone(),
                row: "A".to_string(),
                column: 1,
                ..Default::default()
            }])
            .await
            .unwrap();

        let rows = vec![row(2, "P1", "A", "1"), row(3, "P1", "A", "2")];
        let (result, errors) = run(&store, program, rows).await;
        let preview = result.unwrap().preview;
        assert_eq!(preview.row(2).unwrap().state(EntityKind::Plate), Some(EntityState::Existing));
        assert_eq!(errors.for_row(2)[0].field, SAMPLE_WELL_FIELD);
        assert_eq!(errors.for_row(2)[0].http_status_code, 409);
        assert!(!errors.has_errors(3));
    }
}
