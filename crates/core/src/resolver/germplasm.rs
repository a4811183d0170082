//! Germplasm workflow: every row is a new germplasm, all of them collected
//! into one new germplasm list. Parents are referenced by existing GID or by
//! entry number within the same file.

use std::collections::{BTreeSet, HashMap};

use serde_json::{Map, Value};

use super::{GermplasmEntry, GermplasmPlan, ImportPlan, MissingReferences, Resolution, ResolveContext};
use crate::brapi::{Germplasm, GermplasmList, Synonym, INFO_CREATED_BY};
use crate::error::ImportError;
use crate::mapping::{MappedRow, MappedTable};
use crate::preview::{EntityState, ImportPreview, Pending, RowEntity, RowResult};
use crate::registry::{
    GERM_BREEDING_METHOD, GERM_ENTRY_NO, GERM_EXTERNAL_UID, GERM_FEMALE_ENTRY_NO, GERM_FEMALE_GID,
    GERM_MALE_ENTRY_NO, GERM_MALE_GID, GERM_NAME, GERM_SOURCE, GERM_SYNONYMS,
};
use crate::validation::rules::{FieldError, RowErrors, ValidationErrors};
use crate::validation::uniqueness::{duplicate_values, format_id_list};
use crate::workflow::{EntityKind, WorkflowKind};

/// User field naming the list created by the import. Required.
pub const USER_FIELD_LIST_NAME: &str = "listName";
pub const USER_FIELD_LIST_DESCRIPTION: &str = "listDescription";

pub const LIST_TYPE_GERMPLASM: &str = "germplasm";

/// Pedigree placeholder for an unknown parent.
const UNKNOWN_PARENT: &str = "NA";

pub async fn resolve(
    ctx: &ResolveContext<'_>,
    table: &MappedTable,
    errors: &mut ValidationErrors,
) -> Result<Resolution, ImportError> {
    let list_name = ctx
        .user_field(USER_FIELD_LIST_NAME)
        .ok_or_else(|| ImportError::validation("A germplasm list name is required"))?;

    let rows = &table.rows;
    let entry_numbers = assign_entry_numbers(rows)?;
    check_unique_external_uids(rows)?;

    // entry number -> row index
    let by_entry: HashMap<i64, usize> = entry_numbers
        .iter()
        .enumerate()
        .map(|(index, entry)| (*entry, index))
        .collect();

    let parent_gids: Vec<String> = rows
        .iter()
        .flat_map(|r| [r.get_owned(GERM_FEMALE_GID), r.get_owned(GERM_MALE_GID)])
        .flatten()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let existing: HashMap<String, Germplasm> = if parent_gids.is_empty() {
        HashMap::new()
    } else {
        ctx.store
            .find_germplasm(ctx.program_id, &parent_gids)
            .await?
            .into_iter()
            .filter_map(|g| g.accession_number.clone().map(|gid| (gid, g)))
            .collect()
    };

    let mut missing = MissingReferences::default();
    missing.add(
        "Germplasm GID(s)",
        parent_gids
            .iter()
            .filter(|gid| !existing.contains_key(*gid))
            .cloned(),
    );
    missing.add(
        "Parental entry numbers",
        rows.iter()
            .flat_map(|r| [r.get_int(GERM_FEMALE_ENTRY_NO), r.get_int(GERM_MALE_ENTRY_NO)])
            .flatten()
            .filter(|entry| !by_entry.contains_key(entry))
            .map(|entry| entry.to_string()),
    );
    missing.into_result()?;

    let list = Pending::new(GermplasmList {
        list_name: list_name.to_string(),
        list_description: ctx.user_field(USER_FIELD_LIST_DESCRIPTION).map(str::to_string),
        list_type: LIST_TYPE_GERMPLASM.to_string(),
        list_owner_name: ctx.created_by.map(str::to_string),
        program_db_id: Some(ctx.program_db_id()),
        external_references: vec![ctx.import_reference(EntityKind::GermplasmList)],
        ..Default::default()
    });

    let parent_name = |gid: Option<&str>, entry: Option<i64>| -> Option<String> {
        if let Some(gid) = gid {
            return existing.get(gid).map(|g| g.germplasm_name.clone());
        }
        entry
            .and_then(|e| by_entry.get(&e))
            .and_then(|index| rows[*index].get_owned(GERM_NAME))
    };

    let mut preview = ImportPreview::new(WorkflowKind::Germplasm);
    let mut entries = Vec::with_capacity(rows.len());

    for (row, entry_number) in rows.iter().zip(entry_numbers.iter().copied()) {
        for field in [GERM_FEMALE_ENTRY_NO, GERM_MALE_ENTRY_NO] {
            if row.get_int(field) == Some(entry_number) {
                errors.add(
                    row.row_number,
                    FieldError::validation(field, "Germplasm cannot be its own parent"),
                );
            }
        }

        let female = parent_name(row.get(GERM_FEMALE_GID), row.get_int(GERM_FEMALE_ENTRY_NO));
        let male = parent_name(row.get(GERM_MALE_GID), row.get_int(GERM_MALE_ENTRY_NO));
        let germplasm = build_germplasm(ctx, row, entry_number, female, male);

        let mut result = RowResult::new(row.row_number);
        result.insert(
            EntityKind::Germplasm,
            RowEntity::new(
                EntityState::New,
                &germplasm,
                germplasm.external_references.first().cloned(),
            ),
        );
        result.insert(
            EntityKind::GermplasmList,
            RowEntity::new(
                list.state,
                &list.object,
                list.object.external_references.first().cloned(),
            ),
        );
        preview.rows.push(result);

        entries.push(GermplasmEntry {
            row_number: row.row_number,
            entry_number,
            germplasm,
        });
    }

    entries.sort_by_key(|e| e.entry_number);
    for _ in &entries {
        preview.count(EntityKind::Germplasm, EntityState::New);
    }
    preview.count(EntityKind::GermplasmList, list.state);

    Ok(Resolution {
        plan: ImportPlan::Germplasm(GermplasmPlan { list, entries }),
        preview,
    })
}

/// Entry numbers are either given on every row or on none; when none are
/// given rows are numbered in file order. Duplicates fail the file.
fn assign_entry_numbers(rows: &[MappedRow]) -> Result<Vec<i64>, ImportError> {
    let given = rows.iter().filter(|r| r.get(GERM_ENTRY_NO).is_some()).count();
    if given == 0 {
        return Ok((1..=rows.len() as i64).collect());
    }

    if given != rows.len() {
        let row_errors = rows
            .iter()
            .filter(|r| r.is_blank(GERM_ENTRY_NO))
            .map(|r| RowErrors {
                row_number: r.row_number,
                errors: vec![FieldError::missing_required(GERM_ENTRY_NO)],
            })
            .collect();
        return Err(ImportError::Validation {
            message: "Entry numbers must be provided for all rows or for none".to_string(),
            row_errors,
        });
    }

    let numbers: Vec<i64> = rows
        .iter()
        .map(|r| r.get_int(GERM_ENTRY_NO).unwrap_or_default())
        .collect();

    let mut counts: HashMap<i64, usize> = HashMap::new();
    for n in &numbers {
        *counts.entry(*n).or_default() += 1;
    }
    let duplicates: Vec<i64> = counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(n, _)| n)
        .collect();

    if !duplicates.is_empty() {
        let row_errors = rows
            .iter()
            .zip(&numbers)
            .filter(|(_, n)| duplicates.contains(n))
            .map(|(r, _)| RowErrors {
                row_number: r.row_number,
                errors: vec![FieldError::validation(GERM_ENTRY_NO, "Duplicate entry number")],
            })
            .collect();
        return Err(ImportError::Validation {
            message: format!(
                "Duplicate entry numbers found: {}",
                format_id_list(duplicates.into_iter().map(|n| n.to_string()))
            ),
            row_errors,
        });
    }

    Ok(numbers)
}

fn check_unique_external_uids(rows: &[MappedRow]) -> Result<(), ImportError> {
    let duplicates = duplicate_values(rows, GERM_EXTERNAL_UID);
    if duplicates.is_empty() {
        return Ok(());
    }
    let row_errors = rows
        .iter()
        .filter(|r| {
            r.get(GERM_EXTERNAL_UID)
                .is_some_and(|uid| duplicates.iter().any(|d| d == uid))
        })
        .map(|r| RowErrors {
            row_number: r.row_number,
            errors: vec![FieldError::validation(GERM_EXTERNAL_UID, "Duplicate External UID")],
        })
        .collect();
    Err(ImportError::Validation {
        message: format!("Duplicate External UIDs found: {}", duplicates.join(", ")),
        row_errors,
    })
}

fn build_germplasm(
    ctx: &ResolveContext<'_>,
    row: &MappedRow,
    entry_number: i64,
    female: Option<String>,
    male: Option<String>,
) -> Germplasm {
    let name = row.get_owned(GERM_NAME).unwrap_or_default();

    let pedigree = match (female, male) {
        (None, None) => None,
        (f, m) => Some(format!(
            "{}/{}",
            f.as_deref().unwrap_or(UNKNOWN_PARENT),
            m.as_deref().unwrap_or(UNKNOWN_PARENT)
        )),
    };

    let mut info = Map::new();
    info.insert("importEntryNumber".to_string(), Value::from(entry_number.to_string()));
    let optional = [
        ("femaleParentGid", row.get(GERM_FEMALE_GID)),
        ("maleParentGid", row.get(GERM_MALE_GID)),
        ("femaleParentEntryNo", row.get(GERM_FEMALE_ENTRY_NO)),
        ("maleParentEntryNo", row.get(GERM_MALE_ENTRY_NO)),
        ("externalUid", row.get(GERM_EXTERNAL_UID)),
        (INFO_CREATED_BY, ctx.created_by),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            info.insert(key.to_string(), Value::from(value));
        }
    }

    Germplasm {
        germplasm_name: name.clone(),
        default_display_name: Some(name),
        breeding_method_db_id: row.get(GERM_BREEDING_METHOD).map(str::to_ascii_uppercase),
        seed_source: row.get_owned(GERM_SOURCE),
        pedigree,
        synonyms: super::split_list(row.get(GERM_SYNONYMS))
            .into_iter()
            .map(|synonym| Synonym {
                synonym,
                synonym_type: None,
            })
            .collect(),
        program_db_id: Some(ctx.program_db_id()),
        additional_info: info,
        external_references: vec![ctx.import_reference(EntityKind::Germplasm)],
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::brapi::{BrapiStore, MemoryStore};
    use crate::types::ProgramId;
    use assert_matches::assert_matches;
    use uuid::Uuid;

    fn row(n: usize, name: &str, entry: &str) -> MappedRow {
        MappedRow::new(n)
            .with(GERM_NAME, name)
            .with(GERM_BREEDING_METHOD, "bpc")
            .with(GERM_SOURCE, "Field")
            .with(GERM_ENTRY_NO, entry)
    }

    fn table(rows: Vec<MappedRow>) -> MappedTable {
        MappedTable {
            rows,
            ..Default::default()
        }
    }

    async fn run(
        store: &MemoryStore,
        program_id: ProgramId,
        rows: Vec<MappedRow>,
    ) -> (Result<Resolution, ImportError>, ValidationErrors) {
        let mut fields = BTreeMap::new();
        fields.insert(USER_FIELD_LIST_NAME.to_string(), "Spring crosses".to_string());
        let ctx = ResolveContext {
            store,
            program_id,
            import_id: Uuid::new_v4(),
            reference_source: "test.local",
            overwrite: false,
            overwrite_reason: None,
            user_fields: &fields,
            created_by: Some("breeder"),
            file_name: None,
        };
        let mut errors = ValidationErrors::new();
        let result = resolve(&ctx, &table(rows), &mut errors).await;
        (result, errors)
    }

    #[tokio::test]
    async fn missing_parent_entries_listed_sorted_once() {
        let store = MemoryStore::new();
        let rows = vec![
            row(2, "A", "1").with(GERM_FEMALE_ENTRY_NO, "5"),
            row(3, "B", "2").with(GERM_FEMALE_ENTRY_NO, "4").with(GERM_MALE_ENTRY_NO, "5"),
            row(4, "C", "3").with(GERM_MALE_ENTRY_NO, "1"),
        ];
        let (result, _) = run(&store, Uuid::new_v4(), rows).await;
        assert_matches!(
            result.err(),
            Some(ImportError::MissingReference { message })
                if message == "Parental entry numbers not found: 4, 5"
        );
    }

    #[tokio::test]
    async fn duplicate_entry_numbers_fail_the_file() {
        let store = MemoryStore::new();
        let rows = vec![row(2, "A", "1"), row(3, "B", "1"), row(4, "C", "2")];
        let (result, _) = run(&store, Uuid::new_v4(), rows).await;
        let err = result.err().unwrap();
        assert_eq!(err.to_string(), "Duplicate entry numbers found: 1");
        assert_eq!(err.row_errors().len(), 2);
    }

    #[tokio::test]
    async fn entry_numbers_assigned_when_absent() {
        let store = MemoryStore::new();
        let rows = vec![row(2, "A", ""), row(3, "B", "")];
        let (result, _) = run(&store, Uuid::new_v4(), rows).await;
        let resolution = result.unwrap();
        let ImportPlan::Germplasm(plan) = resolution.plan else {
            panic!("expected germplasm plan");
        };
        let numbers: Vec<i64> = plan.entries.iter().map(|e| e.entry_number).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[tokio::test]
    async fn pedigree_uses_existing_gid_and_file_entry() {
        let store = MemoryStore::new();
        let program = Uuid::new_v4();
        store
            .create_germplasm(vec![Germplasm {
                germplasm_name: "Elite".to_string(),
                accession_number: Some("100".to_string()),
                program_db_id: Some(program.to_string()),
                ..Default::default()
            }])
            .await
            .unwrap();

        let rows = vec![
            row(2, "Parent", "1"),
            row(3, "Child", "2")
                .with(GERM_FEMALE_GID, "100")
                .with(GERM_MALE_ENTRY_NO, "1"),
        ];
        let (result, errors) = run(&store, program, rows).await;
        assert!(errors.is_empty());
        let ImportPlan::Germplasm(plan) = result.unwrap().plan else {
            panic!("expected germplasm plan");
        };
        assert_eq!(plan.entries[1].germplasm.pedigree.as_deref(), Some("Elite/Parent"));
        assert_eq!(plan.entries[1].germplasm.breeding_method_db_id.as_deref(), Some("BPC"));
    }

    #[tokio::test]
    async fn self_parent_is_a_row_error() {
        let store = MemoryStore::new();
        let rows = vec![row(2, "A", "1").with(GERM_FEMALE_ENTRY_NO, "1")];
        let (result, errors) = run(&store, Uuid::new_v4(), rows).await;
        assert!(result.is_ok());
        assert_eq!(errors.for_row(2)[0].field, GERM_FEMALE_ENTRY_NO);
    }

    #[tokio::test]
    async fn unknown_parent_gid_is_missing_reference() {
        let store = MemoryStore::new();
        let rows = vec![row(2, "A", "1").with(GERM_MALE_GID, "77")];
        let (result, _) = run(&store, Uuid::new_v4(), rows).await;
        assert_matches!(
            result.err(),
            Some(ImportError::MissingReference { message }) if message == "Germplasm GID(s) not found: 77"
        );
    }
}
