//! Column evaluator: pure logic, no store access.

use super::rules::{FieldError, ValidationErrors};
use crate::error::ImportError;
use crate::mapping::{
    parse_integer, ColumnSpec, ColumnType, MappedRow, MappedTable, MappingDefinition, Requirement,
};

/// Validate every mapped row against its mapping.
///
/// A value of the wrong data type fails the whole file. Everything else is
/// collected per row so that all rows are reported together.
pub fn validate_rows(
    definition: &MappingDefinition,
    table: &MappedTable,
) -> Result<ValidationErrors, ImportError> {
    check_data_types(definition, table)?;

    let mut errors = ValidationErrors::new();
    for row in &table.rows {
        errors.extend(row.row_number, evaluate_row(definition, row));
    }
    Ok(errors)
}

/// Reject the file on the first non-numeric value in an integer column.
pub fn check_data_types(
    definition: &MappingDefinition,
    table: &MappedTable,
) -> Result<(), ImportError> {
    let integer_columns: Vec<&ColumnSpec> = definition
        .columns
        .iter()
        .filter(|c| matches!(c.data_type, ColumnType::Integer { .. }))
        .collect();

    for row in &table.rows {
        for spec in &integer_columns {
            if let Some(value) = row.get(&spec.name) {
                if parse_integer(value).is_none() {
                    return Err(ImportError::InvalidType {
                        column: spec.name.clone(),
                        row: row.row_number,
                        value: value.to_string(),
                        expected: "integer",
                    });
                }
            }
        }
    }
    Ok(())
}

/// Field errors for a single row. Assumes data types were already checked.
pub fn evaluate_row(definition: &MappingDefinition, row: &MappedRow) -> Vec<FieldError> {
    definition
        .columns
        .iter()
        .filter_map(|spec| evaluate_column(spec, row))
        .collect()
}

fn evaluate_column(spec: &ColumnSpec, row: &MappedRow) -> Option<FieldError> {
    let Some(value) = row.get(&spec.name) else {
        return match &spec.requirement {
            Requirement::Required => Some(FieldError::missing_required(&spec.name)),
            Requirement::RequiredUnless(other) if row.is_blank(other) => {
                Some(FieldError::missing_required(&spec.name))
            }
            _ => None,
        };
    };

    match &spec.data_type {
        ColumnType::Text => None,
        ColumnType::Integer { min, max } => {
            let n = parse_integer(value)?;
            let below = min.is_some_and(|m| n < m);
            let above = max.is_some_and(|m| n > m);
            if below || above {
                Some(FieldError::validation(&spec.name, range_message(*min, *max)))
            } else {
                None
            }
        }
        ColumnType::Enumerated { values } => {
            if values.iter().any(|v| v.eq_ignore_ascii_case(value)) {
                None
            } else {
                Some(FieldError::validation(
                    &spec.name,
                    format!(
                        "Invalid value \"{value}\"; expected one of: {}",
                        values.join(", ")
                    ),
                ))
            }
        }
    }
}

fn range_message(min: Option<i64>, max: Option<i64>) -> String {
    match (min, max) {
        (Some(min), Some(max)) => format!("Value must be between {min} and {max}"),
        (Some(min), None) => format!("Value must be at least {min}"),
        (None, Some(max)) => format!("Value must be at most {max}"),
        (None, None) => "Value out of range".to_string(),
    }
}

/// Canonical spelling of an enumerated value, matching case-insensitively.
pub fn canonical_enum_value<'a>(spec: &'a ColumnSpec, value: &str) -> Option<&'a str> {
    match &spec.data_type {
        ColumnType::Enumerated { values } => values
            .iter()
            .find(|v| v.eq_ignore_ascii_case(value))
            .map(String::as_str),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{map_table, ExtraColumns};
    use crate::parser::ParsedTable;
    use crate::workflow::WorkflowKind;
    use assert_matches::assert_matches;

    fn definition() -> MappingDefinition {
        MappingDefinition {
            id: "plates".to_string(),
            name: "Plates".to_string(),
            workflow: WorkflowKind::SampleSubmission,
            columns: vec![
                ColumnSpec::required("PlateID", ColumnType::Text),
                ColumnSpec::required(
                    "Row",
                    ColumnType::enumerated(["A", "B", "C", "D", "E", "F", "G", "H"]),
                ),
                ColumnSpec::required(
                    "Column",
                    ColumnType::Integer {
                        min: Some(1),
                        max: Some(12),
                    },
                ),
                ColumnSpec::optional("Tissue", ColumnType::Text),
            ],
            extra_columns: ExtraColumns::Ignore,
        }
    }

    fn mapped(rows: &[&[&str]]) -> MappedTable {
        let table = ParsedTable::new(
            vec!["PlateID".into(), "Row".into(), "Column".into(), "Tissue".into()],
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        );
        map_table(&definition(), &table).unwrap()
    }

    #[test]
    fn blank_required_field_reports_canonical_name() {
        let table = mapped(&[&["", "A", "1", ""]]);
        let errors = validate_rows(&definition(), &table).unwrap();
        let row = errors.for_row(2);
        assert_eq!(row.len(), 1);
        assert_eq!(row[0].field, "PlateID");
        assert_eq!(row[0].http_status_code, 422);
    }

    #[test]
    fn enum_match_is_case_insensitive() {
        let table = mapped(&[&["P1", "a", "1", ""], &["P1", "Z", "2", ""]]);
        let errors = validate_rows(&definition(), &table).unwrap();
        assert!(!errors.has_errors(2));
        assert_eq!(errors.for_row(3)[0].field, "Row");
    }

    #[test]
    fn out_of_range_integer_is_a_row_error() {
        let table = mapped(&[&["P1", "A", "13", ""]]);
        let errors = validate_rows(&definition(), &table).unwrap();
        assert_eq!(
            errors.for_row(2)[0].message,
            "Value must be between 1 and 12"
        );
    }

    #[test]
    fn non_numeric_integer_fails_the_file() {
        let table = mapped(&[&["P1", "A", "1", ""], &["P1", "B", "two", ""]]);
        assert_matches!(
            validate_rows(&definition(), &table),
            Err(ImportError::InvalidType { column, row: 3, .. }) if column == "Column"
        );
    }

    #[test]
    fn required_unless_is_satisfied_by_other_column() {
        let spec = ColumnSpec::new(
            "Env",
            ColumnType::Text,
            Requirement::RequiredUnless("ObsUnitID".to_string()),
        );
        let def = MappingDefinition {
            columns: vec![spec, ColumnSpec::optional("ObsUnitID", ColumnType::Text)],
            ..definition()
        };
        let with_id = MappedRow::new(2).with("ObsUnitID", "abc");
        let without = MappedRow::new(3);
        assert!(evaluate_row(&def, &with_id).is_empty());
        assert_eq!(evaluate_row(&def, &without)[0].field, "Env");
    }
}
