//! Column mapper: matches the header row of a parsed upload against a
//! mapping definition and turns each data row into a [`MappedRow`] keyed by
//! canonical column names.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ImportError;
use crate::parser::ParsedTable;
use crate::workflow::WorkflowKind;

/// Expected content of a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ColumnType {
    Text,
    /// Whole number. Non-numeric values fail the whole file; values outside
    /// the optional bounds are row errors.
    Integer {
        #[serde(skip_serializing_if = "Option::is_none")]
        min: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max: Option<i64>,
    },
    /// One of a fixed set of values, compared case-insensitively.
    Enumerated { values: Vec<String> },
}

impl ColumnType {
    pub fn integer() -> Self {
        Self::Integer {
            min: None,
            max: None,
        }
    }

    pub fn enumerated<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Enumerated {
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// Whether a column must be present and filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "column", rename_all = "snake_case")]
pub enum Requirement {
    Required,
    Optional,
    /// Required on every row that leaves the named column blank.
    RequiredUnless(String),
}

/// One recognised column of a mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    /// Canonical name; field errors are reported against it.
    pub name: String,
    /// Alternative headers accepted for this column.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    pub data_type: ColumnType,
    pub requirement: Requirement,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ColumnSpec {
    pub fn new(name: &str, data_type: ColumnType, requirement: Requirement) -> Self {
        Self {
            name: name.to_string(),
            aliases: Vec::new(),
            data_type,
            requirement,
            description: None,
        }
    }

    pub fn required(name: &str, data_type: ColumnType) -> Self {
        Self::new(name, data_type, Requirement::Required)
    }

    pub fn optional(name: &str, data_type: ColumnType) -> Self {
        Self::new(name, data_type, Requirement::Optional)
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    fn matches_header(&self, header: &str) -> bool {
        let header = normalize_header(header);
        normalize_header(&self.name) == header
            || self.aliases.iter().any(|a| normalize_header(a) == header)
    }
}

/// What to do with headers the mapping does not recognise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtraColumns {
    Ignore,
    /// Unrecognised columns are observation variables (traits).
    Traits,
}

/// A complete mapping for one workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingDefinition {
    pub id: String,
    pub name: String,
    pub workflow: WorkflowKind,
    pub columns: Vec<ColumnSpec>,
    pub extra_columns: ExtraColumns,
}

impl MappingDefinition {
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn required_columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns
            .iter()
            .filter(|c| c.requirement == Requirement::Required)
    }
}

/// One data row with values keyed by canonical column name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappedRow {
    /// 1-based spreadsheet row; the header is row 1.
    pub row_number: usize,
    values: HashMap<String, String>,
    /// Unrecognised columns in header order, with trimmed values.
    pub extra: Vec<(String, String)>,
}

impl MappedRow {
    pub fn new(row_number: usize) -> Self {
        Self {
            row_number,
            ..Self::default()
        }
    }

    pub fn with(mut self, column: &str, value: &str) -> Self {
        self.values.insert(column.to_string(), value.trim().to_string());
        self
    }

    /// Non-blank trimmed value of a canonical column.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values
            .get(column)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn get_owned(&self, column: &str) -> Option<String> {
        self.get(column).map(str::to_string)
    }

    /// Integer value; `None` when blank or not a whole number.
    pub fn get_int(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(parse_integer)
    }

    pub fn is_blank(&self, column: &str) -> bool {
        self.get(column).is_none()
    }
}

/// Output of the column mapper.
#[derive(Debug, Clone, Default)]
pub struct MappedTable {
    pub rows: Vec<MappedRow>,
    /// Canonical names of recognised columns present in the header.
    pub present_columns: Vec<String>,
    /// Headers not recognised by the mapping, in file order.
    pub extra_columns: Vec<String>,
}

impl MappedTable {
    pub fn has_column(&self, name: &str) -> bool {
        self.present_columns.iter().any(|c| c == name)
    }
}

/// Map a parsed table through a definition.
///
/// Fails with [`ImportError::MissingColumn`] naming the first absent required
/// column before any row is looked at. Entirely blank rows are dropped.
pub fn map_table(
    definition: &MappingDefinition,
    table: &ParsedTable,
) -> Result<MappedTable, ImportError> {
    // header index -> canonical column, None for extra columns
    let mut header_targets: Vec<Option<&ColumnSpec>> = Vec::with_capacity(table.headers.len());
    let mut present_columns: Vec<String> = Vec::new();
    let mut extra_columns: Vec<String> = Vec::new();

    for header in &table.headers {
        let spec = definition
            .columns
            .iter()
            .find(|spec| spec.matches_header(header));
        match spec {
            Some(spec) if !present_columns.contains(&spec.name) => {
                present_columns.push(spec.name.clone());
                header_targets.push(Some(spec));
            }
            // A repeated recognised header keeps its first occurrence.
            Some(_) => header_targets.push(None),
            None => {
                let trimmed = header.trim();
                if !trimmed.is_empty() && definition.extra_columns == ExtraColumns::Traits {
                    extra_columns.push(trimmed.to_string());
                }
                header_targets.push(None);
            }
        }
    }

    for spec in &definition.columns {
        if present_columns.contains(&spec.name) {
            continue;
        }
        let missing = match &spec.requirement {
            Requirement::Required => true,
            Requirement::RequiredUnless(other) => !present_columns.contains(other),
            Requirement::Optional => false,
        };
        if missing {
            return Err(ImportError::MissingColumn {
                column: spec.name.clone(),
            });
        }
    }

    let mut rows = Vec::with_capacity(table.rows.len());
    for (index, cells) in table.rows.iter().enumerate() {
        if cells.iter().all(|c| c.trim().is_empty()) {
            continue;
        }

        let mut row = MappedRow::new(index + 2);
        for (col, cell) in cells.iter().enumerate() {
            let value = cell.trim();
            match header_targets.get(col) {
                Some(Some(spec)) => {
                    row.values.insert(spec.name.clone(), value.to_string());
                }
                Some(None) => {
                    let header = table.headers[col].trim();
                    if extra_columns.iter().any(|e| e == header) {
                        row.extra.push((header.to_string(), value.to_string()));
                    }
                }
                // Cells beyond the header row are ignored.
                None => {}
            }
        }
        rows.push(row);
    }

    Ok(MappedTable {
        rows,
        present_columns,
        extra_columns,
    })
}

/// Parse a whole number, accepting spreadsheet renderings such as "3.0".
pub fn parse_integer(value: &str) -> Option<i64> {
    let value = value.trim();
    if let Ok(n) = value.parse::<i64>() {
        return Some(n);
    }
    match value.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 => Some(f as i64),
        _ => None,
    }
}

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Headers compare case-insensitively with runs of whitespace collapsed.
fn normalize_header(header: &str) -> String {
    WHITESPACE_RE.replace_all(header.trim(), " ").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn definition() -> MappingDefinition {
        MappingDefinition {
            id: "test".to_string(),
            name: "Test".to_string(),
            workflow: WorkflowKind::Germplasm,
            columns: vec![
                ColumnSpec::required("Name", ColumnType::Text),
                ColumnSpec::required("Source", ColumnType::Text),
                ColumnSpec::optional("Entry No", ColumnType::integer())
                    .with_aliases(&["Entry Number"]),
            ],
            extra_columns: ExtraColumns::Ignore,
        }
    }

    fn table(headers: &[&str], rows: &[&[&str]]) -> ParsedTable {
        ParsedTable::new(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn headers_match_case_insensitively() {
        let t = table(&["NAME", " source ", "entry  number"], &[&["A", "S", "1"]]);
        let mapped = map_table(&definition(), &t).unwrap();
        assert_eq!(mapped.rows[0].get("Name"), Some("A"));
        assert_eq!(mapped.rows[0].get("Source"), Some("S"));
        assert_eq!(mapped.rows[0].get_int("Entry No"), Some(1));
    }

    #[test]
    fn first_missing_required_column_is_reported() {
        let t = table(&["Entry No"], &[&["1"]]);
        assert_matches!(
            map_table(&definition(), &t),
            Err(ImportError::MissingColumn { column }) if column == "Name"
        );
    }

    #[test]
    fn blank_rows_are_skipped_but_numbering_is_kept() {
        let t = table(&["Name", "Source"], &[&["A", "S"], &["", "  "], &["B", "S"]]);
        let mapped = map_table(&definition(), &t).unwrap();
        assert_eq!(mapped.rows.len(), 2);
        assert_eq!(mapped.rows[0].row_number, 2);
        assert_eq!(mapped.rows[1].row_number, 4);
    }

    #[test]
    fn conditional_column_missing_only_without_fallback() {
        let mut def = definition();
        def.columns.push(ColumnSpec::optional("ObsUnitID", ColumnType::Text));
        def.columns.push(ColumnSpec::new(
            "Env",
            ColumnType::Text,
            Requirement::RequiredUnless("ObsUnitID".to_string()),
        ));

        let with_fallback = table(&["Name", "Source", "ObsUnitID"], &[&["A", "S", "x"]]);
        assert!(map_table(&def, &with_fallback).is_ok());

        let without = table(&["Name", "Source"], &[&["A", "S"]]);
        assert_matches!(
            map_table(&def, &without),
            Err(ImportError::MissingColumn { column }) if column == "Env"
        );
    }

    #[test]
    fn extra_columns_kept_for_trait_mappings() {
        let mut def = definition();
        def.extra_columns = ExtraColumns::Traits;
        let t = table(&["Name", "Source", "Plant Height"], &[&["A", "S", " 12 "]]);
        let mapped = map_table(&def, &t).unwrap();
        assert_eq!(mapped.extra_columns, vec!["Plant Height"]);
        assert_eq!(
            mapped.rows[0].extra,
            vec![("Plant Height".to_string(), "12".to_string())]
        );
    }

    #[test]
    fn parse_integer_accepts_float_rendering() {
        assert_eq!(parse_integer("3.0"), Some(3));
        assert_eq!(parse_integer("3.5"), None);
        assert_eq!(parse_integer("abc"), None);
    }
}
