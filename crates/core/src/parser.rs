//! Spreadsheet parsing: CSV, XLS and XLSX bytes into a header + string rows
//! table. Values are kept as text; typing happens in the column mapper.

use std::io::{Cursor, Read, Seek};

use calamine::{open_workbook_from_rs, Data, Reader, Xls, Xlsx};
use serde::{Deserialize, Serialize};

use crate::error::ImportError;

pub const MIME_CSV: &str = "text/csv";
pub const MIME_XLS: &str = "application/vnd.ms-excel";
pub const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Preferred worksheet name in uploaded workbooks.
pub const DATA_SHEET_NAME: &str = "Data";

/// A parsed upload: the header row and every data row as raw strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ParsedTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Xls,
    Xlsx,
}

impl FileFormat {
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or(mime).trim();
        match essence.to_ascii_lowercase().as_str() {
            MIME_CSV | "application/csv" => Some(Self::Csv),
            MIME_XLS => Some(Self::Xls),
            MIME_XLSX => Some(Self::Xlsx),
            _ => None,
        }
    }

    pub fn from_file_name(name: &str) -> Option<Self> {
        let ext = name.rsplit_once('.')?.1.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "xls" => Some(Self::Xls),
            "xlsx" => Some(Self::Xlsx),
            _ => None,
        }
    }

    /// Pick the format from the declared mime type, falling back to the file
    /// extension when the client sent a generic type.
    pub fn detect(mime: Option<&str>, file_name: Option<&str>) -> Result<Self, ImportError> {
        if let Some(format) = mime.and_then(Self::from_mime) {
            return Ok(format);
        }
        if let Some(format) = file_name.and_then(Self::from_file_name) {
            return Ok(format);
        }
        Err(ImportError::UnsupportedType(
            mime.or(file_name).unwrap_or("unknown").to_string(),
        ))
    }
}

/// Parse raw upload bytes of the given mime type.
pub fn parse(bytes: &[u8], mime: &str) -> Result<ParsedTable, ImportError> {
    let format =
        FileFormat::from_mime(mime).ok_or_else(|| ImportError::UnsupportedType(mime.to_string()))?;
    parse_format(bytes, format)
}

pub fn parse_format(bytes: &[u8], format: FileFormat) -> Result<ParsedTable, ImportError> {
    match format {
        FileFormat::Csv => parse_csv(bytes),
        FileFormat::Xls => {
            let mut workbook: Xls<_> = open_workbook_from_rs(Cursor::new(bytes))
                .map_err(|e| ImportError::Parsing(format!("failed to open XLS workbook: {e}")))?;
            read_workbook(&mut workbook)
        }
        FileFormat::Xlsx => {
            let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))
                .map_err(|e| ImportError::Parsing(format!("failed to open XLSX workbook: {e}")))?;
            read_workbook(&mut workbook)
        }
    }
}

fn parse_csv(bytes: &[u8]) -> Result<ParsedTable, ImportError> {
    // Strip a UTF-8 BOM written by spreadsheet exports.
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut records = reader.records();
    let headers = match records.next() {
        Some(record) => record
            .map_err(|e| ImportError::Parsing(e.to_string()))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect(),
        None => return Err(ImportError::Parsing("file is empty".to_string())),
    };

    let mut rows = Vec::new();
    for record in records {
        let record = record.map_err(|e| ImportError::Parsing(e.to_string()))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(ParsedTable { headers, rows })
}

fn read_workbook<RS, W>(workbook: &mut W) -> Result<ParsedTable, ImportError>
where
    RS: Read + Seek,
    W: Reader<RS>,
{
    let sheet_names = workbook.sheet_names();
    let sheet = sheet_names
        .iter()
        .find(|name| name.eq_ignore_ascii_case(DATA_SHEET_NAME))
        .or_else(|| sheet_names.first())
        .cloned()
        .ok_or_else(|| ImportError::Parsing("workbook contains no sheets".to_string()))?;

    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| ImportError::Parsing(format!("failed to read sheet '{sheet}': {e:?}")))?;

    let mut rows_iter = range.rows().enumerate();
    let headers = match rows_iter.next() {
        Some((_, cells)) => cells
            .iter()
            .map(|cell| cell_to_string(cell, 1).map(|h| h.trim().to_string()))
            .collect::<Result<Vec<_>, _>>()?,
        None => return Err(ImportError::Parsing(format!("sheet '{sheet}' is empty"))),
    };

    let mut rows = Vec::new();
    for (index, cells) in rows_iter {
        let row_number = index + 1;
        let row = cells
            .iter()
            .map(|cell| cell_to_string(cell, row_number))
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(row);
    }

    Ok(ParsedTable { headers, rows })
}

fn cell_to_string(cell: &Data, row_number: usize) -> Result<String, ImportError> {
    match cell {
        Data::Empty => Ok(String::new()),
        Data::String(s) => Ok(s.clone()),
        Data::Int(i) => Ok(i.to_string()),
        // Spreadsheets store whole numbers as floats; "3.0" must read as "3".
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => Ok(format!("{}", *f as i64)),
        Data::Float(f) => Ok(f.to_string()),
        Data::Bool(b) => Ok(b.to_string()),
        Data::Error(e) => Err(ImportError::Parsing(format!(
            "malformed cell value {e:?} at row {row_number}"
        ))),
        other => Ok(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn csv_headers_and_rows() {
        let csv = b"Name,Entry No\nAlpha,1\nBeta,2\n";
        let table = parse(csv, MIME_CSV).unwrap();
        assert_eq!(table.headers, vec!["Name", "Entry No"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1], vec!["Beta", "2"]);
    }

    #[test]
    fn csv_with_bom_and_ragged_rows() {
        let csv = "\u{feff}Name,Source\nAlpha\n".as_bytes();
        let table = parse(csv, "text/csv; charset=utf-8").unwrap();
        assert_eq!(table.headers[0], "Name");
        assert_eq!(table.rows[0], vec!["Alpha"]);
    }

    #[test]
    fn empty_csv_is_a_parsing_error() {
        assert_matches!(parse(b"", MIME_CSV), Err(ImportError::Parsing(_)));
    }

    #[test]
    fn unknown_mime_is_unsupported() {
        assert_matches!(
            parse(b"{}", "application/json"),
            Err(ImportError::UnsupportedType(mime)) if mime == "application/json"
        );
    }

    #[test]
    fn detect_falls_back_to_extension() {
        let format = FileFormat::detect(Some("application/octet-stream"), Some("plots.XLSX"));
        assert_matches!(format, Ok(FileFormat::Xlsx));
    }

    #[test]
    fn corrupt_workbook_is_a_parsing_error() {
        assert_matches!(parse(b"not a zip", MIME_XLSX), Err(ImportError::Parsing(_)));
    }

    #[test]
    fn whole_floats_render_without_fraction() {
        assert_eq!(cell_to_string(&Data::Float(12.0), 2).unwrap(), "12");
        assert_eq!(cell_to_string(&Data::Float(1.5), 2).unwrap(), "1.5");
    }
}
