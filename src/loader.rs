use crate::columns::fold_name;
use crate::error::IngestError;
use crate::table::{COURSE, Cell, Header, Table};
use calamine::{Data, Range, Reader, open_workbook_auto_from_rs};
use log::{info, warn};
use std::io::Cursor;

/// Zero-based physical row holding the column headers. The two rows above
/// it are the report title and are ignored.
pub const HEADER_ROW: u32 = 2;

const CANONICAL: [(&str, &str); 3] = [("cedula", "Cédula"), ("nombre", "Nombre"), ("curso", "Curso")];

/// Which sheets of the workbook make up the table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SheetMode {
    /// Only the first sheet
    First,
    /// Every sheet, concatenated row-wise
    All,
}

/// Load a grade table from an uploaded workbook
///
/// Reads the selected sheet(s) with the header on the third row, trims header
/// names, rewrites the identification headers to their canonical spelling and
/// requires a `Curso` column in the result.
///
/// # Arguments
/// * `bytes` - Raw file content (xlsx, xlsm, xlsb, xls or ods)
/// * `mode` - Whether to read the first sheet or all of them
///
/// # Errors
/// * [`IngestError::Workbook`] if the file is not a readable workbook
/// * [`IngestError::NoSheets`] if the workbook is empty
/// * [`IngestError::MissingHeaderRow`] if a sheet is shorter than three rows
/// * [`IngestError::MissingCourseColumn`] if no column normalises to `Curso`
pub fn load_workbook(bytes: &[u8], mode: SheetMode) -> Result<Table, IngestError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| IngestError::Workbook(e.to_string()))?;

    let mut names = workbook.sheet_names();
    if names.is_empty() {
        return Err(IngestError::NoSheets);
    }
    if mode == SheetMode::First {
        names.truncate(1);
    }

    let mut sheets = Vec::with_capacity(names.len());
    for name in &names {
        let range = workbook
            .worksheet_range(name)
            .map_err(|e| IngestError::Workbook(e.to_string()))?;
        sheets.push(read_sheet(name, &range)?);
    }

    let table = Table::concat(sheets);
    if !table.has_column(COURSE) {
        warn!("upload rejected: no course column among {:?}", table.columns());
        return Err(IngestError::MissingCourseColumn);
    }

    info!(
        "loaded {} sheet(s): {} rows x {} columns",
        names.len(),
        table.height(),
        table.width()
    );
    Ok(table)
}

fn read_sheet(name: &str, range: &Range<Data>) -> Result<Table, IngestError> {
    let missing_header = || IngestError::MissingHeaderRow {
        sheet: name.to_string(),
    };
    let (start, end) = match (range.start(), range.end()) {
        (Some(start), Some(end)) => (start, end),
        _ => return Err(missing_header()),
    };
    if end.0 < HEADER_ROW {
        return Err(missing_header());
    }

    let cols = start.1..=end.1;
    let raw_headers: Vec<Header> = cols
        .clone()
        .enumerate()
        .map(|(i, c)| header_from(range.get_value((HEADER_ROW, c)), i))
        .collect();
    let headers = dedupe_headers(normalize_headers(raw_headers));

    let mut rows = Vec::new();
    for r in (HEADER_ROW + 1).max(start.0)..=end.0 {
        let row: Vec<Option<Cell>> = cols
            .clone()
            .map(|c| range.get_value((r, c)).and_then(cell_from))
            .collect();
        if row.iter().any(Option::is_some) {
            rows.push(row);
        }
    }

    Ok(Table::new(headers, rows))
}

/// Trim labels and give identification columns their canonical spelling.
pub fn normalize_headers(headers: Vec<Header>) -> Vec<Header> {
    headers
        .into_iter()
        .map(|header| match header {
            Header::Label(label) => {
                let trimmed = label.trim();
                let folded = fold_name(trimmed);
                let canonical = CANONICAL
                    .iter()
                    .find(|(key, _)| *key == folded)
                    .map(|(_, canonical)| *canonical);
                Header::Label(canonical.unwrap_or(trimmed).to_string())
            }
            other => other,
        })
        .collect()
}

// Repeated labels become `X`, `X.1`, `X.2`...
fn dedupe_headers(headers: Vec<Header>) -> Vec<Header> {
    let mut seen: Vec<Header> = Vec::with_capacity(headers.len());
    for header in headers {
        let mut candidate = header.clone();
        if let Header::Label(base) = &header {
            let mut n = 1;
            while seen.contains(&candidate) {
                candidate = Header::Label(format!("{}.{}", base, n));
                n += 1;
            }
        }
        seen.push(candidate);
    }
    seen
}

fn header_from(data: Option<&Data>, position: usize) -> Header {
    let unnamed = || Header::Label(format!("Unnamed: {}", position));
    match data {
        Some(Data::String(s)) if !s.trim().is_empty() => Header::Label(s.clone()),
        Some(Data::DateTimeIso(s)) | Some(Data::DurationIso(s)) => Header::Label(s.clone()),
        Some(Data::Int(i)) => Header::Value(*i as f64),
        Some(Data::Float(f)) => Header::Value(*f),
        Some(Data::Bool(b)) => Header::Value(if *b { 1.0 } else { 0.0 }),
        Some(Data::DateTime(dt)) => Header::Value(dt.as_f64()),
        _ => unnamed(),
    }
}

fn cell_from(data: &Data) -> Option<Cell> {
    match data {
        Data::Int(i) => Some(Cell::Number(*i as f64)),
        Data::Float(f) if f.is_finite() => Some(Cell::Number(*f)),
        Data::Bool(b) => Some(Cell::Number(if *b { 1.0 } else { 0.0 })),
        Data::DateTime(dt) => Some(Cell::Number(dt.as_f64())),
        Data::String(s) if !s.trim().is_empty() => Some(Cell::Text(s.clone())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(Cell::Text(s.clone())),
        _ => None,
    }
}
