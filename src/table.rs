use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Canonical name of the mandatory course column
pub const COURSE: &str = "Curso";

/// A column header as read from the header row
///
/// Text header cells become labels. Anything else the reader finds there
/// (a number, a date) is kept as a value so the classifier can tell it apart
/// from a real column name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Header {
    Label(String),
    Value(f64),
}

impl Header {
    /// The header text, if the header is a label
    pub fn label(&self) -> Option<&str> {
        match self {
            Header::Label(s) => Some(s),
            Header::Value(_) => None,
        }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Header::Label(s) => f.write_str(s),
            Header::Value(v) => f.write_str(&format_number(*v)),
        }
    }
}

/// A non-missing cell value
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Number(n) => f.write_str(&format_number(*n)),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

/// Formats a number the way course codes are shown: integral values without
/// a trailing `.0`.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Named columns over a sequence of rows
///
/// Missing values are `None`. Every row has exactly one slot per column.
/// The serialized form is the "split" layout: `{"columns": [...], "data": [[...]]}`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<Header>,
    data: Vec<Vec<Option<Cell>>>,
}

impl Table {
    /// Builds a table, padding short rows with missing values and cutting long ones.
    pub fn new(columns: Vec<Header>, rows: Vec<Vec<Option<Cell>>>) -> Self {
        let width = columns.len();
        let data = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, None);
                row
            })
            .collect();
        Table { columns, data }
    }

    pub fn columns(&self) -> &[Header] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Option<Cell>>] {
        &self.data
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn height(&self) -> usize {
        self.data.len()
    }

    /// Position of the first column whose label is exactly `name`
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|h| h.label() == Some(name))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Values of one column, top to bottom
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = Option<&Cell>> + '_ {
        self.data.iter().map(move |row| row.get(index).and_then(|c| c.as_ref()))
    }

    /// Course of every row as text, `None` where the course cell is missing
    ///
    /// Returns an empty vector when the table has no course column.
    pub fn course_keys(&self) -> Vec<Option<String>> {
        match self.column_index(COURSE) {
            Some(idx) => self
                .column_values(idx)
                .map(|cell| cell.map(|c| c.to_string()))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Distinct course values, sorted
    pub fn courses(&self) -> Vec<String> {
        self.course_keys()
            .into_iter()
            .flatten()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Row-wise concatenation
    ///
    /// Columns are the union of all inputs in order of first appearance.
    /// Cells of columns a table lacks are missing.
    pub fn concat(tables: Vec<Table>) -> Table {
        let mut columns: Vec<Header> = Vec::new();
        for table in &tables {
            for header in &table.columns {
                if !columns.contains(header) {
                    columns.push(header.clone());
                }
            }
        }

        let mut data = Vec::new();
        for table in tables {
            let mapping: Vec<usize> = table
                .columns
                .iter()
                .map(|h| columns.iter().position(|c| c == h).unwrap_or_default())
                .collect();
            for row in table.data {
                let mut out = vec![None; columns.len()];
                for (cell, &target) in row.into_iter().zip(&mapping) {
                    out[target] = cell;
                }
                data.push(out);
            }
        }

        Table { columns, data }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Table> {
        let table: Table = serde_json::from_str(json)?;
        Ok(Table::new(table.columns, table.data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(s: &str) -> Header {
        Header::Label(s.to_string())
    }

    fn num(n: f64) -> Option<Cell> {
        Some(Cell::Number(n))
    }

    fn text(s: &str) -> Option<Cell> {
        Some(Cell::Text(s.to_string()))
    }

    #[test]
    fn short_rows_are_padded() {
        let table = Table::new(vec![label("Curso"), label("T1")], vec![vec![text("1A")]]);
        assert_eq!(table.rows()[0], vec![text("1A"), None]);
    }

    #[test]
    fn courses_are_sorted_and_distinct() {
        let table = Table::new(
            vec![label("Curso")],
            vec![vec![text("1B")], vec![text("1A")], vec![None], vec![text("1B")]],
        );
        assert_eq!(table.courses(), vec!["1A".to_string(), "1B".to_string()]);
    }

    #[test]
    fn numeric_courses_drop_trailing_zero() {
        let table = Table::new(vec![label("Curso")], vec![vec![num(3.0)], vec![num(2.5)]]);
        assert_eq!(table.courses(), vec!["2.5".to_string(), "3".to_string()]);
    }

    #[test]
    fn concat_takes_column_union_in_first_seen_order() {
        let a = Table::new(
            vec![label("Curso"), label("T1")],
            vec![vec![text("1A"), num(8.0)]],
        );
        let b = Table::new(
            vec![label("Curso"), label("T2")],
            vec![vec![text("1B"), num(6.0)]],
        );
        let joined = Table::concat(vec![a, b]);
        assert_eq!(joined.columns(), &[label("Curso"), label("T1"), label("T2")]);
        assert_eq!(joined.rows()[0], vec![text("1A"), num(8.0), None]);
        assert_eq!(joined.rows()[1], vec![text("1B"), None, num(6.0)]);
    }

    #[test]
    fn json_uses_split_layout() {
        let table = Table::new(
            vec![label("Curso"), Header::Value(2024.0)],
            vec![vec![text("1A"), None]],
        );
        let json = table.to_json().unwrap();
        assert_eq!(json, r#"{"columns":["Curso",2024.0],"data":[["1A",null]]}"#);
        assert_eq!(Table::from_json(&json).unwrap(), table);
    }

    #[test]
    fn garbage_json_is_rejected() {
        assert!(Table::from_json("{\"columns\": 3}").is_err());
    }
}
