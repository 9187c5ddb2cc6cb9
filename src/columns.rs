//! Splits a table's columns into identification columns and subject columns.

use crate::table::{Cell, Header, Table};

const IDENTIFICATION: [&str; 3] = ["cedula", "nombre", "curso"];

/// How the evaluations pipeline treats one column
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColumnClass {
    /// Student id, name or course
    Identification,
    /// A sub-topic whose values are all numeric (or missing)
    NumericSubject,
    Excluded(Exclusion),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Exclusion {
    /// Last non-identification column, taken to be the final score
    FinalScore,
    /// Holds at least one text value
    NonNumeric,
    /// Header is not text, so the column cannot be named in a selection
    Unlabelled,
}

/// Folds a header to the form identification names are compared in.
pub fn fold_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .replace('é', "e")
}

/// True when `name` is one of the identification columns (cédula, nombre, curso).
pub fn is_identification(name: &str) -> bool {
    let folded = fold_name(name);
    IDENTIFICATION.contains(&folded.as_str())
}

fn header_is_identification(header: &Header) -> bool {
    header.label().is_some_and(is_identification)
}

/// Activity columns: every labelled, non-identification column in order.
pub fn task_columns(columns: &[Header]) -> Vec<String> {
    columns
        .iter()
        .filter_map(Header::label)
        .filter(|name| !is_identification(name))
        .map(str::to_string)
        .collect()
}

/// Classifies every column of `table` for the evaluations pipeline.
pub fn classify_evaluation_columns(table: &Table) -> Vec<(Header, ColumnClass)> {
    let final_score = table
        .columns()
        .iter()
        .rposition(|h| !header_is_identification(h));

    table
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, header)| {
            let class = if header_is_identification(header) {
                ColumnClass::Identification
            } else if Some(idx) == final_score {
                ColumnClass::Excluded(Exclusion::FinalScore)
            } else if header.label().is_none() {
                ColumnClass::Excluded(Exclusion::Unlabelled)
            } else if is_numeric_column(table, idx) {
                ColumnClass::NumericSubject
            } else {
                ColumnClass::Excluded(Exclusion::NonNumeric)
            };
            (header.clone(), class)
        })
        .collect()
}

/// Sub-topic columns: the labels classified as [`ColumnClass::NumericSubject`].
pub fn evaluation_columns(table: &Table) -> Vec<String> {
    classify_evaluation_columns(table)
        .into_iter()
        .filter(|(_, class)| *class == ColumnClass::NumericSubject)
        .filter_map(|(header, _)| header.label().map(str::to_string))
        .collect()
}

// A column with only missing values counts as numeric.
fn is_numeric_column(table: &Table, idx: usize) -> bool {
    table
        .column_values(idx)
        .flatten()
        .all(|cell| matches!(cell, Cell::Number(_)))
}
