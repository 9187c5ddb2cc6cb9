//! Filter, reshape and aggregate a grade table for a filter selection.
//!
//! The table is filtered to the selected courses, melted into long-form
//! `(course, subject, value)` records over the selected subjects, and then
//! reduced to a mean per course and a frequency table per course for every
//! subject.

use crate::error::AnalysisError;
use crate::table::{Cell, Table};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Which chart to draw for each subject
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ChartKind {
    Bars,
    Trend,
}

impl ChartKind {
    /// Reads the `tipo_grafico` form field. Only `barras` means bars;
    /// any other value means trend, and an absent field means bars.
    pub fn from_form(value: Option<&str>) -> Self {
        match value {
            None | Some("barras") => ChartKind::Bars,
            Some(_) => ChartKind::Trend,
        }
    }

    /// Word used at the start of chart titles
    pub fn title(self) -> &'static str {
        match self {
            ChartKind::Bars => "Barras",
            ChartKind::Trend => "Tendencias",
        }
    }
}

/// Courses, subjects and chart kind chosen for one request
#[derive(Clone, Debug, PartialEq)]
pub struct Selection {
    pub courses: Vec<String>,
    pub subjects: Vec<String>,
    pub kind: ChartKind,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.courses.is_empty() || self.subjects.is_empty()
    }
}

/// One long-form row
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub course: String,
    pub subject: String,
    pub value: i64,
}

/// Traffic-light band of an indicator on the 0-10 scale
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Good,
    Warning,
    Poor,
}

impl Band {
    pub fn for_indicator(value: f64) -> Self {
        if value >= 7.0 {
            Band::Good
        } else if value >= 5.0 {
            Band::Warning
        } else {
            Band::Poor
        }
    }
}

/// Mean of one subject for one course
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Indicator {
    pub course: String,
    /// Arithmetic mean of the coerced values
    pub mean: f64,
    /// Mean on the 0-10 display scale
    pub indicator: f64,
    pub band: Band,
}

/// Correct/incorrect tally of a binary subject
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BinaryCounts {
    pub correct: usize,
    pub wrong: usize,
}

impl BinaryCounts {
    pub fn total(&self) -> usize {
        self.correct + self.wrong
    }
}

/// Aggregates of one subject
///
/// `indicators` are ordered by course; `frequencies` follow the order of the
/// selected courses and include selected courses without data.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SubjectSummary<F> {
    pub subject: String,
    pub indicators: Vec<Indicator>,
    pub frequencies: Vec<(String, F)>,
}

/// Grade counts keyed by grade, ascending
pub type GradeCounts = BTreeMap<i64, usize>;
pub type GradeSummary = SubjectSummary<GradeCounts>;
pub type BinarySummary = SubjectSummary<BinaryCounts>;

/// Filters `table` to `courses` and melts `subjects` into long-form records.
///
/// Rows whose value is missing are dropped. Numbers are truncated toward
/// zero; text must parse as an integer.
///
/// # Errors
/// * [`AnalysisError::UnknownSubject`] if a subject is not a column of `table`
/// * [`AnalysisError::NotAnInteger`] if a value cannot be read as an integer
pub fn melt(
    table: &Table,
    courses: &[String],
    subjects: &[String],
) -> Result<Vec<Record>, AnalysisError> {
    let course_keys = table.course_keys();
    let selected_rows: Vec<(usize, &String)> = course_keys
        .iter()
        .enumerate()
        .filter_map(|(row, key)| key.as_ref().map(|k| (row, k)))
        .filter(|(_, key)| courses.contains(*key))
        .collect();

    let mut records = Vec::new();
    for subject in subjects {
        let idx = table
            .column_index(subject)
            .ok_or_else(|| AnalysisError::UnknownSubject(subject.clone()))?;
        for &(row, course) in &selected_rows {
            let Some(cell) = table.rows()[row][idx].as_ref() else {
                continue;
            };
            records.push(Record {
                course: course.clone(),
                subject: subject.clone(),
                value: coerce_integer(cell, subject, course)?,
            });
        }
    }
    Ok(records)
}

fn coerce_integer(cell: &Cell, subject: &str, course: &str) -> Result<i64, AnalysisError> {
    match cell {
        Cell::Number(n) => Ok(n.trunc() as i64),
        Cell::Text(s) => s.trim().parse().map_err(|_| AnalysisError::NotAnInteger {
            subject: subject.to_string(),
            course: course.to_string(),
            value: s.clone(),
        }),
    }
}

/// Mean value per `(course, subject)`, ordered by course then subject.
pub fn group_means(records: &[Record]) -> BTreeMap<(String, String), f64> {
    // i128 so any number of i64 values sums without overflow
    let mut sums: BTreeMap<(String, String), (i128, usize)> = BTreeMap::new();
    for record in records {
        let entry = sums
            .entry((record.course.clone(), record.subject.clone()))
            .or_default();
        entry.0 += i128::from(record.value);
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(key, (sum, count))| (key, sum as f64 / count as f64))
        .collect()
}

fn indicators_for(
    means: &BTreeMap<(String, String), f64>,
    subject: &str,
    scale: f64,
) -> Vec<Indicator> {
    means
        .iter()
        .filter(|((_, s), _)| s == subject)
        .map(|((course, _), &mean)| {
            let indicator = mean * scale;
            Indicator {
                course: course.clone(),
                mean,
                indicator,
                band: Band::for_indicator(indicator),
            }
        })
        .collect()
}

fn unique(values: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for v in values {
        if !out.contains(v) {
            out.push(v.clone());
        }
    }
    out
}

/// Aggregates activity grades (0-10)
///
/// An empty course or subject selection yields no summaries.
pub fn analyze_tasks(
    table: &Table,
    selection: &Selection,
) -> Result<Vec<GradeSummary>, AnalysisError> {
    if selection.is_empty() {
        return Ok(Vec::new());
    }
    let courses = unique(&selection.courses);
    let subjects = unique(&selection.subjects);

    let records = melt(table, &courses, &subjects)?;
    let means = group_means(&records);

    let mut counts: HashMap<(&str, &str), GradeCounts> = HashMap::new();
    for r in &records {
        *counts
            .entry((r.course.as_str(), r.subject.as_str()))
            .or_default()
            .entry(r.value)
            .or_default() += 1;
    }

    Ok(subjects
        .iter()
        .map(|subject| SubjectSummary {
            subject: subject.clone(),
            indicators: indicators_for(&means, subject, 1.0),
            frequencies: courses
                .iter()
                .map(|course| {
                    let grades = counts
                        .get(&(course.as_str(), subject.as_str()))
                        .cloned()
                        .unwrap_or_default();
                    (course.clone(), grades)
                })
                .collect(),
        })
        .collect())
}

/// Aggregates correct/incorrect sub-topic flags (0/1)
///
/// The indicator is the success rate scaled to 0-10; `mean` keeps the 0-1 rate.
///
/// # Errors
/// * [`AnalysisError::EmptySelection`] if no course or no subject is selected
/// * [`AnalysisError::NoValidData`] if the selection has no non-missing values
/// * [`AnalysisError::NotBinary`] if a value is neither 0 nor 1
/// * any error of [`melt`]
pub fn analyze_evaluations(
    table: &Table,
    selection: &Selection,
) -> Result<Vec<BinarySummary>, AnalysisError> {
    if selection.is_empty() {
        return Err(AnalysisError::EmptySelection);
    }
    let courses = unique(&selection.courses);
    let subjects = unique(&selection.subjects);

    let records = melt(table, &courses, &subjects)?;
    if records.is_empty() {
        return Err(AnalysisError::NoValidData);
    }
    if let Some(bad) = records.iter().find(|r| r.value != 0 && r.value != 1) {
        return Err(AnalysisError::NotBinary {
            subject: bad.subject.clone(),
            course: bad.course.clone(),
            value: bad.value,
        });
    }

    let means = group_means(&records);
    let mut counts: HashMap<(&str, &str), BinaryCounts> = HashMap::new();
    for r in &records {
        let tally = counts
            .entry((r.course.as_str(), r.subject.as_str()))
            .or_default();
        if r.value == 1 {
            tally.correct += 1;
        } else {
            tally.wrong += 1;
        }
    }

    Ok(subjects
        .iter()
        .map(|subject| SubjectSummary {
            subject: subject.clone(),
            indicators: indicators_for(&means, subject, 10.0),
            frequencies: courses
                .iter()
                .map(|course| {
                    let tally = counts
                        .get(&(course.as_str(), subject.as_str()))
                        .copied()
                        .unwrap_or_default();
                    (course.clone(), tally)
                })
                .collect(),
        })
        .collect())
}
