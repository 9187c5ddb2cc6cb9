/*!
# Gradeboard

A browser-based report of student grades uploaded as Excel workbooks.

## Overview

Teachers upload a workbook, pick courses and columns, and get per-course
indicators, frequency tables and charts. Two independent pipelines share the
same flow of upload, filter, aggregate and chart:

- **Activities** (`/`, `/resultados`): numeric grades 0-10 per task column.
  Every sheet of the workbook is read and stacked.
- **Evaluations** (`/evaluaciones`): 0/1 correctness flags per sub-topic
  column. Only the first sheet is read.

In both pipelines the column headers sit on the third row of each sheet, and
a `Curso` column is required.

## Modules

- **table**: in-memory table of headers and cells, with its JSON transport form
- **columns**: header normalization helpers and the evaluation column classifier
- **loader**: workbook ingestion with calamine
- **analysis**: filtering, per-course indicators and frequency counts
- **graph**: SVG charts drawn with plotters
- **session**: per-session storage of uploaded tables
- **views**: handlebars pages
- **config**: environment configuration
- **app**: routing and request handlers
- **error**: error types of every layer
*/

pub mod analysis;
pub mod app;
pub mod columns;
pub mod config;
pub mod error;
pub mod graph;
pub mod loader;
pub mod session;
pub mod table;
pub mod views;
