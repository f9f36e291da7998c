//! Constraint-envelope analysis for air-cooled heat exchanger (ACHE) performance tables.
//!
//! The library is pure: it turns rows of spreadsheet cells into an operating envelope,
//! the binding constraint at every sample and the first temperature where that binding
//! constraint changes. Reading workbooks and drawing charts live in the CLI crate.

use thiserror::Error;

pub mod batch;
pub mod config;
pub mod envelope;
pub mod operating;
pub mod performance;
pub mod summary;
pub mod table;

pub use batch::{analyze_tables, BatchResult, SheetReport};
pub use config::AnalysisConfig;
pub use envelope::{
    analyze, analyze_table, clean_samples, find_crossover, ConstraintKind, CrossoverEvent,
    EnvelopePoint, Sample, SheetResult,
};
pub use operating::{classify_points, parse_operating_points, ClassifiedPoint, OperatingPoint, Status};
pub use summary::{analysis_block, summary_text, NO_SHIFT_NOTE};
pub use table::{coerce_f64, Cell, RawTable, Schema, TableSchema};

/// Batch-fatal failures. Anything that should only fail one sheet is a [`SheetError`].
#[derive(Error, Debug)]
pub enum AcheError {
    #[error("unreadable workbook: {0}")]
    Format(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("required columns missing: found {found}, need at least {required}")]
    MissingColumns { found: usize, required: usize },
    #[error("required columns missing: {0}")]
    MissingNamedColumns(String),
    #[error("no usable rows after numeric cleaning ({sheet_rows} data rows in sheet)")]
    NoUsableRows { sheet_rows: usize },
}

/// Failure scoped to a single sheet; the rest of the batch carries on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SheetError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("render failed: {0}")]
    Render(String),
}
