//! Per-sheet isolation: every sheet gets its own outcome, none aborts the batch.

use serde::Serialize;

use crate::envelope::{analyze_table, SheetResult};
use crate::table::RawTable;
use crate::SheetError;

#[derive(Clone, Debug, PartialEq)]
pub struct SheetReport {
    pub name: String,
    pub outcome: Result<SheetResult, SheetError>,
}

impl SheetReport {
    pub fn analyze(table: &RawTable) -> Self {
        Self {
            name: table.name.clone(),
            outcome: analyze_table(table),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchResult {
    pub sheets: Vec<SheetReport>,
}

impl BatchResult {
    pub fn succeeded(&self) -> usize {
        self.sheets.iter().filter(|s| s.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.sheets.len() - self.succeeded()
    }

    pub fn summary(&self) -> Vec<SheetSummary> {
        self.sheets.iter().map(SheetSummary::from).collect()
    }
}

pub fn analyze_tables(tables: &[RawTable]) -> BatchResult {
    BatchResult {
        sheets: tables.iter().map(SheetReport::analyze).collect(),
    }
}

/// Flattened, serialisable view of one sheet's outcome.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SheetSummary {
    pub sheet: String,
    pub ok: bool,
    pub error: Option<String>,
    pub samples: usize,
    pub dropped_rows: usize,
    pub crossover_temperature: Option<f64>,
    pub crossover_flow: Option<f64>,
    pub new_constraint: Option<String>,
    pub operating_points: usize,
    pub unsafe_points: usize,
}

impl From<&SheetReport> for SheetSummary {
    fn from(report: &SheetReport) -> Self {
        match &report.outcome {
            Ok(result) => Self {
                sheet: report.name.clone(),
                ok: true,
                error: None,
                samples: result.samples.len(),
                dropped_rows: result.dropped_rows,
                crossover_temperature: result.crossover.as_ref().map(|c| c.temperature),
                crossover_flow: result.crossover.as_ref().map(|c| c.flow_at_shift),
                new_constraint: result
                    .crossover
                    .as_ref()
                    .map(|c| c.new_constraint.to_string()),
                operating_points: result.operating_points.len(),
                unsafe_points: result.operating_points.len() - result.safe_count(),
            },
            Err(err) => Self {
                sheet: report.name.clone(),
                ok: false,
                error: Some(err.to_string()),
                samples: 0,
                dropped_rows: 0,
                crossover_temperature: None,
                crossover_flow: None,
                new_constraint: None,
                operating_points: 0,
                unsafe_points: 0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;

    fn numeric_table(name: &str, rows: &[[f64; 4]]) -> RawTable {
        RawTable::new(
            name,
            vec!["T".into(), "Actual".into(), "PD".into(), "Momentum".into()],
            rows.iter()
                .map(|r| r.iter().copied().map(Cell::Number).collect())
                .collect(),
        )
    }

    #[test]
    fn failing_sheet_does_not_abort_batch() {
        let tables = vec![
            numeric_table("Good", &[[20.0, 100.0, 120.0, 130.0], [30.0, 90.0, 110.0, 70.0]]),
            RawTable::new("Empty", Vec::new(), Vec::new()),
            numeric_table("Flat", &[[20.0, 100.0, 120.0, 130.0]]),
        ];
        let batch = analyze_tables(&tables);
        assert_eq!(batch.sheets.len(), 3);
        assert_eq!(batch.succeeded(), 2);
        assert_eq!(batch.failed(), 1);
        assert_eq!(
            batch.sheets.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            vec!["Good", "Empty", "Flat"]
        );

        let summary = batch.summary();
        assert_eq!(summary[0].crossover_temperature, Some(30.0));
        assert_eq!(summary[0].new_constraint.as_deref(), Some("Momentum Limit"));
        assert!(!summary[1].ok);
        assert!(summary[1].error.as_deref().unwrap_or("").contains("required columns"));
        assert_eq!(summary[2].crossover_temperature, None);
    }

    #[test]
    fn summary_serializes_to_json() {
        let batch = analyze_tables(&[numeric_table("S", &[[1.0, 2.0, 3.0, 4.0]])]);
        let json = serde_json::to_value(batch.summary()).expect("json");
        assert_eq!(json[0]["sheet"], "S");
        assert_eq!(json[0]["samples"], 1);
    }
}
