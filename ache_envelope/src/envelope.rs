//! Pointwise-minimum envelope, binding constraint and crossover detection.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::operating::{classify_points, parse_operating_points, ClassifiedPoint};
use crate::table::{coerce_f64, RawTable, Schema, TableSchema};
use crate::{SheetError, ValidationError};

/// The three flow curves competing for the envelope, in tie-break order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintKind {
    ActualFlow,
    PressureDrop,
    Momentum,
}

impl ConstraintKind {
    pub const ALL: [ConstraintKind; 3] = [
        ConstraintKind::ActualFlow,
        ConstraintKind::PressureDrop,
        ConstraintKind::Momentum,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            ConstraintKind::ActualFlow => "Actual Flow",
            ConstraintKind::PressureDrop => "Pressure Drop Limit",
            ConstraintKind::Momentum => "Momentum Limit",
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Zero-based index into [`RawTable::rows`] (header excluded). Readers that skip
    /// blank rows make this differ from the spreadsheet row number.
    pub row: usize,
    pub inlet_temperature: f64,
    pub flow_actual: f64,
    pub flow_pd_limit: f64,
    pub flow_momentum_limit: f64,
}

impl Sample {
    pub fn new(
        inlet_temperature: f64,
        flow_actual: f64,
        flow_pd_limit: f64,
        flow_momentum_limit: f64,
    ) -> Self {
        Self {
            row: 0,
            inlet_temperature,
            flow_actual,
            flow_pd_limit,
            flow_momentum_limit,
        }
    }

    pub fn flow(&self, kind: ConstraintKind) -> f64 {
        match kind {
            ConstraintKind::ActualFlow => self.flow_actual,
            ConstraintKind::PressureDrop => self.flow_pd_limit,
            ConstraintKind::Momentum => self.flow_momentum_limit,
        }
    }

    /// Minimum flow and the first constraint (in [`ConstraintKind::ALL`] order) attaining it.
    pub fn binding(&self) -> (f64, ConstraintKind) {
        let mut best = (self.flow_actual, ConstraintKind::ActualFlow);
        for kind in [ConstraintKind::PressureDrop, ConstraintKind::Momentum] {
            let flow = self.flow(kind);
            // Strict comparison keeps the earlier kind on ties.
            if flow < best.0 {
                best = (flow, kind);
            }
        }
        best
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnvelopePoint {
    pub inlet_temperature: f64,
    pub constraint_min: f64,
    pub active_constraint: ConstraintKind,
}

impl From<&Sample> for EnvelopePoint {
    fn from(sample: &Sample) -> Self {
        let (constraint_min, active_constraint) = sample.binding();
        Self {
            inlet_temperature: sample.inlet_temperature,
            constraint_min,
            active_constraint,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrossoverEvent {
    /// Position in the cleaned sample sequence.
    pub index: usize,
    pub temperature: f64,
    pub flow_at_shift: f64,
    pub previous_constraint: ConstraintKind,
    pub new_constraint: ConstraintKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SheetResult {
    pub schema: Schema,
    pub samples: Vec<Sample>,
    pub envelope: Vec<EnvelopePoint>,
    pub crossover: Option<CrossoverEvent>,
    pub operating_points: Vec<ClassifiedPoint>,
    pub dropped_rows: usize,
}

impl SheetResult {
    pub fn safe_count(&self) -> usize {
        self.operating_points.iter().filter(|p| p.is_safe()).count()
    }
}

/// Extract the four required fields of every row, dropping rows where any of them is not
/// a finite number. Returns the retained samples and the number of dropped rows.
pub fn clean_samples(table: &RawTable) -> (Vec<Sample>, usize) {
    let mut samples = Vec::with_capacity(table.rows.len());
    for row in 0..table.rows.len() {
        let field = |col| coerce_f64(table.cell(row, col));
        let parsed = (|| {
            Some(Sample {
                row,
                inlet_temperature: field(TableSchema::TEMPERATURE)?,
                flow_actual: field(TableSchema::FLOW_ACTUAL)?,
                flow_pd_limit: field(TableSchema::FLOW_PD_LIMIT)?,
                flow_momentum_limit: field(TableSchema::FLOW_MOMENTUM_LIMIT)?,
            })
        })();
        if let Some(sample) = parsed {
            samples.push(sample);
        }
    }
    let dropped = table.rows.len() - samples.len();
    (samples, dropped)
}

/// First genuine change of binding constraint, scanning in sample order.
///
/// The change list always opens with index 0 (it has no predecessor), so the reported
/// event is the list's second entry.
pub fn find_crossover(envelope: &[EnvelopePoint]) -> Option<CrossoverEvent> {
    let changes: Vec<usize> = (0..envelope.len())
        .filter(|&i| i == 0 || envelope[i].active_constraint != envelope[i - 1].active_constraint)
        .collect();
    if changes.len() < 2 {
        return None;
    }
    let index = changes[1];
    let point = &envelope[index];
    Some(CrossoverEvent {
        index,
        temperature: point.inlet_temperature,
        flow_at_shift: point.constraint_min,
        previous_constraint: envelope[index - 1].active_constraint,
        new_constraint: point.active_constraint,
    })
}

/// Envelope analysis over already-cleaned samples.
pub fn analyze(samples: Vec<Sample>) -> Result<SheetResult, SheetError> {
    if samples.is_empty() {
        return Err(ValidationError::NoUsableRows { sheet_rows: 0 }.into());
    }
    let envelope: Vec<EnvelopePoint> = samples.iter().map(EnvelopePoint::from).collect();
    let crossover = find_crossover(&envelope);
    Ok(SheetResult {
        schema: Schema::Basic,
        samples,
        envelope,
        crossover,
        operating_points: Vec::new(),
        dropped_rows: 0,
    })
}

/// Full per-sheet pipeline: schema, cleaning, envelope, crossover, operating points.
pub fn analyze_table(table: &RawTable) -> Result<SheetResult, SheetError> {
    let schema = TableSchema::resolve(table)?;
    let (samples, dropped_rows) = clean_samples(table);
    if samples.is_empty() {
        return Err(ValidationError::NoUsableRows {
            sheet_rows: table.rows.len(),
        }
        .into());
    }

    let mut result = analyze(samples)?;
    result.schema = schema.schema;
    result.dropped_rows = dropped_rows;
    if schema.has_operating_points() {
        let points = parse_operating_points(table);
        result.operating_points = classify_points(&result.envelope, points);
    }
    Ok(result)
}
