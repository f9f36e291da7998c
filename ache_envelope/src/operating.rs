//! Operating points supplied in the trailing columns, classified against the envelope.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::envelope::EnvelopePoint;
use crate::table::{coerce_f64, RawTable, TableSchema};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperatingPoint {
    pub temperature: f64,
    pub flowrate: f64,
    pub case_label: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Safe,
    Unsafe,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Safe => "SAFE",
            Status::Unsafe => "UNSAFE",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedPoint {
    pub point: OperatingPoint,
    /// Envelope sample the point was compared against.
    pub nearest_index: usize,
    pub envelope_flow: f64,
    pub status: Status,
}

impl ClassifiedPoint {
    pub fn is_safe(&self) -> bool {
        self.status == Status::Safe
    }
}

/// Read operating points from columns 5-7. Rows with a non-numeric temperature or flow,
/// or without a case label, are skipped.
pub fn parse_operating_points(table: &RawTable) -> Vec<OperatingPoint> {
    (0..table.rows.len())
        .filter_map(|row| {
            let temperature = coerce_f64(table.cell(row, TableSchema::OP_TEMPERATURE))?;
            let flowrate = coerce_f64(table.cell(row, TableSchema::OP_FLOW))?;
            let case_label = table.cell(row, TableSchema::OP_LABEL).label()?;
            Some(OperatingPoint {
                temperature,
                flowrate,
                case_label,
            })
        })
        .collect()
}

/// Index of the envelope sample closest in temperature; the earlier one wins a tie.
pub fn nearest_sample(envelope: &[EnvelopePoint], temperature: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, point) in envelope.iter().enumerate() {
        let distance = (point.inlet_temperature - temperature).abs();
        match best {
            Some((_, d)) if distance >= d => {}
            _ => best = Some((idx, distance)),
        }
    }
    best.map(|(idx, _)| idx)
}

pub fn classify(envelope: &[EnvelopePoint], point: OperatingPoint) -> Option<ClassifiedPoint> {
    let nearest_index = nearest_sample(envelope, point.temperature)?;
    let envelope_flow = envelope[nearest_index].constraint_min;
    let status = if point.flowrate <= envelope_flow {
        Status::Safe
    } else {
        Status::Unsafe
    };
    Some(ClassifiedPoint {
        point,
        nearest_index,
        envelope_flow,
        status,
    })
}

pub fn classify_points(
    envelope: &[EnvelopePoint],
    points: Vec<OperatingPoint>,
) -> Vec<ClassifiedPoint> {
    points
        .into_iter()
        .filter_map(|p| classify(envelope, p))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::ConstraintKind;
    use crate::table::Cell;

    fn envelope(points: &[(f64, f64)]) -> Vec<EnvelopePoint> {
        points
            .iter()
            .map(|&(t, f)| EnvelopePoint {
                inlet_temperature: t,
                constraint_min: f,
                active_constraint: ConstraintKind::ActualFlow,
            })
            .collect()
    }

    fn op(temperature: f64, flowrate: f64) -> OperatingPoint {
        OperatingPoint {
            temperature,
            flowrate,
            case_label: "Case".into(),
        }
    }

    #[test]
    fn nearest_sample_prefers_earlier_on_tie() {
        let env = envelope(&[(10.0, 1.0), (20.0, 1.0), (30.0, 1.0)]);
        assert_eq!(nearest_sample(&env, 15.0), Some(0));
        assert_eq!(nearest_sample(&env, 16.0), Some(1));
        assert_eq!(nearest_sample(&env, 30.0), Some(2));
        assert_eq!(nearest_sample(&env, 99.0), Some(2));
        assert_eq!(nearest_sample(&[], 10.0), None);
    }

    #[test]
    fn flow_on_the_envelope_is_safe() {
        let env = envelope(&[(10.0, 100.0), (20.0, 80.0)]);
        assert_eq!(classify(&env, op(20.0, 80.0)).map(|c| c.status), Some(Status::Safe));
        assert_eq!(classify(&env, op(20.0, 80.5)).map(|c| c.status), Some(Status::Unsafe));
        let classified = classify(&env, op(12.0, 90.0)).expect("classified");
        assert_eq!(classified.nearest_index, 0);
        assert_eq!(classified.envelope_flow, 100.0);
        assert!(classified.is_safe());
    }

    #[test]
    fn malformed_operating_rows_are_skipped() {
        let mut rows = Vec::new();
        let base = || vec![Cell::Number(1.0); 4];
        let mut good = base();
        good.extend([Cell::Number(40.0), Cell::Text("1200".into()), Cell::Text("Design".into())]);
        rows.push(good);
        let mut bad_flow = base();
        bad_flow.extend([Cell::Number(40.0), Cell::Text("high".into()), Cell::Text("Peak".into())]);
        rows.push(bad_flow);
        let mut no_label = base();
        no_label.extend([Cell::Number(40.0), Cell::Number(10.0), Cell::Empty]);
        rows.push(no_label);
        let mut numeric_label = base();
        numeric_label.extend([Cell::Number(45.0), Cell::Number(10.0), Cell::Number(2.0)]);
        rows.push(numeric_label);
        rows.push(base());

        let table = RawTable::new("ops", Vec::new(), rows);
        let points = parse_operating_points(&table);
        assert_eq!(
            points,
            vec![
                OperatingPoint {
                    temperature: 40.0,
                    flowrate: 1200.0,
                    case_label: "Design".into()
                },
                OperatingPoint {
                    temperature: 45.0,
                    flowrate: 10.0,
                    case_label: "2".into()
                },
            ]
        );
    }
}
