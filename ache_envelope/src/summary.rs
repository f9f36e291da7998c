//! Text that accompanies each chart in the report.

use crate::envelope::SheetResult;
use crate::SheetError;

pub const RESULTS_HEADING: &str = "Analysis Results:";
pub const NO_SHIFT_NOTE: &str =
    "Note: The overall limiting curve does not switch within the provided temperature range.";

pub fn summary_text(result: &SheetResult) -> String {
    let mut text = match &result.crossover {
        Some(event) => format!(
            "Constraint Shift Analysis:\n\
             Limiting curve switches at Inlet Temperature: {:.1} °C\n\
             Flowrate limit at shift: {:.0} kg/hr\n\
             New limiting curve: {}",
            event.temperature, event.flow_at_shift, event.new_constraint
        ),
        None => NO_SHIFT_NOTE.to_string(),
    };
    for classified in &result.operating_points {
        text.push_str(&format!(
            "\nOperating point {}: {:.1} °C, {:.0} kg/hr - {} (limit {:.0} kg/hr)",
            classified.point.case_label,
            classified.point.temperature,
            classified.point.flowrate,
            classified.status,
            classified.envelope_flow
        ));
    }
    text
}

/// Lines of the trailing text block written under a sheet's data.
pub fn analysis_block(outcome: &Result<SheetResult, SheetError>) -> Vec<String> {
    let mut lines = vec![RESULTS_HEADING.to_string()];
    match outcome {
        Ok(result) => lines.extend(summary_text(result).lines().map(str::to_string)),
        Err(err) => lines.push(format!("Analysis failed: {err}")),
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{analyze, Sample};
    use crate::operating::{ClassifiedPoint, OperatingPoint, Status};
    use crate::ValidationError;

    #[test]
    fn shift_summary_matches_report_format() {
        let result = analyze(vec![
            Sample::new(20.0, 100.0, 120.0, 130.0),
            Sample::new(30.04, 90.0, 110.0, 70.4),
        ])
        .expect("analysis");
        assert_eq!(
            summary_text(&result),
            "Constraint Shift Analysis:\n\
             Limiting curve switches at Inlet Temperature: 30.0 °C\n\
             Flowrate limit at shift: 70 kg/hr\n\
             New limiting curve: Momentum Limit"
        );
    }

    #[test]
    fn no_shift_summary_is_the_note() {
        let result = analyze(vec![Sample::new(20.0, 100.0, 120.0, 130.0)]).expect("analysis");
        assert_eq!(summary_text(&result), NO_SHIFT_NOTE);
    }

    #[test]
    fn operating_points_follow_the_summary() {
        let mut result = analyze(vec![Sample::new(20.0, 100.0, 120.0, 130.0)]).expect("analysis");
        result.operating_points.push(ClassifiedPoint {
            point: OperatingPoint {
                temperature: 21.0,
                flowrate: 105.0,
                case_label: "Peak".into(),
            },
            nearest_index: 0,
            envelope_flow: 100.0,
            status: Status::Unsafe,
        });
        let text = summary_text(&result);
        assert_eq!(
            text.lines().last(),
            Some("Operating point Peak: 21.0 °C, 105 kg/hr - UNSAFE (limit 100 kg/hr)")
        );
    }

    #[test]
    fn failed_sheet_is_marked_in_block() {
        let outcome = Err(SheetError::Validation(ValidationError::NoUsableRows { sheet_rows: 3 }));
        assert_eq!(
            analysis_block(&outcome),
            vec![
                "Analysis Results:".to_string(),
                "Analysis failed: no usable rows after numeric cleaning (3 data rows in sheet)"
                    .to_string(),
            ]
        );
    }
}
