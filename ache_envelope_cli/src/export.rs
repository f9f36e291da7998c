use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use ache_envelope::BatchResult;
use anyhow::{Context, Result};

/// Per-sample envelope of every successful sheet; `-` writes to stdout. `data_row` counts
/// non-blank data rows below the header.
pub fn write_envelope_csv(batch: &BatchResult, path: &Path) -> Result<()> {
    if path.as_os_str() == "-" {
        let stdout = io::stdout();
        let mut writer = csv::Writer::from_writer(stdout.lock());
        return write_envelope_rows(batch, &mut writer);
    }
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);
    write_envelope_rows(batch, &mut writer)
}

fn write_envelope_rows<W: Write>(batch: &BatchResult, writer: &mut csv::Writer<W>) -> Result<()> {
    writer.write_record([
        "sheet",
        "data_row",
        "inlet_temperature_c",
        "actual_flow_kg_hr",
        "pd_limit_kg_hr",
        "momentum_limit_kg_hr",
        "limiting_flow_kg_hr",
        "limiting_curve",
        "crossover",
    ])?;

    for sheet in &batch.sheets {
        let Ok(result) = &sheet.outcome else {
            continue;
        };
        let crossover_index = result.crossover.as_ref().map(|c| c.index);
        for (idx, (sample, point)) in result.samples.iter().zip(&result.envelope).enumerate() {
            writer.write_record([
                sheet.name.clone(),
                sample.row.to_string(),
                sample.inlet_temperature.to_string(),
                sample.flow_actual.to_string(),
                sample.flow_pd_limit.to_string(),
                sample.flow_momentum_limit.to_string(),
                point.constraint_min.to_string(),
                point.active_constraint.to_string(),
                (crossover_index == Some(idx)).to_string(),
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}

pub fn write_summary_json(batch: &BatchResult, path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(file, &batch.summary())
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ache_envelope::{analyze_tables, Cell, RawTable};

    fn batch() -> BatchResult {
        let rows = [[20.0, 100.0, 120.0, 130.0], [30.0, 90.0, 110.0, 70.0]]
            .iter()
            .map(|r| r.iter().copied().map(Cell::Number).collect())
            .collect();
        analyze_tables(&[
            RawTable::new("Case A", Vec::new(), rows),
            RawTable::new("Empty", Vec::new(), Vec::new()),
        ])
    }

    #[test]
    fn csv_lists_successful_samples_and_marks_crossover() {
        let mut writer = csv::Writer::from_writer(Vec::new());
        write_envelope_rows(&batch(), &mut writer).unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("sheet,data_row,inlet_temperature_c,"));
        assert_eq!(lines[1], "Case A,0,20,100,120,130,100,Actual Flow,false");
        assert_eq!(lines[2], "Case A,1,30,90,110,70,70,Momentum Limit,true");
    }

    #[test]
    fn json_summary_includes_failed_sheets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        write_summary_json(&batch(), &path).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value.as_array().map(Vec::len), Some(2));
        assert_eq!(value[0]["crossover_temperature"], 30.0);
        assert_eq!(value[1]["ok"], false);
    }
}
