use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use ache_envelope::{analysis_block, SheetError, SheetReport, SheetResult};
use anyhow::{Context, Result};
use rust_xlsxwriter::{Format, Image, Workbook, Worksheet, XlsxError};
use tracing::warn;

/// Everything the report needs for one input sheet.
#[derive(Clone, Debug)]
pub struct SheetOutput {
    pub report: SheetReport,
    pub chart_png: Option<Vec<u8>>,
    pub render_error: Option<SheetError>,
}

impl SheetOutput {
    pub fn text_block(&self) -> Vec<String> {
        let mut lines = analysis_block(&self.report.outcome);
        if let Some(err) = self.render_error.as_ref() {
            lines.push(format!("Chart unavailable: {err}"));
        }
        lines
    }
}

const BASE_HEADERS: [&str; 6] = [
    "Inlet Temperature (°C)",
    "Actual Flow (kg/hr)",
    "Pressure Drop Limit (kg/hr)",
    "Momentum Limit (kg/hr)",
    "Limiting Flow (kg/hr)",
    "Limiting Curve",
];
const OPERATING_HEADERS: [&str; 4] = [
    "Operating Temperature (°C)",
    "Operating Flow (kg/hr)",
    "Operating Case",
    "Status",
];
/// Blank columns between the data and the chart anchor.
const CHART_GAP_COLUMNS: u16 = 2;

pub fn report_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("workbook");
    input.with_file_name(format!("{stem}{suffix}.xlsx"))
}

/// Assemble the whole workbook in memory and only then replace `path`.
pub fn write_report(path: &Path, sheets: &[SheetOutput]) -> Result<()> {
    let bytes = build_report(sheets).context("failed to assemble report workbook")?;
    let tmp = path.with_extension("xlsx.partial");
    fs::write(&tmp, bytes).with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("failed to move report to {}", path.display()))?;
    Ok(())
}

pub fn build_report(sheets: &[SheetOutput]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let mut used_names = HashSet::new();

    for (idx, sheet) in sheets.iter().enumerate() {
        let name = unique_sheet_name(&sheet.report.name, idx, &mut used_names);
        let worksheet = match build_sheet(sheet, &name, &bold) {
            Ok(worksheet) => worksheet,
            Err(err) => {
                warn!("{}: report sheet failed: {}", sheet.report.name, err);
                let failed: Result<SheetResult, SheetError> =
                    Err(SheetError::Render(err.to_string()));
                let mut worksheet = Worksheet::new();
                worksheet.set_name(&name)?;
                write_text_block(&mut worksheet, 0, &analysis_block(&failed), &bold)?;
                worksheet
            }
        };
        workbook.push_worksheet(worksheet);
    }

    workbook.save_to_buffer()
}

/// One output worksheet, built detached so a failure never leaves it half written.
fn build_sheet(sheet: &SheetOutput, name: &str, bold: &Format) -> Result<Worksheet, XlsxError> {
    let mut worksheet = Worksheet::new();
    worksheet.set_name(name)?;

    let (data_rows, data_cols) = match &sheet.report.outcome {
        Ok(result) => write_result(&mut worksheet, result, bold)?,
        Err(_) => (0, 0),
    };

    let text_row = if data_rows == 0 { 0 } else { data_rows + 2 };
    write_text_block(&mut worksheet, text_row, &sheet.text_block(), bold)?;

    if let Some(png) = sheet.chart_png.as_ref() {
        let image = Image::new_from_buffer(png)?;
        worksheet.insert_image(1, data_cols + CHART_GAP_COLUMNS, &image)?;
    }
    Ok(worksheet)
}

fn write_text_block(
    worksheet: &mut Worksheet,
    first_row: u32,
    lines: &[String],
    bold: &Format,
) -> Result<(), XlsxError> {
    for (offset, line) in lines.iter().enumerate() {
        let row = first_row + offset as u32;
        if offset == 0 {
            worksheet.write_string_with_format(row, 0, line, bold)?;
        } else {
            worksheet.write_string(row, 0, line)?;
        }
    }
    Ok(())
}

/// Writes header + cleaned data; returns the rows used (header included) and columns used.
fn write_result(
    worksheet: &mut Worksheet,
    result: &SheetResult,
    bold: &Format,
) -> Result<(u32, u16), XlsxError> {
    let with_points = result.schema == ache_envelope::Schema::WithOperatingPoints;
    let headers: Vec<&str> = if with_points {
        BASE_HEADERS.iter().chain(OPERATING_HEADERS.iter()).copied().collect()
    } else {
        BASE_HEADERS.to_vec()
    };
    for (col, header) in headers.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, bold)?;
        worksheet.set_column_width(col as u16, 22)?;
    }

    for (i, (sample, point)) in result.samples.iter().zip(&result.envelope).enumerate() {
        let row = i as u32 + 1;
        worksheet.write_number(row, 0, sample.inlet_temperature)?;
        worksheet.write_number(row, 1, sample.flow_actual)?;
        worksheet.write_number(row, 2, sample.flow_pd_limit)?;
        worksheet.write_number(row, 3, sample.flow_momentum_limit)?;
        worksheet.write_number(row, 4, point.constraint_min)?;
        worksheet.write_string(row, 5, point.active_constraint.display_name())?;
    }

    for (i, classified) in result.operating_points.iter().enumerate() {
        let row = i as u32 + 1;
        worksheet.write_number(row, 6, classified.point.temperature)?;
        worksheet.write_number(row, 7, classified.point.flowrate)?;
        worksheet.write_string(row, 8, &classified.point.case_label)?;
        worksheet.write_string(row, 9, classified.status.to_string())?;
    }

    let rows = 1 + result.samples.len().max(result.operating_points.len()) as u32;
    Ok((rows, headers.len() as u16))
}

/// Worksheet names: at most 31 characters, none of `[]:*?/\`, unique ignoring case.
fn unique_sheet_name(raw: &str, idx: usize, used: &mut HashSet<String>) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
        .collect();
    let cleaned = cleaned.trim().trim_matches('\'').to_string();
    let base = if cleaned.is_empty() {
        format!("Sheet{}", idx + 1)
    } else {
        cleaned
    };

    let mut candidate: String = base.chars().take(31).collect();
    let mut n = 2;
    while used.contains(&candidate.to_lowercase()) {
        let tag = format!(" ({n})");
        let keep = 31 - tag.chars().count();
        candidate = base.chars().take(keep).collect::<String>() + &tag;
        n += 1;
    }
    used.insert(candidate.to_lowercase());
    candidate
}
