use std::fs;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use ache_envelope::{AcheError, Cell, RawTable};
use calamine::{open_workbook_auto, open_workbook_from_rs, Data, Reader, Xlsx};
use tracing::{debug, warn};

const SPREADSHEET_EXTENSIONS: [&str; 7] = ["xlsx", "xlsm", "xlsb", "xls", "xla", "xlam", "ods"];

pub fn is_spreadsheet_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SPREADSHEET_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Read every sheet (or only `only`, when non-empty) into raw tables. The first row of
/// each sheet's used range is taken as the header; fully blank rows below it are dropped.
pub fn read_workbook(path: &Path, only: &[String]) -> Result<Vec<RawTable>, AcheError> {
    let tables = if is_spreadsheet_extension(path) {
        let mut workbook = open_workbook_auto(path)
            .map_err(|e| AcheError::Format(format!("{}: {}", path.display(), e)))?;
        read_sheets(&mut workbook, only)?
    } else {
        warn!(
            "{} has no spreadsheet extension; reading it as .xlsx",
            path.display()
        );
        let bytes = fs::read(path)?;
        let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))
            .map_err(|e| AcheError::Format(format!("{}: {}", path.display(), e)))?;
        read_sheets(&mut workbook, only)?
    };

    if !only.is_empty() {
        for wanted in only {
            if !tables.iter().any(|t| &t.name == wanted) {
                return Err(AcheError::InvalidParameter(format!(
                    "sheet '{}' not found in {}",
                    wanted,
                    path.display()
                )));
            }
        }
    }
    Ok(tables)
}

fn read_sheets<R, RS>(workbook: &mut R, only: &[String]) -> Result<Vec<RawTable>, AcheError>
where
    R: Reader<RS>,
    RS: Read + Seek,
{
    let sheet_names = workbook.sheet_names().to_owned();
    let mut tables = Vec::with_capacity(sheet_names.len());
    for name in sheet_names {
        if !only.is_empty() && !only.contains(&name) {
            continue;
        }
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| AcheError::Format(format!("sheet '{name}': {e:?}")))?;

        let mut rows = range.rows();
        let headers: Vec<String> = rows
            .next()
            .map(|row| row.iter().map(header_text).collect())
            .unwrap_or_default();
        let data: Vec<Vec<Cell>> = rows
            .map(|row| row.iter().map(to_cell).collect::<Vec<_>>())
            .filter(|row| row.iter().any(|c| !c.is_empty()))
            .collect();
        debug!(
            "sheet '{}': {} header cells, {} data rows",
            name,
            headers.len(),
            data.len()
        );
        tables.push(RawTable::new(name, headers, data));
    }
    Ok(tables)
}

fn to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Bool(*b),
        Data::String(s) => Cell::Text(s.clone()),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::Error(e) => Cell::Text(format!("#{e:?}")),
        other => Cell::Text(other.to_string()),
    }
}

fn header_text(data: &Data) -> String {
    match data {
        Data::Empty => String::new(),
        other => other.to_string().trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;
    use std::path::PathBuf;

    fn sample_workbook() -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("Case 1").unwrap();
        for (col, header) in ["Inlet T", "Actual", "PD", "Momentum"].iter().enumerate() {
            sheet.write_string(0, col as u16, *header).unwrap();
        }
        sheet.write_number(1, 0, 20.0).unwrap();
        sheet.write_number(1, 1, 100.0).unwrap();
        sheet.write_number(1, 2, 120.0).unwrap();
        sheet.write_number(1, 3, 130.0).unwrap();
        sheet.write_number(3, 0, 30.0).unwrap();
        sheet.write_string(3, 1, "90").unwrap();
        sheet.write_number(3, 2, 110.0).unwrap();
        sheet.write_number(3, 3, 70.0).unwrap();
        let other = workbook.add_worksheet();
        other.set_name("Notes").unwrap();
        other.write_string(0, 0, "free text").unwrap();
        workbook.save_to_buffer().unwrap()
    }

    fn write_temp(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn reads_headers_and_skips_blank_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "input.xlsx", &sample_workbook());
        let tables = read_workbook(&path, &[]).unwrap();
        assert_eq!(tables.len(), 2);
        let case = &tables[0];
        assert_eq!(case.name, "Case 1");
        assert_eq!(case.headers, vec!["Inlet T", "Actual", "PD", "Momentum"]);
        assert_eq!(case.rows.len(), 2);
        assert_eq!(case.rows[1][1], Cell::Text("90".into()));

        let result = ache_envelope::analyze_table(case).unwrap();
        assert_eq!(result.crossover.as_ref().map(|c| c.flow_at_shift), Some(70.0));
        // The blank sheet row between the samples is not counted.
        assert_eq!(result.samples[1].row, 1);
    }

    #[test]
    fn sheet_filter_selects_and_validates_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "input.xlsx", &sample_workbook());
        let tables = read_workbook(&path, &["Notes".to_string()]).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "Notes");
        assert!(matches!(
            read_workbook(&path, &["Missing".to_string()]),
            Err(AcheError::InvalidParameter(_))
        ));
    }

    #[test]
    fn unknown_extension_is_read_as_xlsx() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "input.download", &sample_workbook());
        assert!(!is_spreadsheet_extension(&path));
        let tables = read_workbook(&path, &[]).unwrap();
        assert_eq!(tables[0].rows.len(), 2);
    }

    #[test]
    fn garbage_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "broken.xlsx", b"definitely not a zip archive");
        assert!(matches!(read_workbook(&path, &[]), Err(AcheError::Format(_))));
        let path = write_temp(&dir, "broken.bin", b"definitely not a zip archive");
        assert!(matches!(read_workbook(&path, &[]), Err(AcheError::Format(_))));
    }
}
