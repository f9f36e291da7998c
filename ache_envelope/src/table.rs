//! Cell model shared by every analysis, plus column-layout resolution.

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Number of positional columns every envelope sheet must carry.
pub const REQUIRED_COLUMNS: usize = 4;
/// Column count from which the operating-point block is present.
pub const OPERATING_POINT_COLUMNS: usize = 7;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Display form used for labels (operating-case names, headers).
    pub fn label(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Number(v) => Some(format_label_number(*v)),
            Cell::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            Cell::Bool(b) => Some(b.to_string()),
        }
    }
}

fn format_label_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}

/// Coerce a cell to a finite number. Anything that is not clearly numeric fails.
pub fn coerce_f64(cell: &Cell) -> Option<f64> {
    let value = match cell {
        Cell::Number(v) => *v,
        Cell::Text(s) => s.trim().parse::<f64>().ok()?,
        Cell::Empty | Cell::Bool(_) => return None,
    };
    value.is_finite().then_some(value)
}

/// One sheet as handed over by the tabular source.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows,
        }
    }

    /// Width of the widest row, header included.
    pub fn column_count(&self) -> usize {
        self.rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0)
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        static EMPTY: Cell = Cell::Empty;
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Schema {
    Basic,
    WithOperatingPoints,
}

/// Column layout of an envelope sheet, resolved once per sheet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub schema: Schema,
    pub columns: usize,
}

impl TableSchema {
    pub const TEMPERATURE: usize = 0;
    pub const FLOW_ACTUAL: usize = 1;
    pub const FLOW_PD_LIMIT: usize = 2;
    pub const FLOW_MOMENTUM_LIMIT: usize = 3;
    pub const OP_TEMPERATURE: usize = 4;
    pub const OP_FLOW: usize = 5;
    pub const OP_LABEL: usize = 6;

    pub fn resolve(table: &RawTable) -> Result<Self, ValidationError> {
        let columns = table.column_count();
        if columns < REQUIRED_COLUMNS {
            return Err(ValidationError::MissingColumns {
                found: columns,
                required: REQUIRED_COLUMNS,
            });
        }
        let schema = if columns >= OPERATING_POINT_COLUMNS {
            Schema::WithOperatingPoints
        } else {
            Schema::Basic
        };
        Ok(Self { schema, columns })
    }

    pub fn has_operating_points(&self) -> bool {
        self.schema == Schema::WithOperatingPoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with_width(width: usize) -> RawTable {
        RawTable::new(
            "Sheet1",
            (0..width).map(|i| format!("c{i}")).collect(),
            vec![vec![Cell::Number(1.0); width]],
        )
    }

    #[test]
    fn coerce_accepts_numbers_and_numeric_text() {
        assert_eq!(coerce_f64(&Cell::Number(3.5)), Some(3.5));
        assert_eq!(coerce_f64(&Cell::Text(" 42 ".into())), Some(42.0));
        assert_eq!(coerce_f64(&Cell::Text("1e3".into())), Some(1000.0));
    }

    #[test]
    fn coerce_rejects_non_numeric_and_non_finite() {
        assert_eq!(coerce_f64(&Cell::Empty), None);
        assert_eq!(coerce_f64(&Cell::Bool(true)), None);
        assert_eq!(coerce_f64(&Cell::Text("n/a".into())), None);
        assert_eq!(coerce_f64(&Cell::Text("NaN".into())), None);
        assert_eq!(coerce_f64(&Cell::Text("inf".into())), None);
        assert_eq!(coerce_f64(&Cell::Number(f64::NAN)), None);
    }

    #[test]
    fn schema_is_resolved_by_column_count() {
        assert_eq!(
            TableSchema::resolve(&table_with_width(3)),
            Err(ValidationError::MissingColumns {
                found: 3,
                required: 4
            })
        );
        assert_eq!(
            TableSchema::resolve(&table_with_width(4)).map(|s| s.schema),
            Ok(Schema::Basic)
        );
        assert_eq!(
            TableSchema::resolve(&table_with_width(6)).map(|s| s.schema),
            Ok(Schema::Basic)
        );
        assert_eq!(
            TableSchema::resolve(&table_with_width(7)).map(|s| s.schema),
            Ok(Schema::WithOperatingPoints)
        );
    }

    #[test]
    fn ragged_rows_widen_the_table() {
        let table = RawTable::new(
            "Sheet1",
            vec!["a".into(), "b".into()],
            vec![vec![Cell::Empty; 5], vec![Cell::Empty; 2]],
        );
        assert_eq!(table.column_count(), 5);
        assert_eq!(table.cell(1, 4), &Cell::Empty);
    }

    #[test]
    fn labels_render_integers_without_fraction() {
        assert_eq!(Cell::Number(3.0).label().as_deref(), Some("3"));
        assert_eq!(Cell::Text("  Case A ".into()).label().as_deref(), Some("Case A"));
        assert_eq!(Cell::Text("   ".into()).label(), None);
    }
}
