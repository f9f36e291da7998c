//! UA, heat-duty and fan-power curves grouped by inlet temperature.
//!
//! Unlike the envelope sheets these tables are addressed by header name. Each curve is
//! later drawn against mass flow with the region beyond its design threshold shaded.

use std::collections::BTreeMap;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::table::{coerce_f64, RawTable};
use crate::ValidationError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PerformanceColumns {
    pub mass_flow: usize,
    pub inlet_temperature: usize,
    pub ua: usize,
    pub duty: usize,
    pub power_summer: usize,
    pub power_winter: usize,
}

impl PerformanceColumns {
    pub fn resolve(headers: &[String]) -> Result<Self, ValidationError> {
        let normalized: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
        let find = |pred: &dyn Fn(&str) -> bool| normalized.iter().position(|h| pred(h.as_str()));

        let mass_flow = find(&|h| h.contains("mass flow") && !h.contains("air"));
        let inlet_temperature = find(&|h| h.contains("inlet temp"));
        let ua = find(&|h| h.starts_with("ua") || h.contains("(ua)"));
        let duty = find(&|h| h.contains("duty"));
        let power_summer = find(&|h| h.contains("summer"));
        let power_winter = find(&|h| h.contains("winter"));

        let named = [
            ("mass flow", mass_flow),
            ("inlet temperature", inlet_temperature),
            ("UA", ua),
            ("heat duty", duty),
            ("summer fan power", power_summer),
            ("winter fan power", power_winter),
        ];
        let missing: Vec<&str> = named
            .iter()
            .filter(|(_, idx)| idx.is_none())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(ValidationError::MissingNamedColumns(missing.join(", ")));
        }
        let column = |idx: Option<usize>| idx.unwrap_or_default();
        Ok(Self {
            mass_flow: column(mass_flow),
            inlet_temperature: column(inlet_temperature),
            ua: column(ua),
            duty: column(duty),
            power_summer: column(power_summer),
            power_winter: column(power_winter),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRow {
    pub mass_flow: f64,
    pub inlet_temperature: f64,
    pub ua: Option<f64>,
    /// Always non-negative: exported duties are often signed.
    pub duty: Option<f64>,
    pub power_summer: Option<f64>,
    pub power_winter: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemperatureGroup {
    pub inlet_temperature: f64,
    pub rows: Vec<PerformanceRow>,
}

impl TemperatureGroup {
    pub fn series(&self, value: impl Fn(&PerformanceRow) -> Option<f64>) -> Vec<(f64, Option<f64>)> {
        self.rows.iter().map(|r| (r.mass_flow, value(r))).collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PerformanceData {
    pub groups: Vec<TemperatureGroup>,
    pub dropped_rows: usize,
}

impl PerformanceData {
    pub fn rows(&self) -> impl Iterator<Item = &PerformanceRow> {
        self.groups.iter().flat_map(|g| g.rows.iter())
    }
}

pub fn parse_performance(table: &RawTable) -> Result<PerformanceData, ValidationError> {
    let columns = PerformanceColumns::resolve(&table.headers)?;
    let mut grouped: BTreeMap<OrderedFloat<f64>, Vec<PerformanceRow>> = BTreeMap::new();
    let mut dropped_rows = 0;

    for row in 0..table.rows.len() {
        let value = |col| coerce_f64(table.cell(row, col));
        let (Some(mass_flow), Some(inlet_temperature)) =
            (value(columns.mass_flow), value(columns.inlet_temperature))
        else {
            dropped_rows += 1;
            continue;
        };
        grouped
            .entry(OrderedFloat(inlet_temperature))
            .or_default()
            .push(PerformanceRow {
                mass_flow,
                inlet_temperature,
                ua: value(columns.ua),
                duty: value(columns.duty).map(f64::abs),
                power_summer: value(columns.power_summer),
                power_winter: value(columns.power_winter),
            });
    }

    if grouped.is_empty() {
        return Err(ValidationError::NoUsableRows {
            sheet_rows: table.rows.len(),
        });
    }

    Ok(PerformanceData {
        groups: grouped
            .into_iter()
            .map(|(temperature, rows)| TemperatureGroup {
                inlet_temperature: temperature.into_inner(),
                rows,
            })
            .collect(),
        dropped_rows,
    })
}

/// Polygons enclosing the part of a curve strictly above `threshold`.
///
/// Each polygon starts and ends on the threshold line; crossing points are linearly
/// interpolated. Gaps (`None`) split the curve.
pub fn exceedance_regions(series: &[(f64, Option<f64>)], threshold: f64) -> Vec<Vec<(f64, f64)>> {
    let mut regions = Vec::new();
    let mut open: Option<Vec<(f64, f64)>> = None;
    let mut prev: Option<(f64, f64)> = None;

    for &(x, y) in series {
        let Some(y) = y else {
            if let (Some(mut poly), Some((px, _))) = (open.take(), prev) {
                poly.push((px, threshold));
                regions.push(poly);
            }
            prev = None;
            continue;
        };
        let above = y > threshold;
        match prev {
            None => {
                if above {
                    open = Some(vec![(x, threshold), (x, y)]);
                }
            }
            Some((px, py)) => {
                let was_above = py > threshold;
                if above != was_above {
                    let xc = px + (threshold - py) * (x - px) / (y - py);
                    if above {
                        open = Some(vec![(xc, threshold), (x, y)]);
                    } else if let Some(mut poly) = open.take() {
                        poly.push((xc, threshold));
                        regions.push(poly);
                    }
                } else if let Some(poly) = open.as_mut() {
                    poly.push((x, y));
                }
            }
        }
        prev = Some((x, y));
    }

    if let (Some(mut poly), Some((px, _))) = (open, prev) {
        poly.push((px, threshold));
        regions.push(poly);
    }
    regions
}

/// Axis range padded 10% either side; `include` only widens the top.
pub fn padded_range(values: impl IntoIterator<Item = f64>, include: f64) -> (f64, f64) {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    let lo = if lo.is_finite() { lo } else { include };
    let hi = hi.max(include);
    (lo * 0.9, hi * 1.1)
}

/// Fan-power axis: from 90% of the lowest summer/winter power to 110% of the highest
/// power or the rated power, whichever is larger.
pub fn power_axis_range(data: &PerformanceData, rated_power_kw: f64) -> (f64, f64) {
    padded_range(
        data.rows()
            .flat_map(|r| [r.power_summer, r.power_winter])
            .flatten(),
        rated_power_kw,
    )
}
