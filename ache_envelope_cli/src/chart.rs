use std::io::Cursor;
use std::panic;
use std::path::Path;

use ache_envelope::performance::{
    exceedance_regions, padded_range, power_axis_range, PerformanceData, PerformanceRow,
};
use ache_envelope::config::DesignThresholds;
use ache_envelope::{AnalysisConfig, ConstraintKind, SheetError, SheetResult, Status};
use anyhow::{anyhow, Result};
use plotters::prelude::*;
use plotters::series::DashedLineSeries;
use plotters::style::{FontDesc, FontFamily, FontStyle};
use plotters_backend::{
    BackendColor, BackendCoord, BackendTextStyle, DrawingBackend, DrawingErrorKind,
};

/// Envelope chart of one analyzed sheet, encoded as PNG.
pub fn render(
    result: &SheetResult,
    sheet_label: &str,
    config: &AnalysisConfig,
) -> Result<Vec<u8>, SheetError> {
    render_guard(|| envelope_png(result, sheet_label, config))
}

/// Run a renderer, turning both errors and backend panics into a sheet-level failure.
fn render_guard<T>(render: impl FnOnce() -> Result<T>) -> Result<T, SheetError> {
    panic::catch_unwind(panic::AssertUnwindSafe(render))
        .map_err(|_| SheetError::Render("plotting backend panicked".to_string()))?
        .map_err(|err| SheetError::Render(err.to_string()))
}

fn envelope_png(result: &SheetResult, label: &str, config: &AnalysisConfig) -> Result<Vec<u8>> {
    let (width, height) = (config.chart_width, config.chart_height);
    let mut buffer = vec![0u8; width as usize * height as usize * 3];
    {
        let backend = BitMapBackend::with_buffer(&mut buffer, (width, height));
        let root = TextSafeBackend::new(backend).into_drawing_area();
        draw_envelope_chart(root, result, label)?;
    }
    encode_png(buffer, width, height)
}

fn encode_png(buffer: Vec<u8>, width: u32, height: u32) -> Result<Vec<u8>> {
    let image = image::RgbImage::from_raw(width, height, buffer)
        .ok_or_else(|| anyhow!("chart buffer does not match {width}x{height}"))?;
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image).write_to(&mut out, image::ImageOutputFormat::Png)?;
    Ok(out.into_inner())
}

fn constraint_color(kind: ConstraintKind) -> RGBColor {
    match kind {
        ConstraintKind::ActualFlow => RGBColor(31, 119, 180),
        ConstraintKind::PressureDrop => RGBColor(255, 127, 14),
        ConstraintKind::Momentum => RGBColor(44, 160, 44),
    }
}

const SAFE_COLOR: RGBColor = RGBColor(34, 139, 34);
const UNSAFE_COLOR: RGBColor = RGBColor(214, 39, 40);

fn draw_envelope_chart<DB>(
    root: DrawingArea<DB, plotters::coord::Shift>,
    result: &SheetResult,
    label: &str,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let area = root;
    area.fill(&WHITE)?;

    let temperatures = result
        .samples
        .iter()
        .map(|s| s.inlet_temperature)
        .chain(result.operating_points.iter().map(|p| p.point.temperature));
    let (mut x_min, mut x_max) = temperatures.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), t| {
        (lo.min(t), hi.max(t))
    });
    if (x_max - x_min).abs() < f64::EPSILON {
        x_min -= 1.0;
        x_max += 1.0;
    }
    let y_max = result
        .samples
        .iter()
        .flat_map(|s| ConstraintKind::ALL.map(|k| s.flow(k)))
        .chain(result.operating_points.iter().map(|p| p.point.flowrate))
        .fold(1.0_f64, f64::max)
        * 1.1;
    let y_min = result
        .envelope
        .iter()
        .map(|p| p.constraint_min)
        .fold(0.0_f64, f64::min);

    let mut chart = ChartBuilder::on(&area)
        .caption(
            format!("Operating Envelope: {label}"),
            FontDesc::new(FontFamily::SansSerif, 24.0, FontStyle::Bold),
        )
        .margin(25)
        .set_label_area_size(LabelAreaPosition::Left, 80)
        .set_label_area_size(LabelAreaPosition::Bottom, 50)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

    let axis_font = FontDesc::new(FontFamily::SansSerif, 16.0, FontStyle::Normal);
    chart
        .configure_mesh()
        .x_desc("Inlet Temperature (°C)")
        .y_desc("Flowrate (kg/hr)")
        .x_label_formatter(&|v| format!("{:.0}", v))
        .y_label_formatter(&|v| format!("{:.0}", v))
        .label_style(axis_font.clone().color(&BLACK.mix(0.85)))
        .axis_desc_style(axis_font)
        .draw()?;

    let envelope: Vec<(f64, f64)> = result
        .envelope
        .iter()
        .map(|p| (p.inlet_temperature, p.constraint_min))
        .collect();

    chart
        .draw_series(AreaSeries::new(
            envelope.iter().copied(),
            y_min,
            RGBColor(152, 251, 152).mix(0.35),
        ))?
        .label("Safe operating region")
        .legend(|(x, y)| {
            Rectangle::new([(x, y - 5), (x + 30, y + 5)], RGBColor(152, 251, 152).filled())
        });

    for kind in ConstraintKind::ALL {
        let color = constraint_color(kind);
        chart
            .draw_series(LineSeries::new(
                result
                    .samples
                    .iter()
                    .map(|s| (s.inlet_temperature, s.flow(kind))),
                color.stroke_width(2),
            ))?
            .label(kind.display_name())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 30, y)], color));
    }

    chart
        .draw_series(LineSeries::new(
            envelope.iter().copied(),
            ShapeStyle {
                color: BLACK.to_rgba(),
                filled: false,
                stroke_width: 4,
            },
        ))?
        .label("Limiting envelope")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 30, y)], BLACK.stroke_width(3)));

    let text_font = FontDesc::new(FontFamily::SansSerif, 15.0, FontStyle::Normal);
    let dy = (y_max - y_min) * 0.03;

    if let Some(event) = result.crossover.as_ref() {
        let at = (event.temperature, event.flow_at_shift);
        chart.draw_series(std::iter::once(Circle::new(at, 7, RGBColor(148, 0, 211).filled())))?;
        chart.draw_series(std::iter::once(Text::new(
            format!(
                "Shift to {} at {:.1} °C ({:.0} kg/hr)",
                event.new_constraint, event.temperature, event.flow_at_shift
            ),
            (event.temperature, event.flow_at_shift + dy),
            text_font.clone().color(&BLACK),
        )))?;
    }

    for classified in &result.operating_points {
        let color = match classified.status {
            Status::Safe => SAFE_COLOR,
            Status::Unsafe => UNSAFE_COLOR,
        };
        let at = (classified.point.temperature, classified.point.flowrate);
        chart.draw_series(std::iter::once(Circle::new(at, 6, color.filled())))?;
        chart.draw_series(std::iter::once(Text::new(
            format!("{} ({})", classified.point.case_label, classified.status),
            (at.0, at.1 + dy),
            text_font.clone().color(&color),
        )))?;
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK.mix(0.3))
        .label_font(FontDesc::new(FontFamily::SansSerif, 15.0, FontStyle::Normal))
        .position(SeriesLabelPosition::UpperRight)
        .draw()?;

    area.present()?;
    Ok(())
}

/// Palette keyed by the inlet temperatures the performance sheets normally carry.
fn temperature_color(temperature: f64) -> RGBColor {
    const PALETTE: [(f64, RGBColor); 6] = [
        (50.0, RGBColor(31, 119, 180)),
        (55.0, RGBColor(255, 127, 14)),
        (60.0, RGBColor(44, 160, 44)),
        (65.0, RGBColor(214, 39, 40)),
        (70.0, RGBColor(148, 103, 189)),
        (75.0, RGBColor(140, 86, 75)),
    ];
    PALETTE
        .iter()
        .find(|(t, _)| (t - temperature).abs() < 1e-9)
        .map(|(_, c)| *c)
        .unwrap_or(BLACK)
}

/// Contiguous stretches of a series between gaps.
fn runs(series: &[(f64, Option<f64>)]) -> Vec<Vec<(f64, f64)>> {
    let mut out: Vec<Vec<(f64, f64)>> = vec![Vec::new()];
    for &(x, y) in series {
        match y {
            Some(y) => {
                if let Some(run) = out.last_mut() {
                    run.push((x, y));
                }
            }
            None => out.push(Vec::new()),
        }
    }
    out.retain(|run| !run.is_empty());
    out
}

fn flow_range(data: &PerformanceData) -> (f64, f64) {
    let (lo, hi) = data
        .rows()
        .map(|r| r.mass_flow)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if (hi - lo).abs() < f64::EPSILON {
        (lo - 1.0, hi + 1.0)
    } else {
        (lo, hi)
    }
}

fn values(data: &PerformanceData, value: fn(&PerformanceRow) -> Option<f64>) -> Vec<f64> {
    data.rows().filter_map(value).collect()
}

/// UA (left axis) and heat duty (right axis) against mass flow, shaded above design.
pub fn render_ua_duty_chart(
    data: &PerformanceData,
    thresholds: &DesignThresholds,
    title: &str,
    path: &Path,
    config: &AnalysisConfig,
) -> Result<(), SheetError> {
    render_guard(|| {
        let backend = BitMapBackend::new(path, (config.chart_width, config.chart_height));
        let root = TextSafeBackend::new(backend).into_drawing_area();
        draw_ua_duty_chart(root, data, thresholds, title)
    })
}

fn draw_ua_duty_chart<DB>(
    root: DrawingArea<DB, plotters::coord::Shift>,
    data: &PerformanceData,
    thresholds: &DesignThresholds,
    title: &str,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let area = root;
    area.fill(&WHITE)?;

    let (x_lo, x_hi) = flow_range(data);
    let (ua_lo, ua_hi) = padded_range(values(data, |r| r.ua), thresholds.design_ua);
    let (duty_lo, duty_hi) = padded_range(values(data, |r| r.duty), thresholds.design_duty);
    let ua_lo = ua_lo.min(thresholds.design_ua * 0.9);
    let duty_lo = duty_lo.min(thresholds.design_duty * 0.9);

    let mut chart = ChartBuilder::on(&area)
        .caption(
            format!("Air Cooler Performance Curve: UA and Heat Duty vs. Mass Flow Rate ({title})"),
            FontDesc::new(FontFamily::SansSerif, 22.0, FontStyle::Bold),
        )
        .margin(25)
        .set_label_area_size(LabelAreaPosition::Left, 90)
        .set_label_area_size(LabelAreaPosition::Right, 110)
        .set_label_area_size(LabelAreaPosition::Bottom, 50)
        .build_cartesian_2d(x_lo..x_hi, ua_lo..ua_hi)?
        .set_secondary_coord(x_lo..x_hi, duty_lo..duty_hi);

    let axis_font = FontDesc::new(FontFamily::SansSerif, 15.0, FontStyle::Normal);
    chart
        .configure_mesh()
        .x_desc("Mass Flow Rate (kg/hr)")
        .y_desc("Service UA (kcal/hr.m².°C)")
        .x_label_formatter(&|v| format!("{:.0}", v))
        .y_label_formatter(&|v| format!("{:.0}", v))
        .label_style(axis_font.clone())
        .axis_desc_style(axis_font.clone())
        .draw()?;
    chart
        .configure_secondary_axes()
        .y_desc("Heat Exchanger Duty (kcal/hr)")
        .y_label_formatter(&|v| format!("{:.0}", v))
        .label_style(axis_font.clone().color(&RGBColor(0, 128, 0)))
        .axis_desc_style(axis_font.color(&RGBColor(0, 128, 0)))
        .draw()?;

    let shade = RED.mix(0.3);
    for group in &data.groups {
        let color = temperature_color(group.inlet_temperature);
        let ua = group.series(|r| r.ua);
        let duty = group.series(|r| r.duty);

        for polygon in exceedance_regions(&ua, thresholds.design_ua) {
            chart.draw_series(std::iter::once(Polygon::new(polygon, shade.filled())))?;
        }
        for polygon in exceedance_regions(&duty, thresholds.design_duty) {
            chart.draw_secondary_series(std::iter::once(Polygon::new(polygon, shade.filled())))?;
        }

        for (i, run) in runs(&ua).into_iter().enumerate() {
            let series = chart.draw_series(LineSeries::new(run, color.stroke_width(2)))?;
            if i == 0 {
                series
                    .label(format!("UA @ {}°C", group.inlet_temperature))
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 30, y)], color));
            }
        }
        for (i, run) in runs(&duty).into_iter().enumerate() {
            let series = chart.draw_secondary_series(DashedLineSeries::new(
                run,
                3,
                4,
                color.stroke_width(2),
            ))?;
            if i == 0 {
                series
                    .label(format!("Duty @ {}°C", group.inlet_temperature))
                    .legend(move |(x, y)| {
                        PathElement::new(vec![(x, y), (x + 8, y)], color.stroke_width(2))
                    });
            }
        }
    }

    let ua_line = RGBColor(255, 140, 0);
    chart
        .draw_series(LineSeries::new(
            [(x_lo, thresholds.design_ua), (x_hi, thresholds.design_ua)],
            ua_line.stroke_width(3),
        ))?
        .label(format!("Design UA ({} kcal/hr.m².°C)", thresholds.design_ua))
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 30, y)], ua_line.stroke_width(3)));

    let duty_line = RGBColor(128, 0, 128);
    chart
        .draw_secondary_series(DashedLineSeries::new(
            [(x_lo, thresholds.design_duty), (x_hi, thresholds.design_duty)],
            10,
            6,
            duty_line.stroke_width(3),
        ))?
        .label(format!("Design Duty ({} kcal/hr)", thresholds.design_duty))
        .legend(move |(x, y)| {
            PathElement::new(vec![(x, y), (x + 30, y)], duty_line.stroke_width(3))
        });

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK.mix(0.3))
        .label_font(FontDesc::new(FontFamily::SansSerif, 13.0, FontStyle::Normal))
        .position(SeriesLabelPosition::LowerRight)
        .draw()?;

    area.present()?;
    Ok(())
}

/// Summer (solid) and winter (dashed) fan power per temperature with the rated line.
pub fn render_fan_power_chart(
    data: &PerformanceData,
    thresholds: &DesignThresholds,
    title: &str,
    path: &Path,
    config: &AnalysisConfig,
) -> Result<(), SheetError> {
    render_guard(|| {
        let backend = BitMapBackend::new(path, (config.chart_width, config.chart_height));
        let root = TextSafeBackend::new(backend).into_drawing_area();
        draw_fan_power_chart(root, data, thresholds, title)
    })
}

fn draw_fan_power_chart<DB>(
    root: DrawingArea<DB, plotters::coord::Shift>,
    data: &PerformanceData,
    thresholds: &DesignThresholds,
    title: &str,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let area = root;
    area.fill(&WHITE)?;

    let (x_lo, x_hi) = flow_range(data);
    let (y_lo, y_hi) = power_axis_range(data, thresholds.rated_power_kw);

    let mut chart = ChartBuilder::on(&area)
        .caption(
            format!("Air Cooler Performance Curve: Fan Power vs. Mass Flow Rate ({title})"),
            FontDesc::new(FontFamily::SansSerif, 22.0, FontStyle::Bold),
        )
        .margin(25)
        .set_label_area_size(LabelAreaPosition::Left, 70)
        .set_label_area_size(LabelAreaPosition::Bottom, 50)
        .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)?;

    let axis_font = FontDesc::new(FontFamily::SansSerif, 15.0, FontStyle::Normal);
    chart
        .configure_mesh()
        .x_desc("Mass Flow Rate (kg/hr)")
        .y_desc("Brake Power/Fan (kW)")
        .x_label_formatter(&|v| format!("{:.0}", v))
        .y_label_formatter(&|v| format!("{:.1}", v))
        .label_style(axis_font.clone())
        .axis_desc_style(axis_font)
        .draw()?;

    for group in &data.groups {
        let color = temperature_color(group.inlet_temperature);
        for (i, run) in runs(&group.series(|r| r.power_summer)).into_iter().enumerate() {
            let series = chart.draw_series(LineSeries::new(run, color.stroke_width(2)))?;
            if i == 0 {
                series
                    .label(format!("Summer Power @ {}°C", group.inlet_temperature))
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 30, y)], color));
            }
        }
        for (i, run) in runs(&group.series(|r| r.power_winter)).into_iter().enumerate() {
            let series = chart.draw_series(DashedLineSeries::new(
                run,
                10,
                6,
                color.stroke_width(2),
            ))?;
            if i == 0 {
                series
                    .label(format!("Winter Power @ {}°C", group.inlet_temperature))
                    .legend(move |(x, y)| {
                        PathElement::new(vec![(x, y), (x + 12, y)], color.stroke_width(2))
                    });
            }
        }
    }

    chart
        .draw_series(DashedLineSeries::new(
            [(x_lo, thresholds.rated_power_kw), (x_hi, thresholds.rated_power_kw)],
            14,
            6,
            BLACK.stroke_width(3),
        ))?
        .label(format!("Rated Power ({} kW)", thresholds.rated_power_kw))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 30, y)], BLACK.stroke_width(3)));

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK.mix(0.3))
        .label_font(FontDesc::new(FontFamily::SansSerif, 13.0, FontStyle::Normal))
        .position(SeriesLabelPosition::UpperLeft)
        .draw()?;

    area.present()?;
    Ok(())
}

/// Backend wrapper that drops text instead of failing when no usable font is installed.
struct TextSafeBackend<DB> {
    inner: DB,
}

impl<DB> TextSafeBackend<DB> {
    fn new(inner: DB) -> Self {
        Self { inner }
    }
}

impl<DB: DrawingBackend> DrawingBackend for TextSafeBackend<DB> {
    type ErrorType = DB::ErrorType;

    fn get_size(&self) -> (u32, u32) {
        self.inner.get_size()
    }

    fn ensure_prepared(&mut self) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.ensure_prepared()
    }

    fn present(&mut self) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.present()
    }

    fn draw_pixel(
        &mut self,
        point: BackendCoord,
        color: BackendColor,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.draw_pixel(point, color)
    }

    fn draw_line<S: plotters_backend::BackendStyle>(
        &mut self,
        from: BackendCoord,
        to: BackendCoord,
        style: &S,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.draw_line(from, to, style)
    }

    fn draw_rect<S: plotters_backend::BackendStyle>(
        &mut self,
        upper_left: BackendCoord,
        bottom_right: BackendCoord,
        style: &S,
        fill: bool,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.draw_rect(upper_left, bottom_right, style, fill)
    }

    fn draw_path<S: plotters_backend::BackendStyle, I: IntoIterator<Item = BackendCoord>>(
        &mut self,
        path: I,
        style: &S,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.draw_path(path, style)
    }

    fn draw_circle<S: plotters_backend::BackendStyle>(
        &mut self,
        center: BackendCoord,
        radius: u32,
        style: &S,
        fill: bool,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.draw_circle(center, radius, style, fill)
    }

    fn fill_polygon<S: plotters_backend::BackendStyle, I: IntoIterator<Item = BackendCoord>>(
        &mut self,
        vert: I,
        style: &S,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.fill_polygon(vert, style)
    }

    fn blit_bitmap(
        &mut self,
        pos: BackendCoord,
        (iw, ih): (u32, u32),
        src: &[u8],
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.blit_bitmap(pos, (iw, ih), src)
    }

    fn draw_text<TStyle: BackendTextStyle>(
        &mut self,
        text: &str,
        style: &TStyle,
        pos: BackendCoord,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        match panic::catch_unwind(panic::AssertUnwindSafe(|| {
            self.inner.draw_text(text, style, pos)
        })) {
            Ok(Err(DrawingErrorKind::FontError(_))) | Err(_) => Ok(()),
            Ok(result) => result,
        }
    }

    fn estimate_text_size<TStyle: BackendTextStyle>(
        &self,
        text: &str,
        style: &TStyle,
    ) -> Result<(u32, u32), DrawingErrorKind<Self::ErrorType>> {
        match panic::catch_unwind(panic::AssertUnwindSafe(|| {
            self.inner.estimate_text_size(text, style)
        })) {
            Ok(Ok(size)) => Ok(size),
            Ok(Err(DrawingErrorKind::FontError(_))) | Err(_) => {
                let size = style.size().max(1.0);
                let width = text.chars().count() as f64 * size * 0.6;
                Ok((width.round() as u32, size.round() as u32))
            }
            Ok(Err(err)) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ache_envelope::performance::TemperatureGroup;
    use ache_envelope::{analyze_table, Cell, RawTable};

    #[test]
    fn runs_split_on_gaps() {
        let series = vec![
            (1.0, Some(1.0)),
            (2.0, None),
            (3.0, Some(3.0)),
            (4.0, Some(4.0)),
            (5.0, None),
        ];
        assert_eq!(runs(&series), vec![vec![(1.0, 1.0)], vec![(3.0, 3.0), (4.0, 4.0)]]);
    }

    #[test]
    fn unknown_temperatures_fall_back_to_black() {
        assert_eq!(temperature_color(60.0), RGBColor(44, 160, 44));
        assert_eq!(temperature_color(62.5), BLACK);
    }

    #[test]
    fn guard_converts_panics_into_render_errors() {
        let outcome: Result<(), SheetError> = render_guard(|| panic!("backend exploded"));
        assert_eq!(
            outcome,
            Err(SheetError::Render("plotting backend panicked".to_string()))
        );
        let outcome: Result<u8, SheetError> = render_guard(|| Err(anyhow!("no room")));
        assert_eq!(outcome, Err(SheetError::Render("no room".to_string())));
    }

    const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

    fn sheet(rows: &[&[f64]], label: Option<&str>) -> SheetResult {
        let rows = rows
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let mut cells: Vec<Cell> = r.iter().copied().map(Cell::Number).collect();
                if let (0, Some(label)) = (i, label) {
                    cells.push(Cell::Text(label.into()));
                }
                cells
            })
            .collect();
        analyze_table(&RawTable::new("Case A", Vec::new(), rows)).expect("analysis")
    }

    #[test]
    fn envelope_chart_renders_crossover_and_operating_points() {
        let result = sheet(
            &[&[20.0, 100.0, 120.0, 130.0, 21.0, 95.0], &[30.0, 90.0, 110.0, 70.0]],
            Some("Summer"),
        );
        assert_eq!(result.operating_points.len(), 1);
        let png = render(&result, "Case A", &AnalysisConfig::default()).expect("chart");
        assert_eq!(&png[..8], PNG_SIGNATURE);
        assert_eq!(
            ache_envelope::summary_text(&result),
            "Constraint Shift Analysis:\n\
             Limiting curve switches at Inlet Temperature: 30.0 °C\n\
             Flowrate limit at shift: 70 kg/hr\n\
             New limiting curve: Momentum Limit\n\
             Operating point Summer: 21.0 °C, 95 kg/hr - SAFE (limit 100 kg/hr)"
        );
    }

    #[test]
    fn single_sample_sheet_still_renders() {
        let result = sheet(&[&[25.0, 80.0, 90.0, 100.0]], None);
        let config = AnalysisConfig {
            chart_width: 400,
            chart_height: 300,
            ..AnalysisConfig::default()
        };
        let png = render(&result, "Flat", &config).expect("chart");
        assert_eq!(&png[..8], PNG_SIGNATURE);
    }

    fn performance_data() -> PerformanceData {
        let row = |mass_flow: f64, inlet_temperature: f64, scale: f64| PerformanceRow {
            mass_flow,
            inlet_temperature,
            ua: Some(4000.0 * scale),
            duty: Some(3.0e6 * scale),
            power_summer: Some(20.0 * scale),
            power_winter: if mass_flow > 1500.0 { None } else { Some(15.0 * scale) },
        };
        PerformanceData {
            groups: vec![
                TemperatureGroup {
                    inlet_temperature: 50.0,
                    rows: vec![row(1000.0, 50.0, 0.9), row(2000.0, 50.0, 1.2)],
                },
                TemperatureGroup {
                    inlet_temperature: 62.0,
                    rows: vec![row(1000.0, 62.0, 1.0), row(2000.0, 62.0, 1.3)],
                },
            ],
            dropped_rows: 0,
        }
    }

    #[test]
    fn performance_charts_are_written_as_png_files() {
        let dir = tempfile::tempdir().unwrap();
        let thresholds = DesignThresholds {
            rated_power_kw: 22.0,
            design_duty: 3.2e6,
            design_ua: 4200.0,
        };
        let config = AnalysisConfig::default();
        let data = performance_data();

        let ua_path = dir.path().join("cooler_ua_duty.png");
        render_ua_duty_chart(&data, &thresholds, "Cooler", &ua_path, &config).expect("ua chart");
        let power_path = dir.path().join("cooler_fan_power.png");
        render_fan_power_chart(&data, &thresholds, "Cooler", &power_path, &config)
            .expect("power chart");

        for path in [ua_path, power_path] {
            let bytes = std::fs::read(&path).expect("chart file");
            assert_eq!(&bytes[..8], PNG_SIGNATURE, "{}", path.display());
        }
    }

    #[test]
    fn png_encoding_produces_png_signature() {
        let png = encode_png(vec![255; 4 * 3 * 3], 4, 3).expect("png");
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        assert!(encode_png(vec![0; 5], 4, 3).is_err());
    }
}
