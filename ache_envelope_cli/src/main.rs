use std::fmt::Write as _;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use ache_envelope::performance::parse_performance;
use ache_envelope::{analyze_tables, AnalysisConfig, BatchResult, RawTable, SheetReport};
use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueHint};
use rayon::prelude::*;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod chart;
mod export;
mod report;
mod workbook;

use report::SheetOutput;

#[derive(Parser, Debug)]
#[command(author, version, about = "ACHE constraint-envelope analyzer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze envelope sheets and write the annotated report workbook
    Envelope(EnvelopeArgs),
    /// Draw UA/duty and fan-power curves against design thresholds
    Performance(PerformanceArgs),
    /// Summarize the sheets of a workbook without writing a report
    Inspect(InspectArgs),
}

#[derive(Parser, Debug)]
struct EnvelopeArgs {
    /// Input workbook (.xlsx, .xls, .xlsb, .ods)
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Report path (defaults to `<stem><suffix>.xlsx` next to the input)
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,

    /// Suffix appended to the input stem when naming the report
    #[arg(long)]
    suffix: Option<String>,

    /// Write the per-sample envelope as CSV (`-` for stdout)
    #[arg(long, value_hint = ValueHint::FilePath)]
    csv: Option<PathBuf>,

    /// Write a JSON summary of every sheet
    #[arg(long, value_hint = ValueHint::FilePath)]
    json: Option<PathBuf>,

    /// JSON settings file
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Only analyze these sheets (repeatable)
    #[arg(long = "sheet")]
    sheets: Vec<String>,

    /// Chart width in pixels
    #[arg(long)]
    chart_width: Option<u32>,

    /// Chart height in pixels
    #[arg(long)]
    chart_height: Option<u32>,

    /// Skip chart rendering
    #[arg(long, action = ArgAction::SetTrue)]
    no_chart: bool,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,

    /// Profile major stages with timings
    #[arg(long, action = ArgAction::SetTrue)]
    profile: bool,
}

#[derive(Parser, Debug)]
struct PerformanceArgs {
    /// Input workbook with mass flow, temperature, UA, duty and fan power columns
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Fan rated power (kW)
    #[arg(long)]
    rated_power: Option<f64>,

    /// Design air cooler duty (kcal/hr)
    #[arg(long)]
    design_duty: Option<f64>,

    /// Design UA (kcal/hr.m².°C)
    #[arg(long)]
    design_ua: Option<f64>,

    /// JSON settings file
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Directory for the PNG charts (defaults next to the input)
    #[arg(long, value_hint = ValueHint::DirPath)]
    out_dir: Option<PathBuf>,

    /// Only chart these sheets (repeatable)
    #[arg(long = "sheet")]
    sheets: Vec<String>,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Workbook to inspect
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Report path (`-` for stdout)
    #[arg(short, long, default_value = "-", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = match &cli.command {
        Command::Envelope(args) => args.verbose,
        Command::Performance(args) => args.verbose,
        Command::Inspect(args) => args.verbose,
    };
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match cli.command {
        Command::Envelope(args) => handle_envelope(args),
        Command::Performance(args) => handle_performance(args),
        Command::Inspect(args) => handle_inspect(args),
    }
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    match path {
        Some(path) => AnalysisConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(AnalysisConfig::default()),
    }
}

fn handle_envelope(args: EnvelopeArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(suffix) = args.suffix.clone() {
        config.report_suffix = suffix;
    }
    if let Some(width) = args.chart_width {
        config.chart_width = width;
    }
    if let Some(height) = args.chart_height {
        config.chart_height = height;
    }
    config.validate()?;

    let t_read = Instant::now();
    let tables = workbook::read_workbook(&args.input, &args.sheets)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    if tables.is_empty() {
        return Err(anyhow!("{} contains no sheets", args.input.display()));
    }
    if args.profile || args.verbose {
        info!(
            "Read stage: {:.1} ms ({} sheets)",
            t_read.elapsed().as_secs_f64() * 1000.0,
            tables.len()
        );
    }

    let t_analyze = Instant::now();
    // Indexed par_iter collects in source order.
    let outputs: Vec<SheetOutput> = tables
        .par_iter()
        .map(|table| process_sheet(table, &config, args.no_chart))
        .collect();
    if args.profile || args.verbose {
        info!(
            "Analyze/render stage: {:.1} ms",
            t_analyze.elapsed().as_secs_f64() * 1000.0
        );
    }

    let batch = BatchResult {
        sheets: outputs.iter().map(|o| o.report.clone()).collect(),
    };
    for sheet in &batch.sheets {
        match &sheet.outcome {
            Ok(result) => match &result.crossover {
                Some(event) => info!(
                    "{}: {} samples, limiting curve switches to {} at {:.1} °C ({:.0} kg/hr)",
                    sheet.name,
                    result.samples.len(),
                    event.new_constraint,
                    event.temperature,
                    event.flow_at_shift
                ),
                None => info!(
                    "{}: {} samples, limiting curve does not switch",
                    sheet.name,
                    result.samples.len()
                ),
            },
            Err(err) => warn!("{}: analysis failed: {}", sheet.name, err),
        }
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| report::report_path(&args.input, &config.report_suffix));
    let t_write = Instant::now();
    report::write_report(&output, &outputs)?;
    if args.profile || args.verbose {
        info!(
            "Report stage: {:.1} ms",
            t_write.elapsed().as_secs_f64() * 1000.0
        );
    }
    info!(
        "Wrote report: {} ({} ok, {} failed)",
        output.display(),
        batch.succeeded(),
        batch.failed()
    );

    if let Some(path) = args.csv.as_ref() {
        export::write_envelope_csv(&batch, path)?;
        if path.as_os_str() != "-" {
            info!("Wrote envelope CSV: {}", path.display());
        }
    }
    if let Some(path) = args.json.as_ref() {
        export::write_summary_json(&batch, path)?;
        info!("Wrote summary JSON: {}", path.display());
    }
    Ok(())
}

fn process_sheet(table: &RawTable, config: &AnalysisConfig, no_chart: bool) -> SheetOutput {
    let report = SheetReport::analyze(table);
    let mut output = SheetOutput {
        report,
        chart_png: None,
        render_error: None,
    };
    if no_chart {
        return output;
    }
    if let Ok(result) = &output.report.outcome {
        match chart::render(result, &table.name, config) {
            Ok(png) => {
                debug!("{}: chart rendered ({} bytes)", table.name, png.len());
                output.chart_png = Some(png);
            }
            Err(err) => {
                warn!("{}: skipping chart: {}", table.name, err);
                output.render_error = Some(err);
            }
        }
    }
    output
}

fn handle_performance(args: PerformanceArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if args.rated_power.is_some() {
        config.rated_power_kw = args.rated_power;
    }
    if args.design_duty.is_some() {
        config.design_duty = args.design_duty;
    }
    if args.design_ua.is_some() {
        config.design_ua = args.design_ua;
    }
    config.validate()?;
    let thresholds = config.design_thresholds()?;

    let tables = workbook::read_workbook(&args.input, &args.sheets)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let out_dir = match args.out_dir.clone() {
        Some(dir) => dir,
        None => args
            .input
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };
    if !out_dir.as_os_str().is_empty() {
        fs::create_dir_all(&out_dir)
            .with_context(|| format!("failed to create {}", out_dir.display()))?;
    }
    let stem = args
        .input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("performance")
        .to_string();
    let multi = tables.len() > 1;

    for table in &tables {
        let data = match parse_performance(table) {
            Ok(data) => data,
            Err(err) => {
                warn!("{}: skipping performance charts: {}", table.name, err);
                continue;
            }
        };
        if data.dropped_rows > 0 {
            debug!("{}: dropped {} non-numeric rows", table.name, data.dropped_rows);
        }
        let base = if multi {
            format!("{stem}_{}", file_safe(&table.name))
        } else {
            stem.clone()
        };

        let ua_path = out_dir.join(format!("{base}_ua_duty.png"));
        match chart::render_ua_duty_chart(&data, &thresholds, &table.name, &ua_path, &config) {
            Ok(()) => info!("Wrote plot: {}", ua_path.display()),
            Err(err) => warn!("Skipping PNG render ({}): {}", ua_path.display(), err),
        }
        let power_path = out_dir.join(format!("{base}_fan_power.png"));
        match chart::render_fan_power_chart(&data, &thresholds, &table.name, &power_path, &config)
        {
            Ok(()) => info!("Wrote plot: {}", power_path.display()),
            Err(err) => warn!("Skipping PNG render ({}): {}", power_path.display(), err),
        }
    }
    Ok(())
}

fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

fn handle_inspect(args: InspectArgs) -> Result<()> {
    let tables = workbook::read_workbook(&args.input, &[])
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let report = inspect_report(&args.input, &tables);

    if args.output.as_os_str() == "-" {
        io::stdout().lock().write_all(report.as_bytes())?;
    } else {
        fs::write(&args.output, report)
            .with_context(|| format!("failed to write {}", args.output.display()))?;
        info!("Wrote inspection report: {}", args.output.display());
    }
    Ok(())
}

fn inspect_report(input: &Path, tables: &[RawTable]) -> String {
    let batch = analyze_tables(tables);
    let mut report = String::new();
    let _ = writeln!(report, "Workbook: {}", input.display());
    let _ = writeln!(report, "Sheets: {}", tables.len());
    for (table, sheet) in tables.iter().zip(&batch.sheets) {
        let _ = writeln!(report);
        let _ = writeln!(report, "== {} ==", table.name);
        let _ = writeln!(
            report,
            "rows: {}, columns: {}",
            table.rows.len(),
            table.column_count()
        );
        if !table.headers.is_empty() {
            let _ = writeln!(report, "headers: {}", table.headers.join(" | "));
        }
        match &sheet.outcome {
            Ok(result) => {
                let _ = writeln!(report, "schema: {:?}", result.schema);
                let _ = writeln!(
                    report,
                    "usable samples: {}, dropped rows: {}",
                    result.samples.len(),
                    result.dropped_rows
                );
                match &result.crossover {
                    Some(event) => {
                        let _ = writeln!(
                            report,
                            "crossover: {} -> {} at {:.1} °C",
                            event.previous_constraint, event.new_constraint, event.temperature
                        );
                    }
                    None => {
                        let _ = writeln!(report, "crossover: none");
                    }
                }
            }
            Err(err) => {
                let _ = writeln!(report, "problem: {err}");
            }
        }
    }
    let _ = writeln!(report);
    let _ = writeln!(
        report,
        "{} sheet(s) analyzable, {} with problems",
        batch.succeeded(),
        batch.failed()
    );
    report
}
