use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use lapdelta::data::{Session, SessionKey};
use lapdelta::segment::CornerWindow;
use lapdelta::source::{CachedSource, CsvSource, TelemetrySource};
use lapdelta::{build_dashboard, AnalysisConfig, AnalysisError, DashboardRequest};

/// Compare two F1 laps from exported timing and telemetry tables.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Root of the exported data tree (<root>/<year>/<event>/<session>/...).
    #[arg(long, default_value = "data")]
    data_root: PathBuf,
    #[arg(long)]
    year: u16,
    #[arg(long, required_unless_present = "list")]
    event: Option<String>,
    /// FP1, FP2, FP3, SQ, S, Q or R.
    #[arg(long, default_value = "Q")]
    session: String,
    #[arg(long, required_unless_present = "list")]
    driver_a: Option<String>,
    #[arg(long, required_unless_present = "list")]
    driver_b: Option<String>,
    /// Lap number for driver A; defaults to the fastest clean lap.
    #[arg(long)]
    lap_a: Option<u32>,
    #[arg(long)]
    lap_b: Option<u32>,
    /// Corner window as START:END in meters; repeat for more corners.
    #[arg(long = "corner", value_parser = parse_window)]
    corners: Vec<CornerWindow>,
    /// JSON analysis settings.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Print the dashboard as JSON for a plotting front-end.
    #[arg(long)]
    json: bool,
    /// List the season's events, or the session's drivers when --event is given.
    #[arg(long)]
    list: bool,
}

fn parse_window(raw: &str) -> Result<CornerWindow, String> {
    let (start, end) = raw.split_once(':').ok_or("expected START:END")?;
    let start: f64 = start.trim().parse().map_err(|e| format!("bad start: {}", e))?;
    let end: f64 = end.trim().parse().map_err(|e| format!("bad end: {}", e))?;
    if end <= start {
        return Err("corner end must be after its start".to_string());
    }
    Ok(CornerWindow::new(start, end))
}

fn list(source: &impl TelemetrySource, year: u16, event: Option<String>, session: Session) -> anyhow::Result<()> {
    match event {
        None => {
            for event in source.events(year)? {
                println!("{}", event);
            }
        }
        Some(event) => {
            for driver in source.drivers(&SessionKey::new(year, event, session))? {
                println!("{}", driver.label());
            }
        }
    }
    Ok(())
}

fn run(args: Args) -> anyhow::Result<()> {
    let session: Session = args.session.parse()?;
    let source = CachedSource::new(CsvSource::new(&args.data_root));
    if args.list {
        return list(&source, args.year, args.event, session);
    }

    let config = match &args.config {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::default(),
    };
    let request = DashboardRequest {
        session: SessionKey::new(args.year, args.event.context("--event is required")?, session),
        reference_driver: args.driver_a.context("--driver-a is required")?,
        comparison_driver: args.driver_b.context("--driver-b is required")?,
        reference_lap: args.lap_a,
        comparison_lap: args.lap_b,
        corners: (!args.corners.is_empty()).then_some(args.corners),
    };

    let dashboard = build_dashboard(&source, &request, &config)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&dashboard)?);
    } else {
        print!("{}", dashboard);
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<AnalysisError>() {
                Some(AnalysisError::DataUnavailable { what }) => eprintln!("No data available for {}.", what),
                _ => eprintln!("Error: {:#}", err),
            }
            ExitCode::FAILURE
        }
    }
}
