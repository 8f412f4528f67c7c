//! One dashboard request, end to end: load both drivers, summarize their
//! stints, compare the selected laps and collect everything a front-end
//! needs to draw.

use serde::Serialize;
use std::fmt;

use crate::config::AnalysisConfig;
use crate::data::{
    fastest_lap, format_lap_time, lap_options, Compound, DriverInfo, Lap, LapOption, SessionKey, TelemetrySample,
};
use crate::delta::compute_delta;
use crate::error::{AnalysisError, Result};
use crate::insight::text::{format_gap, insight_lines, DriverNames};
use crate::insight::{generate_findings, Findings, Side};
use crate::segment::{
    corner_contributions, detect_corners, sector_contributions, Corner, CornerWindow, SectorBoundaries, Segment,
};
use crate::source::TelemetrySource;
use crate::strategy::{summarize_stints, Stint};

#[derive(Debug, Clone)]
pub struct DashboardRequest {
    pub session: SessionKey,
    pub reference_driver: String,
    pub comparison_driver: String,
    /// `None` picks the driver's fastest clean lap.
    pub reference_lap: Option<u32>,
    pub comparison_lap: Option<u32>,
    /// Corner windows from track data; detected from the reference lap when absent.
    pub corners: Option<Vec<CornerWindow>>,
}

/// Per-channel traces against distance, ready for line charts and the track map.
#[derive(Debug, Clone, Serialize)]
pub struct Trace {
    pub distance: Vec<f64>,
    pub speed: Vec<Option<f64>>,
    pub throttle: Vec<Option<f64>>,
    pub brake: Vec<Option<bool>>,
    pub x: Vec<Option<f64>>,
    pub y: Vec<Option<f64>>,
}

impl Trace {
    fn from_samples(samples: &[TelemetrySample]) -> Self {
        Self {
            distance: samples.iter().map(|s| s.distance).collect(),
            speed: samples.iter().map(|s| s.speed).collect(),
            throttle: samples.iter().map(|s| s.throttle).collect(),
            brake: samples.iter().map(|s| s.brake).collect(),
            x: samples.iter().map(|s| s.x).collect(),
            y: samples.iter().map(|s| s.y).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StintBar {
    #[serde(flatten)]
    pub stint: Stint,
    pub color: &'static str,
}

// trace colours when the team is unknown
const REFERENCE_COLOR: &str = "#FFFFFF";
const COMPARISON_COLOR: &str = "#AAAAAA";

#[derive(Debug, Clone, Serialize)]
pub struct DriverPanel {
    pub driver: String,
    pub name: String,
    pub team: Option<String>,
    /// Team colour for this driver's traces.
    pub color: &'static str,
    pub lap_number: u32,
    pub lap_time: Option<f64>,
    pub compound: Compound,
    pub lap_options: Vec<LapOption>,
    pub stints: Vec<StintBar>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonView {
    pub delta: Vec<(f64, f64)>,
    pub sector_boundaries: SectorBoundaries,
    pub sectors: Vec<Segment>,
    pub corners: Vec<Corner>,
    pub findings: Findings,
    pub insights: Vec<String>,
    pub reference_trace: Trace,
    pub comparison_trace: Trace,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ComparisonPanel {
    Ready(Box<ComparisonView>),
    Unavailable { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub session: String,
    pub strategy_title: String,
    pub reference: DriverPanel,
    pub comparison: DriverPanel,
    pub panel: ComparisonPanel,
}

fn select_lap<'a>(laps: &'a [Lap], requested: Option<u32>, key: &SessionKey, driver: &str) -> Result<&'a Lap> {
    match requested {
        Some(n) => laps
            .iter()
            .find(|l| l.lap_number == n)
            .ok_or_else(|| AnalysisError::unavailable(format!("{} driver {} lap {}", key, driver, n))),
        None => fastest_lap(laps)
            .ok_or_else(|| AnalysisError::unavailable(format!("{} driver {} (no timed laps)", key, driver))),
    }
}

fn driver_info(roster: &[DriverInfo], driver: &str) -> DriverInfo {
    let code = driver.trim().to_uppercase();
    roster
        .iter()
        .find(|d| d.code == code)
        .cloned()
        .unwrap_or_else(|| DriverInfo::bare(&code))
}

fn driver_panel(info: DriverInfo, fallback_color: &'static str, laps: &[Lap], lap: &Lap) -> DriverPanel {
    DriverPanel {
        color: info.color().unwrap_or(fallback_color),
        name: info.display_name().to_string(),
        driver: info.code,
        team: info.team,
        lap_number: lap.lap_number,
        lap_time: lap.lap_time,
        compound: lap.compound,
        lap_options: lap_options(laps),
        stints: summarize_stints(laps)
            .into_iter()
            .map(|stint| StintBar { color: stint.compound.color(), stint })
            .collect(),
    }
}

fn compare_laps(
    req: &DashboardRequest,
    names: DriverNames<'_>,
    reference_lap: &Lap,
    reference: &[TelemetrySample],
    comparison: &[TelemetrySample],
    config: &AnalysisConfig,
) -> Result<ComparisonView> {
    let series = compute_delta(reference, comparison, config)?;

    let boundaries = SectorBoundaries::from_sector_times(reference, &reference_lap.sector_times)
        .unwrap_or_else(|| SectorBoundaries::thirds(series.start(), series.end()));
    let sectors = sector_contributions(&series, &boundaries);

    let windows = match &req.corners {
        Some(windows) => windows.clone(),
        None => detect_corners(reference, &config.corners),
    };
    let corners = corner_contributions(&series, &windows);

    let findings = generate_findings(series.total(), &sectors, &corners);
    let insights = insight_lines(&findings, names);

    Ok(ComparisonView {
        delta: series.points().collect(),
        sector_boundaries: boundaries,
        sectors,
        corners,
        findings,
        insights,
        reference_trace: Trace::from_samples(reference),
        comparison_trace: Trace::from_samples(comparison),
    })
}

/// Runs the whole chain for one request. Missing upstream data fails the
/// request; laps that cannot be compared leave an explanation in the panel.
pub fn build_dashboard<S: TelemetrySource>(
    source: &S,
    req: &DashboardRequest,
    config: &AnalysisConfig,
) -> Result<Dashboard> {
    let key = &req.session;
    let reference_laps = source.laps(key, &req.reference_driver)?;
    let comparison_laps = source.laps(key, &req.comparison_driver)?;

    let reference_lap = select_lap(&reference_laps, req.reference_lap, key, &req.reference_driver)?;
    let comparison_lap = select_lap(&comparison_laps, req.comparison_lap, key, &req.comparison_driver)?;
    if req.reference_driver.eq_ignore_ascii_case(&req.comparison_driver)
        && reference_lap.lap_number == comparison_lap.lap_number
    {
        return Err(AnalysisError::Config("select two different drivers or laps".to_string()));
    }

    let reference_samples = source.telemetry(key, &req.reference_driver, reference_lap.lap_number)?;
    let comparison_samples = source.telemetry(key, &req.comparison_driver, comparison_lap.lap_number)?;

    // names are cosmetic; a session without a roster still compares by code
    let roster = source.drivers(key).unwrap_or_else(|err| {
        tracing::debug!(error = %err, "driver roster unavailable");
        Vec::new()
    });
    let reference_info = driver_info(&roster, &req.reference_driver);
    let comparison_info = driver_info(&roster, &req.comparison_driver);
    let names = DriverNames {
        reference: reference_info.display_name(),
        comparison: comparison_info.display_name(),
    };

    let panel = match compare_laps(req, names, reference_lap, &reference_samples, &comparison_samples, config) {
        Ok(view) => ComparisonPanel::Ready(Box::new(view)),
        Err(err @ (AnalysisError::InsufficientOverlap { .. } | AnalysisError::InsufficientData(_))) => {
            tracing::warn!(error = %err, "laps cannot be compared");
            ComparisonPanel::Unavailable {
                message: format!("Cannot compare these laps: {}", err),
            }
        }
        Err(err) => return Err(err),
    };

    let strategy_title = if key.session.is_race() {
        "Race Strategy Comparison"
    } else {
        "Tyre Usage Overview"
    };

    Ok(Dashboard {
        session: key.to_string(),
        strategy_title: strategy_title.to_string(),
        reference: driver_panel(reference_info, REFERENCE_COLOR, &reference_laps, reference_lap),
        comparison: driver_panel(comparison_info, COMPARISON_COLOR, &comparison_laps, comparison_lap),
        panel,
    })
}

fn fmt_lap_time(t: Option<f64>) -> String {
    t.map_or_else(|| "-".to_string(), format_lap_time)
}

// who a sector or corner delta favours, in the same dead-heat terms as the insights
fn advantage(delta: f64, reference: &str, comparison: &str) -> String {
    match Side::favoured_by(delta) {
        Some(Side::Reference) => format!("{} faster", reference),
        Some(Side::Comparison) => format!("{} faster", comparison),
        None => "level".to_string(),
    }
}

fn write_stints(f: &mut fmt::Formatter<'_>, panel: &DriverPanel) -> fmt::Result {
    writeln!(f, "  {}", panel.name)?;
    for bar in &panel.stints {
        let s = &bar.stint;
        write!(
            f,
            "    {} (Lap {} -> {}) [{} laps] best {} worst {}",
            s.compound,
            s.start_lap,
            s.end_lap,
            s.lap_count,
            fmt_lap_time(s.fastest_lap),
            fmt_lap_time(s.slowest_lap)
        )?;
        if let Some(deg) = s.degradation {
            write!(f, " deg {:+.3}s/lap", deg)?;
        }
        writeln!(f)?;
    }
    Ok(())
}

impl fmt::Display for Dashboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== {} ==", self.session)?;
        for panel in [&self.reference, &self.comparison] {
            writeln!(
                f,
                "{} ({}) lap {} | {} | {}",
                panel.name,
                panel.driver,
                panel.lap_number,
                fmt_lap_time(panel.lap_time),
                panel.compound
            )?;
        }

        writeln!(f, "\n-- {} --", self.strategy_title)?;
        write_stints(f, &self.reference)?;
        write_stints(f, &self.comparison)?;

        match &self.panel {
            ComparisonPanel::Unavailable { message } => {
                writeln!(f, "\n{}", message)?;
            }
            ComparisonPanel::Ready(view) => {
                let faster = |delta: f64| advantage(delta, &self.reference.name, &self.comparison.name);

                writeln!(f, "\n-- Sector-wise delta --")?;
                for s in &view.sectors {
                    writeln!(
                        f,
                        "  {:<9} {:>7.0}-{:<7.0} {:>8} {}",
                        s.label,
                        s.start,
                        s.end,
                        format_gap(s.delta.abs()),
                        faster(s.delta)
                    )?;
                }

                writeln!(f, "\n-- Corner-by-corner delta --")?;
                if view.corners.is_empty() {
                    writeln!(f, "  No significant corners detected.")?;
                }
                for c in &view.corners {
                    let apex = c.window.apex_speed.map_or_else(|| "-".to_string(), |v| format!("{:.0} km/h", v));
                    writeln!(
                        f,
                        "  {:<4} {:>7.1} m  apex {:>9}  {:+.3}s  {}",
                        c.label,
                        c.window.apex_distance,
                        apex,
                        c.delta,
                        faster(c.delta)
                    )?;
                }

                writeln!(f, "\n-- Key insights --")?;
                for line in &view.insights {
                    writeln!(f, "  - {}", line)?;
                }
            }
        }
        Ok(())
    }
}
