use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::io;
use std::str::FromStr;
use csv::ReaderBuilder;

use crate::error::{AnalysisError, Result};

// renaming all the lap columns exported from the timing client
#[derive(Debug, Deserialize)]
struct RawLapRow {
    #[serde(rename = "Driver")] driver: String,
    #[serde(rename = "LapNumber", default, deserialize_with = "number")] lap_number: Option<f64>,
    #[serde(rename = "LapTime", default, deserialize_with = "duration")] lap_time: Option<f64>,
    #[serde(rename = "Sector1Time", default, deserialize_with = "duration")] sector1: Option<f64>,
    #[serde(rename = "Sector2Time", default, deserialize_with = "duration")] sector2: Option<f64>,
    #[serde(rename = "Sector3Time", default, deserialize_with = "duration")] sector3: Option<f64>,
    #[serde(rename = "Compound")] compound: Option<String>,
    #[serde(rename = "TyreLife", default, deserialize_with = "number")] tyre_life: Option<f64>,
    #[serde(rename = "Stint", default, deserialize_with = "number")] stint: Option<f64>,
    #[serde(rename = "PitInTime")] pit_in_time: Option<String>,
    #[serde(rename = "PitOutTime")] pit_out_time: Option<String>,
}

// same for the per-lap car telemetry
#[derive(Debug, Deserialize)]
struct RawTelemetryRow {
    #[serde(rename = "Distance", default, deserialize_with = "number")] distance: Option<f64>,
    #[serde(rename = "Time", default, deserialize_with = "duration")] time: Option<f64>,
    #[serde(rename = "Speed", default, deserialize_with = "number")] speed: Option<f64>,
    #[serde(rename = "Throttle", default, deserialize_with = "number")] throttle: Option<f64>,
    #[serde(rename = "Brake")] brake: Option<String>,
    #[serde(rename = "X", default, deserialize_with = "number")] x: Option<f64>,
    #[serde(rename = "Y", default, deserialize_with = "number")] y: Option<f64>,
}

// session roster, one row per driver
#[derive(Debug, Deserialize)]
struct RawDriverRow {
    #[serde(rename = "Driver")] driver: String,
    #[serde(rename = "FullName")] full_name: Option<String>,
    #[serde(rename = "TeamName")] team: Option<String>,
}

fn missing(raw: &str) -> bool {
    let s = raw.trim();
    s.is_empty() || s.eq_ignore_ascii_case("nan") || s.eq_ignore_ascii_case("nat")
}

/// Parses plain seconds (`91.5`) or an exported timedelta
/// (`0 days 00:01:31.500000`, `00:01:31.5`).
pub fn parse_seconds(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if let Ok(v) = s.parse::<f64>() {
        return Some(v);
    }
    let (days, clock) = match s.split_once("day") {
        Some((days, rest)) => (days.trim().parse::<f64>().ok()?, rest.trim_start_matches('s').trim()),
        None => (0.0, s),
    };
    let mut parts = clock.split(':');
    let (h, m, sec) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let field = |v: &str| v.trim().parse::<f64>().ok();
    Some(days * 86_400.0 + field(h)? * 3600.0 + field(m)? * 60.0 + field(sec)?)
}

fn lenient<'de, D, F>(de: D, parse: F) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
    F: Fn(&str) -> Option<f64>,
{
    let raw: Option<String> = Option::deserialize(de)?;
    let Some(raw) = raw.filter(|r| !missing(r)) else {
        return Ok(None);
    };
    let value = parse(&raw);
    if value.is_none() {
        tracing::debug!(cell = %raw, "unreadable cell treated as missing");
    }
    Ok(value)
}

fn number<'de, D: Deserializer<'de>>(de: D) -> std::result::Result<Option<f64>, D::Error> {
    lenient(de, |s| s.trim().parse::<f64>().ok())
}

fn duration<'de, D: Deserializer<'de>>(de: D) -> std::result::Result<Option<f64>, D::Error> {
    lenient(de, parse_seconds)
}

/// Tyre compound as reported by the timing feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Compound {
    Soft,
    Medium,
    Hard,
    Intermediate,
    Wet,
    Unknown,
}

impl Compound {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "SOFT" => Compound::Soft,
            "MEDIUM" => Compound::Medium,
            "HARD" => Compound::Hard,
            "INTERMEDIATE" => Compound::Intermediate,
            "WET" => Compound::Wet,
            _ => Compound::Unknown,
        }
    }

    pub fn is_known(self) -> bool {
        self != Compound::Unknown
    }

    pub fn label(self) -> &'static str {
        match self {
            Compound::Soft => "SOFT",
            Compound::Medium => "MEDIUM",
            Compound::Hard => "HARD",
            Compound::Intermediate => "INTERMEDIATE",
            Compound::Wet => "WET",
            Compound::Unknown => "UNKNOWN",
        }
    }

    /// Broadcast colour used on the stint timeline.
    pub fn color(self) -> &'static str {
        match self {
            Compound::Soft => "#FF3333",
            Compound::Medium => "#FFD700",
            Compound::Hard => "#FFFFFF",
            Compound::Intermediate => "#00FF00",
            Compound::Wet => "#0066FF",
            Compound::Unknown => "#888888",
        }
    }
}

impl fmt::Display for Compound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Session {
    Practice1,
    Practice2,
    Practice3,
    SprintQualifying,
    Sprint,
    Qualifying,
    Race,
}

impl Session {
    /// Short code used by the timing client and in the data directory layout.
    pub fn code(self) -> &'static str {
        match self {
            Session::Practice1 => "FP1",
            Session::Practice2 => "FP2",
            Session::Practice3 => "FP3",
            Session::SprintQualifying => "SQ",
            Session::Sprint => "S",
            Session::Qualifying => "Q",
            Session::Race => "R",
        }
    }

    pub fn is_race(self) -> bool {
        matches!(self, Session::Race | Session::Sprint)
    }
}

impl FromStr for Session {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        let session = match s.trim().to_uppercase().replace([' ', '_'], "").as_str() {
            "FP1" | "PRACTICE1" => Session::Practice1,
            "FP2" | "PRACTICE2" => Session::Practice2,
            "FP3" | "PRACTICE3" => Session::Practice3,
            "SQ" | "SS" | "SPRINTQUALIFYING" | "SPRINTSHOOTOUT" => Session::SprintQualifying,
            "S" | "SPRINT" => Session::Sprint,
            "Q" | "QUALIFYING" => Session::Qualifying,
            "R" | "RACE" => Session::Race,
            other => return Err(AnalysisError::Config(format!("unknown session '{}'", other))),
        };
        Ok(session)
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Session::Practice1 => "Practice 1",
            Session::Practice2 => "Practice 2",
            Session::Practice3 => "Practice 3",
            Session::SprintQualifying => "Sprint Qualifying",
            Session::Sprint => "Sprint",
            Session::Qualifying => "Qualifying",
            Session::Race => "Race",
        };
        f.write_str(name)
    }
}

/// Identifies one session of one event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub year: u16,
    pub event: String,
    pub session: Session,
}

impl SessionKey {
    pub fn new(year: u16, event: impl Into<String>, session: Session) -> Self {
        Self { year, event: event.into(), session }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.year, self.event, self.session)
    }
}

// one timed lap, anything the feed can leave blank is an Option
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lap {
    pub driver: String,
    pub lap_number: u32,
    pub lap_time: Option<f64>,
    pub sector_times: [Option<f64>; 3],
    pub compound: Compound,
    pub tyre_life: Option<u32>,
    pub stint: Option<u32>,
    pub is_pit_in_lap: bool,
    pub is_pit_out_lap: bool,
}

impl Lap {
    /// Laps that enter or leave the pit lane carry unreliable timing and tyre data.
    pub fn is_in_or_out_lap(&self) -> bool {
        self.is_pit_in_lap || self.is_pit_out_lap
    }

    pub fn is_clean(&self) -> bool {
        !self.is_in_or_out_lap() && self.lap_time.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySample {
    /// Distance along the lap in meters.
    pub distance: f64,
    /// Session time in seconds.
    pub time: f64,
    /// km/h
    pub speed: Option<f64>,
    /// 0-100 %
    pub throttle: Option<f64>,
    pub brake: Option<bool>,
    pub x: Option<f64>,
    pub y: Option<f64>,
}

impl TelemetrySample {
    pub fn position(&self) -> Option<(f64, f64)> {
        Some((self.x?, self.y?))
    }
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

fn non_negative_count(value: Option<f64>) -> Option<u32> {
    value.filter(|v| v.is_finite() && *v >= 0.0).map(|v| v.round() as u32)
}

fn parse_brake(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "1.0" => Some(true),
        "false" | "0" | "0.0" => Some(false),
        _ => None,
    }
}

fn present(raw: &Option<String>) -> bool {
    raw.as_deref().map_or(false, |s| !missing(s))
}

/// Reads a session lap table. Rows without a driver or a lap number are skipped.
pub fn read_laps<R: io::Read>(reader: R) -> Result<Vec<Lap>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let mut laps = Vec::new();
    let mut skipped = 0usize;

    for res in reader.deserialize() {
        let raw: RawLapRow = res?;
        let lap_number = match raw.lap_number {
            Some(n) if n >= 1.0 && !raw.driver.trim().is_empty() => n.round() as u32,
            _ => {
                skipped += 1;
                continue;
            }
        };
        laps.push(Lap {
            driver: raw.driver.trim().to_uppercase(),
            lap_number,
            lap_time: positive(raw.lap_time),
            sector_times: [positive(raw.sector1), positive(raw.sector2), positive(raw.sector3)],
            compound: raw.compound.as_deref().map_or(Compound::Unknown, Compound::parse),
            tyre_life: non_negative_count(raw.tyre_life),
            stint: non_negative_count(raw.stint),
            is_pit_in_lap: present(&raw.pit_in_time),
            is_pit_out_lap: present(&raw.pit_out_time),
        });
    }

    if skipped > 0 {
        tracing::debug!(skipped, "dropped lap rows without driver or lap number");
    }
    Ok(laps)
}

/// Reads one lap of car telemetry, ordered by distance. Rows missing distance
/// or time cannot be placed on the lap and are dropped; every other gap stays
/// `None`.
pub fn read_telemetry<R: io::Read>(reader: R) -> Result<Vec<TelemetrySample>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let mut samples = Vec::new();
    let mut skipped = 0usize;

    for res in reader.deserialize() {
        let raw: RawTelemetryRow = res?;
        let (distance, time) = match (raw.distance, raw.time) {
            (Some(d), Some(t)) if d.is_finite() && t.is_finite() => (d, t),
            _ => {
                skipped += 1;
                continue;
            }
        };
        samples.push(TelemetrySample {
            distance,
            time,
            speed: raw.speed.filter(|v| v.is_finite()),
            throttle: raw.throttle.filter(|v| v.is_finite()),
            brake: raw.brake.as_deref().and_then(parse_brake),
            x: raw.x.filter(|v| v.is_finite()),
            y: raw.y.filter(|v| v.is_finite()),
        });
    }

    if skipped > 0 {
        tracing::debug!(skipped, "dropped telemetry rows without distance or time");
    }
    samples.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));
    Ok(samples)
}

/// Trace colour for a constructor, as shown on broadcast graphics.
pub fn team_color(team: &str) -> Option<&'static str> {
    let color = match team.trim() {
        "Red Bull Racing" => "#1E41FF",
        "Ferrari" => "#DC0000",
        "Mercedes" => "#00D2BE",
        "McLaren" => "#FF8700",
        "Aston Martin" => "#006F62",
        "Alpine" => "#0090FF",
        "Williams" => "#005AFF",
        "AlphaTauri" => "#2B4562",
        "Alfa Romeo" => "#900000",
        "Haas F1 Team" => "#B6BABD",
        _ => return None,
    };
    Some(color)
}

/// Who a driver code belongs to. Name and team are absent when the session
/// export carries no roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriverInfo {
    pub code: String,
    pub full_name: Option<String>,
    pub team: Option<String>,
}

impl DriverInfo {
    pub fn bare(code: &str) -> Self {
        Self { code: code.trim().to_uppercase(), full_name: None, team: None }
    }

    /// Full name when known, otherwise the three-letter code.
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.code)
    }

    pub fn color(&self) -> Option<&'static str> {
        self.team.as_deref().and_then(team_color)
    }

    /// Selector label, e.g. `LEC - Charles Leclerc`.
    pub fn label(&self) -> String {
        match &self.full_name {
            Some(name) => format!("{} - {}", self.code, name),
            None => self.code.clone(),
        }
    }
}

pub fn read_drivers<R: io::Read>(reader: R) -> Result<Vec<DriverInfo>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let mut drivers = Vec::new();
    for res in reader.deserialize() {
        let raw: RawDriverRow = res?;
        if raw.driver.trim().is_empty() {
            continue;
        }
        let text = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !missing(s));
        drivers.push(DriverInfo {
            code: raw.driver.trim().to_uppercase(),
            full_name: text(raw.full_name),
            team: text(raw.team),
        });
    }
    Ok(drivers)
}

/// Formats seconds as `m:ss.mmm`.
pub fn format_lap_time(seconds: f64) -> String {
    let millis = (seconds * 1000.0).round() as u64;
    let minutes = millis / 60_000;
    let rest = millis % 60_000;
    format!("{}:{:02}.{:03}", minutes, rest / 1000, rest % 1000)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LapTag {
    Fastest,
    Slowest,
}

/// One selectable lap for a driver.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LapOption {
    pub lap_number: u32,
    pub tag: Option<LapTag>,
    pub label: String,
}

fn by_lap_time(a: &&Lap, b: &&Lap) -> Ordering {
    a.lap_time
        .partial_cmp(&b.lap_time)
        .unwrap_or(Ordering::Equal)
        .then(a.lap_number.cmp(&b.lap_number))
}

/// Clean laps ordered fastest first, with the fastest and slowest tagged.
pub fn lap_options(laps: &[Lap]) -> Vec<LapOption> {
    let mut clean: Vec<&Lap> = laps.iter().filter(|l| l.is_clean()).collect();
    clean.sort_by(by_lap_time);
    let last = clean.len().saturating_sub(1);

    clean
        .iter()
        .enumerate()
        .map(|(i, lap)| {
            let tag = if i == 0 {
                Some(LapTag::Fastest)
            } else if i == last {
                Some(LapTag::Slowest)
            } else {
                None
            };
            let time = lap.lap_time.map_or_else(|| "-".to_string(), format_lap_time);
            let mut label = format!("Lap {} | {} | {}", lap.lap_number, time, lap.compound);
            match tag {
                Some(LapTag::Fastest) => label = format!("Fastest - {}", label),
                Some(LapTag::Slowest) => label = format!("Slowest - {}", label),
                None => {}
            }
            LapOption { lap_number: lap.lap_number, tag, label }
        })
        .collect()
}

/// The default lap to compare: the driver's fastest clean lap.
pub fn fastest_lap(laps: &[Lap]) -> Option<&Lap> {
    laps.iter().filter(|l| l.is_clean()).min_by(by_lap_time)
}
