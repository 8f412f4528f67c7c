//! Loader boundary: where lap tables and car telemetry come from.
//!
//! The live timing client is external; `CsvSource` reads tables it exported
//! into a directory tree, `MemorySource` holds tables built in code, and
//! `CachedSource` puts a read-through cache in front of either.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::data::{read_drivers, read_laps, read_telemetry, DriverInfo, Lap, SessionKey, TelemetrySample};
use crate::error::{AnalysisError, Result};

pub trait TelemetrySource {
    /// All laps of one driver in a session, ordered by lap number.
    fn laps(&self, key: &SessionKey, driver: &str) -> Result<Vec<Lap>>;

    /// Car telemetry for one lap, ordered by distance.
    fn telemetry(&self, key: &SessionKey, driver: &str, lap: u32) -> Result<Vec<TelemetrySample>>;

    /// Event names with data for a season, sorted.
    fn events(&self, year: u16) -> Result<Vec<String>>;

    /// Everyone who set a lap in the session, sorted by code.
    fn drivers(&self, key: &SessionKey) -> Result<Vec<DriverInfo>>;
}

// roster entries win over bare codes seen in the lap table
fn merge_roster(codes: BTreeSet<String>, roster: Vec<DriverInfo>) -> Vec<DriverInfo> {
    let mut by_code: BTreeMap<String, DriverInfo> =
        codes.into_iter().map(|code| (code.clone(), DriverInfo::bare(&code))).collect();
    for info in roster {
        if let Some(slot) = by_code.get_mut(&info.code) {
            *slot = info;
        }
    }
    by_code.into_values().collect()
}

fn normalize_driver(driver: &str) -> String {
    driver.trim().to_uppercase()
}

/// Reads `<root>/<year>/<event>/<session>/laps.csv` and
/// `<root>/<year>/<event>/<session>/telemetry/<DRIVER>_<lap>.csv`.
pub struct CsvSource {
    root: PathBuf,
}

impl CsvSource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    fn session_dir(&self, key: &SessionKey) -> PathBuf {
        self.root
            .join(key.year.to_string())
            .join(&key.event)
            .join(key.session.code())
    }

    pub fn laps_path(&self, key: &SessionKey) -> PathBuf {
        self.session_dir(key).join("laps.csv")
    }

    /// Optional `Driver, FullName, TeamName` roster next to the lap table.
    pub fn drivers_path(&self, key: &SessionKey) -> PathBuf {
        self.session_dir(key).join("drivers.csv")
    }

    pub fn telemetry_path(&self, key: &SessionKey, driver: &str, lap: u32) -> PathBuf {
        self.session_dir(key)
            .join("telemetry")
            .join(format!("{}_{}.csv", normalize_driver(driver), lap))
    }
}

impl TelemetrySource for CsvSource {
    fn laps(&self, key: &SessionKey, driver: &str) -> Result<Vec<Lap>> {
        let path = self.laps_path(key);
        if !path.is_file() {
            return Err(AnalysisError::unavailable(format!("{} (missing {})", key, path.display())));
        }
        tracing::info!(path = %path.display(), "loading lap table");

        let driver = normalize_driver(driver);
        let mut laps: Vec<Lap> = read_laps(File::open(&path)?)?
            .into_iter()
            .filter(|l| l.driver == driver)
            .collect();
        if laps.is_empty() {
            return Err(AnalysisError::unavailable(format!("{} driver {}", key, driver)));
        }
        laps.sort_by_key(|l| l.lap_number);
        Ok(laps)
    }

    fn telemetry(&self, key: &SessionKey, driver: &str, lap: u32) -> Result<Vec<TelemetrySample>> {
        let path = self.telemetry_path(key, driver, lap);
        if !path.is_file() {
            return Err(AnalysisError::unavailable(format!(
                "{} driver {} lap {} telemetry",
                key,
                normalize_driver(driver),
                lap
            )));
        }
        tracing::info!(path = %path.display(), "loading lap telemetry");

        let samples = read_telemetry(File::open(&path)?)?;
        if samples.is_empty() {
            return Err(AnalysisError::unavailable(format!(
                "{} driver {} lap {} telemetry (empty)",
                key,
                normalize_driver(driver),
                lap
            )));
        }
        Ok(samples)
    }

    fn events(&self, year: u16) -> Result<Vec<String>> {
        let dir = self.root.join(year.to_string());
        if !dir.is_dir() {
            return Err(AnalysisError::unavailable(format!("season {}", year)));
        }
        let mut events = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                events.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        events.sort();
        Ok(events)
    }

    fn drivers(&self, key: &SessionKey) -> Result<Vec<DriverInfo>> {
        let path = self.laps_path(key);
        if !path.is_file() {
            return Err(AnalysisError::unavailable(format!("{} (missing {})", key, path.display())));
        }
        let codes: BTreeSet<String> = read_laps(File::open(&path)?)?.into_iter().map(|l| l.driver).collect();

        let roster_path = self.drivers_path(key);
        let roster = if roster_path.is_file() {
            read_drivers(File::open(&roster_path)?)?
        } else {
            tracing::debug!(path = %roster_path.display(), "no driver roster, using codes only");
            Vec::new()
        };
        Ok(merge_roster(codes, roster))
    }
}

/// Tables assembled in memory, keyed like the CSV layout.
#[derive(Default)]
pub struct MemorySource {
    laps: HashMap<(SessionKey, String), Vec<Lap>>,
    telemetry: HashMap<(SessionKey, String, u32), Vec<TelemetrySample>>,
    roster: HashMap<SessionKey, Vec<DriverInfo>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_laps(&mut self, key: &SessionKey, driver: &str, mut laps: Vec<Lap>) {
        laps.sort_by_key(|l| l.lap_number);
        self.laps.insert((key.clone(), normalize_driver(driver)), laps);
    }

    pub fn insert_telemetry(&mut self, key: &SessionKey, driver: &str, lap: u32, mut samples: Vec<TelemetrySample>) {
        samples.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));
        self.telemetry.insert((key.clone(), normalize_driver(driver), lap), samples);
    }

    pub fn insert_driver(&mut self, key: &SessionKey, info: DriverInfo) {
        self.roster.entry(key.clone()).or_default().push(info);
    }
}

impl TelemetrySource for MemorySource {
    fn laps(&self, key: &SessionKey, driver: &str) -> Result<Vec<Lap>> {
        let driver = normalize_driver(driver);
        self.laps
            .get(&(key.clone(), driver.clone()))
            .filter(|laps| !laps.is_empty())
            .cloned()
            .ok_or_else(|| AnalysisError::unavailable(format!("{} driver {}", key, driver)))
    }

    fn telemetry(&self, key: &SessionKey, driver: &str, lap: u32) -> Result<Vec<TelemetrySample>> {
        let driver = normalize_driver(driver);
        self.telemetry
            .get(&(key.clone(), driver.clone(), lap))
            .filter(|samples| !samples.is_empty())
            .cloned()
            .ok_or_else(|| AnalysisError::unavailable(format!("{} driver {} lap {} telemetry", key, driver, lap)))
    }

    fn events(&self, year: u16) -> Result<Vec<String>> {
        let events: BTreeSet<String> = self
            .laps
            .keys()
            .filter(|(key, _)| key.year == year)
            .map(|(key, _)| key.event.clone())
            .collect();
        if events.is_empty() {
            return Err(AnalysisError::unavailable(format!("season {}", year)));
        }
        Ok(events.into_iter().collect())
    }

    fn drivers(&self, key: &SessionKey) -> Result<Vec<DriverInfo>> {
        let codes: BTreeSet<String> = self
            .laps
            .iter()
            .filter(|((k, _), laps)| k == key && !laps.is_empty())
            .map(|((_, driver), _)| driver.clone())
            .collect();
        if codes.is_empty() {
            return Err(AnalysisError::unavailable(key.to_string()));
        }
        Ok(merge_roster(codes, self.roster.get(key).cloned().unwrap_or_default()))
    }
}

// past sessions never change, so entries are kept for the life of the process
pub struct CachedSource<S> {
    inner: S,
    laps: RefCell<HashMap<(SessionKey, String), Vec<Lap>>>,
    telemetry: RefCell<HashMap<(SessionKey, String, u32), Vec<TelemetrySample>>>,
}

impl<S: TelemetrySource> CachedSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            laps: RefCell::new(HashMap::new()),
            telemetry: RefCell::new(HashMap::new()),
        }
    }

    /// Number of cached (lap tables, telemetry traces).
    pub fn cached_entries(&self) -> (usize, usize) {
        (self.laps.borrow().len(), self.telemetry.borrow().len())
    }
}

impl<S: TelemetrySource> TelemetrySource for CachedSource<S> {
    fn laps(&self, key: &SessionKey, driver: &str) -> Result<Vec<Lap>> {
        let cache_key = (key.clone(), normalize_driver(driver));
        if let Some(laps) = self.laps.borrow().get(&cache_key) {
            tracing::debug!(session = %key, driver = %cache_key.1, "lap cache hit");
            return Ok(laps.clone());
        }
        let laps = self.inner.laps(key, driver)?;
        self.laps.borrow_mut().insert(cache_key, laps.clone());
        Ok(laps)
    }

    fn telemetry(&self, key: &SessionKey, driver: &str, lap: u32) -> Result<Vec<TelemetrySample>> {
        let cache_key = (key.clone(), normalize_driver(driver), lap);
        if let Some(samples) = self.telemetry.borrow().get(&cache_key) {
            tracing::debug!(session = %key, driver = %cache_key.1, lap, "telemetry cache hit");
            return Ok(samples.clone());
        }
        let samples = self.inner.telemetry(key, driver, lap)?;
        self.telemetry.borrow_mut().insert(cache_key, samples.clone());
        Ok(samples)
    }

    fn events(&self, year: u16) -> Result<Vec<String>> {
        self.inner.events(year)
    }

    fn drivers(&self, key: &SessionKey) -> Result<Vec<DriverInfo>> {
        self.inner.drivers(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Compound, Session};
    use std::cell::Cell;

    fn key() -> SessionKey {
        SessionKey::new(2024, "Monza", Session::Qualifying)
    }

    fn lap(n: u32) -> Lap {
        Lap {
            driver: "LEC".to_string(),
            lap_number: n,
            lap_time: Some(80.0 + n as f64),
            sector_times: [None; 3],
            compound: Compound::Soft,
            tyre_life: Some(n),
            stint: Some(1),
            is_pit_in_lap: false,
            is_pit_out_lap: false,
        }
    }

    struct CountingSource {
        inner: MemorySource,
        calls: Cell<usize>,
    }

    impl TelemetrySource for CountingSource {
        fn laps(&self, key: &SessionKey, driver: &str) -> Result<Vec<Lap>> {
            self.calls.set(self.calls.get() + 1);
            self.inner.laps(key, driver)
        }

        fn telemetry(&self, key: &SessionKey, driver: &str, lap: u32) -> Result<Vec<TelemetrySample>> {
            self.calls.set(self.calls.get() + 1);
            self.inner.telemetry(key, driver, lap)
        }

        fn events(&self, year: u16) -> Result<Vec<String>> {
            self.inner.events(year)
        }

        fn drivers(&self, key: &SessionKey) -> Result<Vec<DriverInfo>> {
            self.inner.drivers(key)
        }
    }

    #[test]
    fn memory_source_sorts_and_normalizes() {
        let mut source = MemorySource::new();
        source.insert_laps(&key(), "lec", vec![lap(3), lap(1), lap(2)]);
        let laps = source.laps(&key(), "LEC").unwrap();
        assert_eq!(laps.iter().map(|l| l.lap_number).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(matches!(source.laps(&key(), "SAI"), Err(AnalysisError::DataUnavailable { .. })));
    }

    #[test]
    fn cache_reads_through_once() {
        let mut inner = MemorySource::new();
        inner.insert_laps(&key(), "LEC", vec![lap(1)]);
        let cached = CachedSource::new(CountingSource { inner, calls: Cell::new(0) });

        cached.laps(&key(), "LEC").unwrap();
        cached.laps(&key(), "lec").unwrap();
        assert_eq!(cached.inner.calls.get(), 1);
        assert_eq!(cached.cached_entries(), (1, 0));
    }

    #[test]
    fn cache_does_not_remember_failures() {
        let cached = CachedSource::new(CountingSource { inner: MemorySource::new(), calls: Cell::new(0) });
        assert!(cached.telemetry(&key(), "LEC", 1).is_err());
        assert!(cached.telemetry(&key(), "LEC", 1).is_err());
        assert_eq!(cached.inner.calls.get(), 2);
        assert_eq!(cached.cached_entries(), (0, 0));
    }

    #[test]
    fn memory_source_lists_events_and_drivers() {
        let mut source = MemorySource::new();
        source.insert_laps(&key(), "lec", vec![lap(1)]);
        source.insert_laps(&key(), "SAI", vec![lap(1)]);
        source.insert_laps(&SessionKey::new(2024, "Bahrain", Session::Race), "LEC", vec![lap(1)]);
        source.insert_laps(&SessionKey::new(2023, "Monaco", Session::Race), "LEC", vec![lap(1)]);
        source.insert_driver(
            &key(),
            DriverInfo {
                code: "LEC".to_string(),
                full_name: Some("Charles Leclerc".to_string()),
                team: Some("Ferrari".to_string()),
            },
        );

        assert_eq!(source.events(2024).unwrap(), vec!["Bahrain", "Monza"]);
        assert!(matches!(source.events(2019), Err(AnalysisError::DataUnavailable { .. })));
        let drivers = source.drivers(&key()).unwrap();
        assert_eq!(drivers.iter().map(|d| d.label()).collect::<Vec<_>>(), vec!["LEC - Charles Leclerc", "SAI"]);
    }

    #[test]
    fn memory_source_orders_telemetry_by_distance() {
        let sample = |distance: f64| TelemetrySample {
            distance,
            time: distance / 80.0,
            speed: Some(288.0),
            throttle: Some(100.0),
            brake: Some(false),
            x: None,
            y: None,
        };
        let mut source = MemorySource::new();
        source.insert_telemetry(&key(), "LEC", 1, vec![sample(20.0), sample(0.0), sample(10.0)]);
        let samples = source.telemetry(&key(), "LEC", 1).unwrap();
        assert_eq!(samples.iter().map(|s| s.distance).collect::<Vec<_>>(), vec![0.0, 10.0, 20.0]);
    }

    #[test]
    fn csv_source_lists_events_and_roster() {
        let dir = tempfile::tempdir().unwrap();
        let source = CsvSource::new(dir.path());
        let session = source.laps_path(&key()).parent().unwrap().to_path_buf();
        fs::create_dir_all(&session).unwrap();
        fs::create_dir_all(dir.path().join("2024").join("Imola")).unwrap();
        fs::write(
            source.laps_path(&key()),
            "Driver,LapNumber,LapTime,Sector1Time,Sector2Time,Sector3Time,Compound,TyreLife,Stint,PitInTime,PitOutTime\n\
             SAI,1.0,81.0,,,,SOFT,1.0,1.0,,\n\
             LEC,1.0,80.9,,,,SOFT,1.0,1.0,,\n",
        )
        .unwrap();

        assert_eq!(source.events(2024).unwrap(), vec!["Imola", "Monza"]);
        assert!(source.events(2018).is_err());
        assert_eq!(
            source.drivers(&key()).unwrap(),
            vec![DriverInfo::bare("LEC"), DriverInfo::bare("SAI")]
        );

        fs::write(source.drivers_path(&key()), "Driver,FullName,TeamName\nSAI,Carlos Sainz,Ferrari\n").unwrap();
        let drivers = source.drivers(&key()).unwrap();
        assert_eq!(drivers[0].full_name, None);
        assert_eq!(drivers[1].display_name(), "Carlos Sainz");
        assert_eq!(drivers[1].color(), Some("#DC0000"));
    }

    #[test]
    fn csv_source_reports_missing_session() {
        let dir = tempfile::tempdir().unwrap();
        let source = CsvSource::new(dir.path());
        assert!(matches!(source.laps(&key(), "LEC"), Err(AnalysisError::DataUnavailable { .. })));
        assert!(source
            .telemetry_path(&key(), "lec", 7)
            .ends_with("2024/Monza/Q/telemetry/LEC_7.csv"));
    }
}
