use std::fs;
use std::path::Path;

use lapdelta::dashboard::ComparisonPanel;
use lapdelta::data::{Session, SessionKey};
use lapdelta::source::{CachedSource, CsvSource, TelemetrySource};
use lapdelta::{build_dashboard, AnalysisConfig, AnalysisError, DashboardRequest};

const LAPS: &str = "\
Driver,LapNumber,LapTime,Sector1Time,Sector2Time,Sector3Time,Compound,TyreLife,Stint,PitInTime,PitOutTime
LEC,1.0,84.1,,,,SOFT,1.0,1.0,,
LEC,2.0,0 days 00:01:23.200000,,,,SOFT,2.0,1.0,,
LEC,3.0,97.0,,,,SOFT,3.0,1.0,0 days 00:30:00.000,
LEC,4.0,98.4,,,,,,2.0,,0 days 00:30:25.000
LEC,5.0,0 days 00:01:23.900000,,,,MEDIUM,2.0,2.0,,
LEC,6.0,84.0,,,,MEDIUM,3.0,2.0,,
SAI,1.0,84.4,,,,SOFT,1.0,1.0,,
SAI,2.0,83.6,,,,SOFT,2.0,1.0,,
SAI,3.0,83.8,,,,SOFT,3.0,1.0,,
";

// speed dips to `apex` km/h around 800 m and 2000 m on a 2500 m lap
fn telemetry_csv(step: f64, apex: f64) -> String {
    let speed = |d: f64| {
        [800.0, 2000.0]
            .iter()
            .map(|c| apex + (290.0 - apex) * (1.0 - (-((d - c) / 35.0_f64).powi(2)).exp()))
            .fold(290.0, f64::min)
    };
    let mut out = String::from("Distance,Time,Speed,Throttle,Brake,X,Y\n");
    let mut time = 1800.0;
    let mut prev: Option<(f64, f64)> = None;
    let n = (2500.0 / step) as usize;
    for i in 0..=n {
        let d = i as f64 * step;
        let v = speed(d);
        if let Some((pd, pv)) = prev {
            time += (d - pd) / ((pv + v) / 2.0 / 3.6);
        }
        prev = Some((d, v));
        // every tenth sample lost its GPS fix
        let (x, y) = if i % 10 == 3 { (String::new(), String::new()) } else { (format!("{:.1}", d), "0.0".to_string()) };
        out.push_str(&format!(
            "{:.3},{:.6},{:.3},{},{},{},{}\n",
            d,
            time,
            v,
            if v > 250.0 { 100 } else { 20 },
            if v < 200.0 { "True" } else { "False" },
            x,
            y
        ));
    }
    out
}

fn write_session(root: &Path) -> SessionKey {
    let key = SessionKey::new(2024, "Monaco", Session::Race);
    let dir = root.join("2024").join("Monaco").join("R");
    fs::create_dir_all(dir.join("telemetry")).unwrap();
    fs::write(dir.join("laps.csv"), LAPS).unwrap();
    fs::write(dir.join("drivers.csv"), "Driver,FullName,TeamName\nLEC,Charles Leclerc,Ferrari\n").unwrap();
    fs::write(dir.join("telemetry").join("LEC_2.csv"), telemetry_csv(4.0, 90.0)).unwrap();
    fs::write(dir.join("telemetry").join("SAI_2.csv"), telemetry_csv(6.0, 84.0)).unwrap();
    key
}

fn request(key: SessionKey) -> DashboardRequest {
    DashboardRequest {
        session: key,
        reference_driver: "LEC".to_string(),
        comparison_driver: "sai".to_string(),
        reference_lap: None,
        comparison_lap: None,
        corners: None,
    }
}

#[test]
fn dashboard_from_exported_tables() {
    let dir = tempfile::tempdir().unwrap();
    let key = write_session(dir.path());
    let source = CachedSource::new(CsvSource::new(dir.path()));

    let dash = build_dashboard(&source, &request(key), &AnalysisConfig::default()).unwrap();
    assert_eq!(dash.strategy_title, "Race Strategy Comparison");
    assert_eq!(dash.reference.lap_number, 2);
    assert!((dash.reference.lap_time.unwrap() - 83.2).abs() < 1e-9);
    assert_eq!(dash.comparison.lap_number, 2);
    assert_eq!((dash.reference.name.as_str(), dash.reference.color), ("Charles Leclerc", "#DC0000"));
    assert_eq!(dash.comparison.name, "SAI");

    // the in-lap closes stint 1; the out-lap has no compound and takes the MEDIUM it ran on
    let stints: Vec<(u32, u32, &str)> = dash
        .reference
        .stints
        .iter()
        .map(|b| (b.stint.start_lap, b.stint.end_lap, b.stint.compound.label()))
        .collect();
    assert_eq!(stints, vec![(1, 3, "SOFT"), (4, 6, "MEDIUM")]);
    assert_eq!(dash.reference.stints.iter().map(|b| b.stint.lap_count).sum::<usize>(), 6);
    assert_eq!(dash.reference.stints[0].stint.slowest_lap, Some(84.1));
    assert_eq!(dash.comparison.stints.len(), 1);

    let ComparisonPanel::Ready(view) = &dash.panel else {
        panic!("expected a comparison");
    };
    assert_eq!(view.delta[0].1, 0.0);
    let sector_sum: f64 = view.sectors.iter().map(|s| s.delta).sum();
    assert!((sector_sum - view.findings.total_delta).abs() < 1e-3);
    assert_eq!(view.corners.len(), 2);
    // slower apexes for SAI: the reference gains in both corners
    assert!(view.corners.iter().all(|c| c.delta > 0.0));
    assert!(view.insights[0].starts_with("Charles Leclerc was faster"));
    assert!(view.reference_trace.x.iter().any(|x| x.is_none()));

    assert_eq!(source.cached_entries(), (2, 2));
}

#[test]
fn lists_events_and_drivers_for_selection() {
    let dir = tempfile::tempdir().unwrap();
    let key = write_session(dir.path());
    let source = CachedSource::new(CsvSource::new(dir.path()));

    assert_eq!(source.events(2024).unwrap(), vec!["Monaco"]);
    let labels: Vec<String> = source.drivers(&key).unwrap().iter().map(|d| d.label()).collect();
    assert_eq!(labels, vec!["LEC - Charles Leclerc", "SAI"]);
}

#[test]
fn unknown_event_is_reported_as_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    write_session(dir.path());
    let source = CsvSource::new(dir.path());
    let key = SessionKey::new(2024, "Imola", Session::Race);

    let err = build_dashboard(&source, &request(key.clone()), &AnalysisConfig::default()).unwrap_err();
    assert!(matches!(err, AnalysisError::DataUnavailable { .. }));
    assert!(source.laps(&key, "LEC").is_err());
}

#[test]
fn requested_lap_without_telemetry_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let key = write_session(dir.path());
    let source = CsvSource::new(dir.path());
    let req = DashboardRequest { reference_lap: Some(4), ..request(key) };

    let err = build_dashboard(&source, &req, &AnalysisConfig::default()).unwrap_err();
    assert!(err.to_string().contains("LEC lap 4 telemetry"), "{}", err);
}
