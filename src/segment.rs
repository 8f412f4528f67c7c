use serde::Serialize;
use std::cmp::Ordering;

use crate::config::CornerDetection;
use crate::data::TelemetrySample;
use crate::delta::{interp, DeltaSeries};

/// A labelled distance range with the delta gained or lost across it.
/// Positive `delta` means the comparison lap lost time over the range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub label: String,
    pub start: f64,
    pub end: f64,
    pub delta: f64,
}

/// The two cut distances splitting a lap into three sectors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SectorBoundaries {
    pub cuts: [f64; 2],
}

impl SectorBoundaries {
    pub fn thirds(start: f64, end: f64) -> Self {
        let span = end - start;
        Self { cuts: [start + span / 3.0, start + 2.0 * span / 3.0] }
    }

    /// Places the cuts where the lap's elapsed time reaches S1 and S1+S2.
    /// Returns `None` when the sector times are missing or do not fit the trace.
    pub fn from_sector_times(samples: &[TelemetrySample], sector_times: &[Option<f64>; 3]) -> Option<Self> {
        let (s1, s2) = (sector_times[0]?, sector_times[1]?);
        if samples.len() < 2 {
            return None;
        }
        let t0 = samples[0].time;
        let elapsed: Vec<f64> = samples.iter().map(|s| s.time - t0).collect();
        let distance: Vec<f64> = samples.iter().map(|s| s.distance).collect();
        if elapsed.windows(2).any(|w| w[1] < w[0]) {
            return None;
        }
        let lap_time = elapsed[elapsed.len() - 1];
        if s1 + s2 >= lap_time {
            return None;
        }
        Some(Self {
            cuts: [interp(s1, &elapsed, &distance), interp(s1 + s2, &elapsed, &distance)],
        })
    }
}

/// Delta gained per sector. Sector 1 starts at the start of the series and
/// Sector 3 ends at its end, so the three contributions add up to the total.
pub fn sector_contributions(series: &DeltaSeries, boundaries: &SectorBoundaries) -> Vec<Segment> {
    let (start, end) = (series.start(), series.end());
    let mut cuts = boundaries.cuts.map(|c| c.clamp(start, end));
    cuts.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let edges = [start, cuts[0], cuts[1], end];
    edges
        .windows(2)
        .enumerate()
        .map(|(i, w)| Segment {
            label: format!("Sector {}", i + 1),
            start: w[0],
            end: w[1],
            delta: series.delta_at(w[1]) - series.delta_at(w[0]),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CornerWindow {
    pub start: f64,
    pub end: f64,
    pub apex_distance: f64,
    pub apex_speed: Option<f64>,
    pub apex_position: Option<(f64, f64)>,
}

impl CornerWindow {
    /// A window supplied from track data; the apex is taken as its midpoint.
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start,
            end,
            apex_distance: (start + end) / 2.0,
            apex_speed: None,
            apex_position: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Corner {
    pub label: String,
    pub window: CornerWindow,
    pub delta: f64,
}

/// Finds corners as local speed minima well below the lap's top speed and
/// places a fixed-width window around each. Overlapping windows merge.
pub fn detect_corners(samples: &[TelemetrySample], params: &CornerDetection) -> Vec<CornerWindow> {
    let mut points: Vec<(&TelemetrySample, f64)> = samples
        .iter()
        .filter_map(|s| s.speed.map(|v| (s, v)))
        .collect();
    if points.len() < 3 {
        return Vec::new();
    }
    points.sort_by(|a, b| a.0.distance.partial_cmp(&b.0.distance).unwrap_or(Ordering::Equal));

    let top_speed = points.iter().map(|p| p.1).fold(f64::MIN, f64::max);
    let threshold = top_speed * params.min_speed_fraction;
    let lap_start = points[0].0.distance;
    let lap_end = points[points.len() - 1].0.distance;

    let mut windows: Vec<CornerWindow> = Vec::new();
    for (i, &(sample, speed)) in points.iter().enumerate() {
        if speed >= threshold {
            continue;
        }
        let near = |j: &usize| (points[*j].0.distance - sample.distance).abs() <= params.neighbourhood_m;
        // ties go to the first sample of a flat minimum
        if (0..i).rev().take_while(|j| near(j)).any(|j| points[j].1 <= speed) {
            continue;
        }
        if (i + 1..points.len()).take_while(|j| near(j)).any(|j| points[j].1 < speed) {
            continue;
        }

        let window = CornerWindow {
            start: (sample.distance - params.half_width_m).max(lap_start),
            end: (sample.distance + params.half_width_m).min(lap_end),
            apex_distance: sample.distance,
            apex_speed: Some(speed),
            apex_position: sample.position(),
        };
        if let Some(prev) = windows.last_mut().filter(|prev| window.start <= prev.end) {
            prev.end = prev.end.max(window.end);
            if window.apex_speed < prev.apex_speed {
                prev.apex_distance = window.apex_distance;
                prev.apex_speed = window.apex_speed;
                prev.apex_position = window.apex_position;
            }
            continue;
        }
        windows.push(window);
    }

    tracing::debug!(corners = windows.len(), threshold, "detected corners");
    windows
}

/// Delta gained across each corner window, labelled T1..Tn in distance order.
/// Windows outside the compared range are dropped; partial ones are clamped.
pub fn corner_contributions(series: &DeltaSeries, windows: &[CornerWindow]) -> Vec<Corner> {
    let (lo, hi) = (series.start(), series.end());
    let mut ordered: Vec<&CornerWindow> = windows.iter().collect();
    ordered.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(Ordering::Equal));

    ordered
        .into_iter()
        .filter_map(|w| {
            let start = w.start.max(lo);
            let end = w.end.min(hi);
            if end <= start {
                tracing::debug!(start = w.start, end = w.end, "corner window outside compared range");
                return None;
            }
            let mut window = w.clone();
            window.start = start;
            window.end = end;
            Some((window, series.delta_at(end) - series.delta_at(start)))
        })
        .enumerate()
        .map(|(i, (window, delta))| Corner { label: format!("T{}", i + 1), window, delta })
        .collect()
}
