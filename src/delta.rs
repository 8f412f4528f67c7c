use ndarray::Array1;
use std::cmp::Ordering;

use crate::config::{AnalysisConfig, DeltaMethod};
use crate::data::TelemetrySample;
use crate::error::{AnalysisError, Result};

const KPH_TO_MPS: f64 = 1.0 / 3.6;

/// Running time difference between two laps along a shared distance grid.
/// `delta = comparison_time(d) - reference_time(d)`: positive means the
/// comparison lap is behind at `d`.
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaSeries {
    distance: Array1<f64>,
    delta: Array1<f64>,
}

impl DeltaSeries {
    pub fn distance(&self) -> &Array1<f64> {
        &self.distance
    }

    pub fn delta(&self) -> &Array1<f64> {
        &self.delta
    }

    pub fn len(&self) -> usize {
        self.distance.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distance.is_empty()
    }

    pub fn start(&self) -> f64 {
        self.distance[0]
    }

    pub fn end(&self) -> f64 {
        self.distance[self.len() - 1]
    }

    /// Delta at the end of the compared range.
    pub fn total(&self) -> f64 {
        self.delta[self.len() - 1]
    }

    /// Delta at an arbitrary distance, clamped to the grid.
    pub fn delta_at(&self, distance: f64) -> f64 {
        interp(
            distance,
            self.distance.as_slice().unwrap_or_default(),
            self.delta.as_slice().unwrap_or_default(),
        )
    }

    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.distance.iter().copied().zip(self.delta.iter().copied())
    }
}

/// Linear interpolation over non-decreasing `xs`, clamped at both ends.
pub fn interp(x: f64, xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n == 0 {
        return f64::NAN;
    }
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[n - 1] {
        return ys[n - 1];
    }
    let i = xs[..n].partition_point(|&v| v <= x);
    let (x0, x1) = (xs[i - 1], xs[i]);
    if x1 == x0 {
        return ys[i];
    }
    ys[i - 1] + (ys[i] - ys[i - 1]) * (x - x0) / (x1 - x0)
}

// samples without speed or throttle are left out of the interpolation
fn usable(samples: &[TelemetrySample], which: &str) -> Result<Vec<TelemetrySample>> {
    let mut kept: Vec<TelemetrySample> = samples
        .iter()
        .filter(|s| s.speed.is_some() && s.throttle.is_some())
        .cloned()
        .collect();
    let dropped = samples.len() - kept.len();
    if dropped > 0 {
        tracing::debug!(lap = which, dropped, "excluding samples with missing speed or throttle");
    }
    if kept.len() < 2 {
        return Err(AnalysisError::InsufficientData(format!(
            "{} lap has {} usable telemetry samples, need at least 2",
            which,
            kept.len()
        )));
    }
    kept.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));
    Ok(kept)
}

fn range(samples: &[TelemetrySample]) -> (f64, f64) {
    (samples[0].distance, samples[samples.len() - 1].distance)
}

/// Elapsed time at each grid point, measured from the first grid point.
fn elapsed_on_grid(samples: &[TelemetrySample], grid: &Array1<f64>, method: DeltaMethod) -> Array1<f64> {
    let xs: Vec<f64> = samples.iter().map(|s| s.distance).collect();
    match method {
        DeltaMethod::Timestamp => {
            let ts: Vec<f64> = samples.iter().map(|s| s.time).collect();
            let t0 = interp(grid[0], &xs, &ts);
            grid.mapv(|d| interp(d, &xs, &ts) - t0)
        }
        DeltaMethod::SpeedIntegration => {
            let vs: Vec<f64> = samples.iter().map(|s| s.speed.unwrap_or(0.0)).collect();
            let speed = grid.mapv(|d| interp(d, &xs, &vs) * KPH_TO_MPS);
            let mut elapsed = Array1::zeros(grid.len());
            for i in 1..grid.len() {
                let step = grid[i] - grid[i - 1];
                let moving: Vec<f64> = [speed[i - 1], speed[i]].into_iter().filter(|v| *v > 0.0).collect();
                elapsed[i] = elapsed[i - 1];
                if !moving.is_empty() {
                    let v = moving.iter().sum::<f64>() / moving.len() as f64;
                    elapsed[i] += step / v;
                }
            }
            elapsed
        }
    }
}

/// Resamples both laps onto `grid_points` evenly spaced distances spanning
/// their overlap and returns the running delta of `comparison` against `reference`.
pub fn compute_delta(
    reference: &[TelemetrySample],
    comparison: &[TelemetrySample],
    config: &AnalysisConfig,
) -> Result<DeltaSeries> {
    if config.grid_points < 2 {
        return Err(AnalysisError::Config(format!(
            "grid_points must be at least 2, got {}",
            config.grid_points
        )));
    }
    let reference = usable(reference, "reference")?;
    let comparison = usable(comparison, "comparison")?;

    let (ref_start, ref_end) = range(&reference);
    let (cmp_start, cmp_end) = range(&comparison);
    let start = ref_start.max(cmp_start);
    let end = ref_end.min(cmp_end);
    if !(end > start) {
        return Err(AnalysisError::InsufficientOverlap {
            reference: (ref_start, ref_end),
            comparison: (cmp_start, cmp_end),
        });
    }

    let grid = Array1::linspace(start, end, config.grid_points);
    let t_ref = elapsed_on_grid(&reference, &grid, config.delta_method);
    let t_cmp = elapsed_on_grid(&comparison, &grid, config.delta_method);
    let delta = &t_cmp - &t_ref;

    tracing::debug!(
        start,
        end,
        points = grid.len(),
        total = delta[delta.len() - 1],
        "computed delta series"
    );
    Ok(DeltaSeries { distance: grid, delta })
}
