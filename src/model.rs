use crate::data::Lap;
use linfa::prelude::*;
use linfa_linear::LinearRegression;
use ndarray::{Array1, Array2};

// fewer clean laps than this and the trend is mostly noise
const MIN_LAPS: usize = 5;

/// Lap-time loss per lap of tyre age (s/lap), fitted by least squares over
/// the clean laps given. `None` when there are too few laps or the tyre age
/// never changes.
pub fn degradation_per_lap(laps: &[&Lap]) -> Option<f64> {
    let points: Vec<(f64, f64)> = laps
        .iter()
        .filter(|l| l.is_clean())
        .filter_map(|l| Some((l.tyre_life? as f64, l.lap_time?)))
        .collect();
    if points.len() < MIN_LAPS {
        return None;
    }
    let first_age = points[0].0;
    if points.iter().all(|p| p.0 == first_age) {
        return None;
    }

    let x = Array2::from_shape_vec((points.len(), 1), points.iter().map(|p| p.0).collect()).ok()?;
    let y = Array1::from_vec(points.iter().map(|p| p.1).collect());
    let ds = Dataset::new(x, y);

    let fitted = LinearRegression::new().fit(&ds).ok()?;
    let slope = fitted.params()[0];
    slope.is_finite().then_some(slope)
}
