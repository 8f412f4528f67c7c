//! Numeric findings drawn from a lap comparison. Turning them into prose
//! lives in [`text`] so each half can be checked on its own.

pub mod text;

use serde::Serialize;

use crate::segment::{Corner, Segment};

/// Gaps smaller than this print as 0.000s and are treated as level.
pub const DEAD_HEAT: f64 = 0.0005;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Side {
    Reference,
    Comparison,
}

impl Side {
    /// The side a positive-means-comparison-lost delta favours.
    pub fn favoured_by(delta: f64) -> Option<Side> {
        if delta.abs() < DEAD_HEAT {
            None
        } else if delta > 0.0 {
            Some(Side::Reference)
        } else {
            Some(Side::Comparison)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub label: String,
    pub start: f64,
    pub end: f64,
    pub contribution: f64,
    pub favoured: Side,
    pub magnitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Findings {
    pub total_delta: f64,
    pub winner: Option<Side>,
    pub margin: f64,
    pub strongest_sector: Option<Finding>,
    pub biggest_corner: Option<Finding>,
    pub corners_analyzed: usize,
}

// largest |contribution| wins, first one on ties
fn largest<'a>(ranges: impl Iterator<Item = (&'a str, f64, f64, f64)>) -> Option<Finding> {
    let (label, start, end, contribution) =
        ranges.fold(None::<(&'a str, f64, f64, f64)>, |best, r| match best {
            Some(b) if b.3.abs() >= r.3.abs() => Some(b),
            _ => Some(r),
        })?;
    Some(Finding {
        label: label.to_string(),
        start,
        end,
        contribution,
        favoured: Side::favoured_by(contribution)?,
        magnitude: contribution.abs(),
    })
}

pub fn generate_findings(total_delta: f64, sectors: &[Segment], corners: &[Corner]) -> Findings {
    Findings {
        total_delta,
        winner: Side::favoured_by(total_delta),
        margin: total_delta.abs(),
        strongest_sector: largest(sectors.iter().map(|s| (s.label.as_str(), s.start, s.end, s.delta))),
        biggest_corner: largest(
            corners
                .iter()
                .map(|c| (c.label.as_str(), c.window.start, c.window.end, c.delta)),
        ),
        corners_analyzed: corners.len(),
    }
}
