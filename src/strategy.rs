use serde::Serialize;

use crate::data::{Compound, Lap};
use crate::model::degradation_per_lap;

/// A contiguous run of laps on one set of tyres.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stint {
    pub number: u32,
    pub compound: Compound,
    pub start_lap: u32,
    pub end_lap: u32,
    pub lap_count: usize,
    pub fastest_lap: Option<f64>,
    pub slowest_lap: Option<f64>,
    /// Seconds lost per lap of tyre age.
    pub degradation: Option<f64>,
}

// a stop sits between prev and lap when either pit flag or the feed's stint counter says so
fn pitted_between(prev: &Lap, lap: &Lap) -> bool {
    let stint_advanced = matches!((prev.stint, lap.stint), (Some(a), Some(b)) if b > a);
    prev.is_pit_in_lap || lap.is_pit_out_lap || stint_advanced
}

fn starts_new_stint(current: Compound, prev: &Lap, lap: &Lap) -> bool {
    if pitted_between(prev, lap) {
        return true;
    }
    // unknown laps ride along with the open stint
    current.is_known() && lap.compound.is_known() && lap.compound != current
}

fn pace(laps: &[&Lap]) -> (Option<f64>, Option<f64>) {
    let clean: Vec<f64> = laps.iter().filter(|l| l.is_clean()).filter_map(|l| l.lap_time).collect();
    let times = if clean.is_empty() {
        laps.iter().filter_map(|l| l.lap_time).collect()
    } else {
        clean
    };
    let fastest = times.iter().copied().reduce(f64::min);
    let slowest = times.iter().copied().reduce(f64::max);
    (fastest, slowest)
}

fn close_stint(number: u32, compound: Compound, laps: &[&Lap]) -> Stint {
    let (fastest_lap, slowest_lap) = pace(laps);
    Stint {
        number,
        compound,
        start_lap: laps[0].lap_number,
        end_lap: laps[laps.len() - 1].lap_number,
        lap_count: laps.len(),
        fastest_lap,
        slowest_lap,
        degradation: degradation_per_lap(laps),
    }
}

/// Splits one driver's laps into stints, in race order.
pub fn summarize_stints(laps: &[Lap]) -> Vec<Stint> {
    let mut ordered: Vec<&Lap> = laps.iter().collect();
    ordered.sort_by_key(|l| l.lap_number);

    let mut stints = Vec::new();
    let Some(&first) = ordered.first() else {
        return stints;
    };

    let mut compound = first.compound;
    let mut current: Vec<&Lap> = vec![first];
    for pair in ordered.windows(2) {
        let (prev, lap) = (pair[0], pair[1]);
        if starts_new_stint(compound, prev, lap) {
            stints.push(close_stint(stints.len() as u32 + 1, compound, &current));
            current.clear();
            compound = lap.compound;
        } else if !compound.is_known() {
            // same tyre set, so the first compound it reports names the stint
            compound = lap.compound;
        }
        current.push(lap);
    }
    stints.push(close_stint(stints.len() as u32 + 1, compound, &current));

    tracing::debug!(laps = ordered.len(), stints = stints.len(), "summarized stints");
    stints
}
