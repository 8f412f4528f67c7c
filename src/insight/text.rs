use super::{Finding, Findings, Side};

/// Display names for the two laps being compared.
#[derive(Debug, Clone, Copy)]
pub struct DriverNames<'a> {
    pub reference: &'a str,
    pub comparison: &'a str,
}

impl<'a> DriverNames<'a> {
    pub fn name(&self, side: Side) -> &'a str {
        match side {
            Side::Reference => self.reference,
            Side::Comparison => self.comparison,
        }
    }
}

pub fn format_gap(seconds: f64) -> String {
    format!("{:.3}s", seconds)
}

pub fn winner_line(findings: &Findings, names: DriverNames<'_>) -> String {
    match findings.winner {
        Some(side) => format!(
            "{} was faster over the lap by {}.",
            names.name(side),
            format_gap(findings.margin)
        ),
        None => format!("{} and {} were level over the lap.", names.reference, names.comparison),
    }
}

pub fn sector_line(sector: Option<&Finding>, names: DriverNames<'_>) -> String {
    match sector {
        Some(s) => format!(
            "{} gained the most time in {} ({}).",
            names.name(s.favoured),
            s.label,
            format_gap(s.magnitude)
        ),
        None => "No single sector showed a decisive advantage.".to_string(),
    }
}

pub fn corner_line(corner: &Finding, names: DriverNames<'_>) -> String {
    format!(
        "The biggest time swing was at {} ({:+.3}s), in favour of {}.",
        corner.label,
        corner.contribution,
        names.name(corner.favoured)
    )
}

/// Summary sentences in display order: winner, strongest sector, biggest corner swing.
pub fn insight_lines(findings: &Findings, names: DriverNames<'_>) -> Vec<String> {
    let mut lines = vec![
        winner_line(findings, names),
        sector_line(findings.strongest_sector.as_ref(), names),
    ];
    if let Some(corner) = &findings.biggest_corner {
        lines.push(corner_line(corner, names));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAMES: DriverNames<'static> = DriverNames { reference: "NOR", comparison: "PIA" };

    fn finding(label: &str, contribution: f64, favoured: Side) -> Finding {
        Finding {
            label: label.to_string(),
            start: 0.0,
            end: 100.0,
            contribution,
            favoured,
            magnitude: contribution.abs(),
        }
    }

    fn findings(total: f64, winner: Option<Side>) -> Findings {
        Findings {
            total_delta: total,
            winner,
            margin: total.abs(),
            strongest_sector: Some(finding("Sector 2", -0.2114, Side::Comparison)),
            biggest_corner: Some(finding("T7", 0.42, Side::Reference)),
            corners_analyzed: 9,
        }
    }

    #[test]
    fn full_summary() {
        let lines = insight_lines(&findings(-0.1234, Some(Side::Comparison)), NAMES);
        assert_eq!(
            lines,
            vec![
                "PIA was faster over the lap by 0.123s.".to_string(),
                "PIA gained the most time in Sector 2 (0.211s).".to_string(),
                "The biggest time swing was at T7 (+0.420s), in favour of NOR.".to_string(),
            ]
        );
    }

    #[test]
    fn level_lap_without_sector_or_corners() {
        let f = Findings {
            strongest_sector: None,
            biggest_corner: None,
            corners_analyzed: 0,
            ..findings(0.0, None)
        };
        assert_eq!(
            insight_lines(&f, NAMES),
            vec![
                "NOR and PIA were level over the lap.".to_string(),
                "No single sector showed a decisive advantage.".to_string(),
            ]
        );
    }

    #[test]
    fn corner_line_signs_time_lost_by_the_comparison() {
        let f = finding("T2", -0.05, Side::Comparison);
        assert_eq!(corner_line(&f, NAMES), "The biggest time swing was at T2 (-0.050s), in favour of PIA.");
    }
}
