use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{AnalysisError, Result};

/// How time-at-distance is reconstructed for each lap.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeltaMethod {
    /// Interpolate the recorded session time of each sample.
    #[default]
    Timestamp,
    /// Interpolate speed and integrate it over the grid.
    SpeedIntegration,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CornerDetection {
    /// A speed minimum only counts as a corner below this share of the lap's top speed.
    pub min_speed_fraction: f64,
    /// Radius (m) within which the apex must be the slowest sample.
    pub neighbourhood_m: f64,
    /// Half width (m) of the window placed around each apex.
    pub half_width_m: f64,
}

impl Default for CornerDetection {
    fn default() -> Self {
        Self {
            min_speed_fraction: 0.85,
            neighbourhood_m: 50.0,
            half_width_m: 75.0,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    pub grid_points: usize,
    pub delta_method: DeltaMethod,
    pub corners: CornerDetection,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            grid_points: 1000,
            delta_method: DeltaMethod::default(),
            corners: CornerDetection::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)?;
        let cfg: AnalysisConfig = serde_json::from_str(&data)
            .map_err(|e| AnalysisError::Config(format!("invalid config {}: {}", path.display(), e)))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.grid_points < 2 {
            return Err(AnalysisError::Config(format!(
                "grid_points must be at least 2, got {}",
                self.grid_points
            )));
        }
        let c = &self.corners;
        if !(c.min_speed_fraction > 0.0 && c.min_speed_fraction <= 1.0) {
            return Err(AnalysisError::Config(format!(
                "corners.min_speed_fraction must be in (0, 1], got {}",
                c.min_speed_fraction
            )));
        }
        if !(c.neighbourhood_m > 0.0) || !(c.half_width_m > 0.0) {
            return Err(AnalysisError::Config(
                "corner neighbourhood and window widths must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_config_keeps_defaults() {
        let cfg: AnalysisConfig =
            serde_json::from_str(r#"{"delta_method": "speed_integration", "corners": {"half_width_m": 40.0}}"#)
                .unwrap();
        assert_eq!(cfg.grid_points, 1000);
        assert_eq!(cfg.delta_method, DeltaMethod::SpeedIntegration);
        assert_eq!(cfg.corners.half_width_m, 40.0);
        assert_eq!(cfg.corners.min_speed_fraction, 0.85);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_degenerate_grid() {
        let cfg = AnalysisConfig { grid_points: 1, ..AnalysisConfig::default() };
        assert!(matches!(cfg.validate(), Err(AnalysisError::Config(_))));
    }

    #[test]
    fn load_reports_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(AnalysisConfig::load(file.path()), Err(AnalysisError::Config(_))));
    }
}
