//! Lap-versus-lap analysis of Formula 1 timing and car telemetry: running
//! time delta, sector and corner breakdowns, tyre stints and short written
//! insights.

pub mod config;
pub mod dashboard;
pub mod data;
pub mod delta;
pub mod error;
pub mod insight;
pub mod model;
pub mod segment;
pub mod source;
pub mod strategy;

pub use config::AnalysisConfig;
pub use dashboard::{build_dashboard, Dashboard, DashboardRequest};
pub use error::{AnalysisError, Result};
