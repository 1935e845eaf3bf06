pub mod city;
pub mod config;
pub mod error;
pub mod network;
pub mod output;
pub mod scoring;
pub mod segment;
pub mod sensitivity;

pub use city::{CityIndex, aggregate_city};
pub use error::{ErrorKind, MetricError, Result};
pub use network::{BudgetOptions, BudgetSelection, EdgeCandidate, optimize_budget};
pub use scoring::{score_segment, score_segments};
pub use segment::{Coordinate, RawValue, ScoredSegment, Segment};
pub use sensitivity::{SensitivityPoint, SensitivityResult, sweep_all_groups, sweep_sensitivity};
