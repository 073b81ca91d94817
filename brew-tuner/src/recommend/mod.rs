//! Recommendation engine
//!
//! Turns a loaded brew dataset into a suggested next parameter set:
//!
//! 1. [`scoring`]: collapse per-person scores into one objective per row
//! 2. [`history`]: rank complete rows and extract the fixed parameters
//! 3. [`generator`]: elite-average the ranked trials into a recommendation
//! 4. [`service`]: preference validation and rendering for callers
//!
//! Every step is pure and recomputed from scratch on each request.

pub mod generator;
pub mod history;
pub mod scoring;
pub mod service;

pub use generator::{elite_count, recommend};
pub use history::{build_state, HistoricalTrial, OptimizerState};
pub use service::{OptimizerPreferences, RecommendationReport, RecommendationService};
