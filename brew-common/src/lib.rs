//! # Brew Tuner Common Library
//!
//! Shared code for the brew tuner workspace:
//! - Error type shared by every crate
//! - Configuration loading (CLI / environment / TOML / compiled defaults)
//! - Dataset and metadata schemas with CSV ingestion
//! - Optimizer backend API request/response types
//! - Push-channel event payload

pub mod api;
pub mod config;
pub mod dataset;
pub mod error;
pub mod events;

pub use api::types::{Run, RunStatus, ScoringMethod, TrialSnapshot, TrialState};
pub use dataset::{CellValue, DataRow, Dataset, ParameterDescriptor, ParameterKind, ParameterSet};
pub use error::{Error, Result};
pub use events::RunEvent;
