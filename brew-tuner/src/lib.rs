//! # Brew Tuner
//!
//! Client-side core of the coffee brew tuner.
//!
//! **Purpose:** Suggest the next brew from logged brews, and follow a
//! server-side optimizer run live while a person scores its suggested trials.
//!
//! **Architecture:**
//! - [`recommend`]: pure recommendation engine (scoring → ranking → elite averaging)
//! - [`insights`]: optimization history and parameter importance
//! - [`client`]: optimizer backend seam ([`client::RunBackend`]) and its HTTP implementation
//! - [`sse`]: push-channel frame decoding
//! - [`coordinator`]: push/poll run tracking and score submission

pub mod client;
pub mod coordinator;
pub mod insights;
pub mod recommend;
pub mod sse;

pub use client::{EventStream, HttpBackend, RunBackend};
pub use coordinator::{CoordinatorConfig, RunCoordinator, RunSnapshot};
pub use recommend::{OptimizerPreferences, RecommendationReport, RecommendationService};
