//! Push-channel event payload
//!
//! The backend streams one JSON object per SSE `data:` frame on
//! `GET /optimizer/runs/{id}/events`. Each event is a superseding snapshot
//! fragment of the run; see [`crate::api::types::Run::apply_event`].

use crate::api::types::RunStatus;
use crate::dataset::ParameterSet;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// One push-channel message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    /// Number of the trial the event refers to
    pub trial_number: u32,
    pub run_status: RunStatus,
    #[serde(default)]
    pub best_score: Option<f64>,
    #[serde(default)]
    pub best_parameters: Option<ParameterSet>,
    #[serde(default)]
    pub last_trial_parameters: Option<ParameterSet>,
    /// Present once the referenced trial has been scored
    #[serde(default)]
    pub last_trial_score: Option<f64>,
}

impl RunEvent {
    /// Decode the `data:` payload of an SSE frame
    pub fn from_json(data: &str) -> Result<Self> {
        serde_json::from_str(data).map_err(|e| Error::Parse(format!("run event: {}", e)))
    }
}
