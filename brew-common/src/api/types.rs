//! Request/response bodies for the optimizer backend
//!
//! Everything coming off the wire is decoded into these types at the boundary;
//! untyped JSON never reaches the recommendation engine or the coordinator.

use crate::dataset::{CellValue, ParameterSet};
use crate::events::RunEvent;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Upper bound on trials per run accepted by the backend
pub const MAX_TRIALS_PER_RUN: u32 = 200;
/// Inclusive score range accepted by `submit_score`
pub const SCORE_RANGE: (f64, f64) = (0.0, 10.0);

// ========================================
// Scoring Method
// ========================================

/// How several raters' scores collapse into one objective
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringMethod {
    Mean,
    #[default]
    Median,
    Highest,
    Lowest,
}

impl ScoringMethod {
    pub const ALL: [ScoringMethod; 4] = [
        ScoringMethod::Mean,
        ScoringMethod::Median,
        ScoringMethod::Highest,
        ScoringMethod::Lowest,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ScoringMethod::Mean => "mean",
            ScoringMethod::Median => "median",
            ScoringMethod::Highest => "highest",
            ScoringMethod::Lowest => "lowest",
        }
    }
}

impl fmt::Display for ScoringMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScoringMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "method must be one of mean, median, highest, lowest (got '{}')",
                    s
                ))
            })
    }
}

// ========================================
// Optimizer Run
// ========================================

/// Lifecycle of a server-side optimizer run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Finished,
    Error,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::Finished => "finished",
            RunStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// State of the most recent suggested trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrialState {
    Suggested,
    #[serde(alias = "completed")]
    Scored,
}

/// Latest trial of a run as reported by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialSnapshot {
    pub id: i64,
    pub trial_number: u32,
    #[serde(default)]
    pub parameters: ParameterSet,
    #[serde(default)]
    pub score: Option<f64>,
    pub state: TrialState,
}

/// Server-owned optimizer run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    pub status: RunStatus,
    #[serde(default)]
    pub best_score: Option<f64>,
    #[serde(default)]
    pub best_params: Option<ParameterSet>,
    pub trial_count: u32,
    pub n_trials: u32,
    #[serde(default)]
    pub method: ScoringMethod,
    #[serde(default)]
    pub selected_persons: Vec<String>,
    /// Creation time exactly as the backend formats it
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub latest_trial: Option<TrialSnapshot>,
}

impl Run {
    pub fn is_finished(&self) -> bool {
        self.status == RunStatus::Finished
    }

    /// Latest trial if it is still waiting for a human score
    pub fn awaiting_score(&self) -> Option<&TrialSnapshot> {
        self.latest_trial
            .as_ref()
            .filter(|t| t.state == TrialState::Suggested)
    }

    /// Merge a push event: only the fields the event carries are replaced
    pub fn apply_event(&mut self, event: &RunEvent) {
        self.status = event.run_status;
        self.best_score = event.best_score;
        self.best_params = event.best_parameters.clone();
    }
}

// ========================================
// Requests
// ========================================

/// Body of `POST /optimizer/runs/start`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartRunRequest {
    pub method: ScoringMethod,
    pub n_trials: u32,
    #[serde(default)]
    pub selected_persons: Vec<String>,
}

impl StartRunRequest {
    pub fn new(method: ScoringMethod, n_trials: u32, selected_persons: Vec<String>) -> Result<Self> {
        if !(1..=MAX_TRIALS_PER_RUN).contains(&n_trials) {
            return Err(Error::InvalidInput(format!(
                "n_trials must be between 1 and {} (got {})",
                MAX_TRIALS_PER_RUN, n_trials
            )));
        }
        let selected_persons = selected_persons
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        Ok(Self {
            method,
            n_trials,
            selected_persons,
        })
    }
}

/// Body of `POST /optimizer/runs/{id}/submit_score`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitScoreRequest {
    pub trial_id: i64,
    pub score: f64,
}

impl SubmitScoreRequest {
    pub fn new(trial_id: i64, score: f64) -> Result<Self> {
        let (low, high) = SCORE_RANGE;
        if !score.is_finite() || score < low || score > high {
            return Err(Error::InvalidInput(format!(
                "score must be between {} and {} (got {})",
                low, high, score
            )));
        }
        Ok(Self { trial_id, score })
    }
}

/// Body of `POST /optimizer/recommendation`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub dataset_prefix: String,
    pub method: ScoringMethod,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub persons: Vec<String>,
    pub best_only: bool,
    pub prior_weight: f64,
}

impl RecommendationRequest {
    pub fn validate(&self) -> Result<()> {
        if !self.prior_weight.is_finite() || !(0.0..=1.0).contains(&self.prior_weight) {
            return Err(Error::InvalidInput(format!(
                "prior_weight must be between 0 and 1 (got {})",
                self.prior_weight
            )));
        }
        if self.dataset_prefix.trim().is_empty() {
            return Err(Error::InvalidInput("dataset_prefix is required".to_string()));
        }
        Ok(())
    }
}

// ========================================
// Responses
// ========================================

/// One line of a rendered recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedParameter {
    pub name: String,
    pub value: CellValue,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub fixed: bool,
}

/// Result of `POST /optimizer/recommendation`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecommendationResponse {
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub suggested_parameters: Vec<SuggestedParameter>,
}

/// Error body of a failed backend call (`{"detail": ...}`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub detail: Option<Value>,
}

impl ApiErrorBody {
    /// Human-readable detail, if the server sent one
    ///
    /// Validation failures arrive as a list of `{"msg": ...}` objects.
    pub fn message(&self) -> Option<String> {
        match self.detail.as_ref()? {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Array(items) => {
                let msgs: Vec<String> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(Value::as_str).map(str::to_string))
                    .collect();
                if msgs.is_empty() {
                    None
                } else {
                    Some(msgs.join("; "))
                }
            }
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}
