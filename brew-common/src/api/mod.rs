//! Optimizer backend API types
//!
//! Request and response bodies exchanged with the optimizer service:
//!
//! - `POST /optimizer/runs/start` → [`types::Run`]
//! - `GET /optimizer/runs/{id}` → [`types::Run`]
//! - `GET /optimizer/runs` → `Vec<Run>`
//! - `POST /optimizer/runs/{id}/submit_score` → [`types::Run`]
//! - `POST /optimizer/recommendation` → [`types::RecommendationResponse`]
//!
//! The push channel payload lives in [`crate::events`].

pub mod types;

pub use types::{
    ApiErrorBody, RecommendationRequest, RecommendationResponse, Run, RunStatus, ScoringMethod,
    StartRunRequest, SubmitScoreRequest, SuggestedParameter, TrialSnapshot, TrialState,
};
