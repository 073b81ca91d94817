//! Recommendation service
//!
//! Validates optimizer preferences, rebuilds the ranked trial list and runs the
//! generator. Validation happens before any computation; nothing is clamped.

use super::generator::{self, validate_weight};
use super::history::{build_state, OptimizerState};
use brew_common::api::{RecommendationRequest, RecommendationResponse, SuggestedParameter};
use brew_common::{Dataset, Error, ParameterSet, Result, ScoringMethod};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default share of the elite mean in the numeric blend
pub const DEFAULT_WEIGHT: f64 = 0.5;

/// User-chosen knobs for one recompute
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerPreferences {
    pub method: ScoringMethod,
    /// Empty means every person in the dataset
    pub selected_persons: Vec<String>,
    pub weight: f64,
    pub best_only: bool,
}

impl Default for OptimizerPreferences {
    fn default() -> Self {
        Self {
            method: ScoringMethod::default(),
            selected_persons: Vec::new(),
            weight: DEFAULT_WEIGHT,
            best_only: false,
        }
    }
}

impl From<&RecommendationRequest> for OptimizerPreferences {
    fn from(request: &RecommendationRequest) -> Self {
        Self {
            method: request.method,
            selected_persons: request.persons.clone(),
            weight: request.prior_weight,
            best_only: request.best_only,
        }
    }
}

impl OptimizerPreferences {
    /// Reject preferences that cannot apply to `dataset`
    ///
    /// # Errors
    /// [`Error::InvalidInput`] for a weight outside `[0, 1]` or a person the
    /// dataset has no score column for
    pub fn validate(&self, dataset: &Dataset) -> Result<()> {
        validate_weight(self.weight)?;
        if let Some(unknown) = self.selected_persons.iter().find(|p| !dataset.persons.contains(p)) {
            return Err(Error::InvalidInput(format!("Unknown person selection: {}.", unknown)));
        }
        Ok(())
    }
}

/// Output of [`RecommendationService::generate`]
#[derive(Debug, Clone, Serialize)]
pub struct RecommendationReport {
    pub state: OptimizerState,
    /// Empty when the dataset has no scored complete rows
    pub recommendation: ParameterSet,
    /// Parameter lines in dataset column order, fixed parameters included
    pub suggested_parameters: Vec<SuggestedParameter>,
}

impl RecommendationReport {
    pub fn is_empty(&self) -> bool {
        self.recommendation.is_empty()
    }

    /// Objective of the best historical trial
    pub fn top_score(&self) -> Option<f64> {
        self.state.best().map(|t| t.objective)
    }

    /// Same shape the backend returns from its recommendation endpoint
    pub fn to_response(&self) -> RecommendationResponse {
        RecommendationResponse {
            score: self.top_score(),
            suggested_parameters: self.suggested_parameters.clone(),
        }
    }
}

/// Computes recommendations for datasets found under one directory
#[derive(Debug, Clone)]
pub struct RecommendationService {
    dataset_dir: PathBuf,
}

impl RecommendationService {
    pub fn new(dataset_dir: impl Into<PathBuf>) -> Self {
        Self {
            dataset_dir: dataset_dir.into(),
        }
    }

    pub fn dataset_dir(&self) -> &Path {
        &self.dataset_dir
    }

    /// Load `<prefix>data.csv`/`<prefix>meta.csv` and generate
    pub fn generate_for_prefix(&self, prefix: &str, prefs: &OptimizerPreferences) -> Result<RecommendationReport> {
        // Fail on bad preferences before touching the filesystem
        validate_weight(prefs.weight)?;
        let dataset = Dataset::load(&self.dataset_dir, prefix)?;
        self.generate(&dataset, prefs)
    }

    /// Load a dataset and rank its history without recommending
    ///
    /// Used by the insights views; preferences are validated the same way as
    /// for [`Self::generate`].
    pub fn load_history(&self, prefix: &str, prefs: &OptimizerPreferences) -> Result<(Dataset, OptimizerState)> {
        validate_weight(prefs.weight)?;
        let dataset = Dataset::load(&self.dataset_dir, prefix)?;
        prefs.validate(&dataset)?;
        let state = build_state(&dataset, prefs.method, &prefs.selected_persons);
        Ok((dataset, state))
    }

    /// Answer a backend-shaped recommendation request locally
    pub fn handle_request(&self, request: &RecommendationRequest) -> Result<RecommendationResponse> {
        request.validate()?;
        let report = self.generate_for_prefix(&request.dataset_prefix, &OptimizerPreferences::from(request))?;
        Ok(report.to_response())
    }

    /// Validate preferences, rank the history and produce a recommendation
    pub fn generate(&self, dataset: &Dataset, prefs: &OptimizerPreferences) -> Result<RecommendationReport> {
        prefs.validate(dataset)?;

        let state = build_state(dataset, prefs.method, &prefs.selected_persons);
        let recommendation = generator::recommend(
            &state.historical,
            &state.fixed_parameters,
            &dataset.parameters,
            prefs.weight,
            prefs.best_only,
        )?;

        if recommendation.is_empty() {
            info!("Not enough scored brews in '{}' to recommend", dataset.prefix);
        } else {
            debug!(
                parameters = recommendation.len(),
                trials = state.historical.len(),
                "Recommendation ready for '{}'",
                dataset.prefix
            );
        }

        let suggested_parameters = render(dataset, &state.fixed_parameters, &recommendation);
        Ok(RecommendationReport {
            state,
            recommendation,
            suggested_parameters,
        })
    }
}

/// Overlay fixed parameters on the recommendation, in descriptor order
fn render(dataset: &Dataset, fixed: &ParameterSet, recommendation: &ParameterSet) -> Vec<SuggestedParameter> {
    dataset
        .parameters
        .iter()
        .filter_map(|descriptor| {
            let (value, is_fixed) = match fixed.get(&descriptor.name) {
                Some(value) => (value, true),
                None => (recommendation.get(&descriptor.name)?, false),
            };
            Some(SuggestedParameter {
                name: descriptor.name.clone(),
                value: value.clone(),
                unit: descriptor.unit.clone(),
                fixed: is_fixed,
            })
        })
        .collect()
}
