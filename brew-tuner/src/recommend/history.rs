//! Historical trial builder
//!
//! Partitions dataset rows into the fixed (control) configuration and the
//! ranked list of completed trials the recommendation is computed from.
//!
//! **Ordering:** trials are ranked by objective, highest first, with a stable
//! sort so equal objectives keep their original row order. Rebuilding from the
//! same inputs always produces the same sequence, which the category vote in
//! the generator relies on for tie-breaking.

use super::scoring;
use brew_common::{CellValue, DataRow, Dataset, ParameterSet, ScoringMethod};
use serde::Serialize;
use tracing::debug;

/// A complete dataset row with its computed objective
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricalTrial {
    /// Position of the row in the unfiltered dataset
    pub original_index: usize,
    pub objective: f64,
    pub row: DataRow,
}

impl HistoricalTrial {
    pub fn value(&self, field: &str) -> Option<&CellValue> {
        self.row.get(field)
    }
}

/// Output of one recompute
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizerState {
    pub method: ScoringMethod,
    pub selected_persons: Vec<String>,
    /// Score columns actually used (all persons when none were selected)
    pub score_fields: Vec<String>,
    pub parameter_keys: Vec<String>,
    /// Ranked best first
    pub historical: Vec<HistoricalTrial>,
    pub fixed_parameters: ParameterSet,
}

impl OptimizerState {
    pub fn best(&self) -> Option<&HistoricalTrial> {
        self.historical.first()
    }
}

/// Build the ranked trial list and fixed parameters for a dataset
pub fn build_state(dataset: &Dataset, method: ScoringMethod, selected_persons: &[String]) -> OptimizerState {
    let score_fields: Vec<String> = if selected_persons.is_empty() {
        dataset.persons.clone()
    } else {
        selected_persons.to_vec()
    };
    let parameter_keys = dataset.parameter_keys();

    let is_complete = |row: &DataRow| parameter_keys.iter().all(|k| row.is_present(k));

    let fixed_parameters = dataset
        .rows
        .iter()
        .find(|row| !is_complete(row))
        .map(|row| row.project(parameter_keys.iter().map(String::as_str)))
        .unwrap_or_default();

    let mut historical: Vec<HistoricalTrial> = dataset
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| is_complete(row))
        .filter_map(|(original_index, row)| {
            scoring::score(row, &score_fields, method).map(|objective| HistoricalTrial {
                original_index,
                objective,
                row: row.clone(),
            })
        })
        .collect();

    // Vec::sort_by is stable
    historical.sort_by(|a, b| b.objective.total_cmp(&a.objective));

    debug!(
        rows = dataset.rows.len(),
        trials = historical.len(),
        fixed = fixed_parameters.len(),
        method = %method,
        "Rebuilt optimizer state"
    );

    OptimizerState {
        method,
        selected_persons: selected_persons.to_vec(),
        score_fields,
        parameter_keys,
        historical,
        fixed_parameters,
    }
}
