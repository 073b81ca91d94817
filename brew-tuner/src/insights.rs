//! Run insights derived from the ranked trial list
//!
//! **Purpose:** Data behind the "how is tuning going" views: objective per brew
//! in logging order with the best-so-far line, and which parameters move the
//! objective the most.
//!
//! Pure functions over [`OptimizerState`]; nothing here is persisted.

use crate::recommend::OptimizerState;
use brew_common::ParameterKind;
use serde::{Deserialize, Serialize};

/// One point of the optimization history
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    /// Row position in the loaded dataset
    pub index: usize,
    pub objective: f64,
    /// Best objective seen up to and including this row
    pub best_so_far: f64,
}

/// Strength of the linear relation between a parameter and the objective
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterImportance {
    pub name: String,
    /// |Pearson r|, `0.0..=1.0`
    pub importance: f64,
}

/// Objective per trial in dataset order with a running maximum
pub fn optimization_history(state: &OptimizerState) -> Vec<HistoryPoint> {
    let mut trials: Vec<_> = state.historical.iter().collect();
    trials.sort_by_key(|t| t.original_index);

    let mut best = f64::NEG_INFINITY;
    trials
        .into_iter()
        .map(|t| {
            best = best.max(t.objective);
            HistoryPoint {
                index: t.original_index,
                objective: t.objective,
                best_so_far: best,
            }
        })
        .collect()
}

/// Numeric parameters ranked by |correlation| with the objective
///
/// Category parameters and parameters with fewer than two numeric samples or
/// no variance are skipped.
pub fn parameter_importance(state: &OptimizerState, kinds: &[(String, ParameterKind)]) -> Vec<ParameterImportance> {
    let mut ranked: Vec<ParameterImportance> = kinds
        .iter()
        .filter(|(_, kind)| kind.is_numeric())
        .filter_map(|(name, _)| {
            let (xs, ys): (Vec<f64>, Vec<f64>) = state
                .historical
                .iter()
                .filter_map(|t| t.row.number(name).map(|x| (x, t.objective)))
                .unzip();
            correlation(&xs, &ys).map(|r| ParameterImportance {
                name: name.clone(),
                importance: r.abs(),
            })
        })
        .collect();

    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    ranked
}

/// Pearson correlation coefficient
///
/// # Returns
/// `None` for mismatched lengths, fewer than two samples, or zero variance.
pub fn correlation(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    Some(cov / denom)
}
