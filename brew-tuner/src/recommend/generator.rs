//! Elite-averaging recommendation
//!
//! **Algorithm:**
//! 1. Elite = top `max(3, floor(0.25 × N))` ranked trials
//! 2. Category parameters: plurality vote over the elite
//! 3. Numeric parameters: `w·mean(elite) + (1-w)·best`, clamped to `[low, high]`,
//!    snapped to the step grid, then rounded per kind
//!
//! The floor of three keeps one lucky brew from dominating small datasets; the
//! 25% cap keeps the suggestion biased toward quality on large ones.
//!
//! Parameters held fixed by the dataset never appear in the output, and a
//! parameter with no usable elite values is omitted rather than reported as zero.

use super::history::HistoricalTrial;
use brew_common::dataset::NumericRange;
use brew_common::{CellValue, Error, ParameterDescriptor, ParameterKind, ParameterSet, Result};
use tracing::debug;

/// Share of ranked trials that form the elite
pub const ELITE_FRACTION: f64 = 0.25;
/// Minimum elite size
pub const MIN_ELITE: usize = 3;

/// Elite size for `n` ranked trials (never more than `n`)
pub fn elite_count(n: usize) -> usize {
    let fraction = (n as f64 * ELITE_FRACTION).floor() as usize;
    MIN_ELITE.max(fraction).min(n)
}

/// Reject weights outside `[0, 1]`; never clamp
pub fn validate_weight(weight: f64) -> Result<()> {
    if weight.is_finite() && (0.0..=1.0).contains(&weight) {
        Ok(())
    } else {
        Err(Error::InvalidInput(
            "Elite averaging weight must be between 0 and 1.".to_string(),
        ))
    }
}

/// Suggest the next parameter set from ranked trials
///
/// # Arguments
/// * `historical` - Trials ranked best first (see [`super::history::build_state`])
/// * `fixed` - Parameters held constant; excluded from the output
/// * `descriptors` - One per parameter column, in display order
/// * `weight` - Elite mean share in the blend, `[0, 1]`
/// * `best_only` - Return the top trial's parameters verbatim
///
/// # Returns
/// An empty set when there is no history (insufficient data, not an error).
pub fn recommend(
    historical: &[HistoricalTrial],
    fixed: &ParameterSet,
    descriptors: &[ParameterDescriptor],
    weight: f64,
    best_only: bool,
) -> Result<ParameterSet> {
    validate_weight(weight)?;

    let Some(best) = historical.first() else {
        return Ok(ParameterSet::new());
    };

    let searched = descriptors.iter().filter(|d| !fixed.contains_key(&d.name));

    if best_only {
        return Ok(best.row.project(searched.map(|d| d.name.as_str())));
    }

    let elite = &historical[..elite_count(historical.len())];
    debug!(trials = historical.len(), elite = elite.len(), weight, "Computing elite recommendation");

    let mut next = ParameterSet::new();
    for descriptor in searched {
        let value = match (descriptor.kind, descriptor.range) {
            (ParameterKind::Category, _) => plurality_vote(elite, &descriptor.name),
            (kind, Some(range)) => blend_numeric(elite, best, &descriptor.name, kind, &range, weight),
            (_, None) => None,
        };
        if let Some(value) = value {
            next.insert(descriptor.name.clone(), value);
        }
    }
    Ok(next)
}

/// Most frequent value; ties go to the value seen first in rank order
fn plurality_vote(elite: &[HistoricalTrial], field: &str) -> Option<CellValue> {
    let mut tally: Vec<(String, CellValue, usize)> = Vec::new();
    for value in elite.iter().filter_map(|t| t.value(field)) {
        let key = value.to_string();
        match tally.iter_mut().find(|(k, _, _)| *k == key) {
            Some(entry) => entry.2 += 1,
            None => tally.push((key, value.clone(), 1)),
        }
    }

    let mut winner: Option<&(String, CellValue, usize)> = None;
    for entry in &tally {
        if winner.map_or(true, |w| entry.2 > w.2) {
            winner = Some(entry);
        }
    }
    winner.map(|(_, value, _)| value.clone())
}

fn blend_numeric(
    elite: &[HistoricalTrial],
    best: &HistoricalTrial,
    field: &str,
    kind: ParameterKind,
    range: &NumericRange,
    weight: f64,
) -> Option<CellValue> {
    let values: Vec<f64> = elite.iter().filter_map(|t| t.row.number(field)).collect();
    if values.is_empty() {
        return None;
    }
    let best_value = best.row.number(field)?;

    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let blended = weight * mean + (1.0 - weight) * best_value;
    let snapped = range.snap(range.clamp(blended));

    let value = match kind {
        ParameterKind::Integer => snapped.round(),
        _ => (snapped * 100.0).round() / 100.0,
    };
    Some(CellValue::Number(value))
}
