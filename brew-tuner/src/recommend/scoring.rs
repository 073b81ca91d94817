//! Objective scoring
//!
//! Collapses the scores several people gave one brew into a single objective.
//! Only finite numeric cells count; empty, missing and non-numeric cells are
//! skipped rather than read as zero.

use brew_common::{DataRow, ScoringMethod};

/// Objective of one row, or `None` when no selected score field has a value
pub fn score(row: &DataRow, score_fields: &[String], method: ScoringMethod) -> Option<f64> {
    let values: Vec<f64> = score_fields.iter().filter_map(|f| row.number(f)).collect();
    aggregate(&values, method)
}

/// Reduce already-extracted values under `method`
pub fn aggregate(values: &[f64], method: ScoringMethod) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    match method {
        ScoringMethod::Mean => Some(values.iter().sum::<f64>() / values.len() as f64),
        ScoringMethod::Median => median(values),
        ScoringMethod::Highest => values.iter().copied().reduce(f64::max),
        ScoringMethod::Lowest => values.iter().copied().reduce(f64::min),
    }
}

/// Median; the mean of the two central values for even counts
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn persons(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_mean_of_two() {
        let row = DataRow::new().with("p1", 8.0).with("p2", 6.0);
        assert_eq!(score(&row, &persons(&["p1", "p2"]), ScoringMethod::Mean), Some(7.0));
    }

    #[test]
    fn test_median_odd_and_even() {
        let row = DataRow::new().with("a", 8.0).with("b", 6.0).with("c", 7.0);
        assert_eq!(score(&row, &persons(&["a", "b", "c"]), ScoringMethod::Median), Some(7.0));
        assert_eq!(score(&row, &persons(&["a", "b"]), ScoringMethod::Median), Some(7.0));
    }

    #[test]
    fn test_highest_and_lowest() {
        let row = DataRow::new().with("p1", 8.0).with("p2", 6.0);
        let fields = persons(&["p1", "p2"]);
        assert_eq!(score(&row, &fields, ScoringMethod::Highest), Some(8.0));
        assert_eq!(score(&row, &fields, ScoringMethod::Lowest), Some(6.0));
    }

    #[test]
    fn test_no_present_values_yields_none_for_every_method() {
        let row = DataRow::new().with("p1", "").with("p2", "great").with("grind", 18.0);
        let fields = persons(&["p1", "p2", "p3"]);
        for method in ScoringMethod::ALL {
            assert_eq!(score(&row, &fields, method), None, "method {}", method);
        }
    }

    #[test]
    fn test_numeric_text_counts_and_garbage_is_skipped() {
        let row = DataRow::new().with("p1", "9").with("p2", "n/a").with("p3", 5.0);
        assert_eq!(score(&row, &persons(&["p1", "p2", "p3"]), ScoringMethod::Mean), Some(7.0));
    }

    #[test]
    fn test_unselected_fields_ignored() {
        let row = DataRow::new().with("nick", 9.0).with("tom", 1.0);
        assert_eq!(score(&row, &persons(&["nick"]), ScoringMethod::Lowest), Some(9.0));
    }
}
