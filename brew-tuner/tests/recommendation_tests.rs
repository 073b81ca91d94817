//! End-to-end recommendation from dataset files on disk
//!
//! Loads CSV pairs written to a temp directory and runs the full
//! scoring → ranking → elite-averaging pipeline through the service.

use brew_common::api::RecommendationRequest;
use brew_common::{CellValue, ScoringMethod};
use brew_tuner::insights;
use brew_tuner::recommend::{OptimizerPreferences, RecommendationService};
use tempfile::TempDir;

fn write_pair(dir: &TempDir, prefix: &str, data: &str, meta: &str) {
    std::fs::write(dir.path().join(format!("{}data.csv", prefix)), data).unwrap();
    std::fs::write(dir.path().join(format!("{}meta.csv", prefix)), meta).unwrap();
}

/// Three grind trials scored by nick (8, 9, 6) and tom
fn grind_dataset() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_pair(
        &dir,
        "aeropress.",
        "grind,nick,tom\n14,8,3\n20,9,\n12,6,10\n",
        "type,name,unit,low,high,step,parameter type\n\
         parameter,grind,clicks,10,30,1,int\n\
         score,nick,,,,,\n\
         score,tom,,,,,\n",
    );
    dir
}

#[test]
fn test_grind_scenario_ranks_and_blends() {
    let dir = grind_dataset();
    let service = RecommendationService::new(dir.path());
    let prefs = OptimizerPreferences {
        method: ScoringMethod::Mean,
        selected_persons: vec!["nick".to_string()],
        weight: 0.5,
        best_only: false,
    };

    let report = service.generate_for_prefix("aeropress.", &prefs).unwrap();

    let objectives: Vec<f64> = report.state.historical.iter().map(|t| t.objective).collect();
    assert_eq!(objectives, vec![9.0, 8.0, 6.0]);
    // mean(20, 14, 12) = 15.33; 0.5 * 15.33 + 0.5 * 20 = 17.67 -> 18
    assert_eq!(report.recommendation["grind"], CellValue::Number(18.0));
    assert_eq!(report.top_score(), Some(9.0));

    let line = &report.suggested_parameters[0];
    assert_eq!(line.unit.as_deref(), Some("clicks"));
    assert!(!line.fixed);
}

#[test]
fn test_person_selection_changes_ranking() {
    let dir = grind_dataset();
    let service = RecommendationService::new(dir.path());
    let prefs = OptimizerPreferences {
        method: ScoringMethod::Mean,
        selected_persons: vec!["tom".to_string()],
        weight: 0.5,
        best_only: true,
    };

    let report = service.generate_for_prefix("aeropress.", &prefs).unwrap();

    // tom did not score the second brew, so it drops out
    assert_eq!(report.state.historical.len(), 2);
    assert_eq!(report.recommendation["grind"], CellValue::Number(12.0));
}

#[test]
fn test_fixed_parameters_reported_not_recommended() {
    let dir = TempDir::new().unwrap();
    write_pair(
        &dir,
        "v60.",
        "filter,grind,dose,nick\n\
         paper,,,\n\
         paper,18,15,7\n\
         paper,22,16,8\n\
         metal,20,15.5,9\n\
         metal,16,,\n",
        "type,name,unit,low,high,step,parameter type\n\
         parameter,filter,,,,,category\n\
         parameter,grind,clicks,10,30,1,int\n\
         parameter,dose,g,12,20,0.5,float\n\
         score,nick,,,,,\n",
    );
    let service = RecommendationService::new(dir.path());

    let report = service.generate_for_prefix("v60.", &OptimizerPreferences::default()).unwrap();

    assert_eq!(report.state.fixed_parameters.len(), 1);
    assert!(!report.recommendation.contains_key("filter"));
    assert!(report.recommendation.contains_key("grind"));
    assert!(report.recommendation.contains_key("dose"));

    let filter = report.suggested_parameters.iter().find(|p| p.name == "filter").unwrap();
    assert!(filter.fixed);
    assert_eq!(filter.value, CellValue::from("paper"));

    // Row order of the rendered lines follows the metadata
    let names: Vec<&str> = report.suggested_parameters.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["filter", "grind", "dose"]);
}

#[test]
fn test_no_scored_rows_is_empty_not_error() {
    let dir = TempDir::new().unwrap();
    write_pair(
        &dir,
        "chemex.",
        "grind,nick\n18,\n20,\n",
        "type,name,low,high,parameter type\nparameter,grind,10,30,int\nscore,nick,,,\n",
    );
    let service = RecommendationService::new(dir.path());

    let report = service.generate_for_prefix("chemex.", &OptimizerPreferences::default()).unwrap();

    assert!(report.is_empty());
    assert!(report.suggested_parameters.is_empty());
    assert_eq!(report.to_response().score, None);
}

#[test]
fn test_handle_request_matches_backend_shape() {
    let dir = grind_dataset();
    let service = RecommendationService::new(dir.path());
    let request = RecommendationRequest {
        dataset_prefix: "aeropress.".to_string(),
        method: ScoringMethod::Highest,
        persons: vec![],
        best_only: true,
        prior_weight: 0.5,
    };

    let response = service.handle_request(&request).unwrap();

    // Highest of (nick, tom): 8, 9, 10 -> the third brew wins
    assert_eq!(response.score, Some(10.0));
    assert_eq!(response.suggested_parameters[0].value, CellValue::Number(12.0));

    let bad = RecommendationRequest {
        prior_weight: -0.5,
        ..request
    };
    assert!(service.handle_request(&bad).unwrap_err().is_validation());
}

#[test]
fn test_missing_dataset_is_data_error() {
    let dir = TempDir::new().unwrap();
    let service = RecommendationService::new(dir.path());

    let err = service
        .generate_for_prefix("nothing.", &OptimizerPreferences::default())
        .unwrap_err();
    assert!(matches!(err, brew_common::Error::Dataset(_)));
}

#[test]
fn test_insights_from_loaded_dataset() {
    let dir = grind_dataset();
    let service = RecommendationService::new(dir.path());
    let prefs = OptimizerPreferences {
        selected_persons: vec!["nick".to_string()],
        ..Default::default()
    };

    let report = service.generate_for_prefix("aeropress.", &prefs).unwrap();
    let history = insights::optimization_history(&report.state);

    let best: Vec<f64> = history.iter().map(|p| p.best_so_far).collect();
    assert_eq!(best, vec![8.0, 9.0, 9.0]);
}

#[test]
fn test_insights_reject_unknown_person() {
    let dir = grind_dataset();
    let service = RecommendationService::new(dir.path());
    let prefs = OptimizerPreferences {
        selected_persons: vec!["nobody".to_string()],
        ..Default::default()
    };

    match service.load_history("aeropress.", &prefs).unwrap_err() {
        brew_common::Error::InvalidInput(message) => {
            assert_eq!(message, "Unknown person selection: nobody.");
        }
        other => panic!("expected invalid input, got {:?}", other),
    }

    let prefs = OptimizerPreferences {
        selected_persons: vec!["nick".to_string()],
        ..Default::default()
    };
    let (dataset, state) = service.load_history("aeropress.", &prefs).unwrap();
    assert_eq!(dataset.persons, vec!["nick", "tom"]);
    assert_eq!(state.historical.len(), 3);
}
