//! Run, trial and event fixtures

use brew_common::{Run, RunEvent, RunStatus, ScoringMethod, TrialSnapshot, TrialState};
use brew_tuner::RunSnapshot;
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

pub fn run(id: Uuid, status: RunStatus, trial_count: u32) -> Run {
    Run {
        id,
        status,
        best_score: None,
        best_params: None,
        trial_count,
        n_trials: 5,
        method: ScoringMethod::Median,
        selected_persons: vec![],
        created_at: None,
        latest_trial: None,
    }
}

/// Running run whose next trial waits for a score
pub fn suggested_run(id: Uuid, trial_count: u32, trial_id: i64) -> Run {
    let mut run = run(id, RunStatus::Running, trial_count);
    run.latest_trial = Some(TrialSnapshot {
        id: trial_id,
        trial_number: trial_count + 1,
        parameters: Default::default(),
        score: None,
        state: TrialState::Suggested,
    });
    run
}

pub fn event(trial_number: u32, status: RunStatus, last_trial_score: Option<f64>) -> RunEvent {
    RunEvent {
        trial_number,
        run_status: status,
        best_score: last_trial_score,
        best_parameters: None,
        last_trial_parameters: None,
        last_trial_score,
    }
}

/// Wait until a snapshot satisfies `condition`
pub async fn wait_for<F>(updates: &mut watch::Receiver<RunSnapshot>, condition: F) -> RunSnapshot
where
    F: Fn(&RunSnapshot) -> bool,
{
    let waiting = async {
        loop {
            {
                let snapshot = updates.borrow_and_update();
                if condition(&snapshot) {
                    return snapshot.clone();
                }
            }
            updates.changed().await.expect("coordinator dropped");
        }
    };
    tokio::time::timeout(Duration::from_secs(10), waiting)
        .await
        .expect("condition not reached within 10s")
}
