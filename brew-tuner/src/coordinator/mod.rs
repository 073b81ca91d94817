//! Run update coordinator
//!
//! Keeps one optimizer run's state current for a presentation layer:
//!
//! - **Push first:** subscribe to the run's SSE channel and merge each event
//! - **Poll fallback:** on channel failure, pull the full run every poll
//!   interval until it reports `finished`
//! - **Human in the loop:** submit scores for suggested trials and start runs
//!
//! At most one tracking session exists at any instant. [`RunCoordinator::attach`]
//! and [`RunCoordinator::detach`] wait for the previous session's channel and
//! timer to be released before anything new is opened, and a generation
//! counter discards any write a cancelled session still had in flight.
//!
//! Failures never panic or propagate out of the background session; they are
//! reported through [`RunSnapshot::last_error`] and the activity log.

mod session;
pub mod state;

pub use state::{ActivityEntry, ActivityLog, ConnectionStatus, RunPhase, RunSnapshot, ScorePoint};

use crate::client::RunBackend;
use brew_common::api::{StartRunRequest, SubmitScoreRequest};
use brew_common::config::ClientConfig;
use brew_common::{Error, Result, Run};
use session::{Session, SessionContext, Shared};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Default poll interval after the push channel fails
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Explicit settings for a coordinator
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Session credential for the push channel; `None` disables live updates
    pub token: Option<String>,
    pub poll_interval: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            token: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl From<&ClientConfig> for CoordinatorConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            token: config.token.clone(),
            poll_interval: config.poll_interval,
        }
    }
}

pub struct RunCoordinator {
    backend: Arc<dyn RunBackend>,
    config: CoordinatorConfig,
    shared: Arc<Shared>,
    session: Mutex<Option<Session>>,
}

impl RunCoordinator {
    pub fn new(backend: Arc<dyn RunBackend>, config: CoordinatorConfig) -> Self {
        Self {
            backend,
            config,
            shared: Arc::new(Shared::new()),
            session: Mutex::new(None),
        }
    }

    pub fn snapshot(&self) -> RunSnapshot {
        self.shared.snapshot()
    }

    /// Snapshot stream for presentation layers
    pub fn subscribe(&self) -> watch::Receiver<RunSnapshot> {
        self.shared.subscribe()
    }

    /// Track `run_id`, replacing any current session
    ///
    /// Switching to a different run clears the previous run, its score history
    /// and the activity log. Does not fetch the run; see [`Self::load_run`].
    pub async fn attach(&self, run_id: Uuid) {
        self.track(run_id, |s| {
            if s.run_id != Some(run_id) {
                s.reset(Some(run_id));
            }
        })
        .await;
    }

    /// Stop tracking and clear all run state
    pub async fn detach(&self) {
        let mut slot = self.session.lock().await;
        if let Some(old) = slot.take() {
            info!(run_id = %old.run_id(), "Detaching from run");
            old.shutdown().await;
        }
        self.shared.next_generation(|s| s.reset(None));
    }

    /// Fetch a run once; replaces the tracked run when the ids match
    pub async fn load_run(&self, run_id: Uuid) -> Result<Run> {
        match self.backend.get_run(run_id).await {
            Ok(run) => {
                self.shared.update(|s| {
                    if s.run_id == Some(run.id) {
                        s.run = Some(run.clone());
                    }
                });
                Ok(run)
            }
            Err(e) => {
                warn!(run_id = %run_id, "Could not load run: {}", e);
                self.shared.update(|s| s.last_error = Some(describe(&e)));
                Err(e)
            }
        }
    }

    /// Fetch a run, then track it with the fetched state already in place
    ///
    /// Push events that arrive once the channel opens merge onto the fetched
    /// run instead of being overwritten by a late fetch.
    pub async fn open_run(&self, run_id: Uuid) -> Result<Run> {
        let run = self.load_run(run_id).await?;
        let seeded = run.clone();
        self.track(run_id, move |s| {
            if s.run_id != Some(run_id) {
                s.reset(Some(run_id));
            }
            s.run = Some(seeded);
        })
        .await;
        Ok(run)
    }

    pub async fn list_runs(&self) -> Result<Vec<Run>> {
        self.backend.list_runs().await
    }

    /// Start a run on the backend and track it
    pub async fn start_run(&self, request: &StartRunRequest) -> Result<Run> {
        let request =
            StartRunRequest::new(request.method, request.n_trials, request.selected_persons.clone())?;

        let run = match self.backend.start_run(&request).await {
            Ok(run) => run,
            Err(e) => {
                let message = describe(&e);
                error!("Run start failed: {}", message);
                self.shared.update(|s| {
                    s.last_error = Some(message.clone());
                    s.activity.push(format!("Run start failed: {}", message));
                });
                return Err(e);
            }
        };

        info!(run_id = %run.id, n_trials = run.n_trials, "Run started");
        let tracked = run.clone();
        self.track(run.id, move |s| {
            s.reset(Some(tracked.id));
            s.activity.push(format!("Run started: {}", tracked.id));
            s.run = Some(tracked);
        })
        .await;
        Ok(run)
    }

    /// Score the trial the run is waiting on
    ///
    /// # Errors
    /// - [`Error::InvalidInput`] when no trial is suggested or the score is out of range
    /// - Transport errors from the backend; the tracked run is left unchanged
    pub async fn submit_score(&self, score: f64) -> Result<Run> {
        let pending = self.shared.read(|s| {
            s.run
                .as_ref()
                .and_then(|run| run.awaiting_score().map(|t| (run.id, t.id, t.trial_number)))
        });
        let Some((run_id, trial_id, trial_number)) = pending else {
            return Err(Error::InvalidInput("No trial is waiting for a score.".to_string()));
        };
        let request = SubmitScoreRequest::new(trial_id, score)?;

        match self.backend.submit_score(run_id, &request).await {
            Ok(run) => {
                info!(run_id = %run_id, trial = trial_number, score, "Score submitted");
                self.shared.update(|s| {
                    if s.run_id != Some(run.id) {
                        return;
                    }
                    s.score_history.push(ScorePoint {
                        trial: run.trial_count,
                        score,
                    });
                    s.activity.push(format!("Score submitted for trial {}", trial_number));
                    s.run = Some(run.clone());
                });
                Ok(run)
            }
            Err(e) => {
                let message = describe(&e);
                error!(run_id = %run_id, "Score submission failed: {}", message);
                self.shared.update(|s| {
                    s.last_error = Some(message.clone());
                    s.activity.push(format!("Score submission failed: {}", message));
                });
                Err(e)
            }
        }
    }

    /// Replace the session: shut the old one down, prepare state, then open
    async fn track(&self, run_id: Uuid, prepare: impl FnOnce(&mut RunSnapshot)) {
        let mut slot = self.session.lock().await;
        if let Some(old) = slot.take() {
            info!(from = %old.run_id(), to = %run_id, "Switching tracked run");
            old.shutdown().await;
        }

        let token = self.config.token.clone().filter(|t| !t.trim().is_empty());
        let generation = self.shared.next_generation(|s| {
            prepare(s);
            s.connection = ConnectionStatus::Disconnected;
            if token.is_none() {
                s.activity.push("Live updates disabled: no session token.");
            }
        });

        let Some(token) = token else {
            warn!(run_id = %run_id, "No session token; live updates disabled");
            return;
        };

        *slot = Some(Session::spawn(SessionContext {
            backend: Arc::clone(&self.backend),
            shared: Arc::clone(&self.shared),
            generation,
            run_id,
            token,
            poll_interval: self.config.poll_interval,
        }));
    }
}

/// User-facing message: server detail for transport failures
pub(crate) fn describe(e: &Error) -> String {
    match e {
        Error::Transport { message, .. } => message.clone(),
        other => other.to_string(),
    }
}
