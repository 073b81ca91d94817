//! Observable state of the run coordinator
//!
//! Presentation layers only ever see [`RunSnapshot`] values; every mutation
//! goes through the coordinator.

use brew_common::{Run, RunStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use uuid::Uuid;

/// Maximum activity entries kept
pub const ACTIVITY_CAPACITY: usize = 20;

/// Which update source is active
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    /// Push channel requested, not yet open
    Retrying,
    /// Push channel open
    Connected,
    /// Push channel failed; pulling the run periodically
    Polling,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Retrying => "retrying",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Polling => "polling",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityEntry {
    pub at: DateTime<Utc>,
    pub message: String,
}

/// Bounded, most-recent-first activity log
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ActivityLog {
    entries: VecDeque<ActivityEntry>,
}

impl ActivityLog {
    pub fn push(&mut self, message: impl Into<String>) {
        self.entries.push_front(ActivityEntry {
            at: Utc::now(),
            message: message.into(),
        });
        self.entries.truncate(ACTIVITY_CAPACITY);
    }

    /// Newest first
    pub fn entries(&self) -> impl Iterator<Item = &ActivityEntry> {
        self.entries.iter()
    }

    pub fn messages(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.message.as_str()).collect()
    }

    pub fn latest(&self) -> Option<&ActivityEntry> {
        self.entries.front()
    }

    pub fn contains(&self, message: &str) -> bool {
        self.entries.iter().any(|e| e.message == message)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// One scored trial, in arrival order
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScorePoint {
    pub trial: u32,
    pub score: f64,
}

/// What the user should be doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Running,
    WaitingForScore,
    Finished,
    Error,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunPhase::Idle => "idle",
            RunPhase::Running => "running",
            RunPhase::WaitingForScore => "waiting for score",
            RunPhase::Finished => "finished",
            RunPhase::Error => "error",
        };
        f.write_str(s)
    }
}

/// Immutable view of the coordinator
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSnapshot {
    /// Run being tracked, known before the run itself is fetched
    pub run_id: Option<Uuid>,
    pub run: Option<Run>,
    pub score_history: Vec<ScorePoint>,
    pub connection: ConnectionStatus,
    pub activity: ActivityLog,
    pub last_event_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl RunSnapshot {
    pub fn phase(&self) -> RunPhase {
        let Some(run) = &self.run else {
            return RunPhase::Idle;
        };
        if run.awaiting_score().is_some() && !run.is_finished() {
            return RunPhase::WaitingForScore;
        }
        match run.status {
            RunStatus::Idle => RunPhase::Idle,
            RunStatus::Running => RunPhase::Running,
            RunStatus::Finished => RunPhase::Finished,
            RunStatus::Error => RunPhase::Error,
        }
    }

    /// `current/total`, counting a suggested trial as in progress
    pub fn progress_label(&self) -> Option<String> {
        let run = self.run.as_ref()?;
        let pending = u32::from(run.awaiting_score().is_some());
        let current = (run.trial_count + pending).min(run.n_trials);
        Some(format!("{}/{}", current, run.n_trials))
    }

    /// Forget everything about the previous run
    pub(crate) fn reset(&mut self, run_id: Option<Uuid>) {
        *self = RunSnapshot {
            run_id,
            ..RunSnapshot::default()
        };
    }
}
