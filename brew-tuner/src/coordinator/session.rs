//! Tracking session for one run
//!
//! A session is one background task that owns both update sources: the push
//! channel and, after it fails, the poll interval. Cancelling the task drops
//! whichever source is live, so tearing a session down releases everything.
//!
//! State machine:
//!
//! ```text
//! Retrying ──open ok──> Connected ──error / early close──> Polling ──finished──> Disconnected
//!     └────open failed───────────────────────────────────────┘
//! Connected ──close after finished──> Disconnected
//! ```

use super::describe;
use super::state::{ConnectionStatus, RunSnapshot, ScorePoint};
use crate::client::RunBackend;
use brew_common::RunEvent;
use chrono::Utc;
use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Snapshot channel plus the generation that guards session writes
pub(crate) struct Shared {
    snapshot: watch::Sender<RunSnapshot>,
    generation: AtomicU64,
}

impl Shared {
    pub(crate) fn new() -> Self {
        let (snapshot, _) = watch::channel(RunSnapshot::default());
        Self {
            snapshot,
            generation: AtomicU64::new(0),
        }
    }

    pub(crate) fn snapshot(&self) -> RunSnapshot {
        self.snapshot.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<RunSnapshot> {
        self.snapshot.subscribe()
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&RunSnapshot) -> R) -> R {
        f(&self.snapshot.borrow())
    }

    /// Unconditional update from coordinator code
    pub(crate) fn update(&self, f: impl FnOnce(&mut RunSnapshot)) {
        self.snapshot.send_modify(f);
    }

    /// Start a new generation; writes from older sessions are dropped from now on
    pub(crate) fn next_generation(&self, f: impl FnOnce(&mut RunSnapshot)) -> u64 {
        let mut generation = 0;
        self.snapshot.send_modify(|s| {
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            f(s);
        });
        generation
    }

    /// Session update; discarded when `generation` is no longer current
    fn update_from(&self, generation: u64, f: impl FnOnce(&mut RunSnapshot)) -> bool {
        self.snapshot.send_if_modified(|s| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            f(s);
            true
        })
    }
}

/// Everything the session task needs, owned
pub(crate) struct SessionContext {
    pub backend: Arc<dyn RunBackend>,
    pub shared: Arc<Shared>,
    pub generation: u64,
    pub run_id: Uuid,
    pub token: String,
    pub poll_interval: Duration,
}

/// Handle to a running session task
pub(crate) struct Session {
    run_id: Uuid,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Session {
    pub(crate) fn spawn(ctx: SessionContext) -> Self {
        let cancel = CancellationToken::new();
        let run_id = ctx.run_id;
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = task_cancel.cancelled() => {
                    debug!(run_id = %ctx.run_id, "Tracking session cancelled");
                }
                _ = drive(&ctx) => {
                    debug!(run_id = %ctx.run_id, "Tracking session ended");
                }
            }
        });
        Self { run_id, cancel, handle }
    }

    pub(crate) fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Cancel and wait until the push channel and poll timer are released
    pub(crate) async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Err(e) = (&mut self.handle).await {
            if e.is_panic() {
                warn!(run_id = %self.run_id, "Tracking session panicked: {}", e);
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

async fn drive(ctx: &SessionContext) {
    ctx.shared.update_from(ctx.generation, |s| s.connection = ConnectionStatus::Retrying);

    match ctx.backend.open_events(ctx.run_id, &ctx.token).await {
        Ok(mut events) => {
            info!(run_id = %ctx.run_id, "Live updates connected");
            ctx.shared.update_from(ctx.generation, |s| {
                s.connection = ConnectionStatus::Connected;
                s.activity.push("Live updates connected.");
            });

            while let Some(item) = events.next().await {
                match item {
                    Ok(event) => apply_event(ctx, &event),
                    Err(e) => {
                        warn!(run_id = %ctx.run_id, "Live updates failed: {}", e);
                        break;
                    }
                }
            }
            drop(events);

            let finished = ctx.shared.read(|s| s.run.as_ref().is_some_and(|r| r.is_finished()));
            if finished {
                info!(run_id = %ctx.run_id, "Run finished; live updates closed");
                ctx.shared.update_from(ctx.generation, |s| s.connection = ConnectionStatus::Disconnected);
                return;
            }
        }
        Err(e) => warn!(run_id = %ctx.run_id, "Could not open live updates: {}", e),
    }

    poll(ctx).await;
}

fn apply_event(ctx: &SessionContext, event: &RunEvent) {
    debug!(
        run_id = %ctx.run_id,
        trial = event.trial_number,
        status = %event.run_status,
        "Run event received"
    );
    ctx.shared.update_from(ctx.generation, |s| {
        s.last_event_at = Some(Utc::now());
        if let Some(run) = s.run.as_mut() {
            run.apply_event(event);
        }
        s.activity
            .push(format!("Event: trial={}, status={}", event.trial_number, event.run_status));
        if let Some(score) = event.last_trial_score {
            s.score_history.push(ScorePoint {
                trial: event.trial_number,
                score,
            });
        }
    });
}

async fn poll(ctx: &SessionContext) {
    let period = ctx.poll_interval;
    warn!(run_id = %ctx.run_id, "Falling back to polling every {:?}", period);
    ctx.shared.update_from(ctx.generation, |s| {
        s.connection = ConnectionStatus::Polling;
        s.activity
            .push(format!("Live updates unavailable, polling every {}.", format_interval(period)));
    });

    // First pull one full period after the fallback
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match ctx.backend.get_run(ctx.run_id).await {
            Ok(run) => {
                let finished = run.is_finished();
                ctx.shared.update_from(ctx.generation, |s| {
                    s.run = Some(run);
                    if finished {
                        s.connection = ConnectionStatus::Disconnected;
                        s.activity.push("Run finished.");
                    }
                });
                if finished {
                    info!(run_id = %ctx.run_id, "Run finished; polling stopped");
                    return;
                }
            }
            Err(e) => {
                warn!(run_id = %ctx.run_id, "Poll failed: {}", e);
                ctx.shared.update_from(ctx.generation, |s| s.last_error = Some(describe(&e)));
            }
        }
    }
}

/// `2s`, `1.5s`
fn format_interval(period: Duration) -> String {
    if period.subsec_millis() == 0 {
        format!("{}s", period.as_secs())
    } else {
        format!("{:.1}s", period.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_interval() {
        assert_eq!(format_interval(Duration::from_secs(2)), "2s");
        assert_eq!(format_interval(Duration::from_millis(1500)), "1.5s");
    }

    #[test]
    fn test_stale_generation_write_discarded() {
        let shared = Shared::new();
        let old = shared.next_generation(|_| {});
        let _current = shared.next_generation(|_| {});

        assert!(!shared.update_from(old, |s| s.last_error = Some("late".into())));
        assert_eq!(shared.snapshot().last_error, None);
    }
}
