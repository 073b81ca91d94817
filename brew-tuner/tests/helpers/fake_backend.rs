//! Scripted in-memory optimizer backend
//!
//! Records when push channels open and close so tests can check that at most
//! one update source is live at any time.

use async_trait::async_trait;
use brew_common::api::{
    RecommendationRequest, RecommendationResponse, StartRunRequest, SubmitScoreRequest,
};
use brew_common::{Error, Result, Run, RunEvent};
use brew_tuner::{EventStream, RunBackend};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// What the push channel of one run does
#[derive(Debug, Clone)]
pub enum EventScript {
    /// Send the events, then stay open
    Open(Vec<RunEvent>),
    /// Send the events, then end the stream
    Close(Vec<RunEvent>),
    /// Reject the subscription
    Refuse,
}

/// Records `close <id>` when the stream holding it is dropped
struct ChannelGuard {
    log: Arc<Mutex<Vec<String>>>,
    run_id: Uuid,
}

impl Drop for ChannelGuard {
    fn drop(&mut self) {
        self.log.lock().unwrap().push(format!("close {}", self.run_id));
    }
}

#[derive(Default)]
pub struct FakeBackend {
    channel_log: Arc<Mutex<Vec<String>>>,
    scripts: Mutex<HashMap<Uuid, EventScript>>,
    polls: Mutex<VecDeque<Result<Run>>>,
    start_result: Mutex<Option<Result<Run>>>,
    submit_result: Mutex<Option<Result<Run>>>,
    runs: Mutex<Vec<Run>>,
    get_calls: AtomicUsize,
    submit_calls: AtomicUsize,
    tokens: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script_events(&self, run_id: Uuid, script: EventScript) {
        self.scripts.lock().unwrap().insert(run_id, script);
    }

    /// Queue the answer to the next `get_run`
    pub fn push_poll(&self, result: Result<Run>) {
        self.polls.lock().unwrap().push_back(result);
    }

    pub fn set_start_result(&self, result: Result<Run>) {
        *self.start_result.lock().unwrap() = Some(result);
    }

    pub fn set_submit_result(&self, result: Result<Run>) {
        *self.submit_result.lock().unwrap() = Some(result);
    }

    pub fn set_runs(&self, runs: Vec<Run>) {
        *self.runs.lock().unwrap() = runs;
    }

    /// `open <id>` / `close <id>` in the order they happened
    pub fn channel_log(&self) -> Vec<String> {
        self.channel_log.lock().unwrap().clone()
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }
}

fn not_found() -> Error {
    Error::Transport {
        status: 404,
        message: "Run not found".to_string(),
    }
}

#[async_trait]
impl RunBackend for FakeBackend {
    async fn start_run(&self, _request: &StartRunRequest) -> Result<Run> {
        self.start_result
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(Error::Network("no start result scripted".to_string())))
    }

    async fn get_run(&self, _run_id: Uuid) -> Result<Run> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.polls.lock().unwrap().pop_front().unwrap_or_else(|| Err(not_found()))
    }

    async fn list_runs(&self) -> Result<Vec<Run>> {
        Ok(self.runs.lock().unwrap().clone())
    }

    async fn submit_score(&self, _run_id: Uuid, _request: &SubmitScoreRequest) -> Result<Run> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.submit_result.lock().unwrap().take().unwrap_or_else(|| Err(not_found()))
    }

    async fn fetch_recommendation(&self, _request: &RecommendationRequest) -> Result<RecommendationResponse> {
        Ok(RecommendationResponse::default())
    }

    async fn open_events(&self, run_id: Uuid, token: &str) -> Result<EventStream> {
        self.tokens.lock().unwrap().push(token.to_string());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .remove(&run_id)
            .unwrap_or(EventScript::Open(Vec::new()));

        let (events, hold_open) = match script {
            EventScript::Refuse => {
                return Err(Error::Transport {
                    status: 401,
                    message: "Invalid token".to_string(),
                })
            }
            EventScript::Open(events) => (events, true),
            EventScript::Close(events) => (events, false),
        };

        self.channel_log.lock().unwrap().push(format!("open {}", run_id));
        let guard = ChannelGuard {
            log: Arc::clone(&self.channel_log),
            run_id,
        };

        Ok(Box::pin(async_stream::stream! {
            let _guard = guard;
            for event in events {
                yield Ok(event);
            }
            if hold_open {
                futures::future::pending::<()>().await;
            }
        }))
    }
}
