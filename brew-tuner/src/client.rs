//! Optimizer backend client
//!
//! [`RunBackend`] is the seam between the coordinator and the optimizer
//! service. [`HttpBackend`] talks JSON over HTTP with `reqwest`; tests swap in
//! in-memory fakes.
//!
//! **Error mapping:**
//! - Non-2xx → [`Error::Transport`] with the server `detail` when present,
//!   otherwise the canonical status reason
//! - Connection failures and timeouts → [`Error::Network`]
//! - Undecodable bodies → [`Error::Parse`]

use crate::sse::decode_run_events;
use async_trait::async_trait;
use brew_common::api::{
    ApiErrorBody, RecommendationRequest, RecommendationResponse, Run, StartRunRequest, SubmitScoreRequest,
};
use brew_common::{Error, Result, RunEvent};
use futures::stream::Stream;
use serde::de::DeserializeOwned;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Timeout applied to every request except the event stream
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("brew-tuner/", env!("CARGO_PKG_VERSION"));

/// Push-channel events; ends when the server closes the stream
pub type EventStream = Pin<Box<dyn Stream<Item = Result<RunEvent>> + Send>>;

/// Operations the optimizer backend provides
#[async_trait]
pub trait RunBackend: Send + Sync {
    /// `POST /optimizer/runs/start`
    async fn start_run(&self, request: &StartRunRequest) -> Result<Run>;

    /// `GET /optimizer/runs/{id}`
    async fn get_run(&self, run_id: Uuid) -> Result<Run>;

    /// `GET /optimizer/runs`
    async fn list_runs(&self) -> Result<Vec<Run>>;

    /// `POST /optimizer/runs/{id}/submit_score`
    async fn submit_score(&self, run_id: Uuid, request: &SubmitScoreRequest) -> Result<Run>;

    /// `POST /optimizer/recommendation`
    async fn fetch_recommendation(&self, request: &RecommendationRequest) -> Result<RecommendationResponse>;

    /// Open `GET /optimizer/runs/{id}/events?token=...`
    ///
    /// Resolves once the server has accepted the subscription.
    async fn open_events(&self, run_id: Uuid, token: &str) -> Result<EventStream>;
}

/// `reqwest`-backed [`RunBackend`]
#[derive(Clone)]
pub struct HttpBackend {
    http_client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpBackend {
    /// # Arguments
    /// * `base_url` - API root, e.g. `http://localhost:8000/api/v1`
    /// * `token` - Bearer token sent with every request when present
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        // No client-wide timeout: it would also cut the long-lived event stream
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: reqwest::RequestBuilder) -> Result<T> {
        let response = self
            .authorized(builder)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(network_error)?;

        let response = check_status(response).await?;
        response.json::<T>().await.map_err(|e| Error::Parse(e.to_string()))
    }
}

fn network_error(e: reqwest::Error) -> Error {
    debug!(error = %e, "Backend request failed before a response");
    Error::Network("could not reach the optimizer service".to_string())
}

/// Pass 2xx responses through; turn anything else into [`Error::Transport`]
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .ok()
        .and_then(|b| b.message())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_string());

    Err(Error::Transport {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl RunBackend for HttpBackend {
    async fn start_run(&self, request: &StartRunRequest) -> Result<Run> {
        debug!(method = %request.method, n_trials = request.n_trials, "Starting optimizer run");
        let run: Run = self
            .send_json(self.http_client.post(self.url("/optimizer/runs/start")).json(request))
            .await?;
        info!(run_id = %run.id, "Optimizer run created");
        Ok(run)
    }

    async fn get_run(&self, run_id: Uuid) -> Result<Run> {
        self.send_json(self.http_client.get(self.url(&format!("/optimizer/runs/{}", run_id))))
            .await
    }

    async fn list_runs(&self) -> Result<Vec<Run>> {
        self.send_json(self.http_client.get(self.url("/optimizer/runs"))).await
    }

    async fn submit_score(&self, run_id: Uuid, request: &SubmitScoreRequest) -> Result<Run> {
        debug!(run_id = %run_id, trial_id = request.trial_id, score = request.score, "Submitting score");
        self.send_json(
            self.http_client
                .post(self.url(&format!("/optimizer/runs/{}/submit_score", run_id)))
                .json(request),
        )
        .await
    }

    async fn fetch_recommendation(&self, request: &RecommendationRequest) -> Result<RecommendationResponse> {
        request.validate()?;
        self.send_json(self.http_client.post(self.url("/optimizer/recommendation")).json(request))
            .await
    }

    async fn open_events(&self, run_id: Uuid, token: &str) -> Result<EventStream> {
        let url = self.url(&format!("/optimizer/runs/{}/events", run_id));
        debug!(url = %url, "Opening run event stream");

        let response = self
            .http_client
            .get(&url)
            .query(&[("token", token)])
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(network_error)?;
        let response = check_status(response).await?;

        Ok(Box::pin(decode_run_events(response.bytes_stream())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let backend = HttpBackend::new("http://localhost:8000/api/v1/", None).unwrap();
        assert_eq!(backend.base_url(), "http://localhost:8000/api/v1");
        assert_eq!(
            backend.url("/optimizer/runs"),
            "http://localhost:8000/api/v1/optimizer/runs"
        );
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_error() {
        // Port 9 (discard) on localhost is not expected to accept HTTP
        let backend = HttpBackend::new("http://127.0.0.1:9", None).unwrap();
        let err = backend.list_runs().await.unwrap_err();
        assert!(err.is_transport());
        assert!(err.to_string().contains("Network unreachable"));
    }

    #[tokio::test]
    async fn test_invalid_recommendation_request_not_sent() {
        let backend = HttpBackend::new("http://127.0.0.1:9", None).unwrap();
        let request = RecommendationRequest {
            dataset_prefix: "v60.".to_string(),
            method: Default::default(),
            persons: vec![],
            best_only: false,
            prior_weight: 2.0,
        };
        assert!(backend.fetch_recommendation(&request).await.unwrap_err().is_validation());
    }
}
