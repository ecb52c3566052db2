use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::http::{HttpError, HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};

pub const GRAPHQL_URL: &str = "https://api.github.com/graphql";
pub const REST_BASE_URL: &str = "https://api.github.com";

/// Simultaneous in-flight requests allowed by default.
pub const DEFAULT_MAX_CONNECTIONS: usize = 10;

const USER_AGENT: &str = "github-stats";
const COMMIT_SEARCH_ACCEPT: &str = "application/vnd.github.cloak-preview+json";

/// Retry budget for REST calls.
///
/// GitHub answers 202 while it computes repository statistics and 403 when
/// the token is rate limited; both are waited out with a fixed delay.
#[derive(Debug, Clone)]
pub struct RestRetryPolicy {
    pub max_attempts: u32,
    /// Wait after a 202 (statistics still being computed).
    pub processing_delay: Duration,
    /// Wait after a 403 (rate limited).
    pub rate_limit_delay: Duration,
}

impl Default for RestRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            processing_delay: Duration::from_secs(2),
            rate_limit_delay: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Error)]
enum FetchError {
    #[error(transparent)]
    Transport(#[from] HttpError),

    #[error("response body is not JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("request limiter was closed")]
    LimiterClosed,
}

/// What one REST exchange means for the retry loop.
#[derive(Debug)]
enum RestOutcome {
    Data(Value),
    Absent,
    Wait(Duration),
    Failed,
}

/// Which tier produced a response; the fallback tier only trusts a 200.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Primary,
    Fallback,
}

/// GitHub GraphQL + REST client.
///
/// Never surfaces network faults: every call degrades to an empty JSON object
/// once its retry budget is spent, and callers read empty as "no data".
#[derive(Clone)]
pub struct GithubClient {
    token: Arc<String>,
    http: Arc<dyn HttpTransport>,
    limiter: Arc<Semaphore>,
    retry: RestRetryPolicy,
    graphql_url: String,
    rest_base_url: String,
}

impl GithubClient {
    /// Client over a fresh reqwest connection pool.
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_transport(token, Arc::new(ReqwestTransport::default()))
    }

    pub fn with_transport(token: impl Into<String>, http: Arc<dyn HttpTransport>) -> Self {
        Self {
            token: Arc::new(token.into()),
            http,
            limiter: Arc::new(Semaphore::new(DEFAULT_MAX_CONNECTIONS)),
            retry: RestRetryPolicy::default(),
            graphql_url: GRAPHQL_URL.to_string(),
            rest_base_url: REST_BASE_URL.to_string(),
        }
    }

    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.limiter = Arc::new(Semaphore::new(max_connections.max(1)));
        self
    }

    pub fn with_retry_policy(mut self, retry: RestRetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sends one request while holding a limiter permit and decodes the body.
    ///
    /// The permit is released before the caller sleeps on a backoff.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, FetchError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| FetchError::LimiterClosed)?;
        debug!(method = request.method.as_str(), url = %request.url, "sending request");
        Ok(self.http.send(request).await?)
    }

    async fn send_json(&self, request: HttpRequest) -> Result<Value, FetchError> {
        let response = self.send(request).await?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    fn graphql_request(&self, query: &str) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Post,
            url: self.graphql_url.clone(),
            headers: vec![
                ("Authorization".to_string(), format!("Bearer {}", self.token)),
                ("User-Agent".to_string(), USER_AGENT.to_string()),
                ("Content-Type".to_string(), "application/json".to_string()),
            ],
            body: serde_json::json!({ "query": query }).to_string().into_bytes(),
        }
    }

    /// POSTs a GraphQL document and returns the decoded JSON object.
    ///
    /// A transport or decode failure is retried once through the fallback
    /// tier; if that fails too the result is an empty object. GraphQL-level
    /// `errors` are logged and the payload is still returned.
    pub async fn query(&self, query: &str) -> Value {
        let request = self.graphql_request(query);

        let result = match self.send_json(request.clone()).await {
            Ok(json) => Ok(json),
            Err(e) => {
                warn!(error = %e, "GraphQL request failed, retrying through fallback");
                self.send_json(request).await
            }
        };

        match result {
            Ok(Value::Null) => empty_object(),
            Ok(json) => {
                if let Some(errors) = json.get("errors") {
                    warn!("GraphQL reported errors: {errors}");
                }
                json
            }
            Err(e) => {
                warn!(error = %e, "GraphQL fallback failed, returning no data");
                empty_object()
            }
        }
    }

    fn rest_request(&self, path: &str, params: &[(&str, &str)]) -> Result<HttpRequest, String> {
        let base = format!("{}/{}", self.rest_base_url.trim_end_matches('/'), path);
        let url = if params.is_empty() {
            Url::parse(&base)
        } else {
            Url::parse_with_params(&base, params)
        }
        .map_err(|e| e.to_string())?;

        let mut headers = vec![
            ("Authorization".to_string(), format!("token {}", self.token)),
            ("User-Agent".to_string(), USER_AGENT.to_string()),
        ];
        if path.starts_with("search/commits") {
            headers.push(("Accept".to_string(), COMMIT_SEARCH_ACCEPT.to_string()));
        }

        Ok(HttpRequest {
            method: HttpMethod::Get,
            url: url.to_string(),
            headers,
            body: Vec::new(),
        })
    }

    fn classify(&self, path: &str, response: HttpResponse, tier: Tier) -> RestOutcome {
        match response.status {
            202 => RestOutcome::Wait(self.retry.processing_delay),
            403 => {
                let remaining = response.header("x-ratelimit-remaining").unwrap_or("?");
                debug!(path, remaining, "rate limited");
                RestOutcome::Wait(self.retry.rate_limit_delay)
            }
            404 => RestOutcome::Absent,
            200 => match serde_json::from_slice::<Value>(&response.body) {
                Ok(Value::Null) => RestOutcome::Data(empty_object()),
                Ok(json) => RestOutcome::Data(json),
                Err(e) => {
                    warn!(path, error = %e, "REST response body is not JSON");
                    RestOutcome::Failed
                }
            },
            status if tier == Tier::Primary => {
                match serde_json::from_slice::<Value>(&response.body) {
                    Ok(json) => {
                        warn!(path, status, "REST request returned an unexpected status");
                        RestOutcome::Data(json)
                    }
                    Err(_) => RestOutcome::Failed,
                }
            }
            status => {
                warn!(path, status, "fallback REST request returned an unexpected status");
                RestOutcome::Failed
            }
        }
    }

    /// GETs a REST path and returns the decoded JSON.
    ///
    /// Retries on 202 and 403 with fixed delays, answers 404 with an empty
    /// object, and falls back to a second attempt when the primary one fails
    /// at the transport level. Spending the whole budget yields an empty
    /// object.
    pub async fn query_rest(&self, path: &str, params: &[(&str, &str)]) -> Value {
        let path = path.trim_start_matches('/');
        let request = match self.rest_request(path, params) {
            Ok(request) => request,
            Err(e) => {
                warn!(path, error = %e, "could not build REST URL");
                return empty_object();
            }
        };

        let max_attempts = self.retry.max_attempts;
        for attempt in 1..=max_attempts {
            let outcome = match self.send(request.clone()).await {
                Ok(response) => self.classify(path, response, Tier::Primary),
                Err(e) => {
                    warn!(path, error = %e, "REST request failed, retrying through fallback");
                    RestOutcome::Failed
                }
            };

            let outcome = match outcome {
                RestOutcome::Failed => match self.send(request.clone()).await {
                    Ok(response) => self.classify(path, response, Tier::Fallback),
                    Err(e) => {
                        warn!(path, error = %e, "REST fallback failed");
                        RestOutcome::Failed
                    }
                },
                other => other,
            };

            match outcome {
                RestOutcome::Data(json) => return json,
                RestOutcome::Absent => {
                    debug!(path, "resource not found, skipping");
                    return empty_object();
                }
                RestOutcome::Wait(delay) => {
                    info!(
                        path,
                        attempt,
                        max_attempts,
                        "resource not ready, retrying in {delay:?}"
                    );
                    sleep(delay).await;
                }
                RestOutcome::Failed => {}
            }
        }

        warn!(path, max_attempts, "too many retries, data will be incomplete");
        empty_object()
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}
