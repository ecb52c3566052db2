use async_trait::async_trait;
use thiserror::Error;

/// HTTP verbs used against the GitHub APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// Header pairs. Lookups through [`header_get`] are case-insensitive.
pub type HttpHeaders = Vec<(String, String)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        header_get(&self.headers, name)
    }
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("http transport error: {0}")]
    Transport(String),

    #[cfg(test)]
    #[error("no mock response registered for {method} {url}")]
    NoMockResponse { method: String, url: String },
}

/// Boundary for every byte that leaves the process.
///
/// The GitHub client only talks to this trait, so tests can swap in an
/// in-memory transport and count what was sent.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

pub fn header_get<'a>(headers: &'a HttpHeaders, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Real transport backed by a shared reqwest client.
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        };

        let mut builder = self.client.request(method, &request.url);
        for (k, v) in request.headers {
            builder = builder.header(&k, &v);
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| HttpError::Transport(e.to_string()))?;

        let status = resp.status().as_u16();
        let headers: HttpHeaders = resp
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();

        let body = resp
            .bytes()
            .await
            .map_err(|e| HttpError::Transport(e.to_string()))?
            .to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

// ---------- Test-only mock transport ----------

#[cfg(test)]
pub use mock::MockTransport;

#[cfg(test)]
mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    type Handler = dyn Fn(&HttpRequest) -> Result<HttpResponse, HttpError> + Send + Sync;

    /// In-memory transport driven by a routing closure.
    ///
    /// Records every request and the peak number of concurrent sends so tests
    /// can assert on call counts and on the concurrency bound.
    #[derive(Clone)]
    pub struct MockTransport {
        handler: Arc<Handler>,
        requests: Arc<Mutex<Vec<HttpRequest>>>,
        latency: Duration,
        in_flight: Arc<AtomicUsize>,
        peak_in_flight: Arc<AtomicUsize>,
    }

    impl MockTransport {
        pub fn new<F>(handler: F) -> Self
        where
            F: Fn(&HttpRequest) -> Result<HttpResponse, HttpError> + Send + Sync + 'static,
        {
            Self {
                handler: Arc::new(handler),
                requests: Arc::new(Mutex::new(Vec::new())),
                latency: Duration::ZERO,
                in_flight: Arc::new(AtomicUsize::new(0)),
                peak_in_flight: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// Every send sleeps for `latency` before answering.
        pub fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = latency;
            self
        }

        pub fn json(status: u16, body: serde_json::Value) -> Result<HttpResponse, HttpError> {
            Ok(HttpResponse {
                status,
                headers: vec![("Content-Type".to_string(), "application/json".to_string())],
                body: body.to_string().into_bytes(),
            })
        }

        pub fn requests(&self) -> Vec<HttpRequest> {
            self.requests
                .lock()
                .expect("mock transport lock should not be poisoned")
                .clone()
        }

        /// Number of recorded requests whose URL or body contains `needle`.
        pub fn count_matching(&self, needle: &str) -> usize {
            self.requests()
                .iter()
                .filter(|r| r.url.contains(needle) || body_text(r).contains(needle))
                .count()
        }

        pub fn peak_in_flight(&self) -> usize {
            self.peak_in_flight.load(Ordering::SeqCst)
        }
    }

    /// Request body as text, used by routing closures to match GraphQL documents.
    pub fn body_text(request: &HttpRequest) -> String {
        String::from_utf8_lossy(&request.body).into_owned()
    }

    #[async_trait]
    impl HttpTransport for MockTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

            self.requests
                .lock()
                .expect("mock transport lock should not be poisoned")
                .push(request.clone());

            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }

            let result = (self.handler)(&request);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }
}

#[cfg(test)]
pub use mock::body_text;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_get_is_case_insensitive_and_returns_first_match() {
        let headers: HttpHeaders = vec![
            ("Authorization".to_string(), "token a".to_string()),
            ("authorization".to_string(), "token b".to_string()),
        ];
        assert_eq!(header_get(&headers, "AUTHORIZATION"), Some("token a"));
        assert_eq!(header_get(&headers, "missing"), None);
    }

    #[test]
    fn http_method_as_str_matches_expected_values() {
        assert_eq!(HttpMethod::Get.as_str(), "GET");
        assert_eq!(HttpMethod::Post.as_str(), "POST");
    }

    #[tokio::test]
    async fn mock_transport_records_requests_and_answers_through_handler() {
        let transport = MockTransport::new(|req| {
            if req.url.ends_with("/ok") {
                MockTransport::json(200, serde_json::json!({ "ok": true }))
            } else {
                Err(HttpError::NoMockResponse {
                    method: req.method.as_str().to_string(),
                    url: req.url.clone(),
                })
            }
        });

        let req = HttpRequest {
            method: HttpMethod::Get,
            url: "https://example.com/ok".to_string(),
            headers: vec![("Accept".to_string(), "application/json".to_string())],
            body: Vec::new(),
        };
        let resp = transport.send(req.clone()).await.expect("mock response");
        assert_eq!(resp.status, 200);
        assert_eq!(resp.header("content-type"), Some("application/json"));
        assert_eq!(resp.body, br#"{"ok":true}"#.to_vec());
        assert_eq!(transport.requests(), vec![req]);

        let missing = HttpRequest {
            method: HttpMethod::Get,
            url: "https://example.com/missing".to_string(),
            headers: Vec::new(),
            body: Vec::new(),
        };
        let err = transport.send(missing).await.expect_err("no route");
        assert!(matches!(err, HttpError::NoMockResponse { .. }));
        assert_eq!(transport.count_matching("example.com"), 2);
    }

    #[tokio::test]
    async fn reqwest_transport_reports_invalid_url_as_transport_error() {
        let transport = ReqwestTransport::default();
        let req = HttpRequest {
            method: HttpMethod::Get,
            url: "not a url".to_string(),
            headers: Vec::new(),
            body: Vec::new(),
        };

        let err = transport.send(req).await.expect_err("expected error");
        assert!(matches!(err, HttpError::Transport(_)));
    }
}
