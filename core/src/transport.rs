//! The transport seam: executes one `HttpRequest` and hands back the
//! `HttpResponse`.
//!
//! # Design
//! `Transport` is the only place that touches the network. Callers build
//! requests and interpret responses themselves, so any HTTP primitive can
//! be plugged in. Non-2xx answers are data, not errors: only a round trip
//! that produced no status at all is a `TransportError`.

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;
use ureq::typestate::WithBody;
use ureq::{Agent, RequestBuilder};

use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Executes HTTP round trips.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Perform `request` and return whatever the server answered.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Real HTTP over `ureq`.
///
/// `ureq` is blocking, so every request runs on tokio's blocking pool and
/// the awaiting task is never stalled. Status codes are never turned into
/// errors.
#[derive(Clone)]
pub struct UreqTransport {
    agent: Agent,
    timeout: Option<Duration>,
}

impl UreqTransport {
    /// A transport without any timeout.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// A transport that gives up on the whole round trip after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::build(Some(timeout))
    }

    fn build(timeout: Option<Duration>) -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build()
            .new_agent();
        Self { agent, timeout }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[async_trait]
impl Transport for UreqTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let agent = self.agent.clone();
        let method = request.method;
        let url = request.url.clone();
        let start = Instant::now();

        let result = tokio::task::spawn_blocking(move || perform(&agent, request))
            .await
            .map_err(|e| TransportError::Join(e.to_string()))?;

        match &result {
            Ok(response) => debug!(
                %method,
                %url,
                status = response.status,
                elapsed = ?start.elapsed(),
                "origin request made"
            ),
            Err(err) => debug!(%method, %url, elapsed = ?start.elapsed(), error = %err, "origin request failed"),
        }
        result
    }
}

fn perform(agent: &Agent, request: HttpRequest) -> Result<HttpResponse, TransportError> {
    let HttpRequest {
        method,
        url,
        headers,
        body,
    } = request;
    let url = url.as_str();

    let response = match (method, body) {
        (HttpMethod::Get, _) => with_headers(agent.get(url), &headers).call(),
        (HttpMethod::Head, _) => with_headers(agent.head(url), &headers).call(),
        (HttpMethod::Post, body) => send_body(with_headers(agent.post(url), &headers), body),
        (HttpMethod::Put, body) => send_body(with_headers(agent.put(url), &headers), body),
        (HttpMethod::Patch, body) => send_body(with_headers(agent.patch(url), &headers), body),
        (HttpMethod::Delete, None) => with_headers(agent.delete(url), &headers).call(),
        (HttpMethod::Delete, Some(body)) => with_headers(agent.delete(url), &headers)
            .force_send_body()
            .send(body.as_bytes()),
        (HttpMethod::Options, None) => with_headers(agent.options(url), &headers).call(),
        (HttpMethod::Options, Some(body)) => with_headers(agent.options(url), &headers)
            .force_send_body()
            .send(body.as_bytes()),
    };
    let mut response = response.map_err(network_error)?;

    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    // No size cap, and invalid UTF-8 becomes U+FFFD, as a browser would.
    let bytes = response
        .body_mut()
        .with_config()
        .limit(u64::MAX)
        .read_to_vec()
        .map_err(|e| match e {
            ureq::Error::Timeout(_) => TransportError::Timeout(e.to_string()),
            other => TransportError::Body(other.to_string()),
        })?;
    let body = String::from_utf8_lossy(&bytes).into_owned();

    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}

fn with_headers<B>(mut builder: RequestBuilder<B>, headers: &[(String, String)]) -> RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn send_body(
    builder: RequestBuilder<WithBody>,
    body: Option<String>,
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    match body {
        Some(body) => builder.send(body.as_bytes()),
        None => builder.send_empty(),
    }
}

fn network_error(err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Timeout(_) => TransportError::Timeout(err.to_string()),
        other => TransportError::Network(other.to_string()),
    }
}

/// Replays queued responses in order and records every request it sees.
///
/// When the queue runs dry, further requests fail with
/// `TransportError::Network`.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response to be returned by the next unanswered request.
    pub fn with_response(mut self, response: HttpResponse) -> Self {
        self.replies.get_mut().push_back(Ok(response));
        self
    }

    /// Queue a transport failure.
    pub fn with_failure(mut self, error: TransportError) -> Self {
        self.replies.get_mut().push_back(Err(error));
        self
    }

    /// Requests received so far, oldest first.
    pub async fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().await.push(request);
        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Network("no scripted response left".to_string())))
    }
}
