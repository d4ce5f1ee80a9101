//! `typografd`: a JSON front end for the typograph web service.
//!
//! Every path is handled the same way. `POST` takes `{"data": "..."}`,
//! sends the text to the typograph service and answers with the same
//! object where `data` holds the typographed text. `OPTIONS` answers the
//! CORS preflight. Errors come back as JSON with the status code repeated
//! in the body.

pub mod config;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{error, info};
use typograf_core::{typogrify, Transport, TypografClient, TypografError, DEFAULT_ENCODING};

pub use config::ServerConfig;

const JSON_UTF8: &str = "application/json; charset=UTF-8";
const ALLOW_HEADERS: &str = "Accept, Accept-Language, Content-Language, Content-Type";
const PREFLIGHT_METHODS: &str = "GET, POST, PUT, DELETE";
const RESPONSE_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const TIMEOUT_MESSAGE: &str = "typograf service took too long to respond";

/// Request and success body. Fields other than `data` and `encoding` are
/// echoed back untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TextPayload {
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub encoding: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

/// Error body. Empty fields are omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data: String,
}

fn is_zero(n: &u16) -> bool {
    *n == 0
}

#[derive(Clone)]
pub struct AppState {
    client: TypografClient,
    upstream: Arc<dyn Transport>,
}

impl AppState {
    pub fn new(client: TypografClient, upstream: Arc<dyn Transport>) -> Self {
        Self { client, upstream }
    }

    pub fn client(&self) -> &TypografClient {
        &self.client
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("client", &self.client)
            .field("upstream", &self.upstream)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Upstream(#[from] TypografError),
}

impl ServiceError {
    fn status(&self) -> StatusCode {
        match self {
            ServiceError::Upstream(TypografError::Transport(e)) if e.is_timeout() => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &'static str {
        match self.status() {
            StatusCode::SERVICE_UNAVAILABLE => TIMEOUT_MESSAGE,
            _ => "",
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        error!(status = status.as_u16(), error = %self, "request failed");
        let body = ErrorBody {
            error: self.to_string(),
            message: self.message().to_string(),
            status_code: status.as_u16(),
            data: String::new(),
        };
        (status, [(header::CONTENT_TYPE, JSON_UTF8)], Json(body)).into_response()
    }
}

pub fn app(state: AppState) -> Router {
    Router::new().fallback(handle).with_state(state)
}

pub async fn run(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    axum::serve(listener, app(state)).await
}

async fn handle(State(state): State<AppState>, method: Method, body: Bytes) -> Response {
    match method {
        Method::OPTIONS => (StatusCode::OK, cors(PREFLIGHT_METHODS)).into_response(),
        Method::POST => match process(&state, &body).await {
            Ok(payload) => (StatusCode::OK, cors(RESPONSE_METHODS), payload).into_response(),
            Err(err) => err.into_response(),
        },
        _ => StatusCode::OK.into_response(),
    }
}

async fn process(state: &AppState, body: &[u8]) -> Result<String, ServiceError> {
    let mut payload: TextPayload = serde_json::from_slice(body)?;
    if payload.encoding.is_empty() {
        payload.encoding = DEFAULT_ENCODING.to_string();
    }

    payload.data = typogrify(
        state.upstream.as_ref(),
        &state.client,
        &payload.data,
        &payload.encoding,
    )
    .await?;
    info!(chars = payload.data.chars().count(), "text typographed");

    Ok(serde_json::to_string(&payload)?)
}

fn cors(allow_methods: &'static str) -> [(HeaderName, &'static str); 4] {
    [
        (header::CONTENT_TYPE, JSON_UTF8),
        (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        (header::ACCESS_CONTROL_ALLOW_HEADERS, ALLOW_HEADERS),
        (header::ACCESS_CONTROL_ALLOW_METHODS, allow_methods),
    ]
}
