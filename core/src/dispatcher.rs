//! Single-shot JSON request dispatch with success/error callbacks.
//!
//! # Design
//! Every call is independent: `send` builds the request on the caller's
//! thread, spawns one task that owns the request and both callbacks, and
//! returns at once. The task waits for the transport, then makes exactly
//! one completion decision:
//!
//! - status 200: the body is parsed as JSON and handed to `on_success`;
//! - any other status with a body: the body is parsed and handed to
//!   `on_error`;
//! - any other status with an empty body: nothing fires.
//!
//! A body that fails to parse is never rerouted to `on_error`; the task
//! resolves to `DispatchError::Decode` instead. There is no timeout and no
//! retry here.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

use crate::error::DispatchError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, JSON_CONTENT_TYPE};
use crate::transport::Transport;

/// Receives the parsed response body of a completed request.
pub type Callback = Box<dyn FnOnce(Value) + Send + 'static>;

/// What happens when the caller supplies no callback for a branch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DefaultHandler {
    /// Log verb, URL and response under a `success` or `error` label.
    #[default]
    Log,
    /// Discard the response.
    Ignore,
}

#[derive(Debug, Clone, Default)]
pub struct DispatcherConfig {
    pub default_handler: DefaultHandler,
}

/// The single terminal event of a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Status 200 with the parsed body.
    Success(Value),
    /// Non-200 status with the parsed, non-empty body.
    Failure(Value),
    /// Non-200 status with an empty body, or no response at all.
    Dropped,
}

/// Issues JSON requests over a `Transport`.
///
/// Cloning is cheap; clones share the transport.
#[derive(Clone)]
pub struct RequestDispatcher {
    transport: Arc<dyn Transport>,
    config: DispatcherConfig,
}

impl fmt::Debug for RequestDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDispatcher")
            .field("transport", &self.transport)
            .field("config", &self.config)
            .finish()
    }
}

impl RequestDispatcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_config(transport, DispatcherConfig::default())
    }

    pub fn with_config(transport: Arc<dyn Transport>, config: DispatcherConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Build the request for `verb` and `url`.
    ///
    /// The JSON content type is always set, exactly once. `data` becomes the
    /// body only for methods that carry one.
    pub fn build_request<P>(
        &self,
        verb: HttpMethod,
        url: &str,
        data: Option<&P>,
    ) -> Result<HttpRequest, DispatchError>
    where
        P: Serialize + ?Sized,
    {
        let body = match data {
            Some(data) if verb.carries_body() => {
                Some(serde_json::to_string(data).map_err(DispatchError::Serialize)?)
            }
            _ => None,
        };
        Ok(HttpRequest {
            method: verb,
            url: url.to_string(),
            headers: vec![("Content-Type".to_string(), JSON_CONTENT_TYPE.to_string())],
            body,
        })
    }

    /// Decide the outcome of a finished round trip.
    pub fn complete(&self, url: &str, response: &HttpResponse) -> Result<Outcome, DispatchError> {
        let parse = |body: &str| {
            serde_json::from_str::<Value>(body).map_err(|source| DispatchError::Decode {
                url: url.to_string(),
                status: response.status,
                source,
            })
        };

        if response.status == 200 {
            return parse(&response.body).map(Outcome::Success);
        }
        if response.body.is_empty() {
            return Ok(Outcome::Dropped);
        }
        parse(&response.body).map(Outcome::Failure)
    }

    /// Perform one request and resolve to its outcome.
    pub async fn dispatch<P>(
        &self,
        verb: HttpMethod,
        url: &str,
        data: Option<&P>,
    ) -> Result<Outcome, DispatchError>
    where
        P: Serialize + ?Sized,
    {
        let request = self.build_request(verb, url, data)?;
        self.round_trip(request).await
    }

    /// Start one request and return immediately.
    ///
    /// The payload is serialized before returning; everything else happens
    /// on a spawned task whose handle is returned. The handle resolves to
    /// `Err` only when a response body could not be parsed. Dropping it
    /// leaves the request running.
    pub fn send<P>(
        &self,
        verb: HttpMethod,
        url: &str,
        data: Option<&P>,
        on_success: Option<Callback>,
        on_error: Option<Callback>,
    ) -> Result<JoinHandle<Result<(), DispatchError>>, DispatchError>
    where
        P: Serialize + ?Sized,
    {
        let runtime = Handle::try_current().map_err(|_| DispatchError::NoRuntime)?;
        let request = self.build_request(verb, url, data)?;
        let on_success = self.resolve(on_success, "success", verb, url);
        let on_error = self.resolve(on_error, "error", verb, url);
        let this = self.clone();

        let task = async move {
            let url = request.url.clone();
            match this.round_trip(request).await {
                Ok(Outcome::Success(value)) => on_success(value),
                Ok(Outcome::Failure(value)) => on_error(value),
                Ok(Outcome::Dropped) => {}
                Err(err) => {
                    error!(%verb, %url, error = %err, "unhandled failure while completing request");
                    return Err(err);
                }
            }
            Ok(())
        };
        Ok(runtime.spawn(task.in_current_span()))
    }

    async fn round_trip(&self, request: HttpRequest) -> Result<Outcome, DispatchError> {
        let verb = request.method;
        let url = request.url.clone();
        match self.transport.execute(request).await {
            Ok(response) => {
                let outcome = self.complete(&url, &response)?;
                if outcome == Outcome::Dropped {
                    debug!(%verb, %url, status = response.status, "empty error response, no callback");
                }
                Ok(outcome)
            }
            Err(err) => {
                warn!(%verb, %url, error = %err, "request produced no response");
                Ok(Outcome::Dropped)
            }
        }
    }

    fn resolve(
        &self,
        callback: Option<Callback>,
        label: &'static str,
        verb: HttpMethod,
        url: &str,
    ) -> Callback {
        if let Some(callback) = callback {
            return callback;
        }
        match self.config.default_handler {
            DefaultHandler::Ignore => Box::new(|_: Value| {}),
            DefaultHandler::Log => {
                let url = url.to_string();
                Box::new(move |response: Value| info!(%verb, %url, %response, "{label}"))
            }
        }
    }
}
