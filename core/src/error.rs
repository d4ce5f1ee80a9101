//! Error types for the dispatcher, the transports and the typograph client.
//!
//! # Design
//! A transport failure is kept apart from an HTTP status the caller did not
//! expect: the former means no response exists at all. `Timeout` gets its
//! own variant because the typograph service answers it with 503 instead
//! of 500.

/// Failures of a single round trip before any status code is known.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The configured timeout elapsed before the response was read.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Connection, DNS or protocol failure.
    #[error("network error: {0}")]
    Network(String),

    /// The response arrived but its body could not be read as text.
    #[error("failed to read response body: {0}")]
    Body(String),

    /// The blocking worker running the request went away.
    #[error("transport worker failed: {0}")]
    Join(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout(_))
    }
}

/// Errors raised by `RequestDispatcher`.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialize(#[source] serde_json::Error),

    /// A response body that had to be parsed was not JSON.
    #[error("response from {url} (HTTP {status}) is not valid JSON: {source}")]
    Decode {
        url: String,
        status: u16,
        #[source]
        source: serde_json::Error,
    },

    /// `send` was called outside a tokio runtime.
    #[error("no async runtime available to run the request")]
    NoRuntime,
}

/// Errors returned by the typograph client.
#[derive(Debug, thiserror::Error)]
pub enum TypografError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The web service answered with a status other than 200.
    #[error("typograph service returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The SOAP response carried no `ProcessTextResult` element.
    #[error("typograph response has no ProcessTextResult element")]
    MissingResult,
}
