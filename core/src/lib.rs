//! Asynchronous JSON request dispatch and a client for the typograph web
//! service.
//!
//! # Overview
//! `RequestDispatcher` issues one JSON request per call and routes the
//! parsed answer to a success or an error callback depending on the status
//! code. `TypografClient` speaks the SOAP protocol of the ArtLebedev
//! typograph service. Both build plain `HttpRequest` values and interpret
//! plain `HttpResponse` values; a `Transport` does the actual I/O.
//!
//! # Design
//! - `Transport` is the single network seam. `UreqTransport` is the real
//!   one, `ScriptedTransport` replays canned responses.
//! - Calls share no mutable state; each `send` owns its request and
//!   callbacks until completion.

pub mod dispatcher;
pub mod error;
pub mod http;
pub mod transport;
pub mod typograf;

pub use dispatcher::{Callback, DefaultHandler, DispatcherConfig, Outcome, RequestDispatcher};
pub use error::{DispatchError, TransportError, TypografError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, UnknownMethod, JSON_CONTENT_TYPE};
pub use transport::{ScriptedTransport, Transport, UreqTransport};
pub use typograf::{typogrify, TypografClient, DEFAULT_ENCODING, SERVICE_URL};
