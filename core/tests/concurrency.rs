//! Completion ordering with a transport whose responses are released by
//! the test.
//!
//! # Design
//! `DeferredTransport` parks every request until the test answers it, which
//! makes "send returns before completion" and "out-of-order completion"
//! observable without timing assumptions.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use typograf_core::{
    Callback, HttpMethod, HttpRequest, HttpResponse, RequestDispatcher, Transport, TransportError,
};

type Arrival = (HttpRequest, oneshot::Sender<HttpResponse>);

#[derive(Debug)]
struct DeferredTransport {
    arrivals: mpsc::UnboundedSender<Arrival>,
}

impl DeferredTransport {
    fn new() -> (Self, mpsc::UnboundedReceiver<Arrival>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { arrivals: tx }, rx)
    }
}

#[async_trait]
impl Transport for DeferredTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let (tx, rx) = oneshot::channel();
        self.arrivals
            .send((request, tx))
            .map_err(|_| TransportError::Network("test gone".to_string()))?;
        rx.await
            .map_err(|_| TransportError::Network("response abandoned".to_string()))
    }
}

type Log = Arc<Mutex<Vec<(String, Value)>>>;

fn tagged(log: &Log, tag: &str) -> Callback {
    let log = log.clone();
    let tag = tag.to_string();
    Box::new(move |v: Value| log.lock().unwrap().push((tag, v)))
}

#[tokio::test(flavor = "current_thread")]
async fn send_returns_before_completion() {
    let (transport, mut arrivals) = DeferredTransport::new();
    let dispatcher = RequestDispatcher::new(Arc::new(transport));
    let log: Log = Arc::default();

    let handle = dispatcher
        .send(
            HttpMethod::Post,
            "http://svc/typograf",
            Some(&json!({"data": "x"})),
            Some(tagged(&log, "success")),
            Some(tagged(&log, "error")),
        )
        .unwrap();

    // The caller got control back and nothing has completed.
    assert!(log.lock().unwrap().is_empty());
    assert!(!handle.is_finished());

    let (request, reply) = arrivals.recv().await.unwrap();
    assert_eq!(request.url, "http://svc/typograf");
    assert!(log.lock().unwrap().is_empty());

    reply.send(HttpResponse::new(200, r#"{"ok":true}"#)).unwrap();
    handle.await.unwrap().unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec![("success".to_string(), json!({"ok": true}))]
    );
}

#[tokio::test]
async fn concurrent_sends_complete_independently() {
    let (transport, mut arrivals) = DeferredTransport::new();
    let dispatcher = RequestDispatcher::new(Arc::new(transport));
    let first_log: Log = Arc::default();
    let second_log: Log = Arc::default();

    let first = dispatcher
        .send::<Value>(
            HttpMethod::Get,
            "http://svc/first",
            None,
            Some(tagged(&first_log, "success")),
            Some(tagged(&first_log, "error")),
        )
        .unwrap();
    let second = dispatcher
        .send::<Value>(
            HttpMethod::Get,
            "http://svc/second",
            None,
            Some(tagged(&second_log, "success")),
            Some(tagged(&second_log, "error")),
        )
        .unwrap();

    let mut first_reply = None;
    let mut second_reply = None;
    for _ in 0..2 {
        let (request, reply) = arrivals.recv().await.unwrap();
        match request.url.as_str() {
            "http://svc/first" => first_reply = Some(reply),
            "http://svc/second" => second_reply = Some(reply),
            other => panic!("unexpected url {other}"),
        }
    }

    // Answer the second request first.
    second_reply
        .unwrap()
        .send(HttpResponse::new(404, r#"{"error":"not found"}"#))
        .unwrap();
    second.await.unwrap().unwrap();
    assert_eq!(
        *second_log.lock().unwrap(),
        vec![("error".to_string(), json!({"error": "not found"}))]
    );
    assert!(first_log.lock().unwrap().is_empty());

    first_reply
        .unwrap()
        .send(HttpResponse::new(200, r#"{"id":1}"#))
        .unwrap();
    first.await.unwrap().unwrap();
    assert_eq!(
        *first_log.lock().unwrap(),
        vec![("success".to_string(), json!({"id": 1}))]
    );
    assert_eq!(second_log.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn abandoned_response_fires_nothing() {
    let (transport, mut arrivals) = DeferredTransport::new();
    let dispatcher = RequestDispatcher::new(Arc::new(transport));
    let log: Log = Arc::default();

    let handle = dispatcher
        .send::<Value>(
            HttpMethod::Get,
            "http://svc/never",
            None,
            Some(tagged(&log, "success")),
            Some(tagged(&log, "error")),
        )
        .unwrap();

    let (_, reply) = arrivals.recv().await.unwrap();
    drop(reply);
    handle.await.unwrap().unwrap();
    assert!(log.lock().unwrap().is_empty());
}
