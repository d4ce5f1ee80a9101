//! The JSON dispatcher talking to a live `typografd` over real HTTP.
//!
//! # Design
//! Starts the service on a random port with a scripted upstream, then
//! drives it with `RequestDispatcher` over `UreqTransport`. Callbacks
//! forward what they receive through a oneshot channel.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use typograf_core::{
    Callback, DispatchError, HttpMethod, HttpResponse, Outcome, RequestDispatcher,
    ScriptedTransport, TransportError, TypografClient, UreqTransport,
};
use typografd::AppState;

async fn start(upstream: ScriptedTransport) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = AppState::new(
        TypografClient::new("http://upstream.test/typograf.asmx"),
        Arc::new(upstream),
    );
    tokio::spawn(typografd::run(listener, state));
    format!("http://{addr}/")
}

fn dispatcher() -> RequestDispatcher {
    RequestDispatcher::new(Arc::new(UreqTransport::with_timeout(Duration::from_secs(5))))
}

/// Both callbacks share one channel; whichever fires first is reported.
fn callbacks() -> (Callback, Callback, oneshot::Receiver<(&'static str, Value)>) {
    let (tx, rx) = oneshot::channel();
    let tx = Arc::new(Mutex::new(Some(tx)));
    let tagged = |tag: &'static str| -> Callback {
        let tx = tx.clone();
        Box::new(move |v: Value| {
            if let Some(tx) = tx.lock().unwrap().take() {
                let _ = tx.send((tag, v));
            }
        })
    };
    (tagged("success"), tagged("error"), rx)
}

#[tokio::test(flavor = "multi_thread")]
async fn post_reaches_on_success() {
    let url = start(ScriptedTransport::new().with_response(HttpResponse::new(
        200,
        "<soap:Envelope><soap:Body><ProcessTextResponse>\
         <ProcessTextResult>&amp;mdash;&amp;nbsp;Типограф</ProcessTextResult>\
         </ProcessTextResponse></soap:Body></soap:Envelope>",
    )))
    .await;
    let (on_success, on_error, rx) = callbacks();

    dispatcher()
        .send(
            HttpMethod::Post,
            &url,
            Some(&json!({"data": "- Типограф"})),
            Some(on_success),
            Some(on_error),
        )
        .unwrap()
        .await
        .unwrap()
        .unwrap();

    let (tag, value) = rx.await.unwrap();
    assert_eq!(tag, "success");
    assert_eq!(
        value,
        json!({"data": "&mdash;&nbsp;Типограф", "encoding": "UTF-8"})
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn upstream_timeout_reaches_on_error() {
    let url = start(
        ScriptedTransport::new().with_failure(TransportError::Timeout("500ms".to_string())),
    )
    .await;
    let (on_success, on_error, rx) = callbacks();

    dispatcher()
        .send(
            HttpMethod::Post,
            &url,
            Some(&json!({"data": "x"})),
            Some(on_success),
            Some(on_error),
        )
        .unwrap()
        .await
        .unwrap()
        .unwrap();

    let (tag, value) = rx.await.unwrap();
    assert_eq!(tag, "error");
    assert_eq!(value["status_code"], 503);
    assert_eq!(value["message"], "typograf service took too long to respond");
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_ok_body_fails_to_decode() {
    let url = start(ScriptedTransport::new()).await;
    let (on_success, on_error, mut rx) = callbacks();

    let result = dispatcher()
        .send::<Value>(HttpMethod::Options, &url, None, Some(on_success), Some(on_error))
        .unwrap()
        .await
        .unwrap();

    assert!(matches!(result, Err(DispatchError::Decode { status: 200, .. })));
    assert!(rx.try_recv().is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn dispatch_reports_outcome() {
    let url = start(ScriptedTransport::new()).await;
    let outcome = dispatcher()
        .dispatch(HttpMethod::Post, &url, Some(&json!({"data": 5})))
        .await
        .unwrap();

    match outcome {
        Outcome::Failure(body) => assert_eq!(body["status_code"], 500),
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn large_ok_body_reaches_on_success() {
    let text = "a".repeat(11 * 1024 * 1024);
    let url = start(ScriptedTransport::new().with_response(HttpResponse::new(
        200,
        format!(
            "<soap:Envelope><soap:Body><ProcessTextResponse>\
             <ProcessTextResult>{text}</ProcessTextResult>\
             </ProcessTextResponse></soap:Body></soap:Envelope>"
        ),
    )))
    .await;
    let (on_success, on_error, rx) = callbacks();

    RequestDispatcher::new(Arc::new(UreqTransport::with_timeout(Duration::from_secs(60))))
        .send(
            HttpMethod::Post,
            &url,
            Some(&json!({"data": "a"})),
            Some(on_success),
            Some(on_error),
        )
        .unwrap()
        .await
        .unwrap()
        .unwrap();

    let (tag, value) = rx.await.unwrap();
    assert_eq!(tag, "success");
    assert_eq!(value["data"].as_str().map(str::len), Some(text.len()));
}
