//! Tests driving calls through a scripted transport to observe request routing,
//! fulfillment and cancellation.

use async_trait::async_trait;
use http::{HeaderMap, StatusCode};
use retrofit_reqwest::{
    Args, Call, Deferred, Dispatcher, Error, MethodDescriptor, RawRequest, RawResponse,
    ReqwestTransport, Result, ReturnKind, Service, Transport,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};
use std::time::Duration;
use tokio::sync::Notify;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct HelloService {
    dispatcher: Dispatcher,
}

impl Service for HelloService {
    const NAME: &'static str = "HelloService";

    fn methods() -> Vec<MethodDescriptor> {
        vec![
            MethodDescriptor::get("hello", "/hello"),
            MethodDescriptor::get("hello_call", "/hello").returns(ReturnKind::Call),
        ]
    }

    fn from_dispatcher(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }
}

impl HelloService {
    fn hello(&self) -> Result<Deferred<String>> {
        self.dispatcher.invoke("hello", Args::new())
    }

    fn hello_call(&self) -> Result<Call<String>> {
        self.dispatcher.invoke("hello_call", Args::new())
    }
}

/// Sets its flag when dropped while still armed.
struct DropFlag {
    flag: Arc<AtomicBool>,
    armed: bool,
}

impl Drop for DropFlag {
    fn drop(&mut self) {
        if self.armed {
            self.flag.store(true, Ordering::SeqCst);
        }
    }
}

/// A transport that blocks each request until released.
#[derive(Clone, Default)]
struct GatedTransport {
    started: Arc<Notify>,
    release: Arc<Notify>,
    calls: Arc<AtomicUsize>,
    aborted: Arc<AtomicBool>,
    requests: Arc<Mutex<Vec<RawRequest>>>,
}

#[async_trait]
impl Transport for GatedTransport {
    async fn execute(&self, request: RawRequest) -> Result<RawResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);

        let mut guard = DropFlag {
            flag: Arc::clone(&self.aborted),
            armed: true,
        };
        self.started.notify_one();
        self.release.notified().await;
        guard.armed = false;

        Ok(RawResponse::new(StatusCode::OK, HeaderMap::new(), "hello"))
    }
}

fn service(transport: &GatedTransport) -> HelloService {
    retrofit_reqwest::builder(transport.clone())
        .uri("http://example.test")
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_deferred_fulfills_when_transport_completes() {
    let transport = GatedTransport::default();
    let service = service(&transport);

    let task = tokio::spawn(service.hello().unwrap());

    transport.started.notified().await;
    assert!(!task.is_finished());

    transport.release.notify_one();
    let greeting = task.await.unwrap().unwrap();
    assert_eq!(greeting, "hello");

    let requests = transport.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, http::Method::GET);
    assert_eq!(requests[0].url.as_str(), "http://example.test/hello");
    assert!(!transport.aborted.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_cancel_in_flight_aborts_transport() {
    let transport = GatedTransport::default();
    let service = service(&transport);

    let deferred = service.hello().unwrap();
    let handle = deferred.cancel_handle();
    let task = tokio::spawn(deferred);

    transport.started.notified().await;
    handle.cancel();

    let result = task.await.unwrap();
    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(transport.aborted.load(Ordering::SeqCst));
    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);

    // A late release has nobody left to deliver to.
    transport.release.notify_one();
    assert!(handle.is_cancelled());
}

#[tokio::test]
async fn test_cancel_before_poll_skips_transport() {
    let transport = GatedTransport::default();
    let service = service(&transport);

    let deferred = service.hello().unwrap();
    deferred.cancel();
    assert!(deferred.is_cancelled());

    let result = deferred.await;
    assert!(matches!(result, Err(Error::Cancelled)));
    assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cancel_after_completion_keeps_result() {
    let transport = GatedTransport::default();
    transport.release.notify_one();
    let service = service(&transport);

    let deferred = service.hello().unwrap();
    let handle = deferred.cancel_handle();

    assert_eq!(deferred.await.unwrap(), "hello");
    handle.cancel();
    assert!(!transport.aborted.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_deferred_resolves_only_once() {
    let transport = GatedTransport::default();
    transport.release.notify_one();
    let service = service(&transport);

    let mut deferred = service.hello().unwrap();
    let mut cx = Context::from_waker(Waker::noop());

    let first = Pin::new(&mut deferred).poll(&mut cx);
    assert!(matches!(first, Poll::Ready(Ok(ref greeting)) if greeting == "hello"));
    assert!(deferred.is_done());

    let second = Pin::new(&mut deferred).poll(&mut cx);
    assert!(matches!(second, Poll::Ready(Err(Error::AlreadyExecuted))));
    assert!(deferred.is_done());
    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_mapped_deferred_shares_cancellation() {
    let transport = GatedTransport::default();
    let service = service(&transport);

    let deferred = service.hello().unwrap().map(|s| s.len());
    let handle = deferred.cancel_handle();
    let task = tokio::spawn(deferred);

    transport.started.notified().await;
    handle.cancel();

    assert!(matches!(task.await.unwrap(), Err(Error::Cancelled)));
    assert!(transport.aborted.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_mapped_deferred_transforms_body() {
    let transport = GatedTransport::default();
    transport.release.notify_one();
    let service = service(&transport);

    let length = service.hello().unwrap().map(|s| s.len()).await.unwrap();
    assert_eq!(length, 5);
}

#[tokio::test]
async fn test_call_cancel_from_another_task() {
    let transport = GatedTransport::default();
    let service = service(&transport);

    let call = service.hello_call().unwrap();
    let handle = call.cancel_handle();

    let canceller = {
        let started = Arc::clone(&transport.started);
        tokio::spawn(async move {
            started.notified().await;
            handle.cancel();
        })
    };

    let result = call.execute().await;
    canceller.await.unwrap();

    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(call.is_cancelled());
    assert!(call.is_executed());
    assert!(transport.aborted.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_cancel_reqwest_request_in_flight() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/hello"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("hello")
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&mock_server)
        .await;

    let service: HelloService = retrofit_reqwest::builder(ReqwestTransport::new().unwrap())
        .uri(mock_server.uri())
        .build()
        .unwrap();

    let deferred = service.hello().unwrap();
    let handle = deferred.cancel_handle();
    let task = tokio::spawn(deferred);

    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("cancellation should complete the deferred value")
        .unwrap();
    assert!(matches!(result, Err(Error::Cancelled)));
}
