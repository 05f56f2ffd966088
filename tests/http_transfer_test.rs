use std::cell::RefCell;
use std::net::SocketAddr;
use std::rc::Rc;

use atvkit::ajax::{http_registry, Callbacks, Method, RequestOptions};
use atvkit::host::LogNotifier;
use axum::{
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Router,
};

async fn spawn_feed_server() -> SocketAddr {
    let app = Router::new()
        .route("/feed.xml", get(|| async { "<atv><body/></atv>" }))
        .route(
            "/echo",
            post(|headers: HeaderMap, body: String| async move {
                let token = headers
                    .get("x-token")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                format!("{token}:{body}")
            }),
        )
        .route("/gone", get(|| async { (StatusCode::NOT_FOUND, "gone") }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn recorder(log: &Rc<RefCell<Vec<String>>>) -> Callbacks {
    let (a, b, c, d) = (log.clone(), log.clone(), log.clone(), log.clone());
    Callbacks::new()
        .on_connection(move |_| a.borrow_mut().push("connection".into()))
        .on_success(move |response| b.borrow_mut().push(format!("success {}", response.body)))
        .on_failure(move |status, _| c.borrow_mut().push(format!("failure {status}")))
        .on_complete(move |_| d.borrow_mut().push("complete".into()))
}

#[tokio::test]
async fn async_requests_complete_through_the_pump() {
    let addr = spawn_feed_server().await;
    let (registry, mut pump) = http_registry(Rc::new(LogNotifier::new())).unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));

    registry
        .issue(
            RequestOptions::new(format!("http://{addr}/echo"))
                .method(Method::Post)
                .header("X-Token", "abc")
                .body("hello"),
            recorder(&log),
        )
        .unwrap();
    assert_eq!(registry.active_count(), 1);
    pump.run_until_idle().await;

    assert_eq!(
        log.borrow().clone(),
        vec!["connection", "success abc:hello", "complete"]
    );
    assert_eq!(pump.registry().active_count(), 0);
}

#[tokio::test]
async fn http_errors_and_unreachable_hosts_fail() {
    let addr = spawn_feed_server().await;
    let closed = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let (registry, mut pump) = http_registry(Rc::new(LogNotifier::new())).unwrap();

    let missing = Rc::new(RefCell::new(Vec::new()));
    registry
        .issue(RequestOptions::new(format!("http://{addr}/gone")), recorder(&missing))
        .unwrap();
    let unreachable = Rc::new(RefCell::new(Vec::new()));
    registry
        .issue(RequestOptions::new(format!("http://{closed}/feed.xml")), recorder(&unreachable))
        .unwrap();
    pump.run_until_idle().await;

    assert_eq!(missing.borrow()[1..].to_vec(), vec!["failure 404", "complete"]);
    assert!(unreachable.borrow().contains(&"failure 0".to_string()));
}

#[tokio::test]
async fn cancelled_transfers_are_silent() {
    let addr = spawn_feed_server().await;
    let (registry, mut pump) = http_registry(Rc::new(LogNotifier::new())).unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));

    let handle = registry
        .issue(RequestOptions::new(format!("http://{addr}/feed.xml")), recorder(&log))
        .unwrap();
    assert!(registry.cancel(handle.id()));
    pump.run_until_idle().await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    pump.pump();

    assert!(log.borrow().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn synchronous_requests_block_until_the_response_is_queued() {
    let addr = spawn_feed_server().await;
    let (registry, mut pump) = http_registry(Rc::new(LogNotifier::new())).unwrap();
    let seen = Rc::new(RefCell::new(None));

    let sink = seen.clone();
    registry
        .request_document(
            RequestOptions::new(format!("http://{addr}/feed.xml")).synchronous(),
            move |doc| *sink.borrow_mut() = doc.map(|doc| doc.serialize_to_string()),
        )
        .unwrap();

    assert!(pump.pump() >= 2);
    assert_eq!(registry.active_count(), 0);
    assert!(seen.borrow().as_deref().unwrap().contains("<body"));
}
