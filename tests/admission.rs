//! End-to-end admission through an axum router.

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::routing::get;
use axum::Router;
use http::{Request, StatusCode};
use tower::ServiceExt;

use reqlimit::{LimitConfig, RemoteAddr, RequestLimitLayer};

fn app(limiter: &RequestLimitLayer) -> Router {
    Router::new()
        .route("/", get(|| async { "success\n" }))
        .layer(limiter.clone())
}

fn limiter(max_requests: u64, window: Duration) -> RequestLimitLayer {
    let limits = LimitConfig::new(max_requests, window)
        .unwrap()
        .with_reclaim_interval(None);
    RequestLimitLayer::new(limits)
}

fn request() -> Request<Body> {
    Request::builder().uri("/").body(Body::empty()).unwrap()
}

fn request_from(addr: &str) -> Request<Body> {
    let mut request = request();
    request.extensions_mut().insert(RemoteAddr(addr.to_string()));
    request
}

#[tokio::test(start_paused = true)]
async fn test_limit_resets_after_window() {
    let window = Duration::from_secs(5);
    let limiter = limiter(10, window);
    let peer: SocketAddr = ([127, 0, 0, 1], 51000).into();
    let app = app(&limiter).layer(MockConnectInfo(peer));

    for i in 1..=10 {
        let response = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "request {} should succeed", i);
    }

    let response = app.clone().oneshot(request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    tokio::time::sleep(window + Duration::from_secs(1)).await;

    let response = app.oneshot(request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_limit_is_per_client_host() {
    let limiter = limiter(10, Duration::from_secs(60));
    let app = app(&limiter);

    // fill up the limit
    for _ in 0..10 {
        app.clone().oneshot(request_from("3.4.5.6:7483")).await.unwrap();
    }

    let response = app.clone().oneshot(request_from("3.4.5.6:8080")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let response = app.oneshot(request_from("1.2.3.4:1234")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_admit_exactly_the_limit() {
    const MAX: u64 = 25;
    const EXTRA: usize = 15;

    let limiter = limiter(MAX, Duration::from_secs(3600));
    let app = app(&limiter);

    let tasks: Vec<_> = (0..MAX as usize + EXTRA)
        .map(|i| {
            let app = app.clone();
            tokio::spawn(async move {
                let addr = format!("8.8.8.8:{}", 10000 + i);
                app.oneshot(request_from(&addr)).await.unwrap().status()
            })
        })
        .collect();

    let mut ok = 0;
    let mut limited = 0;
    for task in tasks {
        match task.await.unwrap() {
            StatusCode::OK => ok += 1,
            StatusCode::TOO_MANY_REQUESTS => limited += 1,
            other => panic!("unexpected status {}", other),
        }
    }

    assert_eq!(ok, MAX as usize);
    assert_eq!(limited, EXTRA);
}

#[tokio::test]
async fn test_request_without_origin_is_rejected() {
    let limiter = limiter(10, Duration::from_secs(60));
    let response = app(&limiter).oneshot(request()).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(limiter.store().is_empty());
}

#[tokio::test]
async fn test_independent_limiters_do_not_share_state() {
    let first = limiter(1, Duration::from_secs(60));
    let second = limiter(1, Duration::from_secs(60));

    let response = app(&first).oneshot(request_from("1.2.3.4:1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let response = app(&first).oneshot(request_from("1.2.3.4:1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let response = app(&second).oneshot(request_from("1.2.3.4:1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
