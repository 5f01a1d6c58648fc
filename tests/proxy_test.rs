//! End-to-end tests: real listener, mock upstream, full dispatch path.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use tokio::sync::watch;
use wiremock::matchers::{method, query_param};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

use muninn::config::{CacheConfig, Config, HealthConfig, MetricsConfig, UpstreamConfig};
use muninn::UpdateProxy;

fn test_config(upstream_uri: &str) -> Config {
    Config {
        listen: "127.0.0.1:0".to_string(),
        cache: CacheConfig {
            default_lifetime_secs: 3600,
            evict_after_secs: 24 * 60 * 60,
            controller_cycle_secs: 600,
        },
        upstreams: vec![UpstreamConfig {
            name: Some("ocp".to_string()),
            path: "/ocp".to_string(),
            endpoint: upstream_uri.to_string(),
            insecure: false,
            timeout_secs: 5,
        }],
        health: HealthConfig::default(),
        metrics: MetricsConfig {
            enabled: false,
            listen: String::new(),
        },
    }
}

/// Serve the proxy's router on an ephemeral port.
async fn serve(proxy: &UpdateProxy) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = proxy.router();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Matches only requests whose query carries exactly three parameters.
struct ExactlyThreeParams;

impl Match for ExactlyThreeParams {
    fn matches(&self, request: &Request) -> bool {
        request.url.query_pairs().count() == 3
    }
}

#[tokio::test]
async fn second_request_is_served_from_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("arch", "x86_64"))
        .and(query_param("channel", "stable-4.14"))
        .and(query_param("version", "4.14.1"))
        .and(ExactlyThreeParams)
        .respond_with(ResponseTemplate::new(200).set_body_bytes(&b"graph-data"[..]))
        .expect(1)
        .mount(&server)
        .await;

    let proxy = UpdateProxy::new(test_config(&server.uri())).unwrap();
    let addr = serve(&proxy).await;

    // The cluster id must be stripped before the request goes upstream;
    // the ExactlyThreeParams matcher fails the mock otherwise.
    let url = format!(
        "http://{addr}/ocp?arch=x86_64&channel=stable-4.14&version=4.14.1&id=0000-1111"
    );

    let first = reqwest::get(&url).await.unwrap();
    assert_eq!(first.status(), 200);
    assert_eq!(
        first.headers()[CONTENT_TYPE],
        "application/vnd.redhat.cincinnati.graph+json; version=1.0"
    );
    assert_eq!(first.bytes().await.unwrap().as_ref(), b"graph-data");

    let second = reqwest::get(&url).await.unwrap();
    assert_eq!(second.status(), 200);
    assert_eq!(second.bytes().await.unwrap().as_ref(), b"graph-data");

    // expect(1): the second request must not reach the upstream.
    server.verify().await;
}

#[tokio::test]
async fn upstream_error_yields_500_and_nothing_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let proxy = UpdateProxy::new(test_config(&server.uri())).unwrap();
    let addr = serve(&proxy).await;
    let url = format!("http://{addr}/ocp?arch=x86_64&channel=stable-4.14&version=4.14.1");

    let first = reqwest::get(&url).await.unwrap();
    assert_eq!(first.status(), 500);
    assert_eq!(proxy.products()[0].cache().size(), 0);

    // Errors are not cached: a second request hits upstream again.
    let second = reqwest::get(&url).await.unwrap();
    assert_eq!(second.status(), 500);

    server.verify().await;
}

#[tokio::test]
async fn transport_failure_yields_500() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_uri = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let proxy = UpdateProxy::new(test_config(&dead_uri)).unwrap();
    let addr = serve(&proxy).await;
    let url = format!("http://{addr}/ocp?arch=x86_64&channel=stable-4.14&version=4.14.1");

    let response = reqwest::get(&url).await.unwrap();
    assert_eq!(response.status(), 500);
    assert_eq!(proxy.products()[0].cache().size(), 0);
}

#[tokio::test]
async fn missing_parameter_is_rejected_before_upstream() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let proxy = UpdateProxy::new(test_config(&server.uri())).unwrap();
    let addr = serve(&proxy).await;

    for query in [
        "channel=stable-4.14&version=4.14.1",
        "arch=x86_64&version=4.14.1",
        "arch=x86_64&channel=stable-4.14",
        "arch=&channel=stable-4.14&version=4.14.1",
    ] {
        let response = reqwest::get(format!("http://{addr}/ocp?{query}"))
            .await
            .unwrap();
        assert_eq!(response.status(), 400, "query {query:?} should be rejected");
    }

    server.verify().await;
}

#[tokio::test]
async fn disallowed_methods_are_rejected() {
    let server = MockServer::start().await;
    let proxy = UpdateProxy::new(test_config(&server.uri())).unwrap();
    let addr = serve(&proxy).await;
    let url = format!("http://{addr}/ocp?arch=x86_64&channel=stable-4.14&version=4.14.1");
    let client = reqwest::Client::new();

    let post = client.post(&url).send().await.unwrap();
    assert_eq!(post.status(), 400);

    let delete = client.delete(&url).send().await.unwrap();
    assert_eq!(delete.status(), 400);
}

#[tokio::test]
async fn head_shares_the_cache_with_get() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(&b"graph-data"[..]))
        .expect(1)
        .mount(&server)
        .await;

    let proxy = UpdateProxy::new(test_config(&server.uri())).unwrap();
    let addr = serve(&proxy).await;
    let url = format!("http://{addr}/ocp?arch=x86_64&channel=stable-4.14&version=4.14.1");
    let client = reqwest::Client::new();

    let head = client.head(&url).send().await.unwrap();
    assert_eq!(head.status(), 200);

    let get = reqwest::get(&url).await.unwrap();
    assert_eq!(get.status(), 200);
    assert_eq!(get.bytes().await.unwrap().as_ref(), b"graph-data");

    server.verify().await;
}

#[tokio::test]
async fn unknown_path_is_not_found() {
    let server = MockServer::start().await;
    let proxy = UpdateProxy::new(test_config(&server.uri())).unwrap();
    let addr = serve(&proxy).await;

    let response = reqwest::get(format!("http://{addr}/okd?arch=a&channel=b&version=c"))
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn liveness_endpoint_reports_alive() {
    let server = MockServer::start().await;
    let proxy = UpdateProxy::new(test_config(&server.uri())).unwrap();
    let addr = serve(&proxy).await;

    let response = reqwest::get(format!("http://{addr}/healthz")).await.unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn liveness_endpoint_reports_degraded() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&upstream)
        .await;

    let mut config = test_config(&upstream.uri());
    config.health = HealthConfig {
        interval_secs: 0,
        retry_interval_secs: 0,
        failure_threshold: 1,
        ..HealthConfig::default()
    };

    let proxy = UpdateProxy::new(config).unwrap();
    let addr = serve(&proxy).await;

    // Drive the probe loop by hand; `run` would do the same.
    let monitor = Arc::clone(proxy.health());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move { monitor.run(shutdown_rx).await });

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while proxy.health().alive() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!proxy.health().alive());

    let response = reqwest::get(format!("http://{addr}/healthz")).await.unwrap();
    assert_eq!(response.status(), 500);

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn run_shuts_down_on_signal() {
    let server = MockServer::start().await;
    let mut config = test_config(&server.uri());
    config.listen = "127.0.0.1:0".to_string();

    let proxy = UpdateProxy::new(config).unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(proxy.run(shutdown_rx));

    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown_tx.send(true).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("run should return after shutdown")
        .unwrap();
    assert!(result.is_ok());
}
