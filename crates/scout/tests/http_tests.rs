//! HTTP checks against a local responder

mod common;

use std::time::Duration;

use common::{Responder, closed_port, next_outcome, test_logger};
use scout::{EndpointConfig, Outcome, Registry};

async fn single(config: EndpointConfig) -> (Registry, Outcome) {
    let registry = Registry::new([config], test_logger()).unwrap();
    registry.start_all().await;
    let outcome = next_outcome(&registry.outcome_stream()).await;
    (registry, outcome)
}

#[tokio::test]
async fn test_ok_response_is_success() {
    let server = Responder::start(200, "all good").await;
    let config = EndpointConfig::http(server.url("/health"));
    let id = config.id;

    let (registry, outcome) = single(config).await;

    match outcome {
        Outcome::Success(success) => {
            assert_eq!(success.endpoint, id);
            assert!(success.request_latency.millis() >= 0);
            assert!(success.network_latency.millis() >= 0);
        }
        Outcome::Failure(failure) => panic!("unexpected failure: {}", failure.issue),
    }

    let snapshot = registry.get_endpoint(id).await.unwrap();
    assert!(snapshot.state.online);
    assert_eq!(snapshot.state.last_status_code, Some(200));
    assert_eq!(snapshot.state.last_response, "all good");
    assert!(snapshot.state.dns_resolve.is_measured());
    assert!(snapshot.running);
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn test_unexpected_status_is_failure() {
    let server = Responder::start(404, "missing").await;
    let config = EndpointConfig::http(server.url("/"));
    let id = config.id;

    let (registry, outcome) = single(config).await;

    let Outcome::Failure(failure) = outcome else { panic!("404 must fail") };
    assert!(failure.issue.contains("404"), "{}", failure.issue);
    assert_eq!(failure.issue, "HTTP Status Code 404 did not match 200");
    assert_eq!(failure.error_code, Some(404));
    assert!(!failure.retries_exhausted);

    let snapshot = registry.get_endpoint(id).await.unwrap();
    assert!(!snapshot.state.online);
    assert_eq!(snapshot.state.down_text, failure.issue);
}

#[tokio::test]
async fn test_expected_status_other_than_200() {
    let server = Responder::start(503, "maintenance").await;
    let config = EndpointConfig::http(server.url("/")).with_expected_status(503);

    let (_registry, outcome) = single(config).await;
    assert!(outcome.is_success(), "{outcome}");
}

#[tokio::test]
async fn test_body_pattern_mismatch_is_failure() {
    let server = Responder::start(200, r#"{"status":"degraded"}"#).await;
    let config = EndpointConfig::http(server.url("/")).with_expected(r#""status":"ok""#);

    let (_registry, outcome) = single(config).await;

    let Outcome::Failure(failure) = outcome else { panic!("body does not match") };
    assert_eq!(failure.issue, r#"HTTP Response Body did not match '"status":"ok"'"#);
}

#[tokio::test]
async fn test_body_pattern_match_is_success() {
    let server = Responder::start(200, "version=1.4.2").await;
    let config = EndpointConfig::http(server.url("/")).with_expected(r"version=\d+\.\d+");

    let (_registry, outcome) = single(config).await;
    assert!(outcome.is_success(), "{outcome}");
}

#[tokio::test]
async fn test_resolve_override_skips_dns() {
    let server = Responder::start(200, "ok").await;
    let url = format!("http://status.invalid:{}/", server.addr.port());
    let config = EndpointConfig::http(url).with_resolve_to("127.0.0.1");
    let id = config.id;

    let (registry, outcome) = single(config).await;
    assert!(outcome.is_success(), "{outcome}");

    let snapshot = registry.get_endpoint(id).await.unwrap();
    assert!(!snapshot.state.dns_resolve.is_measured());
}

#[tokio::test]
async fn test_connection_refused_is_http_error() {
    let port = closed_port().await;
    let config = EndpointConfig::http(format!("http://127.0.0.1:{port}/"));

    let (_registry, outcome) = single(config).await;

    let Outcome::Failure(failure) = outcome else { panic!("nothing listens") };
    assert!(failure.issue.starts_with("HTTP Error: "), "{}", failure.issue);
    assert_eq!(failure.error_code, None);
}

#[tokio::test]
async fn test_post_is_sent() {
    let server = Responder::start(200, "accepted").await;
    let config = EndpointConfig::http(server.url("/hook"))
        .with_method("POST")
        .with_post_data(r#"{"ping":true}"#)
        .with_header("X-Probe", "scout")
        .with_timeout(Duration::from_secs(2));

    let (_registry, outcome) = single(config).await;
    assert!(outcome.is_success(), "{outcome}");
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn test_outcome_serialises_with_kind_tag() {
    let server = Responder::start(200, "ok").await;
    let (_registry, outcome) = single(EndpointConfig::http(server.url("/"))).await;

    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["kind"], "success");
    assert!(json["requestLatency"].as_i64().unwrap() >= 0);
    assert!(json.get("createdAt").is_some());
}
