//! Registry lifecycle and scheduling against local fixtures

mod common;

use std::time::Duration;

use common::{Responder, closed_port, next_outcome, test_logger};
use scout::{EndpointConfig, Outcome, Registry};
use tokio::net::TcpListener;

#[tokio::test]
async fn test_tcp_open_port_is_success() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            drop(socket);
        }
    });

    let registry = Registry::new([EndpointConfig::tcp("127.0.0.1", port)], test_logger()).unwrap();
    registry.start_all().await;

    match next_outcome(&registry.outcome_stream()).await {
        Outcome::Success(success) => {
            assert!(success.network_latency.millis() >= 0);
            assert!(success.request_latency.millis() >= 0);
        }
        Outcome::Failure(failure) => panic!("unexpected failure: {}", failure.issue),
    }
}

#[tokio::test]
async fn test_retries_exhaust_after_max_attempts() {
    let port = closed_port().await;
    let config = EndpointConfig::tcp("127.0.0.1", port)
        .with_interval(Duration::from_millis(50))
        .with_retry(Duration::from_millis(10), Duration::from_millis(20), 3);
    let id = config.id;

    let registry = Registry::with_buffer([config], test_logger(), 8).unwrap();
    registry.start_all().await;
    let outcomes = registry.outcome_stream();

    for attempt in 1..=3 {
        let Outcome::Failure(failure) = next_outcome(&outcomes).await else {
            panic!("closed port must fail")
        };
        assert!(failure.issue.starts_with("Dial Error: "), "{}", failure.issue);
        assert_eq!(failure.retries_exhausted, attempt == 3, "attempt {attempt}");
    }

    // no fourth outcome
    let fourth = tokio::time::timeout(Duration::from_millis(500), outcomes.recv()).await;
    assert!(fourth.is_err(), "loop kept running after exhaustion");

    let snapshot = registry.get_endpoint(id).await.unwrap();
    assert!(!snapshot.running);
    assert_eq!(snapshot.state.retry_attempts, 3);
    assert!(!snapshot.state.online);
}

#[tokio::test]
async fn test_restart_after_exhaustion_grants_new_budget() {
    let port = closed_port().await;
    let config = EndpointConfig::tcp("127.0.0.1", port)
        .with_retry(Duration::from_millis(5), Duration::from_millis(5), 1);

    let registry = Registry::with_buffer([config], test_logger(), 8).unwrap();
    registry.start_all().await;
    let outcomes = registry.outcome_stream();

    let Outcome::Failure(first) = next_outcome(&outcomes).await else { panic!("must fail") };
    assert!(first.retries_exhausted);

    registry.stop_all().await;
    registry.start_all().await;

    let Outcome::Failure(again) = next_outcome(&outcomes).await else { panic!("must fail") };
    assert!(again.retries_exhausted);
}

#[tokio::test]
async fn test_start_all_while_running_keeps_exhausted_endpoint_stopped() {
    let port = closed_port().await;
    let config = EndpointConfig::tcp("127.0.0.1", port)
        .with_retry(Duration::from_millis(5), Duration::from_millis(5), 1);
    let id = config.id;

    let registry = Registry::with_buffer([config], test_logger(), 8).unwrap();
    registry.start_all().await;
    let outcomes = registry.outcome_stream();

    let Outcome::Failure(failure) = next_outcome(&outcomes).await else { panic!("must fail") };
    assert!(failure.retries_exhausted);

    tokio::time::sleep(Duration::from_millis(100)).await;
    registry.start_all().await;
    assert!(registry.is_running().await);

    let after = tokio::time::timeout(Duration::from_millis(500), outcomes.recv()).await;
    assert!(after.is_err(), "exhausted endpoint produced another outcome");
    assert!(!registry.get_endpoint(id).await.unwrap().running);
}

#[tokio::test]
async fn test_add_to_running_registry_starts_immediately() {
    let server = Responder::start(200, "ok").await;
    let registry = Registry::new([], test_logger()).unwrap();
    registry.start_all().await;

    let config = EndpointConfig::http(server.url("/")).with_interval(Duration::from_secs(3600));
    let id = config.id;
    let endpoint = registry.add_endpoint(config).await.unwrap();
    assert!(endpoint.is_running());

    let outcome = next_outcome(&registry.outcome_stream()).await;
    assert_eq!(outcome.endpoint(), id);
    assert!(outcome.is_success(), "{outcome}");
}

#[tokio::test]
async fn test_add_to_stopped_registry_waits_for_start() {
    let server = Responder::start(200, "ok").await;
    let registry = Registry::new([], test_logger()).unwrap();

    let endpoint = registry.add_endpoint(EndpointConfig::http(server.url("/"))).await.unwrap();
    assert!(!endpoint.is_running());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.hits(), 0);
    assert!(registry.outcome_stream().try_recv().is_none());
}

#[tokio::test]
async fn test_success_cadence_matches_interval() {
    let server = Responder::start(200, "ok").await;
    let interval = Duration::from_millis(200);
    let config = EndpointConfig::http(server.url("/")).with_interval(interval);

    let registry = Registry::new([config], test_logger()).unwrap();
    registry.start_all().await;
    let outcomes = registry.outcome_stream();

    let mut stamps = Vec::new();
    for _ in 0..3 {
        let outcome = next_outcome(&outcomes).await;
        assert!(outcome.is_success(), "{outcome}");
        stamps.push(outcome.created_at());
    }
    registry.stop_all().await;

    for pair in stamps.windows(2) {
        let gap = (pair[1] - pair[0]).to_std().unwrap();
        assert!(gap >= interval - Duration::from_millis(20), "gap {gap:?}");
        assert!(gap <= interval * 2, "gap {gap:?}");
    }
}

#[tokio::test]
async fn test_stop_all_halts_checks() {
    let server = Responder::start(200, "ok").await;
    let config = EndpointConfig::http(server.url("/")).with_interval(Duration::from_millis(50));

    let registry = Registry::with_buffer([config], test_logger(), 16).unwrap();
    registry.start_all().await;
    next_outcome(&registry.outcome_stream()).await;

    registry.stop_all().await;
    assert!(!registry.is_running().await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    let hits = server.hits();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.hits(), hits);
    assert!(registry.list_endpoints().await.iter().all(|snapshot| !snapshot.running));
}

#[tokio::test]
async fn test_stop_of_stopped_endpoint_is_noop() {
    let registry = Registry::new([EndpointConfig::icmp("192.0.2.1")], test_logger()).unwrap();
    registry.stop_all().await;
    registry.stop_all().await;

    let snapshot = &registry.list_endpoints().await[0];
    assert!(!snapshot.running);
    assert_eq!(snapshot.state.retry_attempts, 0);
}

#[tokio::test]
async fn test_remove_stops_loop() {
    let server = Responder::start(200, "ok").await;
    let config = EndpointConfig::http(server.url("/")).with_interval(Duration::from_millis(50));
    let id = config.id;

    let registry = Registry::with_buffer([config], test_logger(), 16).unwrap();
    registry.start_all().await;
    next_outcome(&registry.outcome_stream()).await;

    assert!(registry.remove_endpoint(id).await);
    assert!(registry.get_endpoint(id).await.is_none());
    assert!(registry.is_empty().await);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let hits = server.hits();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.hits(), hits);
}

#[tokio::test]
async fn test_config_loads_from_json() {
    let json = r#"[{
        "id": "6f1c3a52-6a7e-4f27-9a51-3c1f25f4b0d2",
        "name": "api",
        "address": "https://api.example.com/health",
        "type": "http",
        "checkInterval": "30s",
        "timeout": 2000000000,
        "expectedStatus": 204,
        "verifySSL": false,
        "headers": {"Authorization": ["Bearer x"]},
        "retry": true,
        "retryMinInterval": "1s",
        "retryMaxInterval": "5s",
        "retryMax": 4
    }]"#;
    let configs: Vec<EndpointConfig> = serde_json::from_str(json).unwrap();

    let registry = Registry::new(configs, test_logger()).unwrap();
    let snapshot = &registry.list_endpoints().await[0];
    assert_eq!(snapshot.config.name, "api");
    assert_eq!(snapshot.config.interval, Duration::from_secs(30));
    assert_eq!(snapshot.config.timeout, Duration::from_secs(2));
    assert_eq!(snapshot.config.http.expected_status, 204);
    assert!(!snapshot.config.http.verify_ssl);
    assert_eq!(snapshot.config.retry.max_attempts, 4);
    assert!(snapshot.config.created_at.is_some());
}
