use axum::http::{HeaderName, HeaderValue};
use axum_test::TestServer;
use edgelog_capture::app::Config;
use edgelog_capture::buffer::{Accumulator, BatchConfig, FlushOutcome};
use edgelog_capture::domain::LogEvent;
use edgelog_capture::proxy::{self, ProxyState};
use edgelog_capture::sender::SinkClient;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn pipeline_for(config: &Config) -> Accumulator<SinkClient> {
    let transport = SinkClient::new(config).unwrap();
    Accumulator::new(
        BatchConfig {
            max_events: config.batch_max_events,
            flush_interval: config.flush_interval(),
            backoff_base_ms: config.backoff_base_ms,
            backoff_max_ms: config.backoff_max_ms,
        },
        transport,
    )
}

fn test_server(config: &Config, pipeline: Accumulator<SinkClient>) -> TestServer {
    let state = ProxyState {
        origin: Url::parse(&config.origin_url).unwrap(),
        client: reqwest::Client::new(),
        pipeline,
    };
    TestServer::new(proxy::router(state)).unwrap()
}

#[tokio::test]
async fn proxies_the_origin_response_and_captures_one_event() {
    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/widgets"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&origin)
        .await;

    let sink = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/records"))
        .and(header("content-type", "text/plain"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&sink)
        .await;

    let config = Config {
        sink_url: format!("{}/v1/records", sink.uri()),
        origin_url: origin.uri(),
        ..Config::default()
    };
    let pipeline = pipeline_for(&config);
    let server = test_server(&config, pipeline.clone());

    let response = server
        .get("/widgets?page=2")
        .add_header(
            HeaderName::from_static("x-forwarded-proto"),
            HeaderValue::from_static("https"),
        )
        .add_header(
            HeaderName::from_static("x-edge-country"),
            HeaderValue::from_static("NO"),
        )
        .add_header(
            HeaderName::from_static("user-agent"),
            HeaderValue::from_static("integration-test"),
        )
        .await;

    response.assert_status_ok();
    assert_eq!(response.text(), "ok");

    // Capture is detached; give the spawned append a moment to land.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(pipeline.pending_events().await, 1);

    // Ship the batch and inspect the NDJSON record the sink received.
    assert_eq!(pipeline.flush().await, FlushOutcome::Delivered(1));
    let requests = sink.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body = String::from_utf8(requests[0].body.clone()).unwrap();
    let event: LogEvent = serde_json::from_str(body.trim_end()).unwrap();
    assert_eq!(event.method, "GET");
    assert_eq!(event.path, "/widgets?page=2");
    assert_eq!(event.scheme, "https");
    assert_eq!(event.country, "NO");
    assert_eq!(event.user_agent, "integration-test");
    assert_eq!(event.status, 200);
}

#[tokio::test]
async fn origin_failure_returns_bad_gateway_and_still_captures() {
    let config = Config {
        // Nothing listens here; the proxied call fails in transport.
        origin_url: "http://127.0.0.1:1".to_string(),
        ..Config::default()
    };
    let pipeline = pipeline_for(&config);
    let server = test_server(&config, pipeline.clone());

    let response = server.get("/unreachable").await;
    response.assert_status(axum::http::StatusCode::BAD_GATEWAY);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(pipeline.pending_events().await, 1);
}

#[tokio::test]
async fn health_endpoint_answers_without_touching_the_origin() {
    let config = Config {
        origin_url: "http://127.0.0.1:1".to_string(),
        ..Config::default()
    };
    let pipeline = pipeline_for(&config);
    let server = test_server(&config, pipeline.clone());

    let response = server.get("/healthz").await;
    response.assert_status_ok();
    assert_eq!(response.text(), "");
    assert_eq!(pipeline.pending_events().await, 0);
}
