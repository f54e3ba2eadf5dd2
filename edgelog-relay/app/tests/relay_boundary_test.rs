use axum::http::StatusCode;
use axum_test::TestServer;
use edgelog_relay::app::{build_state, router};
use edgelog_relay::config::Config;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_server(config: &Config) -> TestServer {
    TestServer::new(router(build_state(config).unwrap())).unwrap()
}

#[tokio::test]
async fn health_answers_with_empty_success() {
    let config = Config {
        // Nothing may be contacted for a health probe.
        ingest_url: "http://127.0.0.1:1".to_string(),
        relay_url: "http://127.0.0.1:1".to_string(),
        ..Config::default()
    };
    let server = test_server(&config);

    let response = server.get("/healthz").await;

    response.assert_status_ok();
    assert_eq!(response.text(), "");
}

#[tokio::test]
async fn relay_returns_only_the_upstream_status() {
    let base = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .and(query_param("q", "1"))
        .respond_with(ResponseTemplate::new(418).set_body_string("teapot body"))
        .mount(&base)
        .await;

    let config = Config {
        relay_url: base.uri(),
        ..Config::default()
    };
    let server = test_server(&config);

    let response = server.get("/relay/ping?q=1").await;

    response.assert_status(StatusCode::IM_A_TEAPOT);
    // The upstream body is dropped on the way back.
    assert_eq!(response.text(), "");
}

#[tokio::test]
async fn relay_preserves_method_headers_and_body() {
    let base = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/resource"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&base)
        .await;

    let config = Config {
        relay_url: base.uri(),
        ..Config::default()
    };
    let server = test_server(&config);

    let response = server
        .put("/relay/resource")
        .add_header(
            axum::http::HeaderName::from_static("x-custom"),
            axum::http::HeaderValue::from_static("kept"),
        )
        .text("payload")
        .await;

    response.assert_status(StatusCode::NO_CONTENT);

    let requests = base.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].body, b"payload");
    assert_eq!(requests[0].headers.get("x-custom").unwrap(), "kept");
}

#[tokio::test]
async fn unreachable_relay_base_maps_to_bad_gateway() {
    let config = Config {
        relay_url: "http://127.0.0.1:1".to_string(),
        ..Config::default()
    };
    let server = test_server(&config);

    let response = server.get("/relay/anything").await;

    response.assert_status(StatusCode::BAD_GATEWAY);
}
