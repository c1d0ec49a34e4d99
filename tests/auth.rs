//! Authentication strategy tests.
//!
//! Each strategy is checked on the wire with wiremock.

mod common;

use reqwest::RequestBuilder;
use serde_json::json;
use tin::{AuthStrategy, AuthType, Authenticator, Call};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_basic_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!("ok")))
        .expect(1)
        .mount(&server)
        .await;

    let client = common::client(
        &server,
        json!({"authtype": "basic", "credentials": {"username": "user", "password": "pass"}}),
    );
    client.call("status.ping", Call::new()).await.unwrap();
}

#[tokio::test]
async fn test_header_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .and(header("x-api-key", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!("ok")))
        .expect(1)
        .mount(&server)
        .await;

    let client = common::client(
        &server,
        json!({"auth_type": "header", "credentials": {"X-Api-Key": "secret"}}),
    );
    client.call("status.ping", Call::new()).await.unwrap();
}

#[tokio::test]
async fn test_param_auth_merges_with_call_params() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/things"))
        .and(query_param("api_key", "k"))
        .and(query_param("per_page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = common::client(
        &server,
        json!({"authtype": "param", "credentials": {"api_key": "k"}}),
    );
    client.call("things.search", Call::new()).await.unwrap();
}

#[tokio::test]
async fn test_credentials_from_inline_string() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .and(header("x-api-key", "inline"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!("ok")))
        .expect(1)
        .mount(&server)
        .await;

    let client = common::client(
        &server,
        json!({"authtype": "header", "credentials": r#"{"X-Api-Key": "inline"}"#}),
    );
    assert_eq!(client.config().auth_type, AuthType::Header);
    client.call("status.ping", Call::new()).await.unwrap();
}

#[derive(Debug)]
struct Bearer(&'static str);

impl Authenticator for Bearer {
    fn authenticate(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(self.0)
    }
}

#[tokio::test]
async fn test_replacing_the_authenticator() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .and(header("authorization", "Bearer t0ken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!("ok")))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = common::client(&server, json!({}));
    client.set_auth(Bearer("t0ken"));
    client.call("status.ping", Call::new()).await.unwrap();

    client.set_auth(AuthStrategy::None);
    assert!(format!("{:?}", client.auth()).contains("None"));
}
