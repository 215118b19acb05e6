// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! HTTP contract tests for the gateway, against a local mock server.

use memrelay_client::{HttpGateway, MemoryGateway, MemoryRelay, RelayConfig, RelayError};
use memrelay_core::{ErrorKind, RetrySettings};
use mockito::{Matcher, Server};
use serde_json::json;

const API_KEY: &str = "mem_test_0123456789abcdef";
const AGENT: &str = "agent-7";

fn config(url: &str) -> RelayConfig {
    RelayConfig::new(API_KEY, AGENT).with_api_url(url)
}

fn gateway(server: &Server) -> HttpGateway {
    HttpGateway::new(&config(&server.url())).unwrap()
}

fn record_json(id: &str, content: &str) -> serde_json::Value {
    json!({
        "id": id,
        "content": content,
        "agent_id": AGENT,
        "metadata": {"source": "test"},
        "created_at": 1700000000,
        "updated_at": 1700000100
    })
}

#[tokio::test]
async fn test_store_sends_bearer_and_agent() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/memories")
        .match_header("authorization", format!("Bearer {API_KEY}").as_str())
        .match_body(Matcher::Json(json!({
            "content": "staging db is on port 5433",
            "agent_id": AGENT
        })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(record_json("m1", "staging db is on port 5433").to_string())
        .create_async()
        .await;

    let record = gateway(&server)
        .store("staging db is on port 5433", None)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(record.id, "m1");
    assert_eq!(record.metadata.get("source").map(String::as_str), Some("test"));
}

#[tokio::test]
async fn test_search_keeps_server_order() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/memories/search")
        .match_body(Matcher::PartialJson(json!({
            "query": "database port",
            "limit": 5,
            "agent_id": AGENT
        })))
        .with_status(200)
        .with_body(
            json!({"data": [
                {"memory": record_json("low", "a"), "score": 0.41},
                {"memory": record_json("high", "b"), "score": 0.93}
            ]})
            .to_string(),
        )
        .create_async()
        .await;

    let hits = gateway(&server).search("database port", 5, 0.3).await.unwrap();

    mock.assert_async().await;
    let ids: Vec<_> = hits.iter().map(|h| h.memory.id.as_str()).collect();
    assert_eq!(ids, ["low", "high"]);
}

#[tokio::test]
async fn test_list_passes_paging_and_agent() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/v1/memories/memories")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("limit".into(), "20".into()),
            Matcher::UrlEncoded("offset".into(), "40".into()),
            Matcher::UrlEncoded("agent_id".into(), AGENT.into()),
        ]))
        .with_status(200)
        .with_body(json!({"data": [record_json("m1", "x")]}).to_string())
        .create_async()
        .await;

    let records = gateway(&server).list(20, 40).await.unwrap();

    mock.assert_async().await;
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn test_get_unknown_id_is_not_found() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/v1/memories/missing")
        .match_query(Matcher::UrlEncoded("agent_id".into(), AGENT.into()))
        .with_status(404)
        .with_body(r#"{"message":"no such memory"}"#)
        .create_async()
        .await;

    let err = gateway(&server).get("missing").await.unwrap_err();
    assert!(matches!(err, RelayError::NotFound(ref id) if id == "missing"));
}

#[tokio::test]
async fn test_delete_accepts_empty_body() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("DELETE", "/v1/memories/m1")
        .match_query(Matcher::UrlEncoded("agent_id".into(), AGENT.into()))
        .with_status(204)
        .create_async()
        .await;

    gateway(&server).delete("m1").await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_error_message_from_body() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/v1/memories")
        .with_status(401)
        .with_body(r#"{"message":"invalid api key"}"#)
        .create_async()
        .await;

    let err = gateway(&server).store("content", None).await.unwrap_err();
    match &err {
        RelayError::Api { status, message } => {
            assert_eq!(*status, 401);
            assert_eq!(message, "invalid api key");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::Auth);
}

#[tokio::test]
async fn test_unparseable_error_body_is_tolerated() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/v1/health")
        .with_status(502)
        .with_body("<html>bad gateway</html>")
        .create_async()
        .await;

    let err = gateway(&server).health().await.unwrap_err();
    assert!(matches!(err, RelayError::Api { status: 502, .. }));
    assert_eq!(err.kind(), ErrorKind::Server);
}

#[tokio::test]
async fn test_missing_stats_endpoint_reports_zero() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/v1/stats")
        .match_query(Matcher::UrlEncoded("agent_id".into(), AGENT.into()))
        .with_status(404)
        .create_async()
        .await;

    let stats = gateway(&server).stats().await.unwrap();
    assert_eq!(stats.total_memories, 0);
    assert!(stats.last_updated.is_none());
}

#[tokio::test]
async fn test_stats_unwraps_data() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/v1/stats")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"data":{"total_memories":42,"last_updated":"2025-01-01T00:00:00Z"}}"#)
        .create_async()
        .await;

    let stats = gateway(&server).stats().await.unwrap();
    assert_eq!(stats.total_memories, 42);
}

#[tokio::test]
async fn test_unreachable_service_is_network() {
    // port 9 (discard) is closed on test hosts
    let gateway = HttpGateway::new(&config("http://127.0.0.1:9")).unwrap();
    let err = gateway.health().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
}

#[tokio::test]
async fn test_relay_does_not_retry_auth_failures() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/memories/search")
        .with_status(403)
        .with_body(r#"{"message":"forbidden"}"#)
        .expect(1)
        .create_async()
        .await;

    let relay = MemoryRelay::new(config(&server.url())).unwrap();
    let err = relay.search("anything", 3, 0.5).await.unwrap_err();

    mock.assert_async().await;
    assert_eq!(err.kind(), ErrorKind::Auth);
    assert_eq!(relay.breaker().snapshot().consecutive_failures, 1);
}

#[tokio::test]
async fn test_relay_start_fails_when_unhealthy() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/v1/health")
        .with_status(200)
        .with_body(r#"{"status":"degraded"}"#)
        .create_async()
        .await;

    let config = config(&server.url()).with_retry(RetrySettings {
        enabled: false,
        ..RetrySettings::default()
    });
    let err = MemoryRelay::start(config.clone()).await.unwrap_err();
    assert!(matches!(err, RelayError::Disabled(_)));

    assert!(MemoryRelay::try_start(config).await.is_none());
}

#[tokio::test]
async fn test_relay_start_succeeds_when_healthy() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/v1/health")
        .with_status(200)
        .with_body(r#"{"status":"OK"}"#)
        .create_async()
        .await;

    let relay = MemoryRelay::start(config(&server.url())).await.unwrap();
    assert!(!relay.breaker().is_open());
}
