use searchlight::backend::{Backend, BackendError, Query, SupabaseBackend};
use searchlight::config::BackendConfig;
use searchlight::SearchResultController;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend_for(server: &MockServer) -> SupabaseBackend {
  let config = BackendConfig {
    url: server.uri(),
    api_key: Some("anon-key".to_string()),
    timeout_secs: 5,
  };
  SupabaseBackend::new(&config).unwrap()
}

fn search_json() -> serde_json::Value {
  json!({
    "id": "s1",
    "query": "wireless mouse",
    "created_at": "2024-01-01T00:00:00Z",
    "status": "done"
  })
}

#[tokio::test]
async fn test_fetch_one_sends_filter_and_headers() {
  let server = MockServer::start().await;

  Mock::given(method("GET"))
    .and(path("/rest/v1/searches"))
    .and(query_param("select", "*"))
    .and(query_param("id", "eq.s1"))
    .and(header("apikey", "anon-key"))
    .and(header("authorization", "Bearer anon-key"))
    .and(header("accept", "application/vnd.pgrst.object+json"))
    .respond_with(ResponseTemplate::new(200).set_body_json(search_json()))
    .expect(1)
    .mount(&server)
    .await;

  let backend = backend_for(&server);
  let row = backend.fetch_one(&Query::from("searches").eq("id", "s1")).await.unwrap();
  assert_eq!(row, search_json());
}

#[tokio::test]
async fn test_fetch_one_maps_406_to_row_count() {
  let server = MockServer::start().await;

  Mock::given(method("GET"))
    .and(path("/rest/v1/searches"))
    .respond_with(ResponseTemplate::new(406).set_body_json(json!({
      "code": "PGRST116",
      "details": "The result contains 0 rows",
      "hint": null,
      "message": "JSON object requested, multiple (or no) rows returned"
    })))
    .mount(&server)
    .await;

  let backend = backend_for(&server);
  let err = backend.fetch_one(&Query::from("searches").eq("id", "s2")).await.unwrap_err();
  assert_eq!(err, BackendError::RowCount { found: Some(0) });
}

#[tokio::test]
async fn test_fetch_many_returns_rows_in_order() {
  let server = MockServer::start().await;

  Mock::given(method("GET"))
    .and(path("/rest/v1/product_search"))
    .and(query_param("select", "*,products(*)"))
    .and(query_param("search_id", "eq.s1"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!([
      { "search_id": "s1", "products": { "asin": "X2", "name": "Mouse B", "url": "http://x/2", "image": "http://img/2", "final_price": 24.5 } },
      { "search_id": "s1", "products": { "asin": "X1", "name": "Mouse A", "url": "http://x/1", "image": "http://img/1", "final_price": 19.99 } }
    ])))
    .mount(&server)
    .await;

  let backend = backend_for(&server);
  let rows = backend
    .fetch_many(&Query::from("product_search").select("*,products(*)").eq("search_id", "s1"))
    .await
    .unwrap();

  assert_eq!(rows.len(), 2);
  assert_eq!(rows[0]["products"]["asin"], "X2");
  assert_eq!(rows[1]["products"]["asin"], "X1");
}

#[tokio::test]
async fn test_fetch_many_reports_http_errors() {
  let server = MockServer::start().await;

  Mock::given(method("GET"))
    .and(path("/rest/v1/product_search"))
    .respond_with(
      ResponseTemplate::new(401).set_body_json(json!({ "message": "Invalid API key" })),
    )
    .mount(&server)
    .await;

  let backend = backend_for(&server);
  let err = backend.fetch_many(&Query::from("product_search")).await.unwrap_err();
  assert_eq!(err, BackendError::Status { status: 401, message: "Invalid API key".to_string() });
}

#[tokio::test]
async fn test_fetch_many_rejects_non_array_body() {
  let server = MockServer::start().await;

  Mock::given(method("GET"))
    .and(path("/rest/v1/product_search"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "unexpected": true })))
    .mount(&server)
    .await;

  let backend = backend_for(&server);
  let err = backend.fetch_many(&Query::from("product_search")).await.unwrap_err();
  assert!(matches!(err, BackendError::Decode { .. }));
}

#[tokio::test]
async fn test_invoke_posts_body_verbatim() {
  let server = MockServer::start().await;
  let body = r#"{"record":{"id":"s1"}}"#;

  Mock::given(method("POST"))
    .and(path("/functions/v1/scrape-start"))
    .and(header("content-type", "application/json"))
    .and(header("apikey", "anon-key"))
    .and(body_string(body))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "snapshot_id": "snap-1" })))
    .expect(1)
    .mount(&server)
    .await;

  let backend = backend_for(&server);
  let outcome = backend.invoke("scrape-start", body.to_string()).await;
  assert_eq!(outcome.data, Some(json!({ "snapshot_id": "snap-1" })));
  assert_eq!(outcome.error, None);
}

#[tokio::test]
async fn test_invoke_folds_errors_into_outcome() {
  let server = MockServer::start().await;

  Mock::given(method("POST"))
    .and(path("/functions/v1/scrape-start"))
    .respond_with(ResponseTemplate::new(500).set_body_string("worker crashed"))
    .mount(&server)
    .await;

  let backend = backend_for(&server);
  let outcome = backend.invoke("scrape-start", "{}".to_string()).await;
  assert_eq!(outcome.data, None);
  assert_eq!(outcome.error.as_deref(), Some("HTTP 500: worker crashed"));
}

#[tokio::test]
async fn test_invoke_accepts_plain_text_answers() {
  let server = MockServer::start().await;

  Mock::given(method("POST"))
    .and(path("/functions/v1/scrape-start"))
    .respond_with(ResponseTemplate::new(200).set_body_string("started"))
    .mount(&server)
    .await;

  let backend = backend_for(&server);
  let outcome = backend.invoke("scrape-start", "{}".to_string()).await;
  assert_eq!(outcome.data, Some(json!("started")));
}

#[tokio::test]
async fn test_invoke_waits_past_read_timeout() {
  let server = MockServer::start().await;

  Mock::given(method("POST"))
    .and(path("/functions/v1/scrape-start"))
    .respond_with(
      ResponseTemplate::new(200)
        .set_body_json(json!({ "snapshot_id": "snap-2" }))
        .set_delay(Duration::from_secs(3)),
    )
    .mount(&server)
    .await;

  Mock::given(method("GET"))
    .and(path("/rest/v1/searches"))
    .respond_with(
      ResponseTemplate::new(200).set_body_json(search_json()).set_delay(Duration::from_secs(3)),
    )
    .mount(&server)
    .await;

  let config =
    BackendConfig { url: server.uri(), api_key: Some("anon-key".to_string()), timeout_secs: 1 };
  let backend = SupabaseBackend::new(&config).unwrap();

  let outcome = backend.invoke("scrape-start", "{}".to_string()).await;
  assert_eq!(outcome.error, None);
  assert_eq!(outcome.data, Some(json!({ "snapshot_id": "snap-2" })));

  let err = backend.fetch_one(&Query::from("searches").eq("id", "s1")).await.unwrap_err();
  assert_eq!(err, BackendError::Timeout { secs: 1 });
}

#[tokio::test]
async fn test_unreachable_backend_is_a_transport_error() {
  let config = BackendConfig {
    url: "http://127.0.0.1:9".to_string(),
    api_key: None,
    timeout_secs: 2,
  };
  let backend = SupabaseBackend::new(&config).unwrap();

  let err = backend.fetch_one(&Query::from("searches").eq("id", "s1")).await.unwrap_err();
  assert!(matches!(err, BackendError::Transport { .. } | BackendError::Timeout { .. }));

  let outcome = backend.invoke("scrape-start", "{}".to_string()).await;
  assert!(outcome.is_error());
}

#[tokio::test]
async fn test_controller_over_http() {
  let server = MockServer::start().await;

  Mock::given(method("GET"))
    .and(path("/rest/v1/searches"))
    .and(query_param("id", "eq.s1"))
    .respond_with(ResponseTemplate::new(200).set_body_json(search_json()))
    .mount(&server)
    .await;

  Mock::given(method("GET"))
    .and(path("/rest/v1/product_search"))
    .and(query_param("search_id", "eq.s1"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!([
      { "search_id": "s1", "products": { "asin": "X1", "name": "Mouse A", "url": "http://x/1", "image": "http://img/1", "final_price": 19.99 } }
    ])))
    .mount(&server)
    .await;

  Mock::given(method("POST"))
    .and(path("/functions/v1/scrape-start"))
    .and(body_json(json!({ "record": search_json() })))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
    .expect(1)
    .mount(&server)
    .await;

  let controller = SearchResultController::new(Arc::new(backend_for(&server)));
  let state = controller.activate("s1").await;
  assert_eq!(state.search().map(|s| s.status.as_str()), Some("done"));
  assert_eq!(state.products().len(), 1);

  let outcome = controller.request_scraping().await.unwrap();
  assert_eq!(outcome.data, Some(json!({ "ok": true })));
}
