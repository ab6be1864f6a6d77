//! Tests for the fetch engine

use super::*;
use crate::http::{HttpClientConfig, ThrottlePolicy};
use crate::pagination::{CursorPaginator, LinkHeaderPaginator, OffsetPaginator};
use crate::types::BackoffType;
use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ENDPOINT: &str = "/admin/convergedRecordings";

fn window() -> TimeWindow {
    TimeWindow::trailing_from(Utc.with_ymd_and_hms(2026, 3, 31, 0, 0, 0).unwrap())
}

fn credential() -> Credential {
    Credential::new("test-token").unwrap()
}

fn items(page: usize, count: usize) -> Value {
    let items: Vec<Value> = (0..count)
        .map(|i| json!({"id": format!("p{page}-{i}"), "topic": format!("call {i}")}))
        .collect();
    json!({ "items": items })
}

fn engine_with(server: &MockServer, paginator: Box<dyn Paginator>) -> (FetchEngine, Arc<MemorySink>) {
    let client = HttpClient::with_config(
        HttpClientConfig::builder()
            .base_url(server.uri())
            .max_retries(2)
            .backoff(
                BackoffType::Constant,
                Duration::from_millis(1),
                Duration::from_millis(10),
            )
            .throttle(ThrottlePolicy {
                max_retries: 3,
                default_wait: Duration::from_millis(1),
                max_wait: Duration::from_millis(10),
            })
            .no_rate_limit()
            .build(),
    )
    .unwrap();

    let sink = Arc::new(MemorySink::new());
    let engine = FetchEngine::new(
        client,
        paginator,
        FetchConfig::new().with_endpoint(ENDPOINT),
    )
    .with_sink(sink.clone());
    (engine, sink)
}

fn link_engine(server: &MockServer) -> (FetchEngine, Arc<MemorySink>) {
    engine_with(server, Box::new(LinkHeaderPaginator::default()))
}

fn next_link(server: &MockServer, cursor: usize) -> String {
    format!(
        "<{}{ENDPOINT}?max=100&cursor={cursor}>; rel=\"next\"",
        server.uri()
    )
}

/// Mount `pages` pages of `per_page` records linked through `cursor=N`.
async fn mount_linked_pages(server: &MockServer, pages: usize, per_page: usize) {
    for page in 1..=pages {
        let mut response = ResponseTemplate::new(200).set_body_json(items(page, per_page));
        if page < pages {
            response = response.insert_header("link", next_link(server, page + 1).as_str());
        }

        let mock = Mock::given(method("GET")).and(path(ENDPOINT));
        let mock = if page == 1 {
            mock.and(query_param_is_missing("cursor"))
        } else {
            mock.and(query_param("cursor", page.to_string()))
        };
        mock.respond_with(response).mount(server).await;
    }
}

fn cursor_of(url: &url::Url) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == "cursor")
        .map(|(_, v)| v.into_owned())
}

// ============================================================================
// Completeness and ordering
// ============================================================================

#[tokio::test]
async fn test_fetch_all_collects_every_page_in_order() {
    let server = MockServer::start().await;
    mount_linked_pages(&server, 3, 100).await;

    let (engine, sink) = link_engine(&server);
    let result = engine.fetch_all(&credential(), &window()).await.unwrap();

    assert_eq!(result.count(), 300);
    assert_eq!(result.stats().pages, 3);
    assert_eq!(result.stats().records, 300);

    let ids: Vec<String> = result.records().iter().filter_map(|r| r.id()).collect();
    let expected: Vec<String> = (1..=3)
        .flat_map(|p| (0..100).map(move |i| format!("p{p}-{i}")))
        .collect();
    assert_eq!(ids, expected);

    let pages: Vec<Event> = sink
        .events()
        .into_iter()
        .filter(|e| matches!(e, Event::Page { .. }))
        .collect();
    assert_eq!(
        pages,
        vec![
            Event::Page { page: 1, records: 100, total: 100 },
            Event::Page { page: 2, records: 100, total: 200 },
            Event::Page { page: 3, records: 100, total: 300 },
        ]
    );
    assert_eq!(
        sink.events().last(),
        Some(&Event::Finished { pages: 3, total: 300 })
    );
}

#[tokio::test]
async fn test_fetch_all_uneven_pages() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param_is_missing("cursor"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(items(1, 7))
                .insert_header("link", next_link(&server, 2).as_str()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("cursor", "2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(items(2, 0))
                .insert_header("link", next_link(&server, 3).as_str()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("cursor", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(items(3, 2)))
        .mount(&server)
        .await;

    let (engine, _) = link_engine(&server);
    let result = engine.fetch_all(&credential(), &window()).await.unwrap();

    assert_eq!(result.count(), 9);
    assert_eq!(result.stats().pages, 3);
    assert_eq!(result.records()[7].id().as_deref(), Some("p3-0"));
}

#[tokio::test]
async fn test_first_request_carries_window_page_size_and_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .and(query_param("from", "2026-03-01T00:00:00Z"))
        .and(query_param("to", "2026-03-31T00:00:00Z"))
        .and(query_param("max", "100"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(items(1, 1)))
        .expect(1)
        .mount(&server)
        .await;

    let (engine, _) = link_engine(&server);
    let result = engine.fetch_all(&credential(), &window()).await.unwrap();
    assert_eq!(result.count(), 1);
}

#[tokio::test]
async fn test_empty_listing() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .expect(1)
        .mount(&server)
        .await;

    let (engine, _) = link_engine(&server);
    let result = engine.fetch_all(&credential(), &window()).await.unwrap();
    assert_eq!(result.count(), 0);
    assert_eq!(result.stats().pages, 1);
}

// ============================================================================
// Throttling
// ============================================================================

#[tokio::test]
async fn test_throttled_page_is_retried_without_losing_records() {
    let server = MockServer::start().await;

    // second page throttled once before it succeeds
    Mock::given(method("GET"))
        .and(query_param("cursor", "2"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_linked_pages(&server, 3, 100).await;

    let (engine, sink) = link_engine(&server);
    let result = engine.fetch_all(&credential(), &window()).await.unwrap();

    assert_eq!(result.count(), 300);
    assert_eq!(result.stats().throttled, 1);
    assert!(sink.events().contains(&Event::Throttled {
        page: 2,
        attempt: 1,
        wait: Duration::ZERO,
    }));

    // the retry is the very same request: same cursor, same parameters
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 4);
    let page_two: Vec<_> = requests
        .iter()
        .filter(|r| cursor_of(&r.url).as_deref() == Some("2"))
        .collect();
    assert_eq!(page_two.len(), 2);
    assert_eq!(page_two[0].url, page_two[1].url);
    assert_eq!(
        page_two[0].headers.get("authorization"),
        page_two[1].headers.get("authorization")
    );
}

#[tokio::test]
async fn test_throttle_counter_resets_between_pages() {
    let server = MockServer::start().await;

    // three 429s on each page: at the budget, never over it
    for cursor in ["2", "3"] {
        Mock::given(method("GET"))
            .and(query_param("cursor", cursor))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
            .up_to_n_times(3)
            .mount(&server)
            .await;
    }
    mount_linked_pages(&server, 3, 5).await;

    let (engine, _) = link_engine(&server);
    let result = engine.fetch_all(&credential(), &window()).await.unwrap();

    assert_eq!(result.count(), 15);
    assert_eq!(result.stats().throttled, 6);
}

#[tokio::test]
async fn test_throttle_exhaustion_is_transport_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("cursor", "2"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    mount_linked_pages(&server, 3, 10).await;

    let (engine, sink) = link_engine(&server);
    let err = engine.fetch_all(&credential(), &window()).await.unwrap_err();

    match err {
        Error::Transport { page, source } => {
            assert_eq!(page, 2);
            assert!(matches!(*source, Error::RateLimited { attempts: 4, .. }));
        }
        other => panic!("expected Transport, got {other:?}"),
    }

    // page 3 was never requested
    let requests = server.received_requests().await.unwrap();
    assert!(requests
        .iter()
        .all(|r| cursor_of(&r.url).as_deref() != Some("3")));
    assert!(!sink
        .events()
        .iter()
        .any(|e| matches!(e, Event::Finished { .. })));
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_unauthorized_first_page_is_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "message": "The request requires a valid access token set in the Authorization request header.",
            "trackingId": "ROUTER_1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (engine, _) = link_engine(&server);
    let err = engine.fetch_all(&credential(), &window()).await.unwrap_err();
    assert!(matches!(err, Error::Auth { status: 401, .. }));
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("cursor", "2"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_linked_pages(&server, 2, 4).await;

    let (engine, sink) = link_engine(&server);
    let result = engine.fetch_all(&credential(), &window()).await.unwrap();

    assert_eq!(result.count(), 8);
    assert_eq!(result.stats().retried, 1);
    assert!(sink
        .events()
        .iter()
        .any(|e| matches!(e, Event::Retrying { page: 2, attempt: 1, .. })));
}

#[tokio::test]
async fn test_transient_budget_exhausted_is_transport_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let (engine, _) = link_engine(&server);
    let err = engine.fetch_all(&credential(), &window()).await.unwrap_err();
    assert!(matches!(err, Error::Transport { page: 1, .. }));
}

#[tokio::test]
async fn test_missing_items_is_transport_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "ok"})))
        .mount(&server)
        .await;

    let (engine, _) = link_engine(&server);
    let err = engine.fetch_all(&credential(), &window()).await.unwrap_err();
    match err {
        Error::Transport { page: 1, source } => {
            assert!(matches!(*source, Error::Decode { .. }));
        }
        other => panic!("expected Transport, got {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_json_is_transport_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let (engine, _) = link_engine(&server);
    let err = engine.fetch_all(&credential(), &window()).await.unwrap_err();
    assert!(matches!(err, Error::Transport { page: 1, .. }));
}

#[tokio::test]
async fn test_repeated_continuation_is_detected() {
    let server = MockServer::start().await;

    let self_link = format!("<{}{ENDPOINT}?cursor=same>; rel=\"next\"", server.uri());
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(items(1, 2))
                .insert_header("link", self_link.as_str()),
        )
        .mount(&server)
        .await;

    let (engine, _) = link_engine(&server);
    let err = engine.fetch_all(&credential(), &window()).await.unwrap_err();

    match err {
        Error::Transport { page, source } => {
            assert_eq!(page, 3);
            assert!(matches!(*source, Error::Pagination { .. }));
        }
        other => panic!("expected Transport, got {other:?}"),
    }
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_link_back_to_first_page_is_detected_immediately() {
    let server = MockServer::start().await;

    // the first request as the server would echo it back in a Link header
    let first_page = format!(
        "<{}{ENDPOINT}?from=2026-03-01T00%3A00%3A00Z&to=2026-03-31T00%3A00%3A00Z&max=100>; rel=\"next\"",
        server.uri()
    );
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(items(1, 3))
                .insert_header("link", first_page.as_str()),
        )
        .mount(&server)
        .await;

    let (engine, _) = link_engine(&server);
    let err = engine.fetch_all(&credential(), &window()).await.unwrap_err();

    match err {
        Error::Transport { page, source } => {
            assert_eq!(page, 2);
            assert!(matches!(*source, Error::Pagination { .. }));
        }
        other => panic!("expected Transport, got {other:?}"),
    }
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

// ============================================================================
// Other strategies and bookkeeping
// ============================================================================

#[tokio::test]
async fn test_duplicate_ids_are_kept_and_counted() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param_is_missing("cursor"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"items": [{"id": "a"}, {"id": "b"}]}))
                .insert_header("link", next_link(&server, 2).as_str()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("cursor", "2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"items": [{"id": "b"}, {"id": "c"}]})),
        )
        .mount(&server)
        .await;

    let (engine, _) = link_engine(&server);
    let result = engine.fetch_all(&credential(), &window()).await.unwrap();

    assert_eq!(result.count(), 4);
    assert_eq!(result.stats().duplicate_ids, 1);
}

#[tokio::test]
async fn test_relative_link_is_resolved() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param_is_missing("cursor"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(items(1, 1))
                .insert_header("link", "<convergedRecordings?cursor=2>; rel=\"next\""),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .and(query_param("cursor", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(items(2, 1)))
        .expect(1)
        .mount(&server)
        .await;

    let (engine, _) = link_engine(&server);
    let result = engine.fetch_all(&credential(), &window()).await.unwrap();
    assert_eq!(result.count(), 2);
}

#[tokio::test]
async fn test_cursor_strategy_holds_window_constant() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param_is_missing("cursor"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"items": [{"id": 1}], "next": "tok-2"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("cursor", "tok-2"))
        .and(query_param("from", "2026-03-01T00:00:00Z"))
        .and(query_param("to", "2026-03-31T00:00:00Z"))
        .and(query_param("max", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [{"id": 2}]})))
        .expect(1)
        .mount(&server)
        .await;

    let (engine, _) = engine_with(&server, Box::new(CursorPaginator::new("cursor", "next")));
    let result = engine.fetch_all(&credential(), &window()).await.unwrap();
    assert_eq!(result.count(), 2);
}

#[tokio::test]
async fn test_offset_strategy() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(items(1, 100)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("offset", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(items(2, 30)))
        .mount(&server)
        .await;

    let (engine, _) = engine_with(&server, Box::new(OffsetPaginator::new("offset", 100)));
    let result = engine.fetch_all(&credential(), &window()).await.unwrap();

    assert_eq!(result.count(), 130);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[test]
fn test_merge_query_replaces_in_place() {
    let merged = merge_query(
        vec![
            ("from".to_string(), "a".to_string()),
            ("offset".to_string(), "0".to_string()),
            ("max".to_string(), "100".to_string()),
        ],
        vec![
            ("offset".to_string(), "200".to_string()),
            ("cursor".to_string(), "c".to_string()),
        ],
    );

    assert_eq!(
        merged,
        vec![
            ("from".to_string(), "a".to_string()),
            ("offset".to_string(), "200".to_string()),
            ("max".to_string(), "100".to_string()),
            ("cursor".to_string(), "c".to_string()),
        ]
    );
}

#[test]
fn test_page_request_key() {
    let request = PageRequest {
        url: "https://host/items".to_string(),
        query: vec![("to".to_string(), "2026-03-31T00:00:00Z".to_string())],
    };
    assert_eq!(request.key(), "https://host/items?to=2026-03-31T00%3A00%3A00Z");

    let bare = PageRequest {
        url: "https://host/items?cursor=1".to_string(),
        query: Vec::new(),
    };
    assert_eq!(bare.key(), "https://host/items?cursor=1");
}
