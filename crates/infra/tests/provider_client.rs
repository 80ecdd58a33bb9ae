//! HTTP provider client tests against a mock REST endpoint.

use hourmark_core::CalendarProvider;
use hourmark_domain::{Calendar, DateRange, HourmarkError, ProviderConfig};
use hourmark_infra::HttpCalendarProvider;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn calendar() -> Calendar {
    Calendar::new("user-1", "primary", "Work")
}

fn client(server: &MockServer) -> HttpCalendarProvider {
    HttpCalendarProvider::new(ProviderConfig {
        base_url: server.uri(),
        bearer_token: Some("test-token".into()),
        page_size: 50,
    })
    .unwrap()
}

fn range() -> DateRange {
    DateRange::new(
        "2026-01-01T00:00:00Z".parse().unwrap(),
        "2026-02-01T00:00:00Z".parse().unwrap(),
    )
}

#[tokio::test]
async fn fetch_events_follows_pagination_and_returns_sync_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/calendars/primary/events"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{
                "id": "evt-2",
                "summary": "Planning",
                "start": {"dateTime": "2026-01-16T09:00:00Z"},
                "end": {"dateTime": "2026-01-16T10:00:00Z"}
            }],
            "nextSyncToken": "sync-tok-1"
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/calendars/primary/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{
                "id": "evt-1",
                "summary": "Standup",
                "start": {"dateTime": "2026-01-15T09:00:00Z"},
                "end": {"dateTime": "2026-01-15T09:30:00Z"}
            }],
            "nextPageToken": "page-2"
        })))
        .mount(&server)
        .await;

    let result = client(&server).fetch_events(&calendar(), range()).await.unwrap();
    assert_eq!(result.events.len(), 2);
    assert_eq!(result.events[0].provider_event_id, "evt-1");
    assert_eq!(result.events[1].provider_event_id, "evt-2");
    assert_eq!(result.next_sync_token.as_deref(), Some("sync-tok-1"));
}

#[tokio::test]
async fn incremental_gone_reports_full_resync_required() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/calendars/primary/events"))
        .and(query_param("syncToken", "expired"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;

    let result = client(&server).fetch_incremental(&calendar(), "expired").await.unwrap();
    assert!(result.full_resync_required);
    assert!(result.events.is_empty());
    assert!(result.next_sync_token.is_none());
}

#[tokio::test]
async fn incremental_returns_tombstones() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/calendars/primary/events"))
        .and(query_param("syncToken", "tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{
                "id": "evt-1",
                "status": "cancelled"
            }],
            "nextSyncToken": "tok-2"
        })))
        .mount(&server)
        .await;

    let result = client(&server).fetch_incremental(&calendar(), "tok-1").await.unwrap();
    assert!(!result.full_resync_required);
    assert_eq!(result.events.len(), 1);
    assert!(result.events[0].is_deleted);
    assert_eq!(result.next_sync_token.as_deref(), Some("tok-2"));
}

#[tokio::test]
async fn server_errors_are_transient() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/calendars/primary/events"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client(&server).fetch_events(&calendar(), range()).await.unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn client_errors_are_permanent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/calendars/primary/events"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = client(&server).fetch_events(&calendar(), range()).await.unwrap_err();
    match err {
        HourmarkError::Provider { transient, .. } => assert!(!transient),
        other => panic!("expected provider error, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_events_are_skipped_not_fatal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/calendars/primary/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {"id": "bad", "summary": "No times at all"},
                {
                    "id": "good",
                    "summary": "Standup",
                    "start": {"dateTime": "2026-01-15T09:00:00Z"},
                    "end": {"dateTime": "2026-01-15T09:30:00Z"}
                }
            ],
            "nextSyncToken": "tok-1"
        })))
        .mount(&server)
        .await;

    let result = client(&server).fetch_events(&calendar(), range()).await.unwrap();
    assert_eq!(result.events.len(), 1);
    assert_eq!(result.events[0].provider_event_id, "good");
}
