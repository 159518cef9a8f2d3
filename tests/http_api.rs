use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use preprint_api::db::Database;
use preprint_api::serve::{router, AppState};

fn fixture_state(dir: &TempDir) -> AppState {
    let database_path = dir.path().join("api.db");
    let db = Database::open(&database_path).unwrap();
    db.initialize_schema().unwrap();
    db.execute_batch(
        r#"
        insert into articles (id, url, title, abstract) values
            (1, 'https://example.org/content/1', 'Deep learning for protein folding', 'We study folding with deep networks.');
        insert into authors (id, given, surname) values (1, 'Jane', 'Doe');
        insert into article_authors (article, author) values (1, 1);
        insert into alltime_ranks (article, rank, downloads) values (1, 1, 50);
        "#,
    )
    .unwrap();
    AppState { database_path }
}

async fn get(state: AppState, uri: &str) -> (StatusCode, Value) {
    let app = router(state);
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap();
    (status, body)
}

#[tokio::test]
async fn stats_endpoint_serves_counts() {
    let dir = TempDir::new().unwrap();
    let (status, body) = get(fixture_state(&dir), "/v1/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["paper_count"], 1);
    assert_eq!(body["author_count"], 1);
}

#[tokio::test]
async fn paper_detail_serves_nested_downloads() {
    let dir = TempDir::new().unwrap();
    let (status, body) = get(fixture_state(&dir), "/v1/papers/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Deep learning for protein folding");
    assert_eq!(body["downloads"]["abstract"], 0);
    assert_eq!(body["downloads"]["pdf"], 0);
    assert_eq!(body["authors"][0]["given"], "Jane");
}

#[tokio::test]
async fn missing_paper_maps_to_404_with_the_id_in_the_message() {
    let dir = TempDir::new().unwrap();
    let (status, body) = get(fixture_state(&dir), "/v1/papers/55").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("55"), "unexpected message: {message}");
}

#[tokio::test]
async fn unknown_rank_window_is_rejected_before_the_store() {
    let dir = TempDir::new().unwrap();
    let (status, body) = get(fixture_state(&dir), "/v1/papers/popular/weekly").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("weekly"));
}

#[tokio::test]
async fn popular_window_serves_ranked_entries() {
    let dir = TempDir::new().unwrap();
    let (status, body) = get(fixture_state(&dir), "/v1/papers/popular/alltime").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"][0]["rank"], 1);
    assert_eq!(body["results"][0]["downloads"], 50);
    assert_eq!(body["results"][0]["authors"][0]["name"], "Jane Doe");
}

#[tokio::test]
async fn health_check_reports_version() {
    let dir = TempDir::new().unwrap();
    let (status, body) = get(fixture_state(&dir), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert!(body["version"].as_str().is_some());
}
