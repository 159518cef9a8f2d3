use axum::extract::{Path as AxumPath, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use tower_http::trace::TraceLayer;

use crate::db::Database;
use crate::endpoints::{self, EndpointError, RankWindow};
use crate::store::StoreError;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "preprint-api",
    about = "read-only preprint metadata and download statistics API"
)]
pub struct ServeArgs {
    #[arg(
        long = "port",
        default_value_t = 5000,
        env = "PREPRINT_API_PORT",
        help = "port to serve on"
    )]
    pub port: u16,
    #[arg(
        long = "database",
        default_value = "preprint.db",
        env = "PREPRINT_API_DATABASE",
        help = "path to the sqlite database file"
    )]
    pub database: PathBuf,
}

#[derive(Clone)]
pub struct AppState {
    pub database_path: PathBuf,
}

pub async fn run(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    ensure_database(&args.database)?;
    let state = AppState {
        database_path: args.database.clone(),
    };
    let app = router(state);
    let addr = format!("0.0.0.0:{}", args.port);
    tracing::info!(%addr, database = %args.database.display(), "starting api server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/v1/papers", get(papers))
        .route("/v1/papers/search", get(search))
        .route("/v1/papers/popular/:window", get(popular))
        .route("/v1/papers/:id", get(paper))
        .route("/v1/authors/:id", get(author))
        .route("/v1/stats", get(stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn ensure_database(path: &Path) -> Result<(), StoreError> {
    if !path.exists() {
        tracing::info!(
            path = %path.display(),
            "database not found, creating an empty one from the embedded schema"
        );
        let db = Database::open(path)?;
        db.initialize_schema()?;
    }
    Ok(())
}

/// Every request gets its own store handle; the composition layer holds no
/// state between calls.
fn open_store(state: &AppState) -> Result<Database, EndpointError> {
    Ok(Database::open(&state.database_path)?)
}

fn json_or_error<T: serde::Serialize>(result: Result<T, EndpointError>) -> Response {
    match result {
        Ok(body) => Json(body).into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: EndpointError) -> Response {
    match &err {
        EndpointError::NotFound(_) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
        EndpointError::IntegrityConflict(_) => {
            tracing::error!(error = %err, "unique lookup matched multiple rows");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response()
        }
        EndpointError::Store(store_err) => {
            tracing::error!(error = %store_err, "store read failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal error" })),
            )
                .into_response()
        }
    }
}

async fn papers(State(state): State<AppState>) -> Response {
    let result = open_store(&state).and_then(|db| endpoints::list_articles(&db));
    json_or_error(result)
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

async fn search(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Response {
    let result = open_store(&state).and_then(|db| endpoints::text_search(&db, &params.q));
    json_or_error(result)
}

async fn popular(State(state): State<AppState>, AxumPath(window): AxumPath<String>) -> Response {
    let window = match window.as_str() {
        "alltime" => RankWindow::Alltime,
        "ytd" => RankWindow::YearToDate,
        other => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("unknown ranking window: {other}") })),
            )
                .into_response();
        }
    };
    let result = open_store(&state).and_then(|db| endpoints::most_popular(&db, window));
    json_or_error(result)
}

async fn paper(State(state): State<AppState>, AxumPath(id): AxumPath<i64>) -> Response {
    let result = open_store(&state).and_then(|db| endpoints::paper_details(&db, id));
    json_or_error(result)
}

async fn author(State(state): State<AppState>, AxumPath(id): AxumPath<i64>) -> Response {
    let result = open_store(&state).and_then(|db| endpoints::author_details(&db, id));
    json_or_error(result)
}

async fn stats(State(state): State<AppState>) -> Response {
    let result = open_store(&state).and_then(|db| endpoints::site_stats(&db));
    json_or_error(result)
}

async fn health_check() -> impl IntoResponse {
    Json(json!({
        "ok": true,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
