// 🌐 Ledger API - serves the latest published snapshot over HTTP
//
// Only compiled with the `server` feature. Recomputation runs on the blocking
// pool; the router never holds a lock across an await.

use crate::refresh::{Applied, LedgerShell, LedgerSnapshot};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

fn failure(status: StatusCode, message: String) -> Response {
    let body = ApiResponse {
        success: false,
        data: (),
        error: Some(message),
    };
    (status, Json(body)).into_response()
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Run a refresh off the async runtime
pub async fn refresh_now(shell: Arc<LedgerShell>) -> anyhow::Result<Applied> {
    tokio::task::spawn_blocking(move || shell.refresh(today())).await?
}

/// Re-fetch and recompute every `interval`, starting one interval from now
pub fn spawn_poller(shell: Arc<LedgerShell>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + interval;
        let mut ticker = tokio::time::interval_at(start, interval);
        loop {
            ticker.tick().await;
            match refresh_now(Arc::clone(&shell)).await {
                Ok(Applied::Published(snapshot)) => {
                    info!(generation = ?snapshot.generation, "poll published new ledger")
                }
                Ok(_) => {}
                Err(e) => warn!("poll refresh failed: {:#}", e),
            }
        }
    })
}

// ============================================================================
// API Handlers
// ============================================================================

fn json_ok<T: Serialize>(data: T) -> Response {
    Json(ApiResponse::ok(data)).into_response()
}

/// Render the current snapshot, or 503 before the first refresh
fn with_snapshot<F>(shell: &LedgerShell, render: F) -> Response
where
    F: FnOnce(&LedgerSnapshot) -> Response,
{
    match shell.current() {
        Some(snapshot) => render(&snapshot),
        None => failure(
            StatusCode::SERVICE_UNAVAILABLE,
            "ledger not computed yet".to_string(),
        ),
    }
}

/// GET /api/health
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/ledger - full snapshot
async fn get_ledger(State(shell): State<Arc<LedgerShell>>) -> Response {
    with_snapshot(&shell, |s| json_ok(s))
}

/// GET /api/ledger/transactions
async fn get_transactions(State(shell): State<Arc<LedgerShell>>) -> Response {
    with_snapshot(&shell, |s| json_ok(&s.report.transactions))
}

/// GET /api/ledger/categories
async fn get_categories(State(shell): State<Arc<LedgerShell>>) -> Response {
    with_snapshot(&shell, |s| json_ok(&s.report.category_summary))
}

/// GET /api/ledger/months
async fn get_months(State(shell): State<Arc<LedgerShell>>) -> Response {
    with_snapshot(&shell, |s| json_ok(&s.report.monthly_summary))
}

#[derive(Serialize)]
struct RefreshResponse {
    outcome: &'static str,
    generation: Option<u64>,
}

/// POST /api/refresh
async fn post_refresh(State(shell): State<Arc<LedgerShell>>) -> Response {
    match refresh_now(shell).await {
        Ok(applied) => {
            let (outcome, generation) = match applied {
                Applied::Published(snapshot) => ("published", Some(snapshot.generation.0)),
                Applied::Unchanged => ("unchanged", None),
                Applied::Stale => ("stale", None),
            };
            json_ok(RefreshResponse { outcome, generation })
        }
        Err(e) => failure(StatusCode::BAD_GATEWAY, format!("{:#}", e)),
    }
}

/// Build the `/api` router around a shell
pub fn router(shell: Arc<LedgerShell>) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/ledger", get(get_ledger))
        .route("/ledger/transactions", get(get_transactions))
        .route("/ledger/categories", get(get_categories))
        .route("/ledger/months", get(get_months))
        .route("/refresh", post(post_refresh))
        .with_state(shell);

    Router::new().nest("/api", api_routes)
}
