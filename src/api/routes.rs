use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::latency::{LatencySnapshot, LatencyStats};
use crate::db::models::DealRow;
use crate::discovery::DiscoveryManager;
use crate::error::AppError;
use crate::types::{DealStatistics, DiscoveryStatus, RawListing, RunOutcome};

const DEFAULT_RECENT_LIMIT: i64 = 20;
const MAX_RECENT_LIMIT: i64 = 200;

#[derive(Clone)]
pub struct ApiState {
    pub manager: Arc<DiscoveryManager>,
    pub latency: Arc<LatencyStats>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .route("/discovery/run", post(run_discovery))
        .route("/scrapers/:name/test", get(test_scraper))
        .route("/deals/recent", get(get_recent_deals))
        .route("/deals/stats", get(get_deal_stats))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct RecentDealsQuery {
    pub limit: Option<i64>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct ScraperTestResponse {
    pub scraper: String,
    pub count: usize,
    pub listings: Vec<RawListing>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_status(State(state): State<ApiState>) -> Json<DiscoveryStatus> {
    Json(state.manager.get_status().await)
}

/// The pass runs on its own task so a dropped connection cannot cancel it;
/// the response carries the finished stats.
async fn run_discovery(State(state): State<ApiState>) -> Result<Json<RunOutcome>, AppError> {
    let manager = Arc::clone(&state.manager);
    let outcome = tokio::spawn(async move { manager.run_discovery().await }).await?;
    Ok(Json(outcome))
}

async fn test_scraper(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Result<Json<ScraperTestResponse>, AppError> {
    let listings = state.manager.test_scraper(&name).await?;
    Ok(Json(ScraperTestResponse {
        scraper: name,
        count: listings.len(),
        listings,
    }))
}

async fn get_recent_deals(
    State(state): State<ApiState>,
    Query(params): Query<RecentDealsQuery>,
) -> Result<Json<Vec<DealRow>>, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_RECENT_LIMIT)
        .clamp(1, MAX_RECENT_LIMIT);
    Ok(Json(state.manager.get_recent_deals(limit).await?))
}

async fn get_deal_stats(State(state): State<ApiState>) -> Result<Json<DealStatistics>, AppError> {
    Ok(Json(state.manager.get_deal_statistics().await?))
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencySnapshot> {
    Json(state.latency.snapshot())
}
