//! services/api/src/web/dashboard.rs
//!
//! Aggregate counts and recent-activity feeds for the operator dashboard.
//! Individual count queries degrade to zero on store failure so a partial
//! outage still renders a dashboard.

use crate::web::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use wachat_core::domain::{Client, StoredMessage};

const RECENT_ACTIVITY_LIMIT: i64 = 5;
const CAMPAIGN_PERFORMANCE_LIMIT: i64 = 10;
const ACTIVE_CLIENT_WINDOW_DAYS: i64 = 30;

/// The headline dashboard counters.
#[derive(Serialize, ToSchema)]
pub struct StatsResponse {
    pub total_clients: i64,
    pub total_messages: i64,
    pub active_clients: i64,
    pub active_campaigns: i64,
}

#[derive(Serialize)]
struct RecentMessageView {
    #[serde(flatten)]
    message: StoredMessage,
    client: Client,
}

/// Basic counts for the dashboard overview.
pub async fn overview(State(app_state): State<Arc<AppState>>) -> Response {
    let store = &app_state.store;
    let total_clients = store.count_clients().await.unwrap_or(0);
    let total_messages = store.count_messages().await.unwrap_or(0);
    let active_campaigns = store.count_active_campaigns().await.unwrap_or(0);

    Json(json!({
        "total_clients": total_clients,
        "total_messages": total_messages,
        "active_campaigns": active_campaigns,
        "timestamp": Utc::now().to_rfc3339(),
    }))
    .into_response()
}

/// Dashboard statistics, including clients active in the last 30 days.
#[utoipa::path(
    get,
    path = "/api/v1/stats",
    responses(
        (status = 200, description = "Aggregate dashboard counters", body = StatsResponse)
    )
)]
pub async fn stats(State(app_state): State<Arc<AppState>>) -> Response {
    let store = &app_state.store;
    let total_clients = store.count_clients().await.unwrap_or(0);
    let total_messages = store.count_messages().await.unwrap_or(0);
    let active_campaigns = store.count_active_campaigns().await.unwrap_or(0);

    let thirty_days_ago = Utc::now() - Duration::days(ACTIVE_CLIENT_WINDOW_DAYS);
    let active_clients = store
        .count_clients_active_since(thirty_days_ago)
        .await
        .unwrap_or(0);

    Json(StatsResponse {
        total_clients,
        total_messages,
        active_clients,
        active_campaigns,
    })
    .into_response()
}

/// The last few messages (with their clients) and the last few clients.
/// Either feed may be missing after a partial store failure; the payload
/// flags that instead of failing outright.
pub async fn recent_activity(State(app_state): State<Arc<AppState>>) -> Response {
    let store = &app_state.store;
    let messages_result = store.recent_messages(RECENT_ACTIVITY_LIMIT).await;
    let clients_result = store.recent_clients(RECENT_ACTIVITY_LIMIT).await;

    let data_status = if messages_result.is_ok() && clients_result.is_ok() {
        "complete"
    } else {
        "partial"
    };

    let recent_messages: Vec<RecentMessageView> = messages_result
        .unwrap_or_default()
        .into_iter()
        .map(|(message, client)| RecentMessageView { message, client })
        .collect();
    let recent_clients = clients_result.unwrap_or_default();

    Json(json!({
        "recent_messages": recent_messages,
        "recent_clients": recent_clients,
        "data_status": data_status,
    }))
    .into_response()
}

/// Active and completed campaigns with their delivery counters.
pub async fn campaign_performance(State(app_state): State<Arc<AppState>>) -> Response {
    match app_state
        .store
        .campaign_performance(CAMPAIGN_PERFORMANCE_LIMIT)
        .await
    {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => {
            error!("Error fetching campaign performance: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to fetch campaign performance" })),
            )
                .into_response()
        }
    }
}
