//! services/api/src/web/campaigns.rs
//!
//! Campaign CRUD, client association, and the sequential broadcast of a
//! campaign's message to its associated clients.

use crate::web::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;
use wachat_core::domain::CampaignStatus;
use wachat_core::ports::{CampaignUpdate, NewCampaign, PortError};

//=========================================================================================
// Payload Structs
//=========================================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCampaignRequest {
    pub name: Option<String>,
    pub campaign_type: Option<String>,
    pub audience: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCampaignRequest {
    pub name: Option<String>,
    pub campaign_type: Option<String>,
    pub status: Option<String>,
    pub audience: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddCampaignClientsRequest {
    pub client_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
struct CampaignSendResult {
    client_id: Uuid,
    name: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

//=========================================================================================
// CRUD Handlers
//=========================================================================================

pub async fn list_campaigns(State(app_state): State<Arc<AppState>>) -> Response {
    match app_state.store.list_campaigns().await {
        Ok(campaigns) => Json(campaigns).into_response(),
        Err(e) => {
            error!("Error getting campaigns: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to get campaigns" })),
            )
                .into_response()
        }
    }
}

pub async fn get_campaign(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    match app_state.store.get_campaign(id).await {
        Ok(campaign) => Json(campaign).into_response(),
        Err(PortError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Campaign not found" })),
        )
            .into_response(),
        Err(e) => {
            error!("Error getting campaign: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to get campaign" })),
            )
                .into_response()
        }
    }
}

pub async fn create_campaign(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<CreateCampaignRequest>,
) -> Response {
    let Some(name) = body.name.as_deref().filter(|n| !n.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Campaign name is required" })),
        )
            .into_response();
    };

    let new = NewCampaign {
        name: name.to_string(),
        campaign_type: body.campaign_type.unwrap_or_else(|| "broadcast".to_string()),
        audience: body.audience.unwrap_or_default(),
        message: body.message.unwrap_or_default(),
    };
    match app_state.store.create_campaign(new).await {
        Ok(campaign) => (StatusCode::CREATED, Json(campaign)).into_response(),
        Err(e) => {
            error!("Error creating campaign: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to create campaign" })),
            )
                .into_response()
        }
    }
}

pub async fn update_campaign(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateCampaignRequest>,
) -> Response {
    let status = match body.status.as_deref() {
        None => None,
        Some(s) => match CampaignStatus::parse(s) {
            Some(status) => Some(status),
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": "Status must be one of Draft, Active, Completed"
                    })),
                )
                    .into_response()
            }
        },
    };

    let update = CampaignUpdate {
        name: body.name,
        campaign_type: body.campaign_type,
        status,
        audience: body.audience,
        message: body.message,
    };
    match app_state.store.update_campaign(id, update).await {
        Ok(campaign) => Json(campaign).into_response(),
        Err(PortError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Campaign not found" })),
        )
            .into_response(),
        Err(e) => {
            error!("Error updating campaign: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to update campaign" })),
            )
                .into_response()
        }
    }
}

pub async fn delete_campaign(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    match app_state.store.delete_campaign(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(PortError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Campaign not found" })),
        )
            .into_response(),
        Err(e) => {
            error!("Error deleting campaign: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to delete campaign" })),
            )
                .into_response()
        }
    }
}

//=========================================================================================
// Association & Broadcast
//=========================================================================================

/// Associate clients with a campaign.
pub async fn add_clients(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<AddCampaignClientsRequest>,
) -> Response {
    if let Err(e) = app_state.store.get_campaign(id).await {
        return match e {
            PortError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Campaign not found" })),
            )
                .into_response(),
            other => {
                error!("Error updating campaign clients: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Failed to update campaign clients" })),
                )
                    .into_response()
            }
        };
    }

    match app_state
        .store
        .add_campaign_clients(id, &body.client_ids)
        .await
    {
        Ok(()) => Json(json!({ "success": true })).into_response(),
        Err(e) => {
            error!("Error updating campaign clients: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to update campaign clients" })),
            )
                .into_response()
        }
    }
}

/// Broadcast the campaign's message to its associated clients, one at a
/// time. Each recipient's outcome is recorded independently; a failed
/// delivery never aborts the rest of the batch.
pub async fn send_campaign(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    let campaign = match app_state.store.get_campaign(id).await {
        Ok(campaign) => campaign,
        Err(PortError::NotFound(_)) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Campaign not found" })),
            )
                .into_response()
        }
        Err(e) => {
            error!("Error sending campaign: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to send campaign" })),
            )
                .into_response();
        }
    };

    if campaign.message.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Campaign has no message" })),
        )
            .into_response();
    }

    let clients = match app_state.store.campaign_clients(id).await {
        Ok(clients) => clients,
        Err(e) => {
            error!("Error sending campaign: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to send campaign" })),
            )
                .into_response();
        }
    };

    if clients.is_empty() {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Campaign has no associated clients" })),
        )
            .into_response();
    }

    let mut results = Vec::with_capacity(clients.len());
    for client in &clients {
        let outcome = async {
            app_state
                .sender
                .send_text(&client.phone, &campaign.message)
                .await?;
            app_state
                .store
                .record_client_activity(client.id, &campaign.message)
                .await
        }
        .await;

        match outcome {
            Ok(()) => results.push(CampaignSendResult {
                client_id: client.id,
                name: client.name.clone(),
                status: "success",
                error: None,
            }),
            Err(e) => results.push(CampaignSendResult {
                client_id: client.id,
                name: client.name.clone(),
                status: "failed",
                error: Some(e.to_string()),
            }),
        }
    }

    let sent_count = results.iter().filter(|r| r.status == "success").count();
    let failed_count = results.len() - sent_count;

    if sent_count > 0 {
        if let Err(e) = app_state
            .store
            .record_campaign_send(id, sent_count as i64)
            .await
        {
            error!("Failed to record campaign send: {}", e);
        }
    }

    Json(json!({
        "success": true,
        "message": format!("Campaign {} sent", campaign.name),
        "sent_count": sent_count,
        "failed_count": failed_count,
        "results": results,
    }))
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_router, FakeSender, FakeStore};
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;
    use wachat_core::ports::DataStore;

    async fn post(
        store: Arc<FakeStore>,
        sender: Arc<FakeSender>,
        uri: &str,
        body: Value,
    ) -> (StatusCode, Value) {
        let app = test_router(store, sender);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, value)
    }

    #[tokio::test]
    async fn broadcast_counts_successes_and_failures_independently() {
        let store = Arc::new(FakeStore::default());
        let a = store.add_client("15550001111", "Jane", "Client");
        let b = store.add_client("15550002222", "Joe", "Client");
        let campaign = store.add_campaign("Spring Launch", "New units available!");
        store
            .add_campaign_clients(campaign.id, &[a.id, b.id])
            .await
            .expect("associate");

        let sender = Arc::new(FakeSender::default());
        sender.fail_for("15550002222");

        let (status, body) = post(
            store.clone(),
            sender.clone(),
            &format!("/api/v1/campaigns/{}/send", campaign.id),
            json!({}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sent_count"], 1);
        assert_eq!(body["failed_count"], 1);
        assert_eq!(sender.sent().len(), 1);

        // Only successful deliveries count toward the campaign totals.
        let updated = store.campaign(campaign.id).expect("campaign");
        assert_eq!(updated.sent_count, 1);
        assert_eq!(updated.status, CampaignStatus::Active);
        assert!(updated.last_sent_at.is_some());
    }

    #[tokio::test]
    async fn sending_an_unknown_campaign_is_not_found() {
        let (status, _) = post(
            Arc::new(FakeStore::default()),
            Arc::new(FakeSender::default()),
            &format!("/api/v1/campaigns/{}/send", Uuid::new_v4()),
            json!({}),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
