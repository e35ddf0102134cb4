//! services/api/src/web/qa_pairs.rs
//!
//! Operator CRUD over the QA pairs the auto-responder matches against.

use crate::web::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;
use wachat_core::ports::{PortError, QaPairUpdate};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateQaPairRequest {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateQaPairRequest {
    pub question: Option<String>,
    pub answer: Option<String>,
    pub category: Option<String>,
}

/// List all QA pairs, ordered by category.
pub async fn list_qa_pairs(State(app_state): State<Arc<AppState>>) -> Response {
    match app_state.store.list_qa_pairs().await {
        Ok(pairs) => Json(pairs).into_response(),
        Err(e) => {
            error!("Error getting QA pairs: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to get QA pairs" })),
            )
                .into_response()
        }
    }
}

pub async fn get_qa_pair(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    match app_state.store.get_qa_pair(id).await {
        Ok(pair) => Json(pair).into_response(),
        Err(PortError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "QA pair not found" })),
        )
            .into_response(),
        Err(e) => {
            error!("Error getting QA pair: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to get QA pair" })),
            )
                .into_response()
        }
    }
}

pub async fn create_qa_pair(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<CreateQaPairRequest>,
) -> Response {
    let category = body.category.as_deref().unwrap_or("general");
    match app_state
        .store
        .create_qa_pair(&body.question, &body.answer, category)
        .await
    {
        Ok(pair) => (StatusCode::CREATED, Json(pair)).into_response(),
        Err(e) => {
            error!("Error creating QA pair: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to create QA pair" })),
            )
                .into_response()
        }
    }
}

pub async fn update_qa_pair(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateQaPairRequest>,
) -> Response {
    let update = QaPairUpdate {
        question: body.question,
        answer: body.answer,
        category: body.category,
    };
    match app_state.store.update_qa_pair(id, update).await {
        Ok(pair) => Json(pair).into_response(),
        Err(PortError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "QA pair not found" })),
        )
            .into_response(),
        Err(e) => {
            error!("Error updating QA pair: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to update QA pair" })),
            )
                .into_response()
        }
    }
}

pub async fn delete_qa_pair(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    match app_state.store.delete_qa_pair(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(PortError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "QA pair not found" })),
        )
            .into_response(),
        Err(e) => {
            error!("Error deleting QA pair: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to delete QA pair" })),
            )
                .into_response()
        }
    }
}
