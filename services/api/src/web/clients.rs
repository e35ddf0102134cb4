//! services/api/src/web/clients.rs
//!
//! Operator CRUD over the client directory, with offset pagination on the
//! listing.

use crate::web::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;
use wachat_core::domain::{Client, StoredMessage};
use wachat_core::ports::{ClientUpdate, PortError};

const DEFAULT_PAGE_SIZE: i64 = 50;

//=========================================================================================
// Payload Structs
//=========================================================================================

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Pagination metadata returned alongside every client listing.
#[derive(Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl Pagination {
    pub fn new(total: i64, page: i64, limit: i64) -> Self {
        let total_pages = if limit > 0 {
            (total + limit - 1) / limit
        } else {
            0
        };
        Self {
            total,
            page,
            limit,
            total_pages,
            has_next: page < total_pages,
            has_previous: page > 1,
        }
    }
}

#[derive(Serialize)]
pub struct ClientListResponse {
    pub data: Vec<Client>,
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateClientRequest {
    pub phone: String,
    pub name: String,
    #[serde(default)]
    pub client_type: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateClientRequest {
    pub phone: Option<String>,
    pub name: Option<String>,
    pub client_type: Option<String>,
}

#[derive(Serialize)]
pub struct ClientWithMessages {
    #[serde(flatten)]
    pub client: Client,
    pub messages: Vec<StoredMessage>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// List clients, paginated.
#[utoipa::path(
    get,
    path = "/api/v1/clients",
    params(
        ("page" = Option<i64>, Query, description = "1-based page number"),
        ("limit" = Option<i64>, Query, description = "Page size, default 50")
    ),
    responses(
        (status = 200, description = "A page of clients with pagination metadata"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_clients(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Response {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
    let offset = (page - 1) * limit;

    let result = async {
        let data = app_state.store.list_clients(offset, limit).await?;
        let total = app_state.store.count_clients().await?;
        Ok::<_, PortError>((data, total))
    }
    .await;

    match result {
        Ok((data, total)) => Json(ClientListResponse {
            data,
            pagination: Pagination::new(total, page, limit),
        })
        .into_response(),
        Err(e) => {
            error!("Error getting clients: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to get clients" })),
            )
                .into_response()
        }
    }
}

/// Fetch a client together with its message history.
pub async fn get_client(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    client_with_messages(&app_state, id).await
}

/// Same payload as `get_client`; the dashboard consumes both routes.
pub async fn client_messages(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    client_with_messages(&app_state, id).await
}

async fn client_with_messages(app_state: &AppState, id: Uuid) -> Response {
    let result = async {
        let client = app_state.store.get_client(id).await?;
        let messages = app_state.store.messages_for_client(id).await?;
        Ok::<_, PortError>(ClientWithMessages { client, messages })
    }
    .await;

    match result {
        Ok(payload) => Json(payload).into_response(),
        Err(PortError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Client not found" })),
        )
            .into_response(),
        Err(e) => {
            error!("Error getting client: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to get client" })),
            )
                .into_response()
        }
    }
}

pub async fn create_client(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<CreateClientRequest>,
) -> Response {
    let client_type = body.client_type.as_deref().unwrap_or("Client");
    match app_state
        .store
        .create_client(&body.phone, &body.name, client_type)
        .await
    {
        Ok(client) => (StatusCode::CREATED, Json(client)).into_response(),
        Err(e) => {
            error!("Error creating client: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to create client" })),
            )
                .into_response()
        }
    }
}

pub async fn update_client(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateClientRequest>,
) -> Response {
    let update = ClientUpdate {
        phone: body.phone,
        name: body.name,
        client_type: body.client_type,
    };
    match app_state.store.update_client(id, update).await {
        Ok(client) => Json(client).into_response(),
        Err(PortError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Client not found" })),
        )
            .into_response(),
        Err(e) => {
            error!("Error updating client: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to update client" })),
            )
                .into_response()
        }
    }
}

pub async fn delete_client(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    match app_state.store.delete_client(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(PortError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Client not found" })),
        )
            .into_response(),
        Err(e) => {
            error!("Error deleting client: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to delete client" })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_metadata_arithmetic() {
        let p = Pagination::new(120, 2, 50);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next);
        assert!(p.has_previous);

        let first = Pagination::new(120, 1, 50);
        assert!(first.has_next);
        assert!(!first.has_previous);

        let last = Pagination::new(120, 3, 50);
        assert!(!last.has_next);
        assert!(last.has_previous);
    }

    #[test]
    fn pagination_of_empty_listing() {
        let p = Pagination::new(0, 1, 50);
        assert_eq!(p.total_pages, 0);
        assert!(!p.has_next);
        assert!(!p.has_previous);
    }
}
