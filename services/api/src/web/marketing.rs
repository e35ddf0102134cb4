//! services/api/src/web/marketing.rs
//!
//! Marketing endpoints: template CRUD and template broadcasts to single
//! clients or whole client segments. Broadcasts iterate recipients
//! sequentially and record per-recipient outcomes independently, so one
//! failed delivery never aborts the batch.

use crate::web::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;
use wachat_core::domain::Client;
use wachat_core::ports::{NewTemplate, PortError, TemplateUpdate};

const DEFAULT_TEMPLATE_LANGUAGE_CODE: &str = "en_US";

//=========================================================================================
// Payload Structs
//=========================================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendTemplateRequest {
    pub template_name: Option<String>,
    pub language_code: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BroadcastTemplateRequest {
    pub template_name: Option<String>,
    pub client_type: Option<String>,
    pub language_code: Option<String>,
}

/// Per-recipient outcome of a broadcast.
#[derive(Debug, Serialize, ToSchema)]
pub struct BroadcastResult {
    pub client_id: Uuid,
    pub name: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TemplateListParams {
    pub language: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTemplateRequest {
    pub name: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub variables: Option<Vec<String>>,
    pub language: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateTemplateRequest {
    pub name: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub variables: Option<Vec<String>>,
    pub language: Option<String>,
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

//=========================================================================================
// Template Sends
//=========================================================================================

/// Send a named template to a single client.
pub async fn send_to_client(
    State(app_state): State<Arc<AppState>>,
    Path(client_id): Path<Uuid>,
    Json(body): Json<SendTemplateRequest>,
) -> Response {
    let Some(template_name) = body.template_name.as_deref() else {
        return bad_request("Template name is required");
    };
    let language_code = body
        .language_code
        .as_deref()
        .unwrap_or(DEFAULT_TEMPLATE_LANGUAGE_CODE);

    let client = match app_state.store.get_client(client_id).await {
        Ok(client) => client,
        Err(PortError::NotFound(_)) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Client not found" })),
            )
                .into_response()
        }
        Err(e) => {
            error!("Error sending template: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to send template" })),
            )
                .into_response();
        }
    };

    if let Err(e) = app_state
        .sender
        .send_template(&client.phone, template_name, language_code, None)
        .await
    {
        error!("Error sending template: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to send template" })),
        )
            .into_response();
    }

    if let Err(e) = record_template_activity(&app_state, &client, template_name).await {
        error!("Failed to update client after template send: {}", e);
    }

    Json(json!({
        "success": true,
        "message": format!("Template {} sent to {}", template_name, client.name),
    }))
    .into_response()
}

/// Broadcast a template to every client of a given type.
pub async fn send_to_type(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<BroadcastTemplateRequest>,
) -> Response {
    let Some(template_name) = body.template_name.as_deref() else {
        return bad_request("Template name is required");
    };
    let client_type = match body.client_type.as_deref() {
        Some(t) if t == "Client" || t == "Broker" => t,
        _ => return bad_request("Valid client type is required (Client or Broker)"),
    };
    let language_code = body
        .language_code
        .as_deref()
        .unwrap_or(DEFAULT_TEMPLATE_LANGUAGE_CODE);

    let clients = match app_state.store.clients_by_type(client_type).await {
        Ok(clients) => clients,
        Err(e) => {
            error!("Error broadcasting template: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to broadcast template" })),
            )
                .into_response();
        }
    };

    if clients.is_empty() {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("No clients found with type: {}", client_type) })),
        )
            .into_response();
    }

    let results =
        broadcast_template(&app_state, &clients, template_name, language_code).await;
    let sent_count = results.iter().filter(|r| r.status == "success").count();
    let failed_count = results.len() - sent_count;

    Json(json!({
        "success": true,
        "message": format!("Template {} broadcast to {}s", template_name, client_type),
        "sent_count": sent_count,
        "failed_count": failed_count,
        "results": results,
    }))
    .into_response()
}

/// Sends a template to each recipient in turn; one failure never aborts the
/// batch.
async fn broadcast_template(
    app_state: &AppState,
    clients: &[Client],
    template_name: &str,
    language_code: &str,
) -> Vec<BroadcastResult> {
    let mut results = Vec::with_capacity(clients.len());
    for client in clients {
        let outcome = async {
            app_state
                .sender
                .send_template(&client.phone, template_name, language_code, None)
                .await?;
            record_template_activity(app_state, client, template_name).await
        }
        .await;

        match outcome {
            Ok(()) => results.push(BroadcastResult {
                client_id: client.id,
                name: client.name.clone(),
                status: "success",
                error: None,
            }),
            Err(e) => results.push(BroadcastResult {
                client_id: client.id,
                name: client.name.clone(),
                status: "failed",
                error: Some(e.to_string()),
            }),
        }
    }
    results
}

async fn record_template_activity(
    app_state: &AppState,
    client: &Client,
    template_name: &str,
) -> Result<(), PortError> {
    app_state
        .store
        .record_client_activity(client.id, &format!("Template: {}", template_name))
        .await
}

//=========================================================================================
// Template CRUD
//=========================================================================================

/// List templates for a language; invalid or missing languages fall back
/// to "en".
pub async fn list_templates(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<TemplateListParams>,
) -> Response {
    let language = match params.language.as_deref() {
        Some("ar") => "ar",
        _ => "en",
    };
    info!("Fetching templates for language: {}", language);

    match app_state.store.list_templates(language).await {
        Ok(templates) => Json(templates).into_response(),
        Err(e) => {
            error!("Error getting templates: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to get templates" })),
            )
                .into_response()
        }
    }
}

pub async fn get_template(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    match app_state.store.get_template(id).await {
        Ok(template) => Json(template).into_response(),
        Err(PortError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Template not found" })),
        )
            .into_response(),
        Err(e) => {
            error!("Error getting template: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to get template" })),
            )
                .into_response()
        }
    }
}

pub async fn create_template(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<CreateTemplateRequest>,
) -> Response {
    let Some(name) = body.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) else {
        return bad_request("Template name is required");
    };
    let Some(content) = body.content.as_deref().filter(|c| !c.is_empty()) else {
        return bad_request("Template content is required");
    };
    let language = body.language.as_deref().unwrap_or("en");
    if language != "en" && language != "ar" {
        return bad_request("Language must be either \"en\" or \"ar\"");
    }

    // Reject duplicates up front so the caller gets a 400 instead of a
    // constraint-violation 500.
    match app_state.store.find_template_by_name(name, language).await {
        Ok(Some(_)) => {
            return bad_request(&format!(
                "A template with the name \"{}\" already exists for language \"{}\"",
                name, language
            ))
        }
        Ok(None) => {}
        Err(e) => {
            error!("Error creating template: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to create template" })),
            )
                .into_response();
        }
    }

    let new = NewTemplate {
        name: name.to_string(),
        content: content.to_string(),
        category: body.category.unwrap_or_else(|| "custom".to_string()),
        variables: body.variables.unwrap_or_default(),
        language: language.to_string(),
    };
    match app_state.store.create_template(new).await {
        Ok(template) => (StatusCode::CREATED, Json(template)).into_response(),
        Err(e) => {
            error!("Error creating template: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to create template" })),
            )
                .into_response()
        }
    }
}

pub async fn update_template(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateTemplateRequest>,
) -> Response {
    let existing = match app_state.store.get_template(id).await {
        Ok(template) => template,
        Err(PortError::NotFound(_)) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Template not found" })),
            )
                .into_response()
        }
        Err(e) => {
            error!("Error updating template: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to update template" })),
            )
                .into_response();
        }
    };

    if let Some(language) = body.language.as_deref() {
        if language != "en" && language != "ar" {
            return bad_request("Language must be either \"en\" or \"ar\"");
        }
    }

    // When the (name, language) pair changes, make sure it stays unique.
    let target_name = body.name.as_deref().unwrap_or(&existing.name);
    let target_language = body.language.as_deref().unwrap_or(&existing.language);
    if target_name != existing.name || target_language != existing.language {
        match app_state
            .store
            .find_template_by_name(target_name, target_language)
            .await
        {
            Ok(Some(other)) if other.id != id => {
                return bad_request(&format!(
                    "A template with the name \"{}\" already exists for language \"{}\"",
                    target_name, target_language
                ))
            }
            Ok(_) => {}
            Err(e) => {
                error!("Error updating template: {}", e);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Failed to update template" })),
                )
                    .into_response();
            }
        }
    }

    let update = TemplateUpdate {
        name: body.name,
        content: body.content,
        category: body.category,
        variables: body.variables,
        language: body.language,
    };
    match app_state.store.update_template(id, update).await {
        Ok(template) => Json(template).into_response(),
        Err(PortError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Template not found" })),
        )
            .into_response(),
        Err(e) => {
            error!("Error updating template: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to update template" })),
            )
                .into_response()
        }
    }
}

pub async fn delete_template(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    match app_state.store.delete_template(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(PortError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Template not found" })),
        )
            .into_response(),
        Err(e) => {
            error!("Error deleting template: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to delete template" })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_router, FakeSender, FakeStore};
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    async fn post_json(
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
    async fn broadcast_isolates_per_recipient_failures() {
        let store = Arc::new(FakeStore::default());
        store.add_client("15550001111", "Jane", "Broker");
        store.add_client("15550002222", "Joe", "Broker");
        store.add_client("15550003333", "Jim", "Broker");
        let sender = Arc::new(FakeSender::default());
        sender.fail_for("15550002222");

        let (status, body) = post_json(
            store.clone(),
            sender.clone(),
            "/api/v1/marketing/send_all",
            json!({ "template_name": "special_offer", "client_type": "Broker" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sent_count"], 2);
        assert_eq!(body["failed_count"], 1);
        assert_eq!(sender.templates_sent().len(), 2);

        // Only the successful recipients get their activity stamped.
        let touched: Vec<_> = store
            .clients()
            .into_iter()
            .filter(|c| c.last_message == "Template: special_offer")
            .collect();
        assert_eq!(touched.len(), 2);
    }

    #[tokio::test]
    async fn broadcast_requires_a_known_client_type() {
        let (status, body) = post_json(
            Arc::new(FakeStore::default()),
            Arc::new(FakeSender::default()),
            "/api/v1/marketing/send_all",
            json!({ "template_name": "special_offer", "client_type": "Vendor" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("client type"));
    }

    #[tokio::test]
    async fn sending_to_an_unknown_client_is_not_found() {
        let (status, _) = post_json(
            Arc::new(FakeStore::default()),
            Arc::new(FakeSender::default()),
            &format!("/api/v1/marketing/send/{}", Uuid::new_v4()),
            json!({ "template_name": "hello_world" }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn duplicate_template_name_and_language_is_rejected() {
        let store = Arc::new(FakeStore::default());
        store.add_template("hello_world", "Hello, {{1}}!", "en");

        let (status, body) = post_json(
            store,
            Arc::new(FakeSender::default()),
            "/api/v1/marketing/templates",
            json!({ "name": "hello_world", "content": "Hi, {{1}}!", "language": "en" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("already exists"));
    }

    #[tokio::test]
    async fn template_language_must_be_en_or_ar() {
        let (status, _) = post_json(
            Arc::new(FakeStore::default()),
            Arc::new(FakeSender::default()),
            "/api/v1/marketing/templates",
            json!({ "name": "hello", "content": "Hi", "language": "fr" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
