//! services/api/src/web/webhook.rs
//!
//! Axum handlers for the WhatsApp webhook: the one-shot verification
//! handshake (GET) and inbound event ingestion (POST).
//!
//! The ingestion handler's cardinal rule: once a payload passes structural
//! validation it is always acknowledged with 200, whatever happens to the
//! individual messages inside it, so the provider never retry-floods on a
//! transient internal error.

use crate::web::responder::process_text_message;
use crate::web::state::AppState;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

//=========================================================================================
// Webhook Payload Structs
//=========================================================================================

// Every field is optional so malformed payloads reach the validators below
// and come back as a 400 instead of a deserialization rejection.

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub object: Option<String>,
    pub entry: Option<Vec<WebhookEntry>>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEntry {
    pub id: Option<String>,
    pub changes: Option<Vec<WebhookChange>>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookChange {
    pub value: Option<ChangeValue>,
    pub field: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeValue {
    pub messaging_product: Option<String>,
    pub metadata: Option<ChangeMetadata>,
    pub contacts: Option<Vec<WebhookContact>>,
    pub messages: Option<Vec<InboundMessage>>,
    pub statuses: Option<Vec<StatusUpdate>>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeMetadata {
    pub display_phone_number: Option<String>,
    pub phone_number_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookContact {
    pub wa_id: Option<String>,
    pub profile: Option<ContactProfile>,
}

#[derive(Debug, Deserialize)]
pub struct ContactProfile {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InboundMessage {
    pub from: Option<String>,
    pub id: Option<String>,
    pub timestamp: Option<String>,
    #[serde(rename = "type")]
    pub message_type: Option<String>,
    pub text: Option<TextBody>,
}

#[derive(Debug, Deserialize)]
pub struct TextBody {
    pub body: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub id: Option<String>,
    pub status: Option<String>,
    pub timestamp: Option<String>,
    pub recipient_id: Option<String>,
}

impl WebhookPayload {
    /// The `value` of the first change of the first entry, when present.
    fn first_change_value(&self) -> Option<&ChangeValue> {
        self.entry
            .as_ref()?
            .first()?
            .changes
            .as_ref()?
            .first()?
            .value
            .as_ref()
    }
}

//=========================================================================================
// Validation
//=========================================================================================

/// Structure validation: a non-empty `entry` sequence whose first entry has
/// a non-empty `changes` sequence.
pub fn is_valid_webhook_structure(payload: &WebhookPayload) -> bool {
    payload.object.is_some()
        && payload
            .entry
            .as_ref()
            .and_then(|entries| entries.first())
            .and_then(|entry| entry.changes.as_ref())
            .is_some_and(|changes| !changes.is_empty())
}

/// Content validation: the change's `value` must be a WhatsApp status batch
/// or a WhatsApp message batch whose first message carries the required
/// fields.
pub fn is_valid_message_data(value: &ChangeValue) -> bool {
    if value.messaging_product.as_deref() != Some("whatsapp") {
        return false;
    }

    // A status update batch.
    if value
        .statuses
        .as_ref()
        .is_some_and(|statuses| !statuses.is_empty())
    {
        return true;
    }

    // A message batch.
    value.metadata.is_some()
        && value
            .messages
            .as_ref()
            .and_then(|messages| messages.first())
            .is_some_and(|first| {
                first.from.is_some()
                    && first.id.is_some()
                    && first.timestamp.is_some()
                    && first.message_type.is_some()
            })
}

/// Resolves the sender's display name from the `contacts` list by WhatsApp id.
pub fn sender_name(value: &ChangeValue, from: &str) -> String {
    value
        .contacts
        .as_ref()
        .and_then(|contacts| {
            contacts
                .iter()
                .find(|c| c.wa_id.as_deref() == Some(from))
        })
        .and_then(|contact| contact.profile.as_ref())
        .and_then(|profile| profile.name.clone())
        .unwrap_or_else(|| "Unknown".to_string())
}

//=========================================================================================
// Ingestion Handler (POST)
//=========================================================================================

/// Receives a WhatsApp webhook delivery and dispatches each text message to
/// the responder pipeline.
pub async fn receive_webhook(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<WebhookPayload>,
) -> Response {
    info!("Received webhook POST request");

    if !is_valid_webhook_structure(&payload) {
        warn!("Invalid webhook data structure");
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid webhook data structure" })),
        )
            .into_response();
    }

    let value = match payload.first_change_value() {
        Some(value) if is_valid_message_data(value) => value,
        _ => {
            warn!("Invalid or missing message data in webhook");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid or missing message data" })),
            )
                .into_response();
        }
    };

    if let Some(messages) = &value.messages {
        // Messages are handled one at a time, in array order; a failure on
        // one message never blocks the rest and never reaches the response.
        for message in messages {
            let is_text = message.message_type.as_deref() == Some("text");
            if is_text && message.text.is_some() {
                process_text_message(&app_state, message, value).await;
            } else {
                info!(
                    "Received non-text message of type: {}",
                    message.message_type.as_deref().unwrap_or("unknown")
                );
            }
        }
    } else if let Some(statuses) = &value.statuses {
        for status in statuses {
            info!(
                "Received status update: {} for message {}",
                status.status.as_deref().unwrap_or("unknown"),
                status.id.as_deref().unwrap_or("unknown")
            );
        }
    }

    // Always acknowledge receipt once validation has passed.
    (StatusCode::OK, Json(json!({ "status": "success" }))).into_response()
}

//=========================================================================================
// Verification Handler (GET)
//=========================================================================================

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// The handshake succeeds iff the mode is "subscribe" and the token matches
/// the configured verify token.
pub fn is_valid_verification(mode: Option<&str>, token: Option<&str>, verify_token: &str) -> bool {
    mode == Some("subscribe") && token == Some(verify_token)
}

/// Answers the provider's webhook verification challenge.
pub async fn verify_webhook(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<VerifyParams>,
) -> Response {
    if is_valid_verification(
        params.mode.as_deref(),
        params.verify_token.as_deref(),
        &app_state.config.whatsapp_verify_token,
    ) {
        info!("Webhook verified successfully");
        (StatusCode::OK, params.challenge.unwrap_or_default()).into_response()
    } else {
        error!("Webhook verification failed");
        (StatusCode::FORBIDDEN, "Verification failed").into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_router, FakeSender, FakeStore};
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn text_webhook_body(from: &str, text: &str) -> Value {
        json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "entry-1",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "metadata": {
                            "display_phone_number": "15550009999",
                            "phone_number_id": "12345"
                        },
                        "contacts": [{
                            "wa_id": from,
                            "profile": { "name": "Jane" }
                        }],
                        "messages": [{
                            "from": from,
                            "id": "wamid.1",
                            "timestamp": "1700000000",
                            "type": "text",
                            "text": { "body": text }
                        }]
                    }
                }]
            }]
        })
    }

    async fn post_webhook(store: Arc<FakeStore>, sender: Arc<FakeSender>, body: Value) -> StatusCode {
        let app = test_router(store, sender);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/webhook/whatsapp")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");
        response.status()
    }

    #[tokio::test]
    async fn missing_entry_is_rejected_without_writes() {
        let store = Arc::new(FakeStore::default());
        let sender = Arc::new(FakeSender::default());
        let status = post_webhook(
            store.clone(),
            sender.clone(),
            json!({ "object": "whatsapp_business_account" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(store.clients().is_empty());
        assert!(store.messages().is_empty());
    }

    #[tokio::test]
    async fn empty_changes_is_rejected() {
        let store = Arc::new(FakeStore::default());
        let sender = Arc::new(FakeSender::default());
        let status = post_webhook(
            store.clone(),
            sender,
            json!({
                "object": "whatsapp_business_account",
                "entry": [{ "id": "entry-1", "changes": [] }]
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(store.messages().is_empty());
    }

    #[tokio::test]
    async fn wrong_messaging_product_is_rejected() {
        let store = Arc::new(FakeStore::default());
        let sender = Arc::new(FakeSender::default());
        let mut body = text_webhook_body("15550001111", "hello");
        body["entry"][0]["changes"][0]["value"]["messaging_product"] = json!("sms");
        let status = post_webhook(store, sender, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn valid_text_message_is_acknowledged_and_replied_to() {
        let store = Arc::new(FakeStore::default());
        let sender = Arc::new(FakeSender::default());
        let status = post_webhook(
            store.clone(),
            sender.clone(),
            text_webhook_body("15550001111", "hello"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        // One inbound and one outbound message, reply delivered to the sender.
        let messages = store.messages();
        assert_eq!(messages.len(), 2);
        assert!(!messages[0].from_bot);
        assert!(messages[1].from_bot);
        let sent = sender.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "15550001111");
    }

    #[tokio::test]
    async fn internal_failure_still_returns_success() {
        let store = Arc::new(FakeStore::default());
        store.fail_messages();
        let sender = Arc::new(FakeSender::default());
        let status = post_webhook(
            store,
            sender.clone(),
            text_webhook_body("15550001111", "hello"),
        )
        .await;
        // The provider must still get an acknowledgment; the apology reply
        // is dispatched instead of the generated response.
        assert_eq!(status, StatusCode::OK);
        let sent = sender.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.starts_with("Sorry"));
    }

    #[tokio::test]
    async fn status_updates_are_acknowledged_without_processing() {
        let store = Arc::new(FakeStore::default());
        let sender = Arc::new(FakeSender::default());
        let status = post_webhook(
            store.clone(),
            sender.clone(),
            json!({
                "object": "whatsapp_business_account",
                "entry": [{
                    "id": "entry-1",
                    "changes": [{
                        "field": "messages",
                        "value": {
                            "messaging_product": "whatsapp",
                            "statuses": [{ "id": "wamid.1", "status": "delivered" }]
                        }
                    }]
                }]
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(store.messages().is_empty());
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn verification_echoes_the_challenge_on_match() {
        let app = test_router(
            Arc::new(FakeStore::default()),
            Arc::new(FakeSender::default()),
        );
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/webhook/whatsapp?hub.mode=subscribe&hub.verify_token=test-verify-token&hub.challenge=challenge-123")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .expect("body");
        assert_eq!(&body[..], b"challenge-123");
    }

    #[tokio::test]
    async fn verification_mismatch_is_forbidden_and_leaks_no_challenge() {
        let app = test_router(
            Arc::new(FakeStore::default()),
            Arc::new(FakeSender::default()),
        );
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/webhook/whatsapp?hub.mode=subscribe&hub.verify_token=wrong&hub.challenge=challenge-123")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .expect("body");
        assert!(!String::from_utf8_lossy(&body).contains("challenge-123"));
    }
}
