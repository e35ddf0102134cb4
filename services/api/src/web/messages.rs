//! services/api/src/web/messages.rs
//!
//! The direct-send endpoint used by the operator dashboard: deliver a text
//! message through the gateway, then stamp the recipient's client record.
//! The client record is only touched when the send itself succeeded.

use crate::web::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use wachat_core::ports::{DataStore, MessageSender, PortError};

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    pub to: Option<String>,
    pub text: Option<String>,
}

/// The categorized failure returned when a send cannot be completed.
#[derive(Debug, Serialize, ToSchema)]
pub struct SendErrorBody {
    pub message: String,
    pub code: &'static str,
    pub status_code: u16,
}

impl SendErrorBody {
    fn response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(json!({ "success": false, "error": self }))).into_response()
    }
}

/// Sends a message and updates the client's last-message field. The send is
/// attempted first; a failed send leaves the client record untouched.
pub async fn send_message_and_update_client(
    store: &dyn DataStore,
    sender: &dyn MessageSender,
    to: &str,
    text: &str,
) -> Result<(), SendErrorBody> {
    if let Err(e) = sender.send_text(to, text).await {
        error!("Error in message service: {}", e);
        return Err(SendErrorBody {
            message: "Failed to send message".to_string(),
            code: "MESSAGE_SEND_FAILED",
            status_code: 500,
        });
    }

    match store.touch_client_by_phone(to, text).await {
        Ok(()) => Ok(()),
        Err(PortError::NotFound(message)) => Err(SendErrorBody {
            message,
            code: "CLIENT_NOT_FOUND",
            status_code: 404,
        }),
        Err(e) => {
            error!("Error in message service: {}", e);
            Err(SendErrorBody {
                message: "An unexpected error occurred".to_string(),
                code: "UNKNOWN_ERROR",
                status_code: 500,
            })
        }
    }
}

/// Send a WhatsApp text message to a phone number.
#[utoipa::path(
    post,
    path = "/api/v1/send-message",
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Message sent and client updated"),
        (status = 400, description = "Missing or invalid parameters"),
        (status = 404, description = "No client record for the recipient"),
        (status = 500, description = "Delivery failed")
    )
)]
pub async fn send_message(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<SendMessageRequest>,
) -> Response {
    let Some(to) = body.to.as_deref().filter(|t| !t.is_empty()) else {
        return SendErrorBody {
            message: "Missing or invalid recipient phone number".to_string(),
            code: "INVALID_PARAMETER",
            status_code: 400,
        }
        .response();
    };
    let Some(text) = body.text.as_deref().filter(|t| !t.is_empty()) else {
        return SendErrorBody {
            message: "Missing or invalid message text".to_string(),
            code: "INVALID_PARAMETER",
            status_code: 400,
        }
        .response();
    };

    info!("Sending WhatsApp message to {}", to);

    match send_message_and_update_client(
        app_state.store.as_ref(),
        app_state.sender.as_ref(),
        to,
        text,
    )
    .await
    {
        Ok(()) => Json(json!({ "success": true })).into_response(),
        Err(error) => error.response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeSender, FakeStore};

    #[tokio::test]
    async fn successful_send_updates_the_client() {
        let store = FakeStore::default();
        store.add_client("15550001111", "Jane", "Client");
        let sender = FakeSender::default();

        send_message_and_update_client(&store, &sender, "15550001111", "hello")
            .await
            .expect("send should succeed");

        assert_eq!(sender.sent().len(), 1);
        assert_eq!(store.clients()[0].last_message, "hello");
    }

    #[tokio::test]
    async fn failed_send_reports_a_code_and_skips_the_client_update() {
        let store = FakeStore::default();
        store.add_client("15550001111", "Jane", "Client");
        let sender = FakeSender::default();
        sender.fail_all();

        let error = send_message_and_update_client(&store, &sender, "15550001111", "hello")
            .await
            .expect_err("send should fail");

        assert_eq!(error.code, "MESSAGE_SEND_FAILED");
        assert_eq!(error.status_code, 500);
        // The client record must not have been touched.
        assert_eq!(store.touch_calls(), 0);
        assert_eq!(store.clients()[0].last_message, "");
    }

    #[tokio::test]
    async fn unknown_recipient_maps_to_client_not_found() {
        let store = FakeStore::default();
        let sender = FakeSender::default();

        let error = send_message_and_update_client(&store, &sender, "15550009999", "hello")
            .await
            .expect_err("update should fail");

        assert_eq!(error.code, "CLIENT_NOT_FOUND");
        assert_eq!(error.status_code, 404);
        // The message itself did go out; only the bookkeeping failed.
        assert_eq!(sender.sent().len(), 1);
    }
}
