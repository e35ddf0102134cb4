//! services/api/src/adapters/whatsapp.rs
//!
//! This module contains the adapter for the WhatsApp Cloud API (Meta Graph API).
//! It implements the `MessageSender` port from the `core` crate.

use async_trait::async_trait;
use serde::Serialize;
use wachat_core::ports::{MessageSender, PortError, PortResult};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `MessageSender` port against the WhatsApp
/// Cloud API. Exactly one delivery attempt is made per call.
#[derive(Clone)]
pub struct WhatsAppSender {
    http: reqwest::Client,
    base_url: String,
    phone_number_id: String,
    access_token: String,
}

impl WhatsAppSender {
    /// Creates a new `WhatsAppSender`. `base_url` is the Graph API root
    /// (overridable so tests can point at a local server).
    pub fn new(base_url: String, phone_number_id: String, access_token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            phone_number_id,
            access_token,
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/{}/messages", self.base_url, self.phone_number_id)
    }

    async fn post_message<T: Serialize + ?Sized>(&self, payload: &T) -> PortResult<()> {
        let response = self
            .http
            .post(self.messages_url())
            .bearer_auth(&self.access_token)
            .json(payload)
            .send()
            .await
            .map_err(|e| PortError::Delivery(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            // Surface the provider's error payload to the caller.
            let body = response.text().await.unwrap_or_default();
            return Err(PortError::Delivery(format!(
                "WhatsApp API error ({}): {}",
                status, body
            )));
        }
        Ok(())
    }
}

//=========================================================================================
// Request Envelopes
//=========================================================================================

#[derive(Serialize)]
struct TextMessageRequest<'a> {
    messaging_product: &'static str,
    recipient_type: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    message_type: &'static str,
    text: TextContent<'a>,
}

#[derive(Serialize)]
struct TextContent<'a> {
    preview_url: bool,
    body: &'a str,
}

#[derive(Serialize)]
struct TemplateMessageRequest<'a> {
    messaging_product: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    message_type: &'static str,
    template: TemplatePayload<'a>,
}

#[derive(Serialize)]
struct TemplatePayload<'a> {
    name: &'a str,
    language: LanguageCode<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    components: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct LanguageCode<'a> {
    code: &'a str,
}

//=========================================================================================
// `MessageSender` Trait Implementation
//=========================================================================================

#[async_trait]
impl MessageSender for WhatsAppSender {
    async fn send_text(&self, to: &str, text: &str) -> PortResult<()> {
        let request = TextMessageRequest {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to,
            message_type: "text",
            text: TextContent {
                preview_url: false,
                body: text,
            },
        };
        self.post_message(&request).await
    }

    async fn send_template(
        &self,
        to: &str,
        template_name: &str,
        language_code: &str,
        components: Option<serde_json::Value>,
    ) -> PortResult<()> {
        let request = TemplateMessageRequest {
            messaging_product: "whatsapp",
            to,
            message_type: "template",
            template: TemplatePayload {
                name: template_name,
                language: LanguageCode {
                    code: language_code,
                },
                components,
            },
        };
        self.post_message(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sender_for(server: &MockServer) -> WhatsAppSender {
        WhatsAppSender::new(server.uri(), "12345".to_string(), "secret-token".to_string())
    }

    #[tokio::test]
    async fn send_text_posts_the_fixed_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/12345/messages"))
            .and(header("authorization", "Bearer secret-token"))
            .and(body_partial_json(json!({
                "messaging_product": "whatsapp",
                "recipient_type": "individual",
                "to": "15550001111",
                "type": "text",
                "text": { "preview_url": false, "body": "hello" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messages": [{ "id": "wamid.test" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let sender = sender_for(&server);
        sender
            .send_text("15550001111", "hello")
            .await
            .expect("send should succeed");
    }

    #[tokio::test]
    async fn non_2xx_becomes_a_delivery_error_with_the_provider_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/12345/messages"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": { "message": "Invalid OAuth access token", "code": 190 }
            })))
            .mount(&server)
            .await;

        let sender = sender_for(&server);
        let err = sender
            .send_text("15550001111", "hello")
            .await
            .expect_err("send should fail");
        match err {
            PortError::Delivery(payload) => {
                assert!(payload.contains("401"));
                assert!(payload.contains("Invalid OAuth access token"));
            }
            other => panic!("expected Delivery error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn send_template_carries_name_and_language() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/12345/messages"))
            .and(body_partial_json(json!({
                "messaging_product": "whatsapp",
                "to": "15550001111",
                "type": "template",
                "template": { "name": "hello_world", "language": { "code": "en_US" } }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let sender = sender_for(&server);
        sender
            .send_template("15550001111", "hello_world", "en_US", None)
            .await
            .expect("template send should succeed");
    }
}
