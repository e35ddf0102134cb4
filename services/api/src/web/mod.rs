pub mod campaigns;
pub mod clients;
pub mod dashboard;
pub mod marketing;
pub mod messages;
pub mod qa_pairs;
pub mod responder;
pub mod rest;
pub mod state;
pub mod webhook;

use axum::routing::{get, post};
use axum::Router;
use self::state::AppState;
use std::sync::Arc;

// Re-export the main webhook handlers to make them easily accessible
// to the binary that will build the web server router.
pub use rest::ApiDoc;
pub use webhook::{receive_webhook, verify_webhook};

/// Builds the application router: webhook ingestion plus the operator CRUD
/// and dashboard surface, all mounted under `/api/v1`.
pub fn app_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        // Dashboard
        .route("/api/v1", get(dashboard::overview))
        .route("/api/v1/stats", get(dashboard::stats))
        .route("/api/v1/recent-activity", get(dashboard::recent_activity))
        .route(
            "/api/v1/campaign-performance",
            get(dashboard::campaign_performance),
        )
        // WhatsApp webhook (verification handshake + event ingestion)
        .route(
            "/api/v1/webhook/whatsapp",
            get(webhook::verify_webhook).post(webhook::receive_webhook),
        )
        // Client directory
        .route(
            "/api/v1/clients",
            get(clients::list_clients).post(clients::create_client),
        )
        .route(
            "/api/v1/clients/{id}",
            get(clients::get_client)
                .put(clients::update_client)
                .delete(clients::delete_client),
        )
        .route("/api/v1/clients/{id}/messages", get(clients::client_messages))
        // QA pairs
        .route(
            "/api/v1/qa-pairs",
            get(qa_pairs::list_qa_pairs).post(qa_pairs::create_qa_pair),
        )
        .route(
            "/api/v1/qa-pairs/{id}",
            get(qa_pairs::get_qa_pair)
                .put(qa_pairs::update_qa_pair)
                .delete(qa_pairs::delete_qa_pair),
        )
        // Marketing
        .route("/api/v1/marketing/send/{client_id}", post(marketing::send_to_client))
        .route("/api/v1/marketing/send_all", post(marketing::send_to_type))
        .route(
            "/api/v1/marketing/templates",
            get(marketing::list_templates).post(marketing::create_template),
        )
        .route(
            "/api/v1/marketing/templates/{id}",
            get(marketing::get_template)
                .put(marketing::update_template)
                .delete(marketing::delete_template),
        )
        // Campaigns
        .route(
            "/api/v1/campaigns",
            get(campaigns::list_campaigns).post(campaigns::create_campaign),
        )
        .route(
            "/api/v1/campaigns/{id}",
            get(campaigns::get_campaign)
                .put(campaigns::update_campaign)
                .delete(campaigns::delete_campaign),
        )
        .route("/api/v1/campaigns/{id}/clients", post(campaigns::add_clients))
        .route("/api/v1/campaigns/{id}/send", post(campaigns::send_campaign))
        // Direct message sending
        .route("/api/v1/send-message", post(messages::send_message))
        .with_state(app_state)
}
