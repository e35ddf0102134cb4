//! crates/wachat_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or the
//! WhatsApp Cloud API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Campaign, CampaignPerformance, CampaignStatus, Client, QaPair, StoredMessage, Template,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The outbound gateway rejected a send; the payload is the provider's
    /// error body.
    #[error("Delivery failed: {0}")]
    Delivery(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Partial-Update Payloads
//=========================================================================================

/// Fields of a client that operator CRUD may change. `None` leaves the
/// stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct ClientUpdate {
    pub phone: Option<String>,
    pub name: Option<String>,
    pub client_type: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct QaPairUpdate {
    pub question: Option<String>,
    pub answer: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewTemplate {
    pub name: String,
    pub content: String,
    pub category: String,
    pub variables: Vec<String>,
    pub language: String,
}

#[derive(Debug, Clone, Default)]
pub struct TemplateUpdate {
    pub name: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub variables: Option<Vec<String>>,
    pub language: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub name: String,
    pub campaign_type: String,
    pub audience: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct CampaignUpdate {
    pub name: Option<String>,
    pub campaign_type: Option<String>,
    pub status: Option<CampaignStatus>,
    pub audience: Option<String>,
    pub message: Option<String>,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DataStore: Send + Sync {
    // --- Client Directory ---
    async fn find_client_by_phone(&self, phone: &str) -> PortResult<Option<Client>>;

    async fn get_client(&self, id: Uuid) -> PortResult<Client>;

    async fn create_client(
        &self,
        phone: &str,
        name: &str,
        client_type: &str,
    ) -> PortResult<Client>;

    async fn update_client(&self, id: Uuid, update: ClientUpdate) -> PortResult<Client>;

    async fn delete_client(&self, id: Uuid) -> PortResult<()>;

    async fn list_clients(&self, offset: i64, limit: i64) -> PortResult<Vec<Client>>;

    async fn count_clients(&self) -> PortResult<i64>;

    async fn clients_by_type(&self, client_type: &str) -> PortResult<Vec<Client>>;

    /// Stamps `last_active = now()` and replaces `last_message`.
    async fn record_client_activity(&self, client_id: Uuid, last_message: &str) -> PortResult<()>;

    /// Same stamp, addressed by phone. `NotFound` when no such client exists.
    async fn touch_client_by_phone(&self, phone: &str, last_message: &str) -> PortResult<()>;

    async fn count_clients_active_since(&self, since: DateTime<Utc>) -> PortResult<i64>;

    async fn recent_clients(&self, limit: i64) -> PortResult<Vec<Client>>;

    // --- Messages ---
    async fn save_message(
        &self,
        client_id: Uuid,
        text: &str,
        from_bot: bool,
    ) -> PortResult<StoredMessage>;

    async fn messages_for_client(&self, client_id: Uuid) -> PortResult<Vec<StoredMessage>>;

    async fn count_messages(&self) -> PortResult<i64>;

    async fn recent_messages(&self, limit: i64) -> PortResult<Vec<(StoredMessage, Client)>>;

    // --- QA Pairs ---
    /// Case-insensitive full-string equality, capped at one row.
    async fn find_qa_exact(&self, question: &str) -> PortResult<Vec<QaPair>>;

    /// Case-insensitive substring match of any keyword against stored questions.
    async fn find_qa_by_keywords(&self, keywords: &[String], limit: i64)
        -> PortResult<Vec<QaPair>>;

    /// Case-insensitive substring match of the whole message against stored questions.
    async fn find_qa_containing(&self, message: &str, limit: i64) -> PortResult<Vec<QaPair>>;

    async fn list_qa_pairs(&self) -> PortResult<Vec<QaPair>>;

    async fn get_qa_pair(&self, id: Uuid) -> PortResult<QaPair>;

    async fn create_qa_pair(
        &self,
        question: &str,
        answer: &str,
        category: &str,
    ) -> PortResult<QaPair>;

    async fn update_qa_pair(&self, id: Uuid, update: QaPairUpdate) -> PortResult<QaPair>;

    async fn delete_qa_pair(&self, id: Uuid) -> PortResult<()>;

    // --- Templates ---
    async fn list_templates(&self, language: &str) -> PortResult<Vec<Template>>;

    async fn get_template(&self, id: Uuid) -> PortResult<Template>;

    async fn find_template_by_name(
        &self,
        name: &str,
        language: &str,
    ) -> PortResult<Option<Template>>;

    async fn create_template(&self, new: NewTemplate) -> PortResult<Template>;

    async fn update_template(&self, id: Uuid, update: TemplateUpdate) -> PortResult<Template>;

    async fn delete_template(&self, id: Uuid) -> PortResult<()>;

    // --- Campaigns ---
    async fn list_campaigns(&self) -> PortResult<Vec<Campaign>>;

    async fn get_campaign(&self, id: Uuid) -> PortResult<Campaign>;

    async fn create_campaign(&self, new: NewCampaign) -> PortResult<Campaign>;

    async fn update_campaign(&self, id: Uuid, update: CampaignUpdate) -> PortResult<Campaign>;

    async fn delete_campaign(&self, id: Uuid) -> PortResult<()>;

    async fn add_campaign_clients(&self, id: Uuid, client_ids: &[Uuid]) -> PortResult<()>;

    async fn campaign_clients(&self, id: Uuid) -> PortResult<Vec<Client>>;

    /// Adds `delivered` to `sent_count`, stamps `last_sent_at`, and marks the
    /// campaign Active.
    async fn record_campaign_send(&self, id: Uuid, delivered: i64) -> PortResult<()>;

    async fn count_active_campaigns(&self) -> PortResult<i64>;

    async fn campaign_performance(&self, limit: i64) -> PortResult<Vec<CampaignPerformance>>;
}

/// The outbound messaging capability: anything that can deliver a message to
/// a phone-number-shaped address. One concrete implementation talks to the
/// WhatsApp Cloud API; tests substitute fakes.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Sends a plain text message. At most one delivery attempt is made.
    async fn send_text(&self, to: &str, text: &str) -> PortResult<()>;

    /// Sends a provider-registered template message.
    async fn send_template(
        &self,
        to: &str,
        template_name: &str,
        language_code: &str,
        components: Option<serde_json::Value>,
    ) -> PortResult<()>;
}
