//! crates/wachat_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or HTTP framework.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A WhatsApp conversation partner, keyed externally by phone number.
///
/// Created lazily on the first inbound message if no record exists yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub phone: String,
    pub name: String,
    /// Segmentation tag, e.g. "Client" or "Broker".
    pub client_type: String,
    pub last_active: DateTime<Utc>,
    pub last_message: String,
    pub created_at: DateTime<Utc>,
}

/// A single message in a conversation. Append-only, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: Uuid,
    pub client_id: Uuid,
    pub text: String,
    /// True when the bot authored the message, false for the user.
    pub from_bot: bool,
    pub created_at: DateTime<Utc>,
}

/// A stored (question, answer, category) triple used for auto-response matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaPair {
    pub id: Uuid,
    pub question: String,
    pub answer: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

/// A provider-defined parameterized message format used for outbound
/// marketing sends. `name` is unique per `language`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: Uuid,
    pub name: String,
    /// Body text with positional `{{n}}` placeholders.
    pub content: String,
    pub category: String,
    pub variables: Vec<String>,
    /// "en" or "ar".
    pub language: String,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle of a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CampaignStatus {
    Draft,
    Active,
    Completed,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "Draft",
            CampaignStatus::Active => "Active",
            CampaignStatus::Completed => "Completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Draft" => Some(CampaignStatus::Draft),
            "Active" => Some(CampaignStatus::Active),
            "Completed" => Some(CampaignStatus::Completed),
            _ => None,
        }
    }
}

/// A named, client-segment-targeted broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub name: String,
    pub campaign_type: String,
    pub status: CampaignStatus,
    /// Free-text audience descriptor.
    pub audience: String,
    pub message: String,
    pub sent_count: i64,
    pub last_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Aggregate row for the dashboard's campaign-performance view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignPerformance {
    pub id: Uuid,
    pub name: String,
    pub status: CampaignStatus,
    pub sent_count: i64,
    pub last_sent_at: Option<DateTime<Utc>>,
    pub client_count: i64,
}

/// Detected language of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Arabic,
    English,
    Unknown,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Arabic => "ar",
            Language::English => "en",
            Language::Unknown => "unknown",
        }
    }
}
