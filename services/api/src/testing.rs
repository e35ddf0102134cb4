//! services/api/src/testing.rs
//!
//! In-memory fakes for the core ports, shared by the handler and pipeline
//! tests. Both ports were designed to be substituted this way.

use async_trait::async_trait;
use axum::Router;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::Level;
use uuid::Uuid;
use wachat_core::domain::{
    Campaign, CampaignPerformance, CampaignStatus, Client, QaPair, StoredMessage, Template,
};
use wachat_core::ports::{
    CampaignUpdate, ClientUpdate, DataStore, MessageSender, NewCampaign, NewTemplate, PortError,
    PortResult, QaPairUpdate, TemplateUpdate,
};

use crate::config::Config;
use crate::web;
use crate::web::state::AppState;

/// Builds the full application router over fakes, for `oneshot` tests.
pub fn test_router(store: Arc<FakeStore>, sender: Arc<FakeSender>) -> Router {
    let state = Arc::new(AppState {
        store,
        sender,
        config: Arc::new(test_config()),
    });
    web::app_router(state)
}

pub fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().expect("test bind address"),
        database_url: "postgres://unused".to_string(),
        log_level: Level::INFO,
        whatsapp_phone_number_id: "12345".to_string(),
        whatsapp_access_token: "test-access-token".to_string(),
        whatsapp_verify_token: "test-verify-token".to_string(),
        whatsapp_api_base_url: "http://127.0.0.1:0".to_string(),
    }
}

//=========================================================================================
// FakeStore
//=========================================================================================

#[derive(Default)]
struct StoreInner {
    clients: Vec<Client>,
    messages: Vec<StoredMessage>,
    qa_pairs: Vec<QaPair>,
    templates: Vec<Template>,
    campaigns: Vec<Campaign>,
    campaign_members: Vec<(Uuid, Uuid)>,
    touch_calls: usize,
}

/// An in-memory `DataStore` with switches to force failures on selected
/// operation groups.
#[derive(Default)]
pub struct FakeStore {
    inner: Mutex<StoreInner>,
    fail_messages: AtomicBool,
    fail_qa: AtomicBool,
}

impl FakeStore {
    pub fn clients(&self) -> Vec<Client> {
        self.inner.lock().unwrap().clients.clone()
    }

    pub fn messages(&self) -> Vec<StoredMessage> {
        self.inner.lock().unwrap().messages.clone()
    }

    pub fn touch_calls(&self) -> usize {
        self.inner.lock().unwrap().touch_calls
    }

    /// Makes every message write fail with an unexpected error.
    pub fn fail_messages(&self) {
        self.fail_messages.store(true, Ordering::SeqCst);
    }

    /// Makes every QA lookup fail with an unexpected error.
    pub fn fail_qa(&self) {
        self.fail_qa.store(true, Ordering::SeqCst);
    }

    pub fn add_client(&self, phone: &str, name: &str, client_type: &str) -> Client {
        let client = new_client(phone, name, client_type);
        self.inner.lock().unwrap().clients.push(client.clone());
        client
    }

    pub fn add_qa_pair(&self, question: &str, answer: &str, category: &str) -> QaPair {
        let pair = QaPair {
            id: Uuid::new_v4(),
            question: question.to_string(),
            answer: answer.to_string(),
            category: category.to_string(),
            created_at: Utc::now(),
        };
        self.inner.lock().unwrap().qa_pairs.push(pair.clone());
        pair
    }

    pub fn add_template(&self, name: &str, content: &str, language: &str) -> Template {
        let template = Template {
            id: Uuid::new_v4(),
            name: name.to_string(),
            content: content.to_string(),
            category: "custom".to_string(),
            variables: Vec::new(),
            language: language.to_string(),
            created_at: Utc::now(),
        };
        self.inner.lock().unwrap().templates.push(template.clone());
        template
    }

    pub fn add_campaign(&self, name: &str, message: &str) -> Campaign {
        let campaign = Campaign {
            id: Uuid::new_v4(),
            name: name.to_string(),
            campaign_type: "broadcast".to_string(),
            status: CampaignStatus::Draft,
            audience: String::new(),
            message: message.to_string(),
            sent_count: 0,
            last_sent_at: None,
            created_at: Utc::now(),
        };
        self.inner.lock().unwrap().campaigns.push(campaign.clone());
        campaign
    }

    pub fn campaign(&self, id: Uuid) -> Option<Campaign> {
        self.inner
            .lock()
            .unwrap()
            .campaigns
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }
}

fn new_client(phone: &str, name: &str, client_type: &str) -> Client {
    Client {
        id: Uuid::new_v4(),
        phone: phone.to_string(),
        name: name.to_string(),
        client_type: client_type.to_string(),
        last_active: Utc::now(),
        last_message: String::new(),
        created_at: Utc::now(),
    }
}

fn boom() -> PortError {
    PortError::Unexpected("forced failure".to_string())
}

#[async_trait]
impl DataStore for FakeStore {
    async fn find_client_by_phone(&self, phone: &str) -> PortResult<Option<Client>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .clients
            .iter()
            .find(|c| c.phone == phone)
            .cloned())
    }

    async fn get_client(&self, id: Uuid) -> PortResult<Client> {
        self.inner
            .lock()
            .unwrap()
            .clients
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Client {} not found", id)))
    }

    async fn create_client(
        &self,
        phone: &str,
        name: &str,
        client_type: &str,
    ) -> PortResult<Client> {
        let client = new_client(phone, name, client_type);
        self.inner.lock().unwrap().clients.push(client.clone());
        Ok(client)
    }

    async fn update_client(&self, id: Uuid, update: ClientUpdate) -> PortResult<Client> {
        let mut inner = self.inner.lock().unwrap();
        let client = inner
            .clients
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| PortError::NotFound(format!("Client {} not found", id)))?;
        if let Some(phone) = update.phone {
            client.phone = phone;
        }
        if let Some(name) = update.name {
            client.name = name;
        }
        if let Some(client_type) = update.client_type {
            client.client_type = client_type;
        }
        Ok(client.clone())
    }

    async fn delete_client(&self, id: Uuid) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.clients.len();
        inner.clients.retain(|c| c.id != id);
        if inner.clients.len() == before {
            return Err(PortError::NotFound(format!("Client {} not found", id)));
        }
        Ok(())
    }

    async fn list_clients(&self, offset: i64, limit: i64) -> PortResult<Vec<Client>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .clients
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn count_clients(&self) -> PortResult<i64> {
        Ok(self.inner.lock().unwrap().clients.len() as i64)
    }

    async fn clients_by_type(&self, client_type: &str) -> PortResult<Vec<Client>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .clients
            .iter()
            .filter(|c| c.client_type == client_type)
            .cloned()
            .collect())
    }

    async fn record_client_activity(&self, client_id: Uuid, last_message: &str) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let client = inner
            .clients
            .iter_mut()
            .find(|c| c.id == client_id)
            .ok_or_else(|| PortError::NotFound(format!("Client {} not found", client_id)))?;
        client.last_active = Utc::now();
        client.last_message = last_message.to_string();
        Ok(())
    }

    async fn touch_client_by_phone(&self, phone: &str, last_message: &str) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.touch_calls += 1;
        let client = inner
            .clients
            .iter_mut()
            .find(|c| c.phone == phone)
            .ok_or_else(|| PortError::NotFound(format!("Client not found with phone: {}", phone)))?;
        client.last_active = Utc::now();
        client.last_message = last_message.to_string();
        Ok(())
    }

    async fn count_clients_active_since(
        &self,
        since: chrono::DateTime<Utc>,
    ) -> PortResult<i64> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .clients
            .iter()
            .filter(|c| c.last_active >= since)
            .count() as i64)
    }

    async fn recent_clients(&self, limit: i64) -> PortResult<Vec<Client>> {
        let mut clients = self.inner.lock().unwrap().clients.clone();
        clients.reverse();
        clients.truncate(limit as usize);
        Ok(clients)
    }

    async fn save_message(
        &self,
        client_id: Uuid,
        text: &str,
        from_bot: bool,
    ) -> PortResult<StoredMessage> {
        if self.fail_messages.load(Ordering::SeqCst) {
            return Err(boom());
        }
        let message = StoredMessage {
            id: Uuid::new_v4(),
            client_id,
            text: text.to_string(),
            from_bot,
            created_at: Utc::now(),
        };
        self.inner.lock().unwrap().messages.push(message.clone());
        Ok(message)
    }

    async fn messages_for_client(&self, client_id: Uuid) -> PortResult<Vec<StoredMessage>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .messages
            .iter()
            .filter(|m| m.client_id == client_id)
            .cloned()
            .collect())
    }

    async fn count_messages(&self) -> PortResult<i64> {
        Ok(self.inner.lock().unwrap().messages.len() as i64)
    }

    async fn recent_messages(&self, limit: i64) -> PortResult<Vec<(StoredMessage, Client)>> {
        let inner = self.inner.lock().unwrap();
        let mut out = Vec::new();
        for message in inner.messages.iter().rev().take(limit as usize) {
            if let Some(client) = inner.clients.iter().find(|c| c.id == message.client_id) {
                out.push((message.clone(), client.clone()));
            }
        }
        Ok(out)
    }

    async fn find_qa_exact(&self, question: &str) -> PortResult<Vec<QaPair>> {
        if self.fail_qa.load(Ordering::SeqCst) {
            return Err(boom());
        }
        Ok(self
            .inner
            .lock()
            .unwrap()
            .qa_pairs
            .iter()
            .filter(|qa| qa.question.to_lowercase() == question.to_lowercase())
            .take(1)
            .cloned()
            .collect())
    }

    async fn find_qa_by_keywords(
        &self,
        keywords: &[String],
        limit: i64,
    ) -> PortResult<Vec<QaPair>> {
        if self.fail_qa.load(Ordering::SeqCst) {
            return Err(boom());
        }
        Ok(self
            .inner
            .lock()
            .unwrap()
            .qa_pairs
            .iter()
            .filter(|qa| {
                let question = qa.question.to_lowercase();
                keywords.iter().any(|k| question.contains(k.as_str()))
            })
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn find_qa_containing(&self, message: &str, limit: i64) -> PortResult<Vec<QaPair>> {
        if self.fail_qa.load(Ordering::SeqCst) {
            return Err(boom());
        }
        let needle = message.to_lowercase();
        Ok(self
            .inner
            .lock()
            .unwrap()
            .qa_pairs
            .iter()
            .filter(|qa| qa.question.to_lowercase().contains(&needle))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn list_qa_pairs(&self) -> PortResult<Vec<QaPair>> {
        let mut pairs = self.inner.lock().unwrap().qa_pairs.clone();
        pairs.sort_by(|a, b| a.category.cmp(&b.category));
        Ok(pairs)
    }

    async fn get_qa_pair(&self, id: Uuid) -> PortResult<QaPair> {
        self.inner
            .lock()
            .unwrap()
            .qa_pairs
            .iter()
            .find(|qa| qa.id == id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("QA pair {} not found", id)))
    }

    async fn create_qa_pair(
        &self,
        question: &str,
        answer: &str,
        category: &str,
    ) -> PortResult<QaPair> {
        Ok(self.add_qa_pair(question, answer, category))
    }

    async fn update_qa_pair(&self, id: Uuid, update: QaPairUpdate) -> PortResult<QaPair> {
        let mut inner = self.inner.lock().unwrap();
        let pair = inner
            .qa_pairs
            .iter_mut()
            .find(|qa| qa.id == id)
            .ok_or_else(|| PortError::NotFound(format!("QA pair {} not found", id)))?;
        if let Some(question) = update.question {
            pair.question = question;
        }
        if let Some(answer) = update.answer {
            pair.answer = answer;
        }
        if let Some(category) = update.category {
            pair.category = category;
        }
        Ok(pair.clone())
    }

    async fn delete_qa_pair(&self, id: Uuid) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.qa_pairs.len();
        inner.qa_pairs.retain(|qa| qa.id != id);
        if inner.qa_pairs.len() == before {
            return Err(PortError::NotFound(format!("QA pair {} not found", id)));
        }
        Ok(())
    }

    async fn list_templates(&self, language: &str) -> PortResult<Vec<Template>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .templates
            .iter()
            .filter(|t| t.language == language)
            .cloned()
            .collect())
    }

    async fn get_template(&self, id: Uuid) -> PortResult<Template> {
        self.inner
            .lock()
            .unwrap()
            .templates
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Template {} not found", id)))
    }

    async fn find_template_by_name(
        &self,
        name: &str,
        language: &str,
    ) -> PortResult<Option<Template>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .templates
            .iter()
            .find(|t| t.name == name && t.language == language)
            .cloned())
    }

    async fn create_template(&self, new: NewTemplate) -> PortResult<Template> {
        let template = Template {
            id: Uuid::new_v4(),
            name: new.name,
            content: new.content,
            category: new.category,
            variables: new.variables,
            language: new.language,
            created_at: Utc::now(),
        };
        self.inner.lock().unwrap().templates.push(template.clone());
        Ok(template)
    }

    async fn update_template(&self, id: Uuid, update: TemplateUpdate) -> PortResult<Template> {
        let mut inner = self.inner.lock().unwrap();
        let template = inner
            .templates
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| PortError::NotFound(format!("Template {} not found", id)))?;
        if let Some(name) = update.name {
            template.name = name;
        }
        if let Some(content) = update.content {
            template.content = content;
        }
        if let Some(category) = update.category {
            template.category = category;
        }
        if let Some(variables) = update.variables {
            template.variables = variables;
        }
        if let Some(language) = update.language {
            template.language = language;
        }
        Ok(template.clone())
    }

    async fn delete_template(&self, id: Uuid) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.templates.len();
        inner.templates.retain(|t| t.id != id);
        if inner.templates.len() == before {
            return Err(PortError::NotFound(format!("Template {} not found", id)));
        }
        Ok(())
    }

    async fn list_campaigns(&self) -> PortResult<Vec<Campaign>> {
        Ok(self.inner.lock().unwrap().campaigns.clone())
    }

    async fn get_campaign(&self, id: Uuid) -> PortResult<Campaign> {
        self.inner
            .lock()
            .unwrap()
            .campaigns
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Campaign {} not found", id)))
    }

    async fn create_campaign(&self, new: NewCampaign) -> PortResult<Campaign> {
        let campaign = Campaign {
            id: Uuid::new_v4(),
            name: new.name,
            campaign_type: new.campaign_type,
            status: CampaignStatus::Draft,
            audience: new.audience,
            message: new.message,
            sent_count: 0,
            last_sent_at: None,
            created_at: Utc::now(),
        };
        self.inner.lock().unwrap().campaigns.push(campaign.clone());
        Ok(campaign)
    }

    async fn update_campaign(&self, id: Uuid, update: CampaignUpdate) -> PortResult<Campaign> {
        let mut inner = self.inner.lock().unwrap();
        let campaign = inner
            .campaigns
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| PortError::NotFound(format!("Campaign {} not found", id)))?;
        if let Some(name) = update.name {
            campaign.name = name;
        }
        if let Some(campaign_type) = update.campaign_type {
            campaign.campaign_type = campaign_type;
        }
        if let Some(status) = update.status {
            campaign.status = status;
        }
        if let Some(audience) = update.audience {
            campaign.audience = audience;
        }
        if let Some(message) = update.message {
            campaign.message = message;
        }
        Ok(campaign.clone())
    }

    async fn delete_campaign(&self, id: Uuid) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.campaigns.len();
        inner.campaigns.retain(|c| c.id != id);
        if inner.campaigns.len() == before {
            return Err(PortError::NotFound(format!("Campaign {} not found", id)));
        }
        Ok(())
    }

    async fn add_campaign_clients(&self, id: Uuid, client_ids: &[Uuid]) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        for client_id in client_ids {
            if !inner.campaign_members.contains(&(id, *client_id)) {
                inner.campaign_members.push((id, *client_id));
            }
        }
        Ok(())
    }

    async fn campaign_clients(&self, id: Uuid) -> PortResult<Vec<Client>> {
        let inner = self.inner.lock().unwrap();
        let member_ids: Vec<Uuid> = inner
            .campaign_members
            .iter()
            .filter(|(campaign_id, _)| *campaign_id == id)
            .map(|(_, client_id)| *client_id)
            .collect();
        Ok(inner
            .clients
            .iter()
            .filter(|c| member_ids.contains(&c.id))
            .cloned()
            .collect())
    }

    async fn record_campaign_send(&self, id: Uuid, delivered: i64) -> PortResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let campaign = inner
            .campaigns
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| PortError::NotFound(format!("Campaign {} not found", id)))?;
        campaign.sent_count += delivered;
        campaign.last_sent_at = Some(Utc::now());
        campaign.status = CampaignStatus::Active;
        Ok(())
    }

    async fn count_active_campaigns(&self) -> PortResult<i64> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .campaigns
            .iter()
            .filter(|c| c.status == CampaignStatus::Active)
            .count() as i64)
    }

    async fn campaign_performance(&self, limit: i64) -> PortResult<Vec<CampaignPerformance>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .campaigns
            .iter()
            .filter(|c| {
                c.status == CampaignStatus::Active || c.status == CampaignStatus::Completed
            })
            .take(limit as usize)
            .map(|c| CampaignPerformance {
                id: c.id,
                name: c.name.clone(),
                status: c.status,
                sent_count: c.sent_count,
                last_sent_at: c.last_sent_at,
                client_count: inner
                    .campaign_members
                    .iter()
                    .filter(|(campaign_id, _)| *campaign_id == c.id)
                    .count() as i64,
            })
            .collect())
    }
}

//=========================================================================================
// FakeSender
//=========================================================================================

/// An in-memory `MessageSender` that records sends and can be told to fail,
/// globally or for specific recipients.
#[derive(Default)]
pub struct FakeSender {
    sent: Mutex<Vec<(String, String)>>,
    templates_sent: Mutex<Vec<(String, String, String)>>,
    fail_all: AtomicBool,
    fail_for: Mutex<Vec<String>>,
}

impl FakeSender {
    /// Recorded `(to, text)` pairs, in send order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Recorded `(to, template_name, language_code)` triples, in send order.
    pub fn templates_sent(&self) -> Vec<(String, String, String)> {
        self.templates_sent.lock().unwrap().clone()
    }

    pub fn fail_all(&self) {
        self.fail_all.store(true, Ordering::SeqCst);
    }

    pub fn fail_for(&self, to: &str) {
        self.fail_for.lock().unwrap().push(to.to_string());
    }

    fn check(&self, to: &str) -> PortResult<()> {
        if self.fail_all.load(Ordering::SeqCst)
            || self.fail_for.lock().unwrap().iter().any(|t| t == to)
        {
            return Err(PortError::Delivery(format!(
                "WhatsApp API error (500): simulated failure for {}",
                to
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl MessageSender for FakeSender {
    async fn send_text(&self, to: &str, text: &str) -> PortResult<()> {
        self.check(to)?;
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), text.to_string()));
        Ok(())
    }

    async fn send_template(
        &self,
        to: &str,
        template_name: &str,
        language_code: &str,
        _components: Option<serde_json::Value>,
    ) -> PortResult<()> {
        self.check(to)?;
        self.templates_sent.lock().unwrap().push((
            to.to_string(),
            template_name.to_string(),
            language_code.to_string(),
        ));
        Ok(())
    }
}
