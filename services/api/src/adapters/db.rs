//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DataStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;
use wachat_core::domain::{
    Campaign, CampaignPerformance, CampaignStatus, Client, QaPair, StoredMessage, Template,
};
use wachat_core::ports::{
    CampaignUpdate, ClientUpdate, DataStore, NewCampaign, NewTemplate, PortError, PortResult,
    QaPairUpdate, TemplateUpdate,
};
use wachat_core::text::escape_like;

/// Maximum number of connection attempts made at startup.
const MAX_CONNECT_ATTEMPTS: u32 = 5;
/// Initial delay between attempts; doubles after each failure.
const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Establishes the process-wide connection pool, retrying with exponential
/// backoff before giving up.
pub async fn connect_with_retry(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let mut delay = INITIAL_RETRY_DELAY;
    let mut attempt = 1;
    loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
        {
            Ok(pool) => {
                info!("Database connection established");
                return Ok(pool);
            }
            Err(e) if attempt < MAX_CONNECT_ATTEMPTS => {
                warn!(
                    "Database connection failed (attempt {}/{}), retrying in {:?}: {}",
                    attempt, MAX_CONNECT_ATTEMPTS, delay, e
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DataStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ClientRecord {
    id: Uuid,
    phone: String,
    name: String,
    client_type: String,
    last_active: DateTime<Utc>,
    last_message: String,
    created_at: DateTime<Utc>,
}
impl ClientRecord {
    fn to_domain(self) -> Client {
        Client {
            id: self.id,
            phone: self.phone,
            name: self.name,
            client_type: self.client_type,
            last_active: self.last_active,
            last_message: self.last_message,
            created_at: self.created_at,
        }
    }
}

const CLIENT_COLUMNS: &str = "id, phone, name, client_type, last_active, last_message, created_at";

#[derive(FromRow)]
struct MessageRecord {
    id: Uuid,
    client_id: Uuid,
    text: String,
    from_bot: bool,
    created_at: DateTime<Utc>,
}
impl MessageRecord {
    fn to_domain(self) -> StoredMessage {
        StoredMessage {
            id: self.id,
            client_id: self.client_id,
            text: self.text,
            from_bot: self.from_bot,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct QaPairRecord {
    id: Uuid,
    question: String,
    answer: String,
    category: String,
    created_at: DateTime<Utc>,
}
impl QaPairRecord {
    fn to_domain(self) -> QaPair {
        QaPair {
            id: self.id,
            question: self.question,
            answer: self.answer,
            category: self.category,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct TemplateRecord {
    id: Uuid,
    name: String,
    content: String,
    category: String,
    variables: Vec<String>,
    language: String,
    created_at: DateTime<Utc>,
}
impl TemplateRecord {
    fn to_domain(self) -> Template {
        Template {
            id: self.id,
            name: self.name,
            content: self.content,
            category: self.category,
            variables: self.variables,
            language: self.language,
            created_at: self.created_at,
        }
    }
}

const TEMPLATE_COLUMNS: &str = "id, name, content, category, variables, language, created_at";

#[derive(FromRow)]
struct CampaignRecord {
    id: Uuid,
    name: String,
    campaign_type: String,
    status: String,
    audience: String,
    message: String,
    sent_count: i64,
    last_sent_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}
impl CampaignRecord {
    fn to_domain(self) -> PortResult<Campaign> {
        let status = CampaignStatus::parse(&self.status).ok_or_else(|| {
            PortError::Unexpected(format!("invalid campaign status '{}'", self.status))
        })?;
        Ok(Campaign {
            id: self.id,
            name: self.name,
            campaign_type: self.campaign_type,
            status,
            audience: self.audience,
            message: self.message,
            sent_count: self.sent_count,
            last_sent_at: self.last_sent_at,
            created_at: self.created_at,
        })
    }
}

const CAMPAIGN_COLUMNS: &str =
    "id, name, campaign_type, status, audience, message, sent_count, last_sent_at, created_at";

#[derive(FromRow)]
struct RecentMessageRecord {
    id: Uuid,
    client_id: Uuid,
    text: String,
    from_bot: bool,
    created_at: DateTime<Utc>,
    c_phone: String,
    c_name: String,
    c_client_type: String,
    c_last_active: DateTime<Utc>,
    c_last_message: String,
    c_created_at: DateTime<Utc>,
}
impl RecentMessageRecord {
    fn to_domain(self) -> (StoredMessage, Client) {
        let client = Client {
            id: self.client_id,
            phone: self.c_phone,
            name: self.c_name,
            client_type: self.c_client_type,
            last_active: self.c_last_active,
            last_message: self.c_last_message,
            created_at: self.c_created_at,
        };
        let message = StoredMessage {
            id: self.id,
            client_id: self.client_id,
            text: self.text,
            from_bot: self.from_bot,
            created_at: self.created_at,
        };
        (message, client)
    }
}

#[derive(FromRow)]
struct CampaignPerformanceRecord {
    id: Uuid,
    name: String,
    status: String,
    sent_count: i64,
    last_sent_at: Option<DateTime<Utc>>,
    client_count: i64,
}
impl CampaignPerformanceRecord {
    fn to_domain(self) -> PortResult<CampaignPerformance> {
        let status = CampaignStatus::parse(&self.status).ok_or_else(|| {
            PortError::Unexpected(format!("invalid campaign status '{}'", self.status))
        })?;
        Ok(CampaignPerformance {
            id: self.id,
            name: self.name,
            status,
            sent_count: self.sent_count,
            last_sent_at: self.last_sent_at,
            client_count: self.client_count,
        })
    }
}

//=========================================================================================
// `DataStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl DataStore for DbAdapter {
    async fn find_client_by_phone(&self, phone: &str) -> PortResult<Option<Client>> {
        let record = sqlx::query_as::<_, ClientRecord>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients WHERE phone = $1"
        ))
        .bind(phone)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(ClientRecord::to_domain))
    }

    async fn get_client(&self, id: Uuid) -> PortResult<Client> {
        let record = sqlx::query_as::<_, ClientRecord>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Client {} not found", id)))?;
        Ok(record.to_domain())
    }

    async fn create_client(
        &self,
        phone: &str,
        name: &str,
        client_type: &str,
    ) -> PortResult<Client> {
        let record = sqlx::query_as::<_, ClientRecord>(&format!(
            "INSERT INTO clients (id, phone, name, client_type, last_active, last_message) \
             VALUES ($1, $2, $3, $4, NOW(), '') RETURNING {CLIENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(phone)
        .bind(name)
        .bind(client_type)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn update_client(&self, id: Uuid, update: ClientUpdate) -> PortResult<Client> {
        let record = sqlx::query_as::<_, ClientRecord>(&format!(
            "UPDATE clients SET phone = COALESCE($2, phone), name = COALESCE($3, name), \
             client_type = COALESCE($4, client_type) WHERE id = $1 RETURNING {CLIENT_COLUMNS}"
        ))
        .bind(id)
        .bind(update.phone)
        .bind(update.name)
        .bind(update.client_type)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Client {} not found", id)))?;
        Ok(record.to_domain())
    }

    async fn delete_client(&self, id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM clients WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Client {} not found", id)));
        }
        Ok(())
    }

    async fn list_clients(&self, offset: i64, limit: i64) -> PortResult<Vec<Client>> {
        let records = sqlx::query_as::<_, ClientRecord>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients ORDER BY created_at ASC OFFSET $1 LIMIT $2"
        ))
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(ClientRecord::to_domain).collect())
    }

    async fn count_clients(&self) -> PortResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM clients")
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)
    }

    async fn clients_by_type(&self, client_type: &str) -> PortResult<Vec<Client>> {
        let records = sqlx::query_as::<_, ClientRecord>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients WHERE client_type = $1 ORDER BY created_at ASC"
        ))
        .bind(client_type)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(ClientRecord::to_domain).collect())
    }

    async fn record_client_activity(&self, client_id: Uuid, last_message: &str) -> PortResult<()> {
        let result =
            sqlx::query("UPDATE clients SET last_active = NOW(), last_message = $2 WHERE id = $1")
                .bind(client_id)
                .bind(last_message)
                .execute(&self.pool)
                .await
                .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Client {} not found",
                client_id
            )));
        }
        Ok(())
    }

    async fn touch_client_by_phone(&self, phone: &str, last_message: &str) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE clients SET last_active = NOW(), last_message = $2 WHERE phone = $1",
        )
        .bind(phone)
        .bind(last_message)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Client not found with phone: {}",
                phone
            )));
        }
        Ok(())
    }

    async fn count_clients_active_since(&self, since: DateTime<Utc>) -> PortResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM clients WHERE last_active >= $1")
            .bind(since)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)
    }

    async fn recent_clients(&self, limit: i64) -> PortResult<Vec<Client>> {
        let records = sqlx::query_as::<_, ClientRecord>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients ORDER BY created_at DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(ClientRecord::to_domain).collect())
    }

    async fn save_message(
        &self,
        client_id: Uuid,
        text: &str,
        from_bot: bool,
    ) -> PortResult<StoredMessage> {
        let record = sqlx::query_as::<_, MessageRecord>(
            "INSERT INTO messages (id, client_id, text, from_bot) VALUES ($1, $2, $3, $4) \
             RETURNING id, client_id, text, from_bot, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(client_id)
        .bind(text)
        .bind(from_bot)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn messages_for_client(&self, client_id: Uuid) -> PortResult<Vec<StoredMessage>> {
        let records = sqlx::query_as::<_, MessageRecord>(
            "SELECT id, client_id, text, from_bot, created_at FROM messages \
             WHERE client_id = $1 ORDER BY created_at ASC",
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(MessageRecord::to_domain).collect())
    }

    async fn count_messages(&self) -> PortResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)
    }

    async fn recent_messages(&self, limit: i64) -> PortResult<Vec<(StoredMessage, Client)>> {
        let records = sqlx::query_as::<_, RecentMessageRecord>(
            "SELECT m.id, m.client_id, m.text, m.from_bot, m.created_at, \
             c.phone AS c_phone, c.name AS c_name, c.client_type AS c_client_type, \
             c.last_active AS c_last_active, c.last_message AS c_last_message, \
             c.created_at AS c_created_at \
             FROM messages m JOIN clients c ON c.id = m.client_id \
             ORDER BY m.created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records
            .into_iter()
            .map(RecentMessageRecord::to_domain)
            .collect())
    }

    async fn find_qa_exact(&self, question: &str) -> PortResult<Vec<QaPair>> {
        let records = sqlx::query_as::<_, QaPairRecord>(
            "SELECT id, question, answer, category, created_at FROM qa_pairs \
             WHERE LOWER(question) = LOWER($1) LIMIT 1",
        )
        .bind(question)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(QaPairRecord::to_domain).collect())
    }

    async fn find_qa_by_keywords(
        &self,
        keywords: &[String],
        limit: i64,
    ) -> PortResult<Vec<QaPair>> {
        if keywords.is_empty() {
            return Ok(Vec::new());
        }
        let patterns: Vec<String> = keywords
            .iter()
            .map(|k| format!("%{}%", escape_like(k)))
            .collect();
        let records = sqlx::query_as::<_, QaPairRecord>(
            "SELECT id, question, answer, category, created_at FROM qa_pairs \
             WHERE question ILIKE ANY($1) LIMIT $2",
        )
        .bind(patterns)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(QaPairRecord::to_domain).collect())
    }

    async fn find_qa_containing(&self, message: &str, limit: i64) -> PortResult<Vec<QaPair>> {
        let pattern = format!("%{}%", escape_like(message));
        let records = sqlx::query_as::<_, QaPairRecord>(
            "SELECT id, question, answer, category, created_at FROM qa_pairs \
             WHERE question ILIKE $1 LIMIT $2",
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(QaPairRecord::to_domain).collect())
    }

    async fn list_qa_pairs(&self) -> PortResult<Vec<QaPair>> {
        let records = sqlx::query_as::<_, QaPairRecord>(
            "SELECT id, question, answer, category, created_at FROM qa_pairs \
             ORDER BY category ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(QaPairRecord::to_domain).collect())
    }

    async fn get_qa_pair(&self, id: Uuid) -> PortResult<QaPair> {
        let record = sqlx::query_as::<_, QaPairRecord>(
            "SELECT id, question, answer, category, created_at FROM qa_pairs WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("QA pair {} not found", id)))?;
        Ok(record.to_domain())
    }

    async fn create_qa_pair(
        &self,
        question: &str,
        answer: &str,
        category: &str,
    ) -> PortResult<QaPair> {
        let record = sqlx::query_as::<_, QaPairRecord>(
            "INSERT INTO qa_pairs (id, question, answer, category) VALUES ($1, $2, $3, $4) \
             RETURNING id, question, answer, category, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(question)
        .bind(answer)
        .bind(category)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn update_qa_pair(&self, id: Uuid, update: QaPairUpdate) -> PortResult<QaPair> {
        let record = sqlx::query_as::<_, QaPairRecord>(
            "UPDATE qa_pairs SET question = COALESCE($2, question), \
             answer = COALESCE($3, answer), category = COALESCE($4, category) \
             WHERE id = $1 RETURNING id, question, answer, category, created_at",
        )
        .bind(id)
        .bind(update.question)
        .bind(update.answer)
        .bind(update.category)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("QA pair {} not found", id)))?;
        Ok(record.to_domain())
    }

    async fn delete_qa_pair(&self, id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM qa_pairs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("QA pair {} not found", id)));
        }
        Ok(())
    }

    async fn list_templates(&self, language: &str) -> PortResult<Vec<Template>> {
        let records = sqlx::query_as::<_, TemplateRecord>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM templates WHERE language = $1 \
             ORDER BY created_at DESC"
        ))
        .bind(language)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(TemplateRecord::to_domain).collect())
    }

    async fn get_template(&self, id: Uuid) -> PortResult<Template> {
        let record = sqlx::query_as::<_, TemplateRecord>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM templates WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Template {} not found", id)))?;
        Ok(record.to_domain())
    }

    async fn find_template_by_name(
        &self,
        name: &str,
        language: &str,
    ) -> PortResult<Option<Template>> {
        let record = sqlx::query_as::<_, TemplateRecord>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM templates WHERE name = $1 AND language = $2"
        ))
        .bind(name)
        .bind(language)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(TemplateRecord::to_domain))
    }

    async fn create_template(&self, new: NewTemplate) -> PortResult<Template> {
        let record = sqlx::query_as::<_, TemplateRecord>(&format!(
            "INSERT INTO templates (id, name, content, category, variables, language) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {TEMPLATE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(new.name)
        .bind(new.content)
        .bind(new.category)
        .bind(new.variables)
        .bind(new.language)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn update_template(&self, id: Uuid, update: TemplateUpdate) -> PortResult<Template> {
        let record = sqlx::query_as::<_, TemplateRecord>(&format!(
            "UPDATE templates SET name = COALESCE($2, name), content = COALESCE($3, content), \
             category = COALESCE($4, category), variables = COALESCE($5, variables), \
             language = COALESCE($6, language) WHERE id = $1 RETURNING {TEMPLATE_COLUMNS}"
        ))
        .bind(id)
        .bind(update.name)
        .bind(update.content)
        .bind(update.category)
        .bind(update.variables)
        .bind(update.language)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Template {} not found", id)))?;
        Ok(record.to_domain())
    }

    async fn delete_template(&self, id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM templates WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Template {} not found", id)));
        }
        Ok(())
    }

    async fn list_campaigns(&self) -> PortResult<Vec<Campaign>> {
        let records = sqlx::query_as::<_, CampaignRecord>(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(CampaignRecord::to_domain).collect()
    }

    async fn get_campaign(&self, id: Uuid) -> PortResult<Campaign> {
        let record = sqlx::query_as::<_, CampaignRecord>(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Campaign {} not found", id)))?;
        record.to_domain()
    }

    async fn create_campaign(&self, new: NewCampaign) -> PortResult<Campaign> {
        let record = sqlx::query_as::<_, CampaignRecord>(&format!(
            "INSERT INTO campaigns (id, name, campaign_type, status, audience, message) \
             VALUES ($1, $2, $3, 'Draft', $4, $5) RETURNING {CAMPAIGN_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(new.name)
        .bind(new.campaign_type)
        .bind(new.audience)
        .bind(new.message)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        record.to_domain()
    }

    async fn update_campaign(&self, id: Uuid, update: CampaignUpdate) -> PortResult<Campaign> {
        let record = sqlx::query_as::<_, CampaignRecord>(&format!(
            "UPDATE campaigns SET name = COALESCE($2, name), \
             campaign_type = COALESCE($3, campaign_type), status = COALESCE($4, status), \
             audience = COALESCE($5, audience), message = COALESCE($6, message) \
             WHERE id = $1 RETURNING {CAMPAIGN_COLUMNS}"
        ))
        .bind(id)
        .bind(update.name)
        .bind(update.campaign_type)
        .bind(update.status.map(|s| s.as_str().to_string()))
        .bind(update.audience)
        .bind(update.message)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Campaign {} not found", id)))?;
        record.to_domain()
    }

    async fn delete_campaign(&self, id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM campaigns WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Campaign {} not found", id)));
        }
        Ok(())
    }

    async fn add_campaign_clients(&self, id: Uuid, client_ids: &[Uuid]) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO campaign_clients (campaign_id, client_id) \
             SELECT $1, unnest($2::uuid[]) ON CONFLICT DO NOTHING",
        )
        .bind(id)
        .bind(client_ids)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn campaign_clients(&self, id: Uuid) -> PortResult<Vec<Client>> {
        let records = sqlx::query_as::<_, ClientRecord>(
            "SELECT c.id, c.phone, c.name, c.client_type, c.last_active, c.last_message, \
             c.created_at FROM clients c \
             JOIN campaign_clients cc ON cc.client_id = c.id \
             WHERE cc.campaign_id = $1 ORDER BY c.created_at ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(ClientRecord::to_domain).collect())
    }

    async fn record_campaign_send(&self, id: Uuid, delivered: i64) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE campaigns SET sent_count = sent_count + $2, last_sent_at = NOW(), \
             status = 'Active' WHERE id = $1",
        )
        .bind(id)
        .bind(delivered)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Campaign {} not found", id)));
        }
        Ok(())
    }

    async fn count_active_campaigns(&self) -> PortResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM campaigns WHERE status = 'Active'")
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)
    }

    async fn campaign_performance(&self, limit: i64) -> PortResult<Vec<CampaignPerformance>> {
        let records = sqlx::query_as::<_, CampaignPerformanceRecord>(
            "SELECT c.id, c.name, c.status, c.sent_count, c.last_sent_at, \
             COUNT(cc.client_id) AS client_count \
             FROM campaigns c LEFT JOIN campaign_clients cc ON cc.campaign_id = c.id \
             WHERE c.status IN ('Active', 'Completed') \
             GROUP BY c.id, c.name, c.status, c.sent_count, c.last_sent_at \
             ORDER BY c.last_sent_at DESC NULLS LAST LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records
            .into_iter()
            .map(CampaignPerformanceRecord::to_domain)
            .collect()
    }
}
