//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use tracing::Level;

/// The Graph API root used when `WHATSAPP_API_BASE_URL` is not set.
pub const DEFAULT_API_BASE_URL: &str = "https://graph.facebook.com/v17.0";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    /// The WhatsApp Business phone number id messages are sent from.
    pub whatsapp_phone_number_id: String,
    /// Bearer token for the WhatsApp Cloud API.
    pub whatsapp_access_token: String,
    /// Shared secret echoed back during the webhook verification handshake.
    pub whatsapp_verify_token: String,
    pub whatsapp_api_base_url: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load WhatsApp Cloud API Credentials ---
        let whatsapp_phone_number_id = require_var("WHATSAPP_PHONE_NUMBER_ID")?;
        let whatsapp_access_token = require_var("WHATSAPP_ACCESS_TOKEN")?;
        let whatsapp_verify_token = require_var("WHATSAPP_VERIFY_TOKEN")?;

        let whatsapp_api_base_url = std::env::var("WHATSAPP_API_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string());

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            whatsapp_phone_number_id,
            whatsapp_access_token,
            whatsapp_verify_token,
            whatsapp_api_base_url,
        })
    }
}

fn require_var(name: &str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(name.to_string())),
    }
}
