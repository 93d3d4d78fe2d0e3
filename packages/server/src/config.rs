use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub token_secret: String,
    pub token_issuer: String,
    /// Session token lifetime handed to the cookie layer (days)
    pub session_ttl_days: i64,
    /// How long a broker-issued one-time token stays redeemable (seconds)
    pub ott_ttl_seconds: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            token_secret: env::var("TOKEN_SECRET").context("TOKEN_SECRET must be set")?,
            token_issuer: env::var("TOKEN_ISSUER")
                .unwrap_or_else(|_| "account-server".to_string()),
            session_ttl_days: env::var("SESSION_TTL_DAYS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("SESSION_TTL_DAYS must be a valid number")?,
            ott_ttl_seconds: env::var("OTT_TTL_SECONDS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .context("OTT_TTL_SECONDS must be a valid number")?,
        })
    }
}
