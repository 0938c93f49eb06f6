//! Server configuration from the environment

use std::time::Duration;

use market_payments::{CheckoutConfig, DEFAULT_SWEEP_INTERVAL};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),

    #[error("{name} is invalid: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub jwt_secret: String,
    pub payment_currency: String,

    /// Public origin of this API, used for the webhook callback URL
    pub server_url: String,

    /// Origin of the web client, used for the post-payment return URL
    pub client_url: String,

    pub sweep_interval: Duration,
    pub seed_demo_data: bool,
}

impl ServerConfig {
    /// Create from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = std::env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let sweep_interval = match std::env::var("SWEEP_INTERVAL_SECS") {
            Ok(value) => match value.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "SWEEP_INTERVAL_SECS",
                        value,
                    })
                }
            },
            Err(_) => DEFAULT_SWEEP_INTERVAL,
        };

        Ok(Self {
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:3000"),
            jwt_secret,
            payment_currency: env_or("PAYMENT_CURRENCY", "ETB"),
            server_url: env_or("SERVER_URL", "http://localhost:3000"),
            client_url: env_or("CLIENT_URL", "http://localhost:5173"),
            sweep_interval,
            seed_demo_data: std::env::var("SEED_DEMO_DATA")
                .is_ok_and(|v| matches!(v.as_str(), "1" | "true" | "yes")),
        })
    }

    pub fn checkout(&self) -> CheckoutConfig {
        CheckoutConfig {
            currency: self.payment_currency.clone(),
            callback_url: format!(
                "{}/api/v1/purchase/webhook",
                self.server_url.trim_end_matches('/')
            ),
            return_url_base: self.client_url.clone(),
            ..CheckoutConfig::default()
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}
