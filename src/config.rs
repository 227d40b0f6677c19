use anyhow::{bail, Context, Result};
use std::time::Duration;

use crate::services::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "https://earnapp.com/dashboard/api";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,

    // EarnApp dashboard (data source)
    pub earnapp_base_url: String,
    pub earnapp_token: String,

    // Discord (notification sink)
    pub webhook_url: String,

    // Redis (snapshot store)
    pub redis_url: String,
    pub redis_key_prefix: String,

    // Remote fetch retry
    pub fetch_max_attempts: u32,
    pub fetch_retry_delay: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any variable lookup, e.g. a map in tests.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = Self::parse_environment(lookup("ENVIRONMENT"))?;

        let config = Self {
            environment,

            earnapp_base_url: lookup("EARNAPP_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            earnapp_token: lookup("EARNAPP_TOKEN").context("EARNAPP_TOKEN required")?,

            webhook_url: lookup("WEBHOOK_URL").context("WEBHOOK_URL required")?,

            redis_url: lookup("REDIS_URL")
                .unwrap_or_else(|| "redis://localhost:6379".to_string()),
            redis_key_prefix: lookup("REDIS_KEY_PREFIX")
                .unwrap_or_else(|| "earnapp".to_string()),

            fetch_max_attempts: lookup("FETCH_MAX_ATTEMPTS")
                .unwrap_or_else(|| "5".to_string())
                .parse()
                .context("Invalid FETCH_MAX_ATTEMPTS")?,
            fetch_retry_delay: Duration::from_secs(
                lookup("FETCH_RETRY_DELAY_SECS")
                    .unwrap_or_else(|| "30".to_string())
                    .parse()
                    .context("Invalid FETCH_RETRY_DELAY_SECS")?,
            ),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.fetch_max_attempts, self.fetch_retry_delay)
    }

    fn parse_environment(value: Option<String>) -> Result<Environment> {
        let env = value.unwrap_or_else(|| "production".to_string());

        match env.to_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            _ => bail!("Unknown environment: {}", env),
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.earnapp_base_url.starts_with("http") {
            bail!("EARNAPP_BASE_URL must be HTTP(S) URL");
        }
        if !self.webhook_url.starts_with("http") {
            bail!("WEBHOOK_URL must be HTTP(S) URL");
        }
        if !self.redis_url.starts_with("redis") {
            bail!("REDIS_URL must be a redis:// or rediss:// URL");
        }
        if self.fetch_max_attempts == 0 {
            bail!("FETCH_MAX_ATTEMPTS must be at least 1");
        }

        tracing::info!(
            "Configuration validated for {:?} environment",
            self.environment
        );

        Ok(())
    }
}
