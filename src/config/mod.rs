use anyhow::{anyhow, Result};
use std::env;
use std::time::Duration;
use validator::{Validate, ValidationError};

/// Runtime configuration, built once from the environment in `main` and
/// passed to each component at construction time. Nothing re-reads the
/// environment after startup.
#[derive(Debug, Clone, Validate)]
pub struct AppConfig {
    pub port: u16,

    // Upstream credentials
    #[validate(length(min = 1))]
    pub rpc_api_key: String,
    #[validate(length(min = 1))]
    pub coingecko_api_key: String,
    /// Optional: without it, creation-block lookups degrade to "not found".
    pub etherscan_api_key: Option<String>,

    // Absinthe ingestion sink
    #[validate(custom = "validate_http_url")]
    pub absinthe_api_url: String,
    #[validate(length(min = 1))]
    pub absinthe_api_key: String,

    /// Present only when Railway deployment is enabled.
    pub railway: Option<RailwayConfig>,
    /// Present only when an AI key is configured.
    pub ai: Option<AiConfig>,

    /// Applied to every outbound HTTP call.
    pub http_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct RailwayConfig {
    pub api_token: String,
    pub workspace_id: String,
    pub template_id: String,
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: String,
}

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_ABSINTHE_API_URL: &str = "https://v2.adapters.absinthe.network";
const DEFAULT_RAILWAY_TEMPLATE_ID: &str = "e671e590-fec4-4beb-8044-37f013a351e9";
const DEFAULT_AI_MODEL: &str = "gpt-4.1-mini";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let port = match env::var("PORT") {
            Ok(v) => v.parse().map_err(|_| anyhow!("PORT must be a number"))?,
            Err(_) => DEFAULT_PORT,
        };

        let railway = if truthy(&env::var("ENABLE_RAILWAY_DEPLOYMENT").unwrap_or_default()) {
            Some(RailwayConfig {
                api_token: require("RAILWAY_API_TOKEN")?,
                workspace_id: require("RAILWAY_WORKSPACE_ID")?,
                template_id: env::var("RAILWAY_TEMPLATE_ID")
                    .unwrap_or_else(|_| DEFAULT_RAILWAY_TEMPLATE_ID.to_string()),
            })
        } else {
            None
        };

        let ai = env::var("AI_API_KEY").ok().map(|api_key| AiConfig {
            api_key,
            base_url: env::var("AI_BASE_URL").ok(),
            model: env::var("AI_MODEL").unwrap_or_else(|_| DEFAULT_AI_MODEL.to_string()),
        });

        let http_timeout = match env::var("HTTP_TIMEOUT_SECS") {
            Ok(v) => Duration::from_secs(
                v.parse()
                    .map_err(|_| anyhow!("HTTP_TIMEOUT_SECS must be a number"))?,
            ),
            Err(_) => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        let config = Self {
            port,
            rpc_api_key: require("RPC_API_KEY")?,
            coingecko_api_key: require("COINGECKO_API_KEY")?,
            etherscan_api_key: env::var("ETHERSCAN_API_KEY").ok().filter(|k| !k.is_empty()),
            absinthe_api_url: env::var("ABSINTHE_API_URL")
                .unwrap_or_else(|_| DEFAULT_ABSINTHE_API_URL.to_string()),
            absinthe_api_key: require("ABSINTHE_API_KEY")?,
            railway,
            ai,
            http_timeout,
        };

        config
            .validate()
            .map_err(|e| anyhow!("Configuration validation failed: {:?}", e))?;
        Ok(config)
    }

    pub fn railway_enabled(&self) -> bool {
        self.railway.is_some()
    }
}

fn require(name: &str) -> Result<String> {
    env::var(name).ok().filter(|v| !v.is_empty()).ok_or_else(|| {
        anyhow!(
            "Missing required environment variable: {}. \
             Please ensure your .env file contains it.",
            name
        )
    })
}

fn truthy(v: &str) -> bool {
    v == "true" || v == "1"
}

fn validate_http_url(url: &str) -> Result<(), ValidationError> {
    match url::Url::parse(url) {
        Ok(u) if u.scheme() == "http" || u.scheme() == "https" => Ok(()),
        _ => Err(ValidationError::new("invalid_http_url")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            port: 3001,
            rpc_api_key: "rpc-key".into(),
            coingecko_api_key: "cg-key".into(),
            etherscan_api_key: Some("scan-key".into()),
            absinthe_api_url: DEFAULT_ABSINTHE_API_URL.into(),
            absinthe_api_key: "absinthe-key".into(),
            railway: None,
            ai: None,
            http_timeout: Duration::from_secs(15),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn rejects_empty_keys_and_bad_urls() {
        let mut c = base_config();
        c.rpc_api_key = String::new();
        assert!(c.validate().is_err());

        let mut c = base_config();
        c.absinthe_api_url = "not-a-url".into();
        assert!(c.validate().is_err());
    }

    #[test]
    fn truthy_values() {
        assert!(truthy("true"));
        assert!(truthy("1"));
        assert!(!truthy("false"));
        assert!(!truthy(""));
    }
}
