//! Natural-language adapter classification through an OpenAI-compatible
//! chat endpoint. Optional: only wired up when an AI key is configured.

use crate::config::AiConfig;
use crate::errors::WizardError;
use serde::{Deserialize, Serialize};
use serde_json::json;

const DEFAULT_AI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdapterKind {
    #[serde(rename = "erc20")]
    Erc20,
    #[serde(rename = "univ2")]
    UniswapV2,
    #[serde(rename = "univ3")]
    UniswapV3,
}

#[derive(Debug, Deserialize)]
struct Classification {
    adapter: AdapterKind,
}

const SYSTEM_PROMPT: &str = "You are an Absinthe adapter classifier. Based on the user's description, determine which adapter type they need.\n\n\
Available adapters:\n\
- univ2: Uniswap V2 (liquidity pools, swaps)\n\
- univ3: Uniswap V3 (concentrated liquidity, swaps, fee tiers)\n\
- erc20: ERC20 token holdings tracking\n\n\
Return ONLY a JSON object with this exact shape:\n\
{\"adapter\": \"univ2|univ3|erc20\"}";

pub struct Classifier {
    http: reqwest::Client,
    config: AiConfig,
}

impl Classifier {
    pub fn new(http: reqwest::Client, config: AiConfig) -> Self {
        Self { http, config }
    }

    pub async fn classify(&self, prompt: &str) -> Result<AdapterKind, WizardError> {
        let base_url = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_AI_BASE_URL);
        let body = json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt},
            ],
            "temperature": 0.1,
            "response_format": {"type": "json_object"},
        });

        let response = self
            .http
            .post(format!("{base_url}/chat/completions"))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let data: serde_json::Value = response.json().await?;
        let content = data["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                WizardError::BadUpstreamResponse("empty response from AI classifier".to_string())
            })?;

        let parsed: Classification = serde_json::from_str(content).map_err(|e| {
            WizardError::BadUpstreamResponse(format!("unparseable classifier reply: {e}"))
        })?;
        Ok(parsed.adapter)
    }
}
