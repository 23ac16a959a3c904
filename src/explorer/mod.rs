//! Contract creation lookup against the Etherscan V2 API.
//!
//! One lookup call is classified into three outcomes: usable data, terminal
//! failure (wrong address, wrong chain, no data), or a transient rate limit.
//! Only the rate limit consumes retry budget; everything else resolves
//! immediately so a bad address does not burn three sleeps.

use crate::chains;
use crate::retry::{retry_with_delays, Attempt};
use async_trait::async_trait;
use ethers::types::Address;
use log::{error, info, warn};
use serde_json::Value;
use std::sync::{Arc, Once};
use std::time::Duration;

pub const ETHERSCAN_V2_BASE_URL: &str = "https://api.etherscan.io/v2/api";

/// Retry profile for interactive requests; short pauses so the wizard stays
/// responsive.
pub const FAST_RETRY: &[Duration] = &[Duration::from_secs(1), Duration::from_secs(2)];

/// Retry profile for callers that would rather wait than fall back to
/// manual input.
pub const PATIENT_RETRY: &[Duration] = &[
    Duration::from_secs(5),
    Duration::from_secs(10),
    Duration::from_secs(15),
];

/// Result of a contract-creation lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreationInfo {
    pub block_number: u64,
    pub creator: String,
    pub tx_hash: String,
}

/// A single explorer call, already classified.
#[derive(Debug)]
pub enum FetchOutcome {
    Found(CreationInfo),
    NotFound,
    RateLimited,
}

/// Seam for the raw explorer call so the resolver's retry behavior can be
/// tested without a network.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CreationFetch: Send + Sync {
    async fn fetch(&self, contract: Address, chain_id: u64) -> FetchOutcome;
}

pub struct EtherscanFetch {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

static MISSING_KEY_WARNED: Once = Once::new();

impl EtherscanFetch {
    pub fn new(http: reqwest::Client, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: ETHERSCAN_V2_BASE_URL.to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl CreationFetch for EtherscanFetch {
    async fn fetch(&self, contract: Address, chain_id: u64) -> FetchOutcome {
        let api_key = match &self.api_key {
            Some(k) => k.clone(),
            None => {
                // Programmer/deployment error, reported once; treated as
                // "not found" rather than a crash.
                MISSING_KEY_WARNED.call_once(|| {
                    warn!("no ETHERSCAN_API_KEY configured, creation-block lookups disabled");
                });
                return FetchOutcome::NotFound;
            }
        };

        let response = match self
            .http
            .get(&self.base_url)
            .query(&[
                ("chainid", chain_id.to_string()),
                ("module", "contract".to_string()),
                ("action", "getcontractcreation".to_string()),
                ("contractaddresses", format!("{contract:?}")),
                ("apikey", api_key),
            ])
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                error!("explorer request failed for chain {chain_id}: {e}");
                return FetchOutcome::NotFound;
            }
        };

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || status == reqwest::StatusCode::FORBIDDEN
        {
            return FetchOutcome::RateLimited;
        }
        if !status.is_success() {
            error!("explorer API error for chain {chain_id}: {status}");
            return FetchOutcome::NotFound;
        }

        let body: Value = match response.json().await {
            Ok(v) => v,
            Err(e) => {
                error!("malformed explorer response for chain {chain_id}: {e}");
                return FetchOutcome::NotFound;
            }
        };

        classify_body(&body)
    }
}

/// The explorer embeds rate-limit notices inside 200 responses, both in the
/// `message` field and as a bare string `result`.
fn classify_body(body: &Value) -> FetchOutcome {
    let mentions_rate_limit = |v: &Value| {
        v.as_str()
            .map(|s| s.to_lowercase().contains("rate limit"))
            .unwrap_or(false)
    };
    if mentions_rate_limit(&body["message"]) || mentions_rate_limit(&body["result"]) {
        return FetchOutcome::RateLimited;
    }

    if body["status"].as_str() == Some("1") {
        if let Some(first) = body["result"].as_array().and_then(|r| r.first()) {
            let block = first["blockNumber"]
                .as_str()
                .and_then(|s| s.parse::<u64>().ok());
            if let Some(block_number) = block {
                return FetchOutcome::Found(CreationInfo {
                    block_number,
                    creator: first["contractCreator"].as_str().unwrap_or_default().to_string(),
                    tx_hash: first["txHash"].as_str().unwrap_or_default().to_string(),
                });
            }
        }
    }

    FetchOutcome::NotFound
}

/// Resolves the deployment block of a contract, tolerating rate limiting.
pub struct CreationResolver {
    fetch: Arc<dyn CreationFetch>,
}

impl CreationResolver {
    pub fn new(fetch: Arc<dyn CreationFetch>) -> Self {
        Self { fetch }
    }

    /// `None` means "could not determine, caller must ask the user". Chains
    /// in the manual denylist never reach the explorer at all.
    pub async fn resolve(
        &self,
        contract: Address,
        chain_id: u64,
        delays: &[Duration],
    ) -> Option<CreationInfo> {
        if chains::requires_manual_from_block(chain_id) {
            return None;
        }

        let info = retry_with_delays(delays, || async {
            match self.fetch.fetch(contract, chain_id).await {
                FetchOutcome::Found(info) => Attempt::Done(info),
                FetchOutcome::NotFound => Attempt::Terminal,
                FetchOutcome::RateLimited => Attempt::Transient,
            }
        })
        .await;

        if let Some(info) = &info {
            info!(
                "resolved creation block {} for {contract:?} on chain {chain_id}",
                info.block_number
            );
        }
        info
    }
}
