//! Price identifier resolution against the CoinGecko catalog.
//!
//! Two steps: map a token contract to a catalog id via the chain's platform
//! slug, then normalize chain-qualified wrapped/bridged aliases down to the
//! canonical asset id so price history is not fragmented. Normalization is
//! best-effort and never blocks the pipeline.

use crate::chains;
use async_trait::async_trait;
use ethers::types::Address;
use log::warn;
use serde::Deserialize;
use std::sync::Arc;

pub const COINGECKO_API_BASE: &str = "https://pro-api.coingecko.com/api/v3";

/// Naming conventions CoinGecko uses for chain-qualified variants. Tried in
/// order when the catalog carries no explicit parent reference.
pub const BRIDGE_PREFIXES: &[&str] = &["hemi-", "stargate-bridged-", "wrapped-", "bridged-"];

/// Catalog entry for a token contract.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CoinEntry {
    pub id: Option<String>,
    pub name: Option<String>,
    pub symbol: Option<String>,
}

/// Catalog detail for an id; only the parent link matters here.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CoinDetail {
    pub id: Option<String>,
    pub parent: Option<ParentRef>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ParentRef {
    pub id: Option<String>,
}

/// Seam over the catalog API. `None` covers both 404 and transport failure:
/// absence of a listing is an expected, non-exceptional outcome.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceCatalog: Send + Sync {
    async fn coin_by_contract(&self, platform: &str, token: Address) -> Option<CoinEntry>;
    async fn coin_detail(&self, id: &str) -> Option<CoinDetail>;
}

pub struct CoinGeckoCatalog {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl CoinGeckoCatalog {
    pub fn new(http: reqwest::Client, api_key: String) -> Self {
        Self {
            http,
            base_url: COINGECKO_API_BASE.to_string(),
            api_key,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Option<T> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .header("x-cg-pro-api-key", &self.api_key)
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            return None;
        }
        response.json().await.ok()
    }
}

#[async_trait]
impl PriceCatalog for CoinGeckoCatalog {
    async fn coin_by_contract(&self, platform: &str, token: Address) -> Option<CoinEntry> {
        self.get_json(&format!("coins/{platform}/contract/{token:?}"))
            .await
    }

    async fn coin_detail(&self, id: &str) -> Option<CoinDetail> {
        self.get_json(&format!("coins/{id}")).await
    }
}

/// Maps token addresses to canonical catalog identifiers.
pub struct PriceResolver {
    catalog: Arc<dyn PriceCatalog>,
}

impl PriceResolver {
    pub fn new(catalog: Arc<dyn PriceCatalog>) -> Self {
        Self { catalog }
    }

    /// Step 1: token contract -> catalog entry. `None` when the chain has no
    /// platform slug or the token is not listed; the caller falls back to
    /// manual pricing.
    pub async fn catalog_entry(&self, token: Address, chain_id: u64) -> Option<CoinEntry> {
        let platform = chains::lookup(chain_id)?.coingecko_platform?;
        self.catalog.coin_by_contract(platform, token).await
    }

    /// Step 2: normalize to the base identifier. Prefers an explicit parent
    /// reference; otherwise strips known bridge prefixes and keeps the first
    /// candidate the catalog verifies. Falls back to the input unchanged;
    /// this step never fails.
    pub async fn base_id(&self, coin_id: &str) -> String {
        match self.catalog.coin_detail(coin_id).await {
            Some(detail) => {
                if let Some(parent_id) = detail.parent.and_then(|p| p.id) {
                    return parent_id;
                }
                for prefix in BRIDGE_PREFIXES {
                    if let Some(candidate) = coin_id.strip_prefix(prefix) {
                        if self.catalog.coin_detail(candidate).await.is_some() {
                            return candidate.to_string();
                        }
                    }
                }
            }
            None => {
                warn!("could not fetch catalog detail for {coin_id}, keeping original id");
            }
        }
        coin_id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    fn addr() -> Address {
        "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb".parse().unwrap()
    }

    fn detail(id: &str, parent: Option<&str>) -> CoinDetail {
        CoinDetail {
            id: Some(id.to_string()),
            parent: parent.map(|p| ParentRef {
                id: Some(p.to_string()),
            }),
        }
    }

    #[tokio::test]
    async fn parent_reference_wins() {
        let mut mock = MockPriceCatalog::new();
        mock.expect_coin_detail()
            .with(eq("bridged-usdc"))
            .returning(|_| Some(detail("bridged-usdc", Some("usd-coin"))));

        let resolver = PriceResolver::new(Arc::new(mock));
        assert_eq!(resolver.base_id("bridged-usdc").await, "usd-coin");
    }

    #[tokio::test]
    async fn prefix_strip_verified_against_catalog() {
        let mut mock = MockPriceCatalog::new();
        mock.expect_coin_detail()
            .with(eq("wrapped-bitcoin"))
            .returning(|_| Some(detail("wrapped-bitcoin", None)));
        mock.expect_coin_detail()
            .with(eq("bitcoin"))
            .returning(|_| Some(detail("bitcoin", None)));

        let resolver = PriceResolver::new(Arc::new(mock));
        assert_eq!(resolver.base_id("wrapped-bitcoin").await, "bitcoin");
    }

    #[tokio::test]
    async fn unverifiable_prefix_keeps_original() {
        let mut mock = MockPriceCatalog::new();
        mock.expect_coin_detail()
            .with(eq("hemi-obscure-token"))
            .returning(|_| Some(detail("hemi-obscure-token", None)));
        mock.expect_coin_detail()
            .with(eq("obscure-token"))
            .returning(|_| None);

        let resolver = PriceResolver::new(Arc::new(mock));
        assert_eq!(resolver.base_id("hemi-obscure-token").await, "hemi-obscure-token");
    }

    #[tokio::test]
    async fn detail_fetch_failure_keeps_original() {
        let mut mock = MockPriceCatalog::new();
        mock.expect_coin_detail().returning(|_| None);

        let resolver = PriceResolver::new(Arc::new(mock));
        assert_eq!(resolver.base_id("plain-token").await, "plain-token");
    }

    #[tokio::test]
    async fn unknown_platform_short_circuits() {
        let mut mock = MockPriceCatalog::new();
        mock.expect_coin_by_contract().times(0);

        let resolver = PriceResolver::new(Arc::new(mock));
        assert_eq!(resolver.catalog_entry(addr(), 999_999).await, None);
    }
}
