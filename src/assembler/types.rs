//! Wire types for the generated adapter configuration.
//!
//! Field declaration order is the serialization order, and the serialized
//! form must stay byte-for-byte stable: the pretty JSON (plus trailing
//! newline) is what gets base64-encoded for deployment, so identical inputs
//! must produce identical bytes.

use ethers::types::Address;
use serde::{Deserialize, Serialize};

/// Pricing for one token reference. Exactly one kind is active; a config
/// never carries both a peg value and a catalog id for the same token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum PricingSpec {
    #[serde(rename = "pegged")]
    Pegged {
        #[serde(rename = "usdPegValue")]
        usd_peg_value: f64,
    },
    #[serde(rename = "coingecko")]
    Coingecko { id: String },
    /// Net-asset-value pricing for a V2 LP position, combining both legs.
    #[serde(rename = "univ2nav")]
    Univ2Nav {
        token0: Box<PricingSpec>,
        token1: Box<PricingSpec>,
    },
}

/// A fixed USD value supplied by the user instead of a catalog lookup.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeggedPricing {
    pub usd_peg_value: f64,
}

impl From<PeggedPricing> for PricingSpec {
    fn from(p: PeggedPricing) -> Self {
        PricingSpec::Pegged {
            usd_peg_value: p.usd_peg_value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterConfig {
    pub chain_arch: String,
    pub flush_interval: String,
    pub redis_url: String,
    pub sink_config: SinkConfig,
    pub network: NetworkConfig,
    pub range: BlockRange,
    pub adapter_config: AdapterPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SinkConfig {
    pub sinks: Vec<Sink>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "sinkType")]
pub enum Sink {
    #[serde(rename = "csv")]
    Csv { path: String },
    #[serde(rename = "stdout")]
    Stdout,
    #[serde(rename = "absinthe")]
    Absinthe {
        url: String,
        #[serde(rename = "apiKey")]
        api_key: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub chain_id: u64,
    pub gateway_url: String,
    pub rpc_url: String,
    pub finality: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_block: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_block: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterPayload {
    pub adapter_id: String,
    pub config: PayloadConfig,
}

/// Trackable lists keyed by kind; only the kinds the adapter emits appear.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct PayloadConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<Vec<TokenEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap: Option<Vec<SwapEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lp: Option<Vec<LpEntry>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenEntry {
    pub params: TokenParams,
    pub pricing: PricingSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenParams {
    pub contract_address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwapEntry {
    pub params: SwapParams,
    #[serde(rename = "assetSelectors")]
    pub asset_selectors: AssetSelectors,
    pub pricing: PricingSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub factory_address: Option<String>,
    #[serde(
        rename = "nonFungiblePositionManagerAddress",
        skip_serializing_if = "Option::is_none"
    )]
    pub non_fungible_position_manager_address: Option<String>,
    pub pool_address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetSelectors {
    pub swap_leg_address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LpEntry {
    pub params: LpParams,
    pub pricing: PricingSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LpParams {
    pub pool_address: String,
}

/// One token the caller must supply pricing for before re-invoking.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingToken {
    pub address: String,
    pub field: String,
    pub reason: String,
}

/// How one token's pricing was resolved, echoed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSummary {
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coingecko_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub pricing_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usd_peg_value: Option<f64>,
}

/// Successful generation: the document plus its transport encoding.
#[derive(Debug, Clone)]
pub struct GeneratedConfig {
    pub config: AdapterConfig,
    pub base64: String,
    pub tokens: Vec<TokenSummary>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

/// Request-level result of one generation call.
#[derive(Debug)]
pub enum GenerateOutcome {
    Success(GeneratedConfig),
    /// Pricing could not be resolved for the named tokens and no manual
    /// override was supplied; the caller should re-invoke with peg values.
    ManualInputRequired {
        missing_tokens: Vec<MissingToken>,
        message: String,
        warnings: Vec<String>,
    },
    /// Request-level validation failure (HTTP 400 semantics).
    Rejected {
        message: String,
        error: String,
        suggestion: Option<String>,
        warnings: Vec<String>,
        errors: Vec<String>,
    },
}

/// Full lowercase hex form; `Address` displays truncated by default.
pub fn addr_hex(a: &Address) -> String {
    format!("{a:?}")
}
