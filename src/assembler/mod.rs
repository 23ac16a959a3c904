//! Config assembly: the sequential enrichment pipeline.
//!
//! One generation request walks a fixed sequence of steps (chain support
//! gate, best-effort contract validation, fromBlock resolution, token-pair
//! reads, per-leg pricing, payload shaping, serialization), each with its
//! own fallback.
//! Upstream flakiness during validation or creation lookup degrades to
//! warnings; a pool that will not yield both tokens, or pricing with no
//! manual override, ends the request with a structured response instead.

pub mod types;

use crate::chains::{self, ChainDescriptor, Univ3Addresses};
use crate::explorer::{CreationResolver, FAST_RETRY};
use crate::pricing::{CoinEntry, PriceResolver};
use crate::rpc::{ChainReader, TokenPair};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ethers::types::Address;
use log::info;
use std::sync::Arc;

pub use types::*;

pub const ADAPTER_ID_ERC20: &str = "erc20-holdings";
pub const ADAPTER_ID_UNIV2: &str = "uniswap-v2";
pub const ADAPTER_ID_UNIV3: &str = "uniswap-v3";

const REDIS_URL_PLACEHOLDER: &str = "${env:REDIS_URL}";
const RPC_URL_PLACEHOLDER: &str = "${env:RPC_URL}";
const ABSINTHE_URL_PLACEHOLDER: &str = "${env:ABSINTHE_API_URL}";
const ABSINTHE_KEY_PLACEHOLDER: &str = "${env:ABSINTHE_API_KEY}";

#[derive(Debug, Clone)]
pub struct Erc20GenerateRequest {
    pub token_contract_address: Address,
    pub chain_id: u64,
    pub from_block: Option<u64>,
    pub to_block: Option<u64>,
    pub finality: u32,
    pub flush_interval_hours: u32,
    pub manual_pricing: Option<PeggedPricing>,
}

#[derive(Debug, Clone)]
pub struct PoolGenerateRequest {
    pub pool_address: Address,
    pub chain_id: u64,
    pub from_block: Option<u64>,
    pub to_block: Option<u64>,
    pub finality: u32,
    pub flush_interval_hours: u32,
    pub token0_manual_pricing: Option<PeggedPricing>,
    pub token1_manual_pricing: Option<PeggedPricing>,
}

/// Pretty JSON with a trailing newline, then base64 of those exact bytes.
/// Must match what a `json | base64` shell pipe would produce.
pub fn encode_config(config: &AdapterConfig) -> serde_json::Result<String> {
    let mut json = serde_json::to_string_pretty(config)?;
    json.push('\n');
    Ok(BASE64.encode(json.as_bytes()))
}

enum LegResolution {
    Priced {
        spec: PricingSpec,
        summary: TokenSummary,
    },
    Missing(MissingToken),
}

type PricedLeg = (PricingSpec, TokenSummary);

fn split_legs(
    leg0: LegResolution,
    leg1: LegResolution,
) -> Result<(PricedLeg, PricedLeg), Vec<MissingToken>> {
    match (leg0, leg1) {
        (
            LegResolution::Priced {
                spec: p0,
                summary: s0,
            },
            LegResolution::Priced {
                spec: p1,
                summary: s1,
            },
        ) => Ok(((p0, s0), (p1, s1))),
        (a, b) => {
            let mut missing = Vec::new();
            if let LegResolution::Missing(m) = a {
                missing.push(m);
            }
            if let LegResolution::Missing(m) = b {
                missing.push(m);
            }
            Err(missing)
        }
    }
}

fn unsupported_chain(chain_id: u64) -> GenerateOutcome {
    GenerateOutcome::Rejected {
        message: format!("Chain ID {chain_id} is not supported"),
        error: "Unsupported chain".to_string(),
        suggestion: Some("Please select one of the supported chains.".to_string()),
        warnings: Vec::new(),
        errors: Vec::new(),
    }
}

fn univ3_unsupported(chain_id: u64) -> GenerateOutcome {
    GenerateOutcome::Rejected {
        message: format!("Chain ID {chain_id} is not supported for Uniswap V3"),
        error: "Unsupported chain".to_string(),
        suggestion: Some(format!(
            "Please select a chain that supports Uniswap V3, or verify the factory and position manager addresses for chain {chain_id}."
        )),
        warnings: Vec::new(),
        errors: Vec::new(),
    }
}

#[allow(clippy::too_many_arguments)]
fn build_document(
    chain: &ChainDescriptor,
    flush_interval_hours: u32,
    finality: u32,
    from_block: Option<u64>,
    to_block: Option<u64>,
    csv_path: &str,
    payload: AdapterPayload,
) -> AdapterConfig {
    AdapterConfig {
        chain_arch: "evm".to_string(),
        flush_interval: format!("{flush_interval_hours}h"),
        redis_url: REDIS_URL_PLACEHOLDER.to_string(),
        sink_config: SinkConfig {
            sinks: vec![
                Sink::Csv {
                    path: csv_path.to_string(),
                },
                Sink::Stdout,
                Sink::Absinthe {
                    url: ABSINTHE_URL_PLACEHOLDER.to_string(),
                    api_key: ABSINTHE_KEY_PLACEHOLDER.to_string(),
                },
            ],
        },
        network: NetworkConfig {
            chain_id: chain.chain_id,
            gateway_url: chain.gateway_url.to_string(),
            rpc_url: RPC_URL_PLACEHOLDER.to_string(),
            finality,
        },
        range: BlockRange {
            from_block,
            to_block,
        },
        adapter_config: payload,
    }
}

/// Orchestrates the resolvers into one adapter configuration. All state is
/// request-local; the assembler itself is immutable and shared.
pub struct Assembler {
    reader: Arc<dyn ChainReader>,
    creation: CreationResolver,
    pricing: Arc<PriceResolver>,
}

impl Assembler {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        creation: CreationResolver,
        pricing: Arc<PriceResolver>,
    ) -> Self {
        Self {
            reader,
            creation,
            pricing,
        }
    }

    pub async fn generate_erc20(&self, req: Erc20GenerateRequest) -> GenerateOutcome {
        let mut warnings = Vec::new();
        let errors = Vec::new();
        let token = req.token_contract_address;

        let chain = match chains::lookup(req.chain_id) {
            Some(c) => c,
            None => return unsupported_chain(req.chain_id),
        };

        // Best-effort probe: a flaky RPC must not block a legitimate
        // config, so every failure path here is a warning.
        match self.reader.is_contract(req.chain_id, token).await {
            Ok(true) => match self.reader.erc20_probe(req.chain_id, token).await {
                Ok(true) => {}
                Ok(false) => warnings.push(format!(
                    "Contract {} may not be a standard ERC20 token. Proceeding anyway...",
                    addr_hex(&token)
                )),
                Err(e) => warnings.push(format!(
                    "Could not fully validate contract: {e}. Proceeding anyway..."
                )),
            },
            Ok(false) => warnings.push(format!(
                "Address {} does not appear to be a contract on chain {}. It may be an EOA or on a different chain. Proceeding anyway...",
                addr_hex(&token),
                req.chain_id
            )),
            Err(e) => warnings.push(format!(
                "Could not validate contract {} on chain {}: {e}. Proceeding anyway...",
                addr_hex(&token),
                req.chain_id
            )),
        }

        let from_block = self
            .resolve_from_block(req.from_block, req.to_block, token, req.chain_id, &mut warnings)
            .await;

        let leg = self
            .leg_pricing(
                token,
                req.chain_id,
                req.manual_pricing,
                "manualPricing",
                "this token",
            )
            .await;
        let (pricing, summary) = match leg {
            LegResolution::Priced { spec, summary } => (spec, summary),
            LegResolution::Missing(missing) => {
                return GenerateOutcome::ManualInputRequired {
                    message: format!(
                        "Could not find CoinGecko ID for token {}. Please provide a manual USD peg value.",
                        missing.address
                    ),
                    missing_tokens: vec![missing],
                    warnings,
                };
            }
        };

        let payload = AdapterPayload {
            adapter_id: ADAPTER_ID_ERC20.to_string(),
            config: PayloadConfig {
                token: Some(vec![TokenEntry {
                    params: TokenParams {
                        contract_address: addr_hex(&token),
                    },
                    pricing,
                }]),
                ..Default::default()
            },
        };

        let config = build_document(
            chain,
            req.flush_interval_hours,
            req.finality,
            from_block,
            req.to_block,
            "positions.csv",
            payload,
        );
        finish(config, vec![summary], warnings, errors)
    }

    pub async fn generate_univ2(&self, req: PoolGenerateRequest) -> GenerateOutcome {
        let chain = match chains::lookup(req.chain_id) {
            Some(c) => c,
            None => return unsupported_chain(req.chain_id),
        };

        let mut warnings = Vec::new();
        let errors = Vec::new();

        let pair = match self.resolve_pool(&req, "Uniswap V2").await {
            Ok(pair) => pair,
            Err(outcome) => return *outcome,
        };

        let from_block = self
            .resolve_from_block(
                req.from_block,
                req.to_block,
                req.pool_address,
                req.chain_id,
                &mut warnings,
            )
            .await;

        let (leg0, leg1) = self.pool_leg_pricing(&req, &pair).await;
        let ((p0, s0), (p1, s1)) = match split_legs(leg0, leg1) {
            Ok(legs) => legs,
            Err(missing) => return manual_input_required(missing, warnings),
        };

        let pool = addr_hex(&req.pool_address);
        let payload = AdapterPayload {
            adapter_id: ADAPTER_ID_UNIV2.to_string(),
            config: PayloadConfig {
                swap: Some(vec![
                    swap_entry(&pool, None, &pair.token0, p0.clone()),
                    swap_entry(&pool, None, &pair.token1, p1.clone()),
                ]),
                lp: Some(vec![LpEntry {
                    params: LpParams {
                        pool_address: pool.clone(),
                    },
                    pricing: PricingSpec::Univ2Nav {
                        token0: Box::new(p0),
                        token1: Box::new(p1),
                    },
                }]),
                ..Default::default()
            },
        };

        let config = build_document(
            chain,
            req.flush_interval_hours,
            req.finality,
            from_block,
            req.to_block,
            "univ2-new.csv",
            payload,
        );
        finish(config, vec![s0, s1], warnings, errors)
    }

    pub async fn generate_univ3(&self, req: PoolGenerateRequest) -> GenerateOutcome {
        // Factory gate first: no upstream call is attempted for a chain we
        // have no V3 deployment addresses for.
        let (chain, univ3) = match chains::lookup(req.chain_id) {
            Some(c) => match c.univ3 {
                Some(u) => (c, u),
                None => return univ3_unsupported(req.chain_id),
            },
            None => return univ3_unsupported(req.chain_id),
        };

        let mut warnings = Vec::new();
        let errors = Vec::new();

        let pair = match self.resolve_pool(&req, "Uniswap V3").await {
            Ok(pair) => pair,
            Err(outcome) => return *outcome,
        };

        let from_block = self
            .resolve_from_block(
                req.from_block,
                req.to_block,
                req.pool_address,
                req.chain_id,
                &mut warnings,
            )
            .await;

        let (leg0, leg1) = self.pool_leg_pricing(&req, &pair).await;
        let ((p0, s0), (p1, s1)) = match split_legs(leg0, leg1) {
            Ok(legs) => legs,
            Err(missing) => return manual_input_required(missing, warnings),
        };

        let pool = addr_hex(&req.pool_address);
        let payload = AdapterPayload {
            adapter_id: ADAPTER_ID_UNIV3.to_string(),
            config: PayloadConfig {
                swap: Some(vec![
                    swap_entry(&pool, Some(univ3), &pair.token0, p0),
                    swap_entry(&pool, Some(univ3), &pair.token1, p1),
                ]),
                ..Default::default()
            },
        };

        let config = build_document(
            chain,
            req.flush_interval_hours,
            req.finality,
            from_block,
            req.to_block,
            "univ3-new.csv",
            payload,
        );
        finish(config, vec![s0, s1], warnings, errors)
    }

    /// Token-pair read; failure is terminal for pool requests since a config
    /// with missing tokens must never be emitted.
    async fn resolve_pool(
        &self,
        req: &PoolGenerateRequest,
        pool_kind: &str,
    ) -> Result<TokenPair, Box<GenerateOutcome>> {
        self.reader
            .token_pair(req.chain_id, req.pool_address)
            .await
            .map_err(|e| {
                Box::new(GenerateOutcome::Rejected {
                    message: e.to_string(),
                    error: "Invalid pool contract".to_string(),
                    suggestion: Some(format!(
                        "Please verify that {} is a valid {pool_kind} pool address on chain {}. If the pool is on a different chain, select the correct chain.",
                        addr_hex(&req.pool_address),
                        req.chain_id
                    )),
                    warnings: Vec::new(),
                    errors: vec![e.to_string()],
                })
            })
    }

    /// fromBlock precedence: user value, then denylist warning, then the
    /// explorer, then a warning that manual input is needed before deploy.
    /// An explorer result past the requested toBlock is discarded so the
    /// emitted range is never inverted.
    async fn resolve_from_block(
        &self,
        requested: Option<u64>,
        to_block: Option<u64>,
        contract: Address,
        chain_id: u64,
        warnings: &mut Vec<String>,
    ) -> Option<u64> {
        if requested.is_some() {
            return requested;
        }

        if chains::requires_manual_from_block(chain_id) {
            warnings.push(format!(
                "Chain {chain_id} requires manual fromBlock input. Please provide fromBlock to ensure accurate data indexing."
            ));
        } else {
            match self.creation.resolve(contract, chain_id, FAST_RETRY).await {
                Some(info) => match to_block {
                    Some(to) if info.block_number > to => warnings.push(format!(
                        "Creation block {} for {} is beyond toBlock {to}. Please provide fromBlock manually.",
                        info.block_number,
                        addr_hex(&contract)
                    )),
                    _ => {
                        info!(
                            "using creation block {} as fromBlock for {}",
                            info.block_number,
                            addr_hex(&contract)
                        );
                        return Some(info.block_number);
                    }
                },
                None => warnings.push(format!(
                    "Could not automatically determine fromBlock for {}. Please provide fromBlock manually to ensure accurate indexing.",
                    addr_hex(&contract)
                )),
            }
        }

        warnings.push(
            "CRITICAL: No fromBlock specified. You MUST add a valid fromBlock value to the \
             generated config before deploying, or the adapter will fail to start or index incorrectly."
                .to_string(),
        );
        None
    }

    /// Pricing for both legs, issued concurrently; each leg resolves to its
    /// own success or failure independently.
    async fn pool_leg_pricing(
        &self,
        req: &PoolGenerateRequest,
        pair: &TokenPair,
    ) -> (LegResolution, LegResolution) {
        futures::join!(
            self.leg_pricing(
                pair.token0,
                req.chain_id,
                req.token0_manual_pricing,
                "token0ManualPricing",
                "token0",
            ),
            self.leg_pricing(
                pair.token1,
                req.chain_id,
                req.token1_manual_pricing,
                "token1ManualPricing",
                "token1",
            ),
        )
    }

    /// A manual pegged override bypasses the catalog entirely; otherwise the
    /// catalog id is looked up and normalized to its base id.
    async fn leg_pricing(
        &self,
        token: Address,
        chain_id: u64,
        manual: Option<PeggedPricing>,
        field: &str,
        leg_name: &str,
    ) -> LegResolution {
        if let Some(peg) = manual {
            info!(
                "using manual pegged pricing for {}: ${}",
                addr_hex(&token),
                peg.usd_peg_value
            );
            return LegResolution::Priced {
                spec: peg.into(),
                summary: TokenSummary {
                    address: addr_hex(&token),
                    coingecko_id: None,
                    name: None,
                    symbol: None,
                    pricing_type: "pegged".to_string(),
                    usd_peg_value: Some(peg.usd_peg_value),
                },
            };
        }

        let platform_known = chains::lookup(chain_id)
            .map(|c| c.coingecko_platform.is_some())
            .unwrap_or(false);
        if !platform_known {
            return LegResolution::Missing(MissingToken {
                address: addr_hex(&token),
                field: field.to_string(),
                reason: format!("Chain ID {chain_id} is not supported by the pricing catalog"),
            });
        }

        match self.pricing.catalog_entry(token, chain_id).await {
            Some(CoinEntry {
                id: Some(raw_id),
                name,
                symbol,
            }) => {
                let base = self.pricing.base_id(&raw_id).await;
                info!("using CoinGecko pricing for {}: {base}", addr_hex(&token));
                LegResolution::Priced {
                    spec: PricingSpec::Coingecko { id: base.clone() },
                    summary: TokenSummary {
                        address: addr_hex(&token),
                        coingecko_id: Some(base),
                        name,
                        symbol,
                        pricing_type: "coingecko".to_string(),
                        usd_peg_value: None,
                    },
                }
            }
            _ => LegResolution::Missing(MissingToken {
                address: addr_hex(&token),
                field: field.to_string(),
                reason: format!("CoinGecko ID not found for {leg_name}"),
            }),
        }
    }
}

fn swap_entry(
    pool: &str,
    univ3: Option<Univ3Addresses>,
    leg: &Address,
    pricing: PricingSpec,
) -> SwapEntry {
    SwapEntry {
        params: SwapParams {
            factory_address: univ3.map(|u| u.factory.to_string()),
            non_fungible_position_manager_address: univ3.map(|u| u.position_manager.to_string()),
            pool_address: pool.to_string(),
        },
        asset_selectors: AssetSelectors {
            swap_leg_address: addr_hex(leg),
        },
        pricing,
    }
}

fn manual_input_required(
    missing: Vec<MissingToken>,
    warnings: Vec<String>,
) -> GenerateOutcome {
    GenerateOutcome::ManualInputRequired {
        message: format!(
            "Could not find CoinGecko IDs for {} token(s). Please provide manual USD peg values.",
            missing.len()
        ),
        missing_tokens: missing,
        warnings,
    }
}

fn finish(
    config: AdapterConfig,
    tokens: Vec<TokenSummary>,
    warnings: Vec<String>,
    errors: Vec<String>,
) -> GenerateOutcome {
    match encode_config(&config) {
        Ok(base64) => GenerateOutcome::Success(GeneratedConfig {
            config,
            base64,
            tokens,
            warnings,
            errors,
        }),
        Err(e) => GenerateOutcome::Rejected {
            message: "Failed to serialize generated config".to_string(),
            error: e.to_string(),
            suggestion: None,
            warnings,
            errors,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_config() -> AdapterConfig {
        build_document(
            chains::lookup(1).unwrap(),
            1,
            75,
            Some(100),
            None,
            "positions.csv",
            AdapterPayload {
                adapter_id: ADAPTER_ID_ERC20.to_string(),
                config: PayloadConfig {
                    token: Some(vec![TokenEntry {
                        params: TokenParams {
                            contract_address:
                                "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".to_string(),
                        },
                        pricing: PricingSpec::Pegged { usd_peg_value: 1.0 },
                    }]),
                    ..Default::default()
                },
            },
        )
    }

    #[test]
    fn serialization_shape_matches_wire_format() {
        let value = serde_json::to_value(minimal_config()).unwrap();
        assert_eq!(value["chainArch"], "evm");
        assert_eq!(value["flushInterval"], "1h");
        assert_eq!(value["redisUrl"], "${env:REDIS_URL}");
        assert_eq!(value["sinkConfig"]["sinks"][0]["sinkType"], "csv");
        assert_eq!(value["sinkConfig"]["sinks"][1], json!({"sinkType": "stdout"}));
        assert_eq!(value["sinkConfig"]["sinks"][2]["apiKey"], "${env:ABSINTHE_API_KEY}");
        assert_eq!(value["network"]["chainId"], 1);
        assert_eq!(value["range"]["fromBlock"], 100);
        assert!(value["range"].get("toBlock").is_none());
        assert_eq!(value["adapterConfig"]["adapterId"], "erc20-holdings");
        assert_eq!(
            value["adapterConfig"]["config"]["token"][0]["pricing"],
            json!({"kind": "pegged", "usdPegValue": 1.0})
        );
    }

    #[test]
    fn encoding_is_deterministic_and_round_trips() {
        let config = minimal_config();
        let a = encode_config(&config).unwrap();
        let b = encode_config(&config).unwrap();
        assert_eq!(a, b);

        let decoded = BASE64.decode(a).unwrap();
        let text = String::from_utf8(decoded).unwrap();
        assert!(text.ends_with('\n'));
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, serde_json::to_value(&config).unwrap());
    }

    #[test]
    fn pegged_and_coingecko_are_mutually_exclusive() {
        let pegged = serde_json::to_value(PricingSpec::Pegged { usd_peg_value: 2.5 }).unwrap();
        assert_eq!(pegged, json!({"kind": "pegged", "usdPegValue": 2.5}));
        assert!(pegged.get("id").is_none());

        let cg = serde_json::to_value(PricingSpec::Coingecko {
            id: "usd-coin".to_string(),
        })
        .unwrap();
        assert_eq!(cg, json!({"kind": "coingecko", "id": "usd-coin"}));
        assert!(cg.get("usdPegValue").is_none());
    }

    #[test]
    fn univ2_nav_nests_both_legs() {
        let nav = PricingSpec::Univ2Nav {
            token0: Box::new(PricingSpec::Coingecko {
                id: "usd-coin".to_string(),
            }),
            token1: Box::new(PricingSpec::Pegged { usd_peg_value: 1.0 }),
        };
        assert_eq!(
            serde_json::to_value(nav).unwrap(),
            json!({
                "kind": "univ2nav",
                "token0": {"kind": "coingecko", "id": "usd-coin"},
                "token1": {"kind": "pegged", "usdPegValue": 1.0}
            })
        );
    }
}
