//! End-to-end pipeline tests with stubbed upstreams: the assembler wired to
//! in-memory chain, explorer, and catalog implementations.

use adapter_wizard::assembler::{
    encode_config, Assembler, Erc20GenerateRequest, GenerateOutcome, PeggedPricing,
    PoolGenerateRequest, PricingSpec,
};
use adapter_wizard::errors::PoolReadError;
use adapter_wizard::explorer::{CreationFetch, CreationInfo, CreationResolver, FetchOutcome};
use adapter_wizard::pricing::{CoinDetail, CoinEntry, PriceCatalog, PriceResolver};
use adapter_wizard::rpc::{ChainReader, TokenPair};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ethers::types::Address;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn addr(n: u8) -> Address {
    Address::from_low_u64_be(n as u64)
}

#[derive(Default)]
struct StubReader {
    pair: Option<TokenPair>,
    calls: AtomicUsize,
}

#[async_trait]
impl ChainReader for StubReader {
    async fn is_contract(&self, _chain_id: u64, _address: Address) -> anyhow::Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn token_pair(
        &self,
        chain_id: u64,
        pool: Address,
    ) -> Result<TokenPair, PoolReadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pair.ok_or(PoolReadError::NotAContract {
            address: pool,
            chain_id,
        })
    }

    async fn erc20_probe(&self, _chain_id: u64, _token: Address) -> anyhow::Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }
}

#[derive(Default)]
struct StubExplorer {
    creation_block: Option<u64>,
    calls: AtomicUsize,
}

#[async_trait]
impl CreationFetch for StubExplorer {
    async fn fetch(&self, _contract: Address, _chain_id: u64) -> FetchOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.creation_block {
            Some(block_number) => FetchOutcome::Found(CreationInfo {
                block_number,
                creator: "0xcafe".into(),
                tx_hash: "0xbeef".into(),
            }),
            None => FetchOutcome::NotFound,
        }
    }
}

#[derive(Default)]
struct StubCatalog {
    by_contract: HashMap<Address, CoinEntry>,
    calls: AtomicUsize,
}

#[async_trait]
impl PriceCatalog for StubCatalog {
    async fn coin_by_contract(&self, _platform: &str, token: Address) -> Option<CoinEntry> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.by_contract.get(&token).cloned()
    }

    async fn coin_detail(&self, id: &str) -> Option<CoinDetail> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Some(CoinDetail {
            id: Some(id.to_string()),
            parent: None,
        })
    }
}

fn entry(id: &str) -> CoinEntry {
    CoinEntry {
        id: Some(id.to_string()),
        name: Some(id.to_string()),
        symbol: Some(id.to_string()),
    }
}

struct Harness {
    reader: Arc<StubReader>,
    explorer: Arc<StubExplorer>,
    catalog: Arc<StubCatalog>,
    assembler: Assembler,
}

fn harness(reader: StubReader, explorer: StubExplorer, catalog: StubCatalog) -> Harness {
    let reader = Arc::new(reader);
    let explorer = Arc::new(explorer);
    let catalog = Arc::new(catalog);
    let assembler = Assembler::new(
        reader.clone(),
        CreationResolver::new(explorer.clone()),
        Arc::new(PriceResolver::new(catalog.clone())),
    );
    Harness {
        reader,
        explorer,
        catalog,
        assembler,
    }
}

fn erc20_request() -> Erc20GenerateRequest {
    Erc20GenerateRequest {
        token_contract_address: addr(0xAA),
        chain_id: 1,
        from_block: Some(100),
        to_block: None,
        finality: 75,
        flush_interval_hours: 1,
        manual_pricing: Some(PeggedPricing { usd_peg_value: 1.0 }),
    }
}

fn pool_request(chain_id: u64) -> PoolGenerateRequest {
    PoolGenerateRequest {
        pool_address: addr(0x10),
        chain_id,
        from_block: Some(17_000_000),
        to_block: None,
        finality: 75,
        flush_interval_hours: 48,
        token0_manual_pricing: None,
        token1_manual_pricing: None,
    }
}

#[test_log::test(tokio::test)]
async fn erc20_with_explicit_from_block_and_peg() {
    let h = harness(StubReader::default(), StubExplorer::default(), StubCatalog::default());

    let outcome = h.assembler.generate_erc20(erc20_request()).await;
    let generated = match outcome {
        GenerateOutcome::Success(g) => g,
        other => panic!("expected success, got {other:?}"),
    };

    let value = serde_json::to_value(&generated.config).unwrap();
    assert_eq!(value["range"]["fromBlock"], 100);
    assert_eq!(
        value["adapterConfig"]["config"]["token"][0]["pricing"]["kind"],
        "pegged"
    );
    assert_eq!(
        value["adapterConfig"]["config"]["token"][0]["pricing"]["usdPegValue"],
        1.0
    );
    assert_eq!(generated.tokens.len(), 1);
    assert_eq!(generated.tokens[0].pricing_type, "pegged");

    // A user-supplied fromBlock and a manual peg leave nothing for the
    // explorer or the catalog to do.
    assert_eq!(h.explorer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.catalog.calls.load(Ordering::SeqCst), 0);
}

#[test_log::test(tokio::test)]
async fn identical_requests_encode_identically() {
    let h = harness(StubReader::default(), StubExplorer::default(), StubCatalog::default());

    let a = match h.assembler.generate_erc20(erc20_request()).await {
        GenerateOutcome::Success(g) => g,
        other => panic!("expected success, got {other:?}"),
    };
    let b = match h.assembler.generate_erc20(erc20_request()).await {
        GenerateOutcome::Success(g) => g,
        other => panic!("expected success, got {other:?}"),
    };
    assert_eq!(a.base64, b.base64);

    // The transport encoding is the pretty document plus a trailing newline.
    let decoded = String::from_utf8(BASE64.decode(&a.base64).unwrap()).unwrap();
    assert!(decoded.ends_with('\n'));
    let reparsed: serde_json::Value = serde_json::from_str(&decoded).unwrap();
    assert_eq!(reparsed, serde_json::to_value(&a.config).unwrap());
    assert_eq!(encode_config(&a.config).unwrap(), a.base64);
}

#[test_log::test(tokio::test)]
async fn univ2_one_unpriced_leg_requires_manual_input() {
    let mut catalog = StubCatalog::default();
    // token0 is listed, token1 is not.
    catalog.by_contract.insert(addr(1), entry("usd-coin"));

    let reader = StubReader {
        pair: Some(TokenPair {
            token0: addr(1),
            token1: addr(2),
        }),
        ..Default::default()
    };
    let h = harness(reader, StubExplorer::default(), catalog);

    let outcome = h.assembler.generate_univ2(pool_request(1)).await;
    match outcome {
        GenerateOutcome::ManualInputRequired { missing_tokens, .. } => {
            assert_eq!(missing_tokens.len(), 1);
            assert_eq!(missing_tokens[0].field, "token1ManualPricing");
            assert_eq!(
                missing_tokens[0].address,
                format!("{:?}", addr(2))
            );
        }
        other => panic!("expected manual input required, got {other:?}"),
    }
}

#[test_log::test(tokio::test)]
async fn univ2_success_emits_both_swap_legs_and_lp_nav() {
    let mut catalog = StubCatalog::default();
    catalog.by_contract.insert(addr(1), entry("usd-coin"));
    catalog.by_contract.insert(addr(2), entry("weth"));

    let reader = StubReader {
        pair: Some(TokenPair {
            token0: addr(1),
            token1: addr(2),
        }),
        ..Default::default()
    };
    let h = harness(reader, StubExplorer::default(), catalog);

    let generated = match h.assembler.generate_univ2(pool_request(1)).await {
        GenerateOutcome::Success(g) => g,
        other => panic!("expected success, got {other:?}"),
    };

    let value = serde_json::to_value(&generated.config).unwrap();
    let config = &value["adapterConfig"]["config"];
    assert_eq!(config["swap"].as_array().unwrap().len(), 2);
    assert_eq!(
        config["swap"][0]["assetSelectors"]["swapLegAddress"],
        format!("{:?}", addr(1))
    );
    assert_eq!(
        config["swap"][1]["assetSelectors"]["swapLegAddress"],
        format!("{:?}", addr(2))
    );
    assert_eq!(config["lp"][0]["pricing"]["kind"], "univ2nav");
    assert_eq!(config["lp"][0]["pricing"]["token0"]["id"], "usd-coin");
    assert_eq!(config["lp"][0]["pricing"]["token1"]["id"], "weth");
    // V2 swap entries carry no V3 deployment parameters.
    assert!(config["swap"][0]["params"].get("factoryAddress").is_none());
}

#[test_log::test(tokio::test)]
async fn univ3_unknown_chain_rejected_without_upstream_calls() {
    let h = harness(StubReader::default(), StubExplorer::default(), StubCatalog::default());

    let outcome = h.assembler.generate_univ3(pool_request(999_999)).await;
    match outcome {
        GenerateOutcome::Rejected { message, error, .. } => {
            assert!(message.contains("999999"));
            assert_eq!(error, "Unsupported chain");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(h.reader.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.explorer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.catalog.calls.load(Ordering::SeqCst), 0);
}

#[test_log::test(tokio::test)]
async fn univ3_success_includes_factory_and_position_manager() {
    let mut catalog = StubCatalog::default();
    catalog.by_contract.insert(addr(1), entry("usd-coin"));
    catalog.by_contract.insert(addr(2), entry("weth"));

    let reader = StubReader {
        pair: Some(TokenPair {
            token0: addr(1),
            token1: addr(2),
        }),
        ..Default::default()
    };
    let h = harness(reader, StubExplorer::default(), catalog);

    let generated = match h.assembler.generate_univ3(pool_request(1)).await {
        GenerateOutcome::Success(g) => g,
        other => panic!("expected success, got {other:?}"),
    };

    let value = serde_json::to_value(&generated.config).unwrap();
    let config = &value["adapterConfig"]["config"];
    assert_eq!(
        config["swap"][0]["params"]["factoryAddress"],
        "0x1F98431c8aD98523631AE4a59f267346ea31F984"
    );
    assert_eq!(
        config["swap"][0]["params"]["nonFungiblePositionManagerAddress"],
        "0xC36442b4a4522E871399CD717aBDD847Ab11FE88"
    );
    assert!(config.get("lp").is_none());
}

#[test_log::test(tokio::test)]
async fn missing_from_block_resolved_from_explorer() {
    let explorer = StubExplorer {
        creation_block: Some(18_500_000),
        ..Default::default()
    };
    let h = harness(StubReader::default(), explorer, StubCatalog::default());

    let mut req = erc20_request();
    req.from_block = None;
    let generated = match h.assembler.generate_erc20(req).await {
        GenerateOutcome::Success(g) => g,
        other => panic!("expected success, got {other:?}"),
    };

    let value = serde_json::to_value(&generated.config).unwrap();
    assert_eq!(value["range"]["fromBlock"], 18_500_000);
    assert_eq!(h.explorer.calls.load(Ordering::SeqCst), 1);
}

#[test_log::test(tokio::test)]
async fn creation_block_beyond_to_block_is_discarded() {
    let explorer = StubExplorer {
        creation_block: Some(18_500_000),
        ..Default::default()
    };
    let h = harness(StubReader::default(), explorer, StubCatalog::default());

    let mut req = erc20_request();
    req.from_block = None;
    req.to_block = Some(100);
    let generated = match h.assembler.generate_erc20(req).await {
        GenerateOutcome::Success(g) => g,
        other => panic!("expected success, got {other:?}"),
    };

    // The resolved creation block would invert the range, so it is dropped
    // and the caller is told to supply fromBlock.
    let value = serde_json::to_value(&generated.config).unwrap();
    assert!(value["range"].get("fromBlock").is_none());
    assert_eq!(value["range"]["toBlock"], 100);
    assert!(generated
        .warnings
        .iter()
        .any(|w| w.contains("beyond toBlock")));
    assert!(generated.warnings.iter().any(|w| w.starts_with("CRITICAL")));
}

#[test_log::test(tokio::test)]
async fn denylisted_chain_skips_explorer_and_warns() {
    let explorer = StubExplorer {
        creation_block: Some(18_500_000),
        ..Default::default()
    };
    let h = harness(StubReader::default(), explorer, StubCatalog::default());

    let mut req = erc20_request();
    // BSC requires manual fromBlock input.
    req.chain_id = 56;
    req.from_block = None;
    let generated = match h.assembler.generate_erc20(req).await {
        GenerateOutcome::Success(g) => g,
        other => panic!("expected success, got {other:?}"),
    };

    assert_eq!(h.explorer.calls.load(Ordering::SeqCst), 0);
    let value = serde_json::to_value(&generated.config).unwrap();
    assert!(value["range"].get("fromBlock").is_none());
    assert!(generated
        .warnings
        .iter()
        .any(|w| w.contains("requires manual fromBlock")));
    assert!(generated.warnings.iter().any(|w| w.starts_with("CRITICAL")));
}

#[test_log::test(tokio::test)]
async fn invalid_pool_rejected_with_suggestion() {
    let h = harness(StubReader::default(), StubExplorer::default(), StubCatalog::default());

    let outcome = h.assembler.generate_univ2(pool_request(1)).await;
    match outcome {
        GenerateOutcome::Rejected {
            error, suggestion, ..
        } => {
            assert_eq!(error, "Invalid pool contract");
            assert!(suggestion.unwrap().contains("Uniswap V2"));
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[test_log::test(tokio::test)]
async fn catalog_id_flows_into_token_summary() {
    let mut catalog = StubCatalog::default();
    catalog.by_contract.insert(addr(0xAA), entry("usd-coin"));
    let h = harness(StubReader::default(), StubExplorer::default(), catalog);

    let mut req = erc20_request();
    req.manual_pricing = None;
    let generated = match h.assembler.generate_erc20(req).await {
        GenerateOutcome::Success(g) => g,
        other => panic!("expected success, got {other:?}"),
    };

    assert_eq!(generated.tokens[0].pricing_type, "coingecko");
    assert_eq!(generated.tokens[0].coingecko_id.as_deref(), Some("usd-coin"));
    let value = serde_json::to_value(&generated.config).unwrap();
    assert_eq!(
        value["adapterConfig"]["config"]["token"][0]["pricing"],
        serde_json::to_value(PricingSpec::Coingecko {
            id: "usd-coin".to_string()
        })
        .unwrap()
    );
}
