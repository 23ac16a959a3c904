//! Read-only chain access: contract existence checks and pool token reads.

use crate::chains;
use crate::errors::PoolReadError;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ethers::contract::abigen;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::Address;
use log::warn;
use std::sync::Arc;

abigen!(
    IUniswapPool,
    r#"[
        function token0() external view returns (address)
        function token1() external view returns (address)
    ]"#
);

abigen!(
    IErc20Probe,
    r#"[
        function symbol() external view returns (string)
        function decimals() external view returns (uint8)
    ]"#
);

/// The two constituent token addresses of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenPair {
    pub token0: Address,
    pub token1: Address,
}

/// Seam over the EVM node so the pipeline can be exercised without RPC.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Whether the address carries code. `Err` is an infrastructure failure
    /// the caller may choose to tolerate.
    async fn is_contract(&self, chain_id: u64, address: Address) -> Result<bool>;

    /// Reads `token0()`/`token1()` from a pool contract.
    async fn token_pair(&self, chain_id: u64, pool: Address) -> Result<TokenPair, PoolReadError>;

    /// Best-effort check that a contract answers standard ERC20 reads.
    async fn erc20_probe(&self, chain_id: u64, token: Address) -> Result<bool>;
}

/// `ChainReader` backed by an ethers `Provider<Http>` built per call from
/// the chain registry. Node reads go through the shared client so the
/// configured timeout applies to them as well.
pub struct EthersChainReader {
    rpc_api_key: String,
    http: reqwest::Client,
}

impl EthersChainReader {
    pub fn new(rpc_api_key: String, http: reqwest::Client) -> Self {
        Self { rpc_api_key, http }
    }

    fn provider_for(&self, chain_id: u64) -> Result<Arc<Provider<Http>>, PoolReadError> {
        let url = chains::rpc_url_for(chain_id, &self.rpc_api_key)
            .ok_or_else(|| PoolReadError::Provider(format!("Unsupported chain ID: {chain_id}")))?;
        let url = url::Url::parse(&url).map_err(|e| PoolReadError::Provider(e.to_string()))?;
        let transport = Http::new_with_client(url, self.http.clone());
        Ok(Arc::new(Provider::new(transport)))
    }
}

#[async_trait]
impl ChainReader for EthersChainReader {
    async fn is_contract(&self, chain_id: u64, address: Address) -> Result<bool> {
        let provider = self.provider_for(chain_id).map_err(|e| anyhow!("{e}"))?;
        let code = provider.get_code(address, None).await?;
        Ok(!code.0.is_empty())
    }

    async fn token_pair(&self, chain_id: u64, pool: Address) -> Result<TokenPair, PoolReadError> {
        let provider = self.provider_for(chain_id)?;

        let code = provider
            .get_code(pool, None)
            .await
            .map_err(|e| PoolReadError::Provider(e.to_string()))?;
        if code.0.is_empty() {
            return Err(PoolReadError::NotAContract {
                address: pool,
                chain_id,
            });
        }

        let contract = IUniswapPool::new(pool, provider);
        // Independent reads, issued concurrently; a revert in either means
        // the address is not the pool interface we expect.
        let token0_call = contract.token_0();
        let token1_call = contract.token_1();
        let (token0, token1) =
            tokio::try_join!(token0_call.call(), token1_call.call()).map_err(
                |e| {
                    let msg = e.to_string();
                    if msg.contains("revert") {
                        PoolReadError::InvalidPool(
                            "the contract may be on a different chain or may not implement the expected pool interface".to_string(),
                        )
                    } else {
                        PoolReadError::InvalidPool(msg)
                    }
                },
            )?;

        if token0 == Address::zero() || token1 == Address::zero() {
            return Err(PoolReadError::InvalidPool(format!(
                "pool returned a zero token address (token0: {token0:?}, token1: {token1:?})"
            )));
        }

        Ok(TokenPair { token0, token1 })
    }

    async fn erc20_probe(&self, chain_id: u64, token: Address) -> Result<bool> {
        let provider = self.provider_for(chain_id).map_err(|e| anyhow!("{e}"))?;
        let contract = IErc20Probe::new(token, provider);
        let symbol_call = contract.symbol();
        let decimals_call = contract.decimals();
        let (symbol, decimals) = tokio::join!(symbol_call.call(), decimals_call.call());
        if symbol.is_err() && decimals.is_err() {
            warn!("contract {token:?} on chain {chain_id} answers neither symbol() nor decimals()");
            return Ok(false);
        }
        Ok(true)
    }
}
