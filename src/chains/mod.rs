//! Supported chains and the per-chain service endpoints the wizard needs.
//!
//! Everything here is static data: gateway URLs for the indexing archive,
//! Infura-format RPC bases, CoinGecko platform slugs, and the Uniswap V3
//! factory/position-manager deployments. Absence of an entry means the
//! operation is unsupported for that chain, which callers surface as a
//! warning or validation error rather than a fault.

/// Uniswap V3 deployment addresses for one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Univ3Addresses {
    pub factory: &'static str,
    pub position_manager: &'static str,
}

/// Immutable per-chain record.
#[derive(Debug, Clone, Copy)]
pub struct ChainDescriptor {
    pub chain_id: u64,
    pub name: &'static str,
    pub gateway_url: &'static str,
    pub rpc_base_url: &'static str,
    /// CoinGecko platform slug; not every chain is listed there.
    pub coingecko_platform: Option<&'static str>,
    pub univ3: Option<Univ3Addresses>,
}

static CHAINS: &[ChainDescriptor] = &[
    ChainDescriptor {
        chain_id: 1,
        name: "Ethereum",
        gateway_url: "https://v2.archive.subsquid.io/network/ethereum-mainnet",
        rpc_base_url: "https://mainnet.infura.io/v3",
        coingecko_platform: Some("ethereum"),
        univ3: Some(Univ3Addresses {
            factory: "0x1F98431c8aD98523631AE4a59f267346ea31F984",
            position_manager: "0xC36442b4a4522E871399CD717aBDD847Ab11FE88",
        }),
    },
    ChainDescriptor {
        chain_id: 10,
        name: "Optimism",
        gateway_url: "https://v2.archive.subsquid.io/network/optimism-mainnet",
        rpc_base_url: "https://optimism-mainnet.infura.io/v3",
        coingecko_platform: Some("optimistic-ethereum"),
        univ3: Some(Univ3Addresses {
            factory: "0x1F98431c8aD98523631AE4a59f267346ea31F984",
            position_manager: "0xC36442b4a4522E871399CD717aBDD847Ab11FE88",
        }),
    },
    ChainDescriptor {
        chain_id: 56,
        name: "BSC",
        gateway_url: "https://v2.archive.subsquid.io/network/binance-mainnet",
        rpc_base_url: "https://bsc-mainnet.infura.io/v3",
        coingecko_platform: Some("binance-smart-chain"),
        univ3: Some(Univ3Addresses {
            factory: "0xdB1d10011AD0Ff90774D0C6Bb92e5C5c8b4461F7",
            position_manager: "0x7b8A01B39D58278b5DE7e48c8449c9f4F5170613",
        }),
    },
    ChainDescriptor {
        chain_id: 137,
        name: "Polygon",
        gateway_url: "https://v2.archive.subsquid.io/network/polygon-mainnet",
        rpc_base_url: "https://polygon-mainnet.infura.io/v3",
        coingecko_platform: Some("polygon-pos"),
        univ3: Some(Univ3Addresses {
            factory: "0x1F98431c8aD98523631AE4a59f267346ea31F984",
            position_manager: "0xC36442b4a4522E871399CD717aBDD847Ab11FE88",
        }),
    },
    ChainDescriptor {
        chain_id: 143,
        name: "Monad",
        gateway_url: "https://v2.archive.subsquid.io/network/monad-mainnet",
        rpc_base_url: "https://monad-mainnet.infura.io/v3",
        coingecko_platform: Some("monad"),
        univ3: Some(Univ3Addresses {
            factory: "0x204faca1764b154221e35c0d20abb3c525710498",
            position_manager: "0x7197e214c0b767cfb76fb734ab638e2c192f4e53",
        }),
    },
    ChainDescriptor {
        chain_id: 8453,
        name: "Base",
        gateway_url: "https://v2.archive.subsquid.io/network/base-mainnet",
        rpc_base_url: "https://base-mainnet.infura.io/v3",
        coingecko_platform: Some("base"),
        univ3: Some(Univ3Addresses {
            factory: "0x33128a8fC17869897dcE68Ed026d694621f6FDfD",
            position_manager: "0x03a520b32C04BF3bEEf7BEb72E919cf822Ed34f1",
        }),
    },
    ChainDescriptor {
        chain_id: 42161,
        name: "Arbitrum",
        gateway_url: "https://v2.archive.subsquid.io/network/arbitrum-one",
        rpc_base_url: "https://arbitrum-mainnet.infura.io/v3",
        coingecko_platform: Some("arbitrum-one"),
        univ3: Some(Univ3Addresses {
            factory: "0x1F98431c8aD98523631AE4a59f267346ea31F984",
            position_manager: "0xC36442b4a4522E871399CD717aBDD847Ab11FE88",
        }),
    },
    ChainDescriptor {
        chain_id: 43111,
        name: "Hemi",
        gateway_url: "https://v2.archive.subsquid.io/network/hemi-mainnet",
        rpc_base_url: "https://hemi-mainnet.infura.io/v3",
        coingecko_platform: Some("hemi"),
        univ3: Some(Univ3Addresses {
            factory: "0xCdBCd51a5E8728E0AF4895ce5771b7d17fF71959",
            position_manager: "0xe43ca1dee3f0fc1e2df73a0745674545f11a59f5",
        }),
    },
    ChainDescriptor {
        chain_id: 43114,
        name: "Avalanche",
        gateway_url: "https://v2.archive.subsquid.io/network/avalanche-mainnet",
        rpc_base_url: "https://avalanche-mainnet.infura.io/v3",
        coingecko_platform: Some("avalanche"),
        univ3: Some(Univ3Addresses {
            factory: "0x740b1c1de25031C31FF4fC9A62f554A55cdC1baD",
            position_manager: "0x655C406EBFa14EE2006250925e54ec43AD184f8B",
        }),
    },
];

/// Chains not covered by the Etherscan V2 free tier; fromBlock must come
/// from the user, the explorer is never queried for them.
pub const MANUAL_FROM_BLOCK_CHAINS: &[u64] = &[
    43114,    // Avalanche C-Chain
    43113,    // Avalanche Fuji
    8453,     // Base
    84532,    // Base Sepolia
    56,       // BNB Smart Chain
    97,       // BNB testnet
    10,       // OP Mainnet
    11155420, // OP Sepolia
    43111,    // Hemi
];

pub fn lookup(chain_id: u64) -> Option<&'static ChainDescriptor> {
    CHAINS.iter().find(|c| c.chain_id == chain_id)
}

pub fn requires_manual_from_block(chain_id: u64) -> bool {
    MANUAL_FROM_BLOCK_CHAINS.contains(&chain_id)
}

/// Full RPC endpoint for a chain, Infura URL format.
pub fn rpc_url_for(chain_id: u64, api_key: &str) -> Option<String> {
    lookup(chain_id).map(|c| format!("{}/{}", c.rpc_base_url, api_key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_known_and_unknown() {
        assert_eq!(lookup(1).unwrap().name, "Ethereum");
        assert!(lookup(1).unwrap().univ3.is_some());
        assert!(lookup(999_999).is_none());
    }

    #[test]
    fn denylist_members() {
        assert!(requires_manual_from_block(8453));
        assert!(requires_manual_from_block(43111));
        assert!(!requires_manual_from_block(1));
        assert!(!requires_manual_from_block(137));
    }

    #[test]
    fn rpc_url_joins_key() {
        assert_eq!(
            rpc_url_for(1, "abc").unwrap(),
            "https://mainnet.infura.io/v3/abc"
        );
        assert!(rpc_url_for(999_999, "abc").is_none());
    }
}
