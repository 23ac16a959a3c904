use ethers::types::Address;
use thiserror::Error;

/// Failures reading a pool contract. `InvalidPool` and `NotAContract` are
/// user-facing validation problems; `Provider` is infrastructure.
#[derive(Error, Debug)]
pub enum PoolReadError {
    #[error("Contract does not exist at {address:?} on chain {chain_id}. This address may be an EOA (Externally Owned Account) or the contract may be on a different chain.")]
    NotAContract { address: Address, chain_id: u64 },
    #[error("Contract exists but does not appear to be a valid pool: {0}")]
    InvalidPool(String),
    #[error("Provider error: {0}")]
    Provider(String),
}

#[derive(Error, Debug)]
pub enum WizardError {
    #[error("Unsupported chain ID: {0}")]
    UnsupportedChain(u64),
    #[error("Railway deployment is disabled. Set ENABLE_RAILWAY_DEPLOYMENT=true to enable this feature.")]
    DeploymentDisabled,
    #[error("Deployment rejected: {0}")]
    DeployRejected(String),
    #[error("Classifier is not configured (missing AI API key)")]
    ClassifierDisabled,
    #[error("Upstream returned an unusable response: {0}")]
    BadUpstreamResponse(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
