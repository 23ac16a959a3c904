//! Inbound JSON HTTP API consumed by the wizard UI.
//!
//! Request bodies are schema-validated before the pipeline runs; validation
//! failure returns a 400 with itemized field errors. Pipeline outcomes map
//! to the structured response shapes, and a final rejection handler keeps
//! raw errors from ever escaping the HTTP boundary.

use crate::assembler::{
    addr_hex, Assembler, Erc20GenerateRequest, GenerateOutcome, GeneratedConfig, MissingToken,
    PeggedPricing, PoolGenerateRequest, TokenSummary,
};
use crate::assembler::types::AdapterConfig;
use crate::classify::Classifier;
use crate::config::AppConfig;
use crate::deploy::RailwayDispatcher;
use crate::pricing::PriceResolver;
use crate::rpc::ChainReader;
use ethers::types::Address;
use log::error;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use validator::Validate;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

const DEFAULT_FINALITY: u32 = 75;
const DEFAULT_ERC20_FLUSH_HOURS: u32 = 1;
const DEFAULT_POOL_FLUSH_HOURS: u32 = 48;
const MAX_BODY_BYTES: u64 = 64 * 1024;

/// Shared handles every handler needs.
#[derive(Clone)]
pub struct ApiContext {
    pub config: Arc<AppConfig>,
    pub assembler: Arc<Assembler>,
    pub reader: Arc<dyn ChainReader>,
    pub pricing: Arc<PriceResolver>,
    pub dispatcher: Option<Arc<RailwayDispatcher>>,
    pub classifier: Option<Arc<Classifier>>,
}

// ---------------------------------------------------------------------------
// Request schemas
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(tag = "kind")]
pub enum ManualPricingRequest {
    #[serde(rename = "pegged")]
    Pegged {
        #[serde(rename = "usdPegValue")]
        usd_peg_value: f64,
    },
}

impl ManualPricingRequest {
    fn peg(self) -> PeggedPricing {
        let ManualPricingRequest::Pegged { usd_peg_value } = self;
        PeggedPricing { usd_peg_value }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Erc20ConfigRequest {
    #[validate(custom = "validate_evm_address")]
    pub token_contract_address: String,
    #[validate(range(min = 1))]
    pub chain_id: u64,
    pub from_block: Option<u64>,
    pub to_block: Option<u64>,
    #[validate(range(min = 1))]
    pub finality: Option<u32>,
    #[validate(range(min = 1))]
    pub flush_interval_hours: Option<u32>,
    pub manual_pricing: Option<ManualPricingRequest>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PoolConfigRequest {
    #[validate(custom = "validate_evm_address")]
    pub pool_address: String,
    #[validate(range(min = 1))]
    pub chain_id: u64,
    pub from_block: Option<u64>,
    pub to_block: Option<u64>,
    #[validate(range(min = 1))]
    pub finality: Option<u32>,
    #[validate(range(min = 1))]
    pub flush_interval_hours: Option<u32>,
    pub token0_manual_pricing: Option<ManualPricingRequest>,
    pub token1_manual_pricing: Option<ManualPricingRequest>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PoolTokensRequest {
    #[validate(custom = "validate_evm_address")]
    pub pool_address: String,
    #[validate(range(min = 1))]
    pub chain_id: u64,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CoingeckoIdRequest {
    #[validate(custom = "validate_evm_address")]
    pub token_address: String,
    #[validate(range(min = 1))]
    pub chain_id: u64,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DeployRequest {
    #[validate(length(min = 1))]
    pub config_base64: String,
    #[validate(range(min = 1))]
    pub chain_id: u64,
    pub template_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ClassifyRequest {
    #[validate(length(min = 1))]
    pub prompt: String,
}

fn validate_evm_address(value: &str) -> Result<(), validator::ValidationError> {
    let hex = value.strip_prefix("0x");
    match hex {
        Some(h) if h.len() == 40 && h.chars().all(|c| c.is_ascii_hexdigit()) => Ok(()),
        _ => Err(validator::ValidationError::new(
            "must be a valid Ethereum address",
        )),
    }
}

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidationBody {
    success: bool,
    message: String,
    error: Vec<FieldIssue>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SuccessBody {
    success: bool,
    config: AdapterConfig,
    base64: String,
    tokens: Vec<TokenSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ManualInputBody {
    success: bool,
    requires_manual_input: bool,
    missing_tokens: Vec<MissingToken>,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RejectedBody {
    success: bool,
    message: String,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    suggestion: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimpleFailureBody {
    success: bool,
    message: String,
}

fn json_with_status<T: Serialize>(body: &T, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::json(body), status).into_response()
}

fn invalid_payload(issues: Vec<FieldIssue>) -> Response {
    json_with_status(
        &ValidationBody {
            success: false,
            message: "Invalid request payload".to_string(),
            error: issues,
        },
        StatusCode::BAD_REQUEST,
    )
}

fn field_issues(errors: &validator::ValidationErrors) -> Vec<FieldIssue> {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(|e| FieldIssue {
                field: field.to_string(),
                message: e.code.to_string(),
            })
        })
        .collect()
}

/// Checks shared by every generate request: schema validation plus the
/// cross-field range and pricing constraints the derive cannot express.
fn generate_request_issues<T: Validate>(
    req: &T,
    from_block: Option<u64>,
    to_block: Option<u64>,
    pegs: &[(&str, Option<ManualPricingRequest>)],
) -> Vec<FieldIssue> {
    let mut issues = match req.validate() {
        Ok(()) => Vec::new(),
        Err(e) => field_issues(&e),
    };
    if let (Some(from), Some(to)) = (from_block, to_block) {
        if from > to {
            issues.push(FieldIssue {
                field: "fromBlock".to_string(),
                message: "fromBlock must not exceed toBlock".to_string(),
            });
        }
    }
    for (field, peg) in pegs {
        if let Some(ManualPricingRequest::Pegged { usd_peg_value }) = peg {
            if !usd_peg_value.is_finite() || *usd_peg_value < 0.0 {
                issues.push(FieldIssue {
                    field: field.to_string(),
                    message: "USD peg value must be non-negative".to_string(),
                });
            }
        }
    }
    issues
}

fn parse_address(value: &str) -> Result<Address, Response> {
    value.parse::<Address>().map_err(|_| {
        invalid_payload(vec![FieldIssue {
            field: "address".to_string(),
            message: "must be a valid Ethereum address".to_string(),
        }])
    })
}

fn outcome_reply(outcome: GenerateOutcome) -> Response {
    match outcome {
        GenerateOutcome::Success(GeneratedConfig {
            config,
            base64,
            tokens,
            warnings,
            errors,
        }) => json_with_status(
            &SuccessBody {
                success: true,
                config,
                base64,
                tokens,
                warnings,
                errors,
            },
            StatusCode::OK,
        ),
        GenerateOutcome::ManualInputRequired {
            missing_tokens,
            message,
            warnings,
        } => json_with_status(
            &ManualInputBody {
                success: false,
                requires_manual_input: true,
                missing_tokens,
                message,
                warnings,
            },
            StatusCode::OK,
        ),
        GenerateOutcome::Rejected {
            message,
            error,
            suggestion,
            warnings,
            errors,
        } => json_with_status(
            &RejectedBody {
                success: false,
                message,
                error,
                suggestion,
                warnings,
                errors,
            },
            StatusCode::BAD_REQUEST,
        ),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn handle_generate_erc20(
    req: Erc20ConfigRequest,
    ctx: ApiContext,
) -> Result<Response, Infallible> {
    let issues = generate_request_issues(
        &req,
        req.from_block,
        req.to_block,
        &[("manualPricing", req.manual_pricing)],
    );
    if !issues.is_empty() {
        return Ok(invalid_payload(issues));
    }
    let token_contract_address = match parse_address(&req.token_contract_address) {
        Ok(a) => a,
        Err(resp) => return Ok(resp),
    };

    let outcome = ctx
        .assembler
        .generate_erc20(Erc20GenerateRequest {
            token_contract_address,
            chain_id: req.chain_id,
            from_block: req.from_block,
            to_block: req.to_block,
            finality: req.finality.unwrap_or(DEFAULT_FINALITY),
            flush_interval_hours: req.flush_interval_hours.unwrap_or(DEFAULT_ERC20_FLUSH_HOURS),
            manual_pricing: req.manual_pricing.map(ManualPricingRequest::peg),
        })
        .await;
    Ok(outcome_reply(outcome))
}

fn pool_request(
    req: &PoolConfigRequest,
    pool_address: Address,
) -> PoolGenerateRequest {
    PoolGenerateRequest {
        pool_address,
        chain_id: req.chain_id,
        from_block: req.from_block,
        to_block: req.to_block,
        finality: req.finality.unwrap_or(DEFAULT_FINALITY),
        flush_interval_hours: req.flush_interval_hours.unwrap_or(DEFAULT_POOL_FLUSH_HOURS),
        token0_manual_pricing: req.token0_manual_pricing.map(ManualPricingRequest::peg),
        token1_manual_pricing: req.token1_manual_pricing.map(ManualPricingRequest::peg),
    }
}

async fn handle_generate_pool(
    req: PoolConfigRequest,
    ctx: ApiContext,
    v3: bool,
) -> Result<Response, Infallible> {
    let issues = generate_request_issues(
        &req,
        req.from_block,
        req.to_block,
        &[
            ("token0ManualPricing", req.token0_manual_pricing),
            ("token1ManualPricing", req.token1_manual_pricing),
        ],
    );
    if !issues.is_empty() {
        return Ok(invalid_payload(issues));
    }
    let pool_address = match parse_address(&req.pool_address) {
        Ok(a) => a,
        Err(resp) => return Ok(resp),
    };

    let generate = pool_request(&req, pool_address);
    let outcome = if v3 {
        ctx.assembler.generate_univ3(generate).await
    } else {
        ctx.assembler.generate_univ2(generate).await
    };
    Ok(outcome_reply(outcome))
}

async fn handle_pool_tokens(
    req: PoolTokensRequest,
    ctx: ApiContext,
) -> Result<Response, Infallible> {
    if let Err(e) = req.validate() {
        return Ok(invalid_payload(field_issues(&e)));
    }
    let pool = match parse_address(&req.pool_address) {
        Ok(a) => a,
        Err(resp) => return Ok(resp),
    };

    match ctx.reader.token_pair(req.chain_id, pool).await {
        Ok(pair) => Ok(json_with_status(
            &serde_json::json!({
                "success": true,
                "token0": addr_hex(&pair.token0),
                "token1": addr_hex(&pair.token1),
            }),
            StatusCode::OK,
        )),
        Err(e) => Ok(json_with_status(
            &SimpleFailureBody {
                success: false,
                message: e.to_string(),
            },
            StatusCode::BAD_REQUEST,
        )),
    }
}

async fn handle_coingecko_id(
    req: CoingeckoIdRequest,
    ctx: ApiContext,
) -> Result<Response, Infallible> {
    if let Err(e) = req.validate() {
        return Ok(invalid_payload(field_issues(&e)));
    }
    let token = match parse_address(&req.token_address) {
        Ok(a) => a,
        Err(resp) => return Ok(resp),
    };

    match ctx.pricing.catalog_entry(token, req.chain_id).await {
        Some(crate::pricing::CoinEntry {
            id: Some(raw),
            name,
            symbol,
        }) => {
            let base = ctx.pricing.base_id(&raw).await;
            Ok(json_with_status(
                &serde_json::json!({
                    "success": true,
                    "id": base,
                    "name": name,
                    "symbol": symbol,
                }),
                StatusCode::OK,
            ))
        }
        _ => Ok(json_with_status(
            &SimpleFailureBody {
                success: false,
                message: format!(
                    "CoinGecko ID not found for {} on chain {}",
                    req.token_address, req.chain_id
                ),
            },
            StatusCode::OK,
        )),
    }
}

async fn handle_deploy(req: DeployRequest, ctx: ApiContext) -> Result<Response, Infallible> {
    if let Err(e) = req.validate() {
        return Ok(invalid_payload(field_issues(&e)));
    }
    let dispatcher = match &ctx.dispatcher {
        Some(d) => d,
        None => {
            return Ok(json_with_status(
                &RejectedBody {
                    success: false,
                    message: "Railway deployment is disabled. Set ENABLE_RAILWAY_DEPLOYMENT=true in your environment variables to enable this feature.".to_string(),
                    error: "Feature disabled".to_string(),
                    suggestion: None,
                    warnings: Vec::new(),
                    errors: Vec::new(),
                },
                StatusCode::FORBIDDEN,
            ));
        }
    };

    match dispatcher
        .deploy(&req.config_base64, req.chain_id, req.template_id)
        .await
    {
        Ok(receipt) => Ok(json_with_status(
            &serde_json::json!({
                "success": true,
                "projectId": receipt.project_id,
                "workflowId": receipt.workflow_id,
                "projectUrl": receipt.project_url,
                "message": format!(
                    "Successfully deployed to Railway. Project ID: {}",
                    receipt.project_id.as_deref().unwrap_or("<unknown>")
                ),
            }),
            StatusCode::OK,
        )),
        Err(e) => Ok(json_with_status(
            &SimpleFailureBody {
                success: false,
                message: e.to_string(),
            },
            StatusCode::BAD_GATEWAY,
        )),
    }
}

async fn handle_classify(req: ClassifyRequest, ctx: ApiContext) -> Result<Response, Infallible> {
    if let Err(e) = req.validate() {
        return Ok(invalid_payload(field_issues(&e)));
    }
    let classifier = match &ctx.classifier {
        Some(c) => c,
        None => {
            return Ok(json_with_status(
                &SimpleFailureBody {
                    success: false,
                    message: crate::errors::WizardError::ClassifierDisabled.to_string(),
                },
                StatusCode::FORBIDDEN,
            ));
        }
    };

    match classifier.classify(&req.prompt).await {
        Ok(adapter) => Ok(json_with_status(
            &serde_json::json!({"adapter": adapter}),
            StatusCode::OK,
        )),
        Err(e) => {
            error!("classification error: {e}");
            Ok(json_with_status(
                &SimpleFailureBody {
                    success: false,
                    message: e.to_string(),
                },
                StatusCode::BAD_GATEWAY,
            ))
        }
    }
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

fn with_ctx(
    ctx: ApiContext,
) -> impl Filter<Extract = (ApiContext,), Error = Infallible> + Clone {
    warp::any().map(move || ctx.clone())
}

fn json_body<T: serde::de::DeserializeOwned + Send>(
) -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

pub fn routes(
    ctx: ApiContext,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let health = warp::path!("health").and(warp::get()).map(|| {
        warp::reply::json(&serde_json::json!({
            "status": "ok",
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }))
    });

    let railway_enabled = {
        let enabled = ctx.config.railway_enabled();
        warp::path!("api" / "railway-enabled")
            .and(warp::get())
            .map(move || warp::reply::json(&serde_json::json!({ "enabled": enabled })))
    };

    let erc20 = warp::path!("api" / "generate-erc20-config")
        .and(warp::post())
        .and(json_body())
        .and(with_ctx(ctx.clone()))
        .and_then(handle_generate_erc20);

    let univ2 = warp::path!("api" / "generate-univ2-config")
        .and(warp::post())
        .and(json_body())
        .and(with_ctx(ctx.clone()))
        .and_then(|req: PoolConfigRequest, ctx: ApiContext| handle_generate_pool(req, ctx, false));

    let univ3 = warp::path!("api" / "generate-univ3-config")
        .and(warp::post())
        .and(json_body())
        .and(with_ctx(ctx.clone()))
        .and_then(|req: PoolConfigRequest, ctx: ApiContext| handle_generate_pool(req, ctx, true));

    let pool_tokens = warp::path!("api" / "pool-tokens")
        .and(warp::post())
        .and(json_body())
        .and(with_ctx(ctx.clone()))
        .and_then(handle_pool_tokens);

    let coingecko_id = warp::path!("api" / "coingecko-id")
        .and(warp::post())
        .and(json_body())
        .and(with_ctx(ctx.clone()))
        .and_then(handle_coingecko_id);

    let deploy = warp::path!("api" / "deploy-railway")
        .and(warp::post())
        .and(json_body())
        .and(with_ctx(ctx.clone()))
        .and_then(handle_deploy);

    let classify = warp::path!("api" / "classify")
        .and(warp::post())
        .and(json_body())
        .and(with_ctx(ctx))
        .and_then(handle_classify);

    health
        .or(railway_enabled)
        .or(erc20)
        .or(univ2)
        .or(univ3)
        .or(pool_tokens)
        .or(coingecko_id)
        .or(deploy)
        .or(classify)
        .recover(handle_rejection)
}

/// Last line of defense: no raw error ever reaches the client unwrapped.
async fn handle_rejection(rejection: Rejection) -> Result<Response, Infallible> {
    if rejection.is_not_found() {
        return Ok(json_with_status(
            &SimpleFailureBody {
                success: false,
                message: "Not found".to_string(),
            },
            StatusCode::NOT_FOUND,
        ));
    }
    if let Some(e) = rejection.find::<warp::filters::body::BodyDeserializeError>() {
        return Ok(invalid_payload(vec![FieldIssue {
            field: "body".to_string(),
            message: e.to_string(),
        }]));
    }
    if rejection
        .find::<warp::reject::MethodNotAllowed>()
        .is_some()
    {
        return Ok(json_with_status(
            &SimpleFailureBody {
                success: false,
                message: "Method not allowed".to_string(),
            },
            StatusCode::METHOD_NOT_ALLOWED,
        ));
    }

    error!("unhandled rejection: {rejection:?}");
    Ok(json_with_status(
        &SimpleFailureBody {
            success: false,
            message: "Internal server error".to_string(),
        },
        StatusCode::INTERNAL_SERVER_ERROR,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_validation() {
        assert!(validate_evm_address("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48").is_ok());
        assert!(validate_evm_address("0x123").is_err());
        assert!(validate_evm_address("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48").is_err());
        assert!(validate_evm_address("0xZZb86991c6218b36c1d19D4a2e9Eb0cE3606eB48").is_err());
    }

    #[test]
    fn cross_field_range_check() {
        let req: Erc20ConfigRequest = serde_json::from_str(
            r#"{
                "tokenContractAddress": "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
                "chainId": 1,
                "fromBlock": 200,
                "toBlock": 100
            }"#,
        )
        .unwrap();
        let issues =
            generate_request_issues(&req, req.from_block, req.to_block, &[]);
        assert!(issues.iter().any(|i| i.field == "fromBlock"));
    }

    #[test]
    fn negative_peg_rejected() {
        let req: Erc20ConfigRequest = serde_json::from_str(
            r#"{
                "tokenContractAddress": "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
                "chainId": 1,
                "manualPricing": {"kind": "pegged", "usdPegValue": -1.0}
            }"#,
        )
        .unwrap();
        let issues = generate_request_issues(
            &req,
            req.from_block,
            req.to_block,
            &[("manualPricing", req.manual_pricing)],
        );
        assert!(issues.iter().any(|i| i.field == "manualPricing"));
    }

    #[test]
    fn manual_pricing_requires_pegged_kind() {
        assert!(serde_json::from_str::<ManualPricingRequest>(
            r#"{"kind": "coingecko", "id": "usd-coin"}"#
        )
        .is_err());
    }
}
