use anyhow::Result;
use log::info;
use std::sync::Arc;

use adapter_wizard::{
    api::{self, ApiContext},
    assembler::Assembler,
    classify::Classifier,
    config::AppConfig,
    deploy::RailwayDispatcher,
    explorer::{CreationResolver, EtherscanFetch},
    pricing::{CoinGeckoCatalog, PriceResolver},
    rpc::EthersChainReader,
    utils::setup_logger,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment and logging
    dotenv::dotenv().ok();
    setup_logger()?;

    let config = Arc::new(AppConfig::from_env()?);

    // One HTTP client for every upstream; the timeout applies uniformly.
    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()?;

    let reader: Arc<dyn adapter_wizard::rpc::ChainReader> = Arc::new(EthersChainReader::new(
        config.rpc_api_key.clone(),
        http.clone(),
    ));
    let creation = CreationResolver::new(Arc::new(EtherscanFetch::new(
        http.clone(),
        config.etherscan_api_key.clone(),
    )));
    let pricing = Arc::new(PriceResolver::new(Arc::new(CoinGeckoCatalog::new(
        http.clone(),
        config.coingecko_api_key.clone(),
    ))));

    let assembler = Arc::new(Assembler::new(
        reader.clone(),
        creation,
        pricing.clone(),
    ));

    let dispatcher = config
        .railway_enabled()
        .then(|| Arc::new(RailwayDispatcher::new(http.clone(), (*config).clone())));
    let classifier = config
        .ai
        .clone()
        .map(|ai| Arc::new(Classifier::new(http.clone(), ai)));

    if dispatcher.is_some() {
        info!("Railway deployment enabled");
    } else {
        info!("Railway deployment disabled");
    }

    let ctx = ApiContext {
        config: config.clone(),
        assembler,
        reader,
        pricing,
        dispatcher,
        classifier,
    };

    let port = config.port;
    info!("adapter wizard listening on port {port}");
    warp::serve(api::routes(ctx)).run(([0, 0, 0, 0], port)).await;

    Ok(())
}
