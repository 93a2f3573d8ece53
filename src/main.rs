use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use log::info;
use serde::Deserialize;
use warp::Filter;

mod address;
mod client;
mod config;
mod derived;
mod fanout;
mod handlers;
mod sink;
mod types;

use client::{BoxError, NodeClient};
use config::{Args, ChainInfo, Config};

/// Read-only per-process context shared by every request.
pub struct App {
    pub config: Config,
    pub chain: ChainInfo,
    pub client: NodeClient,
}

#[derive(Deserialize)]
struct AddressQuery {
    #[serde(default)]
    address: String,
}

#[derive(Deserialize)]
struct ValidatorAddressQuery {
    #[serde(default)]
    validator_address: String,
}

fn plain(body: String) -> impl warp::Reply {
    warp::reply::with_header(body, "content-type", "text/plain")
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args = Args::parse();
    let config = Config::resolve(args)?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.log_level),
    )
    .init();

    info!(
        "Started with node {}, tendermint rpc {}, bech prefixes {}/{}/{}, limit {}",
        config.node_url,
        config.tendermint_rpc_url,
        config.account_prefix,
        config.validator_prefix,
        config.consensus_prefix,
        config.pagination_limit,
    );

    let client = NodeClient::new(&config)?;
    // startup failures here are fatal, per-request upstream failures are not
    let chain = ChainInfo::resolve(&config, &client).await?;
    info!(
        "Serving chain {} with denom {} (coefficient {})",
        chain.chain_id, chain.denom, chain.denom_coefficient
    );

    let listen_address: SocketAddr = config.listen_address.parse()?;
    let app = Arc::new(App {
        config,
        chain,
        client,
    });

    let with_app = {
        let app = app.clone();
        warp::any().map(move || app.clone())
    };

    let validator = warp::path!("metrics" / "validator")
        .and(warp::get())
        .and(warp::query::<AddressQuery>())
        .and(with_app.clone())
        .then(|query: AddressQuery, app: Arc<App>| async move {
            plain(handlers::validator::handle(app, query.address).await)
        });

    let validators = warp::path!("metrics" / "validators")
        .and(warp::get())
        .and(with_app.clone())
        .then(|app: Arc<App>| async move { plain(handlers::validators::handle(app).await) });

    let wallet = warp::path!("metrics" / "wallet")
        .and(warp::get())
        .and(warp::query::<AddressQuery>())
        .and(with_app.clone())
        .then(|query: AddressQuery, app: Arc<App>| async move {
            plain(handlers::wallet::handle(app, query.address).await)
        });

    let delegator = warp::path!("metrics" / "delegator")
        .and(warp::get())
        .and(warp::query::<ValidatorAddressQuery>())
        .and(with_app.clone())
        .then(|query: ValidatorAddressQuery, app: Arc<App>| async move {
            plain(handlers::delegator::handle(app, query.validator_address).await)
        });

    let params = warp::path!("metrics" / "params")
        .and(warp::get())
        .and(with_app.clone())
        .then(|app: Arc<App>| async move { plain(handlers::params::handle(app).await) });

    let general = warp::path!("metrics" / "general")
        .and(warp::get())
        .and(with_app.clone())
        .then(|app: Arc<App>| async move { plain(handlers::general::handle(app).await) });

    let upgrade = warp::path!("metrics" / "upgrade")
        .and(warp::get())
        .and(with_app.clone())
        .then(|app: Arc<App>| async move { plain(handlers::upgrade::handle(app).await) });

    let proposals = warp::path!("metrics" / "proposals")
        .and(warp::get())
        .and(with_app.clone())
        .then(|app: Arc<App>| async move { plain(handlers::proposals::handle(app).await) });

    let single = warp::path!("metrics" / "single")
        .and(warp::get())
        .and(with_app.clone())
        .then(|app: Arc<App>| async move { plain(handlers::single::handle(app).await) });

    let oracle = warp::path!("metrics" / "oracle")
        .and(warp::get())
        .and(warp::query::<AddressQuery>())
        .and(with_app.clone())
        .then(|query: AddressQuery, app: Arc<App>| async move {
            plain(handlers::oracle::handle(app, query.address).await)
        });

    let routes = validator
        .or(validators)
        .or(wallet)
        .or(delegator)
        .or(params)
        .or(general)
        .or(upgrade)
        .or(proposals)
        .or(single)
        .or(oracle);

    info!("Listening on {listen_address}");
    warp::serve(routes).run(listen_address).await;

    Ok(())
}
