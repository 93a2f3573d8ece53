use std::sync::Arc;
use std::time::Instant;

use crate::fanout::TaskSet;
use crate::sink::{Kind, Sink};
use crate::App;

use super::{finish, new_sink, parse_value};

const ENDPOINT: &str = "/metrics/general";

pub(crate) fn declare_metrics(sink: &Sink) {
    sink.declare("cosmos_general_bonded_tokens", "Bonded tokens", Kind::Gauge, &[]);
    sink.declare(
        "cosmos_general_not_bonded_tokens",
        "Not bonded tokens",
        Kind::Gauge,
        &[],
    );
    sink.declare(
        "cosmos_general_community_pool",
        "Community pool",
        Kind::Gauge,
        &["denom"],
    );
    sink.declare(
        "cosmos_general_supply_total",
        "Total supply",
        Kind::Gauge,
        &["denom"],
    );
    sink.declare("cosmos_general_inflation", "Inflation", Kind::Gauge, &[]);
    sink.declare(
        "cosmos_general_annual_provisions",
        "Annual provisions",
        Kind::Gauge,
        &["denom"],
    );
    sink.declare(
        "cosmos_latest_block_height",
        "Latest block height",
        Kind::Gauge,
        &[],
    );
    sink.declare(
        "cosmos_gov_voting_period_proposals",
        "Voting period proposals",
        Kind::Gauge,
        &[],
    );
}

/// Fan out the chain-wide queries into the given wave.
pub(crate) fn spawn_tasks(app: &Arc<App>, sink: &Arc<Sink>, wave1: &mut TaskSet) {
    let endpoint = wave1.endpoint();
    let coefficient = app.chain.denom_coefficient;

    {
        let app = app.clone();
        let sink = sink.clone();
        wave1.spawn("chain status", async move {
            let status = app.client.status().await?;
            if let Some(height) = parse_value(
                endpoint,
                "latest block height",
                &status.sync_info.latest_block_height,
            ) {
                sink.set("cosmos_latest_block_height", &[], height);
            }
            Ok(())
        });
    }

    {
        let app = app.clone();
        let sink = sink.clone();
        wave1.spawn("staking pool", async move {
            let pool = app.client.staking_pool().await?;
            if let Some(value) = parse_value(endpoint, "bonded tokens", &pool.bonded_tokens) {
                sink.set("cosmos_general_bonded_tokens", &[], value);
            }
            if let Some(value) = parse_value(endpoint, "not bonded tokens", &pool.not_bonded_tokens)
            {
                sink.set("cosmos_general_not_bonded_tokens", &[], value);
            }
            Ok(())
        });
    }

    {
        let app = app.clone();
        let sink = sink.clone();
        let denom = app.chain.denom.clone();
        wave1.spawn("community pool", async move {
            for coin in app.client.community_pool().await? {
                if let Some(value) = parse_value(endpoint, "community pool coin", &coin.amount) {
                    sink.set("cosmos_general_community_pool", &[&denom], value / coefficient);
                }
            }
            Ok(())
        });
    }

    {
        let app = app.clone();
        let sink = sink.clone();
        let denom = app.chain.denom.clone();
        wave1.spawn("total supply", async move {
            for coin in app.client.total_supply().await? {
                if let Some(value) = parse_value(endpoint, "total supply coin", &coin.amount) {
                    sink.set("cosmos_general_supply_total", &[&denom], value / coefficient);
                }
            }
            Ok(())
        });
    }

    {
        let app = app.clone();
        let sink = sink.clone();
        wave1.spawn("inflation", async move {
            let inflation = app.client.inflation().await?;
            if let Some(value) = parse_value(endpoint, "inflation", &inflation) {
                sink.set("cosmos_general_inflation", &[], value);
            }
            Ok(())
        });
    }

    {
        let app = app.clone();
        let sink = sink.clone();
        let denom = app.chain.denom.clone();
        wave1.spawn("annual provisions", async move {
            let provisions = app.client.annual_provisions().await?;
            if let Some(value) = parse_value(endpoint, "annual provisions", &provisions) {
                sink.set(
                    "cosmos_general_annual_provisions",
                    &[&denom],
                    value / coefficient,
                );
            }
            Ok(())
        });
    }

    {
        let app = app.clone();
        let sink = sink.clone();
        wave1.spawn("active proposals", async move {
            let proposals = app.client.proposals(true).await?;
            sink.set(
                "cosmos_gov_voting_period_proposals",
                &[],
                proposals.len() as f64,
            );
            Ok(())
        });
    }
}

pub async fn handle(app: Arc<App>) -> String {
    let started = Instant::now();
    let sink = new_sink(&app);
    declare_metrics(&sink);

    let mut wave1 = TaskSet::new(ENDPOINT, app.config.query_timeout);
    spawn_tasks(&app, &sink, &mut wave1);

    let joined = wave1.join_all().await;
    finish(ENDPOINT, &sink, joined, started)
}
