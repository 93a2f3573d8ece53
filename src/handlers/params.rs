use std::sync::Arc;
use std::time::Instant;

use crate::fanout::TaskSet;
use crate::sink::{Kind, Sink};
use crate::App;

use super::{finish, new_sink, parse_seconds, parse_value};

const ENDPOINT: &str = "/metrics/params";

pub(crate) fn declare_metrics(sink: &Sink) {
    sink.declare("cosmos_params_max_validators", "Active set length", Kind::Gauge, &[]);
    sink.declare(
        "cosmos_params_unbonding_time",
        "Unbonding time, in seconds",
        Kind::Gauge,
        &[],
    );
    sink.declare("cosmos_params_blocks_per_year", "Blocks per year", Kind::Gauge, &[]);
    sink.declare("cosmos_params_goal_bonded", "Goal bonded", Kind::Gauge, &[]);
    sink.declare("cosmos_params_inflation_min", "Min inflation", Kind::Gauge, &[]);
    sink.declare("cosmos_params_inflation_max", "Max inflation", Kind::Gauge, &[]);
    sink.declare(
        "cosmos_params_inflation_rate_change",
        "Inflation rate change",
        Kind::Gauge,
        &[],
    );
    sink.declare(
        "cosmos_params_downtime_jail_duration",
        "Downtime jail duration, in seconds",
        Kind::Gauge,
        &[],
    );
    sink.declare(
        "cosmos_params_min_signed_per_window",
        "Minimal amount of blocks to sign per window to avoid slashing",
        Kind::Gauge,
        &[],
    );
    sink.declare(
        "cosmos_params_signed_blocks_window",
        "Signed blocks window",
        Kind::Gauge,
        &[],
    );
    sink.declare(
        "cosmos_params_slash_fraction_double_sign",
        "% of tokens to be slashed if double signing",
        Kind::Gauge,
        &[],
    );
    sink.declare(
        "cosmos_params_slash_fraction_downtime",
        "% of tokens to be slashed if downtime",
        Kind::Gauge,
        &[],
    );
    sink.declare(
        "cosmos_params_base_proposer_reward",
        "Base proposer reward",
        Kind::Gauge,
        &[],
    );
    sink.declare(
        "cosmos_params_bonus_proposer_reward",
        "Bonus proposer reward",
        Kind::Gauge,
        &[],
    );
    sink.declare("cosmos_params_community_tax", "Community tax", Kind::Gauge, &[]);
}

/// Fan out the parameter queries into the given wave.
pub(crate) fn spawn_tasks(app: &Arc<App>, sink: &Arc<Sink>, wave1: &mut TaskSet) {
    let endpoint = wave1.endpoint();

    {
        let app = app.clone();
        let sink = sink.clone();
        wave1.spawn("staking params", async move {
            let params = app.client.staking_params().await?;
            sink.set("cosmos_params_max_validators", &[], params.max_validators as f64);
            if let Some(seconds) = parse_seconds(endpoint, "unbonding time", &params.unbonding_time)
            {
                sink.set("cosmos_params_unbonding_time", &[], seconds);
            }
            Ok(())
        });
    }

    {
        let app = app.clone();
        let sink = sink.clone();
        wave1.spawn("mint params", async move {
            let params = app.client.mint_params().await?;
            if let Some(value) = parse_value(endpoint, "blocks per year", &params.blocks_per_year) {
                sink.set("cosmos_params_blocks_per_year", &[], value);
            }
            if let Some(value) = parse_value(endpoint, "goal bonded", &params.goal_bonded) {
                sink.set("cosmos_params_goal_bonded", &[], value);
            }
            if let Some(value) = parse_value(endpoint, "inflation min", &params.inflation_min) {
                sink.set("cosmos_params_inflation_min", &[], value);
            }
            if let Some(value) = parse_value(endpoint, "inflation max", &params.inflation_max) {
                sink.set("cosmos_params_inflation_max", &[], value);
            }
            if let Some(value) =
                parse_value(endpoint, "inflation rate change", &params.inflation_rate_change)
            {
                sink.set("cosmos_params_inflation_rate_change", &[], value);
            }
            Ok(())
        });
    }

    {
        let app = app.clone();
        let sink = sink.clone();
        wave1.spawn("slashing params", async move {
            let params = app.client.slashing_params().await?;
            if let Some(seconds) =
                parse_seconds(endpoint, "downtime jail duration", &params.downtime_jail_duration)
            {
                sink.set("cosmos_params_downtime_jail_duration", &[], seconds);
            }
            if let Some(value) =
                parse_value(endpoint, "signed blocks window", &params.signed_blocks_window)
            {
                sink.set("cosmos_params_signed_blocks_window", &[], value);
            }
            if let Some(value) =
                parse_value(endpoint, "min signed per window", &params.min_signed_per_window)
            {
                sink.set("cosmos_params_min_signed_per_window", &[], value);
            }
            if let Some(value) = parse_value(
                endpoint,
                "slash fraction double sign",
                &params.slash_fraction_double_sign,
            ) {
                sink.set("cosmos_params_slash_fraction_double_sign", &[], value);
            }
            if let Some(value) = parse_value(
                endpoint,
                "slash fraction downtime",
                &params.slash_fraction_downtime,
            ) {
                sink.set("cosmos_params_slash_fraction_downtime", &[], value);
            }
            Ok(())
        });
    }

    {
        let app = app.clone();
        let sink = sink.clone();
        wave1.spawn("distribution params", async move {
            let params = app.client.distribution_params().await?;
            if let Some(value) =
                parse_value(endpoint, "base proposer reward", &params.base_proposer_reward)
            {
                sink.set("cosmos_params_base_proposer_reward", &[], value);
            }
            if let Some(value) =
                parse_value(endpoint, "bonus proposer reward", &params.bonus_proposer_reward)
            {
                sink.set("cosmos_params_bonus_proposer_reward", &[], value);
            }
            if let Some(value) = parse_value(endpoint, "community tax", &params.community_tax) {
                sink.set("cosmos_params_community_tax", &[], value);
            }
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
