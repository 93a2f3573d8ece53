//! Combined scrape: one snapshot covering the chain-wide metrics plus every
//! validator and wallet named in the configuration, so one Prometheus target
//! suffices for a whole deployment.

use std::sync::Arc;
use std::time::Instant;

use log::warn;

use crate::address;
use crate::derived;
use crate::fanout::{Slot, TaskSet};
use crate::types::Validator;
use crate::App;

use super::{finish, general, new_sink, oracle, params, proposals, upgrade, validator, wallet};

const ENDPOINT: &str = "/metrics/single";

pub async fn handle(app: Arc<App>) -> String {
    let started = Instant::now();
    let sink = new_sink(&app);

    general::declare_metrics(&sink);
    params::declare_metrics(&sink);
    upgrade::declare_metrics(&sink);
    proposals::declare_metrics(&sink);

    let validators: Vec<String> = app
        .config
        .validators
        .iter()
        .filter(|candidate| {
            match address::validate(candidate, &app.config.validator_prefix) {
                Ok(()) => true,
                Err(err) => {
                    warn!("{ENDPOINT}: skipping invalid validator address {candidate:?}: {err}");
                    false
                }
            }
        })
        .cloned()
        .collect();
    let wallets: Vec<String> = app
        .config
        .wallets
        .iter()
        .filter(|candidate| match address::validate(candidate, &app.config.account_prefix) {
            Ok(()) => true,
            Err(err) => {
                warn!("{ENDPOINT}: skipping invalid wallet address {candidate:?}: {err}");
                false
            }
        })
        .cloned()
        .collect();

    if !validators.is_empty() {
        validator::declare_metrics(&sink);
    }
    if !wallets.is_empty() {
        wallet::declare_metrics(&sink);
    }
    if app.config.oracle {
        oracle::declare_metrics(&sink);
    }

    // the per-validator tasks need each validator's moniker, so those records
    // are fetched in a wave of their own before the main fan-out
    let mut prefetch = TaskSet::new(ENDPOINT, app.config.query_timeout);
    let pending: Vec<(String, Slot<Validator>)> = validators
        .iter()
        .map(|operator| {
            let slot: Slot<Validator> = Slot::new();
            {
                let app = app.clone();
                let slot = slot.clone();
                let operator = operator.clone();
                prefetch.spawn("validator details", async move {
                    slot.fill(app.client.validator(&operator).await?);
                    Ok(())
                });
            }
            (operator.clone(), slot)
        })
        .collect();
    let mut joined = prefetch.join_all().await;

    let mut wave1 = TaskSet::new(ENDPOINT, app.config.query_timeout);
    general::spawn_tasks(&app, &sink, &mut wave1);
    params::spawn_tasks(&app, &sink, &mut wave1);
    proposals::spawn_tasks(&app, &sink, &mut wave1);
    let (plan_slot, sync_slot) = upgrade::spawn_tasks(&app, &mut wave1);

    let mut resolved: Vec<(String, Validator)> = Vec::new();
    for (operator, slot) in pending {
        match slot.take() {
            Some(record) => {
                validator::write_identity(
                    &sink,
                    ENDPOINT,
                    &app.chain.denom,
                    app.chain.denom_coefficient,
                    &operator,
                    &record,
                );
                validator::spawn_tasks(&app, &sink, &mut wave1, operator.clone(), &record);
                if app.config.oracle {
                    oracle::spawn_tasks(&app, &sink, &mut wave1, operator.clone());
                }
                resolved.push((operator, record));
            }
            None => warn!("{ENDPOINT}: could not get validator {operator}, skipping its metrics"),
        }
    }

    let rank_inputs = if resolved.is_empty() {
        None
    } else {
        Some(validator::spawn_rank_inputs(&app, &mut wave1))
    };

    for wallet_address in &wallets {
        wallet::spawn_tasks(&app, &sink, &mut wave1, wallet_address.clone());
    }

    joined.merge(wave1.join_all().await);

    // wave 2
    upgrade::render_estimate(ENDPOINT, &sink, plan_slot, sync_slot);
    if let Some((all_validators, staking_params)) = rank_inputs {
        if let Some(list) = all_validators.take() {
            let ranked = derived::rank_validators(list);
            let max = staking_params.take().map(|p| p.max_validators);
            for (operator, record) in &resolved {
                validator::write_rank(
                    &sink,
                    ENDPOINT,
                    operator,
                    &record.description.moniker,
                    &ranked,
                    max,
                );
            }
        }
    }

    finish(ENDPOINT, &sink, joined, started)
}
