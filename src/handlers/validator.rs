use std::sync::Arc;
use std::time::Instant;

use log::warn;

use crate::address;
use crate::derived;
use crate::fanout::{Joined, Slot, TaskSet};
use crate::sink::{Kind, Sink};
use crate::types::{bond_status_code, StakingParams, Validator};
use crate::App;

use super::{finish, new_sink, parse_value};

const ENDPOINT: &str = "/metrics/validator";

pub(crate) fn declare_metrics(sink: &Sink) {
    sink.declare(
        "cosmos_validator_tokens",
        "Tokens of the Cosmos-based blockchain validator",
        Kind::Gauge,
        &["address", "moniker", "denom"],
    );
    sink.declare(
        "cosmos_validator_delegators_shares",
        "Delegators shares of the Cosmos-based blockchain validator",
        Kind::Gauge,
        &["address", "moniker", "denom"],
    );
    sink.declare(
        "cosmos_validator_commission_rate",
        "Commission rate of the Cosmos-based blockchain validator",
        Kind::Gauge,
        &["address", "moniker"],
    );
    sink.declare(
        "cosmos_validator_commission",
        "Commission of the Cosmos-based blockchain validator",
        Kind::Gauge,
        &["address", "moniker", "denom"],
    );
    sink.declare(
        "cosmos_validator_rewards",
        "Rewards of the Cosmos-based blockchain validator",
        Kind::Gauge,
        &["address", "moniker", "denom"],
    );
    sink.declare(
        "cosmos_validator_unbondings",
        "Unbondings of the Cosmos-based blockchain validator",
        Kind::Gauge,
        &["address", "moniker", "denom", "unbonded_by"],
    );
    sink.declare(
        "cosmos_validator_redelegations",
        "Redelegations of the Cosmos-based blockchain validator",
        Kind::Gauge,
        &["address", "moniker", "denom", "redelegated_by", "redelegated_to"],
    );
    sink.declare(
        "cosmos_validator_missed_blocks",
        "Missed blocks of the Cosmos-based blockchain validator",
        Kind::Gauge,
        &["address", "moniker"],
    );
    sink.declare(
        "cosmos_validator_rank",
        "Rank of the Cosmos-based blockchain validator",
        Kind::Gauge,
        &["address", "moniker"],
    );
    sink.declare(
        "cosmos_validator_active",
        "1 if the Cosmos-based blockchain validator is in active set, 0 if no",
        Kind::Gauge,
        &["address", "moniker"],
    );
    sink.declare(
        "cosmos_validator_status",
        "Status of the Cosmos-based blockchain validator",
        Kind::Gauge,
        &["address", "moniker"],
    );
    sink.declare(
        "cosmos_validator_jailed",
        "1 if the Cosmos-based blockchain validator is jailed, 0 if no",
        Kind::Gauge,
        &["address", "moniker"],
    );
}

/// Gauges read straight off the already-fetched validator record.
pub(crate) fn write_identity(
    sink: &Sink,
    endpoint: &str,
    denom: &str,
    coefficient: f64,
    address: &str,
    validator: &Validator,
) {
    let moniker = validator.description.moniker.as_str();

    if let Some(value) = parse_value(endpoint, "validator tokens", &validator.tokens) {
        sink.set(
            "cosmos_validator_tokens",
            &[address, moniker, denom],
            value / coefficient,
        );
    }
    if let Some(value) = parse_value(endpoint, "delegator shares", &validator.delegator_shares) {
        sink.set(
            "cosmos_validator_delegators_shares",
            &[address, moniker, denom],
            value / coefficient,
        );
    }
    if let Some(rate) = parse_value(
        endpoint,
        "commission rate",
        &validator.commission.commission_rates.rate,
    ) {
        sink.set("cosmos_validator_commission_rate", &[address, moniker], rate);
    }
    sink.set(
        "cosmos_validator_status",
        &[address, moniker],
        bond_status_code(&validator.status),
    );
    sink.set(
        "cosmos_validator_jailed",
        &[address, moniker],
        if validator.jailed { 1.0 } else { 0.0 },
    );
}

/// Fan out the per-validator upstream queries into the given wave.
pub(crate) fn spawn_tasks(
    app: &Arc<App>,
    sink: &Arc<Sink>,
    wave1: &mut TaskSet,
    address: String,
    validator: &Validator,
) {
    let endpoint = wave1.endpoint();
    let moniker = validator.description.moniker.clone();
    let denom = app.chain.denom.clone();
    let coefficient = app.chain.denom_coefficient;

    {
        let app = app.clone();
        let sink = sink.clone();
        let address = address.clone();
        let moniker = moniker.clone();
        let denom = denom.clone();
        wave1.spawn("validator commission", async move {
            let coins = app.client.validator_commission(&address).await?;
            for coin in coins {
                if let Some(value) = parse_value(endpoint, "commission", &coin.amount) {
                    sink.set(
                        "cosmos_validator_commission",
                        &[&address, &moniker, &denom],
                        value / coefficient,
                    );
                }
            }
            Ok(())
        });
    }

    {
        let app = app.clone();
        let sink = sink.clone();
        let address = address.clone();
        let moniker = moniker.clone();
        let denom = denom.clone();
        wave1.spawn("validator rewards", async move {
            let coins = app.client.validator_outstanding_rewards(&address).await?;
            for coin in coins {
                if let Some(value) = parse_value(endpoint, "reward", &coin.amount) {
                    sink.set(
                        "cosmos_validator_rewards",
                        &[&address, &moniker, &denom],
                        value / coefficient,
                    );
                }
            }
            Ok(())
        });
    }

    {
        let app = app.clone();
        let sink = sink.clone();
        let address = address.clone();
        let moniker = moniker.clone();
        let denom = denom.clone();
        wave1.spawn("validator unbondings", async move {
            let unbondings = app.client.validator_unbondings(&address).await?;
            for unbonding in unbondings {
                let mut sum = 0.0;
                for entry in &unbonding.entries {
                    if let Some(value) = parse_value(endpoint, "unbonding entry", &entry.balance) {
                        sum += value;
                    }
                }
                sink.set(
                    "cosmos_validator_unbondings",
                    &[&address, &moniker, &denom, &unbonding.delegator_address],
                    sum / coefficient,
                );
            }
            Ok(())
        });
    }

    {
        let app = app.clone();
        let sink = sink.clone();
        let address = address.clone();
        let moniker = moniker.clone();
        let denom = denom.clone();
        wave1.spawn("validator redelegations", async move {
            // the gateway only scopes redelegation queries by delegator, so
            // the validator view covers its self-delegation, filtered by
            // source validator
            let self_delegator =
                address::account_address(&address, &app.config.account_prefix)?;
            let redelegations = app.client.delegator_redelegations(&self_delegator).await?;
            for redelegation in redelegations {
                if redelegation.redelegation.validator_src_address != address {
                    continue;
                }
                let mut sum = 0.0;
                for entry in &redelegation.entries {
                    if let Some(value) = parse_value(endpoint, "redelegation entry", &entry.balance)
                    {
                        sum += value;
                    }
                }
                sink.set(
                    "cosmos_validator_redelegations",
                    &[
                        &address,
                        &moniker,
                        &denom,
                        &redelegation.redelegation.delegator_address,
                        &redelegation.redelegation.validator_dst_address,
                    ],
                    sum / coefficient,
                );
            }
            Ok(())
        });
    }

    {
        let app = app.clone();
        let sink = sink.clone();
        let address = address.clone();
        let pubkey = validator.consensus_pubkey.clone();
        wave1.spawn("validator signing info", async move {
            let pubkey = pubkey.ok_or("validator has no consensus pubkey")?;
            let consensus_address =
                address::consensus_address(&pubkey, &app.config.consensus_prefix)?;
            let info = app.client.signing_info(&consensus_address).await?;
            if let Some(value) =
                parse_value(endpoint, "missed blocks", &info.missed_blocks_counter)
            {
                sink.set("cosmos_validator_missed_blocks", &[&address, &moniker], value);
            }
            Ok(())
        });
    }
}

/// Fetch the cluster-wide context the rank and active-set gauges need.
pub(crate) fn spawn_rank_inputs(
    app: &Arc<App>,
    wave1: &mut TaskSet,
) -> (Slot<Vec<Validator>>, Slot<StakingParams>) {
    let all_validators: Slot<Vec<Validator>> = Slot::new();
    let staking_params: Slot<StakingParams> = Slot::new();

    {
        let app = app.clone();
        let slot = all_validators.clone();
        wave1.spawn("all validators", async move {
            slot.fill(app.client.validators().await?);
            Ok(())
        });
    }
    {
        let app = app.clone();
        let slot = staking_params.clone();
        wave1.spawn("staking params", async move {
            slot.fill(app.client.staking_params().await?);
            Ok(())
        });
    }

    (all_validators, staking_params)
}

/// Rank and active-set gauges for one validator, against the merged list.
pub(crate) fn write_rank(
    sink: &Sink,
    endpoint: &str,
    address: &str,
    moniker: &str,
    ranked: &[Validator],
    max_validators: Option<u32>,
) {
    match derived::rank_of(ranked, address) {
        Some(rank) => {
            sink.set("cosmos_validator_rank", &[address, moniker], rank as f64);
            if let Some(max) = max_validators {
                let active = derived::is_active(rank, max);
                sink.set(
                    "cosmos_validator_active",
                    &[address, moniker],
                    if active { 1.0 } else { 0.0 },
                );
            }
        }
        None => warn!("{endpoint}: validator {address} not found in validators list"),
    }
}

pub async fn handle(app: Arc<App>, address: String) -> String {
    let started = Instant::now();
    let sink = new_sink(&app);
    declare_metrics(&sink);

    if let Err(err) = address::validate(&address, &app.config.validator_prefix) {
        warn!("{ENDPOINT}: invalid address {address:?}: {err}");
        return sink.render();
    }

    // fetched before the fan-out: the moniker labels everything else
    let validator = match app.client.validator(&address).await {
        Ok(validator) => validator,
        Err(err) => {
            warn!("{ENDPOINT}: could not get validator {address}: {err}");
            return finish(ENDPOINT, &sink, Joined { ok: 0, failed: 1 }, started);
        }
    };

    write_identity(
        &sink,
        ENDPOINT,
        &app.chain.denom,
        app.chain.denom_coefficient,
        &address,
        &validator,
    );

    let mut wave1 = TaskSet::new(ENDPOINT, app.config.query_timeout);
    spawn_tasks(&app, &sink, &mut wave1, address.clone(), &validator);
    let (all_validators, staking_params) = spawn_rank_inputs(&app, &mut wave1);

    let joined = wave1.join_all().await;

    // wave 2: rank needs the merged validator list, active set needs the rank
    // plus the chain's configured set size
    if let Some(validators) = all_validators.take() {
        let ranked = derived::rank_validators(validators);
        let max = staking_params.take().map(|params| params.max_validators);
        write_rank(
            &sink,
            ENDPOINT,
            &address,
            &validator.description.moniker,
            &ranked,
            max,
        );
    }

    finish(ENDPOINT, &sink, joined, started)
}
