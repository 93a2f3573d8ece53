use std::sync::Arc;
use std::time::Instant;

use log::{debug, warn};

use crate::address;
use crate::derived;
use crate::fanout::{Slot, TaskSet};
use crate::sink::{Kind, Sink};
use crate::types::{bond_status_code, SigningInfo, StakingParams, Validator, BOND_STATUS_BONDED};
use crate::App;

use super::{finish, new_sink, parse_value};

const ENDPOINT: &str = "/metrics/validators";

fn declare_metrics(sink: &Sink) {
    sink.declare(
        "cosmos_validators_commission",
        "Commission of the Cosmos-based blockchain validator",
        Kind::Gauge,
        &["address", "moniker"],
    );
    sink.declare(
        "cosmos_validators_status",
        "Status of the Cosmos-based blockchain validator",
        Kind::Gauge,
        &["address", "moniker"],
    );
    sink.declare(
        "cosmos_validators_jailed",
        "Jailed status of the Cosmos-based blockchain validator",
        Kind::Gauge,
        &["address", "moniker"],
    );
    sink.declare(
        "cosmos_validators_tokens",
        "Tokens of the Cosmos-based blockchain validator",
        Kind::Gauge,
        &["address", "moniker", "denom"],
    );
    sink.declare(
        "cosmos_validators_delegator_shares",
        "Delegator shares of the Cosmos-based blockchain validator",
        Kind::Gauge,
        &["address", "moniker", "denom"],
    );
    sink.declare(
        "cosmos_validators_min_self_delegation",
        "Self declared minimum self delegation shares of the Cosmos-based blockchain validator",
        Kind::Gauge,
        &["address", "moniker", "denom"],
    );
    sink.declare(
        "cosmos_validators_missed_blocks",
        "Missed blocks of the Cosmos-based blockchain validator",
        Kind::Gauge,
        &["address", "moniker"],
    );
    sink.declare(
        "cosmos_validators_rank",
        "Rank of the Cosmos-based blockchain validator",
        Kind::Gauge,
        &["address", "moniker"],
    );
    sink.declare(
        "cosmos_validators_active",
        "1 if the Cosmos-based blockchain validator is in active set, 0 if no",
        Kind::Gauge,
        &["address", "moniker"],
    );
}

pub async fn handle(app: Arc<App>) -> String {
    let started = Instant::now();
    let sink = new_sink(&app);
    declare_metrics(&sink);

    let mut wave1 = TaskSet::new(ENDPOINT, app.config.query_timeout);
    let validators: Slot<Vec<Validator>> = Slot::new();
    let signing_infos: Slot<Vec<SigningInfo>> = Slot::new();
    let staking_params: Slot<StakingParams> = Slot::new();

    {
        let app = app.clone();
        let slot = validators.clone();
        wave1.spawn("validators", async move {
            slot.fill(app.client.validators().await?);
            Ok(())
        });
    }
    {
        let app = app.clone();
        let slot = signing_infos.clone();
        wave1.spawn("signing infos", async move {
            slot.fill(app.client.signing_infos().await?);
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

    let joined = wave1.join_all().await;

    // wave 2: everything below operates on merged wave-1 results
    let ranked = derived::rank_validators(validators.take().unwrap_or_default());
    let signing_index = derived::signing_info_index(signing_infos.take().unwrap_or_default());
    let max_validators = staking_params.take().map(|params| params.max_validators);

    debug!(
        "{}: ranked {} validators against {} signing infos",
        ENDPOINT,
        ranked.len(),
        signing_index.len()
    );

    let denom = app.chain.denom.as_str();
    let coefficient = app.chain.denom_coefficient;

    for (index, validator) in ranked.iter().enumerate() {
        let rank = index + 1;
        let address = validator.operator_address.as_str();
        let moniker = validator.description.moniker.as_str();

        if let Some(rate) = parse_value(
            ENDPOINT,
            "commission rate",
            &validator.commission.commission_rates.rate,
        ) {
            sink.set("cosmos_validators_commission", &[address, moniker], rate);
        }
        sink.set(
            "cosmos_validators_status",
            &[address, moniker],
            bond_status_code(&validator.status),
        );
        sink.set(
            "cosmos_validators_jailed",
            &[address, moniker],
            if validator.jailed { 1.0 } else { 0.0 },
        );
        if let Some(value) = parse_value(ENDPOINT, "tokens", &validator.tokens) {
            sink.set(
                "cosmos_validators_tokens",
                &[address, moniker, denom],
                value / coefficient,
            );
        }
        if let Some(value) = parse_value(ENDPOINT, "delegator shares", &validator.delegator_shares)
        {
            sink.set(
                "cosmos_validators_delegator_shares",
                &[address, moniker, denom],
                value / coefficient,
            );
        }
        if let Some(value) = parse_value(
            ENDPOINT,
            "min self delegation",
            &validator.min_self_delegation,
        ) {
            sink.set(
                "cosmos_validators_min_self_delegation",
                &[address, moniker, denom],
                value / coefficient,
            );
        }

        sink.set("cosmos_validators_rank", &[address, moniker], rank as f64);

        if let Some(max) = max_validators {
            sink.set(
                "cosmos_validators_active",
                &[address, moniker],
                if derived::is_active(rank, max) { 1.0 } else { 0.0 },
            );
        }

        // the join key is the derived consensus address; a validator with no
        // signing info gets no missed-blocks sample at all
        let consensus_address = match &validator.consensus_pubkey {
            Some(pubkey) => match address::consensus_address(pubkey, &app.config.consensus_prefix)
            {
                Ok(consensus_address) => consensus_address,
                Err(err) => {
                    warn!("{ENDPOINT}: could not derive consensus address for {address}: {err}");
                    continue;
                }
            },
            None => {
                debug!("{ENDPOINT}: validator {address} has no consensus pubkey");
                continue;
            }
        };

        let info = match signing_index.get(&consensus_address) {
            Some(info) => info,
            None => {
                debug!("{ENDPOINT}: no signing info for validator {address}");
                continue;
            }
        };

        if validator.status == BOND_STATUS_BONDED {
            if let Some(value) =
                parse_value(ENDPOINT, "missed blocks", &info.missed_blocks_counter)
            {
                sink.set("cosmos_validators_missed_blocks", &[address, moniker], value);
            }
        }
    }

    finish(ENDPOINT, &sink, joined, started)
}
