use std::sync::Arc;
use std::time::Instant;

use log::warn;

use crate::address;
use crate::fanout::TaskSet;
use crate::sink::{Kind, Sink};
use crate::App;

use super::{finish, new_sink, parse_value};

const ENDPOINT: &str = "/metrics/wallet";

pub(crate) fn declare_metrics(sink: &Sink) {
    sink.declare(
        "cosmos_wallet_balance",
        "Balance of the Cosmos-based blockchain wallet",
        Kind::Gauge,
        &["address", "denom"],
    );
    sink.declare(
        "cosmos_wallet_delegations",
        "Delegations of the Cosmos-based blockchain wallet",
        Kind::Gauge,
        &["address", "denom", "delegated_to"],
    );
    sink.declare(
        "cosmos_wallet_unbondings",
        "Unbondings of the Cosmos-based blockchain wallet",
        Kind::Gauge,
        &["address", "denom", "unbonded_from"],
    );
    sink.declare(
        "cosmos_wallet_redelegations",
        "Redelegations of the Cosmos-based blockchain wallet",
        Kind::Gauge,
        &["address", "denom", "redelegated_from", "redelegated_to"],
    );
    sink.declare(
        "cosmos_wallet_rewards",
        "Rewards of the Cosmos-based blockchain wallet",
        Kind::Gauge,
        &["address", "denom", "validator_address"],
    );
}

/// Fan out the per-wallet upstream queries into the given wave.
pub(crate) fn spawn_tasks(app: &Arc<App>, sink: &Arc<Sink>, wave1: &mut TaskSet, address: String) {
    let endpoint = wave1.endpoint();
    let coefficient = app.chain.denom_coefficient;

    {
        let app = app.clone();
        let sink = sink.clone();
        let address = address.clone();
        wave1.spawn("balances", async move {
            // balances keep their own denom label, other wallet metrics use
            // the chain's display denom
            for balance in app.client.balances(&address).await? {
                if let Some(value) = parse_value(endpoint, "balance", &balance.amount) {
                    sink.set(
                        "cosmos_wallet_balance",
                        &[&address, &balance.denom],
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
        let denom = app.chain.denom.clone();
        wave1.spawn("delegations", async move {
            for delegation in app.client.delegator_delegations(&address).await? {
                if let Some(value) = parse_value(endpoint, "delegation", &delegation.balance.amount)
                {
                    sink.set(
                        "cosmos_wallet_delegations",
                        &[&address, &denom, &delegation.delegation.validator_address],
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
        let denom = app.chain.denom.clone();
        wave1.spawn("unbonding delegations", async move {
            for unbonding in app.client.delegator_unbondings(&address).await? {
                let mut sum = 0.0;
                for entry in &unbonding.entries {
                    if let Some(value) = parse_value(endpoint, "unbonding entry", &entry.balance) {
                        sum += value;
                    }
                }
                sink.set(
                    "cosmos_wallet_unbondings",
                    &[&address, &denom, &unbonding.validator_address],
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
        let denom = app.chain.denom.clone();
        wave1.spawn("redelegations", async move {
            for redelegation in app.client.delegator_redelegations(&address).await? {
                let mut sum = 0.0;
                for entry in &redelegation.entries {
                    if let Some(value) = parse_value(endpoint, "redelegation entry", &entry.balance)
                    {
                        sum += value;
                    }
                }
                sink.set(
                    "cosmos_wallet_redelegations",
                    &[
                        &address,
                        &denom,
                        &redelegation.redelegation.validator_src_address,
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
        let denom = app.chain.denom.clone();
        wave1.spawn("rewards", async move {
            for reward in app.client.delegator_rewards(&address).await? {
                for coin in &reward.reward {
                    if let Some(value) = parse_value(endpoint, "reward", &coin.amount) {
                        sink.set(
                            "cosmos_wallet_rewards",
                            &[&address, &denom, &reward.validator_address],
                            value / coefficient,
                        );
                    }
                }
            }
            Ok(())
        });
    }
}

pub async fn handle(app: Arc<App>, address: String) -> String {
    let started = Instant::now();
    let sink = new_sink(&app);
    declare_metrics(&sink);

    if let Err(err) = address::validate(&address, &app.config.account_prefix) {
        warn!("{ENDPOINT}: invalid address {address:?}: {err}");
        return sink.render();
    }

    let mut wave1 = TaskSet::new(ENDPOINT, app.config.query_timeout);
    spawn_tasks(&app, &sink, &mut wave1, address);

    let joined = wave1.join_all().await;
    finish(ENDPOINT, &sink, joined, started)
}
