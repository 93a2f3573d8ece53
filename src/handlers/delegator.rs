use std::sync::Arc;
use std::time::Instant;

use log::warn;

use crate::address;
use crate::fanout::TaskSet;
use crate::sink::{Kind, Sink};
use crate::App;

use super::{finish, new_sink};

const ENDPOINT: &str = "/metrics/delegator";

fn declare_metrics(sink: &Sink) {
    sink.declare(
        "cosmos_validator_delegator_total",
        "Number of delegators in validator",
        Kind::Gauge,
        &["validator_address"],
    );
}

pub async fn handle(app: Arc<App>, validator_address: String) -> String {
    let started = Instant::now();
    let sink = new_sink(&app);
    declare_metrics(&sink);

    if let Err(err) = address::validate(&validator_address, &app.config.validator_prefix) {
        warn!("{ENDPOINT}: invalid validator address {validator_address:?}: {err}");
        return sink.render();
    }

    let mut wave1 = TaskSet::new(ENDPOINT, app.config.query_timeout);
    {
        let app = app.clone();
        let sink = sink.clone();
        let validator_address = validator_address.clone();
        wave1.spawn("validator delegations", async move {
            let delegations = app.client.validator_delegations(&validator_address).await?;
            sink.set(
                "cosmos_validator_delegator_total",
                &[&validator_address],
                delegations.len() as f64,
            );
            Ok(())
        });
    }

    let joined = wave1.join_all().await;
    finish(ENDPOINT, &sink, joined, started)
}
