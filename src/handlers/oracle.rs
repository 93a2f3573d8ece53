use std::sync::Arc;
use std::time::Instant;

use log::warn;

use crate::address;
use crate::fanout::TaskSet;
use crate::sink::{Kind, Sink};
use crate::App;

use super::{finish, new_sink, parse_value};

const ENDPOINT: &str = "/metrics/oracle";

pub(crate) fn declare_metrics(sink: &Sink) {
    sink.declare(
        "cosmos_oracle_vote_miss_count",
        "Vote miss count",
        Kind::Counter,
        &["type"],
    );
}

/// Fan out the oracle miss-counter query into the given wave.
pub(crate) fn spawn_tasks(app: &Arc<App>, sink: &Arc<Sink>, wave1: &mut TaskSet, address: String) {
    let endpoint = wave1.endpoint();
    let app = app.clone();
    let sink = sink.clone();
    wave1.spawn("oracle miss counter", async move {
        let counter = app.client.oracle_miss_counter(&address).await?;
        if let Some(count) = parse_value(endpoint, "miss counter", &counter) {
            sink.add("cosmos_oracle_vote_miss_count", &["miss"], count);
        }
        Ok(())
    });
}

pub async fn handle(app: Arc<App>, address: String) -> String {
    let started = Instant::now();
    let sink = new_sink(&app);
    declare_metrics(&sink);

    if let Err(err) = address::validate(&address, &app.config.validator_prefix) {
        warn!("{ENDPOINT}: invalid address {address:?}: {err}");
        return sink.render();
    }

    let mut wave1 = TaskSet::new(ENDPOINT, app.config.query_timeout);
    spawn_tasks(&app, &sink, &mut wave1, address);

    let joined = wave1.join_all().await;
    finish(ENDPOINT, &sink, joined, started)
}
