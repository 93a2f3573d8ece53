use std::sync::Arc;
use std::time::Instant;

use crate::fanout::TaskSet;
use crate::sink::{Kind, Sink};
use crate::App;

use super::{finish, new_sink, parse_value};

const ENDPOINT: &str = "/metrics/proposals";

pub(crate) fn declare_metrics(sink: &Sink) {
    sink.declare(
        "cosmos_proposals",
        "Proposals of Cosmos-based blockchain",
        Kind::Gauge,
        &["title", "status", "voting_start_time", "voting_end_time"],
    );
}

/// Fan out the proposal listing into the given wave.
pub(crate) fn spawn_tasks(app: &Arc<App>, sink: &Arc<Sink>, wave1: &mut TaskSet) {
    let endpoint = wave1.endpoint();
    {
        let app = app.clone();
        let sink = sink.clone();
        wave1.spawn("proposals", async move {
            for proposal in app.client.proposals(false).await? {
                if let Some(id) = parse_value(endpoint, "proposal id", &proposal.proposal_id) {
                    sink.set(
                        "cosmos_proposals",
                        &[
                            &proposal.content.title,
                            &proposal.status,
                            &proposal.voting_start_time,
                            &proposal.voting_end_time,
                        ],
                        id,
                    );
                }
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
