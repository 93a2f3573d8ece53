use std::sync::Arc;
use std::time::Instant;

use log::warn;

use crate::derived::{self, ChainTiming, UpgradeState};
use crate::fanout::{Slot, TaskSet};
use crate::sink::{Kind, Sink};
use crate::types::{SyncInfo, UpgradePlan};
use crate::App;

use super::{finish, new_sink};

const ENDPOINT: &str = "/metrics/upgrade";

pub(crate) fn declare_metrics(sink: &Sink) {
    sink.declare(
        "cosmos_upgrade_plan",
        "1 if an upgrade plan is scheduled, 0 if no",
        Kind::Gauge,
        &["info", "name", "height"],
    );
    sink.declare(
        "cosmos_upgrade_remaining_height",
        "Blocks left until the scheduled upgrade height, 0 when none is pending",
        Kind::Gauge,
        &[],
    );
    sink.declare(
        "cosmos_upgrade_estimated_time",
        "Estimated unix time of the scheduled upgrade, 0 when none is pending",
        Kind::Gauge,
        &[],
    );
}

/// Fan out the upgrade-plan and status queries; the returned slots feed the
/// post-join estimation.
pub(crate) fn spawn_tasks(
    app: &Arc<App>,
    wave1: &mut TaskSet,
) -> (Slot<Option<UpgradePlan>>, Slot<SyncInfo>) {
    let plan_slot: Slot<Option<UpgradePlan>> = Slot::new();
    let sync_slot: Slot<SyncInfo> = Slot::new();

    {
        let app = app.clone();
        let slot = plan_slot.clone();
        wave1.spawn("upgrade plan", async move {
            slot.fill(app.client.current_upgrade_plan().await?);
            Ok(())
        });
    }
    {
        let app = app.clone();
        let slot = sync_slot.clone();
        wave1.spawn("chain status", async move {
            slot.fill(app.client.status().await?.sync_info);
            Ok(())
        });
    }

    (plan_slot, sync_slot)
}

/// Wave 2: estimation needs the plan and the status sample merged.
/// No plan and an already-reached height render the same sentinel zero;
/// only a pending plan gets an estimate.
pub(crate) fn render_estimate(
    endpoint: &'static str,
    sink: &Sink,
    plan_slot: Slot<Option<UpgradePlan>>,
    sync_slot: Slot<SyncInfo>,
) {
    let plan = match plan_slot.take() {
        Some(plan) => plan,
        // plan query failed, nothing to report
        None => return,
    };

    match &plan {
        None => {
            sink.set("cosmos_upgrade_plan", &["none", "none", "0"], 0.0);
            sink.set("cosmos_upgrade_remaining_height", &[], 0.0);
            sink.set("cosmos_upgrade_estimated_time", &[], 0.0);
        }
        Some(plan) => {
            sink.set(
                "cosmos_upgrade_plan",
                &[&plan.info, &plan.name, &plan.height],
                1.0,
            );

            let timing = sync_slot.take().and_then(|sync| {
                ChainTiming::from_sync_info(&sync)
                    .map_err(|err| warn!("{endpoint}: bad status sample: {err}"))
                    .ok()
            });

            if let Some(timing) = timing {
                match derived::estimate_upgrade(Some(plan), &timing) {
                    Ok(UpgradeState::Scheduled {
                        remaining_height,
                        estimated_time,
                    }) => {
                        sink.set(
                            "cosmos_upgrade_remaining_height",
                            &[],
                            remaining_height as f64,
                        );
                        sink.set(
                            "cosmos_upgrade_estimated_time",
                            &[],
                            estimated_time.timestamp() as f64,
                        );
                    }
                    Ok(UpgradeState::HeightReached) | Ok(UpgradeState::NoneScheduled) => {
                        sink.set("cosmos_upgrade_remaining_height", &[], 0.0);
                        sink.set("cosmos_upgrade_estimated_time", &[], 0.0);
                    }
                    // estimation failed locally, the derived metrics stay absent
                    Err(err) => warn!("{endpoint}: could not estimate upgrade time: {err}"),
                }
            }
        }
    }
}

pub async fn handle(app: Arc<App>) -> String {
    let started = Instant::now();
    let sink = new_sink(&app);
    declare_metrics(&sink);

    let mut wave1 = TaskSet::new(ENDPOINT, app.config.query_timeout);
    let (plan_slot, sync_slot) = spawn_tasks(&app, &mut wave1);

    let joined = wave1.join_all().await;
    render_estimate(ENDPOINT, &sink, plan_slot, sync_slot);

    finish(ENDPOINT, &sink, joined, started)
}
