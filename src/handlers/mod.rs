use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use log::{info, warn};

use crate::fanout::Joined;
use crate::sink::{Kind, Sink};
use crate::App;

pub mod delegator;
pub mod general;
pub mod oracle;
pub mod params;
pub mod proposals;
pub mod single;
pub mod upgrade;
pub mod validator;
pub mod validators;
pub mod wallet;

// every snapshot reports how many of its upstream queries failed, so a
// sparse scrape is distinguishable from a quiet chain
pub const FAILED_QUERIES_METRIC: &str = "cosmos_exporter_failed_queries";

pub fn new_sink(app: &App) -> Arc<Sink> {
    let sink = Sink::new(HashMap::from([(
        "chain_id".to_string(),
        app.chain.chain_id.clone(),
    )]));
    sink.declare(
        FAILED_QUERIES_METRIC,
        "Number of upstream queries that failed during this scrape",
        Kind::Gauge,
        &[],
    );
    Arc::new(sink)
}

pub fn finish(endpoint: &'static str, sink: &Sink, joined: Joined, started: Instant) -> String {
    sink.set(FAILED_QUERIES_METRIC, &[], joined.failed as f64);
    let body = sink.render();
    info!(
        "GET {} processed in {:.3}s ({} queries ok, {} failed)",
        endpoint,
        started.elapsed().as_secs_f64(),
        joined.ok,
        joined.failed
    );
    body
}

/// Parse one string-encoded numeric field. A failure is logged and yields
/// `None`; the caller omits that single metric and moves on.
pub fn parse_value(endpoint: &str, field: &str, raw: &str) -> Option<f64> {
    match raw.parse::<f64>() {
        Ok(value) => Some(value),
        Err(err) => {
            warn!("{endpoint}: could not parse {field} value {raw:?}: {err}");
            None
        }
    }
}

/// Parse a protobuf duration string like "1814400s" into seconds.
pub fn parse_seconds(endpoint: &str, field: &str, raw: &str) -> Option<f64> {
    parse_value(endpoint, field, raw.trim_end_matches('s'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_value_handles_sdk_dec_strings() {
        assert_eq!(parse_value("/t", "rate", "0.100000000000000000"), Some(0.1));
        assert_eq!(parse_value("/t", "tokens", "1234567"), Some(1234567.0));
        assert_eq!(parse_value("/t", "tokens", "not-a-number"), None);
    }

    #[test]
    fn parse_seconds_strips_duration_suffix() {
        assert_eq!(parse_seconds("/t", "unbonding", "1814400s"), Some(1814400.0));
        assert_eq!(parse_seconds("/t", "jail", "600s"), Some(600.0));
        assert_eq!(parse_seconds("/t", "jail", "bogus"), None);
    }
}
