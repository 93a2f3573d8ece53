//! Pure computations over already-fetched chain data: stake ranking,
//! active-set membership, signing-info correlation and upgrade-height time
//! estimation. Nothing here touches the network.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

use chrono::{DateTime, Duration, Utc};

use crate::types::{SigningInfo, SyncInfo, UpgradePlan, Validator, BOND_STATUS_BONDED};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstimationError(String);

impl fmt::Display for EstimationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Error for EstimationError {}

fn is_bonded(v: &Validator) -> bool {
    v.status == BOND_STATUS_BONDED
}

// unparseable shares sort as zero stake; the per-field error is logged where
// the value is rendered, not here
fn shares(v: &Validator) -> f64 {
    v.delegator_shares.parse().unwrap_or(0.0)
}

/// Order validators for ranking: every bonded validator above every
/// non-bonded one, then descending delegator shares within a partition.
/// The sort is stable, so exact stake ties keep upstream list order.
/// A validator's rank is its 1-based position in the returned order.
pub fn rank_validators(mut validators: Vec<Validator>) -> Vec<Validator> {
    validators.sort_by(|a, b| {
        match is_bonded(b).cmp(&is_bonded(a)) {
            Ordering::Equal => {}
            unequal => return unequal,
        }
        shares(b).partial_cmp(&shares(a)).unwrap_or(Ordering::Equal)
    });
    validators
}

/// 1-based rank of the given operator address in an already-ranked list.
pub fn rank_of(ranked: &[Validator], operator_address: &str) -> Option<usize> {
    ranked
        .iter()
        .position(|v| v.operator_address == operator_address)
        .map(|index| index + 1)
}

/// Active iff the rank fits the chain's configured validator-set size.
pub fn is_active(rank: usize, max_validators: u32) -> bool {
    rank <= max_validators as usize
}

/// Index signing infos by consensus address for the per-validator join.
/// Validators without an entry get no missed-blocks metric at all; absence
/// must not be conflated with zero missed blocks.
pub fn signing_info_index(infos: Vec<SigningInfo>) -> BTreeMap<String, SigningInfo> {
    infos
        .into_iter()
        .map(|info| (info.address.clone(), info))
        .collect()
}

/// Block heights and times sampled from tendermint `/status`, parsed once.
#[derive(Debug, Clone)]
pub struct ChainTiming {
    pub latest_height: i64,
    pub latest_time: DateTime<Utc>,
    pub earliest_height: i64,
    pub earliest_time: DateTime<Utc>,
}

impl ChainTiming {
    pub fn from_sync_info(sync: &SyncInfo) -> Result<Self, EstimationError> {
        let parse_height = |raw: &str| {
            raw.parse::<i64>()
                .map_err(|e| EstimationError(format!("bad block height {raw:?}: {e}")))
        };
        let parse_time = |raw: &str| {
            DateTime::parse_from_rfc3339(raw)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| EstimationError(format!("bad block time {raw:?}: {e}")))
        };

        Ok(Self {
            latest_height: parse_height(&sync.latest_block_height)?,
            latest_time: parse_time(&sync.latest_block_time)?,
            earliest_height: parse_height(&sync.earliest_block_height)?,
            earliest_time: parse_time(&sync.earliest_block_time)?,
        })
    }

    /// Average block production time in seconds over the sampled span.
    pub fn average_block_time(&self) -> Result<f64, EstimationError> {
        let height_span = self.latest_height - self.earliest_height;
        if height_span == 0 {
            return Err(EstimationError("zero block-height span in status sample".into()));
        }
        let elapsed_ms = (self.latest_time - self.earliest_time).num_milliseconds();
        Ok(elapsed_ms as f64 / 1000.0 / height_span as f64)
    }
}

/// Upgrade plan rendering states, recomputed fresh on every request.
/// `NoneScheduled` and `HeightReached` both render the sentinel zero; only
/// `Scheduled` carries an estimate.
#[derive(Debug, Clone, PartialEq)]
pub enum UpgradeState {
    NoneScheduled,
    Scheduled {
        remaining_height: i64,
        estimated_time: DateTime<Utc>,
    },
    HeightReached,
}

/// Estimate when a scheduled upgrade height will be reached, from the block
/// rate observed in the status sample. Absence of a plan is a distinct,
/// always-present signal, not a missing metric.
pub fn estimate_upgrade(
    plan: Option<&UpgradePlan>,
    timing: &ChainTiming,
) -> Result<UpgradeState, EstimationError> {
    let plan = match plan {
        Some(plan) => plan,
        None => return Ok(UpgradeState::NoneScheduled),
    };

    let target_height: i64 = plan
        .height
        .parse()
        .map_err(|e| EstimationError(format!("bad upgrade height {:?}: {e}", plan.height)))?;

    if target_height <= timing.latest_height {
        return Ok(UpgradeState::HeightReached);
    }

    let avg_seconds = timing.average_block_time()?;
    let remaining_height = target_height - timing.latest_height;
    let remaining =
        Duration::milliseconds((remaining_height as f64 * avg_seconds * 1000.0) as i64);

    Ok(UpgradeState::Scheduled {
        remaining_height,
        estimated_time: timing.latest_time + remaining,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Commission, CommissionRates, Description};

    fn validator(address: &str, status: &str, shares: &str) -> Validator {
        Validator {
            operator_address: address.to_string(),
            consensus_pubkey: None,
            jailed: false,
            status: status.to_string(),
            tokens: "0".to_string(),
            delegator_shares: shares.to_string(),
            description: Description {
                moniker: address.to_string(),
            },
            min_self_delegation: "1".to_string(),
            commission: Commission {
                commission_rates: CommissionRates {
                    rate: "0.1".to_string(),
                },
            },
        }
    }

    fn timing(
        earliest_height: i64,
        latest_height: i64,
        earliest: &str,
        latest: &str,
    ) -> ChainTiming {
        ChainTiming::from_sync_info(&SyncInfo {
            latest_block_height: latest_height.to_string(),
            latest_block_time: latest.to_string(),
            earliest_block_height: earliest_height.to_string(),
            earliest_block_time: earliest.to_string(),
        })
        .unwrap()
    }

    #[test]
    fn bonded_validators_rank_above_unbonded_regardless_of_stake() {
        let ranked = rank_validators(vec![
            validator("whale", "BOND_STATUS_UNBONDED", "9000000"),
            validator("small-bonded", BOND_STATUS_BONDED, "10"),
            validator("mid-bonded", BOND_STATUS_BONDED, "500"),
            validator("unbonding", "BOND_STATUS_UNBONDING", "100"),
        ]);

        let order: Vec<&str> = ranked.iter().map(|v| v.operator_address.as_str()).collect();
        assert_eq!(order, vec!["mid-bonded", "small-bonded", "whale", "unbonding"]);
        assert_eq!(rank_of(&ranked, "mid-bonded"), Some(1));
        assert_eq!(rank_of(&ranked, "whale"), Some(3));
        assert_eq!(rank_of(&ranked, "nobody"), None);
    }

    #[test]
    fn rank_is_non_increasing_in_stake_within_a_partition() {
        let ranked = rank_validators(vec![
            validator("a", BOND_STATUS_BONDED, "1"),
            validator("b", BOND_STATUS_BONDED, "300"),
            validator("c", BOND_STATUS_BONDED, "200"),
        ]);

        let shares: Vec<f64> = ranked
            .iter()
            .map(|v| v.delegator_shares.parse().unwrap())
            .collect();
        assert!(shares.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn exact_stake_ties_keep_input_order() {
        let ranked = rank_validators(vec![
            validator("first", BOND_STATUS_BONDED, "100"),
            validator("second", BOND_STATUS_BONDED, "100"),
            validator("third", BOND_STATUS_BONDED, "100"),
        ]);

        let order: Vec<&str> = ranked.iter().map(|v| v.operator_address.as_str()).collect();
        assert_eq!(order, vec!["first", "second", "third"]);
    }

    #[test]
    fn active_set_follows_configured_size_without_resorting() {
        let ranked = rank_validators(vec![
            validator("a", BOND_STATUS_BONDED, "300"),
            validator("b", BOND_STATUS_BONDED, "200"),
            validator("c", BOND_STATUS_BONDED, "100"),
        ]);

        let rank_c = rank_of(&ranked, "c").unwrap();
        assert!(!is_active(rank_c, 2));
        assert!(is_active(rank_c, 3));
        assert!(is_active(rank_of(&ranked, "a").unwrap(), 1));
    }

    #[test]
    fn signing_join_never_invents_entries() {
        let index = signing_info_index(vec![
            SigningInfo {
                address: "cosmosvalcons1aaa".to_string(),
                missed_blocks_counter: "12".to_string(),
            },
            SigningInfo {
                address: "cosmosvalcons1bbb".to_string(),
                missed_blocks_counter: "0".to_string(),
            },
        ]);

        assert_eq!(
            index.get("cosmosvalcons1aaa").unwrap().missed_blocks_counter,
            "12"
        );
        assert!(index.get("cosmosvalcons1zzz").is_none());
    }

    #[test]
    fn upgrade_estimation_matches_expected_arithmetic() {
        // 50 blocks over 500s -> 10s per block; 50 blocks to go -> T+500s
        let timing = timing(50, 100, "2023-05-01T00:01:40Z", "2023-05-01T00:10:00Z");
        assert_eq!(timing.average_block_time().unwrap(), 10.0);

        let plan = UpgradePlan {
            name: "v9".to_string(),
            info: "info".to_string(),
            height: "150".to_string(),
        };

        match estimate_upgrade(Some(&plan), &timing).unwrap() {
            UpgradeState::Scheduled {
                remaining_height,
                estimated_time,
            } => {
                assert_eq!(remaining_height, 50);
                assert_eq!(
                    estimated_time,
                    DateTime::parse_from_rfc3339("2023-05-01T00:18:20Z").unwrap()
                );
            }
            other => panic!("expected a scheduled estimate, got {other:?}"),
        }
    }

    #[test]
    fn passed_upgrade_height_collapses_to_sentinel_state() {
        let timing = timing(50, 100, "2023-05-01T00:01:40Z", "2023-05-01T00:10:00Z");
        let plan = UpgradePlan {
            name: "v9".to_string(),
            info: String::new(),
            height: "90".to_string(),
        };

        assert_eq!(
            estimate_upgrade(Some(&plan), &timing).unwrap(),
            UpgradeState::HeightReached
        );
    }

    #[test]
    fn missing_plan_is_a_distinct_state() {
        let timing = timing(50, 100, "2023-05-01T00:01:40Z", "2023-05-01T00:10:00Z");
        assert_eq!(
            estimate_upgrade(None, &timing).unwrap(),
            UpgradeState::NoneScheduled
        );
    }

    #[test]
    fn zero_height_span_fails_locally() {
        let timing = timing(100, 100, "2023-05-01T00:10:00Z", "2023-05-01T00:10:00Z");
        assert!(timing.average_block_time().is_err());

        let plan = UpgradePlan {
            name: "v9".to_string(),
            info: String::new(),
            height: "150".to_string(),
        };
        assert!(estimate_upgrade(Some(&plan), &timing).is_err());
    }
}
