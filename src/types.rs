use serde::Deserialize;

// cosmos-sdk bond status strings
pub const BOND_STATUS_BONDED: &str = "BOND_STATUS_BONDED";
pub const BOND_STATUS_UNBONDING: &str = "BOND_STATUS_UNBONDING";
pub const BOND_STATUS_UNBONDED: &str = "BOND_STATUS_UNBONDED";

// numeric code matching the sdk's BondStatus enum, exported as-is
pub fn bond_status_code(status: &str) -> f64 {
    match status {
        BOND_STATUS_BONDED => 3.0,
        BOND_STATUS_UNBONDING => 2.0,
        BOND_STATUS_UNBONDED => 1.0,
        _ => 0.0,
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct Coin {
    pub denom: String,
    pub amount: String,
}

// staking

#[derive(Deserialize, Debug)]
pub struct ValidatorResponse {
    pub validator: Validator,
}

#[derive(Deserialize, Debug)]
pub struct ValidatorsResponse {
    pub validators: Vec<Validator>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Validator {
    pub operator_address: String,
    pub consensus_pubkey: Option<ConsensusPubkey>,
    #[serde(default)]
    pub jailed: bool,
    pub status: String,
    pub tokens: String,
    pub delegator_shares: String,
    pub description: Description,
    pub min_self_delegation: String,
    pub commission: Commission,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ConsensusPubkey {
    #[serde(rename = "@type")]
    pub type_url: String,
    pub key: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Description {
    pub moniker: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Commission {
    pub commission_rates: CommissionRates,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CommissionRates {
    pub rate: String,
}

#[derive(Deserialize, Debug)]
pub struct StakingParamsResponse {
    pub params: StakingParams,
}

#[derive(Deserialize, Debug, Clone)]
pub struct StakingParams {
    // duration string like "1814400s"
    pub unbonding_time: String,
    pub max_validators: u32,
}

#[derive(Deserialize, Debug)]
pub struct StakingPoolResponse {
    pub pool: StakingPool,
}

#[derive(Deserialize, Debug)]
pub struct StakingPool {
    pub bonded_tokens: String,
    pub not_bonded_tokens: String,
}

#[derive(Deserialize, Debug)]
pub struct DelegationsResponse {
    pub delegation_responses: Vec<DelegationResponse>,
}

#[derive(Deserialize, Debug)]
pub struct DelegationResponse {
    pub delegation: Delegation,
    pub balance: Coin,
}

#[derive(Deserialize, Debug)]
pub struct Delegation {
    pub validator_address: String,
}

#[derive(Deserialize, Debug)]
pub struct UnbondingsResponse {
    pub unbonding_responses: Vec<UnbondingDelegation>,
}

#[derive(Deserialize, Debug)]
pub struct UnbondingDelegation {
    pub delegator_address: String,
    pub validator_address: String,
    pub entries: Vec<UnbondingEntry>,
}

#[derive(Deserialize, Debug)]
pub struct UnbondingEntry {
    pub balance: String,
}

#[derive(Deserialize, Debug)]
pub struct RedelegationsResponse {
    pub redelegation_responses: Vec<RedelegationResponse>,
}

#[derive(Deserialize, Debug)]
pub struct RedelegationResponse {
    pub redelegation: Redelegation,
    pub entries: Vec<RedelegationEntry>,
}

#[derive(Deserialize, Debug)]
pub struct Redelegation {
    pub delegator_address: String,
    pub validator_src_address: String,
    pub validator_dst_address: String,
}

#[derive(Deserialize, Debug)]
pub struct RedelegationEntry {
    pub balance: String,
}

// slashing

#[derive(Deserialize, Debug)]
pub struct SigningInfoResponse {
    pub val_signing_info: SigningInfo,
}

#[derive(Deserialize, Debug)]
pub struct SigningInfosResponse {
    pub info: Vec<SigningInfo>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SigningInfo {
    // consensus address, not the operator address
    pub address: String,
    pub missed_blocks_counter: String,
}

#[derive(Deserialize, Debug)]
pub struct SlashingParamsResponse {
    pub params: SlashingParams,
}

#[derive(Deserialize, Debug)]
pub struct SlashingParams {
    pub signed_blocks_window: String,
    pub min_signed_per_window: String,
    pub downtime_jail_duration: String,
    pub slash_fraction_double_sign: String,
    pub slash_fraction_downtime: String,
}

// mint

#[derive(Deserialize, Debug)]
pub struct MintParamsResponse {
    pub params: MintParams,
}

#[derive(Deserialize, Debug)]
pub struct MintParams {
    pub blocks_per_year: String,
    pub goal_bonded: String,
    pub inflation_min: String,
    pub inflation_max: String,
    pub inflation_rate_change: String,
}

#[derive(Deserialize, Debug)]
pub struct InflationResponse {
    pub inflation: String,
}

#[derive(Deserialize, Debug)]
pub struct AnnualProvisionsResponse {
    pub annual_provisions: String,
}

// distribution

#[derive(Deserialize, Debug)]
pub struct DistributionParamsResponse {
    pub params: DistributionParams,
}

#[derive(Deserialize, Debug)]
pub struct DistributionParams {
    pub community_tax: String,
    pub base_proposer_reward: String,
    pub bonus_proposer_reward: String,
}

#[derive(Deserialize, Debug)]
pub struct CommunityPoolResponse {
    pub pool: Vec<Coin>,
}

#[derive(Deserialize, Debug)]
pub struct CommissionResponse {
    pub commission: CommissionCoins,
}

#[derive(Deserialize, Debug)]
pub struct CommissionCoins {
    pub commission: Vec<Coin>,
}

#[derive(Deserialize, Debug)]
pub struct OutstandingRewardsResponse {
    pub rewards: OutstandingRewards,
}

#[derive(Deserialize, Debug)]
pub struct OutstandingRewards {
    pub rewards: Vec<Coin>,
}

#[derive(Deserialize, Debug)]
pub struct DelegatorRewardsResponse {
    pub rewards: Vec<DelegatorReward>,
}

#[derive(Deserialize, Debug)]
pub struct DelegatorReward {
    pub validator_address: String,
    pub reward: Vec<Coin>,
}

// bank

#[derive(Deserialize, Debug)]
pub struct BalancesResponse {
    pub balances: Vec<Coin>,
}

#[derive(Deserialize, Debug)]
pub struct SupplyResponse {
    pub supply: Vec<Coin>,
}

#[derive(Deserialize, Debug)]
pub struct DenomsMetadataResponse {
    pub metadatas: Vec<DenomMetadata>,
}

#[derive(Deserialize, Debug)]
pub struct DenomMetadata {
    pub display: String,
    pub denom_units: Vec<DenomUnit>,
}

#[derive(Deserialize, Debug)]
pub struct DenomUnit {
    pub denom: String,
    pub exponent: u32,
}

// gov

#[derive(Deserialize, Debug)]
pub struct ProposalsResponse {
    pub proposals: Vec<Proposal>,
}

#[derive(Deserialize, Debug)]
pub struct Proposal {
    pub proposal_id: String,
    #[serde(default)]
    pub content: ProposalContent,
    pub status: String,
    pub voting_start_time: String,
    pub voting_end_time: String,
}

#[derive(Deserialize, Debug, Default)]
pub struct ProposalContent {
    #[serde(default)]
    pub title: String,
}

// upgrade

#[derive(Deserialize, Debug)]
pub struct UpgradePlanResponse {
    pub plan: Option<UpgradePlan>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct UpgradePlan {
    pub name: String,
    #[serde(default)]
    pub info: String,
    pub height: String,
}

// oracle (kujira-style miss counter)

#[derive(Deserialize, Debug)]
pub struct MissCounterResponse {
    pub miss_counter: String,
}

// tendermint rpc /status

#[derive(Deserialize, Debug)]
pub struct StatusResponse {
    pub result: Status,
}

#[derive(Deserialize, Debug)]
pub struct Status {
    pub node_info: NodeInfo,
    pub sync_info: SyncInfo,
}

#[derive(Deserialize, Debug)]
pub struct NodeInfo {
    pub network: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SyncInfo {
    pub latest_block_height: String,
    pub latest_block_time: String,
    pub earliest_block_height: String,
    pub earliest_block_time: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validator_deserializes_from_lcd_shape() {
        let raw = r#"{
            "validator": {
                "operator_address": "cosmosvaloper1xxx",
                "consensus_pubkey": {
                    "@type": "/cosmos.crypto.ed25519.PubKey",
                    "key": "SBZ8+2GKLNoTXZjwGzNMADXCtFnm1wpf4HR0ZcBZ/Oc="
                },
                "jailed": false,
                "status": "BOND_STATUS_BONDED",
                "tokens": "1234567",
                "delegator_shares": "1234567.000000000000000000",
                "description": {"moniker": "validator-one", "identity": "", "details": ""},
                "unbonding_height": "0",
                "min_self_delegation": "1",
                "commission": {
                    "commission_rates": {
                        "rate": "0.100000000000000000",
                        "max_rate": "0.200000000000000000",
                        "max_change_rate": "0.010000000000000000"
                    },
                    "update_time": "2021-01-01T00:00:00Z"
                }
            }
        }"#;

        let parsed: ValidatorResponse = serde_json::from_str(raw).unwrap();
        let v = parsed.validator;
        assert_eq!(v.operator_address, "cosmosvaloper1xxx");
        assert_eq!(v.description.moniker, "validator-one");
        assert_eq!(v.status, BOND_STATUS_BONDED);
        assert_eq!(v.commission.commission_rates.rate, "0.100000000000000000");
        assert!(v.consensus_pubkey.unwrap().type_url.ends_with("ed25519.PubKey"));
    }

    #[test]
    fn upgrade_plan_absence_is_a_none() {
        let parsed: UpgradePlanResponse = serde_json::from_str(r#"{"plan": null}"#).unwrap();
        assert!(parsed.plan.is_none());

        let parsed: UpgradePlanResponse = serde_json::from_str(
            r#"{"plan": {"name": "v12", "time": "0001-01-01T00:00:00Z", "height": "4000000", "info": "upgrade info"}}"#,
        )
        .unwrap();
        let plan = parsed.plan.unwrap();
        assert_eq!(plan.name, "v12");
        assert_eq!(plan.height, "4000000");
    }

    #[test]
    fn tendermint_status_parses_sync_info() {
        let raw = r#"{
            "jsonrpc": "2.0",
            "id": -1,
            "result": {
                "node_info": {"network": "test-chain-1", "moniker": "node"},
                "sync_info": {
                    "latest_block_hash": "AA",
                    "latest_block_height": "100",
                    "latest_block_time": "2023-05-01T00:10:00Z",
                    "earliest_block_height": "50",
                    "earliest_block_time": "2023-05-01T00:01:40Z",
                    "catching_up": false
                }
            }
        }"#;

        let parsed: StatusResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.result.node_info.network, "test-chain-1");
        assert_eq!(parsed.result.sync_info.latest_block_height, "100");
    }

    #[test]
    fn bond_status_codes_match_sdk_enum() {
        assert_eq!(bond_status_code(BOND_STATUS_BONDED), 3.0);
        assert_eq!(bond_status_code(BOND_STATUS_UNBONDING), 2.0);
        assert_eq!(bond_status_code(BOND_STATUS_UNBONDED), 1.0);
        assert_eq!(bond_status_code("BOND_STATUS_UNSPECIFIED"), 0.0);
    }
}
