use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::config::Config;
use crate::types::*;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Thin query client over the node's REST (LCD) API and tendermint RPC.
/// One method per upstream concept; shared read-only across all concurrent
/// requests and tasks. Callers decide what a failed call means.
#[derive(Debug, Clone)]
pub struct NodeClient {
    http: Client,
    lcd_url: String,
    rpc_url: String,
    pagination_limit: u64,
}

impl NodeClient {
    pub fn new(config: &Config) -> Result<Self, BoxError> {
        // the same deadline the fan-out applies per task, so calls made
        // outside a task set cannot stall a scrape either
        let http = Client::builder().timeout(config.query_timeout).build()?;
        Ok(Self {
            http,
            lcd_url: config.node_url.trim_end_matches('/').to_string(),
            rpc_url: config.tendermint_rpc_url.trim_end_matches('/').to_string(),
            pagination_limit: config.pagination_limit,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, BoxError> {
        let response = self.http.get(&url).send().await?.error_for_status()?;
        Ok(response.json::<T>().await?)
    }

    // staking

    pub async fn validator(&self, address: &str) -> Result<Validator, BoxError> {
        let response: ValidatorResponse = self
            .get_json(format!("{}/cosmos/staking/v1beta1/validators/{address}", self.lcd_url))
            .await?;
        Ok(response.validator)
    }

    pub async fn validators(&self) -> Result<Vec<Validator>, BoxError> {
        let response: ValidatorsResponse = self
            .get_json(format!(
                "{}/cosmos/staking/v1beta1/validators?pagination.limit={}",
                self.lcd_url, self.pagination_limit
            ))
            .await?;
        Ok(response.validators)
    }

    pub async fn staking_params(&self) -> Result<StakingParams, BoxError> {
        let response: StakingParamsResponse = self
            .get_json(format!("{}/cosmos/staking/v1beta1/params", self.lcd_url))
            .await?;
        Ok(response.params)
    }

    pub async fn staking_pool(&self) -> Result<StakingPool, BoxError> {
        let response: StakingPoolResponse = self
            .get_json(format!("{}/cosmos/staking/v1beta1/pool", self.lcd_url))
            .await?;
        Ok(response.pool)
    }

    pub async fn delegator_delegations(&self, address: &str) -> Result<Vec<DelegationResponse>, BoxError> {
        let response: DelegationsResponse = self
            .get_json(format!(
                "{}/cosmos/staking/v1beta1/delegations/{address}",
                self.lcd_url
            ))
            .await?;
        Ok(response.delegation_responses)
    }

    pub async fn delegator_unbondings(&self, address: &str) -> Result<Vec<UnbondingDelegation>, BoxError> {
        let response: UnbondingsResponse = self
            .get_json(format!(
                "{}/cosmos/staking/v1beta1/delegators/{address}/unbonding_delegations",
                self.lcd_url
            ))
            .await?;
        Ok(response.unbonding_responses)
    }

    pub async fn delegator_redelegations(&self, address: &str) -> Result<Vec<RedelegationResponse>, BoxError> {
        let response: RedelegationsResponse = self
            .get_json(format!(
                "{}/cosmos/staking/v1beta1/delegators/{address}/redelegations",
                self.lcd_url
            ))
            .await?;
        Ok(response.redelegation_responses)
    }

    pub async fn validator_delegations(&self, address: &str) -> Result<Vec<DelegationResponse>, BoxError> {
        let response: DelegationsResponse = self
            .get_json(format!(
                "{}/cosmos/staking/v1beta1/validators/{address}/delegations?pagination.limit={}",
                self.lcd_url, self.pagination_limit
            ))
            .await?;
        Ok(response.delegation_responses)
    }

    pub async fn validator_unbondings(&self, address: &str) -> Result<Vec<UnbondingDelegation>, BoxError> {
        let response: UnbondingsResponse = self
            .get_json(format!(
                "{}/cosmos/staking/v1beta1/validators/{address}/unbonding_delegations",
                self.lcd_url
            ))
            .await?;
        Ok(response.unbonding_responses)
    }

    // slashing

    pub async fn signing_info(&self, consensus_address: &str) -> Result<SigningInfo, BoxError> {
        let response: SigningInfoResponse = self
            .get_json(format!(
                "{}/cosmos/slashing/v1beta1/signing_infos/{consensus_address}",
                self.lcd_url
            ))
            .await?;
        Ok(response.val_signing_info)
    }

    pub async fn signing_infos(&self) -> Result<Vec<SigningInfo>, BoxError> {
        let response: SigningInfosResponse = self
            .get_json(format!(
                "{}/cosmos/slashing/v1beta1/signing_infos?pagination.limit={}",
                self.lcd_url, self.pagination_limit
            ))
            .await?;
        Ok(response.info)
    }

    pub async fn slashing_params(&self) -> Result<SlashingParams, BoxError> {
        let response: SlashingParamsResponse = self
            .get_json(format!("{}/cosmos/slashing/v1beta1/params", self.lcd_url))
            .await?;
        Ok(response.params)
    }

    // mint

    pub async fn mint_params(&self) -> Result<MintParams, BoxError> {
        let response: MintParamsResponse = self
            .get_json(format!("{}/cosmos/mint/v1beta1/params", self.lcd_url))
            .await?;
        Ok(response.params)
    }

    pub async fn inflation(&self) -> Result<String, BoxError> {
        let response: InflationResponse = self
            .get_json(format!("{}/cosmos/mint/v1beta1/inflation", self.lcd_url))
            .await?;
        Ok(response.inflation)
    }

    pub async fn annual_provisions(&self) -> Result<String, BoxError> {
        let response: AnnualProvisionsResponse = self
            .get_json(format!("{}/cosmos/mint/v1beta1/annual_provisions", self.lcd_url))
            .await?;
        Ok(response.annual_provisions)
    }

    // distribution

    pub async fn distribution_params(&self) -> Result<DistributionParams, BoxError> {
        let response: DistributionParamsResponse = self
            .get_json(format!("{}/cosmos/distribution/v1beta1/params", self.lcd_url))
            .await?;
        Ok(response.params)
    }

    pub async fn community_pool(&self) -> Result<Vec<Coin>, BoxError> {
        let response: CommunityPoolResponse = self
            .get_json(format!(
                "{}/cosmos/distribution/v1beta1/community_pool",
                self.lcd_url
            ))
            .await?;
        Ok(response.pool)
    }

    pub async fn validator_commission(&self, address: &str) -> Result<Vec<Coin>, BoxError> {
        let response: CommissionResponse = self
            .get_json(format!(
                "{}/cosmos/distribution/v1beta1/validators/{address}/commission",
                self.lcd_url
            ))
            .await?;
        Ok(response.commission.commission)
    }

    pub async fn validator_outstanding_rewards(&self, address: &str) -> Result<Vec<Coin>, BoxError> {
        let response: OutstandingRewardsResponse = self
            .get_json(format!(
                "{}/cosmos/distribution/v1beta1/validators/{address}/outstanding_rewards",
                self.lcd_url
            ))
            .await?;
        Ok(response.rewards.rewards)
    }

    pub async fn delegator_rewards(&self, address: &str) -> Result<Vec<DelegatorReward>, BoxError> {
        let response: DelegatorRewardsResponse = self
            .get_json(format!(
                "{}/cosmos/distribution/v1beta1/delegators/{address}/rewards",
                self.lcd_url
            ))
            .await?;
        Ok(response.rewards)
    }

    // bank

    pub async fn balances(&self, address: &str) -> Result<Vec<Coin>, BoxError> {
        let response: BalancesResponse = self
            .get_json(format!("{}/cosmos/bank/v1beta1/balances/{address}", self.lcd_url))
            .await?;
        Ok(response.balances)
    }

    pub async fn total_supply(&self) -> Result<Vec<Coin>, BoxError> {
        let response: SupplyResponse = self
            .get_json(format!(
                "{}/cosmos/bank/v1beta1/supply?pagination.limit={}",
                self.lcd_url, self.pagination_limit
            ))
            .await?;
        Ok(response.supply)
    }

    pub async fn denoms_metadata(&self) -> Result<Vec<DenomMetadata>, BoxError> {
        let response: DenomsMetadataResponse = self
            .get_json(format!("{}/cosmos/bank/v1beta1/denoms_metadata", self.lcd_url))
            .await?;
        Ok(response.metadatas)
    }

    // gov

    pub async fn proposals(&self, voting_period_only: bool) -> Result<Vec<Proposal>, BoxError> {
        let filter = if voting_period_only {
            "?proposal_status=2"
        } else {
            ""
        };
        let response: ProposalsResponse = self
            .get_json(format!("{}/cosmos/gov/v1beta1/proposals{filter}", self.lcd_url))
            .await?;
        Ok(response.proposals)
    }

    // upgrade

    pub async fn current_upgrade_plan(&self) -> Result<Option<UpgradePlan>, BoxError> {
        let response: UpgradePlanResponse = self
            .get_json(format!("{}/cosmos/upgrade/v1beta1/current_plan", self.lcd_url))
            .await?;
        Ok(response.plan)
    }

    // oracle

    pub async fn oracle_miss_counter(&self, address: &str) -> Result<String, BoxError> {
        let response: MissCounterResponse = self
            .get_json(format!("{}/oracle/validators/{address}/miss", self.lcd_url))
            .await?;
        Ok(response.miss_counter)
    }

    // tendermint rpc

    pub async fn status(&self) -> Result<Status, BoxError> {
        let response: StatusResponse = self.get_json(format!("{}/status", self.rpc_url)).await?;
        Ok(response.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use tokio::net::TcpListener;

    fn config(node_url: &str, query_timeout: Duration) -> Config {
        Config {
            listen_address: "127.0.0.1:9300".to_string(),
            node_url: node_url.to_string(),
            tendermint_rpc_url: node_url.to_string(),
            denom: None,
            denom_coefficient: None,
            denom_exponent: None,
            account_prefix: "cosmos".to_string(),
            validator_prefix: "cosmosvaloper".to_string(),
            consensus_prefix: "cosmosvalcons".to_string(),
            validators: Vec::new(),
            wallets: Vec::new(),
            oracle: false,
            pagination_limit: 1000,
            query_timeout,
            log_level: "info".to_string(),
        }
    }

    #[tokio::test]
    async fn calls_fail_within_the_configured_deadline() {
        // a server that accepts connections and never answers
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                open.push(socket);
            }
        });

        let client =
            NodeClient::new(&config(&format!("http://{addr}"), Duration::from_millis(200)))
                .unwrap();

        let started = Instant::now();
        let result = client.validator("cosmosvaloper1xxx").await;
        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
