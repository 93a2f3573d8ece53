use std::fs;
use std::time::Duration;

use clap::Parser;
use log::{debug, info};
use serde::Deserialize;

use crate::client::{BoxError, NodeClient};

// argument parser format; any flag can also come from the yaml config file
#[derive(Parser, Debug, Clone)]
#[command(version, about = "Scrape validators, wallets and chain parameters of a Cosmos-SDK network")]
pub struct Args {
    /// Optional yaml config file; values set in it override flags
    #[arg(long)]
    pub config: Option<String>,

    #[arg(long, default_value_t = String::from("127.0.0.1:9300"))]
    pub listen_address: String,

    /// Node REST (LCD) endpoint
    #[arg(long, default_value_t = String::from("http://localhost:1317"))]
    pub node: String,

    #[arg(long, default_value_t = String::from("http://localhost:26657"))]
    pub tendermint_rpc: String,

    /// Display denom; resolved from bank metadata when omitted
    #[arg(long)]
    pub denom: Option<String>,

    #[arg(long)]
    pub denom_coefficient: Option<f64>,

    #[arg(long)]
    pub denom_exponent: Option<u32>,

    /// Bech32 global prefix; per-kind prefixes derive from it unless overridden
    #[arg(long, default_value_t = String::from("cosmos"))]
    pub bech_prefix: String,

    #[arg(long)]
    pub bech_account_prefix: Option<String>,

    #[arg(long)]
    pub bech_validator_prefix: Option<String>,

    #[arg(long)]
    pub bech_consensus_prefix: Option<String>,

    /// Validator addresses for the combined single-scrape endpoint
    #[arg(long)]
    pub validators: Vec<String>,

    /// Wallet addresses for the combined single-scrape endpoint
    #[arg(long)]
    pub wallets: Vec<String>,

    /// Also scrape the oracle miss counter for each configured validator
    #[arg(long)]
    pub oracle: bool,

    /// Pagination limit for list queries
    #[arg(long, default_value_t = 1000)]
    pub limit: u64,

    /// Deadline for each upstream query within one scrape
    #[arg(long, default_value_t = 10)]
    pub query_timeout: u64,

    #[arg(long, default_value_t = String::from("info"))]
    pub log_level: String,
}

// yaml config format, every field optional
#[derive(Deserialize, Debug, Default)]
pub struct FileConfig {
    pub listen_address: Option<String>,
    pub node: Option<String>,
    pub tendermint_rpc: Option<String>,
    pub denom: Option<String>,
    pub denom_coefficient: Option<f64>,
    pub denom_exponent: Option<u32>,
    pub bech_prefix: Option<String>,
    pub bech_account_prefix: Option<String>,
    pub bech_validator_prefix: Option<String>,
    pub bech_consensus_prefix: Option<String>,
    pub validators: Option<Vec<String>>,
    pub wallets: Option<Vec<String>>,
    pub oracle: Option<bool>,
    pub limit: Option<u64>,
    pub query_timeout: Option<u64>,
    pub log_level: Option<String>,
}

impl FileConfig {
    pub fn load(path: &str) -> Result<Self, BoxError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&raw)?)
    }
}

/// Immutable process configuration, resolved once at startup and shared as
/// read-only context by every request.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_address: String,
    pub node_url: String,
    pub tendermint_rpc_url: String,
    pub denom: Option<String>,
    pub denom_coefficient: Option<f64>,
    pub denom_exponent: Option<u32>,
    pub account_prefix: String,
    pub validator_prefix: String,
    pub consensus_prefix: String,
    pub validators: Vec<String>,
    pub wallets: Vec<String>,
    pub oracle: bool,
    pub pagination_limit: u64,
    pub query_timeout: Duration,
    pub log_level: String,
}

impl Config {
    pub fn resolve(args: Args) -> Result<Self, BoxError> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        let bech_prefix = file.bech_prefix.unwrap_or(args.bech_prefix);
        let denom_coefficient = file.denom_coefficient.or(args.denom_coefficient);
        let denom_exponent = file.denom_exponent.or(args.denom_exponent);

        if denom_coefficient.is_some() && denom_exponent.is_some() {
            return Err("denom-coefficient and denom-exponent are both provided, must provide only one".into());
        }

        Ok(Self {
            listen_address: file.listen_address.unwrap_or(args.listen_address),
            node_url: file.node.unwrap_or(args.node),
            tendermint_rpc_url: file.tendermint_rpc.unwrap_or(args.tendermint_rpc),
            denom: file.denom.or(args.denom),
            denom_coefficient,
            denom_exponent,
            account_prefix: file
                .bech_account_prefix
                .or(args.bech_account_prefix)
                .unwrap_or_else(|| bech_prefix.clone()),
            validator_prefix: file
                .bech_validator_prefix
                .or(args.bech_validator_prefix)
                .unwrap_or_else(|| format!("{bech_prefix}valoper")),
            consensus_prefix: file
                .bech_consensus_prefix
                .or(args.bech_consensus_prefix)
                .unwrap_or_else(|| format!("{bech_prefix}valcons")),
            validators: file.validators.unwrap_or(args.validators),
            wallets: file.wallets.unwrap_or(args.wallets),
            oracle: file.oracle.unwrap_or(args.oracle),
            pagination_limit: file.limit.unwrap_or(args.limit),
            query_timeout: Duration::from_secs(file.query_timeout.unwrap_or(args.query_timeout)),
            log_level: file.log_level.unwrap_or(args.log_level),
        })
    }
}

/// Chain facts resolved once at startup: the chain id labels every metric,
/// the denom and its coefficient scale every token amount.
#[derive(Debug, Clone)]
pub struct ChainInfo {
    pub chain_id: String,
    pub denom: String,
    pub denom_coefficient: f64,
}

impl ChainInfo {
    pub async fn resolve(config: &Config, client: &NodeClient) -> Result<Self, BoxError> {
        let status = client.status().await?;
        let chain_id = status.node_info.network;
        info!("Got chain id {chain_id} from tendermint status");

        if let Some(denom) = &config.denom {
            if let Some(coefficient) = config.denom_coefficient {
                info!("Using provided denom {denom} with coefficient {coefficient}");
                return Ok(Self {
                    chain_id,
                    denom: denom.clone(),
                    denom_coefficient: coefficient,
                });
            }
            if let Some(exponent) = config.denom_exponent {
                let coefficient = 10f64.powi(exponent as i32);
                info!("Using provided denom {denom} with exponent {exponent} (coefficient {coefficient})");
                return Ok(Self {
                    chain_id,
                    denom: denom.clone(),
                    denom_coefficient: coefficient,
                });
            }
        }

        let metadatas = client.denoms_metadata().await?;
        let metadata = metadatas
            .first()
            .ok_or("no denom metadata on chain, run with --denom and --denom-coefficient")?;

        // always using the first metadata entry, display denom unless overridden
        let denom = config
            .denom
            .clone()
            .unwrap_or_else(|| metadata.display.clone());

        for unit in &metadata.denom_units {
            debug!("Denom unit {} with exponent {}", unit.denom, unit.exponent);
            if unit.denom == denom {
                let coefficient = 10f64.powi(unit.exponent as i32);
                info!("Got denom {denom} with coefficient {coefficient} from bank metadata");
                return Ok(Self {
                    chain_id,
                    denom,
                    denom_coefficient: coefficient,
                });
            }
        }

        Err(format!("could not find denom info for {denom}").into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> Args {
        Args::parse_from(["cosmos-exporter"])
    }

    #[test]
    fn prefixes_derive_from_global_bech_prefix() {
        let mut a = args();
        a.bech_prefix = "persistence".to_string();
        let config = Config::resolve(a).unwrap();

        assert_eq!(config.account_prefix, "persistence");
        assert_eq!(config.validator_prefix, "persistencevaloper");
        assert_eq!(config.consensus_prefix, "persistencevalcons");
    }

    #[test]
    fn per_kind_prefix_overrides_win() {
        let mut a = args();
        a.bech_prefix = "iris".to_string();
        a.bech_validator_prefix = Some("iva".to_string());
        let config = Config::resolve(a).unwrap();

        assert_eq!(config.account_prefix, "iris");
        assert_eq!(config.validator_prefix, "iva");
    }

    #[test]
    fn coefficient_and_exponent_are_mutually_exclusive() {
        let mut a = args();
        a.denom = Some("atom".to_string());
        a.denom_coefficient = Some(1_000_000.0);
        a.denom_exponent = Some(6);
        assert!(Config::resolve(a).is_err());
    }

    #[test]
    fn file_values_override_flags() {
        let path = std::env::temp_dir().join("cosmos-exporter-config-test.yml");
        fs::write(
            &path,
            "node: http://node:1317\nlimit: 42\nvalidators:\n  - cosmosvaloper1xxx\n  - cosmosvaloper1yyy\nwallets:\n  - cosmos1zzz\n",
        )
        .unwrap();

        let mut a = args();
        a.config = Some(path.to_str().unwrap().to_string());
        let config = Config::resolve(a).unwrap();

        assert_eq!(config.node_url, "http://node:1317");
        assert_eq!(config.pagination_limit, 42);
        assert_eq!(config.validators, vec!["cosmosvaloper1xxx", "cosmosvaloper1yyy"]);
        assert_eq!(config.wallets, vec!["cosmos1zzz"]);
        assert!(!config.oracle);
        // untouched fields keep their flag defaults
        assert_eq!(config.tendermint_rpc_url, "http://localhost:26657");

        fs::remove_file(path).ok();
    }
}
