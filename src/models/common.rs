use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

use crate::models::errors::EngineError;
use crate::models::holders::DrawMode;
use crate::utils::rate_limiter::RateLimitConfig;
use crate::utils::retry::RetryConfig;

/// Functions a staking contract uses to hand custody back to the staker.
pub const TRANSFER_BACK_FUNCTIONS: [&str; 3] =
    ["ESDTNFTTransfer", "MultiESDTNFTTransfer", "ESDTTransfer"];

/// Every smart-contract address on the ledger starts with this prefix.
pub const SMART_CONTRACT_PREFIX: &str = "erd1qqqqqqqqqqqqqpgq";

const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub address: String,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: "0.0.0.0".to_string(),
            port: 9100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakingContractProfile {
    pub contract_address: String,
    pub stake_function_name: String,
    #[serde(default = "default_unstake_functions")]
    pub unstake_function_names: Vec<String>,
}

fn default_unstake_functions() -> Vec<String> {
    TRANSFER_BACK_FUNCTIONS.iter().map(|f| f.to_string()).collect()
}

impl StakingContractProfile {
    pub fn new(contract_address: impl Into<String>, stake_function_name: impl Into<String>) -> Self {
        Self {
            contract_address: contract_address.into(),
            stake_function_name: stake_function_name.into(),
            unstake_function_names: default_unstake_functions(),
        }
    }

    pub fn is_stake(&self, function: &str) -> bool {
        self.stake_function_name == function
    }

    pub fn is_unstake(&self, function: &str) -> bool {
        self.unstake_function_names.iter().any(|f| f == function)
    }

    /// Function names worth asking the transfers endpoint for.
    pub fn function_filter(&self) -> Vec<&str> {
        let mut functions = vec![self.stake_function_name.as_str()];
        functions.extend(self.unstake_function_names.iter().map(String::as_str));
        functions
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Nft,
    Sft,
    Esdt,
}

impl AssetType {
    /// NFTs are tracked per identifier; SFTs and fungible tokens per address balance.
    pub fn tracks_identifiers(self) -> bool {
        matches!(self, AssetType::Nft)
    }
}

/// Addresses that never count as holders.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExclusionRules {
    #[serde(default)]
    pub excluded_addresses: Vec<String>,
    #[serde(default)]
    pub exclude_smart_contracts: bool,
}

impl ExclusionRules {
    pub fn excludes(&self, address: &str) -> bool {
        (self.exclude_smart_contracts && address.starts_with(SMART_CONTRACT_PREFIX))
            || self.excluded_addresses.iter().any(|a| a == address)
    }
}

#[derive(Debug, Clone, Default)]
pub struct HolderOptions {
    pub include_reconciliation: bool,
    pub decimals: Option<u8>,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub asset_key: String,
    pub asset_type: AssetType,
    /// Staking profile label; without one the live holder listing is used instead of replay.
    pub profile: Option<String>,
    #[serde(default)]
    pub reconcile: bool,
    pub decimals: Option<u8>,
    pub winners: Option<usize>,
    #[serde(default)]
    pub draw_mode: DrawMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api_url: Url,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub exclusions: ExclusionRules,
    #[serde(default)]
    pub profiles: BTreeMap<String, StakingContractProfile>,
    #[serde(default)]
    pub metrics: MetricsConfig,
    pub job: Option<JobConfig>,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Config {
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            page_size: DEFAULT_PAGE_SIZE,
            rate_limit: RateLimitConfig::default(),
            retry: RetryConfig::default(),
            timeout_secs: None,
            exclusions: ExclusionRules::default(),
            profiles: BTreeMap::new(),
            metrics: MetricsConfig::default(),
            job: None,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.page_size == 0 {
            return Err(EngineError::InvalidConfig("page_size must be positive".to_string()));
        }
        if self.rate_limit.requests_per_interval == 0 || self.rate_limit.max_concurrency == 0 {
            return Err(EngineError::InvalidConfig(
                "rate_limit needs at least one request and one concurrent slot".to_string(),
            ));
        }
        if let Some((label, _)) = self
            .profiles
            .iter()
            .find(|(_, p)| p.contract_address.is_empty() || p.stake_function_name.is_empty())
        {
            return Err(EngineError::InvalidConfig(format!(
                "profile '{label}' needs a contract address and a stake function"
            )));
        }
        Ok(())
    }
}
