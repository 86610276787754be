pub mod aggregate;
pub mod api;
pub mod client;
pub mod fetcher;
pub mod pagination;
pub mod reconcile;
pub mod replay;
pub mod selector;
pub mod transformations;

use alloy_primitives::U256;
use opentelemetry::KeyValue;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::indexer::aggregate::{aggregate, exclude_holders};
use crate::indexer::api::ApiEndpoints;
use crate::indexer::client::HttpClient;
use crate::indexer::fetcher::RateLimitedFetcher;
use crate::indexer::pagination::{PageQuery, PaginatedCollector};
use crate::indexer::reconcile::{reconcile_balances, reconcile_identifiers};
use crate::indexer::replay::replay;
use crate::indexer::selector::{select, select_weighted};
use crate::indexer::transformations::decode_records;
use crate::indexer::transformations::events::normalize_records;
use crate::metrics::Metrics;
use crate::models::common::{AssetType, Config, HolderOptions, StakingContractProfile};
use crate::models::errors::{EngineError, FetchError};
use crate::models::holders::{
    DrawMode, HolderReport, HolderState, Holding, OwnershipStat, WinnerSelection,
};
use crate::models::inventory::{
    RawAccountBalance, RawInventoryNft, RawOwnedNft, RawTokenBalance, RawTokenMetadata,
};
use crate::utils::unit_scale;

/// Reconstructs holder sets from the ledger API. Holds no state between calls.
pub struct HolderIndexer<C> {
    client: C,
    endpoints: ApiEndpoints,
    config: Config,
    metrics: Option<Arc<Metrics>>,
}

impl<C: HttpClient + Clone> HolderIndexer<C> {
    pub fn new(client: C, config: Config, metrics: Option<Arc<Metrics>>) -> Result<Self, EngineError> {
        config.validate()?;
        let endpoints = ApiEndpoints::new(config.api_url.clone())?;
        Ok(Self {
            client,
            endpoints,
            config,
            metrics,
        })
    }

    pub fn profile(&self, label: &str) -> Result<&StakingContractProfile, EngineError> {
        self.config
            .profiles
            .get(label)
            .ok_or_else(|| EngineError::UnsupportedProfile {
                label: label.to_string(),
            })
    }

    // One limiter per operation, shared by all of its page fetches
    fn fetcher(&self) -> RateLimitedFetcher<C> {
        RateLimitedFetcher::new(
            self.client.clone(),
            &self.config.rate_limit,
            self.config.retry.clone(),
            self.metrics.clone(),
        )
    }

    /// Replay the staking contract's transfer history for `asset_key` into current holders.
    pub async fn reconstruct_holders(
        &self,
        asset_key: &str,
        profile_label: &str,
        asset_type: AssetType,
        options: &HolderOptions,
    ) -> Result<HolderReport, EngineError> {
        // Unknown profiles fail before any request goes out
        let profile = self.profile(profile_label)?;
        let limit = options.timeout.or(self.config.timeout());
        with_timeout(limit, self.replay_holders(asset_key, profile, asset_type, options)).await
    }

    /// Current holders straight from the holder-listing endpoints, without replay.
    pub async fn snapshot_holders(
        &self,
        asset_key: &str,
        asset_type: AssetType,
        options: &HolderOptions,
    ) -> Result<HolderReport, EngineError> {
        let limit = options.timeout.or(self.config.timeout());
        with_timeout(limit, self.listed_holders(asset_key, asset_type, options)).await
    }

    async fn replay_holders(
        &self,
        asset_key: &str,
        profile: &StakingContractProfile,
        asset_type: AssetType,
        options: &HolderOptions,
    ) -> Result<HolderReport, EngineError> {
        let fetcher = self.fetcher();
        let collector = PaginatedCollector::new(&fetcher, self.config.page_size);

        let query = self.endpoints.contract_transfers(
            &profile.contract_address,
            asset_key,
            &profile.function_filter(),
        );
        let records = collector.collect_all(&query).await?;
        let events = normalize_records(records, asset_key, asset_type, profile);
        let replayed = replay(&events, profile, asset_type);

        if let Some(metrics) = &self.metrics {
            let labels = [KeyValue::new("network", metrics.network.clone())];
            metrics
                .events_replayed
                .add(replayed.events_replayed as u64, &labels);
            metrics
                .replay_warnings
                .add(replayed.warnings.len() as u64, &labels);
        }

        let contract = profile.contract_address.as_str();
        let (state, reconciliation) = match replayed.state {
            state if !options.include_reconciliation => (state, None),
            HolderState::Unique(holdings) => {
                let live = self.live_identifiers(&fetcher, contract, asset_key).await?;
                let (holdings, report) = reconcile_identifiers(holdings, &live);
                (HolderState::Unique(holdings), Some(report))
            }
            HolderState::Balances(balances) => {
                let live_total = self
                    .live_balance(&fetcher, contract, asset_key, asset_type)
                    .await?;
                let report = reconcile_balances(&balances, live_total);
                (HolderState::Balances(balances), Some(report))
            }
        };

        let decimals = self
            .resolve_decimals(&fetcher, asset_key, asset_type, options.decimals)
            .await?;
        let holders = self.finish(asset_key, state, asset_type, decimals)?;

        Ok(HolderReport {
            asset_key: asset_key.to_string(),
            asset_type,
            holders,
            events_replayed: replayed.events_replayed,
            last_event_at: replayed.last_event_at,
            warnings: replayed.warnings,
            reconciliation,
        })
    }

    async fn listed_holders(
        &self,
        asset_key: &str,
        asset_type: AssetType,
        options: &HolderOptions,
    ) -> Result<HolderReport, EngineError> {
        let fetcher = self.fetcher();
        let collector = PaginatedCollector::new(&fetcher, self.config.page_size);

        let state = match asset_type {
            AssetType::Nft => {
                let records = collector
                    .collect_all(&self.endpoints.collection_nfts(asset_key))
                    .await?;
                let holdings = decode_records::<RawOwnedNft>(records, "nft")
                    .into_iter()
                    .filter_map(|nft| {
                        let owner = nft.owner?;
                        Some((
                            nft.identifier,
                            Holding {
                                owner,
                                last_event: None,
                            },
                        ))
                    })
                    .collect::<BTreeMap<_, _>>();
                HolderState::Unique(holdings)
            }
            AssetType::Sft => {
                let query = self.endpoints.collection_accounts(asset_key);
                HolderState::Balances(self.listed_balances(&collector, &query).await?)
            }
            AssetType::Esdt => {
                let query = self.endpoints.token_accounts(asset_key);
                HolderState::Balances(self.listed_balances(&collector, &query).await?)
            }
        };

        let decimals = self
            .resolve_decimals(&fetcher, asset_key, asset_type, options.decimals)
            .await?;
        let holders = self.finish(asset_key, state, asset_type, decimals)?;

        Ok(HolderReport {
            asset_key: asset_key.to_string(),
            asset_type,
            holders,
            events_replayed: 0,
            last_event_at: None,
            warnings: Vec::new(),
            reconciliation: None,
        })
    }

    async fn listed_balances(
        &self,
        collector: &PaginatedCollector<'_, C>,
        query: &PageQuery,
    ) -> Result<BTreeMap<String, U256>, EngineError> {
        let records = collector.collect_all(query).await?;
        let mut balances = BTreeMap::new();
        // SFT listings carry one row per identifier held
        for account in decode_records::<RawAccountBalance>(records, "account") {
            let Some(balance) = parse_amount(&account.balance, &account.address) else {
                continue;
            };
            let entry = balances.entry(account.address).or_insert(U256::ZERO);
            *entry = entry.saturating_add(balance);
        }
        Ok(balances)
    }

    async fn live_identifiers(
        &self,
        fetcher: &RateLimitedFetcher<C>,
        contract: &str,
        collection: &str,
    ) -> Result<BTreeSet<String>, EngineError> {
        let collector = PaginatedCollector::new(fetcher, self.config.page_size);
        let records = collector
            .collect_all(&self.endpoints.account_nfts(contract, collection))
            .await?;
        Ok(decode_records::<RawInventoryNft>(records, "inventory")
            .into_iter()
            .map(|nft| nft.identifier)
            .collect())
    }

    async fn live_balance(
        &self,
        fetcher: &RateLimitedFetcher<C>,
        contract: &str,
        asset_key: &str,
        asset_type: AssetType,
    ) -> Result<U256, EngineError> {
        if asset_type == AssetType::Sft {
            let collector = PaginatedCollector::new(fetcher, self.config.page_size);
            let records = collector
                .collect_all(&self.endpoints.account_nfts(contract, asset_key))
                .await?;
            // Inventory rows without a balance hold a single unit
            return Ok(decode_records::<RawInventoryNft>(records, "inventory")
                .iter()
                .filter_map(|nft| parse_amount(nft.balance.as_deref().unwrap_or("1"), &nft.identifier))
                .fold(U256::ZERO, |total, balance| total.saturating_add(balance)));
        }

        let url = self.endpoints.account_token(contract, asset_key);
        match fetcher.fetch_as::<RawTokenBalance>(&url).await {
            Ok(token) => U256::from_str(&token.balance).map_err(|e| {
                FetchError::Decode {
                    url: url.to_string(),
                    message: format!("unparsable balance '{}': {}", token.balance, e),
                }
                .into()
            }),
            // The API answers 404 when the account holds none of the token
            Err(FetchError::Rejected { status: 404, .. }) => Ok(U256::ZERO),
            Err(e) => Err(e.into()),
        }
    }

    async fn resolve_decimals(
        &self,
        fetcher: &RateLimitedFetcher<C>,
        asset_key: &str,
        asset_type: AssetType,
        decimals: Option<u8>,
    ) -> Result<u8, EngineError> {
        let decimals = match (asset_type, decimals) {
            (AssetType::Nft | AssetType::Sft, _) => return Ok(0),
            (AssetType::Esdt, Some(decimals)) => decimals,
            (AssetType::Esdt, None) => {
                let metadata = fetcher
                    .fetch_as::<RawTokenMetadata>(&self.endpoints.token_metadata(asset_key))
                    .await?;
                metadata.decimals.ok_or_else(|| EngineError::MissingDecimals {
                    token: asset_key.to_string(),
                })?
            }
        };
        if unit_scale(decimals).is_none() {
            return Err(EngineError::UnsupportedDecimals {
                token: asset_key.to_string(),
                decimals,
            });
        }
        Ok(decimals)
    }

    fn finish(
        &self,
        asset_key: &str,
        mut state: HolderState,
        asset_type: AssetType,
        decimals: u8,
    ) -> Result<Vec<OwnershipStat>, EngineError> {
        exclude_holders(&mut state, &self.config.exclusions);
        let holders = aggregate(&state, asset_type, decimals);

        if let Some(metrics) = &self.metrics {
            metrics.current_holders.record(
                holders.len() as u64,
                &[
                    KeyValue::new("network", metrics.network.clone()),
                    KeyValue::new("asset", asset_key.to_string()),
                ],
            );
        }

        if holders.is_empty() {
            return Err(EngineError::NoHolders {
                asset_key: asset_key.to_string(),
            });
        }
        info!("{} holders of {}", holders.len(), asset_key);
        Ok(holders)
    }
}

/// Draw `n` distinct winners among `holders`.
pub fn draw_winners(holders: &[OwnershipStat], n: usize, mode: DrawMode) -> WinnerSelection {
    draw_winners_with_rng(holders, n, mode, &mut fastrand::Rng::new())
}

pub fn draw_winners_with_rng(
    holders: &[OwnershipStat],
    n: usize,
    mode: DrawMode,
    rng: &mut fastrand::Rng,
) -> WinnerSelection {
    let winners = match mode {
        DrawMode::PerHolder => select(holders, n, rng),
        DrawMode::PerUnit => select_weighted(holders, n, rng),
    };
    info!("Drew {} of {} requested winners from {} holders", winners.len(), n, holders.len());
    WinnerSelection { winners }
}

fn parse_amount(value: &str, owner: &str) -> Option<U256> {
    match U256::from_str(value) {
        Ok(amount) => Some(amount),
        Err(e) => {
            warn!("Skipping unparsable balance '{}' of {}: {}", value, owner, e);
            None
        }
    }
}

async fn with_timeout<T>(
    limit: Option<Duration>,
    operation: impl Future<Output = Result<T, EngineError>>,
) -> Result<T, EngineError> {
    match limit {
        Some(after) => tokio::time::timeout(after, operation)
            .await
            .map_err(|_| EngineError::Timeout { after })?,
        None => operation.await,
    }
}
