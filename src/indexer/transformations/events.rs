use alloy_primitives::U256;
use serde_json::Value;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::indexer::transformations::decode_records;
use crate::models::common::{AssetType, StakingContractProfile};
use crate::models::events::{RawTransfer, TransferEvent, TransferStatus, Unit};

const SUCCESS: &str = "success";

pub trait EventNormalizer {
    /// Canonical events for the transfers of `asset_key` in this record; empty when dropped.
    fn normalize(
        &self,
        asset_key: &str,
        asset_type: AssetType,
        profile: &StakingContractProfile,
    ) -> Vec<TransferEvent>;
}

impl EventNormalizer for RawTransfer {
    fn normalize(
        &self,
        asset_key: &str,
        asset_type: AssetType,
        profile: &StakingContractProfile,
    ) -> Vec<TransferEvent> {
        if self.status != SUCCESS {
            return Vec::new();
        }

        let function_name = match self.function.as_deref() {
            Some(function) if profile.is_stake(function) || profile.is_unstake(function) => function,
            _ => return Vec::new(),
        };

        let Some(arguments) = self.action.as_ref().and_then(|a| a.arguments.as_ref()) else {
            return Vec::new();
        };

        // NFT transfers are self-transfers naming the destination in their arguments
        let receiver = arguments.receiver.as_deref().unwrap_or(&self.receiver);

        arguments
            .transfers
            .iter()
            .filter(|transfer| transfer.matches(asset_key))
            .enumerate()
            .filter_map(|(index, transfer)| {
                let unit = if asset_type.tracks_identifiers() {
                    transfer.identifier.clone().map(Unit::Identifier)
                } else {
                    transfer
                        .value
                        .as_deref()
                        .and_then(|value| U256::from_str(value).ok())
                        .map(Unit::Amount)
                };

                let Some(unit) = unit else {
                    warn!(
                        "Skipping transfer {} of tx {}: no usable unit for {:?} {}",
                        index, self.tx_hash, asset_type, asset_key
                    );
                    return None;
                };

                Some(TransferEvent {
                    tx_hash: self.tx_hash.clone(),
                    timestamp: self.timestamp,
                    nonce: self.nonce,
                    index: index as u32,
                    function_name: function_name.to_string(),
                    sender: self.sender.clone(),
                    receiver: receiver.to_string(),
                    status: TransferStatus::Success,
                    asset_key: asset_key.to_string(),
                    unit,
                })
            })
            .collect()
    }
}

pub fn normalize_records(
    records: Vec<Value>,
    asset_key: &str,
    asset_type: AssetType,
    profile: &StakingContractProfile,
) -> Vec<TransferEvent> {
    let transfers = decode_records::<RawTransfer>(records, "transfer");
    let total = transfers.len();
    let events = transfers
        .iter()
        .flat_map(|transfer| transfer.normalize(asset_key, asset_type, profile))
        .collect::<Vec<_>>();
    debug!("Normalized {} transfer records into {} events", total, events.len());
    events
}
