use alloy_primitives::U256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

////////////////////////////////////// API Data ////////////////////////////////////////
// One record of the account transfers history
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransfer {
    pub tx_hash: String,
    pub timestamp: u64,
    #[serde(default)]
    pub nonce: u64,
    pub sender: String,
    pub receiver: String,
    pub function: Option<String>,
    pub status: String,
    pub action: Option<RawAction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAction {
    pub arguments: Option<RawActionArguments>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawActionArguments {
    #[serde(default)]
    pub transfers: Vec<RawTokenTransfer>,
    // Real destination of an NFT self-transfer
    pub receiver: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTokenTransfer {
    pub collection: Option<String>,
    pub identifier: Option<String>,
    pub token: Option<String>,
    pub ticker: Option<String>,
    pub value: Option<String>,
}

impl RawTokenTransfer {
    pub fn matches(&self, asset_key: &str) -> bool {
        [&self.collection, &self.token, &self.identifier, &self.ticker]
            .into_iter()
            .any(|field| field.as_deref() == Some(asset_key))
    }
}

/////////////////////////////////// Normalized Data ////////////////////////////////////
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Success,
    Fail,
}

/// What moved: a unique identifier (NFT) or an amount in minor units (SFT, ESDT).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unit {
    Identifier(String),
    Amount(U256),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferEvent {
    pub tx_hash: String,
    pub timestamp: u64,
    pub nonce: u64,
    // Position among the matching transfers of one transaction
    pub index: u32,
    pub function_name: String,
    pub sender: String,
    pub receiver: String,
    pub status: TransferStatus,
    pub asset_key: String,
    pub unit: Unit,
}

impl TransferEvent {
    /// Authoritative history order.
    pub fn ordering_key(&self) -> (u64, u64, u32) {
        (self.timestamp, self.nonce, self.index)
    }

    pub fn block_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp as i64, 0)
    }
}
