use alloy_primitives::U256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::models::common::AssetType;
use crate::utils::format_units;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRef {
    pub tx_hash: String,
    pub timestamp: u64,
}

/// Current custodian of one identifier and, when replayed, the event that put it there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Holding {
    pub owner: String,
    pub last_event: Option<EventRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HolderState {
    // identifier -> holding, at most one owner per identifier
    Unique(BTreeMap<String, Holding>),
    // address -> balance in minor units, never negative
    Balances(BTreeMap<String, U256>),
}

impl HolderState {
    pub fn for_asset(asset_type: AssetType) -> Self {
        if asset_type.tracks_identifiers() {
            HolderState::Unique(BTreeMap::new())
        } else {
            HolderState::Balances(BTreeMap::new())
        }
    }

    pub fn len(&self) -> usize {
        match self {
            HolderState::Unique(holdings) => holdings.len(),
            HolderState::Balances(balances) => balances.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry whose owner fails the predicate, plus zero balances.
    pub fn retain_owners<F: Fn(&str) -> bool>(&mut self, keep: F) {
        match self {
            HolderState::Unique(holdings) => holdings.retain(|_, h| keep(&h.owner)),
            HolderState::Balances(balances) => {
                balances.retain(|address, balance| !balance.is_zero() && keep(address))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ReplayWarning {
    DuplicateStake {
        identifier: String,
        previous_owner: String,
        owner: String,
        tx_hash: String,
    },
    UnstakeWithoutStake {
        identifier: String,
        tx_hash: String,
    },
    BalanceUnderflow {
        address: String,
        balance: String,
        requested: String,
        tx_hash: String,
    },
}

impl ReplayWarning {
    pub fn label(&self) -> &'static str {
        match self {
            ReplayWarning::DuplicateStake { .. } => "duplicate-stake",
            ReplayWarning::UnstakeWithoutStake { .. } => "unstake-without-stake",
            ReplayWarning::BalanceUnderflow { .. } => "balance-underflow",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replayed {
    pub state: HolderState,
    pub warnings: Vec<ReplayWarning>,
    pub events_replayed: usize,
    // Block time of the last custody change applied
    pub last_event_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitsCount {
    Whole(U256),
    Scaled { raw: U256, decimals: u8 },
}

impl UnitsCount {
    pub fn raw(&self) -> U256 {
        match self {
            UnitsCount::Whole(raw) | UnitsCount::Scaled { raw, .. } => *raw,
        }
    }
}

impl fmt::Display for UnitsCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitsCount::Whole(raw) => write!(f, "{raw}"),
            UnitsCount::Scaled { raw, decimals } => f.write_str(&format_units(*raw, *decimals)),
        }
    }
}

// Whole counts are JSON numbers when they fit, decimal amounts are strings
impl Serialize for UnitsCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            UnitsCount::Whole(raw) => match u64::try_from(*raw) {
                Ok(count) => serializer.serialize_u64(count),
                Err(_) => serializer.serialize_str(&raw.to_string()),
            },
            UnitsCount::Scaled { .. } => serializer.serialize_str(&self.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnershipStat {
    pub owner: String,
    pub units_count: UnitsCount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct WinnerSelection {
    pub winners: Vec<OwnershipStat>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DrawMode {
    #[default]
    PerHolder,
    PerUnit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ReconciliationReport {
    Identifiers {
        live_count: usize,
        dropped: Vec<String>,
    },
    Balances {
        replayed_total: String,
        live_total: String,
        mismatch: bool,
    },
}

impl ReconciliationReport {
    pub fn has_discrepancy(&self) -> bool {
        match self {
            ReconciliationReport::Identifiers { dropped, .. } => !dropped.is_empty(),
            ReconciliationReport::Balances { mismatch, .. } => *mismatch,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HolderReport {
    pub asset_key: String,
    pub asset_type: AssetType,
    pub holders: Vec<OwnershipStat>,
    pub events_replayed: usize,
    /// Holders are current as of this block time. `None` for live snapshots.
    pub last_event_at: Option<DateTime<Utc>>,
    pub warnings: Vec<ReplayWarning>,
    pub reconciliation: Option<ReconciliationReport>,
}
