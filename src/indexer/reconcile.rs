use alloy_primitives::U256;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

use crate::models::holders::{Holding, ReconciliationReport};

/// Keep only the replayed identifiers the contract still holds.
pub fn reconcile_identifiers(
    mut holdings: BTreeMap<String, Holding>,
    live: &BTreeSet<String>,
) -> (BTreeMap<String, Holding>, ReconciliationReport) {
    let dropped = holdings
        .keys()
        .filter(|identifier| !live.contains(*identifier))
        .cloned()
        .collect::<Vec<_>>();
    for identifier in &dropped {
        holdings.remove(identifier);
    }
    if !dropped.is_empty() {
        warn!(
            "Reconciliation dropped {} replayed identifiers missing from live inventory: {:?}",
            dropped.len(),
            dropped
        );
    }
    info!(
        "Reconciled {} replayed identifiers against {} held by the contract",
        holdings.len(),
        live.len()
    );
    let report = ReconciliationReport::Identifiers {
        live_count: live.len(),
        dropped,
    };
    (holdings, report)
}

/// Compare the replayed balance total with what the contract holds.
///
/// A total cannot be split back per address, so a difference is reported and the
/// balances are left untouched.
pub fn reconcile_balances(balances: &BTreeMap<String, U256>, live_total: U256) -> ReconciliationReport {
    let replayed_total = balances
        .values()
        .fold(U256::ZERO, |total, balance| total.saturating_add(*balance));
    let mismatch = replayed_total != live_total;
    if mismatch {
        warn!(
            "Reconciliation mismatch: replay accounts for {} but the contract holds {}",
            replayed_total, live_total
        );
    }
    ReconciliationReport::Balances {
        replayed_total: replayed_total.to_string(),
        live_total: live_total.to_string(),
        mismatch,
    }
}
