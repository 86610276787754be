use alloy_primitives::U256;
use std::collections::BTreeMap;
use tracing::debug;

use crate::models::common::{AssetType, ExclusionRules};
use crate::models::holders::{HolderState, OwnershipStat, UnitsCount};

/// Drop excluded owners (burn addresses, smart contracts) and empty balances.
pub fn exclude_holders(state: &mut HolderState, rules: &ExclusionRules) {
    let before = state.len();
    state.retain_owners(|owner| !rules.excludes(owner));
    if state.len() < before {
        debug!("Excluded {} entries by holder rules", before - state.len());
    }
}

/// Per-owner unit counts, largest first, ties by owner address ascending.
pub fn aggregate(state: &HolderState, asset_type: AssetType, decimals: u8) -> Vec<OwnershipStat> {
    let mut per_owner: BTreeMap<&str, U256> = BTreeMap::new();
    match state {
        HolderState::Unique(holdings) => {
            for holding in holdings.values() {
                let units = per_owner.entry(holding.owner.as_str()).or_insert(U256::ZERO);
                *units = units.saturating_add(U256::from(1u64));
            }
        }
        HolderState::Balances(balances) => {
            for (address, balance) in balances {
                let units = per_owner.entry(address.as_str()).or_insert(U256::ZERO);
                *units = units.saturating_add(*balance);
            }
        }
    }

    let mut stats = per_owner
        .into_iter()
        .filter(|(_, units)| !units.is_zero())
        .map(|(owner, raw)| OwnershipStat {
            owner: owner.to_string(),
            units_count: match asset_type {
                AssetType::Nft | AssetType::Sft => UnitsCount::Whole(raw),
                AssetType::Esdt => UnitsCount::Scaled { raw, decimals },
            },
        })
        .collect::<Vec<_>>();

    stats.sort_by(|a, b| {
        b.units_count
            .raw()
            .cmp(&a.units_count.raw())
            .then_with(|| a.owner.cmp(&b.owner))
    });
    stats
}
