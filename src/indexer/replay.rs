use alloy_primitives::U256;
use tracing::{debug, info, warn};

use crate::models::common::{AssetType, StakingContractProfile};
use crate::models::events::{TransferEvent, Unit};
use crate::models::holders::{EventRef, HolderState, Holding, ReplayWarning, Replayed};

/// Fold a transfer history into the current holder state.
///
/// Events are sorted by `(timestamp, nonce, index, tx_hash)` first, so the result does not
/// depend on the order pages arrived in. The same transfer seen twice (overlapping pages)
/// is applied once.
pub fn replay(
    events: &[TransferEvent],
    profile: &StakingContractProfile,
    asset_type: AssetType,
) -> Replayed {
    let mut ordered = events.iter().collect::<Vec<_>>();
    ordered.sort_by(|a, b| {
        a.ordering_key()
            .cmp(&b.ordering_key())
            .then_with(|| a.tx_hash.cmp(&b.tx_hash))
    });
    let before = ordered.len();
    ordered.dedup();
    if ordered.len() < before {
        debug!("Dropped {} duplicated transfer events", before - ordered.len());
    }

    let mut replay = Replay {
        state: HolderState::for_asset(asset_type),
        warnings: Vec::new(),
    };
    let mut applied = 0;
    let mut last_event_at = None;

    for event in ordered {
        let is_stake =
            profile.is_stake(&event.function_name) && event.receiver == profile.contract_address;
        let is_unstake =
            profile.is_unstake(&event.function_name) && event.sender == profile.contract_address;

        let handled = if is_stake {
            replay.stake(event)
        } else if is_unstake {
            replay.unstake(event)
        } else {
            false
        };

        if handled {
            applied += 1;
            last_event_at = event.block_time();
        } else {
            debug!(
                "Ignoring {} in tx {}: not a custody change of {}",
                event.function_name, event.tx_hash, profile.contract_address
            );
        }
    }

    info!(
        "Replayed {} events into {} entries ({} warnings)",
        applied,
        replay.state.len(),
        replay.warnings.len()
    );

    Replayed {
        state: replay.state,
        warnings: replay.warnings,
        events_replayed: applied,
        last_event_at,
    }
}

struct Replay {
    state: HolderState,
    warnings: Vec<ReplayWarning>,
}

impl Replay {
    fn stake(&mut self, event: &TransferEvent) -> bool {
        match (&mut self.state, &event.unit) {
            (HolderState::Unique(holdings), Unit::Identifier(identifier)) => {
                let holding = Holding {
                    owner: event.sender.clone(),
                    last_event: Some(EventRef {
                        tx_hash: event.tx_hash.clone(),
                        timestamp: event.timestamp,
                    }),
                };
                // Last write wins; re-stake artifacts exist on the ledger
                if let Some(previous) = holdings.insert(identifier.clone(), holding) {
                    warn!(
                        "duplicate-stake: {} already staked by {}, now {} (tx {})",
                        identifier, previous.owner, event.sender, event.tx_hash
                    );
                    self.warnings.push(ReplayWarning::DuplicateStake {
                        identifier: identifier.clone(),
                        previous_owner: previous.owner,
                        owner: event.sender.clone(),
                        tx_hash: event.tx_hash.clone(),
                    });
                }
                true
            }
            (HolderState::Balances(balances), Unit::Amount(amount)) => {
                let balance = balances.entry(event.sender.clone()).or_insert(U256::ZERO);
                *balance = balance.saturating_add(*amount);
                true
            }
            _ => false,
        }
    }

    fn unstake(&mut self, event: &TransferEvent) -> bool {
        match (&mut self.state, &event.unit) {
            (HolderState::Unique(holdings), Unit::Identifier(identifier)) => {
                if holdings.remove(identifier).is_none() {
                    warn!(
                        "unstake-without-stake: {} returned to {} but never seen staked (tx {})",
                        identifier, event.receiver, event.tx_hash
                    );
                    self.warnings.push(ReplayWarning::UnstakeWithoutStake {
                        identifier: identifier.clone(),
                        tx_hash: event.tx_hash.clone(),
                    });
                }
                true
            }
            (HolderState::Balances(balances), Unit::Amount(amount)) => {
                let balance = balances.get(&event.receiver).copied().unwrap_or(U256::ZERO);
                let remaining = match balance.checked_sub(*amount) {
                    Some(remaining) => remaining,
                    None => {
                        warn!(
                            "balance-underflow: {} unstaked {} holding only {} (tx {}), clamping to zero",
                            event.receiver, amount, balance, event.tx_hash
                        );
                        self.warnings.push(ReplayWarning::BalanceUnderflow {
                            address: event.receiver.clone(),
                            balance: balance.to_string(),
                            requested: amount.to_string(),
                            tx_hash: event.tx_hash.clone(),
                        });
                        U256::ZERO
                    }
                };
                if remaining.is_zero() {
                    balances.remove(&event.receiver);
                } else {
                    balances.insert(event.receiver.clone(), remaining);
                }
                true
            }
            _ => false,
        }
    }
}
