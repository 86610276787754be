use alloy_primitives::U256;
use fastrand::Rng;

use crate::models::holders::OwnershipStat;

/// Uniform sample of `min(n, pool.len())` distinct elements (partial Fisher-Yates).
pub fn select<T: Clone>(pool: &[T], n: usize, rng: &mut Rng) -> Vec<T> {
    let take = n.min(pool.len());
    let mut indices = (0..pool.len()).collect::<Vec<_>>();
    for i in 0..take {
        let j = rng.usize(i..pool.len());
        indices.swap(i, j);
    }
    indices[..take].iter().map(|&i| pool[i].clone()).collect()
}

/// Sample distinct holders, each draw weighted by the holder's raw unit count.
pub fn select_weighted(pool: &[OwnershipStat], n: usize, rng: &mut Rng) -> Vec<OwnershipStat> {
    let mut remaining = pool
        .iter()
        .map(|stat| (stat, stat.units_count.raw()))
        .filter(|(_, weight)| !weight.is_zero())
        .collect::<Vec<_>>();
    let mut total = remaining
        .iter()
        .fold(U256::ZERO, |total, (_, weight)| total.saturating_add(*weight));
    let mut winners = Vec::with_capacity(n.min(remaining.len()));

    while winners.len() < n && !total.is_zero() {
        let mut ticket = uniform_below(total, rng);
        let position = remaining
            .iter()
            .position(|(_, weight)| {
                if ticket < *weight {
                    true
                } else {
                    ticket -= *weight;
                    false
                }
            })
            .unwrap_or(remaining.len() - 1);
        let (stat, weight) = remaining.swap_remove(position);
        total = total.saturating_sub(weight);
        winners.push(stat.clone());
    }

    winners
}

// Uniform in [0, bound) by rejection over the bound's bit length; bound must be non-zero
fn uniform_below(bound: U256, rng: &mut Rng) -> U256 {
    let mask = U256::MAX >> (256 - bound.bit_len());
    loop {
        let limbs = [rng.u64(..), rng.u64(..), rng.u64(..), rng.u64(..)];
        let candidate = U256::from_limbs(limbs) & mask;
        if candidate < bound {
            return candidate;
        }
    }
}
