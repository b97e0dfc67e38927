// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Prefix-sum index over account weights.
//!
//! Entries are append-only. Position 0 is a sentinel so that the Fenwick tree
//! can use 1-based positions directly; `tree[i]` holds the sum of the weights
//! in `(i - lowbit(i), i]`.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use linera_sdk::linera_base_types::AccountOwner;
use num_bigint::BigUint;
use num_traits::cast::ToPrimitive;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::DrawError;
use crate::randomness::RandomWord;

/// An account identifier that can hold a weight.
pub trait Identifier: Clone + Eq + Hash + Debug + Serialize + DeserializeOwned {
    /// Whether this is the null identifier, which can never hold a weight.
    fn is_null(&self) -> bool;
}

impl Identifier for AccountOwner {
    fn is_null(&self) -> bool {
        *self == AccountOwner::CHAIN
    }
}

/// How a batch weight update treats individual bad items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, async_graphql::Enum)]
pub enum BatchPolicy {
    /// Validate every item first; any bad item rejects the whole batch.
    #[default]
    AllOrNothing,
    /// Apply items one by one, reporting the ones that were rejected.
    BestEffort,
}

/// Result of a batch weight update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub applied: usize,
    /// Offsets into the batch of rejected items, with the reason.
    pub rejected: Vec<(usize, DrawError)>,
}

/// Persisted as identifiers and weights only; the tree and the position
/// map are rebuilt when loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    bound = "K: Identifier",
    from = "StoredIndex<K>",
    into = "StoredIndex<K>"
)]
pub struct WeightedIndex<K> {
    /// `ids[p - 1]` and `weights[p - 1]` belong to position `p`.
    ids: Vec<K>,
    weights: Vec<u128>,
    /// Fenwick tree, `tree[0]` is the sentinel and always zero.
    tree: Vec<u128>,
    positions: HashMap<K, usize>,
    total: u128,
}

impl<K> Default for WeightedIndex<K> {
    fn default() -> Self {
        WeightedIndex {
            ids: Vec::new(),
            weights: Vec::new(),
            tree: vec![0],
            positions: HashMap::new(),
            total: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "K: Identifier")]
pub struct StoredIndex<K> {
    ids: Vec<K>,
    weights: Vec<u128>,
}

impl<K> From<WeightedIndex<K>> for StoredIndex<K> {
    fn from(index: WeightedIndex<K>) -> Self {
        StoredIndex {
            ids: index.ids,
            weights: index.weights,
        }
    }
}

impl<K: Identifier> From<StoredIndex<K>> for WeightedIndex<K> {
    fn from(stored: StoredIndex<K>) -> Self {
        let StoredIndex { ids, mut weights } = stored;
        weights.truncate(ids.len());
        weights.resize(ids.len(), 0);

        let size = ids.len();
        let mut tree = Vec::with_capacity(size + 1);
        tree.push(0);
        tree.extend(weights.iter().copied());
        for i in 1..=size {
            let parent = i + lowbit(i);
            if parent <= size {
                tree[parent] = tree[parent].saturating_add(tree[i]);
            }
        }

        let positions = ids
            .iter()
            .enumerate()
            .map(|(offset, id)| (id.clone(), offset + 1))
            .collect();
        let total = weights.iter().fold(0u128, |sum, weight| sum.saturating_add(*weight));
        WeightedIndex {
            ids,
            weights,
            tree,
            positions,
            total,
        }
    }
}

fn lowbit(i: usize) -> usize {
    i & i.wrapping_neg()
}

impl<K: Identifier> WeightedIndex<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of real entries, excluding the sentinel.
    pub fn size(&self) -> usize {
        self.ids.len()
    }

    pub fn total_weight(&self) -> u128 {
        self.total
    }

    pub fn position_of(&self, id: &K) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn weight_of(&self, id: &K) -> u128 {
        self.position_of(id)
            .map(|position| self.weights[position - 1])
            .unwrap_or(0)
    }

    /// The identifier stored at `position`. The sentinel position 0 has none.
    pub fn identifier_at(&self, position: usize) -> Option<&K> {
        if position == 0 {
            return None;
        }
        self.ids.get(position - 1)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&K, u128)> + '_ {
        self.ids.iter().zip(self.weights.iter().copied())
    }

    /// Sum of the weights at positions `1..=position`.
    pub fn prefix(&self, position: usize) -> u128 {
        let mut i = position.min(self.size());
        let mut sum = 0;
        while i > 0 {
            sum += self.tree[i];
            i -= lowbit(i);
        }
        sum
    }

    /// Sets the weight of `id`, appending a new entry the first time it is seen.
    ///
    /// Returns whether anything changed.
    pub fn set_weight(&mut self, id: &K, weight: u128) -> Result<bool, DrawError> {
        if id.is_null() {
            return Err(DrawError::InvalidIdentifier);
        }
        match self.position_of(id) {
            Some(position) => self.update(position, weight),
            None if weight == 0 => Ok(false),
            None => self.append(id, weight),
        }
    }

    /// Applies a batch of updates in order under the given policy.
    pub fn set_weight_batch(
        &mut self,
        ids: &[K],
        weights: &[u128],
        policy: BatchPolicy,
    ) -> Result<BatchReport, DrawError> {
        if ids.len() != weights.len() {
            return Err(DrawError::LengthMismatch {
                ids: ids.len(),
                weights: weights.len(),
            });
        }

        let mut report = BatchReport::default();
        match policy {
            BatchPolicy::AllOrNothing => {
                self.check_batch(ids, weights)?;
                for (id, weight) in ids.iter().zip(weights) {
                    self.set_weight(id, *weight)?;
                    report.applied += 1;
                }
            }
            BatchPolicy::BestEffort => {
                for (offset, (id, weight)) in ids.iter().zip(weights).enumerate() {
                    match self.set_weight(id, *weight) {
                        Ok(_) => report.applied += 1,
                        Err(error) => {
                            log::debug!("Skipping batch item {}: {}", offset, error);
                            report.rejected.push((offset, error));
                        }
                    }
                }
            }
        }
        Ok(report)
    }

    /// Picks the identifier owning `random mod total` on the cumulative
    /// weight line.
    pub fn draw(&self, random: &RandomWord) -> Result<&K, DrawError> {
        if self.total == 0 {
            return Err(DrawError::EmptyIndex);
        }
        let target = BigUint::from_bytes_be(random) % BigUint::from(self.total);
        // The remainder is below `total`, so it always fits.
        let target = target.to_u128().unwrap_or_default();
        self.draw_target(target)
    }

    /// Returns the identifier at the smallest position whose prefix sum is
    /// strictly greater than `target`. `target` must be below the total.
    pub fn draw_target(&self, target: u128) -> Result<&K, DrawError> {
        if self.total == 0 {
            return Err(DrawError::EmptyIndex);
        }
        let target = target % self.total;
        let size = self.size();

        // Largest position whose prefix sum is <= target.
        let mut position = 0;
        let mut remaining = target;
        let mut step = if size == 0 { 0 } else { 1usize << (usize::BITS - 1 - size.leading_zeros()) };
        while step > 0 {
            let next = position + step;
            if next <= size && self.tree[next] <= remaining {
                position = next;
                remaining -= self.tree[next];
            }
            step >>= 1;
        }

        self.identifier_at(position + 1).ok_or(DrawError::EmptyIndex)
    }

    /// Rejects a batch that would fail part way through.
    fn check_batch(&self, ids: &[K], weights: &[u128]) -> Result<(), DrawError> {
        let mut planned: HashMap<&K, u128> = HashMap::new();
        let mut total = self.total;
        for (id, weight) in ids.iter().zip(weights) {
            if id.is_null() {
                return Err(DrawError::InvalidIdentifier);
            }
            let current = planned.get(id).copied().unwrap_or_else(|| self.weight_of(id));
            total = (total - current)
                .checked_add(*weight)
                .ok_or(DrawError::WeightOverflow)?;
            planned.insert(id, *weight);
        }
        Ok(())
    }

    fn update(&mut self, position: usize, weight: u128) -> Result<bool, DrawError> {
        let current = self.weights[position - 1];
        if current == weight {
            return Ok(false);
        }

        if weight > current {
            let delta = weight - current;
            self.total = self.total.checked_add(delta).ok_or(DrawError::WeightOverflow)?;
            let mut i = position;
            while i <= self.size() {
                self.tree[i] += delta;
                i += lowbit(i);
            }
        } else {
            let delta = current - weight;
            self.total -= delta;
            let mut i = position;
            while i <= self.size() {
                self.tree[i] -= delta;
                i += lowbit(i);
            }
        }
        self.weights[position - 1] = weight;
        Ok(true)
    }

    fn append(&mut self, id: &K, weight: u128) -> Result<bool, DrawError> {
        let total = self.total.checked_add(weight).ok_or(DrawError::WeightOverflow)?;
        let position = self.size() + 1;
        // The new node covers (position - lowbit, position]; everything but
        // the new weight is already in the tree.
        let covered = self.prefix(position - 1) - self.prefix(position - lowbit(position));

        self.ids.push(id.clone());
        self.weights.push(weight);
        self.tree.push(covered + weight);
        self.positions.insert(id.clone(), position);
        self.total = total;
        Ok(true)
    }
}
