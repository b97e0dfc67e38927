// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Randomness requests and their single-use records.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DrawError;
use crate::schedule::Cadence;

/// A 256-bit big-endian random value delivered by the provider.
pub type RandomWord = [u8; 32];

/// Correlation token binding a randomness request to its fulfillment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What the draw engine asks the provider for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomnessRequest {
    pub cadence: Cadence,
    pub round: u64,
    pub num_words: u32,
    /// Resource budget the provider may spend on the fulfillment callback.
    pub callback_budget: u64,
}

/// Issues randomness requests. The value comes back later through
/// `DrawEngine::on_random_fulfilled`, matched only by the returned id.
pub trait RandomnessPort {
    fn request_random(&mut self, request: &RandomnessRequest) -> Result<RequestId, DrawError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub cadence: Cadence,
    pub round: u64,
}

/// Requests still waiting for their randomness.
///
/// Records are dropped once consumed. Ids must increase, so any id at or
/// below the highest one ever opened that has no record was consumed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestBook {
    open: BTreeMap<RequestId, RequestRecord>,
    highest: Option<RequestId>,
}

impl RequestBook {
    pub fn get(&self, id: RequestId) -> Option<&RequestRecord> {
        self.open.get(&id)
    }

    pub fn open(&mut self, id: RequestId, cadence: Cadence, round: u64) -> Result<(), DrawError> {
        if self.highest.is_some_and(|highest| id <= highest) {
            return Err(DrawError::RandomnessUnavailable(format!(
                "provider reused request id {}",
                id
            )));
        }
        self.open.insert(id, RequestRecord { cadence, round });
        self.highest = Some(id);
        Ok(())
    }

    /// Looks up an open request, rejecting stale ids.
    pub fn claimable(&self, id: RequestId) -> Result<RequestRecord, DrawError> {
        match self.open.get(&id) {
            Some(record) => Ok(*record),
            None if self.highest.is_some_and(|highest| id <= highest) => {
                Err(DrawError::ConsumedRequest(id))
            }
            None => Err(DrawError::UnknownRequest(id)),
        }
    }

    pub fn consume(&mut self, id: RequestId) -> Option<RequestRecord> {
        self.open.remove(&id)
    }

    pub fn pending(&self) -> impl Iterator<Item = (RequestId, &RequestRecord)> + '_ {
        self.open.iter().map(|(id, record)| (*id, record))
    }
}

/// A port that hands out sequential ids and remembers what was asked.
///
/// The contract publishes the queued requests for the off-chain relayer.
#[derive(Debug, Clone, Default)]
pub struct SequentialPort {
    next_id: u64,
    pub issued: Vec<(RequestId, RandomnessRequest)>,
}

impl SequentialPort {
    pub fn starting_at(next_id: u64) -> Self {
        SequentialPort {
            next_id,
            issued: Vec::new(),
        }
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }
}

impl RandomnessPort for SequentialPort {
    fn request_random(&mut self, request: &RandomnessRequest) -> Result<RequestId, DrawError> {
        let id = RequestId(self.next_id);
        self.next_id += 1;
        self.issued.push((id, request.clone()));
        Ok(id)
    }
}

/// Parses a random word from 64 hex digits, with or without a `0x` prefix.
pub fn parse_random_word(value: &str) -> Option<RandomWord> {
    let bytes = hex::decode(value.trim_start_matches("0x")).ok()?;
    RandomWord::try_from(bytes.as_slice()).ok()
}

/// Builds a random word whose low 64 bits are `value`.
#[cfg(test)]
pub(crate) fn word(value: u64) -> RandomWord {
    let mut bytes = [0u8; 32];
    bytes[24..].copy_from_slice(&value.to_be_bytes());
    bytes
}
