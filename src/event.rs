// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use linera_sdk::linera_base_types::Amount;
use serde::{Deserialize, Serialize};

use crate::randomness::RequestId;
use crate::schedule::Cadence;

/// Why a round did not produce a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, async_graphql::Enum)]
pub enum SkipReason {
    /// Hourly pot not above the minimum payout at due time.
    BelowFloor,
    /// Daily pot empty at due time.
    EmptyPot,
    /// Pot was empty when the randomness arrived.
    ZeroPot,
    /// Index had no weight when the randomness arrived.
    ZeroWeight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, async_graphql::Enum)]
pub enum IneligibleReason {
    NotSimpleAccount,
    FailedEligibility,
}

/// Everything observable that a transition did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DrawEvent<K> {
    Funded {
        hourly: Amount,
        daily: Amount,
    },
    DrawRequested {
        cadence: Cadence,
        round: u64,
        request_id: RequestId,
        retry: bool,
    },
    DrawSkipped {
        cadence: Cadence,
        round: u64,
        reason: SkipReason,
        pot: Amount,
        total_weight: u128,
    },
    WinnerIneligible {
        cadence: Cadence,
        round: u64,
        winner: K,
        reason: IneligibleReason,
        balance: Amount,
    },
    WinnerPaid {
        cadence: Cadence,
        round: u64,
        winner: K,
        amount: Amount,
    },
    WinnerDeferred {
        cadence: Cadence,
        round: u64,
        winner: K,
        amount: Amount,
        reason: String,
    },
}

impl<K> DrawEvent<K> {
    /// The cadence a round event belongs to. Funding spans both.
    pub fn cadence(&self) -> Option<Cadence> {
        match self {
            DrawEvent::Funded { .. } => None,
            DrawEvent::DrawRequested { cadence, .. }
            | DrawEvent::DrawSkipped { cadence, .. }
            | DrawEvent::WinnerIneligible { cadence, .. }
            | DrawEvent::WinnerPaid { cadence, .. }
            | DrawEvent::WinnerDeferred { cadence, .. } => Some(*cadence),
        }
    }
}
