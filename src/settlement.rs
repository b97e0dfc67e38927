// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Turning a fulfilled random value into a payout.

use linera_sdk::linera_base_types::Amount;

use crate::error::{DrawError, TransferError};
use crate::event::{DrawEvent, IneligibleReason, SkipReason};
use crate::index::{Identifier, WeightedIndex};
use crate::pot::Pots;
use crate::randomness::{RandomWord, RequestBook, RequestId};
use crate::schedule::{DrawScheduler, Phase};

/// What the external balance bookkeeping reports about an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EligibilityStatus {
    pub eligible: bool,
    pub balance: Amount,
}

/// Decides whether a drawn account may receive a payout.
pub trait Eligibility<K> {
    /// Whether `account` is a plain account with no code attached.
    fn is_simple_account(&mut self, account: &K) -> bool;

    fn status(&mut self, account: &K) -> EligibilityStatus;
}

/// Moves pot funds to a winner.
///
/// Settlement asks the same environment for eligibility and for the
/// transfer, since both usually go through one runtime handle.
pub trait Treasury<K> {
    fn transfer(&mut self, recipient: &K, amount: Amount) -> Result<(), TransferError>;
}

/// Borrowed view of the engine state a fulfillment touches.
pub struct SettlementEngine<'a, K> {
    pub index: &'a WeightedIndex<K>,
    pub pots: &'a mut Pots,
    pub scheduler: &'a mut DrawScheduler,
    pub requests: &'a mut RequestBook,
}

impl<K: Identifier> SettlementEngine<'_, K> {
    /// Settles the round bound to `request_id` using the delivered values.
    ///
    /// Stale or malformed callbacks are rejected before anything changes.
    pub fn fulfill<E>(
        &mut self,
        request_id: RequestId,
        values: &[RandomWord],
        env: &mut E,
    ) -> Result<DrawEvent<K>, DrawError>
    where
        E: Eligibility<K> + Treasury<K> + ?Sized,
    {
        let record = self.requests.claimable(request_id)?;
        let random = match values {
            [random] => random,
            _ => return Err(DrawError::MalformedRandomness(values.len())),
        };
        let cadence = record.cadence;
        let round = record.round;
        self.requests.consume(request_id);

        let pot = self.pots.balance(cadence);
        if pot == Amount::ZERO {
            self.scheduler.cadence_mut(cadence).phase = Phase::Idle;
            return Ok(DrawEvent::DrawSkipped {
                cadence,
                round,
                reason: SkipReason::ZeroPot,
                pot,
                total_weight: self.index.total_weight(),
            });
        }

        let total_weight = self.index.total_weight();
        if total_weight == 0 {
            // The round stays pending; the scheduler retries it.
            self.scheduler.cadence_mut(cadence).phase = Phase::Stalled;
            return Ok(DrawEvent::DrawSkipped {
                cadence,
                round,
                reason: SkipReason::ZeroWeight,
                pot,
                total_weight,
            });
        }

        let winner = self.index.draw(random)?.clone();
        self.scheduler.cadence_mut(cadence).phase = Phase::Idle;

        let ineligible = if !env.is_simple_account(&winner) {
            Some((IneligibleReason::NotSimpleAccount, Amount::ZERO))
        } else {
            let status = env.status(&winner);
            (!status.eligible).then_some((IneligibleReason::FailedEligibility, status.balance))
        };
        if let Some((reason, balance)) = ineligible {
            return Ok(DrawEvent::WinnerIneligible {
                cadence,
                round,
                winner,
                reason,
                balance,
            });
        }

        let amount = self.pots.take(cadence);
        match env.transfer(&winner, amount) {
            Ok(()) => {
                self.pots.settle_paid(cadence, amount);
                Ok(DrawEvent::WinnerPaid {
                    cadence,
                    round,
                    winner,
                    amount,
                })
            }
            Err(error) => {
                log::warn!("Payout of {} to {:?} failed: {}", amount, winner, error);
                self.pots.restore(cadence, amount);
                Ok(DrawEvent::WinnerDeferred {
                    cadence,
                    round,
                    winner,
                    amount,
                    reason: error.to_string(),
                })
            }
        }
    }
}
