// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Anchored hourly and daily draw schedules.

use linera_sdk::linera_base_types::Amount;
use serde::{Deserialize, Serialize};

use crate::error::DrawError;
use crate::event::{DrawEvent, SkipReason};
use crate::pot::Pots;
use crate::randomness::{RandomnessPort, RandomnessRequest, RequestBook, RequestId};

pub const SECONDS_PER_HOUR: u64 = 3_600;
pub const SECONDS_PER_DAY: u64 = 86_400;

/// One of the two independent draw schedules.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, async_graphql::Enum,
)]
pub enum Cadence {
    Hourly,
    Daily,
}

impl Cadence {
    pub const ALL: [Cadence; 2] = [Cadence::Hourly, Cadence::Daily];

    pub fn period(self) -> u64 {
        match self {
            Cadence::Hourly => SECONDS_PER_HOUR,
            Cadence::Daily => SECONDS_PER_DAY,
        }
    }

    /// Start of the next period strictly after `timestamp` (UTC seconds).
    ///
    /// A timestamp that is exactly on a boundary maps to the following one.
    pub fn next_boundary(self, timestamp: u64) -> u64 {
        let period = self.period();
        (timestamp / period).saturating_add(1).saturating_mul(period)
    }
}

/// What to do with a round whose fulfillment found an empty index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, async_graphql::Enum)]
pub enum StalledRoundPolicy {
    /// Re-request randomness for the same round when the anchor comes due.
    #[default]
    RetryAtNextAnchor,
    /// Re-request on the next due-check as soon as the index has weight.
    RetryImmediately,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Idle,
    /// A request is outstanding for the current round.
    Awaiting(RequestId),
    /// The last fulfillment found no weight; the round is kept for a retry.
    Stalled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CadenceState {
    pub next_anchor: u64,
    pub round: u64,
    pub phase: Phase,
}

impl CadenceState {
    pub fn pending(&self) -> bool {
        self.phase != Phase::Idle
    }
}

/// Parameters the due-check needs from the engine configuration.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleRules {
    pub min_hourly_payout: Amount,
    pub callback_budget: u64,
    pub stalled_policy: StalledRoundPolicy,
}

impl ScheduleRules {
    pub fn is_funded(&self, cadence: Cadence, pot: Amount) -> bool {
        match cadence {
            Cadence::Hourly => pot > self.min_hourly_payout,
            Cadence::Daily => pot > Amount::ZERO,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DrawScheduler {
    hourly: CadenceState,
    daily: CadenceState,
}

/// What a due cadence turned into, before anything is committed.
enum Decision {
    Request { retry: bool },
    Skip(SkipReason),
}

impl DrawScheduler {
    /// Anchors both cadences on the first boundary after `now`.
    pub fn start(now: u64) -> Self {
        DrawScheduler {
            hourly: CadenceState {
                next_anchor: Cadence::Hourly.next_boundary(now),
                ..CadenceState::default()
            },
            daily: CadenceState {
                next_anchor: Cadence::Daily.next_boundary(now),
                ..CadenceState::default()
            },
        }
    }

    pub fn cadence(&self, cadence: Cadence) -> &CadenceState {
        match cadence {
            Cadence::Hourly => &self.hourly,
            Cadence::Daily => &self.daily,
        }
    }

    pub fn cadence_mut(&mut self, cadence: Cadence) -> &mut CadenceState {
        match cadence {
            Cadence::Hourly => &mut self.hourly,
            Cadence::Daily => &mut self.daily,
        }
    }

    /// Evaluates both cadences and requests randomness for the funded ones.
    ///
    /// State is only committed once every request has been issued, so a
    /// failing port leaves the schedule untouched.
    pub fn check_and_schedule<K>(
        &mut self,
        now: u64,
        pots: &Pots,
        total_weight: u128,
        rules: &ScheduleRules,
        requests: &mut RequestBook,
        port: &mut dyn RandomnessPort,
    ) -> Result<Vec<DrawEvent<K>>, DrawError> {
        let mut next = self.clone();
        let mut opened = Vec::new();
        let mut events = Vec::new();

        for cadence in Cadence::ALL {
            let state = next.cadence_mut(cadence);
            let anchor_due = now >= state.next_anchor;
            let pot = pots.balance(cadence);

            let decision = match state.phase {
                Phase::Awaiting(_) => continue,
                Phase::Stalled => {
                    let retry_now = rules.stalled_policy == StalledRoundPolicy::RetryImmediately
                        && total_weight > 0;
                    if !anchor_due && !retry_now {
                        continue;
                    }
                    if rules.is_funded(cadence, pot) {
                        Decision::Request { retry: true }
                    } else {
                        Decision::Skip(skip_reason(cadence))
                    }
                }
                Phase::Idle => {
                    if !anchor_due {
                        continue;
                    }
                    state.round += 1;
                    if rules.is_funded(cadence, pot) {
                        Decision::Request { retry: false }
                    } else {
                        Decision::Skip(skip_reason(cadence))
                    }
                }
            };

            if anchor_due {
                state.next_anchor = cadence.next_boundary(now);
            }

            match decision {
                Decision::Request { retry } => {
                    let request = RandomnessRequest {
                        cadence,
                        round: state.round,
                        num_words: 1,
                        callback_budget: rules.callback_budget,
                    };
                    let request_id = port.request_random(&request)?;
                    state.phase = Phase::Awaiting(request_id);
                    opened.push((request_id, cadence, state.round));
                    events.push(DrawEvent::DrawRequested {
                        cadence,
                        round: state.round,
                        request_id,
                        retry,
                    });
                }
                Decision::Skip(reason) => {
                    state.phase = Phase::Idle;
                    events.push(DrawEvent::DrawSkipped {
                        cadence,
                        round: state.round,
                        reason,
                        pot,
                        total_weight,
                    });
                }
            }
        }

        if events.is_empty() {
            return Err(DrawError::NothingToDo);
        }

        let mut book = requests.clone();
        for (request_id, cadence, round) in opened {
            book.open(request_id, cadence, round)?;
        }
        *requests = book;
        *self = next;
        Ok(events)
    }
}

fn skip_reason(cadence: Cadence) -> SkipReason {
    match cadence {
        Cadence::Hourly => SkipReason::BelowFloor,
        Cadence::Daily => SkipReason::EmptyPot,
    }
}
