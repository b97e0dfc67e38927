// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use linera_sdk::linera_base_types::Amount;
use serde::{Deserialize, Serialize};

use crate::error::DrawError;
use crate::schedule::Cadence;

/// Accumulated funds of one cadence and the running ledger behind them.
///
/// Outside of a settlement `funded == paid + balance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pot {
    pub balance: Amount,
    pub funded: Amount,
    pub paid: Amount,
    /// Payouts whose transfer failed and went back into the pot.
    pub deferred: Amount,
    pub payouts: u64,
}

impl Pot {
    /// Funds debited from the pot but neither paid nor restored yet.
    pub fn in_flight(&self) -> Amount {
        self.funded
            .try_sub(self.paid)
            .and_then(|unpaid| unpaid.try_sub(self.balance))
            .unwrap_or(Amount::ZERO)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pots {
    hourly: Pot,
    daily: Pot,
}

impl Pots {
    pub fn pot(&self, cadence: Cadence) -> &Pot {
        match cadence {
            Cadence::Hourly => &self.hourly,
            Cadence::Daily => &self.daily,
        }
    }

    fn pot_mut(&mut self, cadence: Cadence) -> &mut Pot {
        match cadence {
            Cadence::Hourly => &mut self.hourly,
            Cadence::Daily => &mut self.daily,
        }
    }

    pub fn balance(&self, cadence: Cadence) -> Amount {
        self.pot(cadence).balance
    }

    /// Credits both pots, or neither.
    pub fn fund(&mut self, hourly: Amount, daily: Amount) -> Result<(), DrawError> {
        let mut next = self.clone();
        for (cadence, amount) in [(Cadence::Hourly, hourly), (Cadence::Daily, daily)] {
            let pot = next.pot_mut(cadence);
            pot.balance = pot.balance.try_add(amount).map_err(|_| DrawError::PotOverflow)?;
            pot.funded = pot.funded.try_add(amount).map_err(|_| DrawError::PotOverflow)?;
        }
        *self = next;
        Ok(())
    }

    /// Empties the pot ahead of a transfer and returns what it held.
    pub fn take(&mut self, cadence: Cadence) -> Amount {
        std::mem::replace(&mut self.pot_mut(cadence).balance, Amount::ZERO)
    }

    pub fn settle_paid(&mut self, cadence: Cadence, amount: Amount) {
        let pot = self.pot_mut(cadence);
        pot.paid = pot.paid.saturating_add(amount);
        pot.payouts += 1;
    }

    /// Puts a payout back after its transfer failed.
    pub fn restore(&mut self, cadence: Cadence, amount: Amount) {
        let pot = self.pot_mut(cadence);
        pot.balance = pot.balance.saturating_add(amount);
        pot.deferred = pot.deferred.saturating_add(amount);
    }
}
