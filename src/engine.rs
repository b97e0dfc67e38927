// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The draw engine: one explicit context owning the index, the schedules, the
//! pots and the request records.

use std::collections::BTreeMap;

use linera_sdk::linera_base_types::Amount;
use serde::{Deserialize, Serialize};

use crate::error::{DrawError, Role};
use crate::event::DrawEvent;
use crate::guard::EntryLocks;
use crate::index::{BatchPolicy, BatchReport, Identifier, WeightedIndex};
use crate::pot::Pots;
use crate::randomness::{RandomWord, RandomnessPort, RequestBook, RequestId};
use crate::schedule::{Cadence, DrawScheduler, ScheduleRules, StalledRoundPolicy};
use crate::settlement::{Eligibility, SettlementEngine, Treasury};

/// Identities and tunables, bound once at initialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig<K> {
    pub owner: K,
    /// The only identity allowed to sync weights.
    pub controller: K,
    /// The only identity allowed to fund the pots.
    pub funding_source: K,
    /// The only identity allowed to deliver randomness.
    pub randomness_provider: K,
    pub min_hourly_payout: Amount,
    pub callback_budget: u64,
    pub stalled_policy: StalledRoundPolicy,
}

impl<K> EngineConfig<K> {
    fn identity(&self, role: Role) -> &K {
        match role {
            Role::Owner => &self.owner,
            Role::Controller => &self.controller,
            Role::FundingSource => &self.funding_source,
            Role::RandomnessProvider => &self.randomness_provider,
        }
    }

    fn rules(&self) -> ScheduleRules {
        ScheduleRules {
            min_hourly_payout: self.min_hourly_payout,
            callback_budget: self.callback_budget,
            stalled_policy: self.stalled_policy,
        }
    }
}

/// Owner-only configuration changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdminAction<K> {
    Pause,
    Unpause,
    TransferOwnership(K),
    SetController(K),
    SetFundingSource(K),
    SetRandomnessProvider(K),
    SetMinHourlyPayout(Amount),
    SetCallbackBudget(u64),
    SetStalledPolicy(StalledRoundPolicy),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "K: Identifier")]
pub struct DrawEngine<K> {
    config: Option<EngineConfig<K>>,
    paused: bool,
    index: WeightedIndex<K>,
    scheduler: DrawScheduler,
    pots: Pots,
    requests: RequestBook,
    /// Outcome of the most recent fulfillment per cadence.
    last_outcome: BTreeMap<Cadence, DrawEvent<K>>,
    #[serde(skip)]
    locks: EntryLocks,
}

impl<K> Default for DrawEngine<K> {
    fn default() -> Self {
        DrawEngine {
            config: None,
            paused: false,
            index: WeightedIndex::default(),
            scheduler: DrawScheduler::default(),
            pots: Pots::default(),
            requests: RequestBook::default(),
            last_outcome: BTreeMap::new(),
            locks: EntryLocks::default(),
        }
    }
}

impl<K: Identifier> DrawEngine<K> {
    /// Binds the identities and anchors both cadences. Can only happen once.
    pub fn initialize(&mut self, config: EngineConfig<K>, now: u64) -> Result<(), DrawError> {
        if self.config.is_some() {
            return Err(DrawError::AlreadyInitialized);
        }
        let identities = [
            &config.owner,
            &config.controller,
            &config.funding_source,
            &config.randomness_provider,
        ];
        if identities.iter().any(|id| id.is_null()) {
            return Err(DrawError::InvalidIdentifier);
        }
        self.scheduler = DrawScheduler::start(now);
        self.config = Some(config);
        log::info!(
            "Draw engine initialized, hourly anchor {}, daily anchor {}",
            self.scheduler.cadence(Cadence::Hourly).next_anchor,
            self.scheduler.cadence(Cadence::Daily).next_anchor
        );
        Ok(())
    }

    pub fn config(&self) -> Result<&EngineConfig<K>, DrawError> {
        self.config.as_ref().ok_or(DrawError::NotInitialized)
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn index(&self) -> &WeightedIndex<K> {
        &self.index
    }

    pub fn scheduler(&self) -> &DrawScheduler {
        &self.scheduler
    }

    pub fn pots(&self) -> &Pots {
        &self.pots
    }

    pub fn requests(&self) -> &RequestBook {
        &self.requests
    }

    pub fn last_outcome(&self, cadence: Cadence) -> Option<&DrawEvent<K>> {
        self.last_outcome.get(&cadence)
    }

    fn require(&self, role: Role, caller: &K) -> Result<&EngineConfig<K>, DrawError> {
        let config = self.config()?;
        if config.identity(role) != caller {
            return Err(DrawError::AccessDenied(role));
        }
        Ok(config)
    }

    pub fn set_weight(&mut self, caller: &K, id: &K, weight: u128) -> Result<bool, DrawError> {
        self.require(Role::Controller, caller)?;
        self.index.set_weight(id, weight)
    }

    pub fn set_weight_batch(
        &mut self,
        caller: &K,
        ids: &[K],
        weights: &[u128],
        policy: BatchPolicy,
    ) -> Result<BatchReport, DrawError> {
        self.require(Role::Controller, caller)?;
        self.index.set_weight_batch(ids, weights, policy)
    }

    /// Splits a payment of `paid` between the two pots.
    pub fn fund(
        &mut self,
        caller: &K,
        paid: Amount,
        hourly: Amount,
        daily: Amount,
    ) -> Result<DrawEvent<K>, DrawError> {
        self.require(Role::FundingSource, caller)?;
        if self.paused {
            return Err(DrawError::Paused);
        }
        let expected = hourly.try_add(daily).map_err(|_| DrawError::PotOverflow)?;
        if paid != expected {
            return Err(DrawError::FundingMismatch { paid, expected });
        }
        self.pots.fund(hourly, daily)?;
        Ok(DrawEvent::Funded { hourly, daily })
    }

    /// Evaluates both cadences at `now`. Fails with `NothingToDo` when neither
    /// was due, leaving every anchor where it was.
    pub fn check_and_schedule(
        &mut self,
        now: u64,
        port: &mut dyn RandomnessPort,
    ) -> Result<Vec<DrawEvent<K>>, DrawError> {
        let lock = self.locks.schedule.clone();
        let _guard = lock.enter()?;
        let rules = self.config()?.rules();
        if self.paused {
            return Err(DrawError::Paused);
        }
        self.scheduler.check_and_schedule(
            now,
            &self.pots,
            self.index.total_weight(),
            &rules,
            &mut self.requests,
            port,
        )
    }

    /// Randomness callback. Only the configured provider may call it, once per
    /// request id, with exactly one value.
    pub fn on_random_fulfilled<E>(
        &mut self,
        caller: &K,
        request_id: RequestId,
        values: &[RandomWord],
        env: &mut E,
    ) -> Result<DrawEvent<K>, DrawError>
    where
        E: Eligibility<K> + Treasury<K> + ?Sized,
    {
        let lock = self.locks.fulfillment.clone();
        let _guard = lock.enter()?;
        self.require(Role::RandomnessProvider, caller)?;

        let mut settlement = SettlementEngine {
            index: &self.index,
            pots: &mut self.pots,
            scheduler: &mut self.scheduler,
            requests: &mut self.requests,
        };
        let event = settlement.fulfill(request_id, values, env)?;
        if let Some(cadence) = event.cadence() {
            self.last_outcome.insert(cadence, event.clone());
        }
        Ok(event)
    }

    pub fn administer(&mut self, caller: &K, action: AdminAction<K>) -> Result<(), DrawError> {
        self.require(Role::Owner, caller)?;
        if let AdminAction::Pause | AdminAction::Unpause = action {
            self.paused = action == AdminAction::Pause;
            return Ok(());
        }

        let config = self.config.as_mut().ok_or(DrawError::NotInitialized)?;
        match action {
            AdminAction::TransferOwnership(id)
            | AdminAction::SetController(id)
            | AdminAction::SetFundingSource(id)
            | AdminAction::SetRandomnessProvider(id)
                if id.is_null() =>
            {
                return Err(DrawError::InvalidIdentifier);
            }
            AdminAction::TransferOwnership(id) => config.owner = id,
            AdminAction::SetController(id) => config.controller = id,
            AdminAction::SetFundingSource(id) => config.funding_source = id,
            AdminAction::SetRandomnessProvider(id) => config.randomness_provider = id,
            AdminAction::SetMinHourlyPayout(amount) => config.min_hourly_payout = amount,
            AdminAction::SetCallbackBudget(budget) => config.callback_budget = budget,
            AdminAction::SetStalledPolicy(policy) => config.stalled_policy = policy,
            AdminAction::Pause | AdminAction::Unpause => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EntryPoint, ErrorKind, TransferError};
    use crate::event::{IneligibleReason, SkipReason};
    use crate::guard::EntryLock;
    use crate::index::tests::TestId;
    use crate::randomness::{word, SequentialPort};
    use crate::schedule::{Phase, SECONDS_PER_DAY, SECONDS_PER_HOUR};
    use crate::settlement::EligibilityStatus;

    const DAY_START: u64 = 1_700_006_400;
    const OWNER: TestId = TestId(1);
    const CONTROLLER: TestId = TestId(2);
    const FUNDER: TestId = TestId(3);
    const PROVIDER: TestId = TestId(4);
    const ALICE: TestId = TestId(10);
    const BOB: TestId = TestId(11);

    /// Eligibility and payouts as seen from the engine.
    #[derive(Default)]
    struct World {
        contracts: Vec<TestId>,
        blocked: Vec<TestId>,
        failing: bool,
        transfers: Vec<(TestId, Amount)>,
        /// Set during a transfer to check the fulfillment lock.
        probe: Option<EntryLock>,
        reentry: Option<Result<(), DrawError>>,
    }

    impl Eligibility<TestId> for World {
        fn is_simple_account(&mut self, account: &TestId) -> bool {
            !self.contracts.contains(account)
        }

        fn status(&mut self, account: &TestId) -> EligibilityStatus {
            EligibilityStatus {
                eligible: !self.blocked.contains(account),
                balance: Amount::from_tokens(2),
            }
        }
    }

    impl Treasury<TestId> for World {
        fn transfer(&mut self, recipient: &TestId, amount: Amount) -> Result<(), TransferError> {
            if let Some(lock) = &self.probe {
                self.reentry = Some(lock.enter().map(|_| ()));
            }
            if self.failing {
                return Err(TransferError::Rejected("recipient refused".to_string()));
            }
            self.transfers.push((recipient.clone(), amount));
            Ok(())
        }
    }

    fn engine() -> DrawEngine<TestId> {
        let mut engine = DrawEngine::default();
        let config = EngineConfig {
            owner: OWNER,
            controller: CONTROLLER,
            funding_source: FUNDER,
            randomness_provider: PROVIDER,
            min_hourly_payout: Amount::from_tokens(1),
            callback_budget: 200_000,
            stalled_policy: StalledRoundPolicy::RetryAtNextAnchor,
        };
        engine.initialize(config, DAY_START - 10).unwrap();
        engine
            .set_weight_batch(&CONTROLLER, &[ALICE, BOB], &[10, 30], BatchPolicy::AllOrNothing)
            .unwrap();
        engine
    }

    fn fund(engine: &mut DrawEngine<TestId>, hourly: u128, daily: u128) {
        let (hourly, daily) = (Amount::from_tokens(hourly), Amount::from_tokens(daily));
        let paid = hourly.saturating_add(daily);
        engine.fund(&FUNDER, paid, hourly, daily).unwrap();
    }

    /// Schedules at the first boundary and returns the issued request ids.
    fn schedule(engine: &mut DrawEngine<TestId>, port: &mut SequentialPort) -> Vec<RequestId> {
        let events = engine.check_and_schedule(DAY_START, port).unwrap();
        events
            .into_iter()
            .filter_map(|event| match event {
                DrawEvent::DrawRequested { request_id, .. } => Some(request_id),
                _ => None,
            })
            .collect()
    }

    fn conserved(engine: &DrawEngine<TestId>) -> bool {
        Cadence::ALL.iter().all(|cadence| {
            let pot = engine.pots().pot(*cadence);
            pot.funded == pot.paid.saturating_add(pot.balance)
        })
    }

    #[test]
    fn test_full_draw_pays_winner() {
        let mut engine = engine();
        fund(&mut engine, 5, 20);
        let mut port = SequentialPort::default();
        let ids = schedule(&mut engine, &mut port);
        assert_eq!(ids, vec![RequestId(0), RequestId(1)]);

        let mut world = World::default();
        let event = engine
            .on_random_fulfilled(&PROVIDER, ids[0], &[word(9)], &mut world)
            .unwrap();
        assert_eq!(
            event,
            DrawEvent::WinnerPaid {
                cadence: Cadence::Hourly,
                round: 1,
                winner: ALICE,
                amount: Amount::from_tokens(5),
            }
        );

        engine
            .on_random_fulfilled(&PROVIDER, ids[1], &[word(10)], &mut world)
            .unwrap();
        assert_eq!(
            world.transfers,
            vec![(ALICE, Amount::from_tokens(5)), (BOB, Amount::from_tokens(20))]
        );
        assert_eq!(engine.pots().balance(Cadence::Hourly), Amount::ZERO);
        assert!(!engine.scheduler().cadence(Cadence::Daily).pending());
        assert_eq!(engine.last_outcome(Cadence::Hourly), Some(&event));
        assert!(conserved(&engine));
    }

    #[test]
    fn test_stale_callbacks_rejected() {
        let mut engine = engine();
        fund(&mut engine, 5, 0);
        let mut port = SequentialPort::default();
        let ids = schedule(&mut engine, &mut port);
        let mut world = World::default();

        let unknown = engine.on_random_fulfilled(&PROVIDER, RequestId(99), &[word(1)], &mut world);
        assert_eq!(unknown, Err(DrawError::UnknownRequest(RequestId(99))));

        let malformed =
            engine.on_random_fulfilled(&PROVIDER, ids[0], &[word(1), word(2)], &mut world);
        assert_eq!(malformed, Err(DrawError::MalformedRandomness(2)));
        assert_eq!(malformed.unwrap_err().kind(), ErrorKind::StaleOrMalformedCallback);
        let empty = engine.on_random_fulfilled(&PROVIDER, ids[0], &[], &mut world);
        assert_eq!(empty, Err(DrawError::MalformedRandomness(0)));
        assert_eq!(engine.requests().pending().count(), 1);
        assert_eq!(engine.pots().balance(Cadence::Hourly), Amount::from_tokens(5));

        engine
            .on_random_fulfilled(&PROVIDER, ids[0], &[word(1)], &mut world)
            .unwrap();
        let pot = *engine.pots().pot(Cadence::Hourly);
        let replay = engine.on_random_fulfilled(&PROVIDER, ids[0], &[word(1)], &mut world);
        assert_eq!(replay, Err(DrawError::ConsumedRequest(ids[0])));
        assert_eq!(engine.requests().get(ids[0]), None);
        assert_eq!(*engine.pots().pot(Cadence::Hourly), pot);
        assert_eq!(world.transfers.len(), 1);
    }

    #[test]
    fn test_ineligible_winner_keeps_pot() {
        let mut engine = engine();
        fund(&mut engine, 5, 0);
        let mut port = SequentialPort::default();
        let ids = schedule(&mut engine, &mut port);
        let mut world = World {
            blocked: vec![BOB],
            ..World::default()
        };

        let event = engine
            .on_random_fulfilled(&PROVIDER, ids[0], &[word(25)], &mut world)
            .unwrap();
        assert_eq!(
            event,
            DrawEvent::WinnerIneligible {
                cadence: Cadence::Hourly,
                round: 1,
                winner: BOB,
                reason: IneligibleReason::FailedEligibility,
                balance: Amount::from_tokens(2),
            }
        );
        assert!(world.transfers.is_empty());
        assert_eq!(engine.pots().balance(Cadence::Hourly), Amount::from_tokens(5));
        assert!(!engine.scheduler().cadence(Cadence::Hourly).pending());
    }

    #[test]
    fn test_contract_winner_is_not_simple() {
        let mut engine = engine();
        fund(&mut engine, 5, 0);
        let mut port = SequentialPort::default();
        let ids = schedule(&mut engine, &mut port);
        let mut world = World {
            contracts: vec![ALICE],
            ..World::default()
        };

        let event = engine
            .on_random_fulfilled(&PROVIDER, ids[0], &[word(0)], &mut world)
            .unwrap();
        assert!(matches!(
            event,
            DrawEvent::WinnerIneligible {
                reason: IneligibleReason::NotSimpleAccount,
                ..
            }
        ));
        assert!(world.transfers.is_empty());
        assert_eq!(engine.pots().balance(Cadence::Hourly), Amount::from_tokens(5));
    }

    #[test]
    fn test_failed_transfer_restores_pot() {
        let mut engine = engine();
        fund(&mut engine, 0, 12);
        let mut port = SequentialPort::default();
        let ids = schedule(&mut engine, &mut port);
        assert_eq!(ids.len(), 1);
        let mut world = World {
            failing: true,
            ..World::default()
        };

        let event = engine
            .on_random_fulfilled(&PROVIDER, ids[0], &[word(39)], &mut world)
            .unwrap();
        assert!(matches!(event, DrawEvent::WinnerDeferred { winner: BOB, .. }));
        let daily = engine.pots().pot(Cadence::Daily);
        assert_eq!(daily.balance, Amount::from_tokens(12));
        assert_eq!(daily.deferred, Amount::from_tokens(12));
        assert_eq!(daily.paid, Amount::ZERO);
        assert!(!engine.scheduler().cadence(Cadence::Daily).pending());
        assert!(conserved(&engine));
    }

    #[test]
    fn test_zero_weight_stalls_round_then_retries() {
        let mut engine = engine();
        fund(&mut engine, 0, 8);
        let mut port = SequentialPort::default();
        let ids = schedule(&mut engine, &mut port);
        engine
            .set_weight_batch(&CONTROLLER, &[ALICE, BOB], &[0, 0], BatchPolicy::AllOrNothing)
            .unwrap();

        let event = engine
            .on_random_fulfilled(&PROVIDER, ids[0], &[word(3)], &mut World::default())
            .unwrap();
        assert!(matches!(
            event,
            DrawEvent::DrawSkipped { reason: SkipReason::ZeroWeight, .. }
        ));
        let daily = *engine.scheduler().cadence(Cadence::Daily);
        assert_eq!(daily.phase, Phase::Stalled);
        assert!(daily.pending());
        assert_eq!(engine.pots().balance(Cadence::Daily), Amount::from_tokens(8));
        assert_eq!(engine.requests().pending().count(), 0);

        engine.set_weight(&CONTROLLER, &ALICE, 4).unwrap();
        let events = engine
            .check_and_schedule(DAY_START + SECONDS_PER_DAY, &mut port)
            .unwrap();
        assert!(events.contains(&DrawEvent::DrawRequested {
            cadence: Cadence::Daily,
            round: 1,
            request_id: RequestId(1),
            retry: true,
        }));
    }

    #[test]
    fn test_zero_pot_clears_pending() {
        let mut engine = engine();
        fund(&mut engine, 0, 8);
        let mut port = SequentialPort::default();
        let ids = schedule(&mut engine, &mut port);
        engine.pots = Pots::default();

        let event = engine
            .on_random_fulfilled(&PROVIDER, ids[0], &[word(3)], &mut World::default())
            .unwrap();
        assert!(matches!(
            event,
            DrawEvent::DrawSkipped { reason: SkipReason::ZeroPot, .. }
        ));
        assert!(!engine.scheduler().cadence(Cadence::Daily).pending());
        assert_eq!(engine.requests().pending().count(), 0);
    }

    #[test]
    fn test_fulfillment_is_not_reentrant() {
        let mut engine = engine();
        fund(&mut engine, 5, 0);
        let mut port = SequentialPort::default();
        let ids = schedule(&mut engine, &mut port);

        let mut world = World {
            probe: Some(engine.locks.fulfillment.clone()),
            ..World::default()
        };
        engine
            .on_random_fulfilled(&PROVIDER, ids[0], &[word(0)], &mut world)
            .unwrap();
        assert_eq!(
            world.reentry,
            Some(Err(DrawError::Reentrant(EntryPoint::Fulfillment)))
        );
        assert!(!engine.locks.fulfillment.is_held());

        let held = engine.locks.schedule.clone();
        let _guard = held.enter().unwrap();
        let result = engine.check_and_schedule(DAY_START + SECONDS_PER_HOUR, &mut port);
        assert_eq!(result, Err(DrawError::Reentrant(EntryPoint::Schedule)));
    }

    #[test]
    fn test_access_control() {
        let mut engine = engine();
        let mut port = SequentialPort::default();

        assert_eq!(
            engine.set_weight(&ALICE, &ALICE, 100),
            Err(DrawError::AccessDenied(Role::Controller))
        );
        assert_eq!(
            engine.fund(&CONTROLLER, Amount::ZERO, Amount::ZERO, Amount::ZERO),
            Err(DrawError::AccessDenied(Role::FundingSource))
        );
        assert_eq!(
            engine.administer(&CONTROLLER, AdminAction::Pause),
            Err(DrawError::AccessDenied(Role::Owner))
        );

        fund(&mut engine, 5, 0);
        let ids = schedule(&mut engine, &mut port);
        let result = engine.on_random_fulfilled(&FUNDER, ids[0], &[word(0)], &mut World::default());
        assert_eq!(result, Err(DrawError::AccessDenied(Role::RandomnessProvider)));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::AccessDenied);
        assert_eq!(engine.requests().pending().count(), 1);
    }

    #[test]
    fn test_funding_must_match_payment() {
        let mut engine = engine();
        let result = engine.fund(
            &FUNDER,
            Amount::from_tokens(3),
            Amount::from_tokens(1),
            Amount::from_tokens(1),
        );
        assert_eq!(
            result,
            Err(DrawError::FundingMismatch {
                paid: Amount::from_tokens(3),
                expected: Amount::from_tokens(2),
            })
        );
        assert_eq!(engine.pots().pot(Cadence::Hourly).funded, Amount::ZERO);
    }

    #[test]
    fn test_pause_blocks_funding_and_scheduling() {
        let mut engine = engine();
        fund(&mut engine, 5, 0);
        let mut port = SequentialPort::default();
        let ids = schedule(&mut engine, &mut port);

        engine.administer(&OWNER, AdminAction::Pause).unwrap();
        assert!(engine.is_paused());
        assert_eq!(
            engine.fund(&FUNDER, Amount::ZERO, Amount::ZERO, Amount::ZERO),
            Err(DrawError::Paused)
        );
        assert_eq!(
            engine.check_and_schedule(DAY_START + SECONDS_PER_HOUR, &mut port),
            Err(DrawError::Paused)
        );

        // In-flight requests still settle.
        engine
            .on_random_fulfilled(&PROVIDER, ids[0], &[word(0)], &mut World::default())
            .unwrap();

        engine.administer(&OWNER, AdminAction::Unpause).unwrap();
        assert!(!engine.is_paused());
    }

    #[test]
    fn test_admin_updates_config() {
        let mut engine = engine();
        engine
            .administer(&OWNER, AdminAction::SetController(TestId(20)))
            .unwrap();
        engine
            .administer(&OWNER, AdminAction::SetMinHourlyPayout(Amount::from_tokens(9)))
            .unwrap();
        engine
            .administer(&OWNER, AdminAction::SetCallbackBudget(50_000))
            .unwrap();
        assert_eq!(
            engine.administer(&OWNER, AdminAction::SetFundingSource(TestId(0))),
            Err(DrawError::InvalidIdentifier)
        );
        engine
            .administer(&OWNER, AdminAction::TransferOwnership(TestId(21)))
            .unwrap();

        let config = engine.config().unwrap();
        assert_eq!(config.controller, TestId(20));
        assert_eq!(config.owner, TestId(21));
        assert_eq!(config.funding_source, FUNDER);
        assert_eq!(config.min_hourly_payout, Amount::from_tokens(9));
        assert_eq!(config.callback_budget, 50_000);
        assert_eq!(
            engine.set_weight(&CONTROLLER, &ALICE, 1),
            Err(DrawError::AccessDenied(Role::Controller))
        );
    }

    #[test]
    fn test_initialization_is_one_time() {
        let mut fresh: DrawEngine<TestId> = DrawEngine::default();
        let mut port = SequentialPort::default();
        assert_eq!(
            fresh.check_and_schedule(DAY_START, &mut port),
            Err(DrawError::NotInitialized)
        );
        assert_eq!(
            fresh.set_weight(&CONTROLLER, &ALICE, 1),
            Err(DrawError::NotInitialized)
        );

        let mut engine = engine();
        let config = engine.config().unwrap().clone();
        assert_eq!(
            engine.initialize(config, DAY_START),
            Err(DrawError::AlreadyInitialized)
        );
    }

    #[test]
    fn test_conservation_over_many_rounds() {
        let mut engine = engine();
        let mut port = SequentialPort::default();

        for hour in 0..48u64 {
            let now = DAY_START + hour * SECONDS_PER_HOUR;
            fund(&mut engine, 2, 1);
            let events = match engine.check_and_schedule(now, &mut port) {
                Ok(events) => events,
                Err(error) => {
                    assert_eq!(error, DrawError::NothingToDo);
                    continue;
                }
            };
            for event in events {
                if let DrawEvent::DrawRequested { request_id, .. } = event {
                    let mut world = World {
                        blocked: vec![ALICE],
                        failing: hour % 5 == 0,
                        ..World::default()
                    };
                    engine
                        .on_random_fulfilled(&PROVIDER, request_id, &[word(hour * 7)], &mut world)
                        .unwrap();
                }
            }
            assert!(conserved(&engine));
        }
        assert!(engine.pots().pot(Cadence::Hourly).payouts > 0);
        assert_eq!(engine.requests().pending().count(), 0);
    }
}
