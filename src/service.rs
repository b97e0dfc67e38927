// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(target_arch = "wasm32", no_main)]

mod state;

use std::sync::Arc;

use async_graphql::{EmptySubscription, Object, Request, Response, Schema, SimpleObject};
use linera_sdk::{
    linera_base_types::{AccountOwner, Amount, WithServiceAbi},
    views::View,
    Service, ServiceRuntime,
};
use weighted_draw::{
    parse_random_word, AdminAction, BatchPolicy, Cadence, DrawEngine, DrawEvent, DrawOperation,
    DrawParameters, IneligibleReason, Phase, RequestId, SkipReason, StalledRoundPolicy,
    WeightedDrawAbi,
};

use self::state::WeightedDrawState;

pub struct WeightedDrawService {
    state: Arc<WeightedDrawState>,
    runtime: Arc<ServiceRuntime<Self>>,
}

linera_sdk::service!(WeightedDrawService);

impl WithServiceAbi for WeightedDrawService {
    type Abi = WeightedDrawAbi;
}

impl Service for WeightedDrawService {
    type Parameters = DrawParameters;

    async fn new(runtime: ServiceRuntime<Self>) -> Self {
        let state = WeightedDrawState::load(runtime.root_view_storage_context())
            .await
            .expect("Failed to load state");
        WeightedDrawService {
            state: Arc::new(state),
            runtime: Arc::new(runtime),
        }
    }

    async fn handle_query(&self, request: Request) -> Response {
        let schema = Schema::build(
            QueryRoot {
                state: self.state.clone(),
            },
            MutationRoot {
                runtime: self.runtime.clone(),
            },
            EmptySubscription,
        )
        .finish();
        schema.execute(request).await
    }
}

/// An account and its weight. Weights are `u128`, rendered as decimal strings.
#[derive(Debug, Clone, SimpleObject)]
struct WeightEntry {
    position: u64,
    account: AccountOwner,
    weight: String,
}

#[derive(Debug, Clone, SimpleObject)]
struct CadenceView {
    cadence: Cadence,
    next_anchor: u64,
    round: u64,
    pending: bool,
    stalled: bool,
    awaiting_request: Option<u64>,
    pot: Amount,
    funded: Amount,
    paid: Amount,
    deferred: Amount,
    payouts: u64,
}

#[derive(Debug, Clone, SimpleObject)]
struct PendingRequest {
    request_id: u64,
    cadence: Cadence,
    round: u64,
}

#[derive(Debug, Clone, SimpleObject)]
struct ConfigView {
    owner: AccountOwner,
    controller: AccountOwner,
    funding_source: AccountOwner,
    randomness_provider: AccountOwner,
    min_hourly_payout: Amount,
    callback_budget: u64,
    stalled_policy: StalledRoundPolicy,
    paused: bool,
}

/// Flattened settlement outcome.
#[derive(Debug, Clone, SimpleObject)]
struct OutcomeView {
    outcome: String,
    cadence: Cadence,
    round: u64,
    winner: Option<AccountOwner>,
    amount: Option<Amount>,
    skip_reason: Option<SkipReason>,
    ineligible_reason: Option<IneligibleReason>,
    detail: Option<String>,
}

fn convert_outcome(event: &DrawEvent<AccountOwner>) -> Option<OutcomeView> {
    let view = match event {
        DrawEvent::DrawSkipped { cadence, round, reason, pot, .. } => OutcomeView {
            outcome: "Skipped".to_string(),
            cadence: *cadence,
            round: *round,
            winner: None,
            amount: Some(*pot),
            skip_reason: Some(*reason),
            ineligible_reason: None,
            detail: None,
        },
        DrawEvent::WinnerIneligible { cadence, round, winner, reason, balance } => OutcomeView {
            outcome: "Ineligible".to_string(),
            cadence: *cadence,
            round: *round,
            winner: Some(*winner),
            amount: Some(*balance),
            skip_reason: None,
            ineligible_reason: Some(*reason),
            detail: None,
        },
        DrawEvent::WinnerPaid { cadence, round, winner, amount } => OutcomeView {
            outcome: "Paid".to_string(),
            cadence: *cadence,
            round: *round,
            winner: Some(*winner),
            amount: Some(*amount),
            skip_reason: None,
            ineligible_reason: None,
            detail: None,
        },
        DrawEvent::WinnerDeferred { cadence, round, winner, amount, reason } => OutcomeView {
            outcome: "Deferred".to_string(),
            cadence: *cadence,
            round: *round,
            winner: Some(*winner),
            amount: Some(*amount),
            skip_reason: None,
            ineligible_reason: None,
            detail: Some(reason.clone()),
        },
        DrawEvent::Funded { .. } | DrawEvent::DrawRequested { .. } => return None,
    };
    Some(view)
}

fn cadence_view(engine: &DrawEngine<AccountOwner>, cadence: Cadence) -> CadenceView {
    let state = engine.scheduler().cadence(cadence);
    let pot = engine.pots().pot(cadence);
    let awaiting_request = match state.phase {
        Phase::Awaiting(RequestId(id)) => Some(id),
        Phase::Idle | Phase::Stalled => None,
    };
    CadenceView {
        cadence,
        next_anchor: state.next_anchor,
        round: state.round,
        pending: state.pending(),
        stalled: state.phase == Phase::Stalled,
        awaiting_request,
        pot: pot.balance,
        funded: pot.funded,
        paid: pot.paid,
        deferred: pot.deferred,
        payouts: pot.payouts,
    }
}

struct QueryRoot {
    state: Arc<WeightedDrawState>,
}

#[Object]
impl QueryRoot {
    /// Sum of all weights
    async fn total_weight(&self) -> String {
        self.state.engine.get().index().total_weight().to_string()
    }

    /// Number of accounts ever given a weight
    async fn size(&self) -> u64 {
        self.state.engine.get().index().size() as u64
    }

    async fn weight_of(&self, account: AccountOwner) -> String {
        self.state.engine.get().index().weight_of(&account).to_string()
    }

    /// 1-based position of an account, if it was ever added
    async fn position_of(&self, account: AccountOwner) -> Option<u64> {
        self.state
            .engine
            .get()
            .index()
            .position_of(&account)
            .map(|position| position as u64)
    }

    async fn weights(&self) -> Vec<WeightEntry> {
        self.state
            .engine
            .get()
            .index()
            .entries()
            .enumerate()
            .map(|(offset, (account, weight))| WeightEntry {
                position: offset as u64 + 1,
                account: *account,
                weight: weight.to_string(),
            })
            .collect()
    }

    async fn cadence(&self, cadence: Cadence) -> CadenceView {
        cadence_view(self.state.engine.get(), cadence)
    }

    async fn cadences(&self) -> Vec<CadenceView> {
        let engine = self.state.engine.get();
        Cadence::ALL
            .iter()
            .map(|cadence| cadence_view(engine, *cadence))
            .collect()
    }

    /// Requests the randomness provider has not fulfilled yet
    async fn pending_requests(&self) -> Vec<PendingRequest> {
        self.state
            .engine
            .get()
            .requests()
            .pending()
            .map(|(RequestId(request_id), record)| PendingRequest {
                request_id,
                cadence: record.cadence,
                round: record.round,
            })
            .collect()
    }

    async fn config(&self) -> Option<ConfigView> {
        let engine = self.state.engine.get();
        let config = engine.config().ok()?;
        Some(ConfigView {
            owner: config.owner,
            controller: config.controller,
            funding_source: config.funding_source,
            randomness_provider: config.randomness_provider,
            min_hourly_payout: config.min_hourly_payout,
            callback_budget: config.callback_budget,
            stalled_policy: config.stalled_policy,
            paused: engine.is_paused(),
        })
    }

    async fn paused(&self) -> bool {
        self.state.engine.get().is_paused()
    }

    /// Most recent settlement of a cadence
    async fn last_outcome(&self, cadence: Cadence) -> Option<OutcomeView> {
        self.state
            .engine
            .get()
            .last_outcome(cadence)
            .and_then(convert_outcome)
    }

    async fn next_request_id(&self) -> u64 {
        *self.state.request_nonce.get()
    }
}

struct MutationRoot {
    runtime: Arc<ServiceRuntime<WeightedDrawService>>,
}

#[Object]
impl MutationRoot {
    async fn set_weight(&self, account: AccountOwner, weight: String) -> String {
        let Ok(weight) = weight.parse::<u128>() else {
            return format!("Invalid weight: {}", weight);
        };
        self.runtime
            .schedule_operation(&DrawOperation::SetWeight { account, weight });
        "SetWeight operation scheduled".to_string()
    }

    async fn set_weight_batch(
        &self,
        accounts: Vec<AccountOwner>,
        weights: Vec<String>,
        policy: Option<BatchPolicy>,
    ) -> String {
        let weights = match weights
            .iter()
            .map(|weight| weight.parse::<u128>())
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(weights) => weights,
            Err(e) => return format!("Invalid weight: {}", e),
        };
        self.runtime.schedule_operation(&DrawOperation::SetWeightBatch {
            accounts,
            weights,
            policy: policy.unwrap_or_default(),
        });
        "SetWeightBatch operation scheduled".to_string()
    }

    async fn fund(&self, payment: Amount, hourly: Amount, daily: Amount) -> String {
        self.runtime.schedule_operation(&DrawOperation::Fund {
            payment,
            hourly,
            daily,
        });
        "Fund operation scheduled".to_string()
    }

    async fn check_and_schedule(&self) -> String {
        self.runtime
            .schedule_operation(&DrawOperation::CheckAndSchedule);
        "CheckAndSchedule operation scheduled".to_string()
    }

    /// Delivers randomness as 64-digit hex words
    async fn fulfill_randomness(&self, request_id: u64, values: Vec<String>) -> String {
        let Some(values) = values
            .iter()
            .map(|value| parse_random_word(value))
            .collect::<Option<Vec<_>>>()
        else {
            return "Invalid random value, expected 64 hex digits".to_string();
        };
        self.runtime.schedule_operation(&DrawOperation::FulfillRandomness {
            request_id: RequestId(request_id),
            values,
        });
        "FulfillRandomness operation scheduled".to_string()
    }

    async fn pause(&self) -> String {
        self.admin(AdminAction::Pause)
    }

    async fn unpause(&self) -> String {
        self.admin(AdminAction::Unpause)
    }

    async fn transfer_ownership(&self, owner: AccountOwner) -> String {
        self.admin(AdminAction::TransferOwnership(owner))
    }

    async fn set_controller(&self, controller: AccountOwner) -> String {
        self.admin(AdminAction::SetController(controller))
    }

    async fn set_funding_source(&self, funding_source: AccountOwner) -> String {
        self.admin(AdminAction::SetFundingSource(funding_source))
    }

    async fn set_randomness_provider(&self, provider: AccountOwner) -> String {
        self.admin(AdminAction::SetRandomnessProvider(provider))
    }

    async fn set_min_hourly_payout(&self, amount: Amount) -> String {
        self.admin(AdminAction::SetMinHourlyPayout(amount))
    }

    async fn set_callback_budget(&self, budget: u64) -> String {
        self.admin(AdminAction::SetCallbackBudget(budget))
    }

    async fn set_stalled_policy(&self, policy: StalledRoundPolicy) -> String {
        self.admin(AdminAction::SetStalledPolicy(policy))
    }
}

impl MutationRoot {
    fn admin(&self, action: AdminAction<AccountOwner>) -> String {
        self.runtime.schedule_operation(&DrawOperation::Admin(action));
        "Admin operation scheduled".to_string()
    }
}
