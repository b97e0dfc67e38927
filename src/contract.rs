// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(target_arch = "wasm32", no_main)]

mod state;

use linera_sdk::{
    linera_base_types::{Account, AccountOwner, Amount, ApplicationId, WithContractAbi},
    views::{RootView, View},
    Contract, ContractRuntime,
};
use weighted_draw::{
    DrawEvent, DrawOperation, DrawParameters, DrawResponse, Eligibility, EligibilityAbi,
    EligibilityOperation, EligibilityResponse, EligibilityStatus, InstantiationArgument,
    SequentialPort, TransferError, Treasury, WeightedDrawAbi,
};

use self::state::WeightedDrawState;

pub struct WeightedDrawContract {
    state: WeightedDrawState,
    runtime: ContractRuntime<Self>,
}

linera_sdk::contract!(WeightedDrawContract);

impl WithContractAbi for WeightedDrawContract {
    type Abi = WeightedDrawAbi;
}

impl Contract for WeightedDrawContract {
    type Message = ();
    type Parameters = DrawParameters;
    type InstantiationArgument = InstantiationArgument;
    type EventValue = ();

    async fn load(runtime: ContractRuntime<Self>) -> Self {
        let state = WeightedDrawState::load(runtime.root_view_storage_context())
            .await
            .expect("Failed to load state");
        WeightedDrawContract { state, runtime }
    }

    async fn instantiate(&mut self, argument: Self::InstantiationArgument) {
        // Validate params access
        let _ = self.runtime.application_parameters();
        let now = self.now();
        if let Err(e) = self.state.engine.get_mut().initialize(argument.into(), now) {
            panic!("Failed to initialize weighted draw: {}", e);
        }
    }

    async fn execute_operation(&mut self, operation: Self::Operation) -> Self::Response {
        let caller = self.caller();
        match operation {
            DrawOperation::SetWeight { account, weight } => {
                match self.state.engine.get_mut().set_weight(&caller, &account, weight) {
                    Ok(changed) => DrawResponse::WeightUpdated(changed),
                    Err(e) => panic!("Failed to set weight: {}", e),
                }
            }

            DrawOperation::SetWeightBatch { accounts, weights, policy } => {
                let engine = self.state.engine.get_mut();
                match engine.set_weight_batch(&caller, &accounts, &weights, policy) {
                    Ok(report) => DrawResponse::Batch {
                        applied: report.applied,
                        rejected: report
                            .rejected
                            .into_iter()
                            .map(|(offset, error)| (offset, error.to_string()))
                            .collect(),
                    },
                    Err(e) => panic!("Failed to set weight batch: {}", e),
                }
            }

            DrawOperation::Fund { payment, hourly, daily } => {
                let event = match self.state.engine.get_mut().fund(&caller, payment, hourly, daily) {
                    Ok(event) => event,
                    Err(e) => panic!("Failed to fund pots: {}", e),
                };
                self.collect_payment(caller, payment);
                self.respond(vec![event])
            }

            DrawOperation::CheckAndSchedule => {
                let now = self.now();
                let mut port = SequentialPort::starting_at(*self.state.request_nonce.get());
                let events = match self.state.engine.get_mut().check_and_schedule(now, &mut port) {
                    Ok(events) => events,
                    Err(e) => panic!("Failed to schedule draws: {}", e),
                };
                self.state.request_nonce.set(port.next_id());
                for (request_id, request) in &port.issued {
                    log::info!(
                        "Randomness request {} for {:?} round {} (budget {})",
                        request_id,
                        request.cadence,
                        request.round,
                        request.callback_budget
                    );
                }
                self.respond(events)
            }

            DrawOperation::FulfillRandomness { request_id, values } => {
                let parameters = self.runtime.application_parameters();
                let mut env = RuntimeEnv {
                    runtime: &mut self.runtime,
                    eligibility_app_id: parameters.eligibility_app_id,
                };
                let engine = self.state.engine.get_mut();
                match engine.on_random_fulfilled(&caller, request_id, &values, &mut env) {
                    Ok(event) => self.respond(vec![event]),
                    Err(e) => panic!("Failed to fulfill request {}: {}", request_id, e),
                }
            }

            DrawOperation::Admin(action) => {
                log::info!("Admin action {:?}", action);
                match self.state.engine.get_mut().administer(&caller, action) {
                    Ok(()) => DrawResponse::Ok,
                    Err(e) => panic!("Failed to apply admin action: {}", e),
                }
            }
        }
    }

    async fn execute_message(&mut self, _message: Self::Message) {
        panic!("Weighted draw application doesn't support any cross-chain messages");
    }

    async fn store(mut self) {
        self.state.save().await.expect("Failed to save state");
    }
}

impl WeightedDrawContract {
    /// Seconds since the epoch, from the block timestamp.
    fn now(&mut self) -> u64 {
        self.runtime.system_time().micros() / 1_000_000
    }

    /// The calling application if any, otherwise the signer.
    fn caller(&mut self) -> AccountOwner {
        if let Some(app_id) = self.runtime.authenticated_caller_id() {
            return app_id.into();
        }
        self.runtime
            .authenticated_signer()
            .unwrap_or(AccountOwner::CHAIN)
    }

    /// Moves a validated funding payment into the chain account holding the pots.
    fn collect_payment(&mut self, payer: AccountOwner, payment: Amount) {
        if payment == Amount::ZERO {
            return;
        }
        self.runtime
            .check_account_permission(payer)
            .expect("Permission for funding payment");
        let pots = Account {
            chain_id: self.runtime.chain_id(),
            owner: AccountOwner::CHAIN,
        };
        self.runtime.transfer(payer, pots, payment);
    }

    fn respond(&self, events: Vec<DrawEvent<AccountOwner>>) -> DrawResponse {
        for event in &events {
            log::info!("{:?}", event);
        }
        DrawResponse::Events(events)
    }
}

/// Eligibility checks and payouts backed by the contract runtime.
struct RuntimeEnv<'a> {
    runtime: &'a mut ContractRuntime<WeightedDrawContract>,
    eligibility_app_id: Option<ApplicationId>,
}

impl RuntimeEnv<'_> {
    fn is_application(&mut self, owner: &AccountOwner) -> bool {
        let own: AccountOwner = self.runtime.application_id().forget_abi().into();
        let eligibility = self.eligibility_app_id.map(AccountOwner::from);
        *owner == own || Some(*owner) == eligibility
    }
}

impl Eligibility<AccountOwner> for RuntimeEnv<'_> {
    /// Rejects the chain account, this application and the eligibility
    /// application. Other applications are not recognized here: the runtime
    /// cannot tell an application owner from a user, so the controller must
    /// not give weight to application accounts.
    fn is_simple_account(&mut self, account: &AccountOwner) -> bool {
        *account != AccountOwner::CHAIN && !self.is_application(account)
    }

    fn status(&mut self, account: &AccountOwner) -> EligibilityStatus {
        let Some(app_id) = self.eligibility_app_id else {
            return EligibilityStatus {
                eligible: true,
                balance: self.runtime.owner_balance(*account),
            };
        };
        let response = self.runtime.call_application(
            true,
            app_id.with_abi::<EligibilityAbi>(),
            &EligibilityOperation::Status { owner: *account },
        );
        match response {
            EligibilityResponse::Status { eligible, balance } => EligibilityStatus { eligible, balance },
        }
    }
}

impl Treasury<AccountOwner> for RuntimeEnv<'_> {
    fn transfer(&mut self, recipient: &AccountOwner, amount: Amount) -> Result<(), TransferError> {
        let available = self.runtime.chain_balance();
        if available < amount {
            return Err(TransferError::InsufficientBalance {
                needed: amount,
                available,
            });
        }
        let destination = Account {
            chain_id: self.runtime.chain_id(),
            owner: *recipient,
        };
        self.runtime.transfer(AccountOwner::CHAIN, destination, amount);
        Ok(())
    }
}
