// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

/*! ABI of the Weighted Draw Application */

pub mod engine;
pub mod error;
pub mod event;
pub mod guard;
pub mod index;
pub mod pot;
pub mod randomness;
pub mod schedule;
pub mod settlement;

use async_graphql::{Request, Response};
use linera_sdk::linera_base_types::{AccountOwner, Amount, ApplicationId, ContractAbi, ServiceAbi};
use serde::{Deserialize, Serialize};

pub use engine::{AdminAction, DrawEngine, EngineConfig};
pub use error::{DrawError, ErrorKind, TransferError};
pub use event::{DrawEvent, IneligibleReason, SkipReason};
pub use index::{BatchPolicy, BatchReport, Identifier, WeightedIndex};
pub use pot::{Pot, Pots};
pub use randomness::{
    parse_random_word, RandomWord, RandomnessPort, RandomnessRequest, RequestId, SequentialPort,
};
pub use schedule::{Cadence, DrawScheduler, Phase, StalledRoundPolicy};
pub use settlement::{Eligibility, EligibilityStatus, Treasury};

// ========================================
// Weighted Draw ABI
// ========================================

pub struct WeightedDrawAbi;

impl ContractAbi for WeightedDrawAbi {
    type Operation = DrawOperation;
    type Response = DrawResponse;
}

impl ServiceAbi for WeightedDrawAbi {
    type Query = Request;
    type QueryResponse = Response;
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct DrawParameters {
    /// Application answering eligibility queries. Without one every simple
    /// account is eligible.
    pub eligibility_app_id: Option<ApplicationId>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct InstantiationArgument {
    pub owner: AccountOwner,
    pub controller: AccountOwner,
    pub funding_source: AccountOwner,
    pub randomness_provider: AccountOwner,
    pub min_hourly_payout: Amount,
    pub callback_budget: u64,
    #[serde(default)]
    pub stalled_policy: StalledRoundPolicy,
}

impl From<InstantiationArgument> for EngineConfig<AccountOwner> {
    fn from(argument: InstantiationArgument) -> Self {
        EngineConfig {
            owner: argument.owner,
            controller: argument.controller,
            funding_source: argument.funding_source,
            randomness_provider: argument.randomness_provider,
            min_hourly_payout: argument.min_hourly_payout,
            callback_budget: argument.callback_budget,
            stalled_policy: argument.stalled_policy,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub enum DrawOperation {
    /// Sync one account's weight (controller only)
    SetWeight { account: AccountOwner, weight: u128 },
    /// Sync several weights at once (controller only)
    SetWeightBatch {
        accounts: Vec<AccountOwner>,
        weights: Vec<u128>,
        policy: BatchPolicy,
    },
    /// Pay `payment` into the pots, split as `hourly` and `daily` (funding source only)
    Fund {
        payment: Amount,
        hourly: Amount,
        daily: Amount,
    },
    /// Request randomness for every due and funded cadence (anyone)
    CheckAndSchedule,
    /// Deliver randomness for a request (randomness provider only)
    FulfillRandomness {
        request_id: RequestId,
        values: Vec<RandomWord>,
    },
    /// Owner-only configuration
    Admin(AdminAction<AccountOwner>),
}

#[derive(Debug, Deserialize, Serialize)]
pub enum DrawResponse {
    Ok,
    WeightUpdated(bool),
    Batch {
        applied: usize,
        rejected: Vec<(usize, String)>,
    },
    Events(Vec<DrawEvent<AccountOwner>>),
}

// ========================================
// Eligibility ABI (external balance bookkeeping)
// ========================================

pub struct EligibilityAbi;

impl ContractAbi for EligibilityAbi {
    type Operation = EligibilityOperation;
    type Response = EligibilityResponse;
}

impl ServiceAbi for EligibilityAbi {
    type Query = Request;
    type QueryResponse = Response;
}

#[derive(Debug, Deserialize, Serialize)]
pub enum EligibilityOperation {
    Status { owner: AccountOwner },
}

#[derive(Debug, Deserialize, Serialize)]
pub enum EligibilityResponse {
    Status { eligible: bool, balance: Amount },
}
