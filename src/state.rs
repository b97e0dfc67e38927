// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use linera_sdk::linera_base_types::AccountOwner;
use linera_sdk::views::{linera_views, RegisterView, RootView, ViewStorageContext};
use weighted_draw::DrawEngine;

/// The application state for the Weighted Draw.
#[derive(RootView)]
#[view(context = ViewStorageContext)]
pub struct WeightedDrawState {
    /// Index, schedules, pots and request records
    pub engine: RegisterView<DrawEngine<AccountOwner>>,
    /// Next request id handed to the randomness provider
    pub request_nonce: RegisterView<u64>,
}
