// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for the weighted draw application.

use linera_sdk::linera_base_types::Amount;
use thiserror::Error;

use crate::randomness::RequestId;

/// Which privileged identity an operation was checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Owner,
    Controller,
    FundingSource,
    RandomnessProvider,
}

/// Entry points protected by an in-progress guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPoint {
    Schedule,
    Fulfillment,
}

/// Broad classes of rejection, so automation can tell them apart without
/// matching on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    AccessDenied,
    EmptyState,
    StaleOrMalformedCallback,
    NothingToDo,
    Unavailable,
}

/// Every way an operation on the draw engine can be rejected.
///
/// A rejected operation never leaves partial state behind.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DrawError {
    #[error("Identifier is null")]
    InvalidIdentifier,

    #[error("Batch length mismatch: {ids} identifiers, {weights} weights")]
    LengthMismatch { ids: usize, weights: usize },

    #[error("Total weight overflow")]
    WeightOverflow,

    #[error("Funding mismatch: paid {paid}, splits add up to {expected}")]
    FundingMismatch { paid: Amount, expected: Amount },

    #[error("Pot overflow")]
    PotOverflow,

    #[error("Caller is not the {0:?}")]
    AccessDenied(Role),

    #[error("Cannot draw from an empty index")]
    EmptyIndex,

    #[error("Unknown randomness request {0}")]
    UnknownRequest(RequestId),

    #[error("Randomness request {0} was already consumed")]
    ConsumedRequest(RequestId),

    #[error("Expected exactly one random value, got {0}")]
    MalformedRandomness(usize),

    #[error("Reentrant call into {0:?}")]
    Reentrant(EntryPoint),

    #[error("No cadence is due")]
    NothingToDo,

    #[error("Draws are paused")]
    Paused,

    #[error("Engine is not initialized")]
    NotInitialized,

    #[error("Engine is already initialized")]
    AlreadyInitialized,

    #[error("Randomness request failed: {0}")]
    RandomnessUnavailable(String),
}

impl DrawError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DrawError::InvalidIdentifier
            | DrawError::LengthMismatch { .. }
            | DrawError::WeightOverflow
            | DrawError::FundingMismatch { .. }
            | DrawError::PotOverflow => ErrorKind::InvalidInput,
            DrawError::AccessDenied(_) => ErrorKind::AccessDenied,
            DrawError::EmptyIndex => ErrorKind::EmptyState,
            DrawError::UnknownRequest(_)
            | DrawError::ConsumedRequest(_)
            | DrawError::MalformedRandomness(_)
            | DrawError::Reentrant(EntryPoint::Fulfillment) => ErrorKind::StaleOrMalformedCallback,
            DrawError::NothingToDo => ErrorKind::NothingToDo,
            // A due-check already running is busy, not a bad callback.
            DrawError::Reentrant(EntryPoint::Schedule)
            | DrawError::Paused
            | DrawError::NotInitialized
            | DrawError::AlreadyInitialized
            | DrawError::RandomnessUnavailable(_) => ErrorKind::Unavailable,
        }
    }
}

/// Why a payout transfer did not go through.
///
/// Never fatal: settlement restores the pot and reports a deferral.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransferError {
    #[error("Insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Amount, available: Amount },

    #[error("Transfer rejected: {0}")]
    Rejected(String),
}
