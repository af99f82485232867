//! Error types for the release engine.

use thiserror::Error;

use crate::Amount;
use crate::day::TimeError;
use crate::store::StoreError;

/// Why a preview or commit was refused. Nothing is persisted when one of
/// these is returned; the operator fixes the inputs and tries again.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("release budget must be greater than zero")]
    BudgetNotPositive,

    #[error("win range must satisfy 0 < min <= max, got min {min} max {max}")]
    InvalidWinRange { min: Amount, max: Amount },

    #[error("no collections recorded for today")]
    NothingCollected,

    #[error("release budget {budget} exceeds today's collections {collected}")]
    BudgetExceedsCollections { budget: Amount, collected: Amount },

    #[error("no eligible payers today")]
    NoEligiblePayers,

    #[error("override for {msisdn} ({amount}) is outside the win range")]
    OverrideOutOfRange { msisdn: String, amount: Amount },

    #[error("override for {msisdn} ({amount}) exceeds the remaining budget {remaining}")]
    OverrideExceedsBudget {
        msisdn: String,
        amount: Amount,
        remaining: Amount,
    },

    #[error("no winners fit the current budget")]
    EmptyPlan,
}

/// Top-level error returned by [`Engine`](super::Engine) operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("release rejected: {0}")]
    Rejected(#[from] Rejection),

    #[error("storage failure: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Time(#[from] TimeError),
}
