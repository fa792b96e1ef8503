//! Error taxonomy for vault and splitter operations.

use crate::access::Role;
use crate::types::{Amount, AssetId, ControllerId, SplitterId, StrategyId};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Coarse classification used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    PermissionDenied,
    ValidationFailed,
    TimelockViolation,
    SlippageExceeded,
    LossTooHigh,
    StrategyFailure,
    ArithmeticOverflow,
}

#[derive(Debug, Error)]
pub enum AllocError {
    #[error("permission denied: {action} requires {required:?}")]
    PermissionDenied { action: &'static str, required: Role },

    #[error("strategy {0} is already scheduled")]
    AlreadyScheduled(StrategyId),

    #[error("strategy {0} is not scheduled")]
    NotScheduled(StrategyId),

    #[error("strategy {id} is time-locked until {unlock_at}")]
    TimelockNotElapsed {
        id: StrategyId,
        unlock_at: DateTime<Utc>,
    },

    #[error("strategy {id} manages {actual}, expected {expected}")]
    AssetMismatch {
        id: StrategyId,
        expected: AssetId,
        actual: AssetId,
    },

    #[error("strategy {id} is bound to splitter {actual}, expected {expected}")]
    SplitterMismatch {
        id: StrategyId,
        expected: SplitterId,
        actual: SplitterId,
    },

    #[error("strategy {id} uses controller {actual}, expected {expected}")]
    ControllerMismatch {
        id: StrategyId,
        expected: ControllerId,
        actual: ControllerId,
    },

    #[error("strategy {0} already exists")]
    AlreadyExists(StrategyId),

    #[error("strategy {0} appears twice in the batch")]
    DuplicateInBatch(StrategyId),

    #[error("empty batch")]
    EmptyBatch,

    #[error("strategy {0} not found")]
    NotFound(StrategyId),

    #[error("strategy {id} still holds {assets}")]
    NonEmptyBalance { id: StrategyId, assets: Amount },

    #[error("no strategies registered")]
    EmptyStrategySet,

    #[error("percent {0} is above 100")]
    InvalidPercent(u32),

    #[error("nothing to rebalance")]
    NothingInvested,

    #[error("loss {loss} exceeds allowed {limit_bps} bps of {base}")]
    LossTooHigh {
        loss: Amount,
        base: Amount,
        limit_bps: u32,
    },

    #[error("uncovered slippage {uncovered} exceeds {max_bps} bps of {expected}")]
    SlippageExceeded {
        uncovered: Amount,
        expected: Amount,
        max_bps: u32,
    },

    #[error("caller {0} is not a registered strategy")]
    NotAStrategy(StrategyId),

    #[error("strategy {0} is paused")]
    StrategyPaused(StrategyId),

    #[error("strategy {0} is not paused")]
    NotPaused(StrategyId),

    #[error("{name} of {value} bps is above the {max} bps limit")]
    InvalidParameter {
        name: &'static str,
        value: u32,
        max: u32,
    },

    #[error("amount must be positive")]
    ZeroAmount,

    #[error("operation would mint or burn zero shares")]
    ZeroShares,

    #[error("first deposit would mint {shares} shares, must exceed {minimum}")]
    DepositTooSmall { shares: Amount, minimum: Amount },

    #[error("insufficient shares: requested {requested}, available {available}")]
    InsufficientShares { requested: Amount, available: Amount },

    #[error("strategy {id} failed: {source}")]
    Strategy {
        id: StrategyId,
        #[source]
        source: anyhow::Error,
    },

    #[error("arithmetic overflow")]
    Overflow,
}

impl AllocError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AllocError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            AllocError::AlreadyScheduled(_)
            | AllocError::NotScheduled(_)
            | AllocError::TimelockNotElapsed { .. } => ErrorKind::TimelockViolation,
            AllocError::SlippageExceeded { .. } => ErrorKind::SlippageExceeded,
            AllocError::LossTooHigh { .. } => ErrorKind::LossTooHigh,
            AllocError::Strategy { .. } => ErrorKind::StrategyFailure,
            AllocError::Overflow => ErrorKind::ArithmeticOverflow,
            AllocError::AssetMismatch { .. }
            | AllocError::SplitterMismatch { .. }
            | AllocError::ControllerMismatch { .. }
            | AllocError::AlreadyExists(_)
            | AllocError::DuplicateInBatch(_)
            | AllocError::EmptyBatch
            | AllocError::NotFound(_)
            | AllocError::NonEmptyBalance { .. }
            | AllocError::EmptyStrategySet
            | AllocError::InvalidPercent(_)
            | AllocError::NothingInvested
            | AllocError::NotAStrategy(_)
            | AllocError::StrategyPaused(_)
            | AllocError::NotPaused(_)
            | AllocError::InvalidParameter { .. }
            | AllocError::ZeroAmount
            | AllocError::ZeroShares
            | AllocError::DepositTooSmall { .. }
            | AllocError::InsufficientShares { .. } => ErrorKind::ValidationFailed,
        }
    }

    pub(crate) fn strategy(id: &StrategyId, source: anyhow::Error) -> Self {
        AllocError::Strategy {
            id: id.clone(),
            source,
        }
    }
}

pub type AllocResult<T> = Result<T, AllocError>;
