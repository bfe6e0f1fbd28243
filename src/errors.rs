use thiserror::Error;

use crate::decimal::Money;
use crate::types::PlanId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid schedule: {message}")]
    InvalidSchedule {
        message: String,
    },

    #[error("validation failed: {message}")]
    Validation {
        message: String,
    },

    #[error("over-allocation: available {available}, requested {requested}")]
    OverAllocation {
        available: Money,
        requested: Money,
    },

    #[error("stale snapshot for plan {plan_id}: previewed at version {expected}, now at {actual}")]
    StaleSnapshot {
        plan_id: PlanId,
        expected: u64,
        actual: u64,
    },

    #[error("chain resolution failed: {message}")]
    ChainResolution {
        message: String,
    },

    #[error("consistency violation: {message}")]
    ConsistencyViolation {
        message: String,
    },

    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: u64,
    },

    #[error("collaborator call failed: {message}")]
    Collaborator {
        message: String,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::Validation {
            message: message.into(),
        }
    }

    pub fn invalid_schedule(message: impl Into<String>) -> Self {
        EngineError::InvalidSchedule {
            message: message.into(),
        }
    }

    pub fn consistency(message: impl Into<String>) -> Self {
        EngineError::ConsistencyViolation {
            message: message.into(),
        }
    }

    /// commit-time races; the caller should re-preview against a fresh snapshot
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::OverAllocation { .. } | EngineError::StaleSnapshot { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
