// src/error.rs
use thiserror::Error;

use crate::types::{FailedOp, RejectingEntity};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimulationError {
    /// The interface description is unusable or does not match the call.
    #[error("Failed to encode EntryPoint call: {0}")]
    EncodeFailure(String),

    #[error("Node call failed: {0}")]
    NetworkFailure(String),

    #[error("Rejected by EntryPoint or an account/paymaster it called: {}", .0.reason)]
    Rejected(FailedOp),

    /// Revert data matched none of the known shapes. Holds one detail per
    /// decode attempt, in the order they were tried.
    #[error("Undecodable simulateValidation revert {revert_data}: {}", .attempts.join(", "))]
    Undecodable {
        revert_data: String,
        attempts: Vec<String>,
    },

    #[error("simulateValidation returned without reverting: {0}")]
    NotReverted(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    EncodeFailure,
    NetworkFailure,
    Rejected,
    Undecodable,
    NotReverted,
}

impl SimulationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EncodeFailure(_) => ErrorKind::EncodeFailure,
            Self::NetworkFailure(_) => ErrorKind::NetworkFailure,
            Self::Rejected(_) => ErrorKind::Rejected,
            Self::Undecodable { .. } => ErrorKind::Undecodable,
            Self::NotReverted(_) => ErrorKind::NotReverted,
        }
    }

    /// Only transport failures say nothing about the operation itself.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::NetworkFailure
    }

    pub fn op_index(&self) -> Option<u64> {
        match self {
            Self::Rejected(failed_op) => Some(failed_op.op_index),
            _ => None,
        }
    }

    pub fn rejecting_entity(&self) -> Option<RejectingEntity> {
        match self {
            Self::Rejected(failed_op) => Some(failed_op.rejecting_entity()),
            _ => None,
        }
    }
}
