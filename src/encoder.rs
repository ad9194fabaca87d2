// src/encoder.rs
use ethers::abi::{Abi, Tokenizable};
use ethers::types::Bytes;
use tracing::debug;

use crate::contracts::{self, ENTRY_POINT_ABI};
use crate::error::SimulationError;
use crate::types::UserOperation;

pub const SIMULATE_VALIDATION: &str = "simulateValidation";

/// Encodes `method(op)` against the EntryPoint ABI artifact.
pub fn encode_call(method: &str, op: &UserOperation) -> Result<Bytes, SimulationError> {
    let abi = ENTRY_POINT_ABI
        .as_ref()
        .map_err(|e| SimulationError::EncodeFailure(format!("EntryPoint ABI is malformed: {e}")))?;
    encode_with(abi, method, op)
}

pub fn encode_simulate_validation(op: &UserOperation) -> Result<Bytes, SimulationError> {
    encode_call(SIMULATE_VALIDATION, op)
}

fn encode_with(abi: &Abi, method: &str, op: &UserOperation) -> Result<Bytes, SimulationError> {
    let function = abi
        .function(method)
        .map_err(|e| SimulationError::EncodeFailure(format!("{method}: {e}")))?;
    let token = contracts::UserOperation::from(op).into_token();
    let data = function
        .encode_input(&[token])
        .map_err(|e| SimulationError::EncodeFailure(format!("{method}: {e}")))?;

    debug!("Encoded {} for sender {} ({} bytes)", method, op.sender, data.len());
    Ok(data.into())
}
