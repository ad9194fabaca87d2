// src/simulation.rs
use ethers::types::{Address, BlockId};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use crate::classifier;
use crate::encoder;
use crate::error::SimulationError;
use crate::invoker::{CallOutput, StaticCaller};
use crate::types::{UserOperation, ValidationResult};

/// Runs `EntryPoint.simulateValidation` as a static call and classifies the
/// revert. Holds no mutable state, so one instance can serve concurrent callers.
pub struct Simulator<C> {
    caller: C,
    entry_point: Address,
    block: Option<BlockId>,
}

impl<C: StaticCaller> Simulator<C> {
    pub fn new(caller: C, entry_point: Address) -> Self {
        Self {
            caller,
            entry_point,
            block: None,
        }
    }

    /// Pins the static call to a block instead of the node's default (`latest`).
    pub fn with_block(mut self, block: BlockId) -> Self {
        self.block = Some(block);
        self
    }

    pub fn entry_point(&self) -> Address {
        self.entry_point
    }

    pub async fn simulate_validation(
        &self,
        op: &UserOperation,
    ) -> Result<ValidationResult, SimulationError> {
        let call_data = encoder::encode_simulate_validation(op)?;

        let output = self
            .caller
            .call_static(self.entry_point, call_data, self.block)
            .await?;

        match output {
            CallOutput::Reverted(data) => classifier::classify(&data),
            CallOutput::Returned(data) => {
                warn!(
                    "simulateValidation on {:?} returned {} bytes without reverting",
                    self.entry_point,
                    data.len()
                );
                Err(SimulationError::NotReverted(data.to_string()))
            }
        }
    }

    /// Same as [`Self::simulate_validation`], abandoned at `deadline`.
    pub async fn simulate_validation_until(
        &self,
        op: &UserOperation,
        deadline: Instant,
    ) -> Result<ValidationResult, SimulationError> {
        match timeout_at(deadline, self.simulate_validation(op)).await {
            Ok(result) => result,
            Err(_) => {
                debug!("simulateValidation for {} hit its deadline", op.sender);
                Err(SimulationError::NetworkFailure(
                    "deadline elapsed before the node answered".to_string(),
                ))
            }
        }
    }
}
