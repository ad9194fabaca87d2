// src/rpc.rs
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonrpsee::core::{async_trait, RpcResult};
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::types::{ErrorObject, ErrorObjectOwned};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::SimulationError;
use crate::invoker::StaticCaller;
use crate::simulation::Simulator;
use crate::types::{UserOperation, ValidationResult};

/// ERC-4337 code for an operation rejected by the EntryPoint, account or paymaster.
pub const REJECTED_BY_EP_OR_ACCOUNT: i32 = -32500;
pub const NODE_UNAVAILABLE: i32 = -32000;
pub const INTERNAL_ERROR: i32 = -32603;

#[rpc(server, namespace = "sim")]
pub trait SimulationApi {
    /// Simulates EntryPoint validation of a user operation without committing state
    #[method(name = "simulateValidation")]
    async fn simulate_validation(&self, user_op: UserOperation) -> RpcResult<ValidationResult>;
}

pub struct SimulationRpcImpl<C> {
    simulator: Arc<Simulator<C>>,
    timeout: Duration,
}

impl<C> SimulationRpcImpl<C> {
    pub fn new(simulator: Arc<Simulator<C>>, timeout: Duration) -> Self {
        Self { simulator, timeout }
    }
}

#[async_trait]
impl<C> SimulationApiServer for SimulationRpcImpl<C>
where
    C: StaticCaller + 'static,
{
    async fn simulate_validation(&self, user_op: UserOperation) -> RpcResult<ValidationResult> {
        debug!("Received simulateValidation request for sender: {}", user_op.sender);

        let deadline = Instant::now() + self.timeout;
        match self
            .simulator
            .simulate_validation_until(&user_op, deadline)
            .await
        {
            Ok(result) => {
                info!("Validation passed for {}", user_op.sender);
                check_validity_window(&result, unix_now());
                Ok(result)
            }
            Err(e) if e.is_retryable() => {
                warn!("Simulation for {} did not reach the node: {}", user_op.sender, e);
                Err(e.into())
            }
            Err(e) => {
                error!(
                    "Validation failed for {} (op {:?}, entity {:?}): {}",
                    user_op.sender,
                    e.op_index(),
                    e.rejecting_entity(),
                    e
                );
                Err(e.into())
            }
        }
    }
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

/// Warns when an accepted operation cannot be included at `now`. Returns
/// whether `now` falls inside the window.
pub fn check_validity_window(result: &ValidationResult, now: u64) -> bool {
    let range = result.valid_time_range();
    let valid = range.contains(now);
    if !valid {
        warn!(
            "Accepted operation is outside its validity window at {}: validAfter {} validUntil {}",
            now, range.valid_after, range.valid_until
        );
    }
    valid
}

impl From<SimulationError> for ErrorObjectOwned {
    fn from(error: SimulationError) -> Self {
        match error {
            SimulationError::Rejected(failed_op) => ErrorObject::owned(
                REJECTED_BY_EP_OR_ACCOUNT,
                failed_op.reason.clone(),
                Some(failed_op),
            ),
            SimulationError::NetworkFailure(_) => {
                ErrorObject::owned(NODE_UNAVAILABLE, error.to_string(), None::<()>)
            }
            SimulationError::EncodeFailure(_)
            | SimulationError::Undecodable { .. }
            | SimulationError::NotReverted(_) => {
                ErrorObject::owned(INTERNAL_ERROR, error.to_string(), None::<()>)
            }
        }
    }
}
