// src/invoker.rs
use async_trait::async_trait;
use ethers::providers::{JsonRpcError, Middleware, MiddlewareError};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, BlockId, Bytes, TransactionRequest};
#[cfg(test)]
use mockall::automock;
use tracing::debug;

use crate::classifier::RevertData;
use crate::error::SimulationError;

/// What the node handed back for a non-committing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutput {
    Returned(Bytes),
    Reverted(RevertData),
}

/// Executes a call against chain state without broadcasting anything.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StaticCaller: Send + Sync {
    async fn call_static(
        &self,
        to: Address,
        data: Bytes,
        block: Option<BlockId>,
    ) -> Result<CallOutput, SimulationError>;
}

#[async_trait]
impl<M> StaticCaller for M
where
    M: Middleware + 'static,
{
    async fn call_static(
        &self,
        to: Address,
        data: Bytes,
        block: Option<BlockId>,
    ) -> Result<CallOutput, SimulationError> {
        let tx: TypedTransaction = TransactionRequest::new()
            .from(Address::zero())
            .to(to)
            .data(data)
            .into();

        debug!("eth_call to {:?} at {:?}", to, block);
        match self.call(&tx, block).await {
            Ok(output) => Ok(CallOutput::Returned(output)),
            Err(error) => match error
                .as_error_response()
                .and_then(JsonRpcError::as_revert_data)
            {
                Some(revert_data) if revert_data.is_empty() => Ok(CallOutput::Reverted(
                    RevertData::with_node_message(revert_data, error.to_string()),
                )),
                Some(revert_data) => Ok(CallOutput::Reverted(revert_data.into())),
                None => Err(SimulationError::NetworkFailure(error.to_string())),
            },
        }
    }
}
