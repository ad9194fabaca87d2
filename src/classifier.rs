// src/classifier.rs
//! Turns `simulateValidation` revert data into a verdict.
//!
//! The EntryPoint never returns from `simulateValidation`; both the accepted
//! and the rejected outcome arrive as custom-error revert payloads. Shapes are
//! tried in table order, so a payload that decodes as a validation result is
//! never reported as a rejection.

use std::fmt;

use ethers::abi::{AbiDecode, AbiError};
use ethers::contract::EthError;
use ethers::types::{Bytes, Selector};
use tracing::{info, warn};

use crate::contracts;
use crate::error::SimulationError;
use crate::types::{FailedOp, ValidationResult};

/// Raw bytes returned by the node for a call that reverted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevertData {
    bytes: Bytes,
    /// Node's error message, kept when the revert carried no data.
    node_message: Option<String>,
}

impl RevertData {
    pub fn with_node_message(bytes: Bytes, node_message: String) -> Self {
        Self {
            bytes,
            node_message: Some(node_message),
        }
    }

    pub fn selector(&self) -> Option<Selector> {
        self.bytes.get(..4)?.try_into().ok()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn node_message(&self) -> Option<&str> {
        self.node_message.as_deref()
    }
}

impl From<Bytes> for RevertData {
    fn from(bytes: Bytes) -> Self {
        Self {
            bytes,
            node_message: None,
        }
    }
}

impl From<Vec<u8>> for RevertData {
    fn from(bytes: Vec<u8>) -> Self {
        Bytes::from(bytes).into()
    }
}

impl fmt::Display for RevertData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.bytes))
    }
}

#[derive(Debug)]
enum Verdict {
    Accepted(ValidationResult),
    Rejected(FailedOp),
}

struct RevertShape {
    name: &'static str,
    selector: fn() -> Selector,
    decode: fn(&[u8]) -> Result<Verdict, String>,
}

const REVERT_SHAPES: [RevertShape; 3] = [
    RevertShape {
        name: "ValidationResult",
        selector: <contracts::ValidationResult as EthError>::selector,
        decode: decode_validation_result,
    },
    RevertShape {
        name: "ValidationResultWithAggregation",
        selector: <contracts::ValidationResultWithAggregation as EthError>::selector,
        decode: decode_validation_result_with_aggregation,
    },
    RevertShape {
        name: "FailedOp",
        selector: <contracts::FailedOp as EthError>::selector,
        decode: decode_failed_op,
    },
];

fn decode_validation_result(data: &[u8]) -> Result<Verdict, String> {
    let result = contracts::ValidationResult::decode(data).map_err(|e| e.to_string())?;
    ValidationResult::try_from(result).map(Verdict::Accepted)
}

fn decode_validation_result_with_aggregation(data: &[u8]) -> Result<Verdict, String> {
    let result =
        contracts::ValidationResultWithAggregation::decode(data).map_err(|e| e.to_string())?;
    ValidationResult::try_from(result).map(Verdict::Accepted)
}

fn decode_failed_op(data: &[u8]) -> Result<Verdict, String> {
    contracts::FailedOp::decode(data)
        .map(|failed_op| Verdict::Rejected(failed_op.into()))
        .map_err(|e: AbiError| e.to_string())
}

/// Classifies revert data as an accepted validation, a rejection, or neither.
pub fn classify(revert_data: &RevertData) -> Result<ValidationResult, SimulationError> {
    let mut attempts = Vec::with_capacity(REVERT_SHAPES.len() + 1);
    if let Some(message) = revert_data.node_message() {
        attempts.push(format!("node reported: {message}"));
    }

    for shape in &REVERT_SHAPES {
        let expected = (shape.selector)();
        match revert_data.selector() {
            Some(selector) if selector == expected => {}
            Some(selector) => {
                attempts.push(format!(
                    "{}: selector 0x{} does not match 0x{}",
                    shape.name,
                    hex::encode(selector),
                    hex::encode(expected)
                ));
                continue;
            }
            None => {
                attempts.push(format!(
                    "{}: revert data shorter than a selector",
                    shape.name
                ));
                continue;
            }
        }

        match (shape.decode)(revert_data.as_bytes()) {
            Ok(Verdict::Accepted(result)) => {
                info!(
                    "simulateValidation accepted: preOpGas {} prefund {} validAfter {} validUntil {}",
                    result.pre_op_gas, result.prefund, result.valid_after, result.valid_until
                );
                return Ok(result);
            }
            Ok(Verdict::Rejected(failed_op)) => {
                warn!(
                    "simulateValidation rejected op {}: {}",
                    failed_op.op_index, failed_op.reason
                );
                return Err(SimulationError::Rejected(failed_op));
            }
            Err(error) => attempts.push(format!("{}: {}", shape.name, error)),
        }
    }

    warn!("Undecodable simulateValidation revert {}", revert_data);
    Err(SimulationError::Undecodable {
        revert_data: revert_data.to_string(),
        attempts,
    })
}

#[cfg(test)]
mod tests {
    use ethers::abi::AbiEncode;
    use ethers::types::{Address, U256};

    use super::*;
    use crate::contracts::{AggregatorStakeInfo, ReturnInfo, StakeInfo};
    use crate::error::ErrorKind;

    fn return_info() -> ReturnInfo {
        ReturnInfo {
            pre_op_gas: U256::from(120_000),
            prefund: U256::from(240_000_000_000_000u64),
            sig_failed: false,
            valid_after: U256::from(1_700_000_000u64),
            valid_until: U256::from(1_700_003_600u64),
            paymaster_context: Bytes::from(vec![0xca, 0xfe]),
        }
    }

    fn stake(amount: u64) -> StakeInfo {
        StakeInfo {
            stake: U256::from(amount),
            unstake_delay_sec: U256::from(86_400),
        }
    }

    fn revert(bytes: Vec<u8>) -> RevertData {
        RevertData::from(Bytes::from(bytes))
    }

    #[test]
    fn validation_result_is_accepted() {
        let payload = contracts::ValidationResult {
            return_info: return_info(),
            sender_info: stake(0),
            factory_info: stake(0),
            paymaster_info: stake(1_000),
        }
        .encode();

        let result = classify(&revert(payload)).unwrap();

        assert_eq!(result.pre_op_gas, U256::from(120_000));
        assert_eq!(result.valid_after, 1_700_000_000);
        assert_eq!(result.valid_until, 1_700_003_600);
        assert_eq!(result.paymaster_info.stake, U256::from(1_000));
        assert_eq!(result.paymaster_context, Bytes::from(vec![0xca, 0xfe]));
        assert!(!result.sig_failed);
        assert_eq!(result.aggregator_info, None);
    }

    #[test]
    fn validation_result_with_aggregation_carries_aggregator() {
        let aggregator = Address::repeat_byte(0xa9);
        let payload = contracts::ValidationResultWithAggregation {
            return_info: return_info(),
            sender_info: stake(0),
            factory_info: stake(0),
            paymaster_info: stake(0),
            aggregator_info: AggregatorStakeInfo {
                aggregator,
                stake_info: stake(5_000),
            },
        }
        .encode();

        let result = classify(&revert(payload)).unwrap();

        let info = result.aggregator_info.unwrap();
        assert_eq!(info.address, aggregator);
        assert_eq!(info.stake_info.stake, U256::from(5_000));
    }

    #[test]
    fn failed_op_is_rejected_with_index_and_reason() {
        let payload = contracts::FailedOp {
            op_index: U256::zero(),
            reason: "AA24 signature error".to_string(),
        }
        .encode();

        let error = classify(&revert(payload)).unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Rejected);
        assert_eq!(error.op_index(), Some(0));
        match error {
            SimulationError::Rejected(failed_op) => {
                assert_eq!(failed_op.reason, "AA24 signature error")
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn unknown_selector_is_undecodable_with_every_attempt() {
        // Error(string) with reason "nope"
        let payload = ethers::abi::encode(&[ethers::abi::Token::String("nope".into())]);
        let mut data = vec![0x08, 0xc3, 0x79, 0xa0];
        data.extend(payload);

        let error = classify(&revert(data)).unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Undecodable);
        let message = error.to_string();
        assert!(message.contains("0x08c379a0"));
        assert!(message.contains("ValidationResult:"));
        assert!(message.contains("FailedOp:"));
    }

    #[test]
    fn truncated_failed_op_is_undecodable() {
        let mut payload = contracts::FailedOp {
            op_index: U256::one(),
            reason: "AA21 didn't pay prefund".to_string(),
        }
        .encode();
        payload.truncate(40);

        let error = classify(&revert(payload)).unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Undecodable);
        match error {
            SimulationError::Undecodable { attempts, .. } => assert_eq!(attempts.len(), 3),
            other => panic!("expected undecodable, got {other:?}"),
        }
    }

    #[test]
    fn valid_after_wider_than_uint48_is_undecodable() {
        let marker = U256::from(0x00c0_ffee_u64);
        let mut payload = contracts::ValidationResult {
            return_info: ReturnInfo {
                valid_after: marker,
                ..return_info()
            },
            ..Default::default()
        }
        .encode();
        let mut word = [0u8; 32];
        marker.to_big_endian(&mut word);
        let offset = payload
            .windows(32)
            .position(|window| window == word)
            .unwrap();
        payload[offset..offset + 32].copy_from_slice(&[0xff; 32]);

        let error = classify(&revert(payload)).unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Undecodable);
        let message = error.to_string();
        assert!(message.contains("ValidationResult: validAfter"));
        assert!(message.contains("does not fit in uint48"));
    }

    #[test]
    fn node_message_is_kept_for_empty_revert() {
        let data = RevertData::with_node_message(
            Bytes::new(),
            "(code: 3, message: execution reverted, data: None)".to_string(),
        );

        let error = classify(&data).unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Undecodable);
        let message = error.to_string();
        assert!(message.contains("node reported: (code: 3, message: execution reverted"));
        assert!(message.contains("shorter than a selector"));
    }

    #[test]
    fn empty_revert_is_undecodable() {
        let error = classify(&revert(Vec::new())).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Undecodable);
        assert!(error.to_string().contains("shorter than a selector"));
    }

    #[test]
    fn classification_is_idempotent() {
        let data = revert(
            contracts::FailedOp {
                op_index: U256::from(2),
                reason: "AA31 paymaster deposit too low".to_string(),
            }
            .encode(),
        );
        assert_eq!(classify(&data), classify(&data));
    }

    #[test]
    fn shapes_are_tried_accepted_first() {
        let names: Vec<_> = REVERT_SHAPES.iter().map(|shape| shape.name).collect();
        assert_eq!(
            names,
            ["ValidationResult", "ValidationResultWithAggregation", "FailedOp"]
        );
    }
}
