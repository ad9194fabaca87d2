// src/types.rs
use ethers::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    pub sender: Address,
    pub nonce: U256,
    pub init_code: Bytes,
    pub call_data: Bytes,
    pub call_gas_limit: U256,
    pub verification_gas_limit: U256,
    pub pre_verification_gas: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    pub paymaster_and_data: Bytes,
    pub signature: Bytes,
}

/// Successful outcome of `simulateValidation`, decoded from either the
/// `ValidationResult` or the `ValidationResultWithAggregation` revert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub pre_op_gas: U256,
    pub prefund: U256,
    pub sig_failed: bool,
    pub valid_after: u64,
    pub valid_until: u64,
    pub paymaster_context: Bytes,
    pub sender_info: StakeInfo,
    pub factory_info: StakeInfo,
    pub paymaster_info: StakeInfo,
    pub aggregator_info: Option<AggregatorInfo>,
}

impl ValidationResult {
    pub fn valid_time_range(&self) -> ValidTimeRange {
        ValidTimeRange::new(self.valid_after, self.valid_until)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeInfo {
    pub stake: U256,
    pub unstake_delay_sec: U256,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatorInfo {
    pub address: Address,
    pub stake_info: StakeInfo,
}

/// Window of block timestamps in which a validated operation may be included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidTimeRange {
    /// Earliest valid timestamp, inclusive.
    pub valid_after: u64,
    /// Latest valid timestamp, inclusive. `u64::MAX` when the operation never expires.
    pub valid_until: u64,
}

impl ValidTimeRange {
    /// Builds a range from the raw EntryPoint fields, where a `valid_until` of
    /// zero means the operation has no expiry.
    pub fn new(valid_after: u64, valid_until: u64) -> Self {
        let valid_until = if valid_until == 0 {
            u64::MAX
        } else {
            valid_until
        };
        Self {
            valid_after,
            valid_until,
        }
    }

    pub fn contains(&self, timestamp: u64) -> bool {
        self.valid_after <= timestamp && timestamp <= self.valid_until
    }
}

/// Entity named by an EntryPoint `AAnn` rejection code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RejectingEntity {
    Factory,
    Account,
    Paymaster,
    EntryPoint,
}

/// Negative verdict from `simulateValidation`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedOp {
    pub op_index: u64,
    pub reason: String,
}

impl FailedOp {
    /// The `AAnn` prefix of the reason, e.g. `"AA24"`, if present.
    pub fn entry_point_code(&self) -> Option<&str> {
        let code = self.reason.get(..4)?;
        let digits = code.strip_prefix("AA")?;
        digits
            .bytes()
            .all(|b| b.is_ascii_digit())
            .then_some(code)
    }

    pub fn rejecting_entity(&self) -> RejectingEntity {
        match self.entry_point_code().map(|code| code.as_bytes()[2]) {
            Some(b'1') => RejectingEntity::Factory,
            Some(b'2') => RejectingEntity::Account,
            Some(b'3') => RejectingEntity::Paymaster,
            _ => RejectingEntity::EntryPoint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed_op(reason: &str) -> FailedOp {
        FailedOp {
            op_index: 0,
            reason: reason.to_string(),
        }
    }

    #[test]
    fn user_operation_uses_camel_case_json() {
        let op: UserOperation = serde_json::from_value(serde_json::json!({
            "sender": "0x0000000000000000000000000000000000000001",
            "nonce": "0x1",
            "initCode": "0x",
            "callData": "0xdeadbeef",
            "callGasLimit": "0x5208",
            "verificationGasLimit": "0x186a0",
            "preVerificationGas": "0xc350",
            "maxFeePerGas": "0x3b9aca00",
            "maxPriorityFeePerGas": "0x3b9aca00",
            "paymasterAndData": "0x",
            "signature": "0x01"
        }))
        .unwrap();

        assert_eq!(op.nonce, U256::one());
        assert_eq!(op.call_data, Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]));
        assert_eq!(op.call_gas_limit, U256::from(21_000));
    }

    #[test]
    fn zero_valid_until_never_expires() {
        let range = ValidTimeRange::new(10, 0);
        assert!(!range.contains(9));
        assert!(range.contains(10));
        assert!(range.contains(u64::MAX));

        let bounded = ValidTimeRange::new(0, 100);
        assert!(bounded.contains(100));
        assert!(!bounded.contains(101));
    }

    #[test]
    fn entry_point_code_requires_aa_prefix_and_digits() {
        assert_eq!(failed_op("AA24 signature error").entry_point_code(), Some("AA24"));
        assert_eq!(failed_op("AA1").entry_point_code(), None);
        assert_eq!(failed_op("AAxx oops").entry_point_code(), None);
        assert_eq!(failed_op("reverted").entry_point_code(), None);
    }

    #[test]
    fn rejecting_entity_follows_code_family() {
        assert_eq!(failed_op("AA13 initCode failed or OOG").rejecting_entity(), RejectingEntity::Factory);
        assert_eq!(failed_op("AA24 signature error").rejecting_entity(), RejectingEntity::Account);
        assert_eq!(failed_op("AA31 paymaster deposit too low").rejecting_entity(), RejectingEntity::Paymaster);
        assert_eq!(failed_op("AA51 prefund below actualGasCost").rejecting_entity(), RejectingEntity::EntryPoint);
        assert_eq!(failed_op("unknown").rejecting_entity(), RejectingEntity::EntryPoint);
    }
}
