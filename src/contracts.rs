// src/contracts.rs
//! EntryPoint v0.6 interface: the ABI artifact used for encoding calls and the
//! revert shapes `simulateValidation` can terminate with.

use std::sync::LazyLock;

use ethers::abi::Abi;
use ethers::contract::{EthAbiCodec, EthAbiType, EthError};
use ethers::types::{Address, Bytes, U256};

use crate::types;

const ENTRY_POINT_ABI_JSON: &str = include_str!("../abi/EntryPoint.json");

/// Parsed once per process. A malformed artifact is kept as an error so that
/// encoding reports it instead of panicking.
pub static ENTRY_POINT_ABI: LazyLock<Result<Abi, serde_json::Error>> =
    LazyLock::new(|| serde_json::from_str(ENTRY_POINT_ABI_JSON));

#[derive(Clone, Debug, Default, PartialEq, Eq, EthAbiType, EthAbiCodec)]
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

impl From<&types::UserOperation> for UserOperation {
    fn from(op: &types::UserOperation) -> Self {
        Self {
            sender: op.sender,
            nonce: op.nonce,
            init_code: op.init_code.clone(),
            call_data: op.call_data.clone(),
            call_gas_limit: op.call_gas_limit,
            verification_gas_limit: op.verification_gas_limit,
            pre_verification_gas: op.pre_verification_gas,
            max_fee_per_gas: op.max_fee_per_gas,
            max_priority_fee_per_gas: op.max_priority_fee_per_gas,
            paymaster_and_data: op.paymaster_and_data.clone(),
            signature: op.signature.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, EthAbiType, EthAbiCodec)]
pub struct ReturnInfo {
    pub pre_op_gas: U256,
    pub prefund: U256,
    pub sig_failed: bool,
    // uint48 on chain; decoded wide so out-of-range words can be rejected
    pub valid_after: U256,
    pub valid_until: U256,
    pub paymaster_context: Bytes,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, EthAbiType, EthAbiCodec)]
pub struct StakeInfo {
    pub stake: U256,
    pub unstake_delay_sec: U256,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, EthAbiType, EthAbiCodec)]
pub struct AggregatorStakeInfo {
    pub aggregator: Address,
    pub stake_info: StakeInfo,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, EthError)]
#[etherror(
    name = "ValidationResult",
    abi = "ValidationResult((uint256,uint256,bool,uint48,uint48,bytes),(uint256,uint256),(uint256,uint256),(uint256,uint256))"
)]
pub struct ValidationResult {
    pub return_info: ReturnInfo,
    pub sender_info: StakeInfo,
    pub factory_info: StakeInfo,
    pub paymaster_info: StakeInfo,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, EthError)]
#[etherror(
    name = "ValidationResultWithAggregation",
    abi = "ValidationResultWithAggregation((uint256,uint256,bool,uint48,uint48,bytes),(uint256,uint256),(uint256,uint256),(uint256,uint256),(address,(uint256,uint256)))"
)]
pub struct ValidationResultWithAggregation {
    pub return_info: ReturnInfo,
    pub sender_info: StakeInfo,
    pub factory_info: StakeInfo,
    pub paymaster_info: StakeInfo,
    pub aggregator_info: AggregatorStakeInfo,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, EthError)]
#[etherror(name = "FailedOp", abi = "FailedOp(uint256,string)")]
pub struct FailedOp {
    pub op_index: U256,
    pub reason: String,
}

impl From<StakeInfo> for types::StakeInfo {
    fn from(value: StakeInfo) -> Self {
        Self {
            stake: value.stake,
            unstake_delay_sec: value.unstake_delay_sec,
        }
    }
}

impl From<AggregatorStakeInfo> for types::AggregatorInfo {
    fn from(value: AggregatorStakeInfo) -> Self {
        Self {
            address: value.aggregator,
            stake_info: value.stake_info.into(),
        }
    }
}

const UINT48_MAX: u64 = (1 << 48) - 1;

fn uint48(value: U256, field: &str) -> Result<u64, String> {
    if value > U256::from(UINT48_MAX) {
        return Err(format!("{field} {value} does not fit in uint48"));
    }
    Ok(value.as_u64())
}

fn validation_result(
    return_info: ReturnInfo,
    sender_info: StakeInfo,
    factory_info: StakeInfo,
    paymaster_info: StakeInfo,
    aggregator_info: Option<AggregatorStakeInfo>,
) -> Result<types::ValidationResult, String> {
    let ReturnInfo {
        pre_op_gas,
        prefund,
        sig_failed,
        valid_after,
        valid_until,
        paymaster_context,
    } = return_info;
    Ok(types::ValidationResult {
        pre_op_gas,
        prefund,
        sig_failed,
        valid_after: uint48(valid_after, "validAfter")?,
        valid_until: uint48(valid_until, "validUntil")?,
        paymaster_context,
        sender_info: sender_info.into(),
        factory_info: factory_info.into(),
        paymaster_info: paymaster_info.into(),
        aggregator_info: aggregator_info.map(Into::into),
    })
}

impl TryFrom<ValidationResult> for types::ValidationResult {
    type Error = String;

    fn try_from(value: ValidationResult) -> Result<Self, Self::Error> {
        let ValidationResult {
            return_info,
            sender_info,
            factory_info,
            paymaster_info,
        } = value;
        validation_result(return_info, sender_info, factory_info, paymaster_info, None)
    }
}

impl TryFrom<ValidationResultWithAggregation> for types::ValidationResult {
    type Error = String;

    fn try_from(value: ValidationResultWithAggregation) -> Result<Self, Self::Error> {
        let ValidationResultWithAggregation {
            return_info,
            sender_info,
            factory_info,
            paymaster_info,
            aggregator_info,
        } = value;
        validation_result(
            return_info,
            sender_info,
            factory_info,
            paymaster_info,
            Some(aggregator_info),
        )
    }
}

impl From<FailedOp> for types::FailedOp {
    fn from(value: FailedOp) -> Self {
        Self {
            // An index past u64 cannot name an op in a bundle; saturate rather than wrap.
            op_index: if value.op_index > U256::from(u64::MAX) {
                u64::MAX
            } else {
                value.op_index.as_u64()
            },
            reason: value.reason,
        }
    }
}
