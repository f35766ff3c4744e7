//! Typed failures raised by a deployment run.
//!
//! Every fallible operation in this crate returns an [`anyhow::Error`]. Failures that a
//! caller may want to branch on are raised as a [`DeployError`] inside it, and can be
//! recovered with `err.downcast_ref::<DeployError>()`.

use alloy_core::primitives::{Address, B256};
use derive_more::{Display, Error};

#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum DeployError {
    /// The target wants a fresh deployment but its artifact was never compiled.
    #[display("No compiled source for: {name}. The source file is set to {artifact}.sol - is that correct?")]
    MissingArtifact { name: String, artifact: String },

    /// Some dependencies are neither deployed in this run nor recorded in the ledger.
    #[display("Cannot deploy {name} as it is missing dependencies: {}", missing.join(","))]
    MissingDependencies { name: String, missing: Vec<String> },

    /// The manifest asks to reuse a contract the ledger knows nothing usable about.
    #[display("Settings for contract: {name} specify an existing contract, but cannot find address or ABI.")]
    ExistingContractUnresolvable { name: String },

    /// The contract is not recorded in the ledger at all.
    #[display("No deployment of {name} is recorded in the ledger")]
    UnknownContract { name: String },

    #[display("new {name}(): Cannot use the AddressResolver as a constructor arg. Use ReadProxyAddressResolver instead.")]
    ForbiddenConstructorArg { name: String },

    #[display("Contract deployment resulted in a contract with no bytecode at {address}")]
    EmptyBytecode { address: Address },

    #[display("Bytecode of {name} has a JUMPDEST outside of push data, which the restricted execution mode rejects")]
    UnsafeBytecode { name: String },

    #[display("Invalid fee configuration: {reason}")]
    InvalidFeeConfig { reason: String },

    #[display("Transaction {tx_hash} reverted")]
    TransactionReverted { tx_hash: B256 },

    #[display("Receipt of transaction {tx_hash} carries no contract address")]
    MissingContractAddress { tx_hash: B256 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_dependencies_lists_every_name() {
        let err = DeployError::MissingDependencies {
            name: "Synthetix".to_string(),
            missing: vec!["AddressResolver".to_string(), "SafeDecimalMath".to_string()],
        };

        assert_eq!(
            err.to_string(),
            "Cannot deploy Synthetix as it is missing dependencies: AddressResolver,SafeDecimalMath"
        );
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = DeployError::ExistingContractUnresolvable {
            name: "Issuer".to_string(),
        }
        .into();

        assert!(matches!(
            err.downcast_ref::<DeployError>(),
            Some(DeployError::ExistingContractUnresolvable { name }) if name == "Issuer"
        ));
        assert!(err.to_string().contains("cannot find address or ABI"));
    }
}
