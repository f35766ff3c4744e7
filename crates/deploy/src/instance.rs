//! Handles on deployed contracts.

use alloy_core::{
    dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt},
    json_abi::JsonAbi,
    primitives::{Address, B256},
};
use anyhow::Context;

use crate::provider::Provider;

/// Accessor answered with the run signer by dry-run stubs.
pub const OWNER_FUNCTION: &str = "owner";
/// Dependency declaration read answered with an empty list by dry-run stubs.
pub const RESOLVER_ADDRESSES_FUNCTION: &str = "resolverAddressesRequired";

/// What backs the calls made on an instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceBinding {
    /// Calls go to the contract on the network.
    Live,
    /// Simulated deployment. Only the owner and resolver-dependency reads answer,
    /// everything else returns nothing.
    DryRunStub { owner: Address },
}

/// A contract resolved by the orchestrator during the current run.
#[derive(Debug, Clone, PartialEq)]
pub struct DeployedInstance {
    pub address: Address,
    pub abi: JsonAbi,
    /// Artifact the instance was built from.
    pub source: String,
    /// Set when the instance was (possibly simulated) deployed in this run.
    pub just_deployed: bool,
    pub library: bool,
    /// The instance does not take part in address resolver dependency resolution.
    pub skip_resolver: bool,
    pub deploy_transaction: Option<B256>,
    pub binding: InstanceBinding,
}

impl DeployedInstance {
    pub fn live(address: Address, abi: JsonAbi, source: impl Into<String>) -> Self {
        Self {
            address,
            abi,
            source: source.into(),
            just_deployed: false,
            library: false,
            skip_resolver: false,
            deploy_transaction: None,
            binding: InstanceBinding::Live,
        }
    }

    pub fn dry_run_stub(
        address: Address,
        abi: JsonAbi,
        source: impl Into<String>,
        owner: Address,
    ) -> Self {
        Self {
            binding: InstanceBinding::DryRunStub { owner },
            ..Self::live(address, abi, source)
        }
    }

    pub fn is_stub(&self) -> bool {
        matches!(self.binding, InstanceBinding::DryRunStub { .. })
    }

    /// Call a read-only function of the contract.
    ///
    /// Live instances run an `eth_call` and decode its output. Dry-run stubs return
    /// `None` for everything except the owner and resolver-dependency reads.
    pub async fn call<P: Provider>(
        &self,
        provider: &P,
        function: &str,
        args: &[DynSolValue],
    ) -> anyhow::Result<Option<Vec<DynSolValue>>> {
        if let InstanceBinding::DryRunStub { owner } = self.binding {
            return Ok(match function {
                OWNER_FUNCTION => Some(vec![DynSolValue::Address(owner)]),
                RESOLVER_ADDRESSES_FUNCTION => Some(vec![DynSolValue::Array(vec![])]),
                _ => None,
            });
        }

        let func = self
            .abi
            .function(function)
            .and_then(|overloads| overloads.iter().find(|f| f.inputs.len() == args.len()))
            .with_context(|| {
                format!(
                    "{} has no function {}() taking {} argument(s)",
                    self.source,
                    function,
                    args.len()
                )
            })?;

        let calldata = func
            .abi_encode_input(args)
            .with_context(|| format!("Invalid arguments for {}.{}()", self.source, function))?;
        let output = provider
            .call(self.address, calldata.into())
            .await
            .with_context(|| format!("Call to {}.{}() failed", self.source, function))?;
        let decoded = func
            .abi_decode_output(&output)
            .with_context(|| format!("Failed to decode {}.{}() output", self.source, function))?;

        Ok(Some(decoded))
    }
}

/// The previous instance of a target that was redeployed in this run.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplacedInstance {
    pub address: Address,
    pub abi: JsonAbi,
    pub source: String,
}

impl ReplacedInstance {
    /// A live handle on the replaced contract, e.g. to migrate its state.
    pub fn to_instance(&self) -> DeployedInstance {
        DeployedInstance::live(self.address, self.abi.clone(), self.source.clone())
    }
}

/// Entry of the newly deployed report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDeployment {
    pub name: String,
    pub address: Address,
}
