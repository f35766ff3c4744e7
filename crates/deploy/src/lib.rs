//! tarmac-deploy - Contract deployment orchestration.
//!
//! This crate deploys a graph of interdependent compiled contracts to an EVM network. It
//! reconciles a deployment manifest against the ledger of previous deployments, links
//! libraries, simulates deployments in dry run, and persists every result as soon as it
//! is known so that interrupted runs can be resumed.

pub mod artifacts;
pub mod config;
pub mod error;
pub mod fees;
mod fs;
pub mod instance;
pub mod ledger;
pub mod linker;
pub mod manifest;
pub mod nonce;
pub mod orchestrator;
pub mod plan;
pub mod provider;
pub mod rpc;
pub mod safety;
pub mod signer;
pub mod submitter;
pub mod versions;

pub use artifacts::{ArtifactMetadata, ArtifactRegistry, CompiledArtifact};
pub use config::{Chain, DeployConfig, RunSettings};
pub use error::DeployError;
pub use fees::{FeeConfig, FeeParams};
pub use fs::RunLock;
pub use instance::{DeployedInstance, InstanceBinding, NewDeployment, ReplacedInstance};
pub use ledger::{Ledger, LedgerSource, LedgerTarget};
pub use manifest::{Manifest, ManifestEntry};
pub use nonce::{LocalNonceSequencer, NonceSequencer};
pub use orchestrator::{
    DeployTarget, Orchestrator, OrchestratorBuilder, encoded_deployment_parameters,
};
pub use plan::{DeploymentPlan, PlanArg, PlanTarget};
pub use provider::{FeeData, Provider, TxReceipt, TxRequest};
pub use rpc::HttpProvider;
pub use signer::DeploySigner;
pub use submitter::{Submitter, TxOverrides};
pub use versions::{VersionEntry, VersionHistory};
