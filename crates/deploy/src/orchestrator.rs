//! Deployment orchestrator.
//!
//! The [`Orchestrator`] resolves deployment targets one at a time, in the order the caller
//! supplies them. For each target it reconciles the manifest flag against the ledger, and
//! either deploys a fresh instance, simulates one in dry run, or reuses the recorded one.
//! Results are persisted to the ledger (and to the manifest on live networks) right after
//! each target, so an interrupted run can be resumed without redeploying anything.

use std::{
    collections::BTreeMap,
    ffi::OsString,
    path::{Path, PathBuf},
};

use alloy_core::{
    dyn_abi::{DynSolValue, JsonAbiExt},
    json_abi::JsonAbi,
    primitives::{Address, Bytes, U256, address},
};
use anyhow::Context;
use chrono::Utc;

use crate::{
    artifacts::ArtifactRegistry,
    config::{DeployConfig, RunSettings},
    error::DeployError,
    fees::FeeConfig,
    fs::{FsHandler, RunLock},
    instance::{DeployedInstance, NewDeployment, ReplacedInstance},
    ledger::{ExistingDeployment, Ledger, LedgerSource, LedgerTarget},
    linker,
    manifest::{Manifest, ManifestEntry},
    nonce::{LocalNonceSequencer, NonceSequencer},
    provider::{Provider, TxReceipt},
    rpc::HttpProvider,
    safety,
    signer::DeploySigner,
    submitter::{Submitter, TxOverrides},
    versions::VersionHistory,
};

/// Contracts must not receive the resolver itself as a constructor argument.
const ADDRESS_RESOLVER: &str = "AddressResolver";

/// Recipient of the nonce bumping transaction.
const DUMMY_TX_RECIPIENT: Address = address!("0x0000000000000000000000000000000000000001");

/// One contract to resolve.
#[derive(Debug, Clone, PartialEq)]
pub struct DeployTarget {
    pub name: String,
    /// Artifact to deploy. Defaults to `name`.
    pub source: String,
    /// Constructor arguments.
    pub args: Vec<DynSolValue>,
    /// Targets that must be resolved before this one.
    pub deps: Vec<String>,
    pub library: bool,
    pub skip_resolver: bool,
    /// Deploy even when the target is absent from the manifest.
    pub force: bool,
    /// Overrides the run level dry run flag.
    pub dry_run: Option<bool>,
}

impl DeployTarget {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            source: name.clone(),
            name,
            args: Vec::new(),
            deps: Vec::new(),
            library: false,
            skip_resolver: false,
            force: false,
            dry_run: None,
        }
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = DynSolValue>) -> Self {
        self.args = args.into_iter().collect();
        self
    }

    pub fn deps<S: Into<String>>(mut self, deps: impl IntoIterator<Item = S>) -> Self {
        self.deps = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn library(mut self, library: bool) -> Self {
        self.library = library;
        self
    }

    pub fn skip_resolver(mut self, skip_resolver: bool) -> Self {
        self.skip_resolver = skip_resolver;
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = Some(dry_run);
        self
    }
}

/// State owned by a single run. Nothing in here outlives the orchestrator.
#[derive(Debug, Default)]
pub struct RunContext {
    deployed: BTreeMap<String, DeployedInstance>,
    replaced: BTreeMap<String, ReplacedInstance>,
    dry_run_counter: u64,
    new_contracts: Vec<NewDeployment>,
}

impl RunContext {
    /// Placeholder address of the next simulated deployment: the run counter, zero padded.
    fn next_dry_run_address(&mut self) -> anyhow::Result<Address> {
        self.dry_run_counter += 1;
        format!("0x{:0>40}", self.dry_run_counter)
            .parse()
            .context("Failed to build dry run address")
    }
}

/// Builder for an [`Orchestrator`].
pub struct OrchestratorBuilder<P> {
    provider: P,
    signer: DeploySigner,
    settings: RunSettings,
    fees: FeeConfig,
    artifacts: ArtifactRegistry,
    manifest: Manifest,
    ledger: Ledger,
    versions: VersionHistory,
    nonce_sequencer: Option<Box<dyn NonceSequencer>>,
}

impl<P: Provider> OrchestratorBuilder<P> {
    pub fn new(provider: P, signer: DeploySigner) -> Self {
        Self {
            provider,
            signer,
            settings: RunSettings::default(),
            fees: FeeConfig::default(),
            artifacts: ArtifactRegistry::default(),
            manifest: Manifest::default(),
            ledger: Ledger::default(),
            versions: VersionHistory::default(),
            nonce_sequencer: None,
        }
    }

    pub fn settings(mut self, settings: RunSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn fees(mut self, fees: FeeConfig) -> Self {
        self.fees = fees;
        self
    }

    pub fn artifacts(mut self, artifacts: ArtifactRegistry) -> Self {
        self.artifacts = artifacts;
        self
    }

    pub fn manifest(mut self, manifest: Manifest) -> Self {
        self.manifest = manifest;
        self
    }

    pub fn ledger(mut self, ledger: Ledger) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn versions(mut self, versions: VersionHistory) -> Self {
        self.versions = versions;
        self
    }

    pub fn nonce_sequencer(mut self, sequencer: impl NonceSequencer + 'static) -> Self {
        self.nonce_sequencer = Some(Box::new(sequencer));
        self
    }

    /// Build the orchestrator.
    ///
    /// A run that persists its ledger holds an exclusive lock on `<ledger>.lock` until the
    /// orchestrator is dropped.
    pub fn build(self) -> anyhow::Result<Orchestrator<P>> {
        let lock = match &self.settings.ledger_path {
            Some(ledger_path) if !self.settings.dry_run => {
                Some(FsHandler::lock_exclusive(&lock_path(ledger_path))?)
            }
            _ => None,
        };

        let mut submitter = Submitter::new(self.provider, self.signer, self.fees)?;
        if let Some(sequencer) = self.nonce_sequencer {
            submitter = submitter.with_nonce_sequencer(sequencer);
        }

        tracing::debug!(
            network = %self.settings.network,
            account = %submitter.account(),
            dry_run = self.settings.dry_run,
            use_ovm = self.settings.use_ovm,
            artifacts = self.artifacts.len(),
            "Orchestrator ready"
        );

        Ok(Orchestrator {
            updated_manifest: self.manifest.clone(),
            manifest: self.manifest,
            settings: self.settings,
            artifacts: self.artifacts,
            ledger: self.ledger,
            versions: self.versions,
            submitter,
            run: RunContext::default(),
            _lock: lock,
        })
    }
}

fn lock_path(ledger_path: &Path) -> PathBuf {
    let mut path = OsString::from(ledger_path.as_os_str());
    path.push(".lock");
    PathBuf::from(path)
}

/// Resolves deployment targets against the manifest, the ledger and the network.
pub struct Orchestrator<P> {
    settings: RunSettings,
    artifacts: ArtifactRegistry,
    /// Manifest as loaded. Gating decisions of the whole run read this copy.
    manifest: Manifest,
    /// Manifest with the flags of targets deployed during this run flipped off.
    updated_manifest: Manifest,
    ledger: Ledger,
    versions: VersionHistory,
    submitter: Submitter<P>,
    run: RunContext,
    _lock: Option<RunLock>,
}

impl Orchestrator<HttpProvider> {
    /// Load every document referenced by `config` and connect to its RPC endpoint.
    pub async fn from_config(config: &DeployConfig) -> anyhow::Result<Self> {
        let provider = HttpProvider::new(config.rpc_url()?)?;
        let signer = config.signer()?;

        let artifacts = ArtifactRegistry::load_from_dir(&config.build_path)?;
        let manifest = match &config.manifest_path {
            Some(path) => Manifest::load(path)?,
            None => Manifest::default(),
        };
        let ledger = match &config.ledger_path {
            Some(path) => Ledger::load(path)?,
            None => Ledger::default(),
        };
        let versions = match &config.versions_path {
            Some(path) => VersionHistory::load(path)?,
            None => VersionHistory::default(),
        };

        let mut builder = OrchestratorBuilder::new(provider, signer)
            .settings(config.settings())
            .fees(config.fees)
            .artifacts(artifacts)
            .manifest(manifest)
            .ledger(ledger)
            .versions(versions);

        if config.use_nonce_sequencer {
            let sequencer =
                LocalNonceSequencer::from_provider(&builder.provider, builder.signer.address())
                    .await?;
            builder = builder.nonce_sequencer(sequencer);
        }

        builder.build()
    }
}

impl<P: Provider> Orchestrator<P> {
    pub fn builder(provider: P, signer: DeploySigner) -> OrchestratorBuilder<P> {
        OrchestratorBuilder::new(provider, signer)
    }

    /// Resolve `target` and record the result.
    ///
    /// Returns `None` when the target is skipped because it is absent from the manifest.
    pub async fn deploy_contract(
        &mut self,
        target: DeployTarget,
    ) -> anyhow::Result<Option<DeployedInstance>> {
        if let Some(resolver) = self.run.deployed.get(ADDRESS_RESOLVER) {
            let forbidden = resolver.address;
            if target
                .args
                .iter()
                .any(|arg| matches!(arg, DynSolValue::Address(address) if *address == forbidden))
            {
                return Err(DeployError::ForbiddenConstructorArg { name: target.name }.into());
            }
        }

        let dry_run = target.dry_run.unwrap_or(self.settings.dry_run);

        let Some(mut instance) = self.resolve_target(&target, dry_run).await? else {
            return Ok(None);
        };

        instance.library = target.library;
        instance.skip_resolver = target.skip_resolver;

        self.record_result(&target.name, &instance, dry_run)?;

        Ok(Some(instance))
    }

    /// Decide between deploying, simulating and reusing `target`.
    async fn resolve_target(
        &mut self,
        target: &DeployTarget,
        dry_run: bool,
    ) -> anyhow::Result<Option<DeployedInstance>> {
        let name = target.name.as_str();
        let entry = self.manifest.entry(name);

        if entry.is_none() && !target.force {
            tracing::warn!(
                name,
                "Skipping {} as it is NOT in the manifest for deployment",
                name
            );
            return Ok(None);
        }

        let missing: Vec<String> = target
            .deps
            .iter()
            .filter(|dep| {
                !self.run.deployed.contains_key(*dep) && !self.ledger.contains_target(dep)
            })
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(DeployError::MissingDependencies {
                name: name.to_string(),
                missing,
            }
            .into());
        }

        let should_deploy = entry.map_or(target.force, |entry| entry.deploy);
        let existing = self.ledger.existing(name);

        if should_deploy {
            return self.deploy_fresh(target, existing, dry_run).await.map(Some);
        }

        match existing {
            Some(ExistingDeployment {
                address,
                source,
                abi: Some(abi),
            }) => {
                tracing::info!(name, %address, "Reusing instance of {}", name);
                Ok(Some(DeployedInstance::live(address, abi, source)))
            }
            _ => Err(DeployError::ExistingContractUnresolvable {
                name: name.to_string(),
            }
            .into()),
        }
    }

    async fn deploy_fresh(
        &mut self,
        target: &DeployTarget,
        existing: Option<ExistingDeployment>,
        dry_run: bool,
    ) -> anyhow::Result<DeployedInstance> {
        let name = target.name.as_str();
        let source = target.source.as_str();

        let artifact = self
            .artifacts
            .get(source)
            .ok_or_else(|| DeployError::MissingArtifact {
                name: name.to_string(),
                artifact: source.to_string(),
            })?;

        // Every contract deployed after a well-known library gets linked against it.
        let bytecode = linker::link_known_libraries(artifact.bytecode(), source, |library| {
            self.run.deployed.get(library).map(|instance| instance.address)
        });
        let abi = artifact.abi.clone();

        if self.settings.use_ovm && !safety::is_safe_for_restricted_mode(&bytecode) {
            if self.settings.fail_on_unsafe_bytecode {
                return Err(DeployError::UnsafeBytecode {
                    name: name.to_string(),
                }
                .into());
            }
            tracing::warn!(name, source, "Bytecode is not safe for the restricted execution mode");
        }

        if name == source {
            tracing::info!(name, "Attempting to deploy {}", name);
        } else {
            tracing::info!(name, source, "Attempting to deploy {} (with source {})", name, source);
        }

        let mut instance = if dry_run {
            let address = self.run.next_dry_run_address()?;
            let instance =
                DeployedInstance::dry_run_stub(address, abi, source, self.submitter.account());
            tracing::info!(name, %address, "[DRY RUN] Simulated deployment of {}", name);
            instance
        } else {
            let init_code = [
                decode_bytecode(name, &bytecode)?,
                encoded_deployment_parameters(&abi, &target.args)
                    .with_context(|| format!("Invalid constructor arguments for {name}"))?
                    .to_vec(),
            ]
            .concat();

            let receipt = self.submitter.deploy(init_code.into()).await?;
            let address =
                receipt
                    .contract_address
                    .ok_or(DeployError::MissingContractAddress {
                        tx_hash: receipt.transaction_hash,
                    })?;

            tracing::info!(
                name,
                %address,
                tx_hash = %receipt.transaction_hash,
                "Deployed {} to {}, used {:.1}m in gas",
                name,
                address,
                receipt.gas_used as f64 / 1e6
            );

            let mut instance = DeployedInstance::live(address, abi, source);
            instance.deploy_transaction = Some(receipt.transaction_hash);
            instance
        };
        instance.just_deployed = true;

        // Unsafe constructor parameters leave an empty contract behind in the restricted mode.
        if self.settings.use_ovm && !dry_run {
            let code = self.submitter.provider().code_at(instance.address).await?;
            if code.is_empty() {
                return Err(DeployError::EmptyBytecode {
                    address: instance.address,
                }
                .into());
            }
        }

        if let Some(ExistingDeployment {
            address,
            source,
            abi: Some(abi),
        }) = existing
        {
            self.run.replaced.insert(
                name.to_string(),
                ReplacedInstance {
                    address,
                    abi,
                    source,
                },
            );
        }

        Ok(instance)
    }

    /// Write the outcome of a resolution to the ledger, the manifest and the run table.
    fn record_result(
        &mut self,
        name: &str,
        instance: &DeployedInstance,
        dry_run: bool,
    ) -> anyhow::Result<()> {
        if instance.just_deployed {
            self.run.new_contracts.push(NewDeployment {
                name: name.to_string(),
                address: instance.address,
            });
        }

        // Simulated results live in the run table only, never in the ledger.
        if !dry_run {
            self.upsert_ledger(name, instance)?;

            // The ledger goes first: a crash before the manifest write only costs a redeploy.
            if let Some(path) = &self.settings.ledger_path {
                self.ledger.save(path)?;
            }

            if let Some(path) = &self.settings.manifest_path
                && !self.settings.network.is_local()
            {
                self.updated_manifest.mark_deployed(name);
                self.updated_manifest.save(path)?;
            }
        }

        self.run.deployed.insert(name.to_string(), instance.clone());

        Ok(())
    }

    /// Upsert the ledger entry of `name`, and its source when it was just deployed.
    fn upsert_ledger(&mut self, name: &str, instance: &DeployedInstance) -> anyhow::Result<()> {
        let previous = self.ledger.targets.get(name);
        let (timestamp, txn) = match (self.manifest.entry(name), previous) {
            (Some(ManifestEntry { deploy: false }), Some(previous)) => {
                (previous.timestamp, previous.txn.clone())
            }
            _ => (
                Utc::now(),
                instance
                    .deploy_transaction
                    .map(|tx_hash| tx_hash.to_string())
                    .unwrap_or_default(),
            ),
        };

        let network = &self.settings.network;
        self.ledger.targets.insert(
            name.to_string(),
            LedgerTarget {
                name: name.to_string(),
                address: instance.address,
                source: instance.source.clone(),
                link: format!(
                    "{}/address/{}",
                    network.explorer_link_prefix(self.settings.use_ovm),
                    instance.address
                ),
                timestamp,
                txn,
                network: network.to_string(),
            },
        );

        if instance.just_deployed {
            let artifact = self
                .artifacts
                .get(&instance.source)
                .ok_or_else(|| DeployError::MissingArtifact {
                    name: name.to_string(),
                    artifact: instance.source.clone(),
                })?;
            self.ledger
                .sources
                .insert(instance.source.clone(), LedgerSource::from_artifact(artifact));
        }

        Ok(())
    }

    /// A live handle on the contract at `address`.
    pub fn make_contract(&self, abi: JsonAbi, address: Address) -> DeployedInstance {
        DeployedInstance::live(address, abi, String::new())
    }

    /// The previous instance of `name`, bound to the ABI recorded in the ledger.
    ///
    /// On the local network this is the instance replaced during this run, or the ledger
    /// address if the target was not redeployed. Elsewhere it is the latest published version.
    pub fn get_existing_contract(&self, name: &str) -> anyhow::Result<DeployedInstance> {
        let target = self
            .ledger
            .targets
            .get(name)
            .ok_or_else(|| DeployError::UnknownContract {
                name: name.to_string(),
            })?;
        let abi = self.ledger.abi_of(&target.source).cloned().ok_or_else(|| {
            DeployError::ExistingContractUnresolvable {
                name: name.to_string(),
            }
        })?;

        let address = if self.settings.network.is_local() {
            self.run
                .replaced
                .get(name)
                .map_or(target.address, |replaced| replaced.address)
        } else {
            self.versions
                .latest(name)
                .map(|entry| entry.address)
                .with_context(|| {
                    format!(
                        "No published version of {} on {}",
                        name, self.settings.network
                    )
                })?
        };

        let mut instance = self.make_contract(abi, address);
        instance.source = target.source.clone();
        Ok(instance)
    }

    /// Address the next contract creation of the run signer will land at.
    ///
    /// Only valid until the signer sends another transaction.
    pub async fn evaluate_next_deployed_address(&self) -> anyhow::Result<Address> {
        let account = self.account();
        let nonce = self
            .submitter
            .provider()
            .transaction_count(account)
            .await
            .context("Failed to read the signer transaction count")?;
        Ok(account.create(nonce))
    }

    /// Send an empty transaction to bump the signer nonce.
    pub async fn send_dummy_tx(&mut self) -> anyhow::Result<TxReceipt> {
        let receipt = self
            .submitter
            .send(
                DUMMY_TX_RECIPIENT,
                Bytes::from(vec![0u8; 32]),
                U256::ZERO,
            )
            .await?;
        tracing::debug!(tx_hash = %receipt.transaction_hash, "Dummy transaction included");
        Ok(receipt)
    }

    /// Fee and nonce overrides the next transaction would use.
    pub async fn send_overrides(&self) -> anyhow::Result<TxOverrides> {
        self.submitter.overrides().await
    }

    /// Address of `name`, deployed during this run or recorded in the ledger.
    pub fn address_of(&self, name: &str) -> Option<Address> {
        self.run
            .deployed
            .get(name)
            .map(|instance| instance.address)
            .or_else(|| self.ledger.targets.get(name).map(|target| target.address))
    }

    pub fn deployed(&self, name: &str) -> Option<&DeployedInstance> {
        self.run.deployed.get(name)
    }

    pub fn replaced(&self, name: &str) -> Option<&ReplacedInstance> {
        self.run.replaced.get(name)
    }

    pub fn new_contracts_deployed(&self) -> &[NewDeployment] {
        &self.run.new_contracts
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn updated_manifest(&self) -> &Manifest {
        &self.updated_manifest
    }

    pub fn artifacts(&self) -> &ArtifactRegistry {
        &self.artifacts
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn account(&self) -> Address {
        self.submitter.account()
    }

    pub fn provider(&self) -> &P {
        self.submitter.provider()
    }
}

/// ABI encode constructor arguments.
///
/// Empty when the ABI declares no constructor or a constructor without inputs.
pub fn encoded_deployment_parameters(
    abi: &JsonAbi,
    args: &[DynSolValue],
) -> anyhow::Result<Bytes> {
    match abi.constructor() {
        Some(constructor) if !constructor.inputs.is_empty() => {
            let encoded = constructor.abi_encode_input(args).with_context(|| {
                format!(
                    "Expected {} constructor argument(s) matching ({})",
                    constructor.inputs.len(),
                    constructor
                        .inputs
                        .iter()
                        .map(|input| input.ty.as_str())
                        .collect::<Vec<_>>()
                        .join(",")
                )
            })?;
            Ok(encoded.into())
        }
        _ => Ok(Bytes::new()),
    }
}

fn decode_bytecode(name: &str, bytecode: &str) -> anyhow::Result<Vec<u8>> {
    hex::decode(bytecode.trim_start_matches("0x")).with_context(|| {
        format!("Bytecode of {name} is not valid hex, it may reference a library that is not linked")
    })
}
