//! Run configuration.

use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use alloy_core::primitives::{Address, address};
use anyhow::Context;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::Url;

use crate::{fees::FeeConfig, signer::DeploySigner};

/// Default RPC endpoint (local node).
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

/// Funded owner account of local and forked networks.
pub const DEFAULT_LOCAL_OWNER: Address = address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

/// Network a run deploys to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Chain {
    #[default]
    Local,
    Mainnet,
    Goerli,
    Kovan,
    Sepolia,
    #[strum(default)]
    Custom(String),
}

impl Chain {
    /// Local networks are fully redeployed by default, so their manifest is never updated.
    pub fn is_local(&self) -> bool {
        matches!(self, Chain::Local)
    }

    /// Block explorer root for this network.
    pub fn explorer_link_prefix(&self, use_ovm: bool) -> String {
        let subdomain = match self {
            Chain::Mainnet => String::new(),
            network => format!("{}{}", network, if use_ovm { "-" } else { "." }),
        };
        let explorer = if use_ovm {
            "explorer.optimism"
        } else {
            "etherscan"
        };
        format!("https://{subdomain}{explorer}.io")
    }
}

impl Serialize for Chain {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Chain {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Chain::from_str(&name).map_err(serde::de::Error::custom)
    }
}

/// Settings read by the orchestrator during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSettings {
    pub network: Chain,
    /// Deploy for the restricted (OVM) execution mode.
    pub use_ovm: bool,
    /// Default dry run flag of every target.
    pub dry_run: bool,
    /// Fail instead of warning when bytecode is unsafe for the restricted execution mode.
    pub fail_on_unsafe_bytecode: bool,
    /// Manifest document to update. `None` leaves every manifest flag untouched on disk.
    pub manifest_path: Option<PathBuf>,
    /// Ledger document to persist to. `None` keeps the ledger in memory.
    pub ledger_path: Option<PathBuf>,
}

/// Configuration of a deployment run.
///
/// Usually read from `Tarmac.toml` and `TARMAC_*` environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    pub network: Chain,
    pub rpc_url: String,
    /// Hex private key of the deployer. Optional on local and forked networks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    /// Unlocked account used on local and forked networks when no private key is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<Address>,
    #[serde(flatten)]
    pub fees: FeeConfig,
    pub use_ovm: bool,
    /// The network is a fork of a live network with unlocked accounts.
    pub use_fork: bool,
    pub dry_run: bool,
    /// Track nonces locally instead of asking the network before every transaction.
    pub use_nonce_sequencer: bool,
    pub fail_on_unsafe_bytecode: bool,
    /// Directory holding one compiled artifact per contract.
    pub build_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_path: Option<PathBuf>,
    pub plan_path: PathBuf,
    /// Published version history, used to look up previous releases on live networks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub versions_path: Option<PathBuf>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            network: Chain::Local,
            rpc_url: DEFAULT_RPC_URL.to_string(),
            private_key: None,
            owner: None,
            fees: FeeConfig::default(),
            use_ovm: false,
            use_fork: false,
            dry_run: false,
            use_nonce_sequencer: false,
            fail_on_unsafe_bytecode: false,
            build_path: PathBuf::from("build/compiled"),
            manifest_path: Some(PathBuf::from("config.json")),
            ledger_path: Some(PathBuf::from("deployment.json")),
            plan_path: PathBuf::from("plan.toml"),
            versions_path: None,
        }
    }
}

impl DeployConfig {
    pub fn rpc_url(&self) -> anyhow::Result<Url> {
        Url::parse(&self.rpc_url).with_context(|| format!("Invalid RPC URL: {}", self.rpc_url))
    }

    /// The account the run deploys from.
    ///
    /// Without a private key, local and forked networks fall back to the unlocked owner account.
    pub fn signer(&self) -> anyhow::Result<DeploySigner> {
        if let Some(private_key) = &self.private_key {
            return DeploySigner::from_private_key(private_key);
        }

        if self.network.is_local() || self.use_fork {
            let owner = self.owner.unwrap_or(DEFAULT_LOCAL_OWNER);
            tracing::debug!(%owner, network = %self.network, "Using unlocked owner account");
            return Ok(DeploySigner::Unlocked(owner));
        }

        anyhow::bail!(
            "A private key is required to deploy to {} (set private_key or TARMAC_PRIVATE_KEY)",
            self.network
        )
    }

    pub fn settings(&self) -> RunSettings {
        RunSettings {
            network: self.network.clone(),
            use_ovm: self.use_ovm,
            dry_run: self.dry_run,
            fail_on_unsafe_bytecode: self.fail_on_unsafe_bytecode,
            manifest_path: self.manifest_path.clone(),
            ledger_path: self.ledger_path.clone(),
        }
    }

    /// Resolve every relative path against `root`.
    pub fn relative_to(mut self, root: &Path) -> Self {
        let rebase = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = root.join(&*path);
            }
        };

        rebase(&mut self.build_path);
        rebase(&mut self.plan_path);
        for path in [
            self.manifest_path.as_mut(),
            self.ledger_path.as_mut(),
            self.versions_path.as_mut(),
        ]
        .into_iter()
        .flatten()
        {
            rebase(path);
        }

        self
    }
}
