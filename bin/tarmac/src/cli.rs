use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tarmac_deploy::{Chain, DeployConfig};
use tracing::level_filters::LevelFilter;
use url::Url;

/// The default configuration file.
pub const DEFAULT_CONFIG_FILE: &str = "Tarmac.toml";

#[derive(Parser)]
#[command(name = "tarmac")]
#[command(
    author,
    version,
    about = "Deploy a graph of interdependent contracts, and resume where you left off"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "TARMAC_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to the configuration file.
    ///
    /// Relative paths inside the file are resolved against its directory. Every setting can
    /// also be given as a `TARMAC_<SETTING>` environment variable.
    #[arg(short, long, alias = "conf", env = "TARMAC_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Resolve every target of the deployment plan, in order.
    Deploy(DeployArgs),

    /// Print the address the next contract created by the deployer will get.
    NextAddress(NetworkArgs),

    /// Check that a compiled artifact can run in the restricted (OVM) execution mode.
    CheckBytecode {
        /// Artifact name, looked up in the build directory.
        artifact: String,
    },
}

/// Network overrides.
#[derive(Debug, Clone, Args)]
pub struct NetworkArgs {
    /// The network to deploy to (local, mainnet, sepolia, ...).
    #[arg(short, long, env = "TARMAC_NETWORK")]
    pub network: Option<Chain>,

    /// The URL of the network RPC endpoint.
    #[arg(long, alias = "rpc", env = "TARMAC_RPC_URL")]
    pub rpc_url: Option<Url>,

    /// The deployer private key.
    ///
    /// Optional on local and forked networks, where the unlocked owner account is used.
    #[arg(long, env = "TARMAC_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    /// The network is a fork of a live network.
    #[arg(long, env = "TARMAC_USE_FORK")]
    pub use_fork: bool,
}

#[derive(Debug, Clone, Args)]
pub struct DeployArgs {
    #[command(flatten)]
    pub network: NetworkArgs,

    /// Simulate the deployment. Nothing is submitted and no file is written.
    #[arg(long, env = "TARMAC_DRY_RUN")]
    pub dry_run: bool,

    /// Deploy for the restricted (OVM) execution mode.
    #[arg(long, env = "TARMAC_USE_OVM")]
    pub use_ovm: bool,

    /// Track the deployer nonce locally instead of asking the network before every transaction.
    #[arg(long, env = "TARMAC_USE_NONCE_SEQUENCER")]
    pub use_nonce_sequencer: bool,

    /// Path to the deployment plan.
    #[arg(long, env = "TARMAC_PLAN_PATH")]
    pub plan: Option<PathBuf>,
}

impl NetworkArgs {
    pub fn apply(&self, config: &mut DeployConfig) {
        if let Some(network) = &self.network {
            config.network = network.clone();
        }
        if let Some(rpc_url) = &self.rpc_url {
            config.rpc_url = rpc_url.to_string();
        }
        if let Some(private_key) = &self.private_key {
            config.private_key = Some(private_key.clone());
        }
        config.use_fork |= self.use_fork;
    }
}

impl DeployArgs {
    pub fn apply(&self, config: &mut DeployConfig) {
        self.network.apply(config);
        config.dry_run |= self.dry_run;
        config.use_ovm |= self.use_ovm;
        config.use_nonce_sequencer |= self.use_nonce_sequencer;
        if let Some(plan) = &self.plan {
            config.plan_path = plan.clone();
        }
    }
}
