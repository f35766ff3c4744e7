//! tarmac is a CLI tool to deploy interdependent contracts, resumably.

mod cli;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::Table;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use cli::{Cli, Command};
use tarmac_deploy::{
    ArtifactRegistry, DeployConfig, DeploymentPlan, HttpProvider, NewDeployment, Orchestrator,
    Provider, safety,
};

/// Load the configuration: defaults, then the config file, then `TARMAC_*` variables.
fn load_config(path: &Path) -> Result<DeployConfig> {
    let config: DeployConfig = Figment::from(Serialized::defaults(DeployConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("TARMAC_"))
        .extract()
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

    tracing::debug!(path = %path.display(), exists = path.exists(), "Configuration loaded");

    let root = path.parent().unwrap_or(Path::new(""));
    Ok(config.relative_to(root))
}

fn print_report(deployed: &[NewDeployment]) {
    if deployed.is_empty() {
        tracing::info!("No new contract was deployed");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["Contract", "Address"]);
    for deployment in deployed {
        table.add_row(vec![deployment.name.clone(), deployment.address.to_string()]);
    }

    println!("{table}");
}

async fn deploy(config: DeployConfig) -> Result<()> {
    let plan = DeploymentPlan::load(&config.plan_path)?;
    let mut orchestrator = Orchestrator::from_config(&config).await?;

    let account = orchestrator.account();
    let balance = orchestrator.provider().balance(account).await?;
    tracing::info!(
        network = %config.network,
        rpc_url = %config.rpc_url,
        %account,
        %balance,
        dry_run = config.dry_run,
        use_ovm = config.use_ovm,
        targets = plan.targets.len(),
        "Starting deployment..."
    );

    plan.execute(&mut orchestrator).await?;

    print_report(orchestrator.new_contracts_deployed());

    tracing::info!(
        deployed = orchestrator.new_contracts_deployed().len(),
        "Deployment complete"
    );

    Ok(())
}

async fn next_address(config: DeployConfig) -> Result<()> {
    let provider = HttpProvider::new(config.rpc_url()?)?;
    let orchestrator = Orchestrator::builder(provider, config.signer()?)
        .fees(config.fees)
        .build()?;

    let address = orchestrator.evaluate_next_deployed_address().await?;
    tracing::debug!(account = %orchestrator.account(), %address, "Next contract address");
    println!("{address}");

    Ok(())
}

fn check_bytecode(config: &DeployConfig, name: &str) -> Result<()> {
    let artifacts = ArtifactRegistry::load_from_dir(&config.build_path)?;
    let artifact = artifacts.get(name).with_context(|| {
        format!(
            "No compiled artifact named {name} in {}",
            config.build_path.display()
        )
    })?;

    if !safety::is_safe_for_restricted_mode(artifact.bytecode()) {
        anyhow::bail!("{name} is not safe for the restricted execution mode");
    }

    tracing::info!(name, "Bytecode is safe for the restricted execution mode");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let mut config = load_config(&cli.config)?;

    match cli.command {
        Command::Deploy(args) => {
            args.apply(&mut config);
            deploy(config).await
        }
        Command::NextAddress(args) => {
            args.apply(&mut config);
            next_address(config).await
        }
        Command::CheckBytecode { artifact } => check_bytecode(&config, &artifact),
    }
}
