//! Declarative deployment plans.
//!
//! A plan is a TOML document listing targets in deployment order:
//!
//! ```toml
//! [[target]]
//! name = "SafeDecimalMath"
//! library = true
//!
//! [[target]]
//! name = "ProxyERC20"
//! source = "ProxyERC20"
//! args = ["@Owner"]
//! deps = ["Owner"]
//! ```
//!
//! String arguments are coerced to the constructor input types of the target's artifact.
//! `@Name` stands for the address of a target resolved earlier.

use std::path::Path;

use alloy_core::{
    dyn_abi::{DynSolType, DynSolValue, Specifier},
    json_abi::JsonAbi,
    primitives::Address,
};
use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{
    orchestrator::{DeployTarget, Orchestrator},
    provider::Provider,
};

/// Ordered list of targets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentPlan {
    #[serde(default, rename = "target")]
    pub targets: Vec<PlanTarget>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanTarget {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub args: Vec<PlanArg>,
    #[serde(default)]
    pub deps: Vec<String>,
    #[serde(default)]
    pub library: bool,
    #[serde(default)]
    pub skip_resolver: bool,
    #[serde(default)]
    pub force: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
}

/// Constructor argument as written in the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlanArg {
    Bool(bool),
    Int(i64),
    Text(String),
    List(Vec<PlanArg>),
}

impl DeploymentPlan {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read plan from {}", path.display()))?;
        let plan: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {} as a deployment plan", path.display()))?;
        tracing::info!(
            path = %path.display(),
            targets = plan.targets.len(),
            "Deployment plan loaded"
        );
        Ok(plan)
    }

    /// Resolve every target in order. Stops at the first failure.
    pub async fn execute<P: Provider>(
        &self,
        orchestrator: &mut Orchestrator<P>,
    ) -> anyhow::Result<()> {
        for target in &self.targets {
            let deploy_target = target.to_deploy_target(orchestrator)?;
            orchestrator
                .deploy_contract(deploy_target)
                .await
                .with_context(|| format!("Failed to resolve {}", target.name))?;
        }
        Ok(())
    }
}

impl PlanTarget {
    pub fn source(&self) -> &str {
        self.source.as_deref().unwrap_or(&self.name)
    }

    /// Build the orchestrator target, coercing arguments against the constructor of the
    /// compiled artifact, or of the ledger source when the artifact is absent.
    pub fn to_deploy_target<P: Provider>(
        &self,
        orchestrator: &Orchestrator<P>,
    ) -> anyhow::Result<DeployTarget> {
        let args = if self.args.is_empty() {
            Vec::new()
        } else {
            let abi = orchestrator
                .artifacts()
                .get(self.source())
                .map(|artifact| &artifact.abi)
                .or_else(|| orchestrator.ledger().abi_of(self.source()));

            match abi {
                Some(abi) => self.coerce_args(abi, |name| orchestrator.address_of(name))?,
                None => {
                    tracing::debug!(
                        name = %self.name,
                        source = self.source(),
                        "No ABI known for source, constructor arguments ignored"
                    );
                    Vec::new()
                }
            }
        };

        let mut target = DeployTarget::new(&self.name)
            .source(self.source())
            .args(args)
            .deps(self.deps.iter().cloned())
            .library(self.library)
            .skip_resolver(self.skip_resolver)
            .force(self.force);
        if let Some(dry_run) = self.dry_run {
            target = target.dry_run(dry_run);
        }

        Ok(target)
    }

    fn coerce_args(
        &self,
        abi: &JsonAbi,
        lookup: impl Fn(&str) -> Option<Address>,
    ) -> anyhow::Result<Vec<DynSolValue>> {
        let inputs = abi
            .constructor()
            .map(|constructor| constructor.inputs.as_slice())
            .unwrap_or_default();

        if inputs.len() != self.args.len() {
            anyhow::bail!(
                "{} takes {} constructor argument(s), the plan gives {}",
                self.source(),
                inputs.len(),
                self.args.len()
            );
        }

        inputs
            .iter()
            .zip(&self.args)
            .map(|(input, arg)| {
                let ty = input
                    .resolve()
                    .with_context(|| format!("Unsupported constructor input type {}", input.ty))?;
                coerce(arg, &ty, &lookup).with_context(|| {
                    format!(
                        "Invalid value for constructor argument {} of {}",
                        input.name,
                        self.source()
                    )
                })
            })
            .collect()
    }
}

fn coerce(
    arg: &PlanArg,
    ty: &DynSolType,
    lookup: &impl Fn(&str) -> Option<Address>,
) -> anyhow::Result<DynSolValue> {
    let text = match arg {
        PlanArg::Bool(value) => value.to_string(),
        PlanArg::Int(value) => value.to_string(),
        PlanArg::Text(text) => match text.strip_prefix('@') {
            Some(name) => lookup(name)
                .with_context(|| format!("{name} is not resolved yet"))?
                .to_string(),
            None => text.clone(),
        },
        PlanArg::List(items) => {
            let (inner, expected_len) = match ty {
                DynSolType::Array(inner) => (inner.as_ref(), None),
                DynSolType::FixedArray(inner, len) => (inner.as_ref(), Some(*len)),
                _ => anyhow::bail!("A list cannot be used as {ty}"),
            };
            if let Some(len) = expected_len
                && len != items.len()
            {
                anyhow::bail!("{ty} expects {len} items, got {}", items.len());
            }

            let values = items
                .iter()
                .map(|item| coerce(item, inner, lookup))
                .collect::<anyhow::Result<Vec<_>>>()?;

            return Ok(match expected_len {
                Some(_) => DynSolValue::FixedArray(values),
                None => DynSolValue::Array(values),
            });
        }
    };

    ty.coerce_str(&text)
        .with_context(|| format!("Cannot read {text:?} as {ty}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_core::primitives::{U256, address};

    const OWNER: Address = address!("0x00000000000000000000000000000000000000aa");

    fn abi() -> JsonAbi {
        serde_json::from_value(serde_json::json!([{
            "type": "constructor",
            "stateMutability": "nonpayable",
            "inputs": [
                { "name": "_owner", "type": "address" },
                { "name": "_supply", "type": "uint256" },
                { "name": "_paused", "type": "bool" },
                { "name": "_currencyKeys", "type": "bytes32[]" }
            ]
        }]))
        .unwrap()
    }

    fn lookup(name: &str) -> Option<Address> {
        (name == "Owner").then_some(OWNER)
    }

    #[test]
    fn test_parse_plan() {
        let plan: DeploymentPlan = toml::from_str(
            r#"
            [[target]]
            name = "SafeDecimalMath"
            library = true

            [[target]]
            name = "ProxysUSD"
            source = "ProxyERC20"
            args = ["@Owner", 100, true, ["0x7355534400000000000000000000000000000000000000000000000000000000"]]
            deps = ["Owner"]
            "#,
        )
        .expect("Plan should parse");

        assert_eq!(plan.targets.len(), 2);
        assert!(plan.targets[0].library);
        assert_eq!(plan.targets[0].source(), "SafeDecimalMath");
        assert_eq!(plan.targets[1].source(), "ProxyERC20");
        assert_eq!(plan.targets[1].args[1], PlanArg::Int(100));
        assert!(matches!(plan.targets[1].args[3], PlanArg::List(_)));
    }

    #[test]
    fn test_coerce_args() {
        let target = PlanTarget {
            name: "ProxysUSD".to_string(),
            source: Some("ProxyERC20".to_string()),
            args: vec![
                PlanArg::Text("@Owner".to_string()),
                PlanArg::Int(100),
                PlanArg::Bool(true),
                PlanArg::List(vec![PlanArg::Text(
                    "0x7355534400000000000000000000000000000000000000000000000000000000"
                        .to_string(),
                )]),
            ],
            deps: vec![],
            library: false,
            skip_resolver: false,
            force: false,
            dry_run: None,
        };

        let args = target.coerce_args(&abi(), lookup).expect("Args should coerce");

        assert_eq!(args[0], DynSolValue::Address(OWNER));
        assert_eq!(args[1], DynSolValue::Uint(U256::from(100), 256));
        assert_eq!(args[2], DynSolValue::Bool(true));
        assert!(matches!(&args[3], DynSolValue::Array(items) if items.len() == 1));
    }

    #[test]
    fn test_unresolved_reference() {
        let err = coerce(
            &PlanArg::Text("@Issuer".to_string()),
            &DynSolType::Address,
            &lookup,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Issuer is not resolved yet"));
    }

    #[test]
    fn test_arity_mismatch() {
        let target = PlanTarget {
            name: "ProxyERC20".to_string(),
            source: None,
            args: vec![PlanArg::Text("@Owner".to_string())],
            deps: vec![],
            library: false,
            skip_resolver: false,
            force: false,
            dry_run: None,
        };
        assert!(target.coerce_args(&abi(), lookup).is_err());
    }
}
