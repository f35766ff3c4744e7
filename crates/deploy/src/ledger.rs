//! Deployment ledger: what has been deployed where, and with which ABI.

use std::{collections::BTreeMap, path::Path};

use alloy_core::{json_abi::JsonAbi, primitives::Address};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    artifacts::{ArtifactMetadata, CompiledArtifact},
    fs::FsHandler,
};

/// Deployed instance of a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTarget {
    pub name: String,
    pub address: Address,
    /// Artifact the instance was built from. Key into [`Ledger::sources`].
    pub source: String,
    /// Block explorer page of the instance.
    #[serde(default)]
    pub link: String,
    pub timestamp: DateTime<Utc>,
    /// Creation transaction hash, empty when unknown.
    #[serde(default)]
    pub txn: String,
    #[serde(default)]
    pub network: String,
}

/// Artifact as it was when last deployed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSource {
    pub bytecode: String,
    pub abi: JsonAbi,
    /// Verified source record taken from the compiler metadata.
    #[serde(default)]
    pub source: Value,
    #[serde(default)]
    pub metadata: ArtifactMetadata,
}

impl LedgerSource {
    pub fn from_artifact(artifact: &CompiledArtifact) -> Self {
        Self {
            bytecode: artifact.bytecode().to_string(),
            abi: artifact.abi.clone(),
            source: artifact.metadata.primary_source(),
            metadata: artifact.metadata.stripped(),
        }
    }
}

/// A previous deployment of a target, resolved against the ledger sources.
#[derive(Debug, Clone, PartialEq)]
pub struct ExistingDeployment {
    pub address: Address,
    pub source: String,
    /// `None` when the recorded source has no entry in [`Ledger::sources`].
    pub abi: Option<JsonAbi>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    #[serde(default)]
    pub targets: BTreeMap<String, LedgerTarget>,
    #[serde(default)]
    pub sources: BTreeMap<String, LedgerSource>,
}

impl Ledger {
    /// Load a ledger document. A missing file is an empty ledger.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let ledger: Self = FsHandler::read_json_or_default(path)?;
        tracing::debug!(
            path = %path.display(),
            targets = ledger.targets.len(),
            sources = ledger.sources.len(),
            "Ledger loaded"
        );
        Ok(ledger)
    }

    /// Overwrite the ledger document at `path`.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        FsHandler::write_json(path, self)?;
        tracing::debug!(path = %path.display(), "Ledger saved");
        Ok(())
    }

    pub fn contains_target(&self, name: &str) -> bool {
        self.targets.contains_key(name)
    }

    pub fn abi_of(&self, source: &str) -> Option<&JsonAbi> {
        self.sources.get(source).map(|source| &source.abi)
    }

    pub fn existing(&self, name: &str) -> Option<ExistingDeployment> {
        self.targets.get(name).map(|target| ExistingDeployment {
            address: target.address,
            source: target.source.clone(),
            abi: self.abi_of(&target.source).cloned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_core::primitives::address;
    use tempdir::TempDir;

    fn target(name: &str, source: &str) -> LedgerTarget {
        LedgerTarget {
            name: name.to_string(),
            address: address!("0x00000000000000000000000000000000000000aa"),
            source: source.to_string(),
            link: String::new(),
            timestamp: DateTime::parse_from_rfc3339("2021-06-01T12:00:00.000Z")
                .unwrap()
                .with_timezone(&Utc),
            txn: String::new(),
            network: "sepolia".to_string(),
        }
    }

    #[test]
    fn test_existing_without_source_has_no_abi() {
        let mut ledger = Ledger::default();
        ledger
            .targets
            .insert("ProxyERC20".to_string(), target("ProxyERC20", "ProxyERC20"));

        let existing = ledger.existing("ProxyERC20").expect("Target should exist");
        assert_eq!(existing.source, "ProxyERC20");
        assert!(existing.abi.is_none());
        assert!(ledger.existing("Synthetix").is_none());
    }

    #[test]
    fn test_parse_document_with_missing_optional_fields() {
        let ledger: Ledger = serde_json::from_value(serde_json::json!({
            "targets": {
                "Owned": {
                    "name": "Owned",
                    "address": "0x00000000000000000000000000000000000000aa",
                    "source": "Owned",
                    "timestamp": "2021-06-01T12:00:00.000Z"
                }
            },
            "sources": {
                "Owned": { "bytecode": "6080", "abi": [] }
            }
        }))
        .expect("Ledger should parse");

        let existing = ledger.existing("Owned").unwrap();
        assert_eq!(existing.abi, Some(JsonAbi::default()));
        assert_eq!(ledger.targets["Owned"].txn, "");
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new("tarmac-test").expect("Failed to create temp dir");
        let path = temp_dir.path().join("deployment.json");

        let mut ledger = Ledger::default();
        ledger
            .targets
            .insert("Owned".to_string(), target("Owned", "Owned"));
        ledger.save(&path).expect("Failed to save ledger");

        assert_eq!(Ledger::load(&path).expect("Failed to load ledger"), ledger);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let temp_dir = TempDir::new("tarmac-test").expect("Failed to create temp dir");
        let ledger = Ledger::load(&temp_dir.path().join("deployment.json")).unwrap();
        assert!(ledger.targets.is_empty());
        assert!(ledger.sources.is_empty());
    }
}
