//! Published version history of a network.

use std::{collections::BTreeMap, path::Path};

use alloy_core::primitives::Address;
use derive_more::Deref;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::fs::FsHandler;

/// One published address of a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    pub address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Addresses of every released contract, oldest first, keyed by contract name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionHistory(BTreeMap<String, Vec<VersionEntry>>);

impl VersionHistory {
    /// Load a version history document. A missing file is an empty history.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let history: Self = FsHandler::read_json_or_default(path)?;
        tracing::debug!(
            path = %path.display(),
            contracts = history.len(),
            "Version history loaded"
        );
        Ok(history)
    }

    /// Most recent published entry of `contract`.
    pub fn latest(&self, contract: &str) -> Option<&VersionEntry> {
        self.0.get(contract).and_then(|entries| entries.last())
    }
}

impl FromIterator<(String, Vec<VersionEntry>)> for VersionHistory {
    fn from_iter<I: IntoIterator<Item = (String, Vec<VersionEntry>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_core::primitives::address;

    #[test]
    fn test_latest_is_last_entry() {
        let history: VersionHistory = serde_json::from_value(serde_json::json!({
            "Synthetix": [
                { "address": "0x00000000000000000000000000000000000000a1", "tag": "v2.0.0" },
                { "address": "0x00000000000000000000000000000000000000a2", "tag": "v2.1.0", "commit": "abc" }
            ]
        }))
        .expect("History should parse");

        let latest = history.latest("Synthetix").expect("Synthetix has versions");
        assert_eq!(
            latest.address,
            address!("0x00000000000000000000000000000000000000a2")
        );
        assert_eq!(latest.tag.as_deref(), Some("v2.1.0"));
        assert_eq!(latest.extra.get("commit"), Some(&Value::from("abc")));
        assert!(history.latest("Issuer").is_none());
    }

    #[test]
    fn test_missing_file_is_empty() {
        let temp_dir = tempdir::TempDir::new("tarmac-test").expect("Failed to create temp dir");
        let history = VersionHistory::load(&temp_dir.path().join("versions.json")).unwrap();
        assert!(history.is_empty());
    }
}
