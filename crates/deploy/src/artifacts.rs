//! Compiled artifacts consumed by the orchestrator.

use std::{collections::BTreeMap, path::Path};

use alloy_core::json_abi::JsonAbi;
use anyhow::Context;
use derive_more::Deref;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::fs::FsHandler;

/// Compiler output for one source unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledArtifact {
    pub abi: JsonAbi,
    pub evm: EvmOutput,
    #[serde(default)]
    pub metadata: ArtifactMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmOutput {
    pub bytecode: BytecodeOutput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BytecodeOutput {
    /// Hex creation code. May still hold library placeholders.
    pub object: String,
}

/// Compiler metadata attached to an artifact.
///
/// `output` duplicates the ABI and is dropped before the metadata is recorded in the ledger.
/// Any other member of the compiler metadata is carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default)]
    pub sources: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ArtifactMetadata {
    /// A copy of the metadata without the raw compiler output.
    pub fn stripped(&self) -> Self {
        Self {
            output: None,
            ..self.clone()
        }
    }

    /// The first source record, which holds the verified source text.
    pub fn primary_source(&self) -> Value {
        self.sources.values().next().cloned().unwrap_or(Value::Null)
    }
}

impl CompiledArtifact {
    pub fn bytecode(&self) -> &str {
        &self.evm.bytecode.object
    }
}

/// Artifacts keyed by source name.
#[derive(Debug, Clone, Default, Deref)]
pub struct ArtifactRegistry(BTreeMap<String, CompiledArtifact>);

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `<Name>.json` file of `dir` as the artifact `Name`.
    pub fn load_from_dir(dir: &Path) -> anyhow::Result<Self> {
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read artifact directory {}", dir.display()))?;

        let mut registry = Self::new();
        for entry in entries {
            let path = entry
                .with_context(|| format!("Failed to list {}", dir.display()))?
                .path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            let artifact: CompiledArtifact = FsHandler::read_json(&path)
                .with_context(|| format!("Invalid compiled artifact {}", path.display()))?;
            registry.insert(name, artifact);
        }

        tracing::info!(dir = %dir.display(), count = registry.len(), "Compiled artifacts loaded");

        Ok(registry)
    }

    pub fn insert(&mut self, name: impl Into<String>, artifact: CompiledArtifact) {
        self.0.insert(name.into(), artifact);
    }
}

impl FromIterator<(String, CompiledArtifact)> for ArtifactRegistry {
    fn from_iter<I: IntoIterator<Item = (String, CompiledArtifact)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
