//! Deployment manifest: which targets a run should (re)deploy.

use std::{collections::BTreeMap, path::Path};

use derive_more::Deref;
use serde::{Deserialize, Serialize};

use crate::fs::FsHandler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub deploy: bool,
}

/// Per-target deploy flags, keyed by target name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest(BTreeMap<String, ManifestEntry>);

impl Manifest {
    /// Load a manifest document. A missing file is an empty manifest.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let manifest: Self = FsHandler::read_json_or_default(path)?;
        tracing::debug!(path = %path.display(), entries = manifest.len(), "Manifest loaded");
        Ok(manifest)
    }

    /// Overwrite the manifest document at `path`.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        FsHandler::write_json(path, self)?;
        tracing::debug!(path = %path.display(), "Manifest saved");
        Ok(())
    }

    pub fn entry(&self, name: &str) -> Option<ManifestEntry> {
        self.0.get(name).copied()
    }

    pub fn set(&mut self, name: impl Into<String>, deploy: bool) {
        self.0.insert(name.into(), ManifestEntry { deploy });
    }

    /// Flag `name` as already deployed so later runs reuse it.
    pub fn mark_deployed(&mut self, name: &str) {
        self.set(name, false);
    }
}

impl<S: Into<String>> FromIterator<(S, bool)> for Manifest {
    fn from_iter<I: IntoIterator<Item = (S, bool)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, deploy)| (name.into(), ManifestEntry { deploy }))
                .collect(),
        )
    }
}
