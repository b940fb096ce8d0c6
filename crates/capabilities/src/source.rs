//! Capability sources: the known locations scanned at startup.

use kickoff_core::capability::{CapabilityDescriptor, CapabilityOwner};
use kickoff_core::error::RegistryError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Everything one source contributes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Discovered {
    #[serde(default)]
    pub owners: Vec<CapabilityOwner>,

    #[serde(default)]
    pub capabilities: Vec<CapabilityDescriptor>,
}

/// A location capability definitions are discovered from.
pub trait CapabilitySource: Send + Sync {
    fn name(&self) -> &str;

    fn discover(&self) -> Result<Discovered, RegistryError>;
}

/// Loads `*.toml` manifests from a directory, in file-name order.
///
/// ```toml
/// [[owners]]
/// id = "kit_manager"
/// purpose = "Kit sizes and orders"
///
/// [[capabilities]]
/// name = "list-kit-orders"
/// owner = "kit_manager"
/// side_effect = "read"
///
/// [[capabilities.parameters]]
/// name = "team_scope_id"
/// type = "string"
/// context_key = "team_scope_id"
/// ```
pub struct ManifestSource {
    dir: PathBuf,
    label: String,
}

impl ManifestSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let label = format!("manifests:{}", dir.display());
        Self { dir, label }
    }

    fn parse_file(&self, path: &Path) -> Result<Discovered, RegistryError> {
        let content = std::fs::read_to_string(path).map_err(|e| self.error(path, e.to_string()))?;
        toml::from_str(&content).map_err(|e| self.error(path, e.to_string()))
    }

    fn error(&self, path: &Path, reason: String) -> RegistryError {
        RegistryError::Discovery {
            source_name: self.label.clone(),
            reason: format!("{}: {reason}", path.display()),
        }
    }
}

impl CapabilitySource for ManifestSource {
    fn name(&self) -> &str {
        &self.label
    }

    fn discover(&self) -> Result<Discovered, RegistryError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| self.error(&self.dir, e.to_string()))?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry.path()),
                Err(e) => {
                    warn!(dir = %self.dir.display(), error = %e, "Skipping unreadable manifest entry");
                    None
                }
            })
            .filter(|p| p.extension().is_some_and(|ext| ext == "toml"))
            .collect();
        paths.sort();

        let mut merged = Discovered::default();
        for path in paths {
            let discovered = self.parse_file(&path)?;
            debug!(
                file = %path.display(),
                capabilities = discovered.capabilities.len(),
                "Loaded capability manifest"
            );
            merged.owners.extend(discovered.owners);
            merged.capabilities.extend(discovered.capabilities);
        }
        Ok(merged)
    }
}
