//! Capability discovery and the owner registry for Kickoff.
//!
//! Capabilities are discovered once at startup from a fixed set of sources
//! (the built-in catalog and, optionally, a directory of TOML manifests),
//! validated, and frozen into a [`CapabilityTable`]. Nothing registers a
//! capability at request time.

pub mod builtin;
pub mod hygiene;
pub mod registry;
pub mod source;

pub use builtin::BuiltinSource;
pub use registry::{CapabilityRegistry, CapabilityTable, CapabilityTableBuilder, DEFAULT_MAX_PER_OWNER};
pub use source::{CapabilitySource, Discovered, ManifestSource};

use kickoff_core::error::RegistryError;
use std::path::Path;

/// Build the registry from the built-in catalog (unless disabled) plus an
/// optional manifest directory.
pub fn default_registry(
    builtin: bool,
    manifest_dir: Option<&Path>,
    max_per_owner: usize,
) -> Result<CapabilityRegistry, RegistryError> {
    let manifests = manifest_dir.map(ManifestSource::new);
    let mut sources: Vec<&dyn CapabilitySource> = Vec::new();
    if builtin {
        sources.push(&BuiltinSource);
    }
    if let Some(manifests) = &manifests {
        sources.push(manifests);
    }
    CapabilityRegistry::from_sources(&sources, max_per_owner)
}
