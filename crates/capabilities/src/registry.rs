//! The capability registry.
//!
//! A [`CapabilityTableBuilder`] collects descriptors and owners during
//! discovery and validates them into an immutable [`CapabilityTable`].
//! The [`CapabilityRegistry`] hands out snapshots of the current table; a
//! later discovery pass replaces the whole table at once, so a request
//! never observes a half-built table.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock};

use kickoff_core::capability::{CapabilityDescriptor, CapabilityOwner, ResultShape};
use kickoff_core::error::RegistryError;
use tracing::{debug, info};

use crate::hygiene;
use crate::source::CapabilitySource;

/// Default bound on the number of capabilities one owner may hold.
pub const DEFAULT_MAX_PER_OWNER: usize = 16;

/// Mutable collection phase. Only exists at startup or during rediscovery.
pub struct CapabilityTableBuilder {
    descriptors: Vec<CapabilityDescriptor>,
    names: HashSet<String>,
    owners: Vec<CapabilityOwner>,
    max_per_owner: usize,
}

impl CapabilityTableBuilder {
    pub fn new() -> Self {
        Self {
            descriptors: Vec::new(),
            names: HashSet::new(),
            owners: Vec::new(),
            max_per_owner: DEFAULT_MAX_PER_OWNER,
        }
    }

    pub fn with_max_per_owner(mut self, max: usize) -> Self {
        self.max_per_owner = max;
        self
    }

    /// Register a descriptor. Name collisions are rejected.
    pub fn register(&mut self, descriptor: CapabilityDescriptor) -> Result<(), RegistryError> {
        if !self.names.insert(descriptor.name.clone()) {
            return Err(RegistryError::DuplicateCapability(descriptor.name));
        }
        self.descriptors.push(descriptor);
        Ok(())
    }

    /// Declare a capability owner.
    pub fn add_owner(&mut self, owner: CapabilityOwner) -> Result<(), RegistryError> {
        if self.owners.iter().any(|o| o.id == owner.id) {
            return Err(RegistryError::DuplicateOwner(owner.id));
        }
        self.owners.push(owner);
        Ok(())
    }

    /// Pull everything a source offers into the builder.
    pub fn absorb(&mut self, source: &dyn CapabilitySource) -> Result<(), RegistryError> {
        let discovered = source.discover()?;
        debug!(
            source = source.name(),
            capabilities = discovered.capabilities.len(),
            owners = discovered.owners.len(),
            "Discovered capabilities"
        );
        for owner in discovered.owners {
            self.add_owner(owner)?;
        }
        for descriptor in discovered.capabilities {
            self.register(descriptor)?;
        }
        Ok(())
    }

    /// Validate and freeze.
    pub fn build(self) -> Result<CapabilityTable, RegistryError> {
        for descriptor in &self.descriptors {
            hygiene::check(descriptor)?;
            if !self.owners.iter().any(|o| o.id == descriptor.owner) {
                return Err(RegistryError::UnknownOwner {
                    capability: descriptor.name.clone(),
                    owner: descriptor.owner.clone(),
                });
            }
        }

        let descriptors: HashMap<String, Arc<CapabilityDescriptor>> = self
            .descriptors
            .iter()
            .map(|d| (d.name.clone(), Arc::new(d.clone())))
            .collect();

        let mut owners = BTreeMap::new();
        for owner in self.owners {
            let mut members: Vec<Arc<CapabilityDescriptor>> = self
                .descriptors
                .iter()
                .filter(|d| d.owner == owner.id)
                .filter_map(|d| descriptors.get(&d.name).cloned())
                .collect();

            for name in &owner.capabilities {
                let descriptor = descriptors
                    .get(name)
                    .cloned()
                    .ok_or_else(|| RegistryError::UnknownCapability(name.clone()))?;
                if descriptor.is_mutating() && descriptor.owner != owner.id {
                    return Err(RegistryError::OwnershipViolation {
                        capability: name.clone(),
                        owner: descriptor.owner.clone(),
                        listed_under: owner.id.clone(),
                    });
                }
                if !members.iter().any(|m| m.name == descriptor.name) {
                    members.push(descriptor);
                }
            }

            if members.len() > self.max_per_owner {
                return Err(RegistryError::OwnerTooLarge {
                    owner: owner.id.clone(),
                    count: members.len(),
                    max: self.max_per_owner,
                });
            }

            owners.insert(owner.id.clone(), OwnerEntry { owner, members });
        }

        Ok(CapabilityTable {
            descriptors,
            owners,
        })
    }
}

impl Default for CapabilityTableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

struct OwnerEntry {
    owner: CapabilityOwner,
    members: Vec<Arc<CapabilityDescriptor>>,
}

/// A validated, immutable capability table.
pub struct CapabilityTable {
    descriptors: HashMap<String, Arc<CapabilityDescriptor>>,
    owners: BTreeMap<String, OwnerEntry>,
}

impl CapabilityTable {
    /// An empty table (no capabilities, no owners).
    pub fn empty() -> Self {
        Self {
            descriptors: HashMap::new(),
            owners: BTreeMap::new(),
        }
    }

    /// The capabilities an owner may invoke. Unknown owners get an empty list.
    pub fn get_capabilities_for(&self, owner: &str) -> Vec<Arc<CapabilityDescriptor>> {
        self.owners
            .get(owner)
            .map(|entry| entry.members.clone())
            .unwrap_or_default()
    }

    /// Look up a descriptor by name.
    pub fn resolve(&self, name: &str) -> Result<Arc<CapabilityDescriptor>, RegistryError> {
        self.descriptors
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownCapability(name.to_string()))
    }

    pub fn owner(&self, id: &str) -> Option<&CapabilityOwner> {
        self.owners.get(id).map(|entry| &entry.owner)
    }

    pub fn has_owner(&self, id: &str) -> bool {
        self.owners.contains_key(id)
    }

    /// Owners in id order.
    pub fn owners(&self) -> impl Iterator<Item = &CapabilityOwner> {
        self.owners.values().map(|entry| &entry.owner)
    }

    /// The result shape of a capability, if it declares one.
    pub fn result_shape(&self, name: &str) -> Option<&ResultShape> {
        self.descriptors.get(name).and_then(|d| d.result.as_ref())
    }

    /// All capability names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.descriptors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Read-mostly holder of the current capability table.
pub struct CapabilityRegistry {
    table: RwLock<Arc<CapabilityTable>>,
}

impl CapabilityRegistry {
    pub fn new(table: CapabilityTable) -> Self {
        Self {
            table: RwLock::new(Arc::new(table)),
        }
    }

    /// Run discovery over `sources` and build a validated table.
    pub fn discover(
        sources: &[&dyn CapabilitySource],
        max_per_owner: usize,
    ) -> Result<CapabilityTable, RegistryError> {
        let mut builder = CapabilityTableBuilder::new().with_max_per_owner(max_per_owner);
        for source in sources {
            builder.absorb(*source)?;
        }
        let table = builder.build()?;
        info!(
            capabilities = table.len(),
            owners = table.owners.len(),
            "Capability table built"
        );
        Ok(table)
    }

    /// Build a registry from a discovery pass.
    pub fn from_sources(
        sources: &[&dyn CapabilitySource],
        max_per_owner: usize,
    ) -> Result<Self, RegistryError> {
        Ok(Self::new(Self::discover(sources, max_per_owner)?))
    }

    /// The current table. Holders keep a consistent view even across a swap.
    pub fn snapshot(&self) -> Arc<CapabilityTable> {
        self.table
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replace the whole table atomically.
    pub fn replace(&self, table: CapabilityTable) {
        *self
            .table
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Arc::new(table);
        info!("Capability table replaced");
    }

    /// Rediscover and swap. On error the current table stays in place.
    pub fn rediscover(
        &self,
        sources: &[&dyn CapabilitySource],
        max_per_owner: usize,
    ) -> Result<(), RegistryError> {
        let table = Self::discover(sources, max_per_owner)?;
        self.replace(table);
        Ok(())
    }

    pub fn get_capabilities_for(&self, owner: &str) -> Vec<Arc<CapabilityDescriptor>> {
        self.snapshot().get_capabilities_for(owner)
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<CapabilityDescriptor>, RegistryError> {
        self.snapshot().resolve(name)
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new(CapabilityTable::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::BuiltinSource;
    use kickoff_core::capability::{ParamType, ParameterSpec};

    fn scoped_read(name: &str, owner: &str) -> CapabilityDescriptor {
        CapabilityDescriptor::read(name, owner)
            .param(ParameterSpec::context("team_scope_id", ParamType::String))
    }

    fn scoped_write(name: &str, owner: &str) -> CapabilityDescriptor {
        CapabilityDescriptor::write(name, owner)
            .param(ParameterSpec::context("team_scope_id", ParamType::String))
    }

    #[test]
    fn register_rejects_duplicate_name() {
        let mut builder = CapabilityTableBuilder::new();
        builder.register(scoped_read("get-self-status", "a")).unwrap();
        let err = builder.register(scoped_read("get-self-status", "b")).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateCapability("get-self-status".into()));
    }

    #[test]
    fn unknown_owner_yields_empty_list() {
        let table = CapabilityTable::empty();
        assert!(table.get_capabilities_for("nobody").is_empty());
    }

    #[test]
    fn resolve_unknown_capability_fails() {
        let table = CapabilityTable::empty();
        assert!(matches!(
            table.resolve("teleport"),
            Err(RegistryError::UnknownCapability(_))
        ));
    }

    #[test]
    fn descriptor_referencing_missing_owner_fails_build() {
        let mut builder = CapabilityTableBuilder::new();
        builder.register(scoped_read("list-matches", "ghost")).unwrap();
        assert!(matches!(
            builder.build(),
            Err(RegistryError::UnknownOwner { .. })
        ));
    }

    #[test]
    fn shared_read_appears_under_both_owners() {
        let mut builder = CapabilityTableBuilder::new();
        builder
            .add_owner(CapabilityOwner::new("players", "p"))
            .unwrap();
        builder
            .add_owner(CapabilityOwner::new("fallback", "f").sharing(&["list-active-players"]))
            .unwrap();
        builder.register(scoped_read("list-active-players", "players")).unwrap();

        let table = builder.build().unwrap();
        assert_eq!(table.get_capabilities_for("players").len(), 1);
        assert_eq!(table.get_capabilities_for("fallback").len(), 1);
    }

    #[test]
    fn shared_write_is_an_ownership_violation() {
        let mut builder = CapabilityTableBuilder::new();
        builder.add_owner(CapabilityOwner::new("admin", "a")).unwrap();
        builder
            .add_owner(CapabilityOwner::new("fallback", "f").sharing(&["assign-role"]))
            .unwrap();
        builder.register(scoped_write("assign-role", "admin")).unwrap();

        match builder.build() {
            Err(RegistryError::OwnershipViolation {
                capability,
                listed_under,
                ..
            }) => {
                assert_eq!(capability, "assign-role");
                assert_eq!(listed_under, "fallback");
            }
            other => panic!("Expected ownership violation, got {:?}", other.err()),
        }
    }

    #[test]
    fn listing_unknown_capability_fails_build() {
        let mut builder = CapabilityTableBuilder::new();
        builder
            .add_owner(CapabilityOwner::new("fallback", "f").sharing(&["nope"]))
            .unwrap();
        assert!(matches!(
            builder.build(),
            Err(RegistryError::UnknownCapability(_))
        ));
    }

    #[test]
    fn owner_size_is_bounded() {
        let mut builder = CapabilityTableBuilder::new().with_max_per_owner(2);
        builder.add_owner(CapabilityOwner::new("big", "b")).unwrap();
        for name in ["a-one", "a-two", "a-three"] {
            builder.register(scoped_read(name, "big")).unwrap();
        }
        assert!(matches!(
            builder.build(),
            Err(RegistryError::OwnerTooLarge { count: 3, max: 2, .. })
        ));
    }

    #[test]
    fn hygiene_runs_at_build() {
        let mut builder = CapabilityTableBuilder::new();
        builder.add_owner(CapabilityOwner::new("o", "o")).unwrap();
        builder
            .register(CapabilityDescriptor::read("unscoped", "o"))
            .unwrap();
        assert!(matches!(
            builder.build(),
            Err(RegistryError::ParameterHygiene { .. })
        ));
    }

    #[test]
    fn replace_swaps_whole_table() {
        let registry = CapabilityRegistry::default();
        let before = registry.snapshot();
        assert!(before.is_empty());

        registry
            .rediscover(&[&BuiltinSource], DEFAULT_MAX_PER_OWNER)
            .unwrap();

        // The old snapshot is untouched; new readers see the new table.
        assert!(before.is_empty());
        assert!(!registry.snapshot().is_empty());
        assert!(registry.resolve("get-self-status").is_ok());
    }

    #[test]
    fn failed_rediscovery_keeps_current_table() {
        struct Broken;
        impl CapabilitySource for Broken {
            fn name(&self) -> &str {
                "broken"
            }
            fn discover(&self) -> Result<crate::source::Discovered, RegistryError> {
                Err(RegistryError::Discovery {
                    source_name: "broken".into(),
                    reason: "unreadable".into(),
                })
            }
        }

        let registry =
            CapabilityRegistry::from_sources(&[&BuiltinSource], DEFAULT_MAX_PER_OWNER).unwrap();
        let count = registry.snapshot().len();
        assert!(registry.rediscover(&[&Broken], DEFAULT_MAX_PER_OWNER).is_err());
        assert_eq!(registry.snapshot().len(), count);
    }
}
