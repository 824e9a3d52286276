//! The module registry: one record per loaded module, keyed by the name the
//! module declared for itself, iterated in load order.

use std::collections::HashMap;
use std::path::PathBuf;

use modlink_plugin_sdk::abi::SignalFn;
use serde::Serialize;

use crate::error::LoadError;
use crate::interfaces::InterfaceId;
use crate::loader::ModuleHandle;
use crate::tables::{EventTable, HookTable};

/// Lifecycle state of a loaded module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Loaded,
    /// Teardown has begun: the module is skipped by dispatch and by
    /// interface-unload notification fan-out, and is no longer addressable.
    Unloading,
}

/// One loaded module.
pub struct ModuleRecord {
    /// Unique name, declared by the module itself at assignment time.
    pub name: String,
    /// The path the image was loaded from; reload re-loads from here.
    pub path: PathBuf,
    /// The negotiated API version.
    pub api_version: u32,
    pub hooks: HookTable,
    pub events: EventTable,
    /// Signal-name resolution cache. `None` records a miss so absent
    /// exports are probed at most once.
    pub(crate) signals: HashMap<String, Option<SignalFn>>,
    /// Identifiers this module has published, for retraction at unload.
    pub interfaces: Vec<InterfaceId>,
    pub state: ModuleState,
    /// Owned code image; taken out of the record during unload.
    pub(crate) handle: Option<ModuleHandle>,
}

impl ModuleRecord {
    pub(crate) fn new(
        name: String,
        path: PathBuf,
        api_version: u32,
        hooks: HookTable,
        events: EventTable,
        handle: ModuleHandle,
    ) -> Self {
        Self {
            name,
            path,
            api_version,
            hooks,
            events,
            signals: HashMap::new(),
            interfaces: Vec::new(),
            state: ModuleState::Loaded,
            handle: Some(handle),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.state == ModuleState::Loaded
    }
}

/// Read-only view of one module, for the administrative surface.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ModuleSummary {
    pub name: String,
    pub path: PathBuf,
    pub api_version: u32,
}

/// All loaded modules in load order. Explicitly owned, like
/// [`InterfaceRegistry`](crate::interfaces::InterfaceRegistry); tests build
/// isolated instances.
#[derive(Default)]
pub struct ModuleRegistry {
    // A Vec keeps the deterministic load order that dispatch fan-out and
    // reload both depend on; module counts stay small enough that name
    // lookup does not justify a second index.
    records: Vec<ModuleRecord>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new record, enforcing name uniqueness.
    pub fn insert(&mut self, record: ModuleRecord) -> Result<(), LoadError> {
        if self.contains(&record.name) {
            return Err(LoadError::DuplicateName(record.name));
        }
        self.records.push(record);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.iter().any(|r| r.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&ModuleRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ModuleRecord> {
        self.records.iter_mut().find(|r| r.name == name)
    }

    /// Remove and return a record, preserving the order of the rest.
    pub fn remove(&mut self, name: &str) -> Option<ModuleRecord> {
        let index = self.records.iter().position(|r| r.name == name)?;
        Some(self.records.remove(index))
    }

    /// Module records in load order.
    pub fn iter(&self) -> impl Iterator<Item = &ModuleRecord> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ModuleRecord> {
        self.records.iter_mut()
    }

    /// Names in load order; the stable snapshot dispatch iterates over.
    pub fn names(&self) -> Vec<String> {
        self.records.iter().map(|r| r.name.clone()).collect()
    }

    /// Read-only summaries in load order.
    pub fn summaries(&self) -> Vec<ModuleSummary> {
        self.records
            .iter()
            .map(|r| ModuleSummary {
                name: r.name.clone(),
                path: r.path.clone(),
                api_version: r.api_version,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::{EventTable, HookTable};

    fn record(name: &str) -> ModuleRecord {
        ModuleRecord::new(
            name.to_string(),
            PathBuf::from(format!("/plugins/{name}.so")),
            1,
            HookTable::default(),
            EventTable::default(),
            ModuleHandle::InProcess,
        )
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = ModuleRegistry::new();
        registry.insert(record("alpha")).unwrap();

        let err = registry.insert(record("alpha")).unwrap_err();
        assert!(matches!(err, LoadError::DuplicateName(name) if name == "alpha"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn iteration_keeps_load_order_across_removal() {
        let mut registry = ModuleRegistry::new();
        for name in ["alpha", "beta", "gamma"] {
            registry.insert(record(name)).unwrap();
        }

        registry.remove("beta").unwrap();
        assert_eq!(registry.names(), vec!["alpha", "gamma"]);

        registry.insert(record("delta")).unwrap();
        assert_eq!(registry.names(), vec!["alpha", "gamma", "delta"]);
    }

    #[test]
    fn summaries_expose_name_path_and_version() {
        let mut registry = ModuleRegistry::new();
        registry.insert(record("alpha")).unwrap();

        let summaries = registry.summaries();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].name, "alpha");
        assert_eq!(summaries[0].path, PathBuf::from("/plugins/alpha.so"));
    }

    #[test]
    fn remove_unknown_is_none() {
        let mut registry = ModuleRegistry::new();
        assert!(registry.remove("ghost").is_none());
    }
}
