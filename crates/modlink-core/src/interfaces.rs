//! The inter-plugin interface registry.
//!
//! Interfaces are the way independently compiled modules call into each
//! other without static linkage: the owner publishes a named, versioned
//! opaque pointer, consumers discover and acquire it by name, and the
//! registry guarantees every consumer hears about the owner's unload before
//! the pointer dangles. The registry brokers lifetime and visibility only:
//! it never dereferences a payload, and type agreement is the publishing
//! and consuming pair's out-of-band contract per (name, version).

use std::collections::BTreeMap;
use std::ffi::c_void;

use crate::error::PublishError;

/// Identity of a published interface.
///
/// Equality and ordering are on (name, version) only: the owning module is
/// provenance, kept for teardown, and deliberately not part of identity.
/// Two modules claiming the same (name, version) is a publish-time
/// conflict, never a silent overwrite. Ordering is strict lexicographic on
/// (name, then version), which makes it a valid total order for sorted
/// storage.
#[derive(Debug, Clone)]
pub struct InterfaceId {
    pub name: String,
    pub owner: String,
    pub version: u32,
}

impl InterfaceId {
    pub fn new(
        name: impl Into<String>,
        owner: impl Into<String>,
        version: u32,
    ) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
            version,
        }
    }

    /// A comparison probe for lookups where the owner is unknown.
    fn probe(name: &str, version: u32) -> Self {
        Self {
            name: name.to_string(),
            owner: String::new(),
            version,
        }
    }
}

impl PartialEq for InterfaceId {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.version == other.version
    }
}

impl Eq for InterfaceId {}

impl Ord for InterfaceId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name
            .cmp(&other.name)
            .then(self.version.cmp(&other.version))
    }
}

impl PartialOrd for InterfaceId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} v{} (from {})", self.name, self.version, self.owner)
    }
}

/// The brokered payload pointer. Never dereferenced by the host; it is
/// handed out exactly as published and becomes invalid the instant the
/// owning module unloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfacePtr(pub *mut c_void);

// SAFETY: the registry only stores and returns the pointer; whether the
// pointed-to object may be touched from another thread is part of the
// publisher/consumer contract, not the registry's.
unsafe impl Send for InterfacePtr {}
unsafe impl Sync for InterfacePtr {}

/// One published interface: payload plus its consumer set in acquisition
/// order, no duplicates.
#[derive(Debug, Clone)]
pub struct InterfaceRecord {
    pub payload: InterfacePtr,
    pub consumers: Vec<String>,
}

/// A retracted interface together with the consumers that must be notified
/// before the owner's handle is released.
#[derive(Debug)]
pub struct Retraction {
    pub id: InterfaceId,
    pub consumers: Vec<String>,
}

/// The process-wide interface map. Explicitly owned: components receive a
/// reference rather than reaching for a singleton, so tests construct
/// isolated registries.
#[derive(Default)]
pub struct InterfaceRegistry {
    records: BTreeMap<InterfaceId, InterfaceRecord>,
}

impl InterfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish (`name`, `version`) owned by `owner`.
    ///
    /// Fails with [`PublishError::AlreadyExists`] when the identifier is
    /// taken, regardless of who owns the existing record; the registry is
    /// unchanged by a failed call.
    pub fn publish(
        &mut self,
        owner: &str,
        name: &str,
        version: u32,
        payload: InterfacePtr,
    ) -> Result<InterfaceId, PublishError> {
        let id = InterfaceId::new(name, owner, version);
        if self.records.contains_key(&id) {
            return Err(PublishError::AlreadyExists {
                name: name.to_string(),
                version,
            });
        }

        tracing::info!("interface published: {}", id);
        self.records.insert(
            id.clone(),
            InterfaceRecord {
                payload,
                consumers: Vec::new(),
            },
        );
        Ok(id)
    }

    /// Discovery: the owner and ascending version list published under
    /// `name`, or `None` if nothing is. Version-selection policy (exact,
    /// minimum, newest) lives with the caller.
    pub fn list(&self, name: &str) -> Option<(String, Vec<u32>)> {
        let lo = InterfaceId::probe(name, 0);
        let hi = InterfaceId::probe(name, u32::MAX);
        let mut owner = None;
        let mut versions = Vec::new();
        for (id, _) in self.records.range(lo..=hi) {
            owner.get_or_insert_with(|| id.owner.clone());
            versions.push(id.version);
        }
        owner.map(|owner| (owner, versions))
    }

    /// Acquire the exact (`name`, `version`) on behalf of `requester`.
    ///
    /// A hit records the requester as a consumer (idempotently, and never
    /// the owner itself); a miss returns `None` and mutates nothing, since
    /// absence is an expected outcome rather than an error.
    pub fn acquire(
        &mut self,
        requester: &str,
        name: &str,
        version: u32,
    ) -> Option<InterfacePtr> {
        let probe = InterfaceId::probe(name, version);
        let owner = self
            .records
            .get_key_value(&probe)
            .map(|(id, _)| id.owner.clone())?;
        let record = self.records.get_mut(&probe)?;
        if requester != owner && !record.consumers.iter().any(|c| c == requester) {
            record.consumers.push(requester.to_string());
        }
        Some(record.payload)
    }

    /// Remove every record owned by `module`, returning the notification
    /// plan the caller must execute before releasing the owner's handle.
    /// Removal is atomic with respect to the owner's unload: once this
    /// returns, no acquire can hand out a pointer into the dying module.
    pub fn retract(&mut self, module: &str) -> Vec<Retraction> {
        let owned: Vec<InterfaceId> = self
            .records
            .keys()
            .filter(|id| id.owner == module)
            .cloned()
            .collect();

        owned
            .into_iter()
            .filter_map(|id| {
                let record = self.records.remove(&id)?;
                tracing::info!("interface retracted: {}", id);
                Some(Retraction {
                    id,
                    consumers: record.consumers,
                })
            })
            .collect()
    }

    /// Identifiers currently published, in registry order.
    pub fn ids(&self) -> impl Iterator<Item = &InterfaceId> {
        self.records.keys()
    }

    /// The consumer set of the exact (`name`, `version`), in acquisition
    /// order.
    pub fn consumers(&self, name: &str, version: u32) -> Option<&[String]> {
        self.records
            .get(&InterfaceId::probe(name, version))
            .map(|record| record.consumers.as_slice())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
