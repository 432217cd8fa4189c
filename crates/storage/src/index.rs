//! Container-wide id index
//!
//! Document ids are unique within a container, but documents live in
//! separate partitions behind separate locks. `IdIndex` records which
//! partition-key value owns each id so a write in one partition can see
//! that the id is already taken in another.
//!
//! Lock order: a caller holds the owning partition's write lock while it
//! claims or releases an id here, and never takes a partition lock while
//! holding a DashMap guard from this index.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use partdb_core::PartitionKey;

/// Outcome of [`IdIndex::claim`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// Id was free and now belongs to the claimant
    Claimed,
    /// Id already belonged to the claimant
    AlreadyOwned,
    /// Id belongs to another partition-key value
    OwnedElsewhere(PartitionKey),
}

/// Id → owning partition-key value
#[derive(Debug, Default)]
pub struct IdIndex {
    owners: DashMap<String, PartitionKey>,
}

impl IdIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claim `id` for `key`
    pub fn claim(&self, id: &str, key: &PartitionKey) -> Claim {
        match self.owners.entry(id.to_string()) {
            Entry::Occupied(entry) if entry.get() == key => Claim::AlreadyOwned,
            Entry::Occupied(entry) => Claim::OwnedElsewhere(entry.get().clone()),
            Entry::Vacant(entry) => {
                entry.insert(key.clone());
                Claim::Claimed
            }
        }
    }

    /// Release `id` if it is owned by `key`
    ///
    /// Returns true if the id was released.
    pub fn release(&self, id: &str, key: &PartitionKey) -> bool {
        self.owners.remove_if(id, |_, owner| owner == key).is_some()
    }

    /// Current owner of `id`
    pub fn owner(&self, id: &str) -> Option<PartitionKey> {
        self.owners.get(id).map(|owner| owner.value().clone())
    }

    /// Number of ids
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// True if no ids
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}
