//! Persistent per-entity invalidation lists and the get/set adaptor.
//!
//! An [`InvalidationList`] outlives every collector: unrelated compilations
//! append to the same entity's list over the entity's lifetime.  All
//! linkage goes through [`link_dependent_code`], which appends to an
//! existing list or installs a fresh one and never drops entries that an
//! earlier commit linked.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactId;
use crate::dependency_group::DependencyGroup;
use crate::entity::WatchedEntity;

// ---------------------------------------------------------------------------
// InvalidationList
// ---------------------------------------------------------------------------

/// Artifacts depending on one entity, grouped by invalidation trigger.
///
/// Repeated links of the same artifact under the same group are kept as
/// separate entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationList {
    groups: BTreeMap<DependencyGroup, Vec<ArtifactId>>,
}

impl InvalidationList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `(group, artifact)`.
    pub fn insert(&mut self, group: DependencyGroup, artifact: ArtifactId) {
        self.groups.entry(group).or_default().push(artifact);
    }

    /// Artifacts linked under `group`, in link order.
    pub fn dependents(&self, group: DependencyGroup) -> &[ArtifactId] {
        self.groups.get(&group).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn count(&self, group: DependencyGroup) -> usize {
        self.dependents(group).len()
    }

    pub fn contains(&self, group: DependencyGroup, artifact: ArtifactId) -> bool {
        self.dependents(group).contains(&artifact)
    }

    /// Total entries across all groups.
    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Groups with at least one entry, in `DependencyGroup` order.
    pub fn groups(&self) -> impl Iterator<Item = DependencyGroup> + '_ {
        self.groups
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(group, _)| *group)
    }
}

// ---------------------------------------------------------------------------
// DependentCodeStore: get/set adaptor over entity-owned lists
// ---------------------------------------------------------------------------

/// Storage for the invalidation lists attached to watched entities.
///
/// The object model owns the lists; the collector only reaches them through
/// this trait.
pub trait DependentCodeStore {
    /// Get: the list attached to `entity`, if one was ever installed.
    fn dependent_code(&self, entity: WatchedEntity) -> Option<&InvalidationList>;

    fn dependent_code_mut(&mut self, entity: WatchedEntity) -> Option<&mut InvalidationList>;

    /// Set: attach `list` to `entity`, replacing any previous list.
    fn set_dependent_code(&mut self, entity: WatchedEntity, list: InvalidationList);
}

impl DependentCodeStore for BTreeMap<WatchedEntity, InvalidationList> {
    fn dependent_code(&self, entity: WatchedEntity) -> Option<&InvalidationList> {
        self.get(&entity)
    }

    fn dependent_code_mut(&mut self, entity: WatchedEntity) -> Option<&mut InvalidationList> {
        self.get_mut(&entity)
    }

    fn set_dependent_code(&mut self, entity: WatchedEntity, list: InvalidationList) {
        self.insert(entity, list);
    }
}

/// Append `(group, artifact)` to `entity`'s list, creating the list on
/// first use.
pub fn link_dependent_code<S: DependentCodeStore + ?Sized>(
    store: &mut S,
    entity: WatchedEntity,
    group: DependencyGroup,
    artifact: ArtifactId,
) {
    if let Some(list) = store.dependent_code_mut(entity) {
        list.insert(group, artifact);
        return;
    }
    let mut list = InvalidationList::new();
    list.insert(group, artifact);
    store.set_dependent_code(entity, list);
}
