//! Closed taxonomy of dependency groups.
//!
//! Each group names the runtime event that invalidates code depending on a
//! watched entity through that group.  The set is fixed at build time, so
//! the collector indexes its staging buffer with [`DependencyGroup::index`]
//! instead of hashing.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a compiled artifact must be discarded when a watched entity changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyGroup {
    /// The shape will not transition to another shape.
    ShapeStability,
    /// The shape will not be superseded by a more general one.
    ShapeDeprecation,
    /// The shape owning a field layout keeps owning it.
    FieldOwner,
    /// A constructor's initial shape will not be replaced.
    InitialShape,
    /// A global binding cell keeps its current value.
    GlobalBinding,
    /// An allocation site keeps its pretenuring decision.
    AllocationSiteTenuring,
    /// An allocation site keeps handing out the same shape.
    AllocationSiteTransition,
}

impl DependencyGroup {
    pub const COUNT: usize = 7;

    pub const ALL: [Self; Self::COUNT] = [
        Self::ShapeStability,
        Self::ShapeDeprecation,
        Self::FieldOwner,
        Self::InitialShape,
        Self::GlobalBinding,
        Self::AllocationSiteTenuring,
        Self::AllocationSiteTransition,
    ];

    /// Dense slot for enum-indexed tables.
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ShapeStability => "shape-stability",
            Self::ShapeDeprecation => "shape-deprecation",
            Self::FieldOwner => "field-owner",
            Self::InitialShape => "initial-shape",
            Self::GlobalBinding => "global-binding",
            Self::AllocationSiteTenuring => "allocation-site-tenuring",
            Self::AllocationSiteTransition => "allocation-site-transition",
        }
    }
}

impl fmt::Display for DependencyGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_lists_every_group_in_index_order() {
        assert_eq!(DependencyGroup::ALL.len(), DependencyGroup::COUNT);
        for (slot, group) in DependencyGroup::ALL.iter().enumerate() {
            assert_eq!(group.index(), slot);
        }
    }

    #[test]
    fn names_are_unique() {
        let mut names: Vec<&str> = DependencyGroup::ALL.iter().map(|g| g.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), DependencyGroup::COUNT);
    }

    #[test]
    fn display_matches_as_str() {
        assert_eq!(
            DependencyGroup::GlobalBinding.to_string(),
            "global-binding"
        );
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&DependencyGroup::AllocationSiteTenuring).unwrap();
        assert_eq!(json, "\"allocation_site_tenuring\"");
        let back: DependencyGroup = serde_json::from_str(&json).unwrap();
        assert_eq!(back, DependencyGroup::AllocationSiteTenuring);
    }
}
