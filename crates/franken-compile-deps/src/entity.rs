//! Typed, non-owning handles to watched heap entities.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// Shape descriptor (hidden class) in the object model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ShapeId(pub u32);

/// Object instance on the managed heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectHandle(pub u32);

/// Global/property binding cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellId(pub u32);

/// Allocation-site record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AllocationSiteId(pub u32);

/// Execution context (a native/global context owns global bindings and
/// the primitive wrapper constructors).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContextId(pub u32);

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shape#{}", self.0)
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell#{}", self.0)
    }
}

impl fmt::Display for AllocationSiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "site#{}", self.0)
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "context#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// WatchedEntity
// ---------------------------------------------------------------------------

/// A heap entity whose mutation can invalidate compiled code.
///
/// Equality is handle identity: two distinct shapes with identical layouts
/// are different entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum WatchedEntity {
    Shape(ShapeId),
    Object(ObjectHandle),
    BindingCell(CellId),
    AllocationSite(AllocationSiteId),
    Context(ContextId),
}

impl fmt::Display for WatchedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shape(id) => fmt::Display::fmt(id, f),
            Self::Object(id) => fmt::Display::fmt(id, f),
            Self::BindingCell(id) => fmt::Display::fmt(id, f),
            Self::AllocationSite(id) => fmt::Display::fmt(id, f),
            Self::Context(id) => fmt::Display::fmt(id, f),
        }
    }
}

impl From<ShapeId> for WatchedEntity {
    fn from(id: ShapeId) -> Self {
        Self::Shape(id)
    }
}

impl From<ObjectHandle> for WatchedEntity {
    fn from(id: ObjectHandle) -> Self {
        Self::Object(id)
    }
}

impl From<CellId> for WatchedEntity {
    fn from(id: CellId) -> Self {
        Self::BindingCell(id)
    }
}

impl From<AllocationSiteId> for WatchedEntity {
    fn from(id: AllocationSiteId) -> Self {
        Self::AllocationSite(id)
    }
}

impl From<ContextId> for WatchedEntity {
    fn from(id: ContextId) -> Self {
        Self::Context(id)
    }
}
