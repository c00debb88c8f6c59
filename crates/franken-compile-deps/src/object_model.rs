//! Object-model interface consumed by the collector, plus an in-memory heap.
//!
//! The collector never decides whether an assumption holds; it only asks
//! the object model for shapes and prototype links while expanding
//! prototype-chain assumptions.  [`ObjectModel`] is that query surface.
//!
//! [`ShapeHeap`] is a compact arena-backed model of shapes, objects,
//! binding cells, allocation sites and contexts.  It implements both
//! [`ObjectModel`] and [`DependentCodeStore`], so it can stand in for the
//! engine heap when driving the collector end to end.
//!
//! `BTreeMap` for deterministic ordering.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactId;
use crate::dependency_group::DependencyGroup;
use crate::entity::{AllocationSiteId, CellId, ContextId, ObjectHandle, ShapeId, WatchedEntity};
use crate::invalidation_list::{DependentCodeStore, InvalidationList};

// ---------------------------------------------------------------------------
// HeapError
// ---------------------------------------------------------------------------

/// Errors from object-model queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeapError {
    ObjectNotFound(ObjectHandle),
    ShapeNotFound(ShapeId),
    ContextNotFound(ContextId),
    CellNotFound(CellId),
    AllocationSiteNotFound(AllocationSiteId),
    /// Every `u32` handle of this arena is already in use.
    HandleSpaceExhausted(Arena),
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ObjectNotFound(h) => write!(f, "{h} not found"),
            Self::ShapeNotFound(s) => write!(f, "{s} not found"),
            Self::ContextNotFound(c) => write!(f, "{c} not found"),
            Self::CellNotFound(c) => write!(f, "{c} not found"),
            Self::AllocationSiteNotFound(s) => write!(f, "{s} not found"),
            Self::HandleSpaceExhausted(arena) => write!(f, "{arena} handle space exhausted"),
        }
    }
}

impl std::error::Error for HeapError {}

/// Handle arenas of a [`ShapeHeap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arena {
    Shapes,
    Objects,
    Cells,
    Sites,
    Contexts,
}

impl fmt::Display for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Shapes => "shape",
            Self::Objects => "object",
            Self::Cells => "cell",
            Self::Sites => "site",
            Self::Contexts => "context",
        };
        f.write_str(name)
    }
}

/// Handle for the next slot of an arena currently holding `len` records.
fn next_handle(len: usize, arena: Arena) -> Result<u32, HeapError> {
    u32::try_from(len).map_err(|_| HeapError::HandleSpaceExhausted(arena))
}

// ---------------------------------------------------------------------------
// PrimitiveKind
// ---------------------------------------------------------------------------

/// Primitive receiver kinds that are boxed through a wrapper constructor
/// before property lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    Number,
    String,
    Boolean,
    Symbol,
    BigInt,
}

// ---------------------------------------------------------------------------
// ObjectModel query surface
// ---------------------------------------------------------------------------

/// Read-only object-model queries.
pub trait ObjectModel {
    /// Current shape of `object`.
    fn shape_of(&self, object: ObjectHandle) -> Result<ShapeId, HeapError>;

    /// `[[Prototype]]` recorded on `shape` (`None` at chain end).
    fn prototype_of(&self, shape: ShapeId) -> Result<Option<ObjectHandle>, HeapError>;

    fn is_shape_stable(&self, shape: ShapeId) -> Result<bool, HeapError>;

    fn is_shape_deprecated(&self, shape: ShapeId) -> Result<bool, HeapError>;

    /// Shape used for property lookup on a receiver of `shape`.
    ///
    /// Primitive shapes resolve to the initial shape of the wrapper
    /// constructor registered in `context` (implicit ToObject); every
    /// other shape resolves to itself.
    fn receiver_shape(&self, context: ContextId, shape: ShapeId) -> Result<ShapeId, HeapError>;
}

// ---------------------------------------------------------------------------
// Heap records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeRecord {
    pub prototype: Option<ObjectHandle>,
    pub stable: bool,
    pub deprecated: bool,
    /// Set for shapes describing primitive values.
    pub primitive: Option<PrimitiveKind>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub shape: ShapeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingCellRecord {
    pub context: ContextId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationSiteRecord {
    pub tenured: bool,
    /// Shape that new allocations from this site currently receive.
    pub transition_shape: Option<ShapeId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextRecord {
    pub bindings: BTreeMap<String, CellId>,
    pub wrapper_shapes: BTreeMap<PrimitiveKind, ShapeId>,
}

// ---------------------------------------------------------------------------
// ShapeHeap
// ---------------------------------------------------------------------------

/// In-memory object model.
#[derive(Debug, Clone, Default)]
pub struct ShapeHeap {
    shapes: Vec<ShapeRecord>,
    objects: Vec<ObjectRecord>,
    cells: Vec<BindingCellRecord>,
    sites: Vec<AllocationSiteRecord>,
    contexts: Vec<ContextRecord>,
    dependent_code: BTreeMap<WatchedEntity, InvalidationList>,
}

impl ShapeHeap {
    pub fn new() -> Self {
        Self::default()
    }

    // -- allocation ---------------------------------------------------------

    /// Allocate a stable, non-deprecated shape with the given prototype.
    pub fn alloc_shape(&mut self, prototype: Option<ObjectHandle>) -> Result<ShapeId, HeapError> {
        let id = ShapeId(next_handle(self.shapes.len(), Arena::Shapes)?);
        self.shapes.push(ShapeRecord {
            prototype,
            stable: true,
            deprecated: false,
            primitive: None,
        });
        Ok(id)
    }

    /// Allocate a shape describing primitive values of `kind`.
    pub fn alloc_primitive_shape(&mut self, kind: PrimitiveKind) -> Result<ShapeId, HeapError> {
        let id = self.alloc_shape(None)?;
        self.shape_mut(id)?.primitive = Some(kind);
        Ok(id)
    }

    pub fn alloc_object(&mut self, shape: ShapeId) -> Result<ObjectHandle, HeapError> {
        self.shape(shape)?;
        let handle = ObjectHandle(next_handle(self.objects.len(), Arena::Objects)?);
        self.objects.push(ObjectRecord { shape });
        Ok(handle)
    }

    /// Allocate a fresh shape whose prototype is `prototype`, and an object
    /// of that shape.
    pub fn alloc_object_with_prototype(
        &mut self,
        prototype: Option<ObjectHandle>,
    ) -> Result<ObjectHandle, HeapError> {
        let shape = self.alloc_shape(prototype)?;
        self.alloc_object(shape)
    }

    pub fn alloc_context(&mut self) -> Result<ContextId, HeapError> {
        let id = ContextId(next_handle(self.contexts.len(), Arena::Contexts)?);
        self.contexts.push(ContextRecord::default());
        Ok(id)
    }

    /// Define (or look up) the global binding `name` in `context`.
    pub fn define_global(
        &mut self,
        context: ContextId,
        name: impl Into<String>,
    ) -> Result<CellId, HeapError> {
        let name = name.into();
        if let Some(cell) = self.context(context)?.bindings.get(&name) {
            return Ok(*cell);
        }
        let cell = CellId(next_handle(self.cells.len(), Arena::Cells)?);
        self.cells.push(BindingCellRecord {
            context,
            name: name.clone(),
        });
        self.context_mut(context)?.bindings.insert(name, cell);
        Ok(cell)
    }

    pub fn global_binding(
        &self,
        context: ContextId,
        name: &str,
    ) -> Result<Option<CellId>, HeapError> {
        Ok(self.context(context)?.bindings.get(name).copied())
    }

    /// Register the wrapper constructor's initial shape for primitives of
    /// `kind` in `context`.
    pub fn set_wrapper_shape(
        &mut self,
        context: ContextId,
        kind: PrimitiveKind,
        shape: ShapeId,
    ) -> Result<(), HeapError> {
        self.shape(shape)?;
        self.context_mut(context)?.wrapper_shapes.insert(kind, shape);
        Ok(())
    }

    pub fn alloc_site(
        &mut self,
        tenured: bool,
        transition_shape: Option<ShapeId>,
    ) -> Result<AllocationSiteId, HeapError> {
        let id = AllocationSiteId(next_handle(self.sites.len(), Arena::Sites)?);
        self.sites.push(AllocationSiteRecord {
            tenured,
            transition_shape,
        });
        Ok(id)
    }

    // -- record access ------------------------------------------------------

    pub fn shape(&self, shape: ShapeId) -> Result<&ShapeRecord, HeapError> {
        self.shapes
            .get(shape.0 as usize)
            .ok_or(HeapError::ShapeNotFound(shape))
    }

    fn shape_mut(&mut self, shape: ShapeId) -> Result<&mut ShapeRecord, HeapError> {
        self.shapes
            .get_mut(shape.0 as usize)
            .ok_or(HeapError::ShapeNotFound(shape))
    }

    pub fn object(&self, object: ObjectHandle) -> Result<&ObjectRecord, HeapError> {
        self.objects
            .get(object.0 as usize)
            .ok_or(HeapError::ObjectNotFound(object))
    }

    pub fn cell(&self, cell: CellId) -> Result<&BindingCellRecord, HeapError> {
        self.cells
            .get(cell.0 as usize)
            .ok_or(HeapError::CellNotFound(cell))
    }

    pub fn site(&self, site: AllocationSiteId) -> Result<&AllocationSiteRecord, HeapError> {
        self.sites
            .get(site.0 as usize)
            .ok_or(HeapError::AllocationSiteNotFound(site))
    }

    pub fn context(&self, context: ContextId) -> Result<&ContextRecord, HeapError> {
        self.contexts
            .get(context.0 as usize)
            .ok_or(HeapError::ContextNotFound(context))
    }

    fn context_mut(&mut self, context: ContextId) -> Result<&mut ContextRecord, HeapError> {
        self.contexts
            .get_mut(context.0 as usize)
            .ok_or(HeapError::ContextNotFound(context))
    }

    // -- mutation -----------------------------------------------------------

    /// Record that a transition away from `shape` has been observed.
    pub fn mark_unstable(&mut self, shape: ShapeId) -> Result<(), HeapError> {
        self.shape_mut(shape)?.stable = false;
        Ok(())
    }

    pub fn deprecate(&mut self, shape: ShapeId) -> Result<(), HeapError> {
        let record = self.shape_mut(shape)?;
        record.deprecated = true;
        record.stable = false;
        Ok(())
    }

    /// Re-point the prototype of `shape`.
    pub fn set_prototype(
        &mut self,
        shape: ShapeId,
        prototype: Option<ObjectHandle>,
    ) -> Result<(), HeapError> {
        if let Some(proto) = prototype {
            self.object(proto)?;
        }
        self.shape_mut(shape)?.prototype = prototype;
        Ok(())
    }

    // -- dependent code -----------------------------------------------------

    /// Artifacts linked to `entity` under `group`.
    pub fn dependents(
        &self,
        entity: impl Into<WatchedEntity>,
        group: DependencyGroup,
    ) -> &[ArtifactId] {
        self.dependent_code
            .get(&entity.into())
            .map(|list| list.dependents(group))
            .unwrap_or(&[])
    }

    /// Total invalidation-list entries across every entity.
    pub fn dependent_code_len(&self) -> usize {
        self.dependent_code.values().map(InvalidationList::len).sum()
    }
}

impl ObjectModel for ShapeHeap {
    fn shape_of(&self, object: ObjectHandle) -> Result<ShapeId, HeapError> {
        Ok(self.object(object)?.shape)
    }

    fn prototype_of(&self, shape: ShapeId) -> Result<Option<ObjectHandle>, HeapError> {
        Ok(self.shape(shape)?.prototype)
    }

    fn is_shape_stable(&self, shape: ShapeId) -> Result<bool, HeapError> {
        Ok(self.shape(shape)?.stable)
    }

    fn is_shape_deprecated(&self, shape: ShapeId) -> Result<bool, HeapError> {
        Ok(self.shape(shape)?.deprecated)
    }

    fn receiver_shape(&self, context: ContextId, shape: ShapeId) -> Result<ShapeId, HeapError> {
        let Some(kind) = self.shape(shape)?.primitive else {
            return Ok(shape);
        };
        Ok(self
            .context(context)?
            .wrapper_shapes
            .get(&kind)
            .copied()
            .unwrap_or(shape))
    }
}

impl DependentCodeStore for ShapeHeap {
    fn dependent_code(&self, entity: WatchedEntity) -> Option<&InvalidationList> {
        self.dependent_code.get(&entity)
    }

    fn dependent_code_mut(&mut self, entity: WatchedEntity) -> Option<&mut InvalidationList> {
        self.dependent_code.get_mut(&entity)
    }

    fn set_dependent_code(&mut self, entity: WatchedEntity, list: InvalidationList) {
        self.dependent_code.insert(entity, list);
    }
}
