//! Prototype-chain walks behind the chain-stability assumptions.
//!
//! A walk starts at a receiver and follows `[[Prototype]]` links, yielding
//! the shape of every prototype object it visits.  It stops after visiting
//! the terminating object (compared by identity), or at chain end when there
//! is none or it is not on the chain.  A receiver given as an object that
//! *is* the terminator has nothing to walk.  The walks are read-only: they
//! collect into a scratch list so the collector can stage all-or-nothing.

use std::collections::BTreeSet;

use crate::entity::{ContextId, ObjectHandle, ShapeId};
use crate::error::DependencyError;
use crate::object_model::ObjectModel;

/// Receiver a prototype walk begins at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStart {
    /// Receiver known only by shape; it can never be the terminator.
    Shape(ShapeId),
    /// Concrete receiver object.
    Object(ObjectHandle),
}

impl From<ShapeId> for ChainStart {
    fn from(shape: ShapeId) -> Self {
        Self::Shape(shape)
    }
}

impl From<ObjectHandle> for ChainStart {
    fn from(object: ObjectHandle) -> Self {
        Self::Object(object)
    }
}

/// Shapes of the prototypes of `start`, up to and including `terminator`.
pub fn prototype_shapes<M: ObjectModel + ?Sized>(
    model: &M,
    start: impl Into<ChainStart>,
    terminator: Option<ObjectHandle>,
    max_depth: u32,
) -> Result<Vec<ShapeId>, DependencyError> {
    let mut shapes = Vec::new();
    walk_from(model, start.into(), None, terminator, max_depth, &mut shapes)?;
    Ok(shapes)
}

/// Per-receiver walks towards a common `holder`, concatenated in receiver
/// order.  Shared prototype suffixes appear once per receiver.  Primitive
/// receiver shapes are boxed through `native_context` first.
pub fn receiver_prototype_shapes<M, R>(
    model: &M,
    native_context: ContextId,
    receivers: &[R],
    holder: ObjectHandle,
    max_depth: u32,
) -> Result<Vec<ShapeId>, DependencyError>
where
    M: ObjectModel + ?Sized,
    R: Into<ChainStart> + Copy,
{
    let mut shapes = Vec::new();
    for &receiver in receivers {
        walk_from(
            model,
            receiver.into(),
            Some(native_context),
            Some(holder),
            max_depth,
            &mut shapes,
        )?;
    }
    Ok(shapes)
}

/// Whether every shape [`prototype_shapes`] would visit is currently stable
/// and not deprecated.  Callers check this before assuming the chain.
pub fn chain_is_stable<M: ObjectModel + ?Sized>(
    model: &M,
    start: impl Into<ChainStart>,
    terminator: Option<ObjectHandle>,
    max_depth: u32,
) -> Result<bool, DependencyError> {
    for shape in prototype_shapes(model, start, terminator, max_depth)? {
        if !model.is_shape_stable(shape)? || model.is_shape_deprecated(shape)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn walk_from<M: ObjectModel + ?Sized>(
    model: &M,
    start: ChainStart,
    native_context: Option<ContextId>,
    stop_at: Option<ObjectHandle>,
    max_depth: u32,
    out: &mut Vec<ShapeId>,
) -> Result<(), DependencyError> {
    let shape = match start {
        ChainStart::Object(object) if stop_at == Some(object) => return Ok(()),
        ChainStart::Object(object) => model.shape_of(object)?,
        ChainStart::Shape(shape) => shape,
    };
    let shape = match native_context {
        Some(context) => model.receiver_shape(context, shape)?,
        None => shape,
    };
    walk(model, shape, stop_at, max_depth, out)
}

fn walk<M: ObjectModel + ?Sized>(
    model: &M,
    start: ShapeId,
    stop_at: Option<ObjectHandle>,
    max_depth: u32,
    out: &mut Vec<ShapeId>,
) -> Result<(), DependencyError> {
    let mut visited = BTreeSet::new();
    let mut depth: u32 = 0;
    let mut current = model.prototype_of(start)?;

    while let Some(object) = current {
        if depth >= max_depth {
            return Err(DependencyError::PrototypeChainTooDeep {
                depth: depth + 1,
                max: max_depth,
            });
        }
        if !visited.insert(object) {
            return Err(DependencyError::PrototypeCycleDetected { object });
        }
        depth += 1;

        let shape = model.shape_of(object)?;
        out.push(shape);
        if stop_at == Some(object) {
            break;
        }
        current = model.prototype_of(shape)?;
    }
    Ok(())
}
