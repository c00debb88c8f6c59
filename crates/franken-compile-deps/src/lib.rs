#![forbid(unsafe_code)]

//! Compilation dependency collection for speculative code.
//!
//! A speculative compiler relies on heap facts that may stop holding later:
//! a shape never transitions, a global binding keeps its value, an
//! allocation site keeps its tenuring decision.  Each compilation stages
//! those facts in a [`CompilationDependencies`] collector and, once the
//! code artifact exists, commits them: the artifact is linked into the
//! invalidation list of every watched entity, so the deoptimizer can find
//! it when the fact breaks.  A failed compilation rolls back, or aborts and
//! commits, and leaves every invalidation list untouched.

pub mod artifact;
pub mod compilation_dependencies;
pub mod dependency_group;
pub mod entity;
pub mod error;
pub mod invalidation_list;
pub mod object_model;
pub mod prototype_chain;

pub use artifact::{ArtifactId, CompiledArtifact};
pub use compilation_dependencies::{
    CollectorConfig, CompilationContext, CompilationDependencies, DependencyEvent,
    FinalizeOutcome, FinalizeReport,
};
pub use dependency_group::DependencyGroup;
pub use entity::{AllocationSiteId, CellId, ContextId, ObjectHandle, ShapeId, WatchedEntity};
pub use error::DependencyError;
pub use invalidation_list::{DependentCodeStore, InvalidationList, link_dependent_code};
pub use object_model::{Arena, HeapError, ObjectModel, PrimitiveKind, ShapeHeap};
pub use prototype_chain::ChainStart;
