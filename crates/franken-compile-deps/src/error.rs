use crate::entity::ObjectHandle;
use crate::object_model::HeapError;

/// Failures while expanding a prototype-chain assumption.
///
/// Staging itself cannot fail; these only arise from object-model queries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DependencyError {
    #[error("object model query failed: {0}")]
    Heap(#[from] HeapError),
    #[error("prototype chain depth {depth} exceeds max {max}")]
    PrototypeChainTooDeep { depth: u32, max: u32 },
    #[error("prototype chain cycle detected at {object}")]
    PrototypeCycleDetected { object: ObjectHandle },
}

impl DependencyError {
    /// Stable error code for structured events.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Heap(HeapError::ObjectNotFound(_)) => "DEPS_OBJECT_NOT_FOUND",
            Self::Heap(HeapError::ShapeNotFound(_)) => "DEPS_SHAPE_NOT_FOUND",
            Self::Heap(HeapError::ContextNotFound(_)) => "DEPS_CONTEXT_NOT_FOUND",
            Self::Heap(HeapError::CellNotFound(_)) => "DEPS_CELL_NOT_FOUND",
            Self::Heap(HeapError::AllocationSiteNotFound(_)) => "DEPS_SITE_NOT_FOUND",
            Self::Heap(HeapError::HandleSpaceExhausted(_)) => "DEPS_HANDLE_SPACE_EXHAUSTED",
            Self::PrototypeChainTooDeep { .. } => "DEPS_CHAIN_TOO_DEEP",
            Self::PrototypeCycleDetected { .. } => "DEPS_CHAIN_CYCLE",
        }
    }
}
