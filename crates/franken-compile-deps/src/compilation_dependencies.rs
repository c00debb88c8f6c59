//! Per-compilation dependency collector.
//!
//! One [`CompilationDependencies`] lives for exactly one compilation
//! attempt.  While code is generated, typed `assume_*` helpers stage
//! `(group, entity)` pairs.  At the single finalization point the collector
//! is consumed by either:
//!
//! - [`commit`](CompilationDependencies::commit): links the artifact into
//!   the invalidation list of every staged entity, once per staged pair, or
//!   links nothing if the compilation was aborted;
//! - [`rollback`](CompilationDependencies::rollback): discards the staging
//!   buffer without touching any invalidation list.
//!
//! Both take `self` by value, so a finalized collector cannot be used
//! again.  A collector dropped without finalization links nothing.
//!
//! The collector never checks that an assumption currently holds.  Callers
//! query the object model first and bail out of the optimization otherwise.

use serde::{Deserialize, Serialize};

use crate::artifact::{ArtifactId, CompiledArtifact};
use crate::dependency_group::DependencyGroup;
use crate::entity::{AllocationSiteId, CellId, ContextId, ObjectHandle, ShapeId, WatchedEntity};
use crate::error::DependencyError;
use crate::invalidation_list::{DependentCodeStore, link_dependent_code};
use crate::object_model::ObjectModel;
use crate::prototype_chain::{self, ChainStart};

const COMPONENT: &str = "compilation_dependencies";

/// Default bound on prototype hops walked by the chain helpers.
pub const DEFAULT_MAX_PROTOTYPE_CHAIN_DEPTH: u32 = 1024;

// ---------------------------------------------------------------------------
// CollectorConfig
// ---------------------------------------------------------------------------

/// Configuration controlling collector behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Maximum prototype hops a chain walk may take before failing.
    pub max_prototype_chain_depth: u32,
    /// Emit a `dependency_inserted` event for every staged pair.
    pub trace_inserts: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_prototype_chain_depth: DEFAULT_MAX_PROTOTYPE_CHAIN_DEPTH,
            trace_inserts: false,
        }
    }
}

impl CollectorConfig {
    /// Parse a JSON config; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Configuration for debugging: every insertion is traced.
    pub fn tracing() -> Self {
        Self {
            trace_inserts: true,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// CompilationContext / DependencyEvent
// ---------------------------------------------------------------------------

/// Identifies the compilation in structured events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationContext {
    pub trace_id: String,
    pub decision_id: String,
    pub policy_id: String,
}

impl CompilationContext {
    /// Identity carried by every event this compilation emits.
    pub fn new(
        trace_id: impl Into<String>,
        decision_id: impl Into<String>,
        policy_id: impl Into<String>,
    ) -> Self {
        Self {
            trace_id: trace_id.into(),
            decision_id: decision_id.into(),
            policy_id: policy_id.into(),
        }
    }
}

/// Structured log record emitted by the collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEvent {
    pub trace_id: String,
    pub decision_id: String,
    pub policy_id: String,
    pub component: String,
    pub event: String,
    pub outcome: String,
    pub error_code: Option<String>,
}

// ---------------------------------------------------------------------------
// FinalizeReport
// ---------------------------------------------------------------------------

/// How a collector was finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizeOutcome {
    /// Every staged pair was linked to the artifact.
    Committed,
    /// Commit after abort: nothing was linked.
    Suppressed,
    /// Rollback: nothing was linked.
    RolledBack,
}

/// Result of finalizing a collector, with its full event trail.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeReport {
    pub outcome: FinalizeOutcome,
    /// Artifact passed to commit, if any.
    pub artifact: Option<ArtifactId>,
    /// Pairs staged at finalization.
    pub staged_entries: u64,
    /// Invalidation-list entries created.
    pub linked_entries: u64,
    pub events: Vec<DependencyEvent>,
}

// ---------------------------------------------------------------------------
// CompilationDependencies
// ---------------------------------------------------------------------------

/// Staging buffer and finalization protocol for one compilation.
#[derive(Debug)]
pub struct CompilationDependencies {
    context: CompilationContext,
    config: CollectorConfig,
    /// Indexed by `DependencyGroup::index`; `None` until first insertion.
    groups: [Option<Vec<WatchedEntity>>; DependencyGroup::COUNT],
    aborted: bool,
    events: Vec<DependencyEvent>,
}

impl CompilationDependencies {
    /// Empty, non-aborted collector for one compilation attempt.
    pub fn new(context: CompilationContext, config: CollectorConfig) -> Self {
        Self {
            context,
            config,
            groups: Default::default(),
            aborted: false,
            events: Vec::new(),
        }
    }

    pub fn context(&self) -> &CompilationContext {
        &self.context
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    pub fn events(&self) -> &[DependencyEvent] {
        &self.events
    }

    // -- staging ------------------------------------------------------------

    /// Stage `(group, entity)`.  Repeated pairs are kept.
    pub fn insert(&mut self, group: DependencyGroup, entity: impl Into<WatchedEntity>) {
        let entity = entity.into();
        self.groups[group.index()]
            .get_or_insert_with(Vec::new)
            .push(entity);
        if self.config.trace_inserts {
            self.push_event("dependency_inserted", &format!("{group}:{entity}"), None);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.groups
            .iter()
            .all(|entities| entities.as_ref().is_none_or(Vec::is_empty))
    }

    /// Entities staged under `group`, in insertion order.
    pub fn staged(&self, group: DependencyGroup) -> &[WatchedEntity] {
        self.groups[group.index()].as_deref().unwrap_or(&[])
    }

    /// Total staged pairs across all groups.
    pub fn staged_len(&self) -> usize {
        self.groups.iter().flatten().map(Vec::len).sum()
    }

    /// Make the eventual commit link nothing.  Idempotent.
    pub fn abort(&mut self) {
        if self.aborted {
            return;
        }
        self.aborted = true;
        self.push_event("compilation_aborted", "aborted", None);
    }

    pub fn has_aborted(&self) -> bool {
        self.aborted
    }

    // -- typed assumptions --------------------------------------------------

    /// `shape` will not transition away while the code is alive.  Only call
    /// when the object model reports `shape` as stable.
    pub fn assume_shape_stable(&mut self, shape: ShapeId) {
        self.insert(DependencyGroup::ShapeStability, shape);
    }

    /// `shape` will not be deprecated in favor of a more general shape.
    pub fn assume_shape_not_deprecated(&mut self, shape: ShapeId) {
        self.insert(DependencyGroup::ShapeDeprecation, shape);
    }

    /// `shape` keeps owning its current field layout.
    pub fn assume_field_owner(&mut self, shape: ShapeId) {
        self.insert(DependencyGroup::FieldOwner, shape);
    }

    /// The constructor whose initial shape is `shape` keeps it.
    pub fn assume_initial_shape_cant_change(&mut self, shape: ShapeId) {
        self.insert(DependencyGroup::InitialShape, shape);
    }

    /// The value held by `cell` was inlined as a constant.
    pub fn assume_global_binding_constant(&mut self, cell: CellId) {
        self.insert(DependencyGroup::GlobalBinding, cell);
    }

    pub fn assume_tenuring_decision(&mut self, site: AllocationSiteId) {
        self.insert(DependencyGroup::AllocationSiteTenuring, site);
    }

    pub fn assume_transition_stable(&mut self, site: AllocationSiteId) {
        self.insert(DependencyGroup::AllocationSiteTransition, site);
    }

    /// Assume every prototype shape of `start` stable, up to and including
    /// `terminator` (or to chain end).  A receiver object that is itself the
    /// terminator stages nothing.  Returns the number of assumptions staged;
    /// on error nothing is staged.
    pub fn assume_prototype_shapes_stable<M: ObjectModel + ?Sized>(
        &mut self,
        model: &M,
        start: impl Into<ChainStart>,
        terminator: Option<ObjectHandle>,
    ) -> Result<usize, DependencyError> {
        let walked = prototype_chain::prototype_shapes(
            model,
            start,
            terminator,
            self.config.max_prototype_chain_depth,
        );
        self.stage_chain(walked)
    }

    /// For each receiver shape, assume every prototype shape stable up to
    /// and including `holder`.  Receivers sharing a prototype suffix each
    /// stage their own assumptions.  Returns the number staged; on error
    /// nothing is staged.
    pub fn assume_prototypes_stable<M, R>(
        &mut self,
        model: &M,
        native_context: ContextId,
        receivers: &[R],
        holder: ObjectHandle,
    ) -> Result<usize, DependencyError>
    where
        M: ObjectModel + ?Sized,
        R: Into<ChainStart> + Copy,
    {
        let walked = prototype_chain::receiver_prototype_shapes(
            model,
            native_context,
            receivers,
            holder,
            self.config.max_prototype_chain_depth,
        );
        self.stage_chain(walked)
    }

    fn stage_chain(
        &mut self,
        walked: Result<Vec<ShapeId>, DependencyError>,
    ) -> Result<usize, DependencyError> {
        let shapes = match walked {
            Ok(shapes) => shapes,
            Err(err) => {
                self.push_event("prototype_chain_assumed", "error", Some(err.error_code()));
                return Err(err);
            }
        };
        for shape in &shapes {
            self.assume_shape_stable(*shape);
        }
        self.push_event(
            "prototype_chain_assumed",
            &format!("staged:{}", shapes.len()),
            None,
        );
        Ok(shapes.len())
    }

    // -- finalization -------------------------------------------------------

    /// Link `artifact` into the invalidation list of every staged entity,
    /// once per staged pair.  After [`abort`](Self::abort) this links
    /// nothing, exactly like [`rollback`](Self::rollback).
    pub fn commit<S: DependentCodeStore + ?Sized>(
        mut self,
        artifact: &CompiledArtifact,
        store: &mut S,
    ) -> FinalizeReport {
        let staged_entries = self.staged_len() as u64;
        if self.aborted {
            self.push_event("dependencies_committed", "suppressed", None);
            return self.into_report(
                FinalizeOutcome::Suppressed,
                Some(artifact.id()),
                staged_entries,
                0,
            );
        }

        let mut linked_entries: u64 = 0;
        for group in DependencyGroup::ALL {
            let Some(entities) = self.groups[group.index()].take() else {
                continue;
            };
            for entity in entities {
                link_dependent_code(store, entity, group, artifact.id());
                linked_entries += 1;
            }
        }

        self.push_event(
            "dependencies_committed",
            &format!("linked:{linked_entries}:{}", artifact.code_hash()),
            None,
        );
        self.into_report(
            FinalizeOutcome::Committed,
            Some(artifact.id()),
            staged_entries,
            linked_entries,
        )
    }

    /// Discard everything staged.  No invalidation list is touched.
    pub fn rollback(mut self) -> FinalizeReport {
        let staged_entries = self.staged_len() as u64;
        self.push_event("dependencies_rolled_back", "discarded", None);
        self.into_report(FinalizeOutcome::RolledBack, None, staged_entries, 0)
    }

    fn into_report(
        self,
        outcome: FinalizeOutcome,
        artifact: Option<ArtifactId>,
        staged_entries: u64,
        linked_entries: u64,
    ) -> FinalizeReport {
        FinalizeReport {
            outcome,
            artifact,
            staged_entries,
            linked_entries,
            events: self.events,
        }
    }

    fn push_event(&mut self, event: &str, outcome: &str, error_code: Option<&str>) {
        self.events.push(DependencyEvent {
            trace_id: self.context.trace_id.clone(),
            decision_id: self.context.decision_id.clone(),
            policy_id: self.context.policy_id.clone(),
            component: COMPONENT.to_string(),
            event: event.to_string(),
            outcome: outcome.to_string(),
            error_code: error_code.map(str::to_string),
        });
    }
}
