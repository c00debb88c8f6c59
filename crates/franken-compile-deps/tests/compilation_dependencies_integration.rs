#![forbid(unsafe_code)]

//! Integration tests for the commit protocol of `compilation_dependencies`.
//!
//! Covers linking on commit, rollback and abort suppression, duplicate
//! preservation, persistence of invalidation lists across compilations,
//! and structured event output.

use frankenengine_compile_deps::compilation_dependencies::{
    CollectorConfig, CompilationContext, CompilationDependencies, FinalizeOutcome,
};
use frankenengine_compile_deps::{
    AllocationSiteId, ArtifactId, CellId, CompiledArtifact, DependencyGroup, DependentCodeStore,
    ObjectModel, ShapeHeap, ShapeId, WatchedEntity,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn collector(trace: &str) -> CompilationDependencies {
    CompilationDependencies::new(
        CompilationContext::new(trace, "decision", "policy"),
        CollectorConfig::default(),
    )
}

fn artifact(id: u64) -> CompiledArtifact {
    CompiledArtifact::new(ArtifactId(id), format!("fn_{id}"), &id.to_le_bytes())
}

/// A heap with a handful of unrelated entities of every kind.
struct Fixture {
    heap: ShapeHeap,
    shapes: Vec<ShapeId>,
    cell: CellId,
    site: AllocationSiteId,
}

fn fixture() -> Fixture {
    let mut heap = ShapeHeap::new();
    let shapes = (0..4).map(|_| heap.alloc_shape(None).unwrap()).collect::<Vec<_>>();
    let ctx = heap.alloc_context().unwrap();
    let cell = heap.define_global(ctx, "limit").unwrap();
    let site = heap.alloc_site(false, Some(shapes[0])).unwrap();
    Fixture {
        heap,
        shapes,
        cell,
        site,
    }
}

/// Stage a fixed mix of assumptions.
fn stage_mix(deps: &mut CompilationDependencies, fx: &Fixture) {
    deps.assume_shape_stable(fx.shapes[0]);
    deps.assume_shape_not_deprecated(fx.shapes[1]);
    deps.assume_field_owner(fx.shapes[1]);
    deps.assume_global_binding_constant(fx.cell);
    deps.assume_tenuring_decision(fx.site);
    deps.assume_transition_stable(fx.site);
}

// ===========================================================================
// 1. Commit links every staged pair exactly once
// ===========================================================================

#[test]
fn commit_links_each_pair_and_leaves_others_untouched() {
    let mut fx = fixture();
    let mut deps = collector("commit");
    stage_mix(&mut deps, &fx);
    let report = deps.commit(&artifact(1), &mut fx.heap);

    assert_eq!(report.outcome, FinalizeOutcome::Committed);
    assert_eq!(report.linked_entries, 6);
    assert_eq!(fx.heap.dependent_code_len(), 6);

    let a = ArtifactId(1);
    assert_eq!(
        fx.heap.dependents(fx.shapes[0], DependencyGroup::ShapeStability),
        &[a]
    );
    assert_eq!(
        fx.heap.dependents(fx.shapes[1], DependencyGroup::ShapeDeprecation),
        &[a]
    );
    assert_eq!(
        fx.heap.dependents(fx.shapes[1], DependencyGroup::FieldOwner),
        &[a]
    );
    assert_eq!(
        fx.heap.dependents(fx.cell, DependencyGroup::GlobalBinding),
        &[a]
    );
    assert_eq!(
        fx.heap.dependents(fx.site, DependencyGroup::AllocationSiteTenuring),
        &[a]
    );
    assert_eq!(
        fx.heap.dependents(fx.site, DependencyGroup::AllocationSiteTransition),
        &[a]
    );
    // Never-watched entities have no list at all.
    for shape in &fx.shapes[2..] {
        assert!(fx.heap.dependent_code(WatchedEntity::Shape(*shape)).is_none());
    }
    // Groups not staged for an entity stay empty.
    assert!(
        fx.heap
            .dependents(fx.shapes[0], DependencyGroup::ShapeDeprecation)
            .is_empty()
    );
}

// ===========================================================================
// 2. Scenarios
// ===========================================================================

#[test]
fn scenario_a_empty_collector_commit_links_nothing() {
    let mut fx = fixture();
    let deps = collector("scenario-a");
    assert!(deps.is_empty());
    let report = deps.commit(&artifact(1), &mut fx.heap);
    assert_eq!(report.outcome, FinalizeOutcome::Committed);
    assert_eq!(report.linked_entries, 0);
    assert_eq!(fx.heap.dependent_code_len(), 0);
}

#[test]
fn scenario_b_duplicate_insertions_are_preserved() {
    let mut fx = fixture();
    let shape = fx.shapes[0];
    let mut deps = collector("scenario-b");
    deps.insert(DependencyGroup::ShapeStability, shape);
    deps.insert(DependencyGroup::ShapeStability, shape);
    assert_eq!(deps.commit(&artifact(7), &mut fx.heap).outcome, FinalizeOutcome::Committed);

    assert_eq!(
        fx.heap.dependents(shape, DependencyGroup::ShapeStability),
        &[ArtifactId(7), ArtifactId(7)]
    );
}

#[test]
fn scenario_c_abort_then_commit_leaves_list_unchanged() {
    let mut fx = fixture();
    let shape = fx.shapes[0];
    let mut deps = collector("scenario-c");
    deps.insert(DependencyGroup::ShapeStability, shape);
    deps.abort();
    let report = deps.commit(&artifact(1), &mut fx.heap);

    assert_eq!(report.outcome, FinalizeOutcome::Suppressed);
    assert!(fx.heap.dependent_code(WatchedEntity::Shape(shape)).is_none());
}

// ===========================================================================
// 3. is_empty
// ===========================================================================

#[test]
fn is_empty_tracks_insertions() {
    let fx = fixture();
    let mut deps = collector("empty");
    assert!(deps.is_empty());
    deps.abort();
    assert!(deps.is_empty(), "abort stages nothing");
    deps.assume_initial_shape_cant_change(fx.shapes[3]);
    assert!(!deps.is_empty());
    assert_eq!(deps.rollback().outcome, FinalizeOutcome::RolledBack);
}

// ===========================================================================
// 4. Rollback and abort equivalence
// ===========================================================================

#[test]
fn rollback_touches_no_list() {
    let mut fx = fixture();
    let mut deps = collector("rollback");
    stage_mix(&mut deps, &fx);
    let report = deps.rollback();
    assert_eq!(report.outcome, FinalizeOutcome::RolledBack);
    assert_eq!(report.staged_entries, 6);
    assert_eq!(fx.heap.dependent_code_len(), 0);

    // A later commit by another compilation is unaffected by the rollback.
    let mut other = collector("after-rollback");
    other.assume_shape_stable(fx.shapes[0]);
    assert_eq!(other.commit(&artifact(2), &mut fx.heap).outcome, FinalizeOutcome::Committed);
    assert_eq!(fx.heap.dependent_code_len(), 1);
}

#[test]
fn abort_at_any_point_matches_rollback() {
    // Abort before, between and after the staged insertions.
    for abort_at in 0..=6 {
        let mut aborted_heap = fixture();
        let mut rolled_back_heap = fixture();

        let mut aborted = collector("abort");
        let mut rolled_back = collector("rollback");
        let steps: [fn(&mut CompilationDependencies, &Fixture); 6] = [
            |d, f| d.assume_shape_stable(f.shapes[0]),
            |d, f| d.assume_shape_not_deprecated(f.shapes[1]),
            |d, f| d.assume_field_owner(f.shapes[1]),
            |d, f| d.assume_global_binding_constant(f.cell),
            |d, f| d.assume_tenuring_decision(f.site),
            |d, f| d.assume_transition_stable(f.site),
        ];
        for (index, step) in steps.iter().enumerate() {
            if index == abort_at {
                aborted.abort();
            }
            step(&mut aborted, &aborted_heap);
            step(&mut rolled_back, &rolled_back_heap);
        }
        if abort_at == steps.len() {
            aborted.abort();
        }

        assert_eq!(
            aborted.commit(&artifact(1), &mut aborted_heap.heap).outcome,
            FinalizeOutcome::Suppressed
        );
        assert_eq!(rolled_back.rollback().outcome, FinalizeOutcome::RolledBack);
        assert_eq!(
            aborted_heap.heap.dependent_code_len(),
            rolled_back_heap.heap.dependent_code_len(),
            "abort at step {abort_at}"
        );
        assert_eq!(aborted_heap.heap.dependent_code_len(), 0);
    }
}

#[test]
fn dropped_collector_links_nothing() {
    let mut fx = fixture();
    {
        let mut deps = collector("dropped");
        stage_mix(&mut deps, &fx);
    }
    // A fresh commit only links what it staged itself.
    let mut deps = collector("fresh");
    deps.assume_shape_stable(fx.shapes[2]);
    assert_eq!(deps.commit(&artifact(3), &mut fx.heap).outcome, FinalizeOutcome::Committed);
    assert_eq!(fx.heap.dependent_code_len(), 1);
}

// ===========================================================================
// 5. Invalidation lists persist across compilations
// ===========================================================================

#[test]
fn successive_commits_accumulate_on_shared_entities() {
    let mut fx = fixture();
    let shape = fx.shapes[0];

    for id in 1..=3 {
        let mut deps = collector(&format!("compile-{id}"));
        deps.assume_shape_stable(shape);
        assert_eq!(deps.commit(&artifact(id), &mut fx.heap).outcome, FinalizeOutcome::Committed);
    }
    // An aborted compilation in between must not disturb earlier links.
    let mut deps = collector("compile-aborted");
    deps.assume_shape_stable(shape);
    deps.abort();
    assert_eq!(deps.commit(&artifact(99), &mut fx.heap).outcome, FinalizeOutcome::Suppressed);

    assert_eq!(
        fx.heap.dependents(shape, DependencyGroup::ShapeStability),
        &[ArtifactId(1), ArtifactId(2), ArtifactId(3)]
    );
}

#[test]
fn commit_into_plain_map_store() {
    use std::collections::BTreeMap;

    use frankenengine_compile_deps::InvalidationList;

    let mut store: BTreeMap<WatchedEntity, InvalidationList> = BTreeMap::new();
    let mut deps = collector("map-store");
    deps.assume_global_binding_constant(CellId(0));
    deps.assume_global_binding_constant(CellId(1));
    assert_eq!(deps.commit(&artifact(5), &mut store).outcome, FinalizeOutcome::Committed);

    assert_eq!(store.len(), 2);
    assert!(store[&WatchedEntity::BindingCell(CellId(1))]
        .contains(DependencyGroup::GlobalBinding, ArtifactId(5)));
}

// ===========================================================================
// 6. Caller contract: the collector does not check truth
// ===========================================================================

#[test]
fn unstable_shape_is_recorded_when_caller_skips_the_check() {
    let mut fx = fixture();
    let shape = fx.shapes[0];
    fx.heap.mark_unstable(shape).unwrap();
    assert_eq!(fx.heap.is_shape_stable(shape), Ok(false));

    let mut deps = collector("contract");
    deps.assume_shape_stable(shape);
    assert_eq!(deps.commit(&artifact(1), &mut fx.heap).outcome, FinalizeOutcome::Committed);
    assert_eq!(
        fx.heap.dependents(shape, DependencyGroup::ShapeStability),
        &[ArtifactId(1)]
    );
}

#[test]
fn caller_aborts_when_it_learns_of_a_broken_assumption() {
    let mut fx = fixture();
    let shape = fx.shapes[1];
    let mut deps = collector("late-bailout");
    deps.assume_shape_not_deprecated(shape);

    // The shape gets deprecated before the pipeline reaches finalization.
    fx.heap.deprecate(shape).unwrap();
    if fx.heap.is_shape_deprecated(shape).unwrap() {
        deps.abort();
    }
    let report = deps.commit(&artifact(1), &mut fx.heap);
    assert_eq!(report.outcome, FinalizeOutcome::Suppressed);
    assert_eq!(fx.heap.dependent_code_len(), 0);
}

// ===========================================================================
// 7. Structured events
// ===========================================================================

#[test]
fn finalize_report_carries_event_trail() {
    let fx = fixture();
    let mut deps = collector("events");
    stage_mix(&mut deps, &fx);
    deps.abort();
    let mut store = ShapeHeap::new();
    let report = deps.commit(&artifact(4), &mut store);

    let names: Vec<&str> = report.events.iter().map(|e| e.event.as_str()).collect();
    assert_eq!(names, vec!["compilation_aborted", "dependencies_committed"]);
    assert_eq!(report.events[1].outcome, "suppressed");
    assert!(report.events.iter().all(|e| e.trace_id == "events"));

    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("\"outcome\":\"suppressed\""));
}

#[test]
fn traced_collector_logs_every_insert() {
    let fx = fixture();
    let mut deps = CompilationDependencies::new(
        CompilationContext::new("traced", "d", "p"),
        CollectorConfig::tracing(),
    );
    stage_mix(&mut deps, &fx);
    let report = deps.rollback();
    let inserts = report
        .events
        .iter()
        .filter(|e| e.event == "dependency_inserted")
        .count();
    assert_eq!(inserts, 6);
}
