#![no_main]

use frankenengine_compile_deps::{
    AllocationSiteId, ArtifactId, CellId, CollectorConfig, CompilationContext,
    CompilationDependencies, CompiledArtifact, DependencyGroup, FinalizeOutcome, ShapeHeap,
};
use libfuzzer_sys::fuzz_target;

const MAX_OPS: usize = 256;
const SHAPES: u8 = 8;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let mut heap = ShapeHeap::new();
    let root = heap.alloc_object_with_prototype(None).expect("root");
    let proto = heap.alloc_object_with_prototype(Some(root)).expect("proto");
    let shapes: Vec<_> = (0..SHAPES)
        .map(|_| heap.alloc_shape(Some(proto)).expect("shape"))
        .collect();

    let mut deps = CompilationDependencies::new(
        CompilationContext::new("fuzz", "fuzz", "fuzz"),
        CollectorConfig::default(),
    );
    let mut expected: u64 = 0;

    for &byte in data.iter().skip(1).take(MAX_OPS) {
        let shape = shapes[usize::from(byte % SHAPES)];
        let staged: u64 = match byte >> 4 {
            0 => {
                deps.assume_shape_stable(shape);
                1
            }
            1 => {
                deps.assume_shape_not_deprecated(shape);
                1
            }
            2 => {
                deps.assume_field_owner(shape);
                1
            }
            3 => {
                deps.assume_initial_shape_cant_change(shape);
                1
            }
            4 => {
                deps.assume_global_binding_constant(CellId(u32::from(byte)));
                1
            }
            5 => {
                deps.assume_tenuring_decision(AllocationSiteId(u32::from(byte)));
                1
            }
            6 => {
                deps.assume_transition_stable(AllocationSiteId(u32::from(byte)));
                1
            }
            7 => {
                let staged = deps
                    .assume_prototype_shapes_stable(&heap, shape, None)
                    .expect("chain walk");
                assert_eq!(staged, 2);
                2
            }
            8 => {
                let group = DependencyGroup::ALL[usize::from(byte) % DependencyGroup::COUNT];
                deps.insert(group, shape);
                1
            }
            15 => {
                deps.abort();
                0
            }
            _ => 0,
        };
        expected += staged;
    }

    assert_eq!(deps.staged_len() as u64, expected);
    assert_eq!(deps.is_empty(), expected == 0);

    let aborted = deps.has_aborted();
    let artifact = CompiledArtifact::new(ArtifactId(1), "fuzz", data);
    let report = if data[0] & 1 == 0 {
        deps.commit(&artifact, &mut heap)
    } else {
        deps.rollback()
    };

    let linked = heap.dependent_code_len() as u64;
    match report.outcome {
        FinalizeOutcome::Committed => {
            assert!(!aborted);
            assert_eq!(linked, expected);
        }
        FinalizeOutcome::Suppressed => {
            assert!(aborted);
            assert_eq!(linked, 0);
        }
        FinalizeOutcome::RolledBack => assert_eq!(linked, 0),
    }
    assert_eq!(report.linked_entries, linked);
});
