//! Property test: after any sequence of creates and deletes, the stored
//! closure equals a breadth-first recomputation over the surviving edges.

use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tempfile::TempDir;
use trellis::domain::{ClosureEntry, RequirementId, ScopeId};
use trellis::error::ErrorKind;
use trellis::storage::{StorageBackend, TraceStorage, create_storage};

const NODES: u8 = 6;

#[derive(Debug, Clone)]
enum Op {
    Link(u8, u8),
    Unlink(u8, u8),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..NODES, 0..NODES).prop_map(|(a, d)| Op::Link(a, d)),
        1 => (0..NODES, 0..NODES).prop_map(|(a, d)| Op::Unlink(a, d)),
    ]
}

fn node(n: u8) -> RequirementId {
    RequirementId::new(format!("N{n}"))
}

/// Shortest distances from `start` over `edges`, excluding `start` itself.
fn bfs(edges: &BTreeSet<(u8, u8)>, start: u8) -> BTreeMap<u8, usize> {
    let mut distances = BTreeMap::new();
    let mut queue = VecDeque::from([(start, 0usize)]);
    let mut seen = BTreeSet::from([start]);
    while let Some((current, depth)) = queue.pop_front() {
        for &(_, next) in edges.range((current, 0)..=(current, u8::MAX)) {
            if seen.insert(next) {
                distances.insert(next, depth + 1);
                queue.push_back((next, depth + 1));
            }
        }
    }
    distances
}

fn expected_descendants(edges: &BTreeSet<(u8, u8)>, start: u8) -> Vec<ClosureEntry> {
    let mut rows: Vec<ClosureEntry> = bfs(edges, start)
        .into_iter()
        .map(|(n, depth)| ClosureEntry {
            requirement_id: node(n),
            depth,
        })
        .collect();
    rows.sort_by(|a, b| {
        a.depth
            .cmp(&b.depth)
            .then_with(|| a.requirement_id.cmp(&b.requirement_id))
    });
    rows
}

async fn check(storage: &mut dyn TraceStorage, ops: &[Op]) -> Result<(), TestCaseError> {
    let scope = ScopeId::new("proj");
    let mut model: BTreeSet<(u8, u8)> = BTreeSet::new();

    for op in ops {
        match *op {
            Op::Link(a, d) => match storage.insert_edge(&scope, &node(a), &node(d)).await {
                Ok(_) => {
                    prop_assert!(!model.contains(&(a, d)));
                    model.insert((a, d));
                }
                Err(e) if e.kind() == ErrorKind::Cycle => {
                    prop_assert!(a == d || bfs(&model, d).contains_key(&a));
                }
                Err(e) => {
                    prop_assert_eq!(e.kind(), ErrorKind::Duplicate);
                    prop_assert!(model.contains(&(a, d)));
                }
            },
            Op::Unlink(a, d) => match storage.delete_edge(&node(a), &node(d)).await {
                Ok(_) => prop_assert!(model.remove(&(a, d))),
                Err(e) => {
                    prop_assert_eq!(e.kind(), ErrorKind::NotFound);
                    prop_assert!(!model.contains(&(a, d)));
                }
            },
        }
    }

    for n in 0..NODES {
        let stored = storage
            .list_descendants(&node(n), None)
            .await
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(stored, expected_descendants(&model, n), "descendants of N{}", n);
    }
    Ok(())
}

fn run(backend: StorageBackend, ops: &[Op]) -> Result<(), TestCaseError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .map_err(|e| TestCaseError::fail(e.to_string()))?;
    runtime.block_on(async {
        let mut storage = create_storage(backend)
            .await
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        check(storage.as_mut(), ops).await
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn in_memory_closure_matches_bfs(ops in prop::collection::vec(arb_op(), 0..40)) {
        run(StorageBackend::InMemory, &ops)?;
    }

    #[test]
    fn sqlite_closure_matches_bfs(ops in prop::collection::vec(arb_op(), 0..40)) {
        let dir = TempDir::new().unwrap();
        let backend = StorageBackend::Sqlite {
            path: dir.path().join("trellis.db"),
            busy_timeout_ms: 1_000,
        };
        run(backend, &ops)?;
    }
}
