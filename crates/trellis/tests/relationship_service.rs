//! Integration tests for the validating service and the tree queries.
//!
//! These drive the public service API the way the CLI and the MCP server do,
//! against both storage backends.

use rstest::rstest;
use tempfile::TempDir;
use trellis::domain::{RelatedRequirement, Requirement, RequirementId, ScopeId};
use trellis::drag::{DragConfig, DragDropReconciler, DragSource, DropOutcome, Point};
use trellis::error::ErrorKind;
use trellis::flatten::{CollapsedSet, flatten};
use trellis::query::TreeQueryService;
use trellis::service::RelationshipService;
use trellis::storage::{StorageBackend, TraceStorage, create_storage};

#[derive(Debug, Clone, Copy)]
enum Backend {
    Memory,
    Sqlite,
}

const PROJECT: &str = "proj";

/// Open a store and register `ids` in the test project.
async fn seeded(backend: Backend, ids: &[&str]) -> (Box<dyn TraceStorage>, TempDir) {
    let dir = TempDir::new().unwrap();
    let config = match backend {
        Backend::Memory => StorageBackend::InMemory,
        Backend::Sqlite => StorageBackend::Sqlite {
            path: dir.path().join("trellis.db"),
            busy_timeout_ms: 1_000,
        },
    };
    let mut storage = create_storage(config).await.unwrap();
    {
        let mut service = RelationshipService::new(storage.as_mut());
        for id in ids {
            service
                .register(Requirement::new(*id, PROJECT, format!("Requirement {id}")))
                .await
                .unwrap();
        }
    }
    (storage, dir)
}

fn id(s: &str) -> RequirementId {
    RequirementId::new(s)
}

fn scope() -> ScopeId {
    ScopeId::new(PROJECT)
}

async fn link(storage: &mut dyn TraceStorage, a: &str, d: &str) -> usize {
    RelationshipService::new(storage)
        .create(&id(a), &id(d))
        .await
        .unwrap()
        .relationships_created
}

fn summary(rows: &[RelatedRequirement]) -> Vec<(&str, usize, bool)> {
    rows.iter()
        .map(|r| (r.requirement_id.as_str(), r.depth, r.direct_parent))
        .collect()
}

// ========== Create ==========

#[rstest]
#[case("A")]
#[case("B")]
#[case("unknown")]
#[tokio::test]
async fn test_self_link_is_always_validation_error(
    #[values(Backend::Memory, Backend::Sqlite)] backend: Backend,
    #[case] node: &str,
) {
    let (mut storage, _dir) = seeded(backend, &["A", "B"]).await;

    let err = RelationshipService::new(storage.as_mut())
        .create(&id(node), &id(node))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[rstest]
#[tokio::test]
async fn test_chain_is_visible_from_both_ends(
    #[values(Backend::Memory, Backend::Sqlite)] backend: Backend,
) {
    let (mut storage, _dir) = seeded(backend, &["A", "B", "C"]).await;
    link(storage.as_mut(), "A", "B").await;
    link(storage.as_mut(), "B", "C").await;

    let queries = TreeQueryService::new(storage.as_ref());
    let descendants = queries.get_descendants(&id("A"), None).await.unwrap();
    assert_eq!(summary(&descendants), vec![("B", 1, true), ("C", 2, false)]);
    assert_eq!(descendants[0].title, "Requirement B");

    let ancestors = queries.get_ancestors(&id("C"), None).await.unwrap();
    assert_eq!(summary(&ancestors), vec![("B", 1, true), ("A", 2, false)]);
}

#[rstest]
#[tokio::test]
async fn test_duplicate_create_fails_without_changes(
    #[values(Backend::Memory, Backend::Sqlite)] backend: Backend,
) {
    let (mut storage, _dir) = seeded(backend, &["A", "B"]).await;
    assert_eq!(link(storage.as_mut(), "A", "B").await, 1);

    let err = RelationshipService::new(storage.as_mut())
        .create(&id("A"), &id("B"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Duplicate);

    let queries = TreeQueryService::new(storage.as_ref());
    let descendants = queries.get_descendants(&id("A"), None).await.unwrap();
    assert_eq!(summary(&descendants), vec![("B", 1, true)]);
}

#[rstest]
#[tokio::test]
async fn test_closing_a_loop_is_cycle_error(
    #[values(Backend::Memory, Backend::Sqlite)] backend: Backend,
) {
    let (mut storage, _dir) = seeded(backend, &["A", "B", "C"]).await;
    link(storage.as_mut(), "A", "B").await;
    link(storage.as_mut(), "B", "C").await;

    let err = RelationshipService::new(storage.as_mut())
        .create(&id("C"), &id("A"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cycle);

    let queries = TreeQueryService::new(storage.as_ref());
    assert!(queries.get_ancestors(&id("A"), None).await.unwrap().is_empty());
    assert!(queries.get_descendants(&id("C"), None).await.unwrap().is_empty());
}

#[rstest]
#[tokio::test]
async fn test_cross_project_link_is_rejected(
    #[values(Backend::Memory, Backend::Sqlite)] backend: Backend,
) {
    let (mut storage, _dir) = seeded(backend, &["A"]).await;
    let mut service = RelationshipService::new(storage.as_mut());
    service
        .register(Requirement::new("Z", "elsewhere", "Other project"))
        .await
        .unwrap();

    let err = service.create(&id("A"), &id("Z")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

// ========== Delete ==========

#[rstest]
#[tokio::test]
async fn test_delete_only_path_removes_all_rows(
    #[values(Backend::Memory, Backend::Sqlite)] backend: Backend,
) {
    let (mut storage, _dir) = seeded(backend, &["A", "B", "C"]).await;
    link(storage.as_mut(), "A", "B").await;
    link(storage.as_mut(), "B", "C").await;

    let outcome = RelationshipService::new(storage.as_mut())
        .delete(&id("A"), &id("B"))
        .await
        .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.relationships_deleted, 2);

    let queries = TreeQueryService::new(storage.as_ref());
    assert!(queries.get_descendants(&id("A"), None).await.unwrap().is_empty());
    let ancestors = queries.get_ancestors(&id("C"), None).await.unwrap();
    assert_eq!(summary(&ancestors), vec![("B", 1, true)]);
}

#[rstest]
#[tokio::test]
async fn test_delete_keeps_row_reachable_through_second_path(
    #[values(Backend::Memory, Backend::Sqlite)] backend: Backend,
) {
    let (mut storage, _dir) = seeded(backend, &["A", "B", "X"]).await;
    link(storage.as_mut(), "A", "B").await;
    link(storage.as_mut(), "A", "X").await;
    link(storage.as_mut(), "X", "B").await;

    RelationshipService::new(storage.as_mut())
        .delete(&id("A"), &id("B"))
        .await
        .unwrap();

    let queries = TreeQueryService::new(storage.as_ref());
    let ancestors = queries.get_ancestors(&id("B"), None).await.unwrap();
    assert_eq!(summary(&ancestors), vec![("X", 1, true), ("A", 2, false)]);
}

#[rstest]
#[tokio::test]
async fn test_delete_missing_is_not_found(
    #[values(Backend::Memory, Backend::Sqlite)] backend: Backend,
) {
    let (mut storage, _dir) = seeded(backend, &["A", "B"]).await;

    let err = RelationshipService::new(storage.as_mut())
        .delete(&id("A"), &id("B"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ========== Queries ==========

#[rstest]
#[tokio::test]
async fn test_unknown_requirement_query_is_not_found(
    #[values(Backend::Memory, Backend::Sqlite)] backend: Backend,
) {
    let (storage, _dir) = seeded(backend, &["A"]).await;

    let err = TreeQueryService::new(storage.as_ref())
        .get_descendants(&id("nope"), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[rstest]
#[tokio::test]
async fn test_tree_shows_shared_child_once(
    #[values(Backend::Memory, Backend::Sqlite)] backend: Backend,
) {
    let (mut storage, _dir) = seeded(backend, &["A", "B", "C", "D", "E"]).await;
    link(storage.as_mut(), "A", "B").await;
    link(storage.as_mut(), "A", "C").await;
    link(storage.as_mut(), "B", "D").await;
    link(storage.as_mut(), "C", "D").await;

    let queries = TreeQueryService::new(storage.as_ref());
    let tree = queries.get_tree(&scope()).await.unwrap();
    let paths: Vec<&str> = tree.iter().map(|row| row.path.as_str()).collect();
    assert_eq!(paths, vec!["A", "A/B", "A/B/D", "A/C"]);

    let unlinked = queries.get_unlinked(&scope()).await.unwrap();
    assert_eq!(unlinked.len(), 1);
    assert_eq!(unlinked[0].id, id("E"));
}

#[rstest]
#[tokio::test]
async fn test_cycle_check_sees_collapsed_subtrees(
    #[values(Backend::Memory, Backend::Sqlite)] backend: Backend,
) {
    let (mut storage, _dir) = seeded(backend, &["A", "B", "C"]).await;
    link(storage.as_mut(), "A", "B").await;
    link(storage.as_mut(), "B", "C").await;

    let queries = TreeQueryService::new(storage.as_ref());
    let tree = queries.get_tree(&scope()).await.unwrap();
    let collapsed: CollapsedSet = [id("B")].into_iter().collect();
    let visible = flatten(&tree, &collapsed);
    assert!(visible.iter().all(|row| row.requirement_id != id("C")));

    let snapshot = queries.snapshot(&scope()).await.unwrap();
    assert!(snapshot.would_create_cycle(&id("A"), &id("C")));
    assert!(snapshot.would_create_cycle(&id("A"), &id("A")));
    assert!(!snapshot.would_create_cycle(&id("C"), &id("A")));
}

// ========== Move ==========

#[rstest]
#[tokio::test]
async fn test_atomic_move_rolls_back_on_cycle(
    #[values(Backend::Memory, Backend::Sqlite)] backend: Backend,
) {
    let (mut storage, _dir) = seeded(backend, &["A", "B", "C"]).await;
    link(storage.as_mut(), "A", "B").await;
    link(storage.as_mut(), "B", "C").await;

    let err = RelationshipService::new(storage.as_mut())
        .relocate(Some(&id("A")), &id("C"), &id("B"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cycle);

    let queries = TreeQueryService::new(storage.as_ref());
    let ancestors = queries.get_ancestors(&id("B"), None).await.unwrap();
    assert_eq!(summary(&ancestors), vec![("A", 1, true)]);
}

// ========== End to end ==========

#[rstest]
#[case::two_step(DragConfig::default())]
#[case::atomic(DragConfig { commit_mode: trellis::drag::CommitMode::Atomic, ..DragConfig::default() })]
#[tokio::test]
async fn test_drag_b_onto_d(
    #[values(Backend::Memory, Backend::Sqlite)] backend: Backend,
    #[case] config: DragConfig,
) {
    let (mut storage, _dir) = seeded(backend, &["A", "B", "D"]).await;
    link(storage.as_mut(), "A", "B").await;
    link(storage.as_mut(), "A", "D").await;

    let snapshot = TreeQueryService::new(storage.as_ref())
        .snapshot(&scope())
        .await
        .unwrap();

    let mut reconciler = DragDropReconciler::new(config);
    reconciler
        .press(
            id("B"),
            DragSource::Tree {
                parent: Some(id("A")),
            },
            Point::new(10.0, 10.0),
        )
        .unwrap();
    assert!(reconciler.pointer_moved(Point::new(30.0, 10.0)));
    reconciler.hover(Some(id("D")));

    let outcome = {
        let mut service = RelationshipService::new(storage.as_mut());
        reconciler.release(&snapshot, &mut service).await.unwrap()
    };
    assert!(matches!(outcome, DropOutcome::Committed { .. }));
    assert!(!reconciler.is_busy());

    let queries = TreeQueryService::new(storage.as_ref());
    let tree = queries.get_tree(&scope()).await.unwrap();
    let paths: Vec<&str> = tree.iter().map(|row| row.path.as_str()).collect();
    assert_eq!(paths, vec!["A", "A/D", "A/D/B"]);

    let ancestors = queries.get_ancestors(&id("B"), None).await.unwrap();
    assert_eq!(summary(&ancestors), vec![("D", 1, true), ("A", 2, false)]);
}
