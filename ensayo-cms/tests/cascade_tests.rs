//! Cascade engine integration tests
//!
//! Tests cover:
//! - Archive propagation to every descendant level
//! - Re-parenting rewrites descendant ancestor references
//! - Learner data purge on unit-and-above archive
//! - Progress synchronizer calls owed by group changes
//! - NotFound and validation failures leave the store untouched

mod helpers;

use std::sync::Arc;

use ensayo_cms::cascade::CascadeEngine;
use ensayo_cms::db::learners;
use ensayo_cms::hierarchy::{Ancestry, NodeInput, NodeKind};
use ensayo_cms::progress::ProgressSynchronizer;
use ensayo_common::Error;
use helpers::*;
use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;

async fn setup() -> (TempDir, SqlitePool, Arc<RecordingSynchronizer>, CascadeEngine) {
    let (dir, pool) = create_test_db().await;
    let recorder = Arc::new(RecordingSynchronizer::new(pool.clone()));
    let engine = CascadeEngine::new(pool.clone(), recorder.clone());
    (dir, pool, recorder, engine)
}

/// A learner enrolled in the tree's module with the tool group completed
async fn learner_with_progress(
    pool: &SqlitePool,
    recorder: &RecordingSynchronizer,
    tree: &SeedTree,
    username: &str,
) -> Uuid {
    let user = learners::create_user(pool, username, None).await.unwrap();
    learners::enroll(pool, user.id, tree.module).await.unwrap();
    recorder
        .inner()
        .record_group_completion(user.id, tree.unit, tree.tool_group)
        .await
        .unwrap();
    user.id
}

// =============================================================================
// Archive
// =============================================================================

#[tokio::test]
async fn test_archive_course_section_cascades_to_every_level() {
    let (_dir, pool, recorder, engine) = setup().await;
    let tree = seed_tree(&engine, "Metrology").await;
    let user = learner_with_progress(&pool, &recorder, &tree, "ana").await;
    assert!(progress_for(&pool, user, tree.unit).await.is_some());
    recorder.clear();

    let node = engine
        .archive_node(NodeKind::CourseSection, tree.course_section)
        .await
        .unwrap();
    assert!(node.archived());

    for kind in NodeKind::ALL {
        assert!(
            archived_flag(&pool, kind, tree.id(kind)).await,
            "{} should be archived",
            kind.label()
        );
    }

    // Learner data under the archived subtree is gone
    assert!(progress_for(&pool, user, tree.unit).await.is_none());
    assert!(learners::enrolled_module_ids(&pool, user).await.unwrap().is_empty());

    // Mirror entries keep pace with the Tool rows
    let mirror = mirror_of(&pool, tree.tool_group).await;
    assert_eq!(mirror.len(), 1);
    assert!(mirror[0].archived);

    assert!(recorder.calls().is_empty(), "Purged units need no resync");
}

#[tokio::test]
async fn test_archive_leaves_sibling_branches_alone() {
    let (_dir, pool, _recorder, engine) = setup().await;
    let archived = seed_tree(&engine, "Welding").await;
    let kept = seed_tree(&engine, "Lathe").await;

    engine
        .archive_node(NodeKind::Course, archived.course)
        .await
        .unwrap();

    assert!(!archived_flag(&pool, NodeKind::CourseSection, archived.course_section).await);
    for kind in NodeKind::ALL {
        assert!(!archived_flag(&pool, kind, kept.id(kind)).await);
    }
    assert!(archived_flag(&pool, NodeKind::Tool, archived.tool).await);
}

#[tokio::test]
async fn test_archive_twice_is_idempotent() {
    let (_dir, pool, recorder, engine) = setup().await;
    let tree = seed_tree(&engine, "Pneumatics").await;

    let first = engine.archive_node(NodeKind::Unit, tree.unit).await.unwrap();
    recorder.clear();
    let second = engine.archive_node(NodeKind::Unit, tree.unit).await.unwrap();

    assert_eq!(first, second);
    assert!(archived_flag(&pool, NodeKind::Tool, tree.tool).await);
    assert!(recorder.calls().is_empty());
}

#[tokio::test]
async fn test_archive_group_syncs_its_unit() {
    let (_dir, pool, recorder, engine) = setup().await;
    let tree = seed_tree(&engine, "Hydraulics").await;
    let user = learner_with_progress(&pool, &recorder, &tree, "ben").await;

    // One of two groups completed
    assert_eq!(progress_for(&pool, user, tree.unit).await.unwrap().completion, 0.5);
    recorder.clear();

    engine
        .archive_node(NodeKind::PracticalGroup, tree.practical_group)
        .await
        .unwrap();

    assert_eq!(recorder.calls(), vec![(tree.unit, None)]);
    assert_eq!(progress_for(&pool, user, tree.unit).await.unwrap().completion, 1.0);
}

#[tokio::test]
async fn test_archive_unknown_id_is_not_found() {
    let (_dir, _pool, recorder, engine) = setup().await;
    seed_tree(&engine, "Optics").await;
    recorder.clear();

    let err = engine
        .archive_node(NodeKind::Module, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)), "got {:?}", err);
    assert!(recorder.calls().is_empty());
}

// =============================================================================
// Edit
// =============================================================================

#[tokio::test]
async fn test_move_module_to_another_course_rewrites_descendants() {
    let (_dir, pool, _recorder, engine) = setup().await;
    let from = seed_tree(&engine, "A").await;
    let to = seed_tree(&engine, "B").await;

    let moved = Ancestry {
        course_section_id: Some(to.course_section),
        course_id: Some(to.course),
        ..Default::default()
    };
    engine
        .edit_node(NodeKind::Module, from.module, titled("A Module", moved))
        .await
        .unwrap();

    for kind in [
        NodeKind::Unit,
        NodeKind::ToolGroup,
        NodeKind::PracticalGroup,
        NodeKind::Tool,
    ] {
        let id = from.id(kind);
        assert_eq!(column_id(&pool, kind, id, NodeKind::CourseSection).await, to.course_section);
        assert_eq!(column_id(&pool, kind, id, NodeKind::Course).await, to.course);
        assert_eq!(column_id(&pool, kind, id, NodeKind::Module).await, from.module);
    }
}

#[tokio::test]
async fn test_move_tool_between_groups_updates_both_mirrors() {
    let (_dir, pool, _recorder, engine) = setup().await;
    let from = seed_tree(&engine, "A").await;
    let to = seed_tree(&engine, "B").await;

    engine
        .edit_node(NodeKind::Tool, from.tool, named("A Tool", to.ancestry(NodeKind::Tool)))
        .await
        .unwrap();

    assert!(mirror_of(&pool, from.tool_group).await.is_empty());
    let target: Vec<Uuid> = mirror_of(&pool, to.tool_group)
        .await
        .iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(target, vec![to.tool, from.tool]);
    assert_eq!(column_id(&pool, NodeKind::Tool, from.tool, NodeKind::Unit).await, to.unit);
}

#[tokio::test]
async fn test_unarchive_tool_group_syncs_its_unit_once() {
    let (_dir, pool, recorder, engine) = setup().await;
    let tree = seed_tree(&engine, "Casting").await;
    engine
        .archive_node(NodeKind::ToolGroup, tree.tool_group)
        .await
        .unwrap();
    recorder.clear();

    let input = NodeInput {
        archived: Some(false),
        ..titled("Casting Tool Group", tree.ancestry(NodeKind::ToolGroup))
    };
    engine
        .edit_node(NodeKind::ToolGroup, tree.tool_group, input)
        .await
        .unwrap();

    assert_eq!(recorder.calls(), vec![(tree.unit, None)]);
    assert!(!archived_flag(&pool, NodeKind::Tool, tree.tool).await);
    assert!(!mirror_of(&pool, tree.tool_group).await[0].archived);
}

#[tokio::test]
async fn test_unarchive_course_section_revives_subtree() {
    let (_dir, pool, recorder, engine) = setup().await;
    let tree = seed_tree(&engine, "Forging").await;
    engine
        .archive_node(NodeKind::CourseSection, tree.course_section)
        .await
        .unwrap();
    recorder.clear();

    let input = NodeInput {
        archived: Some(false),
        ..titled("Forging Section", Ancestry::default())
    };
    engine
        .edit_node(NodeKind::CourseSection, tree.course_section, input)
        .await
        .unwrap();

    for kind in NodeKind::ALL {
        assert!(!archived_flag(&pool, kind, tree.id(kind)).await);
    }
    assert_eq!(recorder.calls(), vec![(tree.unit, None)]);
}

#[tokio::test]
async fn test_move_group_to_other_unit_prunes_old_progress() {
    let (_dir, pool, recorder, engine) = setup().await;
    let tree = seed_tree(&engine, "Milling").await;
    let second_unit = engine
        .add_node(NodeKind::Unit, titled("Milling Unit 2", tree.ancestry(NodeKind::Unit)))
        .await
        .unwrap()
        .id();

    let user = learner_with_progress(&pool, &recorder, &tree, "cleo").await;
    recorder
        .inner()
        .record_group_completion(user, tree.unit, tree.practical_group)
        .await
        .unwrap();
    recorder.clear();

    let moved = Ancestry {
        unit_id: Some(second_unit),
        ..tree.ancestry(NodeKind::ToolGroup)
    };
    engine
        .edit_node(NodeKind::ToolGroup, tree.tool_group, titled("Milling Tool Group", moved))
        .await
        .unwrap();

    assert_eq!(
        recorder.calls(),
        vec![(tree.unit, Some(tree.tool_group)), (second_unit, None)]
    );

    let progress = progress_for(&pool, user, tree.unit).await.unwrap();
    assert_eq!(progress.completed_groups, vec![tree.practical_group]);
    assert_eq!(progress.completion, 1.0);
    assert_eq!(column_id(&pool, NodeKind::Tool, tree.tool, NodeKind::Unit).await, second_unit);
}

#[tokio::test]
async fn test_move_unit_rewrites_progress_module() {
    let (_dir, pool, recorder, engine) = setup().await;
    let tree = seed_tree(&engine, "Drafting").await;
    let other_module = engine
        .add_node(NodeKind::Module, titled("Drafting II", tree.ancestry(NodeKind::Module)))
        .await
        .unwrap()
        .id();
    let user = learner_with_progress(&pool, &recorder, &tree, "dev").await;

    let moved = Ancestry {
        module_id: Some(other_module),
        ..tree.ancestry(NodeKind::Unit)
    };
    engine
        .edit_node(NodeKind::Unit, tree.unit, titled("Drafting Unit", moved))
        .await
        .unwrap();

    let progress = progress_for(&pool, user, tree.unit).await.unwrap();
    assert_eq!(progress.module_id, other_module);
    assert_eq!(column_id(&pool, NodeKind::Tool, tree.tool, NodeKind::Module).await, other_module);
}

#[tokio::test]
async fn test_edit_is_idempotent() {
    let (_dir, _pool, recorder, engine) = setup().await;
    let tree = seed_tree(&engine, "Soldering").await;
    let input = NodeInput {
        image: Some("https://assets.example/solder.png".to_string()),
        ..titled("Soldering Basics", tree.ancestry(NodeKind::Course))
    };
    recorder.clear();

    let first = engine
        .edit_node(NodeKind::Course, tree.course, input.clone())
        .await
        .unwrap();
    let second = engine
        .edit_node(NodeKind::Course, tree.course, input)
        .await
        .unwrap();

    assert_eq!(first, second);
    assert!(recorder.calls().is_empty());
}

#[tokio::test]
async fn test_edit_unknown_id_is_not_found() {
    let (_dir, _pool, _recorder, engine) = setup().await;
    let tree = seed_tree(&engine, "Robotics").await;

    let err = engine
        .edit_node(
            NodeKind::Course,
            Uuid::new_v4(),
            titled("Ghost", tree.ancestry(NodeKind::Course)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_active_child_under_archived_parent_is_rejected() {
    let (_dir, pool, _recorder, engine) = setup().await;
    let tree = seed_tree(&engine, "Plumbing").await;
    engine
        .archive_node(NodeKind::Module, tree.module)
        .await
        .unwrap();

    let input = NodeInput {
        archived: Some(false),
        ..titled("Plumbing Unit", tree.ancestry(NodeKind::Unit))
    };
    let err = engine
        .edit_node(NodeKind::Unit, tree.unit, input)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Validation(_)), "got {:?}", err);
    assert!(archived_flag(&pool, NodeKind::Unit, tree.unit).await);
}

// =============================================================================
// Add
// =============================================================================

#[tokio::test]
async fn test_add_under_missing_parent_is_rejected() {
    let (_dir, _pool, _recorder, engine) = setup().await;

    let ancestry = Ancestry {
        course_section_id: Some(Uuid::new_v4()),
        ..Default::default()
    };
    let err = engine
        .add_node(NodeKind::Course, titled("Orphan", ancestry))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_add_with_mismatched_ancestors_is_rejected() {
    let (_dir, _pool, _recorder, engine) = setup().await;
    let a = seed_tree(&engine, "A").await;
    let b = seed_tree(&engine, "B").await;

    let mixed = Ancestry {
        module_id: Some(b.module),
        ..a.ancestry(NodeKind::Unit)
    };
    let err = engine
        .add_node(NodeKind::Unit, titled("Mixed", mixed))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_add_requires_every_ancestor_reference() {
    let (_dir, _pool, _recorder, engine) = setup().await;
    let tree = seed_tree(&engine, "Carpentry").await;

    let partial = Ancestry {
        course_id: None,
        ..tree.ancestry(NodeKind::Module)
    };
    let err = engine
        .add_node(NodeKind::Module, titled("Joinery", partial))
        .await
        .unwrap_err();
    match err {
        Error::Validation(msg) => assert!(msg.contains("courseId"), "message: {}", msg),
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_child_of_archived_parent_is_created_archived() {
    let (_dir, _pool, _recorder, engine) = setup().await;
    let tree = seed_tree(&engine, "Masonry").await;
    engine
        .archive_node(NodeKind::Unit, tree.unit)
        .await
        .unwrap();

    let node = engine
        .add_node(
            NodeKind::PracticalGroup,
            titled("Bricklaying", tree.ancestry(NodeKind::PracticalGroup)),
        )
        .await
        .unwrap();
    assert!(node.archived());
}

#[tokio::test]
async fn test_add_active_group_syncs_its_unit() {
    let (_dir, pool, recorder, engine) = setup().await;
    let tree = seed_tree(&engine, "Electronics").await;
    let user = learner_with_progress(&pool, &recorder, &tree, "eli").await;
    recorder.clear();

    engine
        .add_node(
            NodeKind::PracticalGroup,
            titled("Oscilloscope Lab", tree.ancestry(NodeKind::PracticalGroup)),
        )
        .await
        .unwrap();

    assert_eq!(recorder.calls(), vec![(tree.unit, None)]);
    // One of three groups done
    let completion = progress_for(&pool, user, tree.unit).await.unwrap().completion;
    assert!((completion - 1.0 / 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_units_are_numbered_in_insertion_order() {
    let (_dir, _pool, _recorder, engine) = setup().await;
    let tree = seed_tree(&engine, "Surveying").await;

    let second = engine
        .add_node(NodeKind::Unit, titled("Leveling", tree.ancestry(NodeKind::Unit)))
        .await
        .unwrap();
    let explicit = engine
        .add_node(
            NodeKind::Unit,
            NodeInput {
                sequence_number: Some(10),
                ..titled("Traverse", tree.ancestry(NodeKind::Unit))
            },
        )
        .await
        .unwrap();

    let seq = |node: &ensayo_cms::hierarchy::Node| match node {
        ensayo_cms::hierarchy::Node::Unit(u) => u.sequence_number,
        other => panic!("expected unit, got {:?}", other),
    };
    assert_eq!(seq(&second), 2);
    assert_eq!(seq(&explicit), 10);
}

// =============================================================================
// Failures and concurrency
// =============================================================================

#[tokio::test]
async fn test_failed_descendant_update_rolls_back_the_whole_cascade() {
    let (_dir, pool, recorder, engine) = setup().await;
    let tree = seed_tree(&engine, "Hydraulics").await;
    let user = learner_with_progress(&pool, &recorder, &tree, "ana").await;
    recorder.clear();

    // Tool rows are the last level the unit archive touches
    sqlx::query(
        "CREATE TRIGGER reject_tool_updates BEFORE UPDATE ON tools
         BEGIN SELECT RAISE(ABORT, 'tool rows are read-only'); END",
    )
    .execute(&pool)
    .await
    .unwrap();

    let err = engine.archive_node(NodeKind::Unit, tree.unit).await.unwrap_err();
    assert!(matches!(err, Error::Database(_)), "got {:?}", err);
    assert!(err.to_string().contains("tool rows are read-only"), "got {}", err);

    for kind in [
        NodeKind::Unit,
        NodeKind::ToolGroup,
        NodeKind::PracticalGroup,
        NodeKind::Tool,
    ] {
        assert!(!archived_flag(&pool, kind, tree.id(kind)).await, "{:?} stayed archived", kind);
    }
    assert!(mirror_of(&pool, tree.tool_group).await.iter().all(|t| !t.archived));
    assert!(progress_for(&pool, user, tree.unit).await.is_some());
    assert!(recorder.calls().is_empty());

    // Once the failing step is gone the same request goes through
    sqlx::query("DROP TRIGGER reject_tool_updates")
        .execute(&pool)
        .await
        .unwrap();
    engine.archive_node(NodeKind::Unit, tree.unit).await.unwrap();
    assert!(archived_flag(&pool, NodeKind::Tool, tree.tool).await);
    assert!(progress_for(&pool, user, tree.unit).await.is_none());
}

#[tokio::test]
async fn test_synchronizer_failure_keeps_committed_structure() {
    let (_dir, pool, recorder, engine) = setup().await;
    let tree = seed_tree(&engine, "Acoustics").await;
    let user = learner_with_progress(&pool, &recorder, &tree, "ben").await;
    recorder.clear();
    recorder.set_failing(true);

    let err = engine
        .archive_node(NodeKind::PracticalGroup, tree.practical_group)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Internal(_)), "got {:?}", err);
    assert_eq!(recorder.calls(), vec![(tree.unit, None)]);

    // Structure is committed, progress is stale
    assert!(archived_flag(&pool, NodeKind::PracticalGroup, tree.practical_group).await);
    assert_eq!(progress_for(&pool, user, tree.unit).await.unwrap().completion, 0.5);

    // Repeating the operation is harmless
    recorder.set_failing(false);
    let node = engine
        .archive_node(NodeKind::PracticalGroup, tree.practical_group)
        .await
        .unwrap();
    assert!(node.archived());

    // Re-running the owed synchronization catches progress up
    recorder
        .update_progress_for_all(tree.unit, None)
        .await
        .unwrap();
    let progress = progress_for(&pool, user, tree.unit).await.unwrap();
    assert_eq!(progress.completed_groups, vec![tree.tool_group]);
    assert_eq!(progress.completion, 1.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_cascades_on_disjoint_subtrees_all_succeed() {
    let (_dir, pool, _recorder, engine) = setup().await;
    let engine = Arc::new(engine);

    let mut trees = Vec::new();
    for i in 0..8 {
        trees.push(seed_tree(&engine, &format!("Track {}", i)).await);
    }

    let mut handles = Vec::new();
    for tree in trees.iter().copied() {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let mut failures = Vec::new();
            for round in 0..10 {
                let input = titled(
                    &format!("Module {} rev {}", tree.module, round),
                    tree.ancestry(NodeKind::Module),
                );
                if let Err(e) = engine.edit_node(NodeKind::Module, tree.module, input).await {
                    failures.push(e.to_string());
                }
            }
            failures
        }));
    }

    let mut failures = Vec::new();
    for handle in handles {
        failures.extend(handle.await.unwrap());
    }
    assert!(failures.is_empty(), "{} edits failed, first: {:?}", failures.len(), failures.first());

    for tree in &trees {
        let title: String = sqlx::query_scalar("SELECT title FROM modules WHERE id = ?")
            .bind(tree.module.to_string())
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(title, format!("Module {} rev 9", tree.module));
        // Descendants were rewritten by every edit and still point at their module
        assert_eq!(column_id(&pool, NodeKind::Tool, tree.tool, NodeKind::Module).await, tree.module);
        assert!(!archived_flag(&pool, NodeKind::Tool, tree.tool).await);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_group_archives_synchronize_every_unit() {
    let (_dir, pool, recorder, engine) = setup().await;
    let engine = Arc::new(engine);

    let mut learners_by_tree = Vec::new();
    for i in 0..8 {
        let tree = seed_tree(&engine, &format!("Shop {}", i)).await;
        let user = learner_with_progress(&pool, &recorder, &tree, &format!("learner{}", i)).await;
        learners_by_tree.push((tree, user));
    }
    recorder.clear();

    let mut handles = Vec::new();
    for (tree, _) in learners_by_tree.iter().copied() {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .archive_node(NodeKind::PracticalGroup, tree.practical_group)
                .await
                .map(|_| ())
                .map_err(|e| e.to_string())
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(recorder.calls().len(), 8);
    for (tree, user) in &learners_by_tree {
        assert_eq!(progress_for(&pool, *user, tree.unit).await.unwrap().completion, 1.0);
    }
}
