//! Integration tests for the file-backed SQLite store
//!
//! - Graph survives reopening the database file
//! - Reads order by position, not by id
//! - Failed units of work leave no trace on disk

use chrono::{TimeZone, Utc};
use revgantt_storage::{ErrorKind, NewProject, NewWorkItem, PlanStore, SqlitePlanStore};
use tempfile::TempDir;

async fn project_in(store: &SqlitePlanStore) -> i64 {
    let team = store.create_team("Lab", 10).await.unwrap();
    store
        .create_project(&NewProject {
            name: "Rover".to_string(),
            description: None,
            deadline: Utc.with_ymd_and_hms(2027, 1, 15, 9, 30, 0).unwrap(),
            team_id: team.id,
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn test_graph_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("plans.db");

    let project_id = {
        let store = SqlitePlanStore::new(&path).unwrap();
        let project_id = project_in(&store).await;

        let mut tx = store.begin_graph_transaction().await.unwrap();
        let mut item = NewWorkItem::new("Chassis", 4, 0);
        item.responsibles = vec!["Ada".to_string(), "Lin".to_string()];
        item.feedback = Some("looks solid".to_string());
        let chassis = tx.insert_stage(project_id, &item).unwrap();
        let wheels = tx
            .insert_task(chassis, &NewWorkItem::new("Wheels", 2, 1))
            .unwrap();
        let frame = tx
            .insert_task(chassis, &NewWorkItem::new("Frame", 1, 0))
            .unwrap();
        tx.set_task_dependencies(wheels, &[frame]).unwrap();
        tx.commit().unwrap();
        project_id
    };

    let store = SqlitePlanStore::new(&path).unwrap();
    let stages = store.get_stages(project_id).await.unwrap();
    assert_eq!(stages.len(), 1);

    let chassis = &stages[0];
    assert_eq!(chassis.duration, 4);
    assert_eq!(chassis.responsibles, vec!["Ada", "Lin"]);
    assert_eq!(chassis.feedback.as_deref(), Some("looks solid"));

    let names: Vec<_> = chassis.tasks.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Frame", "Wheels"]);
    assert_eq!(chassis.tasks[1].dependencies, vec![chassis.tasks[0].id]);
}

#[tokio::test]
async fn test_failed_unit_of_work_leaves_previous_graph() {
    let dir = TempDir::new().unwrap();
    let store = SqlitePlanStore::new(dir.path().join("plans.db")).unwrap();
    let project_id = project_in(&store).await;

    let mut tx = store.begin_graph_transaction().await.unwrap();
    tx.insert_stage(project_id, &NewWorkItem::new("Original", 1, 0))
        .unwrap();
    tx.commit().unwrap();

    let mut tx = store.begin_graph_transaction().await.unwrap();
    tx.detach_stages(project_id).unwrap();
    let err = tx
        .insert_stage(project_id, &NewWorkItem::new("Broken", 0, 0))
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Constraint);
    tx.rollback().unwrap();

    let stages = store.get_stages(project_id).await.unwrap();
    assert_eq!(stages.len(), 1);
    assert_eq!(stages[0].name, "Original");
}

#[tokio::test]
async fn test_stage_for_missing_project_is_rejected() {
    let store = SqlitePlanStore::in_memory().unwrap();

    let mut tx = store.begin_graph_transaction().await.unwrap();
    let err = tx
        .insert_stage(9999, &NewWorkItem::new("Nowhere", 1, 0))
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Constraint);
}

#[tokio::test]
async fn test_missing_parent_directories_are_created() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data").join("nested").join("plans.db");

    let store = SqlitePlanStore::new(&path).unwrap();
    project_in(&store).await;

    assert!(path.exists());
}

#[tokio::test]
async fn test_unwritable_parent_is_io_error() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let err = match SqlitePlanStore::new(blocker.join("plans.db")) {
        Ok(_) => panic!("expected an I/O error"),
        Err(e) => e,
    };
    assert_eq!(err.kind, ErrorKind::IO);
}
