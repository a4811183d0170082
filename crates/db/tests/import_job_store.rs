//! Integration tests for the Postgres import job store.
//!
//! These need a live database (`DATABASE_URL`) and are ignored by default:
//! `cargo test -p reconcile-db -- --ignored`.

use std::collections::BTreeMap;

use chrono::{Duration, Utc};
use sqlx::PgPool;

use reconcile_core::jobs::{
    ImportJobStore, ImportProgress, JobStatus, NewImportJob, ProcessOptions,
};
use reconcile_core::orchestrator::ImportPhase;
use reconcile_core::parser::ParsedTable;
use reconcile_core::workflow::WorkflowKind;
use reconcile_db::PgImportJobStore;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_job() -> NewImportJob {
    NewImportJob {
        program_id: uuid::Uuid::new_v4(),
        mapping_id: "germplasm-import".to_string(),
        workflow: WorkflowKind::Germplasm,
        file_name: Some("crosses.csv".to_string()),
        user_fields: BTreeMap::from([("listName".to_string(), "Spring".to_string())]),
        created_by: Some("breeder".to_string()),
        table: ParsedTable::new(
            vec!["Name".to_string()],
            vec![vec!["A".to_string()], vec!["B".to_string()]],
        ),
    }
}

// ---------------------------------------------------------------------------
// Test: bootstrap
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn status_lookup_is_seeded(pool: PgPool) {
    reconcile_db::health_check(&pool).await.unwrap();
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM import_job_statuses")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count.0, 4);
}

// ---------------------------------------------------------------------------
// Test: lifecycle
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn job_lifecycle_round_trips(pool: PgPool) {
    let store = PgImportJobStore::new(pool);

    let job = store.create(new_job()).await.unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.total_rows(), 2);

    let claimed = store.claim(job.id).await.unwrap().unwrap();
    assert_eq!(claimed.status, JobStatus::Processing);
    assert!(store.claim(job.id).await.unwrap().is_none());

    let running = ImportProgress::running(ImportPhase::Resolving, 0, 2);
    store
        .update_phase(job.id, ImportPhase::Resolving, &running)
        .await
        .unwrap();

    let done = ImportProgress::succeeded("Preview ready", 2);
    assert!(store.finish(job.id, JobStatus::Succeeded, &done, None).await.unwrap());
    assert!(!store.finish(job.id, JobStatus::Failed, &done, None).await.unwrap());

    let stored = store.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Succeeded);
    assert_eq!(stored.phase, ImportPhase::Done);
    assert_eq!(stored.progress.unwrap().statuscode, 200);
    assert!(stored.finished_at.is_some());

    let options = ProcessOptions {
        commit: true,
        ..ProcessOptions::default()
    };
    let requeued = store.requeue(job.id, &options).await.unwrap().unwrap();
    assert_eq!(requeued.status, JobStatus::Queued);
    assert!(requeued.options.commit);
    assert!(requeued.progress.is_none());

    store.claim(job.id).await.unwrap();
    let committed = ImportProgress::succeeded("Import committed", 2);
    store
        .finish(job.id, JobStatus::Succeeded, &committed, None)
        .await
        .unwrap();
    assert!(store.requeue(job.id, &options).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Test: restart recovery
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn interrupted_jobs_return_to_the_queue(pool: PgPool) {
    let store = PgImportJobStore::new(pool);
    let queued = store.create(new_job()).await.unwrap();
    let running = store.create(new_job()).await.unwrap();
    store.claim(running.id).await.unwrap();

    let ids = store.requeue_interrupted().await.unwrap();

    assert_eq!(ids, vec![queued.id, running.id]);
    let reset = store.find_by_id(running.id).await.unwrap().unwrap();
    assert_eq!(reset.status, JobStatus::Queued);
    assert_eq!(reset.phase, ImportPhase::Received);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn retention_only_removes_terminal_jobs(pool: PgPool) {
    let store = PgImportJobStore::new(pool);
    let queued = store.create(new_job()).await.unwrap();
    let finished = store.create(new_job()).await.unwrap();
    store.claim(finished.id).await.unwrap();
    let done = ImportProgress::succeeded("Preview ready", 2);
    store
        .finish(finished.id, JobStatus::Succeeded, &done, None)
        .await
        .unwrap();

    let deleted = store
        .delete_older_than(Utc::now() + Duration::minutes(1))
        .await
        .unwrap();

    assert_eq!(deleted, 1);
    assert!(store.find_by_id(queued.id).await.unwrap().is_some());
    assert!(store.find_by_id(finished.id).await.unwrap().is_none());
}
