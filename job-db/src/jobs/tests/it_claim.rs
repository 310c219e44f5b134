//! DB integration tests for the claim and reconcile operations

use pgtemp::PgTempDB;

use crate::{
    test_utils::{connect_with_retry, insert_job, NewJob},
    ClaimOutcome, JobDb, JobStatus, TransferState,
};

fn seed_job() -> NewJob<'static> {
    NewJob {
        run_id: "run-1",
        destination: "s3://dest-bucket/out",
        cross_bucket_region: "us-west-2",
    }
}

async fn connect(temp_db: &PgTempDB) -> JobDb {
    connect_with_retry(&temp_db.connection_uri(), 2)
        .await
        .expect("Failed to connect to job db")
}

#[tokio::test]
async fn claim_of_unknown_run_id_is_not_found() {
    //* Given
    let temp_db = PgTempDB::new();
    let job_db = connect(&temp_db).await;

    //* When
    let outcome = job_db
        .claim_for_transfer("run-missing")
        .await
        .expect("Failed to claim");

    //* Then
    assert!(matches!(outcome, ClaimOutcome::NotFound));
}

#[tokio::test]
async fn fresh_claim_returns_the_row_and_marks_it_provisioning() {
    //* Given
    let temp_db = PgTempDB::new();
    let job_db = connect(&temp_db).await;

    let id = insert_job(&job_db, seed_job())
        .await
        .expect("Failed to insert job");

    //* When
    let outcome = job_db
        .claim_for_transfer("run-1")
        .await
        .expect("Failed to claim");

    //* Then
    let ClaimOutcome::Claimed(job) = outcome else {
        panic!("expected the claim to succeed, got {outcome:?}");
    };
    assert_eq!(job.id, id);
    assert_eq!(job.jobid, "run-1");
    assert_eq!(job.destination, "s3://dest-bucket/out");
    assert_eq!(job.cross_bucket_region, "us-west-2");
    // The returned row reflects the pre-claim state
    assert_eq!(job.data_transfer_state, None);

    let row = job_db
        .get_by_run_id("run-1")
        .await
        .expect("Failed to get job")
        .expect("Job not found");
    assert_eq!(row.data_transfer_state, Some(TransferState::Provisioning));
}

#[tokio::test]
async fn second_claim_observes_the_first() {
    //* Given
    let temp_db = PgTempDB::new();
    let job_db = connect(&temp_db).await;

    insert_job(&job_db, seed_job())
        .await
        .expect("Failed to insert job");

    //* When
    let first = job_db
        .claim_for_transfer("run-1")
        .await
        .expect("Failed to claim");
    let second = job_db
        .claim_for_transfer("run-1")
        .await
        .expect("Failed to claim");

    //* Then
    assert!(matches!(first, ClaimOutcome::Claimed(_)));
    assert!(matches!(
        second,
        ClaimOutcome::AlreadyClaimed(TransferState::Provisioning)
    ));
}

#[tokio::test]
async fn claim_after_initiation_is_a_no_op() {
    //* Given
    let temp_db = PgTempDB::new();
    let job_db = connect(&temp_db).await;

    let id = insert_job(&job_db, seed_job())
        .await
        .expect("Failed to insert job");
    job_db
        .claim_for_transfer("run-1")
        .await
        .expect("Failed to claim");
    job_db
        .record_execution(id, "arn:aws:datasync:us-west-2:123456789012:task/task-1/execution/exec-1")
        .await
        .expect("Failed to record execution");

    //* When
    let outcome = job_db
        .claim_for_transfer("run-1")
        .await
        .expect("Failed to claim");

    //* Then
    assert!(matches!(
        outcome,
        ClaimOutcome::AlreadyClaimed(TransferState::Initiated)
    ));
}

#[tokio::test]
async fn mark_transfer_failed_sets_the_status_and_releases_the_claim() {
    //* Given
    let temp_db = PgTempDB::new();
    let job_db = connect(&temp_db).await;

    let id = insert_job(&job_db, seed_job())
        .await
        .expect("Failed to insert job");
    job_db
        .claim_for_transfer("run-1")
        .await
        .expect("Failed to claim");

    //* When
    job_db
        .mark_transfer_failed(id)
        .await
        .expect("Failed to mark failed");

    //* Then
    let row = job_db
        .get_by_run_id("run-1")
        .await
        .expect("Failed to get job")
        .expect("Job not found");
    assert_eq!(row.jobstatus, JobStatus::Failed);
    assert_eq!(row.task_execution_arn, None);
    assert_eq!(row.data_transfer_state, None);
}

#[tokio::test]
async fn record_execution_writes_handle_and_state_together() {
    //* Given
    let temp_db = PgTempDB::new();
    let job_db = connect(&temp_db).await;

    let id = insert_job(&job_db, seed_job())
        .await
        .expect("Failed to insert job");
    job_db
        .claim_for_transfer("run-1")
        .await
        .expect("Failed to claim");

    //* When
    job_db
        .record_execution(id, "arn:aws:datasync:us-west-2:123456789012:task/task-1/execution/exec-1")
        .await
        .expect("Failed to record execution");

    //* Then
    let row = job_db
        .get_by_run_id("run-1")
        .await
        .expect("Failed to get job")
        .expect("Job not found");
    assert_eq!(
        row.task_execution_arn.as_deref(),
        Some("arn:aws:datasync:us-west-2:123456789012:task/task-1/execution/exec-1")
    );
    assert_eq!(row.data_transfer_state, Some(TransferState::Initiated));
    // The job status itself is untouched on the success path
    assert_eq!(row.jobstatus, JobStatus::Success);
}
