//! Test utilities for job DB backed tests

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tracing::warn;

use crate::{jobs::JobId, Error, JobDb, JobStatus};

/// Connect to the job DB with retry logic to handle startup timing issues
///
/// This is specifically designed for tests using pgtemp where PostgreSQL
/// may not be immediately ready to accept connections after startup.
pub async fn connect_with_retry(url: &str, pool_size: u32) -> Result<JobDb, Error> {
    (|| JobDb::connect(url, pool_size))
        .retry(test_retry_policy())
        .when(is_database_starting_up)
        .notify(|err, dur| {
            warn!(
                error = %err,
                "Database still starting up during test connection. Retrying in {:.1}s",
                dur.as_secs_f32()
            );
        })
        .await
}

/// Exponential backoff optimized for test environments: fast initial
/// retries, short max delay, many attempts since startup is expected to be
/// quick.
fn test_retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(10))
        .with_max_delay(Duration::from_millis(100))
        .with_max_times(20)
}

/// Check if an [`Error`] is due to database startup
fn is_database_starting_up(err: &Error) -> bool {
    match err {
        Error::ConnectionError(sqlx::Error::Database(db_err)) => db_err
            .to_string()
            .contains("the database system is starting up"),
        _ => false,
    }
}

/// A job row as the upstream ingest path would create it.
#[derive(Debug, Clone)]
pub struct NewJob<'a> {
    pub run_id: &'a str,
    pub destination: &'a str,
    pub cross_bucket_region: &'a str,
}

/// Insert a job row.
///
/// The handoff service never creates rows itself; tests use this to stand in
/// for the upstream ingest path. The row is inserted as a successfully
/// completed job with representative request context.
pub async fn insert_job(db: &JobDb, job: NewJob<'_>) -> Result<JobId, Error> {
    let query = indoc::indoc! {"
        INSERT INTO emr_job_details
            (jobid, destination, cross_bucket_region, client_ip, jti, query, requestid, jobstatus)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id
    "};

    let id = sqlx::query_scalar(query)
        .bind(job.run_id)
        .bind(job.destination)
        .bind(job.cross_bucket_region)
        .bind("203.0.113.7")
        .bind("jti-test")
        .bind("SELECT 1")
        .bind("req-test")
        .bind(JobStatus::Success)
        .fetch_one(&*db.pool)
        .await?;
    Ok(id)
}
