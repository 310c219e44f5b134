//! Job metadata database access
//!
//! One row per compute job, created by the upstream ingest path. This crate
//! reads the row by its external run id and records the outcome of the data
//! handoff on it; it never creates or deletes rows.

use tracing::instrument;

mod conn;
pub mod jobs;
pub mod test_utils;

pub use self::conn::{ConnError, DbConnPool};
pub use self::jobs::{
    ClaimOutcome, JobDetails, JobId, JobIdFromStrError, JobStatus, TransferState,
};

/// Default pool size for the job DB.
pub const DEFAULT_POOL_SIZE: u32 = 10;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Error connecting to job db: {0}")]
    ConnectionError(sqlx::Error),

    #[error("Error running migrations: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Error executing database query: {0}")]
    DbError(#[from] sqlx::Error),
}

impl From<ConnError> for Error {
    fn from(err: ConnError) -> Self {
        match err {
            ConnError::ConnectionError(err) => Error::ConnectionError(err),
            ConnError::MigrationFailed(err) => Error::MigrationError(err),
        }
    }
}

/// Connection pool to the job DB. Clones will refer to the same instance.
#[derive(Debug, Clone)]
pub struct JobDb {
    pub pool: DbConnPool,
}

impl JobDb {
    /// Sets up a connection pool to the job DB
    ///
    /// Runs migrations if necessary.
    #[instrument(skip_all, err)]
    pub async fn connect(url: &str, pool_size: u32) -> Result<Self, Error> {
        let pool = DbConnPool::connect(url, pool_size).await?;
        pool.run_migrations().await?;
        Ok(Self { pool })
    }

    /// Look up a job row by its external run id.
    pub async fn get_by_run_id(&self, run_id: &str) -> Result<Option<JobDetails>, Error> {
        Ok(jobs::get_by_run_id(&*self.pool, run_id).await?)
    }

    /// Claim the job row for transfer provisioning.
    ///
    /// Runs one transaction: the row is locked, and claimed by setting
    /// `data_transfer_state = PROVISIONING` unless a previous delivery
    /// already claimed or initiated the transfer. Concurrent deliveries for
    /// the same run id serialize on the row lock, so at most one caller
    /// observes [`ClaimOutcome::Claimed`].
    #[instrument(skip(self), err)]
    pub async fn claim_for_transfer(&self, run_id: &str) -> Result<ClaimOutcome, Error> {
        let mut txn = self.pool.begin().await?;

        let Some(job) = jobs::get_by_run_id_for_update(&mut *txn, run_id).await? else {
            return Ok(ClaimOutcome::NotFound);
        };

        match job.data_transfer_state {
            Some(state @ (TransferState::Provisioning | TransferState::Initiated)) => {
                Ok(ClaimOutcome::AlreadyClaimed(state))
            }
            _ => {
                jobs::set_transfer_state(&mut *txn, job.id, TransferState::Provisioning).await?;
                txn.commit().await?;
                Ok(ClaimOutcome::Claimed(job))
            }
        }
    }

    /// Record a failed provisioning attempt.
    ///
    /// Sets `jobstatus = FAILED` and releases the claim; the execution handle
    /// stays unset. This is the sole database mutation on the failure path.
    pub async fn mark_transfer_failed(&self, id: JobId) -> Result<(), Error> {
        jobs::mark_transfer_failed(&*self.pool, id).await?;
        Ok(())
    }

    /// Record the handle of a started transfer execution.
    ///
    /// `task_execution_arn` and `data_transfer_state = INITIATED` are written
    /// in a single statement.
    pub async fn record_execution(&self, id: JobId, execution_arn: &str) -> Result<(), Error> {
        jobs::record_execution(&*self.pool, id, execution_arn).await?;
        Ok(())
    }
}
