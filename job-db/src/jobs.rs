//! Job row types and queries

use sqlx::{Executor, Postgres};

/// A compute job as recorded by the upstream ingest path, plus the transfer
/// columns owned by this service.
///
/// Fields are decoded by column name, never by position.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobDetails {
    /// Internal identifier for the job
    pub id: JobId,

    /// External job-run identifier assigned by the compute service
    pub jobid: String,

    /// Destination URI (`s3://bucket/path`) where the output must land
    pub destination: String,

    /// Region of the destination bucket
    pub cross_bucket_region: String,

    /// Request context, passed through to telemetry only
    pub client_ip: Option<String>,
    pub jti: Option<String>,
    pub query: Option<String>,
    pub requestid: Option<String>,

    /// Current status of the job; this service only ever writes `FAILED`
    pub jobstatus: JobStatus,

    /// Handle of the started transfer execution, set on success
    pub task_execution_arn: Option<String>,

    /// Progress of the data handoff for this row
    pub data_transfer_state: Option<TransferState>,
}

/// Result of attempting to claim a job row for transfer provisioning.
#[derive(Debug, Clone)]
pub enum ClaimOutcome {
    /// No row matches the run id.
    NotFound,

    /// A previous delivery already claimed or initiated the transfer.
    AlreadyClaimed(TransferState),

    /// The row was claimed; the caller owns provisioning now.
    Claimed(JobDetails),
}

/// Look up a job row by its external run id.
pub async fn get_by_run_id<'c, E>(exe: E, run_id: &str) -> Result<Option<JobDetails>, sqlx::Error>
where
    E: Executor<'c, Database = Postgres>,
{
    let query = indoc::indoc! {"
        SELECT id, jobid, destination, cross_bucket_region, client_ip, jti, query,
               requestid, jobstatus, task_execution_arn, data_transfer_state
        FROM emr_job_details
        WHERE jobid = $1
    "};

    let job = sqlx::query_as(query).bind(run_id).fetch_optional(exe).await?;
    Ok(job)
}

/// Look up a job row by its external run id, locking it for the rest of the
/// transaction.
pub async fn get_by_run_id_for_update<'c, E>(
    exe: E,
    run_id: &str,
) -> Result<Option<JobDetails>, sqlx::Error>
where
    E: Executor<'c, Database = Postgres>,
{
    let query = indoc::indoc! {"
        SELECT id, jobid, destination, cross_bucket_region, client_ip, jti, query,
               requestid, jobstatus, task_execution_arn, data_transfer_state
        FROM emr_job_details
        WHERE jobid = $1
        FOR UPDATE
    "};

    let job = sqlx::query_as(query).bind(run_id).fetch_optional(exe).await?;
    Ok(job)
}

/// Set the transfer state of a job row.
pub(crate) async fn set_transfer_state<'c, E>(
    exe: E,
    id: JobId,
    state: TransferState,
) -> Result<(), sqlx::Error>
where
    E: Executor<'c, Database = Postgres>,
{
    let query = indoc::indoc! {"
        UPDATE emr_job_details
        SET data_transfer_state = $1
        WHERE id = $2
    "};

    sqlx::query(query).bind(state).bind(id).execute(exe).await?;
    Ok(())
}

/// Mark provisioning as failed and release the claim.
///
/// Only the status and the claim marker are touched; the execution handle
/// stays unset.
#[tracing::instrument(skip(exe), err)]
pub async fn mark_transfer_failed<'c, E>(exe: E, id: JobId) -> Result<(), sqlx::Error>
where
    E: Executor<'c, Database = Postgres>,
{
    let query = indoc::indoc! {"
        UPDATE emr_job_details
        SET jobstatus = $1, data_transfer_state = NULL
        WHERE id = $2
    "};

    sqlx::query(query)
        .bind(JobStatus::Failed)
        .bind(id)
        .execute(exe)
        .await?;
    Ok(())
}

/// Record the handle of a started transfer execution.
///
/// The handle and the `INITIATED` state are written in a single statement.
#[tracing::instrument(skip(exe), err)]
pub async fn record_execution<'c, E>(
    exe: E,
    id: JobId,
    execution_arn: &str,
) -> Result<(), sqlx::Error>
where
    E: Executor<'c, Database = Postgres>,
{
    let query = indoc::indoc! {"
        UPDATE emr_job_details
        SET task_execution_arn = $1, data_transfer_state = $2
        WHERE id = $3
    "};

    sqlx::query(query)
        .bind(execution_arn)
        .bind(TransferState::Initiated)
        .bind(id)
        .execute(exe)
        .await?;
    Ok(())
}

/// A unique identifier for a job row
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    sqlx::Type,
    serde::Serialize,
    serde::Deserialize,
)]
#[repr(transparent)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct JobId(i64);

impl JobId {
    /// Convert the [`JobId`] to an `i64`
    pub fn to_i64(self) -> i64 {
        self.0
    }
}

impl From<JobId> for i64 {
    fn from(id: JobId) -> Self {
        id.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error parsing a [`JobId`] from a string
#[derive(Debug, thiserror::Error)]
#[error("invalid job id: {0}")]
pub struct JobIdFromStrError(#[source] std::num::ParseIntError);

impl std::str::FromStr for JobId {
    type Err = JobIdFromStrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>().map(Self).map_err(JobIdFromStrError)
    }
}

/// Status of a compute job
///
/// The status column is owned by the upstream job lifecycle; the handoff
/// service only ever writes [`JobStatus::Failed`], and treats any value it
/// does not recognize as [`JobStatus::Unknown`] rather than failing the
/// decode.
///
/// The status is stored as a `TEXT` column in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[non_exhaustive]
pub enum JobStatus {
    /// Job has been accepted but has not started running
    Pending,

    /// Job is running on the compute service
    Running,

    /// Job finished successfully
    Success,

    /// Job (or its data handoff) failed
    ///
    /// This is a terminal state.
    Failed,

    /// Job was cancelled
    ///
    /// This is a terminal state.
    Cancelled,

    /// Unrecognized status value
    Unknown,
}

impl JobStatus {
    /// Convert the [`JobStatus`] to a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Use `eq_ignore_ascii_case` to make the comparison case-insensitive
        match s {
            s if s.eq_ignore_ascii_case("PENDING") => Ok(Self::Pending),
            s if s.eq_ignore_ascii_case("RUNNING") => Ok(Self::Running),
            s if s.eq_ignore_ascii_case("SUCCESS") => Ok(Self::Success),
            s if s.eq_ignore_ascii_case("FAILED") => Ok(Self::Failed),
            s if s.eq_ignore_ascii_case("CANCELLED") => Ok(Self::Cancelled),
            _ => Ok(Self::Unknown),
        }
    }
}

impl serde::Serialize for JobStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for JobStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s: &str = serde::Deserialize::deserialize(deserializer)?;
        // Since FromStr::Err is Infallible, unwrap is safe.
        Ok(s.parse().unwrap())
    }
}

impl sqlx::Type<sqlx::Postgres> for JobStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("TEXT")
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for JobStatus {
    fn decode(
        value: <sqlx::Postgres as sqlx::Database>::ValueRef<'r>,
    ) -> Result<Self, sqlx::error::BoxDynError> {
        let value: &str = sqlx::Decode::<sqlx::Postgres>::decode(value)?;
        // Since FromStr::Err is Infallible, unwrap is safe.
        Ok(value.parse().unwrap())
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for JobStatus {
    fn encode_by_ref(
        &self,
        buf: &mut <sqlx::Postgres as sqlx::Database>::ArgumentBuffer<'q>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        sqlx::Encode::<sqlx::Postgres>::encode_by_ref(&self.as_str(), buf)
    }
}

/// Progress of the data handoff for one job row
///
/// Stored as a nullable `TEXT` column: `NULL` means no delivery has claimed
/// the row yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[non_exhaustive]
pub enum TransferState {
    /// A delivery claimed the row and is provisioning the transfer
    Provisioning,

    /// The transfer execution was started and its handle recorded
    ///
    /// This is a terminal state.
    Initiated,

    /// Unrecognized state value
    Unknown,
}

impl TransferState {
    /// Convert the [`TransferState`] to a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Provisioning => "PROVISIONING",
            Self::Initiated => "INITIATED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for TransferState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransferState {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            s if s.eq_ignore_ascii_case("PROVISIONING") => Ok(Self::Provisioning),
            s if s.eq_ignore_ascii_case("INITIATED") => Ok(Self::Initiated),
            _ => Ok(Self::Unknown),
        }
    }
}

impl serde::Serialize for TransferState {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for TransferState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s: &str = serde::Deserialize::deserialize(deserializer)?;
        // Since FromStr::Err is Infallible, unwrap is safe.
        Ok(s.parse().unwrap())
    }
}

impl sqlx::Type<sqlx::Postgres> for TransferState {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("TEXT")
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for TransferState {
    fn decode(
        value: <sqlx::Postgres as sqlx::Database>::ValueRef<'r>,
    ) -> Result<Self, sqlx::error::BoxDynError> {
        let value: &str = sqlx::Decode::<sqlx::Postgres>::decode(value)?;
        // Since FromStr::Err is Infallible, unwrap is safe.
        Ok(value.parse().unwrap())
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for TransferState {
    fn encode_by_ref(
        &self,
        buf: &mut <sqlx::Postgres as sqlx::Database>::ArgumentBuffer<'q>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        sqlx::Encode::<sqlx::Postgres>::encode_by_ref(&self.as_str(), buf)
    }
}

/// In-tree integration tests
#[cfg(test)]
mod tests {
    mod it_claim;
}
