//! Derivation of the transfer endpoints from a job row

use common::config::TransferConfig;
use job_db::JobDetails;
use url::Url;

/// Storage class applied to both sides of the transfer.
const STORAGE_CLASS: &str = "STANDARD";

/// Prefix under which the compute service writes job output in the internal
/// bucket.
const SOURCE_OUTPUT_PREFIX: &str = "output";

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("invalid destination uri '{uri}': {source}")]
    InvalidDestinationUri {
        uri: String,
        #[source]
        source: url::ParseError,
    },

    #[error("destination uri '{0}' names no bucket")]
    MissingDestinationBucket(String),
}

/// One side of the transfer: the bucket, the sub-path within it, and the
/// role DataSync assumes to access it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationSpec {
    pub bucket_arn: String,
    pub subdirectory: String,
    pub storage_class: &'static str,
    pub access_role_arn: String,
}

/// Fully derived description of one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPlan {
    pub source: LocationSpec,
    pub destination: LocationSpec,

    /// Region of the destination bucket. The destination endpoint, the task
    /// and its execution are created against this region.
    pub destination_region: String,
}

impl TransferPlan {
    /// Derive the transfer plan for a finished job.
    ///
    /// The source side is the job's output prefix in the internal bucket;
    /// the destination side is parsed from the row's destination URI, with
    /// the internal job id appended so concurrent jobs sharing a destination
    /// prefix land in distinct sub-paths.
    pub fn derive(job: &JobDetails, config: &TransferConfig) -> Result<Self, PlanError> {
        let destination_uri =
            Url::parse(&job.destination).map_err(|source| PlanError::InvalidDestinationUri {
                uri: job.destination.clone(),
                source,
            })?;
        let destination_bucket = destination_uri
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| PlanError::MissingDestinationBucket(job.destination.clone()))?;

        let source = LocationSpec {
            bucket_arn: config.source_bucket_arn.clone(),
            subdirectory: format!("{SOURCE_OUTPUT_PREFIX}/{}/", job.id),
            storage_class: STORAGE_CLASS,
            access_role_arn: config.bucket_access_role_arn.clone(),
        };
        let destination = LocationSpec {
            bucket_arn: format!("arn:aws:s3:::{destination_bucket}"),
            subdirectory: format!("{}/{}", destination_uri.path(), job.id),
            storage_class: STORAGE_CLASS,
            access_role_arn: config.bucket_access_role_arn.clone(),
        };

        Ok(Self {
            source,
            destination,
            destination_region: job.cross_bucket_region.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use job_db::{JobDetails, JobStatus};

    use super::*;

    fn test_config() -> TransferConfig {
        TransferConfig {
            source_bucket_arn: "arn:aws:s3:::internal-output".to_owned(),
            bucket_access_role_arn: "arn:aws:iam::123456789012:role/bucket-access".to_owned(),
        }
    }

    fn test_job(id: i64, destination: &str) -> JobDetails {
        JobDetails {
            id: id.to_string().parse().expect("valid job id"),
            jobid: "run-1".to_owned(),
            destination: destination.to_owned(),
            cross_bucket_region: "us-west-2".to_owned(),
            client_ip: None,
            jti: None,
            query: None,
            requestid: None,
            jobstatus: JobStatus::Success,
            task_execution_arn: None,
            data_transfer_state: None,
        }
    }

    #[test]
    fn derives_both_endpoints_from_the_row() {
        let plan = TransferPlan::derive(&test_job(42, "s3://bucket-x/path/y"), &test_config())
            .expect("plan derives");

        assert_eq!(plan.source.bucket_arn, "arn:aws:s3:::internal-output");
        assert_eq!(plan.source.subdirectory, "output/42/");
        assert_eq!(plan.destination.bucket_arn, "arn:aws:s3:::bucket-x");
        assert_eq!(plan.destination.subdirectory, "/path/y/42");
        assert_eq!(plan.destination_region, "us-west-2");
        assert_eq!(plan.source.storage_class, "STANDARD");
        assert_eq!(plan.destination.storage_class, "STANDARD");
        assert_eq!(
            plan.destination.access_role_arn,
            "arn:aws:iam::123456789012:role/bucket-access"
        );
    }

    #[test]
    fn destination_with_no_path_lands_in_the_id_subdirectory() {
        let plan = TransferPlan::derive(&test_job(7, "s3://dest-bucket/out"), &test_config())
            .expect("plan derives");

        assert_eq!(plan.destination.bucket_arn, "arn:aws:s3:::dest-bucket");
        assert_eq!(plan.destination.subdirectory, "/out/7");
        assert_eq!(plan.source.subdirectory, "output/7/");
    }

    #[test]
    fn unparseable_destination_is_rejected() {
        let err = TransferPlan::derive(&test_job(1, "not a uri"), &test_config())
            .expect_err("plan must not derive");

        assert!(matches!(err, PlanError::InvalidDestinationUri { .. }));
    }

    #[test]
    fn destination_without_a_bucket_is_rejected() {
        let err = TransferPlan::derive(&test_job(1, "s3:///path/only"), &test_config())
            .expect_err("plan must not derive");

        assert!(matches!(err, PlanError::MissingDestinationBucket(_)));
    }
}
