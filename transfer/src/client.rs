//! DataSync client seam

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_datasync::{
    config::Region,
    types::{S3Config, S3StorageClass},
    Client,
};
use common::BoxError;

use crate::plan::LocationSpec;

/// Handle of a provisioned location endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocationArn(String);

/// Handle of a transfer task linking two location endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskArn(String);

/// Handle of a started transfer task execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskExecutionArn(String);

macro_rules! arn_newtype {
    ($name:ident) => {
        impl $name {
            pub fn new(arn: impl Into<String>) -> Self {
                Self(arn.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

arn_newtype!(LocationArn);
arn_newtype!(TaskArn);
arn_newtype!(TaskExecutionArn);

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("error creating location endpoint: {0}")]
    CreateLocation(#[source] BoxError),

    #[error("error creating transfer task: {0}")]
    CreateTask(#[source] BoxError),

    #[error("error starting task execution: {0}")]
    StartTaskExecution(#[source] BoxError),

    #[error("error deleting location endpoint: {0}")]
    DeleteLocation(#[source] BoxError),

    #[error("error deleting transfer task: {0}")]
    DeleteTask(#[source] BoxError),

    #[error("transfer service returned no {0} handle")]
    MissingHandle(&'static str),
}

/// The provisioning operations the transfer service exposes.
///
/// Every call takes an optional region override: the destination bucket may
/// live in a different region than the ambient one, and endpoints must be
/// created against the region their bucket resides in.
#[async_trait]
pub trait SyncTransfer: Send + Sync {
    async fn create_location(
        &self,
        region: Option<&str>,
        spec: &LocationSpec,
    ) -> Result<LocationArn, TransferError>;

    async fn create_task(
        &self,
        region: Option<&str>,
        source: &LocationArn,
        destination: &LocationArn,
    ) -> Result<TaskArn, TransferError>;

    async fn start_task_execution(
        &self,
        region: Option<&str>,
        task: &TaskArn,
    ) -> Result<TaskExecutionArn, TransferError>;

    async fn delete_location(
        &self,
        region: Option<&str>,
        location: &LocationArn,
    ) -> Result<(), TransferError>;

    async fn delete_task(&self, region: Option<&str>, task: &TaskArn)
        -> Result<(), TransferError>;
}

/// [`SyncTransfer`] implementation over AWS DataSync.
///
/// Holds a client bound to the ambient region and rebinds a client from the
/// same shared configuration when a call targets another region.
#[derive(Debug, Clone)]
pub struct DataSyncTransfer {
    sdk_config: SdkConfig,
    default_client: Client,
}

impl DataSyncTransfer {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            default_client: Client::new(sdk_config),
            sdk_config: sdk_config.clone(),
        }
    }

    fn client(&self, region: Option<&str>) -> Client {
        let ambient_region = self.sdk_config.region().map(|region| region.as_ref());
        match region {
            Some(region) if Some(region) != ambient_region => {
                let config = aws_sdk_datasync::config::Builder::from(&self.sdk_config)
                    .region(Region::new(region.to_owned()))
                    .build();
                Client::from_conf(config)
            }
            _ => self.default_client.clone(),
        }
    }
}

#[async_trait]
impl SyncTransfer for DataSyncTransfer {
    async fn create_location(
        &self,
        region: Option<&str>,
        spec: &LocationSpec,
    ) -> Result<LocationArn, TransferError> {
        let s3_config = S3Config::builder()
            .bucket_access_role_arn(&spec.access_role_arn)
            .build()
            .map_err(|err| TransferError::CreateLocation(err.into()))?;

        let output = self
            .client(region)
            .create_location_s3()
            .s3_bucket_arn(&spec.bucket_arn)
            .subdirectory(&spec.subdirectory)
            .s3_storage_class(S3StorageClass::from(spec.storage_class))
            .s3_config(s3_config)
            .send()
            .await
            .map_err(|err| TransferError::CreateLocation(err.into()))?;

        output
            .location_arn()
            .map(LocationArn::new)
            .ok_or(TransferError::MissingHandle("location"))
    }

    async fn create_task(
        &self,
        region: Option<&str>,
        source: &LocationArn,
        destination: &LocationArn,
    ) -> Result<TaskArn, TransferError> {
        let output = self
            .client(region)
            .create_task()
            .source_location_arn(source.as_str())
            .destination_location_arn(destination.as_str())
            .send()
            .await
            .map_err(|err| TransferError::CreateTask(err.into()))?;

        output
            .task_arn()
            .map(TaskArn::new)
            .ok_or(TransferError::MissingHandle("task"))
    }

    async fn start_task_execution(
        &self,
        region: Option<&str>,
        task: &TaskArn,
    ) -> Result<TaskExecutionArn, TransferError> {
        let output = self
            .client(region)
            .start_task_execution()
            .task_arn(task.as_str())
            .send()
            .await
            .map_err(|err| TransferError::StartTaskExecution(err.into()))?;

        output
            .task_execution_arn()
            .map(TaskExecutionArn::new)
            .ok_or(TransferError::MissingHandle("task execution"))
    }

    async fn delete_location(
        &self,
        region: Option<&str>,
        location: &LocationArn,
    ) -> Result<(), TransferError> {
        self.client(region)
            .delete_location()
            .location_arn(location.as_str())
            .send()
            .await
            .map_err(|err| TransferError::DeleteLocation(err.into()))?;
        Ok(())
    }

    async fn delete_task(
        &self,
        region: Option<&str>,
        task: &TaskArn,
    ) -> Result<(), TransferError> {
        self.client(region)
            .delete_task()
            .task_arn(task.as_str())
            .send()
            .await
            .map_err(|err| TransferError::DeleteTask(err.into()))?;
        Ok(())
    }
}
