//! Ordered provisioning of the transfer resources

use std::sync::Arc;

use crate::{
    client::{LocationArn, SyncTransfer, TaskArn, TaskExecutionArn, TransferError},
    plan::TransferPlan,
};

/// The step at which a provisioning sequence stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    SourceLocation,
    DestinationLocation,
    Task,
    Execution,
}

impl ProvisionStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SourceLocation => "source location creation",
            Self::DestinationLocation => "destination location creation",
            Self::Task => "task creation",
            Self::Execution => "task execution start",
        }
    }
}

impl std::fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{step} failed: {source}")]
pub struct ProvisionError {
    pub step: ProvisionStep,
    #[source]
    pub source: TransferError,
}

impl ProvisionError {
    fn new(step: ProvisionStep, source: TransferError) -> Self {
        Self { step, source }
    }
}

/// Runs the provisioning sequence for one transfer plan.
///
/// The four calls are issued strictly in order; the first error aborts the
/// rest. Resources created before the failing step are deleted best-effort
/// before the error is returned, so a failed sequence does not leave
/// endpoints and tasks behind.
#[derive(Clone)]
pub struct Provisioner {
    transfer: Arc<dyn SyncTransfer>,
}

impl Provisioner {
    pub fn new(transfer: Arc<dyn SyncTransfer>) -> Self {
        Self { transfer }
    }

    #[tracing::instrument(skip_all, err)]
    pub async fn provision(&self, plan: &TransferPlan) -> Result<TaskExecutionArn, ProvisionError> {
        // The destination bucket may live in another region; everything that
        // references it runs against a client bound to that region.
        let region = Some(plan.destination_region.as_str());

        let source = self
            .transfer
            .create_location(None, &plan.source)
            .await
            .map_err(|err| ProvisionError::new(ProvisionStep::SourceLocation, err))?;
        tracing::info!(location = %source, "created source location endpoint");

        let destination = match self.transfer.create_location(region, &plan.destination).await {
            Ok(arn) => arn,
            Err(err) => {
                self.rollback(region, &source, None, None).await;
                return Err(ProvisionError::new(ProvisionStep::DestinationLocation, err));
            }
        };
        tracing::info!(location = %destination, "created destination location endpoint");

        let task = match self
            .transfer
            .create_task(region, &source, &destination)
            .await
        {
            Ok(arn) => arn,
            Err(err) => {
                self.rollback(region, &source, Some(&destination), None).await;
                return Err(ProvisionError::new(ProvisionStep::Task, err));
            }
        };
        tracing::info!(task = %task, "created transfer task");

        match self.transfer.start_task_execution(region, &task).await {
            Ok(execution) => {
                tracing::info!(execution = %execution, "started transfer task execution");
                Ok(execution)
            }
            Err(err) => {
                self.rollback(region, &source, Some(&destination), Some(&task))
                    .await;
                Err(ProvisionError::new(ProvisionStep::Execution, err))
            }
        }
    }

    /// Best-effort deletion of everything the failed sequence created, in
    /// reverse creation order. Deletion failures are logged and swallowed;
    /// the original provisioning error is what the caller needs to see.
    async fn rollback(
        &self,
        region: Option<&str>,
        source: &LocationArn,
        destination: Option<&LocationArn>,
        task: Option<&TaskArn>,
    ) {
        if let Some(task) = task {
            if let Err(err) = self.transfer.delete_task(region, task).await {
                tracing::warn!(error = %err, %task, "failed to clean up transfer task");
            }
        }
        if let Some(location) = destination {
            if let Err(err) = self.transfer.delete_location(region, location).await {
                tracing::warn!(error = %err, %location, "failed to clean up destination location");
            }
        }
        if let Err(err) = self.transfer.delete_location(None, source).await {
            tracing::warn!(error = %err, location = %source, "failed to clean up source location");
        }
    }
}

#[cfg(test)]
mod tests {
    use common::config::TransferConfig;
    use job_db::{JobDetails, JobStatus};

    use super::*;
    use crate::test_utils::{FailAt, RecordingTransfer, TransferCall};
    use crate::TransferPlan;

    fn test_plan() -> TransferPlan {
        let job = JobDetails {
            id: "7".parse().expect("valid job id"),
            jobid: "run-1".to_owned(),
            destination: "s3://dest-bucket/out".to_owned(),
            cross_bucket_region: "us-west-2".to_owned(),
            client_ip: None,
            jti: None,
            query: None,
            requestid: None,
            jobstatus: JobStatus::Success,
            task_execution_arn: None,
            data_transfer_state: None,
        };
        let config = TransferConfig {
            source_bucket_arn: "arn:aws:s3:::internal-output".to_owned(),
            bucket_access_role_arn: "arn:aws:iam::123456789012:role/bucket-access".to_owned(),
        };
        TransferPlan::derive(&job, &config).expect("plan derives")
    }

    #[tokio::test]
    async fn calls_are_issued_strictly_in_order() {
        let transfer = Arc::new(RecordingTransfer::new());
        let provisioner = Provisioner::new(transfer.clone());

        let execution = provisioner
            .provision(&test_plan())
            .await
            .expect("provisioning succeeds");

        assert_eq!(execution.as_str(), "exec-1");
        let calls = transfer.calls();
        assert_eq!(calls.len(), 4);
        assert!(matches!(
            &calls[0],
            TransferCall::CreateLocation { region: None, bucket_arn, .. }
                if bucket_arn == "arn:aws:s3:::internal-output"
        ));
        assert!(matches!(
            &calls[1],
            TransferCall::CreateLocation { region: Some(region), bucket_arn, .. }
                if region == "us-west-2" && bucket_arn == "arn:aws:s3:::dest-bucket"
        ));
        assert!(matches!(
            &calls[2],
            TransferCall::CreateTask { region: Some(region), source, destination }
                if region == "us-west-2" && source == "loc-1" && destination == "loc-2"
        ));
        assert!(matches!(
            &calls[3],
            TransferCall::StartTaskExecution { region: Some(region), task }
                if region == "us-west-2" && task == "task-1"
        ));
    }

    #[tokio::test]
    async fn destination_failure_stops_the_sequence_and_cleans_up() {
        let transfer = Arc::new(RecordingTransfer::failing_at(FailAt::DestinationLocation));
        let provisioner = Provisioner::new(transfer.clone());

        let err = provisioner
            .provision(&test_plan())
            .await
            .expect_err("provisioning must fail");

        assert_eq!(err.step, ProvisionStep::DestinationLocation);
        let calls = transfer.calls();
        // No task was ever created or started
        assert!(!calls
            .iter()
            .any(|call| matches!(call, TransferCall::CreateTask { .. })));
        assert!(!calls
            .iter()
            .any(|call| matches!(call, TransferCall::StartTaskExecution { .. })));
        // The already-created source location was deleted
        assert!(calls.iter().any(|call| matches!(
            call,
            TransferCall::DeleteLocation { location, .. } if location == "loc-1"
        )));
    }

    #[tokio::test]
    async fn execution_failure_cleans_up_all_three_resources() {
        let transfer = Arc::new(RecordingTransfer::failing_at(FailAt::Execution));
        let provisioner = Provisioner::new(transfer.clone());

        let err = provisioner
            .provision(&test_plan())
            .await
            .expect_err("provisioning must fail");

        assert_eq!(err.step, ProvisionStep::Execution);
        let calls = transfer.calls();
        assert!(calls.iter().any(|call| matches!(
            call,
            TransferCall::DeleteTask { task, .. } if task == "task-1"
        )));
        let deleted_locations = calls
            .iter()
            .filter(|call| matches!(call, TransferCall::DeleteLocation { .. }))
            .count();
        assert_eq!(deleted_locations, 2);
    }

    #[tokio::test]
    async fn cleanup_failures_do_not_mask_the_original_error() {
        let transfer = Arc::new(
            RecordingTransfer::failing_at(FailAt::Task).with_failing_cleanup(),
        );
        let provisioner = Provisioner::new(transfer.clone());

        let err = provisioner
            .provision(&test_plan())
            .await
            .expect_err("provisioning must fail");

        assert_eq!(err.step, ProvisionStep::Task);
    }
}
