//! The data handoff workflow
//!
//! Strictly linear per event: gate, claim, provision, reconcile. The only
//! fork is at provisioning, and each branch ends in exactly one database
//! write.

use std::sync::Arc;

use common::config::TransferConfig;
use job_db::{ClaimOutcome, JobDb, JobDetails, JobId};
use transfer::{
    Notify, PlanError, ProvisionError, Provisioner, TaskExecutionArn, TransferPlan,
    TransferStartedEvent,
};

use crate::event::CompletionEvent;

/// Terminal result of processing one event.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The envelope came from an unrelated source; nothing was done.
    Ignored,

    /// No job row matches the run id; the lookup was the only action.
    NotFound,

    /// A previous delivery already claimed or initiated this transfer.
    AlreadyClaimed,

    /// Provisioning failed; the row was marked FAILED.
    Failed { id: JobId },

    /// The transfer execution started and its handle was recorded.
    Initiated {
        id: JobId,
        execution_arn: TaskExecutionArn,
    },
}

#[derive(Clone)]
pub struct Workflow {
    job_db: JobDb,
    transfer_config: TransferConfig,
    provisioner: Provisioner,
    notifier: Option<Arc<dyn Notify>>,
}

impl Workflow {
    pub fn new(
        job_db: JobDb,
        transfer_config: TransferConfig,
        provisioner: Provisioner,
        notifier: Option<Arc<dyn Notify>>,
    ) -> Self {
        Self {
            job_db,
            transfer_config,
            provisioner,
            notifier,
        }
    }

    /// Process one inbound envelope through the full pipeline.
    ///
    /// Provisioning failures are reconciled into the job row and surface as
    /// [`Outcome::Failed`]; only database errors are returned, for the
    /// platform's retry policy to deal with.
    #[tracing::instrument(skip_all, fields(source = %event.source))]
    pub async fn process(&self, event: &CompletionEvent) -> Result<Outcome, job_db::Error> {
        let Some(run_id) = event.job_run_id() else {
            tracing::debug!("ignoring event from unrelated source");
            return Ok(Outcome::Ignored);
        };

        let job = match self.job_db.claim_for_transfer(run_id).await? {
            ClaimOutcome::NotFound => {
                tracing::info!(run_id, "no job row found for run id");
                return Ok(Outcome::NotFound);
            }
            ClaimOutcome::AlreadyClaimed(state) => {
                tracing::info!(run_id, %state, "transfer already claimed; ignoring duplicate delivery");
                return Ok(Outcome::AlreadyClaimed);
            }
            ClaimOutcome::Claimed(job) => job,
        };

        self.run_transfer(run_id, job).await
    }

    async fn run_transfer(&self, run_id: &str, job: JobDetails) -> Result<Outcome, job_db::Error> {
        // Request context from the row rides along on the logs only.
        tracing::info!(
            id = %job.id,
            run_id,
            client_ip = job.client_ip.as_deref(),
            jti = job.jti.as_deref(),
            requestid = job.requestid.as_deref(),
            region = %job.cross_bucket_region,
            destination = %job.destination,
            "claimed job for data transfer"
        );

        let execution_arn = match self.provision(&job).await {
            Ok(execution_arn) => execution_arn,
            Err(err) => {
                tracing::error!(error = %err, id = %job.id, "data transfer initialization failed");
                self.job_db.mark_transfer_failed(job.id).await?;
                tracing::info!(id = %job.id, "marked job FAILED");
                return Ok(Outcome::Failed { id: job.id });
            }
        };

        self.job_db
            .record_execution(job.id, execution_arn.as_str())
            .await?;
        tracing::info!(id = %job.id, execution = %execution_arn, "recorded transfer execution");

        if let Some(notifier) = &self.notifier {
            let notifier = Arc::clone(notifier);
            let event = TransferStartedEvent {
                id: job.id,
                region_name: job.cross_bucket_region.clone(),
                task_execution_arn: execution_arn.as_str().to_owned(),
            };
            // One-way send: the request path never waits on the polling
            // function, and an invoke failure only shows up in the logs.
            tokio::spawn(async move {
                if let Err(err) = notifier.transfer_started(event).await {
                    tracing::error!(error = %err, "failed to notify polling function");
                }
            });
        }

        Ok(Outcome::Initiated {
            id: job.id,
            execution_arn,
        })
    }

    async fn provision(&self, job: &JobDetails) -> Result<TaskExecutionArn, ProvisionFailure> {
        let plan = TransferPlan::derive(job, &self.transfer_config)?;
        Ok(self.provisioner.provision(&plan).await?)
    }
}

/// Anything that prevents the transfer from starting; reconciled uniformly
/// as a FAILED row.
#[derive(Debug, thiserror::Error)]
enum ProvisionFailure {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Provision(#[from] ProvisionError),
}
