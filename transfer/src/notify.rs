//! Fire-and-forget notification of the polling function
//!
//! After a transfer execution starts, a polling Lambda takes over progress
//! tracking. Its function ARN lives in a Secrets Manager secret so it can be
//! rotated without redeploying this service.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_lambda::{primitives::Blob, types::InvocationType};
use common::BoxError;
use job_db::JobId;
use tokio::sync::OnceCell;

/// Key within the secret's JSON value that holds the polling function ARN.
const POLLING_FUNCTION_ARN_KEY: &str = "POLLING_FUNCTION_ARN";

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("error reading the polling function secret: {0}")]
    Secret(#[source] BoxError),

    #[error("polling function secret has no usable POLLING_FUNCTION_ARN entry")]
    MissingFunctionArn,

    #[error("error serializing the notification payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("error invoking the polling function: {0}")]
    Invoke(#[source] BoxError),
}

/// Payload sent to the polling function when a transfer execution starts.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TransferStartedEvent {
    pub id: JobId,
    pub region_name: String,
    pub task_execution_arn: String,
}

/// One-way notification of a started transfer.
#[async_trait]
pub trait Notify: Send + Sync {
    async fn transfer_started(&self, event: TransferStartedEvent) -> Result<(), NotifyError>;
}

/// [`Notify`] implementation that invokes the polling Lambda asynchronously.
///
/// The function ARN is fetched from Secrets Manager on first use and cached
/// for the process lifetime.
pub struct LambdaNotifier {
    secrets: aws_sdk_secretsmanager::Client,
    lambda: aws_sdk_lambda::Client,
    secret_id: String,
    function_arn: OnceCell<String>,
}

impl LambdaNotifier {
    pub fn new(sdk_config: &SdkConfig, secret_id: String) -> Self {
        Self {
            secrets: aws_sdk_secretsmanager::Client::new(sdk_config),
            lambda: aws_sdk_lambda::Client::new(sdk_config),
            secret_id,
            function_arn: OnceCell::new(),
        }
    }

    async fn function_arn(&self) -> Result<&str, NotifyError> {
        let arn = self
            .function_arn
            .get_or_try_init(|| async {
                let output = self
                    .secrets
                    .get_secret_value()
                    .secret_id(&self.secret_id)
                    .send()
                    .await
                    .map_err(|err| NotifyError::Secret(err.into()))?;

                let secret: serde_json::Value =
                    serde_json::from_str(output.secret_string().unwrap_or_default())?;
                secret
                    .get(POLLING_FUNCTION_ARN_KEY)
                    .and_then(|arn| arn.as_str())
                    .map(str::to_owned)
                    .ok_or(NotifyError::MissingFunctionArn)
            })
            .await?;
        Ok(arn)
    }
}

#[async_trait]
impl Notify for LambdaNotifier {
    #[tracing::instrument(skip_all, err)]
    async fn transfer_started(&self, event: TransferStartedEvent) -> Result<(), NotifyError> {
        let function_arn = self.function_arn().await?;
        let payload = serde_json::to_vec(&event)?;

        self.lambda
            .invoke()
            .function_name(function_arn)
            .invocation_type(InvocationType::Event)
            .payload(Blob::new(payload))
            .send()
            .await
            .map_err(|err| NotifyError::Invoke(err.into()))?;

        tracing::info!(id = %event.id, execution = %event.task_execution_arn, "notified polling function");
        Ok(())
    }
}
