//! Job-completion data handoff daemon

use std::{path::PathBuf, sync::Arc};

use clap::Parser as _;
use common::{config::Config, BoxError};
use events_api::{Ctx, Workflow};
use job_db::JobDb;
use transfer::{DataSyncTransfer, LambdaNotifier, Notify, Provisioner};

#[derive(Debug, clap::Parser)]
#[command(name = "handoffd", version)]
#[command(about = "Hands finished compute job output off to its destination bucket")]
struct Args {
    /// Path to the service configuration file.
    ///
    /// Every value can also be set via HANDOFF_-prefixed environment
    /// variables.
    #[arg(long, env = "HANDOFF_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    match main_inner().await {
        Ok(()) => {}
        Err(e) => {
            // Manually print the error so we can control the format.
            eprintln!("Exiting with error: {e}");
            std::process::exit(1);
        }
    }
}

async fn main_inner() -> Result<(), BoxError> {
    let args = Args::parse();
    let config = Config::load(args.config.as_deref())
        .map_err(|e| format!("failed to load config: {e}"))?;
    common::tracing::register_logger(config.log.json);

    let job_db = JobDb::connect(&config.job_db.url, config.job_db.pool_size).await?;

    let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let provisioner = Provisioner::new(Arc::new(DataSyncTransfer::new(&sdk_config)));
    let notifier = config.notifier.as_ref().map(|notifier| {
        Arc::new(LambdaNotifier::new(&sdk_config, notifier.secret_id.clone())) as Arc<dyn Notify>
    });
    if notifier.is_none() {
        tracing::info!("no notifier configured; polling function notification disabled");
    }

    let workflow = Workflow::new(job_db, config.transfer.clone(), provisioner, notifier);
    events_api::serve(config.listen_addr, Ctx { workflow }).await?;

    Err("event api shutdown unexpectedly, it should run forever".into())
}
