//! Transfer provisioning
//!
//! Derives the source and destination endpoints for one finished job,
//! provisions them through DataSync, links them into a task and starts its
//! execution. The database is never touched from here; callers reconcile the
//! outcome.

mod client;
mod notify;
mod plan;
mod provisioner;
pub mod test_utils;

pub use self::client::{
    DataSyncTransfer, LocationArn, SyncTransfer, TaskArn, TaskExecutionArn, TransferError,
};
pub use self::notify::{LambdaNotifier, Notify, NotifyError, TransferStartedEvent};
pub use self::plan::{LocationSpec, PlanError, TransferPlan};
pub use self::provisioner::{ProvisionError, ProvisionStep, Provisioner};
