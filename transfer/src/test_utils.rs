//! In-memory doubles for the transfer seams

use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    client::{LocationArn, SyncTransfer, TaskArn, TaskExecutionArn, TransferError},
    notify::{Notify, NotifyError, TransferStartedEvent},
    plan::LocationSpec,
};

/// A call observed by [`RecordingTransfer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferCall {
    CreateLocation {
        region: Option<String>,
        bucket_arn: String,
        subdirectory: String,
    },
    CreateTask {
        region: Option<String>,
        source: String,
        destination: String,
    },
    StartTaskExecution {
        region: Option<String>,
        task: String,
    },
    DeleteLocation {
        region: Option<String>,
        location: String,
    },
    DeleteTask {
        region: Option<String>,
        task: String,
    },
}

/// The provisioning step a [`RecordingTransfer`] should fail at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    SourceLocation,
    DestinationLocation,
    Task,
    Execution,
}

/// [`SyncTransfer`] double that records every call and hands out
/// deterministic handles (`loc-1`, `loc-2`, `task-1`, `exec-1`).
#[derive(Debug, Default)]
pub struct RecordingTransfer {
    calls: Mutex<Vec<TransferCall>>,
    fail_at: Option<FailAt>,
    failing_cleanup: bool,
}

impl RecordingTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A double that fails at the given provisioning step.
    pub fn failing_at(fail_at: FailAt) -> Self {
        Self {
            fail_at: Some(fail_at),
            ..Self::default()
        }
    }

    /// Additionally fail every delete call.
    pub fn with_failing_cleanup(self) -> Self {
        Self {
            failing_cleanup: true,
            ..self
        }
    }

    /// Every call observed so far, in order.
    pub fn calls(&self) -> Vec<TransferCall> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }

    fn record(&self, call: TransferCall) -> usize {
        let mut calls = self.calls.lock().expect("calls lock poisoned");
        calls.push(call);
        calls.len()
    }

    fn injected(source: &'static str) -> common::BoxError {
        format!("injected {source} failure").into()
    }
}

#[async_trait]
impl SyncTransfer for RecordingTransfer {
    async fn create_location(
        &self,
        region: Option<&str>,
        spec: &LocationSpec,
    ) -> Result<LocationArn, TransferError> {
        let locations_created = {
            let calls = self.calls.lock().expect("calls lock poisoned");
            calls
                .iter()
                .filter(|call| matches!(call, TransferCall::CreateLocation { .. }))
                .count()
        };
        self.record(TransferCall::CreateLocation {
            region: region.map(str::to_owned),
            bucket_arn: spec.bucket_arn.clone(),
            subdirectory: spec.subdirectory.clone(),
        });

        let failing = match self.fail_at {
            Some(FailAt::SourceLocation) => locations_created == 0,
            Some(FailAt::DestinationLocation) => locations_created == 1,
            _ => false,
        };
        if failing {
            return Err(TransferError::CreateLocation(Self::injected("location")));
        }
        Ok(LocationArn::new(format!("loc-{}", locations_created + 1)))
    }

    async fn create_task(
        &self,
        region: Option<&str>,
        source: &LocationArn,
        destination: &LocationArn,
    ) -> Result<TaskArn, TransferError> {
        self.record(TransferCall::CreateTask {
            region: region.map(str::to_owned),
            source: source.as_str().to_owned(),
            destination: destination.as_str().to_owned(),
        });

        if self.fail_at == Some(FailAt::Task) {
            return Err(TransferError::CreateTask(Self::injected("task")));
        }
        Ok(TaskArn::new("task-1"))
    }

    async fn start_task_execution(
        &self,
        region: Option<&str>,
        task: &TaskArn,
    ) -> Result<TaskExecutionArn, TransferError> {
        self.record(TransferCall::StartTaskExecution {
            region: region.map(str::to_owned),
            task: task.as_str().to_owned(),
        });

        if self.fail_at == Some(FailAt::Execution) {
            return Err(TransferError::StartTaskExecution(Self::injected(
                "execution",
            )));
        }
        Ok(TaskExecutionArn::new("exec-1"))
    }

    async fn delete_location(
        &self,
        region: Option<&str>,
        location: &LocationArn,
    ) -> Result<(), TransferError> {
        self.record(TransferCall::DeleteLocation {
            region: region.map(str::to_owned),
            location: location.as_str().to_owned(),
        });

        if self.failing_cleanup {
            return Err(TransferError::DeleteLocation(Self::injected("delete")));
        }
        Ok(())
    }

    async fn delete_task(
        &self,
        region: Option<&str>,
        task: &TaskArn,
    ) -> Result<(), TransferError> {
        self.record(TransferCall::DeleteTask {
            region: region.map(str::to_owned),
            task: task.as_str().to_owned(),
        });

        if self.failing_cleanup {
            return Err(TransferError::DeleteTask(Self::injected("delete")));
        }
        Ok(())
    }
}

/// [`Notify`] double that records every notification.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<TransferStartedEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every notification observed so far, in order.
    pub fn events(&self) -> Vec<TransferStartedEvent> {
        self.events.lock().expect("events lock poisoned").clone()
    }
}

#[async_trait]
impl Notify for RecordingNotifier {
    async fn transfer_started(&self, event: TransferStartedEvent) -> Result<(), NotifyError> {
        self.events.lock().expect("events lock poisoned").push(event);
        Ok(())
    }
}
