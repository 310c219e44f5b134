//! Service context

use crate::workflow::Workflow;

/// The event API context
#[derive(Clone)]
pub struct Ctx {
    pub workflow: Workflow,
}
