//! Job-completion event handler

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;

use crate::{ctx::Ctx, event::CompletionEvent, workflow::Outcome};

/// Handler for the `POST /events` endpoint
///
/// Accepts event-bus envelopes. Envelopes from unrelated sources are
/// acknowledged without action since this service can share a bus target
/// with other consumers. Provisioning failures are reconciled into the job
/// row and acknowledged; only database errors produce an error response, so
/// the bus redelivers exactly the events whose processing never reached a
/// terminal write.
#[tracing::instrument(skip_all, err)]
pub async fn handler(
    State(ctx): State<Ctx>,
    Json(event): Json<CompletionEvent>,
) -> Result<StatusCode, Error> {
    let outcome = ctx.workflow.process(&event).await?;

    let status = match outcome {
        Outcome::Ignored | Outcome::NotFound | Outcome::AlreadyClaimed => StatusCode::NO_CONTENT,
        Outcome::Failed { .. } | Outcome::Initiated { .. } => StatusCode::ACCEPTED,
    };
    Ok(status)
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database access failed; the platform should redeliver the event.
    #[error("job db error: {0}")]
    JobDb(#[from] job_db::Error),
}

impl Error {
    fn error_code(&self) -> &'static str {
        match self {
            Error::JobDb(_) => "JOB_DB_ERROR",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::JobDb(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let res = json!({
            "error_code": self.error_code(),
            "error_message": self.to_string(),
        });

        (self.status_code(), res.to_string()).into_response()
    }
}
