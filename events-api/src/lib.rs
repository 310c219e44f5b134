//! Event-facing HTTP API
//!
//! Receives job-completion envelopes from the event bus and runs the data
//! handoff workflow for each one.

use std::net::SocketAddr;

use axum::{
    routing::{get, post},
    Router,
};
use common::BoxResult;

mod ctx;
mod event;
mod handlers;
mod workflow;

pub use self::ctx::Ctx;
pub use self::event::{CompletionEvent, EventDetail, JOB_COMPLETION_SOURCE};
pub use self::workflow::{Outcome, Workflow};

/// Serve the event API at the given address. Runs until the server fails.
pub async fn serve(at: SocketAddr, ctx: Ctx) -> BoxResult<()> {
    let listener = tokio::net::TcpListener::bind(at).await?;
    tracing::info!("event api listening at {}", listener.local_addr()?);
    axum::serve(listener, router(ctx)).await?;
    Ok(())
}

fn router(ctx: Ctx) -> Router {
    Router::new()
        .route("/events", post(handlers::events::handler))
        .route("/healthz", get(handlers::health::handler))
        .with_state(ctx)
}
