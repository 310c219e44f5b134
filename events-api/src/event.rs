//! Inbound event envelope

use serde::Deserialize;

/// Event source emitted by the compute service on job completion.
pub const JOB_COMPLETION_SOURCE: &str = "aws.emr-serverless";

/// Envelope delivered by the event bus.
///
/// Only the source and the run id are interpreted; everything else in the
/// detail payload is ignored so envelope growth never causes rejections.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionEvent {
    pub source: String,

    #[serde(default)]
    pub detail: EventDetail,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventDetail {
    #[serde(rename = "jobRunId")]
    pub job_run_id: Option<String>,
}

impl CompletionEvent {
    /// Returns the run id iff this envelope is a compute job completion.
    ///
    /// Envelopes from other sources, and completion envelopes missing the
    /// run id, yield `None`: this handler may be one of several consumers on
    /// a shared bus, so foreign events are expected and ignored silently.
    pub fn job_run_id(&self) -> Option<&str> {
        if self.source != JOB_COMPLETION_SOURCE {
            return None;
        }
        self.detail.job_run_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_envelope_yields_the_run_id() {
        let event: CompletionEvent = serde_json::from_str(
            r#"{"source": "aws.emr-serverless", "detail": {"jobRunId": "run-1"}}"#,
        )
        .expect("envelope parses");

        assert_eq!(event.job_run_id(), Some("run-1"));
    }

    #[test]
    fn foreign_sources_are_ignored() {
        let event: CompletionEvent = serde_json::from_str(
            r#"{"source": "aws.s3", "detail": {"jobRunId": "run-1"}}"#,
        )
        .expect("envelope parses");

        assert_eq!(event.job_run_id(), None);
    }

    #[test]
    fn completion_envelope_without_a_run_id_is_ignored() {
        let event: CompletionEvent = serde_json::from_str(
            r#"{"source": "aws.emr-serverless", "detail": {"state": "SUCCESS"}}"#,
        )
        .expect("envelope parses");

        assert_eq!(event.job_run_id(), None);
    }
}
