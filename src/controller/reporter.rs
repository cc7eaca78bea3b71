//! Standard failure report for a sync step
//!
//! Used by drivers for failures that happen around the check/patch pair,
//! e.g. when a workload cannot be listed or decoded.

use tracing::error;

use super::collaborators::{Collaborators, Severity, REASON_SYNC_FAILED};
use crate::error::Error;

#[derive(Clone)]
pub struct SyncErrorReporter {
    collaborators: Collaborators,
}

impl SyncErrorReporter {
    pub fn new(collaborators: Collaborators) -> Self {
        Self { collaborators }
    }

    /// Log, record a `<workload>.sync.failure` metric and emit a warning event,
    /// in that order.
    pub async fn report(
        &self,
        err: &Error,
        sync_type: &str,
        workload: &str,
        candidate_tag: &str,
        version: &str,
    ) {
        error!(
            "Failed sync {} with image: digest={}, tag={}, err={}",
            sync_type, version, candidate_tag, err
        );
        self.collaborators.sync_failure_metric(
            workload,
            &format!("Failed to sync pod spec with {}", version),
        );
        self.collaborators
            .audit(
                Severity::Warning,
                REASON_SYNC_FAILED,
                &format!("Error syncing {} name:{}", sync_type, workload),
            )
            .await;
    }
}
