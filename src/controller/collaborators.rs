//! Capabilities the sync core is handed by its driver
//!
//! The core never reaches for process globals: metrics, Kubernetes events,
//! history storage and the workload write path all arrive through the traits
//! below, bundled into [`Collaborators`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::ObjectReference;
use tracing::warn;

use crate::config::SyncConfig;
use crate::crd::{HistoryRecord, WorkloadKind};
use crate::error::Result;

/// Event reason for any failed sync step
pub const REASON_SYNC_FAILED: &str = "CRSyncFailed";
/// Event reason for a failed history write
pub const REASON_SAVE_HISTORY_FAILED: &str = "SaveHistoryFailed";
/// Event reason for a completed sync cycle
pub const REASON_SUCCESS: &str = "Success";

/// Kubernetes event type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Normal,
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Normal => "Normal",
            Severity::Warning => "Warning",
        }
    }
}

/// Level attached to a metrics event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventLevel {
    Info,
    Warning,
    Error,
}

impl EventLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventLevel::Info => "info",
            EventLevel::Warning => "warning",
            EventLevel::Error => "error",
        }
    }
}

/// Metrics backend
pub trait MetricsSink: Send + Sync {
    fn event(&self, key: &str, message: &str, tag: &str, level: EventLevel, timestamp: DateTime<Utc>);

    fn inc_count(&self, key: &str);
}

/// Audit events attached to the reconciling process
#[async_trait]
pub trait AuditEventSink: Send + Sync {
    async fn event(
        &self,
        subject: &ObjectReference,
        severity: Severity,
        reason: &str,
        message: &str,
    ) -> Result<()>;
}

/// Append-only store of sync history
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn add(&self, namespace: &str, workload: &str, record: &HistoryRecord) -> Result<()>;
}

/// Writes the candidate tag into the container at `container_index`.
///
/// Implementations refetch the workload themselves; a stale read should
/// surface as a conflict error so the retry policy runs the write again.
#[async_trait]
pub trait Mutator: Send + Sync {
    async fn mutate(&self, container_index: usize) -> Result<()>;
}

/// Decides whether a candidate tag may be rolled out
#[async_trait]
pub trait TagValidator: Send + Sync {
    async fn validate(&self, tag: &str) -> Result<()>;
}

/// Names the workload type stored in history records
pub trait RecordTyper: Send + Sync {
    fn record_type(&self) -> String;
}

impl RecordTyper for WorkloadKind {
    fn record_type(&self) -> String {
        self.to_string()
    }
}

/// Accepts every tag
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllValidator;

#[async_trait]
impl TagValidator for AllowAllValidator {
    async fn validate(&self, _tag: &str) -> Result<()> {
        Ok(())
    }
}

/// Process-wide collaborators shared by the sync components
#[derive(Clone)]
pub struct Collaborators {
    pub metrics: Arc<dyn MetricsSink>,
    pub events: Arc<dyn AuditEventSink>,
    pub history: Arc<dyn HistoryStore>,
    /// Identity of the reconciling process; every audit event is attached to it
    pub subject: ObjectReference,
    pub config: SyncConfig,
}

impl Collaborators {
    pub fn new(
        metrics: Arc<dyn MetricsSink>,
        events: Arc<dyn AuditEventSink>,
        history: Arc<dyn HistoryStore>,
        subject: ObjectReference,
        config: SyncConfig,
    ) -> Self {
        Self {
            metrics,
            events,
            history,
            subject,
            config,
        }
    }

    /// Record a `<workload>.sync.failure` metrics event
    pub(crate) fn sync_failure_metric(&self, workload: &str, message: &str) {
        self.metrics.event(
            &sync_failure_key(workload),
            message,
            "",
            EventLevel::Error,
            Utc::now(),
        );
    }

    /// Emit an audit event; a sink failure is logged, never propagated
    pub(crate) async fn audit(&self, severity: Severity, reason: &str, message: &str) {
        if let Err(e) = self
            .events
            .event(&self.subject, severity, reason, message)
            .await
        {
            warn!(
                "Failed to emit {} event {}: {}",
                severity.as_str(),
                reason,
                e
            );
        }
    }
}

pub fn sync_failure_key(workload: &str) -> String {
    format!("{}.sync.failure", workload)
}

pub fn sync_success_key(workload: &str) -> String {
    format!("{}.sync.success", workload)
}

pub fn history_failure_key(workload: &str) -> String {
    format!("cvc.{}.history.save.failure", workload)
}
