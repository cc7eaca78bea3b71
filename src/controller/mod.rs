//! Sync core for ContainerVersion resources
//!
//! This module contains the version check, the conflict-safe patcher, the
//! shared failure reporter and the Kubernetes/Prometheus implementations of
//! their collaborators.

mod collaborators;
mod events;
mod history;
pub mod metrics;
mod mutator;
mod patcher;
mod registry;
mod reporter;
mod retry;
mod sync;
#[cfg(test)]
mod testing;
mod version_check;

pub use collaborators::{
    history_failure_key, sync_failure_key, sync_success_key, AllowAllValidator, AuditEventSink,
    Collaborators, EventLevel, HistoryStore, MetricsSink, Mutator, RecordTyper, Severity,
    TagValidator, REASON_SAVE_HISTORY_FAILED, REASON_SUCCESS, REASON_SYNC_FAILED,
};
pub use events::{pod_reference, KubeEventRecorder};
pub use history::ConfigMapHistoryStore;
pub use metrics::PrometheusMetrics;
pub use mutator::{PodTemplated, WorkloadImageMutator};
pub use patcher::ConflictSafePatcher;
pub use registry::{split_registry, RegistryTagValidator};
pub use reporter::SyncErrorReporter;
pub use retry::RetryPolicy;
pub use sync::VersionSync;
pub use version_check::{SyncOutcome, VersionChecker};
