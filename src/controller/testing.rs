//! Recording fakes for the sync collaborators

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Container, ObjectReference, PodSpec, PodTemplateSpec};

use super::collaborators::{
    AuditEventSink, Collaborators, EventLevel, HistoryStore, MetricsSink, Mutator, RecordTyper,
    Severity, TagValidator,
};
use super::retry::RetryPolicy;
use crate::config::SyncConfig;
use crate::crd::{ContainerVersionSpec, HistoryRecord};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum MetricCall {
    Event {
        key: String,
        message: String,
        level: EventLevel,
    },
    Count {
        key: String,
    },
}

#[derive(Default)]
pub struct RecordingMetrics {
    pub calls: Mutex<Vec<MetricCall>>,
}

impl RecordingMetrics {
    pub fn calls(&self) -> Vec<MetricCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn events_for(&self, key: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, MetricCall::Event { key: k, .. } if k == key))
            .count()
    }

    pub fn counts_for(&self, key: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, MetricCall::Count { key: k } if k == key))
            .count()
    }
}

impl MetricsSink for RecordingMetrics {
    fn event(&self, key: &str, message: &str, _tag: &str, level: EventLevel, _timestamp: DateTime<Utc>) {
        self.calls.lock().unwrap().push(MetricCall::Event {
            key: key.to_string(),
            message: message.to_string(),
            level,
        });
    }

    fn inc_count(&self, key: &str) {
        self.calls.lock().unwrap().push(MetricCall::Count {
            key: key.to_string(),
        });
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditCall {
    pub subject: Option<String>,
    pub severity: Severity,
    pub reason: String,
    pub message: String,
}

#[derive(Default)]
pub struct RecordingEvents {
    pub calls: Mutex<Vec<AuditCall>>,
    pub fail: bool,
}

impl RecordingEvents {
    pub fn calls(&self) -> Vec<AuditCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, severity: Severity, reason: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.severity == severity && c.reason == reason)
            .count()
    }
}

#[async_trait]
impl AuditEventSink for RecordingEvents {
    async fn event(
        &self,
        subject: &ObjectReference,
        severity: Severity,
        reason: &str,
        message: &str,
    ) -> Result<()> {
        self.calls.lock().unwrap().push(AuditCall {
            subject: subject.name.clone(),
            severity,
            reason: reason.to_string(),
            message: message.to_string(),
        });
        if self.fail {
            return Err(Error::Conflict("event sink unavailable".to_string()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingHistory {
    pub records: Mutex<Vec<(String, String, HistoryRecord)>>,
    pub fail: bool,
}

impl RecordingHistory {
    pub fn records(&self) -> Vec<(String, String, HistoryRecord)> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl HistoryStore for RecordingHistory {
    async fn add(&self, namespace: &str, workload: &str, record: &HistoryRecord) -> Result<()> {
        self.records.lock().unwrap().push((
            namespace.to_string(),
            workload.to_string(),
            record.clone(),
        ));
        if self.fail {
            return Err(Error::HistoryWriteFailed("configmap is read-only".to_string()));
        }
        Ok(())
    }
}

/// Mutator that fails a fixed number of times before succeeding
pub struct ScriptedMutator {
    pub failures_left: AtomicUsize,
    pub conflict: bool,
    pub calls: Mutex<Vec<usize>>,
}

impl ScriptedMutator {
    pub fn succeeding() -> Self {
        Self::failing(0)
    }

    pub fn failing(times: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(times),
            conflict: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always_conflicting() -> Self {
        Self::failing(usize::MAX)
    }

    pub fn calls(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mutator for ScriptedMutator {
    async fn mutate(&self, container_index: usize) -> Result<()> {
        self.calls.lock().unwrap().push(container_index);
        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining == 0 {
            return Ok(());
        }
        self.failures_left.store(remaining - 1, Ordering::SeqCst);
        if self.conflict {
            Err(Error::Conflict("the object has been modified".to_string()))
        } else {
            Err(Error::NotFound {
                kind: "Deployment".to_string(),
                name: "web".to_string(),
                namespace: "default".to_string(),
            })
        }
    }
}

/// Validator accepting a fixed set of tags
#[derive(Default)]
pub struct StaticValidator {
    pub accepted: HashSet<String>,
    pub calls: Mutex<Vec<String>>,
}

impl StaticValidator {
    pub fn accepting(tags: &[&str]) -> Self {
        Self {
            accepted: tags.iter().map(|t| t.to_string()).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TagValidator for StaticValidator {
    async fn validate(&self, tag: &str) -> Result<()> {
        self.calls.lock().unwrap().push(tag.to_string());
        if self.accepted.contains(tag) {
            Ok(())
        } else {
            Err(Error::ValidationFailed {
                tag: tag.to_string(),
                reason: "tag not found in registry".to_string(),
            })
        }
    }
}

pub struct FixedType(pub &'static str);

impl RecordTyper for FixedType {
    fn record_type(&self) -> String {
        self.0.to_string()
    }
}

/// Collaborators wired to recording fakes
pub struct Harness {
    pub metrics: Arc<RecordingMetrics>,
    pub events: Arc<RecordingEvents>,
    pub history: Arc<RecordingHistory>,
    pub collaborators: Collaborators,
}

impl Harness {
    pub fn new(record_history: bool) -> Self {
        Self::build(record_history, RecordingHistory::default(), RecordingEvents::default())
    }

    pub fn with_failing_history() -> Self {
        Self::build(
            true,
            RecordingHistory {
                fail: true,
                ..Default::default()
            },
            RecordingEvents::default(),
        )
    }

    pub fn with_failing_events() -> Self {
        Self::build(
            false,
            RecordingHistory::default(),
            RecordingEvents {
                fail: true,
                ..Default::default()
            },
        )
    }

    fn build(record_history: bool, history: RecordingHistory, events: RecordingEvents) -> Self {
        let metrics = Arc::new(RecordingMetrics::default());
        let events = Arc::new(events);
        let history = Arc::new(history);
        let config = SyncConfig {
            namespace: "ops".to_string(),
            record_history,
            ..Default::default()
        };
        let subject = ObjectReference {
            kind: Some("Pod".to_string()),
            name: Some("cv-operator-0".to_string()),
            namespace: Some("ops".to_string()),
            ..Default::default()
        };
        let collaborators = Collaborators::new(
            metrics.clone(),
            events.clone(),
            history.clone(),
            subject,
            config,
        );
        Self {
            metrics,
            events,
            history,
            collaborators,
        }
    }
}

/// Retry policy with no delay between attempts
pub fn instant_retry() -> RetryPolicy {
    RetryPolicy::default().with_backoff(Duration::ZERO, 1, Duration::ZERO)
}

pub fn template(containers: &[(&str, &str)]) -> PodTemplateSpec {
    PodTemplateSpec {
        metadata: None,
        spec: Some(PodSpec {
            containers: containers
                .iter()
                .map(|(name, image)| Container {
                    name: name.to_string(),
                    image: Some(image.to_string()),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }),
    }
}

pub fn version_spec(repo: &str, container: &str) -> ContainerVersionSpec {
    ContainerVersionSpec {
        image_repo: repo.to_string(),
        tag: "v1".to_string(),
        container: container.to_string(),
        selector: Default::default(),
        poll_interval_seconds: 300,
    }
}
