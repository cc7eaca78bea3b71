//! Kubernetes Events for sync audit trail

use async_trait::async_trait;
use chrono::Utc;
use k8s_openapi::api::core::v1::{Event, EventSource, ObjectReference};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::api::{Api, ObjectMeta, PostParams};
use kube::Client;
use tracing::debug;

use super::collaborators::{AuditEventSink, Severity};
use crate::error::{Error, Result};

const DEFAULT_COMPONENT: &str = "cv-operator";

/// [`AuditEventSink`] that creates core/v1 Events
#[derive(Clone)]
pub struct KubeEventRecorder {
    client: Client,
    component: String,
}

impl KubeEventRecorder {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            component: DEFAULT_COMPONENT.to_string(),
        }
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = component.into();
        self
    }
}

/// Reference to the operator's own pod, used as the subject of its events
pub fn pod_reference(namespace: &str, name: &str, uid: Option<String>) -> ObjectReference {
    ObjectReference {
        api_version: Some("v1".to_string()),
        kind: Some("Pod".to_string()),
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        uid,
        ..Default::default()
    }
}

fn build_event(
    subject: &ObjectReference,
    component: &str,
    severity: Severity,
    reason: &str,
    message: &str,
) -> Event {
    let time = Utc::now();
    let name = subject.name.clone().unwrap_or_else(|| component.to_string());

    Event {
        metadata: ObjectMeta {
            generate_name: Some(format!("{}-", name)),
            namespace: subject.namespace.clone(),
            ..Default::default()
        },
        type_: Some(severity.as_str().to_string()),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        involved_object: subject.clone(),
        source: Some(EventSource {
            component: Some(component.to_string()),
            host: None,
        }),
        first_timestamp: Some(Time(time)),
        last_timestamp: Some(Time(time)),
        count: Some(1),
        ..Default::default()
    }
}

#[async_trait]
impl AuditEventSink for KubeEventRecorder {
    async fn event(
        &self,
        subject: &ObjectReference,
        severity: Severity,
        reason: &str,
        message: &str,
    ) -> Result<()> {
        let namespace = subject
            .namespace
            .clone()
            .unwrap_or_else(|| "default".to_string());
        let events: Api<Event> = Api::namespaced(self.client.clone(), &namespace);

        let event = build_event(subject, &self.component, severity, reason, message);
        events
            .create(&PostParams::default(), &event)
            .await
            .map_err(Error::KubeError)?;

        debug!(
            "Emitted {} event {} in {}: {}",
            severity.as_str(),
            reason,
            namespace,
            message
        );
        Ok(())
    }
}
