//! ContainerVersion Custom Resource Definition
//!
//! A ContainerVersion declares which image tag a named container in the
//! selected workloads should run.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The ContainerVersion CRD pins a container of the selected workloads to a tag.
///
/// # Example
///
/// ```yaml
/// apiVersion: cv.k8s.io/v1
/// kind: ContainerVersion
/// metadata:
///   name: web-frontend
///   namespace: apps
/// spec:
///   imageRepo: registry.example.com/web/frontend
///   tag: v1.4.2
///   container: frontend
///   selector:
///     app: frontend
///   pollIntervalSeconds: 120
/// ```
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "cv.k8s.io",
    version = "v1",
    kind = "ContainerVersion",
    namespaced,
    status = "ContainerVersionStatus",
    shortname = "cv",
    printcolumn = r#"{"name":"Repo","type":"string","jsonPath":".spec.imageRepo"}"#,
    printcolumn = r#"{"name":"Tag","type":"string","jsonPath":".spec.tag"}"#,
    printcolumn = r#"{"name":"Container","type":"string","jsonPath":".spec.container"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ContainerVersionSpec {
    /// Image repository the container must run, without tag
    pub image_repo: String,

    /// Desired tag
    pub tag: String,

    /// Name of the container inside the pod template
    pub container: String,

    /// Labels selecting the workloads this version applies to
    #[serde(default)]
    pub selector: BTreeMap<String, String>,

    /// How often a driver should re-check the workloads
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
}

fn default_poll_interval() -> u64 {
    300
}

impl ContainerVersionSpec {
    /// Validate the spec before it is acted upon
    pub fn validate(&self) -> Result<(), String> {
        if self.image_repo.trim().is_empty() {
            return Err("imageRepo must not be empty".to_string());
        }
        if self.container.trim().is_empty() {
            return Err("container must not be empty".to_string());
        }
        if self.tag.trim().is_empty() {
            return Err("tag must not be empty".to_string());
        }
        if self.tag.contains(':') {
            return Err(format!("tag {} must not contain ':'", self.tag));
        }
        if self.poll_interval_seconds == 0 {
            return Err("pollIntervalSeconds must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Label selector string suitable for `ListParams::labels`
    pub fn label_selector(&self) -> String {
        self.selector
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Status subresource written by drivers after a sync cycle
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerVersionStatus {
    /// Tag most recently rolled out
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_version: Option<String>,

    /// RFC3339 time of the last completed sync
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_time: Option<String>,

    /// UpToDate, Syncing or Failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}
