//! Shared types for container version tracking
//!
//! These types are used across the CRD definitions and controller logic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A container image reference split into repository and tag
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Image {
    pub repository: String,
    pub tag: String,
}

impl Image {
    /// Parse `repository:tag`.
    ///
    /// Exactly one `:` is accepted. A missing tag and any extra separator
    /// (including a registry port) are rejected as `InvalidImageFormat`.
    pub fn parse(image: &str) -> Result<Self> {
        let mut parts = image.split(':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(repository), Some(tag), None) => Ok(Self {
                repository: repository.to_string(),
                tag: tag.to_string(),
            }),
            _ => Err(Error::InvalidImageFormat {
                image: image.to_string(),
            }),
        }
    }

    pub fn new(repository: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            tag: tag.into(),
        }
    }
}

impl std::fmt::Display for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

/// Kind of workload owning the pod template
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum WorkloadKind {
    Deployment,
    StatefulSet,
    DaemonSet,
}

impl std::fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkloadKind::Deployment => write!(f, "Deployment"),
            WorkloadKind::StatefulSet => write!(f, "StatefulSet"),
            WorkloadKind::DaemonSet => write!(f, "DaemonSet"),
        }
    }
}

/// Audit trail entry for one version sync of a workload
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub version: String,
    pub time: DateTime<Utc>,
}
