//! Version check for a workload's pod template
//!
//! Compares the image of the target container against the desired
//! repository and tag. Every negative outcome is reported through the
//! metrics and audit-event sinks before it is returned, so a caller that
//! sees the outcome can rely on the signal already being visible.
//!
//! The scan does not stop at the first matching container: a container whose
//! tag is already current lets the scan continue, so when several containers
//! share the target name the last one scanned decides the outcome.

use k8s_openapi::api::core::v1::PodTemplateSpec;
use tracing::{info, instrument, warn};

use super::collaborators::{Collaborators, Severity, TagValidator, REASON_SYNC_FAILED};
use crate::crd::{ContainerVersionSpec, Image};
use crate::error::{Error, Result};

/// Result of checking one workload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Target container already runs the desired tag
    UpToDate,
    /// Target container runs another tag and the candidate passed validation
    Drift(String),
    /// Image on the container is not `repository:tag`
    InvalidImage { image: String },
    /// Container runs an image from another repository
    RepositoryMismatch { present: String, requested: String },
    /// Candidate tag was rejected by the validator
    ValidationFailed { tag: String, reason: String },
    /// No container of the requested name in the template
    ContainerNotFound { container: String, workload: String },
}

impl SyncOutcome {
    /// Tag to roll out, if any
    pub fn candidate(&self) -> Option<&str> {
        match self {
            SyncOutcome::Drift(tag) => Some(tag),
            _ => None,
        }
    }

    /// True for the four outcomes that stop the sync
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SyncOutcome::UpToDate | SyncOutcome::Drift(_))
    }

    /// Map terminal outcomes to their error, keeping the candidate otherwise
    pub fn into_result(self) -> Result<Option<String>> {
        match self {
            SyncOutcome::UpToDate => Ok(None),
            SyncOutcome::Drift(tag) => Ok(Some(tag)),
            SyncOutcome::InvalidImage { image } => Err(Error::InvalidImageFormat { image }),
            SyncOutcome::RepositoryMismatch { present, requested } => {
                Err(Error::RepositoryMismatch { present, requested })
            }
            SyncOutcome::ValidationFailed { tag, reason } => {
                Err(Error::ValidationFailed { tag, reason })
            }
            SyncOutcome::ContainerNotFound {
                container,
                workload,
            } => Err(Error::ContainerNotFound {
                container,
                workload,
            }),
        }
    }
}

/// Decides whether a workload is up to date, drifted or invalid
#[derive(Clone)]
pub struct VersionChecker {
    collaborators: Collaborators,
}

impl VersionChecker {
    pub fn new(collaborators: Collaborators) -> Self {
        Self { collaborators }
    }

    /// Check `template` against `spec.image_repo` and `desired_tag`
    #[instrument(skip(self, template, spec, validator), fields(container = %spec.container))]
    pub async fn check(
        &self,
        template: &PodTemplateSpec,
        workload: &str,
        desired_tag: &str,
        spec: &ContainerVersionSpec,
        validator: &dyn TagValidator,
    ) -> SyncOutcome {
        info!("Checking version {} for workload {}", desired_tag, workload);

        let containers = template
            .spec
            .as_ref()
            .map(|s| s.containers.as_slice())
            .unwrap_or_default();

        let mut matched = false;
        for container in containers.iter().filter(|c| c.name == spec.container) {
            matched = true;
            let raw = container.image.as_deref().unwrap_or_default();

            let image = match Image::parse(raw) {
                Ok(image) => image,
                Err(e) => {
                    warn!("Workload {}: {}", workload, e);
                    self.collaborators
                        .audit(Severity::Warning, REASON_SYNC_FAILED, "Invalid image on container")
                        .await;
                    return SyncOutcome::InvalidImage {
                        image: raw.to_string(),
                    };
                }
            };

            if image.repository != spec.image_repo {
                warn!(
                    "Workload {}: image repository {} does not match {}",
                    workload, image.repository, spec.image_repo
                );
                self.collaborators.sync_failure_metric(
                    workload,
                    &format!(
                        "Image repo mismatch present {} and requested {} don't match",
                        image.repository, spec.image_repo
                    ),
                );
                self.collaborators
                    .audit(
                        Severity::Warning,
                        REASON_SYNC_FAILED,
                        "Image repository mismatch was found",
                    )
                    .await;
                return SyncOutcome::RepositoryMismatch {
                    present: image.repository,
                    requested: spec.image_repo.clone(),
                };
            }

            if image.tag != desired_tag {
                if let Err(e) = validator.validate(desired_tag).await {
                    warn!(
                        "Workload {}: candidate tag {} failed validation: {}",
                        workload, desired_tag, e
                    );
                    self.collaborators.sync_failure_metric(
                        workload,
                        &format!("Failed to validate image with tag {}", desired_tag),
                    );
                    self.collaborators
                        .audit(
                            Severity::Warning,
                            REASON_SYNC_FAILED,
                            "Candidate version failed validation",
                        )
                        .await;
                    return SyncOutcome::ValidationFailed {
                        tag: desired_tag.to_string(),
                        reason: e.to_string(),
                    };
                }
                info!(
                    "Workload {} runs {} but {} is desired",
                    workload, image.tag, desired_tag
                );
                return SyncOutcome::Drift(desired_tag.to_string());
            }
        }

        if !matched {
            warn!(
                "No container of name {} was found in workload {}",
                spec.container, workload
            );
            self.collaborators
                .sync_failure_metric(workload, "No matching container found");
            self.collaborators
                .audit(Severity::Warning, REASON_SYNC_FAILED, "No matching container found")
                .await;
            return SyncOutcome::ContainerNotFound {
                container: spec.container.clone(),
                workload: workload.to_string(),
            };
        }

        info!("Workload {} is up to date", workload);
        SyncOutcome::UpToDate
    }
}
