//! Conflict-safe rollout of a candidate tag
//!
//! The write itself is best-effort: when the retry budget runs out the
//! failure is reported through metrics and events, and the cycle still ends
//! with the history write and the terminal success signal.

use chrono::Utc;
use k8s_openapi::api::core::v1::PodTemplateSpec;
use tracing::{error, info, instrument, warn};

use super::collaborators::{
    history_failure_key, sync_success_key, Collaborators, Mutator, RecordTyper, Severity,
    REASON_SAVE_HISTORY_FAILED, REASON_SUCCESS, REASON_SYNC_FAILED,
};
use super::retry::RetryPolicy;
use crate::crd::{ContainerVersionSpec, HistoryRecord};
use crate::error::{Error, Result};

/// Writes a candidate tag into the target containers of a workload
#[derive(Clone)]
pub struct ConflictSafePatcher {
    collaborators: Collaborators,
    retry: RetryPolicy,
}

impl ConflictSafePatcher {
    /// Patcher using the retry policy from the collaborators' config
    pub fn new(collaborators: Collaborators) -> Self {
        let retry = collaborators.config.retry_policy();
        Self {
            collaborators,
            retry,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Roll `candidate_tag` out to every container named `spec.container`.
    ///
    /// Always returns `Ok(())`; failures only surface as metrics and events.
    #[instrument(skip(self, template, spec, mutator, typer), fields(container = %spec.container))]
    pub async fn patch(
        &self,
        template: &PodTemplateSpec,
        workload: &str,
        candidate_tag: &str,
        spec: &ContainerVersionSpec,
        mutator: &dyn Mutator,
        typer: &dyn RecordTyper,
    ) -> Result<()> {
        info!(
            "Beginning rollout for workload {} with version {}",
            workload, candidate_tag
        );

        let container = spec.container.as_str();
        let outcome = self
            .retry
            .run(move || mutate_matching(template, container, workload, candidate_tag, mutator))
            .await;

        if let Err(e) = outcome {
            match &e {
                Error::RetryExhausted { attempts, source } => error!(
                    "Failed to update container version after {} attempts: version={}, workload={}, error={}",
                    attempts, candidate_tag, workload, source
                ),
                _ => error!(
                    "Failed to update container version, error is not retried: version={}, workload={}, error={}",
                    candidate_tag, workload, e
                ),
            }
            self.collaborators.sync_failure_metric(
                workload,
                &format!("Failed to validate image with {}", candidate_tag),
            );
            self.collaborators
                .audit(
                    Severity::Warning,
                    REASON_SYNC_FAILED,
                    "Failed to perform the workload",
                )
                .await;
        }

        if self.collaborators.config.record_history {
            let record = HistoryRecord {
                record_type: typer.record_type(),
                name: workload.to_string(),
                version: candidate_tag.to_string(),
                time: Utc::now(),
            };
            if let Err(e) = self
                .collaborators
                .history
                .add(&self.collaborators.config.namespace, workload, &record)
                .await
            {
                warn!("Failed to record update history for {}: {}", workload, e);
                self.collaborators
                    .metrics
                    .inc_count(&history_failure_key(workload));
                self.collaborators
                    .audit(
                        Severity::Warning,
                        REASON_SAVE_HISTORY_FAILED,
                        "Failed to record update history",
                    )
                    .await;
            }
        }

        info!("Update completed: workload={}", workload);
        self.collaborators
            .metrics
            .inc_count(&sync_success_key(workload));
        self.collaborators
            .audit(
                Severity::Normal,
                REASON_SUCCESS,
                "Update completed successfully",
            )
            .await;
        Ok(())
    }
}

/// One attempt: mutate every container carrying the target name
async fn mutate_matching(
    template: &PodTemplateSpec,
    container: &str,
    workload: &str,
    candidate_tag: &str,
    mutator: &dyn Mutator,
) -> Result<()> {
    let containers = template
        .spec
        .as_ref()
        .map(|s| s.containers.as_slice())
        .unwrap_or_default();

    for (index, c) in containers.iter().enumerate() {
        if c.name != container {
            continue;
        }
        if let Err(e) = mutator.mutate(index).await {
            warn!(
                "Failed to update container version (will retry): version={}, workload={}, error={}",
                candidate_tag, workload, e
            );
            return Err(e);
        }
    }
    Ok(())
}
