//! One check-then-patch pass over a workload
//!
//! Deciding when to run a pass, and for which workloads, is left to the
//! driver.

use k8s_openapi::api::core::v1::PodTemplateSpec;
use tracing::{debug, instrument};

use super::collaborators::{Collaborators, Mutator, RecordTyper, TagValidator};
use super::patcher::ConflictSafePatcher;
use super::version_check::{SyncOutcome, VersionChecker};
use crate::crd::ContainerVersionSpec;
use crate::error::Result;

#[derive(Clone)]
pub struct VersionSync {
    checker: VersionChecker,
    patcher: ConflictSafePatcher,
}

impl VersionSync {
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            checker: VersionChecker::new(collaborators.clone()),
            patcher: ConflictSafePatcher::new(collaborators),
        }
    }

    pub fn from_parts(checker: VersionChecker, patcher: ConflictSafePatcher) -> Self {
        Self { checker, patcher }
    }

    /// Check `template` against `desired_tag` and roll the tag out on drift.
    ///
    /// Returns the outcome for `UpToDate` and `Drift`, and the matching error
    /// for the terminal outcomes. Signals for every branch have been emitted
    /// by the time this returns.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip_all, fields(workload = %workload, tag = %desired_tag))]
    pub async fn sync(
        &self,
        template: &PodTemplateSpec,
        workload: &str,
        spec: &ContainerVersionSpec,
        desired_tag: &str,
        validator: &dyn TagValidator,
        mutator: &dyn Mutator,
        typer: &dyn RecordTyper,
    ) -> Result<SyncOutcome> {
        let outcome = self
            .checker
            .check(template, workload, desired_tag, spec, validator)
            .await;
        debug!("Check for {} finished: {:?}", workload, outcome);

        if let Some(candidate) = outcome.clone().into_result()? {
            self.patcher
                .patch(template, workload, &candidate, spec, mutator, typer)
                .await?;
        }
        Ok(outcome)
    }
}
