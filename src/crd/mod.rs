//! Custom Resource Definitions for the container version operator
//!
//! This module defines the `ContainerVersion` CRD and the image/history types
//! shared with the controller.

mod container_version;
mod types;

pub use container_version::{ContainerVersion, ContainerVersionSpec, ContainerVersionStatus};
pub use types::*;
