//! Container version operator
//!
//! Keeps the image tag of a named container in Kubernetes workloads in line
//! with a declared `ContainerVersion`:
//!
//! - [`controller::VersionChecker`] decides whether a pod template is up to
//!   date, has drifted, or cannot be synced
//! - [`controller::ConflictSafePatcher`] writes the new tag under a bounded
//!   retry policy, records history and emits the terminal status
//! - [`controller::SyncErrorReporter`] reports failures around the pair
//!
//! Watching resources and scheduling syncs is left to the caller.

pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod telemetry;

pub use config::{RetryConfig, SyncConfig};
pub use error::{Error, Result};
