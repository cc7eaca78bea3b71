//! Prometheus metrics for container version syncs

use std::sync::atomic::AtomicI64;

use chrono::{DateTime, Utc};
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use tracing::debug;

use super::collaborators::{EventLevel, MetricsSink};
use crate::error::{Error, Result};

/// Labels for sync events
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct EventLabels {
    pub key: String,
    pub level: String,
}

/// Labels for plain counters
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct KeyLabels {
    pub key: String,
}

/// [`MetricsSink`] backed by a prometheus-client registry
pub struct PrometheusMetrics {
    events: Family<EventLabels, Counter>,
    counts: Family<KeyLabels, Counter>,
    last_event: Family<KeyLabels, Gauge<i64, AtomicI64>>,
    registry: Registry,
}

impl Default for PrometheusMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PrometheusMetrics {
    pub fn new() -> Self {
        let events = Family::<EventLabels, Counter>::default();
        let counts = Family::<KeyLabels, Counter>::default();
        let last_event = Family::<KeyLabels, Gauge<i64, AtomicI64>>::default();

        let mut registry = Registry::default();
        registry.register(
            "cv_sync_events",
            "Sync events by key and level",
            events.clone(),
        );
        registry.register("cv_sync_counts", "Sync counters by key", counts.clone());
        registry.register(
            "cv_sync_last_event_timestamp_seconds",
            "Unix time of the most recent event per key",
            last_event.clone(),
        );

        Self {
            events,
            counts,
            last_event,
            registry,
        }
    }

    /// Current value of the event counter for `key` at `level`
    pub fn event_total(&self, key: &str, level: EventLevel) -> u64 {
        self.events
            .get_or_create(&EventLabels {
                key: key.to_string(),
                level: level.as_str().to_string(),
            })
            .get()
    }

    /// Current value of the plain counter for `key`
    pub fn count_total(&self, key: &str) -> u64 {
        self.counts
            .get_or_create(&KeyLabels {
                key: key.to_string(),
            })
            .get()
    }

    /// Render the registry in the Prometheus text format
    pub fn encode(&self) -> Result<String> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)
            .map_err(|e| Error::ConfigError(format!("Failed to encode metrics: {}", e)))?;
        Ok(buffer)
    }
}

impl MetricsSink for PrometheusMetrics {
    fn event(&self, key: &str, message: &str, tag: &str, level: EventLevel, timestamp: DateTime<Utc>) {
        debug!(key, tag, level = level.as_str(), "{}", message);
        self.events
            .get_or_create(&EventLabels {
                key: key.to_string(),
                level: level.as_str().to_string(),
            })
            .inc();
        self.last_event
            .get_or_create(&KeyLabels {
                key: key.to_string(),
            })
            .set(timestamp.timestamp());
    }

    fn inc_count(&self, key: &str) {
        self.counts
            .get_or_create(&KeyLabels {
                key: key.to_string(),
            })
            .inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_and_count_totals() {
        let metrics = PrometheusMetrics::new();
        metrics.event("web.sync.failure", "mismatch", "", EventLevel::Error, Utc::now());
        metrics.event("web.sync.failure", "mismatch", "", EventLevel::Error, Utc::now());
        metrics.inc_count("web.sync.success");

        assert_eq!(metrics.event_total("web.sync.failure", EventLevel::Error), 2);
        assert_eq!(metrics.event_total("web.sync.failure", EventLevel::Warning), 0);
        assert_eq!(metrics.count_total("web.sync.success"), 1);
        assert_eq!(metrics.count_total("cvc.web.history.save.failure"), 0);
    }

    #[test]
    fn test_encode_contains_keys() {
        let metrics = PrometheusMetrics::new();
        metrics.inc_count("web.sync.success");
        metrics.event("web.sync.failure", "x", "", EventLevel::Error, Utc::now());

        let text = metrics.encode().unwrap();
        assert!(text.contains("cv_sync_counts_total{key=\"web.sync.success\"} 1"));
        assert!(text.contains("cv_sync_events_total{key=\"web.sync.failure\",level=\"error\"} 1"));
        assert!(text.contains("cv_sync_last_event_timestamp_seconds"));
    }
}
