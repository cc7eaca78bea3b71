//! ConfigMap-backed sync history
//!
//! Each workload gets a ConfigMap `<workload>-history` whose `history` key
//! holds a JSON array of [`HistoryRecord`]s, newest last.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, PostParams};
use kube::Client;
use tracing::{debug, info};

use super::collaborators::HistoryStore;
use crate::crd::HistoryRecord;
use crate::error::{Error, Result};

const HISTORY_KEY: &str = "history";
const DEFAULT_MAX_RECORDS: usize = 20;

/// [`HistoryStore`] writing to one ConfigMap per workload
#[derive(Clone)]
pub struct ConfigMapHistoryStore {
    client: Client,
    max_records: usize,
}

impl ConfigMapHistoryStore {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            max_records: DEFAULT_MAX_RECORDS,
        }
    }

    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = max_records.max(1);
        self
    }
}

fn config_map_name(workload: &str) -> String {
    format!("{}-history", workload)
}

fn standard_labels(workload: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(
        "app.kubernetes.io/managed-by".to_string(),
        "cv-operator".to_string(),
    );
    labels.insert("cv.k8s.io/workload".to_string(), workload.to_string());
    labels
}

/// Append `record` to the serialized history, keeping the newest `max` entries
fn append_record(existing: Option<&str>, record: &HistoryRecord, max: usize) -> Result<String> {
    let mut records: Vec<HistoryRecord> = match existing {
        Some(raw) if !raw.trim().is_empty() => serde_json::from_str(raw)?,
        _ => Vec::new(),
    };
    records.push(record.clone());
    if records.len() > max {
        let overflow = records.len() - max;
        records.drain(..overflow);
    }
    Ok(serde_json::to_string(&records)?)
}

#[async_trait]
impl HistoryStore for ConfigMapHistoryStore {
    async fn add(&self, namespace: &str, workload: &str, record: &HistoryRecord) -> Result<()> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let name = config_map_name(workload);

        match api.get(&name).await {
            Ok(mut existing) => {
                let current = existing
                    .data
                    .as_ref()
                    .and_then(|d| d.get(HISTORY_KEY))
                    .map(String::as_str);
                let updated = append_record(current, record, self.max_records)?;
                existing
                    .data
                    .get_or_insert_with(BTreeMap::new)
                    .insert(HISTORY_KEY.to_string(), updated);

                // replace carries the fetched resourceVersion, a concurrent writer yields 409
                api.replace(&name, &PostParams::default(), &existing)
                    .await
                    .map_err(Error::KubeError)?;
                debug!("Appended history for {} to {}/{}", workload, namespace, name);
            }
            Err(kube::Error::Api(e)) if e.code == 404 => {
                info!("Creating history ConfigMap {}/{}", namespace, name);
                let data = append_record(None, record, self.max_records)?;
                let config_map = ConfigMap {
                    metadata: ObjectMeta {
                        name: Some(name),
                        namespace: Some(namespace.to_string()),
                        labels: Some(standard_labels(workload)),
                        ..Default::default()
                    },
                    data: Some(BTreeMap::from([(HISTORY_KEY.to_string(), data)])),
                    ..Default::default()
                };
                api.create(&PostParams::default(), &config_map)
                    .await
                    .map_err(Error::KubeError)?;
            }
            Err(e) => return Err(Error::KubeError(e)),
        }

        Ok(())
    }
}
