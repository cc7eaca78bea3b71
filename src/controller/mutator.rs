//! Image writes against live workloads

use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::core::v1::PodTemplateSpec;
use kube::api::{Api, PostParams};
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use super::collaborators::{Mutator, RecordTyper};
use crate::crd::Image;
use crate::error::{Error, Result};

/// Workload types that own a pod template
pub trait PodTemplated {
    fn pod_template_mut(&mut self) -> Option<&mut PodTemplateSpec>;
}

impl PodTemplated for Deployment {
    fn pod_template_mut(&mut self) -> Option<&mut PodTemplateSpec> {
        self.spec.as_mut().map(|s| &mut s.template)
    }
}

impl PodTemplated for StatefulSet {
    fn pod_template_mut(&mut self) -> Option<&mut PodTemplateSpec> {
        self.spec.as_mut().map(|s| &mut s.template)
    }
}

impl PodTemplated for DaemonSet {
    fn pod_template_mut(&mut self) -> Option<&mut PodTemplateSpec> {
        self.spec.as_mut().map(|s| &mut s.template)
    }
}

/// Set the image of the container named `container`.
///
/// `index` comes from the caller's template and is used when the refetched
/// object still has `container` there. Otherwise the container is looked up
/// by name, so a reordered pod spec never gets the image on the wrong
/// container.
fn set_container_image<K: PodTemplated + ResourceExt>(
    workload: &mut K,
    index: usize,
    container: &str,
    image: &Image,
) -> Result<()> {
    let name = workload.name_any();
    let not_found = || Error::ContainerNotFound {
        container: container.to_string(),
        workload: name.clone(),
    };

    let containers = match workload.pod_template_mut().and_then(|t| t.spec.as_mut()) {
        Some(spec) => &mut spec.containers,
        None => return Err(not_found()),
    };
    let position = match containers.get(index) {
        Some(c) if c.name == container => Some(index),
        _ => containers.iter().position(|c| c.name == container),
    };
    let target = match position {
        Some(i) => &mut containers[i],
        None => return Err(not_found()),
    };
    target.image = Some(image.to_string());
    Ok(())
}

/// [`Mutator`] that refetches a workload and replaces it with the new image.
///
/// The replace carries the fetched `resourceVersion`, so a concurrent change
/// surfaces as a 409 conflict and the caller's retry policy runs it again.
pub struct WorkloadImageMutator<K> {
    api: Api<K>,
    name: String,
    container: String,
    image: Image,
}

impl<K> WorkloadImageMutator<K> {
    pub fn new(
        api: Api<K>,
        name: impl Into<String>,
        container: impl Into<String>,
        image: Image,
    ) -> Self {
        Self {
            api,
            name: name.into(),
            container: container.into(),
            image,
        }
    }
}

#[async_trait]
impl<K> Mutator for WorkloadImageMutator<K>
where
    K: Resource<DynamicType = ()>
        + PodTemplated
        + Clone
        + Debug
        + DeserializeOwned
        + Serialize
        + Send
        + Sync
        + 'static,
{
    async fn mutate(&self, container_index: usize) -> Result<()> {
        let mut workload = self.api.get(&self.name).await.map_err(Error::KubeError)?;
        set_container_image(&mut workload, container_index, &self.container, &self.image)?;

        self.api
            .replace(&self.name, &PostParams::default(), &workload)
            .await
            .map_err(Error::KubeError)?;

        info!(
            "Set container {} of {} {} to {}",
            self.container,
            K::kind(&()),
            self.name,
            self.image
        );
        Ok(())
    }
}

impl<K> RecordTyper for WorkloadImageMutator<K>
where
    K: Resource<DynamicType = ()> + Send + Sync,
{
    fn record_type(&self) -> String {
        K::kind(&()).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::{DeploymentSpec, StatefulSetSpec};
    use k8s_openapi::api::core::v1::{Container, PodSpec};
    use kube::api::ObjectMeta;

    fn pod_template() -> PodTemplateSpec {
        PodTemplateSpec {
            metadata: None,
            spec: Some(PodSpec {
                containers: vec![
                    Container {
                        name: "app".to_string(),
                        image: Some("repo/app:v1".to_string()),
                        ..Default::default()
                    },
                    Container {
                        name: "proxy".to_string(),
                        image: Some("repo/proxy:v1".to_string()),
                        ..Default::default()
                    },
                ],
                ..Default::default()
            }),
        }
    }

    fn deployment() -> Deployment {
        Deployment {
            metadata: ObjectMeta {
                name: Some("web".to_string()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                template: pod_template(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn images(d: Deployment) -> Vec<(String, Option<String>)> {
        d.spec
            .unwrap()
            .template
            .spec
            .unwrap()
            .containers
            .into_iter()
            .map(|c| (c.name, c.image))
            .collect()
    }

    #[test]
    fn test_set_container_image_by_index() {
        let mut d = deployment();
        set_container_image(&mut d, 0, "app", &Image::new("repo/app", "v2")).unwrap();

        let images = images(d);
        assert_eq!(images[0].1.as_deref(), Some("repo/app:v2"));
        assert_eq!(images[1].1.as_deref(), Some("repo/proxy:v1"));
    }

    #[test]
    fn test_reordered_containers_write_by_name() {
        let mut d = deployment();
        if let Some(spec) = d.spec.as_mut().and_then(|s| s.template.spec.as_mut()) {
            spec.containers.reverse();
        }

        // index 0 now holds the sidecar
        set_container_image(&mut d, 0, "app", &Image::new("repo/app", "v2")).unwrap();

        let images = images(d);
        assert_eq!(images[0], ("proxy".to_string(), Some("repo/proxy:v1".to_string())));
        assert_eq!(images[1], ("app".to_string(), Some("repo/app:v2".to_string())));
    }

    #[test]
    fn test_stale_index_out_of_range_falls_back_to_name() {
        let mut d = deployment();
        set_container_image(&mut d, 5, "proxy", &Image::new("repo/proxy", "v2")).unwrap();

        let images = images(d);
        assert_eq!(images[0].1.as_deref(), Some("repo/app:v1"));
        assert_eq!(images[1].1.as_deref(), Some("repo/proxy:v2"));
    }

    #[test]
    fn test_container_removed_since_check() {
        let mut d = deployment();
        let err =
            set_container_image(&mut d, 0, "worker", &Image::new("repo/worker", "v2")).unwrap_err();
        assert!(matches!(
            err,
            Error::ContainerNotFound { ref container, ref workload }
                if container == "worker" && workload == "web"
        ));
        let images = images(d);
        assert_eq!(images[0].1.as_deref(), Some("repo/app:v1"));
        assert_eq!(images[1].1.as_deref(), Some("repo/proxy:v1"));
    }

    #[test]
    fn test_statefulset_without_spec() {
        let mut s = StatefulSet::default();
        assert!(set_container_image(&mut s, 0, "db", &Image::new("repo/db", "v2")).is_err());

        s.spec = Some(StatefulSetSpec {
            template: pod_template(),
            ..Default::default()
        });
        assert!(set_container_image(&mut s, 1, "proxy", &Image::new("repo/proxy", "v2")).is_ok());
    }
}
