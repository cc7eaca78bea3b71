//! Registry-backed tag validation
//!
//! A candidate tag is accepted when the registry answers a HEAD request for
//! its manifest (Docker Registry HTTP API v2) with a success status.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use tracing::debug;

use super::collaborators::TagValidator;
use crate::error::{Error, Result};

const DOCKER_HUB: &str = "https://registry-1.docker.io";

const MANIFEST_MEDIA_TYPES: &str = "application/vnd.oci.image.index.v1+json, \
application/vnd.oci.image.manifest.v1+json, \
application/vnd.docker.distribution.manifest.list.v2+json, \
application/vnd.docker.distribution.manifest.v2+json";

/// [`TagValidator`] checking that a tag exists in an image registry
#[derive(Clone)]
pub struct RegistryTagValidator {
    client: Client,
    registry: String,
    repository: String,
    token: Option<String>,
}

/// Split an image repository into registry base URL and repository path.
///
/// The first path segment names a registry host when it contains a `.` or
/// `:` or is `localhost`; otherwise Docker Hub is assumed, with `library/`
/// prepended to single-segment names.
pub fn split_registry(image_repo: &str) -> (String, String) {
    match image_repo.split_once('/') {
        Some((host, path))
            if host.contains('.') || host.contains(':') || host == "localhost" =>
        {
            (format!("https://{}", host), path.to_string())
        }
        Some(_) => (DOCKER_HUB.to_string(), image_repo.to_string()),
        None => (DOCKER_HUB.to_string(), format!("library/{}", image_repo)),
    }
}

fn manifest_url(registry: &str, repository: &str, tag: &str) -> String {
    format!(
        "{}/v2/{}/manifests/{}",
        registry.trim_end_matches('/'),
        repository,
        tag
    )
}

impl RegistryTagValidator {
    /// Validator for `image_repo` with a per-request `timeout` (default 10s)
    pub fn new(image_repo: &str, timeout: Option<Duration>) -> Result<Self> {
        let timeout = timeout.unwrap_or(Duration::from_secs(10));
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("cv-operator/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(Error::HttpError)?;
        let (registry, repository) = split_registry(image_repo);

        Ok(Self {
            client,
            registry,
            repository,
            token: None,
        })
    }

    /// Bearer token sent with every manifest request
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Override the registry base URL, e.g. for plain-HTTP mirrors
    pub fn with_registry(mut self, registry: impl Into<String>) -> Self {
        self.registry = registry.into();
        self
    }
}

#[async_trait]
impl TagValidator for RegistryTagValidator {
    async fn validate(&self, tag: &str) -> Result<()> {
        let url = manifest_url(&self.registry, &self.repository, tag);
        debug!("Checking manifest: {}", url);

        let mut request = self.client.head(&url).header(ACCEPT, MANIFEST_MEDIA_TYPES);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await.map_err(Error::HttpError)?;
        match resp.status() {
            status if status.is_success() => {
                debug!("Tag {} present in {}", tag, self.repository);
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(Error::ValidationFailed {
                tag: tag.to_string(),
                reason: format!("tag not found in {}", self.repository),
            }),
            status => Err(Error::ValidationFailed {
                tag: tag.to_string(),
                reason: format!("registry returned HTTP {}", status),
            }),
        }
    }
}
