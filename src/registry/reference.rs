//! Fully-qualified image references (`registry/repository:tag`)

use std::fmt;

const DOCKER_HUB: &str = "docker.io";
const DOCKER_HUB_API_HOST: &str = "registry-1.docker.io";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    pub registry: String,
    pub repository: String,
    pub tag: String,
}

impl ImageReference {
    pub fn new(
        registry: impl Into<String>,
        repository: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            registry: registry.into(),
            repository: repository.into(),
            tag: tag.into(),
        }
    }

    /// Host the registry API is served from
    pub fn api_host(&self) -> &str {
        api_host(&self.registry)
    }

    /// Repository path as the registry API expects it
    pub fn api_repository(&self) -> String {
        api_repository(&self.registry, &self.repository)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.repository, self.tag)
    }
}

/// Docker Hub is addressed as `docker.io` but served from `registry-1.docker.io`
pub fn api_host(registry: &str) -> &str {
    match registry {
        DOCKER_HUB | "index.docker.io" => DOCKER_HUB_API_HOST,
        other => other,
    }
}

/// Official Docker Hub images live under `library/`
pub fn api_repository(registry: &str, repository: &str) -> String {
    if api_host(registry) == DOCKER_HUB_API_HOST && !repository.contains('/') {
        format!("library/{}", repository)
    } else {
        repository.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let reference = ImageReference::new("gcr.io", "project/app", "v1");
        assert_eq!(reference.to_string(), "gcr.io/project/app:v1");
    }

    #[test]
    fn test_docker_hub_addressing() {
        let reference = ImageReference::new("docker.io", "nginx", "latest");
        assert_eq!(reference.api_host(), "registry-1.docker.io");
        assert_eq!(reference.api_repository(), "library/nginx");

        let reference = ImageReference::new("docker.io", "bitnami/redis", "7");
        assert_eq!(reference.api_repository(), "bitnami/redis");

        let reference = ImageReference::new("quay.io", "etcd", "v3");
        assert_eq!(reference.api_host(), "quay.io");
        assert_eq!(reference.api_repository(), "etcd");
    }
}
