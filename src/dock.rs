//! Container runtime access
//!
//! This module provides:
//! - The runtime abstraction the Warden drives
//! - Container lookup by compose project and service name
//! - A Docker Engine implementation

pub mod docker;

pub use docker::DockerRuntime;

use crate::error::{Error, Result};
use crate::manifest::PROJECT_LABEL;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

/// The parts of a container listing entry the locator needs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: String,
    pub names: Vec<String>,
    pub labels: HashMap<String, String>,
}

impl ContainerSummary {
    /// Whether this container belongs to the given compose project
    pub fn in_project(&self, project: &str) -> bool {
        self.labels
            .get(PROJECT_LABEL)
            .is_some_and(|p| p == project)
    }

    /// Whether the primary name mentions the service
    pub fn matches_service(&self, service: &str) -> bool {
        self.names
            .first()
            .is_some_and(|name| name.contains(service))
    }
}

/// Operations the Warden needs from a container runtime
pub trait ContainerRuntime: Send + Sync + 'static {
    /// List every container, stopped ones included
    fn list_containers(&self) -> impl Future<Output = Result<Vec<ContainerSummary>>> + Send;

    /// Restart a container, giving it `stop_timeout` to exit before it is killed
    fn restart_container(
        &self,
        id: &str,
        stop_timeout: Duration,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Pick the container backing `service` out of a listing
///
/// Listing order decides between several matches, so the choice is
/// best-effort when more than one container qualifies.
pub fn find_container<'a>(
    containers: &'a [ContainerSummary],
    project: &str,
    service: &str,
) -> Option<&'a ContainerSummary> {
    containers
        .iter()
        .filter(|c| c.in_project(project))
        .find(|c| c.matches_service(service))
}

/// Resolve a service to its container ID with a fresh listing
pub async fn locate<R: ContainerRuntime>(runtime: &R, project: &str, service: &str) -> Result<String> {
    let containers = runtime.list_containers().await?;
    find_container(&containers, project, service)
        .map(|c| c.id.clone())
        .ok_or_else(|| Error::ContainerNotFound(service.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(id: &str, name: &str, project: &str) -> ContainerSummary {
        ContainerSummary {
            id: id.to_string(),
            names: vec![format!("/{}", name)],
            labels: HashMap::from([(PROJECT_LABEL.to_string(), project.to_string())]),
        }
    }

    struct StaticRuntime {
        containers: Vec<ContainerSummary>,
        fail: bool,
    }

    impl ContainerRuntime for StaticRuntime {
        async fn list_containers(&self) -> Result<Vec<ContainerSummary>> {
            if self.fail {
                return Err(Error::Runtime("daemon unavailable".to_string()));
            }
            Ok(self.containers.clone())
        }

        async fn restart_container(&self, _id: &str, _stop_timeout: Duration) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_find_container_filters_project() {
        let containers = vec![
            container("aaa", "other-sonarr-1", "other"),
            container("bbb", "media-stack-sonarr-1", "media-stack"),
        ];

        let found = find_container(&containers, "media-stack", "sonarr").unwrap();
        assert_eq!(found.id, "bbb");
    }

    #[test]
    fn test_find_container_requires_label() {
        let unlabelled = ContainerSummary {
            id: "ccc".to_string(),
            names: vec!["/media-stack-sonarr-1".to_string()],
            labels: HashMap::new(),
        };
        assert!(find_container(&[unlabelled], "media-stack", "sonarr").is_none());
    }

    #[test]
    fn test_find_container_uses_primary_name() {
        let mut c = container("ddd", "media-stack-gluetun-1", "media-stack");
        c.names.push("/sonarr-alias".to_string());
        assert!(find_container(&[c], "media-stack", "sonarr").is_none());
    }

    #[test]
    fn test_find_container_first_match_wins() {
        let containers = vec![
            container("first", "media-stack-radarr-1", "media-stack"),
            container("second", "media-stack-radarr-2", "media-stack"),
        ];
        let found = find_container(&containers, "media-stack", "radarr").unwrap();
        assert_eq!(found.id, "first");
    }

    #[test]
    fn test_find_container_no_names() {
        let mut c = container("eee", "x", "media-stack");
        c.names.clear();
        assert!(find_container(&[c], "media-stack", "x").is_none());
    }

    #[tokio::test]
    async fn test_locate() {
        let runtime = StaticRuntime {
            containers: vec![container("abc123", "media-stack-sonarr-1", "media-stack")],
            fail: false,
        };

        assert_eq!(
            locate(&runtime, "media-stack", "sonarr").await.unwrap(),
            "abc123"
        );
        assert!(matches!(
            locate(&runtime, "media-stack", "bazarr").await,
            Err(Error::ContainerNotFound(name)) if name == "bazarr"
        ));
    }

    #[tokio::test]
    async fn test_locate_listing_failure() {
        let runtime = StaticRuntime {
            containers: Vec::new(),
            fail: true,
        };
        assert!(matches!(
            locate(&runtime, "media-stack", "sonarr").await,
            Err(Error::Runtime(_))
        ));
    }
}
