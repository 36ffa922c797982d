//! Docker Engine runtime
//!
//! Talks to the local Docker daemon through bollard. Connection settings come
//! from the environment (`DOCKER_HOST`) or the platform default socket.

use crate::dock::{ContainerRuntime, ContainerSummary};
use crate::error::{Error, Result};
use bollard::Docker;
use bollard::container::{ListContainersOptions, RestartContainerOptions};
use std::time::Duration;
use tracing::debug;

/// Docker daemon connection
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect to the local daemon and negotiate the API version
    ///
    /// Failure here is fatal: nothing can be watched without a runtime.
    pub async fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| Error::RuntimeConnect(e.to_string()))?;
        let docker = docker
            .negotiate_version()
            .await
            .map_err(|e| Error::RuntimeConnect(e.to_string()))?;

        docker
            .ping()
            .await
            .map_err(|e| Error::RuntimeConnect(e.to_string()))?;

        debug!("connected to docker daemon");
        Ok(Self { docker })
    }
}

impl ContainerRuntime for DockerRuntime {
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>> {
        let options = ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| Error::Runtime(format!("failed to list containers: {}", e)))?;

        Ok(containers
            .into_iter()
            .filter_map(|c| {
                Some(ContainerSummary {
                    id: c.id?,
                    names: c.names.unwrap_or_default(),
                    labels: c.labels.unwrap_or_default(),
                })
            })
            .collect())
    }

    async fn restart_container(&self, id: &str, stop_timeout: Duration) -> Result<()> {
        let options = RestartContainerOptions {
            t: isize::try_from(stop_timeout.as_secs()).unwrap_or(isize::MAX),
        };

        self.docker
            .restart_container(id, Some(options))
            .await
            .map_err(|e| Error::Runtime(format!("failed to restart container {}: {}", id, e)))
    }
}
