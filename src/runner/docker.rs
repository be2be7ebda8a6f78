use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, DownloadFromContainerOptions, RemoveContainerOptions,
    StartContainerOptions, UploadToContainerOptions, WaitContainerOptions,
};
use bollard::models::{HostConfig, ResourcesUlimits};
use futures_util::StreamExt;

use super::RunnerError;
use super::api::ContainerApi;
use super::command::WORKSPACE_DIR;

// Resource policy constants, applied identically to every container.
const MEMORY_LIMIT_BYTES: i64 = 128 * 1024 * 1024;
const PIDS_LIMIT: i64 = 30;
const FSIZE_LIMIT_BYTES: i64 = 10_000_000;
const CPUSET_CPUS: &str = "0";
const SANDBOX_HOSTNAME: &str = "coderunner";

/// Docker-backed container runtime client
///
/// Wraps the long-lived daemon handle; connected once at startup and
/// reused for every request.
pub struct DockerApi {
    docker: Docker,
}

impl DockerApi {
    pub fn connect() -> Result<Self, RunnerError> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self { docker })
    }

    /// The fixed resource policy: no network, one CPU core, memory and
    /// swap capped together, bounded process count, and a hard file-size
    /// ulimit so a runaway process cannot exhaust host disk.
    fn resource_policy() -> HostConfig {
        HostConfig {
            network_mode: Some("none".to_string()),
            cpuset_cpus: Some(CPUSET_CPUS.to_string()),
            memory: Some(MEMORY_LIMIT_BYTES),
            memory_swap: Some(MEMORY_LIMIT_BYTES),
            pids_limit: Some(PIDS_LIMIT),
            ulimits: Some(vec![ResourcesUlimits {
                name: Some("fsize".to_string()),
                soft: Some(FSIZE_LIMIT_BYTES),
                hard: Some(FSIZE_LIMIT_BYTES),
            }]),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ContainerApi for DockerApi {
    async fn create(&self, image: &str, command: &str) -> Result<String, RunnerError> {
        let config = Config {
            image: Some(image.to_string()),
            cmd: Some(vec![
                "bash".to_string(),
                "-c".to_string(),
                command.to_string(),
            ]),
            hostname: Some(SANDBOX_HOSTNAME.to_string()),
            working_dir: Some(WORKSPACE_DIR.to_string()),
            network_disabled: Some(true),
            host_config: Some(Self::resource_policy()),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container(None::<CreateContainerOptions<String>>, config)
            .await?;

        log::debug!("created container {} from image {image}", created.id);
        Ok(created.id)
    }

    async fn upload(
        &self,
        container_id: &str,
        path: &str,
        archive: Vec<u8>,
    ) -> Result<(), RunnerError> {
        let options = UploadToContainerOptions {
            path: path.to_string(),
            ..Default::default()
        };

        self.docker
            .upload_to_container(container_id, Some(options), archive.into())
            .await?;
        Ok(())
    }

    async fn start(&self, container_id: &str) -> Result<(), RunnerError> {
        self.docker
            .start_container(container_id, None::<StartContainerOptions<String>>)
            .await?;
        Ok(())
    }

    async fn wait(&self, container_id: &str) -> Result<i64, RunnerError> {
        let options = WaitContainerOptions {
            condition: "not-running",
        };

        let mut wait = self.docker.wait_container(container_id, Some(options));
        match wait.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // The wait endpoint reports a non-zero user exit code as an
            // error value; fold it back into a plain status.
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(RunnerError::Infrastructure(e)),
            // Stream closed without a status: the container is already gone
            None => Ok(0),
        }
    }

    async fn download(&self, container_id: &str, path: &str) -> Result<Vec<u8>, RunnerError> {
        let options = DownloadFromContainerOptions {
            path: path.to_string(),
        };

        let mut stream = self.docker.download_from_container(container_id, Some(options));
        let mut archive = Vec::new();
        while let Some(chunk) = stream.next().await {
            archive.extend_from_slice(&chunk?);
        }

        Ok(archive)
    }

    async fn remove(&self, container_id: &str) -> Result<(), RunnerError> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };

        self.docker
            .remove_container(container_id, Some(options))
            .await?;

        log::debug!("removed container {container_id}");
        Ok(())
    }
}
