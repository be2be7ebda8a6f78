use async_trait::async_trait;

use super::RunnerError;

/// Narrow interface to the container runtime
///
/// The put-archive/get-archive pair is the serialization boundary between
/// host and container, so the whole runner can be exercised against a fake
/// client with no daemon behind it.
#[async_trait]
pub trait ContainerApi: Send + Sync {
    /// Creates a container, not yet started, whose entry command is the
    /// composed shell command line. Returns the container id.
    async fn create(&self, image: &str, command: &str) -> Result<String, RunnerError>;

    /// Uploads a tar archive into `path` inside the container filesystem
    async fn upload(
        &self,
        container_id: &str,
        path: &str,
        archive: Vec<u8>,
    ) -> Result<(), RunnerError>;

    async fn start(&self, container_id: &str) -> Result<(), RunnerError>;

    /// Blocks until the container exits and returns its exit status.
    /// A non-zero status is user data, not an error.
    async fn wait(&self, container_id: &str) -> Result<i64, RunnerError>;

    /// Fetches `path` from the container filesystem as a tar archive
    async fn download(&self, container_id: &str, path: &str) -> Result<Vec<u8>, RunnerError>;

    async fn remove(&self, container_id: &str) -> Result<(), RunnerError>;
}
