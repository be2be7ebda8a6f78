mod api;
mod archive;
mod command;
mod docker;
mod executor;

use std::sync::Arc;

use serde::Serialize;

pub use api::ContainerApi;
pub use docker::DockerApi;
pub use executor::CodeRunner;

/// Output captured from a single phase (compile or run)
///
/// All fields are empty strings when the phase never executed — because no
/// compile step was configured, or because compilation failed and the run
/// step never started.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PhaseResult {
    pub stdout: String,
    pub stderr: String,
    /// Wall-clock seconds as reported by the in-container time wrapper
    pub time: String,
}

/// Terminal output of one execution, keyed by phase
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResultBundle {
    pub compile: PhaseResult,
    pub run: PhaseResult,
}

/// One submission to execute. Immutable once execution starts.
///
/// The compile command may be blank, meaning the submission has no compile
/// step. Per-phase timeouts are fixed constants of the runner, not request
/// parameters.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub source_code: String,
    pub image_tag: String,
    pub filename: String,
    pub compile_command: String,
    pub run_command: String,
}

/// Failures the runner surfaces to its caller
///
/// User-code failures (non-zero exit, timeout expiry, resource-limit
/// kills) are deliberately not represented here; they come back as
/// ordinary [`PhaseResult`] data. Nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The container runtime could not carry out a lifecycle operation
    /// (daemon unreachable, image missing, upload refused)
    #[error("container runtime failure: {0}")]
    Infrastructure(#[from] bollard::errors::Error),

    /// The source archive could not be assembled
    #[error("failed to package source archive: {0}")]
    SourceArchive(#[source] std::io::Error),

    /// The result archive was fetched but could not be decoded
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

/// Result-archive decode failures, distinct from the missing-file
/// condition (an absent capture file silently yields an empty field)
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("malformed result archive: {0}")]
    Archive(#[from] std::io::Error),

    #[error("captured file {file} is not valid UTF-8")]
    Decode {
        file: String,
        #[source]
        source: std::string::FromUtf8Error,
    },
}

/// Connects to the local Docker daemon and returns a runner for `image`
///
/// The daemon handle is acquired once here and reused for every request.
pub fn create_code_runner(image: &str) -> Result<CodeRunner, RunnerError> {
    let api = Arc::new(DockerApi::connect()?);
    log::info!("connected to container runtime");
    Ok(CodeRunner::new(api, image))
}
