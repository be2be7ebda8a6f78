use std::sync::Arc;

use super::api::ContainerApi;
use super::archive;
use super::command;
use super::{ExecutionRequest, ExtractionError, PhaseResult, ResultBundle, RunnerError};

/// Runs untrusted submissions, one fresh container per request
///
/// Each call provisions an ephemeral container, injects the source,
/// starts it, blocks until it exits, extracts the captured streams and
/// removes the container. Containers are never reused: the container is
/// the isolation boundary between submissions.
pub struct CodeRunner {
    api: Arc<dyn ContainerApi>,
    image: String,
}

impl CodeRunner {
    /// Creates a runner for the given base image; the per-request tag is
    /// appended at execution time.
    pub fn new(api: Arc<dyn ContainerApi>, image: impl Into<String>) -> Self {
        Self {
            api,
            image: image.into(),
        }
    }

    /// Executes one submission and returns the captured phase results.
    ///
    /// Compile or run failures inside the container (non-zero exit,
    /// timeout expiry, resource kills) are not errors here; they come back
    /// as ordinary [`PhaseResult`] data. Errors mean the infrastructure
    /// failed or the result archive could not be decoded.
    pub async fn run(&self, request: &ExecutionRequest) -> Result<ResultBundle, RunnerError> {
        let image = format!("{}:{}", self.image, request.image_tag);
        let shell_command =
            command::build_command(&request.compile_command, &request.run_command);

        let container_id = self.api.create(&image, &shell_command).await?;
        log::info!("container {container_id} created from {image}");

        let source_archive = archive::pack_source(&request.filename, &request.source_code)?;
        self.api
            .upload(&container_id, command::WORKSPACE_DIR, source_archive)
            .await?;

        self.api.start(&container_id).await?;
        let status = self.api.wait(&container_id).await?;
        log::debug!("container {container_id} exited with status {status}");

        let results = self.extract_results(&container_id).await;

        // Removal failure must not mask the extraction outcome
        if let Err(e) = self.api.remove(&container_id).await {
            log::warn!("failed to remove container {container_id}: {e}");
        }

        results
    }

    async fn extract_results(&self, container_id: &str) -> Result<ResultBundle, RunnerError> {
        let raw = self.api.download(container_id, command::OUTPUT_DIR).await?;
        let files = archive::unpack_results(&raw)?;

        Ok(ResultBundle {
            compile: decode_phase(&files, command::COMPILE_PREFIX)?,
            run: decode_phase(&files, "")?,
        })
    }
}

fn decode_phase(
    files: &std::collections::HashMap<String, Vec<u8>>,
    prefix: &str,
) -> Result<PhaseResult, ExtractionError> {
    Ok(PhaseResult {
        stdout: archive::decode_capture(files, &capture_name(prefix, "stdout"))?,
        stderr: archive::decode_capture(files, &capture_name(prefix, "stderr"))?,
        time: archive::decode_capture(files, &capture_name(prefix, "time"))?,
    })
}

fn capture_name(prefix: &str, stream: &str) -> String {
    format!("{}/{prefix}{stream}.txt", command::OUTPUT_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use super::*;

    /// In-memory stand-in for the container runtime: records the call
    /// sequence and hands back a canned result archive.
    #[derive(Default)]
    struct FakeContainerApi {
        calls: Mutex<Vec<String>>,
        uploads: Mutex<Vec<Vec<u8>>>,
        containers_created: AtomicUsize,
        result_archive: Vec<u8>,
    }

    impl FakeContainerApi {
        fn with_results(entries: &[(&str, &str)]) -> Self {
            let mut builder = tar::Builder::new(Vec::new());
            for (name, content) in entries {
                let mut header = tar::Header::new_gnu();
                header.set_size(content.len() as u64);
                header.set_mode(0o644);
                builder
                    .append_data(&mut header, name, content.as_bytes())
                    .unwrap();
            }

            Self {
                result_archive: builder.into_inner().unwrap(),
                ..Default::default()
            }
        }

        fn record(&self, call: &str) {
            self.calls.lock().unwrap().push(call.to_string());
        }
    }

    #[async_trait]
    impl ContainerApi for FakeContainerApi {
        async fn create(&self, _image: &str, _command: &str) -> Result<String, RunnerError> {
            self.record("create");
            let n = self.containers_created.fetch_add(1, Ordering::SeqCst);
            Ok(format!("container-{n}"))
        }

        async fn upload(
            &self,
            _container_id: &str,
            _path: &str,
            archive: Vec<u8>,
        ) -> Result<(), RunnerError> {
            self.record("upload");
            self.uploads.lock().unwrap().push(archive);
            Ok(())
        }

        async fn start(&self, _container_id: &str) -> Result<(), RunnerError> {
            self.record("start");
            Ok(())
        }

        async fn wait(&self, _container_id: &str) -> Result<i64, RunnerError> {
            self.record("wait");
            Ok(0)
        }

        async fn download(&self, _container_id: &str, _path: &str) -> Result<Vec<u8>, RunnerError> {
            self.record("download");
            Ok(self.result_archive.clone())
        }

        async fn remove(&self, _container_id: &str) -> Result<(), RunnerError> {
            self.record("remove");
            Ok(())
        }
    }

    fn bash_request(source_code: &str, compile_command: &str) -> ExecutionRequest {
        ExecutionRequest {
            source_code: source_code.to_string(),
            image_tag: "bash".to_string(),
            filename: "Main.sh".to_string(),
            compile_command: compile_command.to_string(),
            run_command: "bash Main.sh".to_string(),
        }
    }

    #[tokio::test]
    async fn captures_both_phases_from_the_result_archive() {
        let api = Arc::new(FakeContainerApi::with_results(&[
            ("dist/compile_stdout.txt", ""),
            ("dist/compile_stderr.txt", "warning: unused variable\n"),
            ("dist/compile_time.txt", "0.42\n"),
            ("dist/stdout.txt", "Hello World!\n"),
            ("dist/stderr.txt", ""),
            ("dist/time.txt", "0.01\n"),
        ]));
        let runner = CodeRunner::new(api, "judge");

        let results = runner
            .run(&bash_request("echo 'Hello World!'", "true"))
            .await
            .unwrap();

        assert_eq!(
            results,
            ResultBundle {
                compile: PhaseResult {
                    stdout: String::new(),
                    stderr: "warning: unused variable".to_string(),
                    time: "0.42".to_string(),
                },
                run: PhaseResult {
                    stdout: "Hello World!".to_string(),
                    stderr: String::new(),
                    time: "0.01".to_string(),
                },
            }
        );
    }

    #[tokio::test]
    async fn failed_compile_leaves_run_fields_empty() {
        // Compile exited non-zero, so the run step never executed and its
        // capture files never appeared in the archive.
        let api = Arc::new(FakeContainerApi::with_results(&[
            ("dist/compile_stdout.txt", ""),
            ("dist/compile_stderr.txt", "Main.c:1: error: expected ';'\n"),
            ("dist/compile_time.txt", "0.10\n"),
        ]));
        let runner = CodeRunner::new(api, "judge");

        let results = runner
            .run(&bash_request("int main() { return 0 }", "gcc Main.c"))
            .await
            .unwrap();

        assert_eq!(results.compile.stderr, "Main.c:1: error: expected ';'");
        assert_eq!(results.run, PhaseResult::default());
    }

    #[tokio::test]
    async fn uploads_the_source_byte_exact() {
        let api = Arc::new(FakeContainerApi::with_results(&[]));
        let runner = CodeRunner::new(Arc::clone(&api) as Arc<dyn ContainerApi>, "judge");

        // Carriage returns and trailing blanks must survive injection
        let source = "echo 'Hello World!'  \r\nexit 0\r\n";
        runner.run(&bash_request(source, "")).await.unwrap();

        let uploads = api.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);

        let files = archive::unpack_results(&uploads[0]).unwrap();
        assert_eq!(files["Main.sh"], source.as_bytes());
    }

    #[tokio::test]
    async fn drives_the_container_lifecycle_in_order() {
        let api = Arc::new(FakeContainerApi::with_results(&[]));
        let runner = CodeRunner::new(Arc::clone(&api) as Arc<dyn ContainerApi>, "judge");

        runner.run(&bash_request("echo hi", "")).await.unwrap();

        let calls = api.calls.lock().unwrap();
        assert_eq!(
            *calls,
            ["create", "upload", "start", "wait", "download", "remove"]
        );
    }

    #[tokio::test]
    async fn identical_requests_get_independent_containers() {
        let api = Arc::new(FakeContainerApi::with_results(&[(
            "dist/stdout.txt",
            "hi\n",
        )]));
        let runner = CodeRunner::new(Arc::clone(&api) as Arc<dyn ContainerApi>, "judge");

        let request = bash_request("echo hi", "");
        let first = runner.run(&request).await.unwrap();
        let second = runner.run(&request).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(api.containers_created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn garbage_result_archive_is_an_extraction_error() {
        let api = Arc::new(FakeContainerApi {
            result_archive: vec![0xab; 1024],
            ..Default::default()
        });
        let runner = CodeRunner::new(api, "judge");

        let err = runner.run(&bash_request("echo hi", "")).await.unwrap_err();
        assert!(matches!(err, RunnerError::Extraction(_)));
    }
}
