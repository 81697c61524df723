use super::{
    environment::FetchEnvironment,
    error::FetchError,
    model::VideoRecord,
    runner::{CommandOutput, CommandRunner, RunError},
    utils::{normalize_handle, parse_line, profile_url},
};
use std::{sync::Arc, time::Duration};
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

/// Upper bound for the runtime and `--version` probes.
const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

const LISTING_FLAGS: [&str; 4] = [
    "--flat-playlist",
    "--dump-json",
    "--no-playlist-reverse",
    "--no-warnings",
];

/// Lists the videos of a TikTok profile through yt-dlp.
pub struct VideoListFetcher {
    environment: FetchEnvironment,
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
    verified: OnceCell<String>,
}

impl VideoListFetcher {
    pub fn new(
        environment: FetchEnvironment,
        runner: Arc<dyn CommandRunner>,
        timeout: Duration,
    ) -> Self {
        Self {
            environment,
            runner,
            timeout,
            verified: OnceCell::new(),
        }
    }

    /// Checks the runtime and yt-dlp once; a success is remembered, a
    /// failure is retried on the next call. Returns the yt-dlp version.
    pub async fn ensure_environment(&self) -> Result<&str, FetchError> {
        self.verified
            .get_or_try_init(|| self.verify_environment())
            .await
            .map(String::as_str)
    }

    async fn verify_environment(&self) -> Result<String, FetchError> {
        let runtime = self.environment.runtime();
        if !self.environment.runtime_exists() {
            error!(path = %runtime.display(), "Scripting runtime not found");
            return Err(FetchError::RuntimeNotFound);
        }

        match self
            .runner
            .run(&self.environment.runtime_probe(), PROBE_TIMEOUT)
            .await
        {
            Ok(output) if output.success() => {
                debug!(version = %output.stdout.trim(), "Scripting runtime verified");
            }
            Ok(output) => {
                error!(code = ?output.code, stderr = %output.stderr, "Scripting runtime probe failed");
                return Err(FetchError::RuntimeBroken);
            }
            Err(error) => {
                error!(error = %error, "Scripting runtime probe failed");
                return Err(FetchError::RuntimeBroken);
            }
        }

        let probe = self.environment.extractor_invocation(["--version"]);
        let version = match self.runner.run(&probe, PROBE_TIMEOUT).await {
            Ok(output) if output.success() && !output.stdout.trim().is_empty() => {
                output.stdout.trim().to_string()
            }
            Ok(output) => {
                error!(code = ?output.code, stderr = %output.stderr, "yt-dlp --version failed");
                return Err(FetchError::RuntimeBroken);
            }
            Err(error) => {
                error!(error = %error, "yt-dlp --version failed");
                return Err(FetchError::RuntimeBroken);
            }
        };

        info!(version = %version, "yt-dlp verified");
        Ok(version)
    }

    pub async fn fetch_user_videos(&self, handle: &str) -> Result<Vec<VideoRecord>, FetchError> {
        let handle = normalize_handle(handle)?;
        let profile = profile_url(&handle)?;

        self.ensure_environment().await?;

        let invocation = self
            .environment
            .extractor_invocation(LISTING_FLAGS.iter().copied().chain([profile.as_str()]));
        debug!(handle = %handle, invocation = ?invocation, "Listing videos");

        let output = self.runner.run(&invocation, self.timeout).await;
        let output = classify(&handle, output)?;

        if !output.stderr.trim().is_empty() {
            warn!(handle = %handle, stderr = %output.stderr.trim(), "yt-dlp wrote to stderr");
        }
        if output.stdout.trim().is_empty() {
            error!(handle = %handle, "yt-dlp returned no output");
            return Err(FetchError::NoOutput);
        }

        let videos = parse_listing(&handle, &output.stdout);
        if videos.is_empty() {
            return Err(FetchError::NoVideos);
        }

        info!(handle = %handle, count = videos.len(), "Listed videos");
        Ok(videos)
    }
}

/// Maps process level failures before anything is parsed.
fn classify(
    handle: &str,
    output: Result<CommandOutput, RunError>,
) -> Result<CommandOutput, FetchError> {
    let output = match output {
        Ok(output) => output,
        Err(RunError::TimedOut(after)) => {
            error!(handle = %handle, timeout = ?after, "yt-dlp timed out");
            return Err(FetchError::Timeout);
        }
        Err(RunError::Spawn(error)) => {
            error!(handle = %handle, error = %error, "Failed to start yt-dlp");
            return Err(FetchError::FetchFailed);
        }
    };

    if output.success() {
        return Ok(output);
    }

    error!(handle = %handle, code = ?output.code, stderr = %output.stderr, "yt-dlp failed");
    if output.stderr.to_lowercase().contains("http error 404") {
        return Err(FetchError::NotFound);
    }
    Err(FetchError::FetchFailed)
}

/// One record per usable line, in output order. Corrupt lines are logged
/// and skipped, entries without id or URL are skipped silently.
fn parse_listing(handle: &str, stdout: &str) -> Vec<VideoRecord> {
    stdout
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(index, line)| match parse_line(handle, index + 1, line) {
            Ok(record) => record,
            Err(error) => {
                warn!(handle = %handle, error = %error, line = %line, "Skipping unparsable entry");
                None
            }
        })
        .collect()
}


#[cfg(all(test, unix))]
mod process_tests {
    use super::super::{environment::InvocationShape, error::ErrorKind, runner::TokioCommandRunner};
    use super::*;
    use std::{fs, os::unix::fs::PermissionsExt, path::Path};
    use tempfile::tempdir;

    fn script(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn real_process_exceeding_timeout_is_killed_and_reported() {
        let dir = tempdir().unwrap();
        // answers the version probe, hangs on the listing
        let extractor = script(
            dir.path(),
            "yt-dlp",
            r#"if [ "$1" = "--version" ]; then echo 2024.08.06; exit 0; fi
exec sleep 30"#,
        );
        let runtime = script(dir.path(), "python3", "echo 3.11.4");
        let environment = FetchEnvironment::new(
            &runtime,
            &extractor,
            InvocationShape::Direct,
            dir.path().join("downloads"),
        )
        .unwrap();
        let fetcher = VideoListFetcher::new(
            environment,
            Arc::new(TokioCommandRunner),
            Duration::from_millis(300),
        );

        let err = fetcher.fetch_user_videos("someone").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn real_process_output_is_parsed() {
        let dir = tempdir().unwrap();
        let extractor = script(
            dir.path(),
            "yt-dlp",
            r#"if [ "$1" = "--version" ]; then echo 2024.08.06; exit 0; fi
echo '{"id":"1","webpage_url":"https://x/1","duration":75}'
echo 'not json'
echo '{"id":"2","webpage_url":"https://x/2"}'"#,
        );
        let runtime = script(dir.path(), "python3", "echo 3.11.4");
        let environment = FetchEnvironment::new(
            &runtime,
            &extractor,
            InvocationShape::Direct,
            dir.path().join("downloads"),
        )
        .unwrap();
        let fetcher = VideoListFetcher::new(
            environment,
            Arc::new(TokioCommandRunner),
            Duration::from_secs(10),
        );

        let videos = fetcher.fetch_user_videos("someone").await.unwrap();
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0].duration, "1:15");
    }
}
