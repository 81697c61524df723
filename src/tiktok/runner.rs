use async_trait::async_trait;
use std::{ffi::OsString, io, path::PathBuf, process::Stdio, time::Duration};
use tokio::{io::AsyncReadExt, process::Command, task::JoinHandle};
use tracing::{debug, warn};

/// A program plus its arguments, ready to be spawned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Invocation {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[cfg(test)]
    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }
}

/// Buffered result of a child process that ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was ended by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("process exceeded {0:?} and was killed")]
    TimedOut(Duration),
    #[error("failed to spawn process: {0}")]
    Spawn(#[from] io::Error),
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        invocation: &Invocation,
        timeout: Duration,
    ) -> Result<CommandOutput, RunError>;
}

/// Runs invocations as real child processes with `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioCommandRunner;

fn drain<R>(pipe: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(error) = pipe.read_to_end(&mut buf).await {
                warn!(error = %error, "Failed to read child output");
            }
        }
        buf
    })
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        timeout: Duration,
    ) -> Result<CommandOutput, RunError> {
        debug!(program = %invocation.program.display(), args = ?invocation.args, "Spawning");

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdout = drain(child.stdout.take());
        let mut stderr = drain(child.stderr.take());

        // the pipes can outlive the child when it leaves background processes
        // behind, so the deadline covers the drains too
        let collect = async {
            let status = child.wait().await?;
            let stdout = (&mut stdout).await.unwrap_or_default();
            let stderr = (&mut stderr).await.unwrap_or_default();
            Ok::<_, io::Error>((status, stdout, stderr))
        };
        let collected = tokio::time::timeout(timeout, collect).await;

        let (status, out, err) = match collected {
            Ok(collected) => collected?,
            Err(_) => {
                // kill() also reaps the child
                if !matches!(child.try_wait(), Ok(Some(_))) {
                    if let Err(error) = child.kill().await {
                        warn!(error = %error, "Failed to kill timed out process");
                    }
                }
                stdout.abort();
                stderr.abort();
                return Err(RunError::TimedOut(timeout));
            }
        };

        Ok(CommandOutput {
            code: status.code(),
            stdout: String::from_utf8_lossy(&out).into_owned(),
            stderr: String::from_utf8_lossy(&err).into_owned(),
        })
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// What the scripted runner answers for one kind of invocation.
    #[derive(Debug, Clone)]
    pub enum Reply {
        Output(CommandOutput),
        TimedOut,
        SpawnFails,
    }

    impl Reply {
        pub fn ok(stdout: &str) -> Self {
            Reply::Output(CommandOutput {
                code: Some(0),
                stdout: stdout.to_string(),
                stderr: String::new(),
            })
        }

        pub fn exit(code: i32, stderr: &str) -> Self {
            Reply::Output(CommandOutput {
                code: Some(code),
                stdout: String::new(),
                stderr: stderr.to_string(),
            })
        }
    }

    /// Answers the runtime probe, the `--version` probe and the listing
    /// with canned replies and records every invocation it receives.
    pub struct ScriptedRunner {
        pub runtime_probe: Reply,
        pub version_probe: Reply,
        pub listing: Reply,
        calls: Mutex<Vec<Invocation>>,
    }

    impl ScriptedRunner {
        pub fn listing(listing: Reply) -> Self {
            ScriptedRunner {
                runtime_probe: Reply::ok("3.11.4 (main)\n"),
                version_probe: Reply::ok("2024.08.06\n"),
                listing,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> Vec<Invocation> {
            self.calls.lock().unwrap().clone()
        }

        pub fn listing_calls(&self) -> usize {
            self.calls()
                .iter()
                .filter(|call| call.has_arg("--dump-json"))
                .count()
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(
            &self,
            invocation: &Invocation,
            timeout: Duration,
        ) -> Result<CommandOutput, RunError> {
            self.calls.lock().unwrap().push(invocation.clone());
            let reply = if invocation.has_arg("-c") {
                &self.runtime_probe
            } else if invocation.has_arg("--version") {
                &self.version_probe
            } else {
                &self.listing
            };
            match reply {
                Reply::Output(output) => Ok(output.clone()),
                Reply::TimedOut => Err(RunError::TimedOut(timeout)),
                Reply::SpawnFails => Err(RunError::Spawn(io::Error::new(
                    io::ErrorKind::NotFound,
                    "no such file",
                ))),
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn captures_both_streams_and_exit_code() {
        let invocation = Invocation::new("sh")
            .arg("-c")
            .arg("echo out; echo err 1>&2; exit 3");
        let output = TokioCommandRunner
            .run(&invocation, Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(output.code, Some(3));
        assert!(!output.success());
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
    }

    #[tokio::test]
    async fn kills_process_that_outlives_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let invocation = Invocation::new("sh")
            .arg("-c")
            .arg(format!("echo $$ > {}; exec sleep 30", pid_file.display()));
        let started = Instant::now();
        let result = TokioCommandRunner
            .run(&invocation, Duration::from_millis(500))
            .await;

        assert!(matches!(result, Err(RunError::TimedOut(_))));
        assert!(started.elapsed() < Duration::from_secs(10));

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let alive = std::process::Command::new("kill")
            .arg("-0")
            .arg(pid.trim())
            .stderr(Stdio::null())
            .status()
            .unwrap();
        assert!(!alive.success(), "process {} still running", pid.trim());
    }

    #[tokio::test]
    async fn pipe_held_by_background_process_still_times_out() {
        let invocation = Invocation::new("sh")
            .arg("-c")
            .arg("sleep 30 & echo '{}'; exit 0");
        let started = Instant::now();
        let result = TokioCommandRunner
            .run(&invocation, Duration::from_millis(500))
            .await;

        assert!(matches!(result, Err(RunError::TimedOut(_))));
        assert!(
            started.elapsed() < Duration::from_secs(5),
            "run took {:?} with a 500ms timeout",
            started.elapsed()
        );
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let invocation = Invocation::new("/definitely/not/here/yt-dlp");
        let result = TokioCommandRunner
            .run(&invocation, Duration::from_secs(1))
            .await;

        assert!(matches!(result, Err(RunError::Spawn(_))));
    }
}
