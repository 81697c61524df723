use super::runner::Invocation;
use crate::config::AppConfig;
use std::{
    ffi::OsString,
    fs, io,
    path::{Path, PathBuf},
};

const UNIX_RUNTIME: &str = "/usr/local/bin/python3";
const UNIX_EXTRACTOR: &str = "yt-dlp";

/// How the extraction executable is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationShape {
    /// `<extractor> <args>`
    Direct,
    /// `<runtime> <extractor script> <args>`
    ViaRuntime,
}

/// Resolved locations of the scripting runtime and yt-dlp.
///
/// Built once at startup and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchEnvironment {
    runtime: PathBuf,
    extractor: PathBuf,
    shape: InvocationShape,
    download_dir: PathBuf,
}

impl FetchEnvironment {
    pub fn new(
        runtime: impl Into<PathBuf>,
        extractor: impl Into<PathBuf>,
        shape: InvocationShape,
        download_dir: impl Into<PathBuf>,
    ) -> io::Result<Self> {
        let download_dir = download_dir.into();
        fs::create_dir_all(&download_dir)?;
        Ok(FetchEnvironment {
            runtime: runtime.into(),
            extractor: extractor.into(),
            shape,
            download_dir,
        })
    }

    /// Platform defaults, overridden by `RUNTIME_PATH` / `EXTRACTOR_PATH`.
    pub fn from_config(config: &AppConfig) -> io::Result<Self> {
        let bundled = config.resources_dir.join("python");
        let (runtime, extractor, shape) = if cfg!(windows) {
            (
                bundled.join("python.exe"),
                bundled.join("yt-dlp"),
                InvocationShape::ViaRuntime,
            )
        } else {
            (
                PathBuf::from(UNIX_RUNTIME),
                PathBuf::from(UNIX_EXTRACTOR),
                InvocationShape::Direct,
            )
        };

        Self::new(
            config.runtime_path.clone().unwrap_or(runtime),
            config.extractor_path.clone().unwrap_or(extractor),
            shape,
            config.data_dir.join("downloads"),
        )
    }

    pub fn runtime(&self) -> &Path {
        &self.runtime
    }

    pub fn extractor(&self) -> &Path {
        &self.extractor
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    pub fn runtime_exists(&self) -> bool {
        self.runtime.exists()
    }

    /// The trivial script used to confirm the runtime launches.
    pub fn runtime_probe(&self) -> Invocation {
        Invocation::new(&self.runtime)
            .arg("-c")
            .arg("import sys; print(sys.version)")
    }

    /// The extraction executable with the given arguments appended.
    pub fn extractor_invocation<I, S>(&self, args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let invocation = match self.shape {
            InvocationShape::Direct => Invocation::new(&self.extractor),
            InvocationShape::ViaRuntime => {
                Invocation::new(&self.runtime).arg(self.extractor.as_os_str())
            }
        };
        invocation.args(args)
    }
}
