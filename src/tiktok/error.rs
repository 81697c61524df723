use thiserror::Error;

/// Failure taxonomy of a video listing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    EnvironmentMissing,
    Timeout,
    NotFound,
    FetchFailed,
    NoData,
    ParseFailure,
}

/// Every variant displays as a fixed message that is safe to show a user.
/// Diagnostic detail (stderr, raw lines) is logged where the error is
/// raised and never carried here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("handle is required")]
    HandleRequired,
    #[error("malformed handle, only letters, digits, underscores and dots are allowed")]
    MalformedHandle,
    #[error("scripting runtime not found, please reinstall the application")]
    RuntimeNotFound,
    #[error("scripting runtime failed to initialize, please reinstall the application")]
    RuntimeBroken,
    #[error("fetch timed out, please retry later")]
    Timeout,
    #[error("handle does not exist or the profile page is unreachable")]
    NotFound,
    #[error("fetch failed, possibly a network problem or a platform restriction")]
    FetchFailed,
    #[error("no video data returned")]
    NoOutput,
    #[error("no videos found or all entries failed to parse")]
    NoVideos,
    #[error("line {line} is not a valid video entry")]
    ParseFailure { line: usize },
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::HandleRequired | FetchError::MalformedHandle => ErrorKind::InvalidInput,
            FetchError::RuntimeNotFound | FetchError::RuntimeBroken => {
                ErrorKind::EnvironmentMissing
            }
            FetchError::Timeout => ErrorKind::Timeout,
            FetchError::NotFound => ErrorKind::NotFound,
            FetchError::FetchFailed => ErrorKind::FetchFailed,
            FetchError::NoOutput | FetchError::NoVideos => ErrorKind::NoData,
            FetchError::ParseFailure { .. } => ErrorKind::ParseFailure,
        }
    }
}
