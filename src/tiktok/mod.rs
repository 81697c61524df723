use crate::config::AppConfig;
use std::{io, sync::Arc};

mod environment;
mod error;
mod fetcher;
mod handler;
mod model;
mod runner;
mod utils;

pub use fetcher::VideoListFetcher;

pub fn video_fetcher(config: &AppConfig) -> io::Result<Arc<VideoListFetcher>> {
    let environment = environment::FetchEnvironment::from_config(config)?;
    tracing::info!(
        runtime = %environment.runtime().display(),
        extractor = %environment.extractor().display(),
        downloads = %environment.download_dir().display(),
        "Resolved yt-dlp environment"
    );

    Ok(Arc::new(VideoListFetcher::new(
        environment,
        Arc::new(runner::TokioCommandRunner),
        config.fetch_timeout,
    )))
}

pub async fn tiktok_api(fetcher: Arc<VideoListFetcher>, config: &AppConfig) -> handler::TikTok {
    handler::TikTok::new(fetcher, config.api_key.clone())
}

/// A fetcher whose scripting runtime does not exist.
#[cfg(test)]
pub fn unavailable_fetcher(dir: &std::path::Path) -> Arc<VideoListFetcher> {
    let environment = environment::FetchEnvironment::new(
        dir.join("missing-python"),
        "yt-dlp",
        environment::InvocationShape::Direct,
        dir.join("downloads"),
    )
    .unwrap();
    Arc::new(VideoListFetcher::new(
        environment,
        Arc::new(runner::TokioCommandRunner),
        std::time::Duration::from_secs(1),
    ))
}
