use crate::tiktok::VideoListFetcher;
use sqlx::SqlitePool;
use std::sync::Arc;

pub mod handler;

pub async fn health_checks(pool: SqlitePool, fetcher: Arc<VideoListFetcher>) -> handler::HealthCheck {
    handler::HealthCheck::new(pool, fetcher)
}
