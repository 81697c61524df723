use crate::{tiktok::VideoListFetcher, utils::ApiTags};
use poem::{error::InternalServerError, http::StatusCode, Error, Result};
use poem_openapi::{payload::PlainText, OpenApi};
use sqlx::SqlitePool;
use std::sync::Arc;

pub struct HealthCheck {
    pool: SqlitePool,
    fetcher: Arc<VideoListFetcher>,
}

#[OpenApi(prefix_path = "/health/", tag = "ApiTags::HealthCheck")]
impl HealthCheck {
    pub fn new(pool: SqlitePool, fetcher: Arc<VideoListFetcher>) -> Self {
        Self { pool, fetcher }
    }

    #[oai(path = "/liveness", method = "get")]
    async fn liveness(&self) -> PlainText<String> {
        PlainText("OK".to_string())
    }

    #[oai(path = "/readiness", method = "get")]
    async fn readiness(&self) -> Result<PlainText<String>> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(InternalServerError)?;

        if let Err(err) = self.fetcher.ensure_environment().await {
            return Err(Error::from_string(
                err.to_string(),
                StatusCode::SERVICE_UNAVAILABLE,
            ));
        }

        Ok(PlainText("OK".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{tiktok::unavailable_fetcher, utils::test_pool};
    use tempfile::tempdir;

    #[tokio::test]
    async fn readiness_fails_without_runtime() {
        let dir = tempdir().unwrap();
        let health = HealthCheck::new(test_pool().await, unavailable_fetcher(dir.path()));

        assert_eq!(health.liveness().await.0, "OK");
        let err = match health.readiness().await {
            Ok(_) => panic!("expected readiness to fail"),
            Err(err) => err,
        };
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
