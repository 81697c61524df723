use super::{
    error::{ErrorKind, FetchError},
    fetcher::VideoListFetcher,
    model::VideoRecord,
};
use crate::utils::{verify_apikey, ApiTags, JsonError, JsonSuccess, ResponseObject};
use poem::Request;
use poem_openapi::{param::Query, OpenApi};
use std::sync::Arc;
use tracing::error;

pub struct TikTok {
    fetcher: Arc<VideoListFetcher>,
    api_key: String,
}

fn into_response(err: FetchError) -> JsonError<Vec<VideoRecord>> {
    let message = format!("Failed to fetch videos: {}", err);
    match err.kind() {
        ErrorKind::InvalidInput => ResponseObject::bad_request(message),
        ErrorKind::NotFound | ErrorKind::NoData => ResponseObject::not_found(message),
        ErrorKind::EnvironmentMissing => ResponseObject::service_unavailable(message),
        ErrorKind::Timeout => ResponseObject::gateway_timeout(message),
        ErrorKind::FetchFailed => ResponseObject::bad_gateway(message),
        // per-line failures never abort a fetch
        ErrorKind::ParseFailure => ResponseObject::internal_server_error(message),
    }
}

#[OpenApi(
    prefix_path = "/tiktok/",
    request_header(name = "API-Key", ty = "String", description = "Private API Key"),
    tag = "ApiTags::TikTok"
)]
impl TikTok {
    pub fn new(fetcher: Arc<VideoListFetcher>, api_key: String) -> Self {
        Self { fetcher, api_key }
    }

    /// List the videos of a profile (handle with or without the leading `@`)
    #[oai(path = "/videos", method = "get", operation_id = "tiktok::fetch_user_videos")]
    async fn fetch_user_videos(
        &self,
        req: &Request,
        handle: Query<String>,
    ) -> Result<JsonSuccess<Vec<VideoRecord>>, JsonError<Vec<VideoRecord>>> {
        if let Err(e) = verify_apikey(req, &self.api_key) {
            return Err(ResponseObject::unauthorized(e));
        }

        match self.fetcher.fetch_user_videos(&handle.0).await {
            Ok(videos) => Ok(ResponseObject::ok(videos)),
            Err(err) => {
                error!(handle = %handle.0, error = %err, "Failed to fetch videos");
                Err(into_response(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{
        environment::{FetchEnvironment, InvocationShape},
        runner::testing::{Reply, ScriptedRunner},
    };
    use super::*;
    use std::time::Duration;
    use tempfile::{tempdir, NamedTempFile, TempDir};

    fn tiktok_api(listing: Reply) -> (TikTok, NamedTempFile, TempDir) {
        let runtime = NamedTempFile::new().unwrap();
        let data = tempdir().unwrap();
        let environment =
            FetchEnvironment::new(runtime.path(), "yt-dlp", InvocationShape::Direct, data.path())
                .unwrap();
        let fetcher = VideoListFetcher::new(
            environment,
            Arc::new(ScriptedRunner::listing(listing)),
            Duration::from_secs(60),
        );
        (TikTok::new(Arc::new(fetcher), "secret".to_string()), runtime, data)
    }

    fn authorized() -> Request {
        Request::builder().header("API-Key", "secret").finish()
    }

    #[tokio::test]
    async fn success_envelope_carries_records() {
        let (api, _runtime, _data) = tiktok_api(Reply::ok(
            r#"{"id":"1","webpage_url":"https://x/1","duration":75}"#,
        ));

        let res = api
            .fetch_user_videos(&authorized(), Query("@someone".to_string()))
            .await
            .unwrap_or_else(|_| panic!("fetch failed"));

        let body = res.body();
        assert!(body.is_success());
        assert!(body.error().is_none());
        let videos = body.data().unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].duration, "1:15");
    }

    #[tokio::test]
    async fn failures_map_to_status_and_message() {
        let cases = [
            (Reply::TimedOut, "someone", 504),
            (Reply::exit(1, "HTTP Error 404: Not Found"), "someone", 404),
            (Reply::exit(2, "boom"), "someone", 502),
            (Reply::ok(""), "someone", 404),
            (Reply::ok(""), "not valid", 400),
        ];

        for (reply, handle, status) in cases {
            let (api, _runtime, _data) = tiktok_api(reply);
            let err = match api
                .fetch_user_videos(&authorized(), Query(handle.to_string()))
                .await
            {
                Ok(_) => panic!("expected failure for {handle}"),
                Err(err) => err,
            };

            assert_eq!(err.status(), status);
            assert!(!err.body().is_success());
            assert!(err.body().data().is_none());
            let message = err.body().error().unwrap();
            assert!(message.starts_with("Failed to fetch videos: "));
            assert!(!message.contains("boom"));
        }
    }

    #[tokio::test]
    async fn rejects_missing_api_key() {
        let (api, _runtime, _data) = tiktok_api(Reply::ok(""));

        let err = match api
            .fetch_user_videos(&Request::builder().finish(), Query("someone".to_string()))
            .await
        {
            Ok(_) => panic!("expected failure"),
            Err(err) => err,
        };
        assert_eq!(err.status(), 401);
    }
}
