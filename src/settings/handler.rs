use super::model::{AppSettings, SettingsPatch};
use super::store::{self, SettingsError};
use crate::utils::{verify_apikey, ApiTags, JsonError, JsonSuccess, ResponseObject};
use poem::{web::Data, Request};
use poem_openapi::{payload::Json, OpenApi};
use sqlx::SqlitePool;
use tracing::{error, info};

pub struct Settings {
    api_key: String,
}

#[OpenApi(
    prefix_path = "/config/",
    request_header(name = "API-Key", ty = "String", description = "Private API Key"),
    tag = "ApiTags::Config"
)]
impl Settings {
    pub fn new(api_key: String) -> Self {
        Self { api_key }
    }

    #[oai(path = "/", method = "get", operation_id = "config::get_config")]
    async fn get_config(
        &self,
        req: &Request,
        pool: Data<&SqlitePool>,
    ) -> Result<JsonSuccess<AppSettings>, JsonError<String>> {
        if let Err(e) = verify_apikey(req, &self.api_key) {
            return Err(ResponseObject::unauthorized(e));
        }

        match store::get_settings(pool.0).await {
            Ok(settings) => Ok(ResponseObject::ok(AppSettings::from(&settings))),
            Err(e) => {
                error!(error = %e, "Failed to read settings");
                Err(ResponseObject::internal_server_error("Failed to read settings"))
            }
        }
    }

    #[oai(path = "/", method = "patch", operation_id = "config::update_config")]
    async fn update_config(
        &self,
        req: &Request,
        pool: Data<&SqlitePool>,
        payload: Json<SettingsPatch>,
    ) -> Result<JsonSuccess<AppSettings>, JsonError<String>> {
        if let Err(e) = verify_apikey(req, &self.api_key) {
            return Err(ResponseObject::unauthorized(e));
        }

        match store::update_settings(pool.0, &payload).await {
            Ok(settings) => {
                info!(provider = ?settings.api_provider, language = ?settings.language, "Settings updated");
                Ok(ResponseObject::ok(AppSettings::from(&settings)))
            }
            Err(SettingsError::Invalid(e)) => Err(ResponseObject::bad_request(e)),
            Err(e) => {
                error!(error = %e, "Failed to store settings");
                Err(ResponseObject::internal_server_error("Failed to store settings"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::model::{mask_api_key, ApiProvider};
    use super::*;
    use crate::utils::test_pool;

    fn authorized() -> Request {
        Request::builder().header("API-Key", "secret").finish()
    }

    #[test]
    fn masks_keys() {
        assert_eq!(mask_api_key("sk-proj-abcdefgh1234"), "sk-p****1234");
        assert_eq!(mask_api_key("short"), "****");
        assert_eq!(mask_api_key("12345678"), "****");
    }

    #[tokio::test]
    async fn api_key_is_never_returned_in_full() {
        let pool = test_pool().await;
        let api = Settings::new("secret".to_string());
        let patch = SettingsPatch {
            api_key: Some("sk-proj-abcdefgh1234".to_string()),
            api_provider: Some(ApiProvider::Anthropic),
            ..Default::default()
        };

        let res = match api.update_config(&authorized(), Data(&pool), Json(patch)).await {
            Ok(res) => res,
            Err(_) => panic!("update failed"),
        };
        let settings = res.body().data().unwrap();
        assert!(settings.has_api_key);
        assert_eq!(settings.api_key.as_deref(), Some("sk-p****1234"));
        assert_eq!(settings.solution_model, "claude-3-7-sonnet-20250219");

        let res = match api.get_config(&authorized(), Data(&pool)).await {
            Ok(res) => res,
            Err(_) => panic!("get failed"),
        };
        assert_eq!(res.body().data().unwrap(), settings);
    }

    #[tokio::test]
    async fn invalid_patch_is_bad_request() {
        let pool = test_pool().await;
        let api = Settings::new("secret".to_string());
        let patch = SettingsPatch {
            opacity: Some(3.0),
            ..Default::default()
        };

        let err = match api.update_config(&authorized(), Data(&pool), Json(patch)).await {
            Ok(_) => panic!("expected failure"),
            Err(err) => err,
        };
        assert_eq!(err.status(), 400);
        assert!(err.body().error().unwrap().contains("opacity"));
    }
}
