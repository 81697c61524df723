use super::model::{AuthState, SetAuth, SubscriptionStatus};
use super::store;
use super::utils::extract_claims;
use crate::utils::{verify_apikey, ApiTags, JsonError, JsonSuccess, ResponseObject};
use poem::{web::Data, Request};
use poem_openapi::{payload::Json, OpenApi};
use sqlx::SqlitePool;
use tracing::{error, info};

pub struct Auth {
    api_key: String,
}

#[OpenApi(
    prefix_path = "/auth/",
    request_header(name = "API-Key", ty = "String", description = "Private API Key"),
    tag = "ApiTags::Auth"
)]
impl Auth {
    pub fn new(api_key: String) -> Self {
        Self { api_key }
    }

    // current login state
    #[oai(path = "/", method = "get", operation_id = "auth::get_auth")]
    async fn get_auth(
        &self,
        req: &Request,
        pool: Data<&SqlitePool>,
    ) -> Result<JsonSuccess<AuthState>, JsonError<String>> {
        if let Err(e) = verify_apikey(req, &self.api_key) {
            return Err(ResponseObject::unauthorized(e));
        }

        match store::get_auth(pool.0).await {
            Ok(state) => Ok(ResponseObject::ok(state)),
            Err(e) => {
                error!(error = %e, "Failed to read auth state");
                Err(ResponseObject::internal_server_error("Failed to read auth state"))
            }
        }
    }

    // log in with explicit user data
    #[oai(path = "/", method = "put", operation_id = "auth::set_auth")]
    async fn set_auth(
        &self,
        req: &Request,
        pool: Data<&SqlitePool>,
        payload: Json<SetAuth>,
    ) -> Result<JsonSuccess<AuthState>, JsonError<String>> {
        if let Err(e) = verify_apikey(req, &self.api_key) {
            return Err(ResponseObject::unauthorized(e));
        }

        if payload.id.trim().is_empty() || payload.email.trim().is_empty() {
            return Err(ResponseObject::bad_request("id and email are required"));
        }

        match store::set_auth(pool.0, &payload).await {
            Ok(state) => {
                info!(user_id = %state.id, "Logged in");
                Ok(ResponseObject::ok(state))
            }
            Err(e) => {
                error!(error = %e, "Failed to store auth state");
                Err(ResponseObject::internal_server_error("Failed to store auth state"))
            }
        }
    }

    // log in with the access token handed back by the login page
    #[oai(path = "/session", method = "post", operation_id = "auth::create_session")]
    async fn create_session(
        &self,
        req: &Request,
        pool: Data<&SqlitePool>,
    ) -> Result<JsonSuccess<AuthState>, JsonError<String>> {
        if let Err(e) = verify_apikey(req, &self.api_key) {
            return Err(ResponseObject::unauthorized(e));
        }

        let claims = match extract_claims(req.header("Authorization")) {
            Ok(claims) => claims,
            Err(e) => {
                return Err(ResponseObject::unauthorized(e));
            }
        };

        let email = match claims.email {
            Some(email) if !email.is_empty() => email,
            _ => {
                return Err(ResponseObject::bad_request("token has no email claim"));
            }
        };

        let auth = SetAuth {
            id: claims.sub,
            email,
            subscription_status: SubscriptionStatus::Test,
        };
        match store::set_auth(pool.0, &auth).await {
            Ok(state) => {
                info!(user_id = %state.id, "Session created");
                Ok(ResponseObject::created(state))
            }
            Err(e) => {
                error!(error = %e, "Failed to store auth state");
                Err(ResponseObject::internal_server_error("Failed to store auth state"))
            }
        }
    }

    // log out
    #[oai(path = "/", method = "delete", operation_id = "auth::clear_auth")]
    async fn clear_auth(
        &self,
        req: &Request,
        pool: Data<&SqlitePool>,
    ) -> Result<JsonSuccess<AuthState>, JsonError<String>> {
        if let Err(e) = verify_apikey(req, &self.api_key) {
            return Err(ResponseObject::unauthorized(e));
        }

        match store::clear_auth(pool.0).await {
            Ok(state) => Ok(ResponseObject::ok(state)),
            Err(e) => {
                error!(error = %e, "Failed to clear auth state");
                Err(ResponseObject::internal_server_error("Failed to clear auth state"))
            }
        }
    }

    #[oai(
        path = "/free-trial",
        method = "post",
        operation_id = "auth::increment_free_trial_usage"
    )]
    async fn increment_free_trial_usage(
        &self,
        req: &Request,
        pool: Data<&SqlitePool>,
    ) -> Result<JsonSuccess<AuthState>, JsonError<String>> {
        if let Err(e) = verify_apikey(req, &self.api_key) {
            return Err(ResponseObject::unauthorized(e));
        }

        match store::increment_free_trial_usage(pool.0).await {
            Ok(state) => Ok(ResponseObject::ok(state)),
            Err(e) => {
                error!(error = %e, "Failed to increment free trial usage");
                Err(ResponseObject::internal_server_error(
                    "Failed to increment free trial usage",
                ))
            }
        }
    }
}
