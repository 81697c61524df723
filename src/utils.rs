use anyhow::Context;
use poem::{
    http::StatusCode,
    web::headers::authorization::Basic,
    web::headers::{self, HeaderMapExt},
    Endpoint, Error as PoemError, Middleware, Request, Response, Result as PoemResult,
};
use poem_openapi::{
    error::ParseRequestPayloadError,
    payload::Json,
    types::{ParseFromJSON, ToJSON},
    {ApiResponse, Object, Tags},
};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

#[derive(Tags)]
pub enum ApiTags {
    /// Persisted login state
    Auth,
    /// Persisted application settings
    Config,
    /// Health check endpoints
    HealthCheck,
    /// TikTok video listing (yt-dlp)
    TikTok,
}

pub async fn get_db_pool(database_url: &str) -> Result<SqlitePool, anyhow::Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("Failed to connect to SQLite")?;
    sqlx::migrate!()
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    Ok(pool)
}

/// Single-connection in-memory database with migrations applied.
#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!().run(&pool).await.unwrap();
    pool
}

/// File database under `dir`, opened the way the server opens it.
#[cfg(test)]
pub async fn file_pool(dir: &std::path::Path) -> SqlitePool {
    let url = format!("sqlite://{}?mode=rwc", dir.join("state.db").display());
    get_db_pool(&url).await.unwrap()
}

/// Response envelope, `{success: true, data}` or `{success: false, error}`.
#[derive(Object)]
pub struct ResponseObject<T: ParseFromJSON + ToJSON + Send + Sync> {
    success: bool,
    #[oai(skip_serializing_if_is_none)]
    data: Option<T>,
    #[oai(skip_serializing_if_is_none)]
    error: Option<String>,
}

impl<T: ParseFromJSON + ToJSON + Send + Sync> ResponseObject<T> {
    fn success(data: T) -> Json<ResponseObject<T>> {
        Json(ResponseObject {
            success: true,
            data: Some(data),
            error: None,
        })
    }

    fn failure(error: impl ToString) -> Json<ResponseObject<T>> {
        Json(ResponseObject {
            success: false,
            data: None,
            error: Some(error.to_string()),
        })
    }

    pub fn ok(data: T) -> JsonSuccess<T> {
        JsonSuccess::Ok(Self::success(data))
    }

    pub fn created(data: T) -> JsonSuccess<T> {
        JsonSuccess::Created(Self::success(data))
    }

    pub fn bad_request(error: impl ToString) -> JsonError<T> {
        JsonError::BadRequest(Self::failure(error))
    }

    pub fn unauthorized(error: impl ToString) -> JsonError<T> {
        JsonError::Unauthorized(Self::failure(error))
    }

    pub fn not_found(error: impl ToString) -> JsonError<T> {
        JsonError::NotFound(Self::failure(error))
    }

    pub fn internal_server_error(error: impl ToString) -> JsonError<T> {
        JsonError::InternalServerError(Self::failure(error))
    }

    pub fn bad_gateway(error: impl ToString) -> JsonError<T> {
        JsonError::BadGateway(Self::failure(error))
    }

    pub fn service_unavailable(error: impl ToString) -> JsonError<T> {
        JsonError::ServiceUnavailable(Self::failure(error))
    }

    pub fn gateway_timeout(error: impl ToString) -> JsonError<T> {
        JsonError::GatewayTimeout(Self::failure(error))
    }

    #[cfg(test)]
    pub fn is_success(&self) -> bool {
        self.success
    }

    #[cfg(test)]
    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    #[cfg(test)]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

#[derive(ApiResponse)]
pub enum JsonSuccess<T: ParseFromJSON + ToJSON + Send + Sync> {
    #[oai(status = 200)]
    Ok(Json<ResponseObject<T>>),
    #[oai(status = 201)]
    Created(Json<ResponseObject<T>>),
}

#[derive(ApiResponse)]
#[oai(bad_request_handler = "bad_request_handler")]
pub enum JsonError<T: ParseFromJSON + ToJSON + Send + Sync> {
    #[oai(status = 400)]
    BadRequest(Json<ResponseObject<T>>),
    #[oai(status = 401)]
    Unauthorized(Json<ResponseObject<T>>),
    #[oai(status = 404)]
    NotFound(Json<ResponseObject<T>>),
    #[oai(status = 500)]
    InternalServerError(Json<ResponseObject<T>>),
    #[oai(status = 502)]
    BadGateway(Json<ResponseObject<T>>),
    #[oai(status = 503)]
    ServiceUnavailable(Json<ResponseObject<T>>),
    #[oai(status = 504)]
    GatewayTimeout(Json<ResponseObject<T>>),
}

impl<T: ParseFromJSON + ToJSON + Send + Sync> JsonError<T> {
    #[cfg(test)]
    pub fn status(&self) -> u16 {
        match self {
            JsonError::BadRequest(_) => 400,
            JsonError::Unauthorized(_) => 401,
            JsonError::NotFound(_) => 404,
            JsonError::InternalServerError(_) => 500,
            JsonError::BadGateway(_) => 502,
            JsonError::ServiceUnavailable(_) => 503,
            JsonError::GatewayTimeout(_) => 504,
        }
    }

    #[cfg(test)]
    pub fn body(&self) -> &ResponseObject<T> {
        match self {
            JsonError::BadRequest(body)
            | JsonError::Unauthorized(body)
            | JsonError::NotFound(body)
            | JsonError::InternalServerError(body)
            | JsonError::BadGateway(body)
            | JsonError::ServiceUnavailable(body)
            | JsonError::GatewayTimeout(body) => &body.0,
        }
    }
}

impl<T: ParseFromJSON + ToJSON + Send + Sync> JsonSuccess<T> {
    #[cfg(test)]
    pub fn body(&self) -> &ResponseObject<T> {
        match self {
            JsonSuccess::Ok(body) | JsonSuccess::Created(body) => &body.0,
        }
    }
}

fn bad_request_handler<T: ParseFromJSON + ToJSON + Send + Sync>(err: PoemError) -> JsonError<T> {
    if err.is::<ParseRequestPayloadError>() {
        ResponseObject::bad_request(err)
    } else {
        ResponseObject::internal_server_error(err)
    }
}

pub struct BasicAuth {
    username: String,
    password: String,
}

impl BasicAuth {
    pub fn new(username: String, password: String) -> Self {
        BasicAuth { username, password }
    }
}

impl<E: Endpoint> Middleware<E> for BasicAuth {
    type Output = BasicAuthEndpoint<E>;

    fn transform(&self, ep: E) -> Self::Output {
        BasicAuthEndpoint {
            ep,
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

pub struct BasicAuthEndpoint<E> {
    ep: E,
    username: String,
    password: String,
}

impl<E: Endpoint> Endpoint for BasicAuthEndpoint<E> {
    type Output = E::Output;

    async fn call(&self, req: Request) -> PoemResult<Self::Output> {
        if let Some(auth) = req.headers().typed_get::<headers::Authorization<Basic>>() {
            if auth.0.username() == self.username && auth.0.password() == self.password {
                return self.ep.call(req).await;
            }
        }

        let res = Response::builder()
            .header("WWW-Authenticate", "Basic")
            .status(StatusCode::UNAUTHORIZED)
            .body(());

        Err(PoemError::from_response(res))
    }
}

pub fn verify_apikey(req: &Request, api_key: &str) -> Result<(), String> {
    let provided = match req.header("API-Key") {
        Some(key) => key,
        None => {
            return Err("API-Key header is missing".to_string());
        }
    };
    if provided != api_key {
        return Err("Invalid API-Key".to_string());
    }

    Ok(())
}
