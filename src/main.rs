#[deny(clippy::all)]
use auth::auth_api;
use config::AppConfig;
use dotenv::dotenv;
use poem::{
    listener::TcpListener,
    middleware::{Cors, Tracing},
    EndpointExt, Route, Server,
};
use poem_openapi::OpenApiService;
use settings::settings_api;
use tiktok::{tiktok_api, video_fetcher};
use tokio::time::Duration;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use utils::get_db_pool;

mod auth;
mod config;
mod health;
mod settings;
mod tiktok;
mod utils;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    dotenv().ok(); // This line loads the environment variables from the ".env" file.
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_env("RUST_LOG"))
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
        }
    };

    let pool = match get_db_pool(&config.database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = ?e, "Failed to open database");
            return Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));
        }
    };

    let fetcher = video_fetcher(&config)?;
    // a missing runtime is reported per request, startup goes on
    if let Err(e) = fetcher.ensure_environment().await {
        error!(error = %e, "yt-dlp environment is not usable yet");
    }

    let tiktok_api = tiktok_api(fetcher.clone(), &config).await;
    let auth_api = auth_api(&config).await;
    let settings_api = settings_api(&config).await;
    let health_api = health::health_checks(pool.clone(), fetcher).await;

    let api_service = OpenApiService::new(
        (tiktok_api, auth_api, settings_api, health_api),
        "Coder Toolkit",
        "1.0",
    )
    .server(format!("{}/api/v1", config.host));
    let basic_auth = || {
        utils::BasicAuth::new(
            config.basic_auth_username.clone(),
            config.basic_auth_password.clone(),
        )
    };
    let ui = api_service.swagger_ui().with(basic_auth());
    let spec = api_service.spec_endpoint_yaml().with(basic_auth());

    let route = Route::new()
        .nest("/api/v1", api_service)
        .nest("/swagger", ui)
        .nest("/swagger/spec", spec)
        .with(Cors::new())
        .with(Tracing)
        .data(pool.clone());

    Server::new(TcpListener::bind(format!("0.0.0.0:{}", config.port)))
        .run_with_graceful_shutdown(
            route,
            async move {
                let _ = tokio::signal::ctrl_c().await;
                pool.close().await;
            },
            Some(Duration::from_secs(5)),
        )
        .await
}
