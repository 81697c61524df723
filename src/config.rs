use anyhow::Context;
use std::{env, path::PathBuf, time::Duration};

const DEFAULT_PORT: &str = "3000";
const DEFAULT_DATABASE_URL: &str = "sqlite://coder-toolkit.db?mode=rwc";
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;

/// Process configuration, read once from the environment in `main`.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: String,
    pub database_url: String,
    pub api_key: String,
    pub basic_auth_username: String,
    pub basic_auth_password: String,
    pub resources_dir: PathBuf,
    pub data_dir: PathBuf,
    pub runtime_path: Option<PathBuf>,
    pub extractor_path: Option<PathBuf>,
    pub fetch_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let host = env::var("HOST").context("HOST must be set")?;
        let api_key = env::var("API_KEY").context("API_KEY must be set")?;
        let basic_auth_username =
            env::var("BASIC_AUTH_USERNAME").context("BASIC_AUTH_USERNAME must be set")?;
        let basic_auth_password =
            env::var("BASIC_AUTH_PASSWORD").context("BASIC_AUTH_PASSWORD must be set")?;
        let port = env::var("PORT").unwrap_or(DEFAULT_PORT.to_string());
        let database_url =
            env::var("DATABASE_URL").unwrap_or(DEFAULT_DATABASE_URL.to_string());

        let resources_dir = match env::var("RESOURCES_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => env::current_dir().context("Failed to read current directory")?,
        };
        let data_dir = env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data"));

        let fetch_timeout = match env::var("FETCH_TIMEOUT_SECS") {
            Ok(secs) => Duration::from_secs(
                secs.parse()
                    .with_context(|| format!("FETCH_TIMEOUT_SECS is not a number: {}", secs))?,
            ),
            Err(_) => Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
        };

        Ok(AppConfig {
            host,
            port,
            database_url,
            api_key,
            basic_auth_username,
            basic_auth_password,
            resources_dir,
            data_dir,
            runtime_path: env::var("RUNTIME_PATH").ok().map(PathBuf::from),
            extractor_path: env::var("EXTRACTOR_PATH").ok().map(PathBuf::from),
            fetch_timeout,
        })
    }
}
