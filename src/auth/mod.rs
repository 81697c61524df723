use crate::config::AppConfig;

mod handler;
mod model;
mod store;
mod utils;

pub async fn auth_api(config: &AppConfig) -> handler::Auth {
    handler::Auth::new(config.api_key.clone())
}
