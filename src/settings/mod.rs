use crate::config::AppConfig;

mod handler;
mod model;
mod store;

pub async fn settings_api(config: &AppConfig) -> handler::Settings {
    handler::Settings::new(config.api_key.clone())
}
