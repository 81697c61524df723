use super::model::{ApiProvider, SettingsPatch, StoredSettings};
use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use thiserror::Error;
use tracing::warn;

const MIN_OPACITY: f64 = 0.1;
const MAX_OPACITY: f64 = 1.0;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Storage(#[from] sqlx::Error),
    #[error("settings update did not finish: {0}")]
    Interrupted(#[from] tokio::task::JoinError),
}

fn encode<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(Value::String(s)) => s,
        Ok(other) => other.to_string(),
        Err(_) => String::new(),
    }
}

fn decode<T: DeserializeOwned>(key: &str, value: &str) -> Option<T> {
    match serde_json::from_value(Value::String(value.to_string())) {
        Ok(decoded) => Some(decoded),
        Err(_) => {
            warn!(key = %key, value = %value, "Ignoring unreadable stored setting");
            None
        }
    }
}

fn check_model(provider: ApiProvider, field: &str, model: &str) -> Result<(), SettingsError> {
    if provider.models().contains(&model) {
        return Ok(());
    }
    Err(SettingsError::Invalid(format!(
        "{} '{}' is not available for provider {}",
        field,
        model,
        encode(&provider)
    )))
}

/// Merges `patch` into `current`.
pub fn apply_patch(
    current: &StoredSettings,
    patch: &SettingsPatch,
) -> Result<StoredSettings, SettingsError> {
    let mut next = current.clone();

    if let Some(api_key) = &patch.api_key {
        let api_key = api_key.trim();
        next.api_key = if api_key.is_empty() {
            None
        } else {
            Some(api_key.to_string())
        };
    }

    if let Some(provider) = patch.api_provider {
        if provider != current.api_provider {
            next.api_provider = provider;
            next.extraction_model = provider.default_model().to_string();
            next.solution_model = provider.default_model().to_string();
            next.debugging_model = provider.default_model().to_string();
        }
    }

    if let Some(model) = &patch.extraction_model {
        next.extraction_model = model.clone();
    }
    if let Some(model) = &patch.solution_model {
        next.solution_model = model.clone();
    }
    if let Some(model) = &patch.debugging_model {
        next.debugging_model = model.clone();
    }
    check_model(next.api_provider, "extractionModel", &next.extraction_model)?;
    check_model(next.api_provider, "solutionModel", &next.solution_model)?;
    check_model(next.api_provider, "debuggingModel", &next.debugging_model)?;

    if let Some(language) = patch.language {
        next.language = language;
    }

    if let Some(opacity) = patch.opacity {
        if !(MIN_OPACITY..=MAX_OPACITY).contains(&opacity) {
            return Err(SettingsError::Invalid(format!(
                "opacity must be between {} and {}",
                MIN_OPACITY, MAX_OPACITY
            )));
        }
        next.opacity = opacity;
    }

    Ok(next)
}

async fn load_from<'e, E>(executor: E) -> Result<StoredSettings, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, (String, String)>("SELECT key, value FROM settings")
        .fetch_all(executor)
        .await?;

    let mut settings = StoredSettings::default();
    for (key, value) in rows {
        match key.as_str() {
            "apiKey" => settings.api_key = Some(value),
            "apiProvider" => {
                if let Some(provider) = decode(&key, &value) {
                    settings.api_provider = provider;
                }
            }
            "extractionModel" => settings.extraction_model = value,
            "solutionModel" => settings.solution_model = value,
            "debuggingModel" => settings.debugging_model = value,
            "language" => {
                if let Some(language) = decode(&key, &value) {
                    settings.language = language;
                }
            }
            "opacity" => match value.parse() {
                Ok(opacity) => settings.opacity = opacity,
                Err(_) => warn!(value = %value, "Ignoring unreadable stored opacity"),
            },
            _ => warn!(key = %key, "Ignoring unknown stored setting"),
        }
    }
    Ok(settings)
}

fn entries(settings: &StoredSettings) -> Vec<(&'static str, Option<String>)> {
    vec![
        ("apiKey", settings.api_key.clone()),
        ("apiProvider", Some(encode(&settings.api_provider))),
        ("extractionModel", Some(settings.extraction_model.clone())),
        ("solutionModel", Some(settings.solution_model.clone())),
        ("debuggingModel", Some(settings.debugging_model.clone())),
        ("language", Some(encode(&settings.language))),
        ("opacity", Some(settings.opacity.to_string())),
    ]
}

pub async fn get_settings(pool: &SqlitePool) -> Result<StoredSettings, SettingsError> {
    Ok(load_from(pool).await?)
}

/// Merges `patch` into the stored settings under the database write lock.
pub async fn update_settings(
    pool: &SqlitePool,
    patch: &SettingsPatch,
) -> Result<StoredSettings, SettingsError> {
    let pool = pool.clone();
    let patch = patch.clone();
    // runs to completion even if the request goes away, so the connection
    // never returns to the pool mid-transaction
    tokio::spawn(async move {
        let mut conn = pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let result = merge_and_store(&mut conn, &patch).await;
        let end = if result.is_ok() { "COMMIT" } else { "ROLLBACK" };
        sqlx::query(end).execute(&mut *conn).await?;
        result
    })
    .await?
}

async fn merge_and_store(
    conn: &mut SqliteConnection,
    patch: &SettingsPatch,
) -> Result<StoredSettings, SettingsError> {
    let current = load_from(&mut *conn).await?;
    let next = apply_patch(&current, patch)?;

    let now = Utc::now().naive_utc();
    for (key, value) in entries(&next) {
        match value {
            Some(value) => {
                sqlx::query(
                    "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                )
                .bind(key)
                .bind(value)
                .bind(now)
                .execute(&mut *conn)
                .await?;
            }
            None => {
                sqlx::query("DELETE FROM settings WHERE key = ?")
                    .bind(key)
                    .execute(&mut *conn)
                    .await?;
            }
        }
    }
    Ok(next)
}
