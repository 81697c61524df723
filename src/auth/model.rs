use chrono::NaiveDateTime;
use poem_openapi::{Enum, Object};
use serde::{Deserialize, Serialize};

#[derive(Debug, Enum, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[oai(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Pro,
    Test,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pro => "pro",
            SubscriptionStatus::Test => "test",
        }
    }

    /// Unknown values read back from storage fall back to `test`.
    pub fn from_stored(value: &str) -> Self {
        match value {
            "pro" => SubscriptionStatus::Pro,
            _ => SubscriptionStatus::Test,
        }
    }
}

fn email_example() -> String {
    "someone@example.com".to_string()
}

/// Persisted login state
#[derive(Debug, Object, Clone, PartialEq, Eq, Serialize)]
#[oai(rename_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    /// user id, empty when logged out
    pub id: String,
    /// email of the user, empty when logged out
    pub email: String,
    pub subscription_status: SubscriptionStatus,
    pub is_authenticated: bool,
    /// number of free trial uses consumed (kept across logouts)
    pub free_trial_usage_count: i64,
    #[oai(read_only)]
    /// last time the state changed
    pub updated_at: NaiveDateTime,
}

/// Set auth schema
#[derive(Debug, Object, Clone, PartialEq, Eq)]
#[oai(rename_all = "camelCase")]
pub struct SetAuth {
    #[oai(validator(min_length = 1, max_length = 128))]
    /// user id
    pub id: String,

    #[oai(validator(min_length = 3, max_length = 320), default = "email_example")]
    /// email of the user
    pub email: String,

    /// subscription tier
    pub subscription_status: SubscriptionStatus,
}

#[derive(Debug, sqlx::FromRow)]
pub struct AuthRow {
    pub user_id: String,
    pub email: String,
    pub subscription_status: String,
    pub is_authenticated: bool,
    pub free_trial_usage_count: i64,
    pub updated_at: NaiveDateTime,
}

impl From<AuthRow> for AuthState {
    fn from(row: AuthRow) -> Self {
        AuthState {
            id: row.user_id,
            email: row.email,
            subscription_status: SubscriptionStatus::from_stored(&row.subscription_status),
            is_authenticated: row.is_authenticated,
            free_trial_usage_count: row.free_trial_usage_count,
            updated_at: row.updated_at,
        }
    }
}
