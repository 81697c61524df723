use super::model::{AuthRow, AuthState, SetAuth, SubscriptionStatus};
use anyhow::Context;
use chrono::Utc;
use sqlx::SqlitePool;

const STATE_COLUMNS: &str =
    "user_id, email, subscription_status, is_authenticated, free_trial_usage_count, updated_at";

fn select_state() -> String {
    format!("SELECT {STATE_COLUMNS} FROM auth_state WHERE id = 1")
}

/// Each write returns the row it produced, never a later re-read.
fn update_state(assignments: &str) -> String {
    format!("UPDATE auth_state SET {assignments} WHERE id = 1 RETURNING {STATE_COLUMNS}")
}

pub async fn get_auth(pool: &SqlitePool) -> Result<AuthState, anyhow::Error> {
    let row = sqlx::query_as::<_, AuthRow>(&select_state())
        .fetch_one(pool)
        .await
        .context("Failed to read auth state")?;
    Ok(row.into())
}

/// Marks the user as logged in; the free trial counter is left untouched.
pub async fn set_auth(pool: &SqlitePool, auth: &SetAuth) -> Result<AuthState, anyhow::Error> {
    let row = sqlx::query_as::<_, AuthRow>(&update_state(
        "user_id = ?, email = ?, subscription_status = ?, is_authenticated = 1, updated_at = ?",
    ))
    .bind(&auth.id)
    .bind(&auth.email)
    .bind(auth.subscription_status.as_str())
    .bind(Utc::now().naive_utc())
    .fetch_one(pool)
    .await
    .context("Failed to store auth state")?;

    Ok(row.into())
}

/// Logs the user out; the free trial counter survives.
pub async fn clear_auth(pool: &SqlitePool) -> Result<AuthState, anyhow::Error> {
    let row = sqlx::query_as::<_, AuthRow>(&update_state(
        "user_id = '', email = '', subscription_status = ?, is_authenticated = 0, updated_at = ?",
    ))
    .bind(SubscriptionStatus::Test.as_str())
    .bind(Utc::now().naive_utc())
    .fetch_one(pool)
    .await
    .context("Failed to clear auth state")?;

    Ok(row.into())
}

pub async fn increment_free_trial_usage(pool: &SqlitePool) -> Result<AuthState, anyhow::Error> {
    let row = sqlx::query_as::<_, AuthRow>(&update_state(
        "free_trial_usage_count = free_trial_usage_count + 1, updated_at = ?",
    ))
    .bind(Utc::now().naive_utc())
    .fetch_one(pool)
    .await
    .context("Failed to increment free trial usage")?;

    Ok(row.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{file_pool, test_pool};

    fn alice(status: SubscriptionStatus) -> SetAuth {
        SetAuth {
            id: "9fd0b89d".to_string(),
            email: "alice@example.com".to_string(),
            subscription_status: status,
        }
    }

    #[tokio::test]
    async fn starts_logged_out() {
        let pool = test_pool().await;
        let state = get_auth(&pool).await.unwrap();

        assert_eq!(state.id, "");
        assert_eq!(state.email, "");
        assert_eq!(state.subscription_status, SubscriptionStatus::Test);
        assert!(!state.is_authenticated);
        assert_eq!(state.free_trial_usage_count, 0);
    }

    #[tokio::test]
    async fn set_auth_reflects_last_write() {
        let pool = test_pool().await;
        set_auth(&pool, &alice(SubscriptionStatus::Test)).await.unwrap();
        let state = set_auth(&pool, &alice(SubscriptionStatus::Pro)).await.unwrap();

        assert_eq!(state.id, "9fd0b89d");
        assert_eq!(state.email, "alice@example.com");
        assert_eq!(state.subscription_status, SubscriptionStatus::Pro);
        assert!(state.is_authenticated);
        assert_eq!(get_auth(&pool).await.unwrap(), state);
    }

    #[tokio::test]
    async fn clear_auth_keeps_free_trial_count() {
        let pool = test_pool().await;
        set_auth(&pool, &alice(SubscriptionStatus::Pro)).await.unwrap();
        increment_free_trial_usage(&pool).await.unwrap();
        increment_free_trial_usage(&pool).await.unwrap();

        let state = clear_auth(&pool).await.unwrap();

        assert_eq!(state.id, "");
        assert_eq!(state.email, "");
        assert_eq!(state.subscription_status, SubscriptionStatus::Test);
        assert!(!state.is_authenticated);
        assert_eq!(state.free_trial_usage_count, 2);
    }

    #[tokio::test]
    async fn concurrent_increments_each_see_their_own_count() {
        let dir = tempfile::tempdir().unwrap();
        let pool = file_pool(dir.path()).await;

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                tokio::spawn(async move { increment_free_trial_usage(&pool).await.unwrap() })
            })
            .collect();
        let mut counts = Vec::new();
        for task in tasks {
            counts.push(task.await.unwrap().free_trial_usage_count);
        }
        counts.sort();

        assert_eq!(counts, (1..=8).collect::<Vec<i64>>());
        assert_eq!(get_auth(&pool).await.unwrap().free_trial_usage_count, 8);
    }
}
