//! User repository for entitlement mutations
//!
//! Every mutation takes a generic executor so the entitlement service can
//! run it inside the same transaction as the ledger append.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use shared::DbPool;
use sqlx::{Executor, Postgres};

use crate::models::billing::User;

/// Balance deltas applied by a package purchase. Absent fields leave the
/// corresponding balance untouched.
#[derive(Debug, Clone, Default)]
pub struct PackageCredit {
    pub basic_requests: Option<i64>,
    pub pro_requests: Option<i64>,
    pub image_generation: Option<i64>,
    pub tokens: Option<i64>,
}

/// Full subscription state written on a successful subscription payment
#[derive(Debug, Clone)]
pub struct SubscriptionUpdate<'a> {
    pub subscription_level: &'a str,
    /// Staged follow-up tier; only trial activations set this, other
    /// purchases leave the stored value untouched
    pub new_subscription_level: Option<&'a str>,
    pub subscription_expiry: DateTime<Utc>,
    pub payment_method_id: Option<&'a str>,
    pub basic_requests_left_today: i64,
    pub pro_requests_left_today: Option<i64>,
    pub image_generation_left_today: Option<i64>,
}

pub struct UserRepository;

impl UserRepository {
    pub async fn find_by_telegram_id(pool: &DbPool, telegram_id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE telegram_id = $1
            "#,
        )
        .bind(telegram_id)
        .fetch_optional(pool)
        .await
        .context("Failed to look up user")?;

        Ok(user)
    }

    /// Increment package balances for a user. Returns the updated row, or
    /// `None` when no user with that telegram id exists.
    pub async fn credit_package<'e, E>(
        executor: E,
        telegram_id: i64,
        credit: &PackageCredit,
    ) -> Result<Option<User>>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET basic_requests_balance = basic_requests_balance + $1,
                pro_requests_balance = pro_requests_balance + $2,
                image_generation_balance = image_generation_balance + $3,
                tokens_balance = tokens_balance + $4,
                updated_at = NOW()
            WHERE telegram_id = $5
            RETURNING *
            "#,
        )
        .bind(credit.basic_requests.unwrap_or(0))
        .bind(credit.pro_requests.unwrap_or(0))
        .bind(credit.image_generation.unwrap_or(0))
        .bind(credit.tokens.unwrap_or(0))
        .bind(telegram_id)
        .fetch_optional(executor)
        .await
        .context("Failed to credit package balances")?;

        Ok(user)
    }

    /// Activate or extend a subscription.
    ///
    /// Clears the weekly request window and burns the trial eligibility:
    /// once any subscription payment lands, TRIAL can never be activated
    /// again. Per-day balances with no configured value are left unchanged.
    pub async fn apply_subscription<'e, E>(
        executor: E,
        telegram_id: i64,
        update: &SubscriptionUpdate<'_>,
    ) -> Result<Option<User>>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET subscription_level = $1,
                new_subscription_level = COALESCE($2, new_subscription_level),
                subscription_expiry = $3,
                payment_method_id = COALESCE($4, payment_method_id),
                basic_requests_left_today = $5,
                pro_requests_left_today = COALESCE($6, pro_requests_left_today),
                image_generation_left_today = COALESCE($7, image_generation_left_today),
                weekly_requests_expiry = NULL,
                can_activate_trial = FALSE,
                updated_at = NOW()
            WHERE telegram_id = $8
            RETURNING *
            "#,
        )
        .bind(update.subscription_level)
        .bind(update.new_subscription_level)
        .bind(update.subscription_expiry)
        .bind(update.payment_method_id)
        .bind(update.basic_requests_left_today)
        .bind(update.pro_requests_left_today)
        .bind(update.image_generation_left_today)
        .bind(telegram_id)
        .fetch_optional(executor)
        .await
        .context("Failed to apply subscription")?;

        Ok(user)
    }

    /// Bump `updated_at` without changing entitlements. Used when a
    /// cancellation is recorded against an existing user.
    pub async fn touch<'e, E>(executor: E, telegram_id: i64) -> Result<Option<User>>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET updated_at = NOW()
            WHERE telegram_id = $1
            RETURNING *
            "#,
        )
        .bind(telegram_id)
        .fetch_optional(executor)
        .await
        .context("Failed to touch user")?;

        Ok(user)
    }
}
