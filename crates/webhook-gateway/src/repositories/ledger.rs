//! Append-only payment ledger
//!
//! Ledger rows are never updated or deleted. Idempotency under webhook
//! re-delivery comes from the unique key on (provider_payment_id, status):
//! a duplicate delivery inserts nothing and the caller skips the mutation.

use anyhow::{Context, Result};
use sqlx::{Executor, Postgres};

use crate::models::billing::{LedgerEntry, NewLedgerEntry};

pub struct LedgerRepository;

impl LedgerRepository {
    /// Append a ledger row if no row with the same (payment id, status)
    /// exists. Returns `None` on a duplicate delivery.
    pub async fn create_idempotent<'e, E>(
        executor: E,
        entry: &NewLedgerEntry<'_>,
    ) -> Result<Option<LedgerEntry>>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, LedgerEntry>(
            r#"
            INSERT INTO payment_transactions (
                telegram_id, kind, total_amount, package_name,
                subscription_level, provider_payment_id,
                provider_payment_method_id, status,
                cancellation_party, cancellation_reason, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW())
            ON CONFLICT (provider_payment_id, status) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(entry.telegram_id)
        .bind(entry.kind.as_str())
        .bind(entry.total_amount)
        .bind(entry.package_name)
        .bind(entry.subscription_level)
        .bind(entry.provider_payment_id)
        .bind(entry.provider_payment_method_id)
        .bind(entry.status)
        .bind(entry.cancellation_party)
        .bind(entry.cancellation_reason)
        .fetch_optional(executor)
        .await
        .context("Failed to append ledger entry")?;

        Ok(row)
    }
}
