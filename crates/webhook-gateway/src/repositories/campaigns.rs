//! Ad-campaign attribution counters
//!
//! Counter bumps are opportunistic: a missing campaign row or a failed
//! update must never fail the payment, so callers log and continue.

use anyhow::{Context, Result};
use sqlx::{Executor, Postgres};

/// Which campaign counter a purchase increments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseKind {
    Tokens,
    Trial,
    Subscription,
}

pub struct CampaignRepository;

impl CampaignRepository {
    /// Increment the matching counter for the campaign the user came from.
    /// Returns `false` when no campaign row matched the code.
    pub async fn record_purchase<'e, E>(
        executor: E,
        ad_code: &str,
        kind: PurchaseKind,
    ) -> Result<bool>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let column = match kind {
            PurchaseKind::Tokens => "tokens_bought",
            PurchaseKind::Trial => "trials_bought",
            PurchaseKind::Subscription => "subs_bought",
        };

        // Column name comes from the enum above, never from input.
        let query = format!(
            "UPDATE ad_campaigns SET {column} = {column} + 1 WHERE ad_code = $1",
        );

        let result = sqlx::query(&query)
            .bind(ad_code)
            .execute(executor)
            .await
            .context("Failed to record campaign purchase")?;

        Ok(result.rows_affected() > 0)
    }
}
