//! Domain types for user entitlements and the payment ledger

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::Error;
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Subscription tiers, ordered by entitlement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum SubscriptionLevel {
    Free,
    Trial,
    Basic,
    Pro,
    Ultimate,
}

impl SubscriptionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "FREE",
            Self::Trial => "TRIAL",
            Self::Basic => "BASIC",
            Self::Pro => "PRO",
            Self::Ultimate => "ULTIMATE",
        }
    }

    /// The follow-up tier staged when a trial is activated. Activating
    /// TRIAL stages BASIC; any other purchase stages nothing.
    pub fn staged_upgrade(&self) -> Option<Self> {
        match self {
            Self::Trial => Some(Self::Basic),
            _ => None,
        }
    }

    pub fn is_trial(&self) -> bool {
        matches!(self, Self::Trial)
    }
}

impl FromStr for SubscriptionLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FREE" => Ok(Self::Free),
            "TRIAL" => Ok(Self::Trial),
            "BASIC" => Ok(Self::Basic),
            "PRO" => Ok(Self::Pro),
            "ULTIMATE" => Ok(Self::Ultimate),
            other => Err(Error::validation(format!(
                "Unknown subscription level: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for SubscriptionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bot user row. Created by the bot onboarding flow; the gateway only
/// mutates entitlement fields.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub telegram_id: i64,
    pub first_name: Option<String>,
    pub user_name: Option<String>,
    pub email: Option<String>,
    pub basic_requests_balance: i64,
    pub pro_requests_balance: i64,
    pub image_generation_balance: i64,
    pub tokens_balance: i64,
    pub basic_requests_left_today: i64,
    pub pro_requests_left_today: i64,
    pub image_generation_left_today: i64,
    pub subscription_level: String,
    pub new_subscription_level: Option<String>,
    pub subscription_expiry: Option<DateTime<Utc>>,
    pub weekly_requests_expiry: Option<DateTime<Utc>>,
    pub can_activate_trial: bool,
    pub payment_method_id: Option<String>,
    pub ad_campaign_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Kind discriminator for ledger rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    Package,
    Subscription,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Package => "package",
            Self::Subscription => "subscription",
        }
    }
}

/// One immutable row of the payment ledger
#[derive(Debug, Clone, FromRow)]
pub struct LedgerEntry {
    pub id: i64,
    pub telegram_id: i64,
    pub kind: String,
    pub total_amount: f64,
    pub package_name: Option<String>,
    pub subscription_level: Option<String>,
    pub provider_payment_id: String,
    pub provider_payment_method_id: Option<String>,
    pub status: String,
    pub cancellation_party: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Parameters for appending a ledger row
#[derive(Debug, Clone)]
pub struct NewLedgerEntry<'a> {
    pub telegram_id: i64,
    pub kind: TransactionKind,
    pub total_amount: f64,
    pub package_name: Option<&'a str>,
    pub subscription_level: Option<&'a str>,
    pub provider_payment_id: &'a str,
    pub provider_payment_method_id: Option<&'a str>,
    pub status: &'a str,
    pub cancellation_party: Option<&'a str>,
    pub cancellation_reason: Option<&'a str>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_level_roundtrip() {
        for level in [
            SubscriptionLevel::Free,
            SubscriptionLevel::Trial,
            SubscriptionLevel::Basic,
            SubscriptionLevel::Pro,
            SubscriptionLevel::Ultimate,
        ] {
            assert_eq!(level.as_str().parse::<SubscriptionLevel>().unwrap(), level);
        }
        assert!("GOLD".parse::<SubscriptionLevel>().is_err());
    }

    #[test]
    fn test_only_trial_stages_a_follow_up_tier() {
        assert_eq!(
            SubscriptionLevel::Trial.staged_upgrade(),
            Some(SubscriptionLevel::Basic)
        );
        assert_eq!(SubscriptionLevel::Pro.staged_upgrade(), None);
        assert_eq!(SubscriptionLevel::Basic.staged_upgrade(), None);
        assert_eq!(SubscriptionLevel::Ultimate.staged_upgrade(), None);
    }

    #[test]
    fn test_level_serde_uppercase() {
        let level: SubscriptionLevel = serde_json::from_str("\"ULTIMATE\"").unwrap();
        assert_eq!(level, SubscriptionLevel::Ultimate);
        assert_eq!(serde_json::to_string(&level).unwrap(), "\"ULTIMATE\"");
    }
}
