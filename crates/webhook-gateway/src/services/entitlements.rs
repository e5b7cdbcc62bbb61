//! Reconciliation of provider payment events against user entitlements
//!
//! One entry point, [`EntitlementService::process`], covers the full
//! event matrix: {package, subscription} x {succeeded, canceled} plus
//! refunds. Every branch appends a ledger row first and mutates the user
//! second, never the other way round: the ledger is the audit source of
//! truth, and a ledger row without a user update can be reconciled
//! manually while the reverse cannot.

use chrono::Utc;
use shared::{DbPool, Error, Result};

use crate::models::billing::{NewLedgerEntry, SubscriptionLevel, TransactionKind, User};
use crate::models::webhook::{
    PackageMetadata, PaymentEvent, PaymentMetadata, PaymentObject, SubscriptionMetadata,
};
use crate::repositories::campaigns::{CampaignRepository, PurchaseKind};
use crate::repositories::ledger::LedgerRepository;
use crate::repositories::users::{PackageCredit, SubscriptionUpdate, UserRepository};
use crate::services::duration;

/// What a processed event did, for response and notification purposes
#[derive(Debug)]
pub enum ProcessOutcome {
    /// Package balances credited
    Credited {
        user: User,
        tokens_credited: Option<i64>,
    },
    /// Subscription activated or renewed. `fallback_duration` carries the
    /// raw descriptor when the one-month fallback had to be applied.
    SubscriptionActivated {
        user: User,
        level: SubscriptionLevel,
        fallback_duration: Option<String>,
    },
    /// Failed payment recorded in the ledger, no entitlement change
    CancellationRecorded { telegram_id: i64 },
    /// Refund recorded in the ledger, no entitlement change
    RefundRecorded,
    /// Re-delivered event, nothing done
    Duplicate,
}

pub struct EntitlementService;

impl EntitlementService {
    pub async fn process(
        pool: &DbPool,
        event: PaymentEvent,
        object: &PaymentObject,
        metadata: PaymentMetadata,
    ) -> Result<ProcessOutcome> {
        // Reject unparseable amounts before anything is persisted
        let amount = object.amount.parse_value()?;

        match (event, metadata) {
            (PaymentEvent::PaymentSucceeded, PaymentMetadata::Package(meta)) => {
                Self::package_succeeded(pool, object, amount, meta).await
            }
            (PaymentEvent::PaymentSucceeded, PaymentMetadata::Subscription(meta)) => {
                Self::subscription_succeeded(pool, object, amount, meta).await
            }
            (PaymentEvent::PaymentCanceled, meta) => {
                Self::payment_canceled(pool, object, amount, meta).await
            }
            (PaymentEvent::RefundSucceeded, meta) => {
                Self::refund_succeeded(pool, object, amount, meta).await
            }
        }
    }

    async fn package_succeeded(
        pool: &DbPool,
        object: &PaymentObject,
        amount: f64,
        meta: PackageMetadata,
    ) -> Result<ProcessOutcome> {
        let entry = NewLedgerEntry {
            telegram_id: meta.telegram_id,
            kind: TransactionKind::Package,
            total_amount: amount,
            package_name: Some(&meta.package_name),
            subscription_level: None,
            provider_payment_id: &object.id,
            provider_payment_method_id: object.payment_method.as_ref().map(|m| m.id.as_str()),
            status: &object.status,
            cancellation_party: None,
            cancellation_reason: None,
        };
        let Some(_) = LedgerRepository::create_idempotent(pool, &entry).await? else {
            tracing::info!(
                payment_id = %object.id,
                telegram_id = meta.telegram_id,
                "Duplicate package payment delivery, skipping"
            );
            return Ok(ProcessOutcome::Duplicate);
        };

        let credit = PackageCredit {
            basic_requests: meta.basic_requests_balance,
            pro_requests: meta.pro_requests_balance,
            image_generation: meta.image_generation_balance,
            tokens: meta.tokens_number,
        };
        let user = UserRepository::credit_package(pool, meta.telegram_id, &credit)
            .await?
            .ok_or_else(|| Error::not_found("User", meta.telegram_id.to_string()))?;

        // The campaign counter tracks token sales; discrete-balance
        // packages have no matching counter.
        if meta.tokens_number.is_some() {
            if let Some(ad_code) = user.ad_campaign_code.as_deref() {
                if let Err(e) =
                    CampaignRepository::record_purchase(pool, ad_code, PurchaseKind::Tokens).await
                {
                    tracing::warn!(ad_code = %ad_code, error = %e, "Campaign counter update failed");
                }
            }
        }

        tracing::info!(
            payment_id = %object.id,
            telegram_id = meta.telegram_id,
            package = %meta.package_name,
            amount = amount,
            "Package payment credited"
        );

        Ok(ProcessOutcome::Credited {
            user,
            tokens_credited: meta.tokens_number,
        })
    }

    async fn subscription_succeeded(
        pool: &DbPool,
        object: &PaymentObject,
        amount: f64,
        meta: SubscriptionMetadata,
    ) -> Result<ProcessOutcome> {
        let (parsed, fallback) = duration::parse(&meta.subscription_duration);
        let expiry = duration::expiry_from(Utc::now(), &parsed);

        let level = meta.subscription_level;
        let staged_level = level.staged_upgrade();

        let entry = NewLedgerEntry {
            telegram_id: meta.telegram_id,
            kind: TransactionKind::Subscription,
            total_amount: amount,
            package_name: None,
            subscription_level: Some(level.as_str()),
            provider_payment_id: &object.id,
            provider_payment_method_id: object.payment_method.as_ref().map(|m| m.id.as_str()),
            status: &object.status,
            cancellation_party: None,
            cancellation_reason: None,
        };
        let Some(_) = LedgerRepository::create_idempotent(pool, &entry).await? else {
            tracing::info!(
                payment_id = %object.id,
                telegram_id = meta.telegram_id,
                "Duplicate subscription payment delivery, skipping"
            );
            return Ok(ProcessOutcome::Duplicate);
        };

        let update = SubscriptionUpdate {
            subscription_level: level.as_str(),
            new_subscription_level: staged_level.map(|l| l.as_str()),
            subscription_expiry: expiry,
            payment_method_id: object.payment_method.as_ref().map(|m| m.id.as_str()),
            basic_requests_left_today: meta.basic_requests_per_day,
            pro_requests_left_today: meta.pro_requests_per_day,
            image_generation_left_today: meta.image_generation_per_day,
        };
        let user = UserRepository::apply_subscription(pool, meta.telegram_id, &update)
            .await?
            .ok_or_else(|| Error::not_found("User", meta.telegram_id.to_string()))?;

        if let Some(ad_code) = user.ad_campaign_code.as_deref() {
            let kind = if level.is_trial() {
                PurchaseKind::Trial
            } else {
                PurchaseKind::Subscription
            };
            if let Err(e) = CampaignRepository::record_purchase(pool, ad_code, kind).await {
                tracing::warn!(ad_code = %ad_code, error = %e, "Campaign counter update failed");
            }
        }

        tracing::info!(
            payment_id = %object.id,
            telegram_id = meta.telegram_id,
            level = %level,
            expiry = %expiry,
            fallback_duration = fallback,
            "Subscription payment applied"
        );

        Ok(ProcessOutcome::SubscriptionActivated {
            user,
            level,
            fallback_duration: fallback.then(|| meta.subscription_duration.clone()),
        })
    }

    /// A canceled payment changes no entitlements. The ledger still gets a
    /// row with the cancellation details so support can reconstruct what
    /// the provider reported.
    async fn payment_canceled(
        pool: &DbPool,
        object: &PaymentObject,
        amount: f64,
        metadata: PaymentMetadata,
    ) -> Result<ProcessOutcome> {
        let telegram_id = metadata.telegram_id();
        let (kind, package_name, subscription_level) = match &metadata {
            PaymentMetadata::Package(m) => {
                (TransactionKind::Package, Some(m.package_name.as_str()), None)
            }
            PaymentMetadata::Subscription(m) => (
                TransactionKind::Subscription,
                None,
                Some(m.subscription_level.as_str()),
            ),
        };

        let details = object.cancellation_details.as_ref();

        let entry = NewLedgerEntry {
            telegram_id,
            kind,
            total_amount: amount,
            package_name,
            subscription_level,
            provider_payment_id: &object.id,
            provider_payment_method_id: object.payment_method.as_ref().map(|m| m.id.as_str()),
            status: &object.status,
            cancellation_party: details.and_then(|d| d.party.as_deref()),
            cancellation_reason: details.and_then(|d| d.reason.as_deref()),
        };
        let Some(_) = LedgerRepository::create_idempotent(pool, &entry).await? else {
            return Ok(ProcessOutcome::Duplicate);
        };

        UserRepository::touch(pool, telegram_id)
            .await?
            .ok_or_else(|| Error::not_found("User", telegram_id.to_string()))?;

        tracing::warn!(
            payment_id = %object.id,
            telegram_id = telegram_id,
            party = details.and_then(|d| d.party.as_deref()).unwrap_or(""),
            reason = details.and_then(|d| d.reason.as_deref()).unwrap_or(""),
            "Payment canceled"
        );

        Ok(ProcessOutcome::CancellationRecorded { telegram_id })
    }

    /// Refunds are recorded and deliberately not reversed: balances may
    /// already be spent, so reversal is a manual support operation.
    async fn refund_succeeded(
        pool: &DbPool,
        object: &PaymentObject,
        amount: f64,
        metadata: PaymentMetadata,
    ) -> Result<ProcessOutcome> {
        let telegram_id = metadata.telegram_id();
        let (kind, package_name, subscription_level) = match &metadata {
            PaymentMetadata::Package(m) => {
                (TransactionKind::Package, Some(m.package_name.as_str()), None)
            }
            PaymentMetadata::Subscription(m) => (
                TransactionKind::Subscription,
                None,
                Some(m.subscription_level.as_str()),
            ),
        };

        let entry = NewLedgerEntry {
            telegram_id,
            kind,
            total_amount: amount,
            package_name,
            subscription_level,
            provider_payment_id: &object.id,
            provider_payment_method_id: None,
            status: &object.status,
            cancellation_party: None,
            cancellation_reason: None,
        };
        let Some(_) = LedgerRepository::create_idempotent(pool, &entry).await? else {
            return Ok(ProcessOutcome::Duplicate);
        };

        tracing::warn!(
            payment_id = %object.id,
            telegram_id = telegram_id,
            amount = amount,
            "Refund recorded, entitlements left unchanged"
        );

        Ok(ProcessOutcome::RefundRecorded)
    }
}
