//! Outbound Telegram notifications for payment outcomes
//!
//! Notification delivery is best-effort: a failed send is logged and
//! never propagates into the webhook response, because the provider
//! would otherwise retry an already-applied payment.

use std::sync::Arc;

use crate::models::billing::{SubscriptionLevel, User};
use crate::models::webhook::CancellationDetails;
use crate::services::telegram::{escape_markdown, main_menu_keyboard, TelegramApi};

pub struct Notifier {
    client: Arc<dyn TelegramApi>,
    admin_chat_id: i64,
}

impl Notifier {
    pub fn new(client: Arc<dyn TelegramApi>, admin_chat_id: i64) -> Self {
        Self {
            client,
            admin_chat_id,
        }
    }

    async fn send_to_user(&self, telegram_id: i64, text: String, keyboard: bool) {
        let markup = keyboard.then(main_menu_keyboard);
        if let Err(e) = self.client.send_message(telegram_id, &text, markup).await {
            tracing::error!(telegram_id = telegram_id, error = %e, "Failed to notify user");
        }
    }

    async fn send_to_admin(&self, text: String) {
        if let Err(e) = self.client.send_message(self.admin_chat_id, &text, None).await {
            tracing::error!(error = %e, "Failed to alert admin");
        }
    }

    /// Confirm a package purchase, listing the credited balances
    pub async fn package_credited(&self, user: &User, tokens_credited: Option<i64>) {
        let text = match tokens_credited {
            Some(tokens) => format!(
                "✅ Payment received\\!\n\n\
                 {} tokens added\\.\n\
                 Current balance: *{}* tokens\\.",
                tokens, user.tokens_balance
            ),
            None => format!(
                "✅ Payment received\\!\n\nYour balances:\n\
                 ⚡ Basic requests: *{}*\n\
                 🚀 Pro requests: *{}*\n\
                 🖼 Image generations: *{}*",
                user.basic_requests_balance,
                user.pro_requests_balance,
                user.image_generation_balance
            ),
        };
        self.send_to_user(user.telegram_id, text, true).await;
    }

    /// Confirm a subscription activation or renewal
    pub async fn subscription_activated(&self, user: &User, level: SubscriptionLevel) {
        let text = if level.is_trial() {
            "✅ Trial activated\\!\n\nEnjoy your trial period\\. \
             It converts to *BASIC* automatically when it ends\\."
                .to_string()
        } else {
            format!(
                "✅ Subscription *{}* is now active\\!\n\nThank you for your purchase\\.",
                escape_markdown(level.as_str())
            )
        };
        self.send_to_user(user.telegram_id, text, true).await;
    }

    /// Tell the user a payment failed and alert the admin with the details
    pub async fn payment_canceled(
        &self,
        telegram_id: i64,
        payment_id: &str,
        details: Option<&CancellationDetails>,
    ) {
        let user_text = "❌ Your payment was not completed\\.\n\n\
             No money was taken beyond the provider hold\\. \
             Please try again or contact support\\."
            .to_string();
        self.send_to_user(telegram_id, user_text, true).await;

        let (party, reason) = details
            .map(|d| {
                (
                    d.party.clone().unwrap_or_default(),
                    d.reason.clone().unwrap_or_default(),
                )
            })
            .unwrap_or_default();
        let admin_text = format!(
            "⚠️ Payment canceled\n\n\
             Payment: {}\n\
             User: {}\n\
             Party: {}\n\
             Reason: {}",
            escape_markdown(payment_id),
            telegram_id,
            escape_markdown(&party),
            escape_markdown(&reason),
        );
        self.send_to_admin(admin_text).await;
    }

    /// Alert the admin that a subscription duration could not be parsed
    /// and the one-month fallback was applied
    pub async fn duration_fallback(&self, telegram_id: i64, payment_id: &str, raw: &str) {
        let text = format!(
            "⚠️ Unparseable subscription duration, defaulted to 1 month\n\n\
             Payment: {}\n\
             User: {}\n\
             Raw value: {}",
            escape_markdown(payment_id),
            telegram_id,
            escape_markdown(raw),
        );
        self.send_to_admin(text).await;
    }

    /// Alert the admin that webhook processing failed internally
    pub async fn dispatch_failed(&self, payment_id: &str, error: &str) {
        let text = format!(
            "🔥 Webhook processing failed\n\n\
             Payment: {}\n\
             Error: {}",
            escape_markdown(payment_id),
            escape_markdown(error),
        );
        self.send_to_admin(text).await;
    }
}
