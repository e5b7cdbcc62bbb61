//! Telegram Bot API client
//!
//! Thin HTTP client over `sendMessage`. The trait seam exists so the
//! notifier can be tested without network access.

use async_trait::async_trait;
use serde::Deserialize;
use shared::{Error, Result, TelegramConfig};

/// Client abstraction for sending Telegram messages
#[async_trait]
pub trait TelegramApi: Send + Sync {
    /// Send a MarkdownV2 message, optionally with an inline keyboard
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<serde_json::Value>,
    ) -> Result<()>;
}

/// Production client backed by the Telegram Bot HTTP API
pub struct BotApi {
    http: reqwest::Client,
    base: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl BotApi {
    pub fn new(config: &TelegramConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: config.api_base.trim_end_matches('/').to_string(),
            token: config.bot_token.clone(),
        }
    }
}

#[async_trait]
impl TelegramApi for BotApi {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<serde_json::Value>,
    ) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.base, self.token);

        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "MarkdownV2",
        });
        if let Some(markup) = reply_markup {
            body["reply_markup"] = markup;
        }

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::notification(format!("Telegram request failed: {}", e)))?;

        let status = response.status();
        let parsed: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::notification(format!("Telegram response unreadable: {}", e)))?;

        if !status.is_success() || !parsed.ok {
            let description = parsed.description.unwrap_or_else(|| status.to_string());
            return Err(Error::notification(format!(
                "Telegram sendMessage rejected: {}",
                description
            )));
        }

        Ok(())
    }
}

/// Escape text for MarkdownV2 per the Bot API rules
pub fn escape_markdown(text: &str) -> String {
    const SPECIAL: &[char] = &[
        '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
    ];
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if SPECIAL.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Inline keyboard opening the bot's main menu
pub fn main_menu_keyboard() -> serde_json::Value {
    serde_json::json!({
        "inline_keyboard": [[
            { "text": "Main menu", "callback_data": "main_menu" }
        ]]
    })
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    pub struct SentMessage {
        pub chat_id: i64,
        pub text: String,
        pub has_keyboard: bool,
    }

    /// In-memory client recording every sent message
    #[derive(Clone)]
    pub struct MockTelegramApi {
        sent: Arc<Mutex<Vec<SentMessage>>>,
        failing: bool,
    }

    impl MockTelegramApi {
        pub fn new() -> Self {
            Self {
                sent: Arc::new(Mutex::new(Vec::new())),
                failing: false,
            }
        }

        pub fn failing() -> Self {
            Self {
                sent: Arc::new(Mutex::new(Vec::new())),
                failing: true,
            }
        }

        pub fn sent_messages(&self) -> Vec<SentMessage> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TelegramApi for MockTelegramApi {
        async fn send_message(
            &self,
            chat_id: i64,
            text: &str,
            reply_markup: Option<serde_json::Value>,
        ) -> Result<()> {
            if self.failing {
                return Err(Error::notification("mock send failure"));
            }
            self.sent.lock().unwrap().push(SentMessage {
                chat_id,
                text: text.to_string(),
                has_keyboard: reply_markup.is_some(),
            });
            Ok(())
        }
    }
}
