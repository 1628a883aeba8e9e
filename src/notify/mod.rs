//! Telegram notification module
//!
//! Sends USD readings and command replies to Telegram, and long-polls the
//! Bot API for incoming commands.

pub mod format;


pub use format::{NarrativeFormatter, Scenario};

use crate::config::TelegramConfig;
use crate::error::{BotError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const TELEGRAM_API_URL: &str = "https://api.telegram.org";
/// Bot API limit for one message
pub const MAX_MESSAGE_LEN: usize = 4096;

#[derive(Debug, Serialize)]
struct TelegramMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub message_id: i64,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
}

/// Raw Bot API client
#[derive(Clone)]
pub struct TelegramClient {
    http: Client,
    base_url: String,
}

impl TelegramClient {
    pub fn new(bot_token: &str) -> Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            http,
            base_url: format!("{}/bot{}", TELEGRAM_API_URL, bot_token),
        })
    }

    /// Send one HTML message, split when longer than the API allows
    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<()> {
        for chunk in split_message(text, MAX_MESSAGE_LEN) {
            let msg = TelegramMessage {
                chat_id,
                text: &chunk,
                parse_mode: "HTML",
                disable_web_page_preview: true,
            };
            let url = format!("{}/sendMessage", self.base_url);
            let response = self.http.post(&url).json(&msg).send().await?;
            let body: ApiResponse<serde_json::Value> = response.json().await?;
            check(body)?;
        }
        Ok(())
    }

    /// Long-poll for updates after `offset`
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>> {
        let url = format!("{}/getUpdates", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", timeout_secs.to_string()),
                ("allowed_updates", "[\"message\"]".to_string()),
            ])
            .timeout(Duration::from_secs(timeout_secs + 10))
            .send()
            .await?;
        let body: ApiResponse<Vec<Update>> = response.json().await?;
        Ok(check(body)?.unwrap_or_default())
    }

    /// Remove any webhook so long polling is not rejected with 409
    pub async fn delete_webhook(&self, drop_pending_updates: bool) -> Result<()> {
        let url = format!("{}/deleteWebhook", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "drop_pending_updates": drop_pending_updates }))
            .send()
            .await?;
        let body: ApiResponse<bool> = response.json().await?;
        check(body)?;
        Ok(())
    }
}

fn check<T>(response: ApiResponse<T>) -> Result<Option<T>> {
    if response.ok {
        return Ok(response.result);
    }
    if response.error_code == Some(429) {
        let retry_after_secs = response
            .parameters
            .and_then(|p| p.retry_after)
            .unwrap_or(1);
        return Err(BotError::RateLimited { retry_after_secs });
    }
    Err(BotError::Telegram(format!(
        "{}: {}",
        response.error_code.unwrap_or_default(),
        response.description.unwrap_or_else(|| "unknown error".to_string())
    )))
}

/// Split on line boundaries into chunks of at most `max_chars` characters
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let mut line_len = line.chars().count();
        if current_len + line_len > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len > max_chars {
            let mut rest: Vec<char> = line.chars().collect();
            while rest.len() > max_chars {
                chunks.push(rest.drain(..max_chars).collect());
            }
            line_len = rest.len();
            current = rest.into_iter().collect();
            current_len = line_len;
            continue;
        }
        current.push_str(line);
        current_len += line_len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Telegram notifier bound to the default chat
#[derive(Clone)]
pub struct Notifier {
    client: Option<TelegramClient>,
    chat_id: Option<String>,
}

impl Notifier {
    pub fn new(bot_token: &str, chat_id: Option<String>) -> Result<Self> {
        Ok(Self {
            client: Some(TelegramClient::new(bot_token)?),
            chat_id: chat_id.filter(|c| !c.trim().is_empty()),
        })
    }

    pub fn from_config(config: &TelegramConfig) -> Result<Self> {
        if config.is_active() {
            Self::new(&config.bot_token, config.chat_id.clone())
        } else {
            tracing::info!("Telegram not configured, notifications disabled");
            Ok(Self::disabled())
        }
    }

    /// Create a disabled notifier (for when Telegram is not configured)
    pub fn disabled() -> Self {
        Self {
            client: None,
            chat_id: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    pub fn client(&self) -> Option<&TelegramClient> {
        self.client.as_ref()
    }

    pub fn default_chat(&self) -> Option<&str> {
        self.chat_id.as_deref()
    }

    /// Send to the default chat (HTML); no-op without one
    pub async fn send(&self, text: &str) -> Result<()> {
        match self.chat_id.as_deref() {
            Some(chat_id) => self.send_to(chat_id, text).await,
            None => {
                tracing::debug!("No default chat configured, message dropped");
                Ok(())
            }
        }
    }

    pub async fn send_to(&self, chat_id: &str, text: &str) -> Result<()> {
        let Some(client) = &self.client else {
            return Ok(());
        };

        if let Err(e) = client.send_message(chat_id, text).await {
            tracing::error!("Telegram send to {} failed: {}", chat_id, e);
            return Err(e);
        }
        Ok(())
    }
}
