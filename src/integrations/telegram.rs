// src/integrations/telegram.rs — Telegram review channel (Bot API)
//
// Uses the Telegram Bot API (https://core.telegram.org/bots/api). Sends the
// review summary to one chat and long-polls `getUpdates` for the reply.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::core::review::{ReviewDecision, ReviewToken};
use crate::infra::errors::DebateError;
use crate::integrations::types::{decision_from_reply, FeedbackChannel};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
pub const MAX_MESSAGE_LENGTH: usize = 4096;
/// Room kept free in each chunk for the `[i/n]` header.
const HEADER_RESERVE: usize = 16;
const LONG_POLL_SECS: u64 = 30;
const CHUNK_PAUSE: Duration = Duration::from_millis(500);

/// Telegram review channel.
pub struct TelegramChannel {
    client: Client,
    bot_token: String,
    chat_id: String,
    /// Highest update id seen before the last notification; replies older
    /// than the review request are ignored.
    last_update_id: AtomicI64,
}

impl TelegramChannel {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            client: Client::new(),
            bot_token,
            chat_id,
            last_update_id: AtomicI64::new(0),
        }
    }

    /// Build from `TELEGRAM_BOT_TOKEN` and `TELEGRAM_CHAT_ID`.
    pub fn from_env() -> Option<Self> {
        let token = std::env::var("TELEGRAM_BOT_TOKEN").ok().filter(|t| !t.is_empty())?;
        let chat_id = std::env::var("TELEGRAM_CHAT_ID").ok().filter(|c| !c.is_empty())?;
        Some(Self::new(token, chat_id))
    }

    fn api_url(&self, method: &str) -> String {
        format!("{TELEGRAM_API_BASE}/bot{}/{method}", self.bot_token)
    }

    async fn call<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        body: serde_json::Value,
        timeout: Duration,
    ) -> Result<T, DebateError> {
        let resp = self
            .client
            .post(self.api_url(method))
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&e.to_string(), true))?;

        let parsed: TelegramResponse<T> = resp
            .json()
            .await
            .map_err(|e| transport_error(&format!("invalid {method} response: {e}"), false))?;

        if !parsed.ok {
            return Err(transport_error(
                &format!(
                    "{method} failed: {}",
                    parsed.description.unwrap_or_else(|| "unknown".into())
                ),
                false,
            ));
        }
        parsed
            .result
            .ok_or_else(|| transport_error(&format!("{method} returned no result"), false))
    }

    async fn send_message(&self, text: &str) -> Result<(), DebateError> {
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
        });
        let _: SendMessageResp = self
            .call("sendMessage", body, Duration::from_secs(30))
            .await?;
        Ok(())
    }

    async fn latest_update_id(&self) -> Result<i64, DebateError> {
        let body = serde_json::json!({ "limit": 1, "offset": -1, "timeout": 0 });
        let updates: Vec<TgUpdate> = self
            .call("getUpdates", body, Duration::from_secs(30))
            .await?;
        Ok(updates.last().map(|u| u.update_id).unwrap_or(0))
    }

    /// Next text message from the configured chat, waiting indefinitely.
    async fn poll_for_reply(&self) -> Result<String, DebateError> {
        loop {
            let offset = self.last_update_id.load(Ordering::SeqCst) + 1;
            let body = serde_json::json!({ "offset": offset, "timeout": LONG_POLL_SECS });
            let updates: Vec<TgUpdate> = self
                .call(
                    "getUpdates",
                    body,
                    Duration::from_secs(LONG_POLL_SECS + 10),
                )
                .await?;

            for update in updates {
                self.last_update_id
                    .fetch_max(update.update_id, Ordering::SeqCst);
                let Some(message) = update.message else {
                    continue;
                };
                if message.chat.id.to_string() != self.chat_id {
                    continue;
                }
                if let Some(text) = message.text.filter(|t| !t.trim().is_empty()) {
                    return Ok(text);
                }
            }
        }
    }
}

#[async_trait]
impl FeedbackChannel for TelegramChannel {
    async fn notify(&self, session_id: &str, summary: &str) -> Result<(), DebateError> {
        let baseline = self.latest_update_id().await?;
        self.last_update_id.store(baseline, Ordering::SeqCst);

        let messages = outgoing_messages(summary);
        let total = messages.len();
        for (i, text) in messages.iter().enumerate() {
            self.send_message(text).await?;
            if i + 1 < total {
                tokio::time::sleep(CHUNK_PAUSE).await;
            }
        }
        tracing::info!(session = session_id, chunks = total, "Sent review request to Telegram");
        Ok(())
    }

    async fn await_decision(&self, token: &ReviewToken) -> Result<ReviewDecision, DebateError> {
        loop {
            let reply = self.poll_for_reply().await?;
            if let Some(decision) = decision_from_reply(&reply) {
                tracing::info!(session = %token.session_id, "Received Telegram review reply");
                return Ok(decision);
            }
        }
    }
}

fn transport_error(message: &str, retriable: bool) -> DebateError {
    DebateError::Transport {
        provider: "telegram".into(),
        message: message.to_string(),
        retriable,
    }
}

/// The messages actually sent for `text`: one message if it fits, otherwise
/// chunks prefixed with `[i/n]`, each within `MAX_MESSAGE_LENGTH`.
pub fn outgoing_messages(text: &str) -> Vec<String> {
    if text.chars().count() <= MAX_MESSAGE_LENGTH {
        return vec![text.to_string()];
    }
    let chunks = split_message(text, MAX_MESSAGE_LENGTH - HEADER_RESERVE);
    let total = chunks.len();
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| format!("[{}/{}]\n{}", i + 1, total, chunk))
        .collect()
}

/// Split text into chunks of at most `max_chars` characters, preferring
/// paragraph breaks, then line breaks, then spaces. A boundary in the first
/// half of the window is ignored in favour of the next kind.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;
    while !remaining.is_empty() {
        let limit = match remaining.char_indices().nth(max_chars) {
            Some((byte, _)) => byte,
            None => {
                chunks.push(remaining.to_string());
                break;
            }
        };
        let window = &remaining[..limit];
        let half = limit / 2;
        let split_at = [window.rfind("\n\n"), window.rfind('\n'), window.rfind(' ')]
            .into_iter()
            .flatten()
            .find(|&i| i >= half && i > 0)
            .unwrap_or(limit);

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }
    chunks
}

// -- Telegram API response types --

#[derive(Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Deserialize)]
struct TgUpdate {
    update_id: i64,
    message: Option<TgMessage>,
}

#[derive(Deserialize)]
struct TgMessage {
    chat: TgChat,
    text: Option<String>,
}

#[derive(Deserialize)]
struct TgChat {
    id: i64,
}

#[derive(Deserialize)]
struct SendMessageResp {
    #[allow(dead_code)]
    message_id: i64,
}
