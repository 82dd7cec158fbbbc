//! Telegram Bot API client
//!
//! Only the pieces the tracker needs: `sendMessage` with HTML formatting and
//! URL buttons, plus the webhook update payload.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Errors from the Telegram API
#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Telegram API error ({status}): {description}")]
    Api { status: u16, description: String },
}

impl From<reqwest::Error> for TelegramError {
    fn from(err: reqwest::Error) -> Self {
        TelegramError::Network(err.to_string())
    }
}

/// One URL button of an inline keyboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineButton {
    pub text: String,
    pub url: String,
}

impl InlineButton {
    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: url.into(),
        }
    }
}

/// Rows of buttons
pub type InlineKeyboard = Vec<Vec<InlineButton>>;

#[derive(Debug, Serialize)]
struct ReplyMarkup<'a> {
    inline_keyboard: &'a InlineKeyboard,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<ReplyMarkup<'a>>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Incoming webhook update
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub channel_post: Option<Message>,
}

impl Update {
    /// The text-bearing message of this update, whether from a chat or a channel
    pub fn text_message(&self) -> Option<&Message> {
        self.message
            .as_ref()
            .or(self.channel_post.as_ref())
            .filter(|m| m.text.is_some())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub title: Option<String>,
}

impl Chat {
    pub fn is_private(&self) -> bool {
        self.kind == "private"
    }
}

/// Telegram bot client
pub struct TelegramClient {
    http: Client,
    token: String,
    base_url: String,
}

impl TelegramClient {
    pub fn new(token: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            token: token.into(),
            base_url: TELEGRAM_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    /// Send an HTML message, optionally with URL buttons
    pub async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        buttons: Option<&InlineKeyboard>,
    ) -> Result<(), TelegramError> {
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
            reply_markup: buttons.map(|inline_keyboard| ReplyMarkup { inline_keyboard }),
        };

        debug!("[Telegram] sendMessage to {}", chat_id);
        let response = self
            .http
            .post(self.method_url("sendMessage"))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body: ApiResponse = response.json().await.unwrap_or(ApiResponse {
            ok: false,
            description: None,
        });

        if !status.is_success() || !body.ok {
            return Err(TelegramError::Api {
                status: status.as_u16(),
                description: body.description.unwrap_or_else(|| "unknown error".to_string()),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_group_update() {
        let update: Update = serde_json::from_str(
            r#"{
                "update_id": 10,
                "message": {
                    "message_id": 5,
                    "date": 1700000000,
                    "chat": {"id": -100123, "type": "supergroup", "title": "Calls"},
                    "text": "/stats 7d"
                }
            }"#,
        )
        .unwrap();

        let message = update.text_message().unwrap();
        assert_eq!(message.chat.id, -100123);
        assert!(!message.chat.is_private());
        assert_eq!(message.text.as_deref(), Some("/stats 7d"));
    }

    #[test]
    fn test_channel_post_and_non_text() {
        let channel: Update = serde_json::from_str(
            r#"{"update_id": 1, "channel_post": {"message_id": 1, "chat": {"id": -5, "type": "channel"}, "text": "hi"}}"#,
        )
        .unwrap();
        assert_eq!(channel.text_message().unwrap().chat.kind, "channel");

        let sticker: Update = serde_json::from_str(
            r#"{"update_id": 2, "message": {"message_id": 2, "chat": {"id": 7, "type": "private"}}}"#,
        )
        .unwrap();
        assert!(sticker.text_message().is_none());
    }

    #[test]
    fn test_send_message_payload() {
        let buttons = vec![vec![InlineButton::url("Chart", "https://dexscreener.com/solana/X")]];
        let request = SendMessageRequest {
            chat_id: "42",
            text: "<b>hi</b>",
            parse_mode: "HTML",
            disable_web_page_preview: true,
            reply_markup: Some(ReplyMarkup {
                inline_keyboard: &buttons,
            }),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["parse_mode"], "HTML");
        assert_eq!(json["reply_markup"]["inline_keyboard"][0][0]["text"], "Chart");
    }

    #[test]
    fn test_method_url() {
        let client = TelegramClient::new("123:abc").with_base_url("http://localhost:9");
        assert_eq!(client.method_url("sendMessage"), "http://localhost:9/bot123:abc/sendMessage");
    }
}
