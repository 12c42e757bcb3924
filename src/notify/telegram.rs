//! Telegram notifier implementation.
//!
//! Implements [`ChatNotifier`](super::ChatNotifier) over the Bot API
//! `sendMessage` method. Delivery is best-effort by contract: a transport
//! error or non-2xx response is reported to the caller, which logs it and
//! drops the message. There is no retry.

use async_trait::async_trait;
use serde::Serialize;

use crate::config::SecretString;
use crate::error::DeliverError;
use crate::notify::{ChatNotifier, OutboundMessage};

/// Base URL of the Telegram Bot API.
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// `sendMessage` request body.
///
/// Message text is already code-fenced by the transform pipeline; no further
/// MarkdownV2 escaping is applied, so a log line containing a backtick run
/// can still break the fence or fail delivery.
#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_thread_id: Option<i64>,
    disable_web_page_preview: bool,
}

impl<'a> SendMessageRequest<'a> {
    fn from_message(message: &'a OutboundMessage) -> Self {
        Self {
            chat_id: message.chat_id,
            text: &message.text,
            parse_mode: "MarkdownV2",
            message_thread_id: message.message_thread_id,
            disable_web_page_preview: true,
        }
    }
}

/// Telegram notifier posting to the Bot API.
pub struct TelegramNotifier {
    /// Full `sendMessage` URL; contains the bot token, never logged.
    send_url: String,
    /// HTTP client (shared, connection pooling).
    client: reqwest::Client,
}

impl TelegramNotifier {
    /// Create a notifier against the public Bot API.
    pub fn new(token: &SecretString, client: reqwest::Client) -> Self {
        Self::with_base_url(TELEGRAM_API_BASE, token, client)
    }

    /// Create a notifier against a custom base URL (for tests).
    pub fn with_base_url(base_url: &str, token: &SecretString, client: reqwest::Client) -> Self {
        Self {
            send_url: format!("{}/bot{}/sendMessage", base_url, token.expose()),
            client,
        }
    }
}

#[async_trait]
impl ChatNotifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn deliver(&self, message: &OutboundMessage) -> Result<(), DeliverError> {
        let body = SendMessageRequest::from_message(message);

        let response = self
            .client
            .post(&self.send_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| DeliverError::SendFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliverError::Rejected {
                status: status.as_u16(),
            });
        }

        Ok(())
    }
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // send_url embeds the token; never print it
        f.debug_struct("TelegramNotifier").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_message(thread: Option<i64>) -> OutboundMessage {
        OutboundMessage {
            chat_id: -1001234,
            text: "```\nERROR boom\n```".to_string(),
            message_thread_id: thread,
            container: "app".to_string(),
        }
    }

    #[test]
    fn request_serializes_with_thread_id() {
        let message = make_message(Some(42));
        let body = SendMessageRequest::from_message(&message);
        let json = serde_json::to_string(&body).unwrap();

        assert!(json.contains("\"chat_id\":-1001234"));
        assert!(json.contains("\"parse_mode\":\"MarkdownV2\""));
        assert!(json.contains("\"message_thread_id\":42"));
        assert!(json.contains("\"disable_web_page_preview\":true"));
    }

    #[test]
    fn request_omits_thread_id_when_unmapped() {
        let message = make_message(None);
        let body = SendMessageRequest::from_message(&message);
        let json = serde_json::to_string(&body).unwrap();

        assert!(!json.contains("message_thread_id"));
    }

    #[test]
    fn send_url_embeds_token() {
        let token = SecretString::new("123456:abc".to_string());
        let notifier = TelegramNotifier::new(&token, reqwest::Client::new());

        assert_eq!(
            notifier.send_url,
            "https://api.telegram.org/bot123456:abc/sendMessage"
        );
    }

    #[test]
    fn debug_does_not_leak_token() {
        let token = SecretString::new("123456:very-secret".to_string());
        let notifier = TelegramNotifier::new(&token, reqwest::Client::new());

        let debug = format!("{:?}", notifier);
        assert!(!debug.contains("very-secret"));
    }

    #[test]
    fn notifier_name_is_telegram() {
        let token = SecretString::new("t".to_string());
        let notifier = TelegramNotifier::new(&token, reqwest::Client::new());
        assert_eq!(notifier.name(), "telegram");
    }
}
