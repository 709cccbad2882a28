use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{NotificationSender, SenderError};
use crate::notifications::models::{InlineButton, OutgoingMessage};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
/// Bound for `sendMessage` / `answerCallbackQuery`. Long polls set their own.
const REQUEST_TIMEOUT_SECONDS: u64 = 15;

/// Escapes text for Telegram MarkdownV2.
/// Characters to escape: \ _ * [ ] ( ) ~ ` > # + - = | { } . !
pub fn escape_markdown_v2(text: &str) -> String {
    let mut escaped_text = String::with_capacity(text.len());
    for char_to_escape in text.chars() {
        match char_to_escape {
            '\\' | '_' | '*' | '[' | ']' | '(' | ')' | '~' | '`' | '>' | '#' | '+' | '-' | '='
            | '|' | '{' | '}' | '.' | '!' => {
                escaped_text.push('\\');
                escaped_text.push(char_to_escape);
            }
            _ => {
                escaped_text.push(char_to_escape);
            }
        }
    }
    escaped_text
}

/// Bot API client: pushes messages and long-polls for operator input.
pub struct TelegramSender {
    client: Client,
    api_base: String,
    bot_token: String,
    default_chat_id: String,
}

#[derive(Serialize)]
struct ReplyMarkup<'a> {
    inline_keyboard: &'a [Vec<InlineButton>],
}

#[derive(Serialize)]
struct TelegramMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<ReplyMarkup<'a>>,
}

#[derive(Serialize)]
struct CallbackAnswer<'a> {
    callback_query_id: &'a str,
    text: &'a str,
}

#[derive(Serialize)]
struct GetUpdatesRequest<'a> {
    offset: i64,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Deserialize, Debug)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Chat {
    pub id: i64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CallbackQuery {
    pub id: String,
    pub message: Option<Message>,
    pub data: Option<String>,
}

impl TelegramSender {
    pub fn new(bot_token: &str, default_chat_id: &str) -> Result<Self, SenderError> {
        Self::with_api_base(
            bot_token,
            default_chat_id,
            TELEGRAM_API_BASE,
            Duration::from_secs(REQUEST_TIMEOUT_SECONDS),
        )
    }

    pub fn with_api_base(
        bot_token: &str,
        default_chat_id: &str,
        api_base: &str,
        request_timeout: Duration,
    ) -> Result<Self, SenderError> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Self::with_client(client, bot_token, default_chat_id, api_base)
    }

    pub fn with_client(
        client: Client,
        bot_token: &str,
        default_chat_id: &str,
        api_base: &str,
    ) -> Result<Self, SenderError> {
        if bot_token.trim().is_empty() {
            return Err(SenderError::InvalidConfiguration(
                "bot token is empty".to_string(),
            ));
        }
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            default_chat_id: default_chat_id.to_string(),
        })
    }

    pub fn default_chat_id(&self) -> &str {
        &self.default_chat_id
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.bot_token)
    }

    async fn call<B: Serialize + ?Sized, T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        body: &B,
        timeout: Option<Duration>,
    ) -> Result<Option<T>, SenderError> {
        let mut request = self.client.post(self.method_url(method)).json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(SenderError::SendFailed(format!(
                "Telegram API returned non-success status for {method}: {status}. \
                 Body: {error_body}"
            )));
        }

        let parsed: ApiResponse<T> = response.json().await?;
        if !parsed.ok {
            return Err(SenderError::SendFailed(format!(
                "Telegram API rejected {method}: {}",
                parsed.description.unwrap_or_default()
            )));
        }
        Ok(parsed.result)
    }

    /// Long-polls for updates after `offset`. The HTTP timeout is padded past
    /// the server-side poll timeout.
    pub async fn get_updates(
        &self,
        offset: i64,
        poll_timeout_secs: u64,
    ) -> Result<Vec<Update>, SenderError> {
        let request = GetUpdatesRequest {
            offset,
            timeout: poll_timeout_secs,
            allowed_updates: &["message", "callback_query"],
        };
        let updates: Option<Vec<Update>> = self
            .call(
                "getUpdates",
                &request,
                Some(Duration::from_secs(poll_timeout_secs + 10)),
            )
            .await?;
        let updates = updates.unwrap_or_default();
        debug!(count = updates.len(), offset, "Fetched Telegram updates.");
        Ok(updates)
    }
}

fn build_payload<'a>(
    message: &'a OutgoingMessage,
    default_chat_id: &'a str,
) -> TelegramMessage<'a> {
    TelegramMessage {
        chat_id: message.chat_id.as_deref().unwrap_or(default_chat_id),
        text: &message.text,
        parse_mode: "MarkdownV2",
        reply_markup: if message.keyboard.is_empty() {
            None
        } else {
            Some(ReplyMarkup {
                inline_keyboard: &message.keyboard,
            })
        },
    }
}

#[async_trait]
impl NotificationSender for TelegramSender {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), SenderError> {
        let payload = build_payload(message, &self.default_chat_id);
        let _: Option<serde_json::Value> = self.call("sendMessage", &payload, None).await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<(), SenderError> {
        let payload = CallbackAnswer {
            callback_query_id: callback_id,
            text,
        };
        let _: Option<serde_json::Value> = self.call("answerCallbackQuery", &payload, None).await?;
        Ok(())
    }
}
