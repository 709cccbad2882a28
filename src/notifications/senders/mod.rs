use async_trait::async_trait;
use thiserror::Error;

use super::models::OutgoingMessage;

pub mod telegram;

#[derive(Error, Debug)]
pub enum SenderError {
    #[error("Failed to send notification: {0}")]
    SendFailed(String),
    #[error("Invalid configuration for sender: {0}")]
    InvalidConfiguration(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// Outbound side of the chat transport.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Sends a message, to `message.chat_id` or the sender's default chat.
    async fn send(&self, message: &OutgoingMessage) -> Result<(), SenderError>;

    /// Acknowledges a button press so the client stops its loading indicator.
    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<(), SenderError>;
}
