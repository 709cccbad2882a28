use serde::Serialize;

/// A single button of an inline keyboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

/// A chat message ready for a sender. `text` is already MarkdownV2.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutgoingMessage {
    /// `None` means the sender's default chat.
    pub chat_id: Option<String>,
    pub text: String,
    pub keyboard: Vec<Vec<InlineButton>>,
}

impl OutgoingMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            chat_id: None,
            text: text.into(),
            keyboard: Vec::new(),
        }
    }

    pub fn to_chat(mut self, chat_id: &str) -> Self {
        self.chat_id = Some(chat_id.to_string());
        self
    }

    pub fn with_keyboard(mut self, keyboard: Vec<Vec<InlineButton>>) -> Self {
        self.keyboard = keyboard;
        self
    }
}
