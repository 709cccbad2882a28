pub mod actions;
pub mod models;
pub mod senders;
pub mod service;

pub use actions::{ActionError, ActionTable, RestartAction};
pub use models::{InlineButton, OutgoingMessage};
pub use senders::{NotificationSender, SenderError};
pub use service::{NotificationService, StatusEntry};
