use crate::notifications::senders::telegram::Update;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    CheckStatus,
    RestartMenu,
    Help,
}

/// Operator input, decoded from a chat update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Command {
        chat_id: String,
        command: OperatorCommand,
    },
    ButtonPress {
        callback_id: String,
        chat_id: String,
        data: String,
    },
}

impl InboundEvent {
    pub fn chat_id(&self) -> &str {
        match self {
            InboundEvent::Command { chat_id, .. } | InboundEvent::ButtonPress { chat_id, .. } => {
                chat_id
            }
        }
    }
}

/// Matches `/check-status`, `/restart-service` and friends. Underscore
/// spellings and a trailing `@botname` are accepted too.
pub fn parse_command(text: &str) -> Option<OperatorCommand> {
    let first = text.split_whitespace().next()?;
    let name = first.strip_prefix('/')?;
    let name = name.split('@').next().unwrap_or(name);
    match name.replace('_', "-").as_str() {
        "check-status" | "status" => Some(OperatorCommand::CheckStatus),
        "restart-service" | "restart" => Some(OperatorCommand::RestartMenu),
        "start" | "help" => Some(OperatorCommand::Help),
        _ => None,
    }
}

pub fn event_from_update(update: &Update) -> Option<InboundEvent> {
    if let Some(callback) = &update.callback_query {
        let message = callback.message.as_ref()?;
        return Some(InboundEvent::ButtonPress {
            callback_id: callback.id.clone(),
            chat_id: message.chat.id.to_string(),
            data: callback.data.clone().unwrap_or_default(),
        });
    }
    let message = update.message.as_ref()?;
    let command = parse_command(message.text.as_deref()?)?;
    Some(InboundEvent::Command {
        chat_id: message.chat.id.to_string(),
        command,
    })
}
