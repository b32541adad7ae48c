/// Cooking assistant persona

use super::anthropic::{ChatMessage, ChatRole};

/// Token cap for assistant replies
pub const CHAT_MAX_TOKENS: u32 = 1024;

/// Maximum turns accepted in one request
pub const MAX_MESSAGES: usize = 50;

/// Maximum characters per turn
pub const MAX_MESSAGE_CHARS: usize = 4000;

const PERSONA: &str = "You are a friendly home-cooking assistant inside a family meal \
planning app. Suggest practical recipes, weekly meal plans, substitutions and grocery \
lists. Keep answers concise and use plain lists for ingredients and steps. Always \
respect the household's allergies and dietary restrictions, and say so when a request \
conflicts with them.";

/// Builds the system prompt, appending household context when available
pub fn system_prompt(family_context: Option<&str>) -> String {
    match family_context {
        Some(context) if !context.trim().is_empty() => {
            format!("{}\n\nAbout this household:\n{}", PERSONA, context.trim())
        }
        _ => PERSONA.to_string(),
    }
}

/// Problems with a submitted conversation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversationError {
    #[error("At least one message is required")]
    Empty,

    #[error("At most {} messages are allowed", MAX_MESSAGES)]
    TooManyMessages,

    #[error("Message {index} must not be empty")]
    EmptyMessage { index: usize },

    #[error("Message {index} exceeds {} characters", MAX_MESSAGE_CHARS)]
    MessageTooLong { index: usize },

    #[error("The last message must come from the user")]
    LastNotUser,
}

/// Checks turn count, per-turn length and that the user spoke last
pub fn validate_conversation(messages: &[ChatMessage]) -> Result<(), ConversationError> {
    if messages.is_empty() {
        return Err(ConversationError::Empty);
    }
    if messages.len() > MAX_MESSAGES {
        return Err(ConversationError::TooManyMessages);
    }

    for (index, message) in messages.iter().enumerate() {
        if message.content.trim().is_empty() {
            return Err(ConversationError::EmptyMessage { index });
        }
        if message.content.chars().count() > MAX_MESSAGE_CHARS {
            return Err(ConversationError::MessageTooLong { index });
        }
    }

    match messages.last() {
        Some(last) if last.role == ChatRole::User => Ok(()),
        _ => Err(ConversationError::LastNotUser),
    }
}
