/// Cooking assistant chat
///
/// ```text
/// POST /api/chat
/// { "messages": [ { "role": "user", "content": "What can I cook with leeks?" } ] }
/// ```
///
/// Response: `{ "reply": "...", "model": "claude-..." }`
///
/// The caller's family profile, when present, is folded into the system
/// prompt so suggestions respect allergies and preferences.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::identity::UserIdentity,
};
use axum::{extract::State, Json};
use mealplan_shared::{
    ai::{
        anthropic::{ChatMessage, ChatRole},
        assistant,
    },
    models::family::FamilyProfile,
};
use serde::{Deserialize, Serialize};

/// One turn as sent by the browser
#[derive(Debug, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatTurn>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub model: String,
}

fn parse_turns(turns: Vec<ChatTurn>) -> ApiResult<Vec<ChatMessage>> {
    turns
        .into_iter()
        .enumerate()
        .map(|(index, turn)| {
            let role = match turn.role.trim().to_ascii_lowercase().as_str() {
                "user" => ChatRole::User,
                "assistant" => ChatRole::Assistant,
                other => {
                    return Err(ApiError::invalid(
                        "messages",
                        format!("Message {} has unknown role '{}'", index, other),
                    ))
                }
            };
            Ok(ChatMessage {
                role,
                content: turn.content,
            })
        })
        .collect()
}

/// Continue a conversation with the cooking assistant
///
/// # Errors
///
/// - `400 Bad Request`: Empty conversation, unknown role, last turn not from the user
/// - `502 Bad Gateway`: Anthropic call failed
/// - `503 Service Unavailable`: Anthropic not configured
pub async fn chat(
    State(state): State<AppState>,
    identity: UserIdentity,
    Json(req): Json<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    let client = state.anthropic()?;

    let messages = parse_turns(req.messages)?;
    assistant::validate_conversation(&messages)?;

    let family_context = FamilyProfile::find_by_user(&state.db, identity.user_id)
        .await?
        .and_then(|profile| profile.assistant_context());
    let system = assistant::system_prompt(family_context.as_deref());

    let completion = client
        .complete(Some(&system), &messages, assistant::CHAT_MAX_TOKENS)
        .await?;

    tracing::info!(
        user_id = %identity.user_id,
        turns = messages.len(),
        with_family = family_context.is_some(),
        "Assistant replied"
    );

    Ok(Json(ChatResponse {
        reply: completion.text,
        model: completion.model,
    }))
}
