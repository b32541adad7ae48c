/// Text-to-speech
///
/// ```text
/// POST /api/voice
/// { "text": "Preheat the oven to 200 degrees.", "voice_id": "optional" }
/// ```
///
/// Responds with `audio/mpeg` bytes.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::identity::UserIdentity,
};
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use mealplan_shared::ai::tts::{is_valid_voice_id, MAX_TEXT_CHARS, MAX_VOICE_ID_CHARS};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct VoiceRequest {
    #[serde(default)]
    pub text: String,

    pub voice_id: Option<String>,
}

fn check_text(text: &str) -> ApiResult<&str> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ApiError::invalid("text", "Text is required"));
    }
    if text.chars().count() > MAX_TEXT_CHARS {
        return Err(ApiError::invalid(
            "text",
            format!("Text must be at most {} characters", MAX_TEXT_CHARS),
        ));
    }
    Ok(text)
}

/// Blank means "use the default voice"
fn check_voice_id(voice_id: Option<&str>) -> ApiResult<Option<&str>> {
    match voice_id.map(str::trim).filter(|v| !v.is_empty()) {
        Some(id) if !is_valid_voice_id(id) => Err(ApiError::invalid(
            "voice_id",
            format!(
                "Voice id must be 1 to {} letters, digits, '_' or '-'",
                MAX_VOICE_ID_CHARS
            ),
        )),
        other => Ok(other),
    }
}

/// Synthesize speech for a piece of text
///
/// # Errors
///
/// - `400 Bad Request`: Empty or overlong text, malformed voice id
/// - `502 Bad Gateway`: ElevenLabs call failed
/// - `503 Service Unavailable`: ElevenLabs not configured
pub async fn text_to_speech(
    State(state): State<AppState>,
    identity: UserIdentity,
    Json(req): Json<VoiceRequest>,
) -> ApiResult<Response> {
    let client = state.tts()?;
    let text = check_text(&req.text)?;
    let voice_id = check_voice_id(req.voice_id.as_deref())?;

    let audio = client.synthesize(text, voice_id).await?;

    tracing::debug!(user_id = %identity.user_id, bytes = audio.len(), "Speech synthesized");

    Ok((
        [
            (header::CONTENT_TYPE, "audio/mpeg"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        audio,
    )
        .into_response())
}
