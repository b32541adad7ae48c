/// ElevenLabs text-to-speech client

use bytes::Bytes;
use serde::Serialize;
use tracing::debug;

use crate::http::{build_client, ensure_success, ClientError};

const SERVICE: &str = "elevenlabs";

pub const DEFAULT_API_BASE: &str = "https://api.elevenlabs.io";

/// Default narration voice ("Rachel")
pub const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";

pub const TTS_MODEL: &str = "eleven_multilingual_v2";

/// Longest text accepted for one synthesis
pub const MAX_TEXT_CHARS: usize = 1000;

/// Longest voice ID accepted
pub const MAX_VOICE_ID_CHARS: usize = 64;

/// Voice IDs become a URL path segment, so only `[A-Za-z0-9_-]` is allowed
pub fn is_valid_voice_id(voice_id: &str) -> bool {
    (1..=MAX_VOICE_ID_CHARS).contains(&voice_id.len())
        && voice_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

#[derive(Clone)]
pub struct TtsClient {
    http: reqwest::Client,
    api_key: String,
    default_voice_id: String,
    api_base: String,
}

impl std::fmt::Debug for TtsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtsClient")
            .field("default_voice_id", &self.default_voice_id)
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl TtsClient {
    pub fn new(
        api_key: impl Into<String>,
        default_voice_id: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            http: build_client()?,
            api_key: api_key.into(),
            default_voice_id: default_voice_id.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    /// Synthesizes `text` to MP3, using the default voice when `voice_id` is `None`
    pub async fn synthesize(&self, text: &str, voice_id: Option<&str>) -> Result<Bytes, ClientError> {
        let voice_id = voice_id
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(&self.default_voice_id);

        if !is_valid_voice_id(voice_id) {
            return Err(ClientError::InvalidInput {
                service: SERVICE,
                message: format!("voice id {:?} is not allowed", voice_id),
            });
        }

        debug!(voice_id, chars = text.chars().count(), "Requesting speech synthesis");

        let request = SynthesisRequest {
            text,
            model_id: TTS_MODEL,
            voice_settings: VoiceSettings {
                stability: 0.5,
                similarity_boost: 0.75,
            },
        };

        let response = self
            .http
            .post(format!("{}/v1/text-to-speech/{}", self.api_base, voice_id))
            .header("xi-api-key", &self.api_key)
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .json(&request)
            .send()
            .await
            .map_err(|e| ClientError::network(SERVICE, e))?;

        let audio = ensure_success(SERVICE, response)
            .await?
            .bytes()
            .await
            .map_err(|e| ClientError::network(SERVICE, e))?;

        if audio.is_empty() {
            return Err(ClientError::Parse {
                service: SERVICE,
                message: "empty audio response".to_string(),
            });
        }

        Ok(audio)
    }
}
