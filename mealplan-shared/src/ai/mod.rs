/// AI vendor integrations
///
/// - [`anthropic`]: Messages API client (text chat and image input)
/// - [`assistant`]: Cooking assistant persona and system prompt
/// - [`scan`]: Food photo decoding and detected-item parsing
/// - [`tts`]: ElevenLabs text-to-speech client

pub mod anthropic;
pub mod assistant;
pub mod scan;
pub mod tts;
