/// Food photo scanning
///
/// ```text
/// POST /api/scan
/// { "image": "data:image/jpeg;base64,/9j/4AAQ...", "media_type": "image/jpeg" }
/// ```
///
/// Response:
///
/// ```json
/// {
///   "items": [ { "name": "Banana", "quantity": "2", "estimated_calories": 210 } ],
///   "notes": null
/// }
/// ```

use crate::{
    app::AppState,
    error::ApiResult,
    middleware::identity::UserIdentity,
};
use axum::{extract::State, Json};
use mealplan_shared::ai::scan::{self, ScanImage, ScanResult};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    /// Base64 payload or data URL
    #[serde(default)]
    pub image: String,

    pub media_type: Option<String>,
}

/// Identify food in a photo
///
/// # Errors
///
/// - `400 Bad Request`: Missing image, bad base64, unsupported type
/// - `413 Payload Too Large`: Decoded image over 5 MiB
/// - `502 Bad Gateway`: Anthropic call failed
/// - `503 Service Unavailable`: Anthropic not configured
pub async fn scan_food(
    State(state): State<AppState>,
    identity: UserIdentity,
    Json(req): Json<ScanRequest>,
) -> ApiResult<Json<ScanResult>> {
    let client = state.anthropic()?;

    let image = ScanImage::parse(&req.image, req.media_type.as_deref())?;

    let completion = client
        .describe_image(scan::SCAN_PROMPT, &image.media_type, &image.base64, scan::SCAN_MAX_TOKENS)
        .await?;

    let result = scan::parse_scan_reply(&completion.text);

    tracing::info!(
        user_id = %identity.user_id,
        media_type = %image.media_type,
        bytes = image.size,
        items = result.items.len(),
        "Food scan completed"
    );

    Ok(Json(result))
}
