/// Food photo scanning
///
/// Decodes the uploaded image, and turns the model's free-form answer into
/// a list of detected food items. Models do not always answer with clean
/// JSON, so parsing looks for the first JSON array in the text and keeps
/// whatever surrounds it as notes.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use serde_json::Value;

/// Largest decoded image accepted
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Token cap for the scan reply
pub const SCAN_MAX_TOKENS: u32 = 1024;

/// Media types accepted for scanning
pub const SUPPORTED_MEDIA_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/webp", "image/gif"];

const DEFAULT_MEDIA_TYPE: &str = "image/jpeg";

/// Prompt sent alongside the image
pub const SCAN_PROMPT: &str = "Identify the food items in this photo. Respond with a JSON \
array only, where each element is an object with the keys \"name\" (string), \"quantity\" \
(short string such as \"2 cups\" or \"1 bunch\") and \"estimated_calories\" (integer for \
the visible quantity). If there is no food in the photo, respond with an empty array and \
one sentence explaining what you see.";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImageError {
    #[error("Image is required")]
    Empty,

    #[error("Unsupported image type: {0}")]
    UnsupportedMediaType(String),

    #[error("Image is not valid base64")]
    InvalidBase64,

    #[error("Image exceeds {max} bytes")]
    TooLarge { size: usize, max: usize },
}

/// Validated image ready to forward to the vision model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanImage {
    pub media_type: String,

    /// Standard base64 without a data URL prefix
    pub base64: String,

    /// Decoded size
    pub size: usize,
}

impl ScanImage {
    /// Accepts raw base64 or a `data:<type>;base64,<payload>` URL.
    ///
    /// A media type in the data URL wins over `media_type`, and jpeg is
    /// assumed when neither is given.
    pub fn parse(image: &str, media_type: Option<&str>) -> Result<Self, ImageError> {
        let image = image.trim();
        if image.is_empty() {
            return Err(ImageError::Empty);
        }

        let (url_type, payload) = match image.strip_prefix("data:") {
            Some(rest) => {
                let (header, payload) = rest.split_once(',').ok_or(ImageError::InvalidBase64)?;
                let declared = header.strip_suffix(";base64").unwrap_or(header);
                (Some(declared.to_ascii_lowercase()), payload)
            }
            None => (None, image),
        };

        let media_type = url_type
            .or_else(|| media_type.map(|t| t.trim().to_ascii_lowercase()))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_MEDIA_TYPE.to_string());

        if !SUPPORTED_MEDIA_TYPES.contains(&media_type.as_str()) {
            return Err(ImageError::UnsupportedMediaType(media_type));
        }

        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = STANDARD
            .decode(compact.as_bytes())
            .map_err(|_| ImageError::InvalidBase64)?;

        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(ImageError::TooLarge {
                size: bytes.len(),
                max: MAX_IMAGE_BYTES,
            });
        }

        Ok(Self {
            media_type,
            base64: compact,
            size: bytes.len(),
        })
    }
}

/// One detected food
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoodItem {
    pub name: String,
    pub quantity: Option<String>,
    pub estimated_calories: Option<u32>,
}

/// Parsed scan answer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResult {
    pub items: Vec<FoodItem>,
    pub notes: Option<String>,
}

/// Extracts food items from the model's reply
pub fn parse_scan_reply(text: &str) -> ScanResult {
    let text = text.trim();

    let array = text.find('[').and_then(|start| {
        let end = text.rfind(']')?;
        if end < start {
            return None;
        }
        let parsed: Vec<Value> = serde_json::from_str(&text[start..=end]).ok()?;
        Some((start, end, parsed))
    });

    let Some((start, end, values)) = array else {
        return ScanResult {
            items: Vec::new(),
            notes: non_empty(text),
        };
    };

    let items = values.iter().filter_map(food_item).collect();

    let surrounding = format!("{} {}", &text[..start], &text[end + 1..]);
    let surrounding = surrounding
        .replace("```json", "")
        .replace("```", "");

    ScanResult {
        items,
        notes: non_empty(surrounding.trim()),
    }
}

fn food_item(value: &Value) -> Option<FoodItem> {
    let name = value.get("name")?.as_str()?.trim();
    if name.is_empty() {
        return None;
    }

    let quantity = match value.get("quantity") {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };

    let estimated_calories = value
        .get("estimated_calories")
        .and_then(Value::as_f64)
        .filter(|c| c.is_finite() && *c >= 0.0)
        .map(|c| c.round() as u32);

    Some(FoodItem {
        name: name.to_string(),
        quantity,
        estimated_calories,
    })
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_data_url() {
        let image = ScanImage::parse("data:image/png;base64,aGVsbG8=", Some("image/jpeg")).unwrap();
        assert_eq!(image.media_type, "image/png");
        assert_eq!(image.base64, "aGVsbG8=");
        assert_eq!(image.size, 5);
    }

    #[test]
    fn test_parse_raw_base64_defaults_to_jpeg() {
        let image = ScanImage::parse("aGVs\nbG8=", None).unwrap();
        assert_eq!(image.media_type, "image/jpeg");
        assert_eq!(image.base64, "aGVsbG8=");

        let image = ScanImage::parse("aGVsbG8=", Some("IMAGE/WEBP")).unwrap();
        assert_eq!(image.media_type, "image/webp");
    }

    #[test]
    fn test_parse_rejects_bad_images() {
        assert_eq!(ScanImage::parse("  ", None), Err(ImageError::Empty));
        assert_eq!(
            ScanImage::parse("aGVsbG8=", Some("image/bmp")),
            Err(ImageError::UnsupportedMediaType("image/bmp".to_string()))
        );
        assert_eq!(
            ScanImage::parse("not base64!", None),
            Err(ImageError::InvalidBase64)
        );

        let big = STANDARD.encode(vec![0u8; MAX_IMAGE_BYTES + 1]);
        assert!(matches!(
            ScanImage::parse(&big, None),
            Err(ImageError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_parse_scan_reply_clean_array() {
        let result = parse_scan_reply(
            r#"[{"name":"Banana","quantity":"2","estimated_calories":210},{"name":"Milk","quantity":1,"estimated_calories":102.6}]"#,
        );

        assert_eq!(result.items.len(), 2);
        assert_eq!(result.items[0].name, "Banana");
        assert_eq!(result.items[0].estimated_calories, Some(210));
        assert_eq!(result.items[1].quantity.as_deref(), Some("1"));
        assert_eq!(result.items[1].estimated_calories, Some(103));
        assert_eq!(result.notes, None);
    }

    #[test]
    fn test_parse_scan_reply_with_prose_and_fences() {
        let result = parse_scan_reply(
            "Here is what I found:\n```json\n[{\"name\":\"Apple\"},{\"quantity\":\"3\"}]\n```",
        );

        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].name, "Apple");
        assert_eq!(result.items[0].quantity, None);
        assert_eq!(result.notes.as_deref(), Some("Here is what I found:"));
    }

    #[test]
    fn test_parse_scan_reply_without_array() {
        let result = parse_scan_reply("I only see a dog on a couch.");
        assert!(result.items.is_empty());
        assert_eq!(result.notes.as_deref(), Some("I only see a dog on a couch."));
    }
}
