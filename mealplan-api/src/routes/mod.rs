/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `recipes`: Recipe CRUD and image upload
/// - `favorites`: Favorite recipes
/// - `meal_plan`: Weekly meal calendar
/// - `family`: Household profile
/// - `billing`: Subscription status, checkout and billing portal
/// - `webhook`: Stripe webhook receiver
/// - `chat`: Cooking assistant
/// - `scan`: Food photo recognition
/// - `voice`: Text-to-speech

pub mod billing;
pub mod chat;
pub mod family;
pub mod favorites;
pub mod health;
pub mod meal_plan;
pub mod recipes;
pub mod scan;
pub mod voice;
pub mod webhook;

use crate::error::{ApiError, ValidationErrorDetail};
use validator::Validate;

/// Runs `validator` rules and maps failures to a 400 with per-field details
pub(crate) fn validate_request<T: Validate>(req: &T) -> Result<(), ApiError> {
    req.validate().map_err(|e| {
        let mut errors: Vec<ValidationErrorDetail> = e
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} is invalid", field)),
                })
            })
            .collect();
        errors.sort_by(|a, b| a.field.cmp(&b.field));
        ApiError::ValidationError(errors)
    })
}

/// Trims a string and drops it when empty
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
