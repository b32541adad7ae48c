/// Supabase access token validation
///
/// Supabase signs access tokens with HS256 using the project's JWT secret.
/// Valid tokens carry `aud = "authenticated"` and the user's UUID in `sub`.
///
/// # Example
///
/// ```
/// use mealplan_shared::auth::jwt::{create_token, validate_supabase_token, SupabaseClaims};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "super-secret-jwt-token-with-at-least-32-characters";
/// let user_id = Uuid::new_v4();
///
/// let token = create_token(&SupabaseClaims::new(user_id, Some("cook@example.com".into())), secret)?;
/// let claims = validate_supabase_token(&token, secret)?;
/// assert_eq!(claims.sub, user_id);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audience Supabase assigns to signed-in users
pub const AUTHENTICATED_AUDIENCE: &str = "authenticated";

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Signature, audience or format check failed
    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,
}

/// Claims carried by a Supabase access token
///
/// Only the fields this service reads are modelled; unknown claims are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupabaseClaims {
    /// Subject - Supabase user ID
    pub sub: Uuid,

    /// Audience - `authenticated` for signed-in users
    pub aud: String,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: i64,

    /// Email address of the account, when the provider shared one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Postgres role the token maps to
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    AUTHENTICATED_AUDIENCE.to_string()
}

impl SupabaseClaims {
    /// Claims for a signed-in user valid for one hour
    pub fn new(user_id: Uuid, email: Option<String>) -> Self {
        Self::with_expiration(user_id, email, Duration::hours(1))
    }

    /// Claims with a custom lifetime (negative durations produce expired claims)
    pub fn with_expiration(user_id: Uuid, email: Option<String>, expires_in: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id,
            aud: AUTHENTICATED_AUDIENCE.to_string(),
            exp: (now + expires_in).timestamp(),
            iat: now.timestamp(),
            email,
            role: default_role(),
        }
    }
}

/// Signs claims with HS256
///
/// Production tokens are minted by Supabase; this is used by tests and local tooling.
pub fn create_token(claims: &SupabaseClaims, secret: &str) -> Result<String, JwtError> {
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&Header::new(Algorithm::HS256), claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Validates a Supabase access token and extracts its claims
///
/// Verifies the HS256 signature, expiry, and the `authenticated` audience.
///
/// # Errors
///
/// - [`JwtError::Expired`] when `exp` is in the past
/// - [`JwtError::ValidationError`] for any other failure
pub fn validate_supabase_token(token: &str, secret: &str) -> Result<SupabaseClaims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[AUTHENTICATED_AUDIENCE]);
    validation.validate_exp = true;
    validation.leeway = 0;

    let data = decode::<SupabaseClaims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
    })?;

    Ok(data.claims)
}
