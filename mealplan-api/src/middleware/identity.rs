/// Request identity extraction
///
/// Every data endpoint is scoped to a user ID. Signed-in users send their
/// Supabase access token; everyone else sends the UUID the browser generated
/// and stored locally.
///
/// # Resolution order
///
/// 1. `Authorization: Bearer <token>` when a Supabase JWT secret is
///    configured. An invalid or expired token is rejected with 401 rather
///    than silently downgraded.
/// 2. `X-Anonymous-Id: <uuid>`.
/// 3. Neither present: 400 `Missing user id`.
///
/// # Example
///
/// ```no_run
/// use axum::Json;
/// use mealplan_api::middleware::identity::UserIdentity;
///
/// async fn whoami(identity: UserIdentity) -> Json<String> {
///     Json(identity.user_id.to_string())
/// }
/// ```

use crate::{app::AppState, error::ApiError};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use mealplan_shared::auth::jwt;
use serde::Serialize;
use uuid::Uuid;

/// Header carrying the client-generated anonymous user ID
pub const ANONYMOUS_ID_HEADER: &str = "x-anonymous-id";

/// How the caller was identified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityMethod {
    /// Supabase access token
    Authenticated,

    /// Client-generated UUID
    Anonymous,
}

/// The calling user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub user_id: Uuid,
    pub method: IdentityMethod,

    /// Account email (authenticated users only)
    pub email: Option<String>,
}

impl UserIdentity {
    pub fn is_authenticated(&self) -> bool {
        self.method == IdentityMethod::Authenticated
    }
}

/// Resolves the caller from request headers
pub fn resolve_identity(
    headers: &HeaderMap,
    jwt_secret: Option<&str>,
) -> Result<UserIdentity, ApiError> {
    if let Some(secret) = jwt_secret {
        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty());

        if let Some(token) = bearer {
            let claims = jwt::validate_supabase_token(token, secret)?;
            return Ok(UserIdentity {
                user_id: claims.sub,
                method: IdentityMethod::Authenticated,
                email: claims.email,
            });
        }
    }

    let raw = headers
        .get(ANONYMOUS_ID_HEADER)
        .ok_or_else(|| ApiError::BadRequest("Missing user id".to_string()))?;

    let user_id = raw
        .to_str()
        .ok()
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .ok_or_else(|| ApiError::BadRequest("Invalid user id".to_string()))?;

    Ok(UserIdentity {
        user_id,
        method: IdentityMethod::Anonymous,
        email: None,
    })
}

#[async_trait]
impl FromRequestParts<AppState> for UserIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let identity = resolve_identity(&parts.headers, state.config.auth.jwt_secret.as_deref())?;

        tracing::debug!(
            user_id = %identity.user_id,
            method = ?identity.method,
            "Resolved request identity"
        );

        Ok(identity)
    }
}
