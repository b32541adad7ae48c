/// Middleware and request extractors
///
/// - `security`: Security headers on every response
/// - `identity`: Resolves the calling user (Supabase token or anonymous ID)

pub mod identity;
pub mod security;
