/// Authentication utilities
///
/// Users sign in through Supabase (Google / Apple OAuth); the browser then sends
/// the Supabase access token as a Bearer token. This module validates those
/// tokens. Requests without a token fall back to the anonymous user ID the
/// client keeps in local storage (see the API crate's identity extractor).
///
/// - [`jwt`]: HS256 validation of Supabase access tokens

pub mod jwt;
