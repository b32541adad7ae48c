//! # Mealplan Shared Library
//!
//! Shared types, persistence and vendor integrations used by the meal-planning
//! API server.
//!
//! ## Module Organization
//!
//! - `db`: Connection pool and migrations
//! - `models`: Database models (recipes, favorites, meal plans, family profiles, subscriptions)
//! - `auth`: Supabase access token validation
//! - `billing`: Stripe webhook verification, idempotency ledger and reconciliation
//! - `ai`: Anthropic (chat, vision) and ElevenLabs (text-to-speech) clients
//! - `storage`: Supabase storage uploads
//! - `http`: Shared outbound HTTP error type

pub mod ai;
pub mod auth;
pub mod billing;
pub mod db;
pub mod http;
pub mod models;
pub mod storage;

/// Current version of the shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
