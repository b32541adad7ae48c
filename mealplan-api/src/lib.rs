//! # Mealplan API Server Library
//!
//! HTTP layer of the family meal-planning backend.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `maintenance`: Background ledger purge
//! - `middleware`: Security headers and request identity
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod maintenance;
pub mod middleware;
pub mod routes;
