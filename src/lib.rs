//! Hairstyle API Proxy library
//!
//! Modules:
//! - `api`: Axum HTTP handlers and router setup used by the binary.
//! - `gemini`: Thin client for Gemini `generateContent` endpoints.
//! - `auth`: Bearer-credential verification against the identity service.
//! - `ledger`: SQLite credit ledger (balances plus append-only entries).
//! - `credits`: The credit-guarded generation transaction.
//! - `prompt`: Prompt text and structured-output schemas.
//! - `utils`: Image downsampling and pure input sanitizers.
//! - `config`: Env-driven configuration loader.
//! - `error`: Common error type and alias.
//!
//! Re-exports are provided for common types: `Config`, `GeminiClient`,
//! `SqliteLedger`, and `AuthClient`.
pub mod api;
pub mod auth;
pub mod config;
pub mod credits;
pub mod error;
pub mod gemini;
pub mod ledger;
pub mod prompt;
pub mod utils;

pub use auth::AuthClient;
pub use config::Config;
pub use gemini::GeminiClient;
pub use ledger::SqliteLedger;
