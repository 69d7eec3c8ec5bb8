//! Env-driven configuration for the service and library.
//!
//! Values are read from the process environment; `dotenv` is loaded on demand
//! by the binary. Defaults are provided for convenience during development.
//! `GEMINI_API_KEY` deliberately has no default: calls that need it fail with
//! a configuration error rather than a confusing upstream 403.
use std::env;

pub struct Config {
    pub gemini_url: String,
    pub gemini_api_key: String,
    pub gemini_image_model: String,
    pub gemini_text_model: String,
    pub auth_url: String,
    pub database_path: String,
    pub api_host: String,
    pub api_port: String,
}

impl Config {
    pub fn dotenv_load() {
        dotenv::dotenv().ok();
    }

    pub fn new() -> Result<Self, env::VarError> {
        Ok(Config {
            gemini_url: env::var("GEMINI_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string()),
            gemini_api_key: env::var("GEMINI_API_KEY").unwrap_or_default(),
            gemini_image_model: env::var("GEMINI_IMAGE_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash-image-preview".to_string()),
            gemini_text_model: env::var("GEMINI_TEXT_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
            auth_url: env::var("AUTH_URL")
                .unwrap_or_else(|_| "http://localhost:9999/auth/v1".to_string()),
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "./credits.db".to_string()),
            api_host: env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            api_port: env::var("API_PORT").unwrap_or_else(|_| "8190".to_string()),
        })
    }

    pub fn print_env_vars() {
        println!("GEMINI_URL: {}", env::var("GEMINI_URL").unwrap_or_else(|_| "<unset>".to_string()));
        println!(
            "GEMINI_API_KEY: {}",
            if env::var("GEMINI_API_KEY").is_ok() { "<set>" } else { "<unset>" }
        );
        println!("GEMINI_IMAGE_MODEL: {}", env::var("GEMINI_IMAGE_MODEL").unwrap_or_else(|_| "<unset>".to_string()));
        println!("GEMINI_TEXT_MODEL: {}", env::var("GEMINI_TEXT_MODEL").unwrap_or_else(|_| "<unset>".to_string()));
        println!("AUTH_URL: {}", env::var("AUTH_URL").unwrap_or_else(|_| "<unset>".to_string()));
        println!("DATABASE_PATH: {}", env::var("DATABASE_PATH").unwrap_or_else(|_| "<unset>".to_string()));
        println!("API_HOST: {}", env::var("API_HOST").unwrap_or_else(|_| "<unset>".to_string()));
        println!("API_PORT: {}", env::var("API_PORT").unwrap_or_else(|_| "<unset>".to_string()));
    }
}
