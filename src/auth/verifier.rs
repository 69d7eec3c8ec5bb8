//! Bearer-credential verification against the external identity service.
//!
//! The verifier is opaque to the rest of the crate: it takes the raw
//! `Authorization` header value and yields a user identifier or
//! `Unauthenticated`. Transport failures reaching the identity service are
//! not authentication failures and surface as 500s.
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::error::{AppError, AppResult};

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Validate a bearer credential and return the user identifier.
    async fn verify(&self, bearer: &str) -> AppResult<String>;
}

/// HTTP verifier: GETs `{auth_url}/user` with the token and reads `id`.
#[derive(Clone)]
pub struct AuthClient {
    client: Client,
    base_url: String,
}

impl AuthClient {
    pub fn new(base_url: String) -> Self {
        AuthClient {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl IdentityVerifier for AuthClient {
    async fn verify(&self, bearer: &str) -> AppResult<String> {
        let token = bearer.strip_prefix("Bearer ").unwrap_or(bearer).trim();
        if token.is_empty() {
            return Err(AppError::Unauthenticated);
        }

        let url = format!("{}/user", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(AppError::HttpClient)?;

        if !response.status().is_success() {
            tracing::debug!("identity service rejected token: {}", response.status());
            return Err(AppError::Unauthenticated);
        }

        let body: Value = response.json().await.map_err(AppError::HttpClient)?;
        body.get("id")
            .and_then(|id| id.as_str())
            .map(String::from)
            .ok_or(AppError::Unauthenticated)
    }
}
