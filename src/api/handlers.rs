//! Axum request handlers for the HTTP API.
use std::sync::Arc;

use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::routes::AppState;
use crate::auth::IdentityVerifier;
use crate::credits::{self, InlineImage};
use crate::error::{AppError, AppResult};
use crate::ledger::LedgerStore;
use crate::prompt::builder::{
    face_shape_prompt, face_shape_schema, suggestions_prompt, suggestions_schema,
};
use crate::utils::image::resize_to_bound;
use crate::utils::sanitize::{cap_length, sanitize_html, sanitize_name};

/// Uploads are bounded to this dimension before they go upstream.
const MAX_UPLOAD_DIM: u32 = 1024;
const JPEG_QUALITY: u8 = 85;
const MAX_DESCRIPTOR_CHARS: usize = 500;

pub async fn root() -> &'static str {
    "Hairstyle API Proxy"
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default)]
    pub base64_image: String,
    #[serde(default)]
    pub style_descriptor: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub image: String,
    pub mime_type: String,
    pub credits_remaining: i64,
}

/// The credit-guarded generation endpoint: verify identity, then run the
/// debit-generate-refund transaction and hand back the restyled image.
pub async fn generate_hairstyle(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<GenerateRequest>,
) -> AppResult<Json<GenerateResponse>> {
    let user_id = require_identity(&state, &headers).await?;

    let descriptor = cap_length(
        &sanitize_html(payload.style_descriptor.trim()),
        MAX_DESCRIPTOR_CHARS,
    );
    let upload = decode_upload(&payload.base64_image)?;
    let image = InlineImage {
        mime_type: "image/jpeg".to_string(),
        data: resize_to_bound(&upload.data, MAX_UPLOAD_DIM, JPEG_QUALITY)?,
    };

    let outcome =
        credits::attempt_generation(&state.ledger, &state.gemini, &user_id, &image, &descriptor)
            .await?;

    Ok(Json(GenerateResponse {
        image: BASE64.encode(&outcome.image.data),
        mime_type: outcome.image.mime_type,
        credits_remaining: outcome.credits_remaining,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub base64_image: Option<String>,
    pub gender: Option<String>,
    pub age: Option<u32>,
}

/// Read-only face-shape classification. Anonymous calls are allowed (the
/// pre-signup teaser flow), but a bearer token sent anyway must still verify.
pub async fn detect_face_shape(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<AnalysisRequest>,
) -> AppResult<Json<Value>> {
    if headers.contains_key(AUTHORIZATION) {
        require_identity(&state, &headers).await?;
    }
    let (image, gender, age) = validate_analysis(&payload)?;
    let result = state
        .gemini
        .generate_structured(&image, &face_shape_prompt(&gender, age), face_shape_schema())
        .await?;
    Ok(Json(result))
}

/// Read-only styling suggestions; authentication is mandatory here.
pub async fn suggest_hairstyles(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<AnalysisRequest>,
) -> AppResult<Json<Value>> {
    require_identity(&state, &headers).await?;
    let (image, gender, age) = validate_analysis(&payload)?;
    let result = state
        .gemini
        .generate_structured(&image, &suggestions_prompt(&gender, age), suggestions_schema())
        .await?;
    Ok(Json(result))
}

/// Current balance for the authenticated user.
pub async fn get_credits(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_identity(&state, &headers).await?;
    let credits = state.ledger.get_balance(&user_id).await?;
    Ok(Json(json!({ "credits": credits })))
}

async fn require_identity(state: &AppState, headers: &HeaderMap) -> AppResult<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthenticated)?;
    state.verifier.verify(bearer).await
}

fn validate_analysis(payload: &AnalysisRequest) -> AppResult<(InlineImage, String, Option<u32>)> {
    let base64_image = payload
        .base64_image
        .as_deref()
        .ok_or_else(|| AppError::InvalidInput("base64Image is required".to_string()))?;
    let gender = sanitize_name(payload.gender.as_deref().unwrap_or("")).to_lowercase();
    if gender.is_empty() {
        return Err(AppError::InvalidInput("gender is required".to_string()));
    }

    let upload = decode_upload(base64_image)?;
    let image = InlineImage {
        mime_type: "image/jpeg".to_string(),
        data: resize_to_bound(&upload.data, MAX_UPLOAD_DIM, JPEG_QUALITY)?,
    };
    Ok((image, gender, payload.age))
}

/// Accepts either a raw base64 string or a `data:<mime>;base64,...` URI.
fn decode_upload(input: &str) -> AppResult<InlineImage> {
    let input = input.trim();
    if input.is_empty() {
        return Err(AppError::InvalidInput("base64Image is required".to_string()));
    }

    let (mime_type, payload) = match input.strip_prefix("data:") {
        Some(rest) => {
            let (mime, data) = rest.split_once(";base64,").ok_or_else(|| {
                AppError::InvalidInput("unsupported data URI encoding".to_string())
            })?;
            (mime.to_string(), data)
        }
        None => ("image/jpeg".to_string(), input),
    };

    let data = BASE64
        .decode(payload)
        .map_err(|e| AppError::InvalidInput(format!("invalid base64 image: {e}")))?;
    if data.is_empty() {
        return Err(AppError::InvalidInput("base64Image is empty".to_string()));
    }
    Ok(InlineImage { mime_type, data })
}
