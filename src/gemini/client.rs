//! Thin HTTP client for the Gemini `generateContent` endpoints.
//!
//! Two call shapes share one request/parse skeleton:
//! - `generate_image` posts an inline photo plus an edit prompt to the image
//!   model and extracts inline image bytes or a refusal reason.
//! - `generate_structured` posts a photo plus an analysis prompt with a
//!   response schema to the text model and parses the constrained JSON reply.
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::Config;
use crate::credits::{GenerationReply, GenerationService, InlineImage};
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    image_model: String,
    text_model: String,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Self {
        GeminiClient {
            client: Client::new(),
            base_url: config.gemini_url.trim_end_matches('/').to_string(),
            api_key: config.gemini_api_key.clone(),
            image_model: config.gemini_image_model.clone(),
            text_model: config.gemini_text_model.clone(),
        }
    }

    fn require_key(&self) -> AppResult<&str> {
        if self.api_key.is_empty() {
            return Err(AppError::ConfigurationError(
                "GEMINI_API_KEY is not set".to_string(),
            ));
        }
        Ok(&self.api_key)
    }

    async fn post_generate_content(&self, model: &str, body: Value) -> AppResult<Value> {
        let key = self.require_key()?;
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model);
        tracing::debug!("calling Gemini at {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", key)
            .json(&body)
            .send()
            .await
            .map_err(AppError::HttpClient)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_string());
            let message = format!("Gemini returned {status}: {error_body}");
            tracing::error!("{}", message);
            return Err(AppError::GenerationServiceError(message));
        }

        response.json().await.map_err(AppError::HttpClient)
    }

    /// Send an image plus edit prompt to the image model.
    ///
    /// Distinguishes three non-error shapes: an inline image part, an explicit
    /// safety stop (prompt block or finish reason), and a success envelope
    /// carrying neither.
    pub async fn generate_image(
        &self,
        image: &InlineImage,
        prompt: &str,
    ) -> AppResult<GenerationReply> {
        let body = request_body(image, prompt, None);
        let reply = self.post_generate_content(&self.image_model, body).await?;

        if let Some((mime_type, data)) = extract_inline_image(&reply) {
            let bytes = BASE64
                .decode(data)
                .map_err(|e| AppError::MalformedUpstreamJson(format!("bad image payload: {e}")))?;
            return Ok(GenerationReply::Image(InlineImage {
                mime_type,
                data: bytes,
            }));
        }
        if let Some(reason) = extract_refusal(&reply) {
            tracing::warn!("Gemini declined generation: {}", reason);
            return Ok(GenerationReply::Refusal(reason));
        }
        Ok(GenerationReply::Empty)
    }

    /// Send an image plus analysis prompt to the text model, constrained to
    /// `schema`, and return the parsed JSON object.
    pub async fn generate_structured(
        &self,
        image: &InlineImage,
        prompt: &str,
        schema: Value,
    ) -> AppResult<Value> {
        let body = request_body(image, prompt, Some(schema));
        let reply = self.post_generate_content(&self.text_model, body).await?;

        let text = extract_text(&reply).ok_or(AppError::EmptyResult)?;
        serde_json::from_str(&text)
            .map_err(|e| AppError::MalformedUpstreamJson(format!("{e}: {text}")))
    }
}

#[async_trait::async_trait]
impl GenerationService for GeminiClient {
    async fn generate(&self, image: &InlineImage, prompt: &str) -> AppResult<GenerationReply> {
        self.generate_image(image, prompt).await
    }
}

fn request_body(image: &InlineImage, prompt: &str, schema: Option<Value>) -> Value {
    let mut body = json!({
        "contents": [{
            "parts": [
                {
                    "inlineData": {
                        "mimeType": image.mime_type,
                        "data": BASE64.encode(&image.data),
                    }
                },
                { "text": prompt },
            ]
        }]
    });
    if let Some(schema) = schema {
        body["generationConfig"] = json!({
            "responseMimeType": "application/json",
            "responseSchema": schema,
        });
    }
    body
}

fn candidate_parts(reply: &Value) -> Option<&Vec<Value>> {
    reply
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
}

fn extract_inline_image(reply: &Value) -> Option<(String, String)> {
    for part in candidate_parts(reply)? {
        let Some(inline) = part.get("inlineData").or_else(|| part.get("inline_data")) else {
            continue;
        };
        let Some(data) = inline.get("data").and_then(|d| d.as_str()) else {
            continue;
        };
        if data.is_empty() {
            continue;
        }
        let mime_type = inline
            .get("mimeType")
            .or_else(|| inline.get("mime_type"))
            .and_then(|m| m.as_str())
            .unwrap_or("image/png");
        return Some((mime_type.to_string(), data.to_string()));
    }
    None
}

fn extract_refusal(reply: &Value) -> Option<String> {
    if let Some(reason) = reply
        .pointer("/promptFeedback/blockReason")
        .and_then(|r| r.as_str())
    {
        return Some(reason.to_string());
    }
    let finish = reply
        .pointer("/candidates/0/finishReason")
        .and_then(|f| f.as_str())?;
    match finish {
        "SAFETY" | "IMAGE_SAFETY" | "PROHIBITED_CONTENT" | "RECITATION" | "BLOCKLIST" => {
            Some(finish.to_string())
        }
        _ => None,
    }
}

fn extract_text(reply: &Value) -> Option<String> {
    for part in candidate_parts(reply)? {
        if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
            if !text.is_empty() {
                return Some(text.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;

    use super::*;

    fn test_client(base_url: &str) -> GeminiClient {
        GeminiClient::new(&Config {
            gemini_url: base_url.to_string(),
            gemini_api_key: "test-key".to_string(),
            gemini_image_model: "image-model".to_string(),
            gemini_text_model: "text-model".to_string(),
            auth_url: String::new(),
            database_path: String::new(),
            api_host: String::new(),
            api_port: String::new(),
        })
    }

    fn photo() -> InlineImage {
        InlineImage {
            mime_type: "image/jpeg".to_string(),
            data: vec![0xff, 0xd8, 0xff, 0xe0],
        }
    }

    #[tokio::test]
    async fn image_success_decodes_inline_payload() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1beta/models/image-model:generateContent")
                    .header("x-goog-api-key", "test-key");
                then.status(200).json_body(serde_json::json!({
                    "candidates": [{
                        "content": { "parts": [
                            { "inlineData": { "mimeType": "image/png", "data": BASE64.encode([9u8, 8, 7]) } }
                        ]},
                        "finishReason": "STOP"
                    }]
                }));
            })
            .await;

        let client = test_client(&server.base_url());
        let reply = client.generate_image(&photo(), "buzz cut").await.unwrap();
        mock.assert_async().await;
        match reply {
            GenerationReply::Image(image) => {
                assert_eq!(image.mime_type, "image/png");
                assert_eq!(image.data, vec![9, 8, 7]);
            }
            other => panic!("expected image, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn safety_finish_reason_is_a_refusal() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200).json_body(serde_json::json!({
                    "candidates": [{ "finishReason": "SAFETY" }]
                }));
            })
            .await;

        let client = test_client(&server.base_url());
        let reply = client.generate_image(&photo(), "p").await.unwrap();
        assert!(matches!(reply, GenerationReply::Refusal(reason) if reason == "SAFETY"));
    }

    #[tokio::test]
    async fn empty_candidates_are_an_empty_reply() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200).json_body(serde_json::json!({ "candidates": [] }));
            })
            .await;

        let client = test_client(&server.base_url());
        let reply = client.generate_image(&photo(), "p").await.unwrap();
        assert!(matches!(reply, GenerationReply::Empty));
    }

    #[tokio::test]
    async fn non_success_status_is_a_service_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(503).body("overloaded");
            })
            .await;

        let client = test_client(&server.base_url());
        let err = client.generate_image(&photo(), "p").await.unwrap_err();
        assert!(matches!(err, AppError::GenerationServiceError(msg) if msg.contains("503")));
    }

    #[tokio::test]
    async fn missing_api_key_is_a_configuration_error() {
        let mut client = test_client("http://localhost:1");
        client.api_key.clear();
        let err = client.generate_image(&photo(), "p").await.unwrap_err();
        assert!(matches!(err, AppError::ConfigurationError(_)));
    }

    #[tokio::test]
    async fn structured_reply_parses_schema_constrained_json() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1beta/models/text-model:generateContent");
                then.status(200).json_body(serde_json::json!({
                    "candidates": [{
                        "content": { "parts": [
                            { "text": "{\"faceShape\":\"oval\",\"confidence\":0.91,\"reasoning\":\"balanced proportions\"}" }
                        ]}
                    }]
                }));
            })
            .await;

        let client = test_client(&server.base_url());
        let value = client
            .generate_structured(&photo(), "classify", crate::prompt::builder::face_shape_schema())
            .await
            .unwrap();
        assert_eq!(value["faceShape"], "oval");
        assert_eq!(value["confidence"], 0.91);
    }

    #[tokio::test]
    async fn unparsable_structured_text_is_malformed_upstream_json() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200).json_body(serde_json::json!({
                    "candidates": [{ "content": { "parts": [{ "text": "not json" }] } }]
                }));
            })
            .await;

        let client = test_client(&server.base_url());
        let err = client
            .generate_structured(&photo(), "classify", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MalformedUpstreamJson(_)));
    }

    #[tokio::test]
    async fn structured_reply_without_text_is_empty_result() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200).json_body(serde_json::json!({
                    "candidates": [{ "content": { "parts": [] } }]
                }));
            })
            .await;

        let client = test_client(&server.base_url());
        let err = client
            .generate_structured(&photo(), "classify", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::EmptyResult));
    }
}
