// Remote media service boundary - prompt enhancement, image analysis, generation

use super::types::{ImagePayload, StudioConfig};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::debug;

/// A derive call producing intermediate text from raw input
#[derive(Debug, Clone, PartialEq)]
pub enum DeriveRequest {
    Enhance { text: String },
    Analyze { image: ImagePayload },
}

/// The final call producing an image artifact
#[derive(Debug, Clone, PartialEq)]
pub enum GenerateRequest {
    FromPrompt { approved_prompt: String },
    FromAnalysis { analysis: String },
}

/// Startup availability probe result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Availability {
    pub ready: bool,
}

/// Errors from the remote media service.
///
/// `Api` carries the backend's error message verbatim; the other variants
/// wrap transport and decoding failures with a generic prefix.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected response: {0}")]
    Parse(String),

    #[error("Image decode error: {0}")]
    Decode(String),
}

/// External boundary consumed by both pipelines
#[async_trait]
pub trait MediaService: Send + Sync {
    /// Enhance a text prompt or describe an uploaded image
    async fn derive(&self, request: DeriveRequest) -> Result<String, ServiceError>;

    /// Produce an image from an approved prompt or an analysis
    async fn generate(&self, request: GenerateRequest) -> Result<ImagePayload, ServiceError>;

    /// Queried once at startup; affects only initial presentation status
    async fn check_availability(&self) -> Result<Availability, ServiceError>;
}

/// HTTP implementation talking to the media backend
pub struct HttpMediaService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMediaService {
    pub fn new(config: &StudioConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ServiceError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(path, "issuing media service request");

        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error)
                .unwrap_or_else(|| format!("request failed with status {}", status));
            return Err(ServiceError::Api(message));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ServiceError::Parse(e.to_string()))
    }
}

#[async_trait]
impl MediaService for HttpMediaService {
    async fn derive(&self, request: DeriveRequest) -> Result<String, ServiceError> {
        let body = match request {
            DeriveRequest::Enhance { text } => DeriveBody::Enhance { text_prompt: text },
            DeriveRequest::Analyze { image } => DeriveBody::Analyze {
                base64_image: BASE64.encode(&image.bytes),
                mime_type: image.mime_type,
            },
        };

        let response: DeriveResult = self.post_json("/api/enhance-and-analyze", &body).await?;
        Ok(response.result)
    }

    async fn generate(&self, request: GenerateRequest) -> Result<ImagePayload, ServiceError> {
        let response: GenerateResult = match request {
            GenerateRequest::FromPrompt { approved_prompt } => {
                self.post_json("/api/generate-image", &GenerateImageBody { approved_prompt })
                    .await?
            }
            GenerateRequest::FromAnalysis { analysis } => {
                self.post_json(
                    "/api/generate-variation",
                    &GenerateVariationBody { image_analysis: analysis },
                )
                .await?
            }
        };

        let bytes = BASE64
            .decode(&response.image)
            .map_err(|e| ServiceError::Decode(e.to_string()))?;

        // The backend always renders PNG
        Ok(ImagePayload::new(bytes, "image/png"))
    }

    async fn check_availability(&self) -> Result<Availability, ServiceError> {
        let response = self
            .client
            .get(format!("{}/api/test-key", self.base_url))
            .send()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        let body: TestKeyResult = response
            .json()
            .await
            .map_err(|e| ServiceError::Parse(e.to_string()))?;

        Ok(Availability {
            ready: body.gemini_key_set,
        })
    }
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum DeriveBody {
    #[serde(rename_all = "camelCase")]
    Enhance { text_prompt: String },
    #[serde(rename_all = "camelCase")]
    Analyze {
        base64_image: String,
        mime_type: String,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateImageBody {
    approved_prompt: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateVariationBody {
    image_analysis: String,
}

#[derive(Deserialize)]
struct DeriveResult {
    result: String,
}

#[derive(Deserialize)]
struct GenerateResult {
    image: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TestKeyResult {
    gemini_key_set: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_enhance_body_wire_format() {
        let body = DeriveBody::Enhance {
            text_prompt: "a cat".to_string(),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value, json!({"type": "enhance", "textPrompt": "a cat"}));
    }

    #[test]
    fn test_analyze_body_wire_format() {
        let body = DeriveBody::Analyze {
            base64_image: "aGk=".to_string(),
            mime_type: "image/png".to_string(),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            json!({"type": "analyze", "base64Image": "aGk=", "mimeType": "image/png"})
        );
    }

    #[test]
    fn test_generate_bodies_wire_format() {
        let value = serde_json::to_value(GenerateImageBody {
            approved_prompt: "p".to_string(),
        })
        .unwrap();
        assert_eq!(value, json!({"approvedPrompt": "p"}));

        let value = serde_json::to_value(GenerateVariationBody {
            image_analysis: "a".to_string(),
        })
        .unwrap();
        assert_eq!(value, json!({"imageAnalysis": "a"}));
    }

    #[test]
    fn test_api_error_message_is_verbatim() {
        let err = ServiceError::Api("quota exceeded".to_string());
        assert_eq!(err.to_string(), "quota exceeded");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = StudioConfig {
            endpoint: "http://localhost:3001/".to_string(),
            ..Default::default()
        };
        let service = HttpMediaService::new(&config);
        assert_eq!(service.base_url(), "http://localhost:3001");
    }
}
