//! AI/OCR advisory client
//!
//! Every operation is one JSON POST to the configured endpoint, tagged with
//! an `operation` field. Compression advice never fails: any problem yields
//! the configured fallback quality.

use crate::config::AiConfig;
use crate::error::{ServiceError, ServiceResult};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use pdfworks_core::compress::DocumentStats;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
enum AiRequest<'a> {
    Summarize {
        text: &'a str,
    },
    Translate {
        text: &'a str,
        target_language: &'a str,
    },
    ExtractKeyInfo {
        text: &'a str,
    },
    Ocr {
        /// Base64 image bytes
        image: String,
        mime_type: &'a str,
    },
    RecommendCompression {
        size_bytes: usize,
        page_count: u32,
        bytes_per_page: u64,
    },
}

impl AiRequest<'_> {
    fn name(&self) -> &'static str {
        match self {
            AiRequest::Summarize { .. } => "summarize",
            AiRequest::Translate { .. } => "translate",
            AiRequest::ExtractKeyInfo { .. } => "extract_key_info",
            AiRequest::Ocr { .. } => "ocr",
            AiRequest::RecommendCompression { .. } => "recommend_compression",
        }
    }
}

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    summary: String,
}

#[derive(Debug, Deserialize)]
struct TranslationResponse {
    translation: String,
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
struct CompressionResponse {
    quality: f64,
}

/// Facts pulled out of a document's text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyInfo {
    pub title: Option<String>,
    pub dates: Vec<String>,
    pub people: Vec<String>,
    pub organizations: Vec<String>,
    pub amounts: Vec<String>,
    pub key_points: Vec<String>,
}

pub struct AiClient {
    client: Client,
    config: AiConfig,
}

impl AiClient {
    /// The HTTP client is supplied by the caller so connection pools can be shared
    pub fn new(client: Client, config: AiConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    async fn call<T: DeserializeOwned>(&self, request: &AiRequest<'_>) -> ServiceResult<T> {
        let endpoint = self
            .config
            .endpoint
            .as_deref()
            .ok_or_else(|| ServiceError::ServiceUnavailable("No AI endpoint configured".into()))?;

        let mut builder = self
            .client
            .post(endpoint)
            .timeout(Duration::from_secs(self.config.request_timeout_secs))
            .json(request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        debug!("AI request: {}", request.name());
        let response = builder
            .send()
            .await
            .map_err(|e| ServiceError::ServiceUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ServiceError::ServiceUnavailable(format!(
                "{} returned {}: {}",
                request.name(),
                status.as_u16(),
                message.trim()
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))
    }

    pub async fn summarize(&self, text: &str) -> ServiceResult<String> {
        require_text(text)?;
        let response: SummaryResponse = self.call(&AiRequest::Summarize { text }).await?;
        Ok(response.summary)
    }

    pub async fn translate(&self, text: &str, target_language: &str) -> ServiceResult<String> {
        require_text(text)?;
        if target_language.trim().is_empty() {
            return Err(ServiceError::InvalidInput("A target language is required".into()));
        }
        let response: TranslationResponse = self
            .call(&AiRequest::Translate {
                text,
                target_language,
            })
            .await?;
        Ok(response.translation)
    }

    pub async fn extract_key_info(&self, text: &str) -> ServiceResult<KeyInfo> {
        require_text(text)?;
        self.call(&AiRequest::ExtractKeyInfo { text }).await
    }

    /// Recognize text in a PNG or JPEG image
    pub async fn ocr(&self, image: &[u8], mime_type: &str) -> ServiceResult<String> {
        if image.is_empty() {
            return Err(ServiceError::InvalidInput("Image is empty".into()));
        }
        let response: OcrResponse = self
            .call(&AiRequest::Ocr {
                image: BASE64.encode(image),
                mime_type,
            })
            .await?;
        Ok(response.text)
    }

    /// Recommended JPEG quality percentage for rasterized compression
    pub async fn recommend_compression(&self, stats: &DocumentStats) -> f64 {
        let request = AiRequest::RecommendCompression {
            size_bytes: stats.size_bytes,
            page_count: stats.page_count,
            bytes_per_page: stats.bytes_per_page(),
        };
        let fallback = self.config.fallback_compression_quality;
        match self.call::<CompressionResponse>(&request).await {
            Ok(r) if r.quality.is_finite() && r.quality > 0.0 => r.quality,
            Ok(r) => {
                warn!("Ignoring compression advice {}; using {}", r.quality, fallback);
                fallback
            }
            Err(e) => {
                warn!("Compression advice unavailable ({}); using {}", e, fallback);
                fallback
            }
        }
    }
}

fn require_text(text: &str) -> ServiceResult<()> {
    if text.trim().is_empty() {
        return Err(ServiceError::InvalidInput("Text is empty".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_request_is_tagged_by_operation() {
        let json = serde_json::to_value(AiRequest::Translate {
            text: "hola",
            target_language: "en",
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"operation": "translate", "text": "hola", "target_language": "en"})
        );
    }

    #[test]
    fn test_key_info_tolerates_missing_fields() {
        let info: KeyInfo = serde_json::from_str(r#"{"dates":["2024-01-01"]}"#).unwrap();
        assert_eq!(info.dates, vec!["2024-01-01".to_string()]);
        assert!(info.people.is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_client() {
        let client = AiClient::new(Client::new(), AiConfig::default());
        assert!(matches!(
            client.summarize("some text").await,
            Err(ServiceError::ServiceUnavailable(_))
        ));
        assert!(matches!(
            client.summarize("   ").await,
            Err(ServiceError::InvalidInput(_))
        ));
        let stats = DocumentStats {
            size_bytes: 1000,
            page_count: 1,
        };
        assert_eq!(client.recommend_compression(&stats).await, 70.0);
    }
}
