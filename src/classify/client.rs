//! The generative-model boundary.

use std::future::Future;

use crate::error::ModelCallError;

/// One text-completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub prompt: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A black-box text completion service.
///
/// Implementations return the raw response text; nothing about its shape
/// is trusted downstream.
pub trait ModelClient: Send + Sync {
    fn complete(
        &self,
        request: &ModelRequest,
    ) -> impl Future<Output = Result<String, ModelCallError>> + Send;
}

#[cfg(feature = "gemini")]
pub use gemini::GeminiClient;

#[cfg(feature = "gemini")]
mod gemini {
    use std::time::Duration;

    use reqwest::header::RETRY_AFTER;
    use reqwest::StatusCode;
    use serde::Deserialize;

    use super::{ModelClient, ModelRequest};
    use crate::error::{Error, ModelCallError, Result};

    const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct GenerateResponse {
        #[serde(default)]
        candidates: Vec<Candidate>,
        prompt_feedback: Option<PromptFeedback>,
    }

    #[derive(Debug, Deserialize)]
    struct Candidate {
        content: Option<Content>,
    }

    #[derive(Debug, Deserialize)]
    struct Content {
        #[serde(default)]
        parts: Vec<Part>,
    }

    #[derive(Debug, Deserialize)]
    struct Part {
        text: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct PromptFeedback {
        block_reason: Option<String>,
    }

    /// Client for the Gemini `generateContent` endpoint.
    #[derive(Debug, Clone)]
    pub struct GeminiClient {
        http: reqwest::Client,
        api_key: String,
        base_url: String,
        timeout: Duration,
    }

    impl GeminiClient {
        pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
            let api_key = api_key.into();
            if api_key.trim().is_empty() {
                return Err(Error::Config(format!(
                    "no API key configured (set {} or pass --api-key)",
                    crate::config::API_KEY_ENV
                )));
            }
            let http = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;
            Ok(Self {
                http,
                api_key,
                base_url: DEFAULT_BASE_URL.to_string(),
                timeout,
            })
        }

        /// Point the client at another endpoint root.
        pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
            self.base_url = url.into();
            self
        }

        fn url(&self, model: &str) -> String {
            format!(
                "{}/models/{}:generateContent",
                self.base_url.trim_end_matches('/'),
                model
            )
        }
    }

    impl ModelClient for GeminiClient {
        async fn complete(
            &self,
            request: &ModelRequest,
        ) -> std::result::Result<String, ModelCallError> {
            let body = serde_json::json!({
                "contents": [{ "parts": [{ "text": request.prompt }] }],
                "generationConfig": {
                    "temperature": request.temperature,
                    "maxOutputTokens": request.max_tokens,
                }
            });

            log::debug!(
                "POST {} ({} prompt chars)",
                self.url(&request.model),
                request.prompt.chars().count()
            );

            let response = self
                .http
                .post(self.url(&request.model))
                .query(&[("key", self.api_key.as_str())])
                .json(&body)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        ModelCallError::Timeout(self.timeout)
                    } else {
                        ModelCallError::Network(e.to_string())
                    }
                })?;

            let status = response.status();
            if !status.is_success() {
                let retry_after = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .map(Duration::from_secs);
                let text = response.text().await.unwrap_or_default();
                return Err(match status {
                    StatusCode::TOO_MANY_REQUESTS => ModelCallError::RateLimited { retry_after },
                    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ModelCallError::Auth(text),
                    _ => ModelCallError::Http {
                        status: status.as_u16(),
                        body: text,
                    },
                });
            }

            let text = response
                .text()
                .await
                .map_err(|e| ModelCallError::Network(e.to_string()))?;
            extract_text(&text)
        }
    }

    /// Concatenated text parts of the first candidate.
    fn extract_text(body: &str) -> std::result::Result<String, ModelCallError> {
        let parsed: GenerateResponse = serde_json::from_str(body)
            .map_err(|e| ModelCallError::InvalidResponse(e.to_string()))?;

        let text: String = parsed
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.iter().filter_map(|p| p.text.as_deref()).collect())
            .unwrap_or_default();

        if text.is_empty() {
            let reason = parsed
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no text candidate".to_string());
            return Err(ModelCallError::InvalidResponse(reason));
        }
        Ok(text)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_extract_text_joins_parts() {
            let body = r#"{"candidates":[{"content":{"parts":[{"text":"{\"risks\":"},{"text":" []}"}]}}]}"#;
            assert_eq!(extract_text(body).unwrap(), r#"{"risks": []}"#);
        }

        #[test]
        fn test_extract_text_blocked() {
            let body = r#"{"candidates":[],"promptFeedback":{"blockReason":"SAFETY"}}"#;
            assert_eq!(
                extract_text(body),
                Err(ModelCallError::InvalidResponse("SAFETY".to_string()))
            );
        }

        #[test]
        fn test_missing_key_rejected() {
            assert!(GeminiClient::new("  ", Duration::from_secs(5)).is_err());
        }

        #[test]
        fn test_url() {
            let client = GeminiClient::new("k", Duration::from_secs(5))
                .unwrap()
                .with_base_url("http://localhost:9000/v1beta/");
            assert_eq!(
                client.url("gemini-1.5-flash"),
                "http://localhost:9000/v1beta/models/gemini-1.5-flash:generateContent"
            );
        }
    }
}
