use std::fmt::{self, Debug, Formatter};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use base64ct::{Base64, Encoding};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use super::{AiClient, ImageInput};
use crate::config::GeminiConfig;

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
    Other(serde_json::Value),
}

#[derive(Debug, Serialize, Deserialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Google Gemini `generateContent` client.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("build gemini http client")?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        )
    }

    fn build_request(prompt: &str, image: Option<&ImageInput>) -> GenerateRequest {
        let mut parts = vec![Part::Text {
            text: prompt.to_string(),
        }];
        if let Some(img) = image {
            parts.push(Part::InlineData {
                inline_data: InlineData {
                    mime_type: img.mime_type.clone(),
                    data: Base64::encode_string(&img.data),
                },
            });
        }
        GenerateRequest {
            contents: vec![Content {
                role: Some("user".into()),
                parts,
            }],
        }
    }

    fn response_text(response: GenerateResponse) -> anyhow::Result<String> {
        if let Some(err) = response.error {
            anyhow::bail!("gemini error: {}", err.message);
        }
        let text: String = response
            .candidates
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| match p {
                        Part::Text { text } => Some(text),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();
        anyhow::ensure!(!text.trim().is_empty(), "gemini returned no text");
        Ok(text)
    }
}

#[async_trait]
impl AiClient for GeminiClient {
    #[instrument(skip(self, prompt, image), fields(model = %self.model, with_image = image.is_some()))]
    async fn generate(&self, prompt: &str, image: Option<&ImageInput>) -> anyhow::Result<String> {
        let body = Self::build_request(prompt, image);
        debug!("sending generateContent request");

        let response = self
            .client
            .post(self.url())
            .json(&body)
            .send()
            .await
            .context("gemini request")?;

        let status = response.status();
        let raw = response.text().await.context("read gemini response")?;
        if !status.is_success() {
            let message = serde_json::from_str::<GenerateResponse>(&raw)
                .ok()
                .and_then(|r| r.error)
                .map_or(raw, |e| e.message);
            error!(%status, "gemini api error");
            anyhow::bail!("gemini api error ({status}): {message}");
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&raw).context("decode gemini response")?;
        Self::response_text(parsed)
    }
}

impl Debug for GeminiClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod gemini_tests {
    use super::*;
    use bytes::Bytes;
    use serde_json::json;

    fn config() -> GeminiConfig {
        GeminiConfig {
            api_key: "secret".into(),
            model: "gemini-2.0-flash".into(),
            base_url: "https://example.test/v1beta/".into(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn url_includes_model_and_key() {
        let client = GeminiClient::new(&config()).unwrap();
        assert_eq!(
            client.url(),
            "https://example.test/v1beta/models/gemini-2.0-flash:generateContent?key=secret"
        );
    }

    #[test]
    fn debug_output_hides_api_key() {
        let client = GeminiClient::new(&config()).unwrap();
        let out = format!("{client:?}");
        assert!(!out.contains("secret"));
        assert!(out.contains("REDACTED"));
    }

    #[test]
    fn request_carries_inline_image() {
        let image = ImageInput {
            data: Bytes::from_static(b"abc"),
            mime_type: "image/png".into(),
        };
        let body = serde_json::to_value(GeminiClient::build_request("describe", Some(&image)))
            .unwrap();
        assert_eq!(
            body,
            json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        {"text": "describe"},
                        {"inline_data": {"mime_type": "image/png", "data": "YWJj"}}
                    ]
                }]
            })
        );
    }

    #[test]
    fn response_text_joins_text_parts() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "{\"a\":"}, {"text": "1}"}]}}]
        }))
        .unwrap();
        assert_eq!(GeminiClient::response_text(response).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn empty_candidates_are_an_error() {
        let response: GenerateResponse =
            serde_json::from_value(json!({"candidates": []})).unwrap();
        assert!(GeminiClient::response_text(response).is_err());
    }

    #[test]
    fn api_error_message_is_surfaced() {
        let response: GenerateResponse =
            serde_json::from_value(json!({"error": {"message": "quota exceeded"}})).unwrap();
        let err = GeminiClient::response_text(response).unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }
}
