mod gemini;
pub mod normalize;
pub mod prompts;

use async_trait::async_trait;
use bytes::Bytes;

pub use gemini::GeminiClient;
pub use normalize::{extract_json, NormalizeError, ParsedRecord};

/// Image attached to a prompt.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub data: Bytes,
    pub mime_type: String,
}

/// Single synchronous text (optionally text + image) completion.
///
/// Implementations return the model's raw text; nothing about its structure is
/// promised, which is why every caller pipes it through [`extract_json`].
#[async_trait]
pub trait AiClient: Send + Sync {
    async fn generate(&self, prompt: &str, image: Option<&ImageInput>) -> anyhow::Result<String>;
}
