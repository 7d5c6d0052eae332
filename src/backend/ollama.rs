use super::{BackendError, GenerateReply, ModelBackend};
use async_trait::async_trait;

use crate::config::ModelConfig;

/// Model backend speaking the Ollama generate API.
pub struct OllamaBackend {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaBackend {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        Self::new(config.base_url.clone(), config.model.clone())
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ModelBackend for OllamaBackend {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<GenerateReply, BackendError> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        let response = self
            .client
            .post(self.generate_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            // Surface any error detail the server embeds in the body.
            if let Ok(value) = response.json::<serde_json::Value>().await {
                if let Some(message) = value
                    .get("error")
                    .or_else(|| value.get("message"))
                    .and_then(|v| v.as_str())
                {
                    return Err(BackendError::Malformed(format!(
                        "{} ({})",
                        message,
                        status.as_u16()
                    )));
                }
            }
            return Err(BackendError::Status(status.as_u16()));
        }

        let reply: GenerateReply = response
            .json()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))?;
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_url_normalizes_trailing_slash() {
        let backend = OllamaBackend::new("http://localhost:11434/", "gemma3:27b");
        assert_eq!(backend.generate_url(), "http://localhost:11434/api/generate");
    }

    #[test]
    fn test_reply_parses_with_optional_metadata() {
        let raw = r#"{"response": "hello", "model": "gemma3:27b", "total_duration": 123, "eval_count": 7}"#;
        let reply: GenerateReply = serde_json::from_str(raw).unwrap();
        assert_eq!(reply.response, "hello");
        assert_eq!(reply.eval_count, Some(7));

        let bare = r#"{"response": "hi"}"#;
        let reply: GenerateReply = serde_json::from_str(bare).unwrap();
        assert!(reply.model.is_none());
    }
}
