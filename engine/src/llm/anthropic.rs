use super::{LLMError, LLMProvider, Message, MessageRole};
use crate::config::AnthropicConfig;
use async_trait::async_trait;
use serde_json::json;

pub struct AnthropicProvider {
    config: AnthropicConfig,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicConfig) -> Self {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var(&config.api_key_env).ok());
        Self {
            config,
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LLMProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn check_health(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(&self, messages: &[Message]) -> super::Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LLMError::AuthenticationFailed("no API key configured".to_string()))?;

        let url = format!("{}/messages", self.config.base_url);

        // Anthropic takes the system prompt as a top-level field
        let mut system_prompt = String::new();
        let mut api_messages = Vec::new();
        for msg in messages {
            if msg.role == MessageRole::System {
                system_prompt.push_str(&msg.content);
                system_prompt.push('\n');
                continue;
            }
            api_messages.push(json!({
                "role": if msg.role == MessageRole::Assistant { "assistant" } else { "user" },
                "content": msg.content
            }));
        }

        let payload = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "system": system_prompt,
            "messages": api_messages,
        });

        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| LLMError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(LLMError::AuthenticationFailed(text));
            } else if status.as_u16() == 429 {
                return Err(LLMError::RateLimitExceeded);
            } else {
                return Err(LLMError::InvalidRequest(text));
            }
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(e.to_string()))?;

        let content_arr = data
            .get("content")
            .and_then(|c| c.as_array())
            .ok_or_else(|| LLMError::ParseError("No content array in response".to_string()))?;

        let mut full_content = String::new();
        for item in content_arr {
            if let Some(text) = item.get("text").and_then(|t| t.as_str()) {
                full_content.push_str(text);
            }
        }

        Ok(full_content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: String) -> AnthropicConfig {
        AnthropicConfig {
            base_url,
            model: "claude-3-5-sonnet-20241022".to_string(),
            api_key: Some("test-key".to_string()),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            max_tokens: 4000,
        }
    }

    #[tokio::test]
    async fn test_generate_concatenates_content_blocks() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header("x-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [
                    {"type": "text", "text": "Hello"},
                    {"type": "text", "text": ", world"}
                ]
            })))
            .mount(&server)
            .await;

        let provider = AnthropicProvider::new(test_config(server.uri()));
        let result = provider
            .generate(&[
                Message::system("Be terse."),
                Message::user("Say hello"),
            ])
            .await
            .unwrap();

        assert_eq!(result, "Hello, world");
    }

    #[tokio::test]
    async fn test_generate_invalid_request() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad payload"))
            .mount(&server)
            .await;

        let provider = AnthropicProvider::new(test_config(server.uri()));
        let result = provider.generate(&[Message::user("hi")]).await;

        assert!(matches!(result, Err(LLMError::InvalidRequest(_))));
    }
}
