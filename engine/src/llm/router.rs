//! Reasoning router
//!
//! Holds the configured providers and fails over between them. The configured
//! default provider is always tried first; remaining providers follow in
//! registration order. Each attempt is bounded by a timeout so a hung backend
//! cannot stall the caller forever.
//!
//! The router is the engine's [`ReasoningService`] implementation: it folds
//! the optional structured context into the prompt and returns the raw
//! completion text.

use super::{LLMError, LLMProvider, Message, ReasoningService};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

/// Timeout for a single provider attempt
const PROVIDER_TIMEOUT_SECS: u64 = 120;

/// Router that selects and fails over between reasoning providers
pub struct ReasoningRouter {
    /// Available providers, in registration order
    providers: Vec<Box<dyn LLMProvider>>,

    /// Name of the provider to try first
    default_provider: String,
}

impl ReasoningRouter {
    /// Create a new router
    pub fn new(providers: Vec<Box<dyn LLMProvider>>, default_provider: impl Into<String>) -> Self {
        Self {
            providers,
            default_provider: default_provider.into(),
        }
    }

    /// Providers in attempt order: the default first, the rest as registered
    fn ordered(&self) -> Vec<&dyn LLMProvider> {
        let mut ordered: Vec<&dyn LLMProvider> = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            if provider.name() == self.default_provider {
                ordered.insert(0, provider.as_ref());
            } else {
                ordered.push(provider.as_ref());
            }
        }
        ordered
    }

    /// Generate a completion with automatic failover
    ///
    /// Returns the completion text and the name of the provider that served
    /// it. Fails with `ProviderUnavailable` once every provider has been
    /// tried.
    pub async fn generate(&self, messages: &[Message]) -> super::Result<(String, String)> {
        if self.providers.is_empty() {
            return Err(LLMError::ProviderUnavailable(
                "No reasoning providers configured".to_string(),
            ));
        }

        for provider in self.ordered() {
            debug!("Attempting provider: {}", provider.name());

            let result = tokio::time::timeout(
                Duration::from_secs(PROVIDER_TIMEOUT_SECS),
                provider.generate(messages),
            )
            .await;

            match result {
                Ok(Ok(content)) => {
                    debug!("Provider {} succeeded", provider.name());
                    return Ok((content, provider.name().to_string()));
                }
                Ok(Err(e)) => {
                    warn!("Provider {} failed: {}", provider.name(), e);
                }
                Err(_) => {
                    warn!(
                        "Provider {} timed out after {}s",
                        provider.name(),
                        PROVIDER_TIMEOUT_SECS
                    );
                }
            }
        }

        warn!("All reasoning providers exhausted");
        Err(LLMError::ProviderUnavailable(
            "All reasoning providers failed".to_string(),
        ))
    }

    /// Check the health of all registered providers
    /// Returns a list of (provider_name, is_healthy)
    pub async fn check_health(&self) -> Vec<(&str, bool)> {
        let mut results = Vec::new();
        for provider in &self.providers {
            let is_healthy = provider.check_health().await;
            results.push((provider.name(), is_healthy));
        }
        results
    }
}

#[async_trait]
impl ReasoningService for ReasoningRouter {
    async fn complete(&self, prompt: &str, context: Option<&serde_json::Value>) -> super::Result<String> {
        let content = match context {
            Some(ctx) => {
                let rendered =
                    serde_json::to_string_pretty(ctx).unwrap_or_else(|_| ctx.to_string());
                format!("{}\n\nContext:\n{}", prompt, rendered)
            }
            None => prompt.to_string(),
        };

        let (response, _provider) = self.generate(&[Message::user(content)]).await?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Provider double with a fixed outcome
    struct StubProvider {
        name: String,
        response: Option<String>,
    }

    impl StubProvider {
        fn ok(name: &str, response: &str) -> Self {
            Self {
                name: name.to_string(),
                response: Some(response.to_string()),
            }
        }

        fn failing(name: &str) -> Self {
            Self {
                name: name.to_string(),
                response: None,
            }
        }
    }

    #[async_trait]
    impl LLMProvider for StubProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn generate(&self, _messages: &[Message]) -> crate::llm::Result<String> {
            match &self.response {
                Some(r) => Ok(r.clone()),
                None => Err(LLMError::NetworkError("connection refused".to_string())),
            }
        }
    }

    #[tokio::test]
    async fn test_no_providers_is_unavailable() {
        let router = ReasoningRouter::new(vec![], "openai");
        let result = router.generate(&[Message::user("hi")]).await;
        assert!(matches!(result, Err(LLMError::ProviderUnavailable(_))));
    }

    #[tokio::test]
    async fn test_default_provider_tried_first() {
        let providers: Vec<Box<dyn LLMProvider>> = vec![
            Box::new(StubProvider::ok("openai", "from openai")),
            Box::new(StubProvider::ok("anthropic", "from anthropic")),
        ];
        let router = ReasoningRouter::new(providers, "anthropic");

        let (content, provider) = router.generate(&[Message::user("hi")]).await.unwrap();
        assert_eq!(content, "from anthropic");
        assert_eq!(provider, "anthropic");
    }

    #[tokio::test]
    async fn test_failover_to_next_provider() {
        let providers: Vec<Box<dyn LLMProvider>> = vec![
            Box::new(StubProvider::failing("openai")),
            Box::new(StubProvider::ok("anthropic", "backup answer")),
        ];
        let router = ReasoningRouter::new(providers, "openai");

        let (content, provider) = router.generate(&[Message::user("hi")]).await.unwrap();
        assert_eq!(content, "backup answer");
        assert_eq!(provider, "anthropic");
    }

    #[tokio::test]
    async fn test_all_providers_failing() {
        let providers: Vec<Box<dyn LLMProvider>> = vec![
            Box::new(StubProvider::failing("openai")),
            Box::new(StubProvider::failing("anthropic")),
        ];
        let router = ReasoningRouter::new(providers, "openai");

        let result = router.generate(&[Message::user("hi")]).await;
        assert!(matches!(result, Err(LLMError::ProviderUnavailable(_))));
    }

    #[tokio::test]
    async fn test_complete_folds_context_into_prompt() {
        struct CapturingProvider;

        #[async_trait]
        impl LLMProvider for CapturingProvider {
            fn name(&self) -> &str {
                "capture"
            }

            async fn generate(&self, messages: &[Message]) -> crate::llm::Result<String> {
                Ok(messages[0].content.clone())
            }
        }

        let router = ReasoningRouter::new(vec![Box::new(CapturingProvider)], "capture");
        let context = serde_json::json!({"channel": "email"});

        let echoed = router.complete("Draft a reply", Some(&context)).await.unwrap();
        assert!(echoed.starts_with("Draft a reply"));
        assert!(echoed.contains("Context:"));
        assert!(echoed.contains("email"));

        let plain = router.complete("Draft a reply", None).await.unwrap();
        assert_eq!(plain, "Draft a reply");
    }
}
