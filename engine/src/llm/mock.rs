//! Mock reasoning backends
//!
//! `MockProvider` is the offline degradation path: a provider that answers
//! with a canned acknowledgement instead of calling a real API, so the whole
//! pipeline stays runnable without credentials. `ScriptedReasoner` is the
//! test double used throughout the engine's unit tests — it replays a fixed
//! sequence of completions and records the prompts it was asked.

use super::{LLMError, LLMProvider, Message, MessageRole, ReasoningService};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Provider that produces canned responses without any network access
pub struct MockProvider;

#[async_trait]
impl LLMProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, messages: &[Message]) -> super::Result<String> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        let preview: String = last_user.chars().take(120).collect();
        Ok(format!(
            "[mock response] No reasoning provider is configured. Request was: {}",
            preview
        ))
    }
}

/// Test double that replays a fixed sequence of completions
///
/// Each `complete` call pops the next scripted response; an exhausted script
/// is a loud error so tests fail at the point of the unexpected extra call.
/// Prompts are recorded for assertions.
#[derive(Default)]
pub struct ScriptedReasoner {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedReasoner {
    /// Create a reasoner that replays `responses` in order
    pub fn new<S: Into<String>>(responses: Vec<S>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Create a reasoner with an empty script: every call fails
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Prompts received so far, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts lock").clone()
    }

    /// Number of scripted responses not yet consumed
    pub fn remaining(&self) -> usize {
        self.responses.lock().expect("responses lock").len()
    }
}

#[async_trait]
impl ReasoningService for ScriptedReasoner {
    async fn complete(
        &self,
        prompt: &str,
        _context: Option<&serde_json::Value>,
    ) -> super::Result<String> {
        self.prompts
            .lock()
            .expect("prompts lock")
            .push(prompt.to_string());

        self.responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .ok_or_else(|| LLMError::ProviderUnavailable("script exhausted".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_provider_echoes_request() {
        let provider = MockProvider;
        let response = provider
            .generate(&[Message::user("Summarize the quarterly numbers")])
            .await
            .unwrap();

        assert!(response.contains("[mock response]"));
        assert!(response.contains("quarterly numbers"));
    }

    #[tokio::test]
    async fn test_scripted_reasoner_replays_in_order() {
        let reasoner = ScriptedReasoner::new(vec!["first", "second"]);

        assert_eq!(reasoner.complete("a", None).await.unwrap(), "first");
        assert_eq!(reasoner.complete("b", None).await.unwrap(), "second");
        assert_eq!(reasoner.prompts(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_scripted_reasoner_exhaustion_is_an_error() {
        let reasoner = ScriptedReasoner::new(vec!["only"]);

        reasoner.complete("a", None).await.unwrap();
        let err = reasoner.complete("b", None).await;
        assert!(matches!(err, Err(LLMError::ProviderUnavailable(_))));
    }
}
