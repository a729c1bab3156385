//! `ContextModel` backed by a raw chat-completion [`Provider`].

use async_trait::async_trait;
use filescope_config::AppConfig;
use filescope_core::error::ProviderError;
use filescope_core::message::Message;
use filescope_core::model::{Completion, ContextModel, Prompt};
use filescope_core::provider::{Provider, ProviderRequest};
use std::sync::Arc;
use tracing::debug;

/// Model name and sampling settings for one capability.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl CallSettings {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

pub struct ProviderModel {
    provider: Arc<dyn Provider>,
    summarize: CallSettings,
    select: CallSettings,
    judge: CallSettings,
}

impl ProviderModel {
    /// Use `model` for every capability.
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        let settings = CallSettings::new(model);
        Self {
            provider,
            summarize: settings.clone(),
            select: settings.clone(),
            judge: settings.with_max_tokens(8),
        }
    }

    /// Per-capability models and limits from configuration.
    pub fn from_config(provider: Arc<dyn Provider>, config: &AppConfig) -> Self {
        Self {
            provider,
            summarize: CallSettings::new(config.summarizer_model()).with_max_tokens(512),
            select: CallSettings::new(config.selection_model())
                .with_temperature(config.selection.temperature)
                .with_max_tokens(config.selection.max_tokens),
            judge: CallSettings::new(config.arbiter_model()).with_max_tokens(8),
        }
    }

    async fn call(
        &self,
        settings: &CallSettings,
        prompt: &Prompt,
        capability: &'static str,
    ) -> Result<Completion, ProviderError> {
        let request = ProviderRequest {
            model: settings.model.clone(),
            messages: vec![
                Message::system(prompt.system.as_str()),
                Message::user(prompt.user.as_str()),
            ],
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        };

        let response = self.provider.complete(request).await?;
        let tokens_used = response.usage.map(|u| u.total_tokens).unwrap_or(0);
        debug!(
            provider = self.provider.name(),
            model = %response.model,
            capability,
            tokens_used,
            "Model call completed"
        );
        Ok(Completion::new(response.message.text(), tokens_used))
    }
}

#[async_trait]
impl ContextModel for ProviderModel {
    async fn summarize(&self, prompt: &Prompt) -> Result<Completion, ProviderError> {
        self.call(&self.summarize, prompt, "summarize").await
    }

    async fn select_files(&self, prompt: &Prompt) -> Result<Completion, ProviderError> {
        self.call(&self.select, prompt, "select_files").await
    }

    async fn judge_similarity(&self, prompt: &Prompt) -> Result<Completion, ProviderError> {
        self.call(&self.judge, prompt, "judge_similarity").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filescope_core::message::Role;
    use filescope_core::provider::{ProviderResponse, Usage};
    use std::sync::Mutex;

    /// Records requests and answers with a fixed text.
    struct RecordingProvider {
        requests: Mutex<Vec<ProviderRequest>>,
        usage: Option<Usage>,
    }

    impl RecordingProvider {
        fn new(usage: Option<Usage>) -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                usage,
            }
        }
    }

    #[async_trait]
    impl Provider for RecordingProvider {
        fn name(&self) -> &str {
            "recording"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            let model = request.model.clone();
            self.requests.lock().unwrap().push(request);
            Ok(ProviderResponse {
                message: Message::assistant("1"),
                usage: self.usage,
                model,
            })
        }
    }

    #[tokio::test]
    async fn prompt_becomes_system_and_user_messages() {
        let provider = Arc::new(RecordingProvider::new(Some(Usage {
            prompt_tokens: 90,
            completion_tokens: 10,
            total_tokens: 100,
        })));
        let model = ProviderModel::new(provider.clone(), "gpt-4o-mini");

        let completion = model
            .judge_similarity(&Prompt::new("judge", "candidates"))
            .await
            .unwrap();
        assert_eq!(completion.text, "1");
        assert_eq!(completion.tokens_used, 100);

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests[0].messages[0].role, Role::System);
        assert_eq!(requests[0].messages[1].text(), "candidates");
        assert_eq!(requests[0].max_tokens, Some(8));
    }

    #[tokio::test]
    async fn config_selects_models_per_capability() {
        let mut config = AppConfig::default();
        config.default_model = "base-model".into();
        config.selection.model = Some("selector".into());
        config.selection.max_tokens = 2048;

        let provider = Arc::new(RecordingProvider::new(None));
        let model = ProviderModel::from_config(provider.clone(), &config);

        let completion = model.select_files(&Prompt::new("s", "u")).await.unwrap();
        assert_eq!(completion.tokens_used, 0);
        model.summarize(&Prompt::new("s", "u")).await.unwrap();

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests[0].model, "selector");
        assert_eq!(requests[0].max_tokens, Some(2048));
        assert_eq!(requests[1].model, "base-model");
    }
}
