use crate::providers::schema::extract_json_from_text;
use crate::providers::{AnalysisProvider, ProviderError, RawResult};
use anyhow::Result;
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Chat-completion provider for OpenAI and any OpenAI-compatible endpoint.
pub struct OpenAIProvider {
    id: String,
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
}

impl OpenAIProvider {
    /// Hosted OpenAI. Falls back to `OPENAI_API_KEY` when no key is given.
    pub fn new(
        id: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        base_url: Option<String>,
    ) -> Result<Self> {
        let api_key = match api_key {
            Some(key) => key,
            None => std::env::var("OPENAI_API_KEY")
                .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?,
        };

        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(url) = base_url {
            config = config.with_api_base(url);
        }

        Ok(Self::with_client(id, Client::with_config(config), model))
    }

    /// Self-hosted OpenAI-compatible server; no key required.
    pub fn local(id: impl Into<String>, endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key("local")
            .with_api_base(endpoint.into());
        Self::with_client(id, Client::with_config(config), model)
    }

    fn with_client(id: impl Into<String>, client: Client<OpenAIConfig>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            client,
            model: model.into(),
            temperature: 0.2,
            max_tokens: 4000,
            max_retries: 3,
        }
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    fn build_messages(
        instructions: &str,
        target: &str,
    ) -> Result<Vec<ChatCompletionRequestMessage>, ProviderError> {
        let system = ChatCompletionRequestSystemMessageArgs::default()
            .content(instructions.to_string())
            .build()
            .map_err(|e| ProviderError::ApiError(e.to_string()))?;
        let user = ChatCompletionRequestUserMessageArgs::default()
            .content(format!(
                "Analyze the following contract:\n\n```solidity\n{}\n```",
                target
            ))
            .build()
            .map_err(|e| ProviderError::ApiError(e.to_string()))?;
        Ok(vec![system.into(), user.into()])
    }
}

#[async_trait]
impl AnalysisProvider for OpenAIProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn invoke(
        &self,
        target: &str,
        instructions: &str,
        time_budget: Duration,
    ) -> Result<RawResult, ProviderError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(Self::build_messages(instructions, target)?)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(|e| ProviderError::ApiError(e.to_string()))?;

        debug!(provider = %self.id, model = %self.model, "Sending chat completion request");

        let started = Instant::now();
        let mut attempt = 0;
        let response = loop {
            attempt += 1;
            match self.client.chat().create(request.clone()).await {
                Ok(response) => break response,
                Err(e) => {
                    let message = e.to_string();
                    warn!(provider = %self.id, attempt, "OpenAI API error: {}", message);

                    let rate_limited = message.to_lowercase().contains("rate");
                    if attempt >= self.max_retries {
                        return Err(if rate_limited {
                            ProviderError::RateLimitExceeded
                        } else {
                            ProviderError::ApiError(message)
                        });
                    }

                    let wait = if rate_limited {
                        Duration::from_secs(2_u64.pow(attempt))
                    } else {
                        Duration::from_millis(100 * attempt as u64)
                    };
                    if started.elapsed() + wait >= time_budget {
                        return Err(ProviderError::Timeout(time_budget.as_secs()));
                    }
                    tokio::time::sleep(wait).await;
                }
            }
        };

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| ProviderError::InvalidResponse("No content in response".to_string()))?;

        let json = extract_json_from_text(&content).ok_or_else(|| {
            ProviderError::InvalidResponse("No JSON object in model output".to_string())
        })?;
        let payload: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        Ok(RawResult::new(payload).with_model(response.model))
    }

    fn model_name(&self) -> Option<&str> {
        Some(&self.model)
    }
}
