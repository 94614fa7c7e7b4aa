use crate::config::{AiConfig, AiProvider};
use crate::types::{ConfigError, EnrichmentError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

const SUMMARIZE_PROMPT: &str = "You summarize news articles. Write a neutral summary of two to three sentences. Output only the summary.";
const POLISH_PROMPT: &str = "You are a copy editor. Rewrite the article text as clean, well-structured prose in the same language. Keep every fact, add nothing, drop navigation or advertising remnants. Output only the rewritten text.";

/// AI text operations used for enrichment.
#[async_trait]
pub trait LlmAdapter: Send + Sync {
    fn adapter_name(&self) -> String;

    async fn summarize(&self, text: &str) -> Result<String, EnrichmentError>;

    async fn translate(&self, text: &str, target_language: &str) -> Result<String, EnrichmentError>;

    /// Style normalization of article text.
    async fn polish(&self, text: &str) -> Result<String, EnrichmentError>;
}

/// Adapter for any OpenAI-compatible chat completions endpoint.
pub struct OpenAiAdapter {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiAdapter {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(5).min(timeout))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, EnrichmentError> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: Option<String>,
        }

        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: system,
                },
                Msg {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.2,
        };

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(EnrichmentError::Status {
                status: status.as_u16(),
            });
        }

        let body: Resp = resp.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(EnrichmentError::EmptyResponse);
        }
        Ok(content)
    }
}

#[async_trait]
impl LlmAdapter for OpenAiAdapter {
    fn adapter_name(&self) -> String {
        format!("openai:{}", self.model)
    }

    async fn summarize(&self, text: &str) -> Result<String, EnrichmentError> {
        self.complete(SUMMARIZE_PROMPT, text).await
    }

    async fn translate(&self, text: &str, target_language: &str) -> Result<String, EnrichmentError> {
        let system = format!(
            "You are a news translator. Translate the text into {}. Preserve names and numbers. Output only the translation.",
            target_language
        );
        self.complete(&system, text).await
    }

    async fn polish(&self, text: &str) -> Result<String, EnrichmentError> {
        self.complete(POLISH_PROMPT, text).await
    }
}

/// Deterministic offline adapter for local runs and tests.
pub struct MockLlmAdapter {
    name: String,
    response_delay_ms: u64,
}

impl MockLlmAdapter {
    pub fn new(name: String) -> Self {
        Self {
            name,
            response_delay_ms: 0,
        }
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.response_delay_ms = delay_ms;
        self
    }

    async fn simulate_processing(&self) {
        if self.response_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.response_delay_ms)).await;
        }
    }
}

#[async_trait]
impl LlmAdapter for MockLlmAdapter {
    fn adapter_name(&self) -> String {
        format!("mock:{}", self.name)
    }

    async fn summarize(&self, text: &str) -> Result<String, EnrichmentError> {
        self.simulate_processing().await;

        // Extractive: first two sentences.
        let sentences: Vec<&str> = text
            .split_inclusive(['.', '!', '?'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .take(2)
            .collect();
        if sentences.is_empty() {
            return Err(EnrichmentError::EmptyResponse);
        }
        Ok(sentences.join(" "))
    }

    async fn translate(&self, text: &str, target_language: &str) -> Result<String, EnrichmentError> {
        self.simulate_processing().await;
        Ok(format!("[{}] {}", target_language, text))
    }

    async fn polish(&self, text: &str) -> Result<String, EnrichmentError> {
        self.simulate_processing().await;
        let polished = crate::utils::text::collapse_whitespace(text);
        if polished.is_empty() {
            return Err(EnrichmentError::EmptyResponse);
        }
        Ok(polished)
    }
}

enum Task<'a> {
    Summarize(&'a str),
    Translate(&'a str, &'a str),
    Polish(&'a str),
}

impl Task<'_> {
    fn name(&self) -> &'static str {
        match self {
            Task::Summarize(_) => "summarize",
            Task::Translate(..) => "translate",
            Task::Polish(_) => "polish",
        }
    }
}

/// Adapters tried in order for every call; the first success wins.
///
/// An empty chain means AI enrichment is disabled.
pub struct EnrichmentChain {
    adapters: Vec<Box<dyn LlmAdapter>>,
    call_timeout: Duration,
}

impl EnrichmentChain {
    pub fn new(call_timeout: Duration) -> Self {
        Self {
            adapters: Vec::new(),
            call_timeout,
        }
    }

    pub fn disabled() -> Self {
        Self::new(Duration::from_secs(1))
    }

    /// Build the chain described by `config`: one adapter per configured model, in order.
    pub fn from_config(config: &AiConfig, user_agent: &str) -> Result<Self, ConfigError> {
        let timeout = Duration::from_secs(config.timeout_seconds);
        let mut chain = Self::new(timeout);

        match config.provider {
            AiProvider::Mock => {
                chain.register_adapter(Box::new(MockLlmAdapter::new("offline".to_string())));
            }
            AiProvider::OpenAi => {
                let Some(api_key) = config.api_key.as_deref() else {
                    info!("No AI credentials configured; enrichment will use fallback text");
                    return Ok(chain);
                };
                for model in &config.models {
                    let adapter = OpenAiAdapter::new(&config.base_url, api_key, model, timeout, user_agent)
                        .map_err(|e| ConfigError::Invalid {
                            key: "AI_BASE_URL",
                            message: e.to_string(),
                        })?;
                    chain.register_adapter(Box::new(adapter));
                }
            }
        }
        Ok(chain)
    }

    pub fn register_adapter(&mut self, adapter: Box<dyn LlmAdapter>) {
        info!("Registering LLM adapter: {}", adapter.adapter_name());
        self.adapters.push(adapter);
    }

    pub fn with_adapter(mut self, adapter: Box<dyn LlmAdapter>) -> Self {
        self.register_adapter(adapter);
        self
    }

    pub fn is_enabled(&self) -> bool {
        !self.adapters.is_empty()
    }

    pub fn adapter_names(&self) -> Vec<String> {
        self.adapters.iter().map(|a| a.adapter_name()).collect()
    }

    pub async fn summarize(&self, text: &str) -> Result<String, EnrichmentError> {
        self.first_success(Task::Summarize(text)).await
    }

    pub async fn translate(&self, text: &str, target_language: &str) -> Result<String, EnrichmentError> {
        self.first_success(Task::Translate(text, target_language)).await
    }

    pub async fn polish(&self, text: &str) -> Result<String, EnrichmentError> {
        self.first_success(Task::Polish(text)).await
    }

    async fn first_success(&self, task: Task<'_>) -> Result<String, EnrichmentError> {
        if self.adapters.is_empty() {
            return Err(EnrichmentError::Disabled);
        }

        let mut last_error = None;
        for adapter in &self.adapters {
            let call = async {
                match &task {
                    Task::Summarize(text) => adapter.summarize(text).await,
                    Task::Translate(text, lang) => adapter.translate(text, lang).await,
                    Task::Polish(text) => adapter.polish(text).await,
                }
            };
            let result = match tokio::time::timeout(self.call_timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(EnrichmentError::Timeout {
                    seconds: self.call_timeout.as_secs(),
                }),
            };

            match result {
                Ok(output) => {
                    debug!(adapter = %adapter.adapter_name(), task = task.name(), "AI call succeeded");
                    return Ok(output);
                }
                Err(e) => {
                    warn!(adapter = %adapter.adapter_name(), task = task.name(), error = %e, "AI call failed, trying next adapter");
                    last_error = Some(e);
                }
            }
        }

        Err(EnrichmentError::Exhausted {
            attempted: self.adapters.len(),
            last: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }
}
