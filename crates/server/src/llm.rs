//! HTTP-backed planner. The conversation runtime only knows the `Planner`
//! trait; this module is where provider wire formats live.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};

use vendy_agent::llm::{Planner, PlannerDecision, PlannerError};
use vendy_agent::tools::ToolRequest;
use vendy_core::config::{LlmConfig, LlmProvider};

const DECISION_FORMAT: &str = "\
Answer with exactly one JSON object and nothing else.
To run a tool: {\"action\":\"tool\",\"name\":\"<tool name>\",\"arguments\":{...}}
To answer the customer: {\"action\":\"reply\",\"text\":\"<message>\"}";

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct HttpPlanner {
    http: reqwest::Client,
    provider: LlmProvider,
    api_key: Option<SecretString>,
    base_url: String,
    model: String,
}

impl HttpPlanner {
    pub fn from_config(config: &LlmConfig) -> Self {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| default_base_url(config.provider).to_owned());
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_default(),
            provider: config.provider,
            api_key: config.api_key.clone(),
            base_url,
            model: config.model.clone(),
        }
    }

    async fn complete(&self, prompt: &str) -> Result<String, PlannerError> {
        match self.provider {
            LlmProvider::OpenAi | LlmProvider::Ollama => self.complete_openai(prompt).await,
            LlmProvider::Anthropic => self.complete_anthropic(prompt).await,
        }
    }

    async fn complete_openai(&self, prompt: &str) -> Result<String, PlannerError> {
        let base = self.base_url.trim_end_matches('/');
        // Ollama serves its OpenAI-compatible API under /v1, but users
        // usually configure the bare host url.
        let url = if self.provider == LlmProvider::Ollama && !base.ends_with("/v1") {
            format!("{base}/v1/chat/completions")
        } else {
            format!("{base}/chat/completions")
        };
        let mut request = self.http.post(url).json(&json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": DECISION_FORMAT },
                { "role": "user", "content": prompt },
            ],
        }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let body = send(request).await?;
        body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| PlannerError::Malformed("completion has no message content".to_owned()))
    }

    async fn complete_anthropic(&self, prompt: &str) -> Result<String, PlannerError> {
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let mut request = self
            .http
            .post(url)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&json!({
                "model": self.model,
                "max_tokens": 512,
                "system": DECISION_FORMAT,
                "messages": [{ "role": "user", "content": prompt }],
            }));
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key.expose_secret());
        }

        let body = send(request).await?;
        body["content"][0]["text"]
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| PlannerError::Malformed("completion has no text content".to_owned()))
    }
}

async fn send(request: reqwest::RequestBuilder) -> Result<Value, PlannerError> {
    let response = request.send().await.map_err(|error| {
        if error.is_timeout() {
            PlannerError::Timeout
        } else {
            PlannerError::Unavailable(error.to_string())
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(PlannerError::Unavailable(format!("provider returned status {status}")));
    }
    response
        .json::<Value>()
        .await
        .map_err(|error| PlannerError::Malformed(error.to_string()))
}

#[async_trait]
impl Planner for HttpPlanner {
    async fn plan(&self, prompt: &str) -> Result<PlannerDecision, PlannerError> {
        let completion = self.complete(prompt).await?;
        parse_decision(&completion)
    }
}

fn default_base_url(provider: LlmProvider) -> &'static str {
    match provider {
        LlmProvider::OpenAi => "https://api.openai.com/v1",
        LlmProvider::Anthropic => "https://api.anthropic.com",
        LlmProvider::Ollama => "http://localhost:11434/v1",
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum RawDecision {
    Tool {
        name: String,
        #[serde(default)]
        arguments: Value,
    },
    Reply {
        text: String,
    },
}

/// Models wrap the JSON in prose or code fences often enough that we cut
/// the decision out of the text instead of parsing it whole.
fn parse_decision(completion: &str) -> Result<PlannerDecision, PlannerError> {
    let start = completion
        .find('{')
        .ok_or_else(|| PlannerError::Malformed("no json object in completion".to_owned()))?;
    let end = completion
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| PlannerError::Malformed("no json object in completion".to_owned()))?;

    let raw: RawDecision = serde_json::from_str(&completion[start..=end])
        .map_err(|error| PlannerError::Malformed(error.to_string()))?;
    Ok(match raw {
        RawDecision::Tool { name, arguments } => {
            PlannerDecision::Call(ToolRequest::new(name, arguments))
        }
        RawDecision::Reply { text } => PlannerDecision::Reply(text),
    })
}
