//! Chat-completion narrative generator
//!
//! Speaks the OpenAI-style `/chat/completions` protocol (OpenAI and local
//! servers) and the Anthropic `/messages` protocol. The provider is chosen
//! once at startup by [`resolve_narrator`].

use async_trait::async_trait;
use icdkg_common::config::NarrativeConfig;
use icdkg_engine::explain::narrative::{NarrativeError, NoNarrative};
use icdkg_engine::NarrativeGenerator;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("icdkg/", env!("CARGO_PKG_VERSION"));
const MAX_TOKENS: u32 = 1000;
const TEMPERATURE: f64 = 0.7;
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Anthropic,
    Local,
}

impl Provider {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(Provider::OpenAi),
            "anthropic" => Some(Provider::Anthropic),
            "local" => Some(Provider::Local),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Local => "local",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com/v1",
            Provider::Anthropic => "https://api.anthropic.com/v1",
            Provider::Local => "http://localhost:8000/v1",
        }
    }

    fn requires_key(self) -> bool {
        !matches!(self, Provider::Local)
    }
}

pub struct ChatNarrator {
    http_client: reqwest::Client,
    provider: Provider,
    model: String,
    api_key: Option<String>,
    base_url: String,
}

impl ChatNarrator {
    pub fn new(
        provider: Provider,
        model: impl Into<String>,
        api_key: Option<String>,
        base_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, NarrativeError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| NarrativeError::Request(e.to_string()))?;

        let base_url = base_url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| provider.default_base_url().to_string());

        Ok(Self {
            http_client,
            provider,
            model: model.into(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn endpoint(&self) -> String {
        match self.provider {
            Provider::Anthropic => format!("{}/messages", self.base_url),
            Provider::OpenAi | Provider::Local => format!("{}/chat/completions", self.base_url),
        }
    }

    /// Request body for the configured protocol
    pub fn request_body(&self, prompt: &str, system_prompt: &str) -> Value {
        match self.provider {
            Provider::Anthropic => {
                let mut body = json!({
                    "model": self.model,
                    "max_tokens": MAX_TOKENS,
                    "messages": [{"role": "user", "content": prompt}],
                });
                if !system_prompt.is_empty() {
                    body["system"] = json!(system_prompt);
                }
                body
            }
            Provider::OpenAi | Provider::Local => {
                let mut messages = Vec::new();
                if !system_prompt.is_empty() {
                    messages.push(json!({"role": "system", "content": system_prompt}));
                }
                messages.push(json!({"role": "user", "content": prompt}));
                json!({
                    "model": self.model,
                    "messages": messages,
                    "temperature": TEMPERATURE,
                    "max_tokens": MAX_TOKENS,
                })
            }
        }
    }
}

/// Pull the generated text out of a provider reply
pub fn reply_text(provider: Provider, body: &Value) -> Result<String, NarrativeError> {
    let text = match provider {
        Provider::Anthropic => body.pointer("/content/0/text"),
        Provider::OpenAi | Provider::Local => body.pointer("/choices/0/message/content"),
    };
    text.and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| NarrativeError::Response(format!("no text in {} reply", provider.name())))
}

#[async_trait]
impl NarrativeGenerator for ChatNarrator {
    fn name(&self) -> &str {
        self.provider.name()
    }

    async fn generate(&self, prompt: &str, system_prompt: &str) -> Result<String, NarrativeError> {
        let mut request = self
            .http_client
            .post(self.endpoint())
            .json(&self.request_body(prompt, system_prompt));

        request = match (self.provider, &self.api_key) {
            (Provider::Anthropic, Some(key)) => request
                .header("x-api-key", key)
                .header("anthropic-version", ANTHROPIC_VERSION),
            (Provider::Anthropic, None) => request.header("anthropic-version", ANTHROPIC_VERSION),
            (_, Some(key)) => request.bearer_auth(key),
            (_, None) => request,
        };

        debug!(provider = self.provider.name(), model = %self.model, "Requesting narrative");

        let response = request
            .send()
            .await
            .map_err(|e| NarrativeError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(NarrativeError::Request(format!("HTTP {}: {}", status.as_u16(), error_text)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| NarrativeError::Response(e.to_string()))?;
        reply_text(self.provider, &body)
    }
}

/// Pick the narrative strategy for this process
///
/// Anything that cannot produce a working generator (provider "none",
/// an unknown provider, a hosted provider without key) resolves to
/// [`NoNarrative`].
pub fn resolve_narrator(config: &NarrativeConfig) -> Arc<dyn NarrativeGenerator> {
    let requested = config.provider.trim();
    if requested.is_empty() || requested.eq_ignore_ascii_case("none") {
        info!("Narrative generation disabled");
        return Arc::new(NoNarrative);
    }

    let Some(provider) = Provider::parse(requested) else {
        warn!("Unknown narrative provider {:?}; narratives disabled", requested);
        return Arc::new(NoNarrative);
    };

    let api_key = config.api_key.clone().filter(|k| !k.trim().is_empty());
    if provider.requires_key() && api_key.is_none() {
        warn!("No API key for narrative provider {}; narratives disabled", provider.name());
        return Arc::new(NoNarrative);
    }

    match ChatNarrator::new(
        provider,
        config.model.clone(),
        api_key,
        config.base_url.clone(),
        Duration::from_secs(config.timeout_secs),
    ) {
        Ok(narrator) => {
            info!(
                "Narrative provider {} ({}) at {}",
                provider.name(),
                config.model,
                narrator.endpoint()
            );
            Arc::new(narrator)
        }
        Err(e) => {
            warn!("Narrative client setup failed: {}; narratives disabled", e);
            Arc::new(NoNarrative)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: &str, api_key: Option<&str>) -> NarrativeConfig {
        NarrativeConfig {
            provider: provider.to_string(),
            api_key: api_key.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_narrator() {
        assert_eq!(resolve_narrator(&config("none", None)).name(), "none");
        assert_eq!(resolve_narrator(&config("openai", None)).name(), "none");
        assert_eq!(resolve_narrator(&config("anthropic", Some(" "))).name(), "none");
        assert_eq!(resolve_narrator(&config("mystery", Some("key"))).name(), "none");
        assert_eq!(resolve_narrator(&config("OpenAI", Some("key"))).name(), "openai");
        assert_eq!(resolve_narrator(&config("local", None)).name(), "local");
    }

    #[test]
    fn test_endpoints() {
        let timeout = Duration::from_secs(5);
        let openai = ChatNarrator::new(Provider::OpenAi, "gpt-4", None, None, timeout).unwrap();
        assert_eq!(openai.endpoint(), "https://api.openai.com/v1/chat/completions");

        let anthropic = ChatNarrator::new(Provider::Anthropic, "claude", None, None, timeout).unwrap();
        assert_eq!(anthropic.endpoint(), "https://api.anthropic.com/v1/messages");

        let local = ChatNarrator::new(
            Provider::Local,
            "llama",
            None,
            Some("http://127.0.0.1:9000/v1/".to_string()),
            timeout,
        )
        .unwrap();
        assert_eq!(local.endpoint(), "http://127.0.0.1:9000/v1/chat/completions");
    }

    #[test]
    fn test_request_bodies() {
        let timeout = Duration::from_secs(5);
        let openai = ChatNarrator::new(Provider::OpenAi, "gpt-4", None, None, timeout).unwrap();
        let body = openai.request_body("why 410?", "be brief");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "why 410?");
        assert_eq!(body["model"], "gpt-4");

        let anthropic = ChatNarrator::new(Provider::Anthropic, "claude", None, None, timeout).unwrap();
        let body = anthropic.request_body("why 410?", "be brief");
        assert_eq!(body["system"], "be brief");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_reply_text() {
        let openai = json!({"choices": [{"message": {"role": "assistant", "content": "Because."}}]});
        assert_eq!(reply_text(Provider::OpenAi, &openai).unwrap(), "Because.");

        let anthropic = json!({"content": [{"type": "text", "text": "Because."}]});
        assert_eq!(reply_text(Provider::Anthropic, &anthropic).unwrap(), "Because.");

        assert!(matches!(
            reply_text(Provider::Local, &json!({"error": "busy"})),
            Err(NarrativeError::Response(_))
        ));
    }
}
