use std::collections::HashMap;
use std::env;
use std::time::Duration;

use log::debug;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{CompletionClient, CompletionRequest, LlmError, Message};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Where and how to reach one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub name: String,
    pub api_key: Option<String>,
    pub api_url: String,
}

impl ProviderSettings {
    /// Reads `<PROVIDER>_API_KEY` and `<PROVIDER>_API_URL`. Known providers
    /// have a default URL; others must set it.
    pub fn from_env(provider: &str) -> Result<Self, LlmError> {
        let prefix = provider.to_ascii_uppercase().replace('-', "_");
        let key_var = format!("{prefix}_API_KEY");
        let url_var = format!("{prefix}_API_URL");
        let api_key = env::var(&key_var).ok().filter(|k| !k.is_empty());
        let api_url = match env::var(&url_var) {
            Ok(url) if !url.is_empty() => url,
            _ => default_url(provider).map(str::to_string)
                                      .ok_or_else(|| LlmError::MissingSetting { provider: provider.to_string(),
                                                                               var: url_var.clone() })?,
        };
        if api_key.is_none() && requires_key(provider) {
            return Err(LlmError::MissingSetting { provider: provider.to_string(),
                                                 var: key_var });
        }
        Ok(Self { name: provider.to_string(),
                  api_key,
                  api_url })
    }
}

fn default_url(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some("https://api.openai.com/v1"),
        "openrouter" => Some("https://openrouter.ai/api/v1"),
        "ollama" => Some("http://localhost:11434/v1"),
        _ => None,
    }
}

fn requires_key(provider: &str) -> bool {
    provider != "ollama"
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Message,
}

/// Blocking client for OpenAI-compatible `/chat/completions` endpoints.
#[derive(Debug, Clone)]
pub struct HttpCompletionClient {
    http: Client,
    providers: HashMap<String, ProviderSettings>,
}

impl HttpCompletionClient {
    pub fn new() -> Result<Self, LlmError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, LlmError> {
        let http = Client::builder().timeout(timeout)
                                    .build()
                                    .map_err(|e| LlmError::RequestFailed(e.to_string()))?;
        Ok(Self { http,
                  providers: HashMap::new() })
    }

    /// Registers explicit settings; providers not registered are read from
    /// the environment on use.
    pub fn provider(mut self, settings: ProviderSettings) -> Self {
        self.providers.insert(settings.name.clone(), settings);
        self
    }

    fn settings(&self, provider: &str) -> Result<ProviderSettings, LlmError> {
        match self.providers.get(provider) {
            Some(s) => Ok(s.clone()),
            None => ProviderSettings::from_env(provider),
        }
    }
}

impl CompletionClient for HttpCompletionClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let settings = self.settings(&request.provider)?;
        let url = format!("{}/chat/completions", settings.api_url.trim_end_matches('/'));
        let body = ChatRequest { model: &request.model,
                                 messages: vec![Message::user(request.prompt.clone())],
                                 response_format: request.json.then(|| json!({"type": "json_object"})) };
        debug!("POST {url} model={}", request.model);

        let mut call = self.http.post(&url).json(&body);
        if let Some(key) = &settings.api_key {
            call = call.bearer_auth(key);
        }
        let response = call.send().map_err(|e| LlmError::RequestFailed(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LlmError::Status { status: status.as_u16(),
                                          body });
        }
        let parsed: ChatResponse = response.json().map_err(|e| LlmError::Parse(e.to_string()))?;
        parsed.choices
              .into_iter()
              .next()
              .map(|c| c.message.content)
              .ok_or_else(|| LlmError::Parse("response has no choices".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_without_url_is_an_error() {
        let err = ProviderSettings::from_env("no-such-provider-xyz").unwrap_err();
        assert!(err.to_string().contains("NO_SUCH_PROVIDER_XYZ_API_URL"));
    }

    #[test]
    fn registered_provider_is_used_before_env() {
        let settings = ProviderSettings { name: "local".into(),
                                          api_key: None,
                                          api_url: "http://127.0.0.1:9/v1".into() };
        let client = HttpCompletionClient::new().unwrap().provider(settings.clone());
        assert_eq!(client.settings("local").unwrap(), settings);
    }
}
