use std::fmt;

use crate::error::{PolishError, Result};

pub const DEFAULT_MODEL: &str = "openai/gpt-4o-2024-08-06";

/// Model names accepted on the command line
pub const AVAILABLE_MODELS: &[&str] = &[
    "claude-3-5-sonnet-20240620",
    "openai/gpt-4-turbo-2024-04-09",
    "openai/gpt-4o-2024-08-06",
    "openai/gpt-4o-mini-2024-07-18",
    "openai/gpt-3.5-turbo-0613",
    "deepseek-coder-v2-0724",
    "llama3.1-405b",
    // Anthropic Claude models via Amazon Bedrock
    "bedrock/anthropic.claude-3-sonnet-20240229-v1:0",
    "bedrock/anthropic.claude-3-5-sonnet-20240620-v1:0",
    "bedrock/anthropic.claude-3-haiku-20240307-v1:0",
    "bedrock/anthropic.claude-3-opus-20240229-v1:0",
    // Anthropic Claude models via Vertex AI
    "vertex_ai/claude-3-opus@20240229",
    "vertex_ai/claude-3-5-sonnet@20240620",
    "vertex_ai/claude-3-sonnet@20240229",
    "vertex_ai/claude-3-haiku@20240307",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    Bedrock,
    VertexAi,
    OpenAi,
    DeepSeek,
    OpenRouter,
}

impl Provider {
    /// Base URL for OpenAI-compatible providers that are not OpenAI itself
    pub fn base_url(&self) -> Option<&'static str> {
        match self {
            Provider::DeepSeek => Some("https://api.deepseek.com"),
            Provider::OpenRouter => Some("https://openrouter.ai/api/v1"),
            _ => None,
        }
    }

    /// Environment variables that must be set before the provider can be used
    pub fn required_env(&self) -> &'static [&'static str] {
        match self {
            Provider::DeepSeek => &["DEEPSEEK_API_KEY"],
            Provider::OpenRouter => &["OPENROUTER_API_KEY"],
            _ => &[],
        }
    }

    /// Environment variables read when present
    pub fn optional_env(&self) -> &'static [&'static str] {
        match self {
            Provider::Bedrock => &["AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY", "AWS_REGION_NAME"],
            _ => &[],
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Provider::Anthropic => "Anthropic API",
            Provider::Bedrock => "Amazon Bedrock",
            Provider::VertexAi => "Vertex AI",
            Provider::OpenAi => "OpenAI API",
            Provider::DeepSeek => "DeepSeek (OpenAI-compatible API)",
            Provider::OpenRouter => "OpenRouter (OpenAI-compatible API)",
        };
        f.write_str(name)
    }
}

/// A resolved model: who serves it and the id that provider expects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelChoice {
    pub name: String,
    pub provider: Provider,
    pub client_model: String,
}

impl ModelChoice {
    /// Model id in the coding agent's `provider/model` naming
    pub fn agent_model(&self) -> String {
        match self.provider {
            Provider::DeepSeek => "deepseek/deepseek-coder".to_string(),
            Provider::OpenRouter => format!("openrouter/{}", self.client_model),
            _ => self.client_model.clone(),
        }
    }

    pub fn check_credentials(&self) -> Result<()> {
        self.check_credentials_with(|var| std::env::var(var).ok())
    }

    pub fn check_credentials_with<F>(&self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        for &var in self.provider.required_env() {
            if lookup(var).map_or(true, |v| v.is_empty()) {
                return Err(PolishError::MissingCredential(var));
            }
        }
        Ok(())
    }

    pub fn unset_optional_env_vars(&self) -> Vec<&'static str> {
        self.unset_optional_env(|var| std::env::var(var).ok())
    }

    /// Optional provider variables that `lookup` does not resolve
    pub fn unset_optional_env<F>(&self, lookup: F) -> Vec<&'static str>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.provider
            .optional_env()
            .iter()
            .copied()
            .filter(|var| lookup(var).map_or(true, |v| v.is_empty()))
            .collect()
    }
}

/// Map a human-chosen model name to its provider and provider-specific id
pub fn select_model(name: &str) -> Result<ModelChoice> {
    let last_segment = || name.rsplit('/').next().unwrap_or(name).to_string();

    let (provider, client_model) = if name == "claude-3-5-sonnet-20240620" {
        (Provider::Anthropic, name.to_string())
    } else if name.starts_with("bedrock") && name.contains("claude") {
        (Provider::Bedrock, last_segment())
    } else if name.starts_with("vertex_ai") && name.contains("claude") {
        (Provider::VertexAi, last_segment())
    } else if name.starts_with("openai") && name.contains("gpt") {
        (Provider::OpenAi, last_segment())
    } else if name == "deepseek-coder-v2-0724" {
        (Provider::DeepSeek, name.to_string())
    } else if name == "llama3.1-405b" {
        (Provider::OpenRouter, "meta-llama/llama-3.1-405b-instruct".to_string())
    } else {
        return Err(PolishError::UnsupportedModel(name.to_string()));
    };

    Ok(ModelChoice {
        name: name.to_string(),
        provider,
        client_model,
    })
}
