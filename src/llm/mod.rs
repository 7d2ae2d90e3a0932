pub mod chat;

use serde::{ Deserialize, Serialize };
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmType {
    Groq,
    OpenAI,
    Ollama,
}

impl fmt::Display for LlmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LlmType::Groq => "groq",
            LlmType::OpenAI => "openai",
            LlmType::Ollama => "ollama",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ParseConfigValueError {
    message: String,
}

impl FromStr for LlmType {
    type Err = ParseConfigValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "groq" => Ok(LlmType::Groq),
            "openai" => Ok(LlmType::OpenAI),
            "ollama" => Ok(LlmType::Ollama),
            _ =>
                Err(ParseConfigValueError {
                    message: format!("Invalid LLM type: '{}'", s),
                }),
        }
    }
}

/// What the completion backend receives on each turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestShape {
    /// System prompt followed by the whole conversation so far.
    Messages,
    /// System prompt plus the latest user input only.
    Single,
}

impl fmt::Display for RequestShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestShape::Messages => write!(f, "messages"),
            RequestShape::Single => write!(f, "single"),
        }
    }
}

impl FromStr for RequestShape {
    type Err = ParseConfigValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "messages" | "history" => Ok(RequestShape::Messages),
            "single" | "user-input" => Ok(RequestShape::Single),
            _ =>
                Err(ParseConfigValueError {
                    message: format!("Invalid request shape: '{}'", s),
                }),
        }
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM configuration error: {0}")]
    Config(String),
    #[error("LLM transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{provider} API returned {status}: {body}")]
    Status {
        provider: LlmType,
        status: u16,
        body: String,
    },
    #[error("No response content from {0} API")]
    EmptyResponse(LlmType),
    #[error("Completion timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub llm_type: LlmType,
    pub api_key: Option<String>,
    pub completion_model: Option<String>,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            llm_type: LlmType::Groq,
            api_key: None,
            completion_model: None,
            base_url: None,
            temperature: 0.7,
            max_tokens: 1024,
        }
    }
}
