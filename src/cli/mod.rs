use clap::Parser;
use std::time::Duration;

use crate::llm::{ LlmConfig, LlmType, RequestShape };

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat completion (groq, openai, ollama)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "groq")]
    pub chat_llm_type: LlmType,

    /// Base URL for the Chat LLM provider API (e.g., http://localhost:11434 for Ollama)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let adapters handle defaults if None
    pub chat_base_url: Option<String>,

    /// API Key for the Chat LLM provider (Groq, OpenAI)
    #[arg(long, env = "CHAT_API_KEY", default_value = "")]
    pub chat_api_key: String,

    /// Model name for chat completion (e.g., llama-3.3-70b-versatile, gpt-4o-mini)
    #[arg(long, env = "CHAT_MODEL")] // No default, rely on adapter defaults if None
    pub chat_model: Option<String>,

    /// Sampling temperature passed to the completion backend.
    #[arg(long, env = "CHAT_TEMPERATURE", default_value = "0.7")]
    pub chat_temperature: f32,

    /// Upper bound on completion tokens. 0 leaves it to the provider.
    #[arg(long, env = "CHAT_MAX_TOKENS", default_value = "1024")]
    pub chat_max_tokens: u32,

    // --- Conversation Args ---
    /// What each completion request carries: `single` (latest user input) or `messages` (full history).
    #[arg(long, env = "REQUEST_SHAPE", default_value = "single")]
    pub request_shape: RequestShape,

    /// Seconds to wait for a completion before answering with the refusal message.
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "60")]
    pub request_timeout_secs: u64,

    /// Optional path to a system prompt file. The bundled prompt is used when unset.
    #[arg(long, env = "PROMPT_PATH")]
    pub prompt_path: Option<String>,

    /// Maximum number of HTTP conversations kept in memory.
    #[arg(long, env = "MAX_CONVERSATIONS", default_value = "1000")]
    pub max_conversations: usize,

    // --- General App Args ---
    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,

    /// Host address and port for the WebSocket server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Port for the HTTP API server.
    #[arg(long, env = "HTTP_PORT", default_value = "4001")]
    pub http_port: u16,

    /// Optional API Key required for clients. If set, clients must provide it as `X-API-Key` or `api_key`.
    #[arg(long, env = "SERVER_API_KEY")]
    pub server_api_key: Option<String>,
}

impl Args {
    pub fn llm_config(&self) -> LlmConfig {
        LlmConfig {
            llm_type: self.chat_llm_type,
            api_key: Some(self.chat_api_key.clone()).filter(|k| !k.trim().is_empty()),
            completion_model: self.chat_model.clone(),
            base_url: self.chat_base_url.clone(),
            temperature: self.chat_temperature,
            max_tokens: self.chat_max_tokens,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn api_key(&self) -> Option<&str> {
        self.server_api_key.as_deref().filter(|k| !k.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_select_groq_and_single_shape() {
        let args = Args::try_parse_from(["carebridge"]).unwrap();
        assert_eq!(args.request_shape, RequestShape::Single);
        assert_eq!(args.request_timeout(), Duration::from_secs(60));
        assert_eq!(args.http_port, 4001);
    }

    #[test]
    fn flags_flow_into_llm_config() {
        let args = Args::try_parse_from([
            "carebridge",
            "--chat-llm-type",
            "ollama",
            "--chat-model",
            "llama3.2",
            "--chat-api-key",
            "  ",
            "--request-shape",
            "messages",
        ]).unwrap();
        let config = args.llm_config();
        assert_eq!(config.llm_type, LlmType::Ollama);
        assert_eq!(config.completion_model.as_deref(), Some("llama3.2"));
        assert_eq!(config.api_key, None);
        assert_eq!(args.request_shape, RequestShape::Messages);
    }

    #[test]
    fn unknown_provider_is_rejected() {
        assert!(Args::try_parse_from(["carebridge", "--chat-llm-type", "anthropic"]).is_err());
    }
}
