//! OpenAI-compatible chat endpoints.
//!
//! Same wire format as OpenAI, different base URLs.

use crate::OpenAiProvider;

pub const OPENAI_BASE: &str = "https://api.openai.com/v1";
pub const OPENROUTER_BASE: &str = "https://openrouter.ai/api/v1";
pub const OLLAMA_BASE: &str = "http://localhost:11434/v1";

pub fn openai(api_key: impl Into<String>) -> OpenAiProvider {
    OpenAiProvider::new(api_key, OPENAI_BASE)
}

/// OpenRouter multi-model router
pub fn openrouter(api_key: impl Into<String>) -> OpenAiProvider {
    OpenAiProvider::new(api_key, OPENROUTER_BASE)
}

pub fn ollama() -> OpenAiProvider {
    ollama_with_base(OLLAMA_BASE)
}

/// Ollama ignores the key but the header is still sent.
pub fn ollama_with_base(base_url: impl Into<String>) -> OpenAiProvider {
    OpenAiProvider::new("ollama", base_url)
}

pub fn custom(api_key: impl Into<String>, base_url: impl Into<String>) -> OpenAiProvider {
    OpenAiProvider::new(api_key, base_url)
}
