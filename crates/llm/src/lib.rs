//! Text-generation gateway for TriageBot.
//!
//! Provider clients share the [`LlmClient`] trait so the agents never know
//! which backend answered. [`build_llm_client`] wires the configured provider
//! behind retry and concurrency limits; [`UnavailableClient`] stands in when
//! nothing could be configured.

pub mod anthropic;
pub mod client;
pub mod config;
pub mod gemini;
pub mod openai;
pub mod retry;

pub use anthropic::AnthropicClient;
pub use client::{
    ChatMessage, LlmClient, LlmRequest, LlmResponse, Role, TokenUsage, UNAVAILABLE_MARKER,
    UnavailableClient,
};
pub use config::{LlmConfig, SemaphoredClient, build_llm_client};
pub use gemini::GeminiClient;
pub use openai::OpenAiClient;
pub use retry::{RetryConfig, RetryingClient};
