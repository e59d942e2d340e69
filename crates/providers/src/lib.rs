//! LLM provider implementations for Ferrite.
//!
//! The OpenAI-compatible provider covers the vast majority of backends:
//! OpenAI, OpenRouter, Ollama, vLLM, Together, Fireworks, and anything else
//! exposing a `/v1/chat/completions` endpoint.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
