//! Inference Client: OpenAI-compatible API client for the LLM backend.
//!
//! The orchestrator talks to the model only through the [`ChatModel`] trait,
//! so the concrete endpoint (Ollama, llama.cpp, vLLM) is a config change.

pub mod client;
pub mod errors;
pub mod types;

#[cfg(test)]
pub mod test_support;

// Re-exports for convenience
pub use client::{ChatModel, InferenceClient};
pub use errors::InferenceError;
pub use types::{ChatMessage, Role};
