//! weakscale-client: Talking to a model-serving instance under test
//!
//! This crate provides the client side of the benchmark:
//! - OpenAI-compatible chat completion client
//! - Readiness probing with a bounded retry budget
//! - Sequential batch dispatch with outcome counting

pub mod chat;
pub mod dispatch;
pub mod error;
pub mod readiness;

#[cfg(test)]
mod fake;

pub use chat::{
    ChatClient, ChatRequest, ChatResponse, HarnessConfig, OpenAiClient, DEFAULT_API_KEY,
    DEFAULT_MAX_TOKENS, DEFAULT_MODEL,
};
pub use dispatch::{BatchDispatcher, DispatchReport, DEFAULT_PROMPT};
pub use error::{RequestError, RequestErrorKind};
pub use readiness::{ReadinessOutcome, ReadinessProber, ReadinessSettings, ReadinessState};
