//! # llm
//!
//! A focused client for tool-calling chat completion APIs, sized for the
//! game master's needs: plain text in, narrative text plus structured tool
//! calls out.
//!
//! The [`Generator`] trait abstracts the provider; [`AnthropicGenerator`]
//! implements it against the Anthropic Messages API with retry/backoff for
//! transient failures, and [`ScriptedGenerator`] provides canned responses
//! for tests.

#![warn(missing_docs)]

pub mod anthropic;
pub mod error;
pub mod generator;
pub mod message;
pub mod mock;

pub use anthropic::AnthropicGenerator;
pub use error::LlmError;
pub use generator::{Completion, GenerationRequest, Generator, StopReason, TokenUsage};
pub use message::{ContentBlock, Message, Role, ToolDefinition};
pub use mock::ScriptedGenerator;
