//! The chat transport contract.
//!
//! The core only needs two things from the transport: deliver text to a
//! channel, and toggle the typing indicator while a batch is being
//! processed. Everything else about the chat platform stays outside.

use async_trait::async_trait;
use gm_core::types::ChannelId;
use thiserror::Error;
use tokio::sync::Mutex;

/// Error type for transport operations.
#[derive(Debug, Error)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

/// Outbound side of the chat transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver a text message to a channel.
    async fn send(&self, channel: ChannelId, text: &str) -> Result<(), TransportError>;

    /// Toggle the channel's typing indicator. Presentation only; failures
    /// are ignored by callers.
    async fn set_typing(&self, _channel: ChannelId, _active: bool) -> Result<(), TransportError> {
        Ok(())
    }
}

/// A transport that records everything it is asked to send.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(ChannelId, String)>>,
}

impl RecordingTransport {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages sent so far as (channel, text).
    pub async fn sent(&self) -> Vec<(ChannelId, String)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, channel: ChannelId, text: &str) -> Result<(), TransportError> {
        self.sent.lock().await.push((channel, text.to_string()));
        Ok(())
    }
}
