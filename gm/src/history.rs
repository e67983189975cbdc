//! Per-channel, session-scoped conversation history.
//!
//! Each channel keeps a bounded ring of role-tagged turns together with the
//! session id the turns belong to. When the active session for a channel
//! changes, the old log is discarded before anything is read or written
//! under the new session; narrative context never leaks across sessions or
//! channels.

use gm_core::types::ChannelId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    /// Combined player actions
    Player,
    /// The game master's narrative
    Narrator,
    /// Condensed record of a tool execution
    ToolResult,
}

/// One conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
}

impl Turn {
    /// A player-actions turn.
    pub fn player(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Player,
            content: content.into(),
        }
    }

    /// A narrator turn.
    pub fn narrator(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Narrator,
            content: content.into(),
        }
    }

    /// A tool-result turn.
    pub fn tool_result(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::ToolResult,
            content: content.into(),
        }
    }
}

#[derive(Default)]
struct ChannelHistory {
    session_id: Option<i64>,
    turns: VecDeque<Turn>,
}

/// Conversation history for all channels.
pub struct HistoryManager {
    channels: Mutex<HashMap<ChannelId, ChannelHistory>>,
    max_turns: usize,
}

impl HistoryManager {
    /// Create a manager retaining at most `max_turns` turns per channel.
    pub fn new(max_turns: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            max_turns,
        }
    }

    /// The channel's turn log, oldest first.
    ///
    /// If `session_id` is provided and differs from the stored one, the log
    /// is cleared and reseeded empty for the new session first.
    pub async fn history(&self, channel: ChannelId, session_id: Option<i64>) -> Vec<Turn> {
        let mut channels = self.channels.lock().await;
        let history = channels.entry(channel).or_default();
        Self::check_session(channel, history, session_id);
        history.turns.iter().cloned().collect()
    }

    /// Append a turn, truncating to the most recent `max_turns`.
    pub async fn append(&self, channel: ChannelId, turn: Turn, session_id: Option<i64>) {
        let mut channels = self.channels.lock().await;
        let history = channels.entry(channel).or_default();
        Self::check_session(channel, history, session_id);
        history.turns.push_back(turn);
        while history.turns.len() > self.max_turns {
            history.turns.pop_front();
        }
    }

    /// Explicitly wipe a channel's history.
    pub async fn clear(&self, channel: ChannelId) {
        let mut channels = self.channels.lock().await;
        channels.remove(&channel);
    }

    /// Number of retained turns for a channel.
    pub async fn len(&self, channel: ChannelId) -> usize {
        let channels = self.channels.lock().await;
        channels.get(&channel).map_or(0, |h| h.turns.len())
    }

    /// Whether a channel has no retained turns.
    pub async fn is_empty(&self, channel: ChannelId) -> bool {
        self.len(channel).await == 0
    }

    fn check_session(channel: ChannelId, history: &mut ChannelHistory, session_id: Option<i64>) {
        if let Some(session_id) = session_id {
            if history.session_id != Some(session_id) {
                if history.session_id.is_some() {
                    tracing::info!(
                        channel,
                        session = session_id,
                        "session changed, clearing channel history"
                    );
                }
                history.session_id = Some(session_id);
                history.turns.clear();
            }
        }
    }
}
