//! The storage collaborator contract.
//!
//! The orchestration core never assumes a particular storage engine; it
//! issues semantic reads and writes against this trait, keyed by opaque
//! integer ids. [`crate::MemoryStore`] is the in-process reference
//! implementation.

use crate::types::{
    AuthorId, ChannelId, Character, ItemStack, NewCharacter, NewNpc, NewQuest, Npc, Quest,
    SessionRecord, SessionStatus, StoryEntry, StoryKind, XpAward,
};
use async_trait::async_trait;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },
    #[error("{0}")]
    Conflict(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Shorthand for a missing record.
    pub fn not_found(kind: &'static str, id: i64) -> Self {
        StorageError::NotFound { kind, id }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Semantic persistence operations for game records.
#[async_trait]
pub trait Storage: Send + Sync {
    // Sessions

    /// The channel's active session, if any.
    async fn active_session(&self, channel: ChannelId) -> StorageResult<Option<SessionRecord>>;

    /// Create a session for a channel and mark it active. Any previously
    /// active session for the channel is paused.
    async fn create_session(&self, channel: ChannelId, name: &str) -> StorageResult<SessionRecord>;

    /// Update a session's lifecycle status.
    async fn set_session_status(&self, session: i64, status: SessionStatus) -> StorageResult<()>;

    // Characters

    /// Create a character and register it as the owner's active character
    /// in the channel. Joins the channel's active session if one exists.
    async fn create_character(&self, character: NewCharacter) -> StorageResult<Character>;

    /// Fetch a character by id.
    async fn character(&self, id: i64) -> StorageResult<Character>;

    /// The author's active character in a channel.
    async fn active_character(
        &self,
        author: AuthorId,
        channel: ChannelId,
    ) -> StorageResult<Option<Character>>;

    /// All characters in a session.
    async fn party(&self, session: i64) -> StorageResult<Vec<Character>>;

    /// Set a character's current HP (already clamped by the caller's rules).
    async fn set_hp(&self, id: i64, hp: i32) -> StorageResult<Character>;

    /// Grant experience, applying level-ups and their HP increases.
    async fn add_experience(&self, id: i64, xp: u32) -> StorageResult<XpAward>;

    /// Adjust gold by a signed delta. Fails on insufficient funds.
    async fn adjust_gold(&self, id: i64, delta: i64) -> StorageResult<i64>;

    // Inventory

    /// Add items to a character's inventory, stacking by name.
    async fn add_item(
        &self,
        character: i64,
        name: &str,
        kind: &str,
        quantity: u32,
    ) -> StorageResult<ItemStack>;

    /// Remove items by name. Fails if the character lacks the quantity.
    async fn remove_item(&self, character: i64, name: &str, quantity: u32) -> StorageResult<()>;

    /// A character's inventory.
    async fn inventory(&self, character: i64) -> StorageResult<Vec<ItemStack>>;

    // Quests

    /// Create a quest in a session.
    async fn create_quest(&self, quest: NewQuest) -> StorageResult<Quest>;

    /// Fetch a quest by id.
    async fn quest(&self, id: i64) -> StorageResult<Quest>;

    /// All quests in a session.
    async fn quests(&self, session: i64) -> StorageResult<Vec<Quest>>;

    /// Mark an objective complete by index.
    async fn complete_objective(&self, quest: i64, index: usize) -> StorageResult<Quest>;

    /// Mark a quest completed.
    async fn complete_quest(&self, quest: i64) -> StorageResult<Quest>;

    // NPCs

    /// Create an NPC in a session.
    async fn create_npc(&self, npc: NewNpc) -> StorageResult<Npc>;

    /// Fetch an NPC by id.
    async fn npc(&self, id: i64) -> StorageResult<Npc>;

    /// All NPCs in a session.
    async fn npcs(&self, session: i64) -> StorageResult<Vec<Npc>>;

    /// Reputation an NPC holds toward a character (0 if never met).
    async fn reputation(&self, npc: i64, character: i64) -> StorageResult<i32>;

    /// Adjust reputation by a signed delta, returning the new value.
    async fn adjust_reputation(&self, npc: i64, character: i64, delta: i32) -> StorageResult<i32>;

    // Story log

    /// Append a story log entry to a session.
    async fn add_story_entry(
        &self,
        session: i64,
        kind: StoryKind,
        content: &str,
    ) -> StorageResult<()>;

    /// The most recent story entries for a session, oldest first.
    async fn story_log(&self, session: i64, limit: usize) -> StorageResult<Vec<StoryEntry>>;
}
