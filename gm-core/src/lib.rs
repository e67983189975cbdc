//! # gm-core
//!
//! The deterministic half of the game master: dice expression parsing and
//! rolling, the combat encounter state machine, the domain records the
//! tools operate on, and the [`storage::Storage`] trait the orchestration
//! layer persists through.
//!
//! Everything here is pure or storage-mediated; no network I/O.

pub mod combat;
pub mod dice;
pub mod memory;
pub mod storage;
pub mod types;

pub use combat::{CombatError, CombatTracker, Combatant, Encounter, StatusEffect};
pub use dice::{Advantage, DiceError, DiceExpression, Keep, RollResult};
pub use memory::MemoryStore;
pub use storage::{Storage, StorageError};
pub use types::{
    Ability, AbilityScores, AuthorId, ChannelId, Character, ItemStack, NewCharacter, NewNpc,
    NewQuest, Npc, Quest, QuestRewards, QuestStatus, SessionRecord, SessionStatus, StoryEntry,
    StoryKind, XpAward,
};
