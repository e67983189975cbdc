//! Game-mechanics tools the generator can invoke.
//!
//! Each tool carries its own name, description, and input schema, so the
//! definitions handed to the generator and the dispatch table are the same
//! registration; they cannot drift apart. Tool execution never aborts the
//! tool-calling loop: unknown names and handler failures come back as
//! result strings.

mod character;
mod combat;
mod dice;
mod inventory;
mod npc;
mod quest;
mod story;

use async_trait::async_trait;
use gm_core::combat::{CombatError, CombatTracker};
use gm_core::dice::DiceError;
use gm_core::storage::{Storage, StorageError};
use gm_core::types::{AuthorId, ChannelId};
use llm::ToolDefinition;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Error type for tool execution. Stringified at the registry boundary,
/// never propagated past it.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("missing argument '{0}'")]
    MissingArgument(&'static str),
    #[error("invalid argument '{name}': {reason}")]
    InvalidArgument {
        name: &'static str,
        reason: String,
    },
    #[error(transparent)]
    Dice(#[from] DiceError),
    #[error(transparent)]
    Combat(#[from] CombatError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("{0}")]
    Failed(String),
}

/// Context a tool executes against: which channel and author triggered it,
/// which session is active, and the collaborators it may mutate.
#[derive(Clone)]
pub struct ToolContext {
    pub channel_id: ChannelId,
    pub author_id: AuthorId,
    pub session_id: Option<i64>,
    pub storage: Arc<dyn Storage>,
    pub combat: Arc<CombatTracker>,
}

impl ToolContext {
    /// The active character of the author who triggered this batch.
    pub async fn own_character(&self) -> Result<Option<gm_core::types::Character>, ToolError> {
        Ok(self
            .storage
            .active_character(self.author_id, self.channel_id)
            .await?)
    }
}

/// An executable game-mechanics operation.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name.
    fn name(&self) -> &str;

    /// Description shown to the generator.
    fn description(&self) -> &str;

    /// JSON Schema of the input arguments.
    fn input_schema(&self) -> &Value;

    /// Execute with the given arguments.
    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, ToolError>;
}

/// Registry mapping tool names to handlers, built once at startup.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> &mut Self {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
        self
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Definitions for the generator, one per registered tool.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema().clone(),
            })
            .collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Execute a tool by name, turning every failure into a result string
    /// the loop can keep going with.
    pub async fn execute(&self, name: &str, args: Value, ctx: &ToolContext) -> String {
        let Some(tool) = self.tools.get(name) else {
            tracing::warn!(tool = name, "unknown tool requested");
            return format!("Error: unknown tool '{name}'");
        };

        tracing::info!(tool = name, args = %args, "executing tool");
        match tool.execute(args, ctx).await {
            Ok(result) => result,
            Err(error) => {
                tracing::warn!(tool = name, error = %error, "tool failed");
                format!("Error: {error}")
            }
        }
    }
}

/// Build the full game tool registry.
pub fn game_tools() -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry
        .register(dice::RollDice)
        .register(dice::RollAttack)
        .register(dice::RollSave)
        .register(dice::RollSkillCheck);

    registry
        .register(combat::StartCombat)
        .register(combat::AddCombatant)
        .register(combat::RollInitiative)
        .register(combat::DealDamage)
        .register(combat::HealCombatant)
        .register(combat::ApplyStatus)
        .register(combat::RemoveStatus)
        .register(combat::NextTurn)
        .register(combat::CombatStatus)
        .register(combat::EndCombat);

    registry
        .register(character::GetCharacter)
        .register(character::UpdateHp)
        .register(character::AddExperience);

    registry
        .register(inventory::GiveItem)
        .register(inventory::RemoveItem)
        .register(inventory::ListInventory)
        .register(inventory::AdjustGold);

    registry
        .register(quest::CreateQuest)
        .register(quest::CompleteObjective)
        .register(quest::GrantQuestRewards)
        .register(quest::ListQuests);

    registry
        .register(npc::CreateNpc)
        .register(npc::GetNpc)
        .register(npc::AdjustReputation)
        .register(npc::ListNpcs);

    registry
        .register(story::PartyInfo)
        .register(story::AddStoryEntry)
        .register(story::StoryLog);

    registry
}

// Argument extraction helpers shared by the handlers.

pub(crate) fn str_arg<'a>(args: &'a Value, name: &'static str) -> Result<&'a str, ToolError> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or(ToolError::MissingArgument(name))
}

pub(crate) fn opt_str_arg<'a>(args: &'a Value, name: &str) -> Option<&'a str> {
    args.get(name).and_then(Value::as_str)
}

pub(crate) fn i64_arg(args: &Value, name: &'static str) -> Result<i64, ToolError> {
    args.get(name)
        .and_then(Value::as_i64)
        .ok_or(ToolError::MissingArgument(name))
}

pub(crate) fn opt_i64_arg(args: &Value, name: &str) -> Option<i64> {
    args.get(name).and_then(Value::as_i64)
}

pub(crate) fn u32_arg(args: &Value, name: &'static str) -> Result<u32, ToolError> {
    let value = i64_arg(args, name)?;
    u32::try_from(value).map_err(|_| ToolError::InvalidArgument {
        name,
        reason: format!("expected a non-negative integer, got {value}"),
    })
}

pub(crate) fn opt_u32_arg(args: &Value, name: &'static str) -> Result<Option<u32>, ToolError> {
    match opt_i64_arg(args, name) {
        None => Ok(None),
        Some(value) => u32::try_from(value).map(Some).map_err(|_| {
            ToolError::InvalidArgument {
                name,
                reason: format!("expected a non-negative integer, got {value}"),
            }
        }),
    }
}

pub(crate) fn opt_bool_arg(args: &Value, name: &str) -> bool {
    args.get(name).and_then(Value::as_bool).unwrap_or(false)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use gm_core::MemoryStore;

    /// A context over fresh in-memory collaborators.
    pub(crate) fn context(channel: ChannelId, author: AuthorId) -> ToolContext {
        ToolContext {
            channel_id: channel,
            author_id: author,
            session_id: None,
            storage: Arc::new(MemoryStore::new()),
            combat: Arc::new(CombatTracker::new()),
        }
    }
}
