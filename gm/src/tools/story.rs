//! Party and story-log tools.

use super::{opt_u32_arg, str_arg, Tool, ToolContext, ToolError};
use async_trait::async_trait;
use gm_core::types::StoryKind;
use once_cell::sync::Lazy;
use serde_json::{json, Value};

static PARTY_INFO_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {}
    })
});

static ADD_STORY_ENTRY_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "entry_type": {
                "type": "string",
                "enum": ["narration", "combat", "dialogue", "discovery", "milestone"],
                "description": "Kind of story beat"
            },
            "content": { "type": "string", "description": "What happened" }
        },
        "required": ["entry_type", "content"]
    })
});

static STORY_LOG_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "limit": { "type": "integer", "description": "How many recent entries (default 10)" }
        }
    })
});

fn kind_name(kind: StoryKind) -> &'static str {
    match kind {
        StoryKind::Narration => "narration",
        StoryKind::Combat => "combat",
        StoryKind::Dialogue => "dialogue",
        StoryKind::Discovery => "discovery",
        StoryKind::Milestone => "milestone",
    }
}

/// Summarize the party.
pub struct PartyInfo;

#[async_trait]
impl Tool for PartyInfo {
    fn name(&self) -> &str {
        "party_info"
    }

    fn description(&self) -> &str {
        "List the party members in the active session with levels and HP."
    }

    fn input_schema(&self) -> &Value {
        &PARTY_INFO_SCHEMA
    }

    async fn execute(&self, _args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let Some(session_id) = ctx.session_id else {
            return Ok("No active session.".to_string());
        };

        let party = ctx.storage.party(session_id).await?;
        if party.is_empty() {
            return Ok("No characters in the party yet.".to_string());
        }

        let mut lines = vec!["**Party:**".to_string()];
        for character in party {
            lines.push(format!("- {} [ID: {}]", character.summary(), character.id));
        }
        Ok(lines.join("\n"))
    }
}

/// Record a story beat.
pub struct AddStoryEntry;

#[async_trait]
impl Tool for AddStoryEntry {
    fn name(&self) -> &str {
        "add_story_entry"
    }

    fn description(&self) -> &str {
        "Record a story beat in the session's log."
    }

    fn input_schema(&self) -> &Value {
        &ADD_STORY_ENTRY_SCHEMA
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let Some(session_id) = ctx.session_id else {
            return Ok("No active session to log story for.".to_string());
        };

        let kind: StoryKind = str_arg(&args, "entry_type")?
            .parse()
            .map_err(|reason| ToolError::InvalidArgument {
                name: "entry_type",
                reason,
            })?;
        let content = str_arg(&args, "content")?;

        ctx.storage.add_story_entry(session_id, kind, content).await?;
        Ok(format!("Story logged: [{}]", kind_name(kind)))
    }
}

/// Read recent story beats.
pub struct StoryLog;

#[async_trait]
impl Tool for StoryLog {
    fn name(&self) -> &str {
        "story_log"
    }

    fn description(&self) -> &str {
        "Read the most recent story beats for the session."
    }

    fn input_schema(&self) -> &Value {
        &STORY_LOG_SCHEMA
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let Some(session_id) = ctx.session_id else {
            return Ok("No active session.".to_string());
        };
        let limit = opt_u32_arg(&args, "limit")?.unwrap_or(10) as usize;

        let entries = ctx.storage.story_log(session_id, limit).await?;
        if entries.is_empty() {
            return Ok("No story entries yet.".to_string());
        }

        let mut lines = vec!["**Recent story:**".to_string()];
        for entry in entries {
            lines.push(format!("- [{}] {}", kind_name(entry.kind), entry.content));
        }
        Ok(lines.join("\n"))
    }
}
