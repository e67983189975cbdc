//! NPC tools: creation, lookup, and reputation.

use super::{i64_arg, opt_bool_arg, opt_i64_arg, opt_str_arg, str_arg, Tool, ToolContext, ToolError};
use async_trait::async_trait;
use gm_core::types::{disposition, NewNpc};
use once_cell::sync::Lazy;
use serde_json::{json, Value};

static CREATE_NPC_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "name": { "type": "string", "description": "NPC name" },
            "description": { "type": "string", "description": "Who they are" },
            "personality": { "type": "string", "description": "How they behave" },
            "location": { "type": "string", "description": "Where they can be found" },
            "merchant": { "type": "boolean", "description": "Whether they buy and sell" }
        },
        "required": ["name", "description", "personality"]
    })
});

static GET_NPC_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "npc_id": { "type": "integer", "description": "NPC to look up" },
            "character_id": {
                "type": "integer",
                "description": "Include this character's standing with the NPC"
            }
        },
        "required": ["npc_id"]
    })
});

static ADJUST_REPUTATION_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "npc_id": { "type": "integer", "description": "NPC whose opinion changes" },
            "character_id": { "type": "integer", "description": "Character they judge" },
            "change": { "type": "integer", "description": "Signed reputation change" }
        },
        "required": ["npc_id", "character_id", "change"]
    })
});

static LIST_NPCS_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {}
    })
});

/// Create an NPC in the active session.
pub struct CreateNpc;

#[async_trait]
impl Tool for CreateNpc {
    fn name(&self) -> &str {
        "create_npc"
    }

    fn description(&self) -> &str {
        "Create an NPC in the active session."
    }

    fn input_schema(&self) -> &Value {
        &CREATE_NPC_SCHEMA
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let Some(session_id) = ctx.session_id else {
            return Ok("No active session to attach an NPC to.".to_string());
        };

        let npc = ctx
            .storage
            .create_npc(NewNpc {
                session_id,
                name: str_arg(&args, "name")?.to_string(),
                description: str_arg(&args, "description")?.to_string(),
                personality: str_arg(&args, "personality")?.to_string(),
                location: opt_str_arg(&args, "location").map(str::to_string),
                merchant: opt_bool_arg(&args, "merchant"),
            })
            .await?;

        Ok(format!("Created NPC: **{}** (ID: {})", npc.name, npc.id))
    }
}

/// Look up an NPC, optionally with a character's standing.
pub struct GetNpc;

#[async_trait]
impl Tool for GetNpc {
    fn name(&self) -> &str {
        "get_npc"
    }

    fn description(&self) -> &str {
        "Get an NPC's details, including their disposition toward a character if given."
    }

    fn input_schema(&self) -> &Value {
        &GET_NPC_SCHEMA
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let npc_id = i64_arg(&args, "npc_id")?;
        let npc = ctx.storage.npc(npc_id).await?;

        let mut lines = vec![
            format!("**{}**", npc.name),
            npc.description.clone(),
            format!("Personality: {}", npc.personality),
            format!(
                "Location: {}",
                npc.location.as_deref().unwrap_or("unknown")
            ),
            format!("Merchant: {}", if npc.merchant { "yes" } else { "no" }),
        ];

        if let Some(character_id) = opt_i64_arg(&args, "character_id") {
            let reputation = ctx.storage.reputation(npc_id, character_id).await?;
            lines.push(format!(
                "Reputation: {} ({})",
                reputation,
                disposition(reputation)
            ));
        }

        Ok(lines.join("\n"))
    }
}

/// Adjust an NPC's opinion of a character.
pub struct AdjustReputation;

#[async_trait]
impl Tool for AdjustReputation {
    fn name(&self) -> &str {
        "adjust_reputation"
    }

    fn description(&self) -> &str {
        "Change an NPC's reputation toward a character by a signed amount."
    }

    fn input_schema(&self) -> &Value {
        &ADJUST_REPUTATION_SCHEMA
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let npc_id = i64_arg(&args, "npc_id")?;
        let character_id = i64_arg(&args, "character_id")?;
        let change = i64_arg(&args, "change")? as i32;

        let npc = ctx.storage.npc(npc_id).await?;
        let new_value = ctx
            .storage
            .adjust_reputation(npc_id, character_id, change)
            .await?;

        Ok(format!(
            "Reputation with {} changed by {:+}. Now {} ({})",
            npc.name,
            change,
            new_value,
            disposition(new_value)
        ))
    }
}

/// List the session's NPCs.
pub struct ListNpcs;

#[async_trait]
impl Tool for ListNpcs {
    fn name(&self) -> &str {
        "list_npcs"
    }

    fn description(&self) -> &str {
        "List the active session's NPCs."
    }

    fn input_schema(&self) -> &Value {
        &LIST_NPCS_SCHEMA
    }

    async fn execute(&self, _args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let Some(session_id) = ctx.session_id else {
            return Ok("No active session.".to_string());
        };

        let npcs = ctx.storage.npcs(session_id).await?;
        if npcs.is_empty() {
            return Ok("No NPCs yet.".to_string());
        }

        let mut lines = vec!["**NPCs:**".to_string()];
        for npc in npcs {
            let merchant = if npc.merchant { " [merchant]" } else { "" };
            lines.push(format!(
                "[{}] **{}**{} - {}",
                npc.id,
                npc.name,
                merchant,
                npc.location.as_deref().unwrap_or("location unknown")
            ));
        }
        Ok(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing;
    use gm_core::Storage;
    use super::*;

    #[tokio::test]
    async fn npc_lifecycle_with_reputation() {
        let mut ctx = testing::context(1, 100);
        let session = ctx.storage.create_session(1, "s").await.unwrap();
        ctx.session_id = Some(session.id);

        CreateNpc
            .execute(
                json!({
                    "name": "Greta",
                    "description": "Keeper of the Lantern Inn",
                    "personality": "warm but shrewd",
                    "location": "Lantern Inn",
                    "merchant": true
                }),
                &ctx,
            )
            .await
            .unwrap();

        let npcs = ctx.storage.npcs(session.id).await.unwrap();
        let npc_id = npcs[0].id;

        let report = AdjustReputation
            .execute(json!({"npc_id": npc_id, "character_id": 1, "change": 15}), &ctx)
            .await
            .unwrap();
        assert!(report.contains("friendly"));

        let details = GetNpc
            .execute(json!({"npc_id": npc_id, "character_id": 1}), &ctx)
            .await
            .unwrap();
        assert!(details.contains("Reputation: 15"));

        let listing = ListNpcs.execute(json!({}), &ctx).await.unwrap();
        assert!(listing.contains("[merchant]"));
    }
}
