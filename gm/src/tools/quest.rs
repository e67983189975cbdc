//! Quest tools: creation, objectives, and rewards.

use super::{i64_arg, opt_i64_arg, opt_str_arg, str_arg, u32_arg, Tool, ToolContext, ToolError};
use async_trait::async_trait;
use gm_core::types::{NewQuest, QuestRewards, QuestStatus};
use once_cell::sync::Lazy;
use serde_json::{json, Value};

static CREATE_QUEST_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "title": { "type": "string", "description": "Quest title" },
            "description": { "type": "string", "description": "What the quest is about" },
            "objectives": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Ordered objectives"
            },
            "reward_gold": { "type": "integer", "description": "Gold granted on completion" },
            "reward_xp": { "type": "integer", "description": "XP granted on completion" },
            "reward_items": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Items granted on completion"
            }
        },
        "required": ["title", "description"]
    })
});

static COMPLETE_OBJECTIVE_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "quest_id": { "type": "integer", "description": "Quest to update" },
            "objective_index": { "type": "integer", "description": "Zero-based objective index" }
        },
        "required": ["quest_id", "objective_index"]
    })
});

static GRANT_REWARDS_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "quest_id": { "type": "integer", "description": "Quest to complete" },
            "character_id": { "type": "integer", "description": "Character receiving the rewards" }
        },
        "required": ["quest_id", "character_id"]
    })
});

static LIST_QUESTS_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {}
    })
});

fn string_array(args: &Value, name: &str) -> Vec<String> {
    args.get(name)
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Create a quest in the active session.
pub struct CreateQuest;

#[async_trait]
impl Tool for CreateQuest {
    fn name(&self) -> &str {
        "create_quest"
    }

    fn description(&self) -> &str {
        "Create a quest with objectives and rewards in the active session."
    }

    fn input_schema(&self) -> &Value {
        &CREATE_QUEST_SCHEMA
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let Some(session_id) = ctx.session_id else {
            return Ok("No active session to attach a quest to.".to_string());
        };

        let quest = ctx
            .storage
            .create_quest(NewQuest {
                session_id,
                title: str_arg(&args, "title")?.to_string(),
                description: str_arg(&args, "description")?.to_string(),
                objectives: string_array(&args, "objectives"),
                rewards: QuestRewards {
                    gold: opt_i64_arg(&args, "reward_gold").unwrap_or(0),
                    xp: opt_i64_arg(&args, "reward_xp").unwrap_or(0).max(0) as u32,
                    items: string_array(&args, "reward_items"),
                },
            })
            .await?;

        Ok(format!(
            "Quest created: **{}** (ID: {}) with {} objectives",
            quest.title,
            quest.id,
            quest.objectives.len()
        ))
    }
}

/// Mark a quest objective complete.
pub struct CompleteObjective;

#[async_trait]
impl Tool for CompleteObjective {
    fn name(&self) -> &str {
        "complete_objective"
    }

    fn description(&self) -> &str {
        "Mark a quest objective complete by its zero-based index."
    }

    fn input_schema(&self) -> &Value {
        &COMPLETE_OBJECTIVE_SCHEMA
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let quest_id = i64_arg(&args, "quest_id")?;
        let index = u32_arg(&args, "objective_index")? as usize;

        let quest = ctx.storage.complete_objective(quest_id, index).await?;
        let mut message = format!("Objective {} of **{}** complete!", index + 1, quest.title);
        if quest.all_objectives_complete() {
            message.push_str(" All objectives complete! The quest is ready to turn in.");
        }
        Ok(message)
    }
}

/// Complete a quest and grant its rewards.
pub struct GrantQuestRewards;

#[async_trait]
impl Tool for GrantQuestRewards {
    fn name(&self) -> &str {
        "grant_quest_rewards"
    }

    fn description(&self) -> &str {
        "Complete a quest and grant its gold, XP, and item rewards to a character."
    }

    fn input_schema(&self) -> &Value {
        &GRANT_REWARDS_SCHEMA
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let quest_id = i64_arg(&args, "quest_id")?;
        let character_id = i64_arg(&args, "character_id")?;

        let quest = ctx.storage.complete_quest(quest_id).await?;
        let rewards = &quest.rewards;

        let mut lines = vec![format!("**Quest complete: {}!** Rewards:", quest.title)];
        if rewards.gold > 0 {
            let total = ctx.storage.adjust_gold(character_id, rewards.gold).await?;
            lines.push(format!("- {} gold (total {})", rewards.gold, total));
        }
        if rewards.xp > 0 {
            let award = ctx.storage.add_experience(character_id, rewards.xp).await?;
            let mut line = format!("- {} XP (total {})", rewards.xp, award.total_xp);
            if award.leveled_up {
                line.push_str(&format!(" LEVEL UP to {}!", award.level));
            }
            lines.push(line);
        }
        for item in &rewards.items {
            ctx.storage.add_item(character_id, item, "reward", 1).await?;
            lines.push(format!("- {item}"));
        }

        Ok(lines.join("\n"))
    }
}

/// List the session's quests with progress.
pub struct ListQuests;

#[async_trait]
impl Tool for ListQuests {
    fn name(&self) -> &str {
        "list_quests"
    }

    fn description(&self) -> &str {
        "List the active session's quests with objective progress."
    }

    fn input_schema(&self) -> &Value {
        &LIST_QUESTS_SCHEMA
    }

    async fn execute(&self, _args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let Some(session_id) = ctx.session_id else {
            return Ok("No active session.".to_string());
        };

        let quests = ctx.storage.quests(session_id).await?;
        if quests.is_empty() {
            return Ok("No quests yet.".to_string());
        }

        let mut lines = vec!["**Quests:**".to_string()];
        for quest in quests {
            let done = quest.completed.iter().filter(|&&c| c).count();
            let status = match quest.status {
                QuestStatus::Completed => "completed",
                QuestStatus::Active => "active",
                QuestStatus::Available => "available",
            };
            lines.push(format!(
                "[{}] **{}** ({}) - {}/{} objectives",
                quest.id,
                quest.title,
                status,
                done,
                quest.objectives.len()
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
    use gm_core::types::{AbilityScores, NewCharacter};

    async fn seeded_ctx() -> (super::super::ToolContext, i64) {
        let mut ctx = testing::context(1, 100);
        let session = ctx.storage.create_session(1, "s").await.unwrap();
        ctx.session_id = Some(session.id);
        let character = ctx
            .storage
            .create_character(NewCharacter {
                owner_id: 100,
                channel_id: 1,
                name: "Pip".to_string(),
                class_name: "Bard".to_string(),
                race: "Halfling".to_string(),
                max_hp: 10,
                gold: 0,
                scores: AbilityScores::default(),
            })
            .await
            .unwrap();
        (ctx, character.id)
    }

    #[tokio::test]
    async fn quest_lifecycle() {
        let (ctx, character_id) = seeded_ctx().await;

        let created = CreateQuest
            .execute(
                json!({
                    "title": "Clear the Mine",
                    "description": "Something stirs below.",
                    "objectives": ["Find the entrance", "Defeat the broodmother"],
                    "reward_gold": 100,
                    "reward_xp": 50,
                    "reward_items": ["Miner's Charm"]
                }),
                &ctx,
            )
            .await
            .unwrap();
        assert!(created.contains("Clear the Mine"));

        // The id is embedded in the creation message; list instead.
        let quests = ctx.storage.quests(ctx.session_id.unwrap()).await.unwrap();
        let quest_id = quests[0].id;

        let partial = CompleteObjective
            .execute(json!({"quest_id": quest_id, "objective_index": 0}), &ctx)
            .await
            .unwrap();
        assert!(!partial.contains("ready to turn in"));

        let full = CompleteObjective
            .execute(json!({"quest_id": quest_id, "objective_index": 1}), &ctx)
            .await
            .unwrap();
        assert!(full.contains("ready to turn in"));

        let rewards = GrantQuestRewards
            .execute(json!({"quest_id": quest_id, "character_id": character_id}), &ctx)
            .await
            .unwrap();
        assert!(rewards.contains("100 gold"));
        assert!(rewards.contains("Miner's Charm"));

        let listing = ListQuests.execute(json!({}), &ctx).await.unwrap();
        assert!(listing.contains("completed"));
    }

    #[tokio::test]
    async fn quest_without_session_is_friendly() {
        let ctx = testing::context(2, 100);
        let result = CreateQuest
            .execute(json!({"title": "t", "description": "d"}), &ctx)
            .await
            .unwrap();
        assert!(result.contains("No active session"));
    }
}
