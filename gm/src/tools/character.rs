//! Character tools: sheets, HP, and experience.

use super::{i64_arg, opt_i64_arg, opt_str_arg, u32_arg, Tool, ToolContext, ToolError};
use async_trait::async_trait;
use gm_core::types::Character;
use once_cell::sync::Lazy;
use serde_json::{json, Value};

static GET_CHARACTER_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "character_id": {
                "type": "integer",
                "description": "Character to look up; omit for the acting player's character"
            }
        }
    })
});

static UPDATE_HP_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "character_id": { "type": "integer", "description": "Character to update" },
            "change": { "type": "integer", "description": "Signed HP change (negative for damage)" },
            "reason": { "type": "string", "description": "What caused the change" }
        },
        "required": ["character_id", "change"]
    })
});

static ADD_EXPERIENCE_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "character_id": { "type": "integer", "description": "Character to reward" },
            "xp": { "type": "integer", "description": "Experience points to grant" },
            "reason": { "type": "string", "description": "What earned the XP" }
        },
        "required": ["character_id", "xp"]
    })
});

fn sheet(character: &Character) -> String {
    let s = &character.scores;
    format!(
        "**{}** - Level {} {} {}\n\
         HP: {}/{} | Gold: {} | XP: {}\n\
         STR {} | DEX {} | CON {} | INT {} | WIS {} | CHA {}",
        character.name,
        character.level,
        character.race,
        character.class_name,
        character.hp,
        character.max_hp,
        character.gold,
        character.experience,
        s.strength,
        s.dexterity,
        s.constitution,
        s.intelligence,
        s.wisdom,
        s.charisma
    )
}

/// Look up a character sheet.
pub struct GetCharacter;

#[async_trait]
impl Tool for GetCharacter {
    fn name(&self) -> &str {
        "get_character"
    }

    fn description(&self) -> &str {
        "Get a character's sheet. Without a character_id, returns the acting player's character."
    }

    fn input_schema(&self) -> &Value {
        &GET_CHARACTER_SCHEMA
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let character = match opt_i64_arg(&args, "character_id") {
            Some(id) => Some(ctx.storage.character(id).await?),
            None => ctx.own_character().await?,
        };
        match character {
            Some(character) => Ok(sheet(&character)),
            None => Ok("No character found for this player.".to_string()),
        }
    }
}

/// Apply a signed HP change to a character record.
pub struct UpdateHp;

#[async_trait]
impl Tool for UpdateHp {
    fn name(&self) -> &str {
        "update_hp"
    }

    fn description(&self) -> &str {
        "Change a character's HP by a signed amount, clamped to [0, max HP]. \
         Use combat tools instead while an encounter is active."
    }

    fn input_schema(&self) -> &Value {
        &UPDATE_HP_SCHEMA
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let character_id = i64_arg(&args, "character_id")?;
        let change = i64_arg(&args, "change")? as i32;
        let reason = opt_str_arg(&args, "reason").unwrap_or("unspecified");

        let character = ctx.storage.character(character_id).await?;
        let updated = ctx.storage.set_hp(character_id, character.hp + change).await?;

        let action = if change >= 0 { "healed" } else { "took damage" };
        Ok(format!(
            "{} {}: {} HP ({}). HP: {}/{}",
            updated.name,
            action,
            change.abs(),
            reason,
            updated.hp,
            updated.max_hp
        ))
    }
}

/// Grant experience, reporting level-ups.
pub struct AddExperience;

#[async_trait]
impl Tool for AddExperience {
    fn name(&self) -> &str {
        "add_experience"
    }

    fn description(&self) -> &str {
        "Grant experience points to a character, applying any level-ups."
    }

    fn input_schema(&self) -> &Value {
        &ADD_EXPERIENCE_SCHEMA
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let character_id = i64_arg(&args, "character_id")?;
        let xp = u32_arg(&args, "xp")?;
        let reason = opt_str_arg(&args, "reason").unwrap_or("unspecified");

        let award = ctx.storage.add_experience(character_id, xp).await?;
        let mut message = format!("Gained {xp} XP ({reason}). Total: {}", award.total_xp);
        if award.leveled_up {
            message.push_str(&format!(
                "\nLEVEL UP! Now level {}! +{} max HP!",
                award.level, award.hp_increase
            ));
        }
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing;
    use gm_core::Storage;
    use super::*;
    use gm_core::types::{AbilityScores, NewCharacter};

    async fn ctx_with_character() -> (super::super::ToolContext, i64) {
        let ctx = testing::context(1, 100);
        ctx.storage.create_session(1, "s").await.unwrap();
        let character = ctx
            .storage
            .create_character(NewCharacter {
                owner_id: 100,
                channel_id: 1,
                name: "Mira".to_string(),
                class_name: "Rogue".to_string(),
                race: "Elf".to_string(),
                max_hp: 14,
                gold: 30,
                scores: AbilityScores::default(),
            })
            .await
            .unwrap();
        (ctx, character.id)
    }

    #[tokio::test]
    async fn get_character_defaults_to_acting_player() {
        let (ctx, _) = ctx_with_character().await;
        let sheet = GetCharacter.execute(json!({}), &ctx).await.unwrap();
        assert!(sheet.contains("**Mira**"));
        assert!(sheet.contains("HP: 14/14"));
    }

    #[tokio::test]
    async fn get_character_without_one_is_friendly() {
        let ctx = testing::context(1, 999);
        let result = GetCharacter.execute(json!({}), &ctx).await.unwrap();
        assert!(result.contains("No character found"));
    }

    #[tokio::test]
    async fn update_hp_clamps_at_zero() {
        let (ctx, id) = ctx_with_character().await;
        let report = UpdateHp
            .execute(json!({"character_id": id, "change": -50, "reason": "trap"}), &ctx)
            .await
            .unwrap();
        assert!(report.contains("HP: 0/14"));
    }

    #[tokio::test]
    async fn add_experience_reports_level_up() {
        let (ctx, id) = ctx_with_character().await;
        let report = AddExperience
            .execute(json!({"character_id": id, "xp": 400, "reason": "quest"}), &ctx)
            .await
            .unwrap();
        assert!(report.contains("LEVEL UP"));
    }
}
