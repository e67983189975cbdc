//! Dice tools: raw rolls, attacks, saves, and skill checks.

use super::{i64_arg, opt_i64_arg, opt_bool_arg, opt_str_arg, str_arg, Tool, ToolContext, ToolError};
use async_trait::async_trait;
use gm_core::dice::{Advantage, DiceExpression, RollResult};
use gm_core::types::Ability;
use once_cell::sync::Lazy;
use serde_json::{json, Value};

static ROLL_DICE_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "expression": {
                "type": "string",
                "description": "Dice expression in standard notation (e.g. 1d20+5, 2d6, 4d6kh3)"
            },
            "purpose": {
                "type": "string",
                "description": "What the roll is for (attack, damage, check, ...)"
            },
            "advantage": {
                "type": "boolean",
                "description": "Roll a single d20 twice and keep the higher"
            },
            "disadvantage": {
                "type": "boolean",
                "description": "Roll a single d20 twice and keep the lower"
            }
        },
        "required": ["expression"]
    })
});

static ROLL_ATTACK_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "attacker": { "type": "string", "description": "Attacking combatant's name" },
            "target": { "type": "string", "description": "Target combatant's name" },
            "attack_bonus": { "type": "integer", "description": "Attacker's to-hit bonus" },
            "damage": { "type": "string", "description": "Damage dice (e.g. 1d8+3)" },
            "damage_type": { "type": "string", "description": "Type of damage dealt" },
            "target_ac": { "type": "integer", "description": "Target armor class (default 10)" }
        },
        "required": ["attacker", "target", "damage"]
    })
});

static ROLL_SAVE_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "character_id": { "type": "integer", "description": "Character making the save" },
            "ability": {
                "type": "string",
                "enum": ["strength", "dexterity", "constitution", "intelligence", "wisdom", "charisma"],
                "description": "Ability for the save"
            },
            "dc": { "type": "integer", "description": "Difficulty class to beat" },
            "reason": { "type": "string", "description": "What forced the save" }
        },
        "required": ["character_id", "ability", "dc"]
    })
});

static ROLL_SKILL_CHECK_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "character_id": { "type": "integer", "description": "Character making the check" },
            "skill": { "type": "string", "description": "Skill being tested (e.g. stealth)" },
            "ability": {
                "type": "string",
                "enum": ["strength", "dexterity", "constitution", "intelligence", "wisdom", "charisma"],
                "description": "Ability backing the skill"
            },
            "dc": { "type": "integer", "description": "Difficulty class to beat" }
        },
        "required": ["character_id", "skill", "ability", "dc"]
    })
});

fn describe_roll(purpose: &str, result: &RollResult) -> String {
    let mut text = format!(
        "**{}**: {} = **{}**",
        purpose,
        result.dice_display(),
        result.total
    );
    if result.natural_20 {
        text.push_str(" NATURAL 20!");
    } else if result.natural_1 {
        text.push_str(" Natural 1.");
    }
    text
}

/// Roll arbitrary dice.
pub struct RollDice;

#[async_trait]
impl Tool for RollDice {
    fn name(&self) -> &str {
        "roll_dice"
    }

    fn description(&self) -> &str {
        "Roll dice in standard notation. Advantage/disadvantage apply only to a single plain d20."
    }

    fn input_schema(&self) -> &Value {
        &ROLL_DICE_SCHEMA
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<String, ToolError> {
        let expression = str_arg(&args, "expression")?;
        let purpose = opt_str_arg(&args, "purpose").unwrap_or("roll");

        // Requesting both cancels out into a plain roll.
        let advantage = match (
            opt_bool_arg(&args, "advantage"),
            opt_bool_arg(&args, "disadvantage"),
        ) {
            (true, false) => Advantage::Advantage,
            (false, true) => Advantage::Disadvantage,
            _ => Advantage::Normal,
        };

        let parsed = DiceExpression::parse(expression)?;
        let result = parsed.roll_with_advantage(advantage);
        Ok(describe_roll(purpose, &result))
    }
}

/// Resolve an attack roll against a combatant, applying damage on a hit.
pub struct RollAttack;

#[async_trait]
impl Tool for RollAttack {
    fn name(&self) -> &str {
        "roll_attack"
    }

    fn description(&self) -> &str {
        "Roll an attack against a combatant in the active encounter and apply damage on a hit. \
         A natural 20 always hits and doubles the damage dice."
    }

    fn input_schema(&self) -> &Value {
        &ROLL_ATTACK_SCHEMA
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let attacker = str_arg(&args, "attacker")?.to_string();
        let target = str_arg(&args, "target")?.to_string();
        let attack_bonus = opt_i64_arg(&args, "attack_bonus").unwrap_or(0) as i32;
        let damage_dice = DiceExpression::parse(str_arg(&args, "damage")?)?;
        let damage_type = opt_str_arg(&args, "damage_type").unwrap_or("physical").to_string();
        let target_ac = opt_i64_arg(&args, "target_ac").unwrap_or(10) as i32;

        let d20 = DiceExpression::parse(&format!("1d20{:+}", attack_bonus))?;

        let report = ctx
            .combat
            .with(ctx.channel_id, move |encounter| {
                if encounter.combatant(&attacker).is_none() {
                    return Err(ToolError::Failed(format!("no combatant named '{attacker}'")));
                }

                let attack = d20.roll();
                let mut lines = vec![
                    format!("**{attacker}** attacks **{target}**!"),
                    format!("Attack: {} = {} vs AC {}", attack.dice_display(), attack.total, target_ac),
                ];

                if attack.natural_1 {
                    lines.push("CRITICAL MISS! The attack goes wildly astray.".to_string());
                } else if attack.natural_20 || attack.total >= target_ac {
                    let damage = damage_dice.roll();
                    let total = if attack.natural_20 {
                        lines.push("CRITICAL HIT!".to_string());
                        damage.total * 2
                    } else {
                        lines.push("HIT!".to_string());
                        damage.total
                    };
                    let change = encounter.apply_hp_delta(&target, -total)?;
                    lines.push(format!("Damage: **{total}** {damage_type} damage!"));
                    if change.newly_defeated {
                        lines.push(format!("**{target}** is down!"));
                    } else {
                        lines.push(format!(
                            "{}: {}/{} HP",
                            target, change.new_hp, change.max_hp
                        ));
                    }
                } else {
                    lines.push("MISS!".to_string());
                }

                Ok(lines.join("\n"))
            })
            .await??;

        Ok(report)
    }
}

/// Roll a saving throw for a character.
pub struct RollSave;

#[async_trait]
impl Tool for RollSave {
    fn name(&self) -> &str {
        "roll_save"
    }

    fn description(&self) -> &str {
        "Roll a saving throw for a character using their ability modifier."
    }

    fn input_schema(&self) -> &Value {
        &ROLL_SAVE_SCHEMA
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let character_id = i64_arg(&args, "character_id")?;
        let ability: Ability = str_arg(&args, "ability")?
            .parse()
            .map_err(|reason| ToolError::InvalidArgument {
                name: "ability",
                reason,
            })?;
        let dc = i64_arg(&args, "dc")? as i32;
        let reason = opt_str_arg(&args, "reason").unwrap_or("effect");

        let character = ctx.storage.character(character_id).await?;
        let modifier = character.ability_modifier(ability);
        let result = DiceExpression::parse(&format!("1d20{:+}", modifier))?.roll();

        let outcome = if result.meets_dc(dc) { "SAVED" } else { "FAILED" };
        Ok(format!(
            "**{}** {} save vs DC {} ({}): {} = **{}** {}",
            character.name,
            ability,
            dc,
            reason,
            result.dice_display(),
            result.total,
            outcome
        ))
    }
}

/// Roll a skill check for a character.
pub struct RollSkillCheck;

#[async_trait]
impl Tool for RollSkillCheck {
    fn name(&self) -> &str {
        "roll_skill_check"
    }

    fn description(&self) -> &str {
        "Roll a skill check for a character using the backing ability's modifier."
    }

    fn input_schema(&self) -> &Value {
        &ROLL_SKILL_CHECK_SCHEMA
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let character_id = i64_arg(&args, "character_id")?;
        let skill = str_arg(&args, "skill")?;
        let ability: Ability = str_arg(&args, "ability")?
            .parse()
            .map_err(|reason| ToolError::InvalidArgument {
                name: "ability",
                reason,
            })?;
        let dc = i64_arg(&args, "dc")? as i32;

        let character = ctx.storage.character(character_id).await?;
        let modifier = character.ability_modifier(ability);
        let result = DiceExpression::parse(&format!("1d20{:+}", modifier))?.roll();

        let outcome = if result.meets_dc(dc) { "SUCCESS" } else { "FAILURE" };
        Ok(format!(
            "**{}** {} check ({}) vs DC {}: {} = **{}** {}",
            character.name,
            skill,
            ability,
            dc,
            result.dice_display(),
            result.total,
            outcome
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing;
    use gm_core::Storage;
    use super::*;
    use gm_core::types::{AbilityScores, NewCharacter};

    #[tokio::test]
    async fn roll_dice_reports_total() {
        let ctx = testing::context(1, 100);
        let result = RollDice
            .execute(json!({"expression": "1d1+0", "purpose": "test"}), &ctx)
            .await;
        // 1d1 is rejected by the parser; use a legal fixed-ish roll instead.
        assert!(result.is_err());

        let result = RollDice
            .execute(json!({"expression": "2d6+3"}), &ctx)
            .await
            .unwrap();
        assert!(result.contains("**roll**"));
        assert!(result.contains("= **"));
    }

    #[tokio::test]
    async fn roll_dice_rejects_bad_notation() {
        let ctx = testing::context(1, 100);
        let error = RollDice
            .execute(json!({"expression": "banana"}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(error, ToolError::Dice(_)));
    }

    #[tokio::test]
    async fn conflicting_advantage_is_a_plain_roll() {
        let ctx = testing::context(1, 100);
        // Both flags set: must not crash, must roll plainly.
        let result = RollDice
            .execute(
                json!({"expression": "1d20", "advantage": true, "disadvantage": true}),
                &ctx,
            )
            .await
            .unwrap();
        assert!(result.contains("= **"));
    }

    #[tokio::test]
    async fn save_uses_ability_modifier() {
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
                max_hp: 12,
                gold: 0,
                scores: AbilityScores {
                    dexterity: 18,
                    ..Default::default()
                },
            })
            .await
            .unwrap();

        let result = RollSave
            .execute(
                json!({"character_id": character.id, "ability": "dexterity", "dc": 1}),
                &ctx,
            )
            .await
            .unwrap();
        // DC 1 with a +4 modifier cannot fail.
        assert!(result.contains("SAVED"));
    }

    #[tokio::test]
    async fn attack_requires_active_combat() {
        let ctx = testing::context(1, 100);
        let error = RollAttack
            .execute(
                json!({"attacker": "Mira", "target": "Goblin", "damage": "1d6"}),
                &ctx,
            )
            .await
            .unwrap_err();
        assert!(matches!(error, ToolError::Combat(_)));
    }
}
