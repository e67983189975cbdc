//! Combat tools: encounter lifecycle, initiative, damage, and turns.

use super::{opt_i64_arg, opt_bool_arg, opt_str_arg, opt_u32_arg, str_arg, u32_arg, Tool, ToolContext, ToolError};
use async_trait::async_trait;
use gm_core::combat::Combatant;
use gm_core::types::{Ability, StoryKind};
use once_cell::sync::Lazy;
use serde_json::{json, Value};

static START_COMBAT_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "description": { "type": "string", "description": "How the fight breaks out" }
        }
    })
});

static ADD_COMBATANT_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "name": { "type": "string", "description": "Combatant's name" },
            "hp": { "type": "integer", "description": "Hit points" },
            "initiative_bonus": { "type": "integer", "description": "Initiative modifier" },
            "is_player": { "type": "boolean", "description": "Whether this is a player character" }
        },
        "required": ["name", "hp"]
    })
});

static EMPTY_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {}
    })
});

static DEAL_DAMAGE_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "target": { "type": "string", "description": "Target combatant's name" },
            "amount": { "type": "integer", "description": "Damage amount" },
            "damage_type": { "type": "string", "description": "Type of damage" }
        },
        "required": ["target", "amount"]
    })
});

static HEAL_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "target": { "type": "string", "description": "Target combatant's name" },
            "amount": { "type": "integer", "description": "Healing amount" }
        },
        "required": ["target", "amount"]
    })
});

static APPLY_STATUS_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "target": { "type": "string", "description": "Target combatant's name" },
            "effect": { "type": "string", "description": "Status effect name" },
            "duration": { "type": "integer", "description": "Duration in rounds; omit for indefinite" }
        },
        "required": ["target", "effect"]
    })
});

static REMOVE_STATUS_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "target": { "type": "string", "description": "Target combatant's name" },
            "effect": { "type": "string", "description": "Status effect name to remove" }
        },
        "required": ["target", "effect"]
    })
});

static END_COMBAT_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "outcome": { "type": "string", "description": "How the fight ended" },
            "xp_reward": { "type": "integer", "description": "XP granted to each surviving player" }
        }
    })
});

/// Start an encounter in the channel and seat the party.
pub struct StartCombat;

#[async_trait]
impl Tool for StartCombat {
    fn name(&self) -> &str {
        "start_combat"
    }

    fn description(&self) -> &str {
        "Start a combat encounter in this channel. The party joins automatically; \
         add enemies with add_combatant, then roll_initiative."
    }

    fn input_schema(&self) -> &Value {
        &START_COMBAT_SCHEMA
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let description = opt_str_arg(&args, "description").unwrap_or("Combat begins!");

        ctx.combat.start(ctx.channel_id, ctx.session_id).await?;

        let mut seated = Vec::new();
        if let Some(session_id) = ctx.session_id {
            let party = ctx.storage.party(session_id).await?;
            for character in party {
                let dex_mod = character.ability_modifier(Ability::Dexterity);
                let combatant = Combatant::new(&character.name, character.max_hp, dex_mod, true)
                    .with_character(character.id)
                    .with_current_hp(character.hp);
                seated.push(character.name.clone());
                ctx.combat
                    .with(ctx.channel_id, |encounter| {
                        encounter.add_combatant(combatant)
                    })
                    .await?;
            }
        }

        let party_line = if seated.is_empty() {
            "No party members joined yet.".to_string()
        } else {
            format!("Party: {}", seated.join(", "))
        };
        Ok(format!(
            "Combat started! {description}\n{party_line}\nAdd enemies with add_combatant, then roll_initiative."
        ))
    }
}

/// Add a combatant (usually an enemy) to the encounter.
pub struct AddCombatant;

#[async_trait]
impl Tool for AddCombatant {
    fn name(&self) -> &str {
        "add_combatant"
    }

    fn description(&self) -> &str {
        "Add a combatant to the active encounter."
    }

    fn input_schema(&self) -> &Value {
        &ADD_COMBATANT_SCHEMA
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let name = str_arg(&args, "name")?.to_string();
        let hp = u32_arg(&args, "hp")? as i32;
        let initiative_bonus = opt_i64_arg(&args, "initiative_bonus").unwrap_or(0) as i32;
        let is_player = opt_bool_arg(&args, "is_player");

        let combatant = Combatant::new(&name, hp, initiative_bonus, is_player);
        ctx.combat
            .with(ctx.channel_id, |encounter| encounter.add_combatant(combatant))
            .await?;

        Ok(format!("Added {name} to combat (HP: {hp})"))
    }
}

/// Roll initiative for everyone and fix the turn order.
pub struct RollInitiative;

#[async_trait]
impl Tool for RollInitiative {
    fn name(&self) -> &str {
        "roll_initiative"
    }

    fn description(&self) -> &str {
        "Roll 1d20 + modifier initiative for every combatant and set the turn order."
    }

    fn input_schema(&self) -> &Value {
        &EMPTY_SCHEMA
    }

    async fn execute(&self, _args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let order = ctx
            .combat
            .with(ctx.channel_id, |encounter| {
                encounter.roll_initiative(&mut rand::thread_rng())
            })
            .await?;

        let mut lines = vec!["**Initiative order:**".to_string()];
        for (i, (name, initiative)) in order.iter().enumerate() {
            lines.push(format!("{}. {} ({})", i + 1, name, initiative));
        }
        Ok(lines.join("\n"))
    }
}

async fn change_hp(
    ctx: &ToolContext,
    target: &str,
    delta: i32,
) -> Result<(gm_core::combat::HpChange, Option<i64>), ToolError> {
    let target = target.to_string();
    let (change, character_id) = ctx
        .combat
        .with(ctx.channel_id, |encounter| {
            let change = encounter.apply_hp_delta(&target, delta)?;
            let character_id = encounter
                .combatant(&target)
                .and_then(|c| c.character_id);
            Ok::<_, ToolError>((change, character_id))
        })
        .await??;

    // Mirror player HP back to the authoritative character record.
    if let Some(character_id) = character_id {
        ctx.storage.set_hp(character_id, change.new_hp).await?;
    }
    Ok((change, character_id))
}

/// Deal damage to a combatant.
pub struct DealDamage;

#[async_trait]
impl Tool for DealDamage {
    fn name(&self) -> &str {
        "deal_damage"
    }

    fn description(&self) -> &str {
        "Deal damage to a combatant in the active encounter. HP is clamped at 0."
    }

    fn input_schema(&self) -> &Value {
        &DEAL_DAMAGE_SCHEMA
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let target = str_arg(&args, "target")?;
        let amount = u32_arg(&args, "amount")? as i32;
        let damage_type = opt_str_arg(&args, "damage_type").unwrap_or("physical");

        let (change, _) = change_hp(ctx, target, -amount).await?;
        let status = if change.newly_defeated {
            format!("**{target}** is down!")
        } else {
            format!("{}: {}/{} HP", target, change.new_hp, change.max_hp)
        };
        Ok(format!("Dealt {amount} {damage_type} damage to {target}! {status}"))
    }
}

/// Heal a combatant.
pub struct HealCombatant;

#[async_trait]
impl Tool for HealCombatant {
    fn name(&self) -> &str {
        "heal_combatant"
    }

    fn description(&self) -> &str {
        "Heal a combatant in the active encounter. HP is clamped at their maximum."
    }

    fn input_schema(&self) -> &Value {
        &HEAL_SCHEMA
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let target = str_arg(&args, "target")?;
        let amount = u32_arg(&args, "amount")? as i32;

        let (change, _) = change_hp(ctx, target, amount).await?;
        Ok(format!(
            "Healed {target} for {amount} HP! Now at {}/{} HP",
            change.new_hp, change.max_hp
        ))
    }
}

/// Apply a status effect.
pub struct ApplyStatus;

#[async_trait]
impl Tool for ApplyStatus {
    fn name(&self) -> &str {
        "apply_status"
    }

    fn description(&self) -> &str {
        "Apply a named status effect to a combatant, optionally for a number of rounds."
    }

    fn input_schema(&self) -> &Value {
        &APPLY_STATUS_SCHEMA
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let target = str_arg(&args, "target")?.to_string();
        let effect = str_arg(&args, "effect")?.to_string();
        let duration = opt_u32_arg(&args, "duration")?;

        let described = match duration {
            Some(rounds) => format!("{effect} for {rounds} rounds"),
            None => format!("{effect} until removed"),
        };

        ctx.combat
            .with(ctx.channel_id, |encounter| {
                encounter.apply_status(&target, &effect, duration)
            })
            .await??;

        Ok(format!("Applied {described} to {target}"))
    }
}

/// Remove a status effect.
pub struct RemoveStatus;

#[async_trait]
impl Tool for RemoveStatus {
    fn name(&self) -> &str {
        "remove_status"
    }

    fn description(&self) -> &str {
        "Remove a named status effect from a combatant."
    }

    fn input_schema(&self) -> &Value {
        &REMOVE_STATUS_SCHEMA
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let target = str_arg(&args, "target")?.to_string();
        let effect = str_arg(&args, "effect")?.to_string();

        let removed = ctx
            .combat
            .with(ctx.channel_id, |encounter| {
                encounter.remove_status(&target, &effect)
            })
            .await??;

        if removed {
            Ok(format!("Removed {effect} from {target}"))
        } else {
            Ok(format!("{target} does not have {effect}"))
        }
    }
}

/// Advance to the next living combatant's turn.
pub struct NextTurn;

#[async_trait]
impl Tool for NextTurn {
    fn name(&self) -> &str {
        "next_turn"
    }

    fn description(&self) -> &str {
        "Advance to the next living combatant's turn. Defeated combatants are skipped."
    }

    fn input_schema(&self) -> &Value {
        &EMPTY_SCHEMA
    }

    async fn execute(&self, _args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let (round, name, hp, max_hp) = ctx
            .combat
            .with(ctx.channel_id, |encounter| {
                let combatant = encounter.next_turn()?;
                let name = combatant.name.clone();
                let current_hp = combatant.current_hp;
                let max_hp = combatant.max_hp;
                Ok::<_, ToolError>((encounter.round, name, current_hp, max_hp))
            })
            .await??;

        Ok(format!("**Round {round}** - {name}'s turn! (HP: {hp}/{max_hp})"))
    }
}

/// Report the state of the encounter.
pub struct CombatStatus;

#[async_trait]
impl Tool for CombatStatus {
    fn name(&self) -> &str {
        "combat_status"
    }

    fn description(&self) -> &str {
        "Show the active encounter: round, turn order, HP, and status effects."
    }

    fn input_schema(&self) -> &Value {
        &EMPTY_SCHEMA
    }

    async fn execute(&self, _args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let report = ctx
            .combat
            .with(ctx.channel_id, |encounter| {
                let mut lines = vec![format!("**Combat status** (Round {})", encounter.round)];
                let current = encounter.current_combatant().map(|c| c.name.clone());
                for combatant in encounter.turn_order() {
                    let marker = if current.as_deref() == Some(combatant.name.as_str()) {
                        ">"
                    } else {
                        "-"
                    };
                    let defeated = if combatant.is_defeated() { " [down]" } else { "" };
                    let effects = if combatant.status_effects.is_empty() {
                        String::new()
                    } else {
                        let names: Vec<String> = combatant
                            .status_effects
                            .iter()
                            .map(|e| e.to_string())
                            .collect();
                        format!(" [{}]", names.join(", "))
                    };
                    lines.push(format!(
                        "{} {}: {}/{} HP{}{}",
                        marker,
                        combatant.name,
                        combatant.current_hp,
                        combatant.max_hp,
                        defeated,
                        effects
                    ));
                }
                lines.join("\n")
            })
            .await?;

        Ok(report)
    }
}

/// End the encounter, optionally granting XP to surviving players.
pub struct EndCombat;

#[async_trait]
impl Tool for EndCombat {
    fn name(&self) -> &str {
        "end_combat"
    }

    fn description(&self) -> &str {
        "End the active encounter, optionally granting XP to each surviving player."
    }

    fn input_schema(&self) -> &Value {
        &END_COMBAT_SCHEMA
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let outcome = opt_str_arg(&args, "outcome").unwrap_or("victory").to_string();
        let xp_reward = opt_u32_arg(&args, "xp_reward")?.unwrap_or(0);

        let encounter = ctx.combat.end(ctx.channel_id).await?;

        let mut lines = vec![format!("Combat ended! Outcome: {outcome}.")];
        if xp_reward > 0 {
            for survivor in encounter.surviving_players() {
                if let Some(character_id) = survivor.character_id {
                    let award = ctx.storage.add_experience(character_id, xp_reward).await?;
                    let mut line =
                        format!("{} earned {} XP (total {})", survivor.name, xp_reward, award.total_xp);
                    if award.leveled_up {
                        line.push_str(&format!(
                            ". LEVEL UP! Now level {} (+{} max HP)",
                            award.level, award.hp_increase
                        ));
                    }
                    lines.push(line);
                }
            }
        }

        if let Some(session_id) = ctx.session_id {
            let summary = format!(
                "Combat ended after {} rounds: {}",
                encounter.round, outcome
            );
            ctx.storage
                .add_story_entry(session_id, StoryKind::Combat, &summary)
                .await?;
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
        let ctx = testing::context(1, 100);
        let session = ctx.storage.create_session(1, "s").await.unwrap();
        ctx.storage
            .create_character(NewCharacter {
                owner_id: 100,
                channel_id: 1,
                name: "Thorin".to_string(),
                class_name: "Fighter".to_string(),
                race: "Dwarf".to_string(),
                max_hp: 20,
                gold: 10,
                scores: AbilityScores::default(),
            })
            .await
            .unwrap();
        let mut ctx = ctx;
        ctx.session_id = Some(session.id);
        (ctx, session.id)
    }

    #[tokio::test]
    async fn start_combat_seats_the_party_and_rejects_restart() {
        let (ctx, _) = seeded_ctx().await;
        let report = StartCombat.execute(json!({}), &ctx).await.unwrap();
        assert!(report.contains("Thorin"));

        let error = StartCombat.execute(json!({}), &ctx).await.unwrap_err();
        assert!(matches!(error, ToolError::Combat(_)));
    }

    #[tokio::test]
    async fn damage_marks_down_and_mirrors_player_hp() {
        let (ctx, _) = seeded_ctx().await;
        StartCombat.execute(json!({}), &ctx).await.unwrap();
        AddCombatant
            .execute(json!({"name": "Goblin", "hp": 7}), &ctx)
            .await
            .unwrap();

        let report = DealDamage
            .execute(json!({"target": "Goblin", "amount": 12}), &ctx)
            .await
            .unwrap();
        assert!(report.contains("is down"));

        DealDamage
            .execute(json!({"target": "Thorin", "amount": 5}), &ctx)
            .await
            .unwrap();
        let thorin = ctx.storage.active_character(100, 1).await.unwrap().unwrap();
        assert_eq!(thorin.hp, 15);
    }

    #[tokio::test]
    async fn full_encounter_flow() {
        let (ctx, _) = seeded_ctx().await;
        StartCombat.execute(json!({}), &ctx).await.unwrap();
        AddCombatant
            .execute(json!({"name": "Wolf", "hp": 11, "initiative_bonus": 2}), &ctx)
            .await
            .unwrap();

        let order = RollInitiative.execute(json!({}), &ctx).await.unwrap();
        assert!(order.contains("Initiative order"));

        ApplyStatus
            .execute(json!({"target": "Wolf", "effect": "poisoned", "duration": 3}), &ctx)
            .await
            .unwrap();
        let status = CombatStatus.execute(json!({}), &ctx).await.unwrap();
        assert!(status.contains("poisoned (3 rounds)"));

        let turn = NextTurn.execute(json!({}), &ctx).await.unwrap();
        assert!(turn.contains("turn!"));

        let report = EndCombat
            .execute(json!({"outcome": "victory", "xp_reward": 300}), &ctx)
            .await
            .unwrap();
        assert!(report.contains("Thorin earned 300 XP"));
        assert!(report.contains("LEVEL UP"));

        // Encounter is gone; the channel can fight again.
        assert!(StartCombat.execute(json!({}), &ctx).await.is_ok());
    }

    #[tokio::test]
    async fn next_turn_without_combat_is_an_error() {
        let ctx = testing::context(2, 100);
        let error = NextTurn.execute(json!({}), &ctx).await.unwrap_err();
        assert!(matches!(error, ToolError::Combat(_)));
    }
}
