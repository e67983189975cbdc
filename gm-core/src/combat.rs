//! Combat encounter state machine.
//!
//! An encounter belongs to one channel: a round counter, a list of
//! combatants in insertion order, and a turn order produced by rolling
//! initiative. HP mutations are clamped to `[0, max]`; a combatant at 0 HP
//! is defeated but stays visible in the encounter. Turn advancement rotates
//! through living combatants only and bumps the round counter when it wraps.

use crate::dice::DiceExpression;
use crate::types::ChannelId;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Error type for combat operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CombatError {
    #[error("Combat is already active in this channel")]
    AlreadyActive,
    #[error("No active combat in this channel")]
    NoEncounter,
    #[error("No combatant named '{0}'")]
    CombatantNotFound(String),
    #[error("No living combatants remain")]
    NoLivingCombatants,
}

/// A named status effect with an optional duration in rounds.
///
/// Durations are bookkeeping only; expiry is evaluated by the caller on
/// turn advancement, never automatically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEffect {
    pub name: String,
    pub duration: Option<u32>,
}

impl fmt::Display for StatusEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.duration {
            Some(rounds) => write!(f, "{} ({} rounds)", self.name, rounds),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Result of an HP mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HpChange {
    pub old_hp: i32,
    pub new_hp: i32,
    pub max_hp: i32,
    /// True when this change took the combatant from living to defeated.
    pub newly_defeated: bool,
}

/// One participant in an encounter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Combatant {
    pub name: String,
    pub current_hp: i32,
    pub max_hp: i32,
    pub initiative_mod: i32,
    /// Rolled initiative; `None` until initiative is rolled.
    pub initiative: Option<i32>,
    pub is_player: bool,
    /// Backing character record, for players.
    pub character_id: Option<i64>,
    pub status_effects: Vec<StatusEffect>,
}

impl Combatant {
    /// Create a combatant with full HP.
    pub fn new(name: impl Into<String>, max_hp: i32, initiative_mod: i32, is_player: bool) -> Self {
        Self {
            name: name.into(),
            current_hp: max_hp,
            max_hp,
            initiative_mod,
            initiative: None,
            is_player,
            character_id: None,
            status_effects: Vec::new(),
        }
    }

    /// Attach the backing character id.
    pub fn with_character(mut self, character_id: i64) -> Self {
        self.character_id = Some(character_id);
        self
    }

    /// Set current HP below max (wounded entry into combat).
    pub fn with_current_hp(mut self, hp: i32) -> Self {
        self.current_hp = hp.clamp(0, self.max_hp);
        self
    }

    /// Whether this combatant is at 0 HP.
    pub fn is_defeated(&self) -> bool {
        self.current_hp <= 0
    }

    /// Apply a signed HP delta, clamped to `[0, max_hp]`.
    pub fn apply_hp_delta(&mut self, delta: i32) -> HpChange {
        let old_hp = self.current_hp;
        self.current_hp = (self.current_hp + delta).clamp(0, self.max_hp);
        HpChange {
            old_hp,
            new_hp: self.current_hp,
            max_hp: self.max_hp,
            newly_defeated: old_hp > 0 && self.current_hp == 0,
        }
    }
}

/// A combat encounter for one channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Encounter {
    pub id: Uuid,
    pub channel_id: ChannelId,
    pub session_id: Option<i64>,
    /// Current round, starting at 1.
    pub round: u32,
    /// Index into `order` for the combatant whose turn it is.
    turn_index: usize,
    /// Turn order as indices into `combatants`. Insertion order until
    /// initiative is rolled.
    order: Vec<usize>,
    combatants: Vec<Combatant>,
}

impl Encounter {
    /// Create an empty encounter.
    pub fn new(channel_id: ChannelId, session_id: Option<i64>) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel_id,
            session_id,
            round: 1,
            turn_index: 0,
            order: Vec::new(),
            combatants: Vec::new(),
        }
    }

    /// Add a combatant. Order of addition breaks initiative ties.
    pub fn add_combatant(&mut self, combatant: Combatant) {
        self.order.push(self.combatants.len());
        self.combatants.push(combatant);
    }

    /// All combatants in insertion order.
    pub fn combatants(&self) -> &[Combatant] {
        &self.combatants
    }

    /// Look up a combatant by name (case-insensitive).
    pub fn combatant(&self, name: &str) -> Option<&Combatant> {
        self.combatants
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Mutable lookup by name (case-insensitive).
    pub fn combatant_mut(&mut self, name: &str) -> Option<&mut Combatant> {
        self.combatants
            .iter_mut()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Roll `1d20 + modifier` initiative for every combatant and sort the
    /// turn order descending, ties broken by insertion order.
    pub fn roll_initiative<R: Rng>(&mut self, rng: &mut R) -> Vec<(String, i32)> {
        let d20 = DiceExpression {
            count: 1,
            sides: 20,
            modifier: 0,
            keep: None,
            original: "1d20".to_string(),
        };
        for combatant in &mut self.combatants {
            let roll = d20.roll_with_rng(rng);
            combatant.initiative = Some(roll.total + combatant.initiative_mod);
        }

        self.order = (0..self.combatants.len()).collect();
        // Stable sort keeps insertion order for equal initiatives.
        self.order
            .sort_by_key(|&i| std::cmp::Reverse(self.combatants[i].initiative.unwrap_or(0)));
        self.turn_index = 0;

        self.order
            .iter()
            .map(|&i| {
                let c = &self.combatants[i];
                (c.name.clone(), c.initiative.unwrap_or(0))
            })
            .collect()
    }

    /// Turn order as combatant references.
    pub fn turn_order(&self) -> Vec<&Combatant> {
        self.order.iter().map(|&i| &self.combatants[i]).collect()
    }

    /// The combatant whose turn it currently is.
    pub fn current_combatant(&self) -> Option<&Combatant> {
        self.order
            .get(self.turn_index)
            .map(|&i| &self.combatants[i])
    }

    /// Apply a signed HP delta to a named combatant.
    pub fn apply_hp_delta(&mut self, name: &str, delta: i32) -> Result<HpChange, CombatError> {
        let combatant = self
            .combatant_mut(name)
            .ok_or_else(|| CombatError::CombatantNotFound(name.to_string()))?;
        Ok(combatant.apply_hp_delta(delta))
    }

    /// Apply a status effect to a named combatant.
    pub fn apply_status(
        &mut self,
        name: &str,
        effect: impl Into<String>,
        duration: Option<u32>,
    ) -> Result<(), CombatError> {
        let combatant = self
            .combatant_mut(name)
            .ok_or_else(|| CombatError::CombatantNotFound(name.to_string()))?;
        combatant.status_effects.push(StatusEffect {
            name: effect.into(),
            duration,
        });
        Ok(())
    }

    /// Remove a named status effect from a combatant. Returns whether
    /// anything was removed.
    pub fn remove_status(&mut self, name: &str, effect: &str) -> Result<bool, CombatError> {
        let combatant = self
            .combatant_mut(name)
            .ok_or_else(|| CombatError::CombatantNotFound(name.to_string()))?;
        let before = combatant.status_effects.len();
        combatant
            .status_effects
            .retain(|e| !e.name.eq_ignore_ascii_case(effect));
        Ok(combatant.status_effects.len() != before)
    }

    /// Advance to the next living combatant's turn, incrementing the round
    /// counter each time the rotation wraps past the end of the order.
    pub fn next_turn(&mut self) -> Result<&Combatant, CombatError> {
        if !self.combatants.iter().any(|c| !c.is_defeated()) {
            return Err(CombatError::NoLivingCombatants);
        }

        loop {
            self.turn_index += 1;
            if self.turn_index >= self.order.len() {
                self.turn_index = 0;
                self.round += 1;
            }
            let combatant = &self.combatants[self.order[self.turn_index]];
            if !combatant.is_defeated() {
                return Ok(&self.combatants[self.order[self.turn_index]]);
            }
        }
    }

    /// Surviving player combatants, for XP distribution at encounter end.
    pub fn surviving_players(&self) -> Vec<&Combatant> {
        self.combatants
            .iter()
            .filter(|c| c.is_player && !c.is_defeated())
            .collect()
    }
}

/// Per-channel encounter tracker: at most one active encounter per channel,
/// single-owner behind one lock.
#[derive(Default)]
pub struct CombatTracker {
    encounters: Mutex<HashMap<ChannelId, Encounter>>,
}

impl CombatTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an encounter for a channel, rejecting if one is active.
    pub async fn start(
        &self,
        channel_id: ChannelId,
        session_id: Option<i64>,
    ) -> Result<Uuid, CombatError> {
        let mut encounters = self.encounters.lock().await;
        if encounters.contains_key(&channel_id) {
            return Err(CombatError::AlreadyActive);
        }
        let encounter = Encounter::new(channel_id, session_id);
        let id = encounter.id;
        encounters.insert(channel_id, encounter);
        tracing::info!(channel = channel_id, encounter = %id, "combat started");
        Ok(id)
    }

    /// Whether a channel has an active encounter.
    pub async fn is_active(&self, channel_id: ChannelId) -> bool {
        self.encounters.lock().await.contains_key(&channel_id)
    }

    /// Run a closure against the channel's encounter.
    pub async fn with<R>(
        &self,
        channel_id: ChannelId,
        f: impl FnOnce(&mut Encounter) -> R,
    ) -> Result<R, CombatError> {
        let mut encounters = self.encounters.lock().await;
        let encounter = encounters
            .get_mut(&channel_id)
            .ok_or(CombatError::NoEncounter)?;
        Ok(f(encounter))
    }

    /// End the channel's encounter, returning its final state.
    pub async fn end(&self, channel_id: ChannelId) -> Result<Encounter, CombatError> {
        let mut encounters = self.encounters.lock().await;
        let encounter = encounters
            .remove(&channel_id)
            .ok_or(CombatError::NoEncounter)?;
        tracing::info!(channel = channel_id, encounter = %encounter.id, "combat ended");
        Ok(encounter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sample_encounter() -> Encounter {
        let mut encounter = Encounter::new(1, None);
        encounter.add_combatant(Combatant::new("Thorin", 20, 2, true).with_character(10));
        encounter.add_combatant(Combatant::new("Goblin", 7, 1, false));
        encounter.add_combatant(Combatant::new("Wolf", 11, 3, false));
        encounter
    }

    #[test]
    fn damage_clamps_at_zero_and_reports_defeat() {
        let mut encounter = sample_encounter();
        let change = encounter.apply_hp_delta("Goblin", -50).unwrap();
        assert_eq!(change.new_hp, 0);
        assert!(change.newly_defeated);
        assert!(encounter.combatant("Goblin").unwrap().is_defeated());

        // Already defeated: no second defeat transition.
        let change = encounter.apply_hp_delta("Goblin", -5).unwrap();
        assert_eq!(change.new_hp, 0);
        assert!(!change.newly_defeated);
    }

    #[test]
    fn healing_clamps_at_max() {
        let mut encounter = sample_encounter();
        encounter.apply_hp_delta("Thorin", -8).unwrap();
        let change = encounter.apply_hp_delta("Thorin", 100).unwrap();
        assert_eq!(change.new_hp, 20);
    }

    #[test]
    fn unknown_combatant_is_an_error() {
        let mut encounter = sample_encounter();
        assert_eq!(
            encounter.apply_hp_delta("Dragon", -5),
            Err(CombatError::CombatantNotFound("Dragon".to_string()))
        );
    }

    #[test]
    fn initiative_sorts_descending_with_stable_ties() {
        let mut encounter = sample_encounter();
        let mut rng = StdRng::seed_from_u64(5);
        let order = encounter.roll_initiative(&mut rng);
        assert_eq!(order.len(), 3);
        for pair in order.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }

        // Force a tie and confirm insertion order breaks it.
        let mut tied = Encounter::new(2, None);
        tied.add_combatant(Combatant::new("First", 10, 0, true));
        tied.add_combatant(Combatant::new("Second", 10, 0, true));
        for c in &mut tied.combatants {
            c.initiative = Some(12);
        }
        tied.order = (0..tied.combatants.len()).collect();
        tied.order
            .sort_by_key(|&i| std::cmp::Reverse(tied.combatants[i].initiative.unwrap_or(0)));
        let names: Vec<_> = tied.turn_order().iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, vec!["First", "Second"]);
    }

    #[test]
    fn next_turn_skips_defeated_and_counts_rounds() {
        let mut encounter = sample_encounter();
        let mut rng = StdRng::seed_from_u64(11);
        encounter.roll_initiative(&mut rng);
        assert_eq!(encounter.round, 1);

        // Drop the second combatant in turn order.
        let second_name = encounter.turn_order()[1].name.clone();
        encounter.apply_hp_delta(&second_name, -100).unwrap();

        let first_name = encounter.turn_order()[0].name.clone();
        let third_name = encounter.turn_order()[2].name.clone();

        let next = encounter.next_turn().unwrap().name.clone();
        assert_eq!(next, third_name);
        assert_eq!(encounter.round, 1);

        // Wrapping back to the top increments the round exactly once.
        let next = encounter.next_turn().unwrap().name.clone();
        assert_eq!(next, first_name);
        assert_eq!(encounter.round, 2);
    }

    #[test]
    fn next_turn_with_no_survivors_errors() {
        let mut encounter = sample_encounter();
        for name in ["Thorin", "Goblin", "Wolf"] {
            encounter.apply_hp_delta(name, -100).unwrap();
        }
        assert!(matches!(
            encounter.next_turn(),
            Err(CombatError::NoLivingCombatants)
        ));
    }

    #[test]
    fn status_effects_apply_and_remove() {
        let mut encounter = sample_encounter();
        encounter.apply_status("Wolf", "poisoned", Some(3)).unwrap();
        encounter.apply_status("Wolf", "prone", None).unwrap();
        assert_eq!(encounter.combatant("Wolf").unwrap().status_effects.len(), 2);

        assert!(encounter.remove_status("Wolf", "Poisoned").unwrap());
        assert!(!encounter.remove_status("Wolf", "poisoned").unwrap());
        assert_eq!(encounter.combatant("Wolf").unwrap().status_effects.len(), 1);
    }

    #[tokio::test]
    async fn tracker_rejects_double_start() {
        let tracker = CombatTracker::new();
        tracker.start(7, None).await.unwrap();
        assert_eq!(tracker.start(7, None).await, Err(CombatError::AlreadyActive));

        // Other channels are independent.
        tracker.start(8, None).await.unwrap();

        tracker.end(7).await.unwrap();
        assert!(tracker.start(7, None).await.is_ok());
    }

    #[tokio::test]
    async fn tracker_end_without_start_errors() {
        let tracker = CombatTracker::new();
        assert!(matches!(tracker.end(9).await, Err(CombatError::NoEncounter)));
    }

    #[test]
    fn surviving_players_excludes_defeated_and_enemies() {
        let mut encounter = sample_encounter();
        encounter.add_combatant(Combatant::new("Mira", 15, 1, true).with_character(11));
        encounter.apply_hp_delta("Thorin", -100).unwrap();

        let survivors: Vec<_> = encounter
            .surviving_players()
            .iter()
            .map(|c| c.name.clone())
            .collect();
        assert_eq!(survivors, vec!["Mira"]);
    }
}
