//! Domain records shared between the tools, storage, and orchestration.
//!
//! All records are keyed by opaque integer ids owned by the storage
//! collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Channel identifier (opaque, assigned by the transport).
pub type ChannelId = i64;

/// Player/author identifier (opaque, assigned by the transport).
pub type AuthorId = i64;

/// The six ability scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityScores {
    pub strength: i32,
    pub dexterity: i32,
    pub constitution: i32,
    pub intelligence: i32,
    pub wisdom: i32,
    pub charisma: i32,
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self {
            strength: 10,
            dexterity: 10,
            constitution: 10,
            intelligence: 10,
            wisdom: 10,
            charisma: 10,
        }
    }
}

impl AbilityScores {
    /// Score for an ability.
    pub fn score(&self, ability: Ability) -> i32 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Dexterity => self.dexterity,
            Ability::Constitution => self.constitution,
            Ability::Intelligence => self.intelligence,
            Ability::Wisdom => self.wisdom,
            Ability::Charisma => self.charisma,
        }
    }

    /// Standard modifier: `(score - 10) / 2`, rounded down.
    pub fn modifier(&self, ability: Ability) -> i32 {
        (self.score(ability) - 10).div_euclid(2)
    }
}

/// An ability name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ability {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

impl FromStr for Ability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strength" | "str" => Ok(Ability::Strength),
            "dexterity" | "dex" => Ok(Ability::Dexterity),
            "constitution" | "con" => Ok(Ability::Constitution),
            "intelligence" | "int" => Ok(Ability::Intelligence),
            "wisdom" | "wis" => Ok(Ability::Wisdom),
            "charisma" | "cha" => Ok(Ability::Charisma),
            other => Err(format!("unknown ability '{other}'")),
        }
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Ability::Strength => "strength",
            Ability::Dexterity => "dexterity",
            Ability::Constitution => "constitution",
            Ability::Intelligence => "intelligence",
            Ability::Wisdom => "wisdom",
            Ability::Charisma => "charisma",
        };
        write!(f, "{name}")
    }
}

/// A player character record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    pub id: i64,
    pub owner_id: AuthorId,
    pub name: String,
    pub class_name: String,
    pub race: String,
    pub level: u32,
    pub experience: u32,
    pub hp: i32,
    pub max_hp: i32,
    pub gold: i64,
    pub scores: AbilityScores,
}

impl Character {
    /// Modifier for the given ability.
    pub fn ability_modifier(&self, ability: Ability) -> i32 {
        self.scores.modifier(ability)
    }

    /// One-line summary for prompts and tool results.
    pub fn summary(&self) -> String {
        format!(
            "{} - Level {} {} {} | HP {}/{} | Gold {}",
            self.name, self.level, self.race, self.class_name, self.hp, self.max_hp, self.gold
        )
    }
}

/// Fields for creating a character.
#[derive(Debug, Clone)]
pub struct NewCharacter {
    pub owner_id: AuthorId,
    pub channel_id: ChannelId,
    pub name: String,
    pub class_name: String,
    pub race: String,
    pub max_hp: i32,
    pub gold: i64,
    pub scores: AbilityScores,
}

/// Outcome of granting experience, including any level-ups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XpAward {
    pub xp_gained: u32,
    pub total_xp: u32,
    pub level: u32,
    pub leveled_up: bool,
    pub hp_increase: i32,
}

/// XP required to reach each level (index = level - 1).
pub const XP_THRESHOLDS: [u32; 11] = [
    0, 300, 900, 2700, 6500, 14_000, 23_000, 34_000, 48_000, 64_000, 85_000,
];

/// Level earned by a total XP amount.
pub fn level_for_xp(xp: u32) -> u32 {
    let mut level = 1;
    while (level as usize) < XP_THRESHOLDS.len() && xp >= XP_THRESHOLDS[level as usize] {
        level += 1;
    }
    level
}

/// A stack of items in an inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemStack {
    pub id: i64,
    pub name: String,
    pub kind: String,
    pub quantity: u32,
}

/// Lifecycle of a quest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestStatus {
    Available,
    Active,
    Completed,
}

/// Rewards granted when a quest completes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestRewards {
    pub gold: i64,
    pub xp: u32,
    pub items: Vec<String>,
}

/// A quest with an ordered objective list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quest {
    pub id: i64,
    pub session_id: i64,
    pub title: String,
    pub description: String,
    pub objectives: Vec<String>,
    /// Completion flags, parallel to `objectives`.
    pub completed: Vec<bool>,
    pub rewards: QuestRewards,
    pub status: QuestStatus,
}

impl Quest {
    /// Whether every objective is complete.
    pub fn all_objectives_complete(&self) -> bool {
        !self.completed.is_empty() && self.completed.iter().all(|&done| done)
    }
}

/// Fields for creating a quest.
#[derive(Debug, Clone)]
pub struct NewQuest {
    pub session_id: i64,
    pub title: String,
    pub description: String,
    pub objectives: Vec<String>,
    pub rewards: QuestRewards,
}

/// A non-player character.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Npc {
    pub id: i64,
    pub session_id: i64,
    pub name: String,
    pub description: String,
    pub personality: String,
    pub location: Option<String>,
    pub merchant: bool,
}

/// Fields for creating an NPC.
#[derive(Debug, Clone)]
pub struct NewNpc {
    pub session_id: i64,
    pub name: String,
    pub description: String,
    pub personality: String,
    pub location: Option<String>,
    pub merchant: bool,
}

/// Disposition band for a reputation value.
pub fn disposition(reputation: i32) -> &'static str {
    match reputation {
        r if r < -30 => "hostile",
        r if r < -10 => "unfriendly",
        r if r < 10 => "neutral",
        r if r < 30 => "friendly",
        _ => "devoted",
    }
}

/// Lifecycle of a play session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Inactive,
    Active,
    Paused,
    Completed,
}

/// A play session bound to a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: i64,
    pub channel_id: ChannelId,
    pub name: String,
    pub status: SessionStatus,
}

/// Kind of story log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryKind {
    Narration,
    Combat,
    Dialogue,
    Discovery,
    Milestone,
}

impl FromStr for StoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "narration" => Ok(StoryKind::Narration),
            "combat" => Ok(StoryKind::Combat),
            "dialogue" => Ok(StoryKind::Dialogue),
            "discovery" => Ok(StoryKind::Discovery),
            "milestone" => Ok(StoryKind::Milestone),
            other => Err(format!("unknown story entry kind '{other}'")),
        }
    }
}

/// One entry in a session's story log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryEntry {
    pub id: i64,
    pub session_id: i64,
    pub kind: StoryKind,
    pub content: String,
    pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ability_modifiers_round_down() {
        let scores = AbilityScores {
            strength: 16,
            dexterity: 9,
            constitution: 7,
            ..Default::default()
        };
        assert_eq!(scores.modifier(Ability::Strength), 3);
        assert_eq!(scores.modifier(Ability::Dexterity), -1);
        assert_eq!(scores.modifier(Ability::Constitution), -2);
        assert_eq!(scores.modifier(Ability::Wisdom), 0);
    }

    #[test]
    fn level_thresholds() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(299), 1);
        assert_eq!(level_for_xp(300), 2);
        assert_eq!(level_for_xp(900), 3);
        assert_eq!(level_for_xp(1_000_000), 11);
    }

    #[test]
    fn disposition_bands() {
        assert_eq!(disposition(-50), "hostile");
        assert_eq!(disposition(-20), "unfriendly");
        assert_eq!(disposition(0), "neutral");
        assert_eq!(disposition(15), "friendly");
        assert_eq!(disposition(60), "devoted");
    }

    #[test]
    fn ability_parses_short_names() {
        assert_eq!("dex".parse::<Ability>().unwrap(), Ability::Dexterity);
        assert_eq!("Wisdom".parse::<Ability>().unwrap(), Ability::Wisdom);
        assert!("luck".parse::<Ability>().is_err());
    }
}
