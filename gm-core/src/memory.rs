//! In-memory storage implementation.
//!
//! Reference [`Storage`] backend used by tests and single-process
//! embeddings. All state lives behind one `RwLock`; ids are assigned from a
//! single monotonic counter so they are unique across record kinds.

use crate::storage::{Storage, StorageError, StorageResult};
use crate::types::{
    level_for_xp, Ability, AuthorId, ChannelId, Character, ItemStack, NewCharacter, NewNpc,
    NewQuest, Npc, Quest, QuestStatus, SessionRecord, SessionStatus, StoryEntry, StoryKind,
    XpAward,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    next_id: i64,
    sessions: HashMap<i64, SessionRecord>,
    active_sessions: HashMap<ChannelId, i64>,
    characters: HashMap<i64, Character>,
    active_characters: HashMap<(AuthorId, ChannelId), i64>,
    session_members: HashMap<i64, Vec<i64>>,
    inventories: HashMap<i64, Vec<ItemStack>>,
    quests: HashMap<i64, Quest>,
    npcs: HashMap<i64, Npc>,
    reputations: HashMap<(i64, i64), i32>,
    stories: HashMap<i64, Vec<StoryEntry>>,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory [`Storage`] backend.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn active_session(&self, channel: ChannelId) -> StorageResult<Option<SessionRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .active_sessions
            .get(&channel)
            .and_then(|id| inner.sessions.get(id))
            .cloned())
    }

    async fn create_session(&self, channel: ChannelId, name: &str) -> StorageResult<SessionRecord> {
        let mut inner = self.inner.write().await;
        if let Some(previous) = inner.active_sessions.get(&channel).copied() {
            if let Some(session) = inner.sessions.get_mut(&previous) {
                session.status = SessionStatus::Paused;
            }
        }
        let id = inner.next_id();
        let session = SessionRecord {
            id,
            channel_id: channel,
            name: name.to_string(),
            status: SessionStatus::Active,
        };
        inner.sessions.insert(id, session.clone());
        inner.active_sessions.insert(channel, id);
        inner.session_members.insert(id, Vec::new());
        Ok(session)
    }

    async fn set_session_status(&self, session: i64, status: SessionStatus) -> StorageResult<()> {
        let mut inner = self.inner.write().await;
        let record = inner
            .sessions
            .get_mut(&session)
            .ok_or_else(|| StorageError::not_found("session", session))?;
        record.status = status;
        if status != SessionStatus::Active {
            let channel = record.channel_id;
            if inner.active_sessions.get(&channel) == Some(&session) {
                inner.active_sessions.remove(&channel);
            }
        }
        Ok(())
    }

    async fn create_character(&self, character: NewCharacter) -> StorageResult<Character> {
        let mut inner = self.inner.write().await;
        let id = inner.next_id();
        let record = Character {
            id,
            owner_id: character.owner_id,
            name: character.name,
            class_name: character.class_name,
            race: character.race,
            level: 1,
            experience: 0,
            hp: character.max_hp,
            max_hp: character.max_hp,
            gold: character.gold,
            scores: character.scores,
        };
        inner.characters.insert(id, record.clone());
        inner
            .active_characters
            .insert((character.owner_id, character.channel_id), id);
        inner.inventories.insert(id, Vec::new());
        if let Some(session) = inner.active_sessions.get(&character.channel_id).copied() {
            inner.session_members.entry(session).or_default().push(id);
        }
        Ok(record)
    }

    async fn character(&self, id: i64) -> StorageResult<Character> {
        let inner = self.inner.read().await;
        inner
            .characters
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("character", id))
    }

    async fn active_character(
        &self,
        author: AuthorId,
        channel: ChannelId,
    ) -> StorageResult<Option<Character>> {
        let inner = self.inner.read().await;
        Ok(inner
            .active_characters
            .get(&(author, channel))
            .and_then(|id| inner.characters.get(id))
            .cloned())
    }

    async fn party(&self, session: i64) -> StorageResult<Vec<Character>> {
        let inner = self.inner.read().await;
        let members = inner
            .session_members
            .get(&session)
            .ok_or_else(|| StorageError::not_found("session", session))?;
        Ok(members
            .iter()
            .filter_map(|id| inner.characters.get(id))
            .cloned()
            .collect())
    }

    async fn set_hp(&self, id: i64, hp: i32) -> StorageResult<Character> {
        let mut inner = self.inner.write().await;
        let character = inner
            .characters
            .get_mut(&id)
            .ok_or_else(|| StorageError::not_found("character", id))?;
        character.hp = hp.clamp(0, character.max_hp);
        Ok(character.clone())
    }

    async fn add_experience(&self, id: i64, xp: u32) -> StorageResult<XpAward> {
        let mut inner = self.inner.write().await;
        let character = inner
            .characters
            .get_mut(&id)
            .ok_or_else(|| StorageError::not_found("character", id))?;

        character.experience += xp;
        let new_level = level_for_xp(character.experience);
        let leveled_up = new_level > character.level;
        let mut hp_increase = 0;
        if leveled_up {
            let con_mod = character.scores.modifier(Ability::Constitution);
            let per_level = (5 + con_mod).max(1);
            hp_increase = per_level * (new_level - character.level) as i32;
            character.level = new_level;
            character.max_hp += hp_increase;
            character.hp += hp_increase;
        }

        Ok(XpAward {
            xp_gained: xp,
            total_xp: character.experience,
            level: character.level,
            leveled_up,
            hp_increase,
        })
    }

    async fn adjust_gold(&self, id: i64, delta: i64) -> StorageResult<i64> {
        let mut inner = self.inner.write().await;
        let character = inner
            .characters
            .get_mut(&id)
            .ok_or_else(|| StorageError::not_found("character", id))?;
        let new_gold = character.gold + delta;
        if new_gold < 0 {
            return Err(StorageError::Conflict(format!(
                "{} has {} gold, cannot spend {}",
                character.name,
                character.gold,
                delta.abs()
            )));
        }
        character.gold = new_gold;
        Ok(new_gold)
    }

    async fn add_item(
        &self,
        character: i64,
        name: &str,
        kind: &str,
        quantity: u32,
    ) -> StorageResult<ItemStack> {
        let mut inner = self.inner.write().await;
        if !inner.characters.contains_key(&character) {
            return Err(StorageError::not_found("character", character));
        }
        let id = inner.next_id();
        let items = inner.inventories.entry(character).or_default();
        if let Some(stack) = items.iter_mut().find(|i| i.name.eq_ignore_ascii_case(name)) {
            stack.quantity += quantity;
            return Ok(stack.clone());
        }
        let stack = ItemStack {
            id,
            name: name.to_string(),
            kind: kind.to_string(),
            quantity,
        };
        items.push(stack.clone());
        Ok(stack)
    }

    async fn remove_item(&self, character: i64, name: &str, quantity: u32) -> StorageResult<()> {
        let mut inner = self.inner.write().await;
        let items = inner
            .inventories
            .get_mut(&character)
            .ok_or_else(|| StorageError::not_found("character", character))?;
        let stack = items
            .iter_mut()
            .find(|i| i.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| StorageError::Conflict(format!("no '{name}' in inventory")))?;
        if stack.quantity < quantity {
            return Err(StorageError::Conflict(format!(
                "only {} of '{}' in inventory",
                stack.quantity, name
            )));
        }
        stack.quantity -= quantity;
        if stack.quantity == 0 {
            items.retain(|i| !i.name.eq_ignore_ascii_case(name));
        }
        Ok(())
    }

    async fn inventory(&self, character: i64) -> StorageResult<Vec<ItemStack>> {
        let inner = self.inner.read().await;
        inner
            .inventories
            .get(&character)
            .cloned()
            .ok_or_else(|| StorageError::not_found("character", character))
    }

    async fn create_quest(&self, quest: NewQuest) -> StorageResult<Quest> {
        let mut inner = self.inner.write().await;
        if !inner.sessions.contains_key(&quest.session_id) {
            return Err(StorageError::not_found("session", quest.session_id));
        }
        let id = inner.next_id();
        let completed = vec![false; quest.objectives.len()];
        let record = Quest {
            id,
            session_id: quest.session_id,
            title: quest.title,
            description: quest.description,
            objectives: quest.objectives,
            completed,
            rewards: quest.rewards,
            status: QuestStatus::Active,
        };
        inner.quests.insert(id, record.clone());
        Ok(record)
    }

    async fn quest(&self, id: i64) -> StorageResult<Quest> {
        let inner = self.inner.read().await;
        inner
            .quests
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("quest", id))
    }

    async fn quests(&self, session: i64) -> StorageResult<Vec<Quest>> {
        let inner = self.inner.read().await;
        let mut quests: Vec<Quest> = inner
            .quests
            .values()
            .filter(|q| q.session_id == session)
            .cloned()
            .collect();
        quests.sort_by_key(|q| q.id);
        Ok(quests)
    }

    async fn complete_objective(&self, quest: i64, index: usize) -> StorageResult<Quest> {
        let mut inner = self.inner.write().await;
        let record = inner
            .quests
            .get_mut(&quest)
            .ok_or_else(|| StorageError::not_found("quest", quest))?;
        let flag = record.completed.get_mut(index).ok_or_else(|| {
            StorageError::Conflict(format!(
                "quest '{}' has no objective {}",
                record.title, index
            ))
        })?;
        *flag = true;
        Ok(record.clone())
    }

    async fn complete_quest(&self, quest: i64) -> StorageResult<Quest> {
        let mut inner = self.inner.write().await;
        let record = inner
            .quests
            .get_mut(&quest)
            .ok_or_else(|| StorageError::not_found("quest", quest))?;
        record.status = QuestStatus::Completed;
        Ok(record.clone())
    }

    async fn create_npc(&self, npc: NewNpc) -> StorageResult<Npc> {
        let mut inner = self.inner.write().await;
        if !inner.sessions.contains_key(&npc.session_id) {
            return Err(StorageError::not_found("session", npc.session_id));
        }
        let id = inner.next_id();
        let record = Npc {
            id,
            session_id: npc.session_id,
            name: npc.name,
            description: npc.description,
            personality: npc.personality,
            location: npc.location,
            merchant: npc.merchant,
        };
        inner.npcs.insert(id, record.clone());
        Ok(record)
    }

    async fn npc(&self, id: i64) -> StorageResult<Npc> {
        let inner = self.inner.read().await;
        inner
            .npcs
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("npc", id))
    }

    async fn npcs(&self, session: i64) -> StorageResult<Vec<Npc>> {
        let inner = self.inner.read().await;
        let mut npcs: Vec<Npc> = inner
            .npcs
            .values()
            .filter(|n| n.session_id == session)
            .cloned()
            .collect();
        npcs.sort_by_key(|n| n.id);
        Ok(npcs)
    }

    async fn reputation(&self, npc: i64, character: i64) -> StorageResult<i32> {
        let inner = self.inner.read().await;
        Ok(inner
            .reputations
            .get(&(npc, character))
            .copied()
            .unwrap_or(0))
    }

    async fn adjust_reputation(&self, npc: i64, character: i64, delta: i32) -> StorageResult<i32> {
        let mut inner = self.inner.write().await;
        if !inner.npcs.contains_key(&npc) {
            return Err(StorageError::not_found("npc", npc));
        }
        let entry = inner.reputations.entry((npc, character)).or_insert(0);
        *entry += delta;
        Ok(*entry)
    }

    async fn add_story_entry(
        &self,
        session: i64,
        kind: StoryKind,
        content: &str,
    ) -> StorageResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.sessions.contains_key(&session) {
            return Err(StorageError::not_found("session", session));
        }
        let id = inner.next_id();
        inner.stories.entry(session).or_default().push(StoryEntry {
            id,
            session_id: session,
            kind,
            content: content.to_string(),
            at: Utc::now(),
        });
        Ok(())
    }

    async fn story_log(&self, session: i64, limit: usize) -> StorageResult<Vec<StoryEntry>> {
        let inner = self.inner.read().await;
        let entries = inner.stories.get(&session).cloned().unwrap_or_default();
        let skip = entries.len().saturating_sub(limit);
        Ok(entries.into_iter().skip(skip).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AbilityScores, QuestRewards};

    fn hero(owner: AuthorId, channel: ChannelId, name: &str) -> NewCharacter {
        NewCharacter {
            owner_id: owner,
            channel_id: channel,
            name: name.to_string(),
            class_name: "Fighter".to_string(),
            race: "Dwarf".to_string(),
            max_hp: 20,
            gold: 50,
            scores: AbilityScores {
                constitution: 14,
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn session_switch_pauses_previous() {
        let store = MemoryStore::new();
        let first = store.create_session(1, "The Sunken Crypt").await.unwrap();
        let second = store.create_session(1, "The Iron Road").await.unwrap();

        let active = store.active_session(1).await.unwrap().unwrap();
        assert_eq!(active.id, second.id);

        store
            .set_session_status(second.id, SessionStatus::Completed)
            .await
            .unwrap();
        assert!(store.active_session(1).await.unwrap().is_none());

        // First session still exists, paused.
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn character_joins_active_session_party() {
        let store = MemoryStore::new();
        let session = store.create_session(1, "Opening Night").await.unwrap();
        let thorin = store.create_character(hero(100, 1, "Thorin")).await.unwrap();
        let mira = store.create_character(hero(101, 1, "Mira")).await.unwrap();

        let party = store.party(session.id).await.unwrap();
        assert_eq!(party.len(), 2);

        let active = store.active_character(100, 1).await.unwrap().unwrap();
        assert_eq!(active.id, thorin.id);
        assert_ne!(thorin.id, mira.id);
    }

    #[tokio::test]
    async fn experience_levels_up_and_raises_hp() {
        let store = MemoryStore::new();
        store.create_session(1, "s").await.unwrap();
        let thorin = store.create_character(hero(100, 1, "Thorin")).await.unwrap();

        let award = store.add_experience(thorin.id, 100).await.unwrap();
        assert!(!award.leveled_up);
        assert_eq!(award.level, 1);

        // 300 total XP crosses the level 2 threshold; CON 14 gives +7 HP.
        let award = store.add_experience(thorin.id, 200).await.unwrap();
        assert!(award.leveled_up);
        assert_eq!(award.level, 2);
        assert_eq!(award.hp_increase, 7);

        let character = store.character(thorin.id).await.unwrap();
        assert_eq!(character.max_hp, 27);
        assert_eq!(character.hp, 27);
    }

    #[tokio::test]
    async fn gold_cannot_go_negative() {
        let store = MemoryStore::new();
        store.create_session(1, "s").await.unwrap();
        let thorin = store.create_character(hero(100, 1, "Thorin")).await.unwrap();

        assert_eq!(store.adjust_gold(thorin.id, 25).await.unwrap(), 75);
        assert!(store.adjust_gold(thorin.id, -100).await.is_err());
        assert_eq!(store.adjust_gold(thorin.id, -75).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn items_stack_by_name() {
        let store = MemoryStore::new();
        store.create_session(1, "s").await.unwrap();
        let thorin = store.create_character(hero(100, 1, "Thorin")).await.unwrap();

        store
            .add_item(thorin.id, "Healing Potion", "consumable", 2)
            .await
            .unwrap();
        store
            .add_item(thorin.id, "healing potion", "consumable", 1)
            .await
            .unwrap();

        let items = store.inventory(thorin.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 3);

        store
            .remove_item(thorin.id, "Healing Potion", 3)
            .await
            .unwrap();
        assert!(store.inventory(thorin.id).await.unwrap().is_empty());
        assert!(store.remove_item(thorin.id, "Healing Potion", 1).await.is_err());
    }

    #[tokio::test]
    async fn quest_objectives_complete_by_index() {
        let store = MemoryStore::new();
        let session = store.create_session(1, "s").await.unwrap();
        let quest = store
            .create_quest(NewQuest {
                session_id: session.id,
                title: "Clear the Mine".to_string(),
                description: "Something stirs below.".to_string(),
                objectives: vec!["Find the entrance".to_string(), "Defeat the broodmother".to_string()],
                rewards: QuestRewards {
                    gold: 100,
                    xp: 250,
                    items: vec!["Miner's Charm".to_string()],
                },
            })
            .await
            .unwrap();

        let quest = store.complete_objective(quest.id, 0).await.unwrap();
        assert!(!quest.all_objectives_complete());
        let quest = store.complete_objective(quest.id, 1).await.unwrap();
        assert!(quest.all_objectives_complete());
        assert!(store.complete_objective(quest.id, 5).await.is_err());
    }

    #[tokio::test]
    async fn reputation_starts_neutral_and_accumulates() {
        let store = MemoryStore::new();
        let session = store.create_session(1, "s").await.unwrap();
        let npc = store
            .create_npc(NewNpc {
                session_id: session.id,
                name: "Greta".to_string(),
                description: "Keeper of the Lantern Inn".to_string(),
                personality: "warm but shrewd".to_string(),
                location: Some("Lantern Inn".to_string()),
                merchant: true,
            })
            .await
            .unwrap();

        assert_eq!(store.reputation(npc.id, 1).await.unwrap(), 0);
        assert_eq!(store.adjust_reputation(npc.id, 1, 15).await.unwrap(), 15);
        assert_eq!(store.adjust_reputation(npc.id, 1, -5).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn story_log_keeps_most_recent() {
        let store = MemoryStore::new();
        let session = store.create_session(1, "s").await.unwrap();
        for i in 0..5 {
            store
                .add_story_entry(session.id, StoryKind::Narration, &format!("chapter {i}"))
                .await
                .unwrap();
        }

        let log = store.story_log(session.id, 2).await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].content, "chapter 3");
        assert_eq!(log[1].content, "chapter 4");
    }
}
