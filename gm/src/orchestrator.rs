//! The game master: batch in, narrative out.
//!
//! One batch of player messages becomes one combined player turn, then a
//! bounded loop mediates between the generator and the tool registry. The
//! generator either answers with narrative text (done) or requests tool
//! calls, which execute sequentially; their results feed the next round.
//! The loop is hard-bounded, and every failure path degrades to a scripted
//! in-character line; players never see a raw error.

use crate::config::GmConfig;
use crate::history::{HistoryManager, Turn, TurnRole};
use crate::prompts;
use crate::queue::{BatchHandler, PendingMessage};
use crate::tools::{game_tools, ToolContext, ToolRegistry};
use crate::transport::Transport;
use async_trait::async_trait;
use gm_core::combat::CombatTracker;
use gm_core::storage::Storage;
use gm_core::types::ChannelId;
use llm::{ContentBlock, GenerationRequest, Generator, Message};
use std::sync::Arc;

/// The orchestration core. Owns per-channel history and combat state;
/// storage, generator, and transport are collaborators.
pub struct GameMaster {
    config: GmConfig,
    generator: Arc<dyn Generator>,
    storage: Arc<dyn Storage>,
    transport: Arc<dyn Transport>,
    history: HistoryManager,
    combat: Arc<CombatTracker>,
    tools: ToolRegistry,
}

impl GameMaster {
    /// Assemble a game master from its collaborators.
    pub fn new(
        config: GmConfig,
        generator: Arc<dyn Generator>,
        storage: Arc<dyn Storage>,
        transport: Arc<dyn Transport>,
    ) -> Arc<Self> {
        let history = HistoryManager::new(config.max_history_turns);
        Arc::new(Self {
            config,
            generator,
            storage,
            transport,
            history,
            combat: Arc::new(CombatTracker::new()),
            tools: game_tools(),
        })
    }

    /// Conversation history access, mostly for tests and embedders.
    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    /// Turn one batch of player messages into a narrative reply.
    ///
    /// The reply is recorded as a narrator turn before being returned; the
    /// caller is responsible for delivering it.
    pub async fn respond_to_batch(
        &self,
        channel: ChannelId,
        batch: &[PendingMessage],
    ) -> String {
        let session_id = match self.storage.active_session(channel).await {
            Ok(session) => session.map(|s| s.id),
            Err(error) => {
                tracing::warn!(channel, %error, "failed to resolve active session");
                None
            }
        };

        let player_actions = batch
            .iter()
            .map(|m| format!("**{}** ({}): {}", m.display_name, m.character_name, m.content))
            .collect::<Vec<_>>()
            .join("\n");
        let combined = format!("[Player actions this turn]\n{player_actions}");

        self.history
            .append(channel, Turn::player(combined), session_id)
            .await;
        let turns = self.history.history(channel, session_id).await;

        let game_context = self
            .game_context(channel, batch.first().map(|m| m.author_id), session_id)
            .await;
        let system = prompts::system_prompt(&game_context, batch.len() > 1);

        let narrative = self
            .run_tool_loop(channel, session_id, batch, &system, turns)
            .await;

        self.history
            .append(channel, Turn::narrator(narrative.clone()), session_id)
            .await;
        narrative
    }

    async fn run_tool_loop(
        &self,
        channel: ChannelId,
        session_id: Option<i64>,
        batch: &[PendingMessage],
        system: &str,
        turns: Vec<Turn>,
    ) -> String {
        let mut messages = turns_to_messages(&turns);
        let ctx = ToolContext {
            channel_id: channel,
            author_id: batch.first().map(|m| m.author_id).unwrap_or_default(),
            session_id,
            storage: Arc::clone(&self.storage),
            combat: Arc::clone(&self.combat),
        };

        for round in 0..self.config.max_tool_rounds {
            let request = GenerationRequest::new(&self.config.model)
                .with_system(system)
                .with_messages(messages.clone())
                .with_max_tokens(self.config.max_tokens)
                .with_temperature(self.config.temperature)
                .with_tools(self.tools.definitions());

            let completion = match self.generator.generate(request).await {
                Ok(completion) => completion,
                Err(error) => {
                    tracing::error!(channel, round, %error, "generator call failed");
                    return prompts::GENERATOR_FALLBACK.to_string();
                }
            };

            let calls: Vec<(String, String, serde_json::Value)> = completion
                .message
                .tool_uses()
                .into_iter()
                .map(|(id, name, input)| (id.to_string(), name.to_string(), input.clone()))
                .collect();

            if calls.is_empty() {
                let text = completion.text();
                if text.trim().is_empty() {
                    return prompts::SILENT_FALLBACK.to_string();
                }
                tracing::debug!(channel, rounds = round + 1, "narrative produced");
                return text;
            }

            messages.push(completion.message.clone());
            let mut results = Vec::with_capacity(calls.len());
            for (call_id, name, input) in calls {
                let result = self.tools.execute(&name, input, &ctx).await;
                self.history
                    .append(
                        channel,
                        Turn::tool_result(format!("{name}: {result}")),
                        session_id,
                    )
                    .await;
                results.push(ContentBlock::tool_result(call_id, result, false));
            }
            messages.push(Message::tool_results(results));
        }

        tracing::warn!(
            channel,
            cap = self.config.max_tool_rounds,
            "tool round cap reached without a narrative"
        );
        prompts::ROUND_CAP_FALLBACK.to_string()
    }

    /// Summarize current game state for the system prompt.
    async fn game_context(
        &self,
        channel: ChannelId,
        author_id: Option<i64>,
        session_id: Option<i64>,
    ) -> String {
        let mut parts = Vec::new();

        if let Some(author_id) = author_id {
            if let Ok(Some(character)) = self.storage.active_character(author_id, channel).await {
                parts.push(format!("Acting player's character: {}", character.summary()));
            }
        }

        if let Some(session_id) = session_id {
            if let Ok(party) = self.storage.party(session_id).await {
                if !party.is_empty() {
                    let roster = party
                        .iter()
                        .map(|c| format!("- {} [ID: {}]", c.summary(), c.id))
                        .collect::<Vec<_>>()
                        .join("\n");
                    parts.push(format!("Party:\n{roster}"));
                }
            }
            if let Ok(quests) = self.storage.quests(session_id).await {
                let active: Vec<String> = quests
                    .iter()
                    .filter(|q| q.status == gm_core::types::QuestStatus::Active)
                    .map(|q| format!("- [{}] {}", q.id, q.title))
                    .collect();
                if !active.is_empty() {
                    parts.push(format!("Active quests:\n{}", active.join("\n")));
                }
            }
        }

        if let Ok(summary) = self
            .combat
            .with(channel, |encounter| {
                let roster = encounter
                    .turn_order()
                    .iter()
                    .map(|c| {
                        format!(
                            "- {}: {}/{} HP{}",
                            c.name,
                            c.current_hp,
                            c.max_hp,
                            if c.is_defeated() { " [down]" } else { "" }
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                format!("Combat is ACTIVE (round {}):\n{}", encounter.round, roster)
            })
            .await
        {
            parts.push(summary);
        }

        if parts.is_empty() {
            "No character, party, or combat yet.".to_string()
        } else {
            parts.join("\n\n")
        }
    }
}

fn turns_to_messages(turns: &[Turn]) -> Vec<Message> {
    turns
        .iter()
        .map(|turn| match turn.role {
            TurnRole::Player => Message::user(turn.content.clone()),
            TurnRole::Narrator => Message::assistant(turn.content.clone()),
            TurnRole::ToolResult => Message::user(format!("[Game mechanics] {}", turn.content)),
        })
        .collect()
}

#[async_trait]
impl BatchHandler for GameMaster {
    async fn handle_batch(&self, channel: ChannelId, batch: Vec<PendingMessage>) {
        if batch.is_empty() {
            return;
        }

        // Typing indicator is presentation only; its failures are ignored.
        let _ = self.transport.set_typing(channel, true).await;
        let narrative = self.respond_to_batch(channel, &batch).await;
        if let Err(error) = self.transport.send(channel, &narrative).await {
            tracing::error!(channel, %error, "failed to deliver narrative");
        }
        let _ = self.transport.set_typing(channel, false).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RecordingTransport;
    use gm_core::MemoryStore;
    use llm::ScriptedGenerator;

    fn game_master(generator: Arc<ScriptedGenerator>) -> (Arc<GameMaster>, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::new());
        let gm = GameMaster::new(
            GmConfig::default(),
            generator,
            Arc::new(MemoryStore::new()),
            Arc::clone(&transport) as Arc<dyn Transport>,
        );
        (gm, transport)
    }

    fn batch_of_one(content: &str) -> Vec<PendingMessage> {
        vec![PendingMessage::new(100, "Sam", "Thorin", content)]
    }

    #[tokio::test]
    async fn plain_reply_ends_after_one_round() {
        let generator = Arc::new(ScriptedGenerator::new());
        generator.push_text("The door creaks open.");
        let (gm, _) = game_master(Arc::clone(&generator));

        let reply = gm.respond_to_batch(1, &batch_of_one("I open the door")).await;
        assert_eq!(reply, "The door creaks open.");
        assert_eq!(generator.call_count(), 1);

        // Player turn and narrator turn are both recorded.
        let turns = gm.history().history(1, None).await;
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, TurnRole::Player);
        assert_eq!(turns[1].role, TurnRole::Narrator);
    }

    #[tokio::test]
    async fn endless_tool_calls_stop_at_the_cap() {
        let generator = Arc::new(ScriptedGenerator::new());
        for i in 0..10 {
            let call_id = format!("call_{i}");
            generator.push_tool_calls(vec![(
                call_id.as_str(),
                "roll_dice",
                serde_json::json!({"expression": "1d6"}),
            )]);
        }
        let (gm, _) = game_master(Arc::clone(&generator));

        let reply = gm.respond_to_batch(1, &batch_of_one("keep rolling")).await;
        assert_eq!(reply, prompts::ROUND_CAP_FALLBACK);
        assert_eq!(generator.call_count(), 5);
    }

    #[tokio::test]
    async fn generator_failure_degrades_to_fallback() {
        let generator = Arc::new(ScriptedGenerator::new());
        generator.push_error(llm::LlmError::Api {
            status: 401,
            message: "bad key".to_string(),
        });
        let (gm, _) = game_master(Arc::clone(&generator));

        let reply = gm.respond_to_batch(1, &batch_of_one("hello?")).await;
        assert_eq!(reply, prompts::GENERATOR_FALLBACK);
    }

    #[tokio::test]
    async fn empty_reply_degrades_to_silence_line() {
        let generator = Arc::new(ScriptedGenerator::new());
        generator.push_text("");
        let (gm, _) = game_master(Arc::clone(&generator));

        let reply = gm.respond_to_batch(1, &batch_of_one("...")).await;
        assert_eq!(reply, prompts::SILENT_FALLBACK);
    }

    #[tokio::test]
    async fn tool_round_feeds_results_back() {
        let generator = Arc::new(ScriptedGenerator::new());
        generator.push_tool_calls(vec![(
            "call_1",
            "roll_dice",
            serde_json::json!({"expression": "2d6+1", "purpose": "perception"}),
        )]);
        generator.push_text("You spot the tripwire.");
        let (gm, _) = game_master(Arc::clone(&generator));

        let reply = gm.respond_to_batch(1, &batch_of_one("I look around")).await;
        assert_eq!(reply, "You spot the tripwire.");
        assert_eq!(generator.call_count(), 2);

        // Second request carries the assistant tool-call record and result.
        let second = &generator.requests()[1];
        assert!(second.messages.iter().any(|m| m.has_tool_use()));
        let has_result = second.messages.iter().any(|m| {
            m.content
                .iter()
                .any(|b| matches!(b, ContentBlock::ToolResult { .. }))
        });
        assert!(has_result);

        // Tool execution leaves a condensed tool-result turn in history.
        let turns = gm.history().history(1, None).await;
        assert!(turns.iter().any(|t| t.role == TurnRole::ToolResult));
    }

    #[tokio::test]
    async fn unknown_tool_keeps_the_loop_alive() {
        let generator = Arc::new(ScriptedGenerator::new());
        generator.push_tool_calls(vec![("call_1", "summon_dragon", serde_json::json!({}))]);
        generator.push_text("Nothing happens.");
        let (gm, _) = game_master(Arc::clone(&generator));

        let reply = gm.respond_to_batch(1, &batch_of_one("summon a dragon")).await;
        assert_eq!(reply, "Nothing happens.");

        let second = &generator.requests()[1];
        let carries_error = second.messages.iter().any(|m| {
            m.content.iter().any(|b| match b {
                ContentBlock::ToolResult { content, .. } => content.contains("unknown tool"),
                _ => false,
            })
        });
        assert!(carries_error);
    }

    #[tokio::test]
    async fn multi_player_batch_becomes_one_turn() {
        let generator = Arc::new(ScriptedGenerator::new());
        generator.push_text("Chaos erupts.");
        let (gm, _) = game_master(Arc::clone(&generator));

        let batch = vec![
            PendingMessage::new(100, "Sam", "Thorin", "I attack"),
            PendingMessage::new(101, "Alex", "Mira", "I cast fireball"),
        ];
        gm.respond_to_batch(1, &batch).await;

        let request = &generator.requests()[0];
        let player_turn = request.messages.first().unwrap().text_content();
        assert!(player_turn.contains("**Sam** (Thorin): I attack"));
        assert!(player_turn.contains("**Alex** (Mira): I cast fireball"));
        assert!(request.system.as_deref().unwrap().contains("Multiple Players"));
    }
}
