//! Runtime configuration.

use std::time::Duration;

/// Tunables for the game master.
#[derive(Debug, Clone)]
pub struct GmConfig {
    /// Model passed to the generator.
    pub model: String,
    /// Max tokens per generation round.
    pub max_tokens: usize,
    /// Sampling temperature.
    pub temperature: f32,
    /// Quiet period before a channel's pending messages flush as one batch.
    pub batch_delay: Duration,
    /// Hard bound on tool-calling rounds per batch.
    pub max_tool_rounds: usize,
    /// Conversation turns retained per channel.
    pub max_history_turns: usize,
}

impl Default for GmConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 1024,
            temperature: 0.8,
            batch_delay: Duration::from_secs(3),
            max_tool_rounds: 5,
            max_history_turns: 50,
        }
    }
}

impl GmConfig {
    /// Load configuration from the environment, falling back to defaults.
    ///
    /// Reads `GM_MODEL`, `GM_MAX_TOKENS`, `GM_TEMPERATURE`,
    /// `GM_BATCH_DELAY_MS`, `GM_MAX_TOOL_ROUNDS`, `GM_MAX_HISTORY_TURNS`.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut config = Self::default();

        if let Ok(model) = std::env::var("GM_MODEL") {
            config.model = model;
        }
        if let Some(max_tokens) = env_parse("GM_MAX_TOKENS") {
            config.max_tokens = max_tokens;
        }
        if let Some(temperature) = env_parse("GM_TEMPERATURE") {
            config.temperature = temperature;
        }
        if let Some(ms) = env_parse("GM_BATCH_DELAY_MS") {
            config.batch_delay = Duration::from_millis(ms);
        }
        if let Some(rounds) = env_parse("GM_MAX_TOOL_ROUNDS") {
            config.max_tool_rounds = rounds;
        }
        if let Some(turns) = env_parse("GM_MAX_HISTORY_TURNS") {
            config.max_history_turns = turns;
        }

        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
