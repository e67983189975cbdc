//! System prompts and scripted fallback lines.

/// Fallback narrative when the generator fails outright.
pub const GENERATOR_FALLBACK: &str =
    "*The Game Master pauses, gathering their thoughts. Give them a moment, then try again.*";

/// Fallback narrative when the tool-calling round cap is reached.
pub const ROUND_CAP_FALLBACK: &str =
    "*The Game Master shuffles through their notes, lost in the rules for a moment. The story presses on regardless.*";

/// Fallback narrative for an empty generator reply.
pub const SILENT_FALLBACK: &str = "*The Game Master considers the party in silence.*";

/// Build the game master system prompt.
///
/// `game_context` carries the current character/party/quest/combat summary;
/// `multi_player` adds handling instructions for batched actions from more
/// than one player.
pub fn system_prompt(game_context: &str, multi_player: bool) -> String {
    let multi_player_section = if multi_player {
        MULTI_PLAYER_INSTRUCTIONS
    } else {
        ""
    };

    format!(
        r#"You are an expert Game Master running a tabletop adventure over chat.

## Your Role
1. Narrate the world vividly and immersively
2. Control all NPCs with distinct personalities
3. Adjudicate rules fairly and accurately
4. React dynamically to player choices
{multi_player_section}
## Current Game State
{game_context}

## Rules Enforcement

ALWAYS use the appropriate tools for:
- Dice rolls (attacks, saves, checks, damage)
- HP changes (damage, healing)
- Status effect application/removal
- Combat actions, inventory, quests, and NPCs

NEVER skip dice rolls. The dice tell the story.

## Response Style
- Be descriptive but concise
- Use present tense for narration
- End every response with a prompt for player action to keep the game moving
"#
    )
}

const MULTI_PLAYER_INSTRUCTIONS: &str = r#"
## Multiple Players Acted This Turn
Each action below is prefixed with the acting player's name. Handle every
player's action in sequence:
1. Acknowledge each declared action by name
2. Roll any needed checks for the specific player taking that action
3. Describe results for each player separately but within one scene
4. Keep the party together unless they explicitly split up
5. End with a prompt that addresses the whole party
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_player_section_is_conditional() {
        let solo = system_prompt("HP 10/10", false);
        let party = system_prompt("HP 10/10", true);
        assert!(!solo.contains("Multiple Players"));
        assert!(party.contains("Multiple Players"));
        assert!(party.contains("HP 10/10"));
    }
}
