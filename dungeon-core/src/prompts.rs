//! Prompt templates.
//!
//! Templates live in `prompts/*.txt` and use `{name}` placeholders.

use crate::state::GameState;

const CHARACTER: &str = include_str!("prompts/character.txt");
const ENVIRONMENT: &str = include_str!("prompts/environment.txt");
const ACTION: &str = include_str!("prompts/action.txt");
const NPC_PERSONA: &str = include_str!("prompts/npc_persona.txt");
const NPC_DIALOGUE: &str = include_str!("prompts/npc_dialogue.txt");

/// Ask for a character sheet for `name`.
pub fn character(name: &str) -> String {
    fill(CHARACTER, &[("name", name)])
}

/// Ask for a description of the character's surroundings.
pub fn environment(state: &GameState) -> String {
    let pc = state.character();
    fill(
        ENVIRONMENT,
        &[
            ("name", pc.name.as_str()),
            ("race", pc.race.as_str()),
            ("class", pc.class.as_str()),
            ("location", state.location()),
        ],
    )
}

/// Ask for the immediate result of a player action.
pub fn action(state: &GameState, action: &str) -> String {
    let pc = state.character();
    fill(
        ACTION,
        &[
            ("name", pc.name.as_str()),
            ("race", pc.race.as_str()),
            ("class", pc.class.as_str()),
            ("action", action),
            ("location", state.location()),
        ],
    )
}

/// System turn that puts the model in the NPC's shoes.
pub fn npc_persona(npc: &str) -> String {
    fill(NPC_PERSONA, &[("npc", npc)])
}

/// Ask the NPC to answer something the player said.
pub fn npc_dialogue(state: &GameState, npc: &str, input: &str) -> String {
    fill(
        NPC_DIALOGUE,
        &[
            ("name", state.character().name.as_str()),
            ("npc", npc),
            ("input", input),
        ],
    )
}

/// Replace `{key}` placeholders in one pass.
///
/// Substituted values are not scanned again, so player text containing braces
/// is inserted verbatim. Unknown placeholders are left as they are.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replacement = after.find('}').and_then(|close| {
            let key = &after[..close];
            values
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v, close))
        });
        match replacement {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);

    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::Character;
    use crate::story::{INTERACT_OPPORTUNITY, NPC_INTERACTION_PREFIX, QUEST_OPPORTUNITY};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn state() -> GameState {
        let character = Character::from_sheet(
            "Lyra",
            "Race: Elf\nClass: Ranger",
            &mut StdRng::seed_from_u64(0),
        );
        GameState::new(character)
    }

    #[test]
    fn test_fill() {
        assert_eq!(fill("Hi {a}, {b}!", &[("a", "x"), ("b", "y")]), "Hi x, y!");
        assert_eq!(fill("{missing} {a", &[("a", "x")]), "{missing} {a");
        assert_eq!(fill("{a}", &[("a", "{a}")]), "{a}");
    }

    #[test]
    fn test_character_prompt() {
        let prompt = character("Lyra");
        assert!(prompt.contains("Name: Lyra"));
        assert!(prompt.contains("- Charisma: [value]"));
        assert!(!prompt.contains("{name}"));
    }

    #[test]
    fn test_environment_prompt_asks_for_tags() {
        let prompt = environment(&state());
        assert!(prompt.starts_with("The character Lyra is a Elf Ranger currently in the entrance."));
        assert!(prompt.contains(&format!("[{INTERACT_OPPORTUNITY}]")));
        assert!(prompt.contains(&format!("[{QUEST_OPPORTUNITY}]")));
    }

    #[test]
    fn test_action_prompt() {
        let prompt = action(&state(), "open the {rusty} gate");
        assert!(prompt.contains("attempts to open the {rusty} gate in entrance."));
        assert!(prompt.contains(&format!("[{NPC_INTERACTION_PREFIX} <npc_name>]")));
    }

    #[test]
    fn test_npc_prompts() {
        assert_eq!(
            npc_persona("Bob"),
            "You are Bob, speaking directly to the player. Respond naturally and in character."
        );
        let prompt = npc_dialogue(&state(), "Bob", "What do you sell?");
        assert!(prompt.starts_with("The player (Lyra) said to Bob: \"What do you sell?\""));
        assert!(prompt.ends_with("Respond as if you are Bob speaking directly to the player."));
    }
}
