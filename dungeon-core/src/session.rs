//! The game loop.
//!
//! A [`Session`] owns the collaborators (generator, console, outcome
//! interpreter). Everything that changes during play lives in a
//! [`SessionState`] that is passed to each [`Session::step`].
//!
//! ```text
//! character creation
//!        │
//!        ▼
//! EnvironmentNarration ──► AwaitAction ──"quit"──► Terminated(Quit)
//!        ▲                     │
//!        │                     ▼
//!        │             ActionResolution ──NPC tag──► Conversation
//!        │                     │                        │
//!        └──── end of cycle ◄──┴────────────────────────┘
//!                     │
//!                health 0 ──► Terminated(Died)
//! ```

use crate::character::Character;
use crate::console::Console;
use crate::generator::{drain, Channel, Generator};
use crate::history::{ConversationHistory, Role};
use crate::outcome::{KeywordInterpreter, OutcomeInterpreter};
use crate::prompts;
use crate::state::GameState;
use crate::story::{self, Narration, INTERACT_OPPORTUNITY, QUEST_OPPORTUNITY};
use rand::Rng;
use thiserror::Error;

/// Command that ends the game.
pub const QUIT_COMMAND: &str = "quit";

/// Command that ends an NPC conversation.
pub const END_CONVERSATION_COMMAND: &str = "end conversation";

/// Name used when the player gives none.
pub const DEFAULT_CHARACTER_NAME: &str = "Adventurer";

/// Errors that end a session abnormally.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Generation failed: {0}")]
    Generation(#[from] llm::Error),

    #[error("Console error: {0}")]
    Console(#[from] std::io::Error),
}

/// Why the game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ending {
    /// The player typed `quit`.
    Quit,
    /// Health reached zero.
    Died,
}

/// Where the loop is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    EnvironmentNarration,
    AwaitAction,
    ActionResolution { action: String },
    Conversation { npc: String },
    Terminated(Ending),
}

/// Mutable state of one playthrough.
#[derive(Debug)]
pub struct SessionState {
    pub history: ConversationHistory,
    pub game: GameState,
    pub phase: Phase,
    /// Raw environment narration for the current cycle.
    pub environment: Option<String>,
}

impl SessionState {
    pub fn new(character: Character, history: ConversationHistory) -> Self {
        Self {
            history,
            game: GameState::new(character),
            phase: Phase::EnvironmentNarration,
            environment: None,
        }
    }

    pub fn ending(&self) -> Option<Ending> {
        match self.phase {
            Phase::Terminated(ending) => Some(ending),
            _ => None,
        }
    }
}

/// Drives a game with a generator, a console and an outcome interpreter.
pub struct Session<G, C> {
    generator: G,
    console: C,
    interpreter: Box<dyn OutcomeInterpreter>,
}

impl<G: Generator, C: Console> Session<G, C> {
    /// Create a session using the keyword outcome interpreter.
    pub fn new(generator: G, console: C) -> Self {
        Self {
            generator,
            console,
            interpreter: Box::new(KeywordInterpreter::new()),
        }
    }

    /// Replace the outcome interpreter.
    pub fn with_interpreter(mut self, interpreter: impl OutcomeInterpreter + 'static) -> Self {
        self.interpreter = Box::new(interpreter);
        self
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn into_console(self) -> C {
        self.console
    }

    /// Play a whole game: create a character, then step until terminated.
    pub async fn run(&mut self, rng: &mut impl Rng) -> Result<SessionState, SessionError> {
        self.console.announce("Welcome to the Dungeon!");
        let mut history = ConversationHistory::new();
        let character = self.create_character(&mut history, rng).await?;
        tracing::info!(name = %character.name, race = %character.race, class = %character.class, "character created");

        let mut state = SessionState::new(character, history);
        self.console.announce("\nYour adventure begins...");

        while state.ending().is_none() {
            self.step(&mut state).await?;
        }

        tracing::info!(ending = ?state.ending(), "session over");
        Ok(state)
    }

    /// Ask for a name, have the narrator write a sheet, and parse it.
    pub async fn create_character(
        &mut self,
        history: &mut ConversationHistory,
        rng: &mut impl Rng,
    ) -> Result<Character, SessionError> {
        self.console.announce("Let's create your character!");
        let name = self.console.read_line("What is your character's name? ")?;
        let name = match name.trim() {
            "" => DEFAULT_CHARACTER_NAME,
            name => name,
        };

        history.append(Role::User, prompts::character(name));
        let sheet = self.generate(history, Channel::Narration).await?;

        Ok(Character::from_sheet(name, &sheet, rng))
    }

    /// Advance `state` by one phase.
    pub async fn step(&mut self, state: &mut SessionState) -> Result<(), SessionError> {
        tracing::debug!(phase = ?state.phase, turns = state.history.len(), "step");

        state.phase = match state.phase.clone() {
            Phase::EnvironmentNarration => {
                self.narrate_environment(state).await?;
                Phase::AwaitAction
            }
            Phase::AwaitAction => {
                let action = self.console.read_line("\nWhat do you do? ")?;
                if action.trim().eq_ignore_ascii_case(QUIT_COMMAND) {
                    Phase::Terminated(Ending::Quit)
                } else {
                    Phase::ActionResolution { action }
                }
            }
            Phase::ActionResolution { action } => match self.resolve_action(state, &action).await? {
                Some(npc) => Phase::Conversation { npc },
                None => self.end_cycle(state),
            },
            Phase::Conversation { npc } => {
                self.converse(state, &npc).await?;
                self.end_cycle(state)
            }
            terminated @ Phase::Terminated(_) => terminated,
        };

        Ok(())
    }

    async fn narrate_environment(&mut self, state: &mut SessionState) -> Result<(), SessionError> {
        self.console.separator();

        let raw = match state.environment.clone() {
            Some(cached) => {
                self.console.present(&cached);
                self.console.end_reply();
                cached
            }
            None => {
                state
                    .history
                    .append(Role::User, prompts::environment(&state.game));
                let raw = self.generate(&mut state.history, Channel::Narration).await?;
                state.environment = Some(raw.clone());
                raw
            }
        };

        let narration = story::process(&raw);
        if narration.has_flag(INTERACT_OPPORTUNITY) {
            self.console
                .announce("\nThere seems to be an opportunity to interact.");
        }
        if narration.has_flag(QUEST_OPPORTUNITY) {
            self.console.announce("\nThere might be a quest available.");
        }
        Ok(())
    }

    /// Narrate the outcome of `action` and apply it. Returns the NPC to talk
    /// to, if the outcome started a conversation.
    async fn resolve_action(
        &mut self,
        state: &mut SessionState,
        action: &str,
    ) -> Result<Option<String>, SessionError> {
        self.console.announce("\nOutcome:");
        state
            .history
            .append(Role::User, prompts::action(&state.game, action));
        let raw = self.generate(&mut state.history, Channel::Narration).await?;

        let narration = story::process(&raw);
        self.interpreter.interpret(narration.content(), &mut state.game);

        Ok(match narration {
            Narration::NpcInteraction { npc_name, .. } => Some(npc_name),
            Narration::Plain { .. } => None,
        })
    }

    /// Talk to `npc` until the player ends the conversation.
    async fn converse(&mut self, state: &mut SessionState, npc: &str) -> Result<(), SessionError> {
        self.console
            .announce(&format!("\nYou are now in conversation with {npc}."));
        state.history.reset(prompts::npc_persona(npc));

        let prompt =
            format!("\nWhat do you say to {npc}? (or type '{END_CONVERSATION_COMMAND}' to stop): ");
        loop {
            let said = self.console.read_line(&prompt)?;
            if said.trim().eq_ignore_ascii_case(END_CONVERSATION_COMMAND) {
                self.console
                    .announce(&format!("\nYou end your conversation with {npc}."));
                return Ok(());
            }

            self.console.announce(&format!("\n{npc}:"));
            state
                .history
                .append(Role::User, prompts::npc_dialogue(&state.game, npc, &said));
            self.generate(&mut state.history, Channel::Dialogue).await?;
        }
    }

    /// Show the state, then either end the game or start a fresh cycle.
    fn end_cycle(&mut self, state: &mut SessionState) -> Phase {
        self.console.separator();
        self.console
            .announce(&format!("Current state: {}", state.game));

        if state.game.is_dead() {
            self.console.announce("Game Over! Your health reached 0.");
            return Phase::Terminated(Ending::Died);
        }

        state.environment = None;
        Phase::EnvironmentNarration
    }

    /// Generate a reply to `history`, present it as it streams, and record it.
    async fn generate(
        &mut self,
        history: &mut ConversationHistory,
        channel: Channel,
    ) -> Result<String, SessionError> {
        let stream = self.generator.generate(history.snapshot(), channel).await?;
        let console = &mut self.console;
        let text = drain(stream, |fragment| console.present(fragment)).await?;
        console.end_reply();

        if !text.is_empty() {
            history.append(Role::Assistant, text.as_str());
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedConsole, ScriptedGenerator};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn state() -> SessionState {
        let character = Character::from_sheet(
            "Lyra",
            "Race: Elf\nClass: Ranger",
            &mut StdRng::seed_from_u64(5),
        );
        SessionState::new(character, ConversationHistory::new())
    }

    #[tokio::test]
    async fn test_empty_name_uses_default() {
        let generator = ScriptedGenerator::new().reply("Race: Dwarf\nClass: Cleric");
        let mut session = Session::new(generator, ScriptedConsole::new(["   "]));
        let mut history = ConversationHistory::new();

        let character = session
            .create_character(&mut history, &mut StdRng::seed_from_u64(1))
            .await
            .unwrap();

        assert_eq!(character.name, DEFAULT_CHARACTER_NAME);
        assert_eq!(character.race, "Dwarf");
        assert_eq!(history.len(), 2);
        assert_eq!(history.snapshot()[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_cached_environment_is_not_regenerated() {
        let generator = ScriptedGenerator::new();
        let mut session = Session::new(generator, ScriptedConsole::new(Vec::<String>::new()));
        let mut state = state();
        state.environment = Some("A quiet glade.\n[QUEST_OPPORTUNITY]".to_string());

        session.step(&mut state).await.unwrap();

        assert_eq!(state.phase, Phase::AwaitAction);
        assert!(session.generator().calls().is_empty());
        assert!(session.console().announced("There might be a quest available."));
        assert!(state.history.is_empty());
    }

    #[tokio::test]
    async fn test_quit_is_case_insensitive() {
        let mut session = Session::new(ScriptedGenerator::new(), ScriptedConsole::new(["  QUIT "]));
        let mut state = state();
        state.phase = Phase::AwaitAction;

        session.step(&mut state).await.unwrap();

        assert_eq!(state.ending(), Some(Ending::Quit));
    }

    #[tokio::test]
    async fn test_action_without_npc_ends_cycle() {
        let generator = ScriptedGenerator::new().reply("You found a silver key. It hurts, damage taken.");
        let mut session = Session::new(generator, ScriptedConsole::new(Vec::<String>::new()));
        let mut state = state();
        state.environment = Some("A vault.".to_string());
        state.phase = Phase::ActionResolution {
            action: "search the vault".to_string(),
        };

        session.step(&mut state).await.unwrap();

        assert_eq!(state.phase, Phase::EnvironmentNarration);
        assert_eq!(state.environment, None);
        assert_eq!(state.game.inventory(), ["a silver key"]);
        assert_eq!(state.game.health(), 90);
        assert_eq!(state.game.experience(), 5);
        assert!(session.console().announced("Current state: Name: Lyra"));
    }

    #[tokio::test]
    async fn test_terminated_step_is_a_no_op() {
        let mut session = Session::new(ScriptedGenerator::new(), ScriptedConsole::new(["look"]));
        let mut state = state();
        state.phase = Phase::Terminated(Ending::Died);

        session.step(&mut state).await.unwrap();

        assert_eq!(state.ending(), Some(Ending::Died));
        assert_eq!(session.console().unread(), 1);
    }
}
