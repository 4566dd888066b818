//! Story-state engine for an LLM-narrated text adventure.
//!
//! This crate provides:
//! - A bounded conversation history fed to the model on every call
//! - Parsing of generated character sheets into a [`Character`]
//! - Extraction of control tags (`[INTERACT_OPPORTUNITY]`, `[NPC_INTERACTION: …]`)
//!   from narration
//! - Keyword-based state updates from action outcomes
//! - The session loop alternating narration, player actions and NPC dialogue
//!
//! # Quick Start
//!
//! ```ignore
//! use dungeon_core::{GameConfig, ProviderGenerator, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GameConfig::from_env()?;
//!     let generator = ProviderGenerator::from_config(&config)?;
//!     let mut session = Session::new(generator, MyConsole::default());
//!
//!     let state = session.run(&mut rand::thread_rng()).await?;
//!     println!("{}", state.game);
//!     Ok(())
//! }
//! ```

pub mod character;
pub mod config;
pub mod console;
pub mod generator;
pub mod history;
pub mod outcome;
pub mod prompts;
pub mod providers;
pub mod server;
pub mod session;
pub mod state;
pub mod story;
pub mod testing;

// Primary public API
pub use character::Character;
pub use config::{ConfigError, GameConfig, Provider};
pub use console::Console;
pub use generator::{Channel, FragmentStream, Generator};
pub use history::{ConversationHistory, Role, Turn};
pub use outcome::{KeywordInterpreter, OutcomeInterpreter};
pub use providers::ProviderGenerator;
pub use server::{ModelServer, ServerConfig, ServerError};
pub use session::{Ending, Phase, Session, SessionError, SessionState};
pub use state::{GameState, StateUpdate};
pub use story::Narration;
pub use testing::{ScriptedConsole, ScriptedGenerator};
