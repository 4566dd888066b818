//! AI Dungeon Master console game.
//!
//! Narration and NPC dialogue are streamed from the providers configured in
//! the environment (see `dungeon_core::config`). A `.env` file in the working
//! directory is loaded first if present.
//!
//! ```bash
//! NARRATION_PROVIDER=ollama DIALOGUE_PROVIDER=ollama cargo run -p dungeon
//! ```
//!
//! Logs go to stderr; set `RUST_LOG=dungeon_core=debug` to follow the loop.

mod terminal;

use dungeon_core::{GameConfig, ModelServer, ProviderGenerator, ServerConfig, Session};
use terminal::Terminal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = GameConfig::from_env()?;
    let generator = match ProviderGenerator::from_config(&config) {
        Ok(generator) => generator,
        Err(llm::Error::NoApiKey) => {
            eprintln!("Error: an API key is missing for the configured providers.");
            eprintln!(
                "Set OPENAI_API_KEY / REPLICATE_API_KEY in .env, or choose ollama with \
                 NARRATION_PROVIDER and DIALOGUE_PROVIDER."
            );
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    let mut terminal = Terminal::stdio(config.text_delay);
    terminal.print_slowly("Welcome to the AI Dungeon Master!");
    terminal.print_slowly("Prepare for an adventure guided by multiple AI models.");
    terminal.print_slowly("Type 'quit' at any time to exit the game.");
    println!();

    let server = if config.uses_local_server() {
        let server_config = ServerConfig::ollama(&config.ollama.base_url, config.ready_timeout);
        Some(ModelServer::ensure_ready(&server_config).await?)
    } else {
        None
    };

    let mut session = Session::new(generator, terminal);
    let result = session.run(&mut rand::thread_rng()).await;

    if let Some(server) = server {
        server.teardown().await;
    }
    let state = result?;
    tracing::info!(ending = ?state.ending(), health = state.game.health(), "game finished");

    let mut terminal = session.into_console();
    terminal.print_slowly("Thank you for playing AI Dungeon Master!");
    Ok(())
}
