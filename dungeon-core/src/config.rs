//! Runtime configuration read from the environment.

use crate::generator::Channel;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_REPLICATE_BASE_URL: &str = "https://openai-proxy.replicate.com/v1";
pub const DEFAULT_REPLICATE_MODEL: &str = "meta/meta-llama-3-8b-instruct";
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3";

const DEFAULT_READY_TIMEOUT_SECS: u64 = 30;
const DEFAULT_TEXT_DELAY_MS: u64 = 30;

/// Errors from reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown provider: {0} (expected openai, replicate or ollama)")]
    UnknownProvider(String),

    #[error("Invalid value for {var}: {value}")]
    InvalidNumber { var: &'static str, value: String },
}

/// A model backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    OpenAi,
    Replicate,
    Ollama,
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "replicate" => Ok(Provider::Replicate),
            "ollama" => Ok(Provider::Ollama),
            _ => Err(ConfigError::UnknownProvider(s.to_string())),
        }
    }
}

impl Provider {
    /// Name of the variable holding this provider's API key, if it needs one.
    pub fn key_var(self) -> Option<&'static str> {
        match self {
            Provider::OpenAi => Some("OPENAI_API_KEY"),
            Provider::Replicate => Some("REPLICATE_API_KEY"),
            Provider::Ollama => None,
        }
    }
}

/// Where a provider lives and which model it serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub base_url: String,
    pub model: String,
}

/// Everything the binary needs to start a game.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub narration: Provider,
    pub dialogue: Provider,
    pub openai: Endpoint,
    pub replicate: Endpoint,
    pub ollama: Endpoint,
    /// How long to wait for a local model server to come up.
    pub ready_timeout: Duration,
    /// Pause after each presented fragment.
    pub text_delay: Duration,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            narration: Provider::OpenAi,
            dialogue: Provider::Replicate,
            openai: Endpoint {
                base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
                model: DEFAULT_OPENAI_MODEL.to_string(),
            },
            replicate: Endpoint {
                base_url: DEFAULT_REPLICATE_BASE_URL.to_string(),
                model: DEFAULT_REPLICATE_MODEL.to_string(),
            },
            ollama: Endpoint {
                base_url: DEFAULT_OLLAMA_BASE_URL.to_string(),
                model: DEFAULT_OLLAMA_MODEL.to_string(),
            },
            ready_timeout: Duration::from_secs(DEFAULT_READY_TIMEOUT_SECS),
            text_delay: Duration::from_millis(DEFAULT_TEXT_DELAY_MS),
        }
    }
}

impl GameConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read configuration through `lookup`, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |var: &str, default: &str| lookup(var).unwrap_or_else(|| default.to_string());
        let number = |var: &'static str, default: u64| -> Result<u64, ConfigError> {
            match lookup(var) {
                Some(value) => value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidNumber { var, value }),
                None => Ok(default),
            }
        };

        Ok(Self {
            narration: lookup("NARRATION_PROVIDER")
                .map(|p| p.parse::<Provider>())
                .transpose()?
                .unwrap_or(defaults.narration),
            dialogue: lookup("DIALOGUE_PROVIDER")
                .map(|p| p.parse::<Provider>())
                .transpose()?
                .unwrap_or(defaults.dialogue),
            openai: Endpoint {
                base_url: text("OPENAI_BASE_URL", &defaults.openai.base_url),
                model: text("OPENAI_MODEL", &defaults.openai.model),
            },
            replicate: Endpoint {
                base_url: text("REPLICATE_BASE_URL", &defaults.replicate.base_url),
                model: text("REPLICATE_MODEL", &defaults.replicate.model),
            },
            ollama: Endpoint {
                base_url: text("OLLAMA_BASE_URL", &defaults.ollama.base_url),
                model: text("OLLAMA_MODEL", &defaults.ollama.model),
            },
            ready_timeout: Duration::from_secs(number(
                "OLLAMA_READY_TIMEOUT_SECS",
                DEFAULT_READY_TIMEOUT_SECS,
            )?),
            text_delay: Duration::from_millis(number("DUNGEON_TEXT_DELAY_MS", DEFAULT_TEXT_DELAY_MS)?),
        })
    }

    /// The provider serving `channel`.
    pub fn provider_for(&self, channel: Channel) -> Provider {
        match channel {
            Channel::Narration => self.narration,
            Channel::Dialogue => self.dialogue,
        }
    }

    pub fn endpoint(&self, provider: Provider) -> &Endpoint {
        match provider {
            Provider::OpenAi => &self.openai,
            Provider::Replicate => &self.replicate,
            Provider::Ollama => &self.ollama,
        }
    }

    /// Whether any channel runs on the local Ollama server.
    pub fn uses_local_server(&self) -> bool {
        self.narration == Provider::Ollama || self.dialogue == Provider::Ollama
    }
}
