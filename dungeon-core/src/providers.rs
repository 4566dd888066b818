//! [`Generator`] backed by real model providers.

use crate::config::{GameConfig, Provider};
use crate::generator::{Channel, FragmentStream, Generator};
use crate::history::Turn;
use async_trait::async_trait;
use futures::TryStreamExt;
use llm::{Client, Message, Request, StreamEvent};

/// Streams replies from the provider configured for each channel.
#[derive(Clone)]
pub struct ProviderGenerator {
    narration: Client,
    dialogue: Client,
}

impl ProviderGenerator {
    /// Build one client per channel.
    ///
    /// Fails with [`llm::Error::NoApiKey`] if a hosted provider is selected
    /// and its key variable is unset.
    pub fn from_config(config: &GameConfig) -> Result<Self, llm::Error> {
        Ok(Self {
            narration: client_for(config, config.provider_for(Channel::Narration))?,
            dialogue: client_for(config, config.provider_for(Channel::Dialogue))?,
        })
    }

    /// Use explicit clients, e.g. pointed at a test server.
    pub fn with_clients(narration: Client, dialogue: Client) -> Self {
        Self {
            narration,
            dialogue,
        }
    }

    fn client(&self, channel: Channel) -> &Client {
        match channel {
            Channel::Narration => &self.narration,
            Channel::Dialogue => &self.dialogue,
        }
    }
}

#[async_trait]
impl Generator for ProviderGenerator {
    async fn generate(
        &self,
        history: &[Turn],
        channel: Channel,
    ) -> Result<FragmentStream, llm::Error> {
        let client = self.client(channel);
        tracing::debug!(
            %channel,
            model = client.model(),
            turns = history.len(),
            "starting generation"
        );

        let request = Request::new(history.iter().map(Message::from).collect());
        let events = client.stream(request).await?;

        let fragments = events.try_filter_map(|event| async move {
            Ok(match event {
                StreamEvent::TextDelta { text } => Some(text),
                StreamEvent::Finish { .. } | StreamEvent::Done => None,
            })
        });

        Ok(Box::pin(fragments))
    }
}

fn client_for(config: &GameConfig, provider: Provider) -> Result<Client, llm::Error> {
    let endpoint = config.endpoint(provider);
    match provider.key_var() {
        Some(key_var) => Client::from_env(&endpoint.base_url, key_var, endpoint.model.clone()),
        // Ollama serves the OpenAI-compatible API under /v1.
        None => Ok(Client::new(
            &format!("{}/v1", endpoint.base_url.trim_end_matches('/')),
            None,
            endpoint.model.clone(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_needs_no_key() {
        let config = GameConfig {
            narration: Provider::Ollama,
            dialogue: Provider::Ollama,
            ..GameConfig::default()
        };
        let generator = ProviderGenerator::from_config(&config).unwrap();

        let client = generator.client(Channel::Dialogue);
        assert_eq!(client.base_url(), "http://localhost:11434/v1");
        assert_eq!(client.model(), "llama3");
    }

    #[test]
    fn test_channels_use_separate_clients() {
        let generator = ProviderGenerator::with_clients(
            Client::new("http://narrator", None, "big"),
            Client::new("http://talker", None, "small"),
        );
        assert_eq!(generator.client(Channel::Narration).model(), "big");
        assert_eq!(generator.client(Channel::Dialogue).model(), "small");
    }

    #[tokio::test]
    #[ignore]
    async fn test_live_narration() {
        let _ = dotenvy::dotenv();
        let Ok(config) = GameConfig::from_env() else {
            eprintln!("Skipping test: invalid configuration");
            return;
        };
        let Ok(generator) = ProviderGenerator::from_config(&config) else {
            eprintln!("Skipping test: provider keys not set");
            return;
        };

        let history = [Turn::new(
            crate::history::Role::User,
            "Describe a forest clearing in one sentence.",
        )];
        let stream = generator
            .generate(&history, Channel::Narration)
            .await
            .unwrap();
        let text = crate::generator::drain(stream, |f| print!("{f}")).await.unwrap();
        assert!(!text.trim().is_empty());
    }
}
