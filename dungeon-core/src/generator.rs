//! Text generation interface.
//!
//! The session never talks to a model directly. It hands the conversation
//! history and a [`Channel`] to a [`Generator`] and gets back a stream of text
//! fragments, which it drains with [`drain`].

use crate::history::Turn;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::fmt;
use std::pin::Pin;

/// A generation context, mapped to a concrete provider by the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Character sheets, scene descriptions and action outcomes.
    Narration,
    /// NPC speech during a conversation.
    Dialogue,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Narration => write!(f, "narration"),
            Channel::Dialogue => write!(f, "dialogue"),
        }
    }
}

/// A finite, single-use stream of text fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, llm::Error>> + Send>>;

/// Produces replies for a conversation.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Start generating a reply to `history` on `channel`.
    async fn generate(&self, history: &[Turn], channel: Channel)
        -> Result<FragmentStream, llm::Error>;
}

/// Concatenate fragments into the full reply, with no separator.
pub fn accumulate<I, S>(fragments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    fragments.into_iter().fold(String::new(), |mut text, fragment| {
        text.push_str(fragment.as_ref());
        text
    })
}

/// Drain `stream` to completion, calling `on_fragment` for each fragment in
/// arrival order, and return the accumulated text.
///
/// The first stream error ends the drain and is returned.
pub async fn drain<F>(stream: FragmentStream, mut on_fragment: F) -> Result<String, llm::Error>
where
    F: FnMut(&str),
{
    stream
        .inspect_ok(|fragment| on_fragment(fragment.as_str()))
        .try_fold(String::new(), |mut text, fragment| async move {
            text.push_str(&fragment);
            Ok::<_, llm::Error>(text)
        })
        .await
}
