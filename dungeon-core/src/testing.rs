//! Testing utilities.
//!
//! - `ScriptedGenerator` replays canned replies without API calls and records
//!   what it was asked
//! - `ScriptedConsole` feeds canned player input and captures all output

use crate::console::Console;
use crate::generator::{Channel, FragmentStream, Generator};
use crate::history::Turn;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::sync::{Mutex, PoisonError};

/// Reply used once the script runs out.
pub const DEFAULT_REPLY: &str = "Nothing happens.";

#[derive(Debug, Clone)]
enum Scripted {
    Reply(Vec<String>),
    Fail(String),
    FailMidStream(Vec<String>, String),
}

/// One recorded `generate` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateCall {
    pub channel: Channel,
    /// History as it was when the call was made.
    pub history: Vec<Turn>,
}

/// A generator that returns scripted replies in order.
///
/// Replies are streamed word by word so that consumers see several fragments.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<GenerateCall>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply.
    pub fn reply(self, text: &str) -> Self {
        let fragments = text.split_inclusive(' ').map(String::from).collect();
        self.push(Scripted::Reply(fragments))
    }

    /// Queue a reply with explicit fragment boundaries.
    pub fn fragments(self, fragments: &[&str]) -> Self {
        let fragments = fragments.iter().map(|f| f.to_string()).collect();
        self.push(Scripted::Reply(fragments))
    }

    /// Queue a call that fails before streaming anything.
    pub fn fail(self, message: &str) -> Self {
        self.push(Scripted::Fail(message.to_string()))
    }

    /// Queue a call that streams `fragments` and then fails.
    pub fn fail_after(self, fragments: &[&str], message: &str) -> Self {
        let fragments = fragments.iter().map(|f| f.to_string()).collect();
        self.push(Scripted::FailMidStream(fragments, message.to_string()))
    }

    /// Every call made so far, oldest first.
    pub fn calls(&self) -> Vec<GenerateCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of replies still queued.
    pub fn remaining(&self) -> usize {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn push(self, entry: Scripted) -> Self {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(entry);
        self
    }
}

fn scripted_error(message: String) -> llm::Error {
    llm::Error::Api {
        status: 500,
        message,
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(
        &self,
        history: &[Turn],
        channel: Channel,
    ) -> Result<FragmentStream, llm::Error> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(GenerateCall {
                channel,
                history: history.to_vec(),
            });

        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Scripted::Reply(vec![DEFAULT_REPLY.to_string()]));

        let items: Vec<Result<String, llm::Error>> = match next {
            Scripted::Reply(fragments) => fragments.into_iter().map(Ok).collect(),
            Scripted::Fail(message) => return Err(scripted_error(message)),
            Scripted::FailMidStream(fragments, message) => fragments
                .into_iter()
                .map(Ok)
                .chain(std::iter::once(Err(scripted_error(message))))
                .collect(),
        };

        Ok(Box::pin(futures::stream::iter(items)))
    }
}

/// A console with scripted input that records everything shown.
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    inputs: VecDeque<String>,
    prompts: Vec<String>,
    replies: Vec<String>,
    current_reply: String,
    announcements: Vec<String>,
    separators: usize,
    transcript: String,
}

impl ScriptedConsole {
    /// Create a console that answers prompts with `inputs`, in order.
    ///
    /// Reading past the last input fails with `UnexpectedEof`.
    pub fn new<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Prompts shown so far.
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    /// Completed generated replies, as presented.
    pub fn replies(&self) -> &[String] {
        &self.replies
    }

    pub fn announcements(&self) -> &[String] {
        &self.announcements
    }

    pub fn separators(&self) -> usize {
        self.separators
    }

    /// Everything shown, in order.
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Whether any announcement contains `text`.
    pub fn announced(&self, text: &str) -> bool {
        self.announcements.iter().any(|a| a.contains(text))
    }

    /// Inputs not consumed yet.
    pub fn unread(&self) -> usize {
        self.inputs.len()
    }
}

impl Console for ScriptedConsole {
    fn read_line(&mut self, prompt: &str) -> io::Result<String> {
        self.prompts.push(prompt.to_string());
        self.transcript.push_str(prompt);
        let line = self.inputs.pop_front().ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "no more scripted input")
        })?;
        self.transcript.push_str(&line);
        self.transcript.push('\n');
        Ok(line)
    }

    fn present(&mut self, fragment: &str) {
        self.current_reply.push_str(fragment);
        self.transcript.push_str(fragment);
    }

    fn end_reply(&mut self) {
        self.replies.push(std::mem::take(&mut self.current_reply));
        self.transcript.push('\n');
    }

    fn announce(&mut self, message: &str) {
        self.announcements.push(message.to_string());
        self.transcript.push_str(message);
        self.transcript.push('\n');
    }

    fn separator(&mut self) {
        self.separators += 1;
        self.transcript.push_str("---\n");
    }
}
