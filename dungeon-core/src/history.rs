//! Conversation history sent to the generator.
//!
//! A short sliding window of role-tagged turns. Consecutive duplicates are
//! dropped so a re-sent prompt does not crowd out older context.

/// Maximum number of turns kept in the window.
pub const MAX_TURNS: usize = 10;

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

impl From<&Turn> for llm::Message {
    fn from(turn: &Turn) -> Self {
        match turn.role {
            Role::System => llm::Message::system(&turn.content),
            Role::User => llm::Message::user(&turn.content),
            Role::Assistant => llm::Message::assistant(&turn.content),
        }
    }
}

/// Bounded, de-duplicated log of turns.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn unless its content repeats the last turn.
    ///
    /// When the window overflows, the oldest turns are evicted.
    pub fn append(&mut self, role: Role, content: impl Into<String>) {
        let content = content.into();
        if self.turns.last().is_some_and(|last| last.content == content) {
            tracing::trace!("dropping duplicate turn");
            return;
        }

        self.turns.push(Turn { role, content });
        if self.turns.len() > MAX_TURNS {
            let excess = self.turns.len() - MAX_TURNS;
            self.turns.drain(..excess);
        }
    }

    /// Replace the whole history with a single system turn.
    pub fn reset(&mut self, system_prompt: impl Into<String>) {
        self.turns.clear();
        self.turns.push(Turn::new(Role::System, system_prompt));
    }

    /// The current turns, oldest first.
    pub fn snapshot(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_keeps_order() {
        let mut history = ConversationHistory::new();
        history.append(Role::User, "look around");
        history.append(Role::Assistant, "A dark cave.");

        let turns = history.snapshot();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0], Turn::new(Role::User, "look around"));
        assert_eq!(turns[1].role, Role::Assistant);
    }

    #[test]
    fn test_consecutive_duplicate_is_dropped() {
        let mut history = ConversationHistory::new();
        history.append(Role::User, "hello");
        history.append(Role::User, "hello");
        history.append(Role::Assistant, "hello");
        assert_eq!(history.len(), 1);

        // Only the immediately preceding turn is compared.
        history.append(Role::User, "bye");
        history.append(Role::User, "hello");
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut history = ConversationHistory::new();
        for i in 0..25 {
            history.append(Role::User, format!("turn {i}"));
            assert!(history.len() <= MAX_TURNS);
        }

        let turns = history.snapshot();
        assert_eq!(turns.len(), MAX_TURNS);
        assert_eq!(turns[0].content, "turn 15");
        assert_eq!(turns[MAX_TURNS - 1].content, "turn 24");
    }

    #[test]
    fn test_reset_leaves_single_system_turn() {
        let mut history = ConversationHistory::new();
        history.append(Role::User, "one");
        history.append(Role::Assistant, "two");
        history.reset("You are Bob.");

        assert_eq!(history.snapshot(), &[Turn::new(Role::System, "You are Bob.")]);
    }

    #[test]
    fn test_turn_to_message() {
        let message: llm::Message = (&Turn::new(Role::System, "persona")).into();
        assert_eq!(message, llm::Message::system("persona"));
    }
}
