//! Turning outcome narration into state changes.
//!
//! The narration is free text, so the shipped interpreter works from keywords.
//! Anything smarter (structured model output, say) can implement
//! [`OutcomeInterpreter`] and be handed to the session instead.

use crate::state::{GameState, StateUpdate};

/// Experience granted for every outcome, whatever happened in it.
pub const EXPERIENCE_PER_OUTCOME: u32 = 5;

/// Health lost on damage or regained on healing.
pub const HEALTH_STEP: i32 = 10;

/// Reads an outcome narration and applies its consequences to the state.
pub trait OutcomeInterpreter: Send + Sync {
    fn interpret(&self, outcome: &str, state: &mut GameState);
}

/// Keyword heuristics over the outcome text.
///
/// Each check is independent and case-insensitive:
///
/// | keyword    | effect                                          |
/// |------------|-------------------------------------------------|
/// | `found`    | text up to the next `.` is added to inventory   |
/// | `new area` | text up to the next `.` becomes the location    |
/// | `damage`   | health −10                                      |
/// | `healed`   | health +10                                      |
/// | `quest`    | text up to the next `.` is added to quests      |
///
/// If a capturing keyword has no `.` after it, that one change is skipped.
/// Experience always goes up by [`EXPERIENCE_PER_OUTCOME`].
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordInterpreter;

impl KeywordInterpreter {
    pub fn new() -> Self {
        Self
    }

    /// The change `outcome` would make, without applying it.
    pub fn update_for(&self, outcome: &str) -> StateUpdate {
        // ASCII lowering keeps byte offsets aligned with `outcome`.
        let lowered = outcome.to_ascii_lowercase();
        let mut update = StateUpdate::new().with_exp_gain(EXPERIENCE_PER_OUTCOME);

        if let Some(item) = capture_after(outcome, &lowered, "found") {
            update = update.with_item(item);
        }
        if let Some(location) = capture_after(outcome, &lowered, "new area") {
            update = update.with_location(location);
        }
        if lowered.contains("damage") {
            update.health_change -= HEALTH_STEP;
        }
        if lowered.contains("healed") {
            update.health_change += HEALTH_STEP;
        }
        if let Some(quest) = capture_after(outcome, &lowered, "quest") {
            update = update.with_quest(quest);
        }

        update
    }
}

impl OutcomeInterpreter for KeywordInterpreter {
    fn interpret(&self, outcome: &str, state: &mut GameState) {
        let update = self.update_for(outcome);
        tracing::debug!(?update, "applying outcome");
        state.update(update);
    }
}

/// Text between the first `keyword` and the following `.`, trimmed.
///
/// `lowered` must be `text.to_ascii_lowercase()`. Returns `None` when the
/// keyword is absent, no `.` follows it, or the capture is empty.
fn capture_after<'a>(text: &'a str, lowered: &str, keyword: &str) -> Option<&'a str> {
    let start = lowered.find(keyword)? + keyword.len();
    let rest = &text[start..];
    let Some(end) = rest.find('.') else {
        tracing::debug!(keyword, "no terminating period, skipping capture");
        return None;
    };
    let captured = rest[..end].trim();
    (!captured.is_empty()).then_some(captured)
}
