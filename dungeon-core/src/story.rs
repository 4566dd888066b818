//! Story post-processing.
//!
//! Generated narration may end with a run of bracketed control tags, one per
//! line:
//!
//! ```text
//! You enter a clearing.
//! [INTERACT_OPPORTUNITY]
//! [QUEST_OPPORTUNITY]
//! ```
//!
//! [`process`] strips that trailing run and classifies it. A tag of the form
//! `[NPC_INTERACTION: <name>]` turns the result into an NPC interaction.

use std::collections::BTreeSet;

/// Something in the scene can be interacted with.
pub const INTERACT_OPPORTUNITY: &str = "INTERACT_OPPORTUNITY";

/// A quest is on offer.
pub const QUEST_OPPORTUNITY: &str = "QUEST_OPPORTUNITY";

/// Prefix of the tag that starts a conversation with an NPC.
pub const NPC_INTERACTION_PREFIX: &str = "NPC_INTERACTION:";

/// Narration with its trailing tags removed and classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Narration {
    /// Ordinary narration and whatever tags trailed it.
    Plain {
        content: String,
        flags: BTreeSet<String>,
    },
    /// The player has engaged an NPC; other tags are discarded.
    NpcInteraction { content: String, npc_name: String },
}

impl Narration {
    /// The narration text without tags.
    pub fn content(&self) -> &str {
        match self {
            Narration::Plain { content, .. } | Narration::NpcInteraction { content, .. } => content,
        }
    }

    /// Whether a plain result carries `flag`. Always false for NPC interactions.
    pub fn has_flag(&self, flag: &str) -> bool {
        match self {
            Narration::Plain { flags, .. } => flags.contains(flag),
            Narration::NpcInteraction { .. } => false,
        }
    }

    pub fn npc_name(&self) -> Option<&str> {
        match self {
            Narration::NpcInteraction { npc_name, .. } => Some(npc_name),
            Narration::Plain { .. } => None,
        }
    }
}

/// Split `raw` into narration content and its trailing tags.
///
/// Lines are scanned from the end. Tag lines (after trimming, `[` … `]`) are
/// collected until the first line that is neither a tag nor blank; blank lines
/// inside the trailing run are skipped. Everything before that point, trimmed,
/// is the content.
pub fn process(raw: &str) -> Narration {
    let lines: Vec<&str> = raw.split('\n').collect();

    // Tokens in scan order: the last line of the text comes first.
    let mut tokens = Vec::new();
    let mut end = lines.len();
    while end > 0 {
        let line = lines[end - 1].trim();
        if line.is_empty() {
            end -= 1;
            continue;
        }
        match tag_token(line) {
            Some(token) => {
                if !token.is_empty() {
                    tokens.push(token.to_string());
                }
                end -= 1;
            }
            None => break,
        }
    }

    let content = lines[..end].join("\n").trim().to_string();

    // The tag nearest the end wins if several NPC tags are present.
    let npc_name = tokens.iter().find_map(|token| {
        token
            .strip_prefix(NPC_INTERACTION_PREFIX)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
    });

    match npc_name {
        Some(npc_name) => Narration::NpcInteraction { content, npc_name },
        None => Narration::Plain {
            content,
            flags: tokens.into_iter().collect(),
        },
    }
}

/// The inside of a `[...]` line, or `None` if the line is not a tag.
fn tag_token(line: &str) -> Option<&str> {
    line.strip_prefix('[')?.strip_suffix(']').map(str::trim)
}
